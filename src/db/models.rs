use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: i64,
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: String,
    pub created_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct ProjectRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub created_by: String,
    pub start_date: String,
    pub completed_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct ProjectListRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub created_by: String,
    pub created_by_name: String,
    pub start_date: String,
    pub completed_date: Option<String>,
    pub member_count: i64,
    pub task_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct ProjectMemberRow {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub joined_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct TaskRecord {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub category: String,
    pub assigned_to: String,
    pub created_by: String,
    pub due_date: Option<String>,
    pub completed_date: Option<String>,
    pub estimated_hours: f64,
    pub actual_hours: f64,
    pub ticket_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct TaskListRow {
    pub id: String,
    pub project_id: String,
    pub project_title: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub category: String,
    pub assigned_to: String,
    pub assigned_to_name: String,
    pub created_by: String,
    pub created_by_name: String,
    pub due_date: Option<String>,
    pub completed_date: Option<String>,
    pub estimated_hours: f64,
    pub actual_hours: f64,
    pub ticket_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct TicketRecord {
    pub id: String,
    pub task_id: String,
    pub title: String,
    pub description: String,
    pub resolved_by: String,
    pub verified_by: Option<String>,
    pub status: String,
    pub resolution: Option<String>,
    pub notes: String,
    pub verification_notes: Option<String>,
    pub time_spent: f64,
    pub resolved_at: String,
    pub verified_at: Option<String>,
    pub closed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct TicketListRow {
    pub id: String,
    pub task_id: String,
    pub task_title: String,
    pub title: String,
    pub description: String,
    pub resolved_by: String,
    pub resolved_by_name: String,
    pub verified_by: Option<String>,
    pub status: String,
    pub resolution: Option<String>,
    pub time_spent: f64,
    pub resolved_at: String,
    pub verified_at: Option<String>,
    pub closed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct ProjectDetails {
    pub project: ProjectRecord,
    pub created_by_name: String,
    pub members: Vec<ProjectMemberRow>,
    pub open_count: i64,
    pub in_progress_count: i64,
    pub resolved_count: i64,
    pub closed_count: i64,
    pub approved_count: i64,
    pub cancelled_count: i64,
}

#[derive(Debug, Clone)]
pub struct TaskDetails {
    pub task: TaskRecord,
    pub project_title: String,
    pub assigned_to_name: String,
    pub created_by_name: String,
    pub tickets: Vec<TicketRecord>,
}

#[derive(Debug, Clone)]
pub struct MemberProject {
    pub project: ProjectListRow,
    pub tasks: Vec<TaskRecord>,
}

#[derive(Debug, Clone, FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct PriorityCount {
    pub priority: String,
    pub count: i64,
}

#[derive(Debug, Clone)]
pub struct UserStats {
    pub total: i64,
    pub active: i64,
    pub admins: i64,
    pub moderators: i64,
    pub users: i64,
}

#[derive(Debug, Clone)]
pub struct ProjectStats {
    pub total: i64,
    pub by_status: Vec<StatusCount>,
    pub by_priority: Vec<PriorityCount>,
}

#[derive(Debug, Clone)]
pub struct TaskStats {
    pub total: i64,
    pub by_status: Vec<StatusCount>,
    pub by_priority: Vec<PriorityCount>,
    pub overdue: i64,
}

#[derive(Debug, Clone)]
pub struct TicketStats {
    pub total: i64,
    pub by_status: Vec<StatusCount>,
    pub average_time_spent: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct PerformerRow {
    pub user_id: String,
    pub name: String,
    pub assigned: i64,
    pub completed: i64,
}

#[derive(Debug, Clone)]
pub struct Performer {
    pub user_id: String,
    pub name: String,
    pub assigned: i64,
    pub completed: i64,
    pub completion_rate: i64,
}

#[derive(Debug, Clone)]
pub struct DashboardStats {
    pub total_projects: i64,
    pub projects_by_status: Vec<StatusCount>,
    pub total_tasks: i64,
    pub tasks_by_status: Vec<StatusCount>,
    pub total_tickets: i64,
    pub tickets_by_status: Vec<StatusCount>,
    pub average_project_progress: f64,
    pub average_ticket_time_spent: f64,
    pub top_performers: Vec<Performer>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ProjectProgressRow {
    pub total: i64,
    pub completed: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct TrendRow {
    pub day: String,
    pub total: i64,
    pub completed: i64,
}

#[derive(Debug, Clone)]
pub struct TrendPoint {
    pub date: String,
    pub total: i64,
    pub completed: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct TeamPerformanceRow {
    pub user_id: String,
    pub name: String,
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub estimated_hours: f64,
    pub actual_hours: f64,
}

#[derive(Debug, Clone)]
pub struct TeamPerformance {
    pub user_id: String,
    pub name: String,
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub completion_rate: i64,
    pub estimated_hours: f64,
    pub actual_hours: f64,
    pub efficiency: i64,
}
