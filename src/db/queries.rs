use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use regex::Regex;
use sqlx::query_builder::QueryBuilder;
use sqlx::{Any, AnyPool};
use uuid::Uuid;

use crate::access::{ProjectRelation, Role, TaskRelation, Visibility};
use crate::db::models::{
    DashboardStats, MemberProject, Performer, PerformerRow, PriorityCount, ProjectDetails,
    ProjectListRow, ProjectMemberRow, ProjectProgressRow, ProjectRecord, ProjectStats,
    SessionRecord, StatusCount, TaskDetails, TaskListRow, TaskRecord, TaskStats, TeamPerformance,
    TeamPerformanceRow, TicketListRow, TicketRecord, TicketStats, TrendPoint, TrendRow,
    UserRecord, UserStats,
};
use crate::error::{AppError, AppResult};
use crate::workflow::{self, Resolution, TaskStatus, TicketStatus, VerifyOutcome};

const PROJECT_STATUSES: [&str; 3] = ["active", "completed", "cancelled"];

const PRIORITIES: [&str; 4] = ["low", "medium", "high", "urgent"];

const TASK_CATEGORIES: [&str; 5] = ["bug", "feature", "improvement", "documentation", "other"];

const MEMBER_ROLES: [&str; 4] = ["lead", "developer", "tester", "designer"];

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

#[derive(Debug, Clone)]
pub struct NewUserInput {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct UpdateUserInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewMemberInput {
    pub user_id: String,
    pub role: String,
}

#[derive(Debug, Clone)]
pub struct NewProjectInput {
    pub title: String,
    pub description: String,
    pub priority: String,
    pub start_date: Option<String>,
    pub members: Vec<NewMemberInput>,
    pub created_by: String,
}

#[derive(Debug, Clone)]
pub struct UpdateProjectInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub start_date: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProjectFilters {
    pub status: Option<String>,
    pub priority: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTaskInput {
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub category: String,
    pub assigned_to: String,
    pub created_by: String,
    pub due_date: Option<String>,
    pub estimated_hours: f64,
}

#[derive(Debug, Clone)]
pub struct UpdateTaskInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub assigned_to: Option<String>,
    pub due_date: Option<String>,
    pub estimated_hours: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct TaskFilters {
    pub project_id: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assigned_to: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTicketInput {
    pub task_id: String,
    pub title: String,
    pub description: String,
    pub resolution: String,
    pub notes: String,
    pub time_spent: f64,
    pub resolved_by: String,
}

#[derive(Debug, Clone)]
pub struct UpdateTicketInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub resolution: Option<String>,
    pub notes: Option<String>,
    pub time_spent: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct TicketFilters {
    pub status: Option<String>,
    pub task_id: Option<String>,
}

pub async fn create_user(pool: &AnyPool, input: NewUserInput) -> AppResult<UserRecord> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("user name cannot be empty".to_string()));
    }

    let email = normalize_email(&input.email)?;
    let existing = sqlx::query_scalar::<Any, i64>("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(&email)
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Err(AppError::Validation("email already registered".to_string()));
    }

    let now = now_timestamp();
    let user_id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, password_hash, role, is_active, last_login, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 1, NULL, ?, ?)
        "#,
    )
    .bind(&user_id)
    .bind(&name)
    .bind(&email)
    .bind(&input.password_hash)
    .bind(input.role.as_str())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    get_user(pool, &user_id).await
}

pub async fn get_user(pool: &AnyPool, user_id: &str) -> AppResult<UserRecord> {
    let user = sqlx::query_as::<Any, UserRecord>(
        r#"
        SELECT id, name, email, password_hash, role, is_active, last_login, created_at, updated_at
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' not found")))?;

    Ok(user)
}

pub async fn get_user_by_email(pool: &AnyPool, email: &str) -> AppResult<Option<UserRecord>> {
    let email = email.trim().to_ascii_lowercase();
    let user = sqlx::query_as::<Any, UserRecord>(
        r#"
        SELECT id, name, email, password_hash, role, is_active, last_login, created_at, updated_at
        FROM users
        WHERE email = ?
        "#,
    )
    .bind(&email)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn list_users(pool: &AnyPool, limit: i64, offset: i64) -> AppResult<Vec<UserRecord>> {
    let users = sqlx::query_as::<Any, UserRecord>(
        r#"
        SELECT id, name, email, password_hash, role, is_active, last_login, created_at, updated_at
        FROM users
        WHERE is_active = 1
        ORDER BY name ASC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(users)
}

pub async fn update_user(
    pool: &AnyPool,
    user_id: &str,
    input: UpdateUserInput,
) -> AppResult<UserRecord> {
    let existing = get_user(pool, user_id).await?;

    let name = match input.name {
        Some(value) => {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() {
                return Err(AppError::Validation("user name cannot be empty".to_string()));
            }
            trimmed
        }
        None => existing.name,
    };

    let email = match input.email {
        Some(value) => {
            let normalized = normalize_email(&value)?;
            let conflicts = sqlx::query_scalar::<Any, i64>(
                "SELECT COUNT(*) FROM users WHERE email = ? AND id <> ?",
            )
            .bind(&normalized)
            .bind(user_id)
            .fetch_one(pool)
            .await?;
            if conflicts > 0 {
                return Err(AppError::Validation("email already registered".to_string()));
            }
            normalized
        }
        None => existing.email,
    };

    let password_hash = input.password_hash.unwrap_or(existing.password_hash);
    let now = now_timestamp();

    sqlx::query("UPDATE users SET name = ?, email = ?, password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(&name)
        .bind(&email)
        .bind(&password_hash)
        .bind(&now)
        .bind(user_id)
        .execute(pool)
        .await?;

    get_user(pool, user_id).await
}

pub async fn set_user_role(pool: &AnyPool, user_id: &str, role: Role) -> AppResult<UserRecord> {
    let now = now_timestamp();
    let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
        .bind(role.as_str())
        .bind(&now)
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("user '{user_id}' not found")));
    }

    get_user(pool, user_id).await
}

pub async fn deactivate_user(pool: &AnyPool, user_id: &str) -> AppResult<()> {
    let now = now_timestamp();
    let mut tx = pool.begin().await?;

    let result = sqlx::query("UPDATE users SET is_active = 0, updated_at = ? WHERE id = ?")
        .bind(&now)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("user '{user_id}' not found")));
    }

    sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(())
}

pub async fn touch_last_login(pool: &AnyPool, user_id: &str) -> AppResult<()> {
    let now = now_timestamp();
    sqlx::query("UPDATE users SET last_login = ?, updated_at = ? WHERE id = ?")
        .bind(&now)
        .bind(&now)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn user_stats(pool: &AnyPool) -> AppResult<UserStats> {
    let total = sqlx::query_scalar::<Any, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    let active = sqlx::query_scalar::<Any, i64>("SELECT COUNT(*) FROM users WHERE is_active = 1")
        .fetch_one(pool)
        .await?;
    let admins = count_users_with_role(pool, "admin").await?;
    let moderators = count_users_with_role(pool, "moderator").await?;
    let users = count_users_with_role(pool, "user").await?;

    Ok(UserStats {
        total,
        active,
        admins,
        moderators,
        users,
    })
}

async fn count_users_with_role(pool: &AnyPool, role: &str) -> AppResult<i64> {
    let count = sqlx::query_scalar::<Any, i64>("SELECT COUNT(*) FROM users WHERE role = ?")
        .bind(role)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

pub async fn create_session(
    pool: &AnyPool,
    user_id: &str,
    token_hash: &str,
    ttl_secs: u64,
) -> AppResult<SessionRecord> {
    let now = Utc::now();
    let created_at = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    let expires_at =
        (now + Duration::seconds(ttl_secs as i64)).to_rfc3339_opts(SecondsFormat::Secs, true);
    let session_id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO sessions (id, user_id, token_hash, expires_at, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&session_id)
    .bind(user_id)
    .bind(token_hash)
    .bind(&expires_at)
    .bind(&created_at)
    .execute(pool)
    .await?;

    let session = sqlx::query_as::<Any, SessionRecord>(
        r#"
        SELECT id, user_id, token_hash, expires_at, created_at
        FROM sessions
        WHERE id = ?
        "#,
    )
    .bind(&session_id)
    .fetch_one(pool)
    .await?;

    Ok(session)
}

pub async fn consume_session(
    pool: &AnyPool,
    token_hash: &str,
) -> AppResult<Option<SessionRecord>> {
    let now = now_timestamp();
    let mut tx = pool.begin().await?;

    let session = sqlx::query_as::<Any, SessionRecord>(
        r#"
        SELECT id, user_id, token_hash, expires_at, created_at
        FROM sessions
        WHERE token_hash = ?
        "#,
    )
    .bind(token_hash)
    .fetch_optional(&mut *tx)
    .await?;

    if let Some(ref record) = session {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(&record.id)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
        .bind(&now)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(session.filter(|record| record.expires_at >= now))
}

pub async fn delete_session_by_hash(pool: &AnyPool, token_hash: &str) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(token_hash)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_user_sessions(pool: &AnyPool, user_id: &str) -> AppResult<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

pub async fn create_project(pool: &AnyPool, input: NewProjectInput) -> AppResult<ProjectRecord> {
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::Validation(
            "project title cannot be empty".to_string(),
        ));
    }
    validate_priority(&input.priority)?;

    let start_date = match input.start_date {
        Some(value) => normalize_timestamp(&value)?,
        None => now_timestamp(),
    };

    assert_valid_members(pool, &input.members).await?;

    let now = now_timestamp();
    let project_id = Uuid::new_v4().to_string();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO projects (id, title, description, status, priority, created_by, start_date, completed_date, created_at, updated_at)
        VALUES (?, ?, ?, 'active', ?, ?, ?, NULL, ?, ?)
        "#,
    )
    .bind(&project_id)
    .bind(&title)
    .bind(&input.description)
    .bind(&input.priority)
    .bind(&input.created_by)
    .bind(&start_date)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    for member in &input.members {
        sqlx::query(
            r#"
            INSERT INTO project_members (project_id, user_id, role, joined_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&project_id)
        .bind(&member.user_id)
        .bind(&member.role)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    get_project(pool, &project_id).await
}

pub async fn get_project(pool: &AnyPool, project_id: &str) -> AppResult<ProjectRecord> {
    let project = sqlx::query_as::<Any, ProjectRecord>(
        r#"
        SELECT id, title, description, status, priority, created_by, start_date, completed_date, created_at, updated_at
        FROM projects
        WHERE id = ?
        "#,
    )
    .bind(project_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("project '{project_id}' not found")))?;

    Ok(project)
}

pub async fn list_projects(
    pool: &AnyPool,
    visibility: &Visibility,
    filters: ProjectFilters,
    limit: i64,
    offset: i64,
) -> AppResult<Vec<ProjectListRow>> {
    let mut query = QueryBuilder::<Any>::new(
        r#"
        SELECT
            p.id,
            p.title,
            p.description,
            p.status,
            p.priority,
            p.created_by,
            u.name AS created_by_name,
            p.start_date,
            p.completed_date,
            (SELECT COUNT(*) FROM project_members m WHERE m.project_id = p.id) AS member_count,
            (SELECT COUNT(*) FROM tasks t WHERE t.project_id = p.id) AS task_count,
            p.created_at,
            p.updated_at
        FROM projects p
        INNER JOIN users u ON u.id = p.created_by
        WHERE 1 = 1
        "#,
    );
    push_project_scope(&mut query, visibility);

    if let Some(status) = filters.status {
        validate_project_status(&status)?;
        query.push(" AND p.status = ");
        query.push_bind(status);
    }

    if let Some(priority) = filters.priority {
        validate_priority(&priority)?;
        query.push(" AND p.priority = ");
        query.push_bind(priority);
    }

    query.push(" ORDER BY p.created_at DESC LIMIT ");
    query.push_bind(limit);
    query.push(" OFFSET ");
    query.push_bind(offset);

    let projects = query
        .build_query_as::<ProjectListRow>()
        .fetch_all(pool)
        .await?;

    Ok(projects)
}

pub async fn get_project_details(pool: &AnyPool, project_id: &str) -> AppResult<ProjectDetails> {
    let project = get_project(pool, project_id).await?;

    let created_by_name = sqlx::query_scalar::<Any, String>("SELECT name FROM users WHERE id = ?")
        .bind(&project.created_by)
        .fetch_one(pool)
        .await?;

    let members = project_members(pool, project_id).await?;

    let counts = sqlx::query_as::<Any, StatusCount>(
        r#"
        SELECT status, COUNT(*) AS count
        FROM tasks
        WHERE project_id = ?
        GROUP BY status
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    let mut details = ProjectDetails {
        project,
        created_by_name,
        members,
        open_count: 0,
        in_progress_count: 0,
        resolved_count: 0,
        closed_count: 0,
        approved_count: 0,
        cancelled_count: 0,
    };

    for row in counts {
        match row.status.as_str() {
            "open" => details.open_count = row.count,
            "in-progress" => details.in_progress_count = row.count,
            "resolved" => details.resolved_count = row.count,
            "closed" => details.closed_count = row.count,
            "approved" => details.approved_count = row.count,
            "cancelled" => details.cancelled_count = row.count,
            _ => {}
        }
    }

    Ok(details)
}

pub async fn update_project(
    pool: &AnyPool,
    project_id: &str,
    input: UpdateProjectInput,
) -> AppResult<ProjectRecord> {
    let existing = get_project(pool, project_id).await?;

    let title = match input.title {
        Some(value) => {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() {
                return Err(AppError::Validation(
                    "project title cannot be empty".to_string(),
                ));
            }
            trimmed
        }
        None => existing.title,
    };

    let description = input.description.unwrap_or(existing.description);

    let status = match input.status {
        Some(value) => {
            validate_project_status(&value)?;
            value
        }
        None => existing.status,
    };

    let priority = match input.priority {
        Some(value) => {
            validate_priority(&value)?;
            value
        }
        None => existing.priority,
    };

    let start_date = match input.start_date {
        Some(value) => normalize_timestamp(&value)?,
        None => existing.start_date,
    };

    let now = now_timestamp();
    let completed_date = if status == "completed" {
        existing.completed_date.or_else(|| Some(now.clone()))
    } else {
        None
    };

    sqlx::query(
        r#"
        UPDATE projects
        SET title = ?, description = ?, status = ?, priority = ?, start_date = ?, completed_date = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&title)
    .bind(&description)
    .bind(&status)
    .bind(&priority)
    .bind(&start_date)
    .bind(&completed_date)
    .bind(&now)
    .bind(project_id)
    .execute(pool)
    .await?;

    get_project(pool, project_id).await
}

pub async fn replace_project_members(
    pool: &AnyPool,
    project_id: &str,
    members: Vec<NewMemberInput>,
) -> AppResult<Vec<ProjectMemberRow>> {
    get_project(pool, project_id).await?;
    assert_valid_members(pool, &members).await?;

    #[derive(sqlx::FromRow)]
    struct MemberJoinRow {
        user_id: String,
        joined_at: String,
    }

    let existing = sqlx::query_as::<Any, MemberJoinRow>(
        "SELECT user_id, joined_at FROM project_members WHERE project_id = ?",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    let mut joined_by_user = std::collections::BTreeMap::new();
    for row in existing {
        joined_by_user.insert(row.user_id, row.joined_at);
    }

    let now = now_timestamp();
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM project_members WHERE project_id = ?")
        .bind(project_id)
        .execute(&mut *tx)
        .await?;

    for member in &members {
        let joined_at = joined_by_user
            .get(&member.user_id)
            .cloned()
            .unwrap_or_else(|| now.clone());

        sqlx::query(
            r#"
            INSERT INTO project_members (project_id, user_id, role, joined_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(project_id)
        .bind(&member.user_id)
        .bind(&member.role)
        .bind(joined_at)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("UPDATE projects SET updated_at = ? WHERE id = ?")
        .bind(&now)
        .bind(project_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    project_members(pool, project_id).await
}

pub async fn delete_project(pool: &AnyPool, project_id: &str) -> AppResult<()> {
    let blocking = sqlx::query_scalar::<Any, i64>(
        "SELECT COUNT(*) FROM tasks WHERE project_id = ? AND status IN ('open', 'in-progress')",
    )
    .bind(project_id)
    .fetch_one(pool)
    .await?;
    if blocking > 0 {
        return Err(AppError::Validation(
            "project has open or in-progress tasks".to_string(),
        ));
    }

    let result = sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(project_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "project '{project_id}' not found"
        )));
    }

    Ok(())
}

pub async fn list_member_projects(
    pool: &AnyPool,
    user_id: &str,
) -> AppResult<Vec<MemberProject>> {
    let visibility = Visibility::Related {
        user_id: user_id.to_string(),
    };

    let mut query = QueryBuilder::<Any>::new(
        r#"
        SELECT
            p.id,
            p.title,
            p.description,
            p.status,
            p.priority,
            p.created_by,
            u.name AS created_by_name,
            p.start_date,
            p.completed_date,
            (SELECT COUNT(*) FROM project_members m WHERE m.project_id = p.id) AS member_count,
            (SELECT COUNT(*) FROM tasks t WHERE t.project_id = p.id) AS task_count,
            p.created_at,
            p.updated_at
        FROM projects p
        INNER JOIN users u ON u.id = p.created_by
        WHERE 1 = 1
        "#,
    );
    push_project_scope(&mut query, &visibility);
    query.push(" ORDER BY p.created_at DESC");

    let projects = query
        .build_query_as::<ProjectListRow>()
        .fetch_all(pool)
        .await?;

    let mut results = Vec::with_capacity(projects.len());
    for project in projects {
        let tasks = sqlx::query_as::<Any, TaskRecord>(
            r#"
            SELECT id, project_id, title, description, status, priority, category, assigned_to, created_by, due_date, completed_date, estimated_hours, actual_hours, ticket_id, created_at, updated_at
            FROM tasks
            WHERE project_id = ? AND assigned_to = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(&project.id)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        results.push(MemberProject { project, tasks });
    }

    Ok(results)
}

pub async fn project_stats(pool: &AnyPool, visibility: &Visibility) -> AppResult<ProjectStats> {
    let by_status = project_status_counts(pool, visibility, None).await?;

    let mut priority_query = QueryBuilder::<Any>::new(
        r#"
        SELECT p.priority, COUNT(*) AS count
        FROM projects p
        WHERE 1 = 1
        "#,
    );
    push_project_scope(&mut priority_query, visibility);
    priority_query.push(" GROUP BY p.priority");

    let priority_rows = priority_query
        .build_query_as::<PriorityCount>()
        .fetch_all(pool)
        .await?;

    let total = by_status.iter().map(|row| row.count).sum();

    Ok(ProjectStats {
        total,
        by_status,
        by_priority: zero_filled_priority_counts(priority_rows, &PRIORITIES),
    })
}

pub async fn project_relation(
    pool: &AnyPool,
    project: &ProjectRecord,
    user_id: &str,
) -> AppResult<ProjectRelation> {
    let membership = sqlx::query_scalar::<Any, i64>(
        "SELECT COUNT(*) FROM project_members WHERE project_id = ? AND user_id = ?",
    )
    .bind(&project.id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(ProjectRelation {
        created_by: project.created_by.clone(),
        is_member: membership > 0,
    })
}

pub async fn create_task(pool: &AnyPool, input: NewTaskInput) -> AppResult<TaskRecord> {
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::Validation("task title cannot be empty".to_string()));
    }
    validate_priority(&input.priority)?;
    validate_category(&input.category)?;
    if input.estimated_hours < 0.0 {
        return Err(AppError::Validation(
            "estimated hours cannot be negative".to_string(),
        ));
    }

    let due_date = match input.due_date {
        Some(value) => Some(normalize_timestamp(&value)?),
        None => None,
    };

    let project = get_project(pool, &input.project_id).await?;
    assert_valid_assignee(pool, &project, &input.assigned_to).await?;

    let now = now_timestamp();
    let task_id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO tasks (id, project_id, title, description, status, priority, category, assigned_to, created_by, due_date, completed_date, estimated_hours, actual_hours, ticket_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, 'open', ?, ?, ?, ?, ?, NULL, ?, 0, NULL, ?, ?)
        "#,
    )
    .bind(&task_id)
    .bind(&input.project_id)
    .bind(&title)
    .bind(&input.description)
    .bind(&input.priority)
    .bind(&input.category)
    .bind(&input.assigned_to)
    .bind(&input.created_by)
    .bind(&due_date)
    .bind(input.estimated_hours)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    get_task(pool, &task_id).await
}

pub async fn get_task(pool: &AnyPool, task_id: &str) -> AppResult<TaskRecord> {
    let task = sqlx::query_as::<Any, TaskRecord>(
        r#"
        SELECT id, project_id, title, description, status, priority, category, assigned_to, created_by, due_date, completed_date, estimated_hours, actual_hours, ticket_id, created_at, updated_at
        FROM tasks
        WHERE id = ?
        "#,
    )
    .bind(task_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("task '{task_id}' not found")))?;

    Ok(task)
}

pub async fn list_tasks(
    pool: &AnyPool,
    visibility: &Visibility,
    filters: TaskFilters,
    limit: i64,
    offset: i64,
) -> AppResult<Vec<TaskListRow>> {
    let mut query = QueryBuilder::<Any>::new(
        r#"
        SELECT
            t.id,
            t.project_id,
            p.title AS project_title,
            t.title,
            t.description,
            t.status,
            t.priority,
            t.category,
            t.assigned_to,
            ua.name AS assigned_to_name,
            t.created_by,
            uc.name AS created_by_name,
            t.due_date,
            t.completed_date,
            t.estimated_hours,
            t.actual_hours,
            t.ticket_id,
            t.created_at,
            t.updated_at
        FROM tasks t
        INNER JOIN projects p ON p.id = t.project_id
        INNER JOIN users ua ON ua.id = t.assigned_to
        INNER JOIN users uc ON uc.id = t.created_by
        WHERE 1 = 1
        "#,
    );
    push_task_scope(&mut query, visibility);

    if let Some(project_id) = filters.project_id {
        query.push(" AND t.project_id = ");
        query.push_bind(project_id);
    }

    if let Some(status) = filters.status {
        TaskStatus::parse(&status)?;
        query.push(" AND t.status = ");
        query.push_bind(status);
    }

    if let Some(priority) = filters.priority {
        validate_priority(&priority)?;
        query.push(" AND t.priority = ");
        query.push_bind(priority);
    }

    if let Some(assigned_to) = filters.assigned_to {
        query.push(" AND t.assigned_to = ");
        query.push_bind(assigned_to);
    }

    query.push(" ORDER BY t.created_at DESC LIMIT ");
    query.push_bind(limit);
    query.push(" OFFSET ");
    query.push_bind(offset);

    let tasks = query.build_query_as::<TaskListRow>().fetch_all(pool).await?;

    Ok(tasks)
}

pub async fn get_task_details(pool: &AnyPool, task_id: &str) -> AppResult<TaskDetails> {
    let task = get_task(pool, task_id).await?;

    let project_title = sqlx::query_scalar::<Any, String>("SELECT title FROM projects WHERE id = ?")
        .bind(&task.project_id)
        .fetch_one(pool)
        .await?;

    let assigned_to_name = sqlx::query_scalar::<Any, String>("SELECT name FROM users WHERE id = ?")
        .bind(&task.assigned_to)
        .fetch_one(pool)
        .await?;

    let created_by_name = sqlx::query_scalar::<Any, String>("SELECT name FROM users WHERE id = ?")
        .bind(&task.created_by)
        .fetch_one(pool)
        .await?;

    let tickets = sqlx::query_as::<Any, TicketRecord>(
        r#"
        SELECT id, task_id, title, description, resolved_by, verified_by, status, resolution, notes, verification_notes, time_spent, resolved_at, verified_at, closed_at, created_at, updated_at
        FROM tickets
        WHERE task_id = ?
        ORDER BY created_at ASC
        "#,
    )
    .bind(task_id)
    .fetch_all(pool)
    .await?;

    Ok(TaskDetails {
        task,
        project_title,
        assigned_to_name,
        created_by_name,
        tickets,
    })
}

pub async fn update_task(
    pool: &AnyPool,
    task_id: &str,
    input: UpdateTaskInput,
) -> AppResult<TaskRecord> {
    let existing = get_task(pool, task_id).await?;

    let status = match input.status {
        Some(value) => {
            let from = TaskStatus::parse(&existing.status)?;
            let to = TaskStatus::parse(&value)?;
            workflow::check_manual_task_transition(from, to)?;
            value
        }
        None => existing.status.clone(),
    };

    let title = match input.title {
        Some(value) => {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() {
                return Err(AppError::Validation("task title cannot be empty".to_string()));
            }
            trimmed
        }
        None => existing.title,
    };

    let description = input.description.unwrap_or(existing.description);

    let priority = match input.priority {
        Some(value) => {
            validate_priority(&value)?;
            value
        }
        None => existing.priority,
    };

    let category = match input.category {
        Some(value) => {
            validate_category(&value)?;
            value
        }
        None => existing.category,
    };

    let assigned_to = match input.assigned_to {
        Some(value) => {
            let project = get_project(pool, &existing.project_id).await?;
            assert_valid_assignee(pool, &project, &value).await?;
            value
        }
        None => existing.assigned_to,
    };

    let due_date = match input.due_date {
        Some(value) => Some(normalize_timestamp(&value)?),
        None => existing.due_date,
    };

    let estimated_hours = match input.estimated_hours {
        Some(value) => {
            if value < 0.0 {
                return Err(AppError::Validation(
                    "estimated hours cannot be negative".to_string(),
                ));
            }
            value
        }
        None => existing.estimated_hours,
    };

    let now = now_timestamp();

    sqlx::query(
        r#"
        UPDATE tasks
        SET title = ?, description = ?, status = ?, priority = ?, category = ?, assigned_to = ?, due_date = ?, estimated_hours = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&title)
    .bind(&description)
    .bind(&status)
    .bind(&priority)
    .bind(&category)
    .bind(&assigned_to)
    .bind(&due_date)
    .bind(estimated_hours)
    .bind(&now)
    .bind(task_id)
    .execute(pool)
    .await?;

    get_task(pool, task_id).await
}

pub async fn delete_task(pool: &AnyPool, task_id: &str) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(task_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("task '{task_id}' not found")));
    }

    Ok(())
}

pub async fn task_stats(pool: &AnyPool, visibility: &Visibility) -> AppResult<TaskStats> {
    let by_status = task_status_counts(pool, visibility, None).await?;

    let mut priority_query = QueryBuilder::<Any>::new(
        r#"
        SELECT t.priority, COUNT(*) AS count
        FROM tasks t
        INNER JOIN projects p ON p.id = t.project_id
        WHERE 1 = 1
        "#,
    );
    push_task_scope(&mut priority_query, visibility);
    priority_query.push(" GROUP BY t.priority");

    let priority_rows = priority_query
        .build_query_as::<PriorityCount>()
        .fetch_all(pool)
        .await?;

    let mut overdue_query = QueryBuilder::<Any>::new(
        r#"
        SELECT COUNT(*)
        FROM tasks t
        INNER JOIN projects p ON p.id = t.project_id
        WHERE 1 = 1
        "#,
    );
    push_task_scope(&mut overdue_query, visibility);
    overdue_query.push(" AND t.due_date IS NOT NULL AND t.due_date < ");
    overdue_query.push_bind(now_timestamp());
    overdue_query.push(" AND t.status NOT IN ('closed', 'approved', 'cancelled')");

    let overdue = overdue_query
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await?;

    let total = by_status.iter().map(|row| row.count).sum();

    Ok(TaskStats {
        total,
        by_status,
        by_priority: zero_filled_priority_counts(priority_rows, &PRIORITIES),
        overdue,
    })
}

pub async fn task_relation(
    pool: &AnyPool,
    task: &TaskRecord,
    user_id: &str,
) -> AppResult<TaskRelation> {
    let project = get_project(pool, &task.project_id).await?;
    let relation = project_relation(pool, &project, user_id).await?;

    Ok(TaskRelation {
        assigned_to: task.assigned_to.clone(),
        created_by: task.created_by.clone(),
        project: relation,
    })
}

pub async fn create_ticket(pool: &AnyPool, input: NewTicketInput) -> AppResult<TicketRecord> {
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::Validation(
            "ticket title cannot be empty".to_string(),
        ));
    }
    Resolution::parse(&input.resolution)?;
    if input.time_spent < 0.0 {
        return Err(AppError::Validation(
            "time spent cannot be negative".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let task = task_for_update(&mut tx, &input.task_id).await?;
    workflow::check_ticket_creation(TaskStatus::parse(&task.status)?)?;

    let now = now_timestamp();
    let ticket_id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO tickets (id, task_id, title, description, resolved_by, verified_by, status, resolution, notes, verification_notes, time_spent, resolved_at, verified_at, closed_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, NULL, 'pending', ?, ?, NULL, ?, ?, NULL, NULL, ?, ?)
        "#,
    )
    .bind(&ticket_id)
    .bind(&input.task_id)
    .bind(&title)
    .bind(&input.description)
    .bind(&input.resolved_by)
    .bind(&input.resolution)
    .bind(&input.notes)
    .bind(input.time_spent)
    .bind(&now)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE tasks
        SET status = 'resolved', completed_date = ?, actual_hours = ?, ticket_id = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&now)
    .bind(task.actual_hours + input.time_spent)
    .bind(&ticket_id)
    .bind(&now)
    .bind(&task.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    get_ticket(pool, &ticket_id).await
}

pub async fn get_ticket(pool: &AnyPool, ticket_id: &str) -> AppResult<TicketRecord> {
    let ticket = sqlx::query_as::<Any, TicketRecord>(
        r#"
        SELECT id, task_id, title, description, resolved_by, verified_by, status, resolution, notes, verification_notes, time_spent, resolved_at, verified_at, closed_at, created_at, updated_at
        FROM tickets
        WHERE id = ?
        "#,
    )
    .bind(ticket_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("ticket '{ticket_id}' not found")))?;

    Ok(ticket)
}

pub async fn list_tickets(
    pool: &AnyPool,
    visibility: &Visibility,
    filters: TicketFilters,
    limit: i64,
    offset: i64,
) -> AppResult<Vec<TicketListRow>> {
    let mut query = QueryBuilder::<Any>::new(
        r#"
        SELECT
            k.id,
            k.task_id,
            t.title AS task_title,
            k.title,
            k.description,
            k.resolved_by,
            ur.name AS resolved_by_name,
            k.verified_by,
            k.status,
            k.resolution,
            k.time_spent,
            k.resolved_at,
            k.verified_at,
            k.closed_at,
            k.created_at,
            k.updated_at
        FROM tickets k
        INNER JOIN tasks t ON t.id = k.task_id
        INNER JOIN projects p ON p.id = t.project_id
        INNER JOIN users ur ON ur.id = k.resolved_by
        WHERE 1 = 1
        "#,
    );
    push_ticket_scope(&mut query, visibility);

    if let Some(status) = filters.status {
        TicketStatus::parse(&status)?;
        query.push(" AND k.status = ");
        query.push_bind(status);
    }

    if let Some(task_id) = filters.task_id {
        query.push(" AND k.task_id = ");
        query.push_bind(task_id);
    }

    query.push(" ORDER BY k.created_at DESC LIMIT ");
    query.push_bind(limit);
    query.push(" OFFSET ");
    query.push_bind(offset);

    let tickets = query
        .build_query_as::<TicketListRow>()
        .fetch_all(pool)
        .await?;

    Ok(tickets)
}

pub async fn update_ticket(
    pool: &AnyPool,
    ticket_id: &str,
    input: UpdateTicketInput,
) -> AppResult<TicketRecord> {
    let mut tx = pool.begin().await?;

    let ticket = ticket_for_update(&mut tx, ticket_id).await?;
    workflow::check_ticket_update(TicketStatus::parse(&ticket.status)?)?;

    let title = match input.title {
        Some(value) => {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() {
                return Err(AppError::Validation(
                    "ticket title cannot be empty".to_string(),
                ));
            }
            trimmed
        }
        None => ticket.title.clone(),
    };

    let description = input
        .description
        .unwrap_or_else(|| ticket.description.clone());

    let resolution = match input.resolution {
        Some(value) => {
            Resolution::parse(&value)?;
            Some(value)
        }
        None => ticket.resolution.clone(),
    };

    let notes = input.notes.unwrap_or_else(|| ticket.notes.clone());

    let time_spent = match input.time_spent {
        Some(value) => {
            if value < 0.0 {
                return Err(AppError::Validation(
                    "time spent cannot be negative".to_string(),
                ));
            }
            value
        }
        None => ticket.time_spent,
    };

    let now = now_timestamp();

    sqlx::query(
        r#"
        UPDATE tickets
        SET title = ?, description = ?, resolution = ?, notes = ?, time_spent = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&title)
    .bind(&description)
    .bind(&resolution)
    .bind(&notes)
    .bind(time_spent)
    .bind(&now)
    .bind(ticket_id)
    .execute(&mut *tx)
    .await?;

    let delta = time_spent - ticket.time_spent;
    if delta != 0.0 {
        let task = task_for_update(&mut tx, &ticket.task_id).await?;
        let actual_hours = (task.actual_hours + delta).max(0.0);

        sqlx::query("UPDATE tasks SET actual_hours = ?, updated_at = ? WHERE id = ?")
            .bind(actual_hours)
            .bind(&now)
            .bind(&task.id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    get_ticket(pool, ticket_id).await
}

pub async fn verify_ticket(
    pool: &AnyPool,
    ticket_id: &str,
    outcome: VerifyOutcome,
    notes: Option<String>,
    verified_by: &str,
) -> AppResult<TicketRecord> {
    let mut tx = pool.begin().await?;

    let ticket = ticket_for_update(&mut tx, ticket_id).await?;
    workflow::check_ticket_verify(TicketStatus::parse(&ticket.status)?)?;

    let now = now_timestamp();

    sqlx::query(
        r#"
        UPDATE tickets
        SET status = ?, verified_by = ?, verified_at = ?, verification_notes = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(outcome.ticket_status().as_str())
    .bind(verified_by)
    .bind(&now)
    .bind(&notes)
    .bind(&now)
    .bind(ticket_id)
    .execute(&mut *tx)
    .await?;

    match outcome {
        VerifyOutcome::Verified => {
            sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?")
                .bind(outcome.task_status().as_str())
                .bind(&now)
                .bind(&ticket.task_id)
                .execute(&mut *tx)
                .await?;
        }
        VerifyOutcome::Rejected => {
            sqlx::query(
                "UPDATE tasks SET status = ?, completed_date = NULL, updated_at = ? WHERE id = ?",
            )
            .bind(outcome.task_status().as_str())
            .bind(&now)
            .bind(&ticket.task_id)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;

    get_ticket(pool, ticket_id).await
}

pub async fn close_ticket(
    pool: &AnyPool,
    ticket_id: &str,
    notes: Option<String>,
) -> AppResult<TicketRecord> {
    let mut tx = pool.begin().await?;

    let ticket = ticket_for_update(&mut tx, ticket_id).await?;
    workflow::check_ticket_close(TicketStatus::parse(&ticket.status)?)?;

    let verification_notes = match (ticket.verification_notes, notes) {
        (Some(previous), Some(note)) => Some(format!("{previous}\n{note}")),
        (None, Some(note)) => Some(note),
        (existing, None) => existing,
    };

    let now = now_timestamp();

    sqlx::query(
        r#"
        UPDATE tickets
        SET status = 'closed', verification_notes = ?, closed_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&verification_notes)
    .bind(&now)
    .bind(&now)
    .bind(ticket_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    get_ticket(pool, ticket_id).await
}

pub async fn delete_ticket(pool: &AnyPool, ticket_id: &str) -> AppResult<()> {
    let mut tx = pool.begin().await?;

    let ticket = ticket_for_update(&mut tx, ticket_id).await?;
    workflow::check_ticket_delete(TicketStatus::parse(&ticket.status)?)?;

    let task = task_for_update(&mut tx, &ticket.task_id).await?;
    let linked = task.ticket_id.as_deref() == Some(ticket_id);
    let reopened = linked
        && matches!(
            TaskStatus::parse(&task.status)?,
            TaskStatus::Resolved | TaskStatus::Closed
        );
    let actual_hours = (task.actual_hours - ticket.time_spent).max(0.0);
    let linked_ticket_id = if linked { None } else { task.ticket_id.clone() };

    let now = now_timestamp();

    if reopened {
        sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'in-progress', completed_date = NULL, actual_hours = ?, ticket_id = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(actual_hours)
        .bind(&linked_ticket_id)
        .bind(&now)
        .bind(&task.id)
        .execute(&mut *tx)
        .await?;
    } else {
        sqlx::query(
            r#"
            UPDATE tasks
            SET actual_hours = ?, ticket_id = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(actual_hours)
        .bind(&linked_ticket_id)
        .bind(&now)
        .bind(&task.id)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("DELETE FROM tickets WHERE id = ?")
        .bind(ticket_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(())
}

pub async fn ticket_stats(pool: &AnyPool, visibility: &Visibility) -> AppResult<TicketStats> {
    let by_status = ticket_status_counts(pool, visibility, None).await?;
    let average_time_spent = average_ticket_time_spent(pool, visibility, None).await?;
    let total = by_status.iter().map(|row| row.count).sum();

    Ok(TicketStats {
        total,
        by_status,
        average_time_spent,
    })
}

pub fn window_start(time_frame: &str) -> AppResult<String> {
    let days = match time_frame {
        "7d" => 7,
        "30d" => 30,
        "90d" => 90,
        "1y" => 365,
        other => {
            return Err(AppError::Validation(format!(
                "invalid time frame '{other}'"
            )))
        }
    };

    Ok((Utc::now() - Duration::days(days)).to_rfc3339_opts(SecondsFormat::Secs, true))
}

pub async fn dashboard_stats(
    pool: &AnyPool,
    visibility: &Visibility,
    window_start: &str,
) -> AppResult<DashboardStats> {
    let projects_by_status = project_status_counts(pool, visibility, Some(window_start)).await?;
    let tasks_by_status = task_status_counts(pool, visibility, Some(window_start)).await?;
    let tickets_by_status = ticket_status_counts(pool, visibility, Some(window_start)).await?;
    let average_project_progress = average_project_progress(pool, visibility, window_start).await?;
    let average_ticket_time_spent =
        average_ticket_time_spent(pool, visibility, Some(window_start)).await?;
    let top_performers = top_performers(pool, visibility, window_start).await?;

    Ok(DashboardStats {
        total_projects: projects_by_status.iter().map(|row| row.count).sum(),
        projects_by_status,
        total_tasks: tasks_by_status.iter().map(|row| row.count).sum(),
        tasks_by_status,
        total_tickets: tickets_by_status.iter().map(|row| row.count).sum(),
        tickets_by_status,
        average_project_progress,
        average_ticket_time_spent,
        top_performers,
    })
}

pub async fn project_completion_trend(
    pool: &AnyPool,
    visibility: &Visibility,
    window_start: &str,
) -> AppResult<Vec<TrendPoint>> {
    let mut query = QueryBuilder::<Any>::new(
        r#"
        SELECT
            SUBSTR(COALESCE(p.completed_date, p.created_at), 1, 10) AS day,
            COUNT(*) AS total,
            SUM(CASE WHEN p.status = 'completed' THEN 1 ELSE 0 END) AS completed
        FROM projects p
        WHERE 1 = 1
        "#,
    );
    push_project_scope(&mut query, visibility);
    query.push(" AND COALESCE(p.completed_date, p.created_at) >= ");
    query.push_bind(window_start.to_string());
    query.push(" GROUP BY SUBSTR(COALESCE(p.completed_date, p.created_at), 1, 10) ORDER BY day ASC");

    let rows = query.build_query_as::<TrendRow>().fetch_all(pool).await?;

    let start_day = DateTime::parse_from_rfc3339(window_start)
        .map_err(|_| AppError::Validation(format!("invalid window start '{window_start}'")))?
        .date_naive();
    let end_day = Utc::now().date_naive();

    let mut by_day = std::collections::BTreeMap::new();
    for row in rows {
        by_day.insert(row.day.clone(), row);
    }

    let mut points = Vec::new();
    let mut day = start_day;
    while day <= end_day {
        let key = day.format("%Y-%m-%d").to_string();
        match by_day.get(&key) {
            Some(row) => points.push(TrendPoint {
                date: key,
                total: row.total,
                completed: row.completed,
            }),
            None => points.push(TrendPoint {
                date: key,
                total: 0,
                completed: 0,
            }),
        }
        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    Ok(points)
}

pub async fn team_performance(
    pool: &AnyPool,
    visibility: &Visibility,
    window_start: &str,
) -> AppResult<Vec<TeamPerformance>> {
    let mut query = QueryBuilder::<Any>::new(
        r#"
        SELECT
            u.id AS user_id,
            u.name,
            COUNT(t.id) AS total_tasks,
            COALESCE(SUM(CASE WHEN t.status IN ('closed', 'approved') THEN 1 ELSE 0 END), 0) AS completed_tasks,
            COALESCE(SUM(t.estimated_hours), 0.0) AS estimated_hours,
            COALESCE(SUM(t.actual_hours), 0.0) AS actual_hours
        FROM users u
        INNER JOIN tasks t ON t.assigned_to = u.id
        INNER JOIN projects p ON p.id = t.project_id
        WHERE 1 = 1
        "#,
    );
    push_task_scope(&mut query, visibility);
    query.push(" AND t.created_at >= ");
    query.push_bind(window_start.to_string());
    query.push(" GROUP BY u.id, u.name ORDER BY u.name ASC");

    let rows = query
        .build_query_as::<TeamPerformanceRow>()
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| TeamPerformance {
            completion_rate: round_percentage(row.completed_tasks, row.total_tasks),
            efficiency: efficiency_percentage(row.estimated_hours, row.actual_hours),
            user_id: row.user_id,
            name: row.name,
            total_tasks: row.total_tasks,
            completed_tasks: row.completed_tasks,
            estimated_hours: row.estimated_hours,
            actual_hours: row.actual_hours,
        })
        .collect())
}

async fn project_status_counts(
    pool: &AnyPool,
    visibility: &Visibility,
    since: Option<&str>,
) -> AppResult<Vec<StatusCount>> {
    let mut query = QueryBuilder::<Any>::new(
        r#"
        SELECT p.status, COUNT(*) AS count
        FROM projects p
        WHERE 1 = 1
        "#,
    );
    push_project_scope(&mut query, visibility);
    if let Some(window_start) = since {
        query.push(" AND p.created_at >= ");
        query.push_bind(window_start.to_string());
    }
    query.push(" GROUP BY p.status");

    let rows = query.build_query_as::<StatusCount>().fetch_all(pool).await?;

    Ok(zero_filled_status_counts(rows, &PROJECT_STATUSES))
}

async fn task_status_counts(
    pool: &AnyPool,
    visibility: &Visibility,
    since: Option<&str>,
) -> AppResult<Vec<StatusCount>> {
    let mut query = QueryBuilder::<Any>::new(
        r#"
        SELECT t.status, COUNT(*) AS count
        FROM tasks t
        INNER JOIN projects p ON p.id = t.project_id
        WHERE 1 = 1
        "#,
    );
    push_task_scope(&mut query, visibility);
    if let Some(window_start) = since {
        query.push(" AND t.created_at >= ");
        query.push_bind(window_start.to_string());
    }
    query.push(" GROUP BY t.status");

    let rows = query.build_query_as::<StatusCount>().fetch_all(pool).await?;

    Ok(zero_filled_status_counts(
        rows,
        &TaskStatus::ALL.map(TaskStatus::as_str),
    ))
}

async fn ticket_status_counts(
    pool: &AnyPool,
    visibility: &Visibility,
    since: Option<&str>,
) -> AppResult<Vec<StatusCount>> {
    let mut query = QueryBuilder::<Any>::new(
        r#"
        SELECT k.status, COUNT(*) AS count
        FROM tickets k
        INNER JOIN tasks t ON t.id = k.task_id
        INNER JOIN projects p ON p.id = t.project_id
        WHERE 1 = 1
        "#,
    );
    push_ticket_scope(&mut query, visibility);
    if let Some(window_start) = since {
        query.push(" AND k.resolved_at >= ");
        query.push_bind(window_start.to_string());
    }
    query.push(" GROUP BY k.status");

    let rows = query.build_query_as::<StatusCount>().fetch_all(pool).await?;

    Ok(zero_filled_status_counts(
        rows,
        &TicketStatus::ALL.map(TicketStatus::as_str),
    ))
}

async fn average_ticket_time_spent(
    pool: &AnyPool,
    visibility: &Visibility,
    since: Option<&str>,
) -> AppResult<f64> {
    let mut query = QueryBuilder::<Any>::new(
        r#"
        SELECT COALESCE(AVG(k.time_spent), 0.0)
        FROM tickets k
        INNER JOIN tasks t ON t.id = k.task_id
        INNER JOIN projects p ON p.id = t.project_id
        WHERE 1 = 1
        "#,
    );
    push_ticket_scope(&mut query, visibility);
    if let Some(window_start) = since {
        query.push(" AND k.resolved_at >= ");
        query.push_bind(window_start.to_string());
    }

    let average = query.build_query_scalar::<f64>().fetch_one(pool).await?;

    Ok(average)
}

async fn average_project_progress(
    pool: &AnyPool,
    visibility: &Visibility,
    window_start: &str,
) -> AppResult<f64> {
    let mut query = QueryBuilder::<Any>::new(
        r#"
        SELECT
            COUNT(t.id) AS total,
            COALESCE(SUM(CASE WHEN t.status IN ('closed', 'approved') THEN 1 ELSE 0 END), 0) AS completed
        FROM projects p
        LEFT JOIN tasks t ON t.project_id = p.id
        WHERE 1 = 1
        "#,
    );
    push_project_scope(&mut query, visibility);
    query.push(" AND p.created_at >= ");
    query.push_bind(window_start.to_string());
    query.push(" GROUP BY p.id");

    let rows = query
        .build_query_as::<ProjectProgressRow>()
        .fetch_all(pool)
        .await?;
    if rows.is_empty() {
        return Ok(0.0);
    }

    let sum: f64 = rows
        .iter()
        .map(|row| {
            if row.total == 0 {
                0.0
            } else {
                row.completed as f64 / row.total as f64 * 100.0
            }
        })
        .sum();

    Ok(sum / rows.len() as f64)
}

async fn top_performers(
    pool: &AnyPool,
    visibility: &Visibility,
    window_start: &str,
) -> AppResult<Vec<Performer>> {
    let mut query = QueryBuilder::<Any>::new(
        r#"
        SELECT
            u.id AS user_id,
            u.name,
            COUNT(t.id) AS assigned,
            COALESCE(SUM(CASE WHEN t.status IN ('closed', 'approved') THEN 1 ELSE 0 END), 0) AS completed
        FROM users u
        INNER JOIN tasks t ON t.assigned_to = u.id
        INNER JOIN projects p ON p.id = t.project_id
        WHERE 1 = 1
        "#,
    );
    push_task_scope(&mut query, visibility);
    query.push(" AND t.created_at >= ");
    query.push_bind(window_start.to_string());
    query.push(" GROUP BY u.id, u.name ORDER BY u.name ASC");

    let rows = query.build_query_as::<PerformerRow>().fetch_all(pool).await?;

    let mut performers: Vec<Performer> = rows
        .into_iter()
        .map(|row| Performer {
            completion_rate: round_percentage(row.completed, row.assigned),
            user_id: row.user_id,
            name: row.name,
            assigned: row.assigned,
            completed: row.completed,
        })
        .collect();

    performers.sort_by(|a, b| b.completion_rate.cmp(&a.completion_rate));
    performers.truncate(10);

    Ok(performers)
}

async fn project_members(pool: &AnyPool, project_id: &str) -> AppResult<Vec<ProjectMemberRow>> {
    let members = sqlx::query_as::<Any, ProjectMemberRow>(
        r#"
        SELECT m.user_id, u.name, u.email, m.role, m.joined_at
        FROM project_members m
        INNER JOIN users u ON u.id = m.user_id
        WHERE m.project_id = ?
        ORDER BY m.joined_at ASC, u.name ASC
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(members)
}

async fn assert_valid_members(pool: &AnyPool, members: &[NewMemberInput]) -> AppResult<()> {
    let mut seen = std::collections::BTreeSet::new();
    for member in members {
        validate_member_role(&member.role)?;
        if !seen.insert(member.user_id.clone()) {
            return Err(AppError::Validation(format!(
                "duplicate project member '{}'",
                member.user_id
            )));
        }

        let count = sqlx::query_scalar::<Any, i64>(
            "SELECT COUNT(*) FROM users WHERE id = ? AND is_active = 1",
        )
        .bind(&member.user_id)
        .fetch_one(pool)
        .await?;
        if count == 0 {
            return Err(AppError::Validation(format!(
                "member '{}' is not an active user",
                member.user_id
            )));
        }
    }

    Ok(())
}

async fn assert_valid_assignee(
    pool: &AnyPool,
    project: &ProjectRecord,
    user_id: &str,
) -> AppResult<()> {
    let assignee = sqlx::query_as::<Any, UserRecord>(
        r#"
        SELECT id, name, email, password_hash, role, is_active, last_login, created_at, updated_at
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let assignee = match assignee {
        Some(user) if user.is_active == 1 => user,
        _ => {
            return Err(AppError::Validation(format!(
                "assignee '{user_id}' is not an active user"
            )))
        }
    };

    if assignee.role == "admin" || project.created_by == user_id {
        return Ok(());
    }

    let membership = sqlx::query_scalar::<Any, i64>(
        "SELECT COUNT(*) FROM project_members WHERE project_id = ? AND user_id = ?",
    )
    .bind(&project.id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    if membership == 0 {
        return Err(AppError::Validation(
            "assignee must be the project creator, a team member, or an admin".to_string(),
        ));
    }

    Ok(())
}

async fn task_for_update(
    tx: &mut sqlx::Transaction<'_, Any>,
    task_id: &str,
) -> AppResult<TaskRecord> {
    let task = sqlx::query_as::<Any, TaskRecord>(
        r#"
        SELECT id, project_id, title, description, status, priority, category, assigned_to, created_by, due_date, completed_date, estimated_hours, actual_hours, ticket_id, created_at, updated_at
        FROM tasks
        WHERE id = ?
        "#,
    )
    .bind(task_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("task '{task_id}' not found")))?;

    Ok(task)
}

async fn ticket_for_update(
    tx: &mut sqlx::Transaction<'_, Any>,
    ticket_id: &str,
) -> AppResult<TicketRecord> {
    let ticket = sqlx::query_as::<Any, TicketRecord>(
        r#"
        SELECT id, task_id, title, description, resolved_by, verified_by, status, resolution, notes, verification_notes, time_spent, resolved_at, verified_at, closed_at, created_at, updated_at
        FROM tickets
        WHERE id = ?
        "#,
    )
    .bind(ticket_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("ticket '{ticket_id}' not found")))?;

    Ok(ticket)
}

fn push_project_scope(query: &mut QueryBuilder<'_, Any>, visibility: &Visibility) {
    if let Visibility::Related { user_id } = visibility {
        query.push(" AND (p.created_by = ");
        query.push_bind(user_id.clone());
        query.push(
            " OR EXISTS (SELECT 1 FROM project_members pm WHERE pm.project_id = p.id AND pm.user_id = ",
        );
        query.push_bind(user_id.clone());
        query.push("))");
    }
}

fn push_task_scope(query: &mut QueryBuilder<'_, Any>, visibility: &Visibility) {
    if let Visibility::Related { user_id } = visibility {
        query.push(" AND (t.assigned_to = ");
        query.push_bind(user_id.clone());
        query.push(" OR t.created_by = ");
        query.push_bind(user_id.clone());
        query.push(" OR p.created_by = ");
        query.push_bind(user_id.clone());
        query.push(
            " OR EXISTS (SELECT 1 FROM project_members pm WHERE pm.project_id = p.id AND pm.user_id = ",
        );
        query.push_bind(user_id.clone());
        query.push("))");
    }
}

fn push_ticket_scope(query: &mut QueryBuilder<'_, Any>, visibility: &Visibility) {
    if let Visibility::Related { user_id } = visibility {
        query.push(" AND (k.resolved_by = ");
        query.push_bind(user_id.clone());
        query.push(" OR t.assigned_to = ");
        query.push_bind(user_id.clone());
        query.push(" OR t.created_by = ");
        query.push_bind(user_id.clone());
        query.push(" OR p.created_by = ");
        query.push_bind(user_id.clone());
        query.push(
            " OR EXISTS (SELECT 1 FROM project_members pm WHERE pm.project_id = p.id AND pm.user_id = ",
        );
        query.push_bind(user_id.clone());
        query.push("))");
    }
}

fn zero_filled_status_counts(rows: Vec<StatusCount>, statuses: &[&str]) -> Vec<StatusCount> {
    let mut by_status = std::collections::BTreeMap::new();
    for row in rows {
        by_status.insert(row.status, row.count);
    }

    statuses
        .iter()
        .map(|status| StatusCount {
            status: (*status).to_string(),
            count: by_status.get(*status).copied().unwrap_or(0),
        })
        .collect()
}

fn zero_filled_priority_counts(rows: Vec<PriorityCount>, priorities: &[&str]) -> Vec<PriorityCount> {
    let mut by_priority = std::collections::BTreeMap::new();
    for row in rows {
        by_priority.insert(row.priority, row.count);
    }

    priorities
        .iter()
        .map(|priority| PriorityCount {
            priority: (*priority).to_string(),
            count: by_priority.get(*priority).copied().unwrap_or(0),
        })
        .collect()
}

fn round_percentage(completed: i64, total: i64) -> i64 {
    if total == 0 {
        return 0;
    }

    ((completed as f64 / total as f64) * 100.0).round() as i64
}

fn efficiency_percentage(estimated_hours: f64, actual_hours: f64) -> i64 {
    if actual_hours <= 0.0 {
        return 0;
    }

    ((estimated_hours / actual_hours) * 100.0).round() as i64
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn normalize_timestamp(value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Secs, true));
    }

    if NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").is_ok() {
        return Ok(format!("{trimmed}T00:00:00Z"));
    }

    Err(AppError::Validation(format!(
        "invalid date '{value}', expected RFC 3339 or YYYY-MM-DD"
    )))
}

fn normalize_email(value: &str) -> AppResult<String> {
    let email = value.trim().to_ascii_lowercase();
    if email.is_empty() {
        return Err(AppError::Validation("email cannot be empty".to_string()));
    }
    if !EMAIL_PATTERN.is_match(&email) {
        return Err(AppError::Validation(format!(
            "invalid email address '{}'",
            value.trim()
        )));
    }

    Ok(email)
}

pub fn validate_password(value: &str) -> AppResult<()> {
    if value.len() < 8 {
        return Err(AppError::Validation(
            "password must be at least 8 characters".to_string(),
        ));
    }

    Ok(())
}

fn validate_project_status(value: &str) -> AppResult<()> {
    if PROJECT_STATUSES.contains(&value) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "invalid project status '{value}'"
        )))
    }
}

fn validate_priority(value: &str) -> AppResult<()> {
    if PRIORITIES.contains(&value) {
        Ok(())
    } else {
        Err(AppError::Validation(format!("invalid priority '{value}'")))
    }
}

fn validate_category(value: &str) -> AppResult<()> {
    if TASK_CATEGORIES.contains(&value) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "invalid task category '{value}'"
        )))
    }
}

fn validate_member_role(value: &str) -> AppResult<()> {
    if MEMBER_ROLES.contains(&value) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "invalid member role '{value}'"
        )))
    }
}
