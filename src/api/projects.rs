use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::access::{self, CurrentUser, Role};
use crate::api::tasks::{map_task, TaskResponse};
use crate::api::{
    normalize_list_query, require_moderator, ApiResponse, PriorityCountResponse,
    StatusCountResponse,
};
use crate::db::models::{
    MemberProject, ProjectDetails, ProjectListRow, ProjectMemberRow, ProjectRecord, ProjectStats,
};
use crate::db::queries;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route("/projects/user", get(member_projects))
        .route("/projects/stats", get(project_stats))
        .route(
            "/projects/{id}",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/projects/{id}/team-members", put(replace_members))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse {
    id: String,
    title: String,
    description: String,
    status: String,
    priority: String,
    created_by: String,
    start_date: String,
    completed_date: Option<String>,
    created_at: String,
    updated_at: String,
}

fn map_project(project: ProjectRecord) -> ProjectResponse {
    ProjectResponse {
        id: project.id,
        title: project.title,
        description: project.description,
        status: project.status,
        priority: project.priority,
        created_by: project.created_by,
        start_date: project.start_date,
        completed_date: project.completed_date,
        created_at: project.created_at,
        updated_at: project.updated_at,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectSummaryResponse {
    id: String,
    title: String,
    description: String,
    status: String,
    priority: String,
    created_by: String,
    created_by_name: String,
    start_date: String,
    completed_date: Option<String>,
    member_count: i64,
    task_count: i64,
    created_at: String,
    updated_at: String,
}

fn map_summary(row: ProjectListRow) -> ProjectSummaryResponse {
    ProjectSummaryResponse {
        id: row.id,
        title: row.title,
        description: row.description,
        status: row.status,
        priority: row.priority,
        created_by: row.created_by,
        created_by_name: row.created_by_name,
        start_date: row.start_date,
        completed_date: row.completed_date,
        member_count: row.member_count,
        task_count: row.task_count,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TeamMemberResponse {
    user_id: String,
    name: String,
    email: String,
    role: String,
    joined_at: String,
}

fn map_member(member: ProjectMemberRow) -> TeamMemberResponse {
    TeamMemberResponse {
        user_id: member.user_id,
        name: member.name,
        email: member.email,
        role: member.role,
        joined_at: member.joined_at,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskCountsResponse {
    open: i64,
    in_progress: i64,
    resolved: i64,
    closed: i64,
    approved: i64,
    cancelled: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectDetailsResponse {
    id: String,
    title: String,
    description: String,
    status: String,
    priority: String,
    created_by: String,
    created_by_name: String,
    start_date: String,
    completed_date: Option<String>,
    team_members: Vec<TeamMemberResponse>,
    task_counts: TaskCountsResponse,
    created_at: String,
    updated_at: String,
}

fn map_details(details: ProjectDetails) -> ProjectDetailsResponse {
    ProjectDetailsResponse {
        id: details.project.id,
        title: details.project.title,
        description: details.project.description,
        status: details.project.status,
        priority: details.project.priority,
        created_by: details.project.created_by,
        created_by_name: details.created_by_name,
        start_date: details.project.start_date,
        completed_date: details.project.completed_date,
        team_members: details.members.into_iter().map(map_member).collect(),
        task_counts: TaskCountsResponse {
            open: details.open_count,
            in_progress: details.in_progress_count,
            resolved: details.resolved_count,
            closed: details.closed_count,
            approved: details.approved_count,
            cancelled: details.cancelled_count,
        },
        created_at: details.project.created_at,
        updated_at: details.project.updated_at,
    }
}

#[derive(Debug, Serialize)]
struct MemberProjectResponse {
    project: ProjectSummaryResponse,
    tasks: Vec<TaskResponse>,
}

fn map_member_project(entry: MemberProject) -> MemberProjectResponse {
    MemberProjectResponse {
        project: map_summary(entry.project),
        tasks: entry.tasks.into_iter().map(map_task).collect(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectStatsResponse {
    total: i64,
    by_status: Vec<StatusCountResponse>,
    by_priority: Vec<PriorityCountResponse>,
}

impl From<ProjectStats> for ProjectStatsResponse {
    fn from(stats: ProjectStats) -> Self {
        Self {
            total: stats.total,
            by_status: stats.by_status.into_iter().map(Into::into).collect(),
            by_priority: stats.by_priority.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamMemberRequest {
    user_id: String,
    role: Option<String>,
}

impl TeamMemberRequest {
    fn into_input(self) -> queries::NewMemberInput {
        queries::NewMemberInput {
            user_id: self.user_id,
            role: self.role.unwrap_or_else(|| "developer".to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateProjectRequest {
    title: String,
    description: Option<String>,
    priority: Option<String>,
    start_date: Option<String>,
    #[serde(default)]
    team_members: Vec<TeamMemberRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProjectRequest {
    title: Option<String>,
    description: Option<String>,
    status: Option<String>,
    priority: Option<String>,
    start_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplaceMembersRequest {
    team_members: Vec<TeamMemberRequest>,
}

#[derive(Debug, Deserialize)]
struct ProjectListQuery {
    limit: Option<i64>,
    offset: Option<i64>,
    status: Option<String>,
    priority: Option<String>,
}

async fn list_projects(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Query(query): Query<ProjectListQuery>,
) -> AppResult<Json<ApiResponse<Vec<ProjectSummaryResponse>>>> {
    let (limit, offset) = normalize_list_query(query.limit, query.offset)?;
    let visibility = access::visibility(&actor);

    let filters = queries::ProjectFilters {
        status: query.status,
        priority: query.priority,
    };
    let projects = queries::list_projects(&state.db, &visibility, filters, limit, offset).await?;
    let projects = projects.into_iter().map(map_summary).collect();

    Ok(ApiResponse::ok("projects retrieved", projects))
}

async fn member_projects(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<MemberProjectResponse>>>> {
    if actor.role != Role::User {
        return Err(AppError::Forbidden(
            "this view is limited to user accounts".to_string(),
        ));
    }

    let entries = queries::list_member_projects(&state.db, &actor.id).await?;
    let entries = entries.into_iter().map(map_member_project).collect();

    Ok(ApiResponse::ok("member projects retrieved", entries))
}

async fn create_project(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Json(payload): Json<CreateProjectRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ProjectResponse>>)> {
    require_moderator(&actor)?;

    let members = payload
        .team_members
        .into_iter()
        .map(TeamMemberRequest::into_input)
        .collect();

    let project = queries::create_project(
        &state.db,
        queries::NewProjectInput {
            title: payload.title,
            description: payload.description.unwrap_or_default(),
            priority: payload.priority.unwrap_or_else(|| "medium".to_string()),
            start_date: payload.start_date,
            members,
            created_by: actor.id.clone(),
        },
    )
    .await?;

    Ok(ApiResponse::created("project created", map_project(project)))
}

async fn get_project(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Path(project_id): Path<String>,
) -> AppResult<Json<ApiResponse<ProjectDetailsResponse>>> {
    let project = queries::get_project(&state.db, &project_id).await?;
    let relation = queries::project_relation(&state.db, &project, &actor.id).await?;
    if !access::can_read_project(&actor, &relation) {
        return Err(AppError::Forbidden(
            "you cannot view this project".to_string(),
        ));
    }

    let details = queries::get_project_details(&state.db, &project_id).await?;
    Ok(ApiResponse::ok("project retrieved", map_details(details)))
}

async fn update_project(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Path(project_id): Path<String>,
    Json(payload): Json<UpdateProjectRequest>,
) -> AppResult<Json<ApiResponse<ProjectResponse>>> {
    if payload.title.is_none()
        && payload.description.is_none()
        && payload.status.is_none()
        && payload.priority.is_none()
        && payload.start_date.is_none()
    {
        return Err(AppError::Validation(
            "at least one field must be provided".to_string(),
        ));
    }

    let project = queries::get_project(&state.db, &project_id).await?;
    let relation = queries::project_relation(&state.db, &project, &actor.id).await?;
    if !access::can_manage_project(&actor, &relation) {
        return Err(AppError::Forbidden(
            "you cannot modify this project".to_string(),
        ));
    }

    let project = queries::update_project(
        &state.db,
        &project_id,
        queries::UpdateProjectInput {
            title: payload.title,
            description: payload.description,
            status: payload.status,
            priority: payload.priority,
            start_date: payload.start_date,
        },
    )
    .await?;

    Ok(ApiResponse::ok("project updated", map_project(project)))
}

async fn delete_project(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Path(project_id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    let project = queries::get_project(&state.db, &project_id).await?;
    let relation = queries::project_relation(&state.db, &project, &actor.id).await?;
    if !access::can_manage_project(&actor, &relation) {
        return Err(AppError::Forbidden(
            "you cannot delete this project".to_string(),
        ));
    }

    queries::delete_project(&state.db, &project_id).await?;
    Ok(ApiResponse::message("project deleted"))
}

async fn replace_members(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Path(project_id): Path<String>,
    Json(payload): Json<ReplaceMembersRequest>,
) -> AppResult<Json<ApiResponse<Vec<TeamMemberResponse>>>> {
    let project = queries::get_project(&state.db, &project_id).await?;
    let relation = queries::project_relation(&state.db, &project, &actor.id).await?;
    if !access::can_manage_project(&actor, &relation) {
        return Err(AppError::Forbidden(
            "you cannot modify this project".to_string(),
        ));
    }

    let members = payload
        .team_members
        .into_iter()
        .map(TeamMemberRequest::into_input)
        .collect();
    let members = queries::replace_project_members(&state.db, &project_id, members).await?;
    let members = members.into_iter().map(map_member).collect();

    Ok(ApiResponse::ok("team members updated", members))
}

async fn project_stats(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<ProjectStatsResponse>>> {
    let visibility = access::visibility(&actor);
    let stats = queries::project_stats(&state.db, &visibility).await?;

    Ok(ApiResponse::ok(
        "project statistics retrieved",
        ProjectStatsResponse::from(stats),
    ))
}
