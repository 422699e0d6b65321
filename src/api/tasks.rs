use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::access::{self, CurrentUser};
use crate::api::tickets::{map_ticket, TicketResponse};
use crate::api::{
    normalize_list_query, require_moderator, ApiResponse, PriorityCountResponse,
    StatusCountResponse,
};
use crate::db::models::{TaskDetails, TaskListRow, TaskRecord, TaskStats};
use crate::db::queries;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/stats", get(task_stats))
        .route(
            "/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    id: String,
    project_id: String,
    title: String,
    description: String,
    status: String,
    priority: String,
    category: String,
    assigned_to: String,
    created_by: String,
    due_date: Option<String>,
    completed_date: Option<String>,
    estimated_hours: f64,
    actual_hours: f64,
    ticket_id: Option<String>,
    created_at: String,
    updated_at: String,
}

pub fn map_task(task: TaskRecord) -> TaskResponse {
    TaskResponse {
        id: task.id,
        project_id: task.project_id,
        title: task.title,
        description: task.description,
        status: task.status,
        priority: task.priority,
        category: task.category,
        assigned_to: task.assigned_to,
        created_by: task.created_by,
        due_date: task.due_date,
        completed_date: task.completed_date,
        estimated_hours: task.estimated_hours,
        actual_hours: task.actual_hours,
        ticket_id: task.ticket_id,
        created_at: task.created_at,
        updated_at: task.updated_at,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskSummaryResponse {
    id: String,
    project_id: String,
    project_title: String,
    title: String,
    description: String,
    status: String,
    priority: String,
    category: String,
    assigned_to: String,
    assigned_to_name: String,
    created_by: String,
    created_by_name: String,
    due_date: Option<String>,
    completed_date: Option<String>,
    estimated_hours: f64,
    actual_hours: f64,
    ticket_id: Option<String>,
    created_at: String,
    updated_at: String,
}

fn map_task_summary(row: TaskListRow) -> TaskSummaryResponse {
    TaskSummaryResponse {
        id: row.id,
        project_id: row.project_id,
        project_title: row.project_title,
        title: row.title,
        description: row.description,
        status: row.status,
        priority: row.priority,
        category: row.category,
        assigned_to: row.assigned_to,
        assigned_to_name: row.assigned_to_name,
        created_by: row.created_by,
        created_by_name: row.created_by_name,
        due_date: row.due_date,
        completed_date: row.completed_date,
        estimated_hours: row.estimated_hours,
        actual_hours: row.actual_hours,
        ticket_id: row.ticket_id,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskDetailsResponse {
    id: String,
    project_id: String,
    project_title: String,
    title: String,
    description: String,
    status: String,
    priority: String,
    category: String,
    assigned_to: String,
    assigned_to_name: String,
    created_by: String,
    created_by_name: String,
    due_date: Option<String>,
    completed_date: Option<String>,
    estimated_hours: f64,
    actual_hours: f64,
    ticket_id: Option<String>,
    tickets: Vec<TicketResponse>,
    created_at: String,
    updated_at: String,
}

fn map_details(details: TaskDetails) -> TaskDetailsResponse {
    TaskDetailsResponse {
        id: details.task.id,
        project_id: details.task.project_id,
        project_title: details.project_title,
        title: details.task.title,
        description: details.task.description,
        status: details.task.status,
        priority: details.task.priority,
        category: details.task.category,
        assigned_to: details.task.assigned_to,
        assigned_to_name: details.assigned_to_name,
        created_by: details.task.created_by,
        created_by_name: details.created_by_name,
        due_date: details.task.due_date,
        completed_date: details.task.completed_date,
        estimated_hours: details.task.estimated_hours,
        actual_hours: details.task.actual_hours,
        ticket_id: details.task.ticket_id,
        tickets: details.tickets.into_iter().map(map_ticket).collect(),
        created_at: details.task.created_at,
        updated_at: details.task.updated_at,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskStatsResponse {
    total: i64,
    by_status: Vec<StatusCountResponse>,
    by_priority: Vec<PriorityCountResponse>,
    overdue: i64,
}

impl From<TaskStats> for TaskStatsResponse {
    fn from(stats: TaskStats) -> Self {
        Self {
            total: stats.total,
            by_status: stats.by_status.into_iter().map(Into::into).collect(),
            by_priority: stats.by_priority.into_iter().map(Into::into).collect(),
            overdue: stats.overdue,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskRequest {
    project_id: String,
    title: String,
    description: Option<String>,
    priority: Option<String>,
    category: Option<String>,
    assigned_to: String,
    due_date: Option<String>,
    estimated_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateTaskRequest {
    title: Option<String>,
    description: Option<String>,
    status: Option<String>,
    priority: Option<String>,
    category: Option<String>,
    assigned_to: Option<String>,
    due_date: Option<String>,
    estimated_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskListQuery {
    limit: Option<i64>,
    offset: Option<i64>,
    project_id: Option<String>,
    status: Option<String>,
    priority: Option<String>,
    assigned_to: Option<String>,
}

async fn list_tasks(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Query(query): Query<TaskListQuery>,
) -> AppResult<Json<ApiResponse<Vec<TaskSummaryResponse>>>> {
    let (limit, offset) = normalize_list_query(query.limit, query.offset)?;
    let visibility = access::visibility(&actor);

    let filters = queries::TaskFilters {
        project_id: query.project_id,
        status: query.status,
        priority: query.priority,
        assigned_to: query.assigned_to,
    };
    let tasks = queries::list_tasks(&state.db, &visibility, filters, limit, offset).await?;
    let tasks = tasks.into_iter().map(map_task_summary).collect();

    Ok(ApiResponse::ok("tasks retrieved", tasks))
}

async fn create_task(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Json(payload): Json<CreateTaskRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<TaskResponse>>)> {
    require_moderator(&actor)?;

    let task = queries::create_task(
        &state.db,
        queries::NewTaskInput {
            project_id: payload.project_id,
            title: payload.title,
            description: payload.description.unwrap_or_default(),
            priority: payload.priority.unwrap_or_else(|| "medium".to_string()),
            category: payload.category.unwrap_or_else(|| "other".to_string()),
            assigned_to: payload.assigned_to,
            created_by: actor.id.clone(),
            due_date: payload.due_date,
            estimated_hours: payload.estimated_hours.unwrap_or(0.0),
        },
    )
    .await?;

    Ok(ApiResponse::created("task created", map_task(task)))
}

async fn get_task(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Path(task_id): Path<String>,
) -> AppResult<Json<ApiResponse<TaskDetailsResponse>>> {
    let task = queries::get_task(&state.db, &task_id).await?;
    let relation = queries::task_relation(&state.db, &task, &actor.id).await?;
    if !access::can_read_task(&actor, &relation) {
        return Err(AppError::Forbidden("you cannot view this task".to_string()));
    }

    let details = queries::get_task_details(&state.db, &task_id).await?;
    Ok(ApiResponse::ok("task retrieved", map_details(details)))
}

async fn update_task(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Path(task_id): Path<String>,
    Json(payload): Json<UpdateTaskRequest>,
) -> AppResult<Json<ApiResponse<TaskResponse>>> {
    let changing_fields = payload.title.is_some()
        || payload.description.is_some()
        || payload.priority.is_some()
        || payload.category.is_some()
        || payload.due_date.is_some()
        || payload.estimated_hours.is_some();
    if !changing_fields && payload.status.is_none() && payload.assigned_to.is_none() {
        return Err(AppError::Validation(
            "at least one field must be provided".to_string(),
        ));
    }

    let task = queries::get_task(&state.db, &task_id).await?;
    let relation = queries::task_relation(&state.db, &task, &actor.id).await?;

    if changing_fields && !access::can_update_task(&actor, &relation) {
        return Err(AppError::Forbidden(
            "you cannot modify this task".to_string(),
        ));
    }
    if payload.status.is_some() && !access::can_change_task_status(&actor, &relation) {
        return Err(AppError::Forbidden(
            "you cannot change this task's status".to_string(),
        ));
    }
    if payload.assigned_to.is_some() && !access::can_reassign_task(&actor, &relation) {
        return Err(AppError::Forbidden(
            "you cannot reassign this task".to_string(),
        ));
    }

    let task = queries::update_task(
        &state.db,
        &task_id,
        queries::UpdateTaskInput {
            title: payload.title,
            description: payload.description,
            status: payload.status,
            priority: payload.priority,
            category: payload.category,
            assigned_to: payload.assigned_to,
            due_date: payload.due_date,
            estimated_hours: payload.estimated_hours,
        },
    )
    .await?;

    Ok(ApiResponse::ok("task updated", map_task(task)))
}

async fn delete_task(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Path(task_id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    let task = queries::get_task(&state.db, &task_id).await?;
    let relation = queries::task_relation(&state.db, &task, &actor.id).await?;
    if !access::can_delete_task(&actor, &relation) {
        return Err(AppError::Forbidden(
            "you cannot delete this task".to_string(),
        ));
    }

    queries::delete_task(&state.db, &task_id).await?;
    Ok(ApiResponse::message("task deleted"))
}

async fn task_stats(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<TaskStatsResponse>>> {
    let visibility = access::visibility(&actor);
    let stats = queries::task_stats(&state.db, &visibility).await?;

    Ok(ApiResponse::ok(
        "task statistics retrieved",
        TaskStatsResponse::from(stats),
    ))
}
