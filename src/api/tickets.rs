use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::access::{self, CurrentUser};
use crate::api::{
    normalize_list_query, require_moderator, ApiResponse, StatusCountResponse,
};
use crate::db::models::{TicketListRow, TicketRecord, TicketStats};
use crate::db::queries;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::workflow::VerifyOutcome;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tickets", get(list_tickets).post(create_ticket))
        .route("/tickets/stats", get(ticket_stats))
        .route(
            "/tickets/{id}",
            get(get_ticket).put(update_ticket).delete(delete_ticket),
        )
        .route("/tickets/{id}/verify", put(verify_ticket))
        .route("/tickets/{id}/close", put(close_ticket))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketResponse {
    id: String,
    task_id: String,
    title: String,
    description: String,
    resolved_by: String,
    verified_by: Option<String>,
    status: String,
    resolution: Option<String>,
    notes: String,
    verification_notes: Option<String>,
    time_spent: f64,
    resolved_at: String,
    verified_at: Option<String>,
    closed_at: Option<String>,
    created_at: String,
    updated_at: String,
}

pub fn map_ticket(ticket: TicketRecord) -> TicketResponse {
    TicketResponse {
        id: ticket.id,
        task_id: ticket.task_id,
        title: ticket.title,
        description: ticket.description,
        resolved_by: ticket.resolved_by,
        verified_by: ticket.verified_by,
        status: ticket.status,
        resolution: ticket.resolution,
        notes: ticket.notes,
        verification_notes: ticket.verification_notes,
        time_spent: ticket.time_spent,
        resolved_at: ticket.resolved_at,
        verified_at: ticket.verified_at,
        closed_at: ticket.closed_at,
        created_at: ticket.created_at,
        updated_at: ticket.updated_at,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TicketSummaryResponse {
    id: String,
    task_id: String,
    task_title: String,
    title: String,
    description: String,
    resolved_by: String,
    resolved_by_name: String,
    verified_by: Option<String>,
    status: String,
    resolution: Option<String>,
    time_spent: f64,
    resolved_at: String,
    verified_at: Option<String>,
    closed_at: Option<String>,
    created_at: String,
    updated_at: String,
}

fn map_ticket_summary(row: TicketListRow) -> TicketSummaryResponse {
    TicketSummaryResponse {
        id: row.id,
        task_id: row.task_id,
        task_title: row.task_title,
        title: row.title,
        description: row.description,
        resolved_by: row.resolved_by,
        resolved_by_name: row.resolved_by_name,
        verified_by: row.verified_by,
        status: row.status,
        resolution: row.resolution,
        time_spent: row.time_spent,
        resolved_at: row.resolved_at,
        verified_at: row.verified_at,
        closed_at: row.closed_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TicketStatsResponse {
    total: i64,
    by_status: Vec<StatusCountResponse>,
    average_time_spent: f64,
}

impl From<TicketStats> for TicketStatsResponse {
    fn from(stats: TicketStats) -> Self {
        Self {
            total: stats.total,
            by_status: stats.by_status.into_iter().map(Into::into).collect(),
            average_time_spent: stats.average_time_spent,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTicketRequest {
    task_id: String,
    title: String,
    description: Option<String>,
    resolution: String,
    notes: Option<String>,
    time_spent: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateTicketRequest {
    title: Option<String>,
    description: Option<String>,
    resolution: Option<String>,
    notes: Option<String>,
    time_spent: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyTicketRequest {
    status: String,
    verification_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CloseTicketRequest {
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TicketListQuery {
    limit: Option<i64>,
    offset: Option<i64>,
    status: Option<String>,
    task_id: Option<String>,
}

async fn list_tickets(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Query(query): Query<TicketListQuery>,
) -> AppResult<Json<ApiResponse<Vec<TicketSummaryResponse>>>> {
    let (limit, offset) = normalize_list_query(query.limit, query.offset)?;
    let visibility = access::visibility(&actor);

    let filters = queries::TicketFilters {
        status: query.status,
        task_id: query.task_id,
    };
    let tickets = queries::list_tickets(&state.db, &visibility, filters, limit, offset).await?;
    let tickets = tickets.into_iter().map(map_ticket_summary).collect();

    Ok(ApiResponse::ok("tickets retrieved", tickets))
}

async fn create_ticket(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Json(payload): Json<CreateTicketRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<TicketResponse>>)> {
    let task = queries::get_task(&state.db, &payload.task_id).await?;
    let relation = queries::task_relation(&state.db, &task, &actor.id).await?;
    if !access::can_read_task(&actor, &relation) {
        return Err(AppError::Forbidden(
            "you cannot resolve this task".to_string(),
        ));
    }

    let ticket = queries::create_ticket(
        &state.db,
        queries::NewTicketInput {
            task_id: payload.task_id,
            title: payload.title,
            description: payload.description.unwrap_or_default(),
            resolution: payload.resolution,
            notes: payload.notes.unwrap_or_default(),
            time_spent: payload.time_spent.unwrap_or(0.0),
            resolved_by: actor.id.clone(),
        },
    )
    .await?;

    Ok(ApiResponse::created("ticket created", map_ticket(ticket)))
}

async fn get_ticket(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Path(ticket_id): Path<String>,
) -> AppResult<Json<ApiResponse<TicketResponse>>> {
    let ticket = queries::get_ticket(&state.db, &ticket_id).await?;
    let task = queries::get_task(&state.db, &ticket.task_id).await?;
    let relation = queries::task_relation(&state.db, &task, &actor.id).await?;
    if !access::can_read_ticket(&actor, &ticket.resolved_by, &relation) {
        return Err(AppError::Forbidden(
            "you cannot view this ticket".to_string(),
        ));
    }

    Ok(ApiResponse::ok("ticket retrieved", map_ticket(ticket)))
}

async fn update_ticket(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Path(ticket_id): Path<String>,
    Json(payload): Json<UpdateTicketRequest>,
) -> AppResult<Json<ApiResponse<TicketResponse>>> {
    if payload.title.is_none()
        && payload.description.is_none()
        && payload.resolution.is_none()
        && payload.notes.is_none()
        && payload.time_spent.is_none()
    {
        return Err(AppError::Validation(
            "at least one field must be provided".to_string(),
        ));
    }

    let ticket = queries::get_ticket(&state.db, &ticket_id).await?;
    let task = queries::get_task(&state.db, &ticket.task_id).await?;
    let relation = queries::task_relation(&state.db, &task, &actor.id).await?;
    if !access::can_update_ticket(&actor, &ticket.resolved_by, &relation) {
        return Err(AppError::Forbidden(
            "you cannot modify this ticket".to_string(),
        ));
    }

    let ticket = queries::update_ticket(
        &state.db,
        &ticket_id,
        queries::UpdateTicketInput {
            title: payload.title,
            description: payload.description,
            resolution: payload.resolution,
            notes: payload.notes,
            time_spent: payload.time_spent,
        },
    )
    .await?;

    Ok(ApiResponse::ok("ticket updated", map_ticket(ticket)))
}

async fn verify_ticket(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Path(ticket_id): Path<String>,
    Json(payload): Json<VerifyTicketRequest>,
) -> AppResult<Json<ApiResponse<TicketResponse>>> {
    require_moderator(&actor)?;
    let outcome = VerifyOutcome::parse(&payload.status)?;

    let ticket = queries::get_ticket(&state.db, &ticket_id).await?;
    let task = queries::get_task(&state.db, &ticket.task_id).await?;
    let relation = queries::task_relation(&state.db, &task, &actor.id).await?;
    if !access::can_verify_ticket(&actor, &relation) {
        return Err(AppError::Forbidden(
            "you cannot verify tickets for this project".to_string(),
        ));
    }

    let ticket = queries::verify_ticket(
        &state.db,
        &ticket_id,
        outcome,
        payload.verification_notes,
        &actor.id,
    )
    .await?;

    let message = match outcome {
        VerifyOutcome::Verified => "ticket verified",
        VerifyOutcome::Rejected => "ticket rejected",
    };
    Ok(ApiResponse::ok(message, map_ticket(ticket)))
}

async fn close_ticket(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Path(ticket_id): Path<String>,
    Json(payload): Json<CloseTicketRequest>,
) -> AppResult<Json<ApiResponse<TicketResponse>>> {
    require_moderator(&actor)?;

    let ticket = queries::get_ticket(&state.db, &ticket_id).await?;
    let task = queries::get_task(&state.db, &ticket.task_id).await?;
    let relation = queries::task_relation(&state.db, &task, &actor.id).await?;
    if !access::can_verify_ticket(&actor, &relation) {
        return Err(AppError::Forbidden(
            "you cannot verify tickets for this project".to_string(),
        ));
    }

    let ticket = queries::close_ticket(&state.db, &ticket_id, payload.notes).await?;
    Ok(ApiResponse::ok("ticket closed", map_ticket(ticket)))
}

async fn delete_ticket(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Path(ticket_id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    let ticket = queries::get_ticket(&state.db, &ticket_id).await?;
    let task = queries::get_task(&state.db, &ticket.task_id).await?;
    let relation = queries::task_relation(&state.db, &task, &actor.id).await?;
    if !access::can_delete_ticket(&actor, &ticket.resolved_by, &relation) {
        return Err(AppError::Forbidden(
            "you cannot delete this ticket".to_string(),
        ));
    }

    queries::delete_ticket(&state.db, &ticket_id).await?;
    Ok(ApiResponse::message("ticket deleted"))
}

async fn ticket_stats(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<TicketStatsResponse>>> {
    let visibility = access::visibility(&actor);
    let stats = queries::ticket_stats(&state.db, &visibility).await?;

    Ok(ApiResponse::ok(
        "ticket statistics retrieved",
        TicketStatsResponse::from(stats),
    ))
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use serde_json::{json, Value};

    use crate::access::Role;
    use crate::api::testing::TestApp;

    async fn create_project(app: &TestApp, token: &str, member_ids: &[&str]) -> String {
        let members: Vec<Value> = member_ids
            .iter()
            .map(|id| json!({"userId": id}))
            .collect();
        let response = app
            .client
            .post(app.url("/api/projects"))
            .bearer_auth(token)
            .json(&json!({"title": "Support Queue", "teamMembers": members}))
            .send()
            .await
            .expect("project creation request should succeed");
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.expect("body should parse");
        body["data"]["id"]
            .as_str()
            .expect("project id should be present")
            .to_string()
    }

    async fn create_task(app: &TestApp, token: &str, project_id: &str, assigned_to: &str) -> String {
        let response = app
            .client
            .post(app.url("/api/tasks"))
            .bearer_auth(token)
            .json(&json!({
                "projectId": project_id,
                "title": "Memory leak in importer",
                "assignedTo": assigned_to,
            }))
            .send()
            .await
            .expect("task creation request should succeed");
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.expect("body should parse");
        body["data"]["id"]
            .as_str()
            .expect("task id should be present")
            .to_string()
    }

    async fn fetch_task(app: &TestApp, token: &str, task_id: &str) -> Value {
        let response = app
            .client
            .get(app.url(&format!("/api/tasks/{task_id}")))
            .bearer_auth(token)
            .send()
            .await
            .expect("task fetch request should succeed");
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.expect("body should parse");
        body["data"].clone()
    }

    async fn resolve_task(app: &TestApp, token: &str, task_id: &str, time_spent: f64) -> Value {
        let response = app
            .client
            .post(app.url("/api/tickets"))
            .bearer_auth(token)
            .json(&json!({
                "taskId": task_id,
                "title": "Plugged the leak",
                "resolution": "fixed",
                "timeSpent": time_spent,
            }))
            .send()
            .await
            .expect("ticket creation request should succeed");
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.expect("body should parse");
        body["data"].clone()
    }

    #[tokio::test]
    async fn resolution_verification_and_closure_cascade_to_the_task() {
        let app = TestApp::spawn("tickets-lifecycle").await;
        let (moderator, moderator_token) = app.seed_user("Moderator", Role::Moderator).await;
        let (alice, alice_token) = app.seed_user("Alice", Role::User).await;

        let project_id = create_project(&app, &moderator_token, &[&alice.id]).await;
        let task_id = create_task(&app, &moderator_token, &project_id, &alice.id).await;

        let ticket = resolve_task(&app, &alice_token, &task_id, 2.0).await;
        let ticket_id = ticket["id"].as_str().expect("ticket id should be present");
        assert_eq!(ticket["status"], "pending");
        assert_eq!(ticket["resolvedBy"], alice.id.as_str());
        assert!(ticket["resolvedAt"].is_string());

        let task = fetch_task(&app, &alice_token, &task_id).await;
        assert_eq!(task["status"], "resolved");
        assert_eq!(task["actualHours"], 2.0);
        assert_eq!(task["ticketId"], ticket_id);
        assert!(task["completedDate"].is_string());

        let duplicate = app
            .client
            .post(app.url("/api/tickets"))
            .bearer_auth(&alice_token)
            .json(&json!({
                "taskId": task_id,
                "title": "Second opinion",
                "resolution": "fixed",
            }))
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);

        let user_verify = app
            .client
            .put(app.url(&format!("/api/tickets/{ticket_id}/verify")))
            .bearer_auth(&alice_token)
            .json(&json!({"status": "verified"}))
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(user_verify.status(), StatusCode::FORBIDDEN);

        let verified = app
            .client
            .put(app.url(&format!("/api/tickets/{ticket_id}/verify")))
            .bearer_auth(&moderator_token)
            .json(&json!({"status": "verified", "verificationNotes": "looks solid"}))
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(verified.status(), StatusCode::OK);

        let body: Value = verified.json().await.expect("body should parse");
        assert_eq!(body["message"], "ticket verified");
        assert_eq!(body["data"]["status"], "verified");
        assert_eq!(body["data"]["verifiedBy"], moderator.id.as_str());
        assert!(body["data"]["verifiedAt"].is_string());
        assert_eq!(body["data"]["verificationNotes"], "looks solid");

        let task = fetch_task(&app, &alice_token, &task_id).await;
        assert_eq!(task["status"], "closed");

        let reverify = app
            .client
            .put(app.url(&format!("/api/tickets/{ticket_id}/verify")))
            .bearer_auth(&moderator_token)
            .json(&json!({"status": "verified"}))
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(reverify.status(), StatusCode::BAD_REQUEST);

        let closed = app
            .client
            .put(app.url(&format!("/api/tickets/{ticket_id}/close")))
            .bearer_auth(&moderator_token)
            .json(&json!({"notes": "archived after release"}))
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(closed.status(), StatusCode::OK);

        let body: Value = closed.json().await.expect("body should parse");
        assert_eq!(body["data"]["status"], "closed");
        assert!(body["data"]["closedAt"].is_string());

        let late_edit = app
            .client
            .put(app.url(&format!("/api/tickets/{ticket_id}")))
            .bearer_auth(&alice_token)
            .json(&json!({"notes": "too late"}))
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(late_edit.status(), StatusCode::BAD_REQUEST);

        let late_delete = app
            .client
            .delete(app.url(&format!("/api/tickets/{ticket_id}")))
            .bearer_auth(&moderator_token)
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(late_delete.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rejection_reopens_the_task_for_another_attempt() {
        let app = TestApp::spawn("tickets-rejection").await;
        let (_, moderator_token) = app.seed_user("Moderator", Role::Moderator).await;
        let (alice, alice_token) = app.seed_user("Alice", Role::User).await;

        let project_id = create_project(&app, &moderator_token, &[&alice.id]).await;
        let task_id = create_task(&app, &moderator_token, &project_id, &alice.id).await;

        let first = resolve_task(&app, &alice_token, &task_id, 2.0).await;
        let first_id = first["id"].as_str().expect("ticket id should be present");

        let rejected = app
            .client
            .put(app.url(&format!("/api/tickets/{first_id}/verify")))
            .bearer_auth(&moderator_token)
            .json(&json!({"status": "rejected", "verificationNotes": "tests missing"}))
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(rejected.status(), StatusCode::OK);

        let body: Value = rejected.json().await.expect("body should parse");
        assert_eq!(body["message"], "ticket rejected");
        assert_eq!(body["data"]["status"], "rejected");

        let task = fetch_task(&app, &alice_token, &task_id).await;
        assert_eq!(task["status"], "in-progress");
        assert!(task["completedDate"].is_null());

        let second = resolve_task(&app, &alice_token, &task_id, 1.5).await;
        let second_id = second["id"].as_str().expect("ticket id should be present");

        let task = fetch_task(&app, &alice_token, &task_id).await;
        assert_eq!(task["status"], "resolved");
        assert_eq!(task["actualHours"], 3.5);
        assert_eq!(task["ticketId"], second_id);

        let removed = app
            .client
            .delete(app.url(&format!("/api/tickets/{first_id}")))
            .bearer_auth(&alice_token)
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(removed.status(), StatusCode::OK);

        let task = fetch_task(&app, &alice_token, &task_id).await;
        assert_eq!(task["status"], "resolved");
        assert_eq!(task["actualHours"], 1.5);
        assert_eq!(task["ticketId"], second_id);

        let tickets_on_task = fetch_task(&app, &alice_token, &task_id).await;
        let embedded = tickets_on_task["tickets"]
            .as_array()
            .expect("tickets should be an array");
        assert_eq!(embedded.len(), 1);
    }

    #[tokio::test]
    async fn creation_requires_task_access_and_a_known_resolution() {
        let app = TestApp::spawn("tickets-create-gate").await;
        let (_, moderator_token) = app.seed_user("Moderator", Role::Moderator).await;
        let (alice, alice_token) = app.seed_user("Alice", Role::User).await;
        let (_, bob_token) = app.seed_user("Bob", Role::User).await;

        let project_id = create_project(&app, &moderator_token, &[&alice.id]).await;
        let task_id = create_task(&app, &moderator_token, &project_id, &alice.id).await;

        let outsider = app
            .client
            .post(app.url("/api/tickets"))
            .bearer_auth(&bob_token)
            .json(&json!({
                "taskId": task_id,
                "title": "Not my task",
                "resolution": "fixed",
            }))
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(outsider.status(), StatusCode::FORBIDDEN);

        let bad_resolution = app
            .client
            .post(app.url("/api/tickets"))
            .bearer_auth(&alice_token)
            .json(&json!({
                "taskId": task_id,
                "title": "Done somehow",
                "resolution": "solved",
            }))
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(bad_resolution.status(), StatusCode::BAD_REQUEST);

        let negative_time = app
            .client
            .post(app.url("/api/tickets"))
            .bearer_auth(&alice_token)
            .json(&json!({
                "taskId": task_id,
                "title": "Time travel",
                "resolution": "fixed",
                "timeSpent": -1.0,
            }))
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(negative_time.status(), StatusCode::BAD_REQUEST);

        let unknown_task = app
            .client
            .post(app.url("/api/tickets"))
            .bearer_auth(&alice_token)
            .json(&json!({
                "taskId": "not-a-task",
                "title": "Lost work",
                "resolution": "fixed",
            }))
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(unknown_task.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn verification_is_scoped_to_the_projects_moderators() {
        let app = TestApp::spawn("tickets-verify-scope").await;
        let (_, admin_token) = app.seed_user("Admin", Role::Admin).await;
        let (_, creator_token) = app.seed_user("Creator", Role::Moderator).await;
        let (_, outside_mod_token) = app.seed_user("Outside Mod", Role::Moderator).await;
        let (alice, alice_token) = app.seed_user("Alice", Role::User).await;

        let project_id = create_project(&app, &creator_token, &[&alice.id]).await;
        let task_id = create_task(&app, &creator_token, &project_id, &alice.id).await;

        let ticket = resolve_task(&app, &alice_token, &task_id, 1.0).await;
        let ticket_id = ticket["id"].as_str().expect("ticket id should be present");

        let unrelated = app
            .client
            .put(app.url(&format!("/api/tickets/{ticket_id}/verify")))
            .bearer_auth(&outside_mod_token)
            .json(&json!({"status": "verified"}))
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(unrelated.status(), StatusCode::FORBIDDEN);

        let invalid_outcome = app
            .client
            .put(app.url(&format!("/api/tickets/{ticket_id}/verify")))
            .bearer_auth(&admin_token)
            .json(&json!({"status": "approved"}))
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(invalid_outcome.status(), StatusCode::BAD_REQUEST);

        let admin_verify = app
            .client
            .put(app.url(&format!("/api/tickets/{ticket_id}/verify")))
            .bearer_auth(&admin_token)
            .json(&json!({"status": "verified"}))
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(admin_verify.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn pending_edits_sync_task_hours_and_visibility_is_scoped() {
        let app = TestApp::spawn("tickets-edit").await;
        let (_, moderator_token) = app.seed_user("Moderator", Role::Moderator).await;
        let (alice, alice_token) = app.seed_user("Alice", Role::User).await;
        let (_, bob_token) = app.seed_user("Bob", Role::User).await;

        let project_id = create_project(&app, &moderator_token, &[&alice.id]).await;
        let task_id = create_task(&app, &moderator_token, &project_id, &alice.id).await;

        let ticket = resolve_task(&app, &alice_token, &task_id, 2.0).await;
        let ticket_id = ticket["id"].as_str().expect("ticket id should be present");

        let empty = app
            .client
            .put(app.url(&format!("/api/tickets/{ticket_id}")))
            .bearer_auth(&alice_token)
            .json(&json!({}))
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

        let updated = app
            .client
            .put(app.url(&format!("/api/tickets/{ticket_id}")))
            .bearer_auth(&alice_token)
            .json(&json!({"timeSpent": 3.5, "notes": "profiling took longer"}))
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(updated.status(), StatusCode::OK);

        let body: Value = updated.json().await.expect("body should parse");
        assert_eq!(body["data"]["timeSpent"], 3.5);
        assert_eq!(body["data"]["notes"], "profiling took longer");

        let task = fetch_task(&app, &alice_token, &task_id).await;
        assert_eq!(task["actualHours"], 3.5);

        let hidden = app
            .client
            .get(app.url(&format!("/api/tickets/{ticket_id}")))
            .bearer_auth(&bob_token)
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(hidden.status(), StatusCode::FORBIDDEN);

        let bob_list = app
            .client
            .get(app.url("/api/tickets"))
            .bearer_auth(&bob_token)
            .send()
            .await
            .expect("request should succeed");
        let body: Value = bob_list.json().await.expect("body should parse");
        assert!(body["data"]
            .as_array()
            .expect("data should be an array")
            .is_empty());

        let alice_list = app
            .client
            .get(app.url("/api/tickets"))
            .bearer_auth(&alice_token)
            .send()
            .await
            .expect("request should succeed");
        let body: Value = alice_list.json().await.expect("body should parse");
        let rows = body["data"].as_array().expect("data should be an array");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["taskTitle"], "Memory leak in importer");
        assert_eq!(rows[0]["resolvedByName"], "Alice");

        let stats = app
            .client
            .get(app.url("/api/tickets/stats"))
            .bearer_auth(&alice_token)
            .send()
            .await
            .expect("request should succeed");
        let body: Value = stats.json().await.expect("body should parse");
        assert_eq!(body["data"]["total"], 1);
        assert_eq!(body["data"]["averageTimeSpent"], 3.5);
    }
}
