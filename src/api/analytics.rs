use axum::extract::{Extension, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::access::{self, CurrentUser};
use crate::api::{require_moderator, ApiResponse, StatusCountResponse};
use crate::db::models::{DashboardStats, Performer, TeamPerformance, TrendPoint};
use crate::db::queries;
use crate::error::AppResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/analytics/dashboard", get(dashboard))
        .route("/analytics/project-completion", get(project_completion))
        .route("/analytics/team-performance", get(team_performance))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyticsQuery {
    time_frame: Option<String>,
}

impl AnalyticsQuery {
    fn window_start(&self) -> AppResult<String> {
        queries::window_start(self.time_frame.as_deref().unwrap_or("30d"))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PerformerResponse {
    user_id: String,
    name: String,
    assigned: i64,
    completed: i64,
    completion_rate: i64,
}

impl From<Performer> for PerformerResponse {
    fn from(performer: Performer) -> Self {
        Self {
            user_id: performer.user_id,
            name: performer.name,
            assigned: performer.assigned,
            completed: performer.completed,
            completion_rate: performer.completion_rate,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardResponse {
    total_projects: i64,
    projects_by_status: Vec<StatusCountResponse>,
    total_tasks: i64,
    tasks_by_status: Vec<StatusCountResponse>,
    total_tickets: i64,
    tickets_by_status: Vec<StatusCountResponse>,
    average_project_progress: f64,
    average_ticket_time_spent: f64,
    top_performers: Vec<PerformerResponse>,
}

impl From<DashboardStats> for DashboardResponse {
    fn from(stats: DashboardStats) -> Self {
        Self {
            total_projects: stats.total_projects,
            projects_by_status: stats.projects_by_status.into_iter().map(Into::into).collect(),
            total_tasks: stats.total_tasks,
            tasks_by_status: stats.tasks_by_status.into_iter().map(Into::into).collect(),
            total_tickets: stats.total_tickets,
            tickets_by_status: stats.tickets_by_status.into_iter().map(Into::into).collect(),
            average_project_progress: stats.average_project_progress,
            average_ticket_time_spent: stats.average_ticket_time_spent,
            top_performers: stats.top_performers.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct TrendPointResponse {
    date: String,
    total: i64,
    completed: i64,
}

impl From<TrendPoint> for TrendPointResponse {
    fn from(point: TrendPoint) -> Self {
        Self {
            date: point.date,
            total: point.total,
            completed: point.completed,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TeamPerformanceResponse {
    user_id: String,
    name: String,
    total_tasks: i64,
    completed_tasks: i64,
    completion_rate: i64,
    estimated_hours: f64,
    actual_hours: f64,
    efficiency: i64,
}

impl From<TeamPerformance> for TeamPerformanceResponse {
    fn from(entry: TeamPerformance) -> Self {
        Self {
            user_id: entry.user_id,
            name: entry.name,
            total_tasks: entry.total_tasks,
            completed_tasks: entry.completed_tasks,
            completion_rate: entry.completion_rate,
            estimated_hours: entry.estimated_hours,
            actual_hours: entry.actual_hours,
            efficiency: entry.efficiency,
        }
    }
}

async fn dashboard(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Query(query): Query<AnalyticsQuery>,
) -> AppResult<Json<ApiResponse<DashboardResponse>>> {
    require_moderator(&actor)?;
    let window_start = query.window_start()?;
    let visibility = access::visibility(&actor);

    let stats = queries::dashboard_stats(&state.db, &visibility, &window_start).await?;
    Ok(ApiResponse::ok(
        "dashboard statistics retrieved",
        DashboardResponse::from(stats),
    ))
}

async fn project_completion(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Query(query): Query<AnalyticsQuery>,
) -> AppResult<Json<ApiResponse<Vec<TrendPointResponse>>>> {
    require_moderator(&actor)?;
    let window_start = query.window_start()?;
    let visibility = access::visibility(&actor);

    let trend = queries::project_completion_trend(&state.db, &visibility, &window_start).await?;
    let trend = trend.into_iter().map(Into::into).collect();

    Ok(ApiResponse::ok("project completion trend retrieved", trend))
}

async fn team_performance(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Query(query): Query<AnalyticsQuery>,
) -> AppResult<Json<ApiResponse<Vec<TeamPerformanceResponse>>>> {
    require_moderator(&actor)?;
    let window_start = query.window_start()?;
    let visibility = access::visibility(&actor);

    let entries = queries::team_performance(&state.db, &visibility, &window_start).await?;
    let entries = entries.into_iter().map(Into::into).collect();

    Ok(ApiResponse::ok("team performance retrieved", entries))
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use serde_json::{json, Value};

    use crate::access::Role;
    use crate::api::testing::TestApp;

    #[tokio::test]
    async fn analytics_require_a_moderator_and_a_known_time_frame() {
        let app = TestApp::spawn("analytics-gate").await;
        let (_, user_token) = app.seed_user("Plain User", Role::User).await;
        let (_, moderator_token) = app.seed_user("Moderator", Role::Moderator).await;

        let denied = app
            .client
            .get(app.url("/api/analytics/dashboard"))
            .bearer_auth(&user_token)
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);

        let bad_window = app
            .client
            .get(app.url("/api/analytics/dashboard?timeFrame=2w"))
            .bearer_auth(&moderator_token)
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(bad_window.status(), StatusCode::BAD_REQUEST);

        let empty = app
            .client
            .get(app.url("/api/analytics/dashboard?timeFrame=7d"))
            .bearer_auth(&moderator_token)
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(empty.status(), StatusCode::OK);

        let body: Value = empty.json().await.expect("body should parse");
        assert_eq!(body["data"]["totalProjects"], 0);
        assert_eq!(body["data"]["totalTasks"], 0);
        assert_eq!(body["data"]["totalTickets"], 0);
        assert_eq!(body["data"]["averageProjectProgress"], 0.0);
        assert!(body["data"]["topPerformers"]
            .as_array()
            .expect("top performers should be an array")
            .is_empty());
        let by_status = body["data"]["projectsByStatus"]
            .as_array()
            .expect("projects by status should be an array");
        assert_eq!(by_status.len(), 3);
        assert!(by_status.iter().all(|row| row["count"] == 0));
    }

    #[tokio::test]
    async fn dashboard_aggregates_reflect_scoped_activity() {
        let app = TestApp::spawn("analytics-dashboard").await;
        let (_, moderator_token) = app.seed_user("Moderator", Role::Moderator).await;
        let (_, outside_mod_token) = app.seed_user("Outside Mod", Role::Moderator).await;
        let (alice, alice_token) = app.seed_user("Alice", Role::User).await;

        let project = app
            .client
            .post(app.url("/api/projects"))
            .bearer_auth(&moderator_token)
            .json(&json!({"title": "Analytics Fixture", "teamMembers": [{"userId": alice.id}]}))
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(project.status(), StatusCode::CREATED);
        let body: Value = project.json().await.expect("body should parse");
        let project_id = body["data"]["id"]
            .as_str()
            .expect("project id should be present")
            .to_string();

        let task = app
            .client
            .post(app.url("/api/tasks"))
            .bearer_auth(&moderator_token)
            .json(&json!({
                "projectId": project_id,
                "title": "Instrument the worker",
                "assignedTo": alice.id,
                "estimatedHours": 4.0,
            }))
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(task.status(), StatusCode::CREATED);
        let body: Value = task.json().await.expect("body should parse");
        let task_id = body["data"]["id"]
            .as_str()
            .expect("task id should be present")
            .to_string();

        let ticket = app
            .client
            .post(app.url("/api/tickets"))
            .bearer_auth(&alice_token)
            .json(&json!({
                "taskId": task_id,
                "title": "Counters wired up",
                "resolution": "fixed",
                "timeSpent": 2.0,
            }))
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(ticket.status(), StatusCode::CREATED);

        let dashboard = app
            .client
            .get(app.url("/api/analytics/dashboard"))
            .bearer_auth(&moderator_token)
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(dashboard.status(), StatusCode::OK);

        let body: Value = dashboard.json().await.expect("body should parse");
        assert_eq!(body["data"]["totalProjects"], 1);
        assert_eq!(body["data"]["totalTasks"], 1);
        assert_eq!(body["data"]["totalTickets"], 1);
        assert_eq!(body["data"]["averageTicketTimeSpent"], 2.0);

        let foreign = app
            .client
            .get(app.url("/api/analytics/dashboard"))
            .bearer_auth(&outside_mod_token)
            .send()
            .await
            .expect("request should succeed");
        let body: Value = foreign.json().await.expect("body should parse");
        assert_eq!(body["data"]["totalProjects"], 0);
        assert_eq!(body["data"]["totalTasks"], 0);
        assert_eq!(body["data"]["totalTickets"], 0);

        let trend = app
            .client
            .get(app.url("/api/analytics/project-completion"))
            .bearer_auth(&moderator_token)
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(trend.status(), StatusCode::OK);
        let body: Value = trend.json().await.expect("body should parse");
        let points = body["data"].as_array().expect("data should be an array");
        assert_eq!(points.len(), 31);
        let totals: i64 = points
            .iter()
            .map(|point| point["total"].as_i64().unwrap_or(0))
            .sum();
        let completed: i64 = points
            .iter()
            .map(|point| point["completed"].as_i64().unwrap_or(0))
            .sum();
        assert_eq!(totals, 1);
        assert_eq!(completed, 0);

        let performance = app
            .client
            .get(app.url("/api/analytics/team-performance"))
            .bearer_auth(&moderator_token)
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(performance.status(), StatusCode::OK);
        let body: Value = performance.json().await.expect("body should parse");
        let rows = body["data"].as_array().expect("data should be an array");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "Alice");
        assert_eq!(rows[0]["totalTasks"], 1);
        assert_eq!(rows[0]["actualHours"], 2.0);
    }
}
