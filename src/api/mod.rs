pub mod analytics;
pub mod auth;
pub mod projects;
pub mod tasks;
pub mod tickets;
pub mod users;

use axum::http::StatusCode;
use axum::Json;
use axum::Router;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::access::CurrentUser;
use crate::db::models::{PriorityCount, StatusCount};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(users::router())
        .merge(projects::router())
        .merge(tasks::router())
        .merge(tickets::router())
        .merge(analytics::router())
}

#[derive(Debug, Serialize)]
pub struct HealthzResponse {
    pub status: &'static str,
}

pub async fn healthz() -> Json<HealthzResponse> {
    Json(HealthzResponse { status: "ok" })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: &str, data: T) -> Json<Self> {
        Json(Self::envelope(StatusCode::OK, message, Some(data)))
    }

    pub fn created(message: &str, data: T) -> (StatusCode, Json<Self>) {
        (
            StatusCode::CREATED,
            Json(Self::envelope(StatusCode::CREATED, message, Some(data))),
        )
    }

    fn envelope(status: StatusCode, message: &str, data: Option<T>) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            status_code: status.as_u16(),
            data,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: &str) -> Json<Self> {
        Json(Self::envelope(StatusCode::OK, message, None))
    }
}

#[derive(Debug, Serialize)]
pub struct StatusCountResponse {
    status: String,
    count: i64,
}

impl From<StatusCount> for StatusCountResponse {
    fn from(row: StatusCount) -> Self {
        Self {
            status: row.status,
            count: row.count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PriorityCountResponse {
    priority: String,
    count: i64,
}

impl From<PriorityCount> for PriorityCountResponse {
    fn from(row: PriorityCount) -> Self {
        Self {
            priority: row.priority,
            count: row.count,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListQuery {
    pub fn normalize(&self) -> AppResult<(i64, i64)> {
        normalize_list_query(self.limit, self.offset)
    }
}

pub(crate) fn normalize_list_query(limit: Option<i64>, offset: Option<i64>) -> AppResult<(i64, i64)> {
    let limit = limit.unwrap_or(50);
    let offset = offset.unwrap_or(0);

    if limit <= 0 {
        return Err(AppError::Validation(
            "limit must be greater than 0".to_string(),
        ));
    }

    if limit > 100 {
        return Err(AppError::Validation(
            "limit must be less than or equal to 100".to_string(),
        ));
    }

    if offset < 0 {
        return Err(AppError::Validation(
            "offset cannot be negative".to_string(),
        ));
    }

    Ok((limit, offset))
}

pub(crate) fn require_admin(actor: &CurrentUser) -> AppResult<()> {
    if actor.role.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "administrator access required".to_string(),
        ))
    }
}

pub(crate) fn require_moderator(actor: &CurrentUser) -> AppResult<()> {
    if actor.role.at_least_moderator() {
        Ok(())
    } else {
        Err(AppError::Forbidden("moderator access required".to_string()))
    }
}
