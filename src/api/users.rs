use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::access::{self, CurrentUser, Role};
use crate::api::{require_admin, ApiResponse, ListQuery};
use crate::db::models::{UserRecord, UserStats};
use crate::db::queries;
use crate::error::{AppError, AppResult};
use crate::password;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/stats", get(user_stats))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(deactivate_user),
        )
        .route("/users/{id}/role", put(change_role))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub fn map_user(user: UserRecord) -> UserResponse {
    UserResponse {
        id: user.id,
        name: user.name,
        email: user.email,
        role: user.role,
        is_active: user.is_active == 1,
        last_login: user.last_login,
        created_at: user.created_at,
        updated_at: user.updated_at,
    }
}

#[derive(Debug, Serialize)]
struct UserStatsResponse {
    total: i64,
    active: i64,
    admins: i64,
    moderators: i64,
    users: i64,
}

impl From<UserStats> for UserStatsResponse {
    fn from(stats: UserStats) -> Self {
        Self {
            total: stats.total,
            active: stats.active,
            admins: stats.admins,
            moderators: stats.moderators,
            users: stats.users,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateUserRequest {
    name: String,
    email: String,
    password: String,
    role: String,
}

#[derive(Debug, Deserialize)]
struct UpdateUserRequest {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChangeRoleRequest {
    role: String,
}

async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<Vec<UserResponse>>>> {
    let (limit, offset) = query.normalize()?;
    let users = queries::list_users(&state.db, limit, offset).await?;
    let users = users.into_iter().map(map_user).collect();

    Ok(ApiResponse::ok("users retrieved", users))
}

async fn create_user(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Json(payload): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<UserResponse>>)> {
    require_admin(&actor)?;

    let role = Role::parse(&payload.role)?;
    queries::validate_password(&payload.password)?;
    let password_hash = password::hash_password(&payload.password)?;

    let user = queries::create_user(
        &state.db,
        queries::NewUserInput {
            name: payload.name,
            email: payload.email,
            password_hash,
            role,
        },
    )
    .await?;

    Ok(ApiResponse::created("user created", map_user(user)))
}

async fn get_user(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Path(user_id): Path<String>,
) -> AppResult<Json<ApiResponse<UserResponse>>> {
    if !access::can_view_user(&actor, &user_id) {
        return Err(AppError::Forbidden("you cannot view this user".to_string()));
    }

    let user = queries::get_user(&state.db, &user_id).await?;
    Ok(ApiResponse::ok("user retrieved", map_user(user)))
}

async fn update_user(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Path(user_id): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<ApiResponse<UserResponse>>> {
    if payload.name.is_none() && payload.email.is_none() && payload.password.is_none() {
        return Err(AppError::Validation(
            "at least one field must be provided".to_string(),
        ));
    }

    let target = queries::get_user(&state.db, &user_id).await?;
    if !access::can_edit_user(&actor, &user_id, Role::parse(&target.role)?) {
        return Err(AppError::Forbidden(
            "you cannot modify this user".to_string(),
        ));
    }

    let password_hash = match payload.password {
        Some(raw) => {
            queries::validate_password(&raw)?;
            Some(password::hash_password(&raw)?)
        }
        None => None,
    };

    let user = queries::update_user(
        &state.db,
        &user_id,
        queries::UpdateUserInput {
            name: payload.name,
            email: payload.email,
            password_hash,
        },
    )
    .await?;

    Ok(ApiResponse::ok("user updated", map_user(user)))
}

async fn deactivate_user(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Path(user_id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    require_admin(&actor)?;

    if actor.id == user_id {
        return Err(AppError::Validation(
            "you cannot deactivate your own account".to_string(),
        ));
    }

    queries::deactivate_user(&state.db, &user_id).await?;
    Ok(ApiResponse::message("user deactivated"))
}

async fn change_role(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Path(user_id): Path<String>,
    Json(payload): Json<ChangeRoleRequest>,
) -> AppResult<Json<ApiResponse<UserResponse>>> {
    require_admin(&actor)?;

    if actor.id == user_id {
        return Err(AppError::Validation(
            "you cannot change your own role".to_string(),
        ));
    }

    let role = Role::parse(&payload.role)?;
    let user = queries::set_user_role(&state.db, &user_id, role).await?;

    Ok(ApiResponse::ok("user role updated", map_user(user)))
}

async fn user_stats(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<UserStatsResponse>>> {
    require_admin(&actor)?;

    let stats = queries::user_stats(&state.db).await?;
    Ok(ApiResponse::ok(
        "user statistics retrieved",
        UserStatsResponse::from(stats),
    ))
}
