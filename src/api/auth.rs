use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};

use crate::access::{CurrentUser, Role};
use crate::api::users::{map_user, UserResponse};
use crate::api::ApiResponse;
use crate::db::models::UserRecord;
use crate::db::queries;
use crate::error::{AppError, AppResult};
use crate::password;
use crate::state::AppState;
use crate::token;

const PUBLIC_PATHS: [&str; 4] = [
    "/healthz",
    "/api/auth/register",
    "/api/auth/login",
    "/api/auth/refresh",
];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/verify", get(verify))
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> AppResult<Response> {
    if PUBLIC_PATHS.contains(&request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let bearer = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer_token)
        .ok_or_else(|| AppError::Authentication("missing bearer token".to_string()))?;

    let claims = token::decode_access_token(bearer, &state.config)?;

    let user = match queries::get_user(&state.db, &claims.sub).await {
        Ok(user) => user,
        Err(AppError::NotFound(_)) => {
            return Err(AppError::Authentication(
                "account no longer exists".to_string(),
            ))
        }
        Err(error) => return Err(error),
    };
    if user.is_active != 1 {
        return Err(AppError::Authentication(
            "account is deactivated".to_string(),
        ));
    }

    let actor = CurrentUser {
        role: Role::parse(&user.role)?,
        id: user.id,
        name: user.name,
        email: user.email,
    };
    request.extensions_mut().insert(actor);

    Ok(next.run(request).await)
}

fn parse_bearer_token(value: &str) -> Option<&str> {
    let mut parts = value.splitn(2, ' ');
    let scheme = parts.next()?;
    let token = parts.next()?.trim();

    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    if token.is_empty() {
        return None;
    }

    Some(token)
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    name: String,
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogoutRequest {
    refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    user: UserResponse,
    access_token: String,
    refresh_token: String,
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AuthResponse>>)> {
    queries::validate_password(&payload.password)?;
    let password_hash = password::hash_password(&payload.password)?;

    let user = queries::create_user(
        &state.db,
        queries::NewUserInput {
            name: payload.name,
            email: payload.email,
            password_hash,
            role: Role::User,
        },
    )
    .await?;

    let payload = issue_tokens(&state, user).await?;
    Ok(ApiResponse::created("user registered", payload))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<AuthResponse>>> {
    let user = queries::get_user_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| AppError::Authentication("invalid credentials".to_string()))?;

    if user.is_active != 1 {
        return Err(AppError::Authentication(
            "account is deactivated".to_string(),
        ));
    }

    if !password::verify_password(&payload.password, &user.password_hash)? {
        return Err(AppError::Authentication("invalid credentials".to_string()));
    }

    queries::touch_last_login(&state.db, &user.id).await?;
    let user = queries::get_user(&state.db, &user.id).await?;

    let payload = issue_tokens(&state, user).await?;
    Ok(ApiResponse::ok("login successful", payload))
}

async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<ApiResponse<AuthResponse>>> {
    let session = queries::consume_session(
        &state.db,
        &token::hash_refresh_token(&payload.refresh_token),
    )
    .await?
    .ok_or_else(|| AppError::Authentication("refresh token is invalid or expired".to_string()))?;

    let user = queries::get_user(&state.db, &session.user_id).await?;
    if user.is_active != 1 {
        return Err(AppError::Authentication(
            "account is deactivated".to_string(),
        ));
    }

    let payload = issue_tokens(&state, user).await?;
    Ok(ApiResponse::ok("token refreshed", payload))
}

async fn logout(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Json(payload): Json<LogoutRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    match payload.refresh_token {
        Some(raw) => {
            queries::delete_session_by_hash(&state.db, &token::hash_refresh_token(&raw)).await?;
        }
        None => {
            queries::delete_user_sessions(&state.db, &actor.id).await?;
        }
    }

    Ok(ApiResponse::message("logged out"))
}

async fn verify(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<UserResponse>>> {
    let user = queries::get_user(&state.db, &actor.id).await?;
    Ok(ApiResponse::ok("token is valid", map_user(user)))
}

async fn issue_tokens(state: &AppState, user: UserRecord) -> AppResult<AuthResponse> {
    let role = Role::parse(&user.role)?;
    let access_token = token::issue_access_token(&user.id, role, &state.config)?;

    let refresh_token = token::generate_refresh_token();
    queries::create_session(
        &state.db,
        &user.id,
        &token::hash_refresh_token(&refresh_token),
        state.config.refresh_token_ttl_secs,
    )
    .await?;

    Ok(AuthResponse {
        user: map_user(user),
        access_token,
        refresh_token,
    })
}
