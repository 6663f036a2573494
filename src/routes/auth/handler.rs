use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    error::AppError,
    middleware::AuthUser,
    permissions::require,
    utils::{generate_token, success_to_api_response},
};

use super::model::{LoginRequest, LoginResponse, RegisterRequest, User, UserProfile};

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = User::authenticate(&state.pool, &req.username, &req.password).await?;

    let (access_token, expires_at) =
        generate_token(user.id, &user.username, user.role, &state.config)?;
    tracing::info!("User {} logged in", user.username);

    Ok(success_to_api_response(LoginResponse {
        access_token,
        expires_at,
        user: UserProfile::from(user),
    }))
}

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    require(auth.permissions().can_manage_users)?;
    req.validate()?;

    let user = User::create(&state.pool, &req).await?;
    Ok((
        StatusCode::CREATED,
        success_to_api_response(UserProfile::from(user)),
    ))
}

#[axum::debug_handler]
pub async fn profile(Extension(auth): Extension<AuthUser>) -> impl IntoResponse {
    success_to_api_response(UserProfile::from(auth.user))
}
