use axum::{
    RequestPartsExt,
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::{
    AppState,
    error::AppError,
    permissions::Permissions,
    routes::auth::User,
    utils::{Claims, verify_token},
};

/// The caller of a protected route: decoded token plus the freshly loaded account.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub claims: Claims,
    pub user: User,
}

impl AuthUser {
    pub fn permissions(&self) -> Permissions {
        self.user.role.permissions()
    }
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();

    let TypedHeader(Authorization(bearer)) = parts
        .extract::<TypedHeader<Authorization<Bearer>>>()
        .await
        .map_err(|_| AppError::Unauthorized)?;

    let claims = verify_token(bearer.token(), &state.config).map_err(|e| {
        tracing::debug!("Rejected bearer token: {}", e);
        AppError::Unauthorized
    })?;

    let user = User::validate(&state.pool, claims.sub).await?;

    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(AuthUser { claims, user });

    Ok(next.run(request).await)
}
