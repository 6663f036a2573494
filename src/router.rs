use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};
use tower_http::services::ServeDir;

use crate::{
    AppState,
    middleware::{auth_middleware, log_errors},
    routes::{self, entry::photo},
};

fn public_routes() -> Router<AppState> {
    Router::new()
        // 登录是唯一的公开接口
        .route("/auth/login", post(routes::auth::login))
}

fn protected_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // 用户路由
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/profile", get(routes::auth::profile))
        // 车辆登记路由
        .route(
            "/entries",
            post(routes::entry::create_entry).get(routes::entry::list_entries),
        )
        .route("/entries/statistics", get(routes::entry::statistics))
        .route("/entries/date-range", get(routes::entry::date_range))
        .route("/entries/cleanup", post(routes::entry::manual_cleanup))
        .route("/entries/bulk", delete(routes::entry::delete_multiple))
        .route(
            "/entries/{id}",
            get(routes::entry::get_entry)
                .patch(routes::entry::update_entry)
                .delete(routes::entry::delete_entry),
        )
        // 照片上传，单独放宽请求体限制
        .route(
            "/entries/{id}/photo",
            post(routes::entry::upload_photo)
                .layer(DefaultBodyLimit::max(photo::MAX_UPLOAD_BODY_BYTES)),
        )
        // 应用认证中间件
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
}

/// Builds the full application: API routes under the configured prefix,
/// uploaded photos under `/uploads`, error logging, and permissive CORS in
/// debug builds.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(public_routes())
        .merge(protected_routes(&state));

    // 挂载到 API 前缀下，前缀为空时直接合并
    let base = state.config.api_base_uri.trim_end_matches('/');
    let router = if base.is_empty() {
        Router::new().merge(api)
    } else {
        Router::new().nest(base, api)
    };

    // 静态照片文件和日志中间件
    let router = router
        .nest_service(
            photo::PUBLIC_PREFIX,
            ServeDir::new(&state.config.upload_dir),
        )
        .layer(axum::middleware::from_fn(log_errors));

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding permissive CORS layer for development");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    router.with_state(state)
}
