//! 路由配置模块

use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use gift_shared::observability::middleware as obs_middleware;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use super::handlers;
use super::state::AppState;
use crate::store::GiftStore;

/// 业务路由（挂载在 `/api/v1` 下）
pub fn api_routes<S: GiftStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/gifts/{id}/redeem", post(handlers::redeem::<S>))
        .route("/gifts/{id}/rating", post(handlers::rate::<S>))
        .route(
            "/gifts/{id}/rating-summary",
            get(handlers::rating_summary::<S>),
        )
        .route("/me/redemptions", get(handlers::my_redemptions::<S>))
}

/// 构建完整的应用路由
///
/// 请求超时后 handler future 被 drop，进行中的事务随之回滚
pub fn build_router<S: GiftStore>(state: AppState<S>, request_timeout: Duration) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        .route("/health", get(handlers::health))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        // 可观测性中间件：请求追踪和指标收集
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}
