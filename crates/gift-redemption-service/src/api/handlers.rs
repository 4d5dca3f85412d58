//! HTTP 请求处理器
//!
//! 只做参数提取与响应包装，业务逻辑全部在服务层

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use super::auth::AuthenticatedUser;
use super::error::ApiError;
use super::response::ApiResponse;
use super::state::AppState;
use crate::service::{
    GiftRatingSummary, RateRequest, RateResponse, RedeemRequest, RedeemResponse,
    RedemptionHistoryDto,
};
use crate::store::GiftStore;

type ApiResult<T> = Result<T, ApiError>;

/// 兑换请求体
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemBody {
    pub quantity: i32,
}

/// 评分请求体
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateBody {
    pub score: f64,
}

/// 兑换历史查询参数
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

fn default_history_limit() -> i64 {
    20
}

/// POST /api/v1/gifts/{id}/redeem
pub async fn redeem<S: GiftStore>(
    State(state): State<AppState<S>>,
    user: AuthenticatedUser,
    gift_id: Result<Path<i64>, PathRejection>,
    body: Result<Json<RedeemBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<RedeemResponse>>)> {
    let Path(gift_id) = gift_id?;
    let Json(body) = body?;

    let response = state
        .service
        .redeem(RedeemRequest {
            user_id: user.user_id,
            gift_id,
            quantity: body.quantity,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

/// POST /api/v1/gifts/{id}/rating
pub async fn rate<S: GiftStore>(
    State(state): State<AppState<S>>,
    user: AuthenticatedUser,
    gift_id: Result<Path<i64>, PathRejection>,
    body: Result<Json<RateBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<RateResponse>>)> {
    let Path(gift_id) = gift_id?;
    let Json(body) = body?;

    let response = state
        .service
        .rate(RateRequest {
            user_id: user.user_id,
            gift_id,
            score: body.score,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

/// GET /api/v1/gifts/{id}/rating-summary
pub async fn rating_summary<S: GiftStore>(
    State(state): State<AppState<S>>,
    gift_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<ApiResponse<GiftRatingSummary>>> {
    let Path(gift_id) = gift_id?;
    let summary = state.service.gift_rating_summary(gift_id).await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// GET /api/v1/me/redemptions
pub async fn my_redemptions<S: GiftStore>(
    State(state): State<AppState<S>>,
    user: AuthenticatedUser,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<Vec<RedemptionHistoryDto>>>> {
    let Query(params) = params?;
    let items = state
        .service
        .list_user_redemptions(user.user_id, params.limit)
        .await?;
    Ok(Json(ApiResponse::success(items)))
}

/// 存活探针
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "gift-redemption-service"
    }))
}
