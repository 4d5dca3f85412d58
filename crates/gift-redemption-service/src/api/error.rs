//! HTTP 错误映射
//!
//! 把服务层错误映射为 HTTP 状态码与统一响应体 `{success, code, message, data}`

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::RedemptionError;

/// API 层错误
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("未授权: {0}")]
    Unauthorized(String),

    #[error("请求参数无效: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Service(#[from] RedemptionError),
}

impl ApiError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Service(err) => match err {
                RedemptionError::GiftNotFound(_) => StatusCode::NOT_FOUND,
                RedemptionError::InsufficientStock { .. } | RedemptionError::NotRedeemed { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                RedemptionError::AlreadyRated { .. } => StatusCode::CONFLICT,
                RedemptionError::Validation(_) => StatusCode::BAD_REQUEST,
                // 可重试，调用方自行决定是否重新提交
                RedemptionError::LockTimeout { .. } | RedemptionError::ConcurrencyConflict => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                RedemptionError::Database(_) | RedemptionError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Service(err) => err.error_code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            Self::Service(RedemptionError::Database(e)) => {
                tracing::error!(error = %e, "数据库操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Service(RedemptionError::Internal(e)) => {
                tracing::error!(error = %e, "内部错误");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}
