//! 调用方身份提取
//!
//! 身份认证由上游网关完成，网关把已认证的用户 ID 写入 `x-user-id` 头。
//! 这里只做解析，不做查询。

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::error::ApiError;

/// 已认证用户 ID 的 header 名称
pub const USER_ID_HEADER: &str = "x-user-id";

/// 已认证的调用方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: i64,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("缺少用户身份".to_string()))?;

        let user_id = raw
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .ok_or_else(|| ApiError::Unauthorized("用户身份无效".to_string()))?;

        Ok(Self { user_id })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request as HttpRequest;

    use super::*;

    async fn extract(header: Option<&str>) -> Result<AuthenticatedUser, ApiError> {
        let mut builder = HttpRequest::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(USER_ID_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        AuthenticatedUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_valid_user_id() {
        assert_eq!(extract(Some("42")).await.unwrap().user_id, 42);
    }

    #[tokio::test]
    async fn test_missing_or_invalid_user_id() {
        for header in [None, Some("abc"), Some("0"), Some("-3")] {
            assert!(matches!(
                extract(header).await,
                Err(ApiError::Unauthorized(_))
            ));
        }
    }
}
