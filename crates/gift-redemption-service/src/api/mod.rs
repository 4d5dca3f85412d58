//! HTTP 接入层
//!
//! - `routes`: 路由配置
//! - `handlers`: 请求处理器
//! - `auth`: 调用方身份提取（`x-user-id`）
//! - `error`: 错误到 HTTP 响应的映射
//! - `response`: 统一响应体
//! - `state`: 应用状态

pub mod auth;
pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod state;

pub use auth::{AuthenticatedUser, USER_ID_HEADER};
pub use error::ApiError;
pub use response::ApiResponse;
pub use routes::{api_routes, build_router};
pub use state::AppState;
