//! 礼品兑换服务错误类型
//!
//! 定义服务层的业务错误和系统错误。业务错误在事务边界被识别并作为类型化结果返回，
//! 系统错误原样向上传递。

use thiserror::Error;

/// 礼品兑换服务错误类型
#[derive(Debug, Error)]
pub enum RedemptionError {
    // === 礼品相关错误 ===
    #[error("礼品不存在: {0}")]
    GiftNotFound(i64),

    #[error("礼品库存不足: gift_id={gift_id}, 需要 {requested}, 可用 {available}")]
    InsufficientStock {
        gift_id: i64,
        requested: i32,
        available: i32,
    },

    // === 评分相关错误 ===
    #[error("用户未兑换过该礼品: user_id={user_id}, gift_id={gift_id}")]
    NotRedeemed { user_id: i64, gift_id: i64 },

    #[error("该兑换记录已评分: user_id={user_id}, gift_id={gift_id}")]
    AlreadyRated { user_id: i64, gift_id: i64 },

    // === 系统错误 ===
    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("等待行锁超时: {resource}")]
    LockTimeout { resource: String },

    #[error("并发冲突，请重试")]
    ConcurrencyConflict,

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 礼品兑换服务 Result 类型别名
pub type Result<T> = std::result::Result<T, RedemptionError>;

impl RedemptionError {
    /// 检查是否为可重试的错误
    ///
    /// 本服务从不自动重试，由调用方决定是否重新提交
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LockTimeout { .. }
                | Self::ConcurrencyConflict
                | Self::Database(sqlx::Error::PoolTimedOut)
                | Self::Database(sqlx::Error::Io(_))
        )
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        matches!(
            self,
            Self::GiftNotFound(_)
                | Self::InsufficientStock { .. }
                | Self::NotRedeemed { .. }
                | Self::AlreadyRated { .. }
                | Self::Validation(_)
        )
    }

    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::GiftNotFound(_) => "GIFT_NOT_FOUND",
            Self::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            Self::NotRedeemed { .. } => "NOT_REDEEMED",
            Self::AlreadyRated { .. } => "ALREADY_RATED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::LockTimeout { .. } => "LOCK_TIMEOUT",
            Self::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 指标标签用的状态名
    pub fn metric_status(&self) -> String {
        self.error_code().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_retryable() {
        assert!(RedemptionError::ConcurrencyConflict.is_retryable());
        assert!(
            RedemptionError::LockTimeout {
                resource: "gift:1".to_string()
            }
            .is_retryable()
        );
        assert!(RedemptionError::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!RedemptionError::GiftNotFound(1).is_retryable());
        assert!(
            !RedemptionError::InsufficientStock {
                gift_id: 1,
                requested: 3,
                available: 2
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_error_is_business_error() {
        assert!(RedemptionError::GiftNotFound(1).is_business_error());
        assert!(
            RedemptionError::AlreadyRated {
                user_id: 1,
                gift_id: 2
            }
            .is_business_error()
        );
        assert!(!RedemptionError::Internal("panic".to_string()).is_business_error());
        assert!(!RedemptionError::ConcurrencyConflict.is_business_error());
    }

    #[test]
    fn test_error_code() {
        assert_eq!(RedemptionError::GiftNotFound(1).error_code(), "GIFT_NOT_FOUND");
        assert_eq!(
            RedemptionError::NotRedeemed {
                user_id: 1,
                gift_id: 2
            }
            .error_code(),
            "NOT_REDEEMED"
        );
        assert_eq!(
            RedemptionError::InsufficientStock {
                gift_id: 1,
                requested: 3,
                available: 2
            }
            .metric_status(),
            "insufficient_stock"
        );
    }

    #[test]
    fn test_error_display() {
        let err = RedemptionError::InsufficientStock {
            gift_id: 7,
            requested: 3,
            available: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("gift_id=7"));
        assert!(msg.contains("3"));
        assert!(msg.contains("2"));
    }
}
