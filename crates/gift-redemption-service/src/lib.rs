//! 礼品兑换服务
//!
//! 用户用积分兑换礼品，并对兑换过的礼品评分。
//!
//! ## 核心功能
//!
//! - **礼品兑换**：锁定礼品行后检查并扣减库存，同一事务内写入兑换记录，不会超卖
//! - **礼品评分**：每条兑换记录至多评分一次，并发提交时只有一个成功
//! - **评分聚合**：与评分写入同一事务，从评分明细整体重算平均分与评分条数
//! - **兑换历史**：按兑换时间倒序查询用户的兑换记录
//!
//! ## 模块结构
//!
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `store`: 事务性存储层（PostgreSQL / 进程内）
//! - `service`: 业务服务层
//! - `api`: HTTP 接入层

pub mod api;
pub mod error;
pub mod models;
pub mod service;
pub mod store;

pub use api::{AppState, build_router};
pub use error::{RedemptionError, Result};
pub use models::*;
pub use service::{
    AggregateRecalculator, EligibilityResolver, RatingLedger, RedemptionRecorder,
    RedemptionService, StockLedger, TransactionCoordinator, dto,
};
pub use store::{GiftStore, MemoryGiftStore, PgGiftStore, StoreTx};
