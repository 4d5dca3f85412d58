//! 服务层
//!
//! 由六个组件组合出兑换与评分两个事务流程。
//!
//! ## 模块结构
//!
//! - `stock_ledger`: 礼品库存账本（行锁 + 检查 + 扣减）
//! - `redemption_recorder`: 兑换记录写入
//! - `eligibility`: 评分资格判定
//! - `rating_ledger`: 评分写入（一条兑换记录一条评分）
//! - `aggregate`: 评分聚合重算
//! - `transaction`: 事务协调器
//! - `redemption_service`: 对外的兑换 / 评分服务
//! - `dto`: 数据传输对象定义

pub mod aggregate;
pub mod dto;
pub mod eligibility;
pub mod rating_ledger;
pub mod redemption_recorder;
pub mod redemption_service;
pub mod stock_ledger;
pub mod transaction;

pub use aggregate::AggregateRecalculator;
pub use dto::*;
pub use eligibility::EligibilityResolver;
pub use rating_ledger::RatingLedger;
pub use redemption_recorder::RedemptionRecorder;
pub use redemption_service::RedemptionService;
pub use stock_ledger::StockLedger;
pub use transaction::TransactionCoordinator;
