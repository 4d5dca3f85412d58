//! 兑换记录实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 兑换记录
///
/// 一次成功兑换对应一条记录，创建后不可变。
/// `total_point` 是兑换时刻价格的快照，之后礼品调价不影响它。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Redemption {
    pub id: i64,
    pub user_id: i64,
    pub gift_id: i64,
    pub quantity: i32,
    pub total_point: i64,
    pub redeemed_at: DateTime<Utc>,
}

/// 待写入的兑换记录（ID 与时间由存储层分配）
#[derive(Debug, Clone, PartialEq)]
pub struct NewRedemption {
    pub user_id: i64,
    pub gift_id: i64,
    pub quantity: i32,
    pub total_point: i64,
}
