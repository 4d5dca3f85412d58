//! 服务层数据传输对象
//!
//! 定义服务层与外部交互使用的 DTO，与内部领域模型解耦

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Gift, Rating, Redemption};

/// 兑换请求
///
/// `user_id` 来自上游已认证的身份，本服务不做查询
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemRequest {
    pub user_id: i64,
    pub gift_id: i64,
    pub quantity: i32,
}

/// 兑换结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemResponse {
    pub redemption_id: i64,
    pub gift_id: i64,
    /// 兑换时刻的礼品名称
    pub gift_name: String,
    pub quantity: i32,
    pub total_point: i64,
    pub redeemed_at: DateTime<Utc>,
}

impl RedeemResponse {
    pub fn new(gift: &Gift, redemption: Redemption) -> Self {
        Self {
            redemption_id: redemption.id,
            gift_id: redemption.gift_id,
            gift_name: gift.name.clone(),
            quantity: redemption.quantity,
            total_point: redemption.total_point,
            redeemed_at: redemption.redeemed_at,
        }
    }
}

/// 评分请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateRequest {
    pub user_id: i64,
    pub gift_id: i64,
    /// 1–5 分，闭区间
    pub score: f64,
}

/// 评分结果，附带重算后的聚合值
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateResponse {
    pub rating_id: i64,
    pub redemption_id: i64,
    pub gift_id: i64,
    pub gift_name: String,
    pub score: f64,
    pub avg_rating: f64,
    pub star_rating: f64,
    pub review_count: i32,
}

impl RateResponse {
    pub fn new(gift: &Gift, rating: Rating) -> Self {
        Self {
            rating_id: rating.id,
            redemption_id: rating.redemption_id,
            gift_id: gift.id,
            gift_name: gift.name.clone(),
            score: rating.score,
            avg_rating: gift.avg_rating,
            star_rating: gift.star_rating(),
            review_count: gift.review_count,
        }
    }
}

/// 礼品评分概览
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftRatingSummary {
    pub gift_id: i64,
    pub gift_name: String,
    pub avg_rating: f64,
    pub star_rating: f64,
    pub review_count: i32,
    pub stock: i32,
    pub in_stock: bool,
}

impl From<Gift> for GiftRatingSummary {
    fn from(gift: Gift) -> Self {
        Self {
            star_rating: gift.star_rating(),
            in_stock: gift.in_stock(),
            gift_id: gift.id,
            gift_name: gift.name,
            avg_rating: gift.avg_rating,
            review_count: gift.review_count,
            stock: gift.stock,
        }
    }
}

/// 兑换历史条目
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionHistoryDto {
    pub redemption_id: i64,
    pub gift_id: i64,
    pub gift_name: String,
    pub quantity: i32,
    pub total_point: i64,
    pub redeemed_at: DateTime<Utc>,
}
