//! 评分实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 评分
///
/// 绑定到唯一一条兑换记录（`redemption_id` 全局唯一），创建后不可变。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: i64,
    pub user_id: i64,
    pub gift_id: i64,
    pub redemption_id: i64,
    /// 1–5 分
    pub score: f64,
    pub created_at: DateTime<Utc>,
}

/// 待写入的评分
#[derive(Debug, Clone, PartialEq)]
pub struct NewRating {
    pub user_id: i64,
    pub gift_id: i64,
    pub redemption_id: i64,
    pub score: f64,
}

/// 礼品评分聚合值
#[derive(Debug, Clone, Copy, Default, PartialEq, sqlx::FromRow)]
pub struct RatingStats {
    pub avg_rating: f64,
    pub review_count: i32,
}

impl RatingStats {
    /// 由一组分数计算聚合值，空集合得到 (0, 0)
    pub fn from_scores<I>(scores: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let (sum, count) = scores
            .into_iter()
            .fold((0.0_f64, 0_i32), |(sum, count), s| (sum + s, count + 1));

        if count == 0 {
            return Self::default();
        }

        Self {
            avg_rating: sum / f64::from(count),
            review_count: count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_stats_from_scores() {
        let stats = RatingStats::from_scores([5.0, 4.0, 3.0]);
        assert_eq!(stats.avg_rating, 4.0);
        assert_eq!(stats.review_count, 3);
    }

    #[test]
    fn test_rating_stats_empty() {
        let stats = RatingStats::from_scores(Vec::<f64>::new());
        assert_eq!(stats, RatingStats::default());
        assert_eq!(stats.avg_rating, 0.0);
    }
}
