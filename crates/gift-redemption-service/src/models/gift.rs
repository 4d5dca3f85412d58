//! 礼品实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 礼品
///
/// 目录信息（名称、描述、积分价格）由礼品目录维护，本服务只读；
/// 本服务只修改 `stock`、`avg_rating`、`review_count` 三个字段。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Gift {
    pub id: i64,
    pub name: String,
    #[sqlx(default)]
    pub description: Option<String>,
    /// 单件所需积分
    pub point_cost: i64,
    /// 剩余库存，永不为负
    pub stock: i32,
    /// 平均评分，无评分时为 0
    pub avg_rating: f64,
    /// 评分条数
    pub review_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Gift {
    /// 展示用星级（四舍五入到 0.5）
    pub fn star_rating(&self) -> f64 {
        star_rating(self.avg_rating)
    }

    /// 是否有库存
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// 将平均分四舍五入到最近的 0.5
///
/// 恰好落在两个刻度中间时远离零取整：4.25 → 4.5，4.24 → 4.0，4.75 → 5.0
pub fn star_rating(avg: f64) -> f64 {
    (avg * 2.0).round() / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_gift(stock: i32, avg_rating: f64) -> Gift {
        let now = Utc::now();
        Gift {
            id: 1,
            name: "保温杯".to_string(),
            description: None,
            point_cost: 200,
            stock,
            avg_rating,
            review_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_star_rating_rounding_boundaries() {
        assert_eq!(star_rating(4.25), 4.5);
        assert_eq!(star_rating(4.24), 4.0);
        assert_eq!(star_rating(4.75), 5.0);
        assert_eq!(star_rating(3.2), 3.0);
        assert_eq!(star_rating(3.6), 3.5);
        assert_eq!(star_rating(3.9), 4.0);
        assert_eq!(star_rating(0.0), 0.0);
    }

    #[test]
    fn test_gift_in_stock() {
        assert!(create_test_gift(1, 0.0).in_stock());
        assert!(!create_test_gift(0, 0.0).in_stock());
    }

    #[test]
    fn test_gift_star_rating() {
        assert_eq!(create_test_gift(1, 4.0).star_rating(), 4.0);
        assert_eq!(create_test_gift(1, 4.25).star_rating(), 4.5);
    }

    #[test]
    fn test_gift_serialization() {
        let json = serde_json::to_value(create_test_gift(3, 4.5)).unwrap();
        assert_eq!(json["pointCost"], 200);
        assert_eq!(json["stock"], 3);
        assert_eq!(json["avgRating"], 4.5);
        assert_eq!(json["reviewCount"], 0);
    }
}
