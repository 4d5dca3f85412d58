//! 领域模型
//!
//! - `gift`: 礼品（库存与评分聚合字段由本服务维护）
//! - `redemption`: 兑换记录（创建后不可变）
//! - `rating`: 评分（每条兑换记录至多一条，创建后不可变）

mod gift;
mod rating;
mod redemption;

pub use gift::{Gift, star_rating};
pub use rating::{NewRating, Rating, RatingStats};
pub use redemption::{NewRedemption, Redemption};
