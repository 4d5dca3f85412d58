//! 评分聚合重算
//!
//! 与评分写入处于同一事务。每次都从评分明细整体重算平均分与条数，不做增量修补。
//! 调用方应在写评分之前就锁住礼品行；这里再次加锁（同一事务内可重入），
//! 保证写回聚合时一定持有行锁，并发评分同一礼品不会丢失更新。

use tracing::{debug, instrument};

use crate::error::{RedemptionError, Result};
use crate::models::Gift;
use crate::store::StoreTx;

/// 评分聚合重算器
pub struct AggregateRecalculator;

impl AggregateRecalculator {
    /// 重算并写回礼品的 `avg_rating` / `review_count`，返回更新后的礼品
    #[instrument(skip(tx))]
    pub async fn recompute<T: StoreTx>(tx: &mut T, gift_id: i64) -> Result<Gift> {
        tx.lock_gift(gift_id)
            .await?
            .ok_or(RedemptionError::GiftNotFound(gift_id))?;

        let stats = tx.rating_stats(gift_id).await?;
        let gift = tx.set_rating_stats(gift_id, stats).await?;

        debug!(
            avg_rating = gift.avg_rating,
            review_count = gift.review_count,
            "rating aggregate recomputed"
        );
        Ok(gift)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::{NewRating, NewRedemption};
    use crate::store::{GiftStore, MemoryGiftStore};

    #[tokio::test]
    async fn test_recompute_from_scores() {
        let store = MemoryGiftStore::new(Duration::from_millis(200));
        let gift = store.seed_gift("台灯", 500, 10);

        let mut tx = store.begin().await.unwrap();
        for score in [5.0, 4.0, 3.0] {
            let redemption = tx
                .insert_redemption(NewRedemption {
                    user_id: 1,
                    gift_id: gift.id,
                    quantity: 1,
                    total_point: 500,
                })
                .await
                .unwrap();
            tx.insert_rating(NewRating {
                user_id: 1,
                gift_id: gift.id,
                redemption_id: redemption.id,
                score,
            })
            .await
            .unwrap();
        }

        let updated = AggregateRecalculator::recompute(&mut tx, gift.id)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(updated.avg_rating, 4.0);
        assert_eq!(updated.review_count, 3);
        assert_eq!(updated.star_rating(), 4.0);

        let stored = store.find_gift(gift.id).await.unwrap().unwrap();
        assert_eq!(stored.avg_rating, 4.0);
        assert_eq!(stored.review_count, 3);
    }

    #[tokio::test]
    async fn test_recompute_without_ratings_is_zero() {
        let store = MemoryGiftStore::new(Duration::from_millis(200));
        let gift = store.seed_gift("台灯", 500, 10);

        let mut tx = store.begin().await.unwrap();
        let updated = AggregateRecalculator::recompute(&mut tx, gift.id)
            .await
            .unwrap();
        assert_eq!(updated.avg_rating, 0.0);
        assert_eq!(updated.review_count, 0);
    }

    #[tokio::test]
    async fn test_recompute_missing_gift() {
        let store = MemoryGiftStore::new(Duration::from_millis(200));
        let mut tx = store.begin().await.unwrap();
        let err = AggregateRecalculator::recompute(&mut tx, 42)
            .await
            .unwrap_err();
        assert!(matches!(err, RedemptionError::GiftNotFound(42)));
    }
}
