//! 评分账本
//!
//! 每条兑换记录至多一条评分，唯一性由存储层保证（唯一约束 / 唯一槽位锁）。
//! 存储层以结构化结果报告冲突，这里把它翻译为 `AlreadyRated`。

use tracing::{info, instrument};

use crate::error::{RedemptionError, Result};
use crate::models::{NewRating, Rating};
use crate::store::StoreTx;

/// 评分账本
pub struct RatingLedger;

impl RatingLedger {
    /// 在当前事务内写入评分
    #[instrument(skip(tx, new), fields(user_id = new.user_id, gift_id = new.gift_id, redemption_id = new.redemption_id))]
    pub async fn create<T: StoreTx>(tx: &mut T, new: NewRating) -> Result<Rating> {
        let (user_id, gift_id) = (new.user_id, new.gift_id);

        match tx.insert_rating(new).await? {
            Some(rating) => Ok(rating),
            None => {
                info!("并发评分冲突，该兑换记录已有评分");
                Err(RedemptionError::AlreadyRated { user_id, gift_id })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::NewRedemption;
    use crate::store::{GiftStore, MemoryGiftStore};

    #[tokio::test]
    async fn test_second_rating_on_same_redemption_is_already_rated() {
        let store = MemoryGiftStore::new(Duration::from_millis(200));
        let gift = store.seed_gift("钥匙扣", 30, 5);

        let mut tx = store.begin().await.unwrap();
        let redemption = tx
            .insert_redemption(NewRedemption {
                user_id: 5,
                gift_id: gift.id,
                quantity: 1,
                total_point: 30,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let new = NewRating {
            user_id: 5,
            gift_id: gift.id,
            redemption_id: redemption.id,
            score: 5.0,
        };

        let mut tx = store.begin().await.unwrap();
        let rating = RatingLedger::create(&mut tx, new.clone()).await.unwrap();
        assert_eq!(rating.redemption_id, redemption.id);
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let err = RatingLedger::create(&mut tx, new).await.unwrap_err();
        assert!(matches!(err, RedemptionError::AlreadyRated { user_id: 5, .. }));
        assert_eq!(store.ratings().len(), 1);
    }
}
