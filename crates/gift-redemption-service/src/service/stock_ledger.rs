//! 礼品库存账本
//!
//! 库存的唯一写入口。扣减前先对礼品行加排他锁，同一礼品上的扣减严格串行，
//! 锁一直持有到外层事务结束，不会出现两个事务同时看到"库存充足"而超卖。

use tracing::{debug, instrument};

use crate::error::{RedemptionError, Result};
use crate::models::Gift;
use crate::store::StoreTx;

/// 礼品库存账本
pub struct StockLedger;

impl StockLedger {
    /// 在当前事务内扣减库存，返回扣减后的礼品快照
    ///
    /// 库存不足时返回 `InsufficientStock` 且不做任何写入
    #[instrument(skip(tx))]
    pub async fn deduct<T: StoreTx>(tx: &mut T, gift_id: i64, quantity: i32) -> Result<Gift> {
        if quantity < 1 {
            return Err(RedemptionError::Validation(format!(
                "兑换数量必须大于 0: {}",
                quantity
            )));
        }

        let mut gift = tx
            .lock_gift(gift_id)
            .await?
            .ok_or(RedemptionError::GiftNotFound(gift_id))?;

        if gift.stock < quantity {
            return Err(RedemptionError::InsufficientStock {
                gift_id,
                requested: quantity,
                available: gift.stock,
            });
        }

        let remaining = gift.stock - quantity;
        tx.set_stock(gift_id, remaining).await?;
        gift.stock = remaining;

        debug!(remaining, "stock deducted");
        Ok(gift)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::store::{GiftStore, MemoryGiftStore};

    #[tokio::test]
    async fn test_deduct_success() {
        let store = MemoryGiftStore::new(Duration::from_millis(200));
        let gift = store.seed_gift("雨伞", 80, 5);

        let mut tx = store.begin().await.unwrap();
        let after = StockLedger::deduct(&mut tx, gift.id, 3).await.unwrap();
        assert_eq!(after.stock, 2);
        tx.commit().await.unwrap();

        assert_eq!(store.find_gift(gift.id).await.unwrap().unwrap().stock, 2);
    }

    #[tokio::test]
    async fn test_deduct_exact_stock_reaches_zero() {
        let store = MemoryGiftStore::new(Duration::from_millis(200));
        let gift = store.seed_gift("雨伞", 80, 3);

        let mut tx = store.begin().await.unwrap();
        let after = StockLedger::deduct(&mut tx, gift.id, 3).await.unwrap();
        assert_eq!(after.stock, 0);
        assert!(!after.in_stock());
    }

    #[tokio::test]
    async fn test_insufficient_stock_writes_nothing() {
        let store = MemoryGiftStore::new(Duration::from_millis(200));
        let gift = store.seed_gift("雨伞", 80, 2);

        let mut tx = store.begin().await.unwrap();
        let err = StockLedger::deduct(&mut tx, gift.id, 3).await.unwrap_err();
        assert!(matches!(
            err,
            RedemptionError::InsufficientStock {
                requested: 3,
                available: 2,
                ..
            }
        ));

        // 同一事务内的加锁读看到的仍是原值
        assert_eq!(tx.lock_gift(gift.id).await.unwrap().unwrap().stock, 2);
    }

    #[tokio::test]
    async fn test_deduct_missing_gift() {
        let store = MemoryGiftStore::new(Duration::from_millis(200));
        let mut tx = store.begin().await.unwrap();
        let err = StockLedger::deduct(&mut tx, 99, 1).await.unwrap_err();
        assert!(matches!(err, RedemptionError::GiftNotFound(99)));
    }

    #[tokio::test]
    async fn test_deduct_rejects_non_positive_quantity() {
        let store = MemoryGiftStore::new(Duration::from_millis(200));
        let gift = store.seed_gift("雨伞", 80, 2);
        let mut tx = store.begin().await.unwrap();
        let err = StockLedger::deduct(&mut tx, gift.id, 0).await.unwrap_err();
        assert!(matches!(err, RedemptionError::Validation(_)));
    }
}
