//! 事务协调器
//!
//! 把一组存储操作包在同一个事务里执行：成功提交，失败回滚。
//! panic 或请求取消时 future 被 drop，事务句柄随之 drop，由存储层回滚。

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::error::Result;
use crate::store::{GiftStore, StoreTx};

/// 事务协调器
pub struct TransactionCoordinator<S: GiftStore> {
    store: Arc<S>,
}

impl<S: GiftStore> Clone for TransactionCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: GiftStore> TransactionCoordinator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// 在一个事务内执行 `work`
    ///
    /// `work` 返回 Ok 时提交，返回 Err 时回滚并原样返回该错误。
    /// 闭包需要把用到的值 move 进去：
    ///
    /// ```ignore
    /// let gift = coordinator
    ///     .run(move |tx| Box::pin(async move { StockLedger::deduct(tx, gift_id, 1).await }))
    ///     .await?;
    /// ```
    pub async fn run<T, F>(&self, work: F) -> Result<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, Result<T>> + Send,
    {
        let mut tx = self.store.begin().await?;

        match work(&mut tx).await {
            Ok(value) => {
                tx.commit().await?;
                debug!("transaction committed");
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    // 回滚失败不覆盖原始错误，连接断开时数据库侧也会丢弃该事务
                    warn!(error = %rollback_err, "transaction rollback failed");
                }
                debug!(error = %err, "transaction rolled back");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::RedemptionError;
    use crate::store::MemoryGiftStore;

    fn setup() -> (Arc<MemoryGiftStore>, TransactionCoordinator<MemoryGiftStore>) {
        let store = Arc::new(MemoryGiftStore::new(Duration::from_millis(200)));
        let coordinator = TransactionCoordinator::new(store.clone());
        (store, coordinator)
    }

    #[tokio::test]
    async fn test_commit_on_success() {
        let (store, coordinator) = setup();
        let gift = store.seed_gift("帆布袋", 50, 10);
        let gift_id = gift.id;

        let stock = coordinator
            .run(move |tx| {
                Box::pin(async move {
                    tx.lock_gift(gift_id).await?;
                    tx.set_stock(gift_id, 7).await?;
                    Ok(7)
                })
            })
            .await
            .unwrap();

        assert_eq!(stock, 7);
        assert_eq!(store.find_gift(gift_id).await.unwrap().unwrap().stock, 7);
    }

    #[tokio::test]
    async fn test_rollback_on_error() {
        let (store, coordinator) = setup();
        let gift = store.seed_gift("帆布袋", 50, 10);
        let gift_id = gift.id;

        let err = coordinator
            .run(move |tx| {
                Box::pin(async move {
                    tx.lock_gift(gift_id).await?;
                    tx.set_stock(gift_id, 0).await?;
                    Err::<(), _>(RedemptionError::Validation("boom".to_string()))
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, RedemptionError::Validation(_)));
        assert_eq!(store.find_gift(gift_id).await.unwrap().unwrap().stock, 10);
    }

    #[tokio::test]
    async fn test_cancellation_rolls_back_and_releases_lock() {
        let (store, coordinator) = setup();
        let gift = store.seed_gift("帆布袋", 50, 10);
        let gift_id = gift.id;

        let pending = coordinator.run(move |tx| {
            Box::pin(async move {
                tx.lock_gift(gift_id).await?;
                tx.set_stock(gift_id, 1).await?;
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
        });
        assert!(
            tokio::time::timeout(Duration::from_millis(50), pending)
                .await
                .is_err()
        );

        assert_eq!(store.find_gift(gift_id).await.unwrap().unwrap().stock, 10);
        let mut tx = store.begin().await.unwrap();
        assert!(tx.lock_gift(gift_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_panic_rolls_back_and_releases_lock() {
        let (store, coordinator) = setup();
        let gift = store.seed_gift("帆布袋", 50, 10);
        let gift_id = gift.id;

        let handle = tokio::spawn(async move {
            coordinator
                .run(move |tx| {
                    Box::pin(async move {
                        tx.lock_gift(gift_id).await?;
                        tx.set_stock(gift_id, 3).await?;
                        if gift_id > 0 {
                            panic!("worker crashed");
                        }
                        Ok(())
                    })
                })
                .await
        });
        assert!(handle.await.unwrap_err().is_panic());

        assert_eq!(store.find_gift(gift_id).await.unwrap().unwrap().stock, 10);
        let mut tx = store.begin().await.unwrap();
        assert!(tx.lock_gift(gift_id).await.unwrap().is_some());
    }
}
