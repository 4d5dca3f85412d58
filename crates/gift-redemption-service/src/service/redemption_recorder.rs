//! 兑换记录写入
//!
//! 只在同一事务内扣减库存成功之后调用。这里不做任何补偿：
//! 写入失败时外层事务回滚，库存扣减一并撤销。

use tracing::{debug, instrument};

use crate::error::Result;
use crate::models::{NewRedemption, Redemption};
use crate::store::StoreTx;

/// 兑换记录写入器
pub struct RedemptionRecorder;

impl RedemptionRecorder {
    /// 写入一条不可变的兑换记录，ID 与兑换时间由存储层分配
    #[instrument(skip(tx, new), fields(user_id = new.user_id, gift_id = new.gift_id))]
    pub async fn create<T: StoreTx>(tx: &mut T, new: NewRedemption) -> Result<Redemption> {
        let redemption = tx.insert_redemption(new).await?;
        debug!(redemption_id = redemption.id, "redemption recorded");
        Ok(redemption)
    }
}
