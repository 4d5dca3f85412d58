//! 评分资格判定
//!
//! 规则是"每条兑换记录可评一次"，而不是"每个礼品每个用户评一次"：
//! 同一礼品兑换过两次的用户可以评两次。存在多条未评分记录时取最早的一条
//! （兑换时间、ID 升序），保证结果确定。

use tracing::instrument;

use crate::error::{RedemptionError, Result};
use crate::models::Redemption;
use crate::store::StoreTx;

/// 评分资格判定器
pub struct EligibilityResolver;

impl EligibilityResolver {
    /// 找出用户在该礼品下可以被评分的兑换记录
    ///
    /// - 从未兑换过：`NotRedeemed`
    /// - 兑换过但每条都已评分：`AlreadyRated`
    #[instrument(skip(tx))]
    pub async fn find_eligible<T: StoreTx>(
        tx: &mut T,
        user_id: i64,
        gift_id: i64,
    ) -> Result<Redemption> {
        if let Some(redemption) = tx.find_unrated_redemption(user_id, gift_id).await? {
            return Ok(redemption);
        }

        if tx.has_redemption(user_id, gift_id).await? {
            Err(RedemptionError::AlreadyRated { user_id, gift_id })
        } else {
            Err(RedemptionError::NotRedeemed { user_id, gift_id })
        }
    }
}
