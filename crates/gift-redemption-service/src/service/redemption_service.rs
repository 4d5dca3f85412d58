//! 礼品兑换与评分服务
//!
//! ## 兑换流程
//!
//! 1. 参数校验 -> 2. 锁礼品行、检查并扣减库存 -> 3. 写兑换记录 -> 4. 提交
//!
//! ## 评分流程
//!
//! 1. 参数校验 -> 2. 锁礼品行（同时确认存在） -> 3. 找到未评分的兑换记录
//!    -> 4. 写评分 -> 5. 重算聚合 -> 6. 提交
//!
//! 两个流程都以礼品行锁开头，同一礼品上的兑换与评分严格串行。
//! 兑换的 2-3 与评分的 2-5 各自是一个事务，不会部分落库。业务错误在事务边界以类型化错误返回，
//! 存储错误原样上抛；锁等待超时不自动重试，由调用方决定是否重新提交。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use gift_shared::observability::metrics;
use tracing::{info, instrument, warn};

use crate::error::{RedemptionError, Result};
use crate::models::{NewRating, NewRedemption};
use crate::service::aggregate::AggregateRecalculator;
use crate::service::dto::{
    GiftRatingSummary, RateRequest, RateResponse, RedeemRequest, RedeemResponse,
    RedemptionHistoryDto,
};
use crate::service::eligibility::EligibilityResolver;
use crate::service::rating_ledger::RatingLedger;
use crate::service::redemption_recorder::RedemptionRecorder;
use crate::service::stock_ledger::StockLedger;
use crate::service::transaction::TransactionCoordinator;
use crate::store::{GiftStore, StoreTx};

/// 评分下限
pub const MIN_SCORE: f64 = 1.0;
/// 评分上限
pub const MAX_SCORE: f64 = 5.0;
/// 兑换历史单次查询上限
pub const MAX_HISTORY_LIMIT: i64 = 100;

/// 礼品兑换与评分服务
pub struct RedemptionService<S: GiftStore> {
    store: Arc<S>,
    coordinator: TransactionCoordinator<S>,
}

impl<S: GiftStore> RedemptionService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            coordinator: TransactionCoordinator::new(store.clone()),
            store,
        }
    }

    /// 用积分兑换礼品
    #[instrument(skip(self), fields(user_id = request.user_id, gift_id = request.gift_id, quantity = request.quantity))]
    pub async fn redeem(&self, request: RedeemRequest) -> Result<RedeemResponse> {
        let start = Instant::now();
        let result = self.execute_redeem(request).await;
        let elapsed = start.elapsed().as_secs_f64();

        match &result {
            Ok(response) => {
                metrics::record_redemption("success", elapsed);
                info!(
                    redemption_id = response.redemption_id,
                    total_point = response.total_point,
                    "礼品兑换成功"
                );
            }
            Err(e) => {
                metrics::record_redemption(&e.metric_status(), elapsed);
                log_failure("礼品兑换失败", e);
            }
        }

        result
    }

    /// 为已兑换的礼品评分，返回重算后的聚合值
    #[instrument(skip(self), fields(user_id = request.user_id, gift_id = request.gift_id))]
    pub async fn rate(&self, request: RateRequest) -> Result<RateResponse> {
        let start = Instant::now();
        let result = self.execute_rate(request).await;
        let elapsed = start.elapsed().as_secs_f64();

        match &result {
            Ok(response) => {
                metrics::record_rating("success", elapsed);
                info!(
                    rating_id = response.rating_id,
                    avg_rating = response.avg_rating,
                    review_count = response.review_count,
                    "礼品评分成功"
                );
            }
            Err(e) => {
                metrics::record_rating(&e.metric_status(), elapsed);
                log_failure("礼品评分失败", e);
            }
        }

        result
    }

    /// 礼品评分概览（平均分、星级、评分条数、库存）
    #[instrument(skip(self))]
    pub async fn gift_rating_summary(&self, gift_id: i64) -> Result<GiftRatingSummary> {
        let gift = self
            .store
            .find_gift(gift_id)
            .await?
            .ok_or(RedemptionError::GiftNotFound(gift_id))?;

        Ok(GiftRatingSummary::from(gift))
    }

    /// 查询用户兑换历史，按兑换时间倒序
    ///
    /// `limit` 会被限制在 1..=100
    #[instrument(skip(self))]
    pub async fn list_user_redemptions(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<RedemptionHistoryDto>> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        let redemptions = self.store.list_user_redemptions(user_id, limit).await?;

        if redemptions.is_empty() {
            return Ok(Vec::new());
        }

        // 同一礼品只查一次名称
        let mut gift_names: HashMap<i64, String> = HashMap::new();
        for redemption in &redemptions {
            if gift_names.contains_key(&redemption.gift_id) {
                continue;
            }
            let name = self
                .store
                .find_gift(redemption.gift_id)
                .await?
                .map(|g| g.name)
                .unwrap_or_else(|| "未知礼品".to_string());
            gift_names.insert(redemption.gift_id, name);
        }

        Ok(redemptions
            .into_iter()
            .map(|r| RedemptionHistoryDto {
                redemption_id: r.id,
                gift_id: r.gift_id,
                gift_name: gift_names.get(&r.gift_id).cloned().unwrap_or_default(),
                quantity: r.quantity,
                total_point: r.total_point,
                redeemed_at: r.redeemed_at,
            })
            .collect())
    }

    // ==================== 私有方法 ====================

    /// 执行兑换事务：{扣减库存, 写兑换记录}
    async fn execute_redeem(&self, request: RedeemRequest) -> Result<RedeemResponse> {
        let RedeemRequest {
            user_id,
            gift_id,
            quantity,
        } = request;

        if quantity < 1 {
            return Err(RedemptionError::Validation(format!(
                "兑换数量必须大于 0: {}",
                quantity
            )));
        }

        let (gift, redemption) = self
            .coordinator
            .run(move |tx| {
                Box::pin(async move {
                    let gift = StockLedger::deduct(tx, gift_id, quantity).await?;

                    // 价格取锁内读到的值，作为本次兑换的快照
                    let total_point = gift
                        .point_cost
                        .checked_mul(i64::from(quantity))
                        .ok_or_else(|| {
                            RedemptionError::Validation(format!(
                                "积分总额溢出: point_cost={}, quantity={}",
                                gift.point_cost, quantity
                            ))
                        })?;

                    let redemption = RedemptionRecorder::create(
                        tx,
                        NewRedemption {
                            user_id,
                            gift_id,
                            quantity,
                            total_point,
                        },
                    )
                    .await?;

                    Ok((gift, redemption))
                })
            })
            .await?;

        metrics::set_gift_stock(gift.id, f64::from(gift.stock));
        Ok(RedeemResponse::new(&gift, redemption))
    }

    /// 执行评分事务：{判定资格, 写评分, 重算聚合}
    async fn execute_rate(&self, request: RateRequest) -> Result<RateResponse> {
        let RateRequest {
            user_id,
            gift_id,
            score,
        } = request;

        validate_score(score)?;

        let (gift, rating) = self
            .coordinator
            .run(move |tx| {
                Box::pin(async move {
                    // 必须先于写评分：评分外键会在礼品行上加共享锁，之后再升级会死锁
                    tx.lock_gift(gift_id)
                        .await?
                        .ok_or(RedemptionError::GiftNotFound(gift_id))?;

                    let redemption =
                        EligibilityResolver::find_eligible(tx, user_id, gift_id).await?;

                    let rating = RatingLedger::create(
                        tx,
                        NewRating {
                            user_id,
                            gift_id,
                            redemption_id: redemption.id,
                            score,
                        },
                    )
                    .await?;

                    let gift = AggregateRecalculator::recompute(tx, gift_id).await?;

                    Ok((gift, rating))
                })
            })
            .await?;

        Ok(RateResponse::new(&gift, rating))
    }
}

/// 评分必须是 [1, 5] 内的有限数
fn validate_score(score: f64) -> Result<()> {
    if !score.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(RedemptionError::Validation(format!(
            "评分必须在 {} 到 {} 之间: {}",
            MIN_SCORE, MAX_SCORE, score
        )));
    }
    Ok(())
}

/// 业务错误记 info，系统错误记 warn
fn log_failure(message: &str, err: &RedemptionError) {
    if err.is_business_error() {
        info!(code = err.error_code(), error = %err, "{}", message);
    } else {
        warn!(
            code = err.error_code(),
            retryable = err.is_retryable(),
            error = %err,
            "{}",
            message
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::store::MemoryGiftStore;

    fn setup() -> (Arc<MemoryGiftStore>, RedemptionService<MemoryGiftStore>) {
        let store = Arc::new(MemoryGiftStore::new(Duration::from_millis(500)));
        let service = RedemptionService::new(store.clone());
        (store, service)
    }

    #[test]
    fn test_validate_score() {
        assert!(validate_score(1.0).is_ok());
        assert!(validate_score(5.0).is_ok());
        assert!(validate_score(3.5).is_ok());
        assert!(validate_score(0.9).is_err());
        assert!(validate_score(5.1).is_err());
        assert!(validate_score(f64::NAN).is_err());
        assert!(validate_score(f64::INFINITY).is_err());
    }

    #[tokio::test]
    async fn test_redeem_records_frozen_total_point() {
        let (store, service) = setup();
        let gift = store.seed_gift("咖啡券", 150, 10);

        let response = service
            .redeem(RedeemRequest {
                user_id: 1,
                gift_id: gift.id,
                quantity: 2,
            })
            .await
            .unwrap();
        assert_eq!(response.total_point, 300);
        assert_eq!(response.gift_name, "咖啡券");

        store.set_point_cost(gift.id, 999);
        let history = service.list_user_redemptions(1, 10).await.unwrap();
        assert_eq!(history[0].total_point, 300);
    }

    #[tokio::test]
    async fn test_redeem_overflow_rolls_back() {
        let (store, service) = setup();
        let gift = store.seed_gift("金条", i64::MAX / 2, 10);

        let err = service
            .redeem(RedeemRequest {
                user_id: 1,
                gift_id: gift.id,
                quantity: 3,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RedemptionError::Validation(_)));
        assert_eq!(store.find_gift(gift.id).await.unwrap().unwrap().stock, 10);
        assert!(store.redemptions().is_empty());
    }

    #[tokio::test]
    async fn test_rate_missing_gift() {
        let (_store, service) = setup();
        let err = service
            .rate(RateRequest {
                user_id: 1,
                gift_id: 404,
                score: 4.0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RedemptionError::GiftNotFound(404)));
    }

    #[tokio::test]
    async fn test_rate_waits_for_gift_lock_before_writing() {
        use crate::store::StoreTx;

        let (store, service) = setup();
        let gift = store.seed_gift("咖啡券", 150, 10);
        service
            .redeem(RedeemRequest {
                user_id: 1,
                gift_id: gift.id,
                quantity: 1,
            })
            .await
            .unwrap();

        let mut holder = store.begin().await.unwrap();
        holder.lock_gift(gift.id).await.unwrap();

        let service = Arc::new(service);
        let pending = {
            let service = service.clone();
            let gift_id = gift.id;
            tokio::spawn(async move {
                service
                    .rate(RateRequest {
                        user_id: 1,
                        gift_id,
                        score: 4.0,
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished());
        assert!(store.ratings().is_empty());

        holder.rollback().await.unwrap();
        let response = pending.await.unwrap().unwrap();
        assert_eq!(response.review_count, 1);
        assert_eq!(response.avg_rating, 4.0);
    }

    #[tokio::test]
    async fn test_history_limit_is_clamped() {
        let (store, service) = setup();
        let gift = store.seed_gift("咖啡券", 150, 10);
        for _ in 0..3 {
            service
                .redeem(RedeemRequest {
                    user_id: 8,
                    gift_id: gift.id,
                    quantity: 1,
                })
                .await
                .unwrap();
        }

        assert_eq!(service.list_user_redemptions(8, 0).await.unwrap().len(), 1);
        assert_eq!(service.list_user_redemptions(8, 1000).await.unwrap().len(), 3);
        assert!(service.list_user_redemptions(9, 10).await.unwrap().is_empty());
    }
}
