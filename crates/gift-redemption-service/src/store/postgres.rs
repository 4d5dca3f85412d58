//! PostgreSQL 存储
//!
//! - 礼品行锁使用 `SELECT ... FOR UPDATE`
//! - 评分唯一性由 `ratings_redemption_id_key` 约束保证，写入使用
//!   `ON CONFLICT (redemption_id) DO NOTHING`，冲突时得到空结果而不是错误
//! - 每个事务通过 `set_config('lock_timeout', ..., true)` 限定行锁等待时间
//! - SQLSTATE 55P03 映射为 `LockTimeout`，40001 / 40P01 映射为 `ConcurrencyConflict`

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use super::{GiftStore, StoreTx};
use crate::error::{RedemptionError, Result};
use crate::models::{Gift, NewRating, NewRedemption, Rating, RatingStats, Redemption};

const LOCK_NOT_AVAILABLE: &str = "55P03";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

const GIFT_COLUMNS: &str = "id, name, description, point_cost, stock, avg_rating, review_count, \
                            created_at, updated_at";
const REDEMPTION_COLUMNS: &str = "id, user_id, gift_id, quantity, total_point, redeemed_at";
const RATING_COLUMNS: &str = "id, user_id, gift_id, redemption_id, score, created_at";

/// 将 SQLx 错误归类为服务错误
///
/// 锁等待超时与序列化失败属于可重试的并发错误，其余原样包装
fn classify(err: sqlx::Error) -> RedemptionError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some(LOCK_NOT_AVAILABLE) => {
                return RedemptionError::LockTimeout {
                    resource: db_err.table().unwrap_or("gifts").to_string(),
                };
            }
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
                return RedemptionError::ConcurrencyConflict;
            }
            _ => {}
        }
    }
    RedemptionError::Database(err)
}

/// PostgreSQL 礼品存储
#[derive(Clone)]
pub struct PgGiftStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgGiftStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl GiftStore for PgGiftStore {
    type Tx = PgStoreTx;

    async fn begin(&self) -> Result<PgStoreTx> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(classify)?;

        Ok(PgStoreTx { tx })
    }

    async fn find_gift(&self, gift_id: i64) -> Result<Option<Gift>> {
        let gift = sqlx::query_as::<_, Gift>(&format!(
            "SELECT {} FROM gifts WHERE id = $1",
            GIFT_COLUMNS
        ))
        .bind(gift_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;

        Ok(gift)
    }

    async fn list_user_redemptions(&self, user_id: i64, limit: i64) -> Result<Vec<Redemption>> {
        let redemptions = sqlx::query_as::<_, Redemption>(&format!(
            r#"
            SELECT {}
            FROM redemptions
            WHERE user_id = $1
            ORDER BY redeemed_at DESC, id DESC
            LIMIT $2
            "#,
            REDEMPTION_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        Ok(redemptions)
    }
}

/// PostgreSQL 事务句柄
///
/// 内部的 `sqlx::Transaction` 在未提交时被 drop 会自动回滚
pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgStoreTx {
    #[instrument(skip(self))]
    async fn lock_gift(&mut self, gift_id: i64) -> Result<Option<Gift>> {
        let gift = sqlx::query_as::<_, Gift>(&format!(
            "SELECT {} FROM gifts WHERE id = $1 FOR UPDATE",
            GIFT_COLUMNS
        ))
        .bind(gift_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)?;

        Ok(gift)
    }

    async fn set_stock(&mut self, gift_id: i64, stock: i32) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE gifts
            SET stock = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(gift_id)
        .bind(stock)
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;

        Ok(())
    }

    async fn insert_redemption(&mut self, new: NewRedemption) -> Result<Redemption> {
        let redemption = sqlx::query_as::<_, Redemption>(&format!(
            r#"
            INSERT INTO redemptions (user_id, gift_id, quantity, total_point, redeemed_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING {}
            "#,
            REDEMPTION_COLUMNS
        ))
        .bind(new.user_id)
        .bind(new.gift_id)
        .bind(new.quantity)
        .bind(new.total_point)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(classify)?;

        Ok(redemption)
    }

    async fn find_unrated_redemption(
        &mut self,
        user_id: i64,
        gift_id: i64,
    ) -> Result<Option<Redemption>> {
        let redemption = sqlx::query_as::<_, Redemption>(&format!(
            r#"
            SELECT {}
            FROM redemptions r
            WHERE r.user_id = $1
              AND r.gift_id = $2
              AND NOT EXISTS (SELECT 1 FROM ratings rt WHERE rt.redemption_id = r.id)
            ORDER BY r.redeemed_at ASC, r.id ASC
            LIMIT 1
            "#,
            REDEMPTION_COLUMNS
        ))
        .bind(user_id)
        .bind(gift_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)?;

        Ok(redemption)
    }

    async fn has_redemption(&mut self, user_id: i64, gift_id: i64) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM redemptions WHERE user_id = $1 AND gift_id = $2)",
        )
        .bind(user_id)
        .bind(gift_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(classify)?;

        Ok(exists)
    }

    #[instrument(skip(self, new), fields(redemption_id = new.redemption_id))]
    async fn insert_rating(&mut self, new: NewRating) -> Result<Option<Rating>> {
        let rating = sqlx::query_as::<_, Rating>(&format!(
            r#"
            INSERT INTO ratings (user_id, gift_id, redemption_id, score, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (redemption_id) DO NOTHING
            RETURNING {}
            "#,
            RATING_COLUMNS
        ))
        .bind(new.user_id)
        .bind(new.gift_id)
        .bind(new.redemption_id)
        .bind(new.score)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)?;

        if rating.is_none() {
            debug!("rating slot already taken");
        }
        Ok(rating)
    }

    async fn rating_stats(&mut self, gift_id: i64) -> Result<RatingStats> {
        let stats = sqlx::query_as::<_, RatingStats>(
            r#"
            SELECT COALESCE(AVG(score), 0)::float8 AS avg_rating,
                   COUNT(*)::int4 AS review_count
            FROM ratings
            WHERE gift_id = $1
            "#,
        )
        .bind(gift_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(classify)?;

        Ok(stats)
    }

    async fn set_rating_stats(&mut self, gift_id: i64, stats: RatingStats) -> Result<Gift> {
        sqlx::query_as::<_, Gift>(&format!(
            r#"
            UPDATE gifts
            SET avg_rating = $2, review_count = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            GIFT_COLUMNS
        ))
        .bind(gift_id)
        .bind(stats.avg_rating)
        .bind(stats.review_count)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)?
        .ok_or(RedemptionError::GiftNotFound(gift_id))
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(classify)
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.map_err(classify)
    }
}
