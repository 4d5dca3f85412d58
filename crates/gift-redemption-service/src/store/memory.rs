//! 进程内存储
//!
//! 用于本地开发与测试，语义上对齐 PostgreSQL 后端：
//!
//! - 礼品行锁：按礼品 ID 的异步互斥锁，持有到事务结束
//! - 评分唯一约束：按兑换记录 ID 的互斥锁 + 已提交数据检查，占槽位前先持有礼品行锁，
//!   并发写同一兑换记录时后到者等待，先到者提交后判定为冲突
//! - 写入先缓存在事务句柄内，提交时在一把写锁下整体发布，礼品只回写库存与评分聚合；
//!   句柄被 drop 即回滚，缓存丢弃、锁释放

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, instrument};

use super::locks::KeyedLocks;
use super::{GiftStore, StoreTx};
use crate::error::{RedemptionError, Result};
use crate::models::{Gift, NewRating, NewRedemption, Rating, RatingStats, Redemption};

/// 已提交数据
#[derive(Default)]
struct Tables {
    gifts: HashMap<i64, Gift>,
    redemptions: Vec<Redemption>,
    ratings: Vec<Rating>,
}

struct Shared {
    tables: RwLock<Tables>,
    gift_locks: KeyedLocks,
    rating_slots: KeyedLocks,
    next_gift_id: AtomicI64,
    next_redemption_id: AtomicI64,
    next_rating_id: AtomicI64,
}

/// 进程内礼品存储
#[derive(Clone)]
pub struct MemoryGiftStore {
    shared: Arc<Shared>,
    lock_timeout: Duration,
}

impl MemoryGiftStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: RwLock::new(Tables::default()),
                gift_locks: KeyedLocks::new("gift"),
                rating_slots: KeyedLocks::new("rating.redemption_id"),
                next_gift_id: AtomicI64::new(1),
                next_redemption_id: AtomicI64::new(1),
                next_rating_id: AtomicI64::new(1),
            }),
            lock_timeout,
        }
    }

    /// 写入一个礼品（代替礼品目录的建档操作，用于开发环境与测试）
    pub fn seed_gift(&self, name: &str, point_cost: i64, stock: i32) -> Gift {
        let now = Utc::now();
        let gift = Gift {
            id: self.shared.next_gift_id.fetch_add(1, Ordering::SeqCst),
            name: name.to_string(),
            description: None,
            point_cost,
            stock,
            avg_rating: 0.0,
            review_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.shared
            .tables
            .write()
            .gifts
            .insert(gift.id, gift.clone());
        gift
    }

    /// 修改礼品积分价格（模拟目录侧调价）
    pub fn set_point_cost(&self, gift_id: i64, point_cost: i64) {
        if let Some(gift) = self.shared.tables.write().gifts.get_mut(&gift_id) {
            gift.point_cost = point_cost;
            gift.updated_at = Utc::now();
        }
    }

    /// 已提交的兑换记录快照
    pub fn redemptions(&self) -> Vec<Redemption> {
        self.shared.tables.read().redemptions.clone()
    }

    /// 已提交的评分快照
    pub fn ratings(&self) -> Vec<Rating> {
        self.shared.tables.read().ratings.clone()
    }
}

#[async_trait]
impl GiftStore for MemoryGiftStore {
    type Tx = MemoryStoreTx;

    async fn begin(&self) -> Result<MemoryStoreTx> {
        Ok(MemoryStoreTx {
            shared: self.shared.clone(),
            lock_timeout: self.lock_timeout,
            guards: Vec::new(),
            held_rating_slots: HashSet::new(),
            locked_gifts: HashMap::new(),
            pending_redemptions: Vec::new(),
            pending_ratings: Vec::new(),
        })
    }

    async fn find_gift(&self, gift_id: i64) -> Result<Option<Gift>> {
        Ok(self.shared.tables.read().gifts.get(&gift_id).cloned())
    }

    async fn list_user_redemptions(&self, user_id: i64, limit: i64) -> Result<Vec<Redemption>> {
        let tables = self.shared.tables.read();
        let mut items: Vec<Redemption> = tables
            .redemptions
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.redeemed_at.cmp(&a.redeemed_at).then(b.id.cmp(&a.id)));
        items.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(items)
    }
}

/// 进程内事务句柄
pub struct MemoryStoreTx {
    shared: Arc<Shared>,
    lock_timeout: Duration,
    /// 本事务持有的所有锁，随句柄一起释放
    guards: Vec<OwnedMutexGuard<()>>,
    held_rating_slots: HashSet<i64>,
    /// 已加锁礼品的工作副本
    locked_gifts: HashMap<i64, Gift>,
    pending_redemptions: Vec<Redemption>,
    pending_ratings: Vec<Rating>,
}

impl MemoryStoreTx {
    fn locked_gift_mut(&mut self, gift_id: i64) -> Result<&mut Gift> {
        self.locked_gifts.get_mut(&gift_id).ok_or_else(|| {
            RedemptionError::Internal(format!("礼品未在当前事务内加锁: gift_id={}", gift_id))
        })
    }
}

#[async_trait]
impl StoreTx for MemoryStoreTx {
    #[instrument(skip(self))]
    async fn lock_gift(&mut self, gift_id: i64) -> Result<Option<Gift>> {
        if let Some(gift) = self.locked_gifts.get(&gift_id) {
            return Ok(Some(gift.clone()));
        }

        if !self.shared.tables.read().gifts.contains_key(&gift_id) {
            return Ok(None);
        }

        let guard = self
            .shared
            .gift_locks
            .acquire(gift_id, self.lock_timeout)
            .await?;

        // 拿到锁之后重新读取，看到的是上一个持锁者提交后的状态
        let Some(gift) = self.shared.tables.read().gifts.get(&gift_id).cloned() else {
            return Ok(None);
        };

        self.guards.push(guard);
        self.locked_gifts.insert(gift_id, gift.clone());
        Ok(Some(gift))
    }

    async fn set_stock(&mut self, gift_id: i64, stock: i32) -> Result<()> {
        if stock < 0 {
            return Err(RedemptionError::Internal(format!(
                "库存不能为负: gift_id={}, stock={}",
                gift_id, stock
            )));
        }

        let gift = self.locked_gift_mut(gift_id)?;
        gift.stock = stock;
        gift.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_redemption(&mut self, new: NewRedemption) -> Result<Redemption> {
        if !self.shared.tables.read().gifts.contains_key(&new.gift_id) {
            return Err(RedemptionError::GiftNotFound(new.gift_id));
        }

        let redemption = Redemption {
            id: self.shared.next_redemption_id.fetch_add(1, Ordering::SeqCst),
            user_id: new.user_id,
            gift_id: new.gift_id,
            quantity: new.quantity,
            total_point: new.total_point,
            redeemed_at: Utc::now(),
        };
        self.pending_redemptions.push(redemption.clone());
        Ok(redemption)
    }

    async fn find_unrated_redemption(
        &mut self,
        user_id: i64,
        gift_id: i64,
    ) -> Result<Option<Redemption>> {
        let tables = self.shared.tables.read();

        let rated: HashSet<i64> = tables
            .ratings
            .iter()
            .chain(self.pending_ratings.iter())
            .map(|r| r.redemption_id)
            .collect();

        let found = tables
            .redemptions
            .iter()
            .chain(self.pending_redemptions.iter())
            .filter(|r| r.user_id == user_id && r.gift_id == gift_id && !rated.contains(&r.id))
            .min_by(|a, b| a.redeemed_at.cmp(&b.redeemed_at).then(a.id.cmp(&b.id)))
            .cloned();

        Ok(found)
    }

    async fn has_redemption(&mut self, user_id: i64, gift_id: i64) -> Result<bool> {
        let tables = self.shared.tables.read();
        Ok(tables
            .redemptions
            .iter()
            .chain(self.pending_redemptions.iter())
            .any(|r| r.user_id == user_id && r.gift_id == gift_id))
    }

    #[instrument(skip(self, new), fields(redemption_id = new.redemption_id))]
    async fn insert_rating(&mut self, new: NewRating) -> Result<Option<Rating>> {
        // 与 PostgreSQL 外键锁对齐：先持有礼品行锁，再占评分槽位
        if !self.locked_gifts.contains_key(&new.gift_id) {
            self.lock_gift(new.gift_id)
                .await?
                .ok_or(RedemptionError::GiftNotFound(new.gift_id))?;
        }

        if !self.held_rating_slots.contains(&new.redemption_id) {
            let guard = self
                .shared
                .rating_slots
                .acquire(new.redemption_id, self.lock_timeout)
                .await?;
            self.guards.push(guard);
            self.held_rating_slots.insert(new.redemption_id);
        }

        let (exists, redemption_known) = {
            let tables = self.shared.tables.read();
            let exists = tables
                .ratings
                .iter()
                .chain(self.pending_ratings.iter())
                .any(|r| r.redemption_id == new.redemption_id);
            let redemption_known = tables
                .redemptions
                .iter()
                .chain(self.pending_redemptions.iter())
                .any(|r| r.id == new.redemption_id);
            (exists, redemption_known)
        };

        if exists {
            debug!("rating slot already taken");
            return Ok(None);
        }

        if !redemption_known {
            return Err(RedemptionError::Internal(format!(
                "兑换记录不存在: redemption_id={}",
                new.redemption_id
            )));
        }

        let rating = Rating {
            id: self.shared.next_rating_id.fetch_add(1, Ordering::SeqCst),
            user_id: new.user_id,
            gift_id: new.gift_id,
            redemption_id: new.redemption_id,
            score: new.score,
            created_at: Utc::now(),
        };
        self.pending_ratings.push(rating.clone());
        Ok(Some(rating))
    }

    async fn rating_stats(&mut self, gift_id: i64) -> Result<RatingStats> {
        let tables = self.shared.tables.read();
        Ok(RatingStats::from_scores(
            tables
                .ratings
                .iter()
                .chain(self.pending_ratings.iter())
                .filter(|r| r.gift_id == gift_id)
                .map(|r| r.score),
        ))
    }

    async fn set_rating_stats(&mut self, gift_id: i64, stats: RatingStats) -> Result<Gift> {
        let gift = self.locked_gift_mut(gift_id)?;
        gift.avg_rating = stats.avg_rating;
        gift.review_count = stats.review_count;
        gift.updated_at = Utc::now();
        Ok(gift.clone())
    }

    async fn commit(self) -> Result<()> {
        let MemoryStoreTx {
            shared,
            guards,
            locked_gifts,
            mut pending_redemptions,
            mut pending_ratings,
            ..
        } = self;

        {
            let mut tables = shared.tables.write();
            // 只回写本事务负责的字段，目录侧字段（名称、价格等）保持已提交值
            for (id, changed) in locked_gifts {
                if let Some(gift) = tables.gifts.get_mut(&id) {
                    gift.stock = changed.stock;
                    gift.avg_rating = changed.avg_rating;
                    gift.review_count = changed.review_count;
                    gift.updated_at = changed.updated_at;
                }
            }
            tables.redemptions.append(&mut pending_redemptions);
            tables.ratings.append(&mut pending_ratings);
        }

        // 数据发布之后才释放锁
        drop(guards);
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        debug!(
            discarded_redemptions = self.pending_redemptions.len(),
            discarded_ratings = self.pending_ratings.len(),
            "memory transaction rolled back"
        );
        drop(self);
        Ok(())
    }
}
