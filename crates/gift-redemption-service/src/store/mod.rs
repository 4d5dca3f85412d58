//! 事务性存储层
//!
//! 服务层只依赖这里的两个 trait，不感知具体后端：
//!
//! - [`GiftStore`]：开启事务，以及不加锁的只读查询
//! - [`StoreTx`]：一个进行中的事务，所有写操作都必须经由它完成
//!
//! ## 后端
//!
//! - `postgres`：基于 SQLx，使用原生 `FOR UPDATE` 行锁与唯一约束
//! - `memory`：进程内实现，用按键互斥锁模拟行锁与唯一索引
//!
//! ## 事务语义
//!
//! - 未提交的事务句柄被 drop 时必须回滚（覆盖 panic 与请求取消）
//! - 行锁持有到提交或回滚为止
//! - 加锁顺序固定为：礼品行 → 评分唯一槽位。评分行外键会在礼品行上加共享锁，
//!   因此礼品行的排他锁必须在写评分之前拿到，否则同礼品的并发评分会死锁

mod locks;
mod memory;
mod postgres;

pub use locks::KeyedLocks;
pub use memory::{MemoryGiftStore, MemoryStoreTx};
pub use postgres::{PgGiftStore, PgStoreTx};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Gift, NewRating, NewRedemption, Rating, RatingStats, Redemption};

/// 事务性礼品存储
#[async_trait]
pub trait GiftStore: Send + Sync + 'static {
    type Tx: StoreTx;

    /// 开启事务
    async fn begin(&self) -> Result<Self::Tx>;

    /// 不加锁读取礼品（目录读，只看已提交数据）
    async fn find_gift(&self, gift_id: i64) -> Result<Option<Gift>>;

    /// 用户兑换历史，按兑换时间倒序
    async fn list_user_redemptions(&self, user_id: i64, limit: i64) -> Result<Vec<Redemption>>;
}

/// 进行中的事务
#[async_trait]
pub trait StoreTx: Send {
    /// 加锁读取礼品行（`SELECT ... FOR UPDATE` 语义），礼品不存在返回 None
    ///
    /// 同一礼品上的加锁读严格串行，不同礼品互不阻塞
    async fn lock_gift(&mut self, gift_id: i64) -> Result<Option<Gift>>;

    /// 写入库存，调用前必须已在本事务内锁定该礼品
    async fn set_stock(&mut self, gift_id: i64, stock: i32) -> Result<()>;

    /// 插入兑换记录，ID 与兑换时间由存储层分配
    async fn insert_redemption(&mut self, new: NewRedemption) -> Result<Redemption>;

    /// 查找用户在该礼品下最早的一条未评分兑换记录（按兑换时间、ID 排序）
    async fn find_unrated_redemption(
        &mut self,
        user_id: i64,
        gift_id: i64,
    ) -> Result<Option<Redemption>>;

    /// 用户是否兑换过该礼品
    async fn has_redemption(&mut self, user_id: i64, gift_id: i64) -> Result<bool>;

    /// 插入评分
    ///
    /// 该兑换记录已有评分时返回 `Ok(None)`（唯一约束冲突，结构化结果），
    /// 并发写入同一兑换记录时后到者等待先到者结束后再判定
    async fn insert_rating(&mut self, new: NewRating) -> Result<Option<Rating>>;

    /// 统计礼品的评分聚合值（包含本事务内刚插入的评分）
    async fn rating_stats(&mut self, gift_id: i64) -> Result<RatingStats>;

    /// 写回礼品评分聚合字段并刷新修改时间，调用前必须已锁定该礼品
    async fn set_rating_stats(&mut self, gift_id: i64, stats: RatingStats) -> Result<Gift>;

    /// 提交事务并释放所有锁
    async fn commit(self) -> Result<()>;

    /// 回滚事务并释放所有锁
    async fn rollback(self) -> Result<()>;
}
