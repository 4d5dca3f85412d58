//! 按键互斥锁
//!
//! 在没有原生行锁的后端上模拟 `SELECT ... FOR UPDATE`：每个键一把异步互斥锁，
//! 持有方拿到的是 owned guard，可以跨 await 保存在事务句柄中，随句柄 drop 释放。

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::error::{RedemptionError, Result};

/// 按键互斥锁表
///
/// 槽位按需创建且不回收，键空间为礼品 ID / 兑换记录 ID，规模与数据行数同阶
pub struct KeyedLocks {
    name: &'static str,
    slots: DashMap<i64, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: DashMap::new(),
        }
    }

    /// 获取某个键上的锁，超时返回 `LockTimeout`
    pub async fn acquire(&self, key: i64, timeout: Duration) -> Result<OwnedMutexGuard<()>> {
        // DashMap 的分片锁不能跨 await 持有，先克隆出 Arc 再等待
        let slot = self.slots.entry(key).or_default().clone();

        match tokio::time::timeout(timeout, slot.lock_owned()).await {
            Ok(guard) => {
                debug!(lock = self.name, key, "lock acquired");
                Ok(guard)
            }
            Err(_) => {
                warn!(lock = self.name, key, ?timeout, "lock wait timed out");
                Err(RedemptionError::LockTimeout {
                    resource: format!("{}:{}", self.name, key),
                })
            }
        }
    }
}
