//! 应用状态定义

use std::sync::Arc;

use crate::service::RedemptionService;
use crate::store::GiftStore;

/// Axum 应用共享状态
pub struct AppState<S: GiftStore> {
    pub service: Arc<RedemptionService<S>>,
}

impl<S: GiftStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

impl<S: GiftStore> AppState<S> {
    /// 由存储后端构造服务与状态
    pub fn new(store: Arc<S>) -> Self {
        Self {
            service: Arc::new(RedemptionService::new(store)),
        }
    }
}
