//! 礼品兑换服务
//!
//! 提供礼品兑换、评分与兑换历史查询的 REST API。

use std::sync::Arc;
use std::time::Duration;

use gift_redemption::{AppState, GiftStore, MemoryGiftStore, PgGiftStore, build_router};
use gift_shared::{
    config::{AppConfig, StorageBackend},
    database::Database,
    observability,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

const SERVICE_NAME: &str = "gift-redemption-service";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load(SERVICE_NAME)?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!(
        environment = %config.environment,
        backend = ?config.store.backend,
        lock_timeout_ms = config.store.lock_timeout_ms,
        "Starting {} on {}",
        SERVICE_NAME,
        config.server_addr()
    );

    match config.store.backend {
        StorageBackend::Postgres => {
            let db = Database::connect(&config.database).await?;
            if config.database.run_migrations {
                db.run_migrations().await?;
            }

            let store = Arc::new(PgGiftStore::new(
                db.pool().clone(),
                config.store.lock_timeout(),
            ));
            serve(&config, store).await?;

            db.close().await;
        }
        StorageBackend::Memory => {
            if config.is_production() {
                warn!("内存存储不持久化数据，不应在生产环境使用");
            }

            let store = Arc::new(MemoryGiftStore::new(config.store.lock_timeout()));
            seed_demo_gifts(&store);
            serve(&config, store).await?;
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn serve<S: GiftStore>(config: &AppConfig, store: Arc<S>) -> anyhow::Result<()> {
    let app = build_router(
        AppState::new(store),
        Duration::from_secs(config.server.request_timeout_seconds),
    );

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    // 优雅关闭：收到 SIGTERM 或 Ctrl+C 时停止接收新连接，等待已有请求处理完毕
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// 内存模式下没有礼品目录，写入几条演示数据
fn seed_demo_gifts(store: &MemoryGiftStore) {
    for (name, point_cost, stock) in [("保温杯", 200, 50), ("帆布袋", 80, 100), ("蓝牙耳机", 1200, 5)]
    {
        let gift = store.seed_gift(name, point_cost, stock);
        info!(gift_id = gift.id, name = %gift.name, stock = gift.stock, "demo gift seeded");
    }
}

/// 监听关闭信号
///
/// K8s 通过 SIGTERM 通知 Pod 停止；本地开发通过 Ctrl+C。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
