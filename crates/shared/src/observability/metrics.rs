//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册通用指标描述
///
/// 这些描述会出现在 /metrics 端点的 HELP 注释中
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!("gift_redemptions_total", "Total number of gift redemptions");
    metrics::describe_histogram!(
        "gift_redemption_duration_seconds",
        "Gift redemption duration in seconds"
    );

    metrics::describe_counter!("gift_ratings_total", "Total number of gift ratings");
    metrics::describe_histogram!(
        "gift_rating_duration_seconds",
        "Gift rating duration in seconds"
    );

    metrics::describe_gauge!("gift_remaining_stock", "Remaining stock for gifts");

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录礼品兑换
///
/// status 取业务错误码的小写形式，如 success / insufficient_stock
#[inline]
pub fn record_redemption(status: &str, duration_secs: f64) {
    metrics::counter!(
        "gift_redemptions_total",
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!("gift_redemption_duration_seconds").record(duration_secs);
}

/// 记录礼品评分
#[inline]
pub fn record_rating(status: &str, duration_secs: f64) {
    metrics::counter!(
        "gift_ratings_total",
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!("gift_rating_duration_seconds").record(duration_secs);
}

/// 更新礼品剩余库存
#[inline]
pub fn set_gift_stock(gift_id: i64, stock: f64) {
    metrics::gauge!(
        "gift_remaining_stock",
        "gift_id" => gift_id.to_string()
    )
    .set(stock);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_functions_do_not_panic() {
        // 即使没有初始化 recorder，这些函数也不应该 panic
        record_http_request("POST", "/api/v1/gifts/1/redeem", 201, 0.1);
        record_redemption("success", 0.3);
        record_redemption("insufficient_stock", 0.01);
        record_rating("already_rated", 0.02);
        set_gift_stock(1, 5.0);
    }

    #[test]
    fn test_handle_absent_before_init() {
        // 未初始化时不会 panic，只可能为 None 或其他测试已安装的 handle
        let _ = get_handle();
    }
}
