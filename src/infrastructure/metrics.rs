// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

use crate::config::settings::MetricsSettings;

/// 安装 Prometheus 导出器并注册指标说明
///
/// 未启用时只注册说明，指标调用在没有 recorder 时为空操作
pub fn init_metrics(settings: &MetricsSettings) {
    if settings.enabled {
        match settings.listen_addr.parse::<SocketAddr>() {
            Ok(addr) => {
                // Ignore error if address is already in use (for development/testing)
                if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
                    warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
                } else {
                    info!("Metrics exporter listening on {}", addr);
                }
            }
            Err(e) => warn!("Invalid metrics address {}: {}", settings.listen_addr, e),
        }
    }

    describe_metrics();
}

fn describe_metrics() {
    describe_counter!(
        "vendor_api_requests_total",
        "Vendor API requests by endpoint and status code"
    );
    describe_histogram!(
        "vendor_api_request_duration_seconds",
        Unit::Seconds,
        "Vendor API request latency"
    );
    describe_gauge!(
        "vendor_api_rate_limit_sleep_seconds_total",
        Unit::Seconds,
        "Time spent waiting on the request window"
    );
    describe_counter!("vendor_api_retries_total", "Retried vendor API requests");
    describe_counter!(
        "sync_records_processed_total",
        "Records upserted by model"
    );
    describe_counter!("sync_cycles_total", "Finished sync cycles by status");
    describe_counter!(
        "watchdog_terminations_total",
        "Sync processes terminated by the watchdog"
    );
}
