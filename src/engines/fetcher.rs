// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::engines::request_window::RequestWindow;
use crate::engines::traits::{ApiRequest, ApiResponse, FetchError, HttpMethod, HttpTransport, QueryParams};
use crate::utils::retry_policy::RetryPolicy;

const BODY_PREVIEW_LIMIT: usize = 300;

/// 截断响应体用于日志
pub fn preview_body(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(BODY_PREVIEW_LIMIT) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// 按端点统计的调用次数与耗时
#[derive(Debug, Default, Clone)]
pub struct ApiCallStats {
    calls: BTreeMap<String, u64>,
    durations: BTreeMap<String, Duration>,
}

impl ApiCallStats {
    /// 记录一次调用
    pub fn record(&mut self, endpoint: &str, elapsed: Duration) {
        *self.calls.entry(endpoint.to_string()).or_default() += 1;
        *self.durations.entry(endpoint.to_string()).or_default() += elapsed;
    }

    /// 端点调用次数
    pub fn calls(&self, endpoint: &str) -> u64 {
        self.calls.get(endpoint).copied().unwrap_or(0)
    }

    /// 全部端点调用次数之和
    pub fn total_calls(&self) -> u64 {
        self.calls.values().sum()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
        self.durations.clear();
    }

    /// 输出 `API Stats:` 汇总日志
    pub fn log_summary(&self) {
        let mut lines = Vec::with_capacity(self.calls.len());
        for (endpoint, calls) in &self.calls {
            let total = self.durations.get(endpoint).copied().unwrap_or_default();
            let avg = if *calls > 0 {
                total.as_secs_f64() / *calls as f64
            } else {
                0.0
            };
            lines.push(format!(
                "{}: calls={} total={:.2}s avg={:.3}s",
                endpoint,
                calls,
                total.as_secs_f64(),
                avg
            ));
        }
        info!("API Stats: {}", lines.join("; "));
    }
}

/// 弹性请求器
///
/// 负责限流、重试退避和状态码分类。滑动窗口由实例独占，
/// 同一时刻只有一个请求在途。
pub struct ResilientFetcher {
    transport: Arc<dyn HttpTransport>,
    window: RequestWindow,
    retry: RetryPolicy,
    api_sleep_time: Duration,
}

impl ResilientFetcher {
    /// 创建弹性请求器
    ///
    /// # 参数
    ///
    /// * `transport` - HTTP 传输
    /// * `window` - 请求滑动窗口
    /// * `retry` - 重试策略
    pub fn new(transport: Arc<dyn HttpTransport>, window: RequestWindow, retry: RetryPolicy) -> Self {
        Self {
            transport,
            window,
            retry,
            api_sleep_time: Duration::ZERO,
        }
    }

    /// 因限流累计休眠的时间
    pub fn api_sleep_time(&self) -> Duration {
        self.api_sleep_time
    }

    /// 窗口内的请求数
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// 发送请求，可重试错误按策略自动重试
    ///
    /// # 参数
    ///
    /// * `method` - HTTP 方法
    /// * `url` - 完整 URL
    /// * `params` - 查询参数
    ///
    /// # 返回值
    ///
    /// * `Ok(ApiResponse)` - 状态码为 200 的响应
    /// * `Err(FetchError)` - 不可重试的错误，或重试耗尽后的最后一次错误
    pub async fn request(
        &mut self,
        method: HttpMethod,
        url: &str,
        params: &QueryParams,
    ) -> Result<ApiResponse, FetchError> {
        let request = ApiRequest {
            method,
            url: url.to_string(),
            params: params.clone(),
        };

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.send_once(&request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && self.retry.should_retry(attempt) => {
                    let sleep = self.retry.calculate_backoff(attempt);
                    warn!(
                        "Request to {} failed (attempt {}/{}): {}. Retrying in {:.2}s",
                        url,
                        attempt,
                        self.retry.max_attempts,
                        e,
                        sleep.as_secs_f64()
                    );
                    counter!("vendor_api_retries_total").increment(1);
                    tokio::time::sleep(sleep).await;
                }
                Err(e) => {
                    if e.is_retryable() {
                        error!(
                            "Request to {} failed after {} attempts: {}",
                            url, attempt, e
                        );
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn wait_for_rate_limit(&mut self) {
        let wait = self.window.wait_time(Instant::now());
        if wait.is_zero() {
            return;
        }

        info!(
            "Rate limit reached ({} requests in window), sleeping for {:.2}s",
            self.window.len(),
            wait.as_secs_f64()
        );
        tokio::time::sleep(wait).await;
        self.api_sleep_time += wait;
        gauge!("vendor_api_rate_limit_sleep_seconds_total").set(self.api_sleep_time.as_secs_f64());
        self.window.purge(Instant::now());
    }

    async fn send_once(&mut self, request: &ApiRequest) -> Result<ApiResponse, FetchError> {
        self.wait_for_rate_limit().await;
        self.window.record(Instant::now());

        debug!("{} {} params={:?}", request.method, request.url, request.params);
        let endpoint = endpoint_label(&request.url);
        let started = Instant::now();
        let result = self.transport.execute(request).await;
        histogram!("vendor_api_request_duration_seconds", "endpoint" => endpoint.clone())
            .record(started.elapsed().as_secs_f64());

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                counter!("vendor_api_requests_total", "endpoint" => endpoint, "status" => "transport_error")
                    .increment(1);
                return Err(e.into());
            }
        };

        counter!("vendor_api_requests_total", "endpoint" => endpoint, "status" => response.status.to_string())
            .increment(1);
        classify(response)
    }
}

/// 指标用的端点名，取 URL 路径中最后一个非数字段
fn endpoint_label(url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .unwrap_or_default()
        .rsplit('/')
        .find(|segment| !segment.is_empty() && !segment.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or("unknown")
        .to_string()
}

/// 按状态码分类响应
pub fn classify(response: ApiResponse) -> Result<ApiResponse, FetchError> {
    match response.status {
        200 => Ok(response),
        429 => {
            info!("Rate limit reached. Waiting and retrying...");
            Err(FetchError::RetryableTransport {
                status: Some(429),
                message: "rate limit reached".to_string(),
            })
        }
        401 => {
            error!("Authorization failed with status code 401.");
            Err(FetchError::Unauthorized)
        }
        404 => Err(FetchError::NotFound("Received 404".to_string())),
        status => {
            let preview = preview_body(&response.body);
            error!(
                "Failed to fetch data from API with status code {}: {}",
                status, preview
            );
            Err(FetchError::RetryableTransport {
                status: Some(status),
                message: format!("Request failed with status code {}: {}", status, preview),
            })
        }
    }
}
