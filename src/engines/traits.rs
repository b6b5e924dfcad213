// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// 查询参数（有序，保证缓存键稳定）
pub type QueryParams = BTreeMap<String, String>;

/// 传输层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 请求失败
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    /// 超时
    #[error("Timeout")]
    Timeout,
    /// 其他错误
    #[error("Other error: {0}")]
    Other(String),
}

/// 拉取错误类型
///
/// 只有 `RetryableTransport` 会被重试，其余错误立即终止当前请求
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    /// 429 或意外状态码，以及网络层失败
    #[error("{message}")]
    RetryableTransport { status: Option<u16>, message: String },
    /// 401
    #[error("authorization failed")]
    Unauthorized,
    /// 404
    #[error("not found: {0}")]
    NotFound(String),
    /// 上游返回结构与约定不符
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

impl FetchError {
    /// 判断错误是否可重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::RetryableTransport { .. })
    }

    /// 构造结构错误
    pub fn malformed(message: impl Into<String>) -> Self {
        FetchError::MalformedPayload(message.into())
    }
}

impl From<EngineError> for FetchError {
    fn from(err: EngineError) -> Self {
        FetchError::RetryableTransport {
            status: None,
            message: err.to_string(),
        }
    }
}

/// HTTP 方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        };
        write!(f, "{}", s)
    }
}

/// API 请求
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP 方法
    pub method: HttpMethod,
    /// 完整 URL（不含查询串）
    pub url: String,
    /// 查询参数
    pub params: QueryParams,
}

/// API 响应
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP状态码
    pub status: u16,
    /// 响应内容
    pub body: String,
    /// 内容类型
    pub content_type: String,
}

impl ApiResponse {
    /// 解析 JSON 响应体
    pub fn json(&self) -> Result<serde_json::Value, FetchError> {
        serde_json::from_str(&self.body)
            .map_err(|e| FetchError::malformed(format!("Invalid JSON body: {}", e)))
    }
}

/// HTTP 传输特质
///
/// 只负责发送一次请求，不做重试、限流和状态码分类
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// 发送请求
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, EngineError>;
}
