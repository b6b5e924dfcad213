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

use crate::engines::traits::{ApiRequest, ApiResponse, EngineError, HttpMethod, HttpTransport};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use std::time::Duration;

/// 传输引擎
///
/// 基于reqwest实现的HTTP传输，附带静态令牌认证头
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// 创建传输引擎
    ///
    /// # 参数
    ///
    /// * `token` - API 令牌，原样写入 `Authorization` 头
    /// * `timeout` - 单次请求超时时间
    ///
    /// # 返回值
    ///
    /// * `Ok(ReqwestTransport)` - 传输引擎
    /// * `Err(EngineError)` - 令牌非法或客户端构建失败
    pub fn new(token: &str, timeout: Duration) -> Result<Self, EngineError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(token)
            .map_err(|e| EngineError::Other(format!("Invalid token header: {}", e)))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .user_agent("repairshopr-sync/0.1")
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    /// 发送一次HTTP请求
    ///
    /// # 参数
    ///
    /// * `request` - API 请求
    ///
    /// # 返回值
    ///
    /// * `Ok(ApiResponse)` - 任意状态码的响应
    /// * `Err(EngineError)` - 网络层错误
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, EngineError> {
        let builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Put => self.client.put(&request.url),
            HttpMethod::Delete => self.client.delete(&request.url),
        };

        let response = builder.query(&request.params).send().await.map_err(|e| {
            if e.is_timeout() {
                EngineError::Timeout
            } else {
                EngineError::RequestFailed(e)
            }
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json")
            .to_string();

        let body = response.text().await?;

        Ok(ApiResponse {
            status,
            body,
            content_type,
        })
    }
}

#[cfg(test)]
#[path = "reqwest_engine_test.rs"]
mod tests;
