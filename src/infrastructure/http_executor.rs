//! HTTP 执行器 - 基础设施层
//!
//! 持有唯一的 reqwest::Client，只暴露"发请求拿 JSON"的能力

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// HTTP 执行器
///
/// 职责：
/// - 持有连接池（Client 内部为 Arc，clone 代价很低）
/// - 统一附加鉴权头
/// - 把非 2xx 响应转换为 `ApiError::BadResponse`，message 原样保留
/// - 不认识成绩 / 升级决定
#[derive(Clone)]
pub struct HttpExecutor {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpExecutor {
    /// 创建新的 HTTP 执行器
    pub fn new(config: &Config) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET 并反序列化为指定类型
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> AppResult<T> {
        let url = self.url(path);
        debug!("GET {} {:?}", url, query);
        let request = self.client.get(&url).query(query);
        self.send(path, request).await
    }

    /// POST JSON 并反序列化响应
    ///
    /// 空响应体（204）按 `null` 处理
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> AppResult<T> {
        let url = self.url(path);
        debug!("POST {} {}", url, serde_json::to_string(body)?);
        let request = self.client.post(&url).json(body);
        self.send(path, request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send<T: DeserializeOwned>(&self, path: &str, request: RequestBuilder) -> AppResult<T> {
        let request = if self.token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.token)
        };

        let response = request
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(path, e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::api_request_failed(path, e))?;

        if !status.is_success() {
            return Err(AppError::bad_response(
                path,
                status.as_u16(),
                extract_error_message(status, &text),
            ));
        }

        let value: JsonValue = if text.trim().is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_str(&text)?
        };
        Ok(serde_json::from_value(value)?)
    }
}

/// 从错误响应体中提取提示文本
///
/// 依次尝试 `detail` / `message` / `error`，都没有时返回原始响应体
fn extract_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<JsonValue>(body) {
        for key in ["detail", "message", "error"] {
            if let Some(msg) = value.get(key).and_then(|v| v.as_str()) {
                return msg.to_string();
            }
        }
    }

    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("未知错误")
            .to_string()
    } else {
        body.trim().to_string()
    }
}
