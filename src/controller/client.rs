use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use http::{
    header::{HeaderValue, ACCEPT},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{config::ControllerConfig, logger};

fn remove_slash(path: &str) -> &str {
    if let Some(path) = path.strip_prefix('/') {
        path
    } else {
        path
    }
}

/// Controller APIのレスポンス
///
/// ステータスとボディだけを保持し、JSONへの変換は呼び出し側で行う
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerResponse {
    status: StatusCode,
    body: String,
}

impl ControllerResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn status_text(&self) -> &str {
        self.status.canonical_reason().unwrap_or("Unknown Status")
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// 空のボディは null として扱う
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let body = if self.body.trim().is_empty() {
            "null"
        } else {
            self.body.as_str()
        };

        Ok(serde_json::from_str(body)?)
    }

    /// サーバーが返したエラーメッセージ、なければステータスを返す
    pub fn error_message(&self) -> String {
        let message = self.json::<Value>().ok().and_then(|value| {
            ["message", "error"]
                .iter()
                .find_map(|key| value.get(key).and_then(Value::as_str).map(str::to_string))
        });

        match message {
            Some(message) if !message.is_empty() => message,
            _ => format!("{} {}", self.status.as_u16(), self.status_text()),
        }
    }
}

#[derive(Clone)]
pub struct ControllerClient {
    client: reqwest::Client,
    server_url: String,
    token: Option<String>,
}

impl ControllerClient {
    pub fn new(config: &ControllerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let server_url = if let Some(url) = config.url.strip_suffix('/') {
            url.to_string()
        } else {
            config.url.clone()
        };

        Ok(Self {
            client,
            server_url,
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.server_url, remove_slash(path))
    }
}

#[async_trait]
pub trait ControllerRequest: Send + Sync {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ControllerResponse>;
}

#[async_trait]
impl ControllerRequest for ControllerClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ControllerResponse> {
        let mut request = self
            .client
            .request(method.clone(), self.url(path))
            .header(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        if let Some(body) = &body {
            request = request.json(body);
        }

        logger!(debug, "HTTP request {} {}", method, path);

        let response = request.send().await?;

        let status = response.status();
        let body = response.text().await?;

        logger!(debug, "HTTP response {} {} - {}", method, path, status);

        Ok(ControllerResponse::new(status, body))
    }
}

/// GETしてJSONを返す。2xx以外はエラー
pub async fn fetch_json<C: ControllerRequest + ?Sized>(client: &C, path: &str) -> Result<Value> {
    let res = client.request(Method::GET, path, None).await?;

    if !res.is_ok() {
        bail!("GET {} failed: {}", path, res.error_message());
    }

    res.json()
}
