//! HTTP transport
//!
//! The dispatcher only needs "send this request, give me status, headers and
//! body". Keeping that behind a trait lets tests script responses.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chat_common::RestConfig;
use percent_encoding::utf8_percent_encode;
use serde_json::Value;

use crate::error::{RestError, RestResult};
use crate::request::{ApiRequest, COMPONENT};

const USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/seung/chat-client, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Status, lower-cased headers and body of one HTTP exchange
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Parse a numeric header, ignoring malformed values
    pub fn header_parsed<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        self.header(name).and_then(|v| v.trim().parse().ok())
    }

    /// Body as JSON; an empty body (204) is `null`
    pub fn json(&self) -> RestResult<Value> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&self.body).map_err(|e| RestError::Decode(e.to_string()))
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs one HTTP call
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send `request`; only connection-level failures are errors
    async fn send(&self, request: &ApiRequest, token: &str) -> RestResult<RawResponse>;
}

/// `reqwest`-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(config: &RestConfig) -> RestResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RestError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest, token: &str) -> RestResult<RawResponse> {
        let url = format!("{}{}", self.base_url, request.path);
        let authorization = request
            .auth
            .clone()
            .or_else(|| (!token.is_empty()).then(|| format!("Bot {token}")));

        let mut builder = self.client.request(request.method.clone(), &url);
        // Webhook-token routes authenticate through the path
        if let Some(authorization) = authorization {
            builder = builder.header("Authorization", authorization);
        }

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(reason) = &request.reason {
            let encoded = utf8_percent_encode(reason, COMPONENT).to_string();
            builder = builder.header("X-Audit-Log-Reason", encoded);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::trace!(route = %request.route_key(), "Sending request");

        let response = builder
            .send()
            .await
            .map_err(|e| RestError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| RestError::Transport(e.to_string()))?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_headers_case_insensitive() {
        let response = RawResponse::new(200, "{}").with_header("X-RateLimit-Remaining", "4");
        assert_eq!(response.header("x-ratelimit-remaining"), Some("4"));
        assert_eq!(response.header_parsed::<u32>("X-RATELIMIT-REMAINING"), Some(4));
        assert_eq!(response.header_parsed::<u32>("x-ratelimit-limit"), None);
    }

    #[test]
    fn test_json_body() {
        assert_eq!(RawResponse::new(204, "").json().unwrap(), Value::Null);
        assert_eq!(
            RawResponse::new(200, r#"{"id":"1"}"#).json().unwrap(),
            json!({"id": "1"})
        );
        assert!(matches!(
            RawResponse::new(200, "not json").json(),
            Err(RestError::Decode(_))
        ));
    }

    #[test]
    fn test_reqwest_transport_builds() {
        let transport = ReqwestTransport::new(&RestConfig::default()).unwrap();
        assert_eq!(transport.base_url, "https://discord.com/api/v6");
    }
}
