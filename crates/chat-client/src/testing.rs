//! Scripted HTTP transport shared by the unit tests

use std::collections::HashMap;

use async_trait::async_trait;
use chat_rest::{ApiRequest, HttpTransport, RawResponse, RestResult};
use parking_lot::Mutex;
use serde_json::Value;

/// Answers by path; anything unscripted is a 404
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    responses: Mutex<HashMap<String, RawResponse>>,
    pub(crate) calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub(crate) fn respond(&self, path: &str, status: u16, body: &Value) {
        self.responses
            .lock()
            .insert(path.to_string(), RawResponse::new(status, body.to_string()));
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest, _token: &str) -> RestResult<RawResponse> {
        self.calls
            .lock()
            .push(format!("{} {}", request.method.as_str(), request.path));
        let response = self.responses.lock().get(&request.path).cloned();
        Ok(response.unwrap_or_else(|| {
            RawResponse::new(404, r#"{"code": 10000, "message": "Unknown"}"#)
        }))
    }
}
