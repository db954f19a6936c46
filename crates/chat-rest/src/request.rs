//! API request

use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Method;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{RestError, RestResult};
use crate::route::route_key;

/// Everything outside the RFC 3986 unreserved characters
pub(crate) const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// One REST call waiting in a bucket.
///
/// Everything but the attempt counter is fixed once the request is enqueued.
pub struct ApiRequest {
    pub method: Method,
    /// Route template as given, e.g. `/channels/{}/messages/{}`
    pub template: String,
    /// Template with positional substitutions applied
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Sent as `X-Audit-Log-Reason`
    pub reason: Option<String>,
    /// Replaces the bot authorization for user-scoped calls
    pub auth: Option<String>,
    pub(crate) attempts: u32,
    responder: Option<oneshot::Sender<RestResult<Value>>>,
}

impl ApiRequest {
    /// Build a request, substituting each `{}` in `template` with the next
    /// parameter (url-encoded)
    pub fn new<P: fmt::Display>(method: Method, template: &str, params: &[P]) -> Self {
        let mut params = params.iter();
        let mut path = String::with_capacity(template.len() + 20);
        let mut rest = template;

        while let Some(pos) = rest.find("{}") {
            path.push_str(&rest[..pos]);
            match params.next() {
                Some(param) => {
                    let param = param.to_string();
                    path.extend(utf8_percent_encode(&param, COMPONENT));
                }
                None => path.push_str("{}"),
            }
            rest = &rest[pos + 2..];
        }
        path.push_str(rest);

        Self {
            method,
            template: template.to_string(),
            path,
            query: Vec::new(),
            body: None,
            reason: None,
            auth: None,
            attempts: 0,
            responder: None,
        }
    }

    pub fn get(template: &str, params: &[impl fmt::Display]) -> Self {
        Self::new(Method::GET, template, params)
    }

    pub fn post(template: &str, params: &[impl fmt::Display]) -> Self {
        Self::new(Method::POST, template, params)
    }

    pub fn patch(template: &str, params: &[impl fmt::Display]) -> Self {
        Self::new(Method::PATCH, template, params)
    }

    pub fn delete(template: &str, params: &[impl fmt::Display]) -> Self {
        Self::new(Method::DELETE, template, params)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn auth(mut self, authorization: impl Into<String>) -> Self {
        self.auth = Some(authorization.into());
        self
    }

    /// Rate-limit scope of this request
    pub fn route_key(&self) -> String {
        route_key(&self.method, &self.path)
    }

    /// Number of failed attempts so far (429s are not counted)
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub(crate) fn set_responder(&mut self, responder: oneshot::Sender<RestResult<Value>>) {
        self.responder = Some(responder);
    }

    /// Resolve the caller's pending result
    pub(crate) fn respond(mut self, result: RestResult<Value>) {
        if let Some(responder) = self.responder.take() {
            // The caller may have stopped waiting
            let _ = responder.send(result);
        }
    }

    pub(crate) fn cancel(self) {
        self.respond(Err(RestError::Shutdown));
    }
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("attempts", &self.attempts)
            .finish()
    }
}
