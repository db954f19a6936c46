//! # chat-rest
//!
//! Rate-limited REST dispatch.
//!
//! Requests are grouped into per-route [`RateLimitBucket`]s. Each bucket has at
//! most one call in flight; different buckets run in parallel and only share
//! the account-wide [`GlobalThrottle`]. The [`RequestDispatcher`] interprets
//! responses: rate limits re-queue, server errors retry with backoff, client
//! errors fail immediately.

pub mod bucket;
pub mod dispatcher;
pub mod endpoints;
pub mod error;
pub mod request;
pub mod route;
pub mod throttle;
pub mod transport;

pub use bucket::{BucketMeta, RateLimitBucket};
pub use dispatcher::{RequestDispatcher, SharedDispatcher};
pub use error::{RestError, RestResult};
pub use request::ApiRequest;
pub use route::route_key;
pub use throttle::GlobalThrottle;
pub use transport::{HttpTransport, RawResponse, ReqwestTransport};
