//! Shards
//!
//! Each shard carries one partition of the event stream over its own socket.

mod connection;
mod handle;
mod limiter;
mod session;

pub use connection::{connect_backoff, FULL_RECONNECT_SPACING, MAX_CONNECT_BACKOFF};
pub use handle::{ShardCommand, ShardHandle};
pub use limiter::{IdentifyLimiter, IDENTIFY_INTERVAL};
pub use session::{ShardSession, ShardStatus, SharedSession};

pub(crate) use connection::ShardConnection;
