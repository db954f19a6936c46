//! # chat-gateway
//!
//! Gateway client: one WebSocket per shard, kept alive across network
//! failures, with incoming dispatches decoded into ordered client events.

pub mod codec;
pub mod decoders;
pub mod error;
pub mod handlers;
pub mod manager;
pub mod protocol;
pub mod queue;
pub mod shard;
pub mod transport;

pub use codec::{CodecSelection, Compression, Encoding};
pub use decoders::{DecodeContext, DecoderRegistry, Emission, EventDecoder};
pub use error::{GatewayError, GatewayResult};
pub use manager::{GatewayManager, GatewayManagerBuilder, ReadyTracker};
pub use protocol::{CloseCode, GatewayPayload, OpCode};
pub use queue::{
    ChannelSubscriber, Diagnostic, EventQueue, EventSubscriber, SharedQueue, SubscriberError,
    SubscriberId,
};
pub use shard::{ShardHandle, ShardStatus};
pub use transport::{CloseFrame, Connector, FrameSink, FrameStream, TungsteniteConnector, WsFrame};
