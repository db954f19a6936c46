//! Gateway protocol definitions
//!
//! Op codes, close codes and the payload envelope exchanged over the socket.

mod close_codes;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::{is_fatal_close, CloseCode, CLOSE_ABNORMAL, CLOSE_NORMAL, CLOSE_RESUMABLE};
pub use messages::GatewayPayload;
pub use opcodes::OpCode;
pub use payloads::{
    HelloPayload, IdentifyPayload, IdentifyProperties, RequestGuildMembersPayload, ResumePayload,
};
