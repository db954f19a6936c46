//! # chat-core
//!
//! Domain layer containing the cached models, the model-store and model-fetcher
//! collaborator traits, and the client events produced by the gateway.
//! This crate has zero dependencies on infrastructure (sockets, HTTP, runtime).

pub mod entities;
pub mod error;
pub mod events;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    Channel, ChannelType, Emoji, GuildChannelData, Guild, GuildMember, MemberKey, Message,
    OverwriteKind, PermissionOverwrite, Presence, Role, TextChannelData, User, VoiceChannelData,
};
pub use error::DomainError;
pub use events::{ClientEvent, ModelRef};
pub use traits::{share, Model, ModelFetcher, ModelStore, Shared};
pub use value_objects::{Snowflake, SnowflakeParseError};
