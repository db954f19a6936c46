//! Domain entities - cached models built from raw API payloads

mod channel;
mod emoji;
mod guild;
mod member;
mod message;
mod presence;
pub mod raw;
mod role;
mod user;

pub use channel::{
    Channel, ChannelType, GuildChannelData, OverwriteKind, PermissionOverwrite, TextChannelData,
    VoiceChannelData, TYPING_TIMEOUT_SECS,
};
pub use emoji::Emoji;
pub use guild::Guild;
pub use member::{GuildMember, MemberKey};
pub use message::Message;
pub use presence::Presence;
pub use role::Role;
pub use user::User;
