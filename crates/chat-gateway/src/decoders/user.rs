//! User and presence dispatches

use chat_core::{ClientEvent, DomainError, Model, ModelStore, Presence, User};
use serde_json::Value;

use super::{lookup_user, nested_id, DecodeContext, EventDecoder, Emission};

/// Presences are stored per user. An unknown user is fetched before the
/// event goes out so subscribers can resolve it from the cache.
pub struct PresenceUpdateDecoder;

impl EventDecoder for PresenceUpdateDecoder {
    fn event_type(&self) -> &'static str {
        "PRESENCE_UPDATE"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        let user_id = nested_id(&data, "user", Presence::NAME)?;

        let before = ctx
            .cache
            .presences
            .get(&user_id)
            .and_then(|presence| ctx.snapshot("presenceUpdate", &presence));
        let after = ctx.cache.presences.factory(&data)?;

        Ok(lookup_user(ctx, user_id, data.get("user"))?
            .emit(move |_| Some(ClientEvent::PresenceUpdate { before, after })))
    }
}

pub struct UserUpdateDecoder;

impl EventDecoder for UserUpdateDecoder {
    fn event_type(&self) -> &'static str {
        "USER_UPDATE"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        let user_id = User::key_from_raw(&data)?;
        let Some(user) = ctx.cache.users.get(&user_id) else {
            return Ok(Emission::None);
        };

        let before = ctx.snapshot("userUpdate", &user);
        user.write().patch(&data);
        Ok(ClientEvent::UserUpdate {
            before,
            after: user,
        }
        .into())
    }
}

/// Voice connections are out of scope; the payload is handed over as is
pub struct VoiceServerUpdateDecoder;

impl EventDecoder for VoiceServerUpdateDecoder {
    fn event_type(&self) -> &'static str {
        "VOICE_SERVER_UPDATE"
    }

    fn decode(&self, _ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        Ok(ClientEvent::VoiceServerUpdate(data).into())
    }
}
