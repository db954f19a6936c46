//! Route-key derivation
//!
//! The server scopes rate limits by route rather than by literal path. Ids
//! directly after `channels`, `guilds` and `webhooks` are major parameters and
//! stay in the key; every other numeric id is collapsed to `:id`. Everything
//! after `reactions` shares one bucket per message. A webhook token never
//! appears in a key.

use reqwest::Method;

/// Path segments whose following id is part of the rate-limit scope
const MAJOR_PARAMETERS: [&str; 3] = ["channels", "guilds", "webhooks"];

/// Compute the bucket key for a request
pub fn route_key(method: &Method, path: &str) -> String {
    let path = path.split('?').next().unwrap_or_default();
    let mut parts: Vec<&str> = Vec::new();
    let mut previous = "";
    let mut webhook_id = false;

    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if webhook_id {
            parts.push(":token");
        } else if is_id(segment) && !MAJOR_PARAMETERS.contains(&previous) {
            parts.push(":id");
        } else {
            parts.push(segment);
        }

        if segment == "reactions" {
            break;
        }
        webhook_id = previous == "webhooks" && is_id(segment);
        previous = segment;
    }

    format!("{method} /{}", parts.join("/"))
}

fn is_id(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_major_parameter_kept() {
        assert_eq!(
            route_key(&Method::GET, "/channels/123/messages/456"),
            "GET /channels/123/messages/:id"
        );
        assert_eq!(
            route_key(&Method::GET, "/guilds/9/members"),
            "GET /guilds/9/members"
        );
    }

    #[test]
    fn test_messages_in_same_channel_share_bucket() {
        assert_eq!(
            route_key(&Method::PATCH, "/channels/1/messages/10"),
            route_key(&Method::PATCH, "/channels/1/messages/11")
        );
        assert_ne!(
            route_key(&Method::PATCH, "/channels/1/messages/10"),
            route_key(&Method::PATCH, "/channels/2/messages/10")
        );
    }

    #[test]
    fn test_webhook_token_hidden() {
        assert_eq!(
            route_key(&Method::POST, "/webhooks/7/s3cr3t-t0ken"),
            "POST /webhooks/7/:token"
        );
        assert_eq!(
            route_key(&Method::GET, "/webhooks/7/abc/messages/12"),
            "GET /webhooks/7/:token/messages/:id"
        );
        assert_eq!(route_key(&Method::GET, "/webhooks/7"), "GET /webhooks/7");
    }

    #[test]
    fn test_method_is_part_of_key() {
        assert_ne!(
            route_key(&Method::GET, "/channels/1/messages/10"),
            route_key(&Method::DELETE, "/channels/1/messages/10")
        );
    }

    #[test]
    fn test_non_major_ids_collapsed() {
        assert_eq!(route_key(&Method::GET, "/users/42"), "GET /users/:id");
        assert_eq!(
            route_key(&Method::GET, "/guilds/5/members/77?limit=1"),
            "GET /guilds/5/members/:id"
        );
    }

    #[test]
    fn test_reactions_collapsed() {
        assert_eq!(
            route_key(&Method::PUT, "/channels/1/messages/2/reactions/%F0%9F%91%8D/@me"),
            "PUT /channels/1/messages/:id/reactions"
        );
    }
}
