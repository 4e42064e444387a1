//! Rate-limit bucket keys
//!
//! The server rate limits by route shape plus one "major" id, so
//! `/channels/1/messages` and `/channels/2/messages` are separate buckets
//! while `/channels/1/messages/10` and `/channels/1/messages/11` share one.

use bitflags::bitflags;
use reqwest::Method;
use std::fmt;

bitflags! {
    /// Which route segments a path contains
    ///
    /// Flags ending in `_ID`/`_CODE`/`_TOKEN` mark the presence of an
    /// identifier, not its value.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct RouteParts: u64 {
        const GUILDS            = 1 << 0;
        const GUILD_ID          = 1 << 1;
        const CHANNELS          = 1 << 2;
        const CHANNEL_ID        = 1 << 3;
        const MESSAGES          = 1 << 4;
        const MESSAGES_DELETE   = 1 << 5;
        const MESSAGE_ID        = 1 << 6;
        const BULK_DELETE       = 1 << 7;
        const TYPING            = 1 << 8;
        const PERMISSIONS       = 1 << 9;
        const OVERWRITE_ID      = 1 << 10;
        const INVITES           = 1 << 11;
        const INVITE_CODE       = 1 << 12;
        const PINS              = 1 << 13;
        const WEBHOOKS          = 1 << 14;
        const MEMBERS           = 1 << 15;
        const USER_ID           = 1 << 16;
        const ROLES             = 1 << 17;
        const ROLE_ID           = 1 << 18;
        const BANS              = 1 << 19;
        const USERS             = 1 << 20;
        const WEBHOOK_ID        = 1 << 21;
        const WEBHOOK_TOKEN     = 1 << 22;
        const AUDIT_LOG         = 1 << 23;
        const REACTIONS         = 1 << 24;
        const EMOJI             = 1 << 25;
        const ME                = 1 << 26;
        const APPLICATIONS      = 1 << 27;
        const APPLICATION_ID    = 1 << 28;
        const COMMANDS          = 1 << 29;
        const COMMAND_ID        = 1 << 30;
        const INTERACTIONS      = 1 << 31;
        const INTERACTION_ID    = 1 << 32;
        const INTERACTION_TOKEN = 1 << 33;
        const CALLBACK          = 1 << 34;
        const THREADS           = 1 << 35;
        const THREAD_MEMBERS    = 1 << 36;
        const GATEWAY           = 1 << 37;
        const BOT               = 1 << 38;
    }
}

/// Bucket identity: route shape plus the guild or channel id (0 if neither)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub parts: RouteParts,
    pub major_id: u64,
}

impl BucketKey {
    pub fn new(parts: RouteParts, major_id: u64) -> Self {
        Self { parts, major_id }
    }

    /// Derive the bucket for a request path such as `/channels/123/messages`
    ///
    /// Query strings are ignored. Deleting a single message has its own
    /// bucket, separate from the other message routes.
    pub fn from_path(method: &Method, path: &str) -> Self {
        let path = path.split('?').next().unwrap_or_default();
        let mut parts = RouteParts::empty();
        let mut major_id = 0;
        let mut previous = RouteParts::empty();

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let part = match literal(segment) {
                Some(part) => part,
                None => {
                    let part = identifier_after(previous);
                    if part.intersects(RouteParts::GUILD_ID | RouteParts::CHANNEL_ID | RouteParts::WEBHOOK_ID)
                        && major_id == 0
                    {
                        major_id = segment.parse().unwrap_or(0);
                    }
                    part
                }
            };
            parts |= part;
            previous = part;
        }

        let single_message = RouteParts::CHANNELS
            | RouteParts::CHANNEL_ID
            | RouteParts::MESSAGES
            | RouteParts::MESSAGE_ID;
        if *method == Method::DELETE && parts == single_message {
            parts.remove(RouteParts::MESSAGES);
            parts.insert(RouteParts::MESSAGES_DELETE);
        }

        Self { parts, major_id }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}:{}", self.parts.bits(), self.major_id)
    }
}

fn literal(segment: &str) -> Option<RouteParts> {
    let part = match segment {
        "guilds" => RouteParts::GUILDS,
        "channels" => RouteParts::CHANNELS,
        "messages" => RouteParts::MESSAGES,
        "bulk-delete" => RouteParts::BULK_DELETE,
        "typing" => RouteParts::TYPING,
        "permissions" => RouteParts::PERMISSIONS,
        "invites" => RouteParts::INVITES,
        "pins" => RouteParts::PINS,
        "webhooks" => RouteParts::WEBHOOKS,
        "members" => RouteParts::MEMBERS,
        "thread-members" => RouteParts::THREAD_MEMBERS,
        "roles" => RouteParts::ROLES,
        "bans" => RouteParts::BANS,
        "users" => RouteParts::USERS,
        "audit-logs" => RouteParts::AUDIT_LOG,
        "reactions" => RouteParts::REACTIONS,
        "emojis" => RouteParts::EMOJI,
        "applications" => RouteParts::APPLICATIONS,
        "commands" => RouteParts::COMMANDS,
        "interactions" => RouteParts::INTERACTIONS,
        "callback" => RouteParts::CALLBACK,
        "threads" => RouteParts::THREADS,
        "gateway" => RouteParts::GATEWAY,
        "bot" => RouteParts::BOT,
        "@me" => RouteParts::ME | RouteParts::USER_ID,
        _ => return None,
    };
    Some(part)
}

/// What a non-literal segment identifies, given the segment before it
fn identifier_after(previous: RouteParts) -> RouteParts {
    if previous == RouteParts::GUILDS {
        RouteParts::GUILD_ID
    } else if previous == RouteParts::CHANNELS {
        RouteParts::CHANNEL_ID
    } else if previous == RouteParts::MESSAGES || previous == RouteParts::PINS {
        RouteParts::MESSAGE_ID
    } else if previous == RouteParts::PERMISSIONS {
        RouteParts::OVERWRITE_ID
    } else if previous == RouteParts::INVITES {
        RouteParts::INVITE_CODE
    } else if previous == RouteParts::WEBHOOKS {
        RouteParts::WEBHOOK_ID
    } else if previous == RouteParts::WEBHOOK_ID {
        RouteParts::WEBHOOK_TOKEN
    } else if previous == RouteParts::MEMBERS
        || previous == RouteParts::USERS
        || previous == RouteParts::BANS
        || previous == RouteParts::THREAD_MEMBERS
    {
        RouteParts::USER_ID
    } else if previous == RouteParts::ROLES {
        RouteParts::ROLE_ID
    } else if previous == RouteParts::APPLICATIONS {
        RouteParts::APPLICATION_ID
    } else if previous == RouteParts::COMMANDS {
        RouteParts::COMMAND_ID
    } else if previous == RouteParts::INTERACTIONS {
        RouteParts::INTERACTION_ID
    } else if previous == RouteParts::INTERACTION_ID {
        RouteParts::INTERACTION_TOKEN
    } else if previous == RouteParts::REACTIONS || previous == RouteParts::EMOJI {
        RouteParts::EMOJI
    } else {
        RouteParts::empty()
    }
}
