//! Gateway operation codes

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Gateway operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Server pushes an event (server only)
    Dispatch = 0,
    /// Heartbeat, or a server request for one
    Heartbeat = 1,
    /// Start a new session (client only)
    Identify = 2,
    /// Update the bot's presence (client only)
    PresenceUpdate = 3,
    /// Join/leave/move voice channels (client only)
    VoiceStateUpdate = 4,
    /// Voice server ping (client only)
    VoiceServerPing = 5,
    /// Continue a dropped session (client only)
    Resume = 6,
    /// Server asks the client to reconnect and resume (server only)
    Reconnect = 7,
    /// Ask for guild member chunks (client only)
    RequestGuildMembers = 8,
    /// Session was invalidated (server only)
    InvalidSession = 9,
    /// First frame after the socket opens (server only)
    Hello = 10,
    /// Heartbeat acknowledged (server only)
    HeartbeatAck = 11,
}

impl OpCode {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Dispatch),
            1 => Some(Self::Heartbeat),
            2 => Some(Self::Identify),
            3 => Some(Self::PresenceUpdate),
            4 => Some(Self::VoiceStateUpdate),
            5 => Some(Self::VoiceServerPing),
            6 => Some(Self::Resume),
            7 => Some(Self::Reconnect),
            8 => Some(Self::RequestGuildMembers),
            9 => Some(Self::InvalidSession),
            10 => Some(Self::Hello),
            11 => Some(Self::HeartbeatAck),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether the server may send this op code
    #[must_use]
    pub const fn is_server_op(self) -> bool {
        matches!(
            self,
            Self::Dispatch
                | Self::Heartbeat
                | Self::Reconnect
                | Self::InvalidSession
                | Self::Hello
                | Self::HeartbeatAck
        )
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dispatch => "Dispatch",
            Self::Heartbeat => "Heartbeat",
            Self::Identify => "Identify",
            Self::PresenceUpdate => "PresenceUpdate",
            Self::VoiceStateUpdate => "VoiceStateUpdate",
            Self::VoiceServerPing => "VoiceServerPing",
            Self::Resume => "Resume",
            Self::Reconnect => "Reconnect",
            Self::RequestGuildMembers => "RequestGuildMembers",
            Self::InvalidSession => "InvalidSession",
            Self::Hello => "Hello",
            Self::HeartbeatAck => "HeartbeatAck",
        }
    }
}

impl Serialize for OpCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for OpCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        Self::from_u8(value).ok_or_else(|| serde::de::Error::custom(format!("invalid op code: {value}")))
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_from_u8() {
        assert_eq!(OpCode::from_u8(0), Some(OpCode::Dispatch));
        assert_eq!(OpCode::from_u8(6), Some(OpCode::Resume));
        assert_eq!(OpCode::from_u8(9), Some(OpCode::InvalidSession));
        assert_eq!(OpCode::from_u8(11), Some(OpCode::HeartbeatAck));
        assert_eq!(OpCode::from_u8(12), None);
    }

    #[test]
    fn test_server_ops() {
        assert!(OpCode::Hello.is_server_op());
        assert!(OpCode::Reconnect.is_server_op());
        assert!(!OpCode::Identify.is_server_op());
        assert!(!OpCode::Resume.is_server_op());
    }

    #[test]
    fn test_opcode_wire_form() {
        assert_eq!(serde_json::to_string(&OpCode::Hello).unwrap(), "10");
        let op: OpCode = serde_json::from_str("6").unwrap();
        assert_eq!(op, OpCode::Resume);
        assert!(serde_json::from_str::<OpCode>("42").is_err());
    }
}
