//! Inbound and outbound gateway frames
//!
//! Every frame on the wire is a JSON envelope `{op, s, t, d}`. Inbound frames
//! are decoded once into [`GatewayMessage`]; outbound frames are built from
//! [`GatewayCommand`] and encoded as `{op, d}`.

use super::intents::Intents;
use super::opcode::OpCode;
use super::token::Token;
use crate::traits::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope as it arrives from the transport
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    op: OpCode,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
    #[serde(default)]
    d: Value,
}

#[derive(Debug, Deserialize)]
struct HelloBody {
    heartbeat_interval: u64,
}

/// A dispatched event, passed to the embedder untouched
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchEvent {
    pub seq: Option<u64>,
    pub name: String,
    pub data: Value,
}

/// Fields of READY the session keeps
#[derive(Debug, Clone, Deserialize)]
pub struct ReadyInfo {
    pub session_id: String,
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
}

impl DispatchEvent {
    pub fn is_ready(&self) -> bool {
        self.name == "READY"
    }

    pub fn is_resumed(&self) -> bool {
        self.name == "RESUMED"
    }

    pub fn ready_info(&self) -> Result<ReadyInfo> {
        Ok(ReadyInfo::deserialize(&self.data)?)
    }
}

/// Messages the server sends
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayMessage {
    Hello { heartbeat_interval: u64 },
    Dispatch(DispatchEvent),
    /// Server asks for an immediate heartbeat
    HeartbeatRequest,
    HeartbeatAck,
    InvalidSession { resumable: bool },
    /// Server asks us to drop the socket and resume
    Reconnect,
}

impl GatewayMessage {
    pub fn decode(text: &str) -> Result<Self> {
        let raw: RawEnvelope = serde_json::from_str(text)?;

        match raw.op {
            OpCode::Hello => {
                let body = HelloBody::deserialize(&raw.d)?;
                Ok(GatewayMessage::Hello {
                    heartbeat_interval: body.heartbeat_interval,
                })
            }
            OpCode::Dispatch => {
                let name = raw
                    .t
                    .ok_or_else(|| GatewayError::Decode("dispatch without event name".into()))?;
                Ok(GatewayMessage::Dispatch(DispatchEvent {
                    seq: raw.s,
                    name,
                    data: raw.d,
                }))
            }
            OpCode::Heartbeat => Ok(GatewayMessage::HeartbeatRequest),
            OpCode::HeartbeatAck => Ok(GatewayMessage::HeartbeatAck),
            OpCode::InvalidSession => Ok(GatewayMessage::InvalidSession {
                resumable: raw.d.as_bool().unwrap_or(false),
            }),
            OpCode::Reconnect => Ok(GatewayMessage::Reconnect),
            other => Err(GatewayError::Decode(format!(
                "{} is not sent by the server",
                other
            ))),
        }
    }

    pub fn opcode(&self) -> OpCode {
        match self {
            GatewayMessage::Hello { .. } => OpCode::Hello,
            GatewayMessage::Dispatch(_) => OpCode::Dispatch,
            GatewayMessage::HeartbeatRequest => OpCode::Heartbeat,
            GatewayMessage::HeartbeatAck => OpCode::HeartbeatAck,
            GatewayMessage::InvalidSession { .. } => OpCode::InvalidSession,
            GatewayMessage::Reconnect => OpCode::Reconnect,
        }
    }
}

/// Client properties reported in Identify
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentifyProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: "cordgate".to_string(),
            device: "cordgate".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentifyPayload {
    pub token: Token,
    pub intents: Intents,
    pub properties: IdentifyProperties,
    pub compress: bool,
    pub large_threshold: u32,
    /// `[shard_index, total_shards]`
    pub shard: [u32; 2],
}

#[derive(Debug, Clone, Serialize)]
pub struct ResumePayload {
    pub token: Token,
    pub session_id: String,
    pub seq: u64,
}

/// Commands the client sends
#[derive(Debug, Clone)]
pub enum GatewayCommand {
    Identify(IdentifyPayload),
    Resume(ResumePayload),
    /// Last seen sequence number, `null` on the wire before any dispatch
    Heartbeat(Option<u64>),
    PresenceUpdate(Value),
    VoiceStateUpdate(Value),
    RequestGuildMembers(Value),
}

#[derive(Serialize)]
struct OutboundFrame<'a, T: Serialize> {
    op: OpCode,
    d: &'a T,
}

impl GatewayCommand {
    pub fn opcode(&self) -> OpCode {
        match self {
            GatewayCommand::Identify(_) => OpCode::Identify,
            GatewayCommand::Resume(_) => OpCode::Resume,
            GatewayCommand::Heartbeat(_) => OpCode::Heartbeat,
            GatewayCommand::PresenceUpdate(_) => OpCode::PresenceUpdate,
            GatewayCommand::VoiceStateUpdate(_) => OpCode::VoiceStateUpdate,
            GatewayCommand::RequestGuildMembers(_) => OpCode::RequestGuildMembers,
        }
    }

    pub fn encode(&self) -> Result<String> {
        let op = self.opcode();
        let encoded = match self {
            GatewayCommand::Identify(d) => serde_json::to_string(&OutboundFrame { op, d }),
            GatewayCommand::Resume(d) => serde_json::to_string(&OutboundFrame { op, d }),
            GatewayCommand::Heartbeat(d) => serde_json::to_string(&OutboundFrame { op, d }),
            GatewayCommand::PresenceUpdate(d)
            | GatewayCommand::VoiceStateUpdate(d)
            | GatewayCommand::RequestGuildMembers(d) => {
                serde_json::to_string(&OutboundFrame { op, d })
            }
        };
        encoded.map_err(|e| GatewayError::Encode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_hello() {
        let msg = GatewayMessage::decode(r#"{"op":10,"d":{"heartbeat_interval":41250}}"#).unwrap();
        assert_eq!(msg, GatewayMessage::Hello { heartbeat_interval: 41250 });
    }

    #[test]
    fn test_decode_dispatch_keeps_body() {
        let msg = GatewayMessage::decode(
            r#"{"op":0,"s":7,"t":"MESSAGE_CREATE","d":{"content":"hi"}}"#,
        )
        .unwrap();
        match msg {
            GatewayMessage::Dispatch(event) => {
                assert_eq!(event.seq, Some(7));
                assert_eq!(event.name, "MESSAGE_CREATE");
                assert_eq!(event.data["content"], "hi");
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_decode_invalid_session_flag() {
        let resumable = GatewayMessage::decode(r#"{"op":9,"d":true}"#).unwrap();
        assert_eq!(resumable, GatewayMessage::InvalidSession { resumable: true });
        let fresh = GatewayMessage::decode(r#"{"op":9,"d":false}"#).unwrap();
        assert_eq!(fresh, GatewayMessage::InvalidSession { resumable: false });
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(GatewayMessage::decode("not json").is_err());
        assert!(GatewayMessage::decode(r#"{"op":99}"#).is_err());
        assert!(GatewayMessage::decode(r#"{"op":2,"d":{}}"#).is_err());
        assert!(GatewayMessage::decode(r#"{"op":0,"s":1,"d":{}}"#).is_err());
        assert!(GatewayMessage::decode(r#"{"op":10,"d":{}}"#).is_err());
    }

    #[test]
    fn test_ready_info() {
        let event = DispatchEvent {
            seq: Some(1),
            name: "READY".into(),
            data: json!({"session_id": "abc123", "resume_gateway_url": "wss://resume.example"}),
        };
        let info = event.ready_info().unwrap();
        assert_eq!(info.session_id, "abc123");
        assert_eq!(info.resume_gateway_url.as_deref(), Some("wss://resume.example"));
    }

    #[test]
    fn test_encode_heartbeat_null_before_first_dispatch() {
        let value: Value =
            serde_json::from_str(&GatewayCommand::Heartbeat(None).encode().unwrap()).unwrap();
        assert_eq!(value, json!({"op": 1, "d": null}));
    }

    #[test]
    fn test_encode_identify() {
        let identify = GatewayCommand::Identify(IdentifyPayload {
            token: Token::bot("tkn"),
            intents: Intents::GUILDS | Intents::GUILD_MESSAGES,
            properties: IdentifyProperties::default(),
            compress: false,
            large_threshold: 250,
            shard: [1, 4],
        });
        let value: Value = serde_json::from_str(&identify.encode().unwrap()).unwrap();
        assert_eq!(value["op"], 2);
        assert_eq!(value["d"]["token"], "Bot tkn");
        assert_eq!(value["d"]["intents"], 513);
        assert_eq!(value["d"]["shard"], json!([1, 4]));
        assert_eq!(value["d"]["large_threshold"], 250);
    }

    #[test]
    fn test_encode_resume() {
        let resume = GatewayCommand::Resume(ResumePayload {
            token: Token::bot("tkn"),
            session_id: "abc123".into(),
            seq: 42,
        });
        let value: Value = serde_json::from_str(&resume.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"op": 6, "d": {"token": "Bot tkn", "session_id": "abc123", "seq": 42}}));
    }
}
