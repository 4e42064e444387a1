//! Wire-level gateway types: op codes, close codes, intents and frames

pub mod close_code;
pub mod intents;
pub mod opcode;
pub mod payload;
pub mod token;

pub use close_code::{CloseCode, CloseReason};
pub use intents::Intents;
pub use opcode::OpCode;
pub use payload::{
    DispatchEvent, GatewayCommand, GatewayMessage, IdentifyPayload, IdentifyProperties,
    ReadyInfo, ResumePayload,
};
pub use token::Token;
