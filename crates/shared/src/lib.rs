//! IdleMMO Protocol - wire types shared with the game gateway
//!
//! This crate contains:
//! - The flat JSON envelope every frame travels in (`{"type": ..., ...fields}`)
//! - Typed client commands (`ClientMessage`) and server messages (`ServerMessage`)
//! - The codec error type
//!
//! # Design Principles
//!
//! 1. **No I/O** - framing and transport live in `idlemmo-player`
//! 2. **Forward compatible** - unknown server types decode to `ServerMessage::Unknown`
//! 3. **Lenient payloads** - absent or `null` fields decode to zero values

pub mod envelope;
pub mod error;
pub mod messages;

pub use envelope::Envelope;
pub use error::CodecError;
pub use messages::{
    message_types, BagPayload, ClientMessage, EquipmentPayload, ErrorPayload, ExpPayload,
    ItemPayload, OfflineRewardPayload, PlayerSnapshot, SeqEndedPayload, SeqResultPayload,
    SeqStartedPayload, ServerMessage,
};
