//! Lockstep Wire Protocol
//!
//! Byte-exact encoding of the commands lockstep peers exchange, plus the
//! protobuf records that accompany a recorded command stream.
//!
//! # Layers
//!
//! - **Fields** ([`field`]): one tag byte followed by a fixed-width
//!   little-endian value. The tag decides the width.
//! - **Commands** ([`command`]): a kind-specific run of tagged header fields
//!   ending in the `D` marker, then the kind's body.
//! - **Chunks** ([`chunk`]): oversized logical commands travel as `Wrapper`
//!   fragments and are reassembled in any arrival order.
//! - **Records** ([`record`]): replay header and checkpoint messages.
//!
//! All multi-byte values are little-endian with no padding.

#![deny(unsafe_code)]

pub mod chunk;
pub mod command;
pub mod error;
pub mod field;
pub mod game_message;
pub mod header;
pub mod kind;
pub mod record;

// ============================================================================
// Type Aliases
// ============================================================================

/// Logic frame number.
pub type FrameNumber = u32;

/// Player slot index.
pub type PlayerId = u8;

/// Per-sender command sequence id.
pub type CommandId = u16;

// ============================================================================
// Re-exports
// ============================================================================

pub use chunk::{ChunkAssembler, split_into_chunks};
pub use command::{
    AckCommand, ChatCommand, Command, DestroyPlayerCommand, DisconnectChatCommand,
    DisconnectFrameCommand, DisconnectPlayerCommand, DisconnectScreenOffCommand,
    DisconnectVoteCommand, FileAnnounceCommand, FileCommand, FileProgressCommand,
    FrameInfoCommand, FrameResendRequestCommand, GameCommand, MAX_TEXT_LEN,
    PlayerLeaveCommand, ProgressCommand, RunAheadCommand, RunAheadMetricsCommand,
    WrapperCommand,
};
pub use error::{Result, WireError};
pub use field::{Field, FieldTag, PacketReader, PacketWriter, decode_field, encode_field};
pub use game_message::{GameArgument, GameMessage, LOGIC_CRC};
pub use header::{CommandHeader, RELAY_ALL};
pub use kind::CommandKind;
pub use record::{CheckpointProto, ReplayHeaderProto, RosterSlotProto};
