//! Replay driver errors.

use std::io;

use lockstep_sim::{Checksum, SimError};
use lockstep_wire::{FrameNumber, WireError};
use thiserror::Error;

/// Errors raised while reading, playing, recording or resuming a replay.
///
/// Every variant is scoped to one source: the drivers count it as an error
/// for that source and continue with the next.
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file does not start with the replay magic.
    #[error("not a replay file (bad magic)")]
    InvalidMagic,

    #[error("unsupported replay format version {0}")]
    UnsupportedVersion(u8),

    /// The replay header record could not be decoded.
    #[error("invalid replay header: {0}")]
    Header(#[from] prost::DecodeError),

    /// A packet in the command stream failed to decode.
    #[error("bad packet at byte {offset}: {source}")]
    Packet {
        /// Absolute file offset of the packet.
        offset: u64,
        #[source]
        source: WireError,
    },

    /// Packets decode but do not form a valid frame sequence.
    #[error("corrupt command stream at byte {offset}: {detail}")]
    CorruptStream { offset: u64, detail: String },

    /// Commands handed to the recorder do not form a valid frame sequence.
    #[error("cannot record: {0}")]
    Recording(String),

    /// A source could not be opened for playback.
    #[error("cannot open replay {name}: {reason}")]
    SourceOpen { name: String, reason: String },

    /// The recomputed checksum disagrees with the recorded one.
    #[error("checksum divergence at frame {frame}: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumDivergence {
        frame: FrameNumber,
        expected: Checksum,
        actual: Checksum,
    },

    #[error("cannot load checkpoint {name}: {reason}")]
    CheckpointLoad { name: String, reason: String },

    #[error("cannot save checkpoint {name}: {reason}")]
    CheckpointSave { name: String, reason: String },

    #[error("cannot start worker for {source_name}: {error}")]
    WorkerSpawn {
        source_name: String,
        #[source]
        error: io::Error,
    },

    #[error("simulation error: {0}")]
    Simulation(#[from] SimError),

    /// An operation was called in a coordinator state that does not allow it.
    #[error("{operation} is not valid in state {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
}

/// Result alias for replay operations.
pub type Result<T> = std::result::Result<T, ReplayError>;
