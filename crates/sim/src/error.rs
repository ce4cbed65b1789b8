//! Errors a simulation reports back to the replay driver.

use lockstep_wire::WireError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// State was loaded before `begin_session` supplied the host, map and roster.
    #[error("no session context; begin_session must run before load_state")]
    NoSession,

    /// Saved state bytes could not be parsed.
    #[error("malformed simulation state: {0}")]
    MalformedState(#[from] WireError),

    /// Saved state parses but contradicts itself.
    #[error("inconsistent simulation state: {0}")]
    InconsistentState(String),

    /// Saved state version is not one this build understands.
    #[error("unsupported simulation state version {0}")]
    UnsupportedStateVersion(u8),

    /// Saved state belongs to a different map or roster than the active session.
    #[error("state was saved for {found}, active session is {expected}")]
    SessionMismatch { expected: String, found: String },

    /// A roster slot index does not fit a player id.
    #[error("roster slot {0} is out of range")]
    InvalidRosterSlot(u32),
}
