//! Lockstep Simulation Interface
//!
//! The replay driver treats the game simulation as a collaborator: it hands
//! over each frame's commands, steps one frame, and asks for a checksum. This
//! crate defines that contract and ships [`World`], a small deterministic
//! reference implementation used by the CLI and the tests.
//!
//! # Determinism
//!
//! A `Simulation` MUST produce the same checksum sequence for the same
//! session context and command stream on every run. It MUST NOT read the
//! wall clock, use unseeded randomness, or perform I/O.

#![deny(unsafe_code)]

pub mod error;
pub mod world;

use lockstep_wire::{Command, FrameNumber, PlayerId, ReplayHeaderProto, RosterSlotProto};

pub use error::SimError;
pub use world::World;

/// Per-frame world checksum. The algorithm belongs to the simulation.
pub type Checksum = u32;

/// Logic frames per second of game time.
pub const LOGIC_FRAMES_PER_SECOND: u32 = 30;

// ============================================================================
// Session Context
// ============================================================================

/// One player slot at game start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterSlot {
    pub slot: PlayerId,
    pub player_name: String,
    pub team: i32,
}

/// Everything a simulation needs before frame 0: who hosted, which map,
/// who plays, and the random seed. Replaces process-wide game globals.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionContext {
    pub host_name: String,
    pub map_name: String,
    pub seed: u32,
    /// Occupied slots ordered by slot index.
    pub roster: Vec<RosterSlot>,
}

impl SessionContext {
    /// Short label for logs and mismatch errors.
    pub fn describe(&self) -> String {
        format!("{} hosted by {} ({} players)", self.map_name, self.host_name, self.roster.len())
    }
}

impl TryFrom<&ReplayHeaderProto> for SessionContext {
    type Error = SimError;

    fn try_from(header: &ReplayHeaderProto) -> Result<Self, Self::Error> {
        let mut roster = header
            .roster
            .iter()
            .map(RosterSlot::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        roster.sort_by_key(|slot| slot.slot);
        Ok(Self {
            host_name: header.host_name.clone(),
            map_name: header.map_name.clone(),
            seed: header.seed,
            roster,
        })
    }
}

impl TryFrom<&RosterSlotProto> for RosterSlot {
    type Error = SimError;

    fn try_from(slot: &RosterSlotProto) -> Result<Self, Self::Error> {
        Ok(Self {
            slot: PlayerId::try_from(slot.slot)
                .map_err(|_| SimError::InvalidRosterSlot(slot.slot))?,
            player_name: slot.player_name.clone(),
            team: slot.team,
        })
    }
}

impl From<&RosterSlot> for RosterSlotProto {
    fn from(slot: &RosterSlot) -> Self {
        Self {
            slot: u32::from(slot.slot),
            player_name: slot.player_name.clone(),
            team: slot.team,
        }
    }
}

// ============================================================================
// Simulation Contract
// ============================================================================

/// The deterministic game simulation as seen by the replay driver.
///
/// Per frame the driver calls [`apply`](Simulation::apply) for each command
/// scheduled on the current frame, then [`advance`](Simulation::advance)
/// once, then reads [`checksum`](Simulation::checksum).
pub trait Simulation {
    /// Reset to frame 0 for a new session.
    fn begin_session(&mut self, context: &SessionContext) -> Result<(), SimError>;

    /// Frames executed since `begin_session` (or since the loaded state).
    fn frame(&self) -> FrameNumber;

    /// Queue a command for the current frame. Commands the simulation does
    /// not act on are ignored.
    fn apply(&mut self, command: &Command);

    /// Execute one logic frame.
    fn advance(&mut self);

    /// Checksum of the state after the last executed frame.
    fn checksum(&self) -> Checksum;

    /// Serialize the full state. Only valid between frames.
    fn save_state(&self) -> Vec<u8>;

    /// Restore state produced by [`save_state`](Simulation::save_state).
    ///
    /// Requires an active session; the saved state must belong to it.
    fn load_state(&mut self, state: &[u8]) -> Result<(), SimError>;
}

// ============================================================================
// Tests
// ============================================================================
