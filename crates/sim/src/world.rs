//! Deterministic reference world.
//!
//! Each player owns units on a plane. Game messages create units and order
//! them to move; units walk toward their target at a fixed speed every frame.
//! Leaving or destroyed players lose their units. Nothing else happens; the
//! point is a state that a single flipped bit in the command stream visibly
//! perturbs.

use std::collections::BTreeMap;

use lockstep_wire::{
    Command, FrameNumber, GameArgument, GameMessage, PacketReader, PacketWriter, PlayerId,
};

use crate::{Checksum, SessionContext, SimError, Simulation};

// ============================================================================
// Message Types
// ============================================================================

/// Spawn a unit for the sender. Arguments: `Location`.
pub const MSG_CREATE_UNIT: u32 = 1001;

/// Order a unit to walk to a point. Arguments: `ObjectId`, `Location`.
pub const MSG_MOVE_TO: u32 = 1002;

/// Halt a unit. Arguments: `ObjectId`.
pub const MSG_STOP: u32 = 1003;

/// Distance a unit covers per frame.
pub const UNIT_SPEED: f32 = 2.0;

/// Layout version of [`World::save_state`].
const STATE_VERSION: u8 = 1;

// ============================================================================
// Checksum (FNV-1a 32)
// ============================================================================

const FNV1A_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV1A_PRIME: u32 = 0x0100_0193;

#[derive(Debug, Clone)]
struct Fnv1a32 {
    state: u32,
}

impl Fnv1a32 {
    fn new() -> Self {
        Self {
            state: FNV1A_OFFSET_BASIS,
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= u32::from(byte);
            self.state = self.state.wrapping_mul(FNV1A_PRIME);
        }
    }

    fn finish(self) -> u32 {
        self.state
    }
}

/// Bit pattern used for hashing: `-0.0` hashes as `+0.0`, every NaN as the
/// quiet NaN.
fn canonicalize_f32(value: f32) -> u32 {
    const QUIET_NAN_BITS: u32 = 0x7fc0_0000;

    if value.is_nan() {
        QUIET_NAN_BITS
    } else if value == 0.0 {
        0
    } else {
        value.to_bits()
    }
}

// ============================================================================
// Units
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Unit {
    owner: PlayerId,
    position: [f32; 2],
    target: Option<[f32; 2]>,
}

impl Unit {
    fn step(&mut self) {
        let Some(target) = self.target else {
            return;
        };
        let dx = target[0] - self.position[0];
        let dy = target[1] - self.position[1];
        let distance = (dx * dx + dy * dy).sqrt();
        if distance <= UNIT_SPEED {
            self.position = target;
            self.target = None;
        } else {
            let scale = UNIT_SPEED / distance;
            self.position[0] += dx * scale;
            self.position[1] += dy * scale;
        }
    }
}

// ============================================================================
// World
// ============================================================================

/// Reference [`Simulation`].
///
/// Units live in a `BTreeMap` keyed by id so every iteration, and therefore
/// the checksum, follows id order.
#[derive(Debug, Clone, Default)]
pub struct World {
    session: Option<SessionContext>,
    frame: FrameNumber,
    /// Linear congruential state seeded from the session; advanced once per
    /// frame so the checksum also covers elapsed time.
    rng: u32,
    next_unit_id: u32,
    units: BTreeMap<u32, Unit>,
    pending: Vec<Command>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Units currently alive.
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Position of unit `id`, if alive.
    pub fn unit_position(&self, id: u32) -> Option<[f32; 2]> {
        self.units.get(&id).map(|unit| unit.position)
    }

    pub fn session(&self) -> Option<&SessionContext> {
        self.session.as_ref()
    }

    /// Create a unit. Returns `None` once unit ids are exhausted.
    fn spawn(&mut self, owner: PlayerId, position: [f32; 2]) -> Option<u32> {
        let id = self.next_unit_id;
        let Some(next) = id.checked_add(1) else {
            log::warn!("frame {}: unit ids exhausted, not spawning for {owner}", self.frame);
            return None;
        };
        self.next_unit_id = next;
        self.units.insert(
            id,
            Unit {
                owner,
                position,
                target: None,
            },
        );
        Some(id)
    }

    fn remove_player(&mut self, player: PlayerId) {
        self.units.retain(|_, unit| unit.owner != player);
    }

    fn owned_unit(&mut self, owner: PlayerId, id: u32) -> Option<&mut Unit> {
        self.units.get_mut(&id).filter(|unit| unit.owner == owner)
    }

    fn execute(&mut self, command: &Command) {
        match command {
            Command::Game(game) => self.execute_message(game.header.player_id, &game.message),
            Command::PlayerLeave(leave) => self.remove_player(leave.leaving_player_id),
            Command::DestroyPlayer(destroy) => match PlayerId::try_from(destroy.player_index) {
                Ok(player) => self.remove_player(player),
                Err(_) => log::debug!("ignoring destroy of player {}", destroy.player_index),
            },
            _ => {}
        }
    }

    fn execute_message(&mut self, sender: PlayerId, message: &GameMessage) {
        use GameArgument::{Location, ObjectId};

        match (message.message_type, message.arguments.as_slice()) {
            (MSG_CREATE_UNIT, [Location { x, y, .. }]) => {
                self.spawn(sender, [*x, *y]);
            }
            (MSG_MOVE_TO, [ObjectId(id), Location { x, y, .. }]) => {
                if let Some(unit) = self.owned_unit(sender, *id) {
                    unit.target = Some([*x, *y]);
                }
            }
            (MSG_STOP, [ObjectId(id)]) => {
                if let Some(unit) = self.owned_unit(sender, *id) {
                    unit.target = None;
                }
            }
            (message_type, _) => {
                log::trace!("frame {}: ignoring message {message_type}", self.frame);
            }
        }
    }
}

impl Simulation for World {
    fn begin_session(&mut self, context: &SessionContext) -> Result<(), SimError> {
        *self = Self {
            session: Some(context.clone()),
            rng: context.seed,
            next_unit_id: 1,
            ..Self::default()
        };
        // One starting unit per occupied slot, spaced along the x axis.
        for slot in &context.roster {
            self.spawn(slot.slot, [f32::from(slot.slot) * 100.0, 0.0]);
        }
        log::debug!("session started: {}", context.describe());
        Ok(())
    }

    fn frame(&self) -> FrameNumber {
        self.frame
    }

    fn apply(&mut self, command: &Command) {
        self.pending.push(command.clone());
    }

    fn advance(&mut self) {
        for command in std::mem::take(&mut self.pending) {
            self.execute(&command);
        }
        for unit in self.units.values_mut() {
            unit.step();
        }
        self.rng = self.rng.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        self.frame += 1;
    }

    fn checksum(&self) -> Checksum {
        let mut hasher = Fnv1a32::new();
        hasher.update(&self.frame.to_le_bytes());
        hasher.update(&self.rng.to_le_bytes());
        for (id, unit) in &self.units {
            hasher.update(&id.to_le_bytes());
            hasher.update(&[unit.owner]);
            hasher.update(&canonicalize_f32(unit.position[0]).to_le_bytes());
            hasher.update(&canonicalize_f32(unit.position[1]).to_le_bytes());
            if let Some(target) = unit.target {
                hasher.update(&canonicalize_f32(target[0]).to_le_bytes());
                hasher.update(&canonicalize_f32(target[1]).to_le_bytes());
            }
        }
        hasher.finish()
    }

    fn save_state(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut w = PacketWriter::new(&mut buf);
        let map_name = self.session.as_ref().map_or("", |s| s.map_name.as_str());
        w.u8(STATE_VERSION)
            .cstring(map_name)
            .u32(self.frame)
            .u32(self.rng)
            .u32(self.next_unit_id)
            .u32(self.units.len() as u32);
        for (id, unit) in &self.units {
            w.u32(*id)
                .u8(unit.owner)
                .f32(unit.position[0])
                .f32(unit.position[1]);
            match unit.target {
                Some([x, y]) => {
                    w.u8(1).f32(x).f32(y);
                }
                None => {
                    w.u8(0);
                }
            }
        }
        buf
    }

    fn load_state(&mut self, state: &[u8]) -> Result<(), SimError> {
        let session = self.session.clone().ok_or(SimError::NoSession)?;
        let mut r = PacketReader::new(state);

        let version = r.u8()?;
        if version != STATE_VERSION {
            return Err(SimError::UnsupportedStateVersion(version));
        }
        let map_name = r.cstring()?;
        if map_name != session.map_name {
            return Err(SimError::SessionMismatch {
                expected: session.map_name.clone(),
                found: map_name,
            });
        }

        let frame = r.u32()?;
        let rng = r.u32()?;
        let next_unit_id = r.u32()?;
        let count = r.u32()?;
        let mut units = BTreeMap::new();
        for _ in 0..count {
            let id = r.u32()?;
            let owner = r.u8()?;
            let position = [r.f32()?, r.f32()?];
            let target = match r.u8()? {
                0 => None,
                _ => Some([r.f32()?, r.f32()?]),
            };
            units.insert(
                id,
                Unit {
                    owner,
                    position,
                    target,
                },
            );
        }
        if let Some(&highest) = units.keys().next_back() {
            if next_unit_id <= highest {
                return Err(SimError::InconsistentState(format!(
                    "next unit id {next_unit_id} is not above live unit {highest}"
                )));
            }
        }

        *self = Self {
            session: Some(session),
            frame,
            rng,
            next_unit_id,
            units,
            pending: Vec::new(),
        };
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
