//! Recorded fixtures shared by the playback tests.

#![allow(dead_code)]

use std::path::Path;

use lockstep_replay::{ReplayRecorder, write_replay};
use lockstep_sim::World;
use lockstep_sim::world::MSG_MOVE_TO;
use lockstep_wire::{
    Command, CommandHeader, FrameNumber, GameArgument, GameCommand, GameMessage, PlayerId,
    ReplayHeaderProto, RosterSlotProto,
};

pub fn header(seed: u32) -> ReplayHeaderProto {
    ReplayHeaderProto {
        map_name: "Flat Plains".to_string(),
        host_name: "alice".to_string(),
        seed,
        roster: vec![
            RosterSlotProto {
                slot: 0,
                player_name: "alice".to_string(),
                team: 0,
            },
            RosterSlotProto {
                slot: 1,
                player_name: "bob".to_string(),
                team: 1,
            },
        ],
        build_version: "test".to_string(),
        ..Default::default()
    }
}

/// Player `player` orders unit `unit` to (x, y) on `frame`.
pub fn move_to(player: PlayerId, frame: FrameNumber, unit: u32, x: f32, y: f32) -> Command {
    Command::Game(GameCommand {
        header: CommandHeader::new(player).with_frame(frame),
        message: GameMessage::new(MSG_MOVE_TO)
            .with_argument(GameArgument::ObjectId(unit))
            .with_argument(GameArgument::Location { x, y, z: 0.0 }),
    })
}

/// A recording plus the packet offset (relative to the packet section) at
/// which each frame's batch starts.
pub struct Fixture {
    pub bytes: Vec<u8>,
    pub batch_offsets: Vec<(FrameNumber, usize)>,
}

/// Record `frames` frames of the reference world. Units 1 and 2 (one per
/// player) get a new move order every 50 frames; checksums are recorded
/// every `crc_interval` frames.
pub fn record(seed: u32, frames: FrameNumber, crc_interval: FrameNumber) -> Fixture {
    let mut world = World::new();
    let mut recorder = ReplayRecorder::begin(&mut world, header(seed), crc_interval).unwrap();
    let mut batch_offsets = Vec::new();
    for frame in 0..frames {
        let commands = if frame % 50 == 0 {
            let leg = (frame / 50) as f32;
            vec![
                move_to(0, frame, 1, 300.0 + leg * 7.0, 40.0 - leg),
                move_to(1, frame, 2, -120.0 + leg, 15.0 * leg),
            ]
        } else {
            Vec::new()
        };
        batch_offsets.push((frame, recorder.packet_len()));
        recorder.record_frame(&commands).unwrap();
    }
    Fixture {
        bytes: recorder.finish(),
        batch_offsets,
    }
}

pub fn write_fixture(dir: &Path, name: &str, bytes: &[u8]) {
    write_replay(bytes, &dir.join(name)).unwrap();
}
