//! Synthetic recordings of the reference world.

use lockstep_replay::{ReplayRecorder, Result};
use lockstep_sim::World;
use lockstep_sim::world::MSG_MOVE_TO;
use lockstep_wire::{
    Command, CommandHeader, FrameNumber, GameArgument, GameCommand, GameMessage, PlayerId,
    ReplayHeaderProto, RosterSlotProto,
};

/// Frames between move orders.
const ORDER_INTERVAL: FrameNumber = 90;

#[derive(Debug, Clone)]
pub struct DemoMatch {
    pub map_name: String,
    pub seed: u32,
    pub players: u8,
    pub frames: FrameNumber,
    pub crc_interval: FrameNumber,
}

impl DemoMatch {
    fn header(&self) -> ReplayHeaderProto {
        ReplayHeaderProto {
            map_name: self.map_name.clone(),
            host_name: "player0".to_string(),
            seed: self.seed,
            roster: (0..self.players)
                .map(|slot| RosterSlotProto {
                    slot: u32::from(slot),
                    player_name: format!("player{slot}"),
                    team: i32::from(slot % 2),
                })
                .collect(),
            build_version: env!("CARGO_PKG_VERSION").to_string(),
            ..Default::default()
        }
    }

    /// Record the match: every player's starting unit wanders to a new point
    /// every few seconds of game time.
    pub fn record(&self) -> Result<Vec<u8>> {
        let mut world = World::new();
        let mut recorder = ReplayRecorder::begin(&mut world, self.header(), self.crc_interval)?;
        let mut rng = self.seed;

        for frame in 0..self.frames {
            let mut commands = Vec::new();
            if frame % ORDER_INTERVAL == 0 {
                for player in 0..self.players {
                    let x = next_coordinate(&mut rng);
                    let y = next_coordinate(&mut rng);
                    commands.push(move_order(player, frame, u32::from(player) + 1, x, y));
                }
            }
            recorder.record_frame(&commands)?;
        }
        Ok(recorder.finish())
    }
}

fn next_coordinate(rng: &mut u32) -> f32 {
    *rng = rng.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
    f32::from((*rng >> 16) as u16 % 1000) - 500.0
}

fn move_order(player: PlayerId, frame: FrameNumber, unit: u32, x: f32, y: f32) -> Command {
    Command::Game(GameCommand {
        header: CommandHeader::new(player).with_frame(frame),
        message: GameMessage::new(MSG_MOVE_TO)
            .with_argument(GameArgument::ObjectId(unit))
            .with_argument(GameArgument::Location { x, y, z: 0.0 }),
    })
}
