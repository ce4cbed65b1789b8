//! Recording a session into the replay format.

use lockstep_sim::{Checksum, SessionContext, Simulation};
use lockstep_wire::{
    Command, CommandHeader, FrameNumber, GameCommand, GameMessage, PlayerId, ReplayHeaderProto,
};

use crate::error::Result;
use crate::format::ReplayWriter;

/// Records a session as the host would: runs each frame's commands through
/// the simulation and appends them, with the resulting checksum every
/// `crc_interval` frames, to a [`ReplayWriter`].
pub struct ReplayRecorder<'a> {
    sim: &'a mut dyn Simulation,
    writer: ReplayWriter,
    crc_interval: FrameNumber,
    host_slot: PlayerId,
}

impl<'a> ReplayRecorder<'a> {
    /// Start a recording for `header`. A `crc_interval` of 0 records no
    /// checksums.
    pub fn begin(
        sim: &'a mut dyn Simulation,
        header: ReplayHeaderProto,
        crc_interval: FrameNumber,
    ) -> Result<Self> {
        let context = SessionContext::try_from(&header)?;
        sim.begin_session(&context)?;
        let host_slot = context
            .roster
            .iter()
            .find(|slot| slot.player_name == context.host_name)
            .map_or(0, |slot| slot.slot);
        Ok(Self {
            sim,
            writer: ReplayWriter::new(header),
            crc_interval,
            host_slot,
        })
    }

    /// Next frame to be recorded.
    pub fn frame(&self) -> FrameNumber {
        self.sim.frame()
    }

    /// Bytes of packet data recorded so far.
    pub fn packet_len(&self) -> usize {
        self.writer.packet_len()
    }

    /// Execute and record one frame.
    pub fn record_frame(&mut self, commands: &[Command]) -> Result<Checksum> {
        let frame = self.sim.frame();
        for command in commands {
            self.sim.apply(command);
        }
        self.sim.advance();
        let checksum = self.sim.checksum();

        let mut batch = commands.to_vec();
        if self.crc_interval != 0 && frame % self.crc_interval == 0 {
            batch.push(Command::Game(GameCommand {
                header: CommandHeader::new(self.host_slot).with_frame(frame),
                message: GameMessage::logic_crc(checksum),
            }));
        }
        self.writer.write_frame(frame, &batch)?;
        Ok(checksum)
    }

    /// Finish; playback will run every frame recorded so far.
    pub fn finish(self) -> Vec<u8> {
        let frames = self.sim.frame();
        log::debug!("recorded {frames} frames, {} packet bytes", self.writer.packet_len());
        self.writer.finish(frames)
    }
}
