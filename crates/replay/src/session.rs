//! Frame-by-frame playback of one recorded stream.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use lockstep_sim::{Checksum, SessionContext, Simulation};
use lockstep_wire::{FrameNumber, GameMessage};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::{ReplayError, Result};
use crate::format::ReplayStream;
use crate::observer::{FrameObserver, FrameReport};

const FNV1A_PRIME: u32 = 0x0100_0193;

/// Fold a frame checksum into the running accumulator.
pub fn fold_checksum(accumulator: u32, checksum: Checksum) -> u32 {
    (accumulator ^ checksum).wrapping_mul(FNV1A_PRIME)
}

// ============================================================================
// Stop Handle
// ============================================================================

/// Shared flag asking a running session to stop at the next frame boundary.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// How a session run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Every recorded frame was executed without divergence.
    Completed {
        frames: FrameNumber,
        final_checksum: Checksum,
        accumulator: u32,
    },
    /// A recorded checksum disagreed with the simulation.
    Diverged {
        frame: FrameNumber,
        expected: Checksum,
        actual: Checksum,
    },
    /// The requested checkpoint was written and playback stopped.
    CheckpointSaved { frame: FrameNumber, name: String },
    /// The stop handle was raised.
    Stopped { frame: FrameNumber },
}

impl SessionOutcome {
    /// Whether this outcome counts as an error for the source.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Diverged { .. })
    }
}

/// Save a checkpoint after `frame` frames have executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointRequest {
    pub frame: FrameNumber,
    pub name: String,
}

// ============================================================================
// Replay Session
// ============================================================================

/// Drives a [`Simulation`] through a recorded stream.
///
/// Per frame: apply the frame's recorded commands (the recorded checksum is
/// taken aside rather than applied), advance, checksum, fold into the
/// accumulator, notify observers. `run` then saves a requested checkpoint
/// before acting on divergence.
pub struct ReplaySession<'a> {
    stream: ReplayStream,
    sim: &'a mut dyn Simulation,
    accumulator: u32,
    diverged: bool,
    checkpoint: Option<(CheckpointRequest, &'a dyn CheckpointStore)>,
    observers: Vec<Box<dyn FrameObserver + 'a>>,
    stop: StopHandle,
}

impl<'a> ReplaySession<'a> {
    /// Begin playback from frame 0.
    pub fn start(stream: ReplayStream, sim: &'a mut dyn Simulation) -> Result<Self> {
        let context = SessionContext::try_from(stream.header())?;
        sim.begin_session(&context)?;
        log::info!(
            "playing {} ({} frames, {})",
            stream.name(),
            stream.frame_count(),
            context.describe()
        );
        Ok(Self::resume(stream, sim, 0))
    }

    /// Continue playback with a simulation already positioned mid-stream.
    ///
    /// The caller has restored the simulation's state and seeked `stream` to
    /// the matching packet offset.
    pub fn resume(stream: ReplayStream, sim: &'a mut dyn Simulation, accumulator: u32) -> Self {
        Self {
            stream,
            sim,
            accumulator,
            diverged: false,
            checkpoint: None,
            observers: Vec::new(),
            stop: StopHandle::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn FrameObserver + 'a>) {
        self.observers.push(observer);
    }

    /// Save a checkpoint into `store` once `request.frame` frames have run.
    pub fn save_checkpoint_at(&mut self, request: CheckpointRequest, store: &'a dyn CheckpointStore) {
        self.checkpoint = Some((request, store));
    }

    pub fn set_stop_handle(&mut self, stop: StopHandle) {
        self.stop = stop;
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Frames executed so far.
    pub fn frame(&self) -> FrameNumber {
        self.sim.frame()
    }

    pub fn frame_count(&self) -> FrameNumber {
        self.stream.frame_count()
    }

    pub fn accumulator(&self) -> u32 {
        self.accumulator
    }

    pub fn diverged(&self) -> bool {
        self.diverged
    }

    /// Playback has executed every recorded frame.
    pub fn is_complete(&self) -> bool {
        self.sim.frame() >= self.stream.frame_count()
    }

    /// Execute one frame.
    pub fn step(&mut self) -> Result<FrameReport> {
        let frame = self.sim.frame();
        let mut expected = None;

        if let Some(batch) = self.stream.take_batch(frame)? {
            for command in &batch.commands {
                match command.game_message().and_then(GameMessage::as_logic_crc) {
                    Some(crc) => expected = Some(crc),
                    None => self.sim.apply(command),
                }
            }
        }

        self.sim.advance();
        let checksum = self.sim.checksum();
        self.accumulator = fold_checksum(self.accumulator, checksum);
        let diverged = expected.is_some_and(|e| e != checksum);
        if diverged {
            self.diverged = true;
        }

        let report = FrameReport {
            frame,
            checksum,
            expected,
            accumulator: self.accumulator,
            diverged,
        };
        for observer in &mut self.observers {
            observer.on_frame(&report);
        }
        Ok(report)
    }

    /// Run until completion, divergence, checkpoint save or stop.
    pub fn run(&mut self) -> Result<SessionOutcome> {
        if let Some((request, _)) = &self.checkpoint {
            let current = self.sim.frame();
            if request.frame <= current || request.frame > self.stream.frame_count() {
                return Err(ReplayError::CheckpointSave {
                    name: request.name.clone(),
                    reason: format!(
                        "frame {} is outside remaining playback {}..={}",
                        request.frame,
                        current + 1,
                        self.stream.frame_count()
                    ),
                });
            }
        }

        loop {
            if self.stop.is_stopped() {
                log::info!("{}: stopped at frame {}", self.stream.name(), self.sim.frame());
                return Ok(SessionOutcome::Stopped {
                    frame: self.sim.frame(),
                });
            }
            if self.is_complete() {
                if !self.stream.is_exhausted() {
                    log::warn!(
                        "{}: packets remain after final frame {}",
                        self.stream.name(),
                        self.stream.frame_count()
                    );
                }
                return Ok(SessionOutcome::Completed {
                    frames: self.sim.frame(),
                    final_checksum: self.sim.checksum(),
                    accumulator: self.accumulator,
                });
            }

            let report = self.step()?;

            if let Some((request, store)) = &self.checkpoint
                && self.sim.frame() == request.frame
            {
                let name = request.name.clone();
                store.save(&name, &self.checkpoint_record())?;
                return Ok(SessionOutcome::CheckpointSaved {
                    frame: self.sim.frame(),
                    name,
                });
            }

            if let (true, Some(expected)) = (report.diverged, report.expected) {
                let divergence = ReplayError::ChecksumDivergence {
                    frame: report.frame,
                    expected,
                    actual: report.checksum,
                };
                log::error!("{}: {divergence}", self.stream.name());
                return Ok(SessionOutcome::Diverged {
                    frame: report.frame,
                    expected,
                    actual: report.checksum,
                });
            }
        }
    }

    /// Snapshot the session as a checkpoint.
    pub fn checkpoint_record(&self) -> Checkpoint {
        let header = self.stream.header();
        Checkpoint {
            replay_name: self.stream.name().to_string(),
            replay_sha256: self.stream.sha256().to_string(),
            map_name: header.map_name.clone(),
            host_name: header.host_name.clone(),
            frame: self.sim.frame(),
            checksum_accumulator: self.accumulator,
            stream_offset: self.stream.position(),
            playback_mode: true,
            sim_state: self.sim.save_state(),
        }
    }
}
