//! Resuming playback from a saved checkpoint.
//!
//! The recording must be loaded before the checkpoint: the simulation needs
//! the recording's session context (map, host, roster) in place before it can
//! accept saved state.
//!
//! ```text
//! Idle -> ReplayContextLoaded -> CheckpointLoaded -> Resuming -> Completed
//!                                                             \-> Diverged
//! ```
//!
//! Any failed step moves the coordinator to `Failed`.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

use lockstep_sim::{SessionContext, Simulation};
use lockstep_wire::FrameNumber;

use crate::SimulationOptions;
use crate::checkpoint::CheckpointStore;
use crate::error::{ReplayError, Result};
use crate::format::ReplayStream;
use crate::observer::{FrameObserver, ProgressReporter, elapsed_line};
use crate::session::{ReplaySession, SessionOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeState {
    Idle,
    ReplayContextLoaded,
    CheckpointLoaded,
    Resuming,
    Completed,
    Diverged,
    Failed,
}

impl ResumeState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::ReplayContextLoaded => "ReplayContextLoaded",
            Self::CheckpointLoaded => "CheckpointLoaded",
            Self::Resuming => "Resuming",
            Self::Completed => "Completed",
            Self::Diverged => "Diverged",
            Self::Failed => "Failed",
        }
    }
}

/// Drives one checkpoint resume through its states.
pub struct ResumeCoordinator<'a> {
    sim: &'a mut dyn Simulation,
    checkpoints: &'a dyn CheckpointStore,
    replay_dir: PathBuf,
    state: ResumeState,
    stream: Option<ReplayStream>,
    accumulator: u32,
}

impl<'a> ResumeCoordinator<'a> {
    pub fn new(
        sim: &'a mut dyn Simulation,
        checkpoints: &'a dyn CheckpointStore,
        replay_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            sim,
            checkpoints,
            replay_dir: replay_dir.into(),
            state: ResumeState::Idle,
            stream: None,
            accumulator: 0,
        }
    }

    pub fn state(&self) -> ResumeState {
        self.state
    }

    /// Frames executed by the simulation.
    pub fn frame(&self) -> FrameNumber {
        self.sim.frame()
    }

    /// Frames in the loaded recording, 0 before one is loaded.
    pub fn frame_count(&self) -> FrameNumber {
        self.stream.as_ref().map_or(0, ReplayStream::frame_count)
    }

    fn require(&self, state: ResumeState, operation: &'static str) -> Result<()> {
        if self.state == state {
            Ok(())
        } else {
            Err(ReplayError::InvalidState {
                operation,
                state: self.state.name(),
            })
        }
    }

    fn fail<T>(&mut self, err: ReplayError) -> Result<T> {
        self.state = ResumeState::Failed;
        Err(err)
    }

    /// Open `replay` (relative to the replay directory) and start a session
    /// with its context.
    pub fn load_replay_context(&mut self, replay: &str) -> Result<()> {
        self.require(ResumeState::Idle, "load_replay_context")?;

        let path = self.replay_dir.join(replay);
        let opened = ReplayStream::open(replay, &path).and_then(|stream| {
            let context = SessionContext::try_from(stream.header())?;
            self.sim.begin_session(&context)?;
            Ok(stream)
        });
        match opened {
            Ok(stream) => {
                log::debug!("initialized {replay} for checkpoint load");
                self.stream = Some(stream);
                self.state = ResumeState::ReplayContextLoaded;
                Ok(())
            }
            Err(err) => self.fail(ReplayError::SourceOpen {
                name: replay.to_string(),
                reason: err.to_string(),
            }),
        }
    }

    /// Restore the simulation from checkpoint `name` and position the
    /// recording after the checkpoint frame.
    pub fn load_checkpoint(&mut self, name: &str) -> Result<()> {
        self.require(ResumeState::ReplayContextLoaded, "load_checkpoint")?;
        match self.restore(name) {
            Ok(()) => {
                self.state = ResumeState::CheckpointLoaded;
                Ok(())
            }
            Err(err) => self.fail(err),
        }
    }

    fn restore(&mut self, name: &str) -> Result<()> {
        let reject = |reason: String| ReplayError::CheckpointLoad {
            name: name.to_string(),
            reason,
        };
        let checkpoint = self.checkpoints.load(name)?;
        let Some(stream) = self.stream.as_mut() else {
            return Err(reject("no recording loaded".to_string()));
        };

        if !checkpoint.playback_mode {
            return Err(reject("not saved during replay playback".to_string()));
        }
        if checkpoint.replay_sha256 != stream.sha256() {
            return Err(reject(format!(
                "saved from {} ({}), loaded recording is {} ({})",
                checkpoint.replay_name,
                checkpoint.replay_sha256,
                stream.name(),
                stream.sha256()
            )));
        }
        if checkpoint.frame > stream.frame_count() {
            return Err(reject(format!(
                "frame {} is past the end of the recording ({})",
                checkpoint.frame,
                stream.frame_count()
            )));
        }

        self.sim
            .load_state(&checkpoint.sim_state)
            .map_err(|e| reject(e.to_string()))?;
        if self.sim.frame() != checkpoint.frame {
            return Err(reject(format!(
                "state is at frame {}, checkpoint records frame {}",
                self.sim.frame(),
                checkpoint.frame
            )));
        }
        stream
            .seek(checkpoint.stream_offset)
            .map_err(|e| reject(e.to_string()))?;
        self.accumulator = checkpoint.checksum_accumulator;

        log::info!("resuming {} from frame {}", stream.name(), checkpoint.frame);
        Ok(())
    }

    /// Play from the checkpoint frame to the end of the recording.
    pub fn resume<'o>(
        &mut self,
        observers: Vec<Box<dyn FrameObserver + 'o>>,
    ) -> Result<SessionOutcome> {
        self.require(ResumeState::CheckpointLoaded, "resume")?;
        let Some(stream) = self.stream.take() else {
            return self.fail(ReplayError::InvalidState {
                operation: "resume",
                state: self.state.name(),
            });
        };
        self.state = ResumeState::Resuming;

        let result = {
            let mut session = ReplaySession::resume(stream, &mut *self.sim, self.accumulator);
            for observer in observers {
                session.add_observer(observer);
            }
            session.run()
        };

        match result {
            Ok(outcome @ SessionOutcome::Completed { .. }) => {
                self.state = ResumeState::Completed;
                Ok(outcome)
            }
            Ok(outcome @ SessionOutcome::Diverged { .. }) => {
                self.state = ResumeState::Diverged;
                Ok(outcome)
            }
            Ok(other) => {
                self.state = ResumeState::Failed;
                Ok(other)
            }
            Err(err) => self.fail(err),
        }
    }
}

/// Load checkpoint `checkpoint` against the first of `replays` and play on
/// to the end. Returns the process exit status.
pub fn continue_from_checkpoint(
    replays: &[String],
    checkpoint: &str,
    sim: &mut dyn Simulation,
    checkpoints: &dyn CheckpointStore,
    options: &SimulationOptions,
    out: &mut dyn Write,
) -> i32 {
    match try_continue(replays, checkpoint, sim, checkpoints, options, out) {
        Ok(status) => status,
        Err(err) => {
            log::error!("{err}");
            1
        }
    }
}

fn try_continue(
    replays: &[String],
    checkpoint: &str,
    sim: &mut dyn Simulation,
    checkpoints: &dyn CheckpointStore,
    options: &SimulationOptions,
    out: &mut dyn Write,
) -> io::Result<i32> {
    let Some(replay) = replays.first() else {
        log::error!("no replay file specified for checkpoint loading");
        return Ok(1);
    };

    let mut coordinator = ResumeCoordinator::new(sim, checkpoints, &options.replay_dir);
    if let Err(err) = coordinator.load_replay_context(replay) {
        log::error!("{err}");
        return Ok(1);
    }
    if let Err(err) = coordinator.load_checkpoint(checkpoint) {
        log::error!("{err}");
        return Ok(1);
    }

    let started = Instant::now();
    let total_frames = coordinator.frame_count();
    let progress: Box<dyn FrameObserver + '_> = Box::new(ProgressReporter::new(
        &mut *out,
        options.progress_interval,
        total_frames,
    ));
    let result = coordinator.resume(vec![progress]);
    writeln!(
        out,
        "{}",
        elapsed_line(started.elapsed(), coordinator.frame(), total_frames)
    )?;

    let status = match result {
        Ok(SessionOutcome::Completed { .. }) => {
            writeln!(out, "Replay completed successfully")?;
            0
        }
        Ok(SessionOutcome::Diverged { .. }) => {
            writeln!(out, "CRC Mismatch detected!")?;
            1
        }
        Ok(other) => {
            log::error!("resume ended early: {other:?}");
            1
        }
        Err(err) => {
            log::error!("{err}");
            1
        }
    };
    out.flush()?;
    Ok(status)
}

#[cfg(test)]
mod tests {
    use lockstep_sim::World;

    use super::*;
    use crate::checkpoint::{Checkpoint, DirectoryCheckpointStore};

    #[test]
    fn test_checkpoint_before_replay_is_invalid_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryCheckpointStore::new(dir.path());
        let mut world = World::new();
        let mut coordinator = ResumeCoordinator::new(&mut world, &store, dir.path());
        assert!(matches!(
            coordinator.load_checkpoint("c"),
            Err(ReplayError::InvalidState {
                operation: "load_checkpoint",
                state: "Idle"
            })
        ));
        assert_eq!(coordinator.state(), ResumeState::Idle);
    }

    #[test]
    fn test_missing_replay_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryCheckpointStore::new(dir.path());
        let mut world = World::new();
        let mut coordinator = ResumeCoordinator::new(&mut world, &store, dir.path());
        assert!(matches!(
            coordinator.load_replay_context("absent.rep"),
            Err(ReplayError::SourceOpen { .. })
        ));
        assert_eq!(coordinator.state(), ResumeState::Failed);
        assert!(coordinator.resume(Vec::new()).is_err());
    }

    #[test]
    fn test_no_replay_named_exits_with_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryCheckpointStore::new(dir.path());
        store
            .save(
                "c",
                &Checkpoint {
                    replay_name: String::new(),
                    replay_sha256: String::new(),
                    map_name: String::new(),
                    host_name: String::new(),
                    frame: 0,
                    checksum_accumulator: 0,
                    stream_offset: 0,
                    playback_mode: true,
                    sim_state: Vec::new(),
                },
            )
            .unwrap();
        let mut world = World::new();
        let mut out = Vec::new();
        let status = continue_from_checkpoint(
            &[],
            "c",
            &mut world,
            &store,
            &SimulationOptions::default(),
            &mut out,
        );
        assert_eq!(status, 1);
        assert!(out.is_empty());
    }
}
