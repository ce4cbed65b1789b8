//! Lockstep Replay Verification
//!
//! Replays a recorded command stream through a [`Simulation`] and checks that
//! every recorded checksum is reproduced.
//!
//! # Architecture
//!
//! - [`ReplayStream`] / [`ReplayWriter`]: the recorded stream file
//! - [`ReplaySession`]: frame-by-frame playback of one stream
//! - [`run_sequential`] / [`run_parallel`]: many streams, in this process or
//!   in a bounded pool of worker processes
//! - [`ResumeCoordinator`]: continuing playback from a saved [`Checkpoint`]
//! - [`resolve_wildcards`]: `*`/`?` expansion of source names
//!
//! Run reports (`Simulating Replay ...`, progress lines, totals) are written to
//! a caller-supplied `io::Write`; diagnostics go through `log`.

#![deny(unsafe_code)]

pub mod checkpoint;
pub mod error;
pub mod format;
pub mod observer;
pub mod parallel;
pub mod recorder;
pub mod resume;
pub mod sequential;
pub mod session;
pub mod wildcard;

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use lockstep_sim::{LOGIC_FRAMES_PER_SECOND, Simulation};
use lockstep_wire::FrameNumber;

pub use checkpoint::{Checkpoint, CheckpointStore, DirectoryCheckpointStore};
pub use error::{ReplayError, Result};
pub use format::{
    FrameBatch, REPLAY_FORMAT_VERSION, REPLAY_MAGIC, ReplayStream, ReplayWriter, sha256_hex,
    write_replay,
};
pub use observer::{
    ChecksumTrace, FrameObserver, FrameReport, ProgressReporter, elapsed_line, wall_time,
};
pub use parallel::{ProcessLauncher, Worker, WorkerLauncher, WorkerStatus, run_parallel};
pub use recorder::ReplayRecorder;
pub use resume::{ResumeCoordinator, ResumeState, continue_from_checkpoint};
pub use sequential::run_sequential;
pub use session::{CheckpointRequest, ReplaySession, SessionOutcome, StopHandle, fold_checksum};
pub use wildcard::{FileEnumerator, LocalFileSystem, resolve_wildcards, wildcard_match};

// ============================================================================
// Options
// ============================================================================

/// Progress line every 10 minutes of game time.
pub const DEFAULT_PROGRESS_INTERVAL: FrameNumber = 10 * 60 * LOGIC_FRAMES_PER_SECOND;

/// Settings shared by every playback mode.
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    /// Source names are relative to this directory.
    pub replay_dir: PathBuf,
    /// Checkpoints are read from and written to this directory.
    pub save_dir: PathBuf,
    /// Frames between progress lines; 0 disables them.
    pub progress_interval: FrameNumber,
    /// Sleep between polls of the worker pool.
    pub poll_interval: Duration,
    /// Save a checkpoint once this many frames have run...
    pub save_at_frame: Option<FrameNumber>,
    /// ...under this name.
    pub save_to: Option<String>,
    pub stop: StopHandle,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            replay_dir: PathBuf::from("Replays"),
            save_dir: PathBuf::from("Save"),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            poll_interval: Duration::from_millis(100),
            save_at_frame: None,
            save_to: None,
            stop: StopHandle::new(),
        }
    }
}

impl SimulationOptions {
    /// The checkpoint to save during playback, when both frame and name are
    /// set and the frame is not 0.
    pub fn checkpoint_request(&self) -> Option<CheckpointRequest> {
        match (self.save_at_frame, &self.save_to) {
            (Some(frame), Some(name)) if frame != 0 && !name.is_empty() => {
                Some(CheckpointRequest {
                    frame,
                    name: name.clone(),
                })
            }
            _ => None,
        }
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Where the sources are played.
pub enum DispatchMode<'a> {
    /// One after another on `simulation`.
    Sequential {
        simulation: &'a mut dyn Simulation,
        checkpoints: &'a dyn CheckpointStore,
    },
    /// In worker processes, at most `max_processes` at a time.
    Parallel {
        launcher: &'a mut dyn WorkerLauncher,
        max_processes: usize,
    },
}

/// Result of a multi-source run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub sources: usize,
    pub errors: usize,
}

impl RunSummary {
    /// 0 when every source played cleanly, else 1.
    pub fn exit_code(&self) -> i32 {
        i32::from(self.errors != 0)
    }
}

/// Expand wildcards in `names`, then play every resulting source.
pub fn simulate_replays(
    names: &[String],
    files: &dyn FileEnumerator,
    mode: DispatchMode<'_>,
    options: &SimulationOptions,
    out: &mut dyn Write,
) -> io::Result<RunSummary> {
    let sources = resolve_wildcards(names, &options.replay_dir, files);
    log::info!("{} replays to simulate", sources.len());
    match mode {
        DispatchMode::Sequential {
            simulation,
            checkpoints,
        } => run_sequential(&sources, simulation, checkpoints, options, out),
        DispatchMode::Parallel {
            launcher,
            max_processes,
        } => run_parallel(&sources, launcher, max_processes, options.poll_interval, out),
    }
}
