//! Checkpoints: a replay's simulation state saved mid-playback.

use std::fs;
use std::path::{Path, PathBuf};

use lockstep_wire::{CheckpointProto, FrameNumber};
use prost::Message;

use crate::error::{ReplayError, Result};

/// A resumable point inside a replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// Replay the checkpoint belongs to, relative to the replay directory.
    pub replay_name: String,
    /// SHA-256 of that replay's bytes.
    pub replay_sha256: String,
    pub map_name: String,
    pub host_name: String,
    /// Frames executed when saved.
    pub frame: FrameNumber,
    pub checksum_accumulator: u32,
    /// File offset of the next unread packet.
    pub stream_offset: u64,
    /// Taken during replay playback.
    pub playback_mode: bool,
    /// Opaque simulation state.
    pub sim_state: Vec<u8>,
}

impl From<Checkpoint> for CheckpointProto {
    fn from(c: Checkpoint) -> Self {
        Self {
            replay_name: c.replay_name,
            replay_sha256: c.replay_sha256,
            map_name: c.map_name,
            host_name: c.host_name,
            frame: c.frame,
            checksum_accumulator: c.checksum_accumulator,
            stream_offset: c.stream_offset,
            playback_mode: c.playback_mode,
            sim_state: c.sim_state,
        }
    }
}

impl From<CheckpointProto> for Checkpoint {
    fn from(p: CheckpointProto) -> Self {
        Self {
            replay_name: p.replay_name,
            replay_sha256: p.replay_sha256,
            map_name: p.map_name,
            host_name: p.host_name,
            frame: p.frame,
            checksum_accumulator: p.checksum_accumulator,
            stream_offset: p.stream_offset,
            playback_mode: p.playback_mode,
            sim_state: p.sim_state,
        }
    }
}

impl Checkpoint {
    pub fn encode(&self) -> Vec<u8> {
        CheckpointProto::from(self.clone()).encode_to_vec()
    }

    pub fn decode(bytes: &[u8]) -> std::result::Result<Self, prost::DecodeError> {
        CheckpointProto::decode(bytes).map(Into::into)
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Where checkpoints are kept, by name.
pub trait CheckpointStore {
    fn save(&self, name: &str, checkpoint: &Checkpoint) -> Result<()>;
    fn load(&self, name: &str) -> Result<Checkpoint>;
}

/// Stores each checkpoint as a file named `name` under a save directory.
#[derive(Debug, Clone)]
pub struct DirectoryCheckpointStore {
    dir: PathBuf,
}

impl DirectoryCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl CheckpointStore for DirectoryCheckpointStore {
    fn save(&self, name: &str, checkpoint: &Checkpoint) -> Result<()> {
        let fail = |reason: String| ReplayError::CheckpointSave {
            name: name.to_string(),
            reason,
        };
        let path = self.path_for(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| fail(e.to_string()))?;
        }
        fs::write(&path, checkpoint.encode()).map_err(|e| fail(e.to_string()))?;
        log::info!(
            "saved checkpoint {} at frame {} to {}",
            name,
            checkpoint.frame,
            path.display()
        );
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Checkpoint> {
        let fail = |reason: String| ReplayError::CheckpointLoad {
            name: name.to_string(),
            reason,
        };
        let path = self.path_for(name);
        let bytes = fs::read(&path).map_err(|e| fail(format!("{}: {e}", path.display())))?;
        Checkpoint::decode(&bytes).map_err(|e| fail(e.to_string()))
    }
}
