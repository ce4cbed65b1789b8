//! Recorded command stream format.
//!
//! ```text
//! magic "LKRP" | version u8 | header_len u32 LE | ReplayHeaderProto | packets
//! ```
//!
//! The packet section holds, for each frame that saw traffic, one
//! `FrameInfo` (frame F, command count N) followed by N command packets.
//! Frames strictly increase. Frames without traffic are absent; playback
//! still steps them and ends when the simulation reaches the header's
//! `frame_count`.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use lockstep_wire::{
    Command, CommandHeader, CommandKind, FieldTag, FrameInfoCommand, FrameNumber,
    ReplayHeaderProto,
};
use prost::Message;
use sha2::{Digest, Sha256};

use crate::error::{ReplayError, Result};

/// File magic.
pub const REPLAY_MAGIC: &[u8; 4] = b"LKRP";

/// Current format version.
pub const REPLAY_FORMAT_VERSION: u8 = 1;

/// Bytes before the header record: magic, version, header length.
const PREAMBLE_LEN: usize = 4 + 1 + 4;

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

// ============================================================================
// Frame Batch
// ============================================================================

/// Commands recorded for one frame, in stream order.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBatch {
    pub frame: FrameNumber,
    pub commands: Vec<Command>,
}

// ============================================================================
// Reading
// ============================================================================

/// A recorded stream opened for playback.
///
/// The whole file is held in memory; the cursor walks the packet section.
#[derive(Debug, Clone)]
pub struct ReplayStream {
    name: String,
    bytes: Vec<u8>,
    header: ReplayHeaderProto,
    sha256: String,
    packets_start: usize,
    cursor: usize,
    /// Frame of the last batch taken, for ordering checks.
    last_frame: Option<FrameNumber>,
}

impl ReplayStream {
    /// Open `path`, naming the stream `name` in logs and checkpoints.
    pub fn open(name: &str, path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::from_bytes(name, bytes)
    }

    pub fn from_bytes(name: &str, bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < PREAMBLE_LEN || &bytes[..4] != REPLAY_MAGIC {
            return Err(ReplayError::InvalidMagic);
        }
        let version = bytes[4];
        if version != REPLAY_FORMAT_VERSION {
            return Err(ReplayError::UnsupportedVersion(version));
        }
        let header_len = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]) as usize;
        let packets_start = PREAMBLE_LEN
            .checked_add(header_len)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| ReplayError::CorruptStream {
                offset: PREAMBLE_LEN as u64,
                detail: format!("header length {header_len} runs past end of file"),
            })?;
        let header = ReplayHeaderProto::decode(&bytes[PREAMBLE_LEN..packets_start])?;
        let sha256 = sha256_hex(&bytes);

        Ok(Self {
            name: name.to_string(),
            bytes,
            header,
            sha256,
            packets_start,
            cursor: packets_start,
            last_frame: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &ReplayHeaderProto {
        &self.header
    }

    /// Frames the recording host executed.
    pub fn frame_count(&self) -> FrameNumber {
        self.header.frame_count
    }

    /// SHA-256 of the file bytes.
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// File offset of the first packet.
    pub fn packets_start(&self) -> u64 {
        self.packets_start as u64
    }

    /// File offset of the next unread packet.
    pub fn position(&self) -> u64 {
        self.cursor as u64
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.bytes.len()
    }

    /// Move the cursor to a packet boundary previously reported by
    /// [`position`](Self::position).
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        let in_range = usize::try_from(offset)
            .ok()
            .filter(|&o| o >= self.packets_start && o <= self.bytes.len());
        let Some(offset) = in_range else {
            return Err(ReplayError::CorruptStream {
                offset,
                detail: format!(
                    "seek outside packet section {}..{}",
                    self.packets_start,
                    self.bytes.len()
                ),
            });
        };
        self.cursor = offset;
        self.last_frame = None;
        Ok(())
    }

    fn decode_at(&self, at: usize) -> Result<(Command, usize)> {
        Command::decode_prefix(&self.bytes[at..]).map_err(|source| ReplayError::Packet {
            offset: at as u64,
            source,
        })
    }

    /// Frame of the next batch without consuming it.
    pub fn peek_frame(&self) -> Result<Option<FrameNumber>> {
        if self.is_exhausted() {
            return Ok(None);
        }
        match self.decode_at(self.cursor)? {
            (Command::FrameInfo(info), _) => Ok(Some(info.header.frame)),
            (other, _) => Err(ReplayError::CorruptStream {
                offset: self.cursor as u64,
                detail: format!("expected FrameInfo, found {:?}", other.kind()),
            }),
        }
    }

    /// Read the next batch, whatever its frame.
    pub fn next_batch(&mut self) -> Result<Option<FrameBatch>> {
        if self.is_exhausted() {
            return Ok(None);
        }
        let batch_offset = self.cursor as u64;
        let (info, mut at) = match self.decode_at(self.cursor)? {
            (Command::FrameInfo(info), used) => (info, self.cursor + used),
            (other, _) => {
                return Err(ReplayError::CorruptStream {
                    offset: batch_offset,
                    detail: format!("expected FrameInfo, found {:?}", other.kind()),
                });
            }
        };
        let frame = info.header.frame;
        if self.last_frame.is_some_and(|last| frame <= last) {
            return Err(ReplayError::CorruptStream {
                offset: batch_offset,
                detail: format!("frame {frame} does not follow frame {:?}", self.last_frame),
            });
        }

        let mut commands = Vec::with_capacity(usize::from(info.command_count));
        for _ in 0..info.command_count {
            if at >= self.bytes.len() {
                return Err(ReplayError::CorruptStream {
                    offset: at as u64,
                    detail: format!(
                        "frame {frame} declares {} commands, stream ends after {}",
                        info.command_count,
                        commands.len()
                    ),
                });
            }
            let (command, used) = self.decode_at(at)?;
            if command.kind().carries(FieldTag::Frame) && command.header().frame != frame {
                return Err(ReplayError::CorruptStream {
                    offset: at as u64,
                    detail: format!(
                        "{:?} scheduled for frame {} inside batch for frame {frame}",
                        command.kind(),
                        command.header().frame
                    ),
                });
            }
            commands.push(command);
            at += used;
        }

        self.cursor = at;
        self.last_frame = Some(frame);
        Ok(Some(FrameBatch { frame, commands }))
    }

    /// Take the batch for `frame` if it is next.
    ///
    /// Returns `None` when the next batch is for a later frame or the stream
    /// is exhausted. A next batch for an earlier frame means the stream and
    /// the simulation have drifted apart and is reported as corrupt.
    pub fn take_batch(&mut self, frame: FrameNumber) -> Result<Option<FrameBatch>> {
        match self.peek_frame()? {
            Some(next) if next == frame => self.next_batch(),
            Some(next) if next < frame => Err(ReplayError::CorruptStream {
                offset: self.position(),
                detail: format!("batch for frame {next} found while executing frame {frame}"),
            }),
            _ => Ok(None),
        }
    }
}

// ============================================================================
// Writing
// ============================================================================

/// Builds a recorded stream frame by frame.
#[derive(Debug, Clone)]
pub struct ReplayWriter {
    header: ReplayHeaderProto,
    packets: Vec<u8>,
    last_frame: Option<FrameNumber>,
}

impl ReplayWriter {
    pub fn new(header: ReplayHeaderProto) -> Self {
        Self {
            header,
            packets: Vec::new(),
            last_frame: None,
        }
    }

    /// Bytes of packet data written so far.
    pub fn packet_len(&self) -> usize {
        self.packets.len()
    }

    /// Append the batch for `frame`. Empty batches are skipped.
    pub fn write_frame(&mut self, frame: FrameNumber, commands: &[Command]) -> Result<()> {
        if commands.is_empty() {
            return Ok(());
        }
        if self.last_frame.is_some_and(|last| frame <= last) {
            return Err(ReplayError::Recording(format!(
                "frame {frame} written after frame {:?}",
                self.last_frame
            )));
        }
        let command_count = u16::try_from(commands.len()).map_err(|_| {
            ReplayError::Recording(format!("{} commands in frame {frame}", commands.len()))
        })?;
        if let Some(stray) = commands
            .iter()
            .find(|c| c.kind().carries(FieldTag::Frame) && c.header().frame != frame)
        {
            return Err(ReplayError::Recording(format!(
                "{:?} for frame {} written into frame {frame}",
                stray.kind(),
                stray.header().frame
            )));
        }
        if let Some(message) = commands
            .iter()
            .filter_map(Command::game_message)
            .find(|m| !m.is_encodable())
        {
            return Err(ReplayError::Recording(format!(
                "message {} has {} arguments in too many type runs to encode",
                message.message_type,
                message.arguments.len()
            )));
        }
        if commands.iter().any(|c| c.kind() == CommandKind::FrameInfo) {
            return Err(ReplayError::Recording(
                "FrameInfo is written by the recorder".to_string(),
            ));
        }

        let player = commands[0].header().player_id;
        Command::FrameInfo(FrameInfoCommand {
            header: CommandHeader::new(player).with_frame(frame),
            command_count,
        })
        .encode_into(&mut self.packets);
        for command in commands {
            command.encode_into(&mut self.packets);
        }
        self.last_frame = Some(frame);
        Ok(())
    }

    /// Finish the recording; playback will run `frame_count` frames.
    pub fn finish(mut self, frame_count: FrameNumber) -> Vec<u8> {
        self.header.frame_count = frame_count;
        let header = self.header.encode_to_vec();

        let mut out = Vec::with_capacity(PREAMBLE_LEN + header.len() + self.packets.len());
        out.extend_from_slice(REPLAY_MAGIC);
        out.push(REPLAY_FORMAT_VERSION);
        out.extend_from_slice(&(header.len() as u32).to_le_bytes());
        out.extend_from_slice(&header);
        out.extend_from_slice(&self.packets);
        out
    }
}

/// Write a finished recording to `path`. Never overwrites.
pub fn write_replay(bytes: &[u8], path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    if path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("Replay already exists at {}", path.display()),
        ));
    }

    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
