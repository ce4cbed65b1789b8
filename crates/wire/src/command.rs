//! Command records and their byte-exact encode/decode.
//!
//! A packet is the kind's tagged header (see [`CommandKind::layout`]) followed
//! by the kind's fixed body fields and, for variable kinds, a tail whose
//! length is declared in the body (count byte, NUL terminator, or explicit
//! length field). Decoding is schema-driven: the decoder knows which kind it
//! is reading and consumes fields strictly left to right.

use crate::error::{Result, WireError};
use crate::field::{FieldTag, PacketReader, PacketWriter};
use crate::game_message::GameMessage;
use crate::header::CommandHeader;
use crate::kind::CommandKind;
use crate::{CommandId, FrameNumber, PlayerId};

/// Longest chat text, in UTF-16 code units.
pub const MAX_TEXT_LEN: usize = 255;

// ============================================================================
// Records
// ============================================================================

/// Acknowledgement of another player's command (all three ack stages).
#[derive(Debug, Clone, PartialEq)]
pub struct AckCommand {
    pub header: CommandHeader,
    /// Command id being acknowledged.
    pub command_id: CommandId,
    /// Player who originally sent the acknowledged command.
    pub original_player_id: PlayerId,
}

/// Number of commands a player issued for `header.frame`.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInfoCommand {
    pub header: CommandHeader,
    pub command_count: u16,
}

/// Carries an opaque simulation message.
#[derive(Debug, Clone, PartialEq)]
pub struct GameCommand {
    pub header: CommandHeader,
    pub message: GameMessage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerLeaveCommand {
    pub header: CommandHeader,
    pub leaving_player_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunAheadMetricsCommand {
    pub header: CommandHeader,
    pub average_latency: f32,
    pub average_fps: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunAheadCommand {
    pub header: CommandHeader,
    pub run_ahead: u16,
    pub frame_rate: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DestroyPlayerCommand {
    pub header: CommandHeader,
    pub player_index: u32,
}

/// Chat sent while the disconnect screen is up.
#[derive(Debug, Clone, PartialEq)]
pub struct DisconnectChatCommand {
    pub header: CommandHeader,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatCommand {
    pub header: CommandHeader,
    pub text: String,
    /// Recipients, one bit per player slot.
    pub player_mask: i32,
}

/// Map-load progress, 0..=100.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressCommand {
    pub header: CommandHeader,
    pub percentage: u8,
}

/// One chunk of a logical command too large for a single packet.
///
/// `data_length` is not stored; it is `data.len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct WrapperCommand {
    pub header: CommandHeader,
    pub wrapped_command_id: CommandId,
    pub chunk_number: u32,
    pub num_chunks: u32,
    pub total_data_length: u32,
    pub data_offset: u32,
    pub data: Vec<u8>,
}

impl WrapperCommand {
    pub fn data_length(&self) -> u32 {
        self.data.len() as u32
    }
}

/// File transfer body.
#[derive(Debug, Clone, PartialEq)]
pub struct FileCommand {
    pub header: CommandHeader,
    pub filename: String,
    pub data: Vec<u8>,
}

/// File transfer header announcing an upcoming file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileAnnounceCommand {
    pub header: CommandHeader,
    pub filename: String,
    pub file_id: u16,
    pub player_mask: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileProgressCommand {
    pub header: CommandHeader,
    pub file_id: u16,
    pub progress: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameResendRequestCommand {
    pub header: CommandHeader,
    pub frame_to_resend: FrameNumber,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisconnectPlayerCommand {
    pub header: CommandHeader,
    pub slot: u8,
    pub disconnect_frame: FrameNumber,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisconnectVoteCommand {
    pub header: CommandHeader,
    pub slot: u8,
    pub vote_frame: FrameNumber,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisconnectFrameCommand {
    pub header: CommandHeader,
    pub disconnect_frame: FrameNumber,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisconnectScreenOffCommand {
    pub header: CommandHeader,
    pub new_frame: FrameNumber,
}

// ============================================================================
// Command
// ============================================================================

/// Any command in the catalog. Kinds without a body hold just the header.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AckBoth(AckCommand),
    AckStage1(AckCommand),
    AckStage2(AckCommand),
    FrameInfo(FrameInfoCommand),
    Game(GameCommand),
    PlayerLeave(PlayerLeaveCommand),
    RunAheadMetrics(RunAheadMetricsCommand),
    RunAhead(RunAheadCommand),
    DestroyPlayer(DestroyPlayerCommand),
    KeepAlive(CommandHeader),
    DisconnectChat(DisconnectChatCommand),
    Chat(ChatCommand),
    Progress(ProgressCommand),
    LoadComplete(CommandHeader),
    TimeoutGameStart(CommandHeader),
    Wrapper(WrapperCommand),
    File(FileCommand),
    FileAnnounce(FileAnnounceCommand),
    FileProgress(FileProgressCommand),
    FrameResendRequest(FrameResendRequestCommand),
    DisconnectKeepAlive(CommandHeader),
    DisconnectPlayer(DisconnectPlayerCommand),
    RouterQuery(CommandHeader),
    RouterAck(CommandHeader),
    DisconnectVote(DisconnectVoteCommand),
    DisconnectFrame(DisconnectFrameCommand),
    DisconnectScreenOff(DisconnectScreenOffCommand),
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::AckBoth(_) => CommandKind::AckBoth,
            Self::AckStage1(_) => CommandKind::AckStage1,
            Self::AckStage2(_) => CommandKind::AckStage2,
            Self::FrameInfo(_) => CommandKind::FrameInfo,
            Self::Game(_) => CommandKind::GameCommand,
            Self::PlayerLeave(_) => CommandKind::PlayerLeave,
            Self::RunAheadMetrics(_) => CommandKind::RunAheadMetrics,
            Self::RunAhead(_) => CommandKind::RunAhead,
            Self::DestroyPlayer(_) => CommandKind::DestroyPlayer,
            Self::KeepAlive(_) => CommandKind::KeepAlive,
            Self::DisconnectChat(_) => CommandKind::DisconnectChat,
            Self::Chat(_) => CommandKind::Chat,
            Self::Progress(_) => CommandKind::Progress,
            Self::LoadComplete(_) => CommandKind::LoadComplete,
            Self::TimeoutGameStart(_) => CommandKind::TimeoutGameStart,
            Self::Wrapper(_) => CommandKind::Wrapper,
            Self::File(_) => CommandKind::File,
            Self::FileAnnounce(_) => CommandKind::FileAnnounce,
            Self::FileProgress(_) => CommandKind::FileProgress,
            Self::FrameResendRequest(_) => CommandKind::FrameResendRequest,
            Self::DisconnectKeepAlive(_) => CommandKind::DisconnectKeepAlive,
            Self::DisconnectPlayer(_) => CommandKind::DisconnectPlayer,
            Self::RouterQuery(_) => CommandKind::RouterQuery,
            Self::RouterAck(_) => CommandKind::RouterAck,
            Self::DisconnectVote(_) => CommandKind::DisconnectVote,
            Self::DisconnectFrame(_) => CommandKind::DisconnectFrame,
            Self::DisconnectScreenOff(_) => CommandKind::DisconnectScreenOff,
        }
    }

    pub fn header(&self) -> &CommandHeader {
        match self {
            Self::AckBoth(c) | Self::AckStage1(c) | Self::AckStage2(c) => &c.header,
            Self::FrameInfo(c) => &c.header,
            Self::Game(c) => &c.header,
            Self::PlayerLeave(c) => &c.header,
            Self::RunAheadMetrics(c) => &c.header,
            Self::RunAhead(c) => &c.header,
            Self::DestroyPlayer(c) => &c.header,
            Self::DisconnectChat(c) => &c.header,
            Self::Chat(c) => &c.header,
            Self::Progress(c) => &c.header,
            Self::Wrapper(c) => &c.header,
            Self::File(c) => &c.header,
            Self::FileAnnounce(c) => &c.header,
            Self::FileProgress(c) => &c.header,
            Self::FrameResendRequest(c) => &c.header,
            Self::DisconnectPlayer(c) => &c.header,
            Self::DisconnectVote(c) => &c.header,
            Self::DisconnectFrame(c) => &c.header,
            Self::DisconnectScreenOff(c) => &c.header,
            Self::KeepAlive(h)
            | Self::LoadComplete(h)
            | Self::TimeoutGameStart(h)
            | Self::DisconnectKeepAlive(h)
            | Self::RouterQuery(h)
            | Self::RouterAck(h) => h,
        }
    }

    /// The game message, if this is a `GameCommand`.
    pub fn game_message(&self) -> Option<&GameMessage> {
        match self {
            Self::Game(c) => Some(&c.message),
            _ => None,
        }
    }

    /// Bytes in the variable section, as counted by [`CommandKind::byte_count`].
    fn variable_len(&self) -> usize {
        match self {
            Self::Game(c) => c.message.encoded_len(),
            Self::DisconnectChat(c) => usable_text(&c.text).len() * 2,
            Self::Chat(c) => usable_text(&c.text).len() * 2,
            Self::Wrapper(c) => c.data.len(),
            Self::File(c) => cstring_len(&c.filename) + c.data.len(),
            Self::FileAnnounce(c) => cstring_len(&c.filename),
            _ => 0,
        }
    }

    /// Encoded size in bytes; always equals `self.encode().len()`.
    pub fn byte_count(&self) -> usize {
        self.kind().byte_count(self.variable_len())
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.byte_count());
        self.encode_into(&mut buf);
        buf
    }

    /// Append the encoded packet to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        let mut w = PacketWriter::new(buf);
        self.header().encode(self.kind(), &mut w);
        match self {
            Self::AckBoth(c) | Self::AckStage1(c) | Self::AckStage2(c) => {
                w.u16(c.command_id).u8(c.original_player_id);
            }
            Self::FrameInfo(c) => {
                w.u16(c.command_count);
            }
            Self::Game(c) => c.message.encode(&mut w),
            Self::PlayerLeave(c) => {
                w.u8(c.leaving_player_id);
            }
            Self::RunAheadMetrics(c) => {
                w.f32(c.average_latency).u16(c.average_fps);
            }
            Self::RunAhead(c) => {
                w.u16(c.run_ahead).u8(c.frame_rate);
            }
            Self::DestroyPlayer(c) => {
                w.u32(c.player_index);
            }
            Self::DisconnectChat(c) => {
                let units = usable_text(&c.text);
                w.u8(units.len() as u8).utf16(&units);
            }
            Self::Chat(c) => {
                let units = usable_text(&c.text);
                w.u8(units.len() as u8).utf16(&units).i32(c.player_mask);
            }
            Self::Progress(c) => {
                w.u8(c.percentage);
            }
            Self::Wrapper(c) => {
                w.u16(c.wrapped_command_id)
                    .u32(c.chunk_number)
                    .u32(c.num_chunks)
                    .u32(c.total_data_length)
                    .u32(c.data_length())
                    .u32(c.data_offset)
                    .bytes(&c.data);
            }
            Self::File(c) => {
                w.cstring(&c.filename)
                    .u32(c.data.len() as u32)
                    .bytes(&c.data);
            }
            Self::FileAnnounce(c) => {
                w.cstring(&c.filename).u16(c.file_id).u8(c.player_mask);
            }
            Self::FileProgress(c) => {
                w.u16(c.file_id).i32(c.progress);
            }
            Self::FrameResendRequest(c) => {
                w.u32(c.frame_to_resend);
            }
            Self::DisconnectPlayer(c) => {
                w.u8(c.slot).u32(c.disconnect_frame);
            }
            Self::DisconnectVote(c) => {
                w.u8(c.slot).u32(c.vote_frame);
            }
            Self::DisconnectFrame(c) => {
                w.u32(c.disconnect_frame);
            }
            Self::DisconnectScreenOff(c) => {
                w.u32(c.new_frame);
            }
            Self::KeepAlive(_)
            | Self::LoadComplete(_)
            | Self::TimeoutGameStart(_)
            | Self::DisconnectKeepAlive(_)
            | Self::RouterQuery(_)
            | Self::RouterAck(_) => {}
        }
    }

    /// Decode a packet, selecting the kind from its leading `T` field.
    ///
    /// Bytes after the packet are ignored; use [`Command::decode_prefix`] to
    /// learn how many were consumed.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::decode_prefix(bytes).map(|(command, _)| command)
    }

    /// Decode the packet at the start of `bytes`, returning it and its length.
    pub fn decode_prefix(bytes: &[u8]) -> Result<(Self, usize)> {
        let kind_byte = PacketReader::new(bytes).expect_u8(FieldTag::CommandType)?;
        let kind = CommandKind::from_byte(kind_byte)
            .ok_or_else(|| WireError::violation(1, format!("unknown command type {kind_byte}")))?;
        let mut reader = PacketReader::new(bytes);
        let command = Self::read(kind, &mut reader)?;
        Ok((command, reader.position()))
    }

    /// Decode a packet that must be of `kind`.
    pub fn decode_as(kind: CommandKind, bytes: &[u8]) -> Result<Self> {
        Self::read(kind, &mut PacketReader::new(bytes))
    }

    fn read(kind: CommandKind, r: &mut PacketReader<'_>) -> Result<Self> {
        let header = CommandHeader::decode(kind, r)?;
        let command = match kind {
            CommandKind::AckBoth | CommandKind::AckStage1 | CommandKind::AckStage2 => {
                let ack = AckCommand {
                    header,
                    command_id: r.u16()?,
                    original_player_id: r.u8()?,
                };
                match kind {
                    CommandKind::AckBoth => Self::AckBoth(ack),
                    CommandKind::AckStage1 => Self::AckStage1(ack),
                    _ => Self::AckStage2(ack),
                }
            }
            CommandKind::FrameInfo => Self::FrameInfo(FrameInfoCommand {
                header,
                command_count: r.u16()?,
            }),
            CommandKind::GameCommand => Self::Game(GameCommand {
                header,
                message: GameMessage::decode(r)?,
            }),
            CommandKind::PlayerLeave => Self::PlayerLeave(PlayerLeaveCommand {
                header,
                leaving_player_id: r.u8()?,
            }),
            CommandKind::RunAheadMetrics => Self::RunAheadMetrics(RunAheadMetricsCommand {
                header,
                average_latency: r.f32()?,
                average_fps: r.u16()?,
            }),
            CommandKind::RunAhead => Self::RunAhead(RunAheadCommand {
                header,
                run_ahead: r.u16()?,
                frame_rate: r.u8()?,
            }),
            CommandKind::DestroyPlayer => Self::DestroyPlayer(DestroyPlayerCommand {
                header,
                player_index: r.u32()?,
            }),
            CommandKind::KeepAlive => Self::KeepAlive(header),
            CommandKind::DisconnectChat => Self::DisconnectChat(DisconnectChatCommand {
                header,
                text: read_text(r)?,
            }),
            CommandKind::Chat => Self::Chat(ChatCommand {
                header,
                text: read_text(r)?,
                player_mask: r.i32()?,
            }),
            CommandKind::Progress => Self::Progress(ProgressCommand {
                header,
                percentage: r.u8()?,
            }),
            CommandKind::LoadComplete => Self::LoadComplete(header),
            CommandKind::TimeoutGameStart => Self::TimeoutGameStart(header),
            CommandKind::Wrapper => Self::Wrapper(read_wrapper(header, r)?),
            CommandKind::File => {
                let filename = r.cstring()?;
                let len = r.u32()? as usize;
                Self::File(FileCommand {
                    header,
                    filename,
                    data: r.bytes(len)?.to_vec(),
                })
            }
            CommandKind::FileAnnounce => Self::FileAnnounce(FileAnnounceCommand {
                header,
                filename: r.cstring()?,
                file_id: r.u16()?,
                player_mask: r.u8()?,
            }),
            CommandKind::FileProgress => Self::FileProgress(FileProgressCommand {
                header,
                file_id: r.u16()?,
                progress: r.i32()?,
            }),
            CommandKind::FrameResendRequest => {
                Self::FrameResendRequest(FrameResendRequestCommand {
                    header,
                    frame_to_resend: r.u32()?,
                })
            }
            CommandKind::DisconnectKeepAlive => Self::DisconnectKeepAlive(header),
            CommandKind::DisconnectPlayer => Self::DisconnectPlayer(DisconnectPlayerCommand {
                header,
                slot: r.u8()?,
                disconnect_frame: r.u32()?,
            }),
            CommandKind::RouterQuery => Self::RouterQuery(header),
            CommandKind::RouterAck => Self::RouterAck(header),
            CommandKind::DisconnectVote => Self::DisconnectVote(DisconnectVoteCommand {
                header,
                slot: r.u8()?,
                vote_frame: r.u32()?,
            }),
            CommandKind::DisconnectFrame => Self::DisconnectFrame(DisconnectFrameCommand {
                header,
                disconnect_frame: r.u32()?,
            }),
            CommandKind::DisconnectScreenOff => {
                Self::DisconnectScreenOff(DisconnectScreenOffCommand {
                    header,
                    new_frame: r.u32()?,
                })
            }
        };
        Ok(command)
    }
}

// ============================================================================
// Variable Sections
// ============================================================================

/// UTF-16 units of `text`, cut to [`MAX_TEXT_LEN`] without splitting a
/// surrogate pair.
pub fn usable_text(text: &str) -> Vec<u16> {
    let mut units: Vec<u16> = text.encode_utf16().collect();
    if units.len() > MAX_TEXT_LEN {
        units.truncate(MAX_TEXT_LEN);
        if units.last().is_some_and(|u| (0xD800..0xDC00).contains(u)) {
            units.pop();
        }
    }
    units
}

/// Encoded length of a NUL-terminated string, terminator included.
fn cstring_len(s: &str) -> usize {
    s.bytes().position(|b| b == 0).unwrap_or(s.len()) + 1
}

fn read_text(r: &mut PacketReader<'_>) -> Result<String> {
    let len = usize::from(r.u8()?);
    let offset = r.position();
    let units = r.utf16(len)?;
    String::from_utf16(&units).map_err(|_| WireError::InvalidText { offset })
}

fn read_wrapper(header: CommandHeader, r: &mut PacketReader<'_>) -> Result<WrapperCommand> {
    let wrapped_command_id = r.u16()?;
    let chunk_number = r.u32()?;
    let num_chunks = r.u32()?;
    let total_data_length = r.u32()?;
    let data_length = r.u32()?;
    let data_offset = r.u32()?;
    let offset = r.position();
    let data = r.bytes(data_length as usize)?.to_vec();

    if chunk_number >= num_chunks {
        return Err(WireError::violation(
            offset,
            format!("chunk {chunk_number} outside [0, {num_chunks})"),
        ));
    }
    if u64::from(data_offset) + u64::from(data_length) > u64::from(total_data_length) {
        return Err(WireError::violation(
            offset,
            format!(
                "chunk range {data_offset}+{data_length} exceeds total length {total_data_length}"
            ),
        ));
    }

    Ok(WrapperCommand {
        header,
        wrapped_command_id,
        chunk_number,
        num_chunks,
        total_data_length,
        data_offset,
        data,
    })
}

// ============================================================================
// Tests
// ============================================================================
