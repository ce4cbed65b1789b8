//! The closed catalog of command kinds and their fixed layouts.

use crate::field::FieldTag;
use crate::field::FieldTag::{CommandId as C, CommandType as T, Data as D, Frame as F, PlayerId as P, Relay as R};

// ============================================================================
// Header Layouts
// ============================================================================

/// Acknowledgements: no relay, frame or command id.
const ACK_LAYOUT: &[FieldTag] = &[T, P, D];
/// Frame-scheduled traffic that carries its execution frame first.
const FRAMED_LAYOUT: &[FieldTag] = &[T, F, R, P, C, D];
/// Frame-scheduled control traffic; relay precedes the frame.
const RELAY_FRAMED_LAYOUT: &[FieldTag] = &[T, R, F, P, C, D];
/// Sequenced traffic with a command id but no frame.
const SEQUENCED_LAYOUT: &[FieldTag] = &[T, R, P, C, D];
/// Fire-and-forget traffic.
const UNSEQUENCED_LAYOUT: &[FieldTag] = &[T, R, P, D];

// ============================================================================
// Command Kind
// ============================================================================

/// Command discriminant carried in the `T` field.
///
/// Values are part of the recorded-stream format and never change. The gaps
/// (12, 13, 22, 30) are reserved and rejected on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CommandKind {
    AckBoth = 0,
    AckStage1 = 1,
    AckStage2 = 2,
    /// Announces how many commands a player sent for one frame.
    FrameInfo = 3,
    /// Opaque simulation message.
    GameCommand = 4,
    PlayerLeave = 5,
    RunAheadMetrics = 6,
    RunAhead = 7,
    DestroyPlayer = 8,
    KeepAlive = 9,
    DisconnectChat = 10,
    Chat = 11,
    Progress = 14,
    LoadComplete = 15,
    TimeoutGameStart = 16,
    /// One chunk of an oversized logical command.
    Wrapper = 17,
    File = 18,
    FileAnnounce = 19,
    FileProgress = 20,
    FrameResendRequest = 21,
    DisconnectKeepAlive = 23,
    DisconnectPlayer = 24,
    RouterQuery = 25,
    RouterAck = 26,
    DisconnectVote = 27,
    DisconnectFrame = 28,
    DisconnectScreenOff = 29,
}

impl CommandKind {
    /// Every kind, in discriminant order.
    pub const ALL: [CommandKind; 27] = [
        Self::AckBoth,
        Self::AckStage1,
        Self::AckStage2,
        Self::FrameInfo,
        Self::GameCommand,
        Self::PlayerLeave,
        Self::RunAheadMetrics,
        Self::RunAhead,
        Self::DestroyPlayer,
        Self::KeepAlive,
        Self::DisconnectChat,
        Self::Chat,
        Self::Progress,
        Self::LoadComplete,
        Self::TimeoutGameStart,
        Self::Wrapper,
        Self::File,
        Self::FileAnnounce,
        Self::FileProgress,
        Self::FrameResendRequest,
        Self::DisconnectKeepAlive,
        Self::DisconnectPlayer,
        Self::RouterQuery,
        Self::RouterAck,
        Self::DisconnectVote,
        Self::DisconnectFrame,
        Self::DisconnectScreenOff,
    ];

    /// The `T` field value.
    pub const fn byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.byte() == byte)
    }

    /// Ordered header fields for this kind, `T` first and `D` last.
    pub const fn layout(self) -> &'static [FieldTag] {
        match self {
            Self::AckBoth | Self::AckStage1 | Self::AckStage2 => ACK_LAYOUT,
            Self::FrameInfo | Self::GameCommand | Self::Chat => FRAMED_LAYOUT,
            Self::PlayerLeave | Self::RunAhead | Self::DestroyPlayer => RELAY_FRAMED_LAYOUT,
            Self::KeepAlive
            | Self::DisconnectKeepAlive
            | Self::DisconnectChat
            | Self::Progress
            | Self::RouterQuery
            | Self::RouterAck => UNSEQUENCED_LAYOUT,
            Self::RunAheadMetrics
            | Self::LoadComplete
            | Self::TimeoutGameStart
            | Self::Wrapper
            | Self::File
            | Self::FileAnnounce
            | Self::FileProgress
            | Self::FrameResendRequest
            | Self::DisconnectPlayer
            | Self::DisconnectVote
            | Self::DisconnectFrame
            | Self::DisconnectScreenOff => SEQUENCED_LAYOUT,
        }
    }

    /// Whether the header carries `tag`.
    pub fn carries(self, tag: FieldTag) -> bool {
        self.layout().contains(&tag)
    }

    /// Bytes taken by the tagged header, `D` marker included.
    pub fn header_len(self) -> usize {
        self.layout().iter().map(|tag| tag.encoded_len()).sum()
    }

    /// Bytes of fixed-width payload after the `D` marker.
    ///
    /// For variable kinds this counts the length fields and trailing fixed
    /// fields, but not the text, filename or data bytes themselves.
    pub const fn fixed_body_len(self) -> usize {
        match self {
            Self::AckBoth | Self::AckStage1 | Self::AckStage2 => 3,
            Self::FrameInfo => 2,
            Self::GameCommand => 0,
            Self::PlayerLeave => 1,
            Self::RunAheadMetrics => 6,
            Self::RunAhead => 3,
            Self::DestroyPlayer => 4,
            Self::DisconnectChat => 1,
            // text length byte + trailing player mask
            Self::Chat => 5,
            Self::Progress => 1,
            Self::Wrapper => 22,
            // file data length
            Self::File => 4,
            // file id + player mask
            Self::FileAnnounce => 3,
            Self::FileProgress => 6,
            Self::FrameResendRequest => 4,
            Self::DisconnectPlayer | Self::DisconnectVote => 5,
            Self::DisconnectFrame | Self::DisconnectScreenOff => 4,
            Self::KeepAlive
            | Self::DisconnectKeepAlive
            | Self::RouterQuery
            | Self::RouterAck
            | Self::LoadComplete
            | Self::TimeoutGameStart => 0,
        }
    }

    /// Whether the packet ends in a variable-length section.
    pub const fn is_variable(self) -> bool {
        matches!(
            self,
            Self::GameCommand
                | Self::Chat
                | Self::DisconnectChat
                | Self::Wrapper
                | Self::File
                | Self::FileAnnounce
        )
    }

    /// Total encoded size given the number of variable-section bytes.
    ///
    /// `variable_len` is the byte length of text, filename (with its NUL
    /// terminator), chunk or file data, or game message; it is ignored for
    /// fixed-size kinds.
    pub fn byte_count(self, variable_len: usize) -> usize {
        let variable = if self.is_variable() { variable_len } else { 0 };
        self.header_len() + self.fixed_body_len() + variable
    }
}

// ============================================================================
// Tests
// ============================================================================
