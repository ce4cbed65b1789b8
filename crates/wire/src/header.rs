//! The standard header shared by every command record.

use crate::error::{Result, WireError};
use crate::field::{Field, FieldTag, PacketReader, PacketWriter};
use crate::kind::CommandKind;
use crate::{CommandId, FrameNumber, PlayerId};

/// Relay mask value meaning "forward to every peer".
pub const RELAY_ALL: u8 = 0xFF;

/// Header fields common to all command kinds.
///
/// Each record embeds one of these by value. Which fields reach the wire is
/// decided by [`CommandKind::layout`]; fields outside the layout are not
/// transmitted and decode as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandHeader {
    pub player_id: PlayerId,
    pub relay: u8,
    pub frame: FrameNumber,
    pub command_id: CommandId,
}

impl CommandHeader {
    pub fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            ..Self::default()
        }
    }

    pub fn with_relay(mut self, relay: u8) -> Self {
        self.relay = relay;
        self
    }

    pub fn with_frame(mut self, frame: FrameNumber) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_command_id(mut self, command_id: CommandId) -> Self {
        self.command_id = command_id;
        self
    }

    /// Copy of this header with every field `kind` does not transmit zeroed.
    ///
    /// `decode(encode(h)) == h.normalized(kind)` for every header.
    pub fn normalized(self, kind: CommandKind) -> Self {
        Self {
            player_id: self.player_id,
            relay: if kind.carries(FieldTag::Relay) { self.relay } else { 0 },
            frame: if kind.carries(FieldTag::Frame) { self.frame } else { 0 },
            command_id: if kind.carries(FieldTag::CommandId) {
                self.command_id
            } else {
                0
            },
        }
    }

    pub(crate) fn encode(&self, kind: CommandKind, w: &mut PacketWriter<'_>) {
        for &tag in kind.layout() {
            let field = match tag {
                FieldTag::CommandType => Field::CommandType(kind.byte()),
                FieldTag::Relay => Field::Relay(self.relay),
                FieldTag::PlayerId => Field::PlayerId(self.player_id),
                FieldTag::CommandId => Field::CommandId(self.command_id),
                FieldTag::Frame => Field::Frame(self.frame),
                FieldTag::Data => Field::Data,
            };
            w.field(field);
        }
    }

    /// Consume `kind`'s header fields in layout order.
    pub(crate) fn decode(kind: CommandKind, r: &mut PacketReader<'_>) -> Result<Self> {
        let mut header = Self::default();
        for &tag in kind.layout() {
            match tag {
                FieldTag::CommandType => {
                    let offset = r.position();
                    let found = r.expect_u8(FieldTag::CommandType)?;
                    if found != kind.byte() {
                        return Err(WireError::violation(
                            offset,
                            format!("decoding {kind:?} but command type is {found}"),
                        ));
                    }
                }
                FieldTag::Relay => header.relay = r.expect_u8(FieldTag::Relay)?,
                FieldTag::PlayerId => header.player_id = r.expect_u8(FieldTag::PlayerId)?,
                FieldTag::CommandId => header.command_id = r.expect_command_id()?,
                FieldTag::Frame => header.frame = r.expect_frame()?,
                FieldTag::Data => {
                    r.expect(FieldTag::Data)?;
                }
            }
        }
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_order_is_kind_specific() {
        let header = CommandHeader::new(3)
            .with_relay(0x0F)
            .with_frame(1)
            .with_command_id(2);

        let mut framed = Vec::new();
        header.encode(CommandKind::GameCommand, &mut PacketWriter::new(&mut framed));
        assert_eq!(
            framed,
            vec![b'T', 4, b'F', 1, 0, 0, 0, b'R', 0x0F, b'P', 3, b'C', 2, 0, b'D']
        );

        let mut relay_first = Vec::new();
        header.encode(CommandKind::PlayerLeave, &mut PacketWriter::new(&mut relay_first));
        assert_eq!(
            relay_first,
            vec![b'T', 5, b'R', 0x0F, b'F', 1, 0, 0, 0, b'P', 3, b'C', 2, 0, b'D']
        );
    }

    #[test]
    fn test_untransmitted_fields_decode_as_zero() {
        let header = CommandHeader::new(9).with_frame(77).with_command_id(5);
        let mut buf = Vec::new();
        header.encode(CommandKind::KeepAlive, &mut PacketWriter::new(&mut buf));
        let decoded =
            CommandHeader::decode(CommandKind::KeepAlive, &mut PacketReader::new(&buf)).unwrap();
        assert_eq!(decoded, header.normalized(CommandKind::KeepAlive));
        assert_eq!(decoded.frame, 0);
        assert_eq!(decoded.command_id, 0);
    }

    #[test]
    fn test_wrong_command_type_value_is_violation() {
        let mut buf = Vec::new();
        CommandHeader::new(1).encode(CommandKind::KeepAlive, &mut PacketWriter::new(&mut buf));
        let err = CommandHeader::decode(CommandKind::RouterQuery, &mut PacketReader::new(&buf))
            .unwrap_err();
        assert!(matches!(err, WireError::ProtocolViolation { offset: 0, .. }));
    }
}
