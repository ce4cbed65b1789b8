//! Tagged fixed-width fields and the little-endian byte cursor built on them.
//!
//! Every packet starts with a run of tagged fields: one ASCII tag byte
//! followed by a value whose width is fixed by the tag. The tag/width pairing
//! lives here and only here; the catalog asks for a tag, never for a width.

use std::fmt;

use crate::error::{Result, WireError};
use crate::{CommandId, FrameNumber, PlayerId};

// ============================================================================
// Field Tags
// ============================================================================

/// Semantic role of a tagged field. The discriminant is the on-wire tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldTag {
    /// Command kind discriminant, 1 byte.
    CommandType = b'T',
    /// Relay mask telling a relay host which peers to forward to, 1 byte.
    Relay = b'R',
    /// Sending player, 1 byte.
    PlayerId = b'P',
    /// Per-sender command id used for acknowledgement, 2 bytes.
    CommandId = b'C',
    /// Execution frame, 4 bytes.
    Frame = b'F',
    /// Start of the kind-specific payload, no value.
    Data = b'D',
}

impl FieldTag {
    /// All tags, in no particular order.
    pub const ALL: [FieldTag; 6] = [
        Self::CommandType,
        Self::Relay,
        Self::PlayerId,
        Self::CommandId,
        Self::Frame,
        Self::Data,
    ];

    /// Width of the value that follows the tag byte.
    pub const fn width(self) -> usize {
        match self {
            Self::CommandType | Self::Relay | Self::PlayerId => 1,
            Self::CommandId => 2,
            Self::Frame => 4,
            Self::Data => 0,
        }
    }

    /// Bytes the field occupies on the wire, tag byte included.
    pub const fn encoded_len(self) -> usize {
        1 + self.width()
    }

    /// The tag byte.
    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// Map a tag byte back to its tag.
    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.byte() == byte)
    }
}

impl fmt::Display for FieldTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.byte() as char)
    }
}

// ============================================================================
// Field Values
// ============================================================================

/// A single tagged value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    CommandType(u8),
    Relay(u8),
    PlayerId(PlayerId),
    CommandId(CommandId),
    Frame(FrameNumber),
    Data,
}

impl Field {
    /// Tag for this field.
    pub fn tag(&self) -> FieldTag {
        match self {
            Self::CommandType(_) => FieldTag::CommandType,
            Self::Relay(_) => FieldTag::Relay,
            Self::PlayerId(_) => FieldTag::PlayerId,
            Self::CommandId(_) => FieldTag::CommandId,
            Self::Frame(_) => FieldTag::Frame,
            Self::Data => FieldTag::Data,
        }
    }
}

/// Append a field (tag byte then little-endian value) to `buf`.
pub fn encode_field(field: &Field, buf: &mut Vec<u8>) {
    buf.push(field.tag().byte());
    match *field {
        Field::CommandType(v) | Field::Relay(v) | Field::PlayerId(v) => buf.push(v),
        Field::CommandId(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Field::Frame(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Field::Data => {}
    }
}

/// Decode the field starting at `cursor`.
///
/// Returns the field and the cursor just past it. The width is taken from the
/// tag byte found in the input, so a caller cannot read a value through the
/// wrong width.
///
/// # Errors
///
/// - [`WireError::MalformedField`] if the input ends before the tag byte or
///   before the tag's declared width.
/// - [`WireError::ProtocolViolation`] if the tag byte is not a known tag.
pub fn decode_field(bytes: &[u8], cursor: usize) -> Result<(Field, usize)> {
    let available = bytes.len().saturating_sub(cursor);
    let Some(&tag_byte) = bytes.get(cursor) else {
        return Err(WireError::MalformedField {
            tag: None,
            offset: cursor,
            needed: 1,
            available,
        });
    };
    let tag = FieldTag::from_byte(tag_byte).ok_or_else(|| {
        WireError::violation(cursor, format!("unknown field tag byte {tag_byte:#04x}"))
    })?;

    let needed = tag.encoded_len();
    if available < needed {
        return Err(WireError::MalformedField {
            tag: Some(tag),
            offset: cursor,
            needed,
            available,
        });
    }

    let value = &bytes[cursor + 1..cursor + needed];
    let field = match tag {
        FieldTag::CommandType => Field::CommandType(value[0]),
        FieldTag::Relay => Field::Relay(value[0]),
        FieldTag::PlayerId => Field::PlayerId(value[0]),
        FieldTag::CommandId => Field::CommandId(u16::from_le_bytes([value[0], value[1]])),
        FieldTag::Frame => {
            Field::Frame(u32::from_le_bytes([value[0], value[1], value[2], value[3]]))
        }
        FieldTag::Data => Field::Data,
    };
    Ok((field, cursor + needed))
}

// ============================================================================
// Packet Writer
// ============================================================================

/// Appends fields and little-endian primitives to a byte buffer.
pub struct PacketWriter<'a> {
    buf: &'a mut Vec<u8>,
}

impl<'a> PacketWriter<'a> {
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        Self { buf }
    }

    pub fn field(&mut self, field: Field) -> &mut Self {
        encode_field(&field, self.buf);
        self
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn bytes(&mut self, v: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(v);
        self
    }

    /// Write `s` up to its first NUL byte, then a NUL terminator.
    pub fn cstring(&mut self, s: &str) -> &mut Self {
        let bytes = s.as_bytes();
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        self.buf.extend_from_slice(&bytes[..end]);
        self.buf.push(0);
        self
    }

    /// Write UTF-16 code units, little-endian.
    pub fn utf16(&mut self, units: &[u16]) -> &mut Self {
        for unit in units {
            self.buf.extend_from_slice(&unit.to_le_bytes());
        }
        self
    }
}

// ============================================================================
// Packet Reader
// ============================================================================

/// Left-to-right cursor over a packet.
///
/// Tagged fields are read with [`PacketReader::expect`], which enforces the
/// schema's tag at the current position. Payload primitives past the `D`
/// marker report [`WireError::TruncatedPayload`] when input runs out.
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Current byte offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Read the next field and require it to carry `tag`.
    pub fn expect(&mut self, tag: FieldTag) -> Result<Field> {
        match self.bytes.get(self.pos) {
            None => {
                return Err(WireError::MalformedField {
                    tag: Some(tag),
                    offset: self.pos,
                    needed: tag.encoded_len(),
                    available: 0,
                });
            }
            Some(&found) if found != tag.byte() => {
                return Err(WireError::violation(
                    self.pos,
                    format!("expected field {tag}, found byte {found:#04x}"),
                ));
            }
            Some(_) => {}
        }
        let (field, next) = decode_field(self.bytes, self.pos)?;
        self.pos = next;
        Ok(field)
    }

    /// Read a 1-byte tagged field.
    pub fn expect_u8(&mut self, tag: FieldTag) -> Result<u8> {
        match self.expect(tag)? {
            Field::CommandType(v) | Field::Relay(v) | Field::PlayerId(v) => Ok(v),
            other => Err(WireError::violation(
                self.pos,
                format!("field {} is not a byte field", other.tag()),
            )),
        }
    }

    pub fn expect_command_id(&mut self) -> Result<CommandId> {
        match self.expect(FieldTag::CommandId)? {
            Field::CommandId(v) => Ok(v),
            _ => unreachable!("decode_field honours the tag it was asked for"),
        }
    }

    pub fn expect_frame(&mut self) -> Result<FrameNumber> {
        match self.expect(FieldTag::Frame)? {
            Field::Frame(v) => Ok(v),
            _ => unreachable!("decode_field honours the tag it was asked for"),
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(WireError::TruncatedPayload {
                offset: self.pos,
                declared: len,
                available: self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        self.take_array().map(u16::from_le_bytes)
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.take_array().map(u32::from_le_bytes)
    }

    pub fn i32(&mut self) -> Result<i32> {
        self.take_array().map(i32::from_le_bytes)
    }

    pub fn u64(&mut self) -> Result<u64> {
        self.take_array().map(u64::from_le_bytes)
    }

    pub fn f32(&mut self) -> Result<f32> {
        self.take_array().map(f32::from_le_bytes)
    }

    /// Read exactly `len` raw bytes.
    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    /// Read a NUL-terminated UTF-8 string, consuming the terminator.
    pub fn cstring(&mut self) -> Result<String> {
        let start = self.pos;
        let rest = &self.bytes[start..];
        let Some(end) = rest.iter().position(|&b| b == 0) else {
            return Err(WireError::TruncatedPayload {
                offset: start,
                declared: rest.len() + 1,
                available: rest.len(),
            });
        };
        let text = std::str::from_utf8(&rest[..end])
            .map_err(|_| WireError::InvalidText { offset: start })?
            .to_owned();
        self.pos = start + end + 1;
        Ok(text)
    }

    /// Read `count` little-endian UTF-16 code units.
    pub fn utf16(&mut self, count: usize) -> Result<Vec<u16>> {
        let raw = self.take(count * 2)?;
        Ok(raw
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
