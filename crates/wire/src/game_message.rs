//! Opaque simulation messages carried by `GameCommand` packets.
//!
//! Layout after the `D` marker:
//!
//! ```text
//! message_type u32
//! run_count    u8
//! runs         run_count x (argument_type u8, count u8)
//! arguments    fixed width per type, in run order
//! ```
//!
//! Consecutive arguments of the same type share a run, so the argument types
//! are declared up front and the decoder knows the exact byte length before
//! reading any argument.

use crate::error::{Result, WireError};
use crate::field::{PacketReader, PacketWriter};

/// Message type whose single Integer argument is the checksum the recording
/// host computed at the end of the frame it is scheduled for.
pub const LOGIC_CRC: u32 = 1095;

/// Largest number of arguments a single run can declare.
const MAX_RUN: usize = u8::MAX as usize;

/// One typed message argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GameArgument {
    Integer(i32),
    Real(f32),
    Boolean(bool),
    ObjectId(u32),
    DrawableId(u32),
    TeamId(u32),
    Location { x: f32, y: f32, z: f32 },
    Pixel { x: i32, y: i32 },
    PixelRegion { lo: (i32, i32), hi: (i32, i32) },
    Timestamp(u32),
    WideChar(u16),
}

impl GameArgument {
    /// Type code written in the argument run table.
    pub fn type_code(&self) -> u8 {
        match self {
            Self::Integer(_) => 0,
            Self::Real(_) => 1,
            Self::Boolean(_) => 2,
            Self::ObjectId(_) => 3,
            Self::DrawableId(_) => 4,
            Self::TeamId(_) => 5,
            Self::Location { .. } => 6,
            Self::Pixel { .. } => 7,
            Self::PixelRegion { .. } => 8,
            Self::Timestamp(_) => 9,
            Self::WideChar(_) => 10,
        }
    }

    /// Encoded width for a type code, `None` for unknown codes.
    pub fn width_of(type_code: u8) -> Option<usize> {
        Some(match type_code {
            0 | 1 | 3 | 4 | 5 | 9 => 4,
            2 => 1,
            6 => 12,
            7 => 8,
            8 => 16,
            10 => 2,
            _ => return None,
        })
    }

    fn encode(&self, w: &mut PacketWriter<'_>) {
        match *self {
            Self::Integer(v) => {
                w.i32(v);
            }
            Self::Real(v) => {
                w.f32(v);
            }
            Self::Boolean(v) => {
                w.u8(u8::from(v));
            }
            Self::ObjectId(v) | Self::DrawableId(v) | Self::TeamId(v) | Self::Timestamp(v) => {
                w.u32(v);
            }
            Self::Location { x, y, z } => {
                w.f32(x).f32(y).f32(z);
            }
            Self::Pixel { x, y } => {
                w.i32(x).i32(y);
            }
            Self::PixelRegion { lo, hi } => {
                w.i32(lo.0).i32(lo.1).i32(hi.0).i32(hi.1);
            }
            Self::WideChar(v) => {
                w.u16(v);
            }
        }
    }

    fn decode(type_code: u8, r: &mut PacketReader<'_>) -> Result<Self> {
        Ok(match type_code {
            0 => Self::Integer(r.i32()?),
            1 => Self::Real(r.f32()?),
            2 => Self::Boolean(r.u8()? != 0),
            3 => Self::ObjectId(r.u32()?),
            4 => Self::DrawableId(r.u32()?),
            5 => Self::TeamId(r.u32()?),
            6 => Self::Location {
                x: r.f32()?,
                y: r.f32()?,
                z: r.f32()?,
            },
            7 => Self::Pixel {
                x: r.i32()?,
                y: r.i32()?,
            },
            8 => Self::PixelRegion {
                lo: (r.i32()?, r.i32()?),
                hi: (r.i32()?, r.i32()?),
            },
            9 => Self::Timestamp(r.u32()?),
            10 => Self::WideChar(r.u16()?),
            other => {
                return Err(WireError::violation(
                    r.position(),
                    format!("unknown argument type {other}"),
                ));
            }
        })
    }
}

/// A simulation message: a type code plus typed arguments.
///
/// The encoding holds at most 255 runs of same-typed arguments. Arguments
/// past the last run are not written; check [`GameMessage::is_encodable`]
/// before encoding messages built from untrusted input.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GameMessage {
    pub message_type: u32,
    pub arguments: Vec<GameArgument>,
}

impl GameMessage {
    pub fn new(message_type: u32) -> Self {
        Self {
            message_type,
            arguments: Vec::new(),
        }
    }

    pub fn with_argument(mut self, argument: GameArgument) -> Self {
        self.arguments.push(argument);
        self
    }

    /// A `LOGIC_CRC` message reporting `checksum`.
    pub fn logic_crc(checksum: u32) -> Self {
        // The checksum travels bit-for-bit in an Integer slot.
        Self::new(LOGIC_CRC).with_argument(GameArgument::Integer(checksum as i32))
    }

    /// The reported checksum if this is a well-formed `LOGIC_CRC` message.
    pub fn as_logic_crc(&self) -> Option<u32> {
        match (self.message_type, self.arguments.as_slice()) {
            (LOGIC_CRC, [GameArgument::Integer(v)]) => Some(*v as u32),
            _ => None,
        }
    }

    /// Whether every argument fits in the encoding.
    pub fn is_encodable(&self) -> bool {
        self.all_runs().len() <= MAX_RUN
    }

    fn all_runs(&self) -> Vec<(u8, u8)> {
        let mut runs: Vec<(u8, u8)> = Vec::new();
        for argument in &self.arguments {
            let code = argument.type_code();
            match runs.last_mut() {
                Some((last, count)) if *last == code && usize::from(*count) < MAX_RUN => {
                    *count += 1;
                }
                _ => runs.push((code, 1)),
            }
        }
        runs
    }

    /// Argument runs as `(type_code, count)` pairs, capped at 255 runs.
    fn runs(&self) -> Vec<(u8, u8)> {
        let mut runs = self.all_runs();
        runs.truncate(MAX_RUN);
        runs
    }

    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        let args: usize = self
            .runs()
            .iter()
            .filter_map(|&(code, n)| GameArgument::width_of(code).map(|w| w * usize::from(n)))
            .sum();
        4 + 1 + self.runs().len() * 2 + args
    }

    /// Append the message. At most 255 runs are written; arguments beyond
    /// them are dropped.
    pub(crate) fn encode(&self, w: &mut PacketWriter<'_>) {
        let runs = self.runs();
        let written: usize = runs.iter().map(|&(_, n)| usize::from(n)).sum();

        w.u32(self.message_type).u8(runs.len() as u8);
        for &(code, count) in &runs {
            w.u8(code).u8(count);
        }
        for argument in &self.arguments[..written] {
            argument.encode(w);
        }
    }

    pub(crate) fn decode(r: &mut PacketReader<'_>) -> Result<Self> {
        let message_type = r.u32()?;
        let run_count = usize::from(r.u8()?);

        let mut runs = Vec::with_capacity(run_count);
        let mut declared = 0usize;
        for _ in 0..run_count {
            let offset = r.position();
            let code = r.u8()?;
            let count = usize::from(r.u8()?);
            let width = GameArgument::width_of(code).ok_or_else(|| {
                WireError::violation(offset, format!("unknown argument type {code}"))
            })?;
            declared += width * count;
            runs.push((code, count));
        }

        if r.remaining() < declared {
            return Err(WireError::TruncatedPayload {
                offset: r.position(),
                declared,
                available: r.remaining(),
            });
        }

        let mut arguments = Vec::new();
        for (code, count) in runs {
            for _ in 0..count {
                arguments.push(GameArgument::decode(code, r)?);
            }
        }
        Ok(Self {
            message_type,
            arguments,
        })
    }
}
