//! Splitting oversized commands into `Wrapper` chunks and reassembling them.

use std::collections::BTreeMap;

use crate::CommandId;
use crate::command::WrapperCommand;
use crate::error::{Result, WireError};
use crate::header::CommandHeader;

/// Split `payload` into Wrapper chunks of at most `max_chunk_len` bytes.
///
/// Every chunk carries `header`. An empty payload still produces one empty
/// chunk so the receiver learns the logical command exists.
pub fn split_into_chunks(
    header: CommandHeader,
    wrapped_command_id: CommandId,
    payload: &[u8],
    max_chunk_len: usize,
) -> Vec<WrapperCommand> {
    let max_chunk_len = max_chunk_len.max(1);
    let total_data_length = payload.len() as u32;

    if payload.is_empty() {
        return vec![WrapperCommand {
            header,
            wrapped_command_id,
            chunk_number: 0,
            num_chunks: 1,
            total_data_length: 0,
            data_offset: 0,
            data: Vec::new(),
        }];
    }

    let num_chunks = payload.len().div_ceil(max_chunk_len) as u32;
    payload
        .chunks(max_chunk_len)
        .enumerate()
        .map(|(i, data)| WrapperCommand {
            header,
            wrapped_command_id,
            chunk_number: i as u32,
            num_chunks,
            total_data_length,
            data_offset: (i * max_chunk_len) as u32,
            data: data.to_vec(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChunkSet {
    wrapped_command_id: CommandId,
    num_chunks: u32,
    total_data_length: u32,
}

/// Collects the chunks of one logical command, in any arrival order.
///
/// Each chunk must agree with the first on wrapped id, chunk count and total
/// length, have a unique chunk number in `[0, num_chunks)`, and cover a byte
/// range inside the total that overlaps no earlier chunk.
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    set: Option<ChunkSet>,
    /// Chunk data keyed by offset.
    pieces: BTreeMap<u32, Vec<u8>>,
    seen: BTreeMap<u32, u32>,
    complete: bool,
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the logical command has been yielded.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Chunks accepted so far.
    pub fn received(&self) -> usize {
        self.seen.len()
    }

    /// Add a chunk. Returns the logical bytes once every chunk is present.
    pub fn push(&mut self, chunk: &WrapperCommand) -> Result<Option<Vec<u8>>> {
        let fail = |detail: String| WireError::Chunk {
            wrapped_command_id: chunk.wrapped_command_id,
            detail,
        };

        if self.complete {
            return Err(fail("chunk arrived after the command was complete".into()));
        }

        let incoming = ChunkSet {
            wrapped_command_id: chunk.wrapped_command_id,
            num_chunks: chunk.num_chunks,
            total_data_length: chunk.total_data_length,
        };
        // A rejected chunk leaves the assembler untouched, so the set is only
        // recorded once the first chunk is accepted.
        let set = self.set.unwrap_or(incoming);
        if set != incoming {
            return Err(fail(format!("chunk disagrees with set {set:?}")));
        }

        if chunk.chunk_number >= set.num_chunks {
            return Err(fail(format!(
                "chunk number {} outside [0, {})",
                chunk.chunk_number, set.num_chunks
            )));
        }
        if self.seen.contains_key(&chunk.chunk_number) {
            return Err(fail(format!("duplicate chunk number {}", chunk.chunk_number)));
        }

        let start = u64::from(chunk.data_offset);
        let end = start + u64::from(chunk.data_length());
        if end > u64::from(set.total_data_length) {
            return Err(fail(format!(
                "range {start}..{end} exceeds total length {}",
                set.total_data_length
            )));
        }
        if let Some((&prev_start, prev)) = self.pieces.range(..=chunk.data_offset).next_back() {
            if u64::from(prev_start) + prev.len() as u64 > start && !prev.is_empty() {
                return Err(fail(format!("range {start}..{end} overlaps an earlier chunk")));
            }
        }
        if let Some((&next_start, _)) = self.pieces.range(chunk.data_offset..).next() {
            if u64::from(next_start) < end && start != end {
                return Err(fail(format!("range {start}..{end} overlaps an earlier chunk")));
            }
        }

        self.set = Some(set);
        self.seen.insert(chunk.chunk_number, chunk.data_length());
        if !chunk.data.is_empty() {
            self.pieces.insert(chunk.data_offset, chunk.data.clone());
        }

        if self.seen.len() < set.num_chunks as usize {
            return Ok(None);
        }

        let covered: u64 = self.seen.values().map(|&len| u64::from(len)).sum();
        if covered != u64::from(set.total_data_length) {
            return Err(fail(format!(
                "all {} chunks received but only {covered} of {} bytes covered",
                set.num_chunks, set.total_data_length
            )));
        }

        self.complete = true;
        let mut payload = Vec::with_capacity(set.total_data_length as usize);
        for piece in std::mem::take(&mut self.pieces).into_values() {
            payload.extend_from_slice(&piece);
        }
        Ok(Some(payload))
    }
}
