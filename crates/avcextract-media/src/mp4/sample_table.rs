//! MP4 sample table parsing.
//!
//! Chunk layout is reconstructed from three tables:
//! - stco/co64: absolute chunk offsets
//! - stsc: run-length sample-to-chunk mapping
//! - stss: sync sample numbers (keyframes)

use crate::{Error, Result};
use bytes::Buf;

/// One physical chunk, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Chunk {
    /// Absolute file offset of the chunk.
    pub offset: u64,
    /// Distance to the next chunk. `None` for the last chunk, or when the
    /// next offset is not greater than this one.
    pub size: Option<u64>,
    /// Number of samples stored in the chunk.
    pub sample_count: u32,
    /// 1-based index into the sample description table.
    pub sample_description_index: u32,
}

/// Resolved byte range of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct ChunkExtent {
    pub offset: u64,
    pub size: u64,
}

/// One stsc entry: chunks from `first_chunk` up to the next run's first
/// chunk share the same layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StscRun {
    /// 1-based chunk number.
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

/// Builder merging chunk offsets and stsc runs into a chunk list.
#[derive(Debug, Default)]
pub struct ChunkTableBuilder {
    chunk_offsets: Vec<u64>,
    stsc_runs: Vec<StscRun>,
}

impl ChunkTableBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set chunk offsets (from stco or co64).
    pub fn set_chunk_offsets(&mut self, offsets: Vec<u64>) {
        self.chunk_offsets = offsets;
    }

    /// Set stsc (sample to chunk) runs.
    pub fn set_stsc(&mut self, runs: Vec<StscRun>) {
        self.stsc_runs = runs;
    }

    /// Build the chunk list.
    ///
    /// Every chunk is assigned the run with the greatest `first_chunk` not
    /// above its 1-based number. Chunks before the first run fall back to
    /// the first run.
    pub fn build(mut self) -> Result<Vec<Chunk>> {
        if self.chunk_offsets.is_empty() {
            return Ok(Vec::new());
        }
        if self.stsc_runs.is_empty() {
            return Err(Error::invalid_mp4("stsc has no entries"));
        }

        self.stsc_runs.sort_by_key(|run| run.first_chunk);

        let mut chunks = Vec::with_capacity(self.chunk_offsets.len());
        let mut run_idx = 0;

        for (i, &offset) in self.chunk_offsets.iter().enumerate() {
            let chunk_number = i as u64 + 1;
            while run_idx + 1 < self.stsc_runs.len()
                && self.stsc_runs[run_idx + 1].first_chunk as u64 <= chunk_number
            {
                run_idx += 1;
            }
            let run = self.stsc_runs[run_idx];

            let size = match self.chunk_offsets.get(i + 1) {
                Some(&next) if next > offset => Some(next - offset),
                Some(&next) => {
                    tracing::warn!(chunk = i, offset, next, "Chunk offsets not ascending");
                    None
                }
                None => None,
            };

            chunks.push(Chunk {
                offset,
                size,
                sample_count: run.samples_per_chunk,
                sample_description_index: run.sample_description_index,
            });
        }

        Ok(chunks)
    }
}

/// Read the version/flags word and entry count of a full-box table, and
/// clamp the count to the entries actually present.
fn table_entries<'a>(data: &'a [u8], entry_size: usize, name: &str) -> Result<(&'a [u8], usize)> {
    let mut buf = data;
    if buf.remaining() < 8 {
        return Err(Error::invalid_mp4(format!("{name} too short for an entry count")));
    }
    buf.advance(4);
    let declared = buf.get_u32() as usize;
    let available = buf.remaining() / entry_size;
    if declared > available {
        tracing::warn!(declared, available, "{} entry count exceeds its payload", name);
    }
    Ok((buf, declared.min(available)))
}

/// Parse stco (chunk offset, 32-bit) payload.
pub fn parse_stco(data: &[u8]) -> Result<Vec<u64>> {
    let (mut buf, count) = table_entries(data, 4, "stco")?;
    Ok((0..count).map(|_| buf.get_u32() as u64).collect())
}

/// Parse co64 (chunk offset, 64-bit) payload.
pub fn parse_co64(data: &[u8]) -> Result<Vec<u64>> {
    let (mut buf, count) = table_entries(data, 8, "co64")?;
    Ok((0..count).map(|_| buf.get_u64()).collect())
}

/// Parse stsc (sample to chunk) payload.
pub fn parse_stsc(data: &[u8]) -> Result<Vec<StscRun>> {
    let (mut buf, count) = table_entries(data, 12, "stsc")?;
    Ok((0..count)
        .map(|_| StscRun {
            first_chunk: buf.get_u32(),
            samples_per_chunk: buf.get_u32(),
            sample_description_index: buf.get_u32(),
        })
        .collect())
}

/// Parse stss (sync sample) payload into 1-based sample numbers.
pub fn parse_stss(data: &[u8]) -> Result<Vec<u32>> {
    let (mut buf, count) = table_entries(data, 4, "stss")?;
    Ok((0..count).map(|_| buf.get_u32()).collect())
}
