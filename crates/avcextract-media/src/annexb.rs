//! Length-prefixed to Annex-B NAL unit conversion.
//!
//! In MP4 every NAL unit inside a sample is preceded by a big-endian length
//! field whose width comes from the avcC record. An Annex-B stream instead
//! separates NAL units with the `00 00 00 01` start code and carries the
//! SPS/PPS in-band, ahead of the first slice.

use crate::mp4::{ChunkExtent, Mp4Reader, Track};
use crate::{Error, Result};
use bytes::Bytes;
use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, Write};
use std::path::Path;

/// Four-byte Annex-B start code.
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// Summary of a conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionStats {
    /// NAL units copied from the source, excluding parameter sets.
    pub nal_units: usize,
    /// Bytes written to the output, start codes and parameter sets included.
    pub bytes_written: u64,
    /// A NAL unit would have run past its chunk and was dropped.
    pub truncated: bool,
}

impl ConversionStats {
    fn merge(&mut self, other: ConversionStats) {
        self.nal_units += other.nal_units;
        self.bytes_written += other.bytes_written;
        self.truncated |= other.truncated;
    }
}

/// Write the first SPS and first PPS, each behind a start code.
pub fn write_parameter_sets<W: Write>(
    out: &mut W,
    sps: &[Bytes],
    pps: &[Bytes],
    track: u32,
) -> Result<u64> {
    let (Some(sps), Some(pps)) = (sps.first(), pps.first()) else {
        return Err(Error::MissingParameterSets { track });
    };

    out.write_all(&START_CODE)?;
    out.write_all(sps)?;
    out.write_all(&START_CODE)?;
    out.write_all(pps)?;

    Ok((START_CODE.len() * 2 + sps.len() + pps.len()) as u64)
}

/// Read one NAL length prefix; `None` at end of input.
fn read_nal_length<R: Read + Seek>(reader: &mut Mp4Reader<R>, width: u8) -> Result<Option<u64>> {
    let value = match width {
        1 => reader.read_u8().map(u64::from),
        2 => reader.read_u16().map(u64::from),
        4 => reader.read_u32().map(u64::from),
        other => {
            return Err(Error::invalid_mp4(format!(
                "unsupported NAL length size {other}"
            )))
        }
    };

    match value {
        Ok(len) => Ok(Some(len)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Copy every NAL unit of a chunk to `out`, replacing each length prefix
/// with a start code.
///
/// The loop ends at the first zero (or, for 4-byte prefixes, negative)
/// length, at end of input, or when the next prefix or NAL body would
/// reach past `extent.size`.
pub fn copy_chunk_nal_units<R: Read + Seek, W: Write>(
    reader: &mut Mp4Reader<R>,
    extent: ChunkExtent,
    nal_length_size: u8,
    out: &mut W,
) -> Result<ConversionStats> {
    let width = nal_length_size as u64;
    let mut stats = ConversionStats::default();
    let mut consumed = 0u64;

    reader.seek(extent.offset)?;

    loop {
        if consumed + width > extent.size {
            break;
        }
        let Some(len) = read_nal_length(reader, nal_length_size)? else {
            break;
        };
        if len == 0 || (nal_length_size == 4 && len > i32::MAX as u64) {
            break;
        }

        let body_start = extent.offset + consumed + width;
        if len > reader.len().saturating_sub(body_start) {
            tracing::warn!(
                offset = extent.offset,
                nal_len = len,
                "NAL unit runs past the end of input, stopping"
            );
            stats.truncated = true;
            break;
        }

        consumed += width + len;
        if consumed > extent.size {
            tracing::warn!(
                offset = extent.offset,
                size = extent.size,
                nal_len = len,
                "NAL unit runs past the end of its chunk, stopping"
            );
            stats.truncated = true;
            break;
        }

        out.write_all(&START_CODE)?;
        let copied = reader.copy_to(len, out)?;
        stats.bytes_written += START_CODE.len() as u64 + copied;
        if copied < len {
            tracing::warn!(offset = extent.offset, "Input ended inside a NAL unit");
            stats.truncated = true;
            break;
        }

        stats.nal_units += 1;
        tracing::trace!(nal_len = len, "Copied NAL unit");
    }

    Ok(stats)
}

/// Write one chunk as a standalone Annex-B file: SPS, PPS, then the
/// chunk's NAL units. The destination is created or truncated.
pub fn convert_chunk<R: Read + Seek>(
    reader: &mut Mp4Reader<R>,
    track: &Track,
    chunk: usize,
    output: &Path,
) -> Result<ConversionStats> {
    let extent = track.chunk_extent(chunk).ok_or(Error::NoSuchChunk {
        track: track.index,
        chunk,
    })?;

    let mut out = BufWriter::new(File::create(output)?);
    let mut stats = ConversionStats {
        bytes_written: write_parameter_sets(&mut out, track.sps(), track.pps(), track.index)?,
        ..Default::default()
    };
    stats.merge(copy_chunk_nal_units(reader, extent, track.nal_length_size(), &mut out)?);
    out.flush()?;

    tracing::debug!(
        track = track.index,
        chunk,
        nal_units = stats.nal_units,
        bytes = stats.bytes_written,
        "Wrote chunk {}",
        output.display()
    );
    Ok(stats)
}

/// Write a whole track as one Annex-B file: SPS and PPS once, then every
/// chunk's NAL units in file order.
pub fn convert_track<R: Read + Seek>(
    reader: &mut Mp4Reader<R>,
    track: &Track,
    output: &Path,
) -> Result<ConversionStats> {
    let mut out = BufWriter::new(File::create(output)?);
    let mut stats = ConversionStats {
        bytes_written: write_parameter_sets(&mut out, track.sps(), track.pps(), track.index)?,
        ..Default::default()
    };

    for index in 0..track.chunks.len() {
        let Some(extent) = track.chunk_extent(index) else {
            tracing::warn!(track = track.index, chunk = index, "Chunk lies outside mdat, skipping");
            continue;
        };
        stats.merge(copy_chunk_nal_units(reader, extent, track.nal_length_size(), &mut out)?);
    }
    out.flush()?;

    tracing::debug!(
        track = track.index,
        chunks = track.chunks.len(),
        nal_units = stats.nal_units,
        bytes = stats.bytes_written,
        "Wrote track {}",
        output.display()
    );
    Ok(stats)
}
