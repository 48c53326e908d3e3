//! AVC sample entry and decoder configuration record (avcC) decoding.
//!
//! The `stsd` payload is a version/flags word, an entry count and then that
//! many sample entries. Only `avc1` visual sample entries with the standard
//! fixed header are kept; anything else is skipped with a warning.

use super::{Atom, AtomType, Mp4Reader};
use crate::{Error, Result};
use bytes::{Buf, Bytes};
use std::io::{Read, Seek};

/// Size of the visual sample entry header, including the 8-byte box header.
const VISUAL_SAMPLE_ENTRY_SIZE: u64 = 86;

/// Expected `depth` field of a visual sample entry.
const DEPTH_COLOR: u16 = 0x18;

/// Decoded AVCDecoderConfigurationRecord.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvcConfig {
    pub version: u8,
    pub profile: u8,
    pub profile_compatibility: u8,
    pub level: u8,
    /// Width in bytes of the length prefix in front of every NAL unit.
    pub nal_length_size: u8,
    /// Sequence parameter sets, in record order.
    pub sps: Vec<Bytes>,
    /// Picture parameter sets, in record order.
    pub pps: Vec<Bytes>,
}

impl AvcConfig {
    /// Decode the payload of an `avcC` box (without its header).
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut buf = data;
        if buf.remaining() < 6 {
            return Err(Error::invalid_mp4(format!(
                "avcC payload of {} bytes is too short",
                data.len()
            )));
        }

        let version = buf.get_u8();
        let profile = buf.get_u8();
        let profile_compatibility = buf.get_u8();
        let level = buf.get_u8();
        // Low two bits hold the size minus one; mask before adding.
        let nal_length_size = (buf.get_u8() & 0x03) + 1;
        if nal_length_size == 3 {
            return Err(Error::invalid_mp4("avcC declares a 3-byte NAL length field"));
        }

        let sps_count = (buf.get_u8() & 0x1F) as usize;
        let sps = read_parameter_sets(&mut buf, sps_count, "SPS")?;

        if !buf.has_remaining() {
            return Err(Error::invalid_mp4("avcC ends before the PPS count"));
        }
        let pps_count = buf.get_u8() as usize;
        let pps = read_parameter_sets(&mut buf, pps_count, "PPS")?;

        Ok(Self {
            version,
            profile,
            profile_compatibility,
            level,
            nal_length_size,
            sps,
            pps,
        })
    }
}

fn read_parameter_sets(buf: &mut &[u8], count: usize, kind: &str) -> Result<Vec<Bytes>> {
    let mut sets = Vec::with_capacity(count);
    for i in 0..count {
        if buf.remaining() < 2 {
            return Err(Error::invalid_mp4(format!("avcC truncated before {kind} {i} length")));
        }
        let len = buf.get_u16() as usize;
        if buf.remaining() < len {
            return Err(Error::invalid_mp4(format!(
                "avcC {kind} {i} needs {len} bytes, {} left",
                buf.remaining()
            )));
        }
        sets.push(buf.copy_to_bytes(len));
    }
    Ok(sets)
}

/// An `avc1` sample entry that passed the shape checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvcSampleEntry {
    pub width: u16,
    pub height: u16,
    /// Horizontal resolution, 16.16 fixed point.
    pub horizontal_resolution: u32,
    /// Vertical resolution, 16.16 fixed point.
    pub vertical_resolution: u32,
    pub config: AvcConfig,
}

/// Decode every usable sample entry of an `stsd` box.
///
/// Entries that are not `avc1`, fail the fixed-header checks or carry no
/// decodable `avcC` are left out of the result.
pub(crate) fn read_sample_descriptions<R: Read + Seek>(
    reader: &mut Mp4Reader<R>,
    stsd: &Atom,
) -> Result<Vec<AvcSampleEntry>> {
    let end = stsd.end();
    if stsd.data_size() < 8 {
        tracing::warn!(offset = stsd.offset, "stsd too short for an entry count");
        return Ok(Vec::new());
    }

    // Skip version/flags
    reader.seek(stsd.data_offset() + 4)?;
    let entry_count = reader.read_u32()?;
    let mut pos = stsd.data_offset() + 8;
    let mut entries = Vec::new();

    for index in 0..entry_count {
        if pos + 8 > end {
            tracing::warn!(index, entry_count, "stsd ends before all sample entries");
            break;
        }
        reader.seek(pos)?;
        let size = reader.read_u32()? as u64;
        let entry_type = reader.read_fourcc()?;
        if size < 8 || pos + size > end {
            tracing::warn!(index, size, "Sample entry {} does not fit in stsd", entry_type);
            break;
        }

        if let Some(entry) = read_avc1(reader, pos, size, entry_type)? {
            entries.push(entry);
        }
        pos += size;
    }

    Ok(entries)
}

/// Decode one sample entry; `None` means it was rejected (and logged).
fn read_avc1<R: Read + Seek>(
    reader: &mut Mp4Reader<R>,
    pos: u64,
    size: u64,
    entry_type: AtomType,
) -> Result<Option<AvcSampleEntry>> {
    if entry_type != AtomType::AVC1 {
        tracing::warn!(offset = pos, "Skipping unsupported sample entry {}", entry_type);
        return Ok(None);
    }
    if size < VISUAL_SAMPLE_ENTRY_SIZE {
        tracing::warn!(offset = pos, size, "avc1 entry shorter than its fixed header");
        return Ok(None);
    }

    // reserved(6) + data_reference_index(2) + pre_defined/reserved(16)
    reader.seek(pos + 8 + 24)?;
    let width = reader.read_u16()?;
    let height = reader.read_u16()?;
    let horizontal_resolution = reader.read_u32()?;
    let vertical_resolution = reader.read_u32()?;
    let _reserved = reader.read_u32()?;

    let frame_count = reader.read_u16()?;
    if frame_count != 1 {
        tracing::warn!(offset = pos, frame_count, "Skipping avc1 entry with frame_count != 1");
        return Ok(None);
    }

    // compressorname
    reader.seek(pos + 8 + 24 + 18 + 32)?;
    let depth = reader.read_u16()?;
    if depth != DEPTH_COLOR {
        tracing::warn!(offset = pos, depth, "Skipping avc1 entry with unexpected depth");
        return Ok(None);
    }
    let pre_defined = reader.read_i16()?;
    if pre_defined != -1 {
        tracing::warn!(offset = pos, pre_defined, "Skipping avc1 entry with pre_defined != -1");
        return Ok(None);
    }

    let end = pos + size;
    let mut child = pos + VISUAL_SAMPLE_ENTRY_SIZE;
    while child + 8 <= end {
        reader.seek(child)?;
        let child_size = reader.read_u32()? as u64;
        let child_type = reader.read_fourcc()?;
        if child_size < 8 || child + child_size > end {
            break;
        }

        if child_type == AtomType::AVCC {
            let data = reader.read_payload(child_type, child + 8, child_size - 8)?;
            return match AvcConfig::from_bytes(&data) {
                Ok(config) => Ok(Some(AvcSampleEntry {
                    width,
                    height,
                    horizontal_resolution,
                    vertical_resolution,
                    config,
                })),
                Err(e) => {
                    tracing::warn!(offset = child, "Skipping avc1 entry: {}", e);
                    Ok(None)
                }
            };
        }

        child += child_size;
    }

    tracing::warn!(offset = pos, "Skipping avc1 entry without avcC");
    Ok(None)
}
