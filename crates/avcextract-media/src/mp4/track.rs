//! Per-track chunk layout and parameter sets.

use super::sample_table::{parse_co64, parse_stco, parse_stsc, parse_stss};
use super::{Atom, AtomType, AvcConfig, AvcSampleEntry, Chunk, ChunkExtent, ChunkTableBuilder, Mp4Reader};
use crate::{Error, Result};
use bytes::Bytes;
use std::io::{Read, Seek};

/// Length prefix width assumed when a track carries no avcC.
const DEFAULT_NAL_LENGTH_SIZE: u8 = 4;

/// A track resolved from its `trak` box.
#[derive(Debug, Clone)]
pub struct Track {
    /// Position of the `trak` box among the `moov` children (0-based).
    pub index: u32,
    /// Chunks in file order.
    pub chunks: Vec<Chunk>,
    /// 1-based sync sample numbers; `None` when the track has no stss.
    pub sync_samples: Option<Vec<u32>>,
    /// First usable avc1 sample entry.
    pub sample_entry: Option<AvcSampleEntry>,
    /// Byte range of the mdat box, used to bound chunk reads.
    mdat_start: u64,
    mdat_end: u64,
}

impl Track {
    /// Interpret the sample tables under `trak/mdia/minf/stbl`.
    ///
    /// Missing stco/co64 or stsc is an error for this track; a missing stss
    /// or stsd only leaves the corresponding field unset.
    pub fn from_trak<R: Read + Seek>(
        reader: &mut Mp4Reader<R>,
        index: u32,
        trak: &Atom,
        mdat: &Atom,
    ) -> Result<Self> {
        let stbl = trak.find("mdia/minf/stbl").ok_or(Error::MissingAtom("stbl"))?;

        let offsets = if let Some(stco) = stbl.child(AtomType::STCO) {
            parse_stco(&reader.read_atom_data(stco)?)?
        } else if let Some(co64) = stbl.child(AtomType::CO64) {
            parse_co64(&reader.read_atom_data(co64)?)?
        } else {
            return Err(Error::MissingAtom("stco"));
        };

        let stsc = stbl.child(AtomType::STSC).ok_or(Error::MissingAtom("stsc"))?;
        let runs = parse_stsc(&reader.read_atom_data(stsc)?)?;

        let mut builder = ChunkTableBuilder::new();
        builder.set_chunk_offsets(offsets);
        builder.set_stsc(runs);
        let chunks = builder.build()?;

        let sync_samples = match stbl.child(AtomType::STSS) {
            Some(stss) => Some(parse_stss(&reader.read_atom_data(stss)?)?),
            None => None,
        };

        let sample_entry = stbl
            .child(AtomType::STSD)
            .and_then(|stsd| stsd.sample_entries().first().cloned());
        if sample_entry.is_none() {
            tracing::warn!(track = index, "Track has no usable avc1 sample entry");
        }

        let track = Self {
            index,
            chunks,
            sync_samples,
            sample_entry,
            mdat_start: mdat.offset,
            mdat_end: mdat.end(),
        };

        tracing::debug!(
            track = index,
            chunks = track.chunks.len(),
            samples = track.sample_count(),
            sync_samples = track.sync_samples.as_ref().map(Vec::len),
            "Parsed track"
        );

        Ok(track)
    }

    /// Decoder configuration of the first avc1 entry.
    pub fn avc_config(&self) -> Option<&AvcConfig> {
        self.sample_entry.as_ref().map(|e| &e.config)
    }

    /// Sequence parameter sets; empty without an avc1 entry.
    pub fn sps(&self) -> &[Bytes] {
        self.avc_config().map(|c| c.sps.as_slice()).unwrap_or(&[])
    }

    /// Picture parameter sets; empty without an avc1 entry.
    pub fn pps(&self) -> &[Bytes] {
        self.avc_config().map(|c| c.pps.as_slice()).unwrap_or(&[])
    }

    /// Whether the track can be turned into a playable stream.
    pub fn has_parameter_sets(&self) -> bool {
        !self.sps().is_empty() && !self.pps().is_empty()
    }

    /// NAL length prefix width in bytes.
    pub fn nal_length_size(&self) -> u8 {
        self.avc_config()
            .map(|c| c.nal_length_size)
            .unwrap_or(DEFAULT_NAL_LENGTH_SIZE)
    }

    /// Byte range to read for chunk `index`.
    ///
    /// A chunk without a table size (the last one) runs to the end of mdat.
    /// Returns `None` for out-of-range indices and for chunks outside mdat.
    pub fn chunk_extent(&self, index: usize) -> Option<ChunkExtent> {
        let chunk = self.chunks.get(index)?;
        if chunk.offset < self.mdat_start || chunk.offset >= self.mdat_end {
            return None;
        }
        let available = self.mdat_end - chunk.offset;
        let size = chunk.size.map_or(available, |s| s.min(available));
        Some(ChunkExtent {
            offset: chunk.offset,
            size,
        })
    }

    /// Total samples across all chunks.
    pub fn sample_count(&self) -> u64 {
        self.chunks.iter().map(|c| c.sample_count as u64).sum()
    }

    /// 1-based number of the first sample stored in chunk `index`.
    pub fn first_sample_of_chunk(&self, index: usize) -> Option<u64> {
        if index >= self.chunks.len() {
            return None;
        }
        let before: u64 = self.chunks[..index].iter().map(|c| c.sample_count as u64).sum();
        Some(before + 1)
    }

    /// Whether 1-based sample `number` is a sync sample.
    ///
    /// Without an stss table every sample is a sync sample.
    pub fn is_sync_sample(&self, number: u32) -> bool {
        match &self.sync_samples {
            Some(samples) => samples.binary_search(&number).is_ok(),
            None => true,
        }
    }
}
