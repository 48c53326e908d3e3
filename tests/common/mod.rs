//! Shared fixtures for the CLI-level tests.
//!
//! Builds small single-track MP4 files (`ftyp`, `moov`, `mdat`) and puts
//! them on disk for the driver and binary to read.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

pub const SPS: &[u8] = &[0x67, 0x42, 0xC0, 0x1E];
pub const PPS: &[u8] = &[0x68, 0xCE, 0x38, 0x80];

fn boxed(box_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(box_type);
    out.extend_from_slice(payload);
    out
}

fn full_box(box_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut content = vec![0u8; 4];
    content.extend_from_slice(payload);
    boxed(box_type, &content)
}

fn table(box_type: &[u8; 4], entries: &[u32]) -> Vec<u8> {
    let mut payload = (entries.len() as u32).to_be_bytes().to_vec();
    for e in entries {
        payload.extend_from_slice(&e.to_be_bytes());
    }
    full_box(box_type, &payload)
}

/// Serialize NAL units with 4-byte length prefixes.
pub fn length_prefixed(nals: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for nal in nals {
        out.extend_from_slice(&(nal.len() as u32).to_be_bytes());
        out.extend_from_slice(nal);
    }
    out
}

/// 640x360 avc1 entry carrying one SPS and one PPS.
fn sample_entry() -> Vec<u8> {
    let mut avcc = vec![0x01, 0x42, 0xC0, 0x1E, 0xFF, 0xE1];
    avcc.extend_from_slice(&(SPS.len() as u16).to_be_bytes());
    avcc.extend_from_slice(SPS);
    avcc.push(1);
    avcc.extend_from_slice(&(PPS.len() as u16).to_be_bytes());
    avcc.extend_from_slice(PPS);

    let mut avc1 = vec![0u8; 6];
    avc1.extend_from_slice(&1u16.to_be_bytes());
    avc1.extend_from_slice(&[0u8; 16]);
    avc1.extend_from_slice(&640u16.to_be_bytes());
    avc1.extend_from_slice(&360u16.to_be_bytes());
    avc1.extend_from_slice(&0x00480000u32.to_be_bytes());
    avc1.extend_from_slice(&0x00480000u32.to_be_bytes());
    avc1.extend_from_slice(&[0u8; 4]);
    avc1.extend_from_slice(&1u16.to_be_bytes());
    avc1.extend_from_slice(&[0u8; 32]);
    avc1.extend_from_slice(&0x0018u16.to_be_bytes());
    avc1.extend_from_slice(&(-1i16).to_be_bytes());
    avc1.extend(boxed(b"avcC", &avcc));

    let mut stsd = 1u32.to_be_bytes().to_vec();
    stsd.extend(boxed(b"avc1", &avc1));
    full_box(b"stsd", &stsd)
}

/// One video track: length-prefixed chunks plus its stsc/stss tables.
#[derive(Clone)]
pub struct TrackFixture {
    pub chunks: Vec<Vec<u8>>,
    /// (first_chunk, samples_per_chunk, sample_description_index)
    pub stsc: Vec<(u32, u32, u32)>,
    pub stss: Option<Vec<u32>>,
}

/// Single-track file builder.
#[derive(Clone)]
pub struct Mp4Fixture {
    pub track: TrackFixture,
}

impl Mp4Fixture {
    pub fn new(track: TrackFixture) -> Self {
        Self { track }
    }

    fn moov(&self, mdat_data_start: u64) -> Vec<u8> {
        let mut offsets = Vec::new();
        let mut pos = mdat_data_start;
        for chunk in &self.track.chunks {
            offsets.push(pos as u32);
            pos += chunk.len() as u64;
        }

        let mut stbl = sample_entry();
        let mut stsc = (self.track.stsc.len() as u32).to_be_bytes().to_vec();
        for &(first, count, index) in &self.track.stsc {
            for v in [first, count, index] {
                stsc.extend_from_slice(&v.to_be_bytes());
            }
        }
        stbl.extend(full_box(b"stsc", &stsc));
        stbl.extend(table(b"stco", &offsets));
        if let Some(stss) = &self.track.stss {
            stbl.extend(table(b"stss", stss));
        }

        let minf = boxed(b"minf", &boxed(b"stbl", &stbl));
        let mut trak = full_box(b"tkhd", &[0u8; 80]);
        trak.extend(boxed(b"mdia", &minf));

        let mut moov = full_box(b"mvhd", &[0u8; 96]);
        moov.extend(boxed(b"trak", &trak));
        boxed(b"moov", &moov)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut file = boxed(b"ftyp", b"isom\0\0\x02\0isomavc1");
        // moov size does not depend on the offsets it records.
        let mdat_data_start = file.len() as u64 + self.moov(0).len() as u64 + 8;
        file.extend(self.moov(mdat_data_start));
        file.extend(boxed(b"mdat", &self.track.chunks.concat()));
        file
    }
}

/// Two chunks, three NAL units, one sync sample.
pub fn sample_track() -> TrackFixture {
    TrackFixture {
        chunks: vec![
            length_prefixed(&[&[0x65, 0x88, 0x84], &[0x06, 0x05, 0x10]]),
            length_prefixed(&[&[0x41, 0x9A, 0x02]]),
        ],
        stsc: vec![(1, 2, 1), (2, 1, 1)],
        stss: Some(vec![1]),
    }
}

/// Write `fixture` to `dir/name` and return the path.
pub fn write_mp4(dir: &Path, name: &str, fixture: &Mp4Fixture) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, fixture.build()).expect("failed to write fixture");
    path
}

/// Write the sample file to `dir/clip.mp4`.
pub fn write_sample_mp4(dir: &Path) -> PathBuf {
    write_mp4(dir, "clip.mp4", &Mp4Fixture::new(sample_track()))
}

/// Split an Annex-B stream on 4-byte start codes.
pub fn split_annexb(data: &[u8]) -> Vec<Vec<u8>> {
    let mut units: Vec<Vec<u8>> = Vec::new();
    let mut i = 0;
    while i < data.len() {
        if data[i..].starts_with(&[0, 0, 0, 1]) {
            units.push(Vec::new());
            i += 4;
        } else {
            units.last_mut().expect("stream starts with a start code").push(data[i]);
            i += 1;
        }
    }
    units
}
