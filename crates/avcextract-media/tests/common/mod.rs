//! Synthetic MP4 builders for integration tests.
//!
//! [`Mp4Fixture`] lays out `ftyp`, `moov` (one `trak` per [`TrackFixture`]),
//! an optional `free` pad and `mdat`, with stco offsets pointing at the
//! chunks inside `mdat`.

#![allow(dead_code)]

pub const SPS: &[u8] = &[0x67, 0x64, 0x00, 0x1F];
pub const PPS: &[u8] = &[0x68, 0xEE, 0x3C];

pub fn boxed(box_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(box_type);
    out.extend_from_slice(payload);
    out
}

pub fn full_box(box_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut content = vec![0u8; 4];
    content.extend_from_slice(payload);
    boxed(box_type, &content)
}

fn u32_table(box_type: &[u8; 4], entries: &[u32]) -> Vec<u8> {
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

pub fn avcc(sps: &[&[u8]], pps: &[&[u8]]) -> Vec<u8> {
    let mut payload = vec![0x01, 0x64, 0x00, 0x1F, 0xFF, 0xE0 | sps.len() as u8];
    for s in sps {
        payload.extend_from_slice(&(s.len() as u16).to_be_bytes());
        payload.extend_from_slice(s);
    }
    payload.push(pps.len() as u8);
    for p in pps {
        payload.extend_from_slice(&(p.len() as u16).to_be_bytes());
        payload.extend_from_slice(p);
    }
    boxed(b"avcC", &payload)
}

pub fn avc1(frame_count: u16, children: &[u8]) -> Vec<u8> {
    let mut content = Vec::new();
    content.extend_from_slice(&[0u8; 6]); // reserved
    content.extend_from_slice(&1u16.to_be_bytes()); // data_ref_index
    content.extend_from_slice(&[0u8; 16]); // pre_defined + reserved
    content.extend_from_slice(&640u16.to_be_bytes()); // width
    content.extend_from_slice(&360u16.to_be_bytes()); // height
    content.extend_from_slice(&0x00480000u32.to_be_bytes()); // horiz res
    content.extend_from_slice(&0x00480000u32.to_be_bytes()); // vert res
    content.extend_from_slice(&0u32.to_be_bytes()); // reserved
    content.extend_from_slice(&frame_count.to_be_bytes());
    content.extend_from_slice(&[0u8; 32]); // compressor name
    content.extend_from_slice(&0x0018u16.to_be_bytes()); // depth
    content.extend_from_slice(&(-1i16).to_be_bytes()); // pre_defined
    content.extend_from_slice(children);
    boxed(b"avc1", &content)
}

/// One video track: its chunks (already length-prefixed) and tables.
#[derive(Clone)]
pub struct TrackFixture {
    pub chunks: Vec<Vec<u8>>,
    /// (first_chunk, samples_per_chunk, sample_description_index)
    pub stsc: Vec<(u32, u32, u32)>,
    pub stss: Option<Vec<u32>>,
    pub frame_count: u16,
    pub with_stsd: bool,
    pub with_stco: bool,
    pub with_stsc: bool,
    /// Write 64-bit offsets in `co64` instead of `stco`.
    pub use_co64: bool,
}

impl TrackFixture {
    pub fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks,
            stsc: vec![(1, 1, 1)],
            stss: None,
            frame_count: 1,
            with_stsd: true,
            with_stco: true,
            with_stsc: true,
            use_co64: false,
        }
    }

    fn trak(&self, chunk_offsets: &[u32]) -> Vec<u8> {
        let mut stbl = Vec::new();
        if self.with_stsd {
            let entry = avc1(self.frame_count, &avcc(&[SPS], &[PPS]));
            let mut payload = 1u32.to_be_bytes().to_vec();
            payload.extend_from_slice(&entry);
            stbl.extend(full_box(b"stsd", &payload));
        }
        stbl.extend(u32_table(b"stts", &[]));
        if self.with_stsc {
            let flat: Vec<u32> = self.stsc.iter().flat_map(|&(a, b, c)| [a, b, c]).collect();
            let mut payload = (self.stsc.len() as u32).to_be_bytes().to_vec();
            for v in flat {
                payload.extend_from_slice(&v.to_be_bytes());
            }
            stbl.extend(full_box(b"stsc", &payload));
        }
        if self.with_stco && self.use_co64 {
            let mut payload = (chunk_offsets.len() as u32).to_be_bytes().to_vec();
            for &offset in chunk_offsets {
                payload.extend_from_slice(&(offset as u64).to_be_bytes());
            }
            stbl.extend(full_box(b"co64", &payload));
        } else if self.with_stco {
            stbl.extend(u32_table(b"stco", chunk_offsets));
        }
        if let Some(stss) = &self.stss {
            stbl.extend(u32_table(b"stss", stss));
        }

        let mut minf = full_box(b"vmhd", &[0u8; 8]);
        minf.extend(boxed(b"dinf", &full_box(b"dref", &0u32.to_be_bytes())));
        minf.extend(boxed(b"stbl", &stbl));

        let mut hdlr = vec![0u8; 4];
        hdlr.extend_from_slice(b"vide");
        hdlr.extend_from_slice(&[0u8; 13]);

        let mut mdia = full_box(b"mdhd", &[0u8; 20]);
        mdia.extend(full_box(b"hdlr", &hdlr));
        mdia.extend(boxed(b"minf", &minf));

        let mut trak = full_box(b"tkhd", &[0u8; 80]);
        trak.extend(boxed(b"mdia", &mdia));
        boxed(b"trak", &trak)
    }
}

/// Whole-file builder.
#[derive(Clone, Default)]
pub struct Mp4Fixture {
    pub tracks: Vec<TrackFixture>,
    /// Place the first mdat payload byte at this offset using a `free` pad.
    pub mdat_data_offset: Option<u64>,
    pub with_moov: bool,
    pub with_mdat: bool,
}

impl Mp4Fixture {
    pub fn new(tracks: Vec<TrackFixture>) -> Self {
        Self {
            tracks,
            mdat_data_offset: None,
            with_moov: true,
            with_mdat: true,
        }
    }

    fn moov(&self, mdat_data_start: u64) -> Vec<u8> {
        let mut content = full_box(b"mvhd", &[0u8; 96]);
        let mut pos = mdat_data_start;
        for track in &self.tracks {
            let mut offsets = Vec::new();
            for chunk in &track.chunks {
                offsets.push(pos as u32);
                pos += chunk.len() as u64;
            }
            content.extend(track.trak(&offsets));
        }
        boxed(b"moov", &content)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut ftyp_payload = b"isom".to_vec();
        ftyp_payload.extend_from_slice(&0x200u32.to_be_bytes());
        ftyp_payload.extend_from_slice(b"isomavc1");
        let ftyp = boxed(b"ftyp", &ftyp_payload);

        // moov size does not depend on the offsets it records.
        let moov_len = if self.with_moov { self.moov(0).len() as u64 } else { 0 };
        let head = ftyp.len() as u64 + moov_len;
        let pad = match self.mdat_data_offset {
            Some(target) => {
                let pad = target - 8 - head;
                assert!(pad >= 8, "mdat_data_offset too small for a free box");
                boxed(b"free", &vec![0u8; pad as usize - 8])
            }
            None => Vec::new(),
        };
        let mdat_data_start = head + pad.len() as u64 + 8;

        let mut file = ftyp;
        if self.with_moov {
            file.extend(self.moov(mdat_data_start));
        }
        file.extend(pad);
        if self.with_mdat {
            let payload: Vec<u8> = self.tracks.iter().flat_map(|t| t.chunks.concat()).collect();
            file.extend(boxed(b"mdat", &payload));
        }
        file
    }
}
