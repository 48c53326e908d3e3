//! avcextract-media: MP4 parsing and Annex-B H.264 extraction
//!
//! This crate reads an ISO base media file, builds its box tree, resolves
//! each track's chunk layout from the sample tables, and re-frames the
//! length-prefixed NAL units of a chunk into a start-code-delimited
//! elementary stream.
//!
//! # Modules
//!
//! - `mp4` - box tree, avcC decoding, sample tables and tracks
//! - `annexb` - length-prefixed to start-code NAL conversion
//!
//! # Architecture
//!
//! Parsing happens once, up front:
//!
//! 1. Scan top-level boxes and recurse into container boxes
//! 2. Decode `stsd` sample entries inline (avc1 + avcC)
//! 3. Locate `moov` and `mdat`, then build one [`Track`] per `trak`
//!
//! Conversion is per chunk (or per track) and only needs the chunk's
//! extent plus the track's parameter sets, read through the same reader.

pub mod annexb;
pub mod error;
pub mod mp4;

pub use annexb::{convert_chunk, convert_track, ConversionStats, START_CODE};
pub use error::{Error, Result};
pub use mp4::{Chunk, ChunkExtent, Container, ParseOptions, ScanEnd, Track};
