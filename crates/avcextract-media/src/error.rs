//! Error types for avcextract-media.

use std::io;
use thiserror::Error;

/// Result type for avcextract-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for avcextract-media operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid MP4 file structure.
    #[error("Invalid MP4: {0}")]
    InvalidMp4(String),

    /// Missing required atom in MP4 file.
    #[error("Missing required atom: {0}")]
    MissingAtom(&'static str),

    /// Not a single complete top-level box could be read.
    #[error("Not a valid container: no complete top-level box")]
    NoBoxes,

    /// A corrupt header ended the top-level scan (strict parsing only).
    #[error("Truncated container: corrupt box header at offset {offset}")]
    TruncatedContainer { offset: u64 },

    /// The track has no usable avc1/avcC sample description.
    #[error("Track {track} has no SPS/PPS parameter sets")]
    MissingParameterSets { track: u32 },

    /// Track index out of range.
    #[error("No such track: {0}")]
    NoSuchTrack(u32),

    /// Chunk index out of range, or the chunk lies outside mdat.
    #[error("No such chunk: {chunk} (track {track})")]
    NoSuchChunk { track: u32, chunk: usize },
}

impl Error {
    /// Create an invalid MP4 error.
    pub fn invalid_mp4(msg: impl Into<String>) -> Self {
        Self::InvalidMp4(msg.into())
    }
}
