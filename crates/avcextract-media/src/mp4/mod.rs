//! MP4 container parsing.
//!
//! The whole box tree is read once into a [`Container`], which then locates
//! `moov`/`mdat` and resolves a [`Track`] for every `trak` box.

mod atoms;
mod avc_config;
mod reader;
mod sample_table;
mod track;

pub use atoms::{find_path, walk, Atom, AtomBody, AtomKind, AtomType};
pub use avc_config::{AvcConfig, AvcSampleEntry};
pub use reader::Mp4Reader;
pub use sample_table::{
    parse_co64, parse_stco, parse_stsc, parse_stss, Chunk, ChunkExtent, ChunkTableBuilder, StscRun,
};
pub use track::Track;

use crate::{Error, Result};
use std::io::{Read, Seek};

/// Options controlling the top-level scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Fail on a corrupt top-level tail instead of warning.
    pub strict: bool,
}

/// How the top-level scan ended.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum ScanEnd {
    /// End of input reached on a box boundary.
    Clean,
    /// A header at `offset` could not be turned into a box.
    Truncated { offset: u64, reason: String },
}

impl ScanEnd {
    pub(crate) fn truncated(offset: u64, reason: impl Into<String>) -> Self {
        Self::Truncated {
            offset,
            reason: reason.into(),
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }
}

/// Parsed MP4 container.
#[derive(Debug)]
pub struct Container {
    atoms: Vec<Atom>,
    moov: usize,
    mdat: usize,
    tracks: Vec<Track>,
    scan_end: ScanEnd,
}

impl Container {
    /// Parse a container from the start of the reader.
    pub fn parse<R: Read + Seek>(reader: &mut Mp4Reader<R>, options: ParseOptions) -> Result<Self> {
        Self::parse_from(reader, 0, options)
    }

    /// Parse a container whose first top-level box starts at `start`.
    pub fn parse_from<R: Read + Seek>(
        reader: &mut Mp4Reader<R>,
        start: u64,
        options: ParseOptions,
    ) -> Result<Self> {
        let (atoms, scan_end) = reader.read_top_level(start);

        if atoms.is_empty() {
            return Err(Error::NoBoxes);
        }
        if let ScanEnd::Truncated { offset, reason } = &scan_end {
            if options.strict {
                return Err(Error::TruncatedContainer { offset: *offset });
            }
            tracing::warn!(offset, "Top-level scan stopped early: {}", reason);
        }

        let moov = position_of(&atoms, AtomType::MOOV).ok_or(Error::MissingAtom("moov"))?;
        let mdat = position_of(&atoms, AtomType::MDAT).ok_or(Error::MissingAtom("mdat"))?;

        let mut tracks = Vec::new();
        let traks = atoms[moov]
            .children()
            .iter()
            .filter(|a| a.atom_type == AtomType::TRAK);
        for (index, trak) in traks.enumerate() {
            match Track::from_trak(reader, index as u32, trak, &atoms[mdat]) {
                Ok(track) => tracks.push(track),
                Err(Error::Io(e)) => return Err(Error::Io(e)),
                Err(e) => tracing::warn!(track = index, "Skipping track: {}", e),
            }
        }

        Ok(Self {
            atoms,
            moov,
            mdat,
            tracks,
            scan_end,
        })
    }

    /// Top-level boxes in file order.
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn moov(&self) -> &Atom {
        &self.atoms[self.moov]
    }

    pub fn mdat(&self) -> &Atom {
        &self.atoms[self.mdat]
    }

    /// Tracks that resolved successfully, in `trak` order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Number of `trak` boxes under `moov`, including unusable ones.
    pub fn trak_count(&self) -> usize {
        self.moov()
            .children()
            .iter()
            .filter(|a| a.atom_type == AtomType::TRAK)
            .count()
    }

    /// Look up a track by its `trak` index.
    pub fn track(&self, index: u32) -> Result<&Track> {
        self.tracks
            .iter()
            .find(|t| t.index == index)
            .ok_or(Error::NoSuchTrack(index))
    }

    pub fn scan_end(&self) -> &ScanEnd {
        &self.scan_end
    }

    /// Resolve a slash-separated path from the top level, e.g. `"moov/trak"`.
    pub fn find(&self, path: &str) -> Option<&Atom> {
        find_path(&self.atoms, path)
    }

    /// Depth-first walk over every box, with its nesting depth.
    pub fn walk<'a, F: FnMut(&'a Atom, usize)>(&'a self, mut visit: F) {
        walk(&self.atoms, &mut visit);
    }
}

fn position_of(atoms: &[Atom], atom_type: AtomType) -> Option<usize> {
    atoms.iter().position(|a| a.atom_type == atom_type)
}
