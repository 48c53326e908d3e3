//! MP4 box tree definitions.

use super::AvcSampleEntry;

/// Four-character atom type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtomType(pub [u8; 4]);

impl AtomType {
    pub const FTYP: Self = Self(*b"ftyp");
    pub const MOOV: Self = Self(*b"moov");
    pub const MDAT: Self = Self(*b"mdat");
    pub const FREE: Self = Self(*b"free");
    pub const SKIP: Self = Self(*b"skip");
    pub const MVHD: Self = Self(*b"mvhd");
    pub const TRAK: Self = Self(*b"trak");
    pub const TKHD: Self = Self(*b"tkhd");
    pub const EDTS: Self = Self(*b"edts");
    pub const ELST: Self = Self(*b"elst");
    pub const MDIA: Self = Self(*b"mdia");
    pub const MDHD: Self = Self(*b"mdhd");
    pub const HDLR: Self = Self(*b"hdlr");
    pub const MINF: Self = Self(*b"minf");
    pub const VMHD: Self = Self(*b"vmhd");
    pub const SMHD: Self = Self(*b"smhd");
    pub const DINF: Self = Self(*b"dinf");
    pub const DREF: Self = Self(*b"dref");
    pub const STBL: Self = Self(*b"stbl");
    pub const STSD: Self = Self(*b"stsd");
    pub const STTS: Self = Self(*b"stts");
    pub const CTTS: Self = Self(*b"ctts");
    pub const STSS: Self = Self(*b"stss");
    pub const STSC: Self = Self(*b"stsc");
    pub const STSZ: Self = Self(*b"stsz");
    pub const STCO: Self = Self(*b"stco");
    pub const CO64: Self = Self(*b"co64");
    pub const UDTA: Self = Self(*b"udta");
    pub const META: Self = Self(*b"meta");
    pub const AVC1: Self = Self(*b"avc1");
    pub const AVCC: Self = Self(*b"avcC");

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Parse a four-character path segment such as `"stbl"`.
    pub fn from_name(name: &str) -> Option<Self> {
        let bytes: [u8; 4] = name.as_bytes().try_into().ok()?;
        Some(Self(bytes))
    }

    /// Get the 4-char code as a string.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }

    /// How the parser treats the payload of a box with this type.
    pub fn kind(&self) -> AtomKind {
        match *self {
            Self::STSD => AtomKind::SampleDescription,
            Self::MDAT
            | Self::FREE
            | Self::SKIP
            | Self::FTYP
            | Self::MVHD
            | Self::TKHD
            | Self::MDHD
            | Self::HDLR
            | Self::VMHD
            | Self::SMHD
            | Self::DREF
            | Self::ELST
            | Self::STTS
            | Self::CTTS
            | Self::STSS
            | Self::STSC
            | Self::STSZ
            | Self::STCO
            | Self::CO64
            | Self::META => AtomKind::Leaf,
            _ => AtomKind::Container,
        }
    }
}

impl std::fmt::Display for AtomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parsing behaviour selected by a box type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomKind {
    /// Payload is skipped using the declared size.
    Leaf,
    /// Payload is a sequence of child boxes.
    Container,
    /// Payload is decoded as sample entries (`stsd`).
    SampleDescription,
}

/// Decoded payload of a box.
#[derive(Debug, Clone)]
pub enum AtomBody {
    Leaf,
    Container(Vec<Atom>),
    SampleDescription(Vec<AvcSampleEntry>),
}

/// A parsed box and everything it owns.
#[derive(Debug, Clone)]
pub struct Atom {
    /// Atom type code.
    pub atom_type: AtomType,
    /// Atom size including header.
    pub size: u64,
    /// File offset of the first header byte.
    pub offset: u64,
    /// Size of the header (8 or 16 bytes).
    pub header_size: u8,
    /// Children or decoded payload.
    pub body: AtomBody,
}

impl Atom {
    /// File offset where atom data starts (after header).
    pub fn data_offset(&self) -> u64 {
        self.offset + self.header_size as u64
    }

    /// Get the data size (size - header).
    pub fn data_size(&self) -> u64 {
        self.size.saturating_sub(self.header_size as u64)
    }

    /// File offset just past the last byte of this atom.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// Child boxes; empty for leaves and sample descriptions.
    pub fn children(&self) -> &[Atom] {
        match &self.body {
            AtomBody::Container(children) => children,
            _ => &[],
        }
    }

    /// Decoded avc1 entries; empty unless this is an `stsd` box.
    pub fn sample_entries(&self) -> &[AvcSampleEntry] {
        match &self.body {
            AtomBody::SampleDescription(entries) => entries,
            _ => &[],
        }
    }

    /// First direct child of the given type.
    pub fn child(&self, atom_type: AtomType) -> Option<&Atom> {
        self.children().iter().find(|a| a.atom_type == atom_type)
    }

    /// Resolve a slash-separated path of child types, e.g. `"mdia/minf/stbl"`.
    pub fn find(&self, path: &str) -> Option<&Atom> {
        find_path(self.children(), path)
    }
}

impl std::fmt::Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.atom_type, self.size)
    }
}

/// Resolve a slash-separated path starting from a list of sibling atoms.
///
/// At every level the first atom with a matching type is followed.
pub fn find_path<'a>(atoms: &'a [Atom], path: &str) -> Option<&'a Atom> {
    let mut level = atoms;
    let mut found = None;
    for segment in path.split('/') {
        let atom_type = AtomType::from_name(segment)?;
        let atom = level.iter().find(|a| a.atom_type == atom_type)?;
        level = atom.children();
        found = Some(atom);
    }
    found
}

/// Depth-first pre-order walk, calling `visit(atom, depth)`.
pub fn walk<'a, F>(atoms: &'a [Atom], visit: &mut F)
where
    F: FnMut(&'a Atom, usize),
{
    fn walk_at<'a, F>(atoms: &'a [Atom], depth: usize, visit: &mut F)
    where
        F: FnMut(&'a Atom, usize),
    {
        for atom in atoms {
            visit(atom, depth);
            walk_at(atom.children(), depth + 1, visit);
        }
    }
    walk_at(atoms, 0, visit);
}
