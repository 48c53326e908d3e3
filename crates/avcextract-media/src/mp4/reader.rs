//! MP4 file reader with box tree parsing.

use super::{avc_config, Atom, AtomBody, AtomKind, AtomType, ScanEnd};
use crate::Result;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Maximum allowed atom data size (64 MB) to prevent OOM on malformed files.
const MAX_ATOM_DATA_SIZE: u64 = 64 * 1024 * 1024;

/// Nesting depth past which container boxes are no longer descended into.
const MAX_DEPTH: usize = 32;

/// Header fields of a box, before its body is interpreted.
#[derive(Debug, Clone, Copy)]
struct BoxHeader {
    atom_type: AtomType,
    size: u64,
    header_size: u8,
}

/// Random-access big-endian reader over an MP4 source.
pub struct Mp4Reader<R> {
    reader: R,
    len: u64,
}

impl Mp4Reader<BufReader<File>> {
    /// Open a file for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file))?)
    }
}

impl<R: Read + Seek> Mp4Reader<R> {
    /// Wrap a seekable source, measuring its length.
    pub fn new(mut reader: R) -> io::Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self { reader, len })
    }

    /// Total length of the source in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Release the underlying source.
    pub fn into_inner(self) -> R {
        self.reader
    }

    pub fn seek(&mut self, pos: u64) -> io::Result<()> {
        self.reader.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    pub fn position(&mut self) -> io::Result<u64> {
        self.reader.stream_position()
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.reader.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_u16(&mut self) -> io::Result<u16> {
        let mut buf = [0u8; 2];
        self.reader.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    pub fn read_i16(&mut self) -> io::Result<i16> {
        let mut buf = [0u8; 2];
        self.reader.read_exact(&mut buf)?;
        Ok(i16::from_be_bytes(buf))
    }

    pub fn read_u32(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.reader.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    pub fn read_u64(&mut self) -> io::Result<u64> {
        let mut buf = [0u8; 8];
        self.reader.read_exact(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    pub fn read_fourcc(&mut self) -> io::Result<AtomType> {
        let mut buf = [0u8; 4];
        self.reader.read_exact(&mut buf)?;
        Ok(AtomType::from_bytes(buf))
    }

    /// Read exactly `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut data = vec![0u8; len];
        self.reader.read_exact(&mut data)?;
        Ok(data)
    }

    /// Copy up to `len` bytes from the current position into `out`,
    /// returning how many were copied.
    pub fn copy_to<W: Write>(&mut self, len: u64, out: &mut W) -> io::Result<u64> {
        io::copy(&mut (&mut self.reader).take(len), out)
    }

    /// Read and validate atom data, rejecting oversized atoms.
    pub fn read_atom_data(&mut self, atom: &Atom) -> Result<Vec<u8>> {
        self.read_payload(atom.atom_type, atom.data_offset(), atom.data_size())
    }

    pub(crate) fn read_payload(&mut self, atom_type: AtomType, offset: u64, size: u64) -> Result<Vec<u8>> {
        if size > MAX_ATOM_DATA_SIZE {
            return Err(crate::Error::InvalidMp4(format!(
                "Atom {} data size {} exceeds maximum {}",
                atom_type, size, MAX_ATOM_DATA_SIZE
            )));
        }
        self.seek(offset)?;
        Ok(self.read_bytes(size as usize)?)
    }

    /// Scan top-level boxes from `start` to the end of the source.
    ///
    /// Never fails: the scan ends either cleanly at end of input or at the
    /// first header that cannot be turned into a box, and the sentinel says
    /// which.
    pub fn read_top_level(&mut self, start: u64) -> (Vec<Atom>, ScanEnd) {
        let mut atoms = Vec::new();
        let mut pos = start;

        let end = loop {
            if pos >= self.len {
                break ScanEnd::Clean;
            }
            if pos + 8 > self.len {
                break ScanEnd::truncated(pos, "short box header");
            }

            let header = match self.read_header(pos, self.len) {
                Ok(header) => header,
                Err(e) => break ScanEnd::truncated(pos, e.to_string()),
            };
            if header.size < header.header_size as u64 {
                break ScanEnd::truncated(pos, format!("box size {} below header size", header.size));
            }
            if header.size > self.len - pos {
                break ScanEnd::truncated(
                    pos,
                    format!(
                        "{} claims {} bytes, {} available",
                        header.atom_type,
                        header.size,
                        self.len - pos
                    ),
                );
            }

            match self.read_body(pos, header, 0) {
                Ok(atom) => {
                    tracing::debug!(offset = pos, "Top-level box {}", atom);
                    pos = atom.end();
                    atoms.push(atom);
                }
                Err(e) => break ScanEnd::truncated(pos, e.to_string()),
            }
        };

        (atoms, end)
    }

    /// Read a box header at `pos`; a zero size extends the box to `limit`.
    fn read_header(&mut self, pos: u64, limit: u64) -> io::Result<BoxHeader> {
        self.seek(pos)?;
        let size = self.read_u32()?;
        let atom_type = self.read_fourcc()?;

        let (size, header_size) = match size {
            // 64-bit extended size
            1 => (self.read_u64()?, 16u8),
            // Atom extends to end of parent
            0 => (limit.saturating_sub(pos), 8u8),
            _ => (size as u64, 8u8),
        };

        Ok(BoxHeader {
            atom_type,
            size,
            header_size,
        })
    }

    /// Interpret the body of a box whose header has been validated.
    fn read_body(&mut self, pos: u64, header: BoxHeader, depth: usize) -> Result<Atom> {
        let mut atom = Atom {
            atom_type: header.atom_type,
            size: header.size,
            offset: pos,
            header_size: header.header_size,
            body: AtomBody::Leaf,
        };

        atom.body = match header.atom_type.kind() {
            AtomKind::Leaf => AtomBody::Leaf,
            AtomKind::SampleDescription => {
                AtomBody::SampleDescription(avc_config::read_sample_descriptions(self, &atom)?)
            }
            AtomKind::Container if depth >= MAX_DEPTH => {
                tracing::warn!(offset = pos, "Not descending into {} past depth {}", atom, depth);
                AtomBody::Leaf
            }
            AtomKind::Container => AtomBody::Container(self.read_children(&atom, depth)?),
        };

        Ok(atom)
    }

    /// Read the children of a container box, bounded by the parent.
    fn read_children(&mut self, parent: &Atom, depth: usize) -> Result<Vec<Atom>> {
        let end = parent.end();
        let mut pos = parent.data_offset();
        let mut children = Vec::new();

        while end - pos >= 8 {
            let header = match self.read_header(pos, end) {
                Ok(header) if end - pos >= header.header_size as u64 => header,
                Ok(header) => {
                    tracing::trace!(
                        offset = pos,
                        "Stopping inside {}: header of {} runs past the parent",
                        parent,
                        header.atom_type
                    );
                    break;
                }
                Err(e) => {
                    tracing::trace!(offset = pos, "Stopping inside {}: {}", parent, e);
                    break;
                }
            };
            if header.size < header.header_size as u64
                || header.size >= parent.size
                || header.size > end - pos
            {
                tracing::trace!(
                    offset = pos,
                    "Stopping inside {}: child {} of size {} does not fit",
                    parent,
                    header.atom_type,
                    header.size
                );
                break;
            }

            let child = self.read_body(pos, header, depth + 1)?;
            pos = child.end();
            children.push(child);
        }

        Ok(children)
    }
}
