//! Extraction driver: open a container, describe it, and write Annex-B output.

use anyhow::{Context, Result};
use avcextract_media::mp4::{Mp4Reader, ScanEnd};
use avcextract_media::{Chunk, ConversionStats, Container, ParseOptions};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::config::{Config, ExtractConfig};

/// An opened and parsed input file.
pub struct Mp4Source {
    pub path: PathBuf,
    pub container: Container,
    reader: Mp4Reader<BufReader<File>>,
}

impl Mp4Source {
    /// Open and parse `path`, failing with "not a valid container" context.
    pub fn open(path: &Path, config: &Config) -> Result<Self> {
        let mut reader = Mp4Reader::open(path)
            .with_context(|| format!("Failed to open input file: {:?}", path))?;
        let options = ParseOptions {
            strict: config.parser.strict,
        };
        let container = Container::parse(&mut reader, options)
            .with_context(|| format!("{:?} is not a valid container", path))?;

        tracing::info!(
            "Parsed {:?}: {} top-level boxes, {} of {} tracks usable",
            path,
            container.atoms().len(),
            container.tracks().len(),
            container.trak_count()
        );

        Ok(Self {
            path: path.to_path_buf(),
            container,
            reader,
        })
    }

    /// Convert one chunk, or the whole track when `chunk` is `None`.
    pub fn extract(&mut self, track: u32, chunk: Option<usize>, output: &Path) -> Result<ConversionStats> {
        let track = self.container.track(track)?;
        let stats = match chunk {
            Some(chunk) => avcextract_media::convert_chunk(&mut self.reader, track, chunk, output)?,
            None => avcextract_media::convert_track(&mut self.reader, track, output)?,
        };

        if stats.truncated {
            tracing::warn!("Output {:?} ends early: a NAL unit ran past its chunk", output);
        }
        Ok(stats)
    }
}

/// Substitute `{stem}`, `{track}` and `{chunk}` in an output name template.
pub fn render_template(template: &str, stem: &str, track: u32, chunk: Option<usize>) -> String {
    let name = template
        .replace("{stem}", stem)
        .replace("{track}", &track.to_string());
    match chunk {
        Some(chunk) => name.replace("{chunk}", &chunk.to_string()),
        None => name,
    }
}

/// Default output path for an extraction, from the configured templates.
pub fn default_output_path(config: &ExtractConfig, input: &Path, track: u32, chunk: Option<usize>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let template = match chunk {
        Some(_) => &config.chunk_template,
        None => &config.track_template,
    };
    config.output_dir.join(render_template(template, &stem, track, chunk))
}

/// Per-track overview used by the `info` command.
#[derive(Debug, Clone, Serialize)]
pub struct TrackSummary {
    pub index: u32,
    pub width: Option<u16>,
    pub height: Option<u16>,
    pub profile: Option<u8>,
    pub level: Option<u8>,
    pub nal_length_size: u8,
    pub sps_count: usize,
    pub pps_count: usize,
    pub chunk_count: usize,
    pub sample_count: u64,
    /// `None` when every sample is a sync sample.
    pub sync_sample_count: Option<usize>,
    pub chunks: Vec<Chunk>,
}

/// File-level overview used by the `info` command.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerSummary {
    pub file: PathBuf,
    pub trak_count: usize,
    pub scan_end: ScanEnd,
    pub tracks: Vec<TrackSummary>,
}

pub fn summarize(source: &Mp4Source) -> ContainerSummary {
    let container = &source.container;
    let tracks = container
        .tracks()
        .iter()
        .map(|track| {
            let entry = track.sample_entry.as_ref();
            TrackSummary {
                index: track.index,
                width: entry.map(|e| e.width),
                height: entry.map(|e| e.height),
                profile: entry.map(|e| e.config.profile),
                level: entry.map(|e| e.config.level),
                nal_length_size: track.nal_length_size(),
                sps_count: track.sps().len(),
                pps_count: track.pps().len(),
                chunk_count: track.chunks.len(),
                sample_count: track.sample_count(),
                sync_sample_count: track.sync_samples.as_ref().map(Vec::len),
                chunks: track.chunks.clone(),
            }
        })
        .collect();

    ContainerSummary {
        file: source.path.clone(),
        trak_count: container.trak_count(),
        scan_end: container.scan_end().clone(),
        tracks,
    }
}

/// Render the box tree, one box per line, four spaces per nesting level.
pub fn render_tree(container: &Container) -> String {
    let mut out = String::new();
    container.walk(|atom, depth| {
        out.push_str(&"    ".repeat(depth));
        out.push_str(&atom.to_string());
        let entries = atom.sample_entries();
        if !entries.is_empty() {
            out.push_str(&format!(" [{} avc1]", entries.len()));
        }
        out.push('\n');
    });
    out
}
