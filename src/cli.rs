use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "avcextract")]
#[command(author, version, about = "Extract H.264 video from MP4 files as Annex-B streams")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract a track (or a single chunk) as an Annex-B stream
    Extract {
        /// MP4 file to read
        #[arg(required = true)]
        input: PathBuf,

        /// Track index (defaults to the configured track)
        #[arg(short, long)]
        track: Option<u32>,

        /// Write only this chunk
        #[arg(long)]
        chunk: Option<usize>,

        /// Output file (defaults to the configured name template)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the box tree of an MP4 file
    Tree {
        /// MP4 file to read
        #[arg(required = true)]
        input: PathBuf,
    },

    /// Show track and chunk information
    Info {
        /// MP4 file to read
        #[arg(required = true)]
        input: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Display version information
    Version,
}
