mod cli;

use avcextract::{config, extract};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "avcextract=trace,avcextract_media=trace".to_string()
        } else {
            "avcextract=info,avcextract_media=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Extract {
            input,
            track,
            chunk,
            output,
        } => extract_file(&input, cli.config.as_deref(), track, chunk, output.as_deref()),
        Commands::Tree { input } => print_tree(&input, cli.config.as_deref()),
        Commands::Info { input, json } => print_info(&input, cli.config.as_deref(), json),
        Commands::Version => {
            println!("avcextract {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn open_input(input: &Path, config: &config::Config) -> Result<extract::Mp4Source> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }
    extract::Mp4Source::open(input, config)
}

fn extract_file(
    input: &Path,
    config_path: Option<&Path>,
    track: Option<u32>,
    chunk: Option<usize>,
    output: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let mut source = open_input(input, &config)?;

    let track = track.unwrap_or(config.extract.track);
    let output = match output {
        Some(path) => path.to_path_buf(),
        None => extract::default_output_path(&config.extract, input, track, chunk),
    };

    tracing::info!("Extracting track {} of {:?} to {:?}", track, input, output);
    let stats = source.extract(track, chunk, &output)?;

    println!("Output: {}", output.display());
    println!("NAL units: {}", stats.nal_units);
    println!("Bytes written: {}", stats.bytes_written);
    if stats.truncated {
        println!("Warning: stream is truncated");
    }

    Ok(())
}

fn print_tree(input: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let source = open_input(input, &config)?;
    print!("{}", extract::render_tree(&source.container));
    Ok(())
}

fn print_info(input: &Path, config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let source = open_input(input, &config)?;
    let summary = extract::summarize(&source);

    if json {
        let json_str = serde_json::to_string_pretty(&summary)?;
        println!("{}", json_str);
        return Ok(());
    }

    println!("File: {}", summary.file.display());
    println!("Tracks: {} usable of {}", summary.tracks.len(), summary.trak_count);
    if let avcextract_media::ScanEnd::Truncated { offset, reason } = &summary.scan_end {
        println!("Scan stopped at offset {}: {}", offset, reason);
    }

    for track in &summary.tracks {
        print!("\n  [{}]", track.index);
        if let (Some(w), Some(h)) = (track.width, track.height) {
            print!(" avc1 {}x{}", w, h);
        }
        if let (Some(profile), Some(level)) = (track.profile, track.level) {
            print!(" profile {} level {}", profile, level);
        }
        println!();
        println!(
            "      {} chunks, {} samples, NAL length size {}",
            track.chunk_count, track.sample_count, track.nal_length_size
        );
        match track.sync_sample_count {
            Some(n) => println!("      {} sync samples", n),
            None => println!("      all samples are sync samples"),
        }
        println!("      SPS: {}, PPS: {}", track.sps_count, track.pps_count);
    }

    Ok(())
}
