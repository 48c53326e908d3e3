use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub parser: ParserConfig,

    #[serde(default)]
    pub extract: ExtractConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ParserConfig {
    /// Fail when the top-level box scan ends on a corrupt header
    /// instead of keeping the boxes read so far
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractConfig {
    /// Track extracted when none is given on the command line
    #[serde(default)]
    pub track: u32,

    /// Directory for generated output names (tilde-expanded)
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// File name for whole-track output; supports {stem} and {track}
    #[serde(default = "default_track_template")]
    pub track_template: String,

    /// File name for single-chunk output; supports {stem}, {track} and {chunk}
    #[serde(default = "default_chunk_template")]
    pub chunk_template: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_track_template() -> String {
    "{stem}.track{track}.h264".to_string()
}

fn default_chunk_template() -> String {
    "{stem}.track{track}.chunk{chunk}.h264".to_string()
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            track: 0,
            output_dir: default_output_dir(),
            track_template: default_track_template(),
            chunk_template: default_chunk_template(),
        }
    }
}
