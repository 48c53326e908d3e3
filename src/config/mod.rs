mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    expand_paths(&mut config);

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = ["./avcextract.toml", "~/.config/avcextract/config.toml"];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    // Return default config if no file found
    Ok(Config::default())
}

fn expand_paths(config: &mut Config) {
    let dir = config.extract.output_dir.to_string_lossy().into_owned();
    config.extract.output_dir = PathBuf::from(shellexpand::tilde(&dir).as_ref());
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let extract = &config.extract;

    if extract.track_template.trim().is_empty() {
        anyhow::bail!("extract.track_template cannot be empty");
    }
    if extract.chunk_template.trim().is_empty() {
        anyhow::bail!("extract.chunk_template cannot be empty");
    }
    if !extract.chunk_template.contains("{chunk}") {
        anyhow::bail!(
            "extract.chunk_template '{}' must contain {{chunk}}",
            extract.chunk_template
        );
    }

    Ok(())
}
