//! avcextract - H.264 elementary stream extraction from MP4 files
//!
//! This library crate exposes the CLI's building blocks for integration testing.

pub mod config;
pub mod extract;
