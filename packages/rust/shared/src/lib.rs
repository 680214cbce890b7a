//! Shared types, error model, and configuration for mdchunk.
//!
//! Every other mdchunk crate builds on the section and chunk records here,
//! reports failures as [`MdChunkError`], and reads its settings through
//! [`AppConfig`] / [`ChunkOptions`].

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ChunkOptions, ChunkingConfig, OpenRouterConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, validate_api_key, validate_config,
};
pub use error::{MdChunkError, Result};
pub use types::{Chunk, ChunkDocument, Section, char_len};
