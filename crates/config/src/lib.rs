//! Configuration for the highlight pipeline
//!
//! Settings are layered: built-in defaults, then an optional JSON file, then
//! `HIGHLIGHT__`-prefixed environment variables.

pub mod constants;
pub mod settings;

pub use settings::{
    AssemblyConfig, ConfigError, LlmSettings, MediaConfig, PersistenceConfig, SceneConfig,
    ScoringConfig, Settings, SttSettings, StorageConfig, TextTilingConfig,
};
