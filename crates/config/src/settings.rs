//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level settings for one worker process
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub assembly: AssemblyConfig,

    #[serde(default)]
    pub text_tiling: TextTilingConfig,

    #[serde(default)]
    pub scene: SceneConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub stt: SttSettings,
}

/// Demux, sampling and chunking knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Stop demuxing past this much media time, seconds
    #[serde(default = "default_max_stream_duration")]
    pub max_stream_duration_secs: f64,

    /// Kept frames per second of media time
    #[serde(default = "default_frame_sample_rate")]
    pub video_frame_sample_rate: f64,

    /// Target seconds per audio chunk
    #[serde(default = "default_audio_chunk_secs")]
    pub audio_chunk_secs: f64,

    /// Resample target for audio chunks, Hz
    #[serde(default = "default_target_sample_rate")]
    pub target_sample_rate: u32,
}

fn default_max_stream_duration() -> f64 {
    10_800.0
}

fn default_frame_sample_rate() -> f64 {
    2.0
}

fn default_audio_chunk_secs() -> f64 {
    5.0
}

fn default_target_sample_rate() -> u32 {
    16_000
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_stream_duration_secs: default_max_stream_duration(),
            video_frame_sample_rate: default_frame_sample_rate(),
            audio_chunk_secs: default_audio_chunk_secs(),
            target_sample_rate: default_target_sample_rate(),
        }
    }
}

/// Candidate-window scoring knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Scoring window length, seconds
    #[serde(default = "default_candidate_slice")]
    pub candidate_slice_secs: f64,

    /// Weight of the motion term in the saliency score
    #[serde(default = "default_alpha_motion")]
    pub alpha_motion: f64,

    /// Weight of the loudness term in the saliency score
    #[serde(default = "default_alpha_audio")]
    pub alpha_audio: f64,
}

fn default_candidate_slice() -> f64 {
    5.0
}

fn default_alpha_motion() -> f64 {
    0.7
}

fn default_alpha_audio() -> f64 {
    0.3
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            candidate_slice_secs: default_candidate_slice(),
            alpha_motion: default_alpha_motion(),
            alpha_audio: default_alpha_audio(),
        }
    }
}

/// Assembler and refinement knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyConfig {
    /// Seconds of score rows consumed per assembler iteration
    #[serde(default = "default_highlight_chunk")]
    pub highlight_chunk_secs: f64,

    /// Duration guard, seconds
    #[serde(default = "default_highlight_min_len")]
    pub highlight_min_len: f64,

    /// Duration guard, seconds
    #[serde(default = "default_highlight_max_len")]
    pub highlight_max_len: f64,

    /// Edge clamp relative to the original window, seconds
    #[serde(default = "default_max_edge_shift")]
    pub max_edge_shift_seconds: f64,

    /// Master switch for snap + refine
    #[serde(default = "default_agentic_enabled")]
    pub agentic_refinement_enabled: bool,
}

fn default_highlight_chunk() -> f64 {
    300.0
}

fn default_highlight_min_len() -> f64 {
    4.0
}

fn default_highlight_max_len() -> f64 {
    12.0
}

fn default_max_edge_shift() -> f64 {
    2.0
}

fn default_agentic_enabled() -> bool {
    true
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            highlight_chunk_secs: default_highlight_chunk(),
            highlight_min_len: default_highlight_min_len(),
            highlight_max_len: default_highlight_max_len(),
            max_edge_shift_seconds: default_max_edge_shift(),
            agentic_refinement_enabled: default_agentic_enabled(),
        }
    }
}

/// Lexical topic segmentation knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextTilingConfig {
    #[serde(default = "default_tiling_block")]
    pub block_size: usize,

    #[serde(default = "default_tiling_step")]
    pub step: usize,

    #[serde(default = "default_tiling_smooth")]
    pub smoothing_width: usize,

    #[serde(default = "default_tiling_cutoff")]
    pub cutoff_std: f64,
}

fn default_tiling_block() -> usize {
    20
}

fn default_tiling_step() -> usize {
    10
}

fn default_tiling_smooth() -> usize {
    2
}

fn default_tiling_cutoff() -> f64 {
    0.5
}

impl Default for TextTilingConfig {
    fn default() -> Self {
        Self {
            block_size: default_tiling_block(),
            step: default_tiling_step(),
            smoothing_width: default_tiling_smooth(),
            cutoff_std: default_tiling_cutoff(),
        }
    }
}

/// Scene-cut detector knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Bhattacharyya distance above which a cut is declared
    #[serde(default = "default_scene_threshold")]
    pub threshold: f64,

    /// Minimum time between cuts, seconds
    #[serde(default = "default_min_scene_len")]
    pub min_scene_len_secs: f64,
}

fn default_scene_threshold() -> f64 {
    0.5
}

fn default_min_scene_len() -> f64 {
    1.0
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            threshold: default_scene_threshold(),
            min_scene_len_secs: default_min_scene_len(),
        }
    }
}

/// Local artifact storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Artifacts live under `<base_dir>/<stream_id>/`
    #[serde(default = "default_base_dir")]
    pub base_dir: String,
}

fn default_base_dir() -> String {
    "./data".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
        }
    }
}

/// ScyllaDB connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_scylla_hosts")]
    pub hosts: Vec<String>,

    #[serde(default = "default_keyspace")]
    pub keyspace: String,

    #[serde(default = "default_replication_factor")]
    pub replication_factor: u8,
}

fn default_scylla_hosts() -> Vec<String> {
    std::env::var("SCYLLA_HOSTS")
        .map(|s| s.split(',').map(|h| h.trim().to_string()).collect())
        .unwrap_or_else(|_| vec!["127.0.0.1:9042".to_string()])
}

fn default_keyspace() -> String {
    std::env::var("SCYLLA_KEYSPACE").unwrap_or_else(|_| "highlight_pipeline".to_string())
}

fn default_replication_factor() -> u8 {
    1
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            hosts: default_scylla_hosts(),
            keyspace: default_keyspace(),
            replication_factor: default_replication_factor(),
        }
    }
}

/// Captioner / grouper / refiner endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Read from the environment, never from files
    #[serde(default = "default_llm_api_key")]
    pub api_key: String,

    #[serde(default = "default_llm_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_llm_model() -> String {
    "claude-3-7-sonnet-20250219".to_string()
}

fn default_llm_api_key() -> String {
    std::env::var("ANTHROPIC_API_KEY").unwrap_or_default()
}

fn default_llm_attempts() -> u32 {
    3
}

fn default_llm_timeout() -> u64 {
    300
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            api_key: default_llm_api_key(),
            max_attempts: default_llm_attempts(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

/// Streaming speech-to-text endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttSettings {
    #[serde(default = "default_stt_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_language_code")]
    pub language_code: String,

    #[serde(default = "default_stt_attempts")]
    pub max_attempts: u32,
}

fn default_stt_endpoint() -> String {
    std::env::var("STT_ENDPOINT").unwrap_or_else(|_| "http://127.0.0.1:8090".to_string())
}

fn default_language_code() -> String {
    "en-US".to_string()
}

fn default_stt_attempts() -> u32 {
    3
}

impl Default for SttSettings {
    fn default() -> Self {
        Self {
            endpoint: default_stt_endpoint(),
            language_code: default_language_code(),
            max_attempts: default_stt_attempts(),
        }
    }
}

impl Settings {
    /// Load settings from `<path>.json` (optional) and the environment.
    ///
    /// Environment keys use a double-underscore separator, e.g.
    /// `HIGHLIGHT__MEDIA__MAX_STREAM_DURATION_SECS=600`.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        let config = builder
            .add_source(
                Environment::with_prefix("HIGHLIGHT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.media.video_frame_sample_rate <= 0.0 {
            return Err(ConfigError::Invalid(
                "media.video_frame_sample_rate must be positive".to_string(),
            ));
        }
        if self.media.audio_chunk_secs <= 0.0 {
            return Err(ConfigError::Invalid(
                "media.audio_chunk_secs must be positive".to_string(),
            ));
        }
        if self.scoring.candidate_slice_secs <= 0.0 {
            return Err(ConfigError::Invalid(
                "scoring.candidate_slice_secs must be positive".to_string(),
            ));
        }
        if self.assembly.highlight_min_len > self.assembly.highlight_max_len {
            return Err(ConfigError::Invalid(
                "assembly.highlight_min_len exceeds highlight_max_len".to_string(),
            ));
        }
        if self.text_tiling.step == 0 || self.text_tiling.block_size == 0 {
            return Err(ConfigError::Invalid(
                "text_tiling.block_size and step must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.media.audio_chunk_secs, 5.0);
        assert_eq!(settings.scoring.candidate_slice_secs, 5.0);
        assert_eq!(settings.assembly.highlight_chunk_secs, 300.0);
        assert_eq!(settings.assembly.highlight_min_len, 4.0);
        assert_eq!(settings.assembly.highlight_max_len, 12.0);
        assert!(settings.assembly.agentic_refinement_enabled);
        assert_eq!(settings.text_tiling.block_size, 20);
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("HIGHLIGHT__MEDIA__MAX_STREAM_DURATION_SECS", "600");
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.media.max_stream_duration_secs, 600.0);
        std::env::remove_var("HIGHLIGHT__MEDIA__MAX_STREAM_DURATION_SECS");
    }

    #[test]
    fn test_invalid_duration_bounds_rejected() {
        let mut settings = Settings::default();
        settings.assembly.highlight_min_len = 20.0;
        assert!(settings.validate().is_err());
    }
}
