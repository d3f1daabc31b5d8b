//! Configuration types for the Tonal engine and server

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::model::{ModelRole, ModelSource};

/// Top-level configuration, optionally loaded from the file named by `TONAL_CONFIG`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl AppConfig {
    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&raw)
    }

    /// File (if any) plus environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match non_empty_env("TONAL_CONFIG") {
            Some(path) => {
                info!("Loading configuration from {}", path);
                Self::from_file(Path::new(&path))?
            }
            None => Self::default(),
        };
        config.apply_env(non_empty_env);
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("TONAL_MODELS_DIR") {
            self.engine.models_dir = PathBuf::from(dir);
        }
        if let Some(device) = lookup("TONAL_DEVICE") {
            self.engine.device = device;
        }
        if let Some(dtype) = lookup("TONAL_DTYPE") {
            self.engine.dtype = Some(dtype);
        }
        if let Some(offline) = lookup("TONAL_OFFLINE") {
            self.engine.offline = matches!(
                offline.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        if let Some(endpoint) = lookup("HF_ENDPOINT") {
            self.engine.hf_endpoint = endpoint;
        }
        if let Some(token) = lookup("HF_TOKEN") {
            self.engine.hf_token = Some(token);
        }
        if let Some(repo) = lookup("TONAL_TONE_MODEL") {
            self.engine.models.tone_analyzer.repo_id = repo;
        }
        if let Some(repo) = lookup("TONAL_OCEAN_MODEL") {
            self.engine.models.ocean_analyzer.repo_id = repo;
        }
        if let Some(repo) = lookup("TONAL_REWRITER_MODEL") {
            self.engine.models.rewriter.repo_id = repo;
        }

        if let Some(host) = lookup("TONAL_HOST") {
            self.server.host = host;
        }
        if let Some(raw) = lookup("TONAL_PORT") {
            match raw.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!(
                    "Invalid TONAL_PORT='{}', keeping {}",
                    raw, self.server.port
                ),
            }
        }
        if let Some(raw) = lookup("MAX_CONCURRENT_REQUESTS") {
            match raw.parse::<usize>() {
                Ok(n) if n > 0 => self.server.max_concurrent_requests = n,
                _ => warn!("Invalid MAX_CONCURRENT_REQUESTS='{}', ignoring", raw),
            }
        }
        if let Some(raw) = lookup("REQUEST_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(n) if n > 0 => self.server.request_timeout_secs = n,
                _ => warn!("Invalid REQUEST_TIMEOUT_SECS='{}', ignoring", raw),
            }
        }
    }
}

/// Main engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory to store downloaded models
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Device preference: auto, cpu, cuda or metal
    #[serde(default = "default_device")]
    pub device: String,

    /// Compute dtype preference (f32, f16, bf16)
    #[serde(default)]
    pub dtype: Option<String>,

    /// Never touch the network; models must already be on disk
    #[serde(default)]
    pub offline: bool,

    #[serde(default = "default_hf_endpoint")]
    pub hf_endpoint: String,

    #[serde(default)]
    pub hf_token: Option<String>,

    /// Longest tokenized input fed to any model
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,

    #[serde(default)]
    pub models: ModelSources,

    #[serde(default)]
    pub generation: GenerationConfig,

    /// Tone classifier class id (decimal string) to display name
    #[serde(default = "default_tone_labels")]
    pub tone_labels: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            device: default_device(),
            dtype: None,
            offline: false,
            hf_endpoint: default_hf_endpoint(),
            hf_token: None,
            max_input_tokens: default_max_input_tokens(),
            models: ModelSources::default(),
            generation: GenerationConfig::default(),
            tone_labels: default_tone_labels(),
        }
    }
}

/// Per-role model sources
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelSources {
    #[serde(default = "tone_source")]
    pub tone_analyzer: ModelSource,

    #[serde(default = "ocean_source")]
    pub ocean_analyzer: ModelSource,

    #[serde(default = "rewriter_source")]
    pub rewriter: ModelSource,
}

impl ModelSources {
    pub fn get(&self, role: ModelRole) -> &ModelSource {
        match role {
            ModelRole::ToneAnalyzer => &self.tone_analyzer,
            ModelRole::OceanAnalyzer => &self.ocean_analyzer,
            ModelRole::Rewriter => &self.rewriter,
        }
    }
}

impl Default for ModelSources {
    fn default() -> Self {
        Self {
            tone_analyzer: tone_source(),
            ocean_analyzer: ocean_source(),
            rewriter: rewriter_source(),
        }
    }
}

fn tone_source() -> ModelSource {
    ModelSource::for_role(ModelRole::ToneAnalyzer)
}

fn ocean_source() -> ModelSource {
    ModelSource::for_role(ModelRole::OceanAnalyzer)
}

fn rewriter_source() -> ModelSource {
    ModelSource::for_role(ModelRole::Rewriter)
}

/// Beam search settings for the rewriter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationConfig {
    /// Maximum decoder length, counting the decoder start token
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    #[serde(default = "default_num_beams")]
    pub num_beams: usize,

    /// Stop once `num_beams` finished hypotheses exist
    #[serde(default = "default_early_stopping")]
    pub early_stopping: bool,

    #[serde(default = "default_length_penalty")]
    pub length_penalty: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            num_beams: default_num_beams(),
            early_stopping: default_early_stopping(),
            length_penalty: default_length_penalty(),
        }
    }
}

fn default_models_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tonal")
        .join("models")
}

fn default_device() -> String {
    "auto".to_string()
}

fn default_hf_endpoint() -> String {
    "https://huggingface.co".to_string()
}

fn default_max_input_tokens() -> usize {
    512
}

fn default_max_length() -> usize {
    256
}

fn default_num_beams() -> usize {
    5
}

fn default_early_stopping() -> bool {
    true
}

fn default_length_penalty() -> f32 {
    1.0
}

pub fn default_tone_labels() -> BTreeMap<String, String> {
    [("0", "Positive"), ("1", "Agitated"), ("2", "Inquisitive"), ("3", "Casual")]
        .into_iter()
        .map(|(id, label)| (id.to_string(), label.to_string()))
        .collect()
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            max_concurrent_requests: default_max_concurrent_requests(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.is_empty() || self.cors_origins.iter().any(|o| o == "*")
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_max_concurrent_requests() -> usize {
    get_num_cpus().max(1) * 2
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn get_num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_rewrite_settings() {
        let config = AppConfig::default();
        assert_eq!(config.engine.generation.max_length, 256);
        assert_eq!(config.engine.generation.num_beams, 5);
        assert!(config.engine.generation.early_stopping);
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.server.allows_any_origin());
        assert_eq!(config.engine.tone_labels.get("1").unwrap(), "Agitated");
    }

    #[test]
    fn parses_partial_toml() {
        let config = AppConfig::from_toml_str(
            r#"
[engine]
models_dir = "/srv/models"
offline = true

[engine.models.rewriter]
repo_id = "acme/t5-rewriter"
local_path = "/srv/rewriter"

[engine.generation]
num_beams = 3

[engine.tone_labels]
0 = "Warm"

[server]
port = 9000
cors_origins = ["https://app.example.com"]
"#,
        )
        .unwrap();

        assert_eq!(config.engine.models_dir, PathBuf::from("/srv/models"));
        assert!(config.engine.offline);
        assert_eq!(config.engine.models.rewriter.repo_id, "acme/t5-rewriter");
        assert_eq!(config.engine.models.rewriter.revision, "main");
        assert_eq!(
            config.engine.models.rewriter.local_path,
            Some(PathBuf::from("/srv/rewriter"))
        );
        assert_eq!(
            config.engine.models.tone_analyzer.repo_id,
            "goks24/platinum-tone-analyzer"
        );
        assert_eq!(config.engine.generation.num_beams, 3);
        assert_eq!(config.engine.generation.max_length, 256);
        assert_eq!(config.engine.tone_labels.len(), 1);
        assert_eq!(config.server.port, 9000);
        assert!(!config.server.allows_any_origin());
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            AppConfig::from_toml_str("[server\nport = 1"),
            Err(Error::Toml(_))
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config.apply_env(lookup_from(&[
            ("TONAL_PORT", "8081"),
            ("TONAL_HOST", "127.0.0.1"),
            ("TONAL_OFFLINE", "true"),
            ("TONAL_OCEAN_MODEL", "acme/ocean"),
            ("HF_TOKEN", "secret"),
        ]));

        assert_eq!(config.server.bind_addr(), "127.0.0.1:8081");
        assert!(config.engine.offline);
        assert_eq!(config.engine.models.ocean_analyzer.repo_id, "acme/ocean");
        assert_eq!(config.engine.hf_token.as_deref(), Some("secret"));
    }

    #[test]
    fn invalid_port_keeps_previous_value() {
        let mut config = AppConfig::default();
        config.apply_env(lookup_from(&[
            ("TONAL_PORT", "not-a-port"),
            ("MAX_CONCURRENT_REQUESTS", "0"),
        ]));
        assert_eq!(config.server.port, 5000);
        assert!(config.server.max_concurrent_requests > 0);
    }
}
