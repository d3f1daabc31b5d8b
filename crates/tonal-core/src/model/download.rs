//! Model downloading from HuggingFace Hub

use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::model::info::{ModelRole, ModelSource};

const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

/// Files every model directory needs
const REQUIRED_FILES: &[&str] = &["config.json", "tokenizer.json"];

/// Weight files in order of preference
const WEIGHT_FILES: &[&str] = &["model.safetensors", "pytorch_model.bin"];

/// Fetched when present, ignored when the repo lacks them
const OPTIONAL_FILES: &[&str] = &[
    "tokenizer_config.json",
    "special_tokens_map.json",
    "generation_config.json",
    "vocab.txt",
    "spiece.model",
];

/// Model downloader for HuggingFace Hub
pub struct ModelDownloader {
    pub models_dir: PathBuf,
    endpoint: String,
    token: Option<String>,
    http_client: Client,
}

impl ModelDownloader {
    /// Create a new downloader
    pub fn new(models_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&models_dir)?;

        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(3600)) // large weight files
            .build()
            .map_err(|e| Error::DownloadError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            models_dir,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            http_client,
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Ok(Self::new(config.models_dir.clone())?
            .with_endpoint(&config.hf_endpoint)
            .with_token(config.hf_token.clone()))
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Download one file. Returns `Ok(false)` when the repo has no such file.
    fn download_file_http(
        &self,
        source: &ModelSource,
        filename: &str,
        dest: &Path,
    ) -> Result<bool> {
        let url = format!(
            "{}/{}/resolve/{}/{}",
            self.endpoint, source.repo_id, source.revision, filename
        );
        debug!("Downloading from URL: {}", url);

        let mut request = self
            .http_client
            .get(&url)
            .header("User-Agent", concat!("tonal/", env!("CARGO_PKG_VERSION")));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let mut response = request
            .send()
            .map_err(|e| Error::DownloadError(format!("HTTP request failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(Error::DownloadError(format!(
                "HTTP {} for {}",
                response.status(),
                url
            )));
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Write beside the target first so an interrupted download never looks complete.
        let partial = dest.with_extension("part");
        let mut file = File::create(&partial)?;
        let written = response
            .copy_to(&mut file)
            .map_err(|e| Error::DownloadError(format!("Failed to read response: {}", e)))?;
        file.sync_all()?;
        std::fs::rename(&partial, dest)?;

        debug!("Downloaded {} bytes to {:?}", written, dest);
        Ok(true)
    }

    /// Get the local path for a repository
    pub fn model_path(&self, repo_id: &str) -> PathBuf {
        self.models_dir.join(ModelRole::dir_name_for(repo_id))
    }

    /// Check if a directory holds a loadable model
    pub fn is_downloaded(path: &Path) -> bool {
        if !path.join("config.json").exists() {
            return false;
        }

        let has_tokenizer = path.join("tokenizer.json").exists();
        let has_weights = WEIGHT_FILES.iter().any(|f| path.join(f).exists())
            || path.join("model.safetensors.index.json").exists();

        has_tokenizer && has_weights
    }

    /// Download a model from HuggingFace Hub
    pub fn download(&self, source: &ModelSource) -> Result<PathBuf> {
        let local_dir = self.model_path(&source.repo_id);
        std::fs::create_dir_all(&local_dir)?;
        info!("Downloading {} to {:?}", source.repo_id, local_dir);

        for file in REQUIRED_FILES {
            let dest = local_dir.join(file);
            if dest.exists() {
                debug!("File already exists: {:?}", dest);
                continue;
            }
            if !self.download_file_http(source, file, &dest)? {
                return Err(Error::DownloadError(format!(
                    "{} has no {}",
                    source.repo_id, file
                )));
            }
        }

        let mut has_weights = WEIGHT_FILES.iter().any(|f| local_dir.join(f).exists());
        for file in WEIGHT_FILES {
            if has_weights {
                break;
            }
            has_weights = self.download_file_http(source, file, &local_dir.join(file))?;
        }
        if !has_weights {
            return Err(Error::DownloadError(format!(
                "{} has no model weights ({})",
                source.repo_id,
                WEIGHT_FILES.join(" or ")
            )));
        }

        for file in OPTIONAL_FILES {
            let dest = local_dir.join(file);
            if dest.exists() {
                continue;
            }
            match self.download_file_http(source, file, &dest) {
                Ok(true) => debug!("Downloaded optional {}", file),
                Ok(false) => debug!("{} has no {}", source.repo_id, file),
                Err(e) => warn!("Failed to download {}: {}", file, e),
            }
        }

        info!("Model downloaded to {:?}", local_dir);
        Ok(local_dir)
    }

    /// Find a model directory for a role, downloading it unless `offline`.
    pub fn resolve(&self, role: ModelRole, source: &ModelSource, offline: bool) -> Result<PathBuf> {
        if let Some(path) = &source.local_path {
            if Self::is_downloaded(path) {
                return Ok(path.clone());
            }
            return Err(Error::ModelNotFound(format!(
                "{}: {:?} is not a complete model directory",
                role, path
            )));
        }

        let cached = self.model_path(&source.repo_id);
        if Self::is_downloaded(&cached) {
            debug!("Using cached {} at {:?}", role, cached);
            return Ok(cached);
        }

        if offline {
            return Err(Error::ModelNotFound(format!(
                "{} ({}) is not in {:?} and offline mode is on",
                role, source.repo_id, self.models_dir
            )));
        }

        self.download(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    fn source(repo: &str) -> ModelSource {
        ModelSource {
            repo_id: repo.to_string(),
            revision: "main".to_string(),
            local_path: None,
        }
    }

    fn downloader(dir: &TempDir, server: &MockServer) -> ModelDownloader {
        ModelDownloader::new(dir.path().to_path_buf())
            .unwrap()
            .with_endpoint(&server.base_url())
    }

    #[test]
    fn downloads_required_files_and_falls_back_to_bin_weights() {
        let server = MockServer::start();
        let dir = TempDir::new().unwrap();

        let config = server.mock(|when, then| {
            when.method(GET).path("/acme/clf/resolve/main/config.json");
            then.status(200).body("{\"model_type\":\"bert\"}");
        });
        server.mock(|when, then| {
            when.method(GET).path("/acme/clf/resolve/main/tokenizer.json");
            then.status(200).body("{}");
        });
        let bin = server.mock(|when, then| {
            when.method(GET).path("/acme/clf/resolve/main/pytorch_model.bin");
            then.status(200).body("weights");
        });

        let path = downloader(&dir, &server).download(&source("acme/clf")).unwrap();

        config.assert();
        bin.assert();
        assert_eq!(path, dir.path().join("acme--clf"));
        assert_eq!(fs::read(path.join("pytorch_model.bin")).unwrap(), b"weights");
        assert!(!path.join("pytorch_model.part").exists());
        assert!(!path.join("model.safetensors").exists());
        assert!(!path.join("vocab.txt").exists());
        assert!(ModelDownloader::is_downloaded(&path));
    }

    #[test]
    fn skips_files_already_present() {
        let server = MockServer::start();
        let dir = TempDir::new().unwrap();
        let model_dir = dir.path().join("acme--clf");
        std::fs::create_dir_all(&model_dir).unwrap();
        for file in ["config.json", "tokenizer.json", "model.safetensors"] {
            std::fs::write(model_dir.join(file), b"{}").unwrap();
        }

        let config = server.mock(|when, then| {
            when.method(GET).path("/acme/clf/resolve/main/config.json");
            then.status(200).body("{}");
        });

        downloader(&dir, &server).download(&source("acme/clf")).unwrap();
        config.assert_hits(0);
    }

    #[test]
    fn missing_tokenizer_is_an_error() {
        let server = MockServer::start();
        let dir = TempDir::new().unwrap();
        server.mock(|when, then| {
            when.method(GET).path("/acme/clf/resolve/main/config.json");
            then.status(200).body("{}");
        });

        let err = downloader(&dir, &server)
            .download(&source("acme/clf"))
            .unwrap_err();
        assert!(matches!(err, Error::DownloadError(msg) if msg.contains("tokenizer.json")));
    }

    #[test]
    fn server_errors_surface() {
        let server = MockServer::start();
        let dir = TempDir::new().unwrap();
        server.mock(|when, then| {
            when.method(GET).path("/acme/clf/resolve/main/config.json");
            then.status(500);
        });

        let err = downloader(&dir, &server)
            .download(&source("acme/clf"))
            .unwrap_err();
        assert!(matches!(err, Error::DownloadError(msg) if msg.contains("500")));
    }

    #[test]
    fn sends_bearer_token() {
        let server = MockServer::start();
        let dir = TempDir::new().unwrap();
        for file in ["config.json", "tokenizer.json", "model.safetensors"] {
            server.mock(|when, then| {
                when.method(GET)
                    .path(format!("/acme/private/resolve/main/{file}"))
                    .header("authorization", "Bearer hf_secret");
                then.status(200).body("{}");
            });
        }

        let path = downloader(&dir, &server)
            .with_token(Some("hf_secret".to_string()))
            .download(&source("acme/private"))
            .unwrap();
        assert!(ModelDownloader::is_downloaded(&path));
    }

    #[test]
    fn resolve_offline_without_cache_fails() {
        let server = MockServer::start();
        let dir = TempDir::new().unwrap();
        let err = downloader(&dir, &server)
            .resolve(ModelRole::Rewriter, &source("acme/t5"), true)
            .unwrap_err();
        assert!(matches!(err, Error::ModelNotFound(_)));
    }

    #[test]
    fn resolve_prefers_local_path() {
        let server = MockServer::start();
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("custom");
        std::fs::create_dir_all(&local).unwrap();
        for file in ["config.json", "tokenizer.json", "model.safetensors"] {
            std::fs::write(local.join(file), b"{}").unwrap();
        }

        let mut src = source("acme/t5");
        src.local_path = Some(local.clone());
        let resolved = downloader(&dir, &server)
            .resolve(ModelRole::Rewriter, &src, false)
            .unwrap();
        assert_eq!(resolved, local);
    }
}
