//! Model registry: resolves each role on disk and loads it off the async runtime.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::model::{ModelDownloader, ModelRole};
use crate::runtime::{TextClassifier, TextRewriter};

use super::architectures::{SequenceClassifier, T5Rewriter};
use super::device::DeviceProfile;

#[derive(Clone)]
pub struct ModelRegistry {
    config: Arc<EngineConfig>,
    device: DeviceProfile,
}

impl ModelRegistry {
    pub fn new(config: EngineConfig, device: DeviceProfile) -> Self {
        Self {
            config: Arc::new(config),
            device,
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.config.models_dir
    }

    /// Find or fetch the model directory for a role. Blocking.
    fn resolve_dir(config: &EngineConfig, role: ModelRole) -> Result<PathBuf> {
        let downloader = ModelDownloader::from_config(config)?;
        downloader.resolve(role, config.models.get(role), config.offline)
    }

    pub async fn load_classifier(&self, role: ModelRole) -> Result<Arc<dyn TextClassifier>> {
        if !role.is_classifier() {
            return Err(Error::InvalidInput(format!(
                "Model role {role} is not a classifier"
            )));
        }

        let config = self.config.clone();
        let device = self.device.clone();
        let model = tokio::task::spawn_blocking(move || {
            let model_dir = Self::resolve_dir(&config, role)?;
            info!("Loading {role} from {model_dir:?}");
            SequenceClassifier::load(
                &model_dir,
                device,
                config.dtype.as_deref(),
                config.max_input_tokens,
            )
        })
        .await
        .map_err(|e| Error::ModelLoadError(e.to_string()))??;

        Ok(Arc::new(model))
    }

    pub async fn load_rewriter(&self) -> Result<Arc<dyn TextRewriter>> {
        let role = ModelRole::Rewriter;
        let config = self.config.clone();
        let device = self.device.clone();
        let model = tokio::task::spawn_blocking(move || {
            let model_dir = Self::resolve_dir(&config, role)?;
            info!("Loading {role} from {model_dir:?}");
            T5Rewriter::load(
                &model_dir,
                device,
                config.dtype.as_deref(),
                config.max_input_tokens,
            )
        })
        .await
        .map_err(|e| Error::ModelLoadError(e.to_string()))??;

        Ok(Arc::new(model))
    }
}
