//! Checkpoint discovery and `VarBuilder` construction.

use std::fs;
use std::path::{Path, PathBuf};

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// Open the weights in `model_dir`: sharded safetensors, a single
/// safetensors file, or a PyTorch pickle, in that order.
pub fn load_var_builder(
    model_dir: &Path,
    dtype: DType,
    device: &Device,
) -> Result<VarBuilder<'static>> {
    let index_path = model_dir.join("model.safetensors.index.json");
    if index_path.exists() {
        let shard_paths = shard_paths(model_dir, &index_path)?;
        debug!("Loading {} safetensors shards", shard_paths.len());
        return Ok(unsafe { VarBuilder::from_mmaped_safetensors(&shard_paths, dtype, device)? });
    }

    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors], dtype, device)? });
    }

    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        debug!("Loading PyTorch checkpoint {:?}", pickle);
        return Ok(VarBuilder::from_pth(&pickle, dtype, device)?);
    }

    Err(Error::ModelLoadError(format!(
        "No model weights found in {:?}",
        model_dir
    )))
}

fn shard_paths(model_dir: &Path, index_path: &Path) -> Result<Vec<PathBuf>> {
    let index_data = fs::read_to_string(index_path)?;
    let index: Value = serde_json::from_str(&index_data)?;
    let weight_map = index
        .get("weight_map")
        .and_then(|m| m.as_object())
        .ok_or_else(|| {
            Error::ModelLoadError("Invalid model.safetensors.index.json format".to_string())
        })?;

    let mut shard_files: Vec<String> = weight_map
        .values()
        .filter_map(|v| v.as_str().map(String::from))
        .collect();
    shard_files.sort();
    shard_files.dedup();

    Ok(shard_files.iter().map(|f| model_dir.join(f)).collect())
}

/// Read and parse `config.json`.
pub fn read_config_json(model_dir: &Path) -> Result<Value> {
    let config_path = model_dir.join("config.json");
    let config_str = fs::read_to_string(&config_path).map_err(|e| {
        Error::ModelLoadError(format!("Failed to read {:?}: {}", config_path, e))
    })?;
    Ok(serde_json::from_str(&config_str)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn shards_are_deduplicated_and_sorted() {
        let dir = TempDir::new().unwrap();
        let index = dir.path().join("model.safetensors.index.json");
        fs::write(
            &index,
            r#"{"weight_map": {"a": "model-00002.safetensors", "b": "model-00001.safetensors", "c": "model-00002.safetensors"}}"#,
        )
        .unwrap();

        let paths = shard_paths(dir.path(), &index).unwrap();
        assert_eq!(
            paths,
            vec![
                dir.path().join("model-00001.safetensors"),
                dir.path().join("model-00002.safetensors"),
            ]
        );
    }

    #[test]
    fn missing_weights_fail_to_load() {
        let dir = TempDir::new().unwrap();
        let err = load_var_builder(dir.path(), DType::F32, &Device::Cpu).err().unwrap();
        assert!(matches!(err, Error::ModelLoadError(_)));
    }
}
