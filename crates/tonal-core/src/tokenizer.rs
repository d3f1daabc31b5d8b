//! Text tokenization backed by HuggingFace `tokenizers`

use std::path::Path;

use tokenizers::Tokenizer as HfTokenizer;
use tokenizers::TruncationParams;
use tracing::debug;

use crate::error::{Error, Result};

pub struct Tokenizer {
    inner: HfTokenizer,
}

impl Tokenizer {
    pub fn from_path(model_dir: &Path) -> Result<Self> {
        let tokenizer_path = model_dir.join("tokenizer.json");
        if !tokenizer_path.exists() {
            return Err(Error::TokenizationError(format!(
                "No tokenizer.json found in {:?}",
                model_dir
            )));
        }

        let mut inner = HfTokenizer::from_file(&tokenizer_path)
            .map_err(|e| Error::TokenizationError(e.to_string()))?;
        // Requests are single sequences; padding would only add masked positions.
        inner.with_padding(None);
        debug!("Loaded tokenizer from {:?}", tokenizer_path);
        Ok(Self { inner })
    }

    /// Cap encoded sequences at `max_length` tokens, special tokens included.
    pub fn with_max_length(mut self, max_length: usize) -> Result<Self> {
        self.inner
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| Error::TokenizationError(e.to_string()))?;
        Ok(self)
    }

    /// Encode for a model forward pass: special tokens added, truncation applied.
    pub fn encode_for_model(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| Error::TokenizationError(e.to_string()))?;
        let ids = encoding.get_ids().to_vec();
        if ids.is_empty() {
            return Err(Error::TokenizationError(
                "Input produced no tokens".to_string(),
            ));
        }
        Ok(ids)
    }

    /// Decode ids, dropping special tokens.
    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner
            .decode(ids, true)
            .map_err(|e| Error::TokenizationError(e.to_string()))
    }
}
