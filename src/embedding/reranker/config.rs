use std::path::PathBuf;

/// Token window of the cross-encoder; longer (fact, passage) pairs are truncated.
pub const MAX_SEQ_LEN: usize = 512;

#[derive(Debug, Clone)]
pub struct RerankerConfig {
    /// Directory with `config.json`, `model.safetensors` and `tokenizer.json`.
    /// `None` selects the lexical stub.
    pub model_path: Option<PathBuf>,

    pub max_seq_len: usize,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            max_seq_len: MAX_SEQ_LEN,
        }
    }
}

impl RerankerConfig {
    pub fn new<P: Into<PathBuf>>(model_path: P) -> Self {
        Self {
            model_path: Some(model_path.into()),
            ..Default::default()
        }
    }

    pub fn stub() -> Self {
        Self::default()
    }

    /// Builds a config from an optional model directory.
    pub fn from_path(model_path: Option<PathBuf>) -> Self {
        Self {
            model_path,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_seq_len == 0 {
            return Err("max_seq_len must be greater than zero".to_string());
        }

        if let Some(ref path) = self.model_path
            && path.as_os_str().is_empty()
        {
            return Err("model_path cannot be empty when provided".to_string());
        }

        Ok(())
    }
}
