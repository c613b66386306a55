use std::path::Path;

use tokenizers::{Tokenizer, TruncationParams};

use super::error::RerankerError;

/// Loads `tokenizer.json` from `model_dir`, truncating pairs to `max_len` tokens.
pub(crate) fn load_pair_tokenizer(
    model_dir: &Path,
    max_len: usize,
) -> Result<Tokenizer, RerankerError> {
    let path = model_dir.join("tokenizer.json");
    let mut tokenizer =
        Tokenizer::from_file(&path).map_err(|e| RerankerError::ModelLoadFailed {
            reason: format!("{}: {e}", path.display()),
        })?;

    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: max_len,
            ..Default::default()
        }))
        .map_err(|e| RerankerError::ModelLoadFailed {
            reason: format!("truncation: {e}"),
        })?;

    Ok(tokenizer)
}
