//! BERT-family sequence classifier producing one relevance logit per pair.

use std::path::Path;
use std::sync::Arc;

use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config};
use tokenizers::Encoding;

use super::error::RerankerError;

/// Checkpoints nest the encoder under the architecture they were fine-tuned from.
const ENCODER_PREFIXES: [&str; 2] = ["bert", "roberta"];

struct Weights {
    encoder: BertModel,
    head: Linear,
}

#[derive(Clone)]
pub(crate) struct CrossEncoder {
    weights: Arc<Weights>,
    device: Device,
}

impl CrossEncoder {
    pub(crate) fn load(model_dir: &Path, device: Device) -> Result<Self, RerankerError> {
        let raw = std::fs::read_to_string(model_dir.join("config.json"))
            .map_err(|e| load_failed("config.json", e))?;
        let config: Config =
            serde_json::from_str(&raw).map_err(|e| load_failed("config.json", e))?;

        // SAFETY: the safetensors file must not change while it is mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(
                &[model_dir.join("model.safetensors")],
                DType::F32,
                &device,
            )
        }
        .map_err(|e| load_failed("model.safetensors", e))?;

        let prefix = ENCODER_PREFIXES
            .iter()
            .find(|p| vb.contains_tensor(&format!("{p}.embeddings.word_embeddings.weight")));
        let encoder = match prefix {
            Some(p) => BertModel::load(vb.pp(*p), &config),
            None => BertModel::load(vb.clone(), &config),
        }
        .map_err(|e| load_failed("encoder", e))?;
        let head = candle_nn::linear(config.hidden_size, 1, vb.pp("classifier"))
            .map_err(|e| load_failed("classifier head", e))?;

        Ok(Self {
            weights: Arc::new(Weights { encoder, head }),
            device,
        })
    }

    pub(crate) fn device(&self) -> &Device {
        &self.device
    }

    /// Raw logit for one tokenized (query, passage) pair, read off the `[CLS]` position.
    pub(crate) fn logit(&self, pair: &Encoding) -> Result<f32, RerankerError> {
        let row = |values: &[u32]| -> candle_core::Result<Tensor> {
            Tensor::new(values, &self.device)?.unsqueeze(0)
        };
        let input_ids = row(pair.get_ids())?;
        let type_ids = row(pair.get_type_ids())?;
        let mask = row(pair.get_attention_mask())?;

        let hidden = self
            .weights
            .encoder
            .forward(&input_ids, &type_ids, Some(&mask))?;
        let logits = self
            .weights
            .head
            .forward(&hidden.i((.., 0, ..))?)?
            .flatten_all()?
            .to_vec1::<f32>()?;

        logits
            .first()
            .copied()
            .ok_or_else(|| RerankerError::InferenceFailed {
                reason: "classifier returned no logits".to_string(),
            })
    }
}

fn load_failed(what: &str, err: impl std::fmt::Display) -> RerankerError {
    RerankerError::ModelLoadFailed {
        reason: format!("{what}: {err}"),
    }
}
