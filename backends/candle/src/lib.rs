#[cfg(feature = "accelerate")]
extern crate accelerate_src;
#[cfg(feature = "mkl")]
extern crate intel_mkl_src;

mod bert;

use crate::bert::{BertCrossEncoder, MeanPooledBert};
use candle::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::Config;
use std::path::Path;
use text_retrieval_backend_core::{Backend, BackendError, Embedding, ModelType};
use tokenizers::{EncodeInput, Encoding, PaddingParams, Tokenizer, TruncationParams};

/// Maximum sequence length fed to the encoder, longer inputs are truncated
pub const MAX_SEQ_LEN: usize = 512;

enum Model {
    Embedding(MeanPooledBert),
    Reranker(BertCrossEncoder),
}

pub struct CandleBackend {
    device: Device,
    tokenizer: Tokenizer,
    model: Model,
}

impl CandleBackend {
    pub fn new(
        model_path: &Path,
        dtype: String,
        model_type: ModelType,
    ) -> Result<Self, BackendError> {
        // Load config
        let config: String = std::fs::read_to_string(model_path.join("config.json"))
            .map_err(|err| BackendError::Start(err.to_string()))?;
        let raw: serde_json::Value =
            serde_json::from_str(&config).map_err(|err| BackendError::Start(err.to_string()))?;

        let architecture = raw.get("model_type").and_then(|v| v.as_str());
        if architecture != Some("bert") {
            return Err(BackendError::Start(format!(
                "Model {architecture:?} is not supported"
            )));
        }
        if model_type == ModelType::Reranker {
            let num_labels = raw
                .get("id2label")
                .and_then(|v| v.as_object())
                .map_or(1, |labels| labels.len());
            if num_labels != 1 {
                return Err(BackendError::Start(format!(
                    "Reranker must have a single output label, found {num_labels}"
                )));
            }
        }
        let config: Config =
            serde_json::from_str(&config).map_err(|err| BackendError::Start(err.to_string()))?;

        // Get candle device
        let device = if cfg!(feature = "metal") {
            Device::new_metal(0)
        } else {
            Device::cuda_if_available(0)
        }
        .s()?;

        let dtype = match dtype.as_str() {
            "float32" => DType::F32,
            "float16" => DType::F16,
            _ => {
                return Err(BackendError::Start(format!(
                    "DType {dtype} is not supported"
                )))
            }
        };

        let weights = model_path.join("model.safetensors");
        if !weights.exists() {
            return Err(BackendError::Start(format!(
                "Missing model.safetensors in {}",
                model_path.display()
            )));
        }
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], dtype, &device) }.s()?;

        let model = match model_type {
            ModelType::Embedding => {
                tracing::info!("Starting Bert embedding model on {device:?}");
                Model::Embedding(MeanPooledBert::load(vb, &config).s()?)
            }
            ModelType::Reranker => {
                tracing::info!("Starting Bert cross-encoder on {device:?}");
                Model::Reranker(BertCrossEncoder::load(vb, &config).s()?)
            }
        };

        let tokenizer = load_tokenizer(model_path)?;

        Ok(Self {
            device,
            tokenizer,
            model,
        })
    }

    fn encode<'s, E>(&self, inputs: Vec<E>) -> Result<(Tensor, Tensor, Tensor), BackendError>
    where
        E: Into<EncodeInput<'s>> + Send,
    {
        let encodings = self
            .tokenizer
            .encode_batch(inputs, true)
            .map_err(|err| BackendError::Inference(format!("tokenization failed: {err}")))?;

        let batch_size = encodings.len();
        let seq_len = encodings.first().map_or(0, |e| e.len());

        let collect = |f: fn(&Encoding) -> &[u32]| -> Vec<u32> {
            encodings
                .iter()
                .flat_map(|e| f(e).iter().copied())
                .collect()
        };
        let input_ids = collect(Encoding::get_ids);
        let type_ids = collect(Encoding::get_type_ids);
        let attention_mask = collect(Encoding::get_attention_mask);

        let shape = (batch_size, seq_len);
        Ok((
            Tensor::from_vec(input_ids, shape, &self.device).e()?,
            Tensor::from_vec(type_ids, shape, &self.device).e()?,
            Tensor::from_vec(attention_mask, shape, &self.device).e()?,
        ))
    }
}

impl Backend for CandleBackend {
    fn health(&self) -> Result<(), BackendError> {
        Ok(())
    }

    fn embed(&self, texts: Vec<String>) -> Result<Vec<Embedding>, BackendError> {
        let Model::Embedding(model) = &self.model else {
            return Err(BackendError::Inference(
                "Model is not an embedding model".to_string(),
            ));
        };
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let (input_ids, type_ids, attention_mask) = self.encode(texts)?;
        model
            .forward(&input_ids, &type_ids, &attention_mask)
            .e()?
            .to_vec2()
            .e()
    }

    fn predict(&self, pairs: Vec<(String, String)>) -> Result<Vec<f32>, BackendError> {
        let Model::Reranker(model) = &self.model else {
            return Err(BackendError::Inference(
                "Model is not a re-ranker model".to_string(),
            ));
        };
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let (input_ids, type_ids, attention_mask) = self.encode(pairs)?;
        model
            .forward(&input_ids, &type_ids, &attention_mask)
            .e()?
            .to_vec1()
            .e()
    }
}

fn load_tokenizer(model_path: &Path) -> Result<Tokenizer, BackendError> {
    let mut tokenizer = Tokenizer::from_file(model_path.join("tokenizer.json"))
        .map_err(|err| BackendError::Start(format!("Failed to load tokenizer: {err}")))?;

    if tokenizer.get_padding().is_none() {
        tokenizer.with_padding(Some(PaddingParams::default()));
    }
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: MAX_SEQ_LEN,
            ..Default::default()
        }))
        .map_err(|err| BackendError::Start(format!("Failed to configure truncation: {err}")))?;

    Ok(tokenizer)
}

pub trait WrapErr<O> {
    fn s(self) -> Result<O, BackendError>;
    fn e(self) -> Result<O, BackendError>;
}

impl<O> WrapErr<O> for Result<O, candle::Error> {
    fn s(self) -> Result<O, BackendError> {
        self.map_err(|e| BackendError::Start(e.to_string()))
    }
    fn e(self) -> Result<O, BackendError> {
        self.map_err(|e| BackendError::Inference(e.to_string()))
    }
}
