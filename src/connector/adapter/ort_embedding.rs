use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::application::EmbeddingProvider;
use crate::domain::{DomainError, EmbeddingConfig};

pub const DEFAULT_MODEL_ID: &str = "BAAI/bge-small-en-v1.5";
pub const DEFAULT_DIMENSIONS: usize = 384;
const DEFAULT_MAX_SEQ_LENGTH: usize = 512;
const BATCH_SIZE: usize = 32;

/// Sentence embeddings from a local ONNX model fetched from the HuggingFace hub.
/// Every failure surfaces as `EmbeddingUnavailable`.
pub struct OrtEmbedding {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    config: EmbeddingConfig,
}

impl OrtEmbedding {
    pub fn new(model_id: Option<&str>, dimensions: Option<usize>) -> Result<Self, DomainError> {
        let model_id = model_id.unwrap_or(DEFAULT_MODEL_ID);
        info!("Initializing ORT embedding provider with model: {}", model_id);

        let api = hf_hub::api::sync::ApiBuilder::new()
            .with_progress(false)
            .build()
            .map_err(|e| unavailable("Failed to create HF API", e))?;

        let repo = api.model(model_id.to_string());

        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| unavailable("Failed to download tokenizer", e))?;

        let model_path = repo
            .get("onnx/model.onnx")
            .or_else(|_| repo.get("model.onnx"))
            .map_err(|e| unavailable("Failed to download ONNX model", e))?;

        Self::from_paths(
            model_path,
            tokenizer_path,
            model_id,
            dimensions.unwrap_or(DEFAULT_DIMENSIONS),
        )
    }

    pub fn from_paths(
        model_path: PathBuf,
        tokenizer_path: PathBuf,
        model_name: &str,
        dimensions: usize,
    ) -> Result<Self, DomainError> {
        info!("Loading ONNX model from: {:?}", model_path);

        let session = Session::builder()
            .map_err(|e| unavailable("Failed to create session builder", e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| unavailable("Failed to set optimization level", e))?
            .commit_from_file(&model_path)
            .map_err(|e| unavailable("Failed to load ONNX model", e))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| unavailable("Failed to load tokenizer", e))?;

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            config: EmbeddingConfig::new(
                model_name.to_string(),
                dimensions,
                DEFAULT_MAX_SEQ_LENGTH,
            ),
        })
    }

    fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, DomainError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| unavailable("Tokenization failed", e))?;

        let batch_size = encodings.len();
        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(self.config.max_sequence_length());

        let mut input_ids: Vec<i64> = Vec::with_capacity(batch_size * max_len);
        let mut attention_mask: Vec<i64> = Vec::with_capacity(batch_size * max_len);
        let mut token_type_ids: Vec<i64> = Vec::with_capacity(batch_size * max_len);

        for encoding in &encodings {
            let len = encoding.get_ids().len().min(max_len);
            let padding = max_len - len;

            input_ids.extend(encoding.get_ids()[..len].iter().map(|&x| x as i64));
            attention_mask.extend(encoding.get_attention_mask()[..len].iter().map(|&x| x as i64));
            token_type_ids.extend(encoding.get_type_ids()[..len].iter().map(|&x| x as i64));

            input_ids.extend(std::iter::repeat_n(0i64, padding));
            attention_mask.extend(std::iter::repeat_n(0i64, padding));
            token_type_ids.extend(std::iter::repeat_n(0i64, padding));
        }

        let shape = [batch_size, max_len];
        let input_ids_tensor = Tensor::from_array((shape, input_ids))
            .map_err(|e| unavailable("Failed to create input_ids tensor", e))?;
        let attention_mask_tensor = Tensor::from_array((shape, attention_mask))
            .map_err(|e| unavailable("Failed to create attention_mask tensor", e))?;
        let token_type_ids_tensor = Tensor::from_array((shape, token_type_ids))
            .map_err(|e| unavailable("Failed to create token_type_ids tensor", e))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| unavailable("Failed to lock session", e))?;

        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor,
            ])
            .map_err(|e| unavailable("Inference failed", e))?;

        let output_value = outputs
            .iter()
            .next()
            .map(|(_, v)| v)
            .ok_or_else(|| DomainError::embedding_unavailable("No output tensor found"))?;

        let (shape, data) = output_value
            .try_extract_tensor::<f32>()
            .map_err(|e| unavailable("Failed to extract output tensor", e))?;

        let shape: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
        debug!("Output tensor shape: {:?}", shape);

        let embeddings = match shape.as_slice() {
            [_, seq_len, hidden_size] => (0..batch_size)
                .map(|i| {
                    let mask = encodings[i].get_attention_mask();
                    let mut embedding = vec![0.0f32; *hidden_size];
                    let mut count = 0.0f32;

                    for j in 0..(*seq_len).min(max_len).min(mask.len()) {
                        if mask[j] == 0 {
                            continue;
                        }
                        let offset = i * seq_len * hidden_size + j * hidden_size;
                        for (k, slot) in embedding.iter_mut().enumerate() {
                            *slot += data[offset + k];
                        }
                        count += 1.0;
                    }

                    if count > 0.0 {
                        for v in &mut embedding {
                            *v /= count;
                        }
                    }
                    normalize(embedding)
                })
                .collect(),
            [_, hidden_size] => (0..batch_size)
                .map(|i| {
                    let offset = i * hidden_size;
                    normalize(data[offset..offset + hidden_size].to_vec())
                })
                .collect(),
            _ => {
                return Err(DomainError::embedding_unavailable(format!(
                    "Unexpected output tensor shape: {:?}",
                    shape
                )))
            }
        };

        Ok(embeddings)
    }
}

fn normalize(mut embedding: Vec<f32>) -> Vec<f32> {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut embedding {
            *v /= norm;
        }
    }
    embedding
}

fn unavailable(context: &str, e: impl std::fmt::Display) -> DomainError {
    DomainError::embedding_unavailable(format!("{}: {}", context, e))
}

#[async_trait]
impl EmbeddingProvider for OrtEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        self.embed_texts(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::embedding_unavailable("Failed to generate embedding"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(BATCH_SIZE) {
            let text_refs: Vec<&str> = batch.iter().map(|s| s.as_str()).collect();
            all_embeddings.extend(self.embed_texts(&text_refs)?);
        }

        Ok(all_embeddings)
    }

    fn config(&self) -> &EmbeddingConfig {
        &self.config
    }
}
