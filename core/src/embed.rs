use crate::batch::{batch_count, batches, BatchSize};
use crate::infer::InferMetadata;
use crate::prefix::{prefix, PrefixMode};
use crate::TextRetrievalError;
use text_retrieval_backend::{Backend, BackendError, Embedding, ModelType};
use tracing::instrument;

/// Embedding orchestrator: prefixes texts and feeds them to the backend in fixed-size batches
#[derive(Debug, Clone)]
pub struct Embedder {
    backend: Backend,
    batch_size: BatchSize,
}

#[derive(Debug)]
pub struct EmbedResult {
    /// One vector per input text, in input order
    pub vectors: Vec<Embedding>,
    /// Vector length, 0 when there were no inputs
    pub dim: usize,
    pub metadata: InferMetadata,
}

impl Embedder {
    /// Fails when `backend` was loaded as a reranker
    pub fn new(backend: Backend, batch_size: BatchSize) -> Result<Self, BackendError> {
        if backend.model_type != ModelType::Embedding {
            return Err(BackendError::Start(format!(
                "`{}` is a {} model, expected an embedding model",
                backend.model_id, backend.model_type
            )));
        }
        Ok(Self {
            backend,
            batch_size,
        })
    }

    pub fn model_id(&self) -> &str {
        &self.backend.model_id
    }

    pub fn batch_size(&self) -> BatchSize {
        self.batch_size
    }

    #[instrument(skip(self, texts, mode), fields(mode = %mode, inputs = texts.len(), batches))]
    pub async fn embed(
        &self,
        texts: Vec<String>,
        mode: PrefixMode,
    ) -> Result<EmbedResult, TextRetrievalError> {
        let inputs = prefix(&texts, mode);
        tracing::Span::current().record("batches", batch_count(inputs.len(), self.batch_size));

        let mut metadata = InferMetadata::new(inputs.len());
        let mut vectors = Vec::with_capacity(inputs.len());

        for batch in batches(&inputs, self.batch_size) {
            let (batch_vectors, inference) = self.backend.embed(batch.to_vec()).await?;

            if batch_vectors.len() != batch.len() {
                return Err(BackendError::Inference(format!(
                    "backend returned {} vectors for a batch of {} texts",
                    batch_vectors.len(),
                    batch.len()
                ))
                .into());
            }

            metadata.record_batch(batch.len(), inference);
            vectors.extend(batch_vectors);
        }

        let dim = vectors.first().map_or(0, Vec::len);
        if let Some(position) = vectors.iter().position(|v| v.len() != dim) {
            return Err(BackendError::Inference(format!(
                "vector {position} has length {}, expected {dim}",
                vectors[position].len()
            ))
            .into());
        }

        Ok(EmbedResult {
            vectors,
            dim,
            metadata,
        })
    }
}
