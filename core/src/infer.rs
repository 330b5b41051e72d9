use crate::embed::{EmbedResult, Embedder};
use crate::prefix::PrefixMode;
use crate::rerank::{RerankResult, Reranker};
use crate::TextRetrievalError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::instrument;

/// Inference struct
///
/// Holds both orchestrators and the request limit. Each backend runs on its own thread, so an
/// embedding request never waits behind a rerank request.
#[derive(Debug, Clone)]
pub struct Infer {
    embedder: Embedder,
    reranker: Reranker,
    /// Inference limit
    limit_concurrent_requests: Arc<Semaphore>,
}

impl Infer {
    pub fn new(embedder: Embedder, reranker: Reranker, max_concurrent_requests: usize) -> Self {
        // Inference limit with a semaphore
        let semaphore = Arc::new(Semaphore::new(max_concurrent_requests));

        Self {
            embedder,
            reranker,
            limit_concurrent_requests: semaphore,
        }
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    pub fn reranker(&self) -> &Reranker {
        &self.reranker
    }

    #[instrument(skip(self))]
    pub fn try_acquire_permit(&self) -> Result<OwnedSemaphorePermit, TextRetrievalError> {
        // Limit concurrent requests by acquiring a permit from the semaphore
        self.clone()
            .limit_concurrent_requests
            .try_acquire_owned()
            .map_err(|err| {
                let counter = metrics::counter!("tr_request_failure", "err" => "overloaded");
                counter.increment(1);
                tracing::error!("{err}");
                TextRetrievalError::from(err)
            })
    }

    #[instrument(skip(self, texts, _permit))]
    pub async fn embed(
        &self,
        texts: Vec<String>,
        mode: PrefixMode,
        _permit: OwnedSemaphorePermit,
    ) -> Result<EmbedResult, TextRetrievalError> {
        let start_time = Instant::now();
        let counter = metrics::counter!("tr_request_count", "method" => "embed");
        counter.increment(1);

        let response = self.embedder.embed(texts, mode).await.map_err(|err| {
            let counter = metrics::counter!("tr_request_failure", "err" => "inference");
            counter.increment(1);
            tracing::error!("{err}");
            err
        })?;

        // Metrics
        let counter = metrics::counter!("tr_request_success", "method" => "embed");
        counter.increment(1);
        let histogram = metrics::histogram!("tr_embed_duration");
        histogram.record(start_time.elapsed().as_secs_f64());
        response.metadata.record_metrics();

        Ok(response)
    }

    #[instrument(skip(self, query, candidates, _permit))]
    pub async fn rerank(
        &self,
        query: String,
        candidates: Vec<String>,
        top_n: Option<i64>,
        normalize: bool,
        _permit: OwnedSemaphorePermit,
    ) -> Result<RerankResult, TextRetrievalError> {
        let start_time = Instant::now();
        let counter = metrics::counter!("tr_request_count", "method" => "rerank");
        counter.increment(1);

        let response = self
            .reranker
            .rerank(query, candidates, top_n, normalize)
            .await
            .map_err(|err| {
                let counter = metrics::counter!("tr_request_failure", "err" => "inference");
                counter.increment(1);
                tracing::error!("{err}");
                err
            })?;

        // Metrics
        let counter = metrics::counter!("tr_request_success", "method" => "rerank");
        counter.increment(1);
        let histogram = metrics::histogram!("tr_rerank_duration");
        histogram.record(start_time.elapsed().as_secs_f64());
        response.metadata.record_metrics();

        Ok(response)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferMetadata {
    /// Number of texts or pairs in the request
    pub inputs: usize,
    /// Number of backend calls
    pub batches: usize,
    /// Time spent inside the model, summed over batches
    pub inference: Duration,
}

impl InferMetadata {
    pub fn new(inputs: usize) -> Self {
        Self {
            inputs,
            ..Default::default()
        }
    }

    pub(crate) fn record_batch(&mut self, size: usize, inference: Duration) {
        self.batches += 1;
        self.inference += inference;

        let histogram = metrics::histogram!("tr_batch_size");
        histogram.record(size as f64);
    }

    fn record_metrics(&self) {
        let histogram = metrics::histogram!("tr_request_inputs");
        histogram.record(self.inputs as f64);
        let histogram = metrics::histogram!("tr_inference_duration");
        histogram.record(self.inference.as_secs_f64());
    }
}
