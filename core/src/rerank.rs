use crate::batch::{batch_count, batches, BatchSize};
use crate::infer::InferMetadata;
use crate::TextRetrievalError;
use std::cmp::Ordering;
use text_retrieval_backend::{Backend, BackendError, ModelType};
use tracing::instrument;

/// Rerank orchestrator: scores one query against many candidates with a cross-encoder
#[derive(Debug, Clone)]
pub struct Reranker {
    backend: Backend,
    batch_size: BatchSize,
}

/// Highest scoring candidates, in ranked order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopN {
    pub texts: Vec<String>,
    pub scores: Vec<f32>,
}

#[derive(Debug)]
pub struct RerankResult {
    /// One score per candidate, in candidate order
    pub scores: Vec<f32>,
    /// Candidate indices sorted by descending score
    pub order: Vec<usize>,
    /// `None` when no truncation was requested
    pub top: Option<TopN>,
    pub model: String,
    pub metadata: InferMetadata,
}

impl Reranker {
    /// Fails when `backend` was loaded as an embedding model
    pub fn new(backend: Backend, batch_size: BatchSize) -> Result<Self, BackendError> {
        if backend.model_type != ModelType::Reranker {
            return Err(BackendError::Start(format!(
                "`{}` is an {} model, expected a reranker model",
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

    #[instrument(skip(self, query, candidates), fields(candidates = candidates.len(), batches))]
    pub async fn rerank(
        &self,
        query: String,
        candidates: Vec<String>,
        top_n: Option<i64>,
        normalize: bool,
    ) -> Result<RerankResult, TextRetrievalError> {
        let mut metadata = InferMetadata::new(candidates.len());

        // Empty input still reports empty top lists, unlike a missing `top_n`
        if candidates.is_empty() {
            return Ok(RerankResult {
                scores: Vec::new(),
                order: Vec::new(),
                top: Some(TopN::default()),
                model: self.model_id().to_string(),
                metadata,
            });
        }

        let pairs: Vec<(String, String)> = candidates
            .iter()
            .map(|candidate| (query.clone(), candidate.clone()))
            .collect();
        tracing::Span::current().record("batches", batch_count(pairs.len(), self.batch_size));

        let mut scores = Vec::with_capacity(pairs.len());
        for batch in batches(&pairs, self.batch_size) {
            let (logits, inference) = self.backend.predict(batch.to_vec()).await?;

            if logits.len() != batch.len() {
                return Err(BackendError::Inference(format!(
                    "backend returned {} scores for a batch of {} pairs",
                    logits.len(),
                    batch.len()
                ))
                .into());
            }
            // Non-finite logits have no meaningful position in a descending order
            if let Some(score) = logits.iter().find(|s| !s.is_finite()) {
                return Err(BackendError::Inference(format!("score is {score}")).into());
            }

            metadata.record_batch(batch.len(), inference);
            scores.extend(logits.into_iter().map(|s| match normalize {
                true => sigmoid(s),
                false => s,
            }));
        }

        let order = rank(&scores);
        let top = select_top(&candidates, &scores, &order, top_n);

        Ok(RerankResult {
            scores,
            order,
            top,
            model: self.model_id().to_string(),
            metadata,
        })
    }
}

/// Logistic function, maps a logit into (0, 1)
pub fn sigmoid(x: f32) -> f32 {
    // Kept strictly inside (0, 1) where f32 would round to 0.0 or 1.0
    (1.0 / (1.0 + (-x).exp())).clamp(f32::MIN_POSITIVE, 1.0 - f32::EPSILON / 2.0)
}

/// Indices of `scores` sorted by descending score.
///
/// The sort is stable: equal scores keep their original relative order.
pub fn rank(scores: &[f32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));
    order
}

/// Texts and scores of the first `top_n` ranked candidates.
///
/// Returns `None` when `top_n` is absent, zero or negative.
pub fn select_top(
    candidates: &[String],
    scores: &[f32],
    order: &[usize],
    top_n: Option<i64>,
) -> Option<TopN> {
    let n = match top_n {
        Some(n) if n > 0 => usize::try_from(n).unwrap_or(usize::MAX),
        _ => return None,
    };
    let ranked = &order[..n.min(order.len())];

    Some(TopN {
        texts: ranked.iter().map(|&i| candidates[i].clone()).collect(),
        scores: ranked.iter().map(|&i| scores[i]).collect(),
    })
}
