//! Deterministic in-memory backend used by tests across the workspace.

use crate::{Backend, BackendError, Embedding};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type ScoreFn = dyn Fn(&str, &str) -> f32 + Send + Sync;
type DimFn = dyn Fn(&str) -> usize + Send + Sync;

/// Call log shared between a [`MockBackend`] and the test that created it
#[derive(Debug, Default)]
pub struct MockCalls {
    calls: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
    inputs: Mutex<Vec<String>>,
}

impl MockCalls {
    /// Number of `embed` or `predict` invocations
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Size of every batch received, in call order
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }

    /// Every text received by `embed`, or every candidate received by `predict`, in call order
    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }

    fn record(&self, inputs: impl Iterator<Item = String>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut seen = self.inputs.lock().unwrap();
        let before = seen.len();
        seen.extend(inputs);
        self.batch_sizes.lock().unwrap().push(seen.len() - before);
    }
}

/// Backend returning canned outputs.
///
/// Embeddings are `[chars, bytes, 1.0, ...]` padded to `dim`, or to the length picked by
/// [`MockBackend::with_dims`]. Scores come from the injected
/// function, which defaults to the candidate length.
pub struct MockBackend {
    dim: usize,
    dims: Option<Arc<DimFn>>,
    score: Arc<ScoreFn>,
    fail_on_call: Option<usize>,
    drop_last_output: bool,
    calls: Arc<MockCalls>,
}

impl MockBackend {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            dims: None,
            score: Arc::new(|_, candidate| candidate.chars().count() as f32),
            fail_on_call: None,
            drop_last_output: false,
            calls: Arc::new(MockCalls::default()),
        }
    }

    /// Score pairs with `score(query, candidate)`
    pub fn with_scores<F>(mut self, score: F) -> Self
    where
        F: Fn(&str, &str) -> f32 + Send + Sync + 'static,
    {
        self.score = Arc::new(score);
        self
    }

    /// Score candidates by looking them up in a fixed table, 0.0 when absent
    pub fn with_score_table(self, table: Vec<(&'static str, f32)>) -> Self {
        self.with_scores(move |_, candidate| {
            table
                .iter()
                .find(|(text, _)| *text == candidate)
                .map(|(_, s)| *s)
                .unwrap_or(0.0)
        })
    }

    /// Size each vector with `dims(text)` instead of the fixed `dim`
    pub fn with_dims<F>(mut self, dims: F) -> Self
    where
        F: Fn(&str) -> usize + Send + Sync + 'static,
    {
        self.dims = Some(Arc::new(dims));
        self
    }

    /// Fail the n-th call (1-based) with an inference error
    pub fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    /// Return one output less than requested for every batch
    pub fn dropping_last_output(mut self) -> Self {
        self.drop_last_output = true;
        self
    }

    pub fn calls(&self) -> Arc<MockCalls> {
        self.calls.clone()
    }

    fn check_failure(&self) -> Result<(), BackendError> {
        if Some(self.calls.count()) == self.fail_on_call {
            return Err(BackendError::Inference("mock inference failure".to_string()));
        }
        Ok(())
    }

    fn vector(&self, text: &str) -> Embedding {
        let dim = self.dims.as_ref().map_or(self.dim, |dims| dims(text));
        let mut vector = vec![1.0; dim];
        if let Some(v) = vector.get_mut(0) {
            *v = text.chars().count() as f32;
        }
        if let Some(v) = vector.get_mut(1) {
            *v = text.len() as f32;
        }
        vector
    }
}

impl Backend for MockBackend {
    fn health(&self) -> Result<(), BackendError> {
        Ok(())
    }

    fn embed(&self, texts: Vec<String>) -> Result<Vec<Embedding>, BackendError> {
        self.calls.record(texts.iter().cloned());
        self.check_failure()?;

        let mut vectors: Vec<Embedding> = texts.iter().map(|t| self.vector(t)).collect();
        if self.drop_last_output {
            vectors.pop();
        }
        Ok(vectors)
    }

    fn predict(&self, pairs: Vec<(String, String)>) -> Result<Vec<f32>, BackendError> {
        self.calls.record(pairs.iter().map(|(_, c)| c.clone()));
        self.check_failure()?;

        let mut scores: Vec<f32> = pairs.iter().map(|(q, c)| (self.score)(q, c)).collect();
        if self.drop_last_output {
            scores.pop();
        }
        Ok(scores)
    }
}
