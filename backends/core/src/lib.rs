#[cfg(any(test, feature = "mock"))]
mod mock;

use std::fmt;
use thiserror::Error;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockBackend, MockCalls};

/// A single pooled embedding, one value per hidden dimension
pub type Embedding = Vec<f32>;

/// Model interface driven by the backend thread.
///
/// Every call receives a whole batch and must answer with exactly one output per input, in
/// input order. Implementations are called from a single dedicated thread and never
/// concurrently.
pub trait Backend {
    fn health(&self) -> Result<(), BackendError>;

    /// Encode each text into one vector
    fn embed(&self, texts: Vec<String>) -> Result<Vec<Embedding>, BackendError>;

    /// Score each (query, candidate) pair, returning one raw logit per pair
    fn predict(&self, pairs: Vec<(String, String)>) -> Result<Vec<f32>, BackendError>;
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ModelType {
    /// Bi-encoder producing one vector per text
    Embedding,
    /// Cross-encoder producing one logit per pair
    Reranker,
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ModelType::Embedding => write!(f, "embedding"),
            ModelType::Reranker => write!(f, "reranker"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackendError {
    #[error("No backend found")]
    NoBackend,
    #[error("Could not start backend: {0}")]
    Start(String),
    #[error("{0}")]
    Inference(String),
    #[error("Backend is unhealthy")]
    Unhealthy,
}
