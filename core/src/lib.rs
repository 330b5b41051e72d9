pub mod batch;
pub mod download;
pub mod embed;
pub mod infer;
pub mod prefix;
pub mod rerank;

use text_retrieval_backend::BackendError;
use thiserror::Error;
use tokio::sync::TryAcquireError;

#[derive(Error, Debug)]
pub enum TextRetrievalError {
    #[error("Input validation error: {0}")]
    Validation(String),
    #[error("Model is overloaded")]
    Overloaded(#[from] TryAcquireError),
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}
