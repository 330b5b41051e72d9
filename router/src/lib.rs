/// Text Retrieval Inference Webserver
mod http;
mod logging;
mod prometheus;
mod shutdown;

pub use http::server::router;
pub use logging::init_logging;
pub use prometheus::prometheus_builder;

use anyhow::{anyhow, Context, Result};
use hf_hub::api::tokio::ApiBuilder;
use hf_hub::{Repo, RepoType};
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use text_retrieval_backend::{Backend, DType, ModelType};
use text_retrieval_core::batch::BatchSize;
use text_retrieval_core::download::download_artifacts;
use text_retrieval_core::embed::Embedder;
use text_retrieval_core::infer::Infer;
use text_retrieval_core::rerank::Reranker;
use text_retrieval_core::TextRetrievalError;
use utoipa::ToSchema;

/// Model and batching settings for one backend
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model_id: String,
    pub batch_size: BatchSize,
}

/// Where model artifacts come from when a model id is not a local directory
#[derive(Debug, Clone, Default)]
pub struct HubConfig {
    pub revision: Option<String>,
    pub token: Option<String>,
    pub cache: Option<String>,
}

#[allow(clippy::too_many_arguments)]
pub async fn run(
    embedding: ModelConfig,
    rerank: ModelConfig,
    hub: HubConfig,
    dtype: DType,
    max_concurrent_requests: NonZeroUsize,
    hostname: String,
    port: u16,
    payload_limit: usize,
    cors_allow_origin: Option<Vec<String>>,
) -> Result<()> {
    let embedding_path = resolve_model(&embedding.model_id, &hub).await?;
    let rerank_path = resolve_model(&rerank.model_id, &hub).await?;

    let embedding_backend = load_backend(
        embedding_path,
        dtype,
        ModelType::Embedding,
        embedding.model_id.clone(),
    )
    .await?;
    let rerank_backend =
        load_backend(rerank_path, dtype, ModelType::Reranker, rerank.model_id.clone()).await?;

    let infer = Infer::new(
        Embedder::new(embedding_backend, embedding.batch_size)?,
        Reranker::new(rerank_backend, rerank.batch_size)?,
        max_concurrent_requests.get(),
    );

    let info = Info::new(&infer, dtype.to_string(), max_concurrent_requests.get());

    let addr = match hostname.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port),
        Err(_) => {
            tracing::warn!("Invalid hostname, defaulting to 0.0.0.0");
            SocketAddr::from(([0, 0, 0, 0], port))
        }
    };

    let prom_builder = prometheus::prometheus_builder(
        embedding.batch_size.get().max(rerank.batch_size.get()),
    )
    .context("failed to build prometheus recorder")?;

    http::server::run(infer, info, addr, prom_builder, payload_limit, cors_allow_origin).await
}

/// Local directory when `model_id` names one, otherwise a download from the Hugging Face Hub
async fn resolve_model(model_id: &str, hub: &HubConfig) -> Result<PathBuf> {
    let local = Path::new(model_id);
    if local.is_dir() {
        tracing::info!("Loading `{model_id}` from disk");
        return Ok(local.to_path_buf());
    }

    let mut builder = ApiBuilder::new()
        .with_progress(false)
        .with_token(hub.token.clone());

    if let Some(cache) = &hub.cache {
        builder = builder.with_cache_dir(cache.into());
    }

    let api = builder.build().context("Could not build Hugging Face Hub client")?;
    let api_repo = match &hub.revision {
        Some(revision) => api.repo(Repo::with_revision(
            model_id.to_string(),
            RepoType::Model,
            revision.clone(),
        )),
        None => api.repo(Repo::new(model_id.to_string(), RepoType::Model)),
    };

    download_artifacts(&api_repo)
        .await
        .with_context(|| format!("Could not download model artifacts for `{model_id}`"))
}

async fn load_backend(
    model_path: PathBuf,
    dtype: DType,
    model_type: ModelType,
    model_id: String,
) -> Result<Backend> {
    tracing::info!("Starting {model_type} model backend for `{model_id}`");

    let backend = tokio::task::spawn_blocking(move || {
        Backend::load(model_path, dtype, model_type, model_id)
    })
    .await?
    .with_context(|| format!("Could not create {model_type} backend"))?;

    backend
        .health()
        .await
        .map_err(|err| anyhow!("{model_type} backend is not healthy: {err}"))?;

    tracing::info!("Warmed up {model_type} backend");
    Ok(backend)
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct Info {
    /// Model info
    #[schema(example = "intfloat/e5-small-v2")]
    pub embedding_model: String,
    #[schema(example = "32")]
    pub embedding_batch_size: usize,
    #[schema(example = "cross-encoder/ms-marco-MiniLM-L-6-v2")]
    pub rerank_model: String,
    #[schema(example = "16")]
    pub rerank_batch_size: usize,
    #[schema(example = "float32")]
    pub model_dtype: String,
    /// Router Parameters
    #[schema(example = "512")]
    pub max_concurrent_requests: usize,
    /// Router Info
    #[schema(example = "0.1.0")]
    pub version: &'static str,
}

impl Info {
    /// Describe the models and batch sizes `infer` actually serves
    pub fn new(infer: &Infer, model_dtype: String, max_concurrent_requests: usize) -> Self {
        Self {
            embedding_model: infer.embedder().model_id().to_string(),
            embedding_batch_size: infer.embedder().batch_size().get(),
            rerank_model: infer.reranker().model_id().to_string(),
            rerank_batch_size: infer.reranker().batch_size().get(),
            model_dtype,
            max_concurrent_requests,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    Backend,
    Overloaded,
    Validation,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub error_type: ErrorType,
}

impl From<TextRetrievalError> for ErrorResponse {
    fn from(err: TextRetrievalError) -> Self {
        let error_type = match err {
            TextRetrievalError::Validation(_) => ErrorType::Validation,
            TextRetrievalError::Overloaded(_) => ErrorType::Overloaded,
            TextRetrievalError::Backend(_) => ErrorType::Backend,
        };
        Self {
            error: err.to_string(),
            error_type,
        }
    }
}
