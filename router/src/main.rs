use anyhow::Result;
use clap::Parser;
use std::num::NonZeroUsize;
use text_retrieval_backend::DType;
use text_retrieval_core::batch::BatchSize;
use text_retrieval_router::{HubConfig, ModelConfig};
use veil::Redact;

/// App Configuration
#[derive(Parser, Redact)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// The embedding model to load.
    /// Can be a MODEL_ID as listed on <https://hf.co/models> like
    /// `intfloat/e5-small-v2`.
    /// Or it can be a local directory holding `config.json`, `tokenizer.json` and
    /// `model.safetensors`
    #[clap(default_value = "intfloat/e5-small-v2", long, env)]
    embedding_model: String,

    /// Maximum number of texts sent to the embedding model in one call
    #[clap(default_value = "32", long, env)]
    embedding_batch: BatchSize,

    /// The cross-encoder model used for reranking, as a MODEL_ID or a local directory
    #[clap(default_value = "cross-encoder/ms-marco-MiniLM-L-6-v2", long, env)]
    rerank_model: String,

    /// Maximum number of (query, candidate) pairs sent to the rerank model in one call
    #[clap(default_value = "16", long, env)]
    rerank_batch: BatchSize,

    /// The actual revision of the models if you're referring to models
    /// on the hub. You can use a specific commit id or a branch like `refs/pr/2`.
    #[clap(long, env)]
    revision: Option<String>,

    /// The dtype to be forced upon the models.
    #[clap(default_value = "float32", long, env, value_enum)]
    dtype: DType,

    /// The maximum amount of concurrent requests for this particular deployment.
    /// Having a low limit will refuse clients requests instead of having them
    /// wait for too long and is usually good to handle backpressure correctly.
    #[clap(default_value = "512", long, env)]
    max_concurrent_requests: NonZeroUsize,

    /// Your Hugging Face Hub token
    #[clap(long, env)]
    #[redact(partial)]
    hf_token: Option<String>,

    /// The IP address to listen on
    #[clap(default_value = "0.0.0.0", long, env)]
    hostname: String,

    /// The port to listen on.
    #[clap(default_value = "8000", long, short, env)]
    port: u16,

    /// The location of the huggingface hub cache.
    /// Used to override the location if you want to provide a mounted disk for instance
    #[clap(long, env)]
    huggingface_hub_cache: Option<String>,

    /// Payload size limit in bytes
    ///
    /// Default is 2MB
    #[clap(default_value = "2000000", long, env)]
    payload_limit: usize,

    /// Outputs the logs in JSON format (useful for telemetry)
    #[clap(long, env)]
    json_output: bool,

    #[clap(long, env)]
    cors_allow_origin: Option<Vec<String>>,
}


#[tokio::main]
async fn main() -> Result<()> {
    // Pattern match configuration
    let args: Args = Args::parse();

    text_retrieval_router::init_logging(args.json_output);

    tracing::info!("{args:?}");

    text_retrieval_router::run(
        ModelConfig {
            model_id: args.embedding_model,
            batch_size: args.embedding_batch,
        },
        ModelConfig {
            model_id: args.rerank_model,
            batch_size: args.rerank_batch,
        },
        HubConfig {
            revision: args.revision,
            token: args.hf_token,
            cache: args.huggingface_hub_cache,
        },
        args.dtype,
        args.max_concurrent_requests,
        args.hostname,
        args.port,
        args.payload_limit,
        args.cors_allow_origin,
    )
    .await?;

    Ok(())
}
