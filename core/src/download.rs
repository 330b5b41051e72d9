use hf_hub::api::tokio::{ApiError, ApiRepo};
use std::path::PathBuf;
use tracing::instrument;

/// Files a model directory must hold to be loaded
pub const MODEL_FILES: [&str; 3] = ["config.json", "tokenizer.json", "model.safetensors"];

async fn download_file(api: &ApiRepo, file_path: &str) -> Result<PathBuf, ApiError> {
    tracing::info!("Downloading `{}`", file_path);
    api.get(file_path).await
}

/// Fetch the model artifacts into the hub cache and return the snapshot directory
#[instrument(skip_all)]
pub async fn download_artifacts(api: &ApiRepo) -> Result<PathBuf, ApiError> {
    let start = std::time::Instant::now();
    tracing::info!("Starting download");

    let mut path = PathBuf::new();
    for file in MODEL_FILES {
        path = download_file(api, file).await?;
    }

    tracing::info!("Model artifacts downloaded in {:?}", start.elapsed());

    Ok(path.parent().map(PathBuf::from).unwrap_or(path))
}
