use anyhow::Result;
use hf_hub::api::sync::{ApiBuilder, ApiRepo};
use hf_hub::{Repo, RepoType};
use std::path::PathBuf;

#[derive(Debug)]
pub struct Score(pub f32);

impl Score {
    fn is_close(&self, other: &Self, abs_tol: f32) -> bool {
        is_close::default()
            .abs_tol(abs_tol)
            .is_close(self.0, other.0)
    }
}

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        // Default tolerance for equality
        self.is_close(other, 5e-3)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len());

    let mut sumxx = 0.0;
    let mut sumyy = 0.0;
    let mut sumxy = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        sumxx += x * x;
        sumyy += y * y;
        sumxy += x * y;
    }
    sumxy / (sumxx * sumyy).sqrt()
}

fn download_file(api: &ApiRepo, file_path: &str) -> Result<PathBuf> {
    Ok(api.get(file_path)?)
}

pub fn download_artifacts(model_id: &'static str) -> Result<PathBuf> {
    let builder = ApiBuilder::new().with_progress(false);

    let api = builder.build()?;
    let api_repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

    download_file(&api_repo, "config.json")?;
    download_file(&api_repo, "tokenizer.json")?;
    let model_root = download_file(&api_repo, "model.safetensors")?;

    Ok(model_root
        .parent()
        .map(PathBuf::from)
        .unwrap_or_default())
}
