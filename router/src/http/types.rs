use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn default_mode() -> String {
    "passage".to_string()
}

fn default_normalize() -> bool {
    true
}

#[derive(Deserialize, ToSchema)]
pub(crate) struct EmbedRequest {
    #[schema(example = json!(["Deep Learning is ..."]))]
    pub texts: Vec<String>,
    /// `query` or `passage`. Any other value is treated as `passage`.
    #[serde(default = "default_mode")]
    #[schema(default = "passage", example = "query")]
    pub mode: String,
}

#[derive(Serialize, ToSchema)]
pub(crate) struct EmbedResponse {
    #[schema(example = json!([[0.0, 1.0, 2.0]]))]
    pub vectors: Vec<Vec<f32>>,
    /// Vector length, 0 for an empty request
    #[schema(example = "384")]
    pub dim: usize,
}

#[derive(Deserialize, ToSchema)]
pub(crate) struct RerankRequest {
    #[schema(example = "What is Deep Learning?")]
    pub query: String,
    #[schema(example = json!(["Deep Learning is ...", "Cheese is ..."]))]
    pub candidates: Vec<String>,
    /// Only a positive value truncates
    #[serde(default)]
    #[schema(nullable = true, default = "null", example = "1")]
    pub top_n: Option<i64>,
    #[serde(default = "default_normalize")]
    #[schema(default = "true", example = "true")]
    pub normalize: bool,
}

#[derive(Serialize, ToSchema)]
pub(crate) struct RerankResponse {
    /// One score per candidate, in request order
    #[schema(example = json!([0.02, 0.97]))]
    pub scores: Vec<f32>,
    /// Candidate indices by descending score
    #[schema(example = json!([1, 0]))]
    pub order: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(nullable = true, example = json!(["Deep Learning is ..."]))]
    pub top_texts: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(nullable = true, example = json!([0.97]))]
    pub top_scores: Option<Vec<f32>>,
    #[schema(example = "cross-encoder/ms-marco-MiniLM-L-6-v2")]
    pub model: String,
}

#[derive(Serialize, ToSchema)]
pub(crate) struct HealthResponse {
    #[schema(example = "ok")]
    pub status: &'static str,
}
