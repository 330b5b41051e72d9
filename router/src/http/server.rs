/// HTTP Server logic
use crate::http::types::{
    EmbedRequest, EmbedResponse, HealthResponse, RerankRequest, RerankResponse,
};
use crate::{shutdown, ErrorResponse, ErrorType, Info};
use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Extension};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Instant;
use text_retrieval_core::infer::{Infer, InferMetadata};
use text_retrieval_core::prefix::PrefixMode;
use text_retrieval_core::TextRetrievalError;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{field, instrument, Span};
use utoipa::OpenApi;

///Text Retrieval Inference endpoint info
#[utoipa::path(
get,
tag = "Text Retrieval Inference",
path = "/info",
responses((status = 200, description = "Served model info", body = Info))
)]
#[instrument]
async fn get_model_info(info: Extension<Info>) -> Json<Info> {
    Json(info.0)
}

#[utoipa::path(
get,
tag = "Text Retrieval Inference",
path = "/health",
responses((status = 200, description = "Server is up", body = HealthResponse,
example = json ! ({"status": "ok"})))
)]
/// Health check method. Does not touch the models.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Get Embeddings
#[utoipa::path(
post,
tag = "Text Retrieval Inference",
path = "/embed",
request_body = EmbedRequest,
responses(
(status = 200, description = "Embeddings", body = EmbedResponse),
(status = 500, description = "Embedding Error", body = ErrorResponse,
example = json ! ({"error": "Backend error: Inference failed", "error_type": "backend"})),
(status = 429, description = "Model is overloaded", body = ErrorResponse,
example = json ! ({"error": "Model is overloaded", "error_type": "overloaded"})),
(status = 422, description = "Malformed request", body = ErrorResponse,
example = json ! ({"error": "Failed to deserialize the JSON body", "error_type": "validation"})),
)
)]
#[instrument(skip_all, fields(inputs, batches, total_time, inference_time))]
async fn embed(
    infer: Extension<Infer>,
    payload: Result<Json<EmbedRequest>, JsonRejection>,
) -> Result<Json<EmbedResponse>, (StatusCode, Json<ErrorResponse>)> {
    let span = Span::current();
    let start_time = Instant::now();

    let Json(req) = payload.map_err(ErrorResponse::from)?;
    let permit = infer.try_acquire_permit().map_err(ErrorResponse::from)?;

    let response = infer
        .embed(req.texts, PrefixMode::from(req.mode.as_str()), permit)
        .await
        .map_err(ErrorResponse::from)?;

    record_span(&span, &response.metadata, start_time);
    tracing::info!("Success");

    Ok(Json(EmbedResponse {
        vectors: response.vectors,
        dim: response.dim,
    }))
}

/// Get Ranks
#[utoipa::path(
post,
tag = "Text Retrieval Inference",
path = "/rerank",
request_body = RerankRequest,
responses(
(status = 200, description = "Ranks", body = RerankResponse),
(status = 500, description = "Rerank Error", body = ErrorResponse,
example = json ! ({"error": "Backend error: score is NaN", "error_type": "backend"})),
(status = 429, description = "Model is overloaded", body = ErrorResponse,
example = json ! ({"error": "Model is overloaded", "error_type": "overloaded"})),
(status = 422, description = "Malformed request", body = ErrorResponse,
example = json ! ({"error": "Failed to deserialize the JSON body", "error_type": "validation"})),
)
)]
#[instrument(skip_all, fields(inputs, batches, total_time, inference_time))]
async fn rerank(
    infer: Extension<Infer>,
    payload: Result<Json<RerankRequest>, JsonRejection>,
) -> Result<Json<RerankResponse>, (StatusCode, Json<ErrorResponse>)> {
    let span = Span::current();
    let start_time = Instant::now();

    let Json(req) = payload.map_err(ErrorResponse::from)?;
    let permit = infer.try_acquire_permit().map_err(ErrorResponse::from)?;

    let response = infer
        .rerank(req.query, req.candidates, req.top_n, req.normalize, permit)
        .await
        .map_err(ErrorResponse::from)?;

    record_span(&span, &response.metadata, start_time);
    tracing::info!("Success");

    let (top_texts, top_scores) = match response.top {
        Some(top) => (Some(top.texts), Some(top.scores)),
        None => (None, None),
    };

    Ok(Json(RerankResponse {
        scores: response.scores,
        order: response.order,
        top_texts,
        top_scores,
        model: response.model,
    }))
}

/// Prometheus metrics scrape endpoint
#[utoipa::path(
get,
tag = "Text Retrieval Inference",
path = "/metrics",
responses((status = 200, description = "Prometheus Metrics", body = String))
)]
async fn metrics(prom_handle: Extension<PrometheusHandle>) -> String {
    prom_handle.render()
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn record_span(span: &Span, metadata: &InferMetadata, start_time: Instant) {
    span.record("inputs", metadata.inputs);
    span.record("batches", metadata.batches);
    span.record("total_time", field::debug(start_time.elapsed()));
    span.record("inference_time", field::debug(metadata.inference));
}

// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
paths(
get_model_info,
health,
embed,
rerank,
metrics,
),
components(
schemas(
Info,
HealthResponse,
EmbedRequest,
EmbedResponse,
RerankRequest,
RerankResponse,
ErrorResponse,
ErrorType,
)
),
tags(
(name = "Text Retrieval Inference", description = "Text embedding and reranking API")
),
info(
title = "Text Retrieval Inference",
license(
name = "Apache 2.0",
url = "https://www.apache.org/licenses/LICENSE-2.0"
)
)
)]
pub(crate) struct ApiDoc;

/// Build the application routes around an already constructed `Infer`
pub fn router(
    infer: Infer,
    info: Info,
    prom_handle: PrometheusHandle,
    payload_limit: usize,
    cors_allow_origin: Option<Vec<String>>,
) -> Result<Router, anyhow::Error> {
    // CORS allowed origins
    let allow_origin = match cors_allow_origin {
        Some(origins) => AllowOrigin::list(
            origins
                .iter()
                .map(|origin| origin.parse::<HeaderValue>())
                .collect::<Result<Vec<_>, _>>()
                .context("invalid `--cors-allow-origin` value")?,
        ),
        None => AllowOrigin::any(),
    };

    // CORS layer
    let cors_layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(allow_origin);

    let app = Router::new()
        .route("/info", get(get_model_info))
        .route("/embed", post(embed))
        .route("/rerank", post(rerank))
        // Base Health route
        .route("/health", get(health))
        // Prometheus metrics route
        .route("/metrics", get(metrics))
        .route("/api-doc/openapi.json", get(openapi))
        .layer(DefaultBodyLimit::max(payload_limit))
        .layer(Extension(infer))
        .layer(Extension(info))
        .layer(Extension(prom_handle))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer);

    Ok(app)
}

/// Serving method
pub async fn run(
    infer: Infer,
    info: Info,
    addr: SocketAddr,
    prom_builder: PrometheusBuilder,
    payload_limit: usize,
    cors_allow_origin: Option<Vec<String>>,
) -> Result<(), anyhow::Error> {
    let prom_handle = prom_builder
        .install_recorder()
        .context("failed to install metrics recorder")?;

    let app = router(infer, info, prom_handle, payload_limit, cors_allow_origin)?;

    // Run server
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("could not bind to {addr}"))?;

    tracing::info!("Starting HTTP server: {}", &addr);
    tracing::info!("Ready");

    axum::serve(listener, app)
        // Wait until all requests are finished to shut down
        .with_graceful_shutdown(shutdown::shutdown_signal())
        .await?;

    Ok(())
}

impl From<&ErrorType> for StatusCode {
    fn from(value: &ErrorType) -> Self {
        match value {
            ErrorType::Backend => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorType::Overloaded => StatusCode::TOO_MANY_REQUESTS,
            ErrorType::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

/// Convert to Axum supported formats
impl From<ErrorResponse> for (StatusCode, Json<ErrorResponse>) {
    fn from(err: ErrorResponse) -> Self {
        (StatusCode::from(&err.error_type), Json(err))
    }
}

impl From<JsonRejection> for ErrorResponse {
    fn from(rejection: JsonRejection) -> Self {
        let counter = metrics::counter!("tr_request_failure", "err" => "validation");
        counter.increment(1);
        tracing::error!("{rejection}");

        ErrorResponse::from(TextRetrievalError::Validation(rejection.body_text()))
    }
}
