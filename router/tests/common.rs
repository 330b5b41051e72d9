use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::Value;
use std::sync::Arc;
use text_retrieval_backend::{Backend, ModelType};
use text_retrieval_backend_core::{MockBackend, MockCalls};
use text_retrieval_core::batch::BatchSize;
use text_retrieval_core::embed::Embedder;
use text_retrieval_core::infer::Infer;
use text_retrieval_core::rerank::Reranker;
use text_retrieval_router::{router, Info};
use tower::ServiceExt;

pub const EMBEDDING_MODEL: &str = "mock/embedding";
pub const RERANK_MODEL: &str = "mock/reranker";

pub struct TestApp {
    pub router: Router,
    pub embed_calls: Arc<MockCalls>,
    pub rerank_calls: Arc<MockCalls>,
}

pub struct TestAppBuilder {
    embed: MockBackend,
    rerank: MockBackend,
    embed_batch_size: usize,
    rerank_batch_size: usize,
    max_concurrent_requests: usize,
    payload_limit: usize,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            embed: MockBackend::new(4),
            rerank: MockBackend::new(1),
            embed_batch_size: 2,
            rerank_batch_size: 2,
            max_concurrent_requests: 8,
            payload_limit: 2_000_000,
        }
    }

    pub fn embed(mut self, embed: MockBackend) -> Self {
        self.embed = embed;
        self
    }

    pub fn rerank(mut self, rerank: MockBackend) -> Self {
        self.rerank = rerank;
        self
    }

    pub fn batch_sizes(mut self, embed: usize, rerank: usize) -> Self {
        self.embed_batch_size = embed;
        self.rerank_batch_size = rerank;
        self
    }

    pub fn max_concurrent_requests(mut self, max_concurrent_requests: usize) -> Self {
        self.max_concurrent_requests = max_concurrent_requests;
        self
    }

    pub fn payload_limit(mut self, payload_limit: usize) -> Self {
        self.payload_limit = payload_limit;
        self
    }

    pub fn build(self) -> TestApp {
        let embed_calls = self.embed.calls();
        let rerank_calls = self.rerank.calls();

        let embed = Backend::new(
            Box::new(self.embed),
            ModelType::Embedding,
            EMBEDDING_MODEL.to_string(),
        );
        let rerank = Backend::new(
            Box::new(self.rerank),
            ModelType::Reranker,
            RERANK_MODEL.to_string(),
        );

        let infer = Infer::new(
            Embedder::new(embed, BatchSize::new(self.embed_batch_size).unwrap()).unwrap(),
            Reranker::new(rerank, BatchSize::new(self.rerank_batch_size).unwrap()).unwrap(),
            self.max_concurrent_requests,
        );
        let info = Info::new(&infer, "float32".to_string(), self.max_concurrent_requests);
        let prom_handle = PrometheusBuilder::new().build_recorder().handle();

        let router = router(infer, info, prom_handle, self.payload_limit, None).unwrap();

        TestApp {
            router,
            embed_calls,
            rerank_calls,
        }
    }
}

impl TestApp {
    pub async fn get(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.post_raw(uri, &body.to_string()).await
    }

    pub async fn post_raw(&self, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, bytes) = self.send(request).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }
}
