use text_retrieval_backend::{Backend, ModelType};
use text_retrieval_backend_core::MockBackend;
use text_retrieval_core::batch::BatchSize;
use text_retrieval_core::embed::Embedder;
use text_retrieval_core::rerank::Reranker;

pub fn texts(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

pub fn embedder(mock: MockBackend, batch_size: usize) -> Embedder {
    let backend = Backend::new(Box::new(mock), ModelType::Embedding, "mock-embed".to_string());
    Embedder::new(backend, BatchSize::new(batch_size).unwrap()).unwrap()
}

pub fn reranker(mock: MockBackend, batch_size: usize) -> Reranker {
    let backend = Backend::new(Box::new(mock), ModelType::Reranker, "mock-rerank".to_string());
    Reranker::new(backend, BatchSize::new(batch_size).unwrap()).unwrap()
}
