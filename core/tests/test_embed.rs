mod common;

use crate::common::{embedder, texts};
use text_retrieval_backend::{Backend, BackendError, ModelType};
use text_retrieval_backend_core::MockBackend;
use text_retrieval_core::batch::BatchSize;
use text_retrieval_core::embed::Embedder;
use text_retrieval_core::prefix::PrefixMode;
use text_retrieval_core::TextRetrievalError;

#[tokio::test]
async fn test_embed_preserves_order_across_batches() {
    let mock = MockBackend::new(4);
    let calls = mock.calls();
    let embedder = embedder(mock, 2);

    let inputs = texts(&["a", "bb", "ccc", "dddd", "eeeee"]);
    let result = embedder
        .embed(inputs.clone(), PrefixMode::Query)
        .await
        .unwrap();

    assert_eq!(result.vectors.len(), inputs.len());
    assert_eq!(result.dim, 4);
    assert!(result.vectors.iter().all(|v| v.len() == result.dim));

    // The mock encodes the prefixed text length in the first component
    let lengths: Vec<f32> = result.vectors.iter().map(|v| v[0]).collect();
    assert_eq!(lengths, vec![8.0, 9.0, 10.0, 11.0, 12.0]);

    assert_eq!(calls.batch_sizes(), vec![2, 2, 1]);
    assert_eq!(
        calls.inputs(),
        texts(&[
            "query: a",
            "query: bb",
            "query: ccc",
            "query: dddd",
            "query: eeeee"
        ])
    );
    assert_eq!(result.metadata.inputs, 5);
    assert_eq!(result.metadata.batches, 3);
}

#[tokio::test]
async fn test_embed_passage_prefix() {
    let mock = MockBackend::new(2);
    let calls = mock.calls();
    let embedder = embedder(mock, 8);

    embedder
        .embed(texts(&["doc"]), PrefixMode::from("something-else"))
        .await
        .unwrap();

    assert_eq!(calls.inputs(), texts(&["passage: doc"]));
}

#[tokio::test]
async fn test_embed_empty_input() {
    let mock = MockBackend::new(4);
    let calls = mock.calls();
    let embedder = embedder(mock, 2);

    let result = embedder
        .embed(Vec::new(), PrefixMode::Passage)
        .await
        .unwrap();

    assert!(result.vectors.is_empty());
    assert_eq!(result.dim, 0);
    assert_eq!(calls.count(), 0);
}

#[tokio::test]
async fn test_embed_batch_size_does_not_change_output() {
    let inputs = texts(&["one", "two", "three", "four", "five", "six", "seven"]);

    let mut outputs = Vec::new();
    for batch_size in [1, 2, 3, 7, 100] {
        let embedder = embedder(MockBackend::new(3), batch_size);
        let result = embedder
            .embed(inputs.clone(), PrefixMode::Passage)
            .await
            .unwrap();
        outputs.push(result.vectors);
    }

    assert!(outputs.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn test_embed_backend_failure_is_propagated() {
    let mock = MockBackend::new(4).failing_on_call(2);
    let calls = mock.calls();
    let embedder = embedder(mock, 1);

    let err = embedder
        .embed(texts(&["a", "b", "c"]), PrefixMode::Passage)
        .await
        .unwrap_err();

    assert!(matches!(err, TextRetrievalError::Backend(_)));
    // No retry and no further batches after the failure
    assert_eq!(calls.count(), 2);
}

#[tokio::test]
async fn test_embed_rejects_short_backend_output() {
    let embedder = embedder(MockBackend::new(4).dropping_last_output(), 2);

    let err = embedder
        .embed(texts(&["a", "b"]), PrefixMode::Passage)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("1 vectors for a batch of 2 texts"));
}

#[tokio::test]
async fn test_embed_rejects_mismatched_vector_lengths() {
    // Vector length follows the prefixed text length: 10, 11 and 12
    let mock = MockBackend::new(4).with_dims(|text| text.len());
    let embedder = embedder(mock, 2);

    let err = embedder
        .embed(texts(&["a", "bb", "ccc"]), PrefixMode::Passage)
        .await
        .unwrap_err();

    assert!(matches!(err, TextRetrievalError::Backend(_)));
    assert!(err
        .to_string()
        .contains("vector 1 has length 11, expected 10"));
}

#[tokio::test]
async fn test_embedder_rejects_reranker_backend() {
    let backend = Backend::new(
        Box::new(MockBackend::new(4)),
        ModelType::Reranker,
        "mock-rerank".to_string(),
    );

    let err = Embedder::new(backend, BatchSize::new(2).unwrap()).unwrap_err();

    assert_eq!(
        err,
        BackendError::Start(
            "`mock-rerank` is a reranker model, expected an embedding model".to_string()
        )
    );
}
