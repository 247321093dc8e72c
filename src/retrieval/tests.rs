use super::*;
use crate::index::{FlatIndex, IndexedPassage};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct StubEncoder {
    vectors: HashMap<String, Vec<f32>>,
}

impl Encoder for StubEncoder {
    fn encode(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no vector for '{}'", text))
    }
}

fn stub_encoder() -> Arc<dyn Encoder> {
    let vectors = [
        ("why do guests cancel?", vec![0.0, 1.0, 0.0]),
        ("resort stays", vec![1.0, 0.0, 0.0]),
    ]
    .into_iter()
    .map(|(text, vector)| (text.to_string(), vector))
    .collect();
    Arc::new(StubEncoder { vectors })
}

fn passage(id: &str, text: &str, vector: [f32; 3]) -> IndexedPassage {
    IndexedPassage {
        id: id.to_string(),
        text: text.to_string(),
        vector: vector.to_vec(),
    }
}

fn sample_index() -> Arc<dyn PassageIndex> {
    Arc::new(
        FlatIndex::from_entries(vec![
            passage("1", "Resort Hotel booking from PRT", [1.0, 0.0, 0.0]),
            passage("2", "Canceled City Hotel booking from GBR", [0.0, 1.0, 0.0]),
            passage("3", "City Hotel booking from FRA", [0.0, 0.0, 1.0]),
            passage("4", "Canceled Resort Hotel booking from ESP", [0.1, 0.9, 0.0]),
            passage("5", "City Hotel booking from DEU", [0.5, 0.5, 0.5]),
        ])
        .expect("should build index"),
    )
}

#[tokio::test]
async fn retrieve_orders_passages_nearest_first() {
    let retriever = Retriever::with_encoder(sample_index(), stub_encoder());

    let context = retriever
        .retrieve("why do guests cancel?", DEFAULT_TOP_K)
        .await
        .expect("should retrieve");

    assert_eq!(context.passages().len(), 5);
    assert_eq!(context.passages()[0].id, "2");
    assert_eq!(context.passages()[0].distance, 0.0);
    assert_eq!(context.passages()[1].id, "4");
}

#[tokio::test]
async fn context_block_joins_with_newlines() {
    let retriever = Retriever::with_encoder(sample_index(), stub_encoder());

    let context = retriever
        .retrieve("resort stays", 2)
        .await
        .expect("should retrieve");

    assert_eq!(
        context.context_block(),
        "Resort Hotel booking from PRT\nCity Hotel booking from DEU"
    );
}

#[tokio::test]
async fn empty_index_is_unavailable() {
    let index: Arc<dyn PassageIndex> = Arc::new(FlatIndex::default());
    let retriever = Retriever::with_encoder(index, stub_encoder());

    let result = retriever.retrieve("resort stays", 5).await;
    assert!(matches!(result, Err(RetrievalError::NoPassages)));
}

#[tokio::test]
async fn encoding_failure_is_surfaced() {
    let retriever = Retriever::with_encoder(sample_index(), stub_encoder());

    let result = retriever.retrieve("something unknown", 5).await;
    assert!(matches!(result, Err(RetrievalError::Encoding(_))));
}

#[tokio::test]
async fn dimension_mismatch_is_an_index_error() {
    let index: Arc<dyn PassageIndex> = Arc::new(
        FlatIndex::from_entries(vec![IndexedPassage {
            id: "1".to_string(),
            text: "two dimensional".to_string(),
            vector: vec![1.0, 0.0],
        }])
        .expect("should build index"),
    );
    let retriever = Retriever::with_encoder(index, stub_encoder());

    let result = retriever.retrieve("resort stays", 5).await;
    assert!(matches!(
        result,
        Err(RetrievalError::Index(IndexError::DimensionMismatch { .. }))
    ));
}

#[tokio::test]
async fn failed_initialisation_is_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let factory: EncoderFactory = Arc::new(move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            anyhow::bail!("model not pulled");
        }
        Ok(stub_encoder())
    });
    let retriever = Retriever::new(sample_index(), factory);

    let first = retriever.retrieve("resort stays", 1).await;
    assert!(
        matches!(&first, Err(RetrievalError::EncoderUnavailable(reason)) if reason.contains("model not pulled"))
    );

    let second = retriever.retrieve("resort stays", 1).await;
    assert!(second.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_queries_initialise_encoder_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let factory: EncoderFactory = Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(50));
        Ok(stub_encoder())
    });
    let retriever = Arc::new(Retriever::new(sample_index(), factory));

    let tasks = (0..8).map(|_| {
        let retriever = Arc::clone(&retriever);
        tokio::spawn(async move { retriever.retrieve("resort stays", 3).await })
    });

    for outcome in join_all(tasks).await {
        let context = outcome
            .expect("task should not panic")
            .expect("should retrieve");
        assert_eq!(context.passages()[0].id, "1");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
