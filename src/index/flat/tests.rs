use super::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn passage(id: &str, vector: &[f32]) -> IndexedPassage {
    IndexedPassage {
        id: id.to_string(),
        text: format!("Booking {} summary", id),
        vector: vector.to_vec(),
    }
}

fn five_passages() -> FlatIndex {
    FlatIndex::from_entries(vec![
        passage("a", &[0.0, 0.0, 1.0]),
        passage("b", &[1.0, 0.0, 0.0]),
        passage("c", &[0.0, 1.0, 0.0]),
        passage("d", &[0.5, 0.5, 0.0]),
        passage("e", &[1.0, 1.0, 1.0]),
    ])
    .expect("should build index")
}

#[test]
fn exact_match_comes_first() {
    let index = five_passages();

    let hits = index
        .nearest(&[1.0, 0.0, 0.0], 3)
        .expect("should search index");

    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].id, "b");
    assert_eq!(hits[0].distance, 0.0);
    assert_eq!(hits[1].id, "d");
    assert!((hits[1].distance - 0.5).abs() < f32::EPSILON);
    assert!(hits.windows(2).all(|pair| pair[0].distance <= pair[1].distance));
}

#[test]
fn k_larger_than_index_returns_everything() {
    let index = five_passages();
    let hits = index.nearest(&[0.0, 0.0, 0.0], 50).expect("should search");
    assert_eq!(hits.len(), 5);
}

#[test]
fn ties_keep_insertion_order() {
    let index = FlatIndex::from_entries(vec![
        passage("z", &[1.0, 0.0]),
        passage("y", &[0.0, 1.0]),
        passage("x", &[-1.0, 0.0]),
    ])
    .expect("should build index");

    let hits = index.nearest(&[0.0, 0.0], 3).expect("should search");
    let ids: Vec<&str> = hits.iter().map(|hit| hit.id.as_str()).collect();
    assert_eq!(ids, ["z", "y", "x"]);
}

#[test]
fn repeated_searches_are_identical() {
    let index = five_passages();
    let first = index.nearest(&[0.3, 0.2, 0.9], 4).expect("should search");
    let second = index.nearest(&[0.3, 0.2, 0.9], 4).expect("should search");
    assert_eq!(first, second);
}

#[test]
fn dimension_mismatch_is_rejected() {
    let index = five_passages();
    assert!(matches!(
        index.nearest(&[1.0, 0.0], 2),
        Err(IndexError::DimensionMismatch {
            expected: 3,
            actual: 2
        })
    ));
}

#[test]
fn mixed_dimensions_are_rejected() {
    let result = FlatIndex::from_entries(vec![passage("a", &[1.0, 0.0]), passage("b", &[1.0])]);
    assert!(matches!(result, Err(IndexError::Malformed { line: 2, .. })));
}

#[test]
fn empty_index_returns_no_hits() {
    let index = FlatIndex::default();
    assert!(index.is_empty());
    assert!(index.nearest(&[1.0], 3).expect("should search").is_empty());
}

#[test]
fn load_jsonl_file() {
    let mut file = NamedTempFile::new().expect("should create temp file");
    writeln!(
        file,
        r#"{{"id":"1","text":"City Hotel booking from PRT","vector":[0.1,0.2]}}"#
    )
    .expect("should write line");
    writeln!(file).expect("should write blank line");
    writeln!(
        file,
        r#"{{"id":"2","text":"Resort Hotel booking from GBR","vector":[0.9,0.8]}}"#
    )
    .expect("should write line");

    let index = FlatIndex::load(file.path()).expect("should load index");
    assert_eq!(index.len(), 2);
    assert_eq!(index.dimension(), 2);

    let hits = index.nearest(&[1.0, 1.0], 1).expect("should search");
    assert_eq!(hits[0].text, "Resort Hotel booking from GBR");
}

#[test]
fn load_reports_malformed_line() {
    let mut file = NamedTempFile::new().expect("should create temp file");
    writeln!(file, r#"{{"id":"1","text":"ok","vector":[0.1]}}"#).expect("should write line");
    writeln!(file, "not json").expect("should write line");

    assert!(matches!(
        FlatIndex::load(file.path()),
        Err(IndexError::Malformed { line: 2, .. })
    ));
}

#[test]
fn load_missing_file_is_not_found() {
    let dir = tempfile::TempDir::new().expect("should create temp dir");
    assert!(matches!(
        FlatIndex::load(&dir.path().join("missing.jsonl")),
        Err(IndexError::NotFound(_))
    ));
}

#[tokio::test]
async fn trait_search_matches_nearest() {
    let index = five_passages();
    let via_trait = PassageIndex::search(&index, &[0.0, 1.0, 0.0], 2)
        .await
        .expect("should search");
    assert_eq!(via_trait, index.nearest(&[0.0, 1.0, 0.0], 2).expect("should search"));
    assert_eq!(PassageIndex::count(&index).await.expect("should count"), 5);
}
