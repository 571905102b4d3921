use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use habitat_cache::ResultCache;
use habitat_core::artifact::{write_collection, CandidateCollection, CandidateFeature, CollectionMetadata};
use habitat_core::species::CANDIDATES_FILE;
use habitat_core::types::{BoundingBox, Coord};
use habitat_core::Error;

fn collection(species: &str) -> CandidateCollection {
    let features = vec![
        CandidateFeature::new(Coord::new(0.05, 52.15), 0.95, "knn"),
        CandidateFeature::new(Coord::new(0.15, 52.15), 0.8, "knn"),
        CandidateFeature::new(Coord::new(0.05, 52.25), 0.65, "knn"),
    ];
    let metadata = CollectionMetadata {
        bbox: BoundingBox::new(0.03, 52.13, 0.22, 52.29).expect("bbox"),
        resolution: 0.1,
        probability_threshold: 0.6,
        total_grid_points: 6,
        valid_grid_points: 5,
        n_candidates: features.len(),
        species: Some(species.to_string()),
        n_occurrences: Some(4),
        model_id: Some("knn-00000000deadbeef".into()),
    };
    CandidateCollection::new(features, metadata)
}

fn publish(results: &Path, slug: &str) -> CandidateCollection {
    let c = collection(slug);
    write_collection(&results.join(slug).join(CANDIDATES_FILE), &c).expect("write");
    c
}

#[tokio::test]
async fn species_spellings_share_one_entry() {
    let tmp = TempDir::new().expect("tmp");
    let written = publish(tmp.path(), "quercus_robur");
    let cache = ResultCache::new(tmp.path());

    let a = cache.get("Quercus robur", None).await.expect("get").expect("present");
    let b = cache.get("quercus_robur", None).await.expect("get").expect("present");
    let c = cache.get("Quercus  Robur", None).await.expect("get").expect("present");

    assert_eq!(*a, written);
    assert!(Arc::ptr_eq(&a, &b) && Arc::ptr_eq(&b, &c));
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn missing_artifact_is_none_and_not_cached() {
    let tmp = TempDir::new().expect("tmp");
    let cache = ResultCache::new(tmp.path());

    assert!(cache.get("Adansonia digitata", None).await.expect("get").is_none());
    assert!(cache.is_empty().await);

    publish(tmp.path(), "adansonia_digitata");
    assert!(cache.get("Adansonia digitata", None).await.expect("get").is_some(), "a later run is picked up");
}

#[tokio::test]
async fn corrupt_artifact_is_an_error() {
    let tmp = TempDir::new().expect("tmp");
    let dir = tmp.path().join("broken");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join(CANDIDATES_FILE), r#"{"type":"FeatureCollection","features":[]}"#).expect("write");

    let cache = ResultCache::new(tmp.path());
    let err = cache.get("broken", None).await.expect_err("corrupt");
    assert!(matches!(err, Error::CorruptArtifact { .. }), "got {err:?}");
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn min_probability_filters_without_touching_the_entry() {
    let tmp = TempDir::new().expect("tmp");
    let written = publish(tmp.path(), "quercus_robur");
    let cache = ResultCache::new(tmp.path());

    let strict = cache.get("quercus robur", Some(0.9)).await.expect("get").expect("present");
    assert_eq!(strict.metadata.n_candidates, 1);
    assert_eq!(strict.metadata.probability_threshold, 0.9);
    assert!(strict.features.iter().all(|f| f.probability() >= 0.9));

    let loose = cache.get("quercus robur", Some(0.1)).await.expect("get").expect("present");
    assert_eq!(loose.metadata.probability_threshold, 0.6, "filtering never lowers the stored threshold");
    assert_eq!(loose.metadata.n_candidates, 3);

    let full = cache.get("quercus robur", None).await.expect("get").expect("present");
    assert_eq!(*full, written);

    assert!(matches!(cache.get("quercus robur", Some(1.5)).await, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn hits_survive_artifact_removal_until_invalidated() {
    let tmp = TempDir::new().expect("tmp");
    publish(tmp.path(), "quercus_robur");
    let cache = ResultCache::new(tmp.path());

    let first = cache.get("quercus_robur", None).await.expect("get").expect("present");
    fs::remove_file(cache.artifact_path("quercus_robur")).expect("rm");
    let second = cache.get("quercus_robur", None).await.expect("get").expect("present");
    assert!(Arc::ptr_eq(&first, &second));

    assert!(cache.invalidate("Quercus Robur").await);
    assert!(cache.get("quercus_robur", None).await.expect("get").is_none());
    assert!(!cache.invalidate("quercus_robur").await);
}

#[tokio::test]
async fn concurrent_first_access_converges() {
    let tmp = TempDir::new().expect("tmp");
    let written = publish(tmp.path(), "quercus_robur");
    publish(tmp.path(), "salix_alba");
    let cache = Arc::new(ResultCache::new(tmp.path()));

    let tasks = (0..16).map(|i| {
        let cache = Arc::clone(&cache);
        let species = if i % 2 == 0 { "Quercus robur" } else { "Salix alba" };
        tokio::spawn(async move { cache.get(species, None).await })
    });
    let results = futures::future::join_all(tasks).await;
    for r in results {
        assert!(r.expect("join").expect("get").is_some());
    }
    assert_eq!(cache.len().await, 2);
    assert_eq!(*cache.get("quercus_robur", None).await.expect("get").expect("present"), written);

    cache.clear().await;
    assert!(cache.is_empty().await);
}
