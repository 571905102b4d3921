use std::fs;
use std::path::Path;
use tempfile::TempDir;

use habitat_core::artifact::{
    read_collection, read_occurrences, write_collection, write_occurrences, CandidateCollection, CandidateFeature,
    CollectionMetadata,
};
use habitat_core::config::Config;
use habitat_core::types::{BoundingBox, Coord};
use habitat_core::Error;

fn sample_collection() -> CandidateCollection {
    let features = vec![
        CandidateFeature::new(Coord::new(0.05, 52.15), 0.93, "knn"),
        CandidateFeature::new(Coord::new(0.15, 52.15), 0.71, "knn"),
        CandidateFeature::new(Coord::new(0.25, 52.25), 0.6, "knn"),
    ];
    let metadata = CollectionMetadata {
        bbox: BoundingBox::new(0.03, 52.13, 0.22, 52.29).unwrap(),
        resolution: 0.1,
        probability_threshold: 0.6,
        total_grid_points: 6,
        valid_grid_points: 4,
        n_candidates: 3,
        species: Some("quercus_robur".into()),
        n_occurrences: Some(2),
        model_id: Some("knn-0123456789abcdef".into()),
    };
    CandidateCollection::new(features, metadata)
}

#[test]
fn collection_round_trips_through_disk() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("quercus_robur/candidates.geojson");
    let original = sample_collection();

    write_collection(&path, &original).expect("write");
    let reread = read_collection(&path).expect("read");

    assert_eq!(reread, original, "features and metadata survive persistence unchanged");
}

#[test]
fn persisted_collection_is_geojson_shaped() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("candidates.geojson");
    write_collection(&path, &sample_collection()).unwrap();

    let doc: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(doc["type"], "FeatureCollection");
    assert_eq!(doc["features"][0]["type"], "Feature");
    assert_eq!(doc["features"][0]["geometry"]["type"], "Point");
    assert_eq!(doc["features"][0]["geometry"]["coordinates"], serde_json::json!([0.05, 52.15]));
    assert_eq!(doc["features"][0]["properties"]["model_type"], "knn");
    assert_eq!(doc["metadata"]["bbox"], serde_json::json!([0.03, 52.13, 0.22, 52.29]));
    assert_eq!(doc["metadata"]["n_candidates"], 3);
}

#[test]
fn missing_collection_is_artifact_not_found() {
    let tmp = TempDir::new().unwrap();
    let err = read_collection(&tmp.path().join("nope.geojson")).unwrap_err();
    assert!(matches!(err, Error::ArtifactNotFound(_)), "got {err:?}");
}

fn assert_corrupt(path: &Path) {
    let err = read_collection(path).unwrap_err();
    assert!(matches!(err, Error::CorruptArtifact { .. }), "got {err:?}");
}

#[test]
fn malformed_collections_are_corrupt() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("candidates.geojson");

    fs::write(&path, "{ not json").unwrap();
    assert_corrupt(&path);

    let mut doc = serde_json::to_value(sample_collection()).unwrap();
    doc["type"] = "GeometryCollection".into();
    fs::write(&path, doc.to_string()).unwrap();
    assert_corrupt(&path);

    let mut doc = serde_json::to_value(sample_collection()).unwrap();
    doc["metadata"]["n_candidates"] = 7.into();
    fs::write(&path, doc.to_string()).unwrap();
    assert_corrupt(&path);

    let mut doc = serde_json::to_value(sample_collection()).unwrap();
    doc["metadata"]["valid_grid_points"] = 9.into();
    fs::write(&path, doc.to_string()).unwrap();
    assert_corrupt(&path);

    let mut doc = serde_json::to_value(sample_collection()).unwrap();
    doc["features"][1]["geometry"]["coordinates"] = serde_json::json!([0.1]);
    fs::write(&path, doc.to_string()).unwrap();
    assert_corrupt(&path);

    let mut doc = serde_json::to_value(sample_collection()).unwrap();
    doc["features"][0]["properties"]["probability"] = 1.5.into();
    fs::write(&path, doc.to_string()).unwrap();
    assert_corrupt(&path);
}

#[test]
fn filtered_view_leaves_source_untouched() {
    let original = sample_collection();
    let view = original.filtered(0.7);

    assert_eq!(view.len(), 2);
    assert_eq!(view.metadata.n_candidates, 2);
    assert_eq!(view.metadata.probability_threshold, 0.7);
    assert!(view.validate().is_ok());
    assert_eq!(original, sample_collection());

    // a lower override never resurrects features below the run threshold
    assert_eq!(original.filtered(0.1).metadata.probability_threshold, 0.6);
}

#[test]
fn occurrences_accept_pairs_and_feature_collections() {
    let tmp = TempDir::new().unwrap();
    let pairs = tmp.path().join("pairs.json");
    fs::write(&pairs, "[[0.12, 52.2], [0.18, 52.25]]").unwrap();
    assert_eq!(read_occurrences(&pairs).unwrap(), vec![Coord::new(0.12, 52.2), Coord::new(0.18, 52.25)]);

    let fc = tmp.path().join("occurrences.geojson");
    write_occurrences(&fc, &[Coord::new(0.12, 52.2)]).unwrap();
    assert_eq!(read_occurrences(&fc).unwrap(), vec![Coord::new(0.12, 52.2)]);

    let bad = tmp.path().join("bad.json");
    fs::write(&bad, r#"{"lon": 1}"#).unwrap();
    assert!(matches!(read_occurrences(&bad), Err(Error::InvalidInput(_))));
}

#[test]
fn bbox_parses_and_validates() {
    let b: BoundingBox = "0.03, 52.13, 0.22, 52.29".parse().unwrap();
    assert_eq!(<[f64; 4]>::from(b), [0.03, 52.13, 0.22, 52.29]);
    assert!("1,2,3".parse::<BoundingBox>().is_err());
    assert!("1,2,0,3".parse::<BoundingBox>().is_err(), "min_lon > max_lon");
    assert!("0,0,200,1".parse::<BoundingBox>().is_err());
}

#[test]
fn config_defaults_file_and_env_merge() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
            [tiles]
            dir = "tiles/2024"

            [regions.fens]
            bbox = [0.0, 52.3, 0.4, 52.6]
            "#,
        )?;
        jail.create_file("config.test.toml", "[scan]\nresolution = 0.05\n")?;
        jail.set_env("APP_SCAN__THRESHOLD", "0.75");

        let config = Config::load_for_env("test").expect("load");
        let settings = config.settings().expect("settings");
        assert_eq!(settings.tiles.dir, "tiles/2024");
        assert_eq!(settings.tiles.dim, 128, "unset keys keep their defaults");
        assert_eq!(settings.scan.resolution, 0.05);
        assert_eq!(settings.scan.threshold, 0.75);
        assert_eq!(settings.train.seed, 42);
        assert!(settings.regions.get("cambridge").is_some(), "default regions survive a merge");
        assert!(settings.regions.get("fens").is_some());
        let dim: usize = config.get("tiles.dim").expect("dotted key");
        assert_eq!(dim, 128);
        Ok(())
    });
}

#[test]
fn config_rejects_out_of_range_threshold() {
    figment::Jail::expect_with(|jail| {
        jail.set_env("APP_SCAN__THRESHOLD", "1.5");
        assert!(Config::load_for_env("test").is_err());
        Ok(())
    });
}
