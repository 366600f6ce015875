//! Offline tier against a real ONNX session
//!
//! `fixtures/six_class_constant.onnx` takes `images` (1, 3, H, W) and returns
//! `scores` (1, 6): `ReduceMean(images) * 0 + 0.05` for every class.

mod common;

use floraguard_inference::metrics::MODEL_SESSION_LOADS;
use floraguard_inference::{
    DiseaseClass, InferenceConfig, InferenceResolver, InferenceSource, LocalModelConfig,
    LocalModelRunner, ModelError,
};
use serial_test::serial;
use std::path::PathBuf;
use std::sync::Arc;

fn fixture_model() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/six_class_constant.onnx")
}

fn runner_for(model_path: PathBuf) -> LocalModelRunner {
    LocalModelRunner::new(&LocalModelConfig {
        enabled: true,
        model_path,
        input_size: 32,
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_concurrent_predicts_share_one_session() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(runner_for(fixture_model()));
    let loads_before = MODEL_SESSION_LOADS.get();

    let mut handles = Vec::new();
    for i in 0..6u8 {
        let image = common::write_leaf(dir.path(), &format!("leaf-{}.png", i), [i * 40, 180, 20]);
        let runner = runner.clone();
        handles.push(tokio::spawn(async move { runner.predict(&image).await }));
    }
    for handle in handles {
        let raw = handle.await.unwrap().expect("offline prediction");
        assert!(!raw.detected);
        assert_eq!(raw.label.as_deref(), Some("healthy"));
        assert!((raw.score - 0.05).abs() < 1e-6);
        // Every score is under the 0.1 floor
        assert!(raw.candidates.is_empty());
    }
    assert_eq!(MODEL_SESSION_LOADS.get() - loads_before, 1);

    // Already initialized: no rebuild
    assert!(runner.initialize().await);
    assert!(runner.is_available());
    assert_eq!(MODEL_SESSION_LOADS.get() - loads_before, 1);
}

#[tokio::test]
#[serial]
async fn test_session_binds_declared_tensor_names() {
    let runner = runner_for(fixture_model());
    assert!(runner.loaded_session().is_none());
    assert!(runner.initialize().await);

    let session = runner.loaded_session().expect("session");
    assert_eq!(session.input_name(), "images");
    assert_eq!(session.output_name(), "scores");
    assert_eq!(session.input_size(), 32);
    assert_eq!(session.labels().len(), 6);
}

#[tokio::test]
#[serial]
async fn test_metadata_overrides_labels_and_size() {
    let dir = tempfile::tempdir().unwrap();
    let model = dir.path().join("crop-disease-model.onnx");
    std::fs::copy(fixture_model(), &model).unwrap();
    std::fs::write(
        dir.path().join("metadata.json"),
        r#"{"classes":["leaf curl","healthy","a","b","c","d"],"inputSize":16}"#,
    )
    .unwrap();

    let runner = runner_for(model);
    let image = common::write_leaf(dir.path(), "leaf.png", [60, 60, 60]);
    let raw = runner.predict(&image).await.unwrap();

    let session = runner.loaded_session().unwrap();
    assert_eq!(session.input_size(), 16);
    assert_eq!(session.labels()[0], "leaf curl");
    // Ties keep the first maximum
    assert_eq!(raw.label.as_deref(), Some("leaf curl"));
}

#[tokio::test]
#[serial]
async fn test_undecodable_image_after_model_loads() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("upload.jpg");
    std::fs::write(&image, b"not a jpeg").unwrap();

    let runner = runner_for(fixture_model());
    let err = runner.predict(&image).await.unwrap_err();
    assert!(matches!(err, ModelError::Decode(_)));
    assert!(runner.is_available());
}

#[tokio::test]
#[serial]
async fn test_low_confidence_offline_result_is_final() {
    let dir = tempfile::tempdir().unwrap();
    let image = common::write_leaf(dir.path(), "leaf.png", [90, 140, 60]);

    let mut config = InferenceConfig::default();
    config.local.enabled = true;
    config.local.model_path = fixture_model();
    config.local.input_size = 32;
    config.mock_seed = Some(7);

    let resolver = InferenceResolver::from_config(&config).unwrap();
    let record = resolver.resolve(&image, None).await.unwrap();

    assert_eq!(record.source, InferenceSource::Offline);
    assert!(!record.detected);
    assert!((record.confidence_percent - 5.0).abs() < 1e-3);
    assert_eq!(record.disease_class, DiseaseClass::Healthy);
}
