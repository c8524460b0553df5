mod common;

use approx::assert_abs_diff_eq;
use chrono::{Duration, TimeZone, Utc};
use common::{multipart_body, png_bytes, ScriptedProvider};
use sarprep::{
    Crs, GeoPoint, PipelineConfig, PipelineOrchestrator, PipelineStage, RawImagery, SarError,
};
use tempfile::TempDir;

fn config_in(temp_dir: &TempDir) -> PipelineConfig {
    PipelineConfig {
        artifact_dir: temp_dir.path().join("artifacts"),
        ..PipelineConfig::default()
    }
}

#[test]
fn test_san_francisco_end_to_end() {
    let _ = env_logger::builder().is_test(true).try_init();

    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let provider = ScriptedProvider::png(256, 256);
    let pipeline = PipelineOrchestrator::new(provider.clone(), config_in(&temp_dir)).unwrap();

    let point = GeoPoint::new(37.7749, -122.4194).unwrap();
    let now = Utc.with_ymd_and_hms(2025, 5, 20, 9, 0, 0).unwrap();
    let result = pipeline.run_at(&point, now).expect("pipeline should succeed");

    assert_eq!(result.tensor_shape, [1, 1, 256, 256]);
    assert_eq!(result.tensor.shape(), [1, 1, 256, 256]);
    assert!(result.tensor.values.iter().all(|&v| (-1.0..=1.0).contains(&v)));
    assert!(result.metadata.is_none());

    // Projected, non-degenerate query box handed to the provider
    let spec = provider.last_spec().expect("provider should have been queried");
    assert_eq!(spec.bbox.crs, Crs::WebMercator);
    assert!(spec.bbox.min_x < spec.bbox.max_x);
    assert!(spec.bbox.min_y < spec.bbox.max_y);
    assert_abs_diff_eq!(spec.bbox.min_x, -13_633_231.2, epsilon = 1.0);
    assert_abs_diff_eq!(spec.bbox.max_x, -13_622_099.3, epsilon = 1.0);
    assert_eq!(spec.time_window.to, now);
    assert_eq!(spec.time_window.to - spec.time_window.from, Duration::days(365));
    assert_eq!((spec.output_width, spec.output_height), (256, 256));

    assert_eq!(provider.calls(), vec!["authenticate", "fetch_imagery"]);

    // Both artifacts exist and the enhanced one is a 256x256 PNG
    assert!(pipeline.store().raw_path(&result.artifact_id).exists());
    let enhanced = std::fs::read(&result.enhanced_image_path).unwrap();
    let reloaded = RawImagery::from_encoded(&enhanced).unwrap();
    assert_eq!((reloaded.width(), reloaded.height()), (256, 256));
}

#[test]
fn test_metadata_passes_through_unvalidated() {
    let temp_dir = TempDir::new().unwrap();
    let image = png_bytes(64, 48);
    // Not even valid JSON: the pipeline must not interpret it
    let metadata = "{ provider specific, unparsed";
    let body = multipart_body("b0undary", &[("image/png", &image), ("application/json", metadata.as_bytes())]);
    let provider = ScriptedProvider::returning("multipart/mixed; boundary=b0undary", body);
    let pipeline = PipelineOrchestrator::new(provider, config_in(&temp_dir)).unwrap();

    let result = pipeline.run(&GeoPoint::new(51.5, -0.12).unwrap()).unwrap();
    assert_eq!(result.metadata.unwrap().as_str(), metadata);
    assert_eq!(result.tensor_shape, [1, 1, 256, 256]);
}

#[test]
fn test_auth_failure_skips_fetch() {
    let temp_dir = TempDir::new().unwrap();
    let provider = ScriptedProvider::failing_auth(401);
    let pipeline = PipelineOrchestrator::new(provider.clone(), config_in(&temp_dir)).unwrap();

    let failure = pipeline.run(&GeoPoint::new(37.7749, -122.4194).unwrap()).unwrap_err();
    assert!(matches!(failure.cause, SarError::Auth(_)));
    assert_eq!(failure.stage, PipelineStage::Start);
    assert_eq!(provider.calls(), vec!["authenticate"]);
}

#[test]
fn test_unrecognized_content_type_is_decode_error() {
    let temp_dir = TempDir::new().unwrap();
    let provider = ScriptedProvider::returning("text/html", b"<html>maintenance</html>".to_vec());
    let pipeline = PipelineOrchestrator::new(provider, config_in(&temp_dir)).unwrap();

    let failure = pipeline.run(&GeoPoint::new(1.0, 1.0).unwrap()).unwrap_err();
    assert!(matches!(failure.cause, SarError::Decode(_)));
    assert_eq!(failure.stage, PipelineStage::Authenticated);
}

#[test]
fn test_corrupt_image_is_image_load_error() {
    let temp_dir = TempDir::new().unwrap();
    let provider = ScriptedProvider::returning("image/png", b"\x89PNG truncated".to_vec());
    let pipeline = PipelineOrchestrator::new(provider, config_in(&temp_dir)).unwrap();

    let failure = pipeline.run(&GeoPoint::new(1.0, 1.0).unwrap()).unwrap_err();
    assert!(matches!(failure.cause, SarError::ImageLoad(_)));
    assert_eq!(failure.stage, PipelineStage::Authenticated);

    // The undecodable raw image is not left behind
    let leftovers = std::fs::read_dir(pipeline.store().root()).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[test]
fn test_non_square_input_still_yields_fixed_tensor() {
    let temp_dir = TempDir::new().unwrap();
    let provider = ScriptedProvider::png(300, 120);
    let pipeline = PipelineOrchestrator::new(provider, config_in(&temp_dir)).unwrap();

    let result = pipeline.run(&GeoPoint::new(-33.86, 151.21).unwrap()).unwrap();
    assert_eq!(result.tensor_shape, [1, 1, 256, 256]);

    // The persisted image keeps the provider's dimensions
    let enhanced = std::fs::read(&result.enhanced_image_path).unwrap();
    let reloaded = RawImagery::from_encoded(&enhanced).unwrap();
    assert_eq!((reloaded.width(), reloaded.height()), (300, 120));
}

#[test]
fn test_each_run_gets_its_own_artifact() {
    let temp_dir = TempDir::new().unwrap();
    let provider = ScriptedProvider::png(64, 64);
    let pipeline = PipelineOrchestrator::new(provider, config_in(&temp_dir)).unwrap();
    let point = GeoPoint::new(0.0, 0.0).unwrap();

    let first = pipeline.run(&point).unwrap();
    let second = pipeline.run(&point).unwrap();

    assert_ne!(first.artifact_id, second.artifact_id);
    assert_ne!(first.enhanced_image_path, second.enhanced_image_path);
    assert!(first.enhanced_image_path.exists());
    assert!(second.enhanced_image_path.exists());

    // Same input, same enhanced bytes
    assert_eq!(
        std::fs::read(&first.enhanced_image_path).unwrap(),
        std::fs::read(&second.enhanced_image_path).unwrap()
    );
}
