//! Integration tests for layered dataset specification loading
//!
//! Precedence: CLI arguments > Environment variables > Spec file > Defaults

use eoflow_core::config::{CliConfigOverrides, ConfigSource, DataSpecLoader};
use eoflow_core::models::{Band, CompositeStrategy, UpsampleKernel};
use eoflow_core::EoflowError;
use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

fn clear_env() {
    for key in [
        "EOFLOW_DATASET_STORE",
        "EOFLOW_SOURCE_STORE",
        "EOFLOW_CHIPSIZE",
        "EOFLOW_COMPOSITE",
        "EOFLOW_UPSAMPLE",
        "EOFLOW_BANDS",
    ] {
        env::remove_var(key);
    }
}

fn spec_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

#[test]
#[serial]
fn test_json_file_overrides_defaults() {
    clear_env();
    let file = spec_file(
        ".json",
        r#"{
            "target_geofile": "parks.geojson",
            "dataset_store": "/data/parks",
            "bands": ["B02", "B8A", "B11"],
            "composite": "FIRST"
        }"#,
    );

    let loader = DataSpecLoader::with_defaults().load_from_file(file.path()).unwrap();
    assert_eq!(loader.bands.source, ConfigSource::File);
    assert_eq!(loader.composite.value, CompositeStrategy::First);
    assert_eq!(loader.chipsize.source, ConfigSource::Default);

    let spec = loader.build().unwrap();
    assert_eq!(spec.bands, vec![Band::B02, Band::B8A, Band::B11]);
    assert_eq!(spec.chipsize, 256);
    assert_eq!(spec.dataset_store, "/data/parks");
}

#[test]
#[serial]
fn test_env_overrides_file() {
    clear_env();
    let file = spec_file(
        ".toml",
        r#"
target_geofile = "parks.geojson"
dataset_store = "/data/parks"
chipsize = 128
upsample = "nearest"
"#,
    );

    env::set_var("EOFLOW_CHIPSIZE", "64");
    env::set_var("EOFLOW_UPSAMPLE", "lanczos");
    env::set_var("EOFLOW_BANDS", "B04,B03");

    let loader = DataSpecLoader::with_defaults()
        .load_from_file(file.path())
        .unwrap()
        .load_from_env();

    assert_eq!(loader.chipsize.value, 64);
    assert_eq!(loader.chipsize.source, ConfigSource::Environment);
    assert_eq!(loader.upsample.value, Some(UpsampleKernel::Lanczos));
    assert_eq!(loader.bands.value, vec![Band::B04, Band::B03]);

    clear_env();
}

#[test]
#[serial]
fn test_cli_overrides_everything() {
    clear_env();
    let file = spec_file(
        ".toml",
        r#"
target_geofile = "parks.geojson"
dataset_store = "/data/parks"
"#,
    );
    env::set_var("EOFLOW_DATASET_STORE", "/env/store");

    let mut loader = DataSpecLoader::with_defaults()
        .load_from_file(file.path())
        .unwrap()
        .load_from_env();
    assert_eq!(loader.dataset_store.source, ConfigSource::Environment);

    loader.update_from_cli(CliConfigOverrides {
        dataset_store: Some("/cli/store".to_string()),
        chipsize: Some(32),
        ..Default::default()
    });

    let spec = loader.build().unwrap();
    assert_eq!(spec.dataset_store, "/cli/store");
    assert_eq!(spec.chipsize, 32);

    clear_env();
}

#[test]
#[serial]
fn test_invalid_env_values_are_ignored() {
    clear_env();
    env::set_var("EOFLOW_CHIPSIZE", "large");
    env::set_var("EOFLOW_COMPOSITE", "MEDIAN");

    let loader = DataSpecLoader::with_defaults().load_from_env();
    assert_eq!(loader.chipsize.value, 256);
    assert_eq!(loader.chipsize.source, ConfigSource::Default);
    assert_eq!(loader.composite.value, CompositeStrategy::Last);

    clear_env();
}

#[test]
#[serial]
fn test_missing_dataset_store_fails_build() {
    clear_env();
    let file = spec_file(".json", r#"{"target_geofile": "parks.geojson", "dataset_store": ""}"#);

    let result = DataSpecLoader::with_defaults().load_from_file(file.path()).unwrap().build();
    assert!(matches!(result, Err(EoflowError::ConfigMissing { ref key }) if key == "dataset_store"));
}

#[test]
#[serial]
fn test_malformed_file_is_rejected() {
    clear_env();
    let file = spec_file(".json", "{ not json");
    let result = DataSpecLoader::with_defaults().load_from_file(file.path());
    assert!(matches!(result, Err(EoflowError::ConfigInvalid { .. })));
}
