use crate::error::{EoflowError, Result};
use crate::models::{
    Band, CloudMask, CompositeStrategy, Constellation, LoaderOutput, UpsampleKernel,
};
use chrono::{Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::env;
use std::fs;
use std::path::Path;

/// Public Sentinel-2 L2A bucket
pub const S2_BUCKET: &str = "gs://gcp-public-data-sentinel-2";

/// Sizes of the bounded worker pools used by the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPools {
    /// Workers storing (revisit, band) blocks into the chunked array. Each holds one full
    /// band in memory, so keep this small.
    #[serde(default = "default_fill_workers")]
    pub fill: usize,

    /// Workers compositing, rasterizing and storing chips
    #[serde(default = "default_chip_workers")]
    pub chips: usize,
}

impl Default for WorkerPools {
    fn default() -> Self {
        Self { fill: default_fill_workers(), chips: default_chip_workers() }
    }
}

fn default_fill_workers() -> usize {
    2
}

fn default_chip_workers() -> usize {
    4
}

fn default_source_store() -> String {
    S2_BUCKET.to_string()
}

fn default_bands() -> Vec<Band> {
    vec![Band::B02, Band::B03, Band::B04]
}

fn default_chipsize() -> usize {
    256
}

fn default_upsample() -> Option<UpsampleKernel> {
    Some(UpsampleKernel::Bilinear)
}

/// Dataset specification: what to materialize and where to put it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSpec {
    /// Vector file of target geometries (GeoJSON)
    pub target_geofile: String,

    /// Optional area-of-interest file
    #[serde(default)]
    pub aoi_geofile: Option<String>,

    /// Root under which chips, targets and indices are written
    pub dataset_store: String,

    /// Root of the granule imagery archive
    #[serde(default = "default_source_store")]
    pub source_store: String,

    /// Root for the per-tile chunked arrays, `{dataset_store}/scratch` when unset
    #[serde(default)]
    pub scratch_store: Option<String>,

    #[serde(default)]
    pub start_datetime: Option<NaiveDate>,

    #[serde(default)]
    pub end_datetime: Option<NaiveDate>,

    #[serde(default)]
    pub cloud_mask: Option<Vec<CloudMask>>,

    #[serde(default)]
    pub composite: CompositeStrategy,

    #[serde(default)]
    pub constellation: Constellation,

    #[serde(default = "default_bands")]
    pub bands: Vec<Band>,

    /// Chip side in pixels
    #[serde(default = "default_chipsize")]
    pub chipsize: usize,

    #[serde(default)]
    pub loader_output: LoaderOutput,

    #[serde(default = "default_upsample")]
    pub upsample: Option<UpsampleKernel>,

    #[serde(default)]
    pub workers: WorkerPools,
}

impl DataSpec {
    /// Create a specification with default options
    pub fn new(target_geofile: impl Into<String>, dataset_store: impl Into<String>) -> Self {
        Self {
            target_geofile: target_geofile.into(),
            aoi_geofile: None,
            dataset_store: dataset_store.into(),
            source_store: default_source_store(),
            scratch_store: None,
            start_datetime: None,
            end_datetime: None,
            cloud_mask: None,
            composite: CompositeStrategy::default(),
            constellation: Constellation::default(),
            bands: default_bands(),
            chipsize: default_chipsize(),
            loader_output: LoaderOutput::default(),
            upsample: default_upsample(),
            workers: WorkerPools::default(),
        }
    }

    /// Fill in the default time window (one month ago until today) and validate
    pub fn finalize(mut self) -> Result<Self> {
        let today = Utc::now().date_naive();
        if self.end_datetime.is_none() {
            self.end_datetime = Some(today);
        }
        if self.start_datetime.is_none() {
            self.start_datetime = Some(today.checked_sub_months(Months::new(1)).unwrap_or(today));
        }
        self.validate()?;
        Ok(self)
    }

    /// Check the specification invariants
    pub fn validate(&self) -> Result<()> {
        if self.target_geofile.trim().is_empty() {
            return Err(EoflowError::ConfigMissing { key: "target_geofile".to_string() });
        }

        if self.dataset_store.trim().is_empty() {
            return Err(EoflowError::ConfigMissing { key: "dataset_store".to_string() });
        }

        if self.bands.is_empty() {
            return Err(EoflowError::ConfigInvalid {
                key: "bands".to_string(),
                reason: "at least one band is required".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for band in &self.bands {
            if !seen.insert(band) {
                return Err(EoflowError::ConfigInvalid {
                    key: "bands".to_string(),
                    reason: format!("band {} listed more than once", band),
                });
            }
        }

        if self.chipsize == 0 {
            return Err(EoflowError::ConfigInvalid {
                key: "chipsize".to_string(),
                reason: "chipsize must be greater than zero".to_string(),
            });
        }

        if self.workers.fill == 0 || self.workers.chips == 0 {
            return Err(EoflowError::ConfigInvalid {
                key: "workers".to_string(),
                reason: "worker pools need at least one worker".to_string(),
            });
        }

        if self.upsample.is_none() && self.loader_output.requires_upsample() {
            return Err(EoflowError::ConfigInvalid {
                key: "upsample".to_string(),
                reason: "upsample must be specified if loader_output is nd.array or xarray"
                    .to_string(),
            });
        }

        if let (Some(start), Some(end)) = (self.start_datetime, self.end_datetime) {
            if start > end {
                return Err(EoflowError::ConfigInvalid {
                    key: "start_datetime".to_string(),
                    reason: format!("start {} is after end {}", start, end),
                });
            }
        }

        Ok(())
    }

    /// Root of the chunked array store
    pub fn scratch_root(&self) -> String {
        self.scratch_store
            .clone()
            .unwrap_or_else(|| crate::ports::join_path(&self.dataset_store, "scratch"))
    }

    /// Parse from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| EoflowError::ConfigInvalid {
            key: "dataspec".to_string(),
            reason: format!("Failed to parse JSON: {}", e),
        })
    }

    /// Parse from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| EoflowError::ConfigInvalid {
            key: "dataspec".to_string(),
            reason: format!("Failed to parse TOML: {}", e),
        })
    }
}

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Keys a file actually sets; anything absent keeps its default source
#[derive(Debug, Deserialize)]
struct FileKeys {
    target_geofile: Option<String>,
    dataset_store: Option<String>,
    source_store: Option<String>,
    chipsize: Option<usize>,
    composite: Option<CompositeStrategy>,
    /// `Some(None)` when the file sets the kernel to null
    #[serde(default, deserialize_with = "present")]
    upsample: Option<Option<UpsampleKernel>>,
    bands: Option<Vec<Band>>,
}

/// Wrap a present key, so an explicit null is told apart from an absent key
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub dataset_store: Option<String>,
    pub source_store: Option<String>,
    pub chipsize: Option<usize>,
    pub composite: Option<CompositeStrategy>,
    pub upsample: Option<UpsampleKernel>,
    pub bands: Option<Vec<Band>>,
}

/// Layered loader for [`DataSpec`]: defaults < file < environment < CLI
#[derive(Debug, Clone)]
pub struct DataSpecLoader {
    base: Option<DataSpec>,
    pub target_geofile: ConfigValue<Option<String>>,
    pub dataset_store: ConfigValue<Option<String>>,
    pub source_store: ConfigValue<String>,
    pub chipsize: ConfigValue<usize>,
    pub composite: ConfigValue<CompositeStrategy>,
    pub upsample: ConfigValue<Option<UpsampleKernel>>,
    pub bands: ConfigValue<Vec<Band>>,
}

impl DataSpecLoader {
    /// Create a loader with default values
    pub fn with_defaults() -> Self {
        Self {
            base: None,
            target_geofile: ConfigValue::new(None, ConfigSource::Default),
            dataset_store: ConfigValue::new(None, ConfigSource::Default),
            source_store: ConfigValue::new(default_source_store(), ConfigSource::Default),
            chipsize: ConfigValue::new(default_chipsize(), ConfigSource::Default),
            composite: ConfigValue::new(CompositeStrategy::default(), ConfigSource::Default),
            upsample: ConfigValue::new(default_upsample(), ConfigSource::Default),
            bands: ConfigValue::new(default_bands(), ConfigSource::Default),
        }
    }

    /// Load a specification file. `.toml` files are parsed as TOML, anything else as JSON.
    pub fn load_from_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| EoflowError::ConfigInvalid {
            key: "file".to_string(),
            reason: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let is_toml = path.extension().and_then(|e| e.to_str()) == Some("toml");
        self.load_from_str(&content, is_toml)
    }

    /// Load specification text
    pub fn load_from_str(mut self, content: &str, is_toml: bool) -> Result<Self> {
        let (spec, keys): (DataSpec, FileKeys) = if is_toml {
            let keys = toml::from_str(content).map_err(|e| EoflowError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;
            (DataSpec::from_toml(content)?, keys)
        } else {
            let keys = serde_json::from_str(content).map_err(|e| EoflowError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse JSON: {}", e),
            })?;
            (DataSpec::from_json(content)?, keys)
        };

        if let Some(target_geofile) = keys.target_geofile {
            self.target_geofile.update(Some(target_geofile), ConfigSource::File);
        }
        if let Some(dataset_store) = keys.dataset_store {
            self.dataset_store.update(Some(dataset_store), ConfigSource::File);
        }
        if let Some(source_store) = keys.source_store {
            self.source_store.update(source_store, ConfigSource::File);
        }
        if let Some(chipsize) = keys.chipsize {
            self.chipsize.update(chipsize, ConfigSource::File);
        }
        if let Some(composite) = keys.composite {
            self.composite.update(composite, ConfigSource::File);
        }
        if let Some(upsample) = keys.upsample {
            self.upsample.update(upsample, ConfigSource::File);
        }
        if let Some(bands) = keys.bands {
            self.bands.update(bands, ConfigSource::File);
        }

        self.base = Some(spec);
        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        // EOFLOW_DATASET_STORE
        if let Ok(store) = env::var("EOFLOW_DATASET_STORE") {
            self.dataset_store.update(Some(store), ConfigSource::Environment);
        }

        // EOFLOW_SOURCE_STORE
        if let Ok(store) = env::var("EOFLOW_SOURCE_STORE") {
            self.source_store.update(store, ConfigSource::Environment);
        }

        // EOFLOW_CHIPSIZE
        if let Ok(raw) = env::var("EOFLOW_CHIPSIZE") {
            match raw.parse::<usize>() {
                Ok(chipsize) => self.chipsize.update(chipsize, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid EOFLOW_CHIPSIZE value '{}': expected a pixel count",
                    raw
                ),
            }
        }

        // EOFLOW_COMPOSITE
        if let Ok(raw) = env::var("EOFLOW_COMPOSITE") {
            match parse_composite(&raw) {
                Ok(composite) => self.composite.update(composite, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid EOFLOW_COMPOSITE value '{}': expected FIRST, LAST, MEAN, MAX, SCENEWISE_MAX or SEQUENCE",
                    raw
                ),
            }
        }

        // EOFLOW_UPSAMPLE
        if let Ok(raw) = env::var("EOFLOW_UPSAMPLE") {
            match parse_upsample(&raw) {
                Ok(kernel) => self.upsample.update(Some(kernel), ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid EOFLOW_UPSAMPLE value '{}': expected nearest, bilinear, bicubic or lanczos",
                    raw
                ),
            }
        }

        // EOFLOW_BANDS
        if let Ok(raw) = env::var("EOFLOW_BANDS") {
            match parse_bands(&raw) {
                Ok(bands) => self.bands.update(bands, ConfigSource::Environment),
                Err(e) => tracing::warn!("Invalid EOFLOW_BANDS value '{}': {}", raw, e),
            }
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        if let Some(dataset_store) = overrides.dataset_store {
            self.dataset_store.update(Some(dataset_store), ConfigSource::Cli);
        }
        if let Some(source_store) = overrides.source_store {
            self.source_store.update(source_store, ConfigSource::Cli);
        }
        if let Some(chipsize) = overrides.chipsize {
            self.chipsize.update(chipsize, ConfigSource::Cli);
        }
        if let Some(composite) = overrides.composite {
            self.composite.update(composite, ConfigSource::Cli);
        }
        if let Some(upsample) = overrides.upsample {
            self.upsample.update(Some(upsample), ConfigSource::Cli);
        }
        if let Some(bands) = overrides.bands {
            self.bands.update(bands, ConfigSource::Cli);
        }
    }

    /// Assemble, default and validate the final specification
    pub fn build(self) -> Result<DataSpec> {
        let target_geofile = self
            .target_geofile
            .value
            .ok_or_else(|| EoflowError::ConfigMissing { key: "target_geofile".to_string() })?;
        let dataset_store = self
            .dataset_store
            .value
            .ok_or_else(|| EoflowError::ConfigMissing { key: "dataset_store".to_string() })?;

        let mut spec = self
            .base
            .unwrap_or_else(|| DataSpec::new(target_geofile.clone(), dataset_store.clone()));
        spec.target_geofile = target_geofile;
        spec.dataset_store = dataset_store;
        spec.source_store = self.source_store.value;
        spec.chipsize = self.chipsize.value;
        spec.composite = self.composite.value;
        spec.upsample = self.upsample.value;
        spec.bands = self.bands.value;

        spec.finalize()
    }

    /// Get all overridable values as a map for inspection
    pub fn to_inspection_map(&self) -> BTreeMap<String, (String, ConfigSource)> {
        let mut map = BTreeMap::new();

        map.insert(
            "dataset_store".to_string(),
            (
                self.dataset_store.value.clone().unwrap_or_else(|| "<unset>".to_string()),
                self.dataset_store.source,
            ),
        );
        map.insert(
            "source_store".to_string(),
            (self.source_store.value.clone(), self.source_store.source),
        );
        map.insert("chipsize".to_string(), (self.chipsize.value.to_string(), self.chipsize.source));
        map.insert(
            "composite".to_string(),
            (self.composite.value.to_string(), self.composite.source),
        );
        map.insert(
            "upsample".to_string(),
            (
                self.upsample.value.map(|k| format!("{:?}", k)).unwrap_or_else(|| "none".to_string()),
                self.upsample.source,
            ),
        );
        map.insert(
            "bands".to_string(),
            (
                self.bands.value.iter().map(|b| b.code()).collect::<Vec<_>>().join(","),
                self.bands.source,
            ),
        );

        map
    }
}

/// Parse composite strategy from string
pub fn parse_composite(s: &str) -> Result<CompositeStrategy> {
    match s.trim().to_uppercase().as_str() {
        "FIRST" => Ok(CompositeStrategy::First),
        "LAST" => Ok(CompositeStrategy::Last),
        "MEAN" => Ok(CompositeStrategy::Mean),
        "MAX" => Ok(CompositeStrategy::Max),
        "SCENEWISE_MAX" => Ok(CompositeStrategy::ScenewiseMax),
        "SEQUENCE" => Ok(CompositeStrategy::Sequence),
        _ => Err(EoflowError::ConfigInvalid {
            key: "composite".to_string(),
            reason: format!("Invalid composite strategy: {}", s),
        }),
    }
}

/// Parse upsample kernel from string
pub fn parse_upsample(s: &str) -> Result<UpsampleKernel> {
    match s.trim().to_lowercase().as_str() {
        "nearest" => Ok(UpsampleKernel::Nearest),
        "bilinear" => Ok(UpsampleKernel::Bilinear),
        "bicubic" => Ok(UpsampleKernel::Bicubic),
        "lanczos" => Ok(UpsampleKernel::Lanczos),
        _ => Err(EoflowError::ConfigInvalid {
            key: "upsample".to_string(),
            reason: format!("Invalid upsample kernel: {}. Use nearest, bilinear, bicubic or lanczos", s),
        }),
    }
}

/// Parse a comma-separated band list
pub fn parse_bands(s: &str) -> Result<Vec<Band>> {
    s.split(',').filter(|b| !b.trim().is_empty()).map(|b| b.parse()).collect()
}
