//! Closed option sets selected by configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Temporal reduction applied to the revisit stack of each chip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompositeStrategy {
    /// Oldest available observation per pixel
    First,
    /// Most recent available observation per pixel
    #[default]
    Last,
    /// Mean pixel
    Mean,
    /// Brightest pixel
    Max,
    /// Brightest scene
    ScenewiseMax,
    /// All scenes
    Sequence,
}

impl fmt::Display for CompositeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompositeStrategy::First => "FIRST",
            CompositeStrategy::Last => "LAST",
            CompositeStrategy::Mean => "MEAN",
            CompositeStrategy::Max => "MAX",
            CompositeStrategy::ScenewiseMax => "SCENEWISE_MAX",
            CompositeStrategy::Sequence => "SEQUENCE",
        };
        f.write_str(name)
    }
}

/// Interpolation kernel used to bring 20 m and 60 m bands onto the 10 m grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpsampleKernel {
    Nearest,
    #[default]
    Bilinear,
    Bicubic,
    Lanczos,
}

/// Cloud masking source. Accepted in configuration but not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloudMask {
    S2cloudless,
    S2qualitymask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Constellation {
    #[default]
    S2,
}

/// Output container expected by downstream loaders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LoaderOutput {
    #[serde(rename = "dict")]
    Dict,
    #[default]
    #[serde(rename = "nd.array")]
    NdArray,
    #[serde(rename = "xarray")]
    XArray,
}

impl LoaderOutput {
    /// Whether this output needs every band on the common 10 m grid
    pub fn requires_upsample(&self) -> bool {
        matches!(self, LoaderOutput::NdArray | LoaderOutput::XArray)
    }
}
