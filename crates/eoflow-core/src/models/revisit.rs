use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Single granule row of the Sentinel-2 revisit catalogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revisit {
    /// ID of the image
    pub granule_id: String,

    /// ID of the sensor and product
    pub product_id: String,

    /// ID of the datatake
    #[serde(default)]
    pub datatake_identifier: String,

    /// Key for the UTM MGRS tile
    pub mgrs_tile: String,

    /// Timestamp of the image
    #[serde(deserialize_with = "deserialize_sensing_time")]
    pub sensing_time: DateTime<Utc>,

    /// Storage URL of the granule
    #[serde(default)]
    pub base_url: Option<String>,

    /// Storage URL of the granule source
    #[serde(default)]
    pub source_url: Option<String>,

    /// Total size in bytes of the granule
    #[serde(default)]
    pub total_size: u64,

    /// Cloud cover percentage out of 100
    #[serde(default)]
    pub cloud_cover: f64,
}

impl Revisit {
    /// Sort revisits by sensing time ascending, most recent last
    pub fn sort_by_sensing_time(revisits: &mut [Revisit]) {
        revisits.sort_by_key(|r| r.sensing_time);
    }
}

/// Accepts RFC 3339 as well as the space-separated form the catalogue exports
fn deserialize_sensing_time<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_sensing_time(&raw).map_err(serde::de::Error::custom)
}

/// Parse a sensing timestamp
pub fn parse_sensing_time(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%#z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    Err(format!("unrecognised sensing time: {}", raw))
}
