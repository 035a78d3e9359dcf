//! Documents a run store hands to its materialization tasks.
//!
//! ```text
//! {run_store}/tiles.json      tile code per task, possibly repeated
//! {run_store}/revisits.json   revisit rows of every tile
//! {run_store}/dataspec.json   dataset specification
//! ```

use anyhow::{Context, Result};
use eoflow_core::config::DataSpecLoader;
use eoflow_core::models::Revisit;
use eoflow_core::ports::{join_path, ByteStore};
use eoflow_geo::normalize_tile_code;
use std::sync::Arc;

use crate::cli::SpecArgs;

pub const TILES_FILE: &str = "tiles.json";
pub const REVISITS_FILE: &str = "revisits.json";
pub const DATASPEC_FILE: &str = "dataspec.json";

pub struct RunStore {
    root: String,
    store: Arc<dyn ByteStore>,
}

impl RunStore {
    pub fn new(root: impl Into<String>, store: Arc<dyn ByteStore>) -> Self {
        Self { root: root.into(), store }
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = join_path(&self.root, name);
        let bytes = self.store.read(&path).with_context(|| format!("Failed to read {}", path))?;
        serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse {}", path))
    }

    /// Distinct tile codes in first-seen order
    pub fn tiles(&self) -> Result<Vec<String>> {
        let raw: Vec<String> = self.read_json(TILES_FILE)?;
        let mut tiles: Vec<String> = Vec::with_capacity(raw.len());
        for code in raw.iter().map(|c| normalize_tile_code(c)) {
            if !tiles.contains(&code) {
                tiles.push(code);
            }
        }
        Ok(tiles)
    }

    /// Revisits of one tile
    pub fn revisits_for(&self, tile: &str) -> Result<Vec<Revisit>> {
        let revisits: Vec<Revisit> = self.read_json(REVISITS_FILE)?;
        let tile = normalize_tile_code(tile);
        Ok(revisits.into_iter().filter(|r| normalize_tile_code(&r.mgrs_tile) == tile).collect())
    }

    /// Layered specification loader: defaults, the dataspec file (an explicit `--dataspec` or the
    /// run store's `dataspec.json`), the environment and command-line overrides
    pub fn spec_loader(run: Option<&RunStore>, args: &SpecArgs) -> Result<DataSpecLoader> {
        let mut loader = DataSpecLoader::with_defaults();

        if let Some(path) = &args.dataspec {
            loader = loader.load_from_file(path)?;
        } else if let Some(run) = run {
            let path = join_path(&run.root, DATASPEC_FILE);
            if run.store.exists(&path)? {
                let bytes = run.store.read(&path)?;
                let content = String::from_utf8(bytes)
                    .with_context(|| format!("{} is not valid UTF-8", path))?;
                loader = loader.load_from_str(&content, false)?;
            } else {
                tracing::warn!(path = %path, "Run store has no dataspec, using defaults");
            }
        }

        let mut loader = loader.load_from_env();
        loader.update_from_cli(args.overrides()?);
        Ok(loader)
    }
}
