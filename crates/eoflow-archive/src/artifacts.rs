//! Persisted artifacts under a dataset store.
//!
//! ```text
//! {store}/chips/{tile}-{ii}.npy     composite, <f4, (bands, chipsize, chipsize)
//! {store}/targets/{tile}-{ii}.npy   target raster, |u1, (chipsize, chipsize)
//! {store}/{tile}-index.json         archive index of one tile
//! {store}/index.json                merged dataset index
//! ```

use eoflow_core::error::{EoflowError, Result};
use eoflow_core::models::{ArchiveIndex, DataSetIndex};
use eoflow_core::ports::{join_path, ByteStore};
use ndarray::{ArrayBase, Data, Dimension};
use ndarray_npy::{WritableElement, WriteNpyExt};

pub const CHIPS_DIR: &str = "chips";
pub const TARGETS_DIR: &str = "targets";

/// Artifact root of a dataset store, scoped to a run when one is given
pub fn store_root(dataset_store: &str, run_id: Option<&str>) -> String {
    match run_id {
        Some(run_id) if !run_id.is_empty() => join_path(dataset_store, run_id),
        _ => dataset_store.to_string(),
    }
}

pub fn chip_path(store: &str, tile: &str, ii: usize) -> String {
    join_path(store, &format!("{}/{}-{}.npy", CHIPS_DIR, tile, ii))
}

pub fn target_path(store: &str, tile: &str, ii: usize) -> String {
    join_path(store, &format!("{}/{}-{}.npy", TARGETS_DIR, tile, ii))
}

pub fn archive_index_path(store: &str, tile: &str) -> String {
    join_path(store, &format!("{}-index.json", tile))
}

pub fn dataset_index_path(store: &str) -> String {
    join_path(store, "index.json")
}

/// Encode an array as `.npy` bytes
pub fn encode_npy<S, D>(array: &ArrayBase<S, D>) -> Result<Vec<u8>>
where
    S: Data,
    S::Elem: WritableElement,
    D: Dimension,
{
    let mut bytes = Vec::new();
    array
        .write_npy(&mut bytes)
        .map_err(|e| EoflowError::Serialization(format!("Failed to encode npy: {}", e)))?;
    Ok(bytes)
}

/// Encode and store an array as `.npy`
pub fn write_npy<S, D>(store: &dyn ByteStore, path: &str, array: &ArrayBase<S, D>) -> Result<()>
where
    S: Data,
    S::Elem: WritableElement,
    D: Dimension,
{
    store.write(path, &encode_npy(array)?)
}

pub fn write_archive_index(store: &dyn ByteStore, root: &str, index: &ArchiveIndex) -> Result<String> {
    let path = archive_index_path(root, &index.tile);
    store.write(&path, &serde_json::to_vec_pretty(index)?)?;
    tracing::info!(tile = %index.tile, chips = index.chips.len(), path = %path, "Wrote archive index");
    Ok(path)
}

pub fn read_archive_index(store: &dyn ByteStore, root: &str, tile: &str) -> Result<ArchiveIndex> {
    let bytes = store.read(&archive_index_path(root, tile))?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn write_dataset_index(store: &dyn ByteStore, root: &str, index: &DataSetIndex) -> Result<String> {
    let path = dataset_index_path(root);
    store.write(&path, &serde_json::to_vec_pretty(index)?)?;
    tracing::info!(chips = index.chips.len(), path = %path, "Wrote dataset index");
    Ok(path)
}

pub fn read_dataset_index(store: &dyn ByteStore, root: &str) -> Result<DataSetIndex> {
    let bytes = store.read(&dataset_index_path(root))?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eoflow_core::models::ChipStats;
    use eoflow_store::MemoryStore;
    use ndarray::{Array2, Array3};
    use ndarray_npy::ReadNpyExt;
    use std::io::Cursor;

    #[test]
    fn test_paths() {
        let root = store_root("gs://bucket/dataset", Some("run-7"));
        assert_eq!(root, "gs://bucket/dataset/run-7");
        assert_eq!(store_root("out", None), "out");
        assert_eq!(store_root("out", Some("")), "out");

        assert_eq!(chip_path("out", "30UXC", 3), "out/chips/30UXC-3.npy");
        assert_eq!(target_path("out", "30UXC", 3), "out/targets/30UXC-3.npy");
        assert_eq!(archive_index_path("out", "30UXC"), "out/30UXC-index.json");
        assert_eq!(dataset_index_path("out"), "out/index.json");
    }

    #[test]
    fn test_npy_encoding() {
        let chip = Array3::<f32>::from_shape_fn((2, 3, 3), |(b, y, x)| (b * 9 + y * 3 + x) as f32);
        let bytes = encode_npy(&chip).unwrap();
        assert_eq!(&bytes[..6], b"\x93NUMPY");

        let back = Array3::<f32>::read_npy(Cursor::new(bytes)).unwrap();
        assert_eq!(back, chip);

        let target = Array2::<u8>::from_elem((2, 2), 255);
        let back = Array2::<u8>::read_npy(Cursor::new(encode_npy(&target).unwrap())).unwrap();
        assert_eq!(back, target);
    }

    #[test]
    fn test_index_documents() {
        let store = MemoryStore::new();
        let index = ArchiveIndex { tile: "30UXC".to_string(), chips: Vec::new() };
        let path = write_archive_index(&store, "out", &index).unwrap();
        assert_eq!(path, "out/30UXC-index.json");
        assert_eq!(read_archive_index(&store, "out", "30UXC").unwrap().tile, "30UXC");

        let dataset = DataSetIndex { chips: Vec::new(), chip_stats: ChipStats::new(vec![f64::NAN], vec![1.0]) };
        write_dataset_index(&store, "out", &dataset).unwrap();
        let back = read_dataset_index(&store, "out").unwrap();
        assert!(back.chip_stats.mean[0].is_nan());
    }
}
