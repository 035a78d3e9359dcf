//! Merge command: combine the tile indices of a run

use crate::cli::MergeArgs;
use crate::output::OutputWriter;
use crate::output_types::{BandStats, MergeOutput};
use crate::run_store::RunStore;
use anyhow::{Context, Result};
use eoflow_archive::artifacts::{read_archive_index, store_root, write_dataset_index};
use eoflow_archive::Archive;
use eoflow_core::ports::ByteStore;
use eoflow_store::LocalStore;
use std::sync::Arc;
use tabled::Tabled;

#[derive(Tabled)]
struct BandRow {
    #[tabled(rename = "Band")]
    band: String,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Std")]
    std: String,
}

fn finite(value: f64) -> Option<f64> {
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}

pub fn execute(args: MergeArgs, output: &OutputWriter) -> Result<()> {
    let store: Arc<dyn ByteStore> = Arc::new(LocalStore::new());
    let run = RunStore::new(args.run_store.clone(), Arc::clone(&store));

    let tiles = run.tiles()?;
    let spec = RunStore::spec_loader(Some(&run), &args.spec)?
        .build()
        .context("Invalid dataset specification")?;
    let root = store_root(&spec.dataset_store, args.run_id.as_deref());

    let indices = tiles
        .iter()
        .map(|tile| {
            read_archive_index(store.as_ref(), &root, tile)
                .with_context(|| format!("Failed to read the index of tile {}", tile))
        })
        .collect::<Result<Vec<_>>>()?;

    let dataset = Archive::merge_archive_indices(&indices);
    let index_path = write_dataset_index(store.as_ref(), &root, &dataset)?;

    let bands: Vec<BandStats> = dataset
        .chip_stats
        .mean
        .iter()
        .zip(&dataset.chip_stats.std)
        .enumerate()
        .map(|(i, (mean, std))| BandStats {
            band: spec.bands.get(i).map(|b| b.to_string()).unwrap_or_else(|| format!("#{}", i)),
            mean: finite(*mean),
            std: finite(*std),
        })
        .collect();

    if output.is_json() {
        output.result(MergeOutput { tiles: tiles.len(), chips: dataset.chips.len(), index_path, bands })?;
    } else {
        output.success(format!("Merged {} tiles", tiles.len()));
        output.kv("Chips", dataset.chips.len());
        output.kv("Index", index_path);

        output.section("Band statistics");
        let fmt = |v: Option<f64>| v.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "NaN".to_string());
        output.table(
            bands
                .into_iter()
                .map(|b| BandRow { band: b.band, mean: fmt(b.mean), std: fmt(b.std) })
                .collect(),
        );
    }

    Ok(())
}
