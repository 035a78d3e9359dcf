//! Materialize command: one tile of a run, selected by task index

use crate::cli::MaterializeArgs;
use crate::output::OutputWriter;
use crate::output_types::MaterializeOutput;
use crate::run_store::RunStore;
use anyhow::{Context, Result};
use eoflow_archive::artifacts::write_archive_index;
use eoflow_archive::{Archive, ArchiveOptions};
use eoflow_core::ports::ByteStore;
use eoflow_geo::TileCache;
use eoflow_store::LocalStore;
use std::sync::Arc;

pub fn execute(args: MaterializeArgs, output: &OutputWriter) -> Result<()> {
    let store: Arc<dyn ByteStore> = Arc::new(LocalStore::new());
    let run = RunStore::new(args.run_store.clone(), Arc::clone(&store));

    let tiles = run.tiles()?;
    let code = tiles.get(args.task_index).with_context(|| {
        format!("Task index {} is out of range for {} tiles", args.task_index, tiles.len())
    })?;
    tracing::info!(run_store = %args.run_store, task_index = args.task_index, tile = %code, "Materializing tile");

    let spec = RunStore::spec_loader(Some(&run), &args.spec)?
        .build()
        .context("Invalid dataset specification")?;
    let revisits = run.revisits_for(code)?;
    let revisit_count = revisits.len();

    let tile = TileCache::new().get(code)?;
    let options = ArchiveOptions { run_id: args.run_id.clone(), ..Default::default() };
    let mut archive = Archive::with_options(spec, tile, revisits, Arc::clone(&store), options)
        .with_context(|| format!("Failed to build archive for tile {}", code))?;

    archive.fill().with_context(|| format!("Failed to fill tile {}", code))?;
    archive.mask()?;
    let index = archive.materialize().with_context(|| format!("Failed to materialize tile {}", code))?;
    let index_path = write_archive_index(store.as_ref(), &archive.store_root(), &index)?;

    if output.is_json() {
        output.result(MaterializeOutput {
            tile: index.tile.clone(),
            revisits: revisit_count,
            chips: index.chips.len(),
            index_path,
        })?;
    } else {
        output.success(format!("Materialized tile {}", index.tile));
        output.kv("Revisits", revisit_count);
        output.kv("Chips", index.chips.len());
        output.kv("Index", index_path);
    }

    Ok(())
}
