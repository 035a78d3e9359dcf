//! Config command: resolved specification with value sources

use crate::cli::ConfigArgs;
use crate::output::OutputWriter;
use crate::output_types::{ConfigEntry, ConfigOutput};
use crate::run_store::RunStore;
use anyhow::Result;
use eoflow_core::ports::ByteStore;
use eoflow_store::LocalStore;
use std::sync::Arc;
use tabled::Tabled;

#[derive(Tabled)]
struct ConfigRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Source")]
    source: String,
}

pub fn execute(args: ConfigArgs, output: &OutputWriter) -> Result<()> {
    let store: Arc<dyn ByteStore> = Arc::new(LocalStore::new());
    let run = args.run_store.as_ref().map(|root| RunStore::new(root.clone(), Arc::clone(&store)));

    let loader = RunStore::spec_loader(run.as_ref(), &args.spec)?;
    let values: Vec<ConfigEntry> = loader
        .to_inspection_map()
        .into_iter()
        .map(|(key, (value, source))| ConfigEntry { key, value, source: format!("{:?}", source) })
        .collect();

    let error = loader.build().err().map(|e| e.to_string());

    if output.is_json() {
        output.result(ConfigOutput { values, valid: error.is_none(), error })?;
    } else {
        output.section("Dataset specification");
        output.table(
            values
                .into_iter()
                .map(|e| ConfigRow { key: e.key, value: e.value, source: e.source })
                .collect(),
        );
        match error {
            None => output.success("Specification is valid"),
            Some(e) => output.warning(e),
        }
    }

    Ok(())
}
