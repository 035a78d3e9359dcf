//! Merging tile indices into a dataset index.
//!
//! Aggregate statistics are always recomputed from the full chip list, so merging is
//! associative: merging in batches gives the same result as merging everything at once.

use eoflow_core::models::{ArchiveIndex, ChipMetaData, ChipStats, DataSetIndex};

use crate::stats::nanmean;

/// Per-band NaN-aware mean of the chip means and of the chip standard deviations.
///
/// Chips with fewer bands than the widest chip count as NaN for the missing bands.
pub fn dataset_stats(chips: &[ChipMetaData]) -> ChipStats {
    let bands = chips.iter().map(|c| c.chip_stats.band_count()).max().unwrap_or(0);

    let mean = (0..bands)
        .map(|b| nanmean(chips.iter().map(|c| band_value(&c.chip_stats.mean, b))))
        .collect();
    let std = (0..bands)
        .map(|b| nanmean(chips.iter().map(|c| band_value(&c.chip_stats.std, b))))
        .collect();
    ChipStats::new(mean, std)
}

fn band_value(values: &[f64], band: usize) -> f64 {
    values.get(band).copied().unwrap_or(f64::NAN)
}

/// Concatenate tile indices, in order, into a dataset index
pub fn merge_archive_indices(indices: &[ArchiveIndex]) -> DataSetIndex {
    let chips: Vec<ChipMetaData> =
        indices.iter().flat_map(|index| index.chips.iter().cloned()).collect();
    let chip_stats = dataset_stats(&chips);

    tracing::info!(tiles = indices.len(), chips = chips.len(), "Merged archive indices");
    DataSetIndex { chips, chip_stats }
}

/// Append tile indices to an existing dataset index
pub fn extend_dataset_index(dataset: DataSetIndex, indices: &[ArchiveIndex]) -> DataSetIndex {
    let mut chips = dataset.chips;
    chips.extend(indices.iter().flat_map(|index| index.chips.iter().cloned()));
    let chip_stats = dataset_stats(&chips);
    DataSetIndex { chips, chip_stats }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn chip(tile: &str, ii: usize, mean: Vec<f64>, std: Vec<f64>) -> ChipMetaData {
        ChipMetaData {
            tile: tile.to_string(),
            chip_ii: ii,
            chip_idx: ChipMetaData::chip_key(tile, ii),
            chip_path: format!("store/chips/{}-{}.npy", tile, ii),
            chip_stats: ChipStats::new(mean, std),
            target_path: format!("store/targets/{}-{}.npy", tile, ii),
            target_pxcount: BTreeMap::new(),
        }
    }

    fn indices() -> Vec<ArchiveIndex> {
        vec![
            ArchiveIndex {
                tile: "30UXC".to_string(),
                chips: vec![
                    chip("30UXC", 0, vec![100.0, 10.0], vec![1.0, 2.0]),
                    chip("30UXC", 1, vec![200.0, f64::NAN], vec![3.0, f64::NAN]),
                ],
            },
            ArchiveIndex { tile: "31UDQ".to_string(), chips: Vec::new() },
            ArchiveIndex {
                tile: "33HVD".to_string(),
                chips: vec![chip("33HVD", 0, vec![300.0, 30.0], vec![5.0, 6.0])],
            },
        ]
    }

    #[test]
    fn test_merge_concatenates_in_order() {
        let merged = merge_archive_indices(&indices());
        let keys: Vec<_> = merged.chips.iter().map(|c| c.chip_idx.as_str()).collect();
        assert_eq!(keys, vec!["30UXC-0", "30UXC-1", "33HVD-0"]);

        assert_eq!(merged.chip_stats.mean, vec![200.0, 20.0]);
        assert_eq!(merged.chip_stats.std, vec![3.0, 4.0]);
    }

    #[test]
    fn test_merge_is_associative() {
        let all = indices();
        let at_once = merge_archive_indices(&all);

        let partial = merge_archive_indices(&all[..1]);
        let batched = extend_dataset_index(partial, &all[1..]);

        let keys = |d: &DataSetIndex| d.chips.iter().map(|c| c.chip_idx.clone()).collect::<Vec<_>>();
        assert_eq!(keys(&at_once), keys(&batched));
        assert_eq!(at_once.chip_stats.mean, batched.chip_stats.mean);
        assert_eq!(at_once.chip_stats.std, batched.chip_stats.std);
    }

    #[test]
    fn test_all_nan_band_stays_nan() {
        let index = ArchiveIndex {
            tile: "30UXC".to_string(),
            chips: vec![chip("30UXC", 0, vec![f64::NAN], vec![f64::NAN])],
        };
        let merged = merge_archive_indices(&[index]);
        assert!(merged.chip_stats.mean[0].is_nan());
        assert!(merged.chip_stats.std[0].is_nan());
    }

    #[test]
    fn test_empty_merge() {
        let merged = merge_archive_indices(&[]);
        assert!(merged.chips.is_empty());
        assert!(merged.chip_stats.mean.is_empty());
    }

    proptest! {
        #[test]
        fn prop_batched_merge_matches_single_merge(
            means in prop::collection::vec(prop::option::of(0.0f64..10_000.0), 1..12),
            split in 0usize..12,
        ) {
            let tiles: Vec<ArchiveIndex> = means
                .iter()
                .enumerate()
                .map(|(i, m)| {
                    let tile = format!("{:02}UXC", i + 1);
                    let value = m.unwrap_or(f64::NAN);
                    ArchiveIndex { tile: tile.clone(), chips: vec![chip(&tile, 0, vec![value], vec![value / 10.0])] }
                })
                .collect();
            let split = split.min(tiles.len());

            let at_once = merge_archive_indices(&tiles);
            let batched = extend_dataset_index(merge_archive_indices(&tiles[..split]), &tiles[split..]);

            prop_assert_eq!(at_once.chips.len(), batched.chips.len());
            let (a, b) = (at_once.chip_stats.mean[0], batched.chip_stats.mean[0]);
            prop_assert!((a.is_nan() && b.is_nan()) || a == b);
        }
    }
}
