//! NaN-aware band statistics.

use eoflow_core::models::ChipStats;
use ndarray::{ArrayView3, Axis};

/// Mean of the non-NaN values, NaN when there are none
pub fn nanmean<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Per-band mean and population standard deviation of a `(band, y, x)` composite,
/// ignoring NaN pixels. Bands with no valid pixel get NaN for both.
pub fn chip_stats(chip: ArrayView3<'_, f32>) -> ChipStats {
    let mut mean = Vec::with_capacity(chip.len_of(Axis(0)));
    let mut std = Vec::with_capacity(chip.len_of(Axis(0)));

    for band in chip.axis_iter(Axis(0)) {
        let m = nanmean(band.iter().map(|v| f64::from(*v)));
        let var = nanmean(band.iter().map(|v| {
            let d = f64::from(*v) - m;
            d * d
        }));
        mean.push(m);
        std.push(var.sqrt());
    }

    ChipStats::new(mean, std)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    #[test]
    fn test_nanmean() {
        assert_eq!(nanmean([1.0, f64::NAN, 3.0]), 2.0);
        assert!(nanmean([f64::NAN]).is_nan());
        assert!(nanmean(Vec::new()).is_nan());
    }

    #[test]
    fn test_chip_stats_ignore_nan() {
        let chip = array![[[1.0f32, 3.0], [f32::NAN, 5.0]], [[2.0, 2.0], [2.0, 2.0]]];
        let stats = chip_stats(chip.view());

        assert_eq!(stats.band_count(), 2);
        assert_eq!(stats.mean[0], 3.0);
        assert!((stats.std[0] - (8.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(stats.mean[1], 2.0);
        assert_eq!(stats.std[1], 0.0);
    }

    #[test]
    fn test_all_nan_band() {
        let chip = Array3::<f32>::from_elem((1, 2, 2), f32::NAN);
        let stats = chip_stats(chip.view());
        assert!(stats.mean[0].is_nan());
        assert!(stats.std[0].is_nan());
    }
}
