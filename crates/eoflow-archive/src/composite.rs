//! Temporal compositing of a masked revisit stack.
//!
//! Revisits are ordered oldest first. `FIRST` keeps, per pixel, the oldest revisit that is
//! not masked; `LAST` keeps the most recent one. A pixel masked in every revisit is NaN in
//! every band.

use eoflow_core::error::{EoflowError, Result};
use eoflow_core::models::CompositeStrategy;
use ndarray::{Array3, ArrayView3, ArrayView4};

/// Fail unless the strategy has a compositing rule
pub fn ensure_supported(strategy: CompositeStrategy) -> Result<()> {
    match strategy {
        CompositeStrategy::First | CompositeStrategy::Last => Ok(()),
        CompositeStrategy::Mean
        | CompositeStrategy::Max
        | CompositeStrategy::ScenewiseMax
        | CompositeStrategy::Sequence => {
            Err(EoflowError::UnsupportedComposite { strategy: strategy.to_string() })
        }
    }
}

/// All-NaN composite of the given shape
pub fn nan_chip(bands: usize, height: usize, width: usize) -> Array3<f32> {
    Array3::from_elem((bands, height, width), f32::NAN)
}

/// Composite a `(revisit, band, y, x)` stack under a `(revisit, y, x)` mask
pub fn composite(
    stack: ArrayView4<'_, u16>,
    mask: ArrayView3<'_, bool>,
    strategy: CompositeStrategy,
) -> Result<Array3<f32>> {
    ensure_supported(strategy)?;

    let (revisits, bands, height, width) = stack.dim();
    if mask.dim() != (revisits, height, width) {
        return Err(EoflowError::Shape(format!(
            "mask {:?} does not match stack {:?}",
            mask.dim(),
            stack.dim()
        )));
    }

    let order: Vec<usize> = match strategy {
        CompositeStrategy::Last => (0..revisits).rev().collect(),
        _ => (0..revisits).collect(),
    };

    let mut out = nan_chip(bands, height, width);
    for y in 0..height {
        for x in 0..width {
            let Some(&r) = order.iter().find(|&&r| !mask[[r, y, x]]) else {
                continue;
            };
            for b in 0..bands {
                out[[b, y, x]] = f32::from(stack[[r, b, y, x]]);
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, Array4};

    fn nodata_mask(stack: &Array4<u16>) -> Array3<bool> {
        let (r, _, h, w) = stack.dim();
        Array3::from_shape_fn((r, h, w), |(r, y, x)| {
            stack.slice(ndarray::s![r, .., y, x]).iter().all(|v| *v == 0)
        })
    }

    #[test]
    fn test_no_data_revisits_are_skipped() {
        // 3 revisits, 1 band, 2x2: only the middle revisit has data
        let mut stack = Array4::<u16>::zeros((3, 1, 2, 2));
        stack.slice_mut(ndarray::s![1, .., .., ..]).fill(5);
        let mask = nodata_mask(&stack);

        for strategy in [CompositeStrategy::First, CompositeStrategy::Last] {
            let out = composite(stack.view(), mask.view(), strategy).unwrap();
            assert_eq!(out.dim(), (1, 2, 2));
            assert!(out.iter().all(|v| *v == 5.0));
        }
    }

    #[test]
    fn test_first_and_last_pick_opposite_ends() {
        let mut stack = Array4::<u16>::zeros((3, 2, 1, 2));
        for r in 0..3 {
            stack.slice_mut(ndarray::s![r, .., .., ..]).fill((r as u16 + 1) * 10);
        }
        let mut mask = Array3::from_elem((3, 1, 2), false);
        // Most recent revisit missing at the second pixel
        mask[[2, 0, 1]] = true;

        let first = composite(stack.view(), mask.view(), CompositeStrategy::First).unwrap();
        assert_eq!(first[[0, 0, 0]], 10.0);
        assert_eq!(first[[1, 0, 1]], 10.0);

        let last = composite(stack.view(), mask.view(), CompositeStrategy::Last).unwrap();
        assert_eq!(last[[0, 0, 0]], 30.0);
        assert_eq!(last[[1, 0, 1]], 20.0);
    }

    #[test]
    fn test_fully_masked_pixel_is_nan() {
        let stack = Array4::<u16>::from_elem((2, 2, 1, 1), 7);
        let mask = Array3::from_elem((2, 1, 1), true);
        let out = composite(stack.view(), mask.view(), CompositeStrategy::Last).unwrap();
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_unsupported_strategies() {
        let stack = Array4::<u16>::zeros((1, 1, 1, 1));
        let mask = Array3::from_elem((1, 1, 1), false);
        for strategy in [
            CompositeStrategy::Mean,
            CompositeStrategy::Max,
            CompositeStrategy::ScenewiseMax,
            CompositeStrategy::Sequence,
        ] {
            let result = composite(stack.view(), mask.view(), strategy);
            assert!(matches!(result, Err(EoflowError::UnsupportedComposite { .. })));
        }
    }

    #[test]
    fn test_mask_shape_mismatch() {
        let stack = Array4::<u16>::zeros((2, 1, 2, 2));
        let mask = Array3::from_elem((1, 2, 2), false);
        assert!(composite(stack.view(), mask.view(), CompositeStrategy::First).is_err());
    }
}
