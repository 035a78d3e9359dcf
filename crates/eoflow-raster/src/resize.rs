//! Separable image resampling.
//!
//! Each axis is resized independently: for every output coordinate a small window of
//! source indices (the field of view) and matching kernel weights are computed, and the
//! output is the weighted sum over that window. Source indices are clamped to the input,
//! which replicates edge pixels. Axes are processed in ascending order of scale factor.

use eoflow_core::error::{EoflowError, Result};
use eoflow_core::models::UpsampleKernel;
use ndarray::{Array2, ArrayD, ArrayViewD, Axis, Ix2, IxDyn};
use std::f64::consts::PI;

/// Interpolation kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    /// Nearest neighbour
    Box,
    Linear,
    /// Keys cubic with a = -0.5
    Cubic,
    Lanczos2,
}

impl Kernel {
    /// Kernel support in source pixels at scale 1
    pub fn width(&self) -> f64 {
        match self {
            Kernel::Box => 1.0,
            Kernel::Linear => 2.0,
            Kernel::Cubic => 4.0,
            Kernel::Lanczos2 => 4.0,
        }
    }

    /// Evaluate the kernel at `x`
    pub fn eval(&self, x: f64) -> f64 {
        match self {
            Kernel::Box => {
                if (-0.5..0.5).contains(&x) {
                    1.0
                } else {
                    0.0
                }
            }
            Kernel::Linear => {
                if (-1.0..0.0).contains(&x) {
                    x + 1.0
                } else if (0.0..=1.0).contains(&x) {
                    1.0 - x
                } else {
                    0.0
                }
            }
            Kernel::Cubic => {
                let absx = x.abs();
                let absx2 = absx * absx;
                let absx3 = absx2 * absx;
                if absx <= 1.0 {
                    1.5 * absx3 - 2.5 * absx2 + 1.0
                } else if absx <= 2.0 {
                    -0.5 * absx3 + 2.5 * absx2 - 4.0 * absx + 2.0
                } else {
                    0.0
                }
            }
            Kernel::Lanczos2 => {
                if x.abs() >= 2.0 {
                    return 0.0;
                }
                let eps = f32::EPSILON as f64;
                ((PI * x).sin() * (PI * x / 2.0).sin() + eps) / (PI * PI * x * x / 2.0 + eps)
            }
        }
    }

    /// Kernel for a configured upsample choice; cubic when none is configured
    pub fn for_upsample(kernel: Option<UpsampleKernel>) -> Self {
        match kernel {
            Some(UpsampleKernel::Nearest) => Kernel::Box,
            Some(UpsampleKernel::Bilinear) => Kernel::Linear,
            Some(UpsampleKernel::Bicubic) => Kernel::Cubic,
            Some(UpsampleKernel::Lanczos) => Kernel::Lanczos2,
            None => Kernel::Cubic,
        }
    }
}

/// Requested scale: one factor for the first two axes, or one per leading axis
#[derive(Debug, Clone, PartialEq)]
pub enum ScaleFactor {
    Uniform(f64),
    PerAxis(Vec<f64>),
}

/// Reconcile a scale factor and an output shape, deriving whichever is missing.
///
/// Unspecified trailing axes keep scale 1 and their input length.
pub fn fix_scale_and_size(
    input_shape: &[usize],
    output_shape: Option<&[usize]>,
    scale_factor: Option<&ScaleFactor>,
) -> Result<(Vec<f64>, Vec<usize>)> {
    let ndim = input_shape.len();

    let scale = match scale_factor {
        Some(factor) => {
            let mut scale = match factor {
                ScaleFactor::Uniform(s) => vec![*s; 2.min(ndim)],
                ScaleFactor::PerAxis(v) => v.clone(),
            };
            if scale.len() > ndim {
                return Err(EoflowError::Shape(format!(
                    "{} scale factors given for a {}-dimensional image",
                    scale.len(),
                    ndim
                )));
            }
            if scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
                return Err(EoflowError::Shape(format!("invalid scale factor {:?}", scale)));
            }
            scale.resize(ndim, 1.0);
            Some(scale)
        }
        None => None,
    };

    let output = match output_shape {
        Some(shape) => {
            if shape.len() > ndim {
                return Err(EoflowError::Shape(format!(
                    "output shape {:?} has more axes than input shape {:?}",
                    shape, input_shape
                )));
            }
            let mut output = shape.to_vec();
            output.extend_from_slice(&input_shape[shape.len()..]);
            Some(output)
        }
        None => None,
    };

    match (scale, output) {
        (Some(scale), Some(output)) => Ok((scale, output)),
        (Some(scale), None) => {
            let output = input_shape
                .iter()
                .zip(&scale)
                .map(|(&len, &s)| (len as f64 * s).ceil() as usize)
                .collect();
            Ok((scale, output))
        }
        (None, Some(output)) => {
            if let Some(axis) = input_shape.iter().position(|&len| len == 0) {
                return Err(EoflowError::Shape(format!(
                    "cannot derive a scale factor for empty axis {}",
                    axis
                )));
            }
            let scale = output
                .iter()
                .zip(input_shape)
                .map(|(&out, &len)| out as f64 / len as f64)
                .collect();
            Ok((scale, output))
        }
        (None, None) => {
            Err(EoflowError::Shape("either a scale factor or an output shape is required".into()))
        }
    }
}

/// Per-output-coordinate weights and the source indices they apply to
#[derive(Debug, Clone)]
pub struct Contributions {
    /// `(out_length, window)` weights, each row summing to one
    pub weights: Array2<f64>,
    /// `(out_length, window)` source indices, clamped into the input
    pub field_of_view: Array2<usize>,
}

/// Compute resampling contributions for one axis.
///
/// With antialiasing, downsampling stretches the kernel by `1 / scale`.
pub fn contributions(
    in_length: usize,
    out_length: usize,
    scale: f64,
    kernel: Kernel,
    antialiasing: bool,
) -> Contributions {
    let stretch = antialiasing && scale < 1.0;
    let kernel_width = if stretch { kernel.width() / scale } else { kernel.width() };
    let window = kernel_width.ceil() as usize;
    let last = in_length.saturating_sub(1) as f64;

    let mut weights = Array2::<f64>::zeros((out_length, window));
    let mut field_of_view = Array2::<usize>::zeros((out_length, window));

    for o in 0..out_length {
        // Coordinates are 1-based here
        let out_coord = (o + 1) as f64;
        let matched = out_coord / scale + 0.5 * (1.0 - 1.0 / scale);
        let left = (matched - kernel_width / 2.0).floor();

        let mut sum = 0.0;
        for k in 0..window {
            let source = left + (k + 1) as f64;
            let x = matched - source;
            let w = if stretch { scale * kernel.eval(scale * x) } else { kernel.eval(x) };
            weights[[o, k]] = w;
            field_of_view[[o, k]] = (source - 1.0).clamp(0.0, last) as usize;
            sum += w;
        }

        if sum == 0.0 {
            sum = 1.0;
        }
        weights.row_mut(o).mapv_inplace(|w| w / sum);
    }

    Contributions { weights, field_of_view }
}

fn resize_along_axis(image: &ArrayD<f32>, axis: usize, contrib: &Contributions) -> ArrayD<f32> {
    let mut shape = image.shape().to_vec();
    shape[axis] = contrib.weights.nrows();
    let mut out = ArrayD::<f32>::zeros(IxDyn(&shape));

    for (o, mut lane) in out.axis_iter_mut(Axis(axis)).enumerate() {
        for (w, &source) in contrib.weights.row(o).iter().zip(contrib.field_of_view.row(o)) {
            if *w == 0.0 {
                continue;
            }
            lane.scaled_add(*w as f32, &image.index_axis(Axis(axis), source));
        }
    }

    out
}

/// Resize an image by a scale factor or to an output shape
pub fn resize(
    image: ArrayViewD<'_, f32>,
    scale_factor: Option<&ScaleFactor>,
    output_shape: Option<&[usize]>,
    kernel: Kernel,
    antialiasing: bool,
) -> Result<ArrayD<f32>> {
    let (scale, output) = fix_scale_and_size(image.shape(), output_shape, scale_factor)?;

    let mut axes: Vec<usize> = (0..scale.len()).collect();
    axes.sort_by(|a, b| scale[*a].total_cmp(&scale[*b]));

    let mut out = image.to_owned();
    for axis in axes {
        if scale[axis] == 1.0 {
            continue;
        }
        let contrib =
            contributions(image.shape()[axis], output[axis], scale[axis], kernel, antialiasing);
        out = resize_along_axis(&out, axis, &contrib);
    }

    Ok(out)
}

/// Upsample a band by an integer factor and cast back to 16-bit pixels
pub fn upsample_band(band: &Array2<u16>, factor: usize, kernel: Kernel) -> Result<Array2<u16>> {
    if factor == 1 {
        return Ok(band.clone());
    }

    let input = band.mapv(f32::from).into_dyn();
    let resized = resize(
        input.view(),
        Some(&ScaleFactor::Uniform(factor as f64)),
        None,
        kernel,
        true,
    )?;

    resized
        .mapv(|v| v.round().clamp(0.0, u16::MAX as f32) as u16)
        .into_dimensionality::<Ix2>()
        .map_err(|e| EoflowError::Shape(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array};
    use proptest::prelude::*;

    const KERNELS: [Kernel; 4] = [Kernel::Box, Kernel::Linear, Kernel::Cubic, Kernel::Lanczos2];

    fn ramp(rows: usize, cols: usize) -> ArrayD<f32> {
        Array::from_shape_fn((rows, cols), |(r, c)| (r * cols + c) as f32).into_dyn()
    }

    #[test]
    fn test_kernel_values() {
        assert_eq!(Kernel::Box.eval(-0.5), 1.0);
        assert_eq!(Kernel::Box.eval(0.5), 0.0);
        assert_eq!(Kernel::Linear.eval(0.25), 0.75);
        assert_eq!(Kernel::Linear.eval(-0.25), 0.75);
        assert_eq!(Kernel::Cubic.eval(0.0), 1.0);
        assert_eq!(Kernel::Cubic.eval(1.0), 0.0);
        assert_eq!(Kernel::Cubic.eval(2.5), 0.0);
        assert!((Kernel::Lanczos2.eval(0.0) - 1.0).abs() < 1e-9);
        assert_eq!(Kernel::Lanczos2.eval(2.0), 0.0);
    }

    #[test]
    fn test_kernel_for_upsample() {
        assert_eq!(Kernel::for_upsample(Some(UpsampleKernel::Nearest)), Kernel::Box);
        assert_eq!(Kernel::for_upsample(Some(UpsampleKernel::Bilinear)), Kernel::Linear);
        assert_eq!(Kernel::for_upsample(None), Kernel::Cubic);
    }

    #[test]
    fn test_unit_scale_is_identity() {
        let image = ramp(7, 5);
        for kernel in KERNELS {
            let out =
                resize(image.view(), Some(&ScaleFactor::Uniform(1.0)), None, kernel, true).unwrap();
            assert_eq!(out, image);
        }
    }

    #[test]
    fn test_upsample_shape_law() {
        let image = ramp(9, 4);
        for k in [2.0, 6.0] {
            let out = resize(image.view(), Some(&ScaleFactor::Uniform(k)), None, Kernel::Cubic, true)
                .unwrap();
            assert_eq!(out.shape(), &[(9.0 * k) as usize, (4.0 * k) as usize]);
        }
    }

    #[test]
    fn test_fix_scale_and_size() {
        let (scale, shape) = fix_scale_and_size(&[10, 20, 3], Some(&[5, 40]), None).unwrap();
        assert_eq!(scale, vec![0.5, 2.0, 1.0]);
        assert_eq!(shape, vec![5, 40, 3]);

        let (scale, shape) =
            fix_scale_and_size(&[3, 3, 2], None, Some(&ScaleFactor::Uniform(2.5))).unwrap();
        assert_eq!(scale, vec![2.5, 2.5, 1.0]);
        assert_eq!(shape, vec![8, 8, 2]);

        assert!(fix_scale_and_size(&[3, 3], None, None).is_err());
        assert!(fix_scale_and_size(&[3], None, Some(&ScaleFactor::PerAxis(vec![2.0, 2.0]))).is_err());
    }

    #[test]
    fn test_nearest_upsample_replicates() {
        let band = array![[1u16, 2], [3, 4]];
        let out = upsample_band(&band, 2, Kernel::Box).unwrap();
        assert_eq!(
            out,
            array![[1, 1, 2, 2], [1, 1, 2, 2], [3, 3, 4, 4], [3, 3, 4, 4]]
        );
    }

    #[test]
    fn test_linear_upsample_keeps_constant() {
        let band = Array2::<u16>::from_elem((5, 5), 1234);
        for factor in [2, 6] {
            let out = upsample_band(&band, factor, Kernel::Linear).unwrap();
            assert_eq!(out.dim(), (5 * factor, 5 * factor));
            assert!(out.iter().all(|v| *v == 1234));
        }
    }

    #[test]
    fn test_linear_upsample_interpolates() {
        let band = array![[0u16, 100]];
        let out = upsample_band(&band, 2, Kernel::Linear).unwrap();
        // Edges replicate, interior samples sit a quarter pixel from each source center
        assert_eq!(out.row(0).to_vec(), vec![0, 25, 75, 100]);
    }

    #[test]
    fn test_downsample_antialias_widens_window() {
        let narrow = contributions(8, 4, 0.5, Kernel::Cubic, false);
        let wide = contributions(8, 4, 0.5, Kernel::Cubic, true);
        assert_eq!(narrow.weights.ncols(), 4);
        assert_eq!(wide.weights.ncols(), 8);
    }

    proptest! {
        #[test]
        fn prop_weights_sum_to_one(
            in_length in 1usize..64,
            factor in prop::sample::select(vec![2usize, 6]),
            kernel in prop::sample::select(KERNELS.to_vec()),
        ) {
            let out_length = in_length * factor;
            let contrib = contributions(in_length, out_length, factor as f64, kernel, true);
            for row in contrib.weights.rows() {
                prop_assert!((row.sum() - 1.0).abs() < 1e-9);
            }
            prop_assert!(contrib.field_of_view.iter().all(|&i| i < in_length));
        }

        #[test]
        fn prop_downsample_weights_sum_to_one(
            out_length in 1usize..32,
            divisor in 2usize..5,
            kernel in prop::sample::select(KERNELS.to_vec()),
        ) {
            let in_length = out_length * divisor;
            let scale = 1.0 / divisor as f64;
            let contrib = contributions(in_length, out_length, scale, kernel, true);
            for row in contrib.weights.rows() {
                prop_assert!((row.sum() - 1.0).abs() < 1e-9);
            }
        }
    }
}
