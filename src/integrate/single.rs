//! Single-frame integration: apply one handle to one frame.

use super::handle::IntegratorHandle;
use crate::data::{Frame, IntegrationResult};
use ndarray::Array2;
use rayon::prelude::*;

/// Pixels per rayon work chunk when folding the bin table.
const CHUNK: usize = 16 * 1024;

/// Integrate one frame with one handle.
///
/// Pure function of its inputs: the handle is read-only and no shared
/// state is touched, so many frames may be integrated against the same
/// handle concurrently. Each bin is the mean of its valid, finite pixel
/// values; bins with no contributing pixels are NaN. If the frame carries
/// `exposure` metadata the profile is additionally divided by the exposure
/// time, making bins comparable across different exposures.
pub fn integrate(
    handle: &IntegratorHandle,
    frame: &Frame,
) -> Result<IntegrationResult, FrameIntegrationError> {
    if frame.dim() != handle.detector_dim() {
        return Err(FrameIntegrationError::ShapeMismatch {
            expected: handle.detector_dim(),
            got: frame.dim(),
        });
    }

    let packed = frame.pixels().as_standard_layout();
    let flat = packed
        .as_slice()
        .expect("standard layout array is contiguous");

    let n_rows = handle.n_chi_rows();
    let n_q = handle.q_centers().len();
    let n_bins = n_rows * n_q;

    // Parallel fold of the valid-pixel table into (sum, count) pairs.
    let (sums, counts) = handle
        .bins()
        .par_chunks(CHUNK)
        .fold(
            || (vec![0.0f64; n_bins], vec![0u32; n_bins]),
            |(mut sums, mut counts), chunk| {
                for bin in chunk {
                    let value = flat[bin.flat as usize];
                    // Hot or dead pixels recorded as NaN/inf carry no signal.
                    if value.is_finite() {
                        let idx = bin.chi_bin as usize * n_q + bin.q_bin as usize;
                        sums[idx] += value;
                        counts[idx] += 1;
                    }
                }
                (sums, counts)
            },
        )
        .reduce(
            || (vec![0.0f64; n_bins], vec![0u32; n_bins]),
            |(mut a_sums, mut a_counts), (b_sums, b_counts)| {
                for i in 0..n_bins {
                    a_sums[i] += b_sums[i];
                    a_counts[i] += b_counts[i];
                }
                (a_sums, a_counts)
            },
        );

    let scale = match frame.metadata.exposure() {
        Some(t) if t.is_finite() && t > 0.0 => 1.0 / t,
        _ => 1.0,
    };

    let intensity = Array2::from_shape_fn((n_rows, n_q), |(i, j)| {
        let idx = i * n_q + j;
        if counts[idx] == 0 {
            f64::NAN
        } else {
            sums[idx] / counts[idx] as f64 * scale
        }
    });

    IntegrationResult::new(
        handle.q_centers().to_vec(),
        handle.chi_centers().map(<[f64]>::to_vec),
        intensity,
    )
    .map_err(|source| FrameIntegrationError::Profile {
        detail: source.to_string(),
    })
}

/// Recoverable per-frame integration failures.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameIntegrationError {
    /// Frame dimensions do not match the handle's detector.
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },
    /// The assembled profile violated a coordinate invariant.
    Profile { detail: String },
}

impl std::fmt::Display for FrameIntegrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameIntegrationError::ShapeMismatch { expected, got } => write!(
                f,
                "Frame shape {:?} does not match detector shape {:?}",
                got, expected
            ),
            FrameIntegrationError::Profile { detail } => {
                write!(f, "Profile assembly failed: {}", detail)
            }
        }
    }
}

impl std::error::Error for FrameIntegrationError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FrameMetadata, KEY_EXPOSURE};
    use crate::geometry::{CalibrationFormat, CalibrationInput, Geometry, Mask};
    use crate::integrate::handle::{IntegrationKind, IntegratorConfig};
    use ndarray::Array2;

    fn test_handle(kind: IntegrationKind) -> IntegratorHandle {
        let input = CalibrationInput {
            distance: Some(131.06),
            beam_center_x: Some(561.76 / 16.0),
            beam_center_y: Some(571.67 / 16.0),
            pixel_size: Some(0.027 * 16.0),
            tilt: Some(0.0),
        };
        let geometry =
            Geometry::from_calibration(&input, CalibrationFormat::Nika, 270.0).unwrap();
        IntegratorHandle::build(
            geometry,
            &Mask::all_valid(64, 64),
            &IntegratorConfig {
                n_q_bins: 30,
                n_chi_bins: 12,
                kind,
            },
        )
        .unwrap()
    }

    fn flat_frame(value: f64) -> Frame {
        Frame::new(Array2::from_elem((64, 64), value), FrameMetadata::new()).unwrap()
    }

    #[test]
    fn test_flat_image_gives_constant_profile() {
        let handle = test_handle(IntegrationKind::Radial);
        let result = integrate(&handle, &flat_frame(7.5)).unwrap();

        for &v in result.intensity().iter() {
            assert!(v.is_nan() || (v - 7.5).abs() < 1e-9);
        }
        // The populated q range must actually carry data.
        let finite = result.intensity().iter().filter(|v| v.is_finite()).count();
        assert!(finite > 20);
    }

    #[test]
    fn test_flat_image_full_detector_geometry() {
        // Real beamline calibration: SDD 131.06 mm, beam center
        // (561.76, 571.67) px on a 1024x1024 detector.
        let input = CalibrationInput {
            distance: Some(131.06),
            beam_center_x: Some(561.76),
            beam_center_y: Some(571.67),
            pixel_size: Some(0.027),
            tilt: Some(0.0),
        };
        let geometry =
            Geometry::from_calibration(&input, CalibrationFormat::Nika, 270.0).unwrap();
        let handle = IntegratorHandle::build(
            geometry,
            &Mask::all_valid(1024, 1024),
            &IntegratorConfig {
                n_q_bins: 200,
                n_chi_bins: 1,
                kind: IntegrationKind::Radial,
            },
        )
        .unwrap();

        let frame =
            Frame::new(Array2::from_elem((1024, 1024), 3.0), FrameMetadata::new()).unwrap();
        let result = integrate(&handle, &frame).unwrap();

        for &v in result.intensity().iter() {
            assert!(v.is_nan() || (v - 3.0).abs() < 1e-9);
        }
        assert!(result.intensity().iter().filter(|v| v.is_finite()).count() > 150);
    }

    #[test]
    fn test_q_strictly_ascending_unique() {
        let handle = test_handle(IntegrationKind::Cake);
        let result = integrate(&handle, &flat_frame(1.0)).unwrap();
        assert!(result.q().windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let handle = test_handle(IntegrationKind::Cake);
        let wrong = Frame::new(Array2::zeros((32, 64)), FrameMetadata::new()).unwrap();
        assert!(matches!(
            integrate(&handle, &wrong),
            Err(FrameIntegrationError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_masked_pixels_never_influence_output() {
        let input = CalibrationInput {
            distance: Some(131.06),
            beam_center_x: Some(32.0),
            beam_center_y: Some(32.0),
            pixel_size: Some(0.432),
            tilt: Some(0.0),
        };
        let geometry =
            Geometry::from_calibration(&input, CalibrationFormat::Nika, 270.0).unwrap();

        let mut valid = Array2::from_elem((64, 64), true);
        for c in 0..64 {
            valid[(20, c)] = false;
        }
        let handle = IntegratorHandle::build(
            geometry,
            &Mask::new(valid),
            &IntegratorConfig::default(),
        )
        .unwrap();

        let clean = flat_frame(3.0);
        let mut poisoned_pixels = clean.pixels().clone();
        for c in 0..64 {
            poisoned_pixels[(20, c)] = 1e30;
        }
        let poisoned = Frame::new(poisoned_pixels, FrameMetadata::new()).unwrap();

        let a = integrate(&handle, &clean).unwrap();
        let b = integrate(&handle, &poisoned).unwrap();
        for (x, y) in a.intensity().iter().zip(b.intensity().iter()) {
            assert!((x.is_nan() && y.is_nan()) || x == y);
        }
    }

    #[test]
    fn test_exposure_normalization() {
        let handle = test_handle(IntegrationKind::Radial);

        let short = Frame::new(
            Array2::from_elem((64, 64), 2.0),
            FrameMetadata::new().with(KEY_EXPOSURE, 1.0),
        )
        .unwrap();
        let long = Frame::new(
            Array2::from_elem((64, 64), 8.0),
            FrameMetadata::new().with(KEY_EXPOSURE, 4.0),
        )
        .unwrap();

        let a = integrate(&handle, &short).unwrap();
        let b = integrate(&handle, &long).unwrap();
        for (x, y) in a.intensity().iter().zip(b.intensity().iter()) {
            assert!((x.is_nan() && y.is_nan()) || (x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_nonfinite_pixels_skipped() {
        let handle = test_handle(IntegrationKind::Radial);
        let mut pixels = Array2::from_elem((64, 64), 5.0);
        pixels[(1, 1)] = f64::NAN;
        pixels[(2, 2)] = f64::INFINITY;
        let frame = Frame::new(pixels, FrameMetadata::new()).unwrap();

        let result = integrate(&handle, &frame).unwrap();
        for &v in result.intensity().iter() {
            assert!(v.is_nan() || (v - 5.0).abs() < 1e-9);
        }
    }
}
