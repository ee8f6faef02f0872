//! Pixel validity mask.

use super::descriptor::ConfigurationError;
use ndarray::Array2;

/// Boolean validity grid aligned to the detector, true = valid pixel.
///
/// Shared read-only across every integrator handle built from the same
/// calibration; masked pixels contribute to no output bin.
#[derive(Clone, Debug)]
pub struct Mask {
    valid: Array2<bool>,
}

impl Mask {
    /// Build a mask from a validity grid.
    pub fn new(valid: Array2<bool>) -> Self {
        Self { valid }
    }

    /// All-valid mask for a detector of the given dimensions.
    pub fn all_valid(rows: usize, cols: usize) -> Self {
        Self {
            valid: Array2::from_elem((rows, cols), true),
        }
    }

    /// Mask dimensions as (rows, columns).
    #[inline]
    pub fn dim(&self) -> (usize, usize) {
        self.valid.dim()
    }

    /// Whether the pixel at (row, col) is valid.
    #[inline]
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        self.valid[(row, col)]
    }

    /// Number of valid pixels.
    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    /// Check this mask against a detector shape.
    pub fn check_shape(&self, detector: (usize, usize)) -> Result<(), ConfigurationError> {
        if self.dim() != detector {
            return Err(ConfigurationError::MaskShapeMismatch {
                mask: self.dim(),
                detector,
            });
        }
        Ok(())
    }
}
