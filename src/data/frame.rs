//! Raw detector frame: a pixel grid plus its acquisition metadata.

use super::metadata::FrameMetadata;
use ndarray::Array2;

/// One detector image with its metadata.
///
/// Frames are immutable once loaded. Stack integration takes frames by
/// value and drops the pixel grid as soon as its integrated profile has
/// been stored, so peak memory stays bounded by a single raw frame rather
/// than the full stack.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Pixel intensities, indexed (row, column).
    pixels: Array2<f64>,

    /// Acquisition metadata (energy, polarization, exposure, ...).
    pub metadata: FrameMetadata,
}

impl Frame {
    /// Create a frame from a pixel grid and metadata.
    pub fn new(pixels: Array2<f64>, metadata: FrameMetadata) -> Result<Self, FrameError> {
        let (rows, cols) = pixels.dim();
        if rows == 0 || cols == 0 {
            return Err(FrameError::EmptyPixelGrid { rows, cols });
        }
        Ok(Self { pixels, metadata })
    }

    /// Detector dimensions as (rows, columns).
    #[inline]
    pub fn dim(&self) -> (usize, usize) {
        self.pixels.dim()
    }

    /// Borrow the pixel grid.
    #[inline]
    pub fn pixels(&self) -> &Array2<f64> {
        &self.pixels
    }

    /// Pixel grid as a contiguous slice in row-major order.
    ///
    /// Returns `None` for non-standard layouts (sliced views that were
    /// cloned without re-packing).
    #[inline]
    pub fn pixels_flat(&self) -> Option<&[f64]> {
        self.pixels.as_slice()
    }
}

/// Errors creating a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    /// Pixel grid has a zero-length axis.
    EmptyPixelGrid { rows: usize, cols: usize },
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::EmptyPixelGrid { rows, cols } => {
                write!(f, "Empty pixel grid: {}x{}", rows, cols)
            }
        }
    }
}

impl std::error::Error for FrameError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::metadata::KEY_ENERGY;

    #[test]
    fn test_frame_creation() {
        let pixels = Array2::from_elem((4, 6), 1.0);
        let meta = FrameMetadata::new().with(KEY_ENERGY, 270.0);
        let frame = Frame::new(pixels, meta).unwrap();

        assert_eq!(frame.dim(), (4, 6));
        assert_eq!(frame.metadata.energy(), Some(270.0));
        assert_eq!(frame.pixels_flat().unwrap().len(), 24);
    }

    #[test]
    fn test_empty_grid_rejected() {
        let result = Frame::new(Array2::zeros((0, 10)), FrameMetadata::new());
        assert!(matches!(result, Err(FrameError::EmptyPixelGrid { .. })));
    }
}
