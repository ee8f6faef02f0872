//! Detector calibration geometry and pixel validity masks.

mod descriptor;
mod mask;

pub use descriptor::{
    wavelength_from_energy, CalibrationFormat, CalibrationInput, ConfigurationError, Geometry,
};
pub use mask::Mask;
