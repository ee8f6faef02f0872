//! Validated detector calibration geometry.

/// hc in eV * Angstrom, for energy/wavelength conversion.
const HC_EV_ANGSTROM: f64 = 12398.42;

/// Convert photon energy in eV to wavelength in metres.
///
/// Fails for non-positive or non-finite energies, which have no physical
/// wavelength.
pub fn wavelength_from_energy(energy_ev: f64) -> Result<f64, ConfigurationError> {
    if !energy_ev.is_finite() || energy_ev <= 0.0 {
        return Err(ConfigurationError::InvalidEnergy { energy: energy_ev });
    }
    Ok(HC_EV_ANGSTROM / energy_ev * 1e-10)
}

/// Named external calibration conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationFormat {
    /// Nika/SAS convention: distance in mm, beam center in pixels,
    /// pixel size in mm, tilt in degrees.
    Nika,
    /// pyFAI poni convention: distance and pixel size in metres, beam
    /// center in pixels, tilt in radians.
    Poni,
}

/// Raw calibration fields as read from an external source.
///
/// All fields optional so loaders can populate what their file format
/// carries; `Geometry::from_calibration` reports the first missing or
/// invalid field by name.
#[derive(Debug, Clone, Default)]
pub struct CalibrationInput {
    /// Sample-detector distance, in the format's length unit.
    pub distance: Option<f64>,
    /// Beam center x, in pixels.
    pub beam_center_x: Option<f64>,
    /// Beam center y, in pixels.
    pub beam_center_y: Option<f64>,
    /// Pixel pitch, in the format's length unit.
    pub pixel_size: Option<f64>,
    /// Detector tilt, in the format's angle unit.
    pub tilt: Option<f64>,
}

/// Immutable, validated detector geometry.
///
/// Internal units: metres for lengths, radians for tilt. One instance per
/// distinct energy bucket; the wavelength is derived from that bucket's
/// energy and all other fields are fixed by the calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    /// Sample-detector distance in metres.
    pub distance: f64,
    /// Beam center x in pixels.
    pub beam_center_x: f64,
    /// Beam center y in pixels.
    pub beam_center_y: f64,
    /// Pixel pitch in metres.
    pub pixel_size: f64,
    /// Detector tilt in radians.
    pub tilt: f64,
    /// Wavelength in metres.
    pub wavelength: f64,
}

impl Geometry {
    /// Build a geometry from an external calibration plus a photon energy.
    pub fn from_calibration(
        input: &CalibrationInput,
        format: CalibrationFormat,
        energy_ev: f64,
    ) -> Result<Self, ConfigurationError> {
        let distance = require(input.distance, "distance")?;
        let beam_center_x = require(input.beam_center_x, "beam_center_x")?;
        let beam_center_y = require(input.beam_center_y, "beam_center_y")?;
        let pixel_size = require(input.pixel_size, "pixel_size")?;
        let tilt = require(input.tilt, "tilt")?;
        let wavelength = wavelength_from_energy(energy_ev)?;

        let (length_scale, angle_scale) = match format {
            CalibrationFormat::Nika => (1e-3, std::f64::consts::PI / 180.0),
            CalibrationFormat::Poni => (1.0, 1.0),
        };

        let geometry = Self {
            distance: distance * length_scale,
            beam_center_x,
            beam_center_y,
            pixel_size: pixel_size * length_scale,
            tilt: tilt * angle_scale,
            wavelength,
        };

        if geometry.distance <= 0.0 {
            return Err(ConfigurationError::NonPositiveField {
                field: "distance",
                value: geometry.distance,
            });
        }
        if geometry.pixel_size <= 0.0 {
            return Err(ConfigurationError::NonPositiveField {
                field: "pixel_size",
                value: geometry.pixel_size,
            });
        }
        Ok(geometry)
    }

    /// Same calibration, re-derived for a different energy.
    pub fn with_energy(&self, energy_ev: f64) -> Result<Self, ConfigurationError> {
        Ok(Self {
            wavelength: wavelength_from_energy(energy_ev)?,
            ..self.clone()
        })
    }
}

fn require(value: Option<f64>, field: &'static str) -> Result<f64, ConfigurationError> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(ConfigurationError::NonFiniteField { field, value: v }),
        None => Err(ConfigurationError::MissingField { field }),
    }
}

/// Fatal construction-time configuration errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// A required calibration field is absent.
    MissingField { field: &'static str },
    /// A calibration field is NaN or infinite.
    NonFiniteField { field: &'static str, value: f64 },
    /// A calibration field must be strictly positive.
    NonPositiveField { field: &'static str, value: f64 },
    /// Energy has no physical wavelength.
    InvalidEnergy { energy: f64 },
    /// Mask dimensions do not match the detector.
    MaskShapeMismatch {
        mask: (usize, usize),
        detector: (usize, usize),
    },
    /// Every detector pixel is masked out.
    NoValidPixels,
    /// A frame is missing a metadata key the operation requires.
    MissingMetadata { frame: usize, key: String },
}

impl std::fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigurationError::MissingField { field } => {
                write!(f, "Missing calibration field '{}'", field)
            }
            ConfigurationError::NonFiniteField { field, value } => {
                write!(f, "Calibration field '{}' is not finite: {}", field, value)
            }
            ConfigurationError::NonPositiveField { field, value } => {
                write!(f, "Calibration field '{}' must be positive: {}", field, value)
            }
            ConfigurationError::InvalidEnergy { energy } => {
                write!(f, "Energy {} eV has no physical wavelength", energy)
            }
            ConfigurationError::MaskShapeMismatch { mask, detector } => write!(
                f,
                "Mask shape {:?} does not match detector shape {:?}",
                mask, detector
            ),
            ConfigurationError::NoValidPixels => {
                write!(f, "Mask leaves no valid detector pixels")
            }
            ConfigurationError::MissingMetadata { frame, key } => {
                write!(f, "Frame {} is missing required metadata key '{}'", frame, key)
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}
