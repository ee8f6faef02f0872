//! Per-energy integrator cache and the handle-resolution variants.

use super::handle::{IntegratorConfig, IntegratorHandle};
use crate::data::{FrameMetadata, KEY_ENERGY};
use crate::geometry::{CalibrationFormat, CalibrationInput, ConfigurationError, Geometry, Mask};
use std::sync::Arc;

/// Default energy bucket tolerance in eV, sized to monochromator jitter.
pub const DEFAULT_ENERGY_TOLERANCE: f64 = 0.05;

/// Get-or-build registry of integrator handles keyed by energy bucket.
///
/// Two energies within `tolerance` eV of each other share a bucket and
/// therefore a handle. The bucket key is the first energy observed for
/// that neighborhood (first-writer-wins), not a rounded value, so keys do
/// not drift across long runs of near-equal energies. At most one handle
/// is ever built per bucket; failed builds are not cached.
///
/// Construction checks the mask against the declared detector shape, so a
/// stale mask file is rejected before any frame is integrated.
#[derive(Debug)]
pub struct IntegratorCache {
    input: CalibrationInput,
    format: CalibrationFormat,
    mask: Mask,
    config: IntegratorConfig,
    tolerance: f64,
    buckets: Vec<(f64, Arc<IntegratorHandle>)>,
    builds: usize,
}

impl IntegratorCache {
    /// Create a cache with the default energy tolerance.
    pub fn new(
        input: CalibrationInput,
        format: CalibrationFormat,
        mask: Mask,
        detector: (usize, usize),
        config: IntegratorConfig,
    ) -> Result<Self, ConfigurationError> {
        Self::with_tolerance(input, format, mask, detector, config, DEFAULT_ENERGY_TOLERANCE)
    }

    /// Create a cache with an explicit energy tolerance in eV.
    pub fn with_tolerance(
        input: CalibrationInput,
        format: CalibrationFormat,
        mask: Mask,
        detector: (usize, usize),
        config: IntegratorConfig,
        tolerance: f64,
    ) -> Result<Self, ConfigurationError> {
        mask.check_shape(detector)?;
        Ok(Self {
            input,
            format,
            mask,
            config,
            tolerance,
            buckets: Vec::new(),
            builds: 0,
        })
    }

    /// Resolve an energy to its bucket's handle, building on first use.
    ///
    /// Idempotent for tolerance-equivalent energies: repeated calls return
    /// the same `Arc`.
    pub fn resolve(&mut self, energy: f64) -> Result<Arc<IntegratorHandle>, ResolveError> {
        if !energy.is_finite() {
            return Err(ToleranceResolutionError::NonFinite { energy }.into());
        }
        if energy <= 0.0 {
            return Err(ToleranceResolutionError::NonPositive { energy }.into());
        }

        if let Some((_, handle)) = self
            .buckets
            .iter()
            .find(|(key, _)| (key - energy).abs() <= self.tolerance)
        {
            return Ok(handle.clone());
        }

        let geometry = Geometry::from_calibration(&self.input, self.format, energy)?;
        let handle = Arc::new(IntegratorHandle::build(geometry, &self.mask, &self.config)?);
        log::debug!(
            "built integrator handle for energy bucket {} eV ({} buckets cached)",
            energy,
            self.buckets.len() + 1
        );
        self.buckets.push((energy, handle.clone()));
        self.builds += 1;
        Ok(handle)
    }

    /// Number of cached buckets.
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Total handle builds performed (equals bucket count unless cleared).
    #[inline]
    pub fn build_count(&self) -> usize {
        self.builds
    }

    /// Bucket key energies, in insertion order.
    pub fn bucket_energies(&self) -> Vec<f64> {
        self.buckets.iter().map(|(key, _)| *key).collect()
    }

    /// Drop all cached handles, keeping calibration and configuration.
    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}

/// Per-frame geometry: calibration fields overridden from frame metadata.
///
/// For moving-detector scans the sample-detector distance (and optionally
/// the beam center) changes frame to frame, so handles cannot be cached by
/// energy alone and are rebuilt per frame.
pub struct PerFrameGeometry {
    base: CalibrationInput,
    format: CalibrationFormat,
    mask: Mask,
    config: IntegratorConfig,
    /// Metadata key holding the per-frame detector distance.
    pub distance_key: String,
}

impl PerFrameGeometry {
    /// Create a per-frame resolver, checking the mask against the declared
    /// detector shape.
    pub fn new(
        base: CalibrationInput,
        format: CalibrationFormat,
        mask: Mask,
        detector: (usize, usize),
        config: IntegratorConfig,
        distance_key: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        mask.check_shape(detector)?;
        Ok(Self {
            base,
            format,
            mask,
            config,
            distance_key: distance_key.into(),
        })
    }

    fn resolve_for(
        &self,
        frame_index: usize,
        meta: &FrameMetadata,
    ) -> Result<Arc<IntegratorHandle>, ResolveError> {
        let energy = require_energy(frame_index, meta)?;
        let distance = meta.get_number(&self.distance_key).ok_or_else(|| {
            ResolveError::Configuration(ConfigurationError::MissingMetadata {
                frame: frame_index,
                key: self.distance_key.clone(),
            })
        })?;

        let input = CalibrationInput {
            distance: Some(distance),
            ..self.base.clone()
        };
        let geometry = Geometry::from_calibration(&input, self.format, energy)?;
        Ok(Arc::new(IntegratorHandle::build(
            geometry,
            &self.mask,
            &self.config,
        )?))
    }
}

/// Tagged union over the "resolve a handle for this frame" contract.
///
/// `Fixed` covers the common case of a stationary detector: geometry is
/// fixed and only the wavelength varies with frame energy, so handles are
/// shared through the energy-bucket cache. `PerFrame` rebuilds geometry
/// from each frame's metadata.
pub enum HandleResolver {
    Fixed(IntegratorCache),
    PerFrame(PerFrameGeometry),
}

impl HandleResolver {
    /// Resolve the handle for one frame's metadata.
    pub fn resolve_for(
        &mut self,
        frame_index: usize,
        meta: &FrameMetadata,
    ) -> Result<Arc<IntegratorHandle>, ResolveError> {
        match self {
            HandleResolver::Fixed(cache) => {
                let energy = require_energy(frame_index, meta)?;
                cache.resolve(energy)
            }
            HandleResolver::PerFrame(per_frame) => per_frame.resolve_for(frame_index, meta),
        }
    }
}

fn require_energy(frame_index: usize, meta: &FrameMetadata) -> Result<f64, ResolveError> {
    meta.energy().ok_or_else(|| {
        ResolveError::Configuration(ConfigurationError::MissingMetadata {
            frame: frame_index,
            key: KEY_ENERGY.to_string(),
        })
    })
}

/// An energy that cannot be assigned to any bucket.
#[derive(Debug, Clone, PartialEq)]
pub enum ToleranceResolutionError {
    /// NaN or infinite energy.
    NonFinite { energy: f64 },
    /// Zero or negative energy.
    NonPositive { energy: f64 },
}

impl std::fmt::Display for ToleranceResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToleranceResolutionError::NonFinite { energy } => {
                write!(f, "Energy {} is not finite", energy)
            }
            ToleranceResolutionError::NonPositive { energy } => {
                write!(f, "Energy {} is not positive", energy)
            }
        }
    }
}

impl std::error::Error for ToleranceResolutionError {}

/// Errors surfaced by handle resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// The energy itself is unusable.
    Tolerance(ToleranceResolutionError),
    /// Building the geometry or handle failed.
    Configuration(ConfigurationError),
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::Tolerance(e) => write!(f, "Cannot resolve energy bucket: {}", e),
            ResolveError::Configuration(e) => write!(f, "Cannot build integrator: {}", e),
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolveError::Tolerance(e) => Some(e),
            ResolveError::Configuration(e) => Some(e),
        }
    }
}

impl From<ToleranceResolutionError> for ResolveError {
    fn from(e: ToleranceResolutionError) -> Self {
        ResolveError::Tolerance(e)
    }
}

impl From<ConfigurationError> for ResolveError {
    fn from(e: ConfigurationError) -> Self {
        ResolveError::Configuration(e)
    }
}
