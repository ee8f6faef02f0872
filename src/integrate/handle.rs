//! Precomputed pixel-to-bin mapping for one geometry and mask.

use crate::geometry::{ConfigurationError, Geometry, Mask};
use nalgebra::{Rotation3, Vector3};

/// Output kind of an integrator, selected at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationKind {
    /// 1-D q profile.
    Radial,
    /// 2-D chi x q profile.
    Cake,
}

/// Binning configuration for integrator handles.
#[derive(Debug, Clone)]
pub struct IntegratorConfig {
    /// Number of q bins.
    pub n_q_bins: usize,
    /// Number of chi bins over (-180, 180] degrees. Ignored for radial.
    pub n_chi_bins: usize,
    /// Output kind.
    pub kind: IntegrationKind,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            n_q_bins: 500,
            n_chi_bins: 180,
            kind: IntegrationKind::Cake,
        }
    }
}

/// One valid pixel's target bins, in the handle's flat pixel order.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PixelBin {
    /// Row-major flat pixel index.
    pub flat: u32,
    /// chi bin, 0 for radial handles.
    pub chi_bin: u16,
    /// q bin.
    pub q_bin: u16,
}

/// Immutable pixel-to-(chi, q) binning table bound to one geometry and mask.
///
/// Built once per energy bucket and never mutated afterwards, so a handle
/// behind an `Arc` is safe to share across frames integrated concurrently.
#[derive(Debug)]
pub struct IntegratorHandle {
    geometry: Geometry,
    detector_dim: (usize, usize),
    kind: IntegrationKind,
    q_centers: Vec<f64>,
    chi_centers: Option<Vec<f64>>,
    bins: Vec<PixelBin>,
}

impl IntegratorHandle {
    /// Precompute the binning table for `geometry` over the valid pixels of
    /// `mask`.
    ///
    /// q is reported in inverse Angstrom; the q range spans the valid
    /// pixels of this detector at this wavelength. chi is in degrees,
    /// measured from the +x detector axis, in (-180, 180].
    pub fn build(
        geometry: Geometry,
        mask: &Mask,
        config: &IntegratorConfig,
    ) -> Result<Self, ConfigurationError> {
        let (rows, cols) = mask.dim();
        if mask.valid_count() == 0 {
            return Err(ConfigurationError::NoValidPixels);
        }
        if config.n_q_bins == 0 || config.n_q_bins > u16::MAX as usize {
            return Err(ConfigurationError::NonPositiveField {
                field: "n_q_bins",
                value: config.n_q_bins as f64,
            });
        }
        let n_chi = match config.kind {
            IntegrationKind::Radial => 1,
            IntegrationKind::Cake => config.n_chi_bins,
        };
        if n_chi == 0 || n_chi > u16::MAX as usize {
            return Err(ConfigurationError::NonPositiveField {
                field: "n_chi_bins",
                value: n_chi as f64,
            });
        }

        // Pass 1: q/chi per valid pixel, tracking the q extent.
        let tilt = Rotation3::from_axis_angle(&Vector3::x_axis(), geometry.tilt);
        let offset = Vector3::new(0.0, 0.0, geometry.distance);
        let lambda_angstrom = geometry.wavelength * 1e10;

        let mut coords = Vec::with_capacity(mask.valid_count());
        let mut q_min = f64::INFINITY;
        let mut q_max = f64::NEG_INFINITY;
        for r in 0..rows {
            for c in 0..cols {
                if !mask.is_valid(r, c) {
                    continue;
                }
                let x = (c as f64 - geometry.beam_center_x) * geometry.pixel_size;
                let y = (r as f64 - geometry.beam_center_y) * geometry.pixel_size;
                let p = tilt * Vector3::new(x, y, 0.0) + offset;

                let radial = p.x.hypot(p.y);
                let two_theta = radial.atan2(p.z);
                let q = 4.0 * std::f64::consts::PI * (two_theta / 2.0).sin() / lambda_angstrom;
                let chi = p.y.atan2(p.x).to_degrees();

                q_min = q_min.min(q);
                q_max = q_max.max(q);
                coords.push((r * cols + c, q, chi));
            }
        }

        // Degenerate extent (single valid radius) still needs a bin width
        // wide enough to keep the centers strictly ascending.
        let q_width = if q_max > q_min {
            (q_max - q_min) / config.n_q_bins as f64
        } else {
            (q_max.abs() * 1e-9).max(1e-12)
        };
        let chi_width = 360.0 / n_chi as f64;

        // Pass 2: assign bins.
        let bins = coords
            .into_iter()
            .map(|(flat, q, chi)| {
                let q_bin = (((q - q_min) / q_width) as usize).min(config.n_q_bins - 1);
                let chi_bin = match config.kind {
                    IntegrationKind::Radial => 0,
                    IntegrationKind::Cake => {
                        (((chi + 180.0) / chi_width) as usize).min(n_chi - 1)
                    }
                };
                PixelBin {
                    flat: flat as u32,
                    chi_bin: chi_bin as u16,
                    q_bin: q_bin as u16,
                }
            })
            .collect();

        let q_centers = (0..config.n_q_bins)
            .map(|i| q_min + (i as f64 + 0.5) * q_width)
            .collect();
        let chi_centers = match config.kind {
            IntegrationKind::Radial => None,
            IntegrationKind::Cake => Some(
                (0..n_chi)
                    .map(|i| -180.0 + (i as f64 + 0.5) * chi_width)
                    .collect(),
            ),
        };

        Ok(Self {
            geometry,
            detector_dim: (rows, cols),
            kind: config.kind,
            q_centers,
            chi_centers,
            bins,
        })
    }

    /// Geometry this handle was built from.
    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Expected frame dimensions as (rows, columns).
    #[inline]
    pub fn detector_dim(&self) -> (usize, usize) {
        self.detector_dim
    }

    /// Output kind.
    #[inline]
    pub fn kind(&self) -> IntegrationKind {
        self.kind
    }

    /// q bin centers in inverse Angstrom, strictly ascending.
    #[inline]
    pub fn q_centers(&self) -> &[f64] {
        &self.q_centers
    }

    /// chi bin centers in degrees, for cake handles.
    #[inline]
    pub fn chi_centers(&self) -> Option<&[f64]> {
        self.chi_centers.as_deref()
    }

    /// Number of chi rows in the output (1 for radial).
    #[inline]
    pub(crate) fn n_chi_rows(&self) -> usize {
        self.chi_centers.as_ref().map(|c| c.len()).unwrap_or(1)
    }

    /// Valid-pixel bin table.
    #[inline]
    pub(crate) fn bins(&self) -> &[PixelBin] {
        &self.bins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{CalibrationFormat, CalibrationInput};
    use ndarray::Array2;

    fn test_geometry(energy: f64) -> Geometry {
        let input = CalibrationInput {
            distance: Some(131.06),
            beam_center_x: Some(15.5),
            beam_center_y: Some(16.5),
            pixel_size: Some(0.027),
            tilt: Some(0.0),
        };
        Geometry::from_calibration(&input, CalibrationFormat::Nika, energy).unwrap()
    }

    fn small_config() -> IntegratorConfig {
        IntegratorConfig {
            n_q_bins: 20,
            n_chi_bins: 8,
            kind: IntegrationKind::Cake,
        }
    }

    #[test]
    fn test_build_covers_valid_pixels() {
        let mask = Mask::all_valid(32, 32);
        let handle = IntegratorHandle::build(test_geometry(270.0), &mask, &small_config())
            .unwrap();

        assert_eq!(handle.detector_dim(), (32, 32));
        assert_eq!(handle.bins().len(), 32 * 32);
        assert_eq!(handle.q_centers().len(), 20);
        assert_eq!(handle.chi_centers().unwrap().len(), 8);
    }

    #[test]
    fn test_q_centers_strictly_ascending() {
        let mask = Mask::all_valid(32, 32);
        let handle = IntegratorHandle::build(test_geometry(270.0), &mask, &small_config())
            .unwrap();
        assert!(handle.q_centers().windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_masked_pixels_excluded_from_table() {
        let mut valid = Array2::from_elem((32, 32), true);
        valid[(0, 0)] = false;
        valid[(10, 20)] = false;
        let mask = Mask::new(valid);

        let handle = IntegratorHandle::build(test_geometry(270.0), &mask, &small_config())
            .unwrap();
        assert_eq!(handle.bins().len(), 32 * 32 - 2);
        assert!(handle.bins().iter().all(|b| b.flat != 10 * 32 + 20));
    }

    #[test]
    fn test_all_masked_is_error() {
        let mask = Mask::new(Array2::from_elem((8, 8), false));
        let err = IntegratorHandle::build(test_geometry(270.0), &mask, &small_config())
            .unwrap_err();
        assert_eq!(err, ConfigurationError::NoValidPixels);
    }

    #[test]
    fn test_radial_has_single_chi_row() {
        let mask = Mask::all_valid(16, 16);
        let config = IntegratorConfig {
            kind: IntegrationKind::Radial,
            ..small_config()
        };
        let handle = IntegratorHandle::build(test_geometry(270.0), &mask, &config).unwrap();
        assert!(handle.chi_centers().is_none());
        assert_eq!(handle.n_chi_rows(), 1);
        assert!(handle.bins().iter().all(|b| b.chi_bin == 0));
    }

    #[test]
    fn test_higher_energy_shifts_q_range_up() {
        // Same pixel subtends the same angle; shorter wavelength means
        // larger q for the outermost pixel.
        let mask = Mask::all_valid(32, 32);
        let low = IntegratorHandle::build(test_geometry(270.0), &mask, &small_config())
            .unwrap();
        let high = IntegratorHandle::build(test_geometry(540.0), &mask, &small_config())
            .unwrap();

        let low_max = *low.q_centers().last().unwrap();
        let high_max = *high.q_centers().last().unwrap();
        assert!(high_max > 1.9 * low_max && high_max < 2.1 * low_max);
    }
}
