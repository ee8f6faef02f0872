//! Integrated chi/q profiles, window-averaging and anisotropy helpers.

use ndarray::{Array1, Array2};

/// Wedge selection for anisotropy-ratio calculations.
///
/// The conventional choice puts the first wedge parallel to the beam
/// polarization and the second perpendicular to it, 90 degrees away.
#[derive(Debug, Clone)]
pub struct AnisotropyOptions {
    /// Center of the first chi wedge in degrees. Defaults to 0.
    pub chi_center1: Option<f64>,
    /// Center of the second chi wedge in degrees. Defaults to
    /// `chi_center1 - 90`.
    pub chi_center2: Option<f64>,
    /// Wedge half-width in degrees per side.
    pub chi_width: f64,
    /// Also integrate the wedges reflected 180 degrees from each center,
    /// doubling the pixels contributing to each side of the ratio.
    pub reflect_wedges: bool,
}

impl Default for AnisotropyOptions {
    fn default() -> Self {
        Self {
            chi_center1: None,
            chi_center2: None,
            chi_width: 5.0,
            reflect_wedges: false,
        }
    }
}

/// An azimuthally integrated profile.
///
/// Radial results hold a single chi row; cake (chi x q) results hold one
/// row per chi bin. Bins that received no valid pixels are NaN, never
/// zero, so absence of data stays distinguishable from absence of signal.
#[derive(Clone, Debug)]
pub struct IntegrationResult {
    /// q bin centers, strictly ascending.
    q: Vec<f64>,
    /// chi bin centers in degrees, present for cake integration only.
    chi: Option<Vec<f64>>,
    /// Intensity, shape (n_chi or 1, n_q).
    intensity: Array2<f64>,
}

impl IntegrationResult {
    /// Build a result, validating coordinate invariants.
    pub fn new(
        q: Vec<f64>,
        chi: Option<Vec<f64>>,
        intensity: Array2<f64>,
    ) -> Result<Self, ProfileError> {
        if q.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ProfileError::NonAscendingQ);
        }
        let rows = chi.as_ref().map(|c| c.len()).unwrap_or(1);
        if intensity.dim() != (rows, q.len()) {
            return Err(ProfileError::ShapeMismatch {
                expected: (rows, q.len()),
                got: intensity.dim(),
            });
        }
        Ok(Self { q, chi, intensity })
    }

    /// q bin centers.
    #[inline]
    pub fn q(&self) -> &[f64] {
        &self.q
    }

    /// chi bin centers in degrees, if this is a cake result.
    #[inline]
    pub fn chi(&self) -> Option<&[f64]> {
        self.chi.as_deref()
    }

    /// Intensity grid, shape (n_chi or 1, n_q).
    #[inline]
    pub fn intensity(&self) -> &Array2<f64> {
        &self.intensity
    }

    /// Number of q bins.
    #[inline]
    pub fn n_q(&self) -> usize {
        self.q.len()
    }

    /// Collapse to a 1-D q profile by averaging over chi, ignoring NaN.
    pub fn radial(&self) -> Array1<f64> {
        let (_, n_q) = self.intensity.dim();
        Array1::from_shape_fn(n_q, |j| nan_mean(self.intensity.column(j).iter().copied()))
    }

    /// Average over a q window centered at `q`, returning one value per chi
    /// row. Width defaults to 0.1 * q per side.
    pub fn slice_q(&self, q: f64, q_width: Option<f64>) -> Array1<f64> {
        let half = q_width.unwrap_or(0.1 * q);
        let (lo, hi) = (q - half, q + half);
        let cols: Vec<usize> = self
            .q
            .iter()
            .enumerate()
            .filter(|(_, &qv)| qv >= lo && qv <= hi)
            .map(|(j, _)| j)
            .collect();

        let (n_chi, _) = self.intensity.dim();
        Array1::from_shape_fn(n_chi, |i| {
            nan_mean(cols.iter().map(|&j| self.intensity[(i, j)]))
        })
    }

    /// Average over a chi wedge centered at `chi` degrees, returning one
    /// value per q bin. `None` for radial results, which carry no chi axis.
    ///
    /// A window that pokes past either end of the chi range wraps around,
    /// and a center entirely out of range is first shifted into range by a
    /// multiple of 360.
    pub fn slice_chi(&self, chi: f64, chi_width: f64) -> Option<Array1<f64>> {
        let axis = self.chi.as_deref()?;
        let chi_min = axis.iter().copied().fold(f64::INFINITY, f64::min);
        let chi_max = axis.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let mut begin = chi - chi_width;
        let mut end = chi + chi_width;

        // Window entirely below or above range: translate by whole turns.
        if begin < chi_min && end < chi_min {
            let nshift = ((chi_min - end) / 360.0).floor() + 1.0;
            begin += 360.0 * nshift;
            end += 360.0 * nshift;
        } else if begin > chi_max && end > chi_max {
            let nshift = ((begin - chi_max) / 360.0).floor() + 1.0;
            begin -= 360.0 * nshift;
            end -= 360.0 * nshift;
        }

        let selected: Vec<usize> = axis
            .iter()
            .enumerate()
            .filter(|(_, &c)| {
                if begin < chi_min && end > chi_max {
                    // Window covers the whole range.
                    true
                } else if begin < chi_min {
                    // Wraps under: low stub plus a full turn up.
                    c <= end || c >= begin + 360.0
                } else if end > chi_max {
                    // Wraps over: high stub plus a full turn down.
                    c >= begin || c <= end - 360.0
                } else {
                    c >= begin && c <= end
                }
            })
            .map(|(i, _)| i)
            .collect();

        let (_, n_q) = self.intensity.dim();
        Some(Array1::from_shape_fn(n_q, |j| {
            nan_mean(selected.iter().map(|&i| self.intensity[(i, j)]))
        }))
    }

    /// Anisotropy ratio `(I_1 - I_2) / (I_1 + I_2)` per q bin, where `I_1`
    /// and `I_2` are chi-wedge averages taken with [`slice_chi`].
    ///
    /// With `reflect_wedges` each side also sums the wedge 180 degrees
    /// across the pattern, which follows Friedel symmetry for elastic
    /// scattering. `None` for radial results, which carry no chi axis.
    ///
    /// Bins where both wedges are empty, or where the sum vanishes, come
    /// out NaN.
    ///
    /// [`slice_chi`]: IntegrationResult::slice_chi
    pub fn anisotropy_ratio(&self, opts: &AnisotropyOptions) -> Option<Array1<f64>> {
        let chi1 = opts.chi_center1.unwrap_or(0.0);
        let chi2 = opts.chi_center2.unwrap_or(chi1 - 90.0);

        let angular = (chi1 - chi2).rem_euclid(360.0);
        let separation = angular.min(360.0 - angular);
        if (separation - 90.0).abs() > 2.0 {
            log::warn!(
                "Anisotropy wedges at {chi1} and {chi2} degrees are {separation} degrees \
                 apart, not the conventional 90"
            );
        }

        let mut i1 = self.slice_chi(chi1, opts.chi_width)?;
        let mut i2 = self.slice_chi(chi2, opts.chi_width)?;
        if opts.reflect_wedges {
            i1 = i1 + self.slice_chi(chi1 + 180.0, opts.chi_width)?;
            i2 = i2 + self.slice_chi(chi2 + 180.0, opts.chi_width)?;
        }
        Some((&i1 - &i2) / (&i1 + &i2))
    }
}

/// Anisotropy ratio combined across two orthogonal beam polarizations.
///
/// `para` is the scan taken with the polarization along chi = 0 and `perp`
/// the scan with it along the orthogonal axis. Each scan contributes the
/// ratio of its parallel wedge over its perpendicular wedge, and the two
/// ratios are averaged, which cancels the geometric bias a single
/// polarization leaves in the wedge averages.
///
/// `None` when either result is radial or when the q axes disagree.
pub fn combined_anisotropy_ratio(
    para: &IntegrationResult,
    perp: &IntegrationResult,
    chi_width: f64,
) -> Option<Array1<f64>> {
    if para.q() != perp.q() {
        return None;
    }
    let para_para = para.slice_chi(0.0, chi_width)?;
    let para_perp = para.slice_chi(-90.0, chi_width)?;
    let perp_perp = perp.slice_chi(-90.0, chi_width)?;
    let perp_para = perp.slice_chi(0.0, chi_width)?;

    let ar_para = (&para_para - &para_perp) / (&para_para + &para_perp);
    let ar_perp = (&perp_perp - &perp_para) / (&perp_perp + &perp_para);
    Some((ar_para + ar_perp) / 2.0)
}

/// Mean ignoring NaN; NaN when every input is NaN or the input is empty.
fn nan_mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values {
        if v.is_finite() {
            sum += v;
            count += 1;
        }
    }
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Errors constructing a profile.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileError {
    /// q bin centers are not strictly ascending.
    NonAscendingQ,
    /// Intensity shape does not match the coordinate axes.
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },
}

impl std::fmt::Display for ProfileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileError::NonAscendingQ => write!(f, "q values are not strictly ascending"),
            ProfileError::ShapeMismatch { expected, got } => write!(
                f,
                "Intensity shape {:?} does not match axes {:?}",
                got, expected
            ),
        }
    }
}

impl std::error::Error for ProfileError {}
