//! hyperscatter - azimuthal integration for energy-series scattering data.
//!
//! This crate turns raw detector frames (pixel grids tagged with
//! acquisition metadata) into azimuthally integrated chi/q profiles, and
//! does so efficiently over large frame stacks whose photon energy varies
//! frame to frame:
//!
//! - A validated [`Geometry`] maps detector pixels to scattering angles.
//! - An [`IntegratorHandle`] precomputes the pixel-to-(chi, q) binning for
//!   one geometry and mask; handles are immutable and shareable.
//! - The [`IntegratorCache`] buckets energies by tolerance so near-equal
//!   energies share one handle instead of re-running the geometry math.
//! - [`integrate_stack`] streams frames through the cache, releasing each
//!   raw frame once integrated, and assembles results into an
//!   [`OutputContainer`] keyed by coordinate tuples.
//!
//! # Architecture
//!
//! ```text
//! frames ──► CoordinateIndex ──► HandleResolver ──► integrate()
//!   │            (tuple)           │    (cache)         │
//!   │                              ▼                    ▼
//!   │                      IntegratorHandle      IntegrationResult
//!   │                     (per energy bucket)           │
//!   └── pixels dropped ◄────────────────────── OutputContainer
//! ```
//!
//! # Example
//!
//! ```no_run
//! use hyperscatter::{
//!     integrate_stack, CalibrationFormat, CalibrationInput, CoordinateIndex, HandleResolver,
//!     IntegratorCache, IntegratorConfig, Mask, KEY_ENERGY, KEY_POLARIZATION,
//! };
//!
//! let calibration = CalibrationInput {
//!     distance: Some(131.06),
//!     beam_center_x: Some(561.76),
//!     beam_center_y: Some(571.67),
//!     pixel_size: Some(0.027),
//!     tilt: Some(0.0),
//! };
//! let mut resolver = HandleResolver::Fixed(IntegratorCache::new(
//!     calibration,
//!     CalibrationFormat::Nika,
//!     Mask::all_valid(1024, 1024),
//!     (1024, 1024),
//!     IntegratorConfig::default(),
//! )?);
//! let index = CoordinateIndex::new([KEY_ENERGY, KEY_POLARIZATION]);
//!
//! let frames = Vec::new(); // supplied by a loader
//! let output = integrate_stack(frames, &index, &mut resolver)?;
//! for tuple in output.container.tuples() {
//!     println!("{}: {} q bins", tuple, output.container.get(tuple).unwrap().n_q());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod data;
pub mod geometry;
pub mod integrate;
pub mod stack;

// Re-export commonly used items
pub use data::{
    combined_anisotropy_ratio, AnisotropyOptions, Frame, FrameError, FrameMetadata,
    IntegrationResult, MetaValue, ProfileError, KEY_ENERGY, KEY_EXPOSURE, KEY_POLARIZATION,
    KEY_SAMPLE_NAME,
};
pub use geometry::{
    wavelength_from_energy, CalibrationFormat, CalibrationInput, ConfigurationError, Geometry,
    Mask,
};
pub use integrate::{
    integrate, FrameIntegrationError, HandleResolver, IntegrationKind, IntegratorCache,
    IntegratorConfig, IntegratorHandle, PerFrameGeometry, ResolveError,
    ToleranceResolutionError, DEFAULT_ENERGY_TOLERANCE,
};
pub use stack::{
    integrate_stack, CoordinateIndex, CoordinateMapping, CoordinateTuple, OutputContainer,
    RunnerConfig, SkippedFrame, StackAssemblyError, StackError, StackOutput, StackReport,
    StackRunner,
};
