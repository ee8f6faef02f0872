//! The integration engine: per-energy handles, the tolerance-bucketed
//! cache, and single-frame integration.

mod cache;
mod handle;
mod single;

pub use cache::{
    HandleResolver, IntegratorCache, PerFrameGeometry, ResolveError, ToleranceResolutionError,
    DEFAULT_ENERGY_TOLERANCE,
};
pub use handle::{IntegrationKind, IntegratorConfig, IntegratorHandle};
pub use single::{integrate, FrameIntegrationError};
