//! Core data structures for frames, metadata and integrated profiles.

mod frame;
mod metadata;
mod profile;

pub use frame::{Frame, FrameError};
pub use metadata::{
    FrameMetadata, MetaValue, KEY_ENERGY, KEY_EXPOSURE, KEY_POLARIZATION, KEY_SAMPLE_NAME,
};
pub use profile::{combined_anisotropy_ratio, AnisotropyOptions, IntegrationResult, ProfileError};
