//! Projector placement: mount setups, pose derivation and per-projector tuning.

mod pose;
mod setup;
mod tuning;

pub use pose::{compute_pose, orientation_rotation, Pose, ProjectorFrustum, DEFAULT_ASPECT};
pub use setup::{
    FreeSetup, Lens, Orientation, Parameter, ParameterError, ParameterGroup, ParameterSpec,
    ParameterUnit, PeripheralSetup, ProjectorSetup, SetupKind,
};
pub use tuning::{ProjectorId, ScreenGeometry, ScreenRect, Tuning, TuningColor};
