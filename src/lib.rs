//! Dome Projection Calibration Core
//!
//! Calibration and blending for multiple projectors lighting a dome:
//! - Projector poses from free or ring-mounted setups
//! - Frustum footprints and pairwise overlaps on the dome surface
//! - Normalized blend masks and per-projector color correction
//! - Grid warps for geometric correction
//! - Session state machine publishing immutable draw plans

pub mod blending;
pub mod calibration;
pub mod config;
pub mod export;
pub mod projector;
pub mod surface;
pub mod warp;
