//! Pose computation for projector setups.
//!
//! World frame is right-handed with Z up. In its local frame a projector looks
//! along +X, with +Y to its left and +Z up. Orientation is composed as
//! `Rz(yaw) * Ry(-pitch) * Rx(roll)`: yaw about the vertical axis first, then
//! pitch (positive tilts the optical axis upward), then roll about the optical
//! axis. Every consumer relies on this order.

use glam::{DMat4, DQuat, DVec2, DVec3};
use serde::Serialize;

use super::setup::ProjectorSetup;

/// Default image aspect (height / width) when the screen is unknown.
pub const DEFAULT_ASPECT: f64 = 0.75;

/// Points closer than this along the optical axis count as behind the lens.
const MIN_DEPTH: f64 = 1e-9;

/// Position, orientation and lens of a projector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pose {
    pub position: DVec3,
    pub rotation: DQuat,
    /// Horizontal field of view in degrees.
    pub fov: f64,
    pub throw_ratio: f64,
}

impl Pose {
    /// 4x4 transform from projector-local to world coordinates.
    pub fn matrix(&self) -> DMat4 {
        DMat4::from_rotation_translation(self.rotation, self.position)
    }

    pub fn forward(&self) -> DVec3 {
        self.rotation * DVec3::X
    }

    pub fn left(&self) -> DVec3 {
        self.rotation * DVec3::Y
    }

    pub fn up(&self) -> DVec3 {
        self.rotation * DVec3::Z
    }

    /// World point expressed in the projector's local frame.
    pub fn to_local(&self, world: DVec3) -> DVec3 {
        self.rotation.inverse() * (world - self.position)
    }

    pub fn abs_diff_eq(&self, other: &Pose, epsilon: f64) -> bool {
        self.matrix().abs_diff_eq(other.matrix(), epsilon)
            && (self.fov - other.fov).abs() <= epsilon
            && (self.throw_ratio - other.throw_ratio).abs() <= epsilon
    }
}

/// Rotation for yaw/pitch/roll in degrees.
pub fn orientation_rotation(yaw: f64, pitch: f64, roll: f64) -> DQuat {
    DQuat::from_rotation_z(yaw.to_radians())
        * DQuat::from_rotation_y(-pitch.to_radians())
        * DQuat::from_rotation_x(roll.to_radians())
}

/// Derive the pose of a projector setup. Pure and deterministic.
pub fn compute_pose(setup: &ProjectorSetup) -> Pose {
    let orientation = setup.orientation();
    let local = orientation_rotation(orientation.yaw(), orientation.pitch(), orientation.roll());

    let (position, rotation) = match setup {
        ProjectorSetup::Free(free) => (free.position(), local),
        ProjectorSetup::Peripheral(peripheral) => {
            let ring_angle = peripheral.delta_yaw().to_radians();
            let ring_position = DVec3::new(
                peripheral.distance() * ring_angle.cos(),
                peripheral.distance() * ring_angle.sin(),
                peripheral.tower_height(),
            );
            let rotation = DQuat::from_rotation_z(ring_angle) * local;
            let shifted = ring_position + rotation * DVec3::Z * peripheral.shift();
            (shifted, rotation)
        }
    };

    Pose {
        position,
        rotation,
        fov: setup.lens().fov(),
        throw_ratio: setup.lens().throw_ratio(),
    }
}

/// Projection volume of a projector: pose plus image aspect.
///
/// Normalized image coordinates `(s, t)` span `[-1, 1]²` with `s` to the
/// right and `t` up as seen from behind the projector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectorFrustum {
    pub pose: Pose,
    /// Image height over width.
    pub aspect: f64,
}

impl ProjectorFrustum {
    pub fn new(pose: Pose, aspect: f64) -> Self {
        let aspect = if aspect.is_finite() && aspect > 0.0 {
            aspect
        } else {
            DEFAULT_ASPECT
        };
        Self { pose, aspect }
    }

    pub fn half_width_tan(&self) -> f64 {
        (self.pose.fov.to_radians() * 0.5).tan()
    }

    pub fn half_height_tan(&self) -> f64 {
        self.half_width_tan() * self.aspect
    }

    /// Unit world direction of the ray through image point `(s, t)`.
    pub fn ray_direction(&self, st: DVec2) -> DVec3 {
        let local = DVec3::new(1.0, -st.x * self.half_width_tan(), st.y * self.half_height_tan());
        (self.pose.rotation * local).normalize()
    }

    /// Image coordinates of a world point, `None` if it lies behind the lens.
    pub fn project(&self, world: DVec3) -> Option<DVec2> {
        let local = self.pose.to_local(world);
        if local.x <= MIN_DEPTH {
            return None;
        }
        let s = -local.y / (local.x * self.half_width_tan());
        let t = local.z / (local.x * self.half_height_tan());
        Some(DVec2::new(s, t))
    }

    /// Distance of an image point to the nearest frustum edge, in normalized
    /// units: 1 at the image center, 0 on the boundary, negative outside.
    pub fn edge_distance(st: DVec2) -> f64 {
        (1.0 - st.x.abs()).min(1.0 - st.y.abs())
    }

    /// Image points along the frustum boundary, counter-clockwise starting at
    /// the bottom-left corner, `samples_per_side` points per edge.
    pub fn boundary(samples_per_side: usize) -> Vec<DVec2> {
        let n = samples_per_side.max(1);
        let corners = [
            DVec2::new(-1.0, -1.0),
            DVec2::new(1.0, -1.0),
            DVec2::new(1.0, 1.0),
            DVec2::new(-1.0, 1.0),
        ];
        let mut points = Vec::with_capacity(n * 4);
        for i in 0..4 {
            let a = corners[i];
            let b = corners[(i + 1) % 4];
            for k in 0..n {
                points.push(a.lerp(b, k as f64 / n as f64));
            }
        }
        points
    }
}
