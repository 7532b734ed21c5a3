//! Target surface description and its 2D parameter space.
//!
//! A dome is a spherical cap around +Z. Surface points are addressed in the
//! fulldome (azimuthal equidistant) parameterization: the zenith maps to
//! `(0.5, 0.5)`, polar angle grows linearly with the distance from it and the
//! cap rim lies on the circle of radius 0.5. Directions past the rim extend
//! beyond that circle, which keeps projector footprints continuous across
//! the rim before they get clipped.

use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const CENTER_UV: DVec2 = DVec2::new(0.5, 0.5);
const ON_SURFACE_EPS: f64 = 1e-9;

/// Target surface.
///
/// Serialized through [`SurfaceRecord`], a flat element form that reads back
/// from both JSON and XML settings files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "SurfaceRecord", into = "SurfaceRecord")]
pub enum SurfaceDescriptor {
    /// Spherical cap around +Z.
    Dome {
        center: DVec3,
        radius: f64,
        /// Opening angle of the cap in degrees (180 = hemisphere).
        aperture: f64,
    },
}

/// Surface kind tag in settings files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceKind {
    Dome,
}

/// Point with named coordinates, as stored in settings files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfacePoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// On-disk form of [`SurfaceDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceRecord {
    #[serde(rename = "type")]
    pub kind: SurfaceKind,
    pub center: SurfacePoint,
    pub radius: f64,
    pub aperture: f64,
}

impl From<SurfaceRecord> for SurfaceDescriptor {
    fn from(record: SurfaceRecord) -> Self {
        match record.kind {
            SurfaceKind::Dome => SurfaceDescriptor::Dome {
                center: DVec3::new(record.center.x, record.center.y, record.center.z),
                radius: record.radius,
                aperture: record.aperture,
            },
        }
    }
}

impl From<SurfaceDescriptor> for SurfaceRecord {
    fn from(surface: SurfaceDescriptor) -> Self {
        match surface {
            SurfaceDescriptor::Dome {
                center,
                radius,
                aperture,
            } => SurfaceRecord {
                kind: SurfaceKind::Dome,
                center: SurfacePoint {
                    x: center.x,
                    y: center.y,
                    z: center.z,
                },
                radius,
                aperture,
            },
        }
    }
}

impl Default for SurfaceDescriptor {
    fn default() -> Self {
        Self::hemisphere(10.0)
    }
}

impl SurfaceDescriptor {
    /// Hemispherical dome centered at the origin.
    pub fn hemisphere(radius: f64) -> Self {
        SurfaceDescriptor::Dome {
            center: DVec3::ZERO,
            radius,
            aperture: 180.0,
        }
    }

    pub fn center(&self) -> DVec3 {
        match self {
            SurfaceDescriptor::Dome { center, .. } => *center,
        }
    }

    pub fn radius(&self) -> f64 {
        match self {
            SurfaceDescriptor::Dome { radius, .. } => *radius,
        }
    }

    /// Largest polar angle (from the zenith) on the surface, in radians.
    pub fn max_polar(&self) -> f64 {
        match self {
            SurfaceDescriptor::Dome { aperture, .. } => aperture.to_radians() * 0.5,
        }
    }

    /// True if the surface cannot be mapped onto at all.
    pub fn is_degenerate(&self) -> bool {
        match self {
            SurfaceDescriptor::Dome {
                center,
                radius,
                aperture,
            } => {
                !center.is_finite()
                    || !radius.is_finite()
                    || *radius <= 0.0
                    || !aperture.is_finite()
                    || *aperture <= 0.0
                    || *aperture >= 360.0
            }
        }
    }

    /// Parameter-space coordinates of a direction from the center.
    fn uv_of_direction(&self, direction: DVec3) -> DVec2 {
        let polar = direction.z.clamp(-1.0, 1.0).acos();
        let azimuth = direction.y.atan2(direction.x);
        let r = 0.5 * polar / self.max_polar();
        CENTER_UV + DVec2::new(azimuth.cos(), azimuth.sin()) * r
    }

    /// Parameter-space coordinates of a point on (or near) the sphere.
    pub fn uv_of(&self, point: DVec3) -> DVec2 {
        let direction = (point - self.center()).normalize_or_zero();
        if direction == DVec3::ZERO {
            return CENTER_UV;
        }
        self.uv_of_direction(direction)
    }

    /// Parameter-space coordinates for azimuth/elevation in degrees.
    pub fn uv_from_angles(&self, azimuth: f64, elevation: f64) -> DVec2 {
        let polar = (90.0 - elevation).to_radians();
        let azimuth = azimuth.to_radians();
        let direction = DVec3::new(
            polar.sin() * azimuth.cos(),
            polar.sin() * azimuth.sin(),
            polar.cos(),
        );
        self.uv_of_direction(direction)
    }

    /// Azimuth and elevation in degrees of a parameter-space point.
    pub fn angles_of(&self, uv: DVec2) -> (f64, f64) {
        let offset = uv - CENTER_UV;
        let polar = offset.length() / 0.5 * self.max_polar();
        let azimuth = offset.y.atan2(offset.x).to_degrees();
        (azimuth, 90.0 - polar.to_degrees())
    }

    /// World point for parameter-space coordinates, `None` off the surface.
    pub fn point_at(&self, uv: DVec2) -> Option<DVec3> {
        let offset = uv - CENTER_UV;
        let polar = offset.length() / 0.5 * self.max_polar();
        if polar > self.max_polar() + ON_SURFACE_EPS || polar > PI {
            return None;
        }
        let azimuth = offset.y.atan2(offset.x);
        let direction = DVec3::new(
            polar.sin() * azimuth.cos(),
            polar.sin() * azimuth.sin(),
            polar.cos(),
        );
        Some(self.center() + direction * self.radius())
    }

    /// True if a parameter-space point lies on the surface.
    pub fn contains_uv(&self, uv: DVec2) -> bool {
        (uv - CENTER_UV).length() <= 0.5 + ON_SURFACE_EPS
    }

    fn on_cap(&self, point: &DVec3) -> bool {
        let direction = (*point - self.center()) / self.radius();
        direction.z.clamp(-1.0, 1.0).acos() <= self.max_polar() + ON_SURFACE_EPS
    }

    /// Ray parameters where `origin + t * direction` meets the sphere.
    fn sphere_roots(&self, origin: DVec3, direction: DVec3) -> Option<(f64, f64)> {
        let oc = origin - self.center();
        let a = direction.length_squared();
        if a == 0.0 {
            return None;
        }
        let b = 2.0 * direction.dot(oc);
        let c = oc.length_squared() - self.radius() * self.radius();
        let disc = b * b - 4.0 * a * c;
        if disc < 0.0 {
            return None;
        }
        let sq = disc.sqrt();
        Some(((-b - sq) / (2.0 * a), (-b + sq) / (2.0 * a)))
    }

    /// First forward hit of a ray on the surface.
    pub fn intersect_ray(&self, origin: DVec3, direction: DVec3) -> Option<DVec3> {
        let (t0, t1) = self.sphere_roots(origin, direction)?;
        [t0, t1]
            .into_iter()
            .filter(|t| *t > ON_SURFACE_EPS)
            .map(|t| origin + direction * t)
            .find(|p| self.on_cap(p))
    }

    /// Parameter-space point for a footprint ray: the surface hit if there is
    /// one, otherwise the first forward sphere hit past the rim.
    pub fn footprint_uv(&self, origin: DVec3, direction: DVec3) -> Option<DVec2> {
        if let Some(hit) = self.intersect_ray(origin, direction) {
            return Some(self.uv_of(hit));
        }
        let (t0, t1) = self.sphere_roots(origin, direction)?;
        [t0, t1]
            .into_iter()
            .find(|t| *t > ON_SURFACE_EPS)
            .map(|t| self.uv_of(origin + direction * t))
    }

    /// True if `point` (on the surface) is not hidden by another part of the
    /// surface when seen from `origin`.
    pub fn is_visible_from(&self, origin: DVec3, point: DVec3) -> bool {
        let direction = point - origin;
        let a = direction.length_squared();
        if a == 0.0 {
            return false;
        }
        // `point` is the root t = 1, the product of both roots is c / a
        let oc = origin - self.center();
        let c = oc.length_squared() - self.radius() * self.radius();
        let other = c / a;
        let blocks = other > ON_SURFACE_EPS && other < 1.0 - 1e-7;
        !(blocks && self.on_cap(&(origin + direction * other)))
    }

    /// Closed polygon approximating the cap rim in parameter space.
    pub fn rim_polygon(&self, segments: usize) -> Vec<DVec2> {
        let segments = segments.max(8);
        (0..segments)
            .map(|i| {
                let angle = i as f64 / segments as f64 * 2.0 * PI;
                CENTER_UV + DVec2::new(angle.cos(), angle.sin()) * 0.5
            })
            .collect()
    }
}
