//! Blending for overlapping projectors on a dome.

mod color;
mod overlap;
pub mod polygon;

use serde::{Deserialize, Serialize};

pub use color::{Channel, ChannelCorrection, ColorCorrection};
pub use overlap::{
    BlendSettings, CoverageField, CoverageSample, Footprint, FootprintSettings,
    FrustumIntersection, OverlapCache, OverlapRegion, PairKey, RefreshStats,
};
pub use polygon::Polygon;

/// Falloff curve from a frustum edge (0) to its interior (1).
///
/// Every curve is monotonic with `f(0) = 0`, `f(1) = 1` and `f(t) > 0` for
/// `t > 0`, so a point strictly inside a frustum always gets a positive share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendCurve {
    Linear,
    Gamma,
    Cosine,
    #[default]
    Smoothstep,
}

impl BlendCurve {
    /// Apply the curve to a normalized distance, clamped to [0, 1].
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            BlendCurve::Linear => t,
            BlendCurve::Gamma => t.powf(2.2),
            BlendCurve::Cosine => 0.5 - 0.5 * (std::f64::consts::PI * t).cos(),
            BlendCurve::Smoothstep => {
                let t2 = t * t;
                3.0 * t2 - 2.0 * t * t2
            }
        }
    }
}

/// Blend mask for a projector, in the projector's image space.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendMask {
    /// Width of the mask texture.
    pub width: u32,
    /// Height of the mask texture.
    pub height: u32,
    /// Blend values 0.0-1.0, row-major, row 0 at the top of the image.
    pub data: Vec<f32>,
    /// Blend curve type used.
    pub curve: BlendCurve,
}

impl BlendMask {
    /// Create a new blend mask filled with 1.0 (no blending).
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, 1.0)
    }

    /// Mask with no contribution anywhere.
    pub fn zeros(width: u32, height: u32) -> Self {
        Self::filled(width, height, 0.0)
    }

    fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
            curve: BlendCurve::default(),
        }
    }

    /// Build a mask from normalized image coordinates of each texel center.
    ///
    /// `s` runs left to right and `t` bottom to top, both in (-1, 1).
    pub fn from_image_fn<F>(width: u32, height: u32, curve: BlendCurve, f: F) -> Self
    where
        F: Fn(glam::DVec2) -> f64,
    {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(Self::texel_center(x, y, width, height)).clamp(0.0, 1.0) as f32);
            }
        }
        Self {
            width,
            height,
            data,
            curve,
        }
    }

    /// Normalized image coordinates of a texel center.
    pub fn texel_center(x: u32, y: u32, width: u32, height: u32) -> glam::DVec2 {
        let s = (x as f64 + 0.5) / width.max(1) as f64 * 2.0 - 1.0;
        let t = 1.0 - (y as f64 + 0.5) / height.max(1) as f64 * 2.0;
        glam::DVec2::new(s, t)
    }

    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get((y * self.width + x) as usize).copied()
    }

    /// Number of texels with a nonzero blend value.
    pub fn covered_texels(&self) -> usize {
        self.data.iter().filter(|v| **v > 0.0).count()
    }

    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f32>() / self.data.len() as f32
    }

    /// Raw texel bytes for texture upload (R32F).
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }
}
