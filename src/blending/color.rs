//! Per-projector color correction.
//!
//! Lets the operator match brightness, contrast and gamma of projectors that
//! share overlap zones. A global correction is applied first, then the
//! per-channel one.

use serde::{Deserialize, Serialize};

/// Correction for one channel, or for all channels at once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelCorrection {
    /// Brightness offset (-1.0 to 1.0, 0.0 = no change)
    pub brightness: f32,

    /// Contrast around mid-gray (0.0 to 2.0, 1.0 = no change)
    pub contrast: f32,

    /// Gamma (0.1 to 4.0, 1.0 = linear)
    pub gamma: f32,

    /// Output multiplier (0.0 to 2.0, 1.0 = no change)
    pub multiplier: f32,
}

impl Default for ChannelCorrection {
    fn default() -> Self {
        Self {
            brightness: 0.0,
            contrast: 1.0,
            gamma: 1.0,
            multiplier: 1.0,
        }
    }
}

impl ChannelCorrection {
    pub fn is_identity(&self) -> bool {
        self.brightness.abs() < f32::EPSILON
            && (self.contrast - 1.0).abs() < f32::EPSILON
            && (self.gamma - 1.0).abs() < f32::EPSILON
            && (self.multiplier - 1.0).abs() < f32::EPSILON
    }

    /// Set brightness (clamped to -1.0 to 1.0)
    pub fn set_brightness(&mut self, value: f32) {
        if !value.is_nan() {
            self.brightness = value.clamp(-1.0, 1.0);
        }
    }

    /// Set contrast (clamped to 0.0 to 2.0)
    pub fn set_contrast(&mut self, value: f32) {
        if !value.is_nan() {
            self.contrast = value.clamp(0.0, 2.0);
        }
    }

    /// Set gamma (clamped to 0.1 to 4.0)
    pub fn set_gamma(&mut self, value: f32) {
        if !value.is_nan() {
            self.gamma = value.clamp(0.1, 4.0);
        }
    }

    /// Set multiplier (clamped to 0.0 to 2.0)
    pub fn set_multiplier(&mut self, value: f32) {
        if !value.is_nan() {
            self.multiplier = value.clamp(0.0, 2.0);
        }
    }

    /// Correct one normalized channel value. Output is clamped to [0, 1].
    pub fn apply(&self, value: f32) -> f32 {
        let v = ((value - 0.5) * self.contrast + 0.5 + self.brightness) * self.multiplier;
        v.clamp(0.0, 1.0).powf(1.0 / self.gamma)
    }
}

/// Color channel selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    All,
    Red,
    Green,
    Blue,
}

/// Color correction of one projector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorCorrection {
    pub enabled: bool,
    pub all: ChannelCorrection,
    pub red: ChannelCorrection,
    pub green: ChannelCorrection,
    pub blue: ChannelCorrection,
}

impl Default for ColorCorrection {
    fn default() -> Self {
        Self {
            enabled: true,
            all: ChannelCorrection::default(),
            red: ChannelCorrection::default(),
            green: ChannelCorrection::default(),
            blue: ChannelCorrection::default(),
        }
    }
}

impl ColorCorrection {
    /// True if applying the correction leaves colors unchanged.
    pub fn is_identity(&self) -> bool {
        !self.enabled
            || (self.all.is_identity()
                && self.red.is_identity()
                && self.green.is_identity()
                && self.blue.is_identity())
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn channel(&self, channel: Channel) -> &ChannelCorrection {
        match channel {
            Channel::All => &self.all,
            Channel::Red => &self.red,
            Channel::Green => &self.green,
            Channel::Blue => &self.blue,
        }
    }

    pub fn channel_mut(&mut self, channel: Channel) -> &mut ChannelCorrection {
        match channel {
            Channel::All => &mut self.all,
            Channel::Red => &mut self.red,
            Channel::Green => &mut self.green,
            Channel::Blue => &mut self.blue,
        }
    }

    /// Correct a normalized RGB color.
    pub fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        if !self.enabled {
            return rgb;
        }
        let [r, g, b] = rgb.map(|c| self.all.apply(c));
        [self.red.apply(r), self.green.apply(g), self.blue.apply(b)]
    }
}
