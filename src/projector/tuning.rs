//! Per-projector tuning state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::pose::{Pose, ProjectorFrustum, DEFAULT_ASPECT};
use super::setup::{Parameter, ParameterError, ProjectorSetup, SetupKind};
use crate::blending::ColorCorrection;
use crate::warp::WarpGrid;

/// Stable identifier of a projector within a calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ProjectorId(pub u32);

impl std::fmt::Display for ProjectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Projector {}", self.0)
    }
}

/// Pixel rectangle on the desktop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ScreenRect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// Output target of a tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenGeometry {
    pub rect: ScreenRect,
    /// Synthetic preview rather than a physically mapped display.
    pub is_virtual: bool,
}

impl Default for ScreenGeometry {
    fn default() -> Self {
        Self::virtual_screen(1024, 768)
    }
}

impl ScreenGeometry {
    pub fn virtual_screen(width: u32, height: u32) -> Self {
        Self {
            rect: ScreenRect::new(0, 0, width, height),
            is_virtual: true,
        }
    }

    pub fn physical(rect: ScreenRect) -> Self {
        Self {
            rect,
            is_virtual: false,
        }
    }

    /// Image aspect as height over width.
    pub fn aspect(&self) -> f64 {
        if self.rect.width == 0 || self.rect.height == 0 {
            DEFAULT_ASPECT
        } else {
            self.rect.height as f64 / self.rect.width as f64
        }
    }

    /// Rectangle of one horizontal sub-screen when a display is split into
    /// `count` equal outputs (e.g. multi-head splitters). Out-of-range indices
    /// are clamped to the first or last sub-screen.
    pub fn sub_screen(&self, index: i32, count: u32) -> ScreenRect {
        let count = count.max(1);
        let index = index.clamp(0, count as i32 - 1) as u32;
        let width = self.rect.width / count;
        ScreenRect::new(
            self.rect.x + (index * width) as i32,
            self.rect.y,
            width,
            self.rect.height,
        )
    }
}

/// Highlight color used by the UI and previews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuningColor(pub [u8; 3]);

impl TuningColor {
    const PALETTE: [[u8; 3]; 8] = [
        [0xe6, 0x4d, 0x4d],
        [0x4d, 0xb3, 0xe6],
        [0x7f, 0xcc, 0x4d],
        [0xe6, 0xb3, 0x33],
        [0xb3, 0x66, 0xe6],
        [0x33, 0xcc, 0xb3],
        [0xe6, 0x80, 0xb3],
        [0x99, 0x99, 0x99],
    ];

    /// Palette color for the n-th projector.
    pub fn for_index(index: usize) -> Self {
        Self(Self::PALETTE[index % Self::PALETTE.len()])
    }
}

/// One projector's parameters, derived pose, color correction and output target.
#[derive(Debug, Clone)]
pub struct Tuning {
    id: ProjectorId,
    pub name: String,
    pub color: TuningColor,
    setup: ProjectorSetup,
    pose: Pose,
    pub color_correction: ColorCorrection,
    pub screen: ScreenGeometry,
    selected: bool,
    warp: Arc<WarpGrid>,
}

impl Tuning {
    pub fn new(id: ProjectorId, setup: ProjectorSetup) -> Self {
        Self {
            id,
            name: format!("Projector {}", id.0),
            color: TuningColor::for_index(id.0 as usize),
            pose: setup.pose(),
            setup,
            color_correction: ColorCorrection::default(),
            screen: ScreenGeometry::default(),
            selected: false,
            warp: Arc::new(WarpGrid::default()),
        }
    }

    pub fn id(&self) -> ProjectorId {
        self.id
    }

    pub fn setup(&self) -> &ProjectorSetup {
        &self.setup
    }

    /// Replace the whole setup and recompute the pose.
    pub fn set_setup(&mut self, setup: ProjectorSetup) {
        self.setup = setup;
        self.pose = self.setup.pose();
    }

    /// Switch mount kind, keeping orientation and lens.
    pub fn convert_setup(&mut self, kind: SetupKind) {
        let converted = self.setup.converted(kind);
        self.set_setup(converted);
    }

    pub fn parameter(&self, parameter: Parameter) -> Option<f64> {
        self.setup.parameter(parameter)
    }

    /// Clamp and store a parameter, then recompute the pose.
    pub fn set_parameter(
        &mut self,
        parameter: Parameter,
        value: f64,
    ) -> Result<f64, ParameterError> {
        let applied = self.setup.set_parameter(parameter, value)?;
        self.pose = self.setup.pose();
        Ok(applied)
    }

    pub fn set_parameter_by_name(&mut self, name: &str, value: f64) -> Result<f64, ParameterError> {
        let applied = self.setup.set_parameter_by_name(name, value)?;
        self.pose = self.setup.pose();
        Ok(applied)
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    pub fn frustum(&self) -> ProjectorFrustum {
        ProjectorFrustum::new(self.pose, self.screen.aspect())
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    pub fn warp(&self) -> &Arc<WarpGrid> {
        &self.warp
    }

    /// Mutable warp grid. Copies on write if a published plan still holds it.
    pub fn warp_mut(&mut self) -> &mut WarpGrid {
        Arc::make_mut(&mut self.warp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_edit_updates_pose() {
        let mut tuning = Tuning::new(ProjectorId(1), ProjectorSetup::new(SetupKind::Peripheral));
        let before = *tuning.pose();
        tuning.set_parameter(Parameter::DeltaYaw, 20.0).unwrap();
        assert_ne!(before, *tuning.pose());
        assert_eq!(*tuning.pose(), tuning.setup().pose());
    }

    #[test]
    fn test_failed_edit_keeps_pose() {
        let mut tuning = Tuning::new(ProjectorId(1), ProjectorSetup::new(SetupKind::Free));
        let before = *tuning.pose();
        assert!(tuning.set_parameter_by_name("Shift", 1.0).is_err());
        assert_eq!(before, *tuning.pose());
    }

    #[test]
    fn test_sub_screen_clamps_index() {
        let screen = ScreenGeometry::physical(ScreenRect::new(1920, 0, 3840, 1080));
        assert_eq!(screen.sub_screen(1, 2), ScreenRect::new(3840, 0, 1920, 1080));
        assert_eq!(screen.sub_screen(-3, 2), ScreenRect::new(1920, 0, 1920, 1080));
        assert_eq!(screen.sub_screen(9, 2), ScreenRect::new(3840, 0, 1920, 1080));
    }

    #[test]
    fn test_aspect_fallback() {
        let screen = ScreenGeometry::virtual_screen(0, 0);
        assert_eq!(screen.aspect(), DEFAULT_ASPECT);
        assert_eq!(ScreenGeometry::virtual_screen(1920, 1080).aspect(), 1080.0 / 1920.0);
    }

    #[test]
    fn test_warp_copy_on_write() {
        let mut tuning = Tuning::new(ProjectorId(1), ProjectorSetup::default());
        let snapshot = Arc::clone(tuning.warp());
        tuning.warp_mut().unpin_boundary();
        tuning
            .warp_mut()
            .set_control_point(0, 0, glam::DVec2::new(0.1, 0.0))
            .unwrap();
        assert!(snapshot.is_identity());
        assert!(!tuning.warp().is_identity());
    }
}
