//! Projector mount models and their tunable parameters.
//!
//! Two mount geometries are supported:
//! - `FreeSetup`: unconstrained position and orientation
//! - `PeripheralSetup`: projector on a ring/tower mount around a shared center
//!
//! Every parameter has a fixed range and is clamped on write. FOV and throw
//! ratio describe the same lens and are kept linked.

use glam::DVec3;
use serde::Serialize;
use thiserror::Error;

use super::pose::{compute_pose, Pose};

/// Errors reported when a parameter is addressed by name.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Unknown parameter: {0}")]
    Unknown(String),
    #[error("Parameter '{parameter}' does not apply to {setup}")]
    NotApplicable {
        parameter: &'static str,
        setup: &'static str,
    },
}

/// Tunable projector parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Parameter {
    Fov,
    ThrowRatio,
    Yaw,
    Pitch,
    Roll,
    X,
    Y,
    Z,
    DeltaYaw,
    Distance,
    TowerHeight,
    Shift,
}

impl Parameter {
    pub const ALL: [Parameter; 12] = [
        Parameter::Fov,
        Parameter::ThrowRatio,
        Parameter::Yaw,
        Parameter::Pitch,
        Parameter::Roll,
        Parameter::X,
        Parameter::Y,
        Parameter::Z,
        Parameter::DeltaYaw,
        Parameter::Distance,
        Parameter::TowerHeight,
        Parameter::Shift,
    ];

    /// Display name, also used as the key for the parameter UI.
    pub fn name(&self) -> &'static str {
        match self {
            Parameter::Fov => "FOV",
            Parameter::ThrowRatio => "Throw Ratio",
            Parameter::Yaw => "Yaw",
            Parameter::Pitch => "Pitch",
            Parameter::Roll => "Roll",
            Parameter::X => "X",
            Parameter::Y => "Y",
            Parameter::Z => "Z",
            Parameter::DeltaYaw => "Delta Yaw",
            Parameter::Distance => "Distance",
            Parameter::TowerHeight => "Tower Height",
            Parameter::Shift => "Shift",
        }
    }

    /// Look up a parameter by its display name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    pub fn unit(&self) -> ParameterUnit {
        match self {
            Parameter::Fov
            | Parameter::Yaw
            | Parameter::Pitch
            | Parameter::Roll
            | Parameter::DeltaYaw => ParameterUnit::Degrees,
            Parameter::ThrowRatio => ParameterUnit::Ratio,
            _ => ParameterUnit::Length,
        }
    }
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Unit shown next to a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterUnit {
    Degrees,
    Ratio,
    Length,
}

impl ParameterUnit {
    pub fn suffix(&self) -> &'static str {
        match self {
            ParameterUnit::Degrees => "°",
            ParameterUnit::Ratio => "",
            ParameterUnit::Length => "",
        }
    }
}

/// Range, default and slider steps of one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSpec {
    pub default: f64,
    pub min: f64,
    pub max: f64,
    /// Reference value for signed display (e.g. 0 = centered).
    pub pivot: Option<f64>,
    pub single_step: f64,
    pub page_step: f64,
}

impl ParameterSpec {
    const fn new(
        default: f64,
        min: f64,
        max: f64,
        pivot: Option<f64>,
        single_step: f64,
        page_step: f64,
    ) -> Self {
        Self {
            default,
            min,
            max,
            pivot,
            single_step,
            page_step,
        }
    }

    /// Clamp a value into range. NaN has no meaningful clamp and yields `None`.
    pub fn clamp(&self, value: f64) -> Option<f64> {
        if value.is_nan() {
            None
        } else {
            Some(value.clamp(self.min, self.max))
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Signed offset from the pivot (or from `min` when there is no pivot).
    pub fn offset_from_pivot(&self, value: f64) -> f64 {
        value - self.pivot.unwrap_or(self.min)
    }
}

const FOV_SPEC: ParameterSpec = ParameterSpec::new(60.0, 10.0, 160.0, None, 4.0, 45.0);
const THROW_RATIO_SPEC: ParameterSpec =
    ParameterSpec::new(0.866_025_403_784_438_7, 0.1, 5.0, None, 0.1, 0.3);
const PITCH_SPEC: ParameterSpec = ParameterSpec::new(30.0, -90.0, 90.0, Some(0.0), 1.0, 15.0);
const ROLL_SPEC: ParameterSpec = ParameterSpec::new(0.0, -45.0, 45.0, Some(0.0), 1.0, 5.0);
const FREE_YAW_SPEC: ParameterSpec = ParameterSpec::new(0.0, 0.0, 360.0, None, 1.0, 15.0);
const PERIPHERAL_YAW_SPEC: ParameterSpec =
    ParameterSpec::new(0.0, -180.0, 180.0, Some(0.0), 1.0, 15.0);
const OFFSET_SPEC: ParameterSpec = ParameterSpec::new(0.0, -10.0, 10.0, Some(0.0), 0.1, 1.0);
const DELTA_YAW_SPEC: ParameterSpec = ParameterSpec::new(0.0, -45.0, 45.0, Some(0.0), 1.0, 5.0);
const DISTANCE_SPEC: ParameterSpec = ParameterSpec::new(5.0, 0.0, 10.0, None, 0.1, 1.0);
const TOWER_HEIGHT_SPEC: ParameterSpec = ParameterSpec::new(2.0, -5.0, 10.0, Some(0.0), 0.1, 1.0);
const SHIFT_SPEC: ParameterSpec = ParameterSpec::new(0.0, -2.0, 2.0, Some(0.0), 0.1, 1.0);

/// Parameter subsets presented together by the parameter UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterGroup {
    /// Mount placement and orientation, depends on the setup variant.
    Mount,
    /// FOV and throw ratio.
    Lens,
}

/// Lens description. FOV is the horizontal opening angle in degrees,
/// throw ratio is throw distance over image width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Lens {
    fov: f64,
    throw_ratio: f64,
}

impl Default for Lens {
    fn default() -> Self {
        Self::from_fov(FOV_SPEC.default)
    }
}

impl Lens {
    pub fn from_fov(fov: f64) -> Self {
        let mut lens = Self {
            fov: FOV_SPEC.default,
            throw_ratio: THROW_RATIO_SPEC.default,
        };
        lens.set_fov(fov);
        lens
    }

    pub fn fov(&self) -> f64 {
        self.fov
    }

    pub fn throw_ratio(&self) -> f64 {
        self.throw_ratio
    }

    /// Horizontal half-angle tangent of the frustum.
    pub fn half_width_tan(&self) -> f64 {
        (self.fov.to_radians() * 0.5).tan()
    }

    /// Set FOV and update the linked throw ratio.
    pub fn set_fov(&mut self, fov: f64) -> f64 {
        if let Some(fov) = FOV_SPEC.clamp(fov) {
            self.fov = fov;
            let linked = 0.5 / (fov.to_radians() * 0.5).tan();
            self.throw_ratio = THROW_RATIO_SPEC.clamp(linked).unwrap_or(self.throw_ratio);
        }
        self.fov
    }

    /// Set throw ratio and update the linked FOV.
    pub fn set_throw_ratio(&mut self, throw_ratio: f64) -> f64 {
        if let Some(throw_ratio) = THROW_RATIO_SPEC.clamp(throw_ratio) {
            self.throw_ratio = throw_ratio;
            let linked = 2.0 * (0.5 / throw_ratio).atan().to_degrees();
            self.fov = FOV_SPEC.clamp(linked).unwrap_or(self.fov);
        }
        self.throw_ratio
    }
}

/// Yaw, pitch and roll in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Orientation {
    yaw: f64,
    pitch: f64,
    roll: f64,
}

impl Orientation {
    fn with_defaults(yaw: &ParameterSpec) -> Self {
        Self {
            yaw: yaw.default,
            pitch: PITCH_SPEC.default,
            roll: ROLL_SPEC.default,
        }
    }

    pub fn yaw(&self) -> f64 {
        self.yaw
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn roll(&self) -> f64 {
        self.roll
    }
}

fn write_clamped(slot: &mut f64, spec: &ParameterSpec, value: f64) -> f64 {
    if let Some(value) = spec.clamp(value) {
        *slot = value;
    }
    *slot
}

/// Unconstrained 6-DOF projector placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FreeSetup {
    orientation: Orientation,
    lens: Lens,
    position: DVec3,
}

impl Default for FreeSetup {
    fn default() -> Self {
        Self {
            orientation: Orientation::with_defaults(&FREE_YAW_SPEC),
            lens: Lens::default(),
            position: DVec3::ZERO,
        }
    }
}

impl FreeSetup {
    pub const TYPE_ID: &'static str = "FreeSetup";

    const MOUNT_PARAMETERS: [Parameter; 6] = [
        Parameter::Yaw,
        Parameter::Roll,
        Parameter::Pitch,
        Parameter::X,
        Parameter::Y,
        Parameter::Z,
    ];

    pub fn spec(parameter: Parameter) -> Option<ParameterSpec> {
        match parameter {
            Parameter::Fov => Some(FOV_SPEC),
            Parameter::ThrowRatio => Some(THROW_RATIO_SPEC),
            Parameter::Yaw => Some(FREE_YAW_SPEC),
            Parameter::Pitch => Some(PITCH_SPEC),
            Parameter::Roll => Some(ROLL_SPEC),
            Parameter::X | Parameter::Y | Parameter::Z => Some(OFFSET_SPEC),
            _ => None,
        }
    }

    pub fn orientation(&self) -> &Orientation {
        &self.orientation
    }

    pub fn lens(&self) -> &Lens {
        &self.lens
    }

    pub fn position(&self) -> DVec3 {
        self.position
    }

    pub fn set_yaw(&mut self, yaw: f64) -> f64 {
        write_clamped(&mut self.orientation.yaw, &FREE_YAW_SPEC, yaw)
    }

    pub fn set_pitch(&mut self, pitch: f64) -> f64 {
        write_clamped(&mut self.orientation.pitch, &PITCH_SPEC, pitch)
    }

    pub fn set_roll(&mut self, roll: f64) -> f64 {
        write_clamped(&mut self.orientation.roll, &ROLL_SPEC, roll)
    }

    pub fn set_position(&mut self, x: f64, y: f64, z: f64) -> DVec3 {
        write_clamped(&mut self.position.x, &OFFSET_SPEC, x);
        write_clamped(&mut self.position.y, &OFFSET_SPEC, y);
        write_clamped(&mut self.position.z, &OFFSET_SPEC, z);
        self.position
    }

    fn get(&self, parameter: Parameter) -> Option<f64> {
        match parameter {
            Parameter::Fov => Some(self.lens.fov),
            Parameter::ThrowRatio => Some(self.lens.throw_ratio),
            Parameter::Yaw => Some(self.orientation.yaw),
            Parameter::Pitch => Some(self.orientation.pitch),
            Parameter::Roll => Some(self.orientation.roll),
            Parameter::X => Some(self.position.x),
            Parameter::Y => Some(self.position.y),
            Parameter::Z => Some(self.position.z),
            _ => None,
        }
    }

    fn set(&mut self, parameter: Parameter, value: f64) -> Option<f64> {
        let applied = match parameter {
            Parameter::Fov => self.lens.set_fov(value),
            Parameter::ThrowRatio => self.lens.set_throw_ratio(value),
            Parameter::Yaw => self.set_yaw(value),
            Parameter::Pitch => self.set_pitch(value),
            Parameter::Roll => self.set_roll(value),
            Parameter::X => write_clamped(&mut self.position.x, &OFFSET_SPEC, value),
            Parameter::Y => write_clamped(&mut self.position.y, &OFFSET_SPEC, value),
            Parameter::Z => write_clamped(&mut self.position.z, &OFFSET_SPEC, value),
            _ => return None,
        };
        Some(applied)
    }
}

/// Ring/tower mount around a shared center.
///
/// The projector sits at `distance` from the center, `delta_yaw` degrees
/// around the ring and `tower_height` above the floor. Yaw, pitch and roll
/// are relative to the outward radial direction at that ring position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeripheralSetup {
    orientation: Orientation,
    lens: Lens,
    delta_yaw: f64,
    distance: f64,
    tower_height: f64,
    shift: f64,
}

impl Default for PeripheralSetup {
    fn default() -> Self {
        Self {
            orientation: Orientation::with_defaults(&PERIPHERAL_YAW_SPEC),
            lens: Lens::default(),
            delta_yaw: DELTA_YAW_SPEC.default,
            distance: DISTANCE_SPEC.default,
            tower_height: TOWER_HEIGHT_SPEC.default,
            shift: SHIFT_SPEC.default,
        }
    }
}

impl PeripheralSetup {
    pub const TYPE_ID: &'static str = "PeripheralSetup";

    const MOUNT_PARAMETERS: [Parameter; 7] = [
        Parameter::Yaw,
        Parameter::Distance,
        Parameter::Shift,
        Parameter::TowerHeight,
        Parameter::Pitch,
        Parameter::DeltaYaw,
        Parameter::Roll,
    ];

    pub fn spec(parameter: Parameter) -> Option<ParameterSpec> {
        match parameter {
            Parameter::Fov => Some(FOV_SPEC),
            Parameter::ThrowRatio => Some(THROW_RATIO_SPEC),
            Parameter::Yaw => Some(PERIPHERAL_YAW_SPEC),
            Parameter::Pitch => Some(PITCH_SPEC),
            Parameter::Roll => Some(ROLL_SPEC),
            Parameter::DeltaYaw => Some(DELTA_YAW_SPEC),
            Parameter::Distance => Some(DISTANCE_SPEC),
            Parameter::TowerHeight => Some(TOWER_HEIGHT_SPEC),
            Parameter::Shift => Some(SHIFT_SPEC),
            _ => None,
        }
    }

    pub fn orientation(&self) -> &Orientation {
        &self.orientation
    }

    pub fn lens(&self) -> &Lens {
        &self.lens
    }

    pub fn delta_yaw(&self) -> f64 {
        self.delta_yaw
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn tower_height(&self) -> f64 {
        self.tower_height
    }

    pub fn shift(&self) -> f64 {
        self.shift
    }

    pub fn set_yaw(&mut self, yaw: f64) -> f64 {
        write_clamped(&mut self.orientation.yaw, &PERIPHERAL_YAW_SPEC, yaw)
    }

    pub fn set_pitch(&mut self, pitch: f64) -> f64 {
        write_clamped(&mut self.orientation.pitch, &PITCH_SPEC, pitch)
    }

    pub fn set_roll(&mut self, roll: f64) -> f64 {
        write_clamped(&mut self.orientation.roll, &ROLL_SPEC, roll)
    }

    pub fn set_delta_yaw(&mut self, delta_yaw: f64) -> f64 {
        write_clamped(&mut self.delta_yaw, &DELTA_YAW_SPEC, delta_yaw)
    }

    pub fn set_distance(&mut self, distance: f64) -> f64 {
        write_clamped(&mut self.distance, &DISTANCE_SPEC, distance)
    }

    pub fn set_tower_height(&mut self, tower_height: f64) -> f64 {
        write_clamped(&mut self.tower_height, &TOWER_HEIGHT_SPEC, tower_height)
    }

    pub fn set_shift(&mut self, shift: f64) -> f64 {
        write_clamped(&mut self.shift, &SHIFT_SPEC, shift)
    }

    fn get(&self, parameter: Parameter) -> Option<f64> {
        match parameter {
            Parameter::Fov => Some(self.lens.fov),
            Parameter::ThrowRatio => Some(self.lens.throw_ratio),
            Parameter::Yaw => Some(self.orientation.yaw),
            Parameter::Pitch => Some(self.orientation.pitch),
            Parameter::Roll => Some(self.orientation.roll),
            Parameter::DeltaYaw => Some(self.delta_yaw),
            Parameter::Distance => Some(self.distance),
            Parameter::TowerHeight => Some(self.tower_height),
            Parameter::Shift => Some(self.shift),
            _ => None,
        }
    }

    fn set(&mut self, parameter: Parameter, value: f64) -> Option<f64> {
        let applied = match parameter {
            Parameter::Fov => self.lens.set_fov(value),
            Parameter::ThrowRatio => self.lens.set_throw_ratio(value),
            Parameter::Yaw => self.set_yaw(value),
            Parameter::Pitch => self.set_pitch(value),
            Parameter::Roll => self.set_roll(value),
            Parameter::DeltaYaw => self.set_delta_yaw(value),
            Parameter::Distance => self.set_distance(value),
            Parameter::TowerHeight => self.set_tower_height(value),
            Parameter::Shift => self.set_shift(value),
            _ => return None,
        };
        Some(applied)
    }
}

/// Mount geometry variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SetupKind {
    Free,
    Peripheral,
}

impl SetupKind {
    pub fn type_id(&self) -> &'static str {
        match self {
            SetupKind::Free => FreeSetup::TYPE_ID,
            SetupKind::Peripheral => PeripheralSetup::TYPE_ID,
        }
    }

    pub fn from_type_id(type_id: &str) -> Option<Self> {
        match type_id {
            FreeSetup::TYPE_ID => Some(SetupKind::Free),
            PeripheralSetup::TYPE_ID => Some(SetupKind::Peripheral),
            _ => None,
        }
    }
}

/// Projector placement, one of the supported mount geometries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ProjectorSetup {
    Free(FreeSetup),
    Peripheral(PeripheralSetup),
}

impl Default for ProjectorSetup {
    fn default() -> Self {
        ProjectorSetup::Peripheral(PeripheralSetup::default())
    }
}

impl From<FreeSetup> for ProjectorSetup {
    fn from(setup: FreeSetup) -> Self {
        ProjectorSetup::Free(setup)
    }
}

impl From<PeripheralSetup> for ProjectorSetup {
    fn from(setup: PeripheralSetup) -> Self {
        ProjectorSetup::Peripheral(setup)
    }
}

impl ProjectorSetup {
    /// Create a setup of the given kind with default values.
    pub fn new(kind: SetupKind) -> Self {
        match kind {
            SetupKind::Free => FreeSetup::default().into(),
            SetupKind::Peripheral => PeripheralSetup::default().into(),
        }
    }

    pub fn kind(&self) -> SetupKind {
        match self {
            ProjectorSetup::Free(_) => SetupKind::Free,
            ProjectorSetup::Peripheral(_) => SetupKind::Peripheral,
        }
    }

    /// Type tag consumed by the parameter UI ("FreeSetup" / "PeripheralSetup").
    pub fn type_id(&self) -> &'static str {
        self.kind().type_id()
    }

    pub fn lens(&self) -> &Lens {
        match self {
            ProjectorSetup::Free(s) => &s.lens,
            ProjectorSetup::Peripheral(s) => &s.lens,
        }
    }

    pub fn orientation(&self) -> &Orientation {
        match self {
            ProjectorSetup::Free(s) => &s.orientation,
            ProjectorSetup::Peripheral(s) => &s.orientation,
        }
    }

    /// Range and steps of a parameter for this variant.
    pub fn parameter_spec(&self, parameter: Parameter) -> Option<ParameterSpec> {
        match self {
            ProjectorSetup::Free(_) => FreeSetup::spec(parameter),
            ProjectorSetup::Peripheral(_) => PeripheralSetup::spec(parameter),
        }
    }

    /// Parameters in display order for a UI group.
    pub fn parameters(&self, group: ParameterGroup) -> &'static [Parameter] {
        const LENS: [Parameter; 2] = [Parameter::Fov, Parameter::ThrowRatio];
        match (group, self) {
            (ParameterGroup::Lens, _) => &LENS,
            (ParameterGroup::Mount, ProjectorSetup::Free(_)) => &FreeSetup::MOUNT_PARAMETERS,
            (ParameterGroup::Mount, ProjectorSetup::Peripheral(_)) => {
                &PeripheralSetup::MOUNT_PARAMETERS
            }
        }
    }

    pub fn parameter(&self, parameter: Parameter) -> Option<f64> {
        match self {
            ProjectorSetup::Free(s) => s.get(parameter),
            ProjectorSetup::Peripheral(s) => s.get(parameter),
        }
    }

    /// Write a parameter, clamping it into range. Returns the stored value.
    pub fn set_parameter(
        &mut self,
        parameter: Parameter,
        value: f64,
    ) -> Result<f64, ParameterError> {
        let setup = self.type_id();
        let applied = match self {
            ProjectorSetup::Free(s) => s.set(parameter, value),
            ProjectorSetup::Peripheral(s) => s.set(parameter, value),
        };
        applied.ok_or(ParameterError::NotApplicable {
            parameter: parameter.name(),
            setup,
        })
    }

    pub fn set_parameter_by_name(&mut self, name: &str, value: f64) -> Result<f64, ParameterError> {
        let parameter =
            Parameter::from_name(name).ok_or_else(|| ParameterError::Unknown(name.to_string()))?;
        self.set_parameter(parameter, value)
    }

    /// Convert to another mount kind, keeping orientation and lens.
    pub fn converted(&self, kind: SetupKind) -> Self {
        if kind == self.kind() {
            return *self;
        }
        let mut target = Self::new(kind);
        for parameter in [Parameter::Fov, Parameter::Yaw, Parameter::Pitch, Parameter::Roll] {
            if let Some(value) = self.parameter(parameter) {
                let _ = target.set_parameter(parameter, value);
            }
        }
        target
    }

    /// Derived pose. Recomputed from the current values on every call.
    pub fn pose(&self) -> Pose {
        compute_pose(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_ids() {
        assert_eq!(ProjectorSetup::new(SetupKind::Free).type_id(), "FreeSetup");
        assert_eq!(ProjectorSetup::new(SetupKind::Peripheral).type_id(), "PeripheralSetup");
        assert_eq!(SetupKind::from_type_id("PeripheralSetup"), Some(SetupKind::Peripheral));
        assert_eq!(SetupKind::from_type_id("Bogus"), None);
    }

    #[test]
    fn test_clamping_far_out_of_range() {
        for kind in [SetupKind::Free, SetupKind::Peripheral] {
            let mut setup = ProjectorSetup::new(kind);
            for parameter in Parameter::ALL {
                let Some(spec) = setup.parameter_spec(parameter) else {
                    continue;
                };
                let values = [
                    -1.0e12,
                    -361.0,
                    -0.5,
                    0.0,
                    7.5,
                    1.0e12,
                    f64::INFINITY,
                    f64::NEG_INFINITY,
                ];
                for value in values {
                    setup.set_parameter(parameter, value).unwrap();
                    let stored = setup.parameter(parameter).unwrap();
                    assert!(spec.contains(stored), "{} = {} out of range", parameter, stored);
                }
            }
        }
    }

    #[test]
    fn test_nan_keeps_previous_value() {
        let mut setup = ProjectorSetup::new(SetupKind::Free);
        setup.set_parameter(Parameter::Pitch, 12.0).unwrap();
        let applied = setup.set_parameter(Parameter::Pitch, f64::NAN).unwrap();
        assert_eq!(applied, 12.0);
    }

    #[test]
    fn test_fov_and_throw_ratio_are_linked() {
        let mut lens = Lens::default();
        lens.set_fov(90.0);
        assert!((lens.throw_ratio() - 0.5).abs() < 1e-12);

        lens.set_throw_ratio(1.0);
        let expected = 2.0 * 0.5f64.atan().to_degrees();
        assert!((lens.fov() - expected).abs() < 1e-9);

        // Extremes clamp the partner instead of leaving the range
        lens.set_fov(10.0);
        assert_eq!(lens.throw_ratio(), 5.0);
    }

    #[test]
    fn test_parameter_not_applicable() {
        let mut setup = ProjectorSetup::new(SetupKind::Peripheral);
        let err = setup.set_parameter(Parameter::X, 1.0).unwrap_err();
        assert_eq!(
            err,
            ParameterError::NotApplicable {
                parameter: "X",
                setup: "PeripheralSetup"
            }
        );
        assert!(setup.parameter(Parameter::X).is_none());
    }

    #[test]
    fn test_set_by_name() {
        let mut setup = ProjectorSetup::new(SetupKind::Peripheral);
        assert_eq!(setup.set_parameter_by_name("Tower Height", 100.0), Ok(10.0));
        assert_eq!(setup.set_parameter_by_name("delta yaw", -90.0), Ok(-45.0));
        assert!(matches!(
            setup.set_parameter_by_name("Zoom", 1.0),
            Err(ParameterError::Unknown(_))
        ));
    }

    #[test]
    fn test_yaw_range_differs_per_variant() {
        let mut free = ProjectorSetup::new(SetupKind::Free);
        let mut peripheral = ProjectorSetup::new(SetupKind::Peripheral);
        assert_eq!(free.set_parameter(Parameter::Yaw, -30.0), Ok(0.0));
        assert_eq!(peripheral.set_parameter(Parameter::Yaw, -30.0), Ok(-30.0));
    }

    #[test]
    fn test_parameter_groups() {
        let free = ProjectorSetup::new(SetupKind::Free);
        let peripheral = ProjectorSetup::new(SetupKind::Peripheral);
        assert_eq!(free.parameters(ParameterGroup::Mount).len(), 6);
        assert_eq!(peripheral.parameters(ParameterGroup::Mount).len(), 7);
        assert_eq!(
            free.parameters(ParameterGroup::Lens),
            &[Parameter::Fov, Parameter::ThrowRatio]
        );
        for parameter in peripheral.parameters(ParameterGroup::Mount) {
            assert!(peripheral.parameter(*parameter).is_some());
        }
    }

    #[test]
    fn test_convert_keeps_orientation_and_lens() {
        let mut setup = ProjectorSetup::new(SetupKind::Peripheral);
        setup.set_parameter(Parameter::Pitch, 45.0).unwrap();
        setup.set_parameter(Parameter::Fov, 90.0).unwrap();
        let free = setup.converted(SetupKind::Free);
        assert_eq!(free.kind(), SetupKind::Free);
        assert_eq!(free.parameter(Parameter::Pitch), Some(45.0));
        assert_eq!(free.parameter(Parameter::Fov), Some(90.0));
    }
}
