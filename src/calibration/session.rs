//! Calibration session state machine.
//!
//! All edits go through [`Calibration`], which records why it became dirty.
//! Recomputation is split in three steps so it can run off the control
//! thread: [`Calibration::begin_update`] snapshots the tunings into an
//! [`UpdateJob`], [`UpdateJob::run`] computes poses, overlaps and masks, and
//! [`Calibration::finish_update`] publishes the result only if nothing was
//! edited in between.

use std::sync::Arc;

use glam::{DVec2, DVec3};
use thiserror::Error;

use super::plan::{DrawEntry, DrawPlan, OutputType};
use crate::blending::{
    BlendMask, BlendSettings, ColorCorrection, CoverageField, CoverageSample, FootprintSettings,
    OverlapCache, OverlapRegion, RefreshStats,
};
use crate::config::{CalibratorConfig, WarpSettings};
use crate::projector::{
    Parameter, ParameterError, ProjectorFrustum, ProjectorId, ProjectorSetup, ScreenGeometry,
    SetupKind, Tuning,
};
use crate::surface::SurfaceDescriptor;
use crate::warp::{WarpGrid, WarpGridError, WarpVertex};

/// Errors from editing a calibration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("no projector at index {0}")]
    NoSuchProjector(usize),
    #[error(transparent)]
    Parameter(#[from] ParameterError),
    #[error(transparent)]
    Warp(#[from] WarpGridError),
}

/// Recomputation state of a calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The published plan reflects every edit.
    Clean,
    /// Something changed since the last published plan.
    Dirty,
    /// A snapshot is being recomputed.
    Recomputing,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Clean => write!(f, "Clean"),
            SessionState::Dirty => write!(f, "Dirty"),
            SessionState::Recomputing => write!(f, "Recomputing"),
        }
    }
}

/// Why a calibration needs recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyReason {
    Initialized,
    ProjectorAdded(ProjectorId),
    ProjectorRemoved(ProjectorId),
    ParameterChanged(ProjectorId, Parameter),
    SetupChanged(ProjectorId),
    ScreenChanged(ProjectorId),
    ColorChanged(ProjectorId),
    WarpChanged(ProjectorId),
    Renamed(ProjectorId),
    Reordered,
    SurfaceChanged,
    OutputTypeChanged,
    SettingsChanged,
}

impl std::fmt::Display for DirtyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirtyReason::Initialized => write!(f, "initialized"),
            DirtyReason::ProjectorAdded(id) => write!(f, "{id} added"),
            DirtyReason::ProjectorRemoved(id) => write!(f, "{id} removed"),
            DirtyReason::ParameterChanged(id, parameter) => {
                write!(f, "{id} {} changed", parameter.name())
            }
            DirtyReason::SetupChanged(id) => write!(f, "{id} setup changed"),
            DirtyReason::ScreenChanged(id) => write!(f, "{id} screen changed"),
            DirtyReason::ColorChanged(id) => write!(f, "{id} color correction changed"),
            DirtyReason::WarpChanged(id) => write!(f, "{id} warp changed"),
            DirtyReason::Renamed(id) => write!(f, "{id} renamed"),
            DirtyReason::Reordered => write!(f, "projectors reordered"),
            DirtyReason::SurfaceChanged => write!(f, "surface changed"),
            DirtyReason::OutputTypeChanged => write!(f, "output type changed"),
            DirtyReason::SettingsChanged => write!(f, "settings changed"),
        }
    }
}

/// Snapshot of a calibration, recomputed without touching the session.
#[derive(Debug, Clone)]
pub struct UpdateJob {
    revision: u64,
    membership_epoch: u64,
    output_type: OutputType,
    surface: Option<SurfaceDescriptor>,
    footprint: FootprintSettings,
    blend: BlendSettings,
    parallel: bool,
    tunings: Vec<Tuning>,
    cache: OverlapCache,
}

/// Output of an [`UpdateJob`], to be handed back to
/// [`Calibration::finish_update`].
#[derive(Debug, Clone)]
pub struct UpdateResult {
    revision: u64,
    membership_epoch: u64,
    output_type: OutputType,
    unmappable: bool,
    entries: Vec<DrawEntry>,
    cache: OverlapCache,
    stats: RefreshStats,
}

impl UpdateResult {
    pub fn stats(&self) -> RefreshStats {
        self.stats
    }
}

impl UpdateJob {
    pub fn projector_count(&self) -> usize {
        self.tunings.len()
    }

    /// Recompute overlaps, masks and draw entries for the snapshot.
    pub fn run(mut self) -> UpdateResult {
        let surface = match self.surface {
            Some(surface) if !surface.is_degenerate() => surface,
            _ => {
                self.cache.clear();
                return UpdateResult {
                    revision: self.revision,
                    membership_epoch: self.membership_epoch,
                    output_type: self.output_type,
                    unmappable: true,
                    entries: Vec::new(),
                    cache: self.cache,
                    stats: RefreshStats::default(),
                };
            }
        };

        let frusta: Vec<(ProjectorId, ProjectorFrustum)> =
            self.tunings.iter().map(|t| (t.id(), t.frustum())).collect();
        let stats = self
            .cache
            .refresh(&frusta, &surface, &self.footprint, &self.blend, self.parallel);

        let entries = self
            .tunings
            .iter()
            .zip(&frusta)
            .map(|(tuning, (id, frustum))| {
                let blend_mask = if self.output_type.uses_blending() {
                    match self.cache.mask(*id) {
                        Some(mask) => Arc::clone(mask),
                        None => Arc::new(BlendMask::zeros(0, 0)),
                    }
                } else {
                    Arc::new(CoverageField::coverage_mask(&surface, frustum, &self.blend))
                };
                DrawEntry {
                    projector: *id,
                    name: tuning.name.clone(),
                    pose: *tuning.pose(),
                    frustum: *frustum,
                    screen: tuning.screen,
                    blend_mask,
                    warp: Arc::clone(tuning.warp()),
                    color_correction: tuning.color_correction,
                }
            })
            .collect();

        UpdateResult {
            revision: self.revision,
            membership_epoch: self.membership_epoch,
            output_type: self.output_type,
            unmappable: false,
            entries,
            cache: self.cache,
            stats,
        }
    }
}

/// Ordered set of projector tunings for one output configuration.
#[derive(Debug)]
pub struct Calibration {
    tunings: Vec<Tuning>,
    output_type: OutputType,
    surface: Option<SurfaceDescriptor>,
    footprint: FootprintSettings,
    blend: BlendSettings,
    warp: WarpSettings,
    parallel: bool,
    state: SessionState,
    dirty_reasons: Vec<DirtyReason>,
    revision: u64,
    membership_epoch: u64,
    generation: u64,
    next_id: u32,
    selected: Option<ProjectorId>,
    cache: OverlapCache,
    plan: Arc<DrawPlan>,
    unmappable: bool,
}

impl Default for Calibration {
    fn default() -> Self {
        Self::from_config(&CalibratorConfig::default())
    }
}

impl Calibration {
    /// Empty calibration for a surface with default settings.
    pub fn new(surface: Option<SurfaceDescriptor>) -> Self {
        let mut calibration = Self::default();
        calibration.surface = surface;
        calibration
    }

    pub fn from_config(config: &CalibratorConfig) -> Self {
        Self {
            tunings: Vec::new(),
            output_type: config.output,
            surface: config.surface,
            footprint: config.footprint,
            blend: config.blend,
            warp: config.warp,
            parallel: config.parallel,
            state: SessionState::Dirty,
            dirty_reasons: vec![DirtyReason::Initialized],
            revision: 0,
            membership_epoch: 0,
            generation: 0,
            next_id: 1,
            selected: None,
            cache: OverlapCache::new(),
            plan: Arc::new(DrawPlan::empty(0, config.output)),
            unmappable: false,
        }
    }

    fn mark_dirty(&mut self, reason: DirtyReason) {
        log::debug!("Calibration dirty: {reason}");
        self.revision += 1;
        self.state = SessionState::Dirty;
        self.dirty_reasons.push(reason);
    }

    fn tuning_index(&self, index: usize) -> Result<usize, SessionError> {
        if index < self.tunings.len() {
            Ok(index)
        } else {
            Err(SessionError::NoSuchProjector(index))
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True until a plan reflecting every edit has been published.
    pub fn needs_update(&self) -> bool {
        self.state != SessionState::Clean
    }

    /// Reasons recorded since the last published plan.
    pub fn dirty_reasons(&self) -> &[DirtyReason] {
        &self.dirty_reasons
    }

    pub fn len(&self) -> usize {
        self.tunings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tunings.is_empty()
    }

    pub fn tunings(&self) -> &[Tuning] {
        &self.tunings
    }

    pub fn tuning(&self, index: usize) -> Option<&Tuning> {
        self.tunings.get(index)
    }

    pub fn tuning_by_id(&self, id: ProjectorId) -> Option<&Tuning> {
        self.tunings.iter().find(|t| t.id() == id)
    }

    pub fn index_of(&self, id: ProjectorId) -> Option<usize> {
        self.tunings.iter().position(|t| t.id() == id)
    }

    /// Append a projector. Its id is never reused in this calibration.
    pub fn add_projector(&mut self, setup: ProjectorSetup) -> ProjectorId {
        let id = ProjectorId(self.next_id);
        self.next_id += 1;
        let mut tuning = Tuning::new(id, setup);
        let mut grid = WarpGrid::new(self.warp.rows, self.warp.cols);
        grid.interpolation = self.warp.interpolation;
        *tuning.warp_mut() = grid;
        self.tunings.push(tuning);
        self.membership_epoch += 1;
        log::info!("Added {id} ({} projectors)", self.tunings.len());
        self.mark_dirty(DirtyReason::ProjectorAdded(id));
        id
    }

    /// Remove the projector at `index`, keeping the order of the others.
    pub fn remove_projector(&mut self, index: usize) -> Option<Tuning> {
        if index >= self.tunings.len() {
            return None;
        }
        let tuning = self.tunings.remove(index);
        let id = tuning.id();
        if self.selected == Some(id) {
            self.selected = None;
        }
        self.membership_epoch += 1;
        log::info!("Removed {id} ({} projectors)", self.tunings.len());
        self.mark_dirty(DirtyReason::ProjectorRemoved(id));
        Some(tuning)
    }

    /// Move a projector to another position in the draw order.
    pub fn move_tuning(&mut self, from: usize, to: usize) -> Result<(), SessionError> {
        let from = self.tuning_index(from)?;
        let to = self.tuning_index(to)?;
        if from != to {
            let tuning = self.tunings.remove(from);
            self.tunings.insert(to, tuning);
            self.mark_dirty(DirtyReason::Reordered);
        }
        Ok(())
    }

    /// Set a parameter by key, clamped into range. Returns the applied value.
    pub fn set_parameter(
        &mut self,
        index: usize,
        parameter: Parameter,
        value: f64,
    ) -> Result<f64, SessionError> {
        let index = self.tuning_index(index)?;
        let tuning = &mut self.tunings[index];
        let applied = tuning.set_parameter(parameter, value)?;
        let id = tuning.id();
        self.mark_dirty(DirtyReason::ParameterChanged(id, parameter));
        Ok(applied)
    }

    /// Set a parameter by its display name, e.g. `"Delta Yaw"`.
    pub fn set_parameter_by_name(
        &mut self,
        index: usize,
        name: &str,
        value: f64,
    ) -> Result<f64, SessionError> {
        let parameter = Parameter::from_name(name)
            .ok_or_else(|| ParameterError::Unknown(name.to_string()))?;
        self.set_parameter(index, parameter, value)
    }

    pub fn set_setup(&mut self, index: usize, setup: ProjectorSetup) -> Result<(), SessionError> {
        let index = self.tuning_index(index)?;
        self.tunings[index].set_setup(setup);
        let id = self.tunings[index].id();
        self.mark_dirty(DirtyReason::SetupChanged(id));
        Ok(())
    }

    /// Switch a projector between mount kinds, keeping orientation and lens.
    pub fn convert_setup(&mut self, index: usize, kind: SetupKind) -> Result<(), SessionError> {
        let index = self.tuning_index(index)?;
        if self.tunings[index].setup().kind() == kind {
            return Ok(());
        }
        self.tunings[index].convert_setup(kind);
        let id = self.tunings[index].id();
        self.mark_dirty(DirtyReason::SetupChanged(id));
        Ok(())
    }

    pub fn set_screen(&mut self, index: usize, screen: ScreenGeometry) -> Result<(), SessionError> {
        let index = self.tuning_index(index)?;
        self.tunings[index].screen = screen;
        let id = self.tunings[index].id();
        self.mark_dirty(DirtyReason::ScreenChanged(id));
        Ok(())
    }

    pub fn set_color_correction(
        &mut self,
        index: usize,
        correction: ColorCorrection,
    ) -> Result<(), SessionError> {
        let index = self.tuning_index(index)?;
        self.tunings[index].color_correction = correction;
        let id = self.tunings[index].id();
        self.mark_dirty(DirtyReason::ColorChanged(id));
        Ok(())
    }

    pub fn rename(&mut self, index: usize, name: impl Into<String>) -> Result<(), SessionError> {
        let index = self.tuning_index(index)?;
        self.tunings[index].name = name.into();
        let id = self.tunings[index].id();
        self.mark_dirty(DirtyReason::Renamed(id));
        Ok(())
    }

    /// Edit a projector's warp grid. Published plans keep their copy.
    pub fn edit_warp<R>(
        &mut self,
        index: usize,
        edit: impl FnOnce(&mut WarpGrid) -> Result<R, WarpGridError>,
    ) -> Result<R, SessionError> {
        let index = self.tuning_index(index)?;
        let result = edit(self.tunings[index].warp_mut())?;
        let id = self.tunings[index].id();
        self.mark_dirty(DirtyReason::WarpChanged(id));
        Ok(result)
    }

    pub fn surface(&self) -> Option<&SurfaceDescriptor> {
        self.surface.as_ref()
    }

    pub fn set_surface(&mut self, surface: Option<SurfaceDescriptor>) {
        self.surface = surface;
        self.mark_dirty(DirtyReason::SurfaceChanged);
    }

    pub fn output_type(&self) -> OutputType {
        self.output_type
    }

    pub fn set_output_type(&mut self, output_type: OutputType) {
        if self.output_type != output_type {
            self.output_type = output_type;
            self.mark_dirty(DirtyReason::OutputTypeChanged);
        }
    }

    pub fn set_blend_settings(&mut self, blend: BlendSettings) {
        self.blend = blend;
        self.mark_dirty(DirtyReason::SettingsChanged);
    }

    pub fn set_footprint_settings(&mut self, footprint: FootprintSettings) {
        self.footprint = footprint;
        self.mark_dirty(DirtyReason::SettingsChanged);
    }

    pub fn warp_settings(&self) -> &WarpSettings {
        &self.warp
    }

    /// Triangle mesh of a projector's warp grid at the configured density.
    pub fn warp_mesh(&self, index: usize) -> Result<Vec<WarpVertex>, SessionError> {
        let index = self.tuning_index(index)?;
        Ok(self.tunings[index]
            .warp()
            .generate_mesh(self.warp.mesh_subdivisions))
    }

    /// Compute overlaps on the rayon pool. Does not affect results.
    pub fn set_parallel(&mut self, parallel: bool) {
        self.parallel = parallel;
    }

    pub fn selected(&self) -> Option<ProjectorId> {
        self.selected
    }

    /// Select the projector at `index`, or clear the selection.
    pub fn select(&mut self, index: Option<usize>) -> Result<(), SessionError> {
        let id = match index {
            Some(index) => Some(self.tunings[self.tuning_index(index)?].id()),
            None => None,
        };
        for tuning in &mut self.tunings {
            tuning.set_selected(Some(tuning.id()) == id);
        }
        self.selected = id;
        Ok(())
    }

    /// Snapshot the session for recomputation. `None` if already clean.
    pub fn begin_update(&mut self) -> Option<UpdateJob> {
        if self.state == SessionState::Clean {
            return None;
        }
        self.state = SessionState::Recomputing;
        Some(UpdateJob {
            revision: self.revision,
            membership_epoch: self.membership_epoch,
            output_type: self.output_type,
            surface: self.surface,
            footprint: self.footprint,
            blend: self.blend,
            parallel: self.parallel,
            tunings: self.tunings.clone(),
            cache: self.cache.clone(),
        })
    }

    /// Publish a finished job. Returns false if the session was edited after
    /// the job's snapshot was taken, or if its revision is already published.
    /// A stale result leaves the state alone, so a newer job still in flight
    /// can publish.
    pub fn finish_update(&mut self, result: UpdateResult) -> bool {
        if result.revision != self.revision {
            log::debug!(
                "Discarding stale recomputation (revision {} vs {})",
                result.revision,
                self.revision
            );
            return false;
        }
        if self.state == SessionState::Clean {
            log::debug!("Revision {} already published", result.revision);
            return false;
        }

        if result.unmappable && !self.unmappable {
            log::warn!("Surface is missing or degenerate, draw plan is empty");
        }
        self.generation += 1;
        self.unmappable = result.unmappable;
        self.cache = result.cache;
        self.plan = Arc::new(DrawPlan::new(
            self.generation,
            result.membership_epoch,
            result.output_type,
            result.unmappable,
            result.entries,
        ));
        self.state = SessionState::Clean;
        self.dirty_reasons.clear();
        log::info!(
            "Published draw plan {} with {} projectors",
            self.generation,
            self.plan.len()
        );
        true
    }

    /// Recompute if dirty. Idempotent: a clean session is left untouched.
    /// Returns true if a new plan was published.
    pub fn update(&mut self) -> bool {
        match self.begin_update() {
            Some(job) => self.finish_update(job.run()),
            None => false,
        }
    }

    /// Latest published plan.
    pub fn draw_plan(&self) -> Arc<DrawPlan> {
        Arc::clone(&self.plan)
    }

    /// True if the last update found no usable surface.
    pub fn is_unmappable(&self) -> bool {
        self.unmappable
    }

    /// False once projectors were added or removed after `plan` was issued.
    pub fn plan_is_current(&self, plan: &DrawPlan) -> bool {
        plan.membership_epoch() == self.membership_epoch
    }

    /// Overlap of two projectors as of the last published plan.
    pub fn overlap(&self, a: ProjectorId, b: ProjectorId) -> Option<Arc<OverlapRegion>> {
        self.cache.overlap(a, b).cloned()
    }

    /// Blend weights at a surface point for the current tunings.
    pub fn coverage_at(&self, point: DVec3) -> CoverageSample {
        let Some(surface) = self.surface.filter(|s| !s.is_degenerate()) else {
            return CoverageSample::Unmapped;
        };
        let frusta: Vec<(ProjectorId, ProjectorFrustum)> =
            self.tunings.iter().map(|t| (t.id(), t.frustum())).collect();
        CoverageField::new(&surface, &frusta, &self.blend).sample(point)
    }

    /// Blend weights at a surface parameter-space point.
    pub fn coverage_at_uv(&self, uv: DVec2) -> CoverageSample {
        match self.surface.and_then(|s| s.point_at(uv)) {
            Some(point) => self.coverage_at(point),
            None => CoverageSample::Unmapped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_calibration() -> Calibration {
        let mut calibration = Calibration::new(Some(SurfaceDescriptor::hemisphere(10.0)));
        calibration.set_parallel(false);
        for delta_yaw in [0.0, 30.0] {
            let index = calibration.len();
            calibration.add_projector(ProjectorSetup::new(SetupKind::Peripheral));
            calibration
                .set_parameter_by_name(index, "Delta Yaw", delta_yaw)
                .unwrap();
            calibration.set_parameter(index, Parameter::Fov, 60.0).unwrap();
        }
        calibration
    }

    #[test]
    fn test_new_calibration_needs_update() {
        let mut calibration = Calibration::new(Some(SurfaceDescriptor::default()));
        assert!(calibration.needs_update());
        assert_eq!(calibration.dirty_reasons(), &[DirtyReason::Initialized]);
        assert!(calibration.update());
        assert!(!calibration.needs_update());
        assert!(calibration.draw_plan().is_empty());
        assert!(!calibration.is_unmappable());
    }

    #[test]
    fn test_ring_scenario() {
        let mut calibration = ring_calibration();
        assert!(calibration.update());

        let plan = calibration.draw_plan();
        let ids: Vec<ProjectorId> = plan.projectors().collect();
        assert_eq!(ids, vec![ProjectorId(1), ProjectorId(2)]);

        let overlap = calibration.overlap(ProjectorId(2), ProjectorId(1)).unwrap();
        assert!(overlap.area > 0.0);
        let surface = calibration.surface().copied().unwrap();
        let (azimuth, _) = surface.angles_of(overlap.centroid().unwrap());
        assert!(azimuth > 0.0 && azimuth < 30.0);

        for entry in plan.entries() {
            assert!(entry.blend_mask.covered_texels() > 0);
        }
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut calibration = ring_calibration();
        calibration.update();
        let first = calibration.draw_plan();
        assert!(!calibration.needs_update());

        assert!(!calibration.update());
        let second = calibration.draw_plan();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, *second);
        assert!(!calibration.needs_update());
    }

    #[test]
    fn test_removing_only_projector_empties_plan() {
        let mut calibration = Calibration::new(Some(SurfaceDescriptor::hemisphere(10.0)));
        calibration.add_projector(ProjectorSetup::default());
        calibration.update();
        assert_eq!(calibration.draw_plan().len(), 1);

        assert!(calibration.remove_projector(0).is_some());
        assert!(calibration.needs_update());
        calibration.update();
        assert!(calibration.draw_plan().is_empty());
        assert!(calibration.overlap(ProjectorId(1), ProjectorId(2)).is_none());
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut calibration = Calibration::new(Some(SurfaceDescriptor::default()));
        for _ in 0..4 {
            calibration.add_projector(ProjectorSetup::default());
        }
        calibration.remove_projector(1);
        let ids: Vec<u32> = calibration.tunings().iter().map(|t| t.id().0).collect();
        assert_eq!(ids, vec![1, 3, 4]);

        // Ids are never reused
        assert_eq!(calibration.add_projector(ProjectorSetup::default()), ProjectorId(5));
        calibration.move_tuning(3, 0).unwrap();
        calibration.update();
        let ids: Vec<u32> = calibration.draw_plan().projectors().map(|id| id.0).collect();
        assert_eq!(ids, vec![5, 1, 3, 4]);
    }

    #[test]
    fn test_edit_during_recompute_is_not_published() {
        let mut calibration = ring_calibration();
        calibration.update();
        let published = calibration.draw_plan();

        calibration.set_parameter(0, Parameter::Pitch, 40.0).unwrap();
        let job = calibration.begin_update().unwrap();
        assert_eq!(calibration.state(), SessionState::Recomputing);

        calibration.set_parameter(0, Parameter::Pitch, 45.0).unwrap();
        assert_eq!(calibration.state(), SessionState::Dirty);

        let result = job.run();
        assert!(!calibration.finish_update(result));
        assert!(calibration.needs_update());
        assert!(Arc::ptr_eq(&published, &calibration.draw_plan()));

        assert!(calibration.update());
        let plan = calibration.draw_plan();
        assert_eq!(plan.entries()[0].pose, *calibration.tunings()[0].pose());
    }

    #[test]
    fn test_stale_job_does_not_block_newer_job() {
        let mut calibration = ring_calibration();
        let first = calibration.begin_update().unwrap();
        calibration.set_parameter(1, Parameter::Pitch, 40.0).unwrap();
        let second = calibration.begin_update().unwrap();
        assert_eq!(calibration.state(), SessionState::Recomputing);

        assert!(!calibration.finish_update(first.run()));
        assert_eq!(calibration.state(), SessionState::Recomputing);

        assert!(calibration.finish_update(second.run()));
        assert_eq!(calibration.state(), SessionState::Clean);
        let plan = calibration.draw_plan();
        assert_eq!(plan.entries()[1].pose, *calibration.tunings()[1].pose());
    }

    #[test]
    fn test_duplicate_result_is_published_once() {
        let mut calibration = ring_calibration();
        let first = calibration.begin_update().unwrap();
        let second = calibration.begin_update().unwrap();
        assert!(calibration.finish_update(first.run()));
        let published = calibration.draw_plan();

        assert!(!calibration.finish_update(second.run()));
        assert!(Arc::ptr_eq(&published, &calibration.draw_plan()));
    }

    #[test]
    fn test_warp_mesh_uses_configured_subdivisions() {
        let mut config = CalibratorConfig::default();
        config.warp.mesh_subdivisions = 3;
        let mut calibration = Calibration::from_config(&config);
        calibration.add_projector(ProjectorSetup::default());
        calibration
            .edit_warp(0, |grid| grid.set_control_point(1, 1, DVec2::new(0.05, 0.0)))
            .unwrap();

        let mesh = calibration.warp_mesh(0).unwrap();
        assert_eq!(mesh.len(), 3 * 3 * 6);
        assert!(mesh.iter().any(|v| v.position != v.uv));
        assert!(matches!(
            calibration.warp_mesh(1),
            Err(SessionError::NoSuchProjector(1))
        ));

        let default = Calibration::new(Some(SurfaceDescriptor::default()));
        assert_eq!(default.warp_settings().mesh_subdivisions, 8);
    }

    #[test]
    fn test_job_runs_on_another_thread() {
        let mut calibration = ring_calibration();
        let job = calibration.begin_update().unwrap();
        let result = std::thread::spawn(move || job.run()).join().unwrap();
        assert_eq!(result.stats().footprints, 2);
        assert!(calibration.finish_update(result));
        assert_eq!(calibration.draw_plan().len(), 2);
    }

    #[test]
    fn test_missing_surface_is_unmappable() {
        let mut calibration = Calibration::new(None);
        calibration.add_projector(ProjectorSetup::default());
        calibration.update();
        assert!(calibration.is_unmappable());
        assert!(calibration.draw_plan().is_unmappable());
        assert!(calibration.draw_plan().is_empty());
        assert!(!calibration.coverage_at_uv(DVec2::splat(0.5)).is_mapped());

        calibration.set_surface(Some(SurfaceDescriptor::hemisphere(5.0)));
        calibration.update();
        assert!(!calibration.is_unmappable());
        assert_eq!(calibration.draw_plan().len(), 1);
    }

    #[test]
    fn test_degenerate_surface_is_unmappable() {
        let mut calibration = Calibration::new(Some(SurfaceDescriptor::hemisphere(-1.0)));
        calibration.add_projector(ProjectorSetup::default());
        calibration.update();
        assert!(calibration.is_unmappable());
        assert!(calibration.draw_plan().is_empty());
    }

    #[test]
    fn test_stale_plan_after_membership_change() {
        let mut calibration = ring_calibration();
        calibration.update();
        let plan = calibration.draw_plan();
        assert!(calibration.plan_is_current(&plan));

        calibration.set_parameter(0, Parameter::Roll, 5.0).unwrap();
        assert!(calibration.plan_is_current(&plan));

        calibration.add_projector(ProjectorSetup::default());
        assert!(!calibration.plan_is_current(&plan));
        calibration.update();
        assert!(calibration.plan_is_current(&calibration.draw_plan()));
    }

    #[test]
    fn test_out_of_range_parameter_is_clamped() {
        let mut calibration = ring_calibration();
        let applied = calibration.set_parameter(0, Parameter::Distance, 1e9).unwrap();
        assert_eq!(applied, 10.0);
        assert_eq!(calibration.tunings()[0].parameter(Parameter::Distance), Some(10.0));
        assert!(matches!(
            calibration.set_parameter_by_name(0, "X", 1.0),
            Err(SessionError::Parameter(ParameterError::NotApplicable { .. }))
        ));
        assert_eq!(
            calibration.set_parameter(7, Parameter::Fov, 50.0),
            Err(SessionError::NoSuchProjector(7))
        );
    }

    #[test]
    fn test_output_types() {
        let mut calibration = ring_calibration();
        calibration.update();
        let blended = calibration.draw_plan();

        calibration.set_output_type(OutputType::MappedInput);
        calibration.update();
        let mapped = calibration.draw_plan();
        assert_eq!(mapped.output_type(), OutputType::MappedInput);
        for (b, m) in blended.entries().iter().zip(mapped.entries()) {
            assert!(m.blend_mask.mean() > b.blend_mask.mean());
            assert!(m.blend_mask.data.iter().all(|v| *v == 0.0 || *v == 1.0));
        }
    }

    #[test]
    fn test_warp_edits_are_copy_on_write() {
        let mut calibration = ring_calibration();
        calibration.update();
        let plan = calibration.draw_plan();

        calibration
            .edit_warp(0, |grid| grid.set_control_point(1, 1, DVec2::new(0.05, 0.0)))
            .unwrap();
        assert!(calibration.needs_update());
        assert!(plan.entries()[0].warp.is_identity());
        assert!(matches!(
            calibration.edit_warp(0, |grid| grid.set_control_point(0, 0, DVec2::ZERO)),
            Err(SessionError::Warp(WarpGridError::Pinned { .. }))
        ));

        calibration.update();
        assert!(!calibration.draw_plan().entries()[0].warp.is_identity());
    }

    #[test]
    fn test_coverage_queries() {
        let calibration = ring_calibration();
        let surface = calibration.surface().copied().unwrap();
        let shared = calibration.coverage_at_uv(surface.uv_from_angles(15.0, 28.0));
        assert_eq!(shared.projector_count(), 2);
        assert!((shared.total() - 1.0).abs() < 1e-9);

        let point = surface.point_at(surface.uv_from_angles(0.0, 20.0)).unwrap();
        let single = calibration.coverage_at(point);
        assert_eq!(single.weight(ProjectorId(1)), 1.0);

        let zenith = calibration.coverage_at_uv(DVec2::splat(0.5));
        assert!(!zenith.is_mapped());
    }

    #[test]
    fn test_selection() {
        let mut calibration = ring_calibration();
        calibration.select(Some(1)).unwrap();
        assert_eq!(calibration.selected(), Some(ProjectorId(2)));
        assert!(calibration.tunings()[1].is_selected());
        assert!(!calibration.tunings()[0].is_selected());
        calibration.remove_projector(1);
        assert_eq!(calibration.selected(), None);
        assert_eq!(calibration.select(Some(4)), Err(SessionError::NoSuchProjector(4)));
    }
}
