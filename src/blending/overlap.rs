//! Overlap detection between projector frusta on the dome.
//!
//! Each projector's frustum is traced onto the surface as a footprint
//! polygon in surface parameter space. Pairwise overlaps are polygon
//! intersections of footprints. Blend weights are evaluated exactly at
//! surface points by projecting them back into every projector image.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use glam::{DVec2, DVec3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::polygon::{intersect_polygons, Polygon};
use super::{BlendCurve, BlendMask};
use crate::projector::{ProjectorFrustum, ProjectorId};
use crate::surface::SurfaceDescriptor;

/// Sampling density of footprint polygons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FootprintSettings {
    /// Rays traced per frustum side.
    pub edge_samples: usize,
    /// Segments of the rim polygon footprints are clipped against.
    pub rim_segments: usize,
}

impl Default for FootprintSettings {
    fn default() -> Self {
        Self {
            edge_samples: 16,
            rim_segments: 128,
        }
    }
}

/// Blend weight evaluation and mask rasterization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendSettings {
    pub curve: BlendCurve,
    /// Normalized edge distance over which a projector fades in, (0, 1].
    pub falloff_width: f64,
    /// Mask width in texels; height follows the projector aspect.
    pub mask_width: u32,
}

impl Default for BlendSettings {
    fn default() -> Self {
        Self {
            curve: BlendCurve::Smoothstep,
            falloff_width: 0.25,
            mask_width: 128,
        }
    }
}

impl BlendSettings {
    fn falloff_width(&self) -> f64 {
        if self.falloff_width.is_finite() && self.falloff_width > 0.0 {
            self.falloff_width.min(1.0)
        } else {
            1.0
        }
    }

    /// Unnormalized contribution for an edge distance.
    pub fn falloff(&self, edge_distance: f64) -> f64 {
        if edge_distance <= 0.0 {
            return 0.0;
        }
        self.curve.apply(edge_distance / self.falloff_width())
    }

    /// Mask size for an image aspect (height / width).
    pub fn mask_size(&self, aspect: f64) -> (u32, u32) {
        let width = self.mask_width.max(1);
        let height = (width as f64 * aspect).round().max(1.0) as u32;
        (width, height)
    }
}

/// Region of the surface lit by one projector, in surface parameter space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Footprint {
    pub projector: ProjectorId,
    pub polygon: Polygon,
}

impl Footprint {
    /// Trace the frustum boundary onto the surface.
    ///
    /// A frustum that misses the cap yields an empty footprint.
    pub fn compute(
        projector: ProjectorId,
        frustum: &ProjectorFrustum,
        surface: &SurfaceDescriptor,
        settings: &FootprintSettings,
    ) -> Self {
        let empty = Self {
            projector,
            polygon: Polygon::default(),
        };
        if surface.is_degenerate() {
            return empty;
        }

        let rim = Polygon::new(surface.rim_polygon(settings.rim_segments));
        let origin = frustum.pose.position;

        // The parameterization is singular at the nadir. A frustum enclosing
        // it wraps around the whole parameter disk, so the footprint falls
        // back to the full cap.
        let nadir = surface.center() - DVec3::Z * surface.radius();
        if let Some(st) = frustum.project(nadir) {
            if ProjectorFrustum::edge_distance(st) > 0.0 && surface.is_visible_from(origin, nadir) {
                log::debug!(
                    "{projector} frustum encloses the nadir, using the full cap as footprint"
                );
                return Self {
                    projector,
                    polygon: rim,
                };
            }
        }

        let points: Vec<DVec2> = ProjectorFrustum::boundary(settings.edge_samples)
            .into_iter()
            .filter_map(|st| surface.footprint_uv(origin, frustum.ray_direction(st)))
            .collect();
        if points.len() < 3 {
            return empty;
        }

        let polygon = Polygon::new(points).into_ccw().clip_convex(&rim);
        if polygon.is_empty() {
            return empty;
        }
        Self { projector, polygon }
    }

    pub fn is_empty(&self) -> bool {
        self.polygon.is_empty()
    }

    pub fn area(&self) -> f64 {
        self.polygon.area()
    }
}

/// Unordered pair of projectors. `PairKey::new(a, b) == PairKey::new(b, a)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PairKey {
    first: ProjectorId,
    second: ProjectorId,
}

impl PairKey {
    pub fn new(a: ProjectorId, b: ProjectorId) -> Self {
        Self {
            first: a.min(b),
            second: a.max(b),
        }
    }

    pub fn first(&self) -> ProjectorId {
        self.first
    }

    pub fn second(&self) -> ProjectorId {
        self.second
    }

    pub fn contains(&self, id: ProjectorId) -> bool {
        self.first == id || self.second == id
    }

    /// The partner of `id` in this pair.
    pub fn other(&self, id: ProjectorId) -> Option<ProjectorId> {
        if self.first == id {
            Some(self.second)
        } else if self.second == id {
            Some(self.first)
        } else {
            None
        }
    }
}

/// Overlap of two footprints: non-overlapping polygon pieces in surface
/// parameter space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlapRegion {
    pub pair: PairKey,
    pub polygons: Vec<Polygon>,
    pub area: f64,
}

impl OverlapRegion {
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn contains(&self, uv: DVec2) -> bool {
        self.polygons.iter().any(|p| p.contains(uv))
    }

    /// Area-weighted centroid of all pieces.
    pub fn centroid(&self) -> Option<DVec2> {
        if self.area <= 0.0 {
            return None;
        }
        let sum = self
            .polygons
            .iter()
            .filter_map(|p| p.centroid().map(|c| c * p.area()))
            .fold(DVec2::ZERO, |acc, c| acc + c);
        Some(sum / self.area)
    }
}

/// Footprint tracing and pairwise overlap of projector frusta.
#[derive(Debug, Clone, Default)]
pub struct FrustumIntersection {
    settings: FootprintSettings,
    parallel: bool,
}

impl FrustumIntersection {
    pub fn new(settings: FootprintSettings) -> Self {
        Self {
            settings,
            parallel: true,
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn settings(&self) -> &FootprintSettings {
        &self.settings
    }

    pub fn footprint(
        &self,
        projector: ProjectorId,
        frustum: &ProjectorFrustum,
        surface: &SurfaceDescriptor,
    ) -> Footprint {
        Footprint::compute(projector, frustum, surface, &self.settings)
    }

    /// Overlap of two footprints. The argument order does not matter.
    pub fn intersect_pair(a: &Footprint, b: &Footprint) -> OverlapRegion {
        let pair = PairKey::new(a.projector, b.projector);
        let (subject, clip) = if a.projector <= b.projector { (a, b) } else { (b, a) };
        let polygons = intersect_polygons(&subject.polygon, &clip.polygon);
        let area = polygons.iter().map(Polygon::area).sum();
        OverlapRegion {
            pair,
            polygons,
            area,
        }
    }

    /// Overlaps of every projector pair.
    pub fn intersect(
        &self,
        frusta: &[(ProjectorId, ProjectorFrustum)],
        surface: &SurfaceDescriptor,
    ) -> BTreeMap<PairKey, OverlapRegion> {
        let footprints = map_maybe_parallel(frusta, self.parallel, |(id, frustum)| {
            self.footprint(*id, frustum, surface)
        });
        let mut pairs = Vec::new();
        for i in 0..footprints.len() {
            for j in (i + 1)..footprints.len() {
                pairs.push((i, j));
            }
        }
        map_maybe_parallel(&pairs, self.parallel, |(i, j)| {
            Self::intersect_pair(&footprints[*i], &footprints[*j])
        })
        .into_iter()
        .map(|region| (region.pair, region))
        .collect()
    }
}

fn map_maybe_parallel<T, R, F>(items: &[T], parallel: bool, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    if parallel {
        items.par_iter().map(f).collect()
    } else {
        items.iter().map(f).collect()
    }
}

/// Projector contributions at one surface point.
#[derive(Debug, Clone, PartialEq)]
pub enum CoverageSample {
    /// No projector lights the point.
    Unmapped,
    /// Normalized weights of the covering projectors, summing to 1.
    Covered(Vec<(ProjectorId, f64)>),
}

impl CoverageSample {
    pub fn is_mapped(&self) -> bool {
        matches!(self, CoverageSample::Covered(_))
    }

    pub fn weight(&self, id: ProjectorId) -> f64 {
        match self {
            CoverageSample::Unmapped => 0.0,
            CoverageSample::Covered(weights) => weights
                .iter()
                .find(|(p, _)| *p == id)
                .map(|(_, w)| *w)
                .unwrap_or(0.0),
        }
    }

    pub fn total(&self) -> f64 {
        match self {
            CoverageSample::Unmapped => 0.0,
            CoverageSample::Covered(weights) => weights.iter().map(|(_, w)| w).sum(),
        }
    }

    pub fn projector_count(&self) -> usize {
        match self {
            CoverageSample::Unmapped => 0,
            CoverageSample::Covered(weights) => weights.len(),
        }
    }
}

/// Blend weight field of a set of projectors over a surface.
#[derive(Debug, Clone, Copy)]
pub struct CoverageField<'a> {
    surface: &'a SurfaceDescriptor,
    frusta: &'a [(ProjectorId, ProjectorFrustum)],
    settings: &'a BlendSettings,
}

impl<'a> CoverageField<'a> {
    pub fn new(
        surface: &'a SurfaceDescriptor,
        frusta: &'a [(ProjectorId, ProjectorFrustum)],
        settings: &'a BlendSettings,
    ) -> Self {
        Self {
            surface,
            frusta,
            settings,
        }
    }

    /// Unnormalized contribution of one projector at a surface point.
    fn falloff(&self, frustum: &ProjectorFrustum, point: DVec3) -> f64 {
        let Some(st) = frustum.project(point) else {
            return 0.0;
        };
        let edge = ProjectorFrustum::edge_distance(st);
        if edge <= 0.0 || !self.surface.is_visible_from(frustum.pose.position, point) {
            return 0.0;
        }
        self.settings.falloff(edge)
    }

    /// Normalized weights at a point on the surface.
    pub fn sample(&self, point: DVec3) -> CoverageSample {
        let raw: Vec<(ProjectorId, f64)> = self
            .frusta
            .iter()
            .map(|(id, frustum)| (*id, self.falloff(frustum, point)))
            .filter(|(_, f)| *f > 0.0)
            .collect();

        match raw.len() {
            0 => CoverageSample::Unmapped,
            1 => CoverageSample::Covered(vec![(raw[0].0, 1.0)]),
            _ => {
                let total: f64 = raw.iter().map(|(_, f)| f).sum();
                CoverageSample::Covered(raw.into_iter().map(|(id, f)| (id, f / total)).collect())
            }
        }
    }

    /// Normalized weights at a parameter-space point. Off-surface points are
    /// unmapped.
    pub fn sample_uv(&self, uv: DVec2) -> CoverageSample {
        match self.surface.point_at(uv) {
            Some(point) => self.sample(point),
            None => CoverageSample::Unmapped,
        }
    }

    /// Blend mask of one projector in its image space.
    pub fn blend_mask(&self, id: ProjectorId) -> BlendMask {
        let Some((_, frustum)) = self.frusta.iter().find(|(p, _)| *p == id) else {
            return BlendMask::zeros(0, 0);
        };
        let (width, height) = self.settings.mask_size(frustum.aspect);
        let origin = frustum.pose.position;
        BlendMask::from_image_fn(width, height, self.settings.curve, |st| {
            match self.surface.intersect_ray(origin, frustum.ray_direction(st)) {
                Some(point) => self.sample(point).weight(id),
                None => 0.0,
            }
        })
    }

    /// Mask that is 1 wherever the projector hits the surface.
    pub fn coverage_mask(
        surface: &SurfaceDescriptor,
        frustum: &ProjectorFrustum,
        settings: &BlendSettings,
    ) -> BlendMask {
        let (width, height) = settings.mask_size(frustum.aspect);
        let origin = frustum.pose.position;
        BlendMask::from_image_fn(width, height, settings.curve, |st| {
            if surface.intersect_ray(origin, frustum.ray_direction(st)).is_some() {
                1.0
            } else {
                0.0
            }
        })
    }
}

/// Work done by one cache refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub footprints: usize,
    pub pairs: usize,
    pub masks: usize,
}

/// Incremental store of footprints, pairwise overlaps and blend masks.
///
/// Entries are keyed by projector identity. A refresh recomputes only what
/// involves a projector whose frustum changed, appeared or disappeared.
/// Entries are shared behind `Arc` so cloning the cache for a background
/// job is cheap.
#[derive(Debug, Clone, Default)]
pub struct OverlapCache {
    surface: Option<SurfaceDescriptor>,
    footprint_settings: FootprintSettings,
    blend_settings: BlendSettings,
    frusta: HashMap<ProjectorId, ProjectorFrustum>,
    footprints: HashMap<ProjectorId, Arc<Footprint>>,
    overlaps: BTreeMap<PairKey, Arc<OverlapRegion>>,
    masks: HashMap<ProjectorId, Arc<BlendMask>>,
}

impl OverlapCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.surface = None;
        self.frusta.clear();
        self.footprints.clear();
        self.overlaps.clear();
        self.masks.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.frusta.is_empty()
    }

    pub fn footprint(&self, id: ProjectorId) -> Option<&Arc<Footprint>> {
        self.footprints.get(&id)
    }

    pub fn overlap(&self, a: ProjectorId, b: ProjectorId) -> Option<&Arc<OverlapRegion>> {
        self.overlaps.get(&PairKey::new(a, b))
    }

    pub fn overlaps(&self) -> impl Iterator<Item = &Arc<OverlapRegion>> {
        self.overlaps.values()
    }

    pub fn mask(&self, id: ProjectorId) -> Option<&Arc<BlendMask>> {
        self.masks.get(&id)
    }

    /// Projectors whose footprint overlaps the one of `id`.
    pub fn neighbors(&self, id: ProjectorId) -> Vec<ProjectorId> {
        self.overlaps
            .iter()
            .filter(|(key, region)| key.contains(id) && !region.is_empty())
            .filter_map(|(key, _)| key.other(id))
            .collect()
    }

    /// Bring the cache up to date with the given frusta.
    pub fn refresh(
        &mut self,
        frusta: &[(ProjectorId, ProjectorFrustum)],
        surface: &SurfaceDescriptor,
        footprint_settings: &FootprintSettings,
        blend_settings: &BlendSettings,
        parallel: bool,
    ) -> RefreshStats {
        if self.surface.as_ref() != Some(surface)
            || self.footprint_settings != *footprint_settings
            || self.blend_settings != *blend_settings
        {
            self.clear();
            self.surface = Some(*surface);
            self.footprint_settings = *footprint_settings;
            self.blend_settings = *blend_settings;
        }

        let present: BTreeSet<ProjectorId> = frusta.iter().map(|(id, _)| *id).collect();
        let mut mask_dirty: BTreeSet<ProjectorId> = BTreeSet::new();

        let removed: Vec<ProjectorId> = self
            .frusta
            .keys()
            .filter(|id| !present.contains(*id))
            .copied()
            .collect();
        let changed: Vec<(ProjectorId, ProjectorFrustum)> = frusta
            .iter()
            .filter(|(id, frustum)| self.frusta.get(id) != Some(frustum))
            .copied()
            .collect();

        for id in removed.iter().chain(changed.iter().map(|(id, _)| id)) {
            mask_dirty.extend(self.neighbors(*id));
        }
        for id in &removed {
            self.frusta.remove(id);
            self.footprints.remove(id);
            self.masks.remove(id);
            self.overlaps.retain(|key, _| !key.contains(*id));
        }

        let footprints = map_maybe_parallel(&changed, parallel, |(id, frustum)| {
            Arc::new(Footprint::compute(*id, frustum, surface, footprint_settings))
        });
        for ((id, frustum), footprint) in changed.iter().zip(footprints) {
            self.frusta.insert(*id, *frustum);
            self.footprints.insert(*id, footprint);
            mask_dirty.insert(*id);
        }

        let changed_ids: BTreeSet<ProjectorId> = changed.iter().map(|(id, _)| *id).collect();
        let mut dirty_pairs: Vec<(Arc<Footprint>, Arc<Footprint>)> = Vec::new();
        for (i, (a, _)) in frusta.iter().enumerate() {
            for (b, _) in &frusta[i + 1..] {
                if !changed_ids.contains(a) && !changed_ids.contains(b) {
                    continue;
                }
                if let (Some(fa), Some(fb)) = (self.footprints.get(a), self.footprints.get(b)) {
                    dirty_pairs.push((Arc::clone(fa), Arc::clone(fb)));
                }
            }
        }
        let regions = map_maybe_parallel(&dirty_pairs, parallel, |(a, b)| {
            Arc::new(FrustumIntersection::intersect_pair(a, b))
        });
        let pair_count = regions.len();
        for region in regions {
            self.overlaps.insert(region.pair, region);
        }

        for id in &changed_ids {
            mask_dirty.extend(self.neighbors(*id));
        }
        let mask_ids: Vec<ProjectorId> = mask_dirty
            .into_iter()
            .filter(|id| present.contains(id))
            .collect();
        let masks = map_maybe_parallel(&mask_ids, parallel, |id| {
            let local: Vec<(ProjectorId, ProjectorFrustum)> = std::iter::once(*id)
                .chain(self.neighbors(*id))
                .filter_map(|p| self.frusta.get(&p).map(|f| (p, *f)))
                .collect();
            let field = CoverageField::new(surface, &local, blend_settings);
            Arc::new(field.blend_mask(*id))
        });
        let mask_count = masks.len();
        for (id, mask) in mask_ids.into_iter().zip(masks) {
            self.masks.insert(id, mask);
        }

        let stats = RefreshStats {
            footprints: changed.len(),
            pairs: pair_count,
            masks: mask_count,
        };
        log::debug!(
            "Overlap cache refresh: {} footprints, {} pairs, {} masks recomputed",
            stats.footprints,
            stats.pairs,
            stats.masks
        );
        stats
    }
}
