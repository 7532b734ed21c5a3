//! Draw plans handed to the renderer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::blending::{BlendMask, ColorCorrection};
use crate::projector::{Pose, ProjectorFrustum, ProjectorId, ScreenGeometry};
use crate::warp::WarpGrid;

/// What the outputs show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputType {
    /// Mapped input without blending.
    MappedInput,
    /// Mapped input with blend masks applied.
    #[default]
    BlendedComposite,
    /// Warp grid visualization.
    WarpPreview,
}

impl OutputType {
    pub const ALL: [OutputType; 3] = [
        OutputType::MappedInput,
        OutputType::BlendedComposite,
        OutputType::WarpPreview,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            OutputType::MappedInput => "Mapped Input",
            OutputType::BlendedComposite => "Blended Composite",
            OutputType::WarpPreview => "Warp Preview",
        }
    }

    /// True if entries carry normalized blend masks rather than plain
    /// coverage masks.
    pub fn uses_blending(&self) -> bool {
        matches!(self, OutputType::BlendedComposite)
    }
}

impl std::fmt::Display for OutputType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Everything the renderer needs to draw one projector.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawEntry {
    pub projector: ProjectorId,
    pub name: String,
    pub pose: Pose,
    pub frustum: ProjectorFrustum,
    pub screen: ScreenGeometry,
    pub blend_mask: Arc<BlendMask>,
    pub warp: Arc<WarpGrid>,
    pub color_correction: ColorCorrection,
}

/// Immutable result of one recomputation.
///
/// Entries follow the tuning order of the calibration. Plans issued before a
/// projector was added or removed are stale and must not be drawn; see
/// [`Calibration::plan_is_current`](super::Calibration::plan_is_current).
#[derive(Debug, Clone, PartialEq)]
pub struct DrawPlan {
    generation: u64,
    membership_epoch: u64,
    output_type: OutputType,
    unmappable: bool,
    entries: Vec<DrawEntry>,
}

impl DrawPlan {
    pub(crate) fn new(
        generation: u64,
        membership_epoch: u64,
        output_type: OutputType,
        unmappable: bool,
        entries: Vec<DrawEntry>,
    ) -> Self {
        Self {
            generation,
            membership_epoch,
            output_type,
            unmappable,
            entries,
        }
    }

    pub(crate) fn empty(membership_epoch: u64, output_type: OutputType) -> Self {
        Self::new(0, membership_epoch, output_type, false, Vec::new())
    }

    /// Sequence number, increases with every published plan.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn membership_epoch(&self) -> u64 {
        self.membership_epoch
    }

    pub fn output_type(&self) -> OutputType {
        self.output_type
    }

    /// True if the surface was missing or degenerate. The plan is empty then.
    pub fn is_unmappable(&self) -> bool {
        self.unmappable
    }

    pub fn entries(&self) -> &[DrawEntry] {
        &self.entries
    }

    pub fn entry(&self, projector: ProjectorId) -> Option<&DrawEntry> {
        self.entries.iter().find(|e| e.projector == projector)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn projectors(&self) -> impl Iterator<Item = ProjectorId> + '_ {
        self.entries.iter().map(|e| e.projector)
    }
}
