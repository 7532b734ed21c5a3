//! Calibration sessions: ordered projector tunings, recomputation and the
//! draw plans handed to renderers.

mod plan;
mod session;

pub use plan::{DrawEntry, DrawPlan, OutputType};
pub use session::{
    Calibration, DirtyReason, SessionError, SessionState, UpdateJob, UpdateResult,
};
