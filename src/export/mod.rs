//! Export of blend masks and draw plan summaries.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::blending::BlendMask;
use crate::calibration::{DrawPlan, OutputType};

/// Errors from writing export files.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-projector line of a [`PlanSummary`].
#[derive(Debug, Clone, Serialize)]
pub struct EntrySummary {
    pub projector: u32,
    pub name: String,
    pub position: [f64; 3],
    pub forward: [f64; 3],
    pub fov: f64,
    pub throw_ratio: f64,
    pub mask_width: u32,
    pub mask_height: u32,
    /// Mean blend value over the mask.
    pub mask_mean: f32,
    /// Share of mask texels with a nonzero value.
    pub mask_coverage: f32,
    pub warp_identity: bool,
}

/// Human-readable digest of a draw plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub generation: u64,
    pub output_type: OutputType,
    pub unmappable: bool,
    pub entries: Vec<EntrySummary>,
}

impl PlanSummary {
    pub fn from_plan(plan: &DrawPlan) -> Self {
        let entries = plan
            .entries()
            .iter()
            .map(|entry| {
                let mask = &entry.blend_mask;
                let texels = mask.data.len().max(1) as f32;
                EntrySummary {
                    projector: entry.projector.0,
                    name: entry.name.clone(),
                    position: entry.pose.position.to_array(),
                    forward: entry.pose.forward().to_array(),
                    fov: entry.pose.fov,
                    throw_ratio: entry.pose.throw_ratio,
                    mask_width: mask.width,
                    mask_height: mask.height,
                    mask_mean: mask.mean(),
                    mask_coverage: mask.covered_texels() as f32 / texels,
                    warp_identity: entry.warp.is_identity(),
                }
            })
            .collect();
        Self {
            generation: plan.generation(),
            output_type: plan.output_type(),
            unmappable: plan.is_unmappable(),
            entries,
        }
    }
}

/// Writes calibration results to disk.
pub struct CalibrationExporter;

impl CalibrationExporter {
    /// Export blend mask as 8-bit grayscale PNG image.
    pub fn export_blend_mask(mask: &BlendMask, path: &Path) -> Result<(), ExportError> {
        let img = image::GrayImage::from_fn(mask.width, mask.height, |x, y| {
            let idx = (y * mask.width + x) as usize;
            let value = (mask.data[idx] * 255.0).round().clamp(0.0, 255.0) as u8;
            image::Luma([value])
        });
        img.save(path)?;
        Ok(())
    }

    /// Export blend mask as 16-bit grayscale PNG image for higher precision.
    pub fn export_blend_mask_16bit(mask: &BlendMask, path: &Path) -> Result<(), ExportError> {
        let img = image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_fn(
            mask.width,
            mask.height,
            |x, y| {
                let idx = (y * mask.width + x) as usize;
                let value = (mask.data[idx] * 65535.0).round().clamp(0.0, 65535.0) as u16;
                image::Luma([value])
            },
        );
        img.save(path)?;
        Ok(())
    }

    /// Export the mask of every plan entry into `output_dir`, one file per
    /// projector id. Returns the written paths in plan order.
    pub fn export_all_blend_masks(
        plan: &DrawPlan,
        output_dir: &Path,
        use_16bit: bool,
    ) -> Result<Vec<PathBuf>, ExportError> {
        std::fs::create_dir_all(output_dir)?;

        let mut written = Vec::with_capacity(plan.len());
        for entry in plan.entries() {
            if entry.blend_mask.width == 0 || entry.blend_mask.height == 0 {
                log::warn!("Skipping empty blend mask of {}", entry.projector);
                continue;
            }
            let filename = format!("blend_mask_projector_{}.png", entry.projector.0);
            let path = output_dir.join(&filename);

            if use_16bit {
                Self::export_blend_mask_16bit(&entry.blend_mask, &path)?;
            } else {
                Self::export_blend_mask(&entry.blend_mask, &path)?;
            }

            log::info!("Exported blend mask: {}", filename);
            written.push(path);
        }
        Ok(written)
    }

    /// Write a JSON digest of the plan.
    pub fn export_summary(plan: &DrawPlan, path: &Path) -> Result<(), ExportError> {
        let json = serde_json::to_string_pretty(&PlanSummary::from_plan(plan))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::Calibration;
    use crate::projector::{Parameter, ProjectorSetup, SetupKind};
    use crate::surface::SurfaceDescriptor;

    fn published_plan() -> std::sync::Arc<DrawPlan> {
        let mut calibration = Calibration::new(Some(SurfaceDescriptor::hemisphere(10.0)));
        calibration.set_parallel(false);
        for delta_yaw in [0.0, 30.0] {
            let index = calibration.len();
            calibration.add_projector(ProjectorSetup::new(SetupKind::Peripheral));
            calibration.set_parameter(index, Parameter::DeltaYaw, delta_yaw).unwrap();
        }
        calibration.update();
        calibration.draw_plan()
    }

    #[test]
    fn test_summary_lists_entries_in_order() {
        let summary = PlanSummary::from_plan(&published_plan());
        assert_eq!(summary.generation, 1);
        let ids: Vec<u32> = summary.entries.iter().map(|e| e.projector).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(summary.entries.iter().all(|e| e.mask_coverage > 0.0));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["output_type"], "BlendedComposite");
    }

    #[test]
    fn test_export_masks() {
        let plan = published_plan();
        let dir = std::env::temp_dir()
            .join(format!("dome-calibrator-export-{}", std::process::id()));
        let written = CalibrationExporter::export_all_blend_masks(&plan, &dir, true).unwrap();
        assert_eq!(written.len(), 2);

        let img = image::open(&written[0]).unwrap();
        assert_eq!(img.width(), plan.entries()[0].blend_mask.width);
        assert_eq!(img.height(), plan.entries()[0].blend_mask.height);

        let summary_path = dir.join("plan.json");
        CalibrationExporter::export_summary(&plan, &summary_path).unwrap();
        assert!(summary_path.exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
