//! Calibrator settings and their on-disk form.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blending::{BlendSettings, FootprintSettings};
use crate::calibration::OutputType;
use crate::surface::SurfaceDescriptor;
use crate::warp::WarpInterpolation;

/// Errors from loading or saving settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("XML read error: {0}")]
    XmlRead(#[from] quick_xml::DeError),
    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::SeError),
    #[error("No config directory available")]
    NoConfigDir,
}

/// Warp grid defaults for new projectors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpSettings {
    pub rows: usize,
    pub cols: usize,
    pub interpolation: WarpInterpolation,
    /// Quads per side when a renderer asks for a warp mesh.
    pub mesh_subdivisions: u32,
}

impl Default for WarpSettings {
    fn default() -> Self {
        Self {
            rows: 4,
            cols: 4,
            interpolation: WarpInterpolation::Linear,
            mesh_subdivisions: 8,
        }
    }
}

/// Settings of a calibration session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibratorConfig {
    /// Target surface. Sessions without one are unmappable.
    pub surface: Option<SurfaceDescriptor>,
    pub output: OutputType,
    pub footprint: FootprintSettings,
    pub blend: BlendSettings,
    pub warp: WarpSettings,
    /// Compute overlaps and masks on the rayon pool.
    pub parallel: bool,
}

impl Default for CalibratorConfig {
    fn default() -> Self {
        Self {
            surface: Some(SurfaceDescriptor::default()),
            output: OutputType::default(),
            footprint: FootprintSettings::default(),
            blend: BlendSettings::default(),
            warp: WarpSettings::default(),
            parallel: true,
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

impl CalibratorConfig {
    /// Default settings file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("DomeCalibrator");
            p.push("settings.json");
            p
        })
    }

    /// Parse settings. `.json` files are JSON, anything else is XML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = if is_json(path) {
            serde_json::from_str(&contents)?
        } else {
            quick_xml::de::from_str(&contents)?
        };
        log::info!("Loaded settings from {}", path.display());
        Ok(config)
    }

    /// Load from the default location, falling back to defaults if the file
    /// is missing or unreadable.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring settings at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Write settings, format chosen by extension like [`load`](Self::load).
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            let xml = quick_xml::se::to_string(self)?;
            format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml)
        };
        fs::write(path, contents)?;
        Ok(())
    }

    /// Save to [`default_path`](Self::default_path).
    pub fn save_default(&self) -> Result<(), ConfigError> {
        let path = Self::default_path().ok_or(ConfigError::NoConfigDir)?;
        self.save(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blending::BlendCurve;

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "parallel": false, "blend": { "curve": "Cosine" } }"#;
        let config: CalibratorConfig = serde_json::from_str(json).unwrap();
        assert!(!config.parallel);
        assert_eq!(config.blend.curve, BlendCurve::Cosine);
        assert_eq!(config.blend.mask_width, BlendSettings::default().mask_width);
        assert_eq!(config.surface, Some(SurfaceDescriptor::default()));
        assert_eq!(config.warp, WarpSettings::default());
    }

    #[test]
    fn test_surface_json_form() {
        let json = r#"{
            "surface": {
                "type": "Dome",
                "center": { "x": 0.0, "y": 0.0, "z": 1.0 },
                "radius": 7.5,
                "aperture": 200.0
            }
        }"#;
        let config: CalibratorConfig = serde_json::from_str(json).unwrap();
        let surface = config.surface.unwrap();
        assert_eq!(surface.radius(), 7.5);
        assert_eq!(surface.center(), glam::DVec3::new(0.0, 0.0, 1.0));

        let none: CalibratorConfig = serde_json::from_str(r#"{ "surface": null }"#).unwrap();
        assert!(none.surface.is_none());
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = std::env::temp_dir()
            .join(format!("dome-calibrator-config-{}", std::process::id()));
        let path = dir.join("settings.json");
        let mut config = CalibratorConfig::default();
        config.output = OutputType::WarpPreview;
        config.warp.rows = 6;
        config.save(&path).unwrap();

        let loaded = CalibratorConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_xml_file_roundtrip() {
        let dir = std::env::temp_dir()
            .join(format!("dome-calibrator-xml-{}", std::process::id()));
        let path = dir.join("settings.xml");
        let mut config = CalibratorConfig::default();
        config.surface = Some(SurfaceDescriptor::Dome {
            center: glam::DVec3::new(0.5, -0.25, 1.0),
            radius: 7.5,
            aperture: 210.0,
        });
        config.output = OutputType::MappedInput;
        config.blend.curve = BlendCurve::Cosine;
        config.warp.cols = 5;
        config.parallel = false;
        config.save(&path).unwrap();

        let loaded = CalibratorConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = CalibratorConfig::load(Path::new("/nonexistent/settings.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
