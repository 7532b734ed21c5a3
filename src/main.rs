//! Dome Calibrator
//!
//! Headless entry point: builds a ring of projectors, recomputes the
//! calibration and exports blend masks and a plan summary.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use dome_calibrator::calibration::{Calibration, OutputType};
use dome_calibrator::config::CalibratorConfig;
use dome_calibrator::export::CalibrationExporter;
use dome_calibrator::projector::{Parameter, ProjectorSetup, SetupKind};

#[derive(Parser, Debug)]
#[command(name = "dome-calibrator", version, about = "Dome projector blending calibration")]
struct Cli {
    /// Settings file (.json or .xml). Defaults to the user config directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of projectors placed on a ring around the dome center.
    #[arg(long, default_value_t = 4)]
    projectors: u32,

    /// Horizontal field of view of every projector in degrees.
    #[arg(long, default_value_t = 100.0)]
    fov: f64,

    /// Distance of the projectors from the dome axis.
    #[arg(long, default_value_t = 2.0)]
    ring_radius: f64,

    /// Pitch of every projector in degrees.
    #[arg(long, default_value_t = 30.0)]
    pitch: f64,

    /// Output type, overrides the settings file.
    #[arg(long, value_enum)]
    output: Option<OutputChoice>,

    /// Directory to write one blend mask PNG per projector into.
    #[arg(long)]
    export_masks: Option<PathBuf>,

    /// Write 16-bit instead of 8-bit mask PNGs.
    #[arg(long = "16bit")]
    sixteen_bit: bool,

    /// Path of a JSON summary of the draw plan.
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputChoice {
    Mapped,
    Blended,
    Warp,
}

impl From<OutputChoice> for OutputType {
    fn from(choice: OutputChoice) -> Self {
        match choice {
            OutputChoice::Mapped => OutputType::MappedInput,
            OutputChoice::Blended => OutputType::BlendedComposite,
            OutputChoice::Warp => OutputType::WarpPreview,
        }
    }
}

fn ring_setup(index: u32, count: u32, cli: &Cli) -> anyhow::Result<ProjectorSetup> {
    let angle = index as f64 * 360.0 / count as f64;
    let radians = angle.to_radians();
    let mut setup = ProjectorSetup::new(SetupKind::Free);
    setup.set_parameter(Parameter::X, cli.ring_radius * radians.cos())?;
    setup.set_parameter(Parameter::Y, cli.ring_radius * radians.sin())?;
    setup.set_parameter(Parameter::Yaw, angle)?;
    setup.set_parameter(Parameter::Pitch, cli.pitch)?;
    setup.set_parameter(Parameter::Fov, cli.fov)?;
    Ok(setup)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    log::info!("Dome Calibrator starting...");

    let mut config = match &cli.config {
        Some(path) => CalibratorConfig::load(path)
            .with_context(|| format!("load settings '{}'", path.display()))?,
        None => CalibratorConfig::load_or_default(),
    };
    if let Some(output) = cli.output {
        config.output = output.into();
    }

    let mut calibration = Calibration::from_config(&config);
    let count = cli.projectors.max(1);
    for index in 0..count {
        calibration.add_projector(ring_setup(index, count, &cli)?);
    }

    calibration.update();
    if calibration.is_unmappable() {
        anyhow::bail!("settings have no usable surface, nothing to calibrate");
    }

    let plan = calibration.draw_plan();
    for tuning in calibration.tunings() {
        let neighbors: Vec<String> = calibration
            .tunings()
            .iter()
            .filter(|other| other.id() != tuning.id())
            .filter_map(|other| {
                let region = calibration.overlap(tuning.id(), other.id())?;
                (!region.is_empty()).then(|| format!("{} ({:.4})", other.id(), region.area))
            })
            .collect();
        log::info!("{} overlaps: [{}]", tuning.id(), neighbors.join(", "));
    }

    if plan.output_type() == OutputType::WarpPreview {
        for (index, tuning) in calibration.tunings().iter().enumerate() {
            let mesh = calibration.warp_mesh(index)?;
            log::info!("{} warp mesh: {} vertices", tuning.id(), mesh.len());
        }
    }

    if let Some(dir) = &cli.export_masks {
        let written = CalibrationExporter::export_all_blend_masks(&plan, dir, cli.sixteen_bit)
            .with_context(|| format!("export masks to '{}'", dir.display()))?;
        log::info!("Exported {} blend masks", written.len());
    }

    if let Some(path) = &cli.summary {
        CalibrationExporter::export_summary(&plan, path)
            .with_context(|| format!("write summary '{}'", path.display()))?;
    }

    log::info!("Dome Calibrator exiting");
    Ok(())
}
