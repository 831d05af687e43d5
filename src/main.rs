use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use holdroute::config::{DEFAULT_CONF_THRESHOLD, DEFAULT_OUTPUT_DIR, DEFAULT_PADDING};
use holdroute::pipeline::load_frame;
use holdroute::route::normalize::load_hold_json;
use holdroute::route::overlay::draw_route;
use holdroute::route::{NoAdvisor, RecordedAdvisor, RouteAdvisor};
use holdroute::{
    DatasetConfig, DatasetPipeline, Frame, HoldDetector, HoldError, HoldService, HoldVocabulary,
    ModelSlot, RouteOrigin, RoutePlanner, SidecarDetector,
};

#[derive(Parser)]
#[command(name = "holdroute")]
#[command(about = "Build hold classifier datasets and plan climbing routes from detections")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Cut padded hold crops out of image folders into a train/val/test dataset
    Crops {
        /// Load all settings from a YAML file instead of the flags below
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Folder of training images
        #[arg(long, value_name = "DIR", conflicts_with = "config")]
        train: Option<PathBuf>,

        /// Folder of validation images
        #[arg(long, value_name = "DIR", conflicts_with = "config")]
        val: Option<PathBuf>,

        /// Folder of test images
        #[arg(long, value_name = "DIR", conflicts_with = "config")]
        test: Option<PathBuf>,

        /// Extra folder of raw images added to the training split
        #[arg(long, value_name = "DIR", conflicts_with = "config")]
        raw_folder: Option<PathBuf>,

        /// Output directory for crops
        #[arg(long, default_value = DEFAULT_OUTPUT_DIR, conflicts_with = "config")]
        output: PathBuf,

        /// Detection confidence threshold
        #[arg(long, default_value_t = DEFAULT_CONF_THRESHOLD, conflicts_with = "config")]
        conf: f32,

        /// Box padding fraction (0.15 = 15%)
        #[arg(long, default_value_t = DEFAULT_PADDING, conflicts_with = "config")]
        padding: f32,

        /// Worker threads (0 = one per core)
        #[arg(long, default_value_t = 0)]
        workers: usize,

        /// Directory holding detection sidecar JSON files
        #[arg(long, value_name = "DIR")]
        sidecar_dir: Option<PathBuf>,
    },

    /// Normalize hold detections for a wall photo and propose a route
    Route {
        /// Wall photo
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        /// Hold JSON with a "holds" or "objects" list. Without it, holds come
        /// from the photo's detection sidecar.
        #[arg(value_name = "HOLDS")]
        holds_path: Option<PathBuf>,

        /// Directory holding detection sidecar JSON files
        #[arg(long, value_name = "DIR", conflicts_with = "holds_path")]
        sidecar_dir: Option<PathBuf>,

        /// Route response previously captured from the advisory service
        #[arg(long, value_name = "FILE")]
        advisory_response: Option<PathBuf>,

        /// Write the normalized hold JSON here
        #[arg(long, value_name = "FILE")]
        normalized_out: Option<PathBuf>,

        /// Write the photo with the route drawn on it here
        #[arg(long, value_name = "FILE")]
        overlay: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match args.command {
        Command::Crops {
            config,
            train,
            val,
            test,
            raw_folder,
            output,
            conf,
            padding,
            workers,
            sidecar_dir,
        } => {
            let mut dataset = match config {
                Some(path) => DatasetConfig::load(path)?,
                None => {
                    let cfg = DatasetConfig::from_args(output, train, val, test, conf, padding)
                        .with_raw_folder(raw_folder);
                    cfg.validate()?;
                    cfg
                }
            };
            if workers > 0 {
                dataset.workers = workers;
            }
            if sidecar_dir.is_some() {
                dataset.sidecar_dir = sidecar_dir;
            }
            run_crops(&dataset)
        }
        Command::Route {
            image_path,
            holds_path,
            sidecar_dir,
            advisory_response,
            normalized_out,
            overlay,
        } => {
            let frame = load_frame(&image_path)?;
            let hold_data = match holds_path {
                Some(path) => load_hold_json(&path)?,
                None => detected_holds(&frame, &image_path, sidecar_dir)?,
            };

            let advisor: Arc<dyn RouteAdvisor> = match advisory_response {
                Some(path) => Arc::new(RecordedAdvisor::new(path)),
                None => Arc::new(NoAdvisor),
            };
            let planner = RoutePlanner::new(advisor);
            let plan = planner.plan(&frame, &hold_data)?;

            if let Some(path) = normalized_out {
                let json = serde_json::to_string_pretty(&plan.holds)?;
                std::fs::write(&path, json)
                    .with_context(|| format!("writing normalized holds {}", path.display()))?;
            }

            if let Some(path) = overlay {
                draw_route(&frame.image, &plan.route)
                    .save(&path)
                    .with_context(|| format!("writing overlay {}", path.display()))?;
            }

            if plan.origin == RouteOrigin::Local {
                println!("--- LOCAL ROUTE (FALLBACK) ---");
            }
            println!("{}", serde_json::to_string_pretty(&plan.route)?);
            Ok(())
        }
    }
}

/// Hold JSON built from the detector output for `image_path`
fn detected_holds(
    frame: &Frame,
    image_path: &Path,
    sidecar_dir: Option<PathBuf>,
) -> anyhow::Result<serde_json::Value> {
    let mut detector = SidecarDetector::new();
    if let Some(dir) = sidecar_dir {
        detector = detector.with_sidecar_dir(dir);
    }

    // route planning never classifies crops, so the classifier is never loaded
    let service = HoldService::new(
        ModelSlot::ready("detector", Arc::new(detector) as Arc<dyn HoldDetector>),
        ModelSlot::new("classifier", || {
            Err(HoldError::classifier("no hold classifier configured"))
        }),
        HoldVocabulary::default(),
    );
    Ok(service.detect_holds_json(frame, image_path)?)
}

fn run_crops(config: &DatasetConfig) -> anyhow::Result<()> {
    let mut detector = SidecarDetector::new();
    if let Some(dir) = &config.sidecar_dir {
        detector = detector.with_sidecar_dir(dir);
    }

    let pipeline = DatasetPipeline::from_config(config, Arc::new(detector));
    let report = pipeline.run(&config.all_sources())?;

    println!("\n=== Crop Generation Results ===");
    for (split, summary) in &report.splits {
        println!("{}: {} crops", split, summary.total());
        for (class_name, count) in &summary.per_class {
            println!("  {}: {}", class_name, count);
        }
        let skipped = &summary.skipped;
        if skipped.unknown_class + skipped.empty_region + skipped.write_failed > 0 {
            println!(
                "  skipped crops: {} unknown class, {} empty region, {} write failures",
                skipped.unknown_class, skipped.empty_region, skipped.write_failed
            );
        }
        if skipped.unreadable_frames + skipped.detector_failures > 0 {
            println!(
                "  skipped frames: {} unreadable, {} detector failures",
                skipped.unreadable_frames, skipped.detector_failures
            );
        }
    }
    println!("Total crops generated: {}", report.total());
    println!("Output directory: {}", config.output_dir.display());

    Ok(())
}
