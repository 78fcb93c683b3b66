//! polytrack CLI — polygon detection and identity tracking over contour frames.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use polytrack::{
    apply_predictions, detect_corners, thin_boundary, ClassifyConfig, Contour, CssConfig,
    DriftSimulator, HoldSimulator, MapConfig, PoseSimulator, ShapeLibrary, SimParams, Tracker,
    TrackerConfig,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "polytrack")]
#[command(about = "Detect and track polygon objects (e.g. tangram pieces) from 2D contour frames")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track polygon objects over a sequence of contour frames.
    Track(CliTrackArgs),

    /// Run corner detection on one frame of contours.
    Corners(CliCornersArgs),

    /// Print the embedded tangram shape library.
    LibraryInfo {
        /// Tangram tile edge length.
        #[arg(long, default_value = "70.0")]
        base_length: f64,
    },
}

#[derive(Debug, Clone, Args)]
struct CliTrackArgs {
    /// Path to the input frames (JSON: frames -> contours -> [x, y] points).
    #[arg(long)]
    frames: PathBuf,

    /// Path to write tracking results (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Shape library JSON; the embedded tangram set is used when omitted.
    #[arg(long)]
    shapes: Option<PathBuf>,

    /// Tangram tile edge length for the embedded library.
    #[arg(long, default_value = "70.0")]
    base_length: f64,

    /// Thin raw pixel boundaries before corner detection.
    #[arg(long)]
    thin: bool,

    /// Registration corner-distance tolerance (fraction of model diagonal).
    #[arg(long, default_value = "0.1")]
    tolerance: f64,

    /// Relative area tolerance for classification; negative disables it.
    #[arg(long, default_value = "0.2")]
    size_tolerance: f64,

    /// Frames an object may stay unobserved before being forgotten.
    #[arg(long, default_value = "20")]
    forget_age: u64,

    /// Drop observations with more corners than this.
    #[arg(long, default_value = "5")]
    max_corners: usize,

    /// Pose prediction backend to run after each frame.
    #[arg(long, value_enum, default_value_t = PredictArg::None)]
    predict: PredictArg,

    /// Velocity gain for the drift predictor.
    #[arg(long, default_value = "1.0")]
    prediction_gain: f64,

    #[command(flatten)]
    detector: CliDetectorArgs,
}

#[derive(Debug, Clone, Args)]
struct CliCornersArgs {
    /// Path to the input frames (JSON: frames -> contours -> [x, y] points).
    #[arg(long)]
    frames: PathBuf,

    /// Frame index to process.
    #[arg(long, default_value = "0")]
    frame: usize,

    /// Path to write detected corners (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Thin raw pixel boundaries before corner detection.
    #[arg(long)]
    thin: bool,

    #[command(flatten)]
    detector: CliDetectorArgs,
}

#[derive(Debug, Clone, Args)]
struct CliDetectorArgs {
    /// Gaussian smoothing sigma for the curvature estimate.
    #[arg(long, default_value = "3.0")]
    sigma: f64,

    /// Maximum opening angle (degrees) a corner may have.
    #[arg(long, default_value = "162.0")]
    max_angle: f64,

    /// Round-corner curvature ratio threshold.
    #[arg(long, default_value = "1.5")]
    rc_coeff: f64,

    /// Straight-line/circle-fit blend threshold (degrees).
    #[arg(long, default_value = "0.1")]
    straight_line_thresh: f64,
}

impl CliDetectorArgs {
    fn to_core(&self) -> CssConfig {
        CssConfig {
            sigma: self.sigma,
            max_angle: self.max_angle,
            rc_coeff: self.rc_coeff,
            straight_line_thresh: self.straight_line_thresh,
            ..CssConfig::default()
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PredictArg {
    None,
    Hold,
    Drift,
}

#[derive(serde::Serialize)]
struct ObjectRecord {
    id: u64,
    name: String,
    rotation: f64,
    tx: f64,
    ty: f64,
    scale: f64,
    error: f64,
    corners: Vec<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    predicted: Option<[f64; 3]>,
}

#[derive(serde::Serialize)]
struct FrameRecord {
    summary: polytrack::FrameSummary,
    objects: Vec<ObjectRecord>,
}

#[derive(serde::Serialize)]
struct TrackResult {
    schema: &'static str,
    frames: Vec<FrameRecord>,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Track(args) => run_track(&args),
        Commands::Corners(args) => run_corners(&args),
        Commands::LibraryInfo { base_length } => run_library_info(base_length),
    }
}

fn read_frames(path: &Path, thin: bool) -> CliResult<Vec<Vec<Contour>>> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| -> CliError { format!("failed to read {}: {}", path.display(), e).into() })?;
    let frames: Vec<Vec<Vec<[f64; 2]>>> = serde_json::from_str(&data)?;
    Ok(frames
        .into_iter()
        .map(|contours| {
            contours
                .into_iter()
                .map(|points| {
                    if thin {
                        thin_boundary(&points)
                    } else {
                        Contour::new(points)
                    }
                })
                .collect()
        })
        .collect())
}

// ── library-info ───────────────────────────────────────────────────────

fn run_library_info(base_length: f64) -> CliResult<()> {
    let lib = ShapeLibrary::standard_tangram(base_length, None);
    println!("polytrack embedded tangram library");
    println!("  base length: {}", lib.base_length());
    println!("  height:      {}", lib.height());
    println!("  templates:   {}", lib.templates().len());
    for shape in lib.templates() {
        println!(
            "  - {:<16} corners={} area={:.1} diagonal={:.1}",
            shape.name(),
            shape.corner_count(),
            shape.area(),
            shape.diagonal()
        );
    }
    Ok(())
}

// ── corners ────────────────────────────────────────────────────────────

fn run_corners(args: &CliCornersArgs) -> CliResult<()> {
    let frames = read_frames(&args.frames, args.thin)?;
    let contours = frames.get(args.frame).ok_or_else(|| -> CliError {
        format!("frame {} out of range ({} frames)", args.frame, frames.len()).into()
    })?;

    let config = args.detector.to_core();
    #[derive(serde::Serialize)]
    struct CornerRecord {
        point: [f64; 2],
        angle: f64,
    }
    let detected: Vec<Vec<CornerRecord>> = contours
        .iter()
        .map(|contour| {
            detect_corners(contour, &config)
                .into_iter()
                .map(|c| CornerRecord {
                    point: c.point,
                    angle: c.angle,
                })
                .collect()
        })
        .collect();

    let total: usize = detected.iter().map(Vec::len).sum();
    tracing::info!(
        "{} corners on {} contours in frame {}",
        total,
        contours.len(),
        args.frame
    );
    std::fs::write(&args.out, serde_json::to_string_pretty(&detected)?)?;
    tracing::info!("Corners written to {}", args.out.display());
    Ok(())
}

// ── track ──────────────────────────────────────────────────────────────

fn run_track(args: &CliTrackArgs) -> CliResult<()> {
    let frames = read_frames(&args.frames, args.thin)?;
    tracing::info!("Loaded {} frames from {}", frames.len(), args.frames.display());

    let library = match &args.shapes {
        Some(path) => {
            let lib = ShapeLibrary::from_json_file(path)?;
            tracing::info!(
                "Loaded {} shapes from {} (base length {})",
                lib.templates().len(),
                path.display(),
                lib.base_length()
            );
            lib
        }
        None => ShapeLibrary::standard_tangram(args.base_length, None),
    };

    let map = MapConfig {
        tolerance: args.tolerance,
        ..MapConfig::default()
    };
    let config = TrackerConfig {
        detector: args.detector.to_core(),
        classify: ClassifyConfig {
            area_tolerance: (args.size_tolerance >= 0.0).then_some(args.size_tolerance),
        },
        track_map: map.clone(),
        library_map: map,
        forget_age: args.forget_age,
        max_corners: args.max_corners,
    };
    let tracker = Tracker::new(library, config);

    let mut simulator: Option<Box<dyn PoseSimulator>> = match args.predict {
        PredictArg::None => None,
        PredictArg::Hold => Some(Box::new(HoldSimulator)),
        PredictArg::Drift => {
            let mut params = SimParams::default();
            params.set("prediction_gain", args.prediction_gain)?;
            Some(Box::new(DriftSimulator::with_params(&params)?))
        }
    };

    let mut records = Vec::with_capacity(frames.len());
    for contours in &frames {
        let summary = tracker.process_frame(contours);
        if let Some(sim) = simulator.as_deref_mut() {
            apply_predictions(&tracker, sim);
        }
        let objects = tracker
            .active_objects()
            .into_iter()
            .map(|o| ObjectRecord {
                id: o.id,
                name: o.name,
                rotation: o.pose.rotation,
                tx: o.pose.tx,
                ty: o.pose.ty,
                scale: o.scale,
                error: o.error,
                corners: o.shape.corners().to_vec(),
                predicted: o.predicted_pose.map(|p| [p.rotation, p.tx, p.ty]),
            })
            .collect();
        records.push(FrameRecord { summary, objects });
    }

    let tracked: usize = records.iter().map(|r| r.objects.len()).sum();
    tracing::info!(
        "Processed {} frames, {} active object snapshots",
        records.len(),
        tracked
    );

    let result = TrackResult {
        schema: "polytrack.result.v1",
        frames: records,
    };
    std::fs::write(&args.out, serde_json::to_string_pretty(&result)?)?;
    tracing::info!("Results written to {}", args.out.display());
    Ok(())
}
