use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, LevelFilter};
use serde::Serialize;
use stagecal::board::ResidualSummary;
use stagecal::prelude::*;

/// Stage ↔ camera calibration tools.
#[derive(Debug, Parser)]
#[command(author, version, about = "Stage/camera coordinate calibration")]
struct Args {
    /// Log at debug level (overrides RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Remove the global rotation/skew from a board calibration.
    Normalize {
        /// Board calibration JSON.
        #[arg(long)]
        board: PathBuf,
        /// Optional JSON BoardCalibConfig. Defaults are used if omitted.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Keep the axis scales at 1 (overrides the config file).
        #[arg(long)]
        lock_scale: bool,
        /// Write the normalized record here.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Board offset at one stage position.
    Query {
        /// Board calibration JSON.
        #[arg(long)]
        board: PathBuf,
        /// Optional JSON BoardCalibConfig. Defaults are used if omitted.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Stage x (mm).
        #[arg(long, allow_negative_numbers = true)]
        x: Real,
        /// Stage y (mm).
        #[arg(long, allow_negative_numbers = true)]
        y: Real,
    },
    /// mm → pixel matrix for a pixel pitch.
    Pitch {
        /// Pixel pitch along x (mm/px).
        #[arg(long)]
        pitch_x: Real,
        /// Pixel pitch along y (mm/px).
        #[arg(long)]
        pitch_y: Real,
        /// Image width (px).
        #[arg(long)]
        width: u32,
        /// Image height (px).
        #[arg(long)]
        height: u32,
    },
}

#[derive(Debug, Serialize)]
struct NormalizeReport {
    params: AffineParams,
    lock_scale: bool,
    before: ResidualSummary,
    after: ResidualSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct QueryReport {
    point: [Real; 2],
    status: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<[Real; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    corrected: Option<[Real; 2]>,
}

#[derive(Debug, Serialize)]
struct PitchReport {
    mm_to_pixel: AffineMatrix,
    line_width_scale: Real,
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("failed to parse {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<BoardCalibConfig> {
    match path {
        Some(p) => load_json_file(p),
        None => Ok(BoardCalibConfig::default()),
    }
}

fn run_normalize(
    board_path: &Path,
    config_path: Option<&Path>,
    lock_scale: bool,
    output: Option<&Path>,
) -> Result<String> {
    let config = load_config(config_path)?;
    let lock_scale = lock_scale || config.lock_scale;

    let mut model = BoardCalibModel::load(board_path)
        .with_context(|| format!("failed to load board {}", board_path.display()))?;
    let before = model.residual_summary();
    let params = model
        .angle_normalization(lock_scale)
        .context("angle normalization failed")?;
    let after = model.residual_summary();
    info!(
        "normalized {}: rms {:.6} → {:.6} mm",
        board_path.display(),
        before.rms,
        after.rms
    );

    if let Some(out) = output {
        model
            .save_json(out)
            .with_context(|| format!("failed to write {}", out.display()))?;
    }

    let report = NormalizeReport {
        params,
        lock_scale,
        before,
        after,
        output: output.map(Path::to_path_buf),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

fn run_query(board_path: &Path, config_path: Option<&Path>, x: Real, y: Real) -> Result<String> {
    let config = load_config(config_path)?;
    let model = BoardCalibModel::load_with_config(board_path, &config)
        .with_context(|| format!("failed to load board {}", board_path.display()))?;

    let point = Pt2::new(x, y);
    let result = model.mach_to_board_coord(&point);
    let report = QueryReport {
        point: [x, y],
        status: StatusCode::of(&result).code(),
        offset: result.as_ref().ok().map(|o| [o.x, o.y]),
        corrected: result.as_ref().ok().map(|o| [x + o.x, y + o.y]),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

fn run_pitch(pitch_x: Real, pitch_y: Real, width: u32, height: u32) -> Result<String> {
    let mut chain = CoordinateTransformChain::new();
    chain
        .set_pixel_pitch(Vec2::new(pitch_x, pitch_y), width, height)
        .context("pixel pitch calibration failed")?;
    let report = PitchReport {
        mm_to_pixel: *chain.matrix(),
        line_width_scale: chain.line_width_scale(),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let json = match &args.command {
        Command::Normalize {
            board,
            config,
            lock_scale,
            output,
        } => run_normalize(board, config.as_deref(), *lock_scale, output.as_deref())?,
        Command::Query {
            board,
            config,
            x,
            y,
        } => run_query(board, config.as_deref(), *x, *y)?,
        Command::Pitch {
            pitch_x,
            pitch_y,
            width,
            height,
        } => run_pitch(*pitch_x, *pitch_y, *width, *height)?,
    };
    println!("{json}");
    Ok(())
}
