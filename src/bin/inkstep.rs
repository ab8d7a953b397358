use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use inkstep::{
    CanvasSize, CpuSurface, ExportOpts, FfmpegSink, ReplayOpts, StrokeLog, ValidationPolicy,
    coverage_fraction, encode_png, export_video, render_final_frame,
};

#[derive(Parser, Debug)]
#[command(name = "inkstep", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a stroke log to its final frame and write it as a PNG.
    Frame(FrameArgs),
    /// Replay a stroke log into an MP4 (requires `ffmpeg` on PATH).
    Export(ExportArgs),
    /// Print the ink coverage of a stroke log's final frame.
    Coverage(CoverageArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input stroke-log JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Square output size in pixels.
    #[arg(long, default_value_t = 600)]
    size: u32,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Input stroke-log JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Square output size in pixels (must be even for yuv420p).
    #[arg(long, default_value_t = 600)]
    size: u32,

    /// Capture frame rate.
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Display label embedded in the artifact (e.g. `{prompt}-{id}`).
    #[arg(long, default_value = "drawing")]
    label: String,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Overwrite output if it already exists.
    #[arg(long, default_value_t = true)]
    overwrite: bool,
}

#[derive(Parser, Debug)]
struct CoverageArgs {
    /// Input stroke-log JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Square canvas size in pixels.
    #[arg(long, default_value_t = 600)]
    size: u32,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Export(args) => cmd_export(args),
        Command::Coverage(args) => cmd_coverage(args),
    }
}

fn load_final_frame(in_path: &PathBuf, size: u32) -> anyhow::Result<CpuSurface> {
    let log = StrokeLog::from_path(in_path)?;
    let mut surface = CpuSurface::new(CanvasSize::square(size)?)?;
    if !render_final_frame(&log, &mut surface, ReplayOpts::default())? {
        anyhow::bail!("'{}' holds an empty stroke log", in_path.display());
    }
    Ok(surface)
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let surface = load_final_frame(&args.in_path, args.size)?;
    let png = encode_png(&surface)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, png)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let log = StrokeLog::from_path(&args.in_path)?;
    let mut surface = CpuSurface::new(CanvasSize::square(args.size)?)?;
    let mut sink = FfmpegSink::new(&args.out, &args.label, args.overwrite);
    let opts = ExportOpts {
        fps: args.fps,
        replay: ReplayOpts::default(),
    };

    let artifact = export_video(&log, &mut surface, &mut sink, &opts)?;
    eprintln!("wrote {} ({})", artifact.path.display(), artifact.label);
    Ok(())
}

fn cmd_coverage(args: CoverageArgs) -> anyhow::Result<()> {
    let surface = load_final_frame(&args.in_path, args.size)?;
    let policy = ValidationPolicy::default();
    let coverage = coverage_fraction(&surface, policy.background, policy.tolerance);
    let verdict = if coverage >= policy.min_coverage {
        "ok"
    } else {
        "blank"
    };
    println!("{coverage:.6} {verdict}");
    Ok(())
}
