//! Cutline - headless preview runner
//!
//! Plays a timeline file through the preview engine against simulated media
//! elements, inspects single frames, and exports render submissions.

mod run;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use cutline_compositor::{LayerStyle, PreviewConfig, Viewport};
use cutline_core::Frame;
use cutline_timeline::{upcoming_assets, RenderSubmission, TimelineFile};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cutline", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a timeline in real time and report what the preview did.
    Play(PlayArgs),
    /// Print the active clips and their styles at one frame.
    Inspect(InspectArgs),
    /// Write the render submission for a timeline as JSON.
    Export(ExportArgs),
}

#[derive(Parser, Debug)]
struct PlayArgs {
    /// Timeline file.
    #[arg(long)]
    timeline: PathBuf,

    /// Preview configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Wall-clock seconds to play for.
    #[arg(long, default_value_t = 5.0)]
    seconds: f64,

    /// Playback rate.
    #[arg(long, default_value_t = 1.0)]
    rate: f64,

    /// Frame to start from.
    #[arg(long, default_value_t = 0)]
    start: Frame,

    /// Host display refresh rate in Hz.
    #[arg(long, default_value_t = 60.0)]
    refresh_hz: f64,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Timeline file.
    #[arg(long)]
    timeline: PathBuf,

    /// Frame to inspect.
    #[arg(long)]
    frame: Frame,

    /// Preload horizon in frames.
    #[arg(long, default_value_t = 60)]
    horizon: Frame,

    #[arg(long, default_value_t = 1920)]
    width: u32,

    #[arg(long, default_value_t = 1080)]
    height: u32,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Timeline file.
    #[arg(long)]
    timeline: PathBuf,

    /// Output path; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Play(args) => cmd_play(args),
        Command::Inspect(args) => cmd_inspect(args),
        Command::Export(args) => cmd_export(args),
    }
}

fn load_timeline(path: &Path) -> Result<TimelineFile> {
    TimelineFile::load_from_file(path)
        .with_context(|| format!("load timeline '{}'", path.display()))
}

fn cmd_play(args: PlayArgs) -> Result<()> {
    anyhow::ensure!(args.seconds > 0.0, "--seconds must be positive");
    anyhow::ensure!(args.refresh_hz > 0.0, "--refresh-hz must be positive");

    let file = load_timeline(&args.timeline)?;
    let config = match &args.config {
        Some(path) => PreviewConfig::load(path)
            .with_context(|| format!("load config '{}'", path.display()))?,
        None => PreviewConfig::default(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;
    let stats = runtime.block_on(run::play(file, config, &args))?;

    info!(
        frames = stats.frames_advanced,
        evaluations = stats.evaluations,
        superseded = stats.superseded,
        "Playback finished"
    );
    println!("{stats}");
    Ok(())
}

fn cmd_inspect(args: InspectArgs) -> Result<()> {
    let file = load_timeline(&args.timeline)?;
    let (snapshot, _) = file.timeline.into_parts();
    let viewport = Viewport::new(args.width, args.height);

    let active = snapshot.active_at(args.frame);
    println!(
        "frame {} ({:.3}s) of {}: {} active clip(s)",
        args.frame,
        snapshot.fps.frames_to_seconds(args.frame),
        snapshot.duration,
        active.len()
    );
    for (z, item) in active.iter().enumerate() {
        let style = LayerStyle::project(
            &item.clip.visual_state_at(args.frame),
            viewport,
            z as i32,
            item.clip.is_animating_at(args.frame),
        );
        println!(
            "  [{z}] {} on '{}' asset={} local={} opacity={:.3} {}{}",
            item.clip.id,
            item.track.name,
            item.clip.asset_id,
            item.local_frame,
            style.opacity,
            style.css_transform(),
            if style.will_change { " (animating)" } else { "" }
        );
    }
    for violation in &active.violations {
        println!("  excluded: {violation}");
    }

    let upcoming = upcoming_assets(&snapshot, args.frame, args.horizon);
    if !upcoming.is_empty() {
        let names: Vec<&str> = upcoming.iter().map(|id| id.as_str()).collect();
        println!("upcoming within {} frames: {}", args.horizon, names.join(", "));
    }
    Ok(())
}

fn cmd_export(args: ExportArgs) -> Result<()> {
    let file = load_timeline(&args.timeline)?;
    let (snapshot, assets) = file.timeline.into_parts();
    let submission =
        RenderSubmission::from_snapshot(&snapshot, &assets).context("build render submission")?;
    let json = submission.to_json()?;

    match &args.out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create output dir '{}'", parent.display()))?;
            }
            std::fs::write(path, json)
                .with_context(|| format!("write submission '{}'", path.display()))?;
            eprintln!("wrote {} clip(s) to {}", submission.clips.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
