use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "scenecast", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a scene and print its render plan as JSON.
    Plan(PlanArgs),
    /// Render scenes to MP4 (requires `ffmpeg` and `ffprobe` on PATH).
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct PlanArgs {
    /// Input scene JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Base directory for relative sources (defaults to the scene's directory).
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Optional service config JSON.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input scene JSON files; each becomes one job named after the file stem (suffixed when
    /// two files share a stem).
    #[arg(long = "in", required = true, num_args = 1..)]
    in_paths: Vec<PathBuf>,

    /// Directory for rendered files.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Webhook notified once per job.
    #[arg(long)]
    webhook: Option<String>,

    /// Optional service config JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Concurrent jobs.
    #[arg(long)]
    workers: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Plan(args) => cmd_plan(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<scenecast::ServiceConfig> {
    let mut cfg = match path {
        Some(p) => scenecast::ServiceConfig::from_path(p)?,
        None => scenecast::ServiceConfig::default(),
    };
    cfg.apply_env()?;
    Ok(cfg)
}

fn read_scene_json(path: &Path) -> anyhow::Result<serde_json::Value> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("open scene '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse scene JSON '{}'", path.display()))
}

fn cmd_plan(args: PlanArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    scenecast::logging::init_logging(&cfg.logging);

    let scene_json = read_scene_json(&args.in_path)?;
    let root = args
        .assets
        .clone()
        .or_else(|| args.in_path.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    let fetcher = scenecast::DefaultFetcher::new(
        scenecast::LocalFetcher::with_root(root),
        scenecast::CurlFetcher::new(&cfg.work_dir).with_timeout_secs(cfg.fetch_timeout_secs),
    );
    let probe = scenecast::FfprobeProbe::default();
    let measurer = scenecast::ParleyMeasurer;

    let mut diagnostics = scenecast::Diagnostics::new();
    let scene = scenecast::parse_scene(&scene_json, &mut diagnostics)?;
    let plan = scenecast::Compiler::new(&fetcher, &probe, &measurer).compile(
        &scene,
        &mut diagnostics,
        &scenecast::CancelToken::new(),
    )?;

    let out = serde_json::json!({
        "plan": plan,
        "diagnostics": diagnostics.items(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut cfg = load_config(args.config.as_deref())?;
    if let Some(dir) = args.out_dir {
        cfg.output_dir = dir;
    }
    if let Some(n) = args.workers {
        cfg.workers = n;
    }
    scenecast::logging::init_logging(&cfg.logging);

    if !scenecast::is_ffmpeg_available(&cfg.ffmpeg.program) {
        anyhow::bail!(
            "'{}' is not runnable; install ffmpeg or set SCENECAST_FFMPEG",
            cfg.ffmpeg.program.display()
        );
    }

    let requests =
        scenecast::JobRequest::from_scene_files(&args.in_paths, args.webhook.as_deref())?;

    let runner = scenecast::JobRunner::from_config(&cfg)?;
    let pool = scenecast::WorkerPool::new(cfg.workers, runner)?;

    let mut failed = 0usize;
    for report in pool.run_all(requests) {
        let report = report?;
        if !report.is_success() {
            failed += 1;
        }
        println!("{}", serde_json::to_string(&report)?);
    }
    if failed > 0 {
        anyhow::bail!("{failed} job(s) failed");
    }
    Ok(())
}
