// main.rs - Generate a multi-level maze, precompute visibility, print a JSON report.

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use maze_engine::report::MazeReport;
use maze_engine::visibility::{compute_visibility, spawn_visibility};
use maze_engine::{MazeConfig, MazeGenerator, Registry};

/// CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to maze configuration JSON
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Columns (overrides config)
    #[arg(short = 'x', long)]
    pub columns: Option<i32>,

    /// Rows (overrides config)
    #[arg(short = 'y', long)]
    pub rows: Option<i32>,

    /// Levels (overrides config)
    #[arg(short = 'z', long)]
    pub levels: Option<i32>,

    /// Fixed RNG seed (overrides config)
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Report path; use "-" for stdout
    #[arg(short, long, default_value = "-")]
    pub output: PathBuf,

    /// Run the visibility pass on the blocking pool while the structural report is built
    #[arg(long)]
    pub background: bool,

    /// Skip the visibility pass
    #[arg(long)]
    pub no_visibility: bool,
}

/// Load config JSON (path or defaults) and apply CLI overrides.
async fn load_config(args: &Args) -> Result<MazeConfig> {
    let mut config = if let Some(path) = &args.config {
        let s = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str::<MazeConfig>(&s)
            .with_context(|| format!("Failed to parse maze config from {}", path.display()))?
    } else {
        MazeConfig::default()
    };

    if let Some(columns) = args.columns {
        config.columns = columns;
    }
    if let Some(rows) = args.rows {
        config.rows = rows;
    }
    if let Some(levels) = args.levels {
        config.levels = levels;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.validate().context("Invalid maze configuration")?;
    Ok(config)
}

async fn write_report(report: &MazeReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    if path == Path::new("-") {
        use std::io::Write;
        let mut stdout = std::io::stdout();
        stdout
            .write_all(json.as_bytes())
            .and_then(|_| stdout.write_all(b"\n"))
            .context("Failed writing report to stdout")?;
    } else {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed writing report {}", path.display()))?;
        info!("Saved report to {}", path.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    info!("Starting with {args:?}");

    let config = load_config(&args).await?;
    let settings = config.visibility;

    let start = Instant::now();
    let maze = MazeGenerator::from_config(config)?.generate()?;
    let generation_ms = start.elapsed().as_millis() as u64;
    if !maze.is_connected() {
        warn!(
            "Maze has {} separate regions",
            maze.connected_components(None)
        );
    }

    let registries = Registry::populate_all(&maze, |_, _| false)?;

    let report = if args.no_visibility {
        MazeReport::build(&maze, &registries, None, generation_ms)
    } else if args.background {
        let pending = spawn_visibility(maze.clone(), registries.clone(), settings);
        info!("Visibility pass running in background");
        let mut report = MazeReport::build(&maze, &registries, None, generation_ms);
        if !pending.is_complete() {
            info!("Structural report ready, waiting for visibility pass");
        }
        let outcome = pending.wait().await?;
        report.attach_visibility(&outcome.maze, outcome.report);
        report
    } else {
        let mut maze = maze;
        let pass = compute_visibility(&mut maze, &registries, &settings)?;
        MazeReport::build(&maze, &registries, Some(pass), generation_ms)
    };

    write_report(&report, &args.output).await
}
