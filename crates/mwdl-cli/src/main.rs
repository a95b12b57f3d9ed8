use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use mwdl_pm::http::HttpClient;
use mwdl_pm::orchestrator::DEFAULT_CONCURRENCY;
use mwdl_pm::workspace::{create_temp_workspace, prepare_target_dir, remove_temp_workspace};
use mwdl_pm::{ConfigLoader, Orchestrator, ResolverEndpoints, RunOptions, RunState};

const LOG_LEVEL_ENV: &str = "LOG_LEVEL";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Parser, Debug)]
#[command(name = "mwdl")]
#[command(about = "Download MediaWiki extensions and skins")]
#[command(version)]
struct Args {
    /// Path to the download configuration
    #[arg(long, default_value = "./config.json")]
    config: PathBuf,

    /// Folder receiving the extensions/ and skins/ trees
    #[arg(long, default_value = "./downloaded")]
    target: PathBuf,

    /// Remove existing extensions/ and skins/ folders under the target
    #[arg(long)]
    force_rm_target: bool,

    /// Attempts per extension or skin
    #[arg(long, default_value_t = 3)]
    retry_count: u32,

    /// Seconds to wait between attempts
    #[arg(long, default_value_t = 2)]
    retry_delay: u64,

    /// Maximum downloads in flight (0 = all at once)
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Parent folder of the temporary workspace
    #[arg(long)]
    temp_dir: Option<PathBuf>,
}

/// Translate `LOG_LEVEL` into an env_logger filter
fn log_filter(level: Option<&str>) -> String {
    let Some(level) = level.map(str::trim).filter(|l| !l.is_empty()) else {
        return DEFAULT_LOG_LEVEL.to_string();
    };

    match level.to_lowercase().as_str() {
        "fatal" => "error".to_string(),
        "disable" => "off".to_string(),
        _ => level.to_string(),
    }
}

fn init_logging() {
    let level = std::env::var(LOG_LEVEL_ENV).ok();
    env_logger::Builder::new()
        .parse_filters(&log_filter(level.as_deref()))
        .init();
}

/// Download everything the configuration lists.
/// Returns whether any target failed.
async fn run(args: Args) -> Result<bool> {
    log::info!("Starting downloader...");

    let loader = ConfigLoader::new(true);
    let config = loader.load_config_file(&args.config)?;
    let default_ref = loader.default_ref(&config);
    log::info!("Using \"{}\" as default ref", default_ref);

    let targets = config.targets()?;

    let target_dir = prepare_target_dir(&args.target, args.force_rm_target)?;
    let workspace = create_temp_workspace(args.temp_dir.as_deref())
        .context("Failed to create temporary folder")?;

    let state = Arc::new(RunState::new(target_dir, workspace.path(), default_ref));
    let http = HttpClient::new().context("Failed to create HTTP client")?;
    let options = RunOptions::new()
        .with_attempts(args.retry_count)
        .with_retry_delay(Duration::from_secs(args.retry_delay))
        .with_concurrency(args.concurrency);

    let orchestrator = Orchestrator::new(http, ResolverEndpoints::default(), options);
    let summary = orchestrator.run(targets, Arc::clone(&state)).await;

    remove_temp_workspace(workspace);

    log::info!(
        "Installed {} of {} targets",
        summary.installed.len(),
        summary.total()
    );

    Ok(state.has_failed())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging();

    let result = tokio::runtime::Runtime::new()
        .map_err(|e| anyhow::anyhow!("Failed to create async runtime: {}", e))
        .and_then(|rt| rt.block_on(run(args)));

    match result {
        Ok(failed) => {
            if failed {
                log::error!("Error has occurred during download. Please check the logs.");
            }
            log::info!("Download finished.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            for cause in e.chain().skip(1) {
                eprintln!("  Caused by: {}", cause);
            }
            ExitCode::FAILURE
        }
    }
}
