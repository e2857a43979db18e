//! `subx` - extract subtitles from containers, OCR image tracks and clean
//! up the text.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use directories::ProjectDirs;
use tokio_util::sync::CancellationToken;

use subx_core::config::{ConfigManager, Settings};
use subx_core::correction::{correct_file, CorrectionEngine};
use subx_core::dispatch::DispatchOutcome;
use subx_core::extraction::{check_tools, MkvmergeProber, OcrProgress, TrackProber};
use subx_core::jobs::{self, BatchQueue};
use subx_core::logging::{init_tracing, init_tracing_with_file, LogLevel};
use subx_core::models::CorrectionLevel;
use subx_core::orchestrator::{BatchCoordinator, BatchSummary, SingleFileExtractor, ToolSet};

#[derive(Parser, Debug)]
#[command(name = "subx", version, about = "Subtitle extraction with OCR and text correction")]
struct Cli {
    /// Path to the config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the subtitle tracks of a container
    Probe {
        file: PathBuf,
        /// Print JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Extract the best subtitle track of one file
    Extract {
        file: PathBuf,
        #[command(flatten)]
        options: ExtractOptions,
    },
    /// Extract subtitles from many files in order
    Batch {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Queue index to start from
        #[arg(long, default_value_t = 0)]
        from: usize,
        #[command(flatten)]
        options: ExtractOptions,
    },
    /// Run OCR text correction on an existing subtitle file
    Correct {
        file: PathBuf,
        #[arg(long, value_parser = parse_level)]
        level: Option<CorrectionLevel>,
        /// Keep a .bak copy of the original
        #[arg(long, default_value_t = false)]
        backup: bool,
    },
    /// Check that the external tools can be found
    Tools,
    /// Config file operations
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the config file location
    Path,
    /// Print the effective config
    Show,
    /// Write a config file with defaults if none exists
    Init,
}

#[derive(Args, Debug, Clone)]
struct ExtractOptions {
    /// Preferred subtitle language
    #[arg(long)]
    lang: Option<String>,
    /// Prefer forced tracks
    #[arg(long, default_value_t = false)]
    forced: bool,
    /// Prefer closed-caption tracks
    #[arg(long, default_value_t = false)]
    cc: bool,
    #[arg(long, value_parser = parse_level)]
    level: Option<CorrectionLevel>,
    /// Where to write subtitles (default: next to each source)
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

impl ExtractOptions {
    fn apply(&self, settings: &mut Settings) {
        if let Some(lang) = &self.lang {
            settings.extraction.preferred_language = lang.clone();
        }
        settings.extraction.prefer_forced |= self.forced;
        settings.extraction.prefer_closed_caption |= self.cc;
        if let Some(level) = self.level {
            settings.correction.level = level;
        }
        if let Some(dir) = &self.output_dir {
            settings.paths.output_folder = dir.to_string_lossy().into_owned();
        }
    }
}

fn parse_level(value: &str) -> Result<CorrectionLevel, String> {
    CorrectionLevel::parse(value).ok_or_else(|| format!("unknown level '{}' (off, standard, thorough)", value))
}

fn default_config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "subx").context("cannot determine a config directory")?;
    Ok(dirs.config_dir().join("settings.toml"))
}

fn load_config(cli: &Cli) -> Result<ConfigManager> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let mut manager = ConfigManager::new(path);
    manager
        .load_or_create()
        .with_context(|| format!("loading {}", manager.path().display()))?;
    Ok(manager)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = LogLevel::from_verbosity(cli.verbose);

    if let Commands::Config(command) = &cli.command {
        init_tracing(level);
        return run_config(&cli, command);
    }

    let manager = load_config(&cli)?;
    manager.ensure_dirs_exist()?;
    let _guard = match init_tracing_with_file(level, &manager.logs_folder()) {
        Ok(guard) => Some(guard),
        Err(e) => {
            init_tracing(level);
            tracing::warn!("File logging disabled: {}", e);
            None
        }
    };

    match &cli.command {
        Commands::Probe { file, json } => probe(manager.settings(), file, *json).await,
        Commands::Extract { file, options } => {
            let mut settings = manager.settings().clone();
            options.apply(&mut settings);
            extract(&settings, file).await
        }
        Commands::Batch {
            files,
            from,
            options,
        } => {
            let mut settings = manager.settings().clone();
            options.apply(&mut settings);
            batch(&settings, &manager.logs_folder(), files, *from).await
        }
        Commands::Correct { file, level, backup } => {
            let settings = manager.settings();
            let mut engine = CorrectionEngine::from_settings(&settings.correction);
            if let Some(level) = level {
                engine = CorrectionEngine::new(*level).with_max_passes(engine.max_passes());
            }
            correct(file, engine, *backup || settings.correction.create_backup).await
        }
        Commands::Tools => tools(manager.settings()),
        Commands::Config(_) => Ok(()),
    }
}

fn run_config(cli: &Cli, command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Path => {
            let path = match &cli.config {
                Some(path) => path.clone(),
                None => default_config_path()?,
            };
            println!("{}", path.display());
        }
        ConfigCommands::Show => {
            let manager = load_config(cli)?;
            print!("{}", manager.render()?);
        }
        ConfigCommands::Init => {
            let manager = load_config(cli)?;
            println!("Config at {}", manager.path().display());
        }
    }
    Ok(())
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(cancel: impl Fn() + Send + 'static) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling after the current step...");
            cancel();
        }
    });
}

async fn probe(settings: &Settings, file: &Path, json: bool) -> Result<()> {
    let prober = MkvmergeProber::from_settings(&settings.tools);
    let tracks = prober
        .probe(file, &CancellationToken::new())
        .await
        .with_context(|| format!("probing {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tracks)?);
        return Ok(());
    }

    if tracks.is_empty() {
        println!("{}: no subtitle tracks", file.display());
        return Ok(());
    }
    println!("{:>4}  {:<8} {:<5} {:<14} name", "id", "codec", "lang", "kind");
    for track in &tracks {
        println!(
            "{:>4}  {:<8} {:<5} {:<14} {}",
            track.id(),
            track.codec().name(),
            track.language(),
            track.kind().as_str(),
            track.name().unwrap_or("")
        );
    }
    Ok(())
}

async fn extract(settings: &Settings, file: &Path) -> Result<()> {
    let token = CancellationToken::new();
    let child = token.clone();
    cancel_on_ctrl_c(move || child.cancel());

    let mut extractor = SingleFileExtractor::new(settings, ToolSet::from_settings(settings)).with_progress(
        Arc::new(|progress: &OcrProgress| {
            eprint!("\r  OCR {:>3}% ({}/{})", progress.percent(), progress.processed, progress.total);
        }),
    );

    let result = extractor.extract(file, &token).await?;
    eprintln!();
    match &result.outcome {
        DispatchOutcome::Extracted {
            output_path,
            method,
            rules_triggered,
            ..
        } => println!(
            "Track {} ({}) -> {} [{}; {} correction(s)]",
            result.selected.id(),
            result.selected.codec(),
            output_path.display(),
            method.as_str(),
            rules_triggered
        ),
        DispatchOutcome::ManualToolRequired { guidance, .. } => bail!("{}", guidance),
    }
    Ok(())
}

async fn batch(settings: &Settings, logs: &Path, files: &[PathBuf], from: usize) -> Result<()> {
    let mut queue = BatchQueue::in_memory();
    for file in files {
        queue
            .add_path(file, &settings.network)
            .with_context(|| format!("adding {}", file.display()))?;
    }
    let queue = jobs::shared(queue);

    let mut coordinator =
        BatchCoordinator::new(settings.clone(), queue, ToolSet::from_settings(settings))
            .with_log_dir(logs)
            .with_progress_callback(Box::new(|name: &str, percent: u32, message: &str| {
                eprintln!("[{:>3}%] {} {}", percent, name, message);
            }));

    let handle = coordinator.cancel_handle();
    cancel_on_ctrl_c(move || handle.cancel());

    let summary = coordinator.process_batch(from).await?;
    print_summary(&summary);

    if let Some(next) = summary.resume_from {
        println!("Cancelled. Resume with: --from {}", next);
    }
    if summary.stats.errors > 0 {
        bail!("{} of {} file(s) failed", summary.stats.errors, summary.stats.total);
    }
    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    for file in &summary.files {
        let detail = match (&file.output_path, &file.message) {
            (Some(path), _) => path.display().to_string(),
            (None, Some(message)) => message.clone(),
            (None, None) => String::new(),
        };
        println!("{:>3}  {:<10} {}  {}", file.index, file.status.as_str(), file.display_name, detail);
    }
    let stats = &summary.stats;
    println!(
        "{}: {} completed, {} errors, {} cancelled ({} network) in {:.1}s",
        summary.state,
        stats.completed,
        stats.errors,
        stats.cancelled,
        stats.network_files,
        stats.elapsed.as_secs_f64()
    );
}

async fn correct(file: &Path, engine: CorrectionEngine, backup: bool) -> Result<()> {
    let path = file.to_path_buf();
    let report = tokio::task::spawn_blocking(move || correct_file(&path, &engine, backup))
        .await
        .context("correction task")??;

    if report.changed {
        println!(
            "{}: {} correction(s) in {} pass(es)",
            file.display(),
            report.rules_triggered,
            report.passes_run
        );
        if let Some(backup) = report.backup_path {
            println!("Backup: {}", backup.display());
        }
    } else {
        println!("{}: no changes", file.display());
    }
    Ok(())
}

fn tools(settings: &Settings) -> Result<()> {
    let statuses = check_tools(&settings.tools);
    for status in &statuses {
        match &status.resolved {
            Some(path) => println!("{:<10} {:<12} {}", status.role, status.program, path.display()),
            None => println!("{:<10} {:<12} NOT FOUND", status.role, status.program),
        }
    }
    if statuses.iter().any(|s| !s.is_available()) {
        bail!("some tools are missing");
    }
    Ok(())
}
