mod commands;
mod logging;
mod progress;

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process;
use std::time::Duration;

use caption_deck_core::config::{load_configuration_with, resolve_system_prompt};
use caption_deck_core::grid::{GridFilter, GridLoader, TICK_INTERVAL};
use caption_deck_core::queue::{load_queue, resolve_jobs};
use caption_deck_core::{
    client, metadata, AppConfig, BatchStatus, BatchSummary, BatchWorker, DirectoryScanner,
    ImageEntry, JobConfig, OllamaCaptioner, ReviewGrid,
};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, SortArg, ViewArg, CLI_TIMEOUT_SECS};
use dotenv::dotenv;
use progress::CliReporter;
use tracing::{error, info, warn};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let cli_defaults = AppConfig {
        request_timeout_secs: CLI_TIMEOUT_SECS,
        ..AppConfig::default()
    };
    let config = match load_configuration_with(&cli_defaults) {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    match &args.command {
        Some(Commands::Models) => run_models(&config, args.url.as_deref()),
        Some(Commands::Browse {
            directory,
            view,
            sort,
            search,
        }) => run_browse(directory, *view, *sort, search.as_deref()),
        Some(Commands::Extract { image, save }) => run_extract(image, *save),
        Some(Commands::Favorite { image }) => {
            match ImageEntry::new(image).toggle_favorite() {
                Ok(true) => println!("{} {}", "★".yellow(), image.display()),
                Ok(false) => println!("{} {}", "☆".dimmed(), image.display()),
                Err(e) => {
                    error!("Error toggling favorite for {}: {}", image.display(), e);
                    process::exit(1);
                }
            }
        }
        Some(Commands::Delete { image, yes }) => run_delete(image, *yes),
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
        }
        None => run_batches(&config, &args),
    }

    Ok(())
}

const MISSING_SOURCE: &str = "Error: You must specify either the --queue or --directory argument.";

/// `--directory` or `--queue`, exactly one of them.
fn check_batch_source(args: &Cli) -> Result<(), &'static str> {
    if args.queue.is_some() == args.directory.is_some() {
        return Err(MISSING_SOURCE);
    }
    Ok(())
}

fn run_batches(config: &AppConfig, args: &Cli) {
    if let Err(message) = check_batch_source(args) {
        error!("{}", message);
        let _ = Cli::command().print_long_help();
        process::exit(1);
    }

    let defaults = match base_job(config, args) {
        Ok(job) => job,
        Err(err) => {
            error!("Error reading system prompt: {}", err);
            process::exit(1);
        }
    };

    let jobs = match (&args.queue, &args.directory) {
        (Some(queue_path), _) => {
            match load_queue(queue_path).and_then(|queue| resolve_jobs(&queue, &defaults)) {
                Ok(jobs) => jobs,
                Err(err) => {
                    error!("Error loading queue {}: {}", queue_path.display(), err);
                    process::exit(1);
                }
            }
        }
        (None, Some(directory)) => {
            let mut job = defaults.clone();
            job.directory = directory.clone();
            vec![job]
        }
        (None, None) => Vec::new(),
    };

    let total_jobs = jobs.len();
    for (index, job) in jobs.into_iter().enumerate() {
        if let Err(err) = job.validate() {
            warn!("Skipping job {}/{}: {}", index + 1, total_jobs, err);
            continue;
        }
        info!(
            "Job {}/{}: {} with {}",
            index + 1,
            total_jobs,
            job.directory.display().to_string().cyan(),
            job.model.cyan()
        );
        let summary = run_job(job);
        print_summary(&summary);
    }
}

/// Job settings shared by every run: config values overridden by flags.
fn base_job(config: &AppConfig, args: &Cli) -> io::Result<JobConfig> {
    let mut job = JobConfig::new(config, "").with_overwrite(args.overwrite);
    if let Some(secs) = args.timeout {
        job = job.with_timeout(Duration::from_secs(secs));
    }
    if let Some(url) = &args.url {
        job.endpoint = url.clone();
    }
    if let Some(model) = &args.model {
        job = job.with_model(model);
    }
    if let Some(system) = &args.system {
        job = job.with_prompt(&resolve_system_prompt(system)?);
    }
    Ok(job)
}

fn run_job(job: JobConfig) -> BatchSummary {
    let captioner = OllamaCaptioner::from_job(&job);
    let mut worker = BatchWorker::new(job, captioner);
    let reporter = CliReporter::new();
    worker.run(&reporter)
}

fn print_summary(summary: &BatchSummary) {
    let status = match summary.status {
        BatchStatus::Complete => summary.status.to_string().green(),
        BatchStatus::Stopped => summary.status.to_string().yellow(),
        BatchStatus::NoImages => summary.status.to_string().dimmed(),
    };
    info!(
        "{} {} images: {} generated, {} reused, {} failed",
        status,
        summary.total,
        format!("{}", summary.generated).green(),
        format!("{}", summary.reused).cyan(),
        format!("{}", summary.failed).red(),
    );
}

fn run_models(config: &AppConfig, url: Option<&str>) {
    let endpoint = url.unwrap_or(&config.endpoint);
    match client::list_models(endpoint, Duration::from_secs(config.models_timeout_secs)) {
        Ok(models) if models.is_empty() => println!("No models installed at {}", endpoint),
        Ok(models) => {
            for name in models {
                let marker = if name == config.model { "*" } else { " " };
                println!("{} {}", marker.green(), name);
            }
        }
        Err(err) => {
            warn!("Could not list models at {}: {}", endpoint, err);
            println!("{}", config.model);
        }
    }
}

fn run_browse(directory: &Path, view: ViewArg, sort: SortArg, search: Option<&str>) {
    let mut scanner = DirectoryScanner::new();
    scanner.start(directory);
    let entries = wait_for_scan(&scanner);

    let mut grid = ReviewGrid::new();
    grid.sort = sort.into();
    grid.filter = GridFilter {
        view: view.into(),
        search: search.unwrap_or_default().to_string(),
    };

    let mut loader = GridLoader::new();
    loader.load(entries);
    loader.run_to_completion(TICK_INTERVAL, |batch| grid.extend(batch));

    let visible = grid.visible();
    for item in &visible {
        let star = if item.favorite { "★".yellow() } else { " ".normal() };
        let caption = match &item.caption {
            Some(text) => text.lines().next().unwrap_or_default().normal(),
            None => "(no caption)".dimmed(),
        };
        println!("{} {:<32} {}", star, item.entry.file_name().cyan(), caption);
    }
    println!("{} of {} images shown", visible.len(), grid.len());
}

fn wait_for_scan(scanner: &DirectoryScanner) -> Vec<ImageEntry> {
    loop {
        if let Some(message) = scanner.recv_timeout(TICK_INTERVAL) {
            return message.entries;
        }
        if !scanner.is_scanning() {
            return scanner.try_recv().map(|m| m.entries).unwrap_or_default();
        }
    }
}

fn run_extract(image: &Path, save: bool) {
    if !save {
        match metadata::extract_prompt(image) {
            Some(prompt) => println!("{}", prompt),
            None => println!("{}", "No embedded prompt found.".dimmed()),
        }
        return;
    }

    let mut grid = ReviewGrid::new();
    match grid.apply_extracted_prompt(image) {
        Ok(Some(prompt)) => {
            println!("{}", prompt);
            info!("Saved as caption for {}", image.display());
        }
        Ok(None) => println!("{}", "No embedded prompt found.".dimmed()),
        Err(e) => {
            error!("Error saving caption for {}: {}", image.display(), e);
            process::exit(1);
        }
    }
}

fn run_delete(image: &Path, yes: bool) {
    if !yes {
        let question = format!(
            "Delete {} and its caption, favorite marker and thumbnail?",
            image.display()
        );
        match confirm(&question, &mut io::stdin().lock(), &mut io::stdout()) {
            Ok(true) => {}
            _ => process::exit(0),
        }
    }

    let report = ImageEntry::new(image).delete();
    if report.is_complete() {
        println!("{}", report.status_message().green());
    } else {
        error!("{}", report.status_message());
        process::exit(1);
    }
}

/// Ask a yes/no question; anything but `y`/`yes` (including EOF) is a no.
fn confirm(question: &str, input: &mut impl BufRead, output: &mut impl Write) -> io::Result<bool> {
    write!(output, "{} [y/N] ", question.yellow())?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
