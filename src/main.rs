use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hwv::manifest::{self, Config, Suite};
use hwv::{RunnerOptions, TaskRunner, Verdict};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// hwv - bounded model checking, equivalence checking and simulation
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tasks of a suite
    Run {
        /// Task suite (JSON)
        suite: PathBuf,

        /// Runner configuration (defaults to ./hwv.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Runner identity used for task selection
        #[arg(long)]
        runner: Option<String>,

        /// Number of tasks run concurrently
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Per-task timeout in seconds (0 disables)
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Only run tasks whose name contains this
        #[arg(short, long)]
        filter: Option<String>,

        /// Directory to write one JSON report per task into
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Show which tasks of a suite this runner would run
    List {
        /// Task suite (JSON)
        suite: PathBuf,

        /// Runner configuration (defaults to ./hwv.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Runner identity used for task selection
        #[arg(long)]
        runner: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt().with_env_filter(log_level).init();

    match cli.command {
        Commands::Run {
            suite,
            config,
            runner,
            jobs,
            timeout,
            filter,
            report,
        } => {
            let config = load_config(config.as_deref())?;
            let mut options = RunnerOptions::from_config(&config);
            if let Some(runner) = runner {
                options.runner = runner;
            }
            if let Some(jobs) = jobs {
                if jobs == 0 {
                    bail!("--jobs must be at least 1");
                }
                options.jobs = jobs;
            }
            if let Some(secs) = timeout {
                options.timeout = (secs > 0).then(|| Duration::from_secs(secs));
            }
            options.filter = filter;

            let suite = load_suite(&suite, &config)?;
            let code = run_suite(suite, options, report.as_deref())?;
            std::process::exit(code);
        }

        Commands::List {
            suite,
            config,
            runner,
        } => {
            let config = load_config(config.as_deref())?;
            let mut options = RunnerOptions::from_config(&config);
            if let Some(runner) = runner {
                options.runner = runner;
            }
            let suite = load_suite(&suite, &config)?;
            list_tasks(&suite, &options);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => manifest::config_from_path(path)
            .with_context(|| format!("Failed to load config {:?}", path)),
        None => {
            let default = Path::new("hwv.toml");
            if default.exists() {
                manifest::config_from_path(default).context("Failed to load ./hwv.toml")
            } else {
                Ok(Config::default())
            }
        }
    }
}

fn load_suite(path: &Path, config: &Config) -> Result<Suite> {
    let mut suite = manifest::suite_from_path(path)
        .with_context(|| format!("Failed to load task suite {:?}", path))?;
    suite.apply_defaults(&config.formal);
    info!("Loaded {} tasks from {:?}", suite.tasks.len(), path);
    Ok(suite)
}

fn run_suite(suite: Suite, options: RunnerOptions, report: Option<&Path>) -> Result<i32> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let code = runtime.block_on(async move {
        let runner = TaskRunner::new(options);

        let cancel = runner.cancel_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling running tasks");
                cancel.cancel();
            }
        });

        let summary = runner.run_suite(&suite).await;

        for result in &summary.results {
            if result.verdict == Verdict::Skipped {
                continue;
            }
            match &result.detail {
                Some(detail) => println!(
                    "{:<12} {} ({} ms): {}",
                    result.verdict.to_string(),
                    result.name,
                    result.time_ms,
                    detail
                ),
                None => println!(
                    "{:<12} {} ({} ms)",
                    result.verdict.to_string(),
                    result.name,
                    result.time_ms
                ),
            }
        }
        println!("\n{}", summary.summary());

        if let Some(dir) = report {
            summary
                .write_reports(dir)
                .with_context(|| format!("Failed to write reports to {:?}", dir))?;
            println!("Reports written to {:?}", dir);
        }

        Ok::<_, anyhow::Error>(summary.exit_code())
    })?;

    // cancelled workers stop at their next check; don't wait on them
    runtime.shutdown_timeout(Duration::from_secs(1));
    Ok(code)
}

fn list_tasks(suite: &Suite, options: &RunnerOptions) {
    println!("Runner: {}", options.runner);
    for entry in &suite.tasks {
        let decision = options
            .skip_reason(entry)
            .unwrap_or_else(|| "run".to_string());
        println!("  {:<32} {:<10} {}", entry.name, entry.task.kind(), decision);
    }
}
