//! vqbench command-line interface

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vqbench::catalog::Catalog;
use vqbench::config::Experiment;
use vqbench::runner;

#[derive(Parser, Debug)]
#[command(name = "vqbench")]
#[command(author, version, about = "Resumable benchmark driver for version-aware queries")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the sweep, resuming from the checkpoint if there is one
    Run {
        /// Experiment directory (catalog, store, checkpoint, results)
        experiment: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },
    /// Show the checkpoint and what is left to run
    Status {
        /// Experiment directory
        experiment: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },
    /// Build a catalog file from a directory of q<N>.txt query files
    Import {
        /// Directory holding the query files
        queries: PathBuf,
        /// Catalog file to write (".json" is appended if missing)
        output: PathBuf,
    },
}

/// Command-line overrides for `bench.json`.
#[derive(clap::Args, Debug)]
struct Overrides {
    /// Replications per cell
    #[arg(short, long)]
    replications: Option<usize>,

    /// Cap the number of results of every query
    #[arg(long)]
    limit: Option<usize>,

    /// Write one arrival curve per cell
    #[arg(long)]
    export_arrivals: bool,

    /// Per-replication timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Engine program
    #[arg(long)]
    engine: Option<String>,

    /// Engine argument (repeatable; `{store}` expands to the store path)
    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    engine_args: Vec<String>,

    /// Number of versions in the store (skips probing)
    #[arg(long)]
    versions: Option<usize>,
}

impl Overrides {
    fn apply(self, experiment: &mut Experiment) {
        let config = experiment.config_mut();
        if let Some(replications) = self.replications {
            config.replications = replications;
        }
        if self.limit.is_some() {
            config.limit = self.limit;
        }
        if self.export_arrivals {
            config.export_arrivals = true;
        }
        if self.timeout.is_some() {
            config.timeout_secs = self.timeout;
        }
        if let Some(engine) = self.engine {
            config.engine.program = engine;
        }
        if !self.engine_args.is_empty() {
            config.engine.args = self.engine_args;
        }
        if self.versions.is_some() {
            config.store.versions = self.versions;
        }
    }
}

fn open_experiment(dir: PathBuf, overrides: Overrides) -> anyhow::Result<Experiment> {
    let mut experiment = Experiment::open(&dir)
        .with_context(|| format!("loading configuration for {}", dir.display()))?;
    overrides.apply(&mut experiment);
    Ok(experiment)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "vqbench=debug"
    } else {
        "vqbench=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match cli.command {
        Command::Run {
            experiment,
            overrides,
        } => {
            let experiment = open_experiment(experiment, overrides)?;
            let summary = runner::run_experiment(&experiment)
                .await
                .with_context(|| format!("sweep of {} stopped", experiment.dir().display()))?;
            println!(
                "Completed {} cells ({} total across {} queries x {} versions)",
                summary.completed,
                summary.bounds.total_cells(),
                summary.bounds.total_queries,
                summary.bounds.total_versions,
            );
        }
        Command::Status {
            experiment,
            overrides,
        } => {
            let experiment = open_experiment(experiment, overrides)?;
            let (runner, bounds) = runner::prepare(&experiment).await?;
            let status = runner.status(bounds).with_context(|| {
                format!("reading {}", runner.checkpoints().path().display())
            })?;
            println!("Checkpoint:     {}", runner.checkpoints().path().display());
            match status.last {
                Some(last) => println!("Last completed: {last}"),
                None => println!("Last completed: none (fresh sweep)"),
            }
            match status.next {
                Some(next) => println!("Next cell:      {next}"),
                None => println!("Next cell:      none (sweep finished)"),
            }
            println!("Remaining:      {} of {} cells", status.remaining, bounds.total_cells());
        }
        Command::Import { queries, mut output } => {
            if output.extension().and_then(|e| e.to_str()) != Some("json") {
                output.as_mut_os_string().push(".json");
            }
            let catalog = Catalog::import_dir(&queries)
                .with_context(|| format!("importing queries from {}", queries.display()))?;
            std::fs::write(&output, catalog.to_json()?)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("Wrote {} queries to {}", catalog.len(), output.display());
        }
    }

    Ok(())
}
