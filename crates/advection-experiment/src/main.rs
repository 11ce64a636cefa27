//! Advection Experiment CLI.
//!
//! Commands:
//! - run: Run a single distributed evolution
//! - plan: Print the deterministic element placement without running

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use advection_experiment::domain_source::LineDomainSource;
use advection_experiment::driver::{self, RunConfig, StepperChoice};
use element_kernel::{initial_element_ids, DomainSource, WorkerPool};

/// Generate a timestamped output directory from the given path.
/// e.g., "observations" -> "observations-20260807-010530"
fn timestamped_dir(path: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("observations");
    let parent = path.parent().unwrap_or(Path::new("."));
    parent.join(format!("{}-{}", name, timestamp))
}

#[derive(Parser)]
#[command(name = "advection-experiment")]
#[command(version)]
#[command(about = "Distributed advection evolution experiments")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single evolution
    Run {
        /// Number of blocks in the line domain
        #[arg(long, default_value = "4")]
        blocks: u32,

        /// Per-block refinement level (2^r elements per block)
        #[arg(long, default_value = "1")]
        refinement: u32,

        /// Grid points per element
        #[arg(long, default_value = "8")]
        points: usize,

        /// Number of Evolve dispatches
        #[arg(long, default_value = "20")]
        steps: u64,

        /// Observe every N steps (0 disables observation)
        #[arg(long = "observe-every", default_value = "5")]
        observe_every: u64,

        /// Advection velocity
        #[arg(long, default_value = "0.5")]
        velocity: f64,

        /// Initial time step
        #[arg(long, default_value = "0.01")]
        dt: f64,

        /// Initial time
        #[arg(long = "start-time", default_value = "0.0")]
        start_time: f64,

        /// Initial slab size; defaults to |dt|
        #[arg(long = "slab-size")]
        slab_size: Option<f64>,

        /// Use local (per-element) time stepping
        #[arg(long)]
        local_time_stepping: bool,

        /// Time stepper: rk4 or ab2
        #[arg(long, default_value = "rk4")]
        stepper: String,

        /// Worker pool size; defaults to available parallelism
        #[arg(long, env = "ADVECTION_WORKERS")]
        workers: Option<usize>,

        /// Random seed for initial data
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output directory for persisted aggregates
        #[arg(long, default_value = "observations")]
        output: PathBuf,
    },

    /// Print the deterministic element placement
    Plan {
        /// Number of blocks in the line domain
        #[arg(long, default_value = "4")]
        blocks: u32,

        /// Per-block refinement level
        #[arg(long, default_value = "1")]
        refinement: u32,

        /// Worker pool size; defaults to available parallelism
        #[arg(long)]
        workers: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    match cli.command {
        Commands::Run {
            blocks,
            refinement,
            points,
            steps,
            observe_every,
            velocity,
            dt,
            start_time,
            slab_size,
            local_time_stepping,
            stepper,
            workers,
            seed,
            output,
        } => {
            let stepper = parse_stepper(&stepper)?;
            let output_dir = timestamped_dir(&output);

            info!(
                blocks,
                refinement,
                steps,
                stepper = stepper.name(),
                "Starting evolution run"
            );

            let config = RunConfig {
                blocks,
                refinement,
                points,
                steps,
                observe_every,
                velocity,
                seed,
                initial_time: start_time,
                initial_dt: dt,
                initial_slab_size: slab_size,
                local_time_stepping,
                stepper,
                workers,
                output_dir,
            };

            let summary = driver::run(config).await?;
            summary.save(&summary.output_dir.join("summary.json"))?;

            println!("\n=== Evolution Run Complete ===");
            println!("Run id: {}", summary.run_id);
            println!("Elements: {}", summary.elements);
            println!("Workers: {}", summary.workers);
            println!("Observations completed: {}", summary.observations_completed);
            println!("Output: {}", summary.output_dir.display());
        }

        Commands::Plan {
            blocks,
            refinement,
            workers,
        } => {
            let pool = workers
                .map(WorkerPool::with_count)
                .unwrap_or_else(WorkerPool::detect);
            let source = LineDomainSource {
                blocks,
                refinement,
                points: 0,
            };
            let domain = source.create_domain();
            let levels = source.initial_refinement();

            println!("Placement over {} workers:", pool.count());
            let mut created = 0usize;
            for block in domain.blocks() {
                for id in initial_element_ids(block.id, &levels[block.id as usize]) {
                    println!("  {:>4}  {}  -> worker {}", created, id, created % pool.count());
                    created += 1;
                }
            }
            println!("Total elements: {}", created);
        }
    }

    Ok(())
}

fn parse_stepper(s: &str) -> Result<StepperChoice> {
    match s.to_lowercase().as_str() {
        "rk4" | "runge-kutta" | "runge_kutta4" => Ok(StepperChoice::RungeKutta4),
        "ab2" | "adams-bashforth" | "adams_bashforth2" => Ok(StepperChoice::AdamsBashforth2),
        _ => anyhow::bail!("Unknown stepper: {}. Valid: rk4, ab2", s),
    }
}
