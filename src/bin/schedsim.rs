//! schedsim — run a scheduler simulation script to completion.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use schedsim::{Interpreter, NamedSchedulePolicy, RunSummary, Scheduler};

/// Run a scheduler simulation script to completion and print its metrics.
#[derive(Parser)]
#[command(name = "schedsim")]
struct Cli {
    /// Path to a simulation script.
    script: PathBuf,

    /// Seed for the random-spawn builtins.
    #[arg(long, default_value_t = schedsim::DEFAULT_SEED)]
    seed: u64,

    /// Abort a simulation that has not completed after this many ticks.
    #[arg(long, default_value_t = 100_000)]
    max_ticks: u64,

    /// Write the run summary as JSON to this file.
    #[arg(long, value_name = "PATH")]
    json: Option<PathBuf>,

    /// Only print the aggregate metrics, not per-process lines.
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    if let Err(e) = run(&cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let source = std::fs::read_to_string(&cli.script)
        .with_context(|| format!("failed to read {}", cli.script.display()))?;

    let mut sched = Scheduler::new(NamedSchedulePolicy::first_come_first_served());
    let failed = Interpreter::eval_seeded(&source, &mut sched, cli.seed)
        .with_context(|| format!("failed to evaluate {}", cli.script.display()))?;
    if failed > 0 {
        eprintln!("warning: {failed} statement(s) failed to evaluate; continuing");
    }

    while !sched.complete() {
        if sched.timer() >= cli.max_ticks {
            bail!(
                "simulation still incomplete after {} ticks; raise --max-ticks?",
                cli.max_ticks
            );
        }
        sched.step();
    }

    if !cli.quiet {
        for process in sched.finished() {
            println!("{process}");
        }
    }

    println!(
        "policy: {} | cores: {} | ticks: {} | throughput: {:.3}",
        sched.schedule_policy().name(),
        sched.threads_count(),
        sched.timer(),
        sched.throughput(),
    );
    println!(
        "average waiting time: {} | average turnaround time: {} | average cpu usage: {:.2}",
        sched.average_waiting_time(),
        sched.average_turnaround_time(),
        sched.average_cpu_usage(),
    );

    if let Some(path) = &cli.json {
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        RunSummary::collect(&sched)
            .write_json(&mut file)
            .with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!("wrote run summary to {}", path.display());
    }

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
