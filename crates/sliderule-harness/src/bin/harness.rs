//! CLI entrypoint for the SlideRule record/messaging harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Scenario replay and queue introspection for the SlideRule core.
#[derive(Debug, Parser)]
#[command(name = "sliderule-harness")]
#[command(about = "Scenario runner and queue introspection for sliderule-core")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run every scenario in a `ScenarioSet` JSON file and report pass/fail.
    RunScenarios {
        /// Path to a scenario set JSON file.
        #[arg(long, default_value = "crates/sliderule-harness/scenarios/seed.json")]
        file: PathBuf,
    },
    /// List currently live named queues and their depth/subscription counts.
    ListQueues,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    sliderule::init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::RunScenarios { file } => {
            tracing::info!(path = %file.display(), "loading scenario set");
            let set = sliderule_harness::ScenarioSet::from_file(&file)?;
            let outcomes = sliderule_harness::ScenarioRunner::run_set(&set);

            let mut failed = 0;
            for outcome in &outcomes {
                if outcome.passed {
                    eprintln!("[PASS] {}", outcome.name);
                } else {
                    failed += 1;
                    eprintln!("[FAIL] {}: {}", outcome.name, outcome.failure.as_deref().unwrap_or("unknown"));
                }
            }
            let body = serde_json::to_string_pretty(&outcomes)?;
            println!("{body}");

            if failed > 0 {
                return Err(format!("{failed} of {} scenario(s) failed", outcomes.len()).into());
            }
        }
        Command::ListQueues => {
            let queues = sliderule::list_queues();
            if queues.is_empty() {
                eprintln!("no live queues");
            }
            for queue in queues {
                println!(
                    "{}\tdepth_used={}\tdepth={}\tsubscriptions={}",
                    queue.name, queue.depth_used, queue.depth, queue.subscriptions
                );
            }
        }
    }

    Ok(())
}
