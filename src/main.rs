use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

use mnema::config;
use mnema::retrieval::client::RetrievalClient;
use mnema::retrieval::job::{JobObserver, JobOutcome, JobSubscription};
use mnema::retrieval::RetrievalReply;

#[derive(Parser)]
#[command(name = "mnema", version, about = "Capture-and-injection agent for a remote memory store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a one-shot query against the configured memory store
    Query {
        /// Query text
        text: String,
        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,
        /// Ask for raw context instead of a generated answer
        #[arg(long)]
        context_only: bool,
    },
    /// Print the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = config::MnemaConfig::load()?;

    // Initialize tracing with the configured log level, on stderr so stdout
    // stays clean for command output.
    let filter = EnvFilter::try_new(&config.agent.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Query {
            text,
            limit,
            context_only,
        } => {
            if let Some(limit) = limit {
                config.retrieval.limit = limit;
            }
            if context_only {
                config.retrieval.context_only = true;
            }
            run_query(&config, &text).await?;
        }
        Command::Config => {
            println!("endpoint        {}", config.retrieval.endpoint);
            println!(
                "token           {}",
                if config.retrieval.api_token.is_some() {
                    "set"
                } else {
                    "unset (export MNEMA_TOKEN)"
                }
            );
            println!("debounce        {}ms", config.retrieval.debounce_ms);
            println!(
                "poll intervals  {}ms / {}ms / {}ms (high / normal / low)",
                config.capture.poll_high_ms,
                config.capture.poll_normal_ms,
                config.capture.poll_low_ms
            );
            println!("job timeout     {}s", config.jobs.timeout_secs);
        }
    }

    Ok(())
}

async fn run_query(config: &config::MnemaConfig, text: &str) -> Result<()> {
    let client = Arc::new(RetrievalClient::new(&config.retrieval));

    match client.search(text).await? {
        RetrievalReply::Inline { answer, results } => {
            if let Some(answer) = answer {
                println!("{answer}");
            }
            for (i, hit) in results.iter().enumerate() {
                println!("{}. [{:.2}] {}", i + 1, hit.score, hit.content);
            }
        }
        RetrievalReply::Job { job_id } => {
            eprintln!("query became job {job_id}, waiting...");

            let (tx, rx) = oneshot::channel();
            let observer = Arc::new(CliObserver {
                tx: Mutex::new(Some(tx)),
            });
            let _subscription = JobSubscription::open(
                Arc::clone(&client),
                job_id,
                observer,
                config.jobs.timeout(),
            );

            match rx.await {
                Ok(JobOutcome::Completed { answer, citations }) => {
                    println!("{answer}");
                    for citation in citations {
                        println!("  - {citation}");
                    }
                }
                Ok(JobOutcome::Failed { error }) => anyhow::bail!("job failed: {error}"),
                Ok(JobOutcome::TimedOut { error }) => anyhow::bail!("job timed out: {error}"),
                Err(_) => anyhow::bail!("job stream ended without an outcome"),
            }
        }
    }

    Ok(())
}

/// Prints heartbeats and relays the terminal outcome to the waiting command.
struct CliObserver {
    tx: Mutex<Option<oneshot::Sender<JobOutcome>>>,
}

impl JobObserver for CliObserver {
    fn on_heartbeat(&self, elapsed_secs: u64) {
        eprintln!("  ...still working ({elapsed_secs}s)");
    }

    fn on_terminal(&self, outcome: JobOutcome) {
        if let Some(tx) = self.tx.lock().expect("observer lock poisoned").take() {
            let _ = tx.send(outcome);
        }
    }
}
