use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use pepbench_policy::AdaptiveSplitPolicy;
use pepbench_process::LocalProcessHost;
use pepbench_runner::{BenchmarkRunner, OutcomeRecord, QuicheTransport, RunRequest};
use pepbench_scenario::{ScenarioSet, Strategy};

/// PEP split benchmark driver.
///
/// Runs every scenario in the scenario file under the three split
/// strategies and writes one JSON document of outcome records.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scenario file path (YAML)
    #[arg(short, long, value_name = "FILE")]
    scenarios: String,

    /// Output path for the aggregate JSON results
    #[arg(short, long, value_name = "FILE", default_value = "results.json")]
    output: String,

    /// Directory containing the quiche-server and quiche-client binaries
    #[arg(long, default_value = "deps/quiche/target/release")]
    quiche_dir: String,

    /// TLS certificate for the server
    #[arg(long, default_value = "cert.pem")]
    cert: String,

    /// TLS key for the server
    #[arg(long, default_value = "key.pem")]
    key: String,

    /// Object size to transfer, in bytes
    #[arg(short = 'n', long, default_value_t = 5_000_000)]
    transfer_bytes: u64,

    /// Endpoint name the server runs on
    #[arg(long, default_value = "server")]
    server_endpoint: String,

    /// Endpoint name the client runs on
    #[arg(long, default_value = "client")]
    client_endpoint: String,

    /// Server listen address, as reachable from the client endpoint
    #[arg(long, default_value = "10.0.0.2:4433")]
    server_addr: String,

    /// Server startup timeout in seconds
    #[arg(long, default_value_t = 10.0)]
    startup_timeout: f64,

    /// Hard wall-clock bound on each client run, in seconds
    #[arg(long, default_value_t = 120.0)]
    run_timeout: f64,

    /// Run commands inside `ip netns exec <endpoint>`
    #[arg(long)]
    netns: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    initialize_logging(args.debug);

    info!("Starting PEP split benchmark");
    let scenario_set = ScenarioSet::load_from_file(&args.scenarios)
        .with_context(|| format!("loading scenarios from {}", args.scenarios))?;

    let policy = AdaptiveSplitPolicy::default();
    let host = if args.netns {
        LocalProcessHost::with_netns()
    } else {
        LocalProcessHost::new()
    };
    let transport = QuicheTransport::new(&args.quiche_dir, &args.cert, &args.key);
    let mut runner = BenchmarkRunner::new(Arc::new(host), Arc::new(transport));

    let mut records: Vec<OutcomeRecord> = Vec::new();
    for scenario in &scenario_set.scenarios {
        for strategy in Strategy::ALL {
            let pep_enabled = strategy
                .fixed_pep()
                .unwrap_or_else(|| policy.decide(scenario));

            let request = RunRequest {
                scenario: scenario.clone(),
                strategy,
                pep_enabled,
                transfer_bytes: args.transfer_bytes,
                server_endpoint: args.server_endpoint.clone(),
                client_endpoint: args.client_endpoint.clone(),
                server_addr: args.server_addr.clone(),
                startup_timeout: Duration::from_secs_f64(args.startup_timeout),
                run_timeout: Duration::from_secs_f64(args.run_timeout),
            };

            info!(
                scenario = %scenario.id,
                %strategy,
                pep_enabled,
                "Running benchmark"
            );
            match runner.execute(&request).await {
                Ok(outcome) => {
                    records.push(OutcomeRecord::new(&request, &outcome));
                }
                Err(e) => {
                    // One scenario's infrastructure fault must not
                    // abort the remaining batch.
                    error!(
                        scenario = %scenario.id,
                        %strategy,
                        error = %e,
                        "Benchmark run failed"
                    );
                }
            }
        }
    }

    write_records(&args.output, &records)?;
    let successes = records.iter().filter(|r| r.outcome_kind == "success").count();
    info!(
        total = records.len(),
        successes,
        output = %args.output,
        "Benchmark batch finished"
    );

    Ok(())
}

fn write_records(path: &str, records: &[OutcomeRecord]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating output file {}", path))?;
    serde_json::to_writer_pretty(file, records).context("serializing outcome records")?;
    Ok(())
}

fn initialize_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .init();
}
