//! A2A Probe Utility
//!
//! Pokes a running agent over the protocol: read its card or health, perform a
//! discovery exchange, or send it one task.
//!
//! ## Usage
//!
//! ```bash
//! # Read the agent card
//! a2a-probe --endpoint http://localhost:8001 card
//!
//! # Liveness
//! a2a-probe --endpoint http://localhost:8001 health
//!
//! # Discovery handshake, advertising the probe as a peer
//! a2a-probe --endpoint http://localhost:8001 discover --advertise http://localhost:9000
//!
//! # One task
//! a2a-probe --endpoint http://localhost:8001 task --task-type research \
//!   --params '{"topic": "Rust async programming"}'
//! ```

use a2a_mesh::agent::{AgentClient, AgentRegistry};
use a2a_mesh::observability::init_default_logging;
use a2a_mesh::protocol::{AgentCard, Parameters};
use a2a_mesh::transport::HttpTransport;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::process;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "a2a-probe",
    about = "Talk to a running A2A agent",
    long_about = "Fetch an agent's card or health, perform discovery, or send a single task."
)]
struct Args {
    /// Base URL of the agent
    #[arg(long, default_value = "http://localhost:8001")]
    endpoint: String,

    /// Upper bound of the call in milliseconds
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,

    /// Identity the probe presents to the agent
    #[arg(long, default_value = "a2a-probe")]
    probe_id: String,

    /// Endpoint advertised in the probe's card
    #[arg(long, default_value = "http://localhost:9000")]
    advertise: String,

    #[command(subcommand)]
    command: ProbeCommand,
}

#[derive(Subcommand)]
enum ProbeCommand {
    /// GET /agent-card
    Card,
    /// GET /health
    Health,
    /// POST /discover with the probe's card
    Discover,
    /// POST /task
    Task {
        #[arg(long)]
        task_type: String,
        /// Task parameters as a JSON object
        #[arg(long, default_value = "{}")]
        params: String,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let card = AgentCard::new(
        &args.probe_id,
        "A2A Probe",
        &args.advertise,
        vec!["probe".to_string()],
    )
    .with_description("Command-line protocol probe");
    let registry = AgentRegistry::with_self(card)?;
    let client = AgentClient::new(
        registry,
        HttpTransport::new()?,
        Duration::from_millis(args.timeout_ms),
    )?;

    match args.command {
        ProbeCommand::Card => print_json(&client.fetch_card(&args.endpoint).await?),
        ProbeCommand::Health => print_json(&client.check_health(&args.endpoint).await?),
        ProbeCommand::Discover => print_json(&client.discover(&args.endpoint).await?),
        ProbeCommand::Task { task_type, params } => {
            let parameters: Parameters = serde_json::from_str(&params)
                .map_err(|e| format!("--params must be a JSON object: {e}"))?;
            let response = client
                .send_task(&args.endpoint, &task_type, parameters)
                .await?;
            print_json(&response)
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_default_logging();

    if let Err(e) = run(args).await {
        eprintln!("❌ {e}");
        process::exit(1);
    }
}
