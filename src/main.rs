//! A2A Mesh - Main Entry Point
//!
//! `serve` runs one agent from an `[agent]` config, `orchestrate` drives the
//! research → analyze → report pipeline against running agents, and `demo` starts
//! the three agents in-process and runs the pipeline against them.

use a2a_mesh::agent::{check_provider, AgentRuntime, ServerHandle};
use a2a_mesh::config::{
    AgentConfig, DemoConfig, LoadedConfig, OrchestratorConfig, DEFAULT_RESULTS_PATH,
};
use a2a_mesh::llm::build_provider;
use a2a_mesh::observability::init_default_logging;
use a2a_mesh::orchestrator::{
    discover_full_mesh, Orchestrator, PipelineDefinition, PipelineRun, ResultsWriter,
};
use a2a_mesh::protocol::Parameters;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process;
use tokio::signal;
use tracing::{error, info, warn};

const DEFAULT_TOPIC: &str = "What are the benefits of using OpenTelemetry for AI applications?";

/// Agent-to-agent protocol runtime and pipeline orchestrator
#[derive(Parser)]
#[command(name = "a2a-mesh")]
#[command(about = "Agent-to-agent protocol runtime and pipeline orchestrator")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "A2A_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one agent from an [agent] configuration
    Serve,
    /// Run the research → analyze → report pipeline against configured peers
    Orchestrate {
        #[arg(long, default_value = DEFAULT_TOPIC)]
        topic: String,
        /// Where to write the run document
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Start researcher, analyst and reporter in-process and run the pipeline
    Demo {
        #[arg(long, default_value = DEFAULT_TOPIC)]
        topic: String,
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting a2a-mesh v{}", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Commands::Serve => match load_configuration(&cli.config) {
            Ok(LoadedConfig::Agent(config)) => serve(config).await,
            Ok(other) => Err(wrong_kind("serve", "agent", &other)),
            Err(e) => Err(e),
        },
        Commands::Orchestrate { topic, output } => match load_configuration(&cli.config) {
            Ok(LoadedConfig::Orchestrator(config)) => orchestrate(config, topic, output).await,
            Ok(other) => Err(wrong_kind("orchestrate", "orchestrator", &other)),
            Err(e) => Err(e),
        },
        Commands::Demo { topic, output } => {
            let config: Result<DemoConfig, Box<dyn std::error::Error>> = match &cli.config {
                Some(path) => DemoConfig::load_from_file(path).map_err(Into::into),
                None => Ok(DemoConfig::default()),
            };
            match config {
                Ok(config) => demo(config, topic, output).await,
                Err(e) => Err(e),
            }
        }
        Commands::Config { show } => match load_configuration(&cli.config) {
            Ok(config) => handle_config_command(config, show),
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<LoadedConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(LoadedConfig::load_from_file(path)?)
        }
        None => {
            let default_paths = ["a2a.toml", "config/a2a.toml"];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(LoadedConfig::load_from_file(&path)?);
                }
            }

            Err("No configuration file found. Provide one with -c/--config or create a2a.toml".into())
        }
    }
}

fn wrong_kind(
    command: &str,
    expected: &str,
    found: &LoadedConfig,
) -> Box<dyn std::error::Error> {
    format!(
        "'{command}' needs an [{expected}] configuration, found [{}]",
        found.kind()
    )
    .into()
}

async fn serve(config: AgentConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Application starting with agent ID: {}", config.agent.id);

    let provider = build_provider(&config.llm)?;
    if let Err(e) = check_provider(provider.as_ref()).await {
        warn!("{}", e);
    }

    let runtime = AgentRuntime::new(config, provider)?;
    let server = runtime.start()?;
    info!(
        "Agent '{}' serving on {} (advertised as {})",
        runtime.card().name,
        server.local_addr(),
        runtime.card().endpoint
    );

    runtime.discover_configured_peers().await;

    wait_for_shutdown_signal().await?;

    info!("Application shutdown initiated");
    server.shutdown().await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<(), Box<dyn std::error::Error>> {
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully..."),
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully..."),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<(), Box<dyn std::error::Error>> {
    signal::ctrl_c().await?;
    info!("Received Ctrl-C, shutting down gracefully...");
    Ok(())
}

fn seed(topic: String) -> Parameters {
    let mut seed = Parameters::new();
    seed.insert("topic".to_string(), Value::String(topic));
    seed
}

async fn orchestrate(
    config: OrchestratorConfig,
    topic: String,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator =
        Orchestrator::from_config(&config, PipelineDefinition::research_analyze_report())?;

    let report = orchestrator.discover(&config.network.peers).await;
    if !report.is_complete() {
        warn!(
            "{} of {} peers could not be discovered",
            report.failures.len(),
            config.network.peers.len()
        );
    }

    let run = orchestrator.execute(seed(topic)).await;
    let path = output
        .or(config.orchestrator.results_path)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_PATH));
    finish_run(run, &path).await
}

async fn demo(
    config: DemoConfig,
    topic: String,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let provider = build_provider(&config.llm)?;

    let mut runtimes = Vec::new();
    let mut servers: Vec<ServerHandle> = Vec::new();
    for agent_config in config.agent_configs() {
        let runtime = AgentRuntime::new(agent_config, provider.clone())?;
        servers.push(runtime.start()?);
        runtimes.push(runtime);
    }

    let clients: Vec<_> = runtimes.iter().map(|runtime| runtime.client()).collect();
    let mesh = discover_full_mesh(&clients).await;
    if !mesh.is_complete() {
        warn!("{} discovery exchanges failed", mesh.failures.len());
    }

    let orchestrator_config = config.orchestrator_config();
    let orchestrator = Orchestrator::from_config(
        &orchestrator_config,
        PipelineDefinition::research_analyze_report(),
    )?;
    orchestrator
        .discover(&orchestrator_config.network.peers)
        .await;

    let run = orchestrator.execute(seed(topic)).await;
    let path = output.unwrap_or(config.demo.results_path);
    let outcome = finish_run(run, &path).await;

    for server in servers {
        server.shutdown().await;
    }
    outcome
}

async fn finish_run(run: PipelineRun, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    ResultsWriter::new(path).write(&run).await?;
    info!("Results saved to: {}", path.display());

    match run.final_result() {
        Some(result) => {
            if let Some(report) = result.get("final_report").and_then(Value::as_str) {
                println!("{report}");
            } else {
                println!("{}", serde_json::to_string_pretty(result)?);
            }
            Ok(())
        }
        None => match run.into_output() {
            Err(e) => Err(e.into()),
            Ok(_) => Err("pipeline did not complete".into()),
        },
    }
}

fn handle_config_command(
    config: LoadedConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        let rendered = match &config {
            LoadedConfig::Agent(config) => toml::to_string_pretty(config)?,
            LoadedConfig::Orchestrator(config) => toml::to_string_pretty(config)?,
            LoadedConfig::Demo(config) => toml::to_string_pretty(config)?,
        };
        println!("Current {} configuration:", config.kind());
        println!("{rendered}");
    }

    info!("Configuration validation complete");
    Ok(())
}
