//! Device Telemetry Agent CLI
//!
//! Background agent that reports device state snapshots to a collector.

use clap::{Parser, Subcommand};
use device_telemetry_agent::{
    config::Config, host::InstallationIdentity, trigger::WakeSignal, ScheduleRegistry,
    TelemetryAgent, DATA_DECLARATION, VERSION,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "server")]
use device_telemetry_agent::server::{run_collector, run_wake_listener, CollectorServerConfig};
#[cfg(feature = "server")]
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "telemetry-agent")]
#[command(version = VERSION)]
#[command(about = "Background agent that reports device state to a collector", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent: recurring schedule plus optional wake listener
    Start {
        /// Collector base URL (overrides the configuration file)
        #[arg(long)]
        collector: Option<String>,

        /// Schedule interval in seconds
        #[arg(long)]
        interval: Option<u64>,

        /// Port for the local wake listener (requires server feature)
        #[arg(long)]
        wake_port: Option<u16>,
    },

    /// Send one snapshot now, as the manual test action does
    Run {
        /// Skip the delay before the run starts
        #[arg(long)]
        no_delay: bool,
    },

    /// Deliver a wake signal with the given JSON payload
    Wake {
        /// Wake payload, e.g. '{"aps": {"content-available": 1}}'
        #[arg(long)]
        payload: String,
    },

    /// Print a snapshot without submitting it
    Snapshot,

    /// Run the reference collector endpoint (requires server feature)
    Collector {
        /// Port to listen on
        #[arg(long, default_value = "9000")]
        port: u16,

        /// JSON Lines file receiving posted snapshots
        #[arg(long, default_value = "device_data.jsonl")]
        data_file: String,

        /// Directory emptied by the clear endpoint
        #[arg(long, default_value = "output")]
        output_dir: String,
    },

    /// Show agent status and activity
    Status,

    /// Display what data the agent reports
    Declaration,

    /// Show configuration
    Config,
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            collector,
            interval,
            wake_port,
        } => {
            cmd_start(collector, interval, wake_port);
        }
        Commands::Run { no_delay } => {
            cmd_run(no_delay);
        }
        Commands::Wake { payload } => {
            cmd_wake(&payload);
        }
        Commands::Snapshot => {
            cmd_snapshot();
        }
        Commands::Collector {
            port,
            data_file,
            output_dir,
        } => {
            cmd_collector(port, &data_file, &output_dir);
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::Declaration => {
            cmd_declaration();
        }
        Commands::Config => {
            cmd_config();
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .ok();
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load configuration ({e}), using defaults");
            Config::default()
        }
    }
}

fn create_agent(config: &Config) -> TelemetryAgent {
    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    match TelemetryAgent::from_config(config) {
        Ok(agent) => agent,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn create_runtime() -> Runtime {
    match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: Failed to create runtime: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_start(collector: Option<String>, interval: Option<u64>, wake_port: Option<u16>) {
    println!("Device Telemetry Agent v{VERSION}");
    println!();

    let mut config = load_config();
    if let Some(url) = collector {
        config.collector_url = url;
    }
    if let Some(secs) = interval {
        config.schedule_interval = Duration::from_secs(secs);
    }
    if wake_port.is_some() {
        config.wake_port = wake_port;
    }

    let agent = create_agent(&config);

    println!("Starting agent...");
    println!(
        "  Collector: {}",
        agent.submitter().endpoint().device_data_url()
    );
    println!(
        "  Schedule: {} every {}s",
        config.schedule_id,
        config.schedule_interval.as_secs()
    );
    match config.window_budget {
        Some(budget) => println!("  Window budget: {}s", budget.as_secs()),
        None => println!("  Window budget: unbounded"),
    }

    let stop = Arc::new(Notify::new());
    ctrlc_handler(stop.clone());

    let runtime = create_runtime();
    runtime.block_on(async {
        let registry = ScheduleRegistry::new();
        agent.schedule(&registry, &config.schedule_id, config.schedule_interval);

        #[cfg(feature = "server")]
        let wake_server = match config.wake_port {
            Some(port) => match run_wake_listener(agent.clone(), port).await {
                Ok((addr, shutdown)) => {
                    println!("  Wake listener: http://{addr}/wake");
                    Some(shutdown)
                }
                Err(e) => {
                    eprintln!("Warning: Could not start wake listener: {e}");
                    None
                }
            },
            None => {
                println!("  Wake listener: disabled");
                None
            }
        };

        #[cfg(not(feature = "server"))]
        if config.wake_port.is_some() {
            eprintln!("Warning: --wake-port ignored (server feature not enabled at compile time)");
        }

        println!();
        println!("Press Ctrl+C to stop");
        println!();

        stop.notified().await;

        println!();
        println!("Stopping agent...");
        registry.cancel_all();

        #[cfg(feature = "server")]
        if let Some(shutdown) = wake_server {
            let _ = shutdown.send(());
        }
    });

    if let Err(e) = agent.activity().save() {
        eprintln!("Warning: Could not save activity stats: {e}");
    }

    println!();
    println!("{}", agent.activity().summary());
}

fn cmd_run(no_delay: bool) {
    let config = load_config();
    let mut agent = create_agent(&config);
    if no_delay {
        agent = agent.with_manual_delay(Duration::ZERO);
    } else {
        println!(
            "Snapshot will be sent in {}s...",
            config.manual_delay.as_secs()
        );
    }

    let runtime = create_runtime();
    let result = runtime.block_on(agent.manual_trigger().run());
    println!("Run finished: {result}");
}

fn cmd_wake(payload: &str) {
    let payload: serde_json::Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            eprintln!("Error: Invalid wake payload: {e}");
            std::process::exit(1);
        }
    };

    let config = load_config();
    let agent = create_agent(&config);

    let runtime = create_runtime();
    let result = runtime.block_on(agent.handle_wake(WakeSignal::new(payload)));
    println!("Wake handled: {result}");
}

fn cmd_snapshot() {
    let config = load_config();
    let agent = create_agent(&config);

    let snapshot = agent.collect_snapshot();
    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error serializing snapshot: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(feature = "server")]
fn cmd_collector(port: u16, data_file: &str, output_dir: &str) {
    let config = CollectorServerConfig::new(port, PathBuf::from(data_file), PathBuf::from(output_dir));

    let stop = Arc::new(Notify::new());
    ctrlc_handler(stop.clone());

    let runtime = create_runtime();
    runtime.block_on(async {
        let (addr, shutdown) = match run_collector(config).await {
            Ok(server) => server,
            Err(e) => {
                eprintln!("Error: Could not start collector: {e}");
                std::process::exit(1);
            }
        };
        println!("Collector listening on http://{addr}");
        println!("  Appending snapshots to {data_file}");
        println!();
        println!("Press Ctrl+C to stop");

        stop.notified().await;
        let _ = shutdown.send(());
    });
}

#[cfg(not(feature = "server"))]
fn cmd_collector(_port: u16, _data_file: &str, _output_dir: &str) {
    eprintln!("Error: collector requires the server feature");
    std::process::exit(1);
}

fn cmd_status() {
    let config = load_config();

    println!("Device Telemetry Agent Status");
    println!("=============================");
    println!();

    println!("Configuration:");
    println!("  Collector: {}", config.collector_url);
    println!(
        "  Schedule: {} every {}s",
        config.schedule_id,
        config.schedule_interval.as_secs()
    );
    println!("  Probe scheme: {}", config.probe_scheme);
    match config.wake_port {
        Some(port) => println!("  Wake port: {port}"),
        None => println!("  Wake port: disabled"),
    }
    match InstallationIdentity::new(&config.data_path).load_or_create() {
        Ok(id) => println!("  Installation: {id}"),
        Err(e) => println!("  Installation: unavailable ({e})"),
    }
    println!();

    let stats_path = config.activity_path();
    if stats_path.exists() {
        if let Ok(content) = std::fs::read_to_string(&stats_path) {
            if let Ok(stats) = serde_json::from_str::<serde_json::Value>(&content) {
                println!("Cumulative Activity:");
                for (key, label) in [
                    ("scheduled_runs", "Scheduled triggers"),
                    ("wake_runs", "Wake triggers"),
                    ("manual_runs", "Manual triggers"),
                    ("new_data", "Snapshots delivered"),
                    ("no_data", "Acknowledged without data"),
                    ("failed", "Failed runs"),
                ] {
                    if let Some(value) = stats.get(key) {
                        println!("  {label}: {value}");
                    }
                }
                if let Some(updated) = stats.get("last_updated").and_then(|v| v.as_str()) {
                    println!("  Last updated: {updated}");
                }
            }
        }
    } else {
        println!("No previous activity found.");
    }
}

fn cmd_declaration() {
    println!("{DATA_DECLARATION}");
}

fn cmd_config() {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(stop: Arc<Notify>) {
    if let Err(e) = ctrlc::set_handler(move || stop.notify_one()) {
        eprintln!("Error setting Ctrl+C handler: {e}");
        std::process::exit(1);
    }
}
