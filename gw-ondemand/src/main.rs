// On-demand VPN gateway control daemon

use anyhow::{Context, Result};
use aws_config::SdkConfig;
use clap::{Parser, Subcommand, ValueEnum};
use gw_ondemand::{
    actuator::Actuator,
    aws::load_sdk_config,
    backend::Ec2Backend,
    config::{self, load_config},
    metrics::CloudWatchSink,
    monitor::{Monitor, MonitorResult, MonitorSettings},
    oracle::HeadscaleOracle,
    router::{build_router, Controller},
    types::Config,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::time::interval;

const DEFAULT_CONFIG_PATH: &str = "/etc/gw-ondemand/config.toml";

#[derive(Parser)]
#[command(name = "gw-ondemand")]
#[command(about = "On-demand VPN gateway lifecycle manager", long_about = None)]
struct Args {
    /// Path to configuration file (environment variables override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the start/stop/status control API over HTTP
    Serve,
    /// Run the idle monitor
    Monitor {
        /// Keep running cycles on the configured interval instead of running once
        #[arg(long)]
        watch: bool,
    },
    /// Run a single control operation and print the JSON response
    Control {
        #[arg(value_enum)]
        operation: Operation,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Operation {
    Start,
    Stop,
    Status,
}

impl Operation {
    fn request(self) -> (&'static str, &'static str) {
        match self {
            Operation::Start => ("POST", "/start"),
            Operation::Stop => ("POST", "/stop"),
            Operation::Status => ("GET", "/status"),
        }
    }
}

fn main() -> Result<()> {
    // One worker for the API/monitor, one for SDK and oracle requests
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("gw-ondemand")
        .enable_time()
        .enable_io()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let args = Args::parse();

    let (path, required) = match &args.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };
    let config = load_config(&path, required)
        .with_context(|| format!("Failed to load config from {:?}", path))?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.general.log_level),
    )
    .init();

    log::info!("Managed instance: {}", config.general.instance_id);

    let sdk = load_sdk_config(config.general.region.clone()).await;

    match args.command {
        Command::Serve => serve(&config, &sdk).await,
        Command::Monitor { watch: false } => {
            let result = build_monitor(&config, &sdk)?.run_cycle().await;
            report(&result)
        }
        Command::Monitor { watch: true } => watch(&config, &sdk).await,
        Command::Control { operation } => {
            let controller = Controller::new(build_actuator(&sdk), &config.general.instance_id);
            let (method, path) = operation.request();
            let response = controller.handle(method, path).await;

            println!("{}", serde_json::to_string_pretty(&response.body)?);
            if response.status_code >= 400 {
                anyhow::bail!("{} {} failed with status {}", method, path, response.status_code);
            }
            Ok(())
        }
    }
}

fn build_actuator(sdk: &SdkConfig) -> Actuator {
    Actuator::new(Arc::new(Ec2Backend::new(sdk)))
}

fn build_monitor(config: &Config, sdk: &SdkConfig) -> Result<Monitor> {
    let url = config::require_headscale_url(config)?;
    let oracle = HeadscaleOracle::new(url).context("Failed to create Headscale client")?;
    let sink = CloudWatchSink::new(sdk);

    log::info!("Headscale URL: {}", url);
    log::info!("Idle timeout: {}m", config.general.idle_timeout_minutes);

    Ok(Monitor::new(
        build_actuator(sdk),
        Arc::new(oracle),
        Arc::new(sink),
        MonitorSettings {
            instance_id: config.general.instance_id.clone(),
            idle_timeout_minutes: config.general.idle_timeout_minutes,
            metrics_namespace: config.general.metrics_namespace.clone(),
        },
    ))
}

/// Print a monitor result; non-2xx results fail the process
fn report(result: &MonitorResult) -> Result<()> {
    println!("{}", serde_json::to_string(result)?);
    if result.status_code >= 400 {
        anyhow::bail!("Idle monitor cycle failed: {}", result.reason);
    }
    Ok(())
}

async fn serve(config: &Config, sdk: &SdkConfig) -> Result<()> {
    let controller = Controller::new(build_actuator(sdk), &config.general.instance_id);
    let router = build_router(Arc::new(controller));

    let listener = tokio::net::TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen))?;
    log::info!("Control API listening on {}", config.server.listen);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Control API server failed")?;

    log::info!("Shutdown complete");
    Ok(())
}

async fn watch(config: &Config, sdk: &SdkConfig) -> Result<()> {
    let monitor = build_monitor(config, sdk)?;
    let period = Duration::from_secs(config.monitor.interval_minutes * 60);
    let mut timer = interval(period);

    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .context("Failed to set up SIGTERM handler")?;
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .context("Failed to set up SIGINT handler")?;

    log::info!(
        "Idle monitor started (every {}m)",
        config.monitor.interval_minutes
    );

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                log::info!("Received SIGTERM");
                break;
            }
            _ = sigint.recv() => {
                log::info!("Received SIGINT");
                break;
            }
            _ = timer.tick() => {
                let result = monitor.run_cycle().await;
                match serde_json::to_string(&result) {
                    Ok(json) if result.status_code >= 400 => log::error!("Monitor cycle: {}", json),
                    Ok(json) => log::info!("Monitor cycle: {}", json),
                    Err(e) => log::error!("Failed to encode monitor result: {}", e),
                }
            }
        }
    }

    log::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            log::error!("Failed to set up SIGTERM handler: {}", e);
            let _ = signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => log::info!("Received SIGTERM"),
        _ = signal::ctrl_c() => log::info!("Received SIGINT"),
    }
}
