// # dns-sidecar
//
// Keeps one weighted A (or AAAA) record in a Route53 hosted zone pointing at
// this task for exactly as long as the task runs.
//
// This binary is a thin integration layer. The lifecycle itself lives in
// sidecar-core; this file only:
// 1. Parses configuration from flags and environment variables
// 2. Initializes logging and the runtime
// 3. Installs the termination signal handlers
// 4. Wires the metadata sources and the Route53 client into the controller
//
// ## Configuration
//
// - `DNS` / `--dns`: record name (default `my.example.com`)
// - `HOSTEDZONE` / `--hostedzone`: hosted zone id (default `Z2AAAABCDEFGT4`)
// - `DNSTTL` / `--dnsttl`: record TTL in seconds (default 10)
// - `IPADDRESS` / `--ipaddress`: `public-ipv4`, `local-ipv4`, `ecs` or a literal
// - `SETUPDELAY` / `--setupdelay`: seconds to wait before registering (default 0)
// - `POLL_INTERVAL`, `MAX_POLL_FAILURES`, `POLL_FAILURE_COUNTING`: propagation polling
// - `LOG_LEVEL` / `--log-level`: trace, debug, info, warn, error
//
// AWS credentials and region come from the standard AWS environment.
//
// ## Example
//
// ```bash
// export DNS=api.internal.example.com
// export HOSTEDZONE=Z0123456789ABC
// export IPADDRESS=ecs
//
// dns-sidecar
// ```

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Args;
use sidecar_core::{
    AddressResolver, LifecycleController, LifecycleEvent, SidecarConfig, TerminationSender, TerminationSignal,
    termination,
};
use sidecar_provider_route53::Route53ChangeClient;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Record registered, deregistered and drained
/// - 1: Configuration or startup error
/// - 2: Lifecycle failure
#[derive(Debug, Clone, Copy)]
enum SidecarExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<SidecarExitCode> for ExitCode {
    fn from(code: SidecarExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version also arrive here
            let _ = e.print();
            return if e.use_stderr() {
                SidecarExitCode::ConfigError.into()
            } else {
                SidecarExitCode::CleanShutdown.into()
            };
        }
    };

    let log_level = match args.level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration validation error: {}", e);
            return SidecarExitCode::ConfigError.into();
        }
    };

    let config = match args.to_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration validation error: {:#}", e);
            return SidecarExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SidecarExitCode::ConfigError.into();
    }

    info!("Starting dns-sidecar");
    log_config(&config);

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SidecarExitCode::ConfigError.into();
        }
    };

    rt.block_on(async {
        let controller = match build_controller(config).await {
            Ok(controller) => controller,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return SidecarExitCode::ConfigError;
            }
        };

        match controller.run().await {
            Ok(()) => {
                info!("Record deregistered and drained, exiting");
                SidecarExitCode::CleanShutdown
            }
            Err(e) => {
                match e.stage() {
                    Some(stage) => error!("Lifecycle failed while {}: {}", stage, e.root()),
                    None => error!("Lifecycle failed: {}", e),
                }
                SidecarExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Log the effective configuration
fn log_config(config: &SidecarConfig) {
    info!("DNS name: {}", config.record.name);
    info!("Hosted zone: {}", config.record.zone_id);
    info!("TTL: {}s", config.record.ttl_secs);
    info!("Address: {}", config.address);
    info!("Setup delay: {}s", config.setup_delay_secs);
    debug!(
        "Propagation polling: every {}s, {} failure(s) tolerated ({:?})",
        config.propagation.poll_interval_secs,
        config.propagation.max_poll_failures,
        config.propagation.failure_counting
    );
}

/// Wire signal handling, address sources and the Route53 client together
async fn build_controller(config: SidecarConfig) -> Result<LifecycleController> {
    // Handlers go in before any change is submitted
    let (tx, rx) = termination::channel();
    spawn_signal_listener(tx)?;

    let mut resolver = AddressResolver::new();
    sidecar_metadata::register(&mut resolver).context("Failed to set up metadata sources")?;

    let client = Route53ChangeClient::from_env().await;
    info!("Using {:?}", client);

    let (controller, events) = LifecycleController::new(config, resolver, Box::new(client), rx)?;
    tokio::spawn(log_events(events));

    Ok(controller)
}

/// Forward termination signals to the controller
///
/// The listener task owns the only sender, so once it is done the
/// controller sees the channel as closed.
#[cfg(unix)]
fn spawn_signal_listener(tx: TerminationSender) -> Result<()> {
    let sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    tokio::spawn(forward_signals(tx, sigterm, sigint));
    Ok(())
}

#[cfg(unix)]
async fn forward_signals(tx: TerminationSender, mut sigterm: Signal, mut sigint: Signal) {
    loop {
        let received = tokio::select! {
            Some(()) = sigterm.recv() => TerminationSignal::Terminate,
            Some(()) = sigint.recv() => TerminationSignal::Interrupt,
            else => break,
        };

        info!("Received {}", received);
        if !tx.notify(received) {
            debug!("{} ignored, a termination request is already pending", received);
        }
    }
}

/// Fallback implementation for non-Unix platforms (CTRL-C only)
#[cfg(not(unix))]
fn spawn_signal_listener(tx: TerminationSender) -> Result<()> {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            info!("Received {}", TerminationSignal::Interrupt);
            tx.notify(TerminationSignal::Interrupt);
        }
    });
    Ok(())
}

/// Log lifecycle events at debug level
async fn log_events(mut events: mpsc::Receiver<LifecycleEvent>) {
    while let Some(event) = events.recv().await {
        debug!("Lifecycle event: {:?}", event);
    }
}
