//! portwatch: TCP listening-port monitor.
//!
//! This is the main entry point for the portwatch binary. It handles CLI
//! argument parsing, configuration loading, and dispatches to the `list`
//! (one scan, print the table) or `watch` (poll and print deltas) commands.
//!
//! The binary is a thin consumer of the engine: everything it prints is
//! rendered from structured `Snapshot`/`Delta` values. A failed scan is
//! reported on stderr, distinct from the legitimate "no listening ports"
//! state on stdout.

use anyhow::{Context, Result};
use clap::Parser;
use portwatch::{
    cli::{Cli, Commands},
    config::{Config, ConfigLoader},
    monitor::{self, Delta, MonitorEvent},
};
use tracing::{debug, info, warn};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose)?;
    debug!("Parsed CLI arguments: {:?}", cli);

    let config = ConfigLoader::new()
        .load(&cli)
        .context("Failed to load configuration")?;
    debug!("Loaded configuration: {:?}", config);

    match cli.command {
        Commands::List => run_list(&config),
        Commands::Watch { .. } => run_watch(&config),
    }
}

/// Scan once and print the current listening ports.
fn run_list(config: &Config) -> Result<()> {
    let mut scanner = monitor::native_scanner(config.monitor.family)
        .context("No TCP table source for this platform")?;
    let snapshot = scanner.scan_once().context("Scan failed")?;

    if snapshot.is_empty() {
        println!("No listening ports.");
        return Ok(());
    }

    println!("{:>5}  {:>8}  NAME", "PORT", "PID");
    for entry in snapshot.iter() {
        println!("{:>5}  {:>8}  {}", entry.port, entry.pid, entry.process_name);
    }
    Ok(())
}

/// Poll for changes and print them until Ctrl-C.
fn run_watch(config: &Config) -> Result<()> {
    tokio::runtime::Runtime::new()
        .context("Failed to start async runtime")?
        .block_on(watch_loop(config))
}

async fn watch_loop(config: &Config) -> Result<()> {
    let mut scanner = monitor::native_scanner(config.monitor.family)
        .context("No TCP table source for this platform")?;

    // Seed the baseline so the first interval tick reports changes instead
    // of silently establishing one. A failed seed is not fatal: the loop
    // will establish its own baseline on the first tick that succeeds.
    let monitor = match scanner.scan_once() {
        Ok(baseline) => {
            info!(ports = baseline.len(), "baseline established");
            monitor::Monitor::new(scanner, config.monitor.poll_interval()).with_baseline(baseline)
        }
        Err(err) => {
            warn!(error = %err, "baseline scan failed, starting without one");
            monitor::Monitor::new(scanner, config.monitor.poll_interval())
        }
    };

    let (handle, mut events) = monitor.start();
    println!(
        "Watching TCP listeners every {} ms (Ctrl-C to stop)...",
        config.monitor.interval_ms
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping monitor");
                break;
            }
            event = events.recv() => match event {
                Some(MonitorEvent::Delta(delta)) => print_delta(&delta),
                Some(MonitorEvent::ScanFailed(err)) => eprintln!("scan failed: {err}"),
                None => break,
            }
        }
    }

    handle.stop().await;
    Ok(())
}

fn print_delta(delta: &Delta) {
    for entry in &delta.added {
        println!("+ {:>5}  {} (pid {})", entry.port, entry.process_name, entry.pid);
    }
    for port in &delta.removed {
        println!("- {:>5}", port);
    }
}

/// Initialize the tracing subscriber.
///
/// # Verbosity Levels
/// - 0 (default): Only warnings and errors
/// - 1 (-v): Info level
/// - 2 (-vv): Debug level
/// - 3+ (-vvv): Trace level
fn init_tracing(verbose: u8) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
