//! Loopback relay harness - binds every configured device over a loopback host
//!
//! Usage:
//!   relay --config config/relay.toml
//!   relay --frames 1000 --log-level debug

use anyhow::{bail, Context, Result};
use clap::Parser;
use relays::types::{ControlRequest, DevicePowerState, Oid, Packet, PnpEvent};
use relays::{Adapter, LoopbackHost, RelayConfig, RelayDriver};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(about = "Pass-through relay driven over a loopback host")]
#[command(version)]
struct Args {
    /// Path to configuration file; a single `lower0` binding is used without one
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Frames to push through each adapter per phase
    #[arg(short, long, default_value_t = 64)]
    frames: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_logs: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    info!("Starting loopback relay");
    let config = load_config(&args)?;
    info!(
        bindings = config.bindings.len(),
        batch_capacity = config.receive.batch_capacity,
        "Configuration loaded"
    );

    let host = LoopbackHost::new();
    let driver = RelayDriver::register(host.clone(), config.clone())
        .context("relay registration failed")?;

    let mut adapters = Vec::new();
    let mut failed = Vec::new();
    for entry in &config.bindings {
        match driver.bind(&entry.device) {
            Ok(adapter) => adapters.push(adapter),
            Err(e) => {
                error!(device = %entry.device, error = %e, "Bind failed");
                failed.push(entry.device.clone());
            }
        }
    }

    for adapter in &adapters {
        exercise(&driver, adapter, args.frames)?;
    }

    for adapter in &adapters {
        let status = driver.unbind(adapter);
        info!(device = adapter.device(), %status, "Unbound");
    }
    driver.unload();
    host.join_workers();

    let counters = host.counters();
    info!(
        sends_completed = counters.sends_completed,
        send_failures = counters.send_failures,
        frames_echoed = counters.frames_echoed,
        packets_received = counters.packets_received,
        packets_returned = counters.packets_returned,
        receive_completes = counters.receive_completes,
        requests_completed = counters.requests_completed,
        pnp_events = counters.pnp_events,
        "Loopback run finished"
    );

    if !failed.is_empty() {
        bail!("{} adapter(s) failed to bind: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<RelayConfig> {
    match &args.config {
        Some(path) => {
            info!("Configuration: {}", path.display());
            RelayConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
        }
        None => Ok(RelayConfig::compact_defaults().with_binding("lower0", "relay0")),
    }
}

/// Traffic, a query and a full lower-edge power cycle on one adapter
fn exercise(driver: &RelayDriver, adapter: &Arc<Adapter>, frames: usize) -> Result<()> {
    push_frames(adapter, frames);
    query_link_speed(adapter);
    wait_for_drain(adapter)?;

    info!(device = adapter.device(), "Power cycling lower edge");
    driver.pnp_event(Some(adapter), PnpEvent::SetPower(DevicePowerState::D3));
    let dropped = push_frames(adapter, 1);
    driver.pnp_event(Some(adapter), PnpEvent::SetPower(DevicePowerState::D0));
    if dropped != 1 {
        warn!(device = adapter.device(), "Send accepted while lower edge was asleep");
    }

    push_frames(adapter, frames);
    wait_for_drain(adapter)?;
    info!(device = adapter.device(), snapshot = ?adapter.snapshot(), "Adapter exercised");
    Ok(())
}

/// Send `count` frames; returns how many were refused inline
fn push_frames(adapter: &Adapter, count: usize) -> usize {
    let mut refused = 0;
    for seq in 0..count {
        let mut frame = vec![0u8; 60];
        frame[..8].copy_from_slice(&(seq as u64).to_be_bytes());
        // Alternate so both the stacked and the wrapped path carry traffic
        let packet = if seq % 2 == 0 {
            Packet::from_frame(frame)
        } else {
            Packet::from_frame(frame).with_stack_remaining(0)
        };
        if !adapter.send(packet).is_pending() {
            refused += 1;
        }
    }
    refused
}

fn query_link_speed(adapter: &Adapter) {
    match adapter.submit_request(ControlRequest::query(Oid::GEN_LINK_SPEED, 4)) {
        Ok(submitted) => info!(device = adapter.device(), status = %submitted.status(), "Link speed query submitted"),
        Err(e) => warn!(device = adapter.device(), error = %e, "Link speed query refused"),
    }
}

fn wait_for_drain(adapter: &Adapter) -> Result<()> {
    let deadline = Instant::now() + DRAIN_TIMEOUT;
    while adapter.outstanding_sends() > 0 || adapter.request_outstanding() {
        if Instant::now() >= deadline {
            bail!("{} did not drain within {:?}", adapter.device(), DRAIN_TIMEOUT);
        }
        thread::sleep(Duration::from_millis(1));
    }
    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("invalid log level")?;

    if args.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    Ok(())
}
