//! Hyperclock Daemon (hyperclockd)
//!
//! A hardened service that owns the performance state engine and exposes it
//! to unprivileged clients over a Unix domain socket.
//!
//! # Security Model
//! - **Socket**: Unix domain socket, symlink attack prevention on bind
//! - **Audit**: Peer credential logging (UID/GID/PID) for all operations
//! - **Limits**: Connection limits, message size limits, per-uid rate limiting
//! - **Isolation**: Restrictive umask, working directory set to /
//! - **Signals**: Graceful shutdown with socket cleanup
//!
//! The register backend is the deterministic simulation; a hardware-backed
//! implementation of the same trait can be swapped in without touching the
//! server or the engine.

mod server;

use std::sync::Arc;

use tracing::{error, info};

use hc_core::config::{load_settings, load_settings_from, DaemonSettings};
use hc_core::{Dispatcher, EngineLimits, SimulatedRegisters};
use hc_protocol::PerformanceState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    println!("hyperclockd {} - Hyperclock CPU performance state daemon", VERSION);
    println!();
    println!("USAGE:");
    println!("    hyperclockd [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -s, --socket <PATH>    Listen on PATH instead of the configured socket");
    println!("    -c, --config <PATH>    Load settings from PATH instead of /etc/hyperclock/daemon.json");
    println!("    -v, --version          Print version and exit");
    println!("    -h, --help             Print this help and exit");
}

fn set_secure_umask() {
    // SAFETY: umask only swaps the process file mode creation mask
    unsafe {
        libc::umask(0o077);
    }
}

fn secure_working_directory() {
    if let Err(e) = std::env::set_current_dir("/") {
        eprintln!("Warning: could not change working directory to /: {}", e);
    }
}

fn init_logging(default_filter: &str) {
    let filter = std::env::var("HYPERCLOCK_LOG").unwrap_or_else(|_| default_filter.to_string());

    // Prefer journald on systemd systems, fall back to stdout
    let journald_available = std::path::Path::new("/run/systemd/journal/socket").exists();
    if journald_available {
        match tracing_journald::layer() {
            Ok(journald_layer) => {
                use tracing_subscriber::prelude::*;
                tracing_subscriber::registry()
                    .with(journald_layer)
                    .with(tracing_subscriber::EnvFilter::new(&filter))
                    .init();
                return;
            }
            Err(e) => {
                eprintln!("Failed to create journald layer: {}, falling back to stdout", e);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(filter.as_str())
        .init();
}

/// Apply the configured limits and startup state to a freshly built engine
fn apply_settings<B: hc_core::RegisterBackend>(
    dispatcher: &Dispatcher<B>,
    settings: &DaemonSettings,
) {
    dispatcher.engine().configure_limits(EngineLimits {
        thermal_limit_c: settings.thermal_limit_c,
        power_limit_w: settings.power_limit_w,
        turbo_enabled: settings.turbo_boost,
    });
    if settings.default_state != PerformanceState::Balanced {
        let transition = dispatcher.engine().set_state(settings.default_state);
        info!(
            state = settings.default_state.label(),
            applied = transition.cores_applied,
            "Startup performance state applied"
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    set_secure_umask();
    secure_working_directory();

    let args: Vec<String> = std::env::args().collect();
    let mut socket_override: Option<String> = None;
    let mut config_override: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                return Ok(());
            }
            "-v" | "--version" => {
                println!("hyperclockd {}", VERSION);
                return Ok(());
            }
            "-s" | "--socket" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --socket requires a path argument");
                    std::process::exit(1);
                }
                socket_override = Some(args[i].clone());
            }
            "-c" | "--config" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_override = Some(args[i].clone());
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let settings = match &config_override {
        Some(path) => load_settings_from(std::path::Path::new(path)),
        None => load_settings(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to load settings: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&settings.log_filter);

    info!("STARTUP: hyperclockd {} starting", VERSION);
    info!("STARTUP: PID: {}", std::process::id());

    let socket_path = socket_override.unwrap_or_else(|| settings.socket_path.clone());
    info!("STARTUP: Socket path: {}", socket_path);

    let dispatcher = Arc::new(Dispatcher::new(SimulatedRegisters::new()));
    apply_settings(&dispatcher, &settings);

    let identity = dispatcher.engine().identity();
    info!(
        "STARTUP: Detected {} ({} cores / {} threads, {}-{} MHz)",
        if identity.vendor.is_empty() { "unknown processor" } else { identity.vendor.as_str() },
        identity.core_count,
        identity.thread_count,
        identity.base_frequency_mhz,
        identity.max_frequency_mhz
    );

    let result = server::run_server(&socket_path, dispatcher, settings).await;

    if let Err(e) = result {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
