//! `teleop-cli` – operator console for a remote vehicle.
//!
//! This binary wires the teleoperation client to a terminal. It:
//!
//! 1. Checks for `~/.teleop/config.toml`; runs a **First-Run Wizard** when the
//!    file is absent.
//! 2. Starts the client loop over a WebSocket link to the configured vehicle.
//! 3. Keeps a dashboard current from the event bus and prints advisories as
//!    they arrive.
//! 4. Drops the operator into an **interactive REPL** with slash-commands
//!    (`/connect`, `/drive`, `/look`, `/status`, `/help`, ...).
//! 5. Intercepts **Ctrl-C** to stop the vehicle, centre the camera and close
//!    the link before exiting.

mod config;
mod dashboard;
mod repl;

use colored::Colorize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, warn};

use teleop_middleware::WsTransport;
use teleop_runtime::{ClientHandle, OperatorInput, TeleopClient, init_tracing};

use crate::dashboard::{Dashboard, format_notification};

/// How long the loop gets to park the vehicle after the REPL exits.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG filters (default "info"); TELEOP_LOG_FORMAT=json switches to
    // newline-delimited JSON. Operator output still goes through println!.
    let _tracing = init_tracing("teleop");

    print_banner();

    // ── First-Run Wizard ──────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(None) => run_first_run_wizard(),
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start async runtime".red(), e);
            std::process::exit(1);
        }
    };

    // ── Client loop ───────────────────────────────────────────────────────
    let transport = WsTransport::new(cfg.server_url.clone())
        .with_io_timeout(Duration::from_secs(cfg.connect_timeout_secs.max(1)));
    let (client, handle) = match TeleopClient::new(transport, cfg.to_client_config()) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("{}: {}", "Failed to build client".red(), e);
            std::process::exit(1);
        }
    };
    let client_task = runtime.spawn(client.run());

    let dashboard = Arc::new(Mutex::new(Dashboard::default()));
    runtime.spawn(print_bus(handle.clone(), dashboard.clone()));

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let ctrlc_handle = handle.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping the vehicle …".yellow().bold());
        if ctrlc_handle.send(OperatorInput::Shutdown).is_ok() {
            println!("{}", "  ✓ Stop and camera-centre queued.".green());
        }
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; Ctrl-C will not stop the vehicle");
    }

    println!();
    println!("  Vehicle endpoint: {}", cfg.server_url.dimmed());
    println!(
        "  Type {} to dial it, {} for a list of commands.\n",
        "/connect".bold().cyan(),
        "/help".bold().cyan()
    );

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(&handle, &dashboard, cfg.to_client_config().movement.max_radius);

    // ── Shutdown ──────────────────────────────────────────────────────────
    let _ = handle.send(OperatorInput::Shutdown);
    runtime.block_on(async {
        match tokio::time::timeout(SHUTDOWN_GRACE, client_task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => error!(error = %e, "client loop ended with an error"),
            Ok(Err(e)) => error!(error = %e, "client loop panicked"),
            Err(_) => warn!("client loop did not stop in time"),
        }
    });
    println!("{}", "  ✓ Link closed. Goodbye.".green());
}

/// Fold every bus event into the dashboard and print advisories as toasts.
async fn print_bus(handle: ClientHandle, dashboard: Arc<Mutex<Dashboard>>) {
    let mut rx = handle.subscribe_all();
    while let Some(event) = rx.recv().await {
        let Ok(mut dash) = dashboard.lock() else {
            break;
        };
        if let Some(n) = dash.apply(&event) {
            println!("  {}", format_notification(n));
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║       Teleop First-Run Wizard        ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's point the console at a vehicle.\n");

    let mut cfg = config::Config::default();

    let url = prompt_line(
        &format!("  Vehicle WebSocket URL [{}]: ", cfg.server_url),
        &cfg.server_url,
    );
    cfg.server_url = url.trim().to_string();

    let url = prompt_line(
        &format!("  Status endpoint (blank to disable) [{}]: ", cfg.status_url),
        &cfg.status_url,
    );
    cfg.status_url = url.trim().to_string();

    let attempts = prompt_line(
        &format!("  Reconnect attempts before giving up [{}]: ", cfg.max_reconnect_attempts),
        &cfg.max_reconnect_attempts.to_string(),
    );
    if let Ok(n) = attempts.trim().parse::<u32>() {
        cfg.max_reconnect_attempts = n;
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"  ______     __                "#.bold().cyan());
    println!("{}", r#" /_  __/__  / /__ ___  ___     "#.bold().cyan());
    println!("{}", r#"  / / / -_)/ / -_) _ \/ _ \    "#.bold().cyan());
    println!("{}", r#" /_/  \__//_/\__/\___/ .__/    "#.bold().cyan());
    println!("{}", r#"                    /_/        "#.bold().cyan());
    println!();
    println!("  {} {}",
        "Teleop".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Remote Vehicle Operator Console");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => default.to_string(),
        Ok(_) if line.trim().is_empty() => default.to_string(),
        Ok(_) => line,
    }
}
