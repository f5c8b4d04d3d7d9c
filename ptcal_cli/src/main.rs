#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod calibrate;
mod cli;
mod error_fmt;
mod links;
mod test_mode;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE, json_mode};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = run(cli) {
        if json_mode() {
            println!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        tracing::error!(error = ?e, "command failed");
        std::process::exit(exit_code_for_error(&e));
    }
}

fn init_tracing(json: bool, level: Option<&str>, logging: &ptcal_config::Logging) {
    let level = level.or(logging.level.as_deref()).unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Console logs go to stderr so stdout stays clean for results and JSONL
    let json_console = json.then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(false)
    });
    let text_console = (!json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    let file_layer = logging.file.as_deref().map(|path| {
        let path = std::path::Path::new(path);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "ptcal.log".into(), |n| n.to_string_lossy().into_owned());
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        fmt::layer().json().with_writer(writer).with_ansi(false)
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(json_console)
        .with(text_console)
        .with(file_layer)
        .try_init();
}

fn run(cli: Cli) -> eyre::Result<()> {
    let cfg = ptcal_config::load_file(&cli.config)?;
    cfg.validate().wrap_err("invalid configuration")?;
    init_tracing(cli.json, cli.log_level.as_deref(), &cfg.logging);
    tracing::debug!(config = %cli.config.display(), banks = cfg.banks.len(), "config loaded");

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        if let Err(e) = ctrlc::set_handler(move || {
            if flag.swap(true, Ordering::SeqCst) {
                // Second Ctrl-C: stop waiting for the set-point to finish
                std::process::exit(130);
            }
            eprintln!("\nstopping after the current set-point (Ctrl-C again to quit now)");
        }) {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        }
    }

    match cli.cmd {
        Commands::Calibrate { pressures, no_fit } => {
            calibrate::run_calibrate(&cfg, &pressures, no_fit, &shutdown)
        }
        Commands::Test {
            bank,
            count,
            sim_pressure,
        } => test_mode::run_test(&cfg, bank.as_deref(), count, sim_pressure),
        Commands::Show { bank } => test_mode::run_show(&cfg, bank.as_deref()),
        Commands::Refit { bank, input, save } => test_mode::run_refit(&cfg, &bank, input, save),
        Commands::Ports => {
            let ports = links::list_ports()?;
            if json_mode() {
                println!("{}", serde_json::json!({ "event": "ports", "ports": ports }));
            } else if ports.is_empty() {
                println!("no serial ports found");
            } else {
                for p in ports {
                    println!("{p}");
                }
            }
            Ok(())
        }
        Commands::SelfCheck => test_mode::run_self_check(&cfg),
    }
}
