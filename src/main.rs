/*
 * This file is part of Hyperclock.
 *
 * Copyright (C) 2025 Hyperclock contributors
 *
 * Hyperclock is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Hyperclock is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Hyperclock. If not, see <https://www.gnu.org/licenses/>.
 */

mod app;
mod events;
mod ui;

use std::io::stdout;

use crossterm::event::{self, Event};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::Terminal;

use app::App;
use events::handle_key_event;
use hc_core::constants::paths;
use hc_core::DaemonClient;
use hc_protocol::PerformanceState;
use ui::ui;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    println!("hyperclock {} - CPU performance state control", VERSION);
    println!();
    println!("USAGE:");
    println!("    hyperclock [--socket <PATH>] [COMMAND]");
    println!();
    println!("COMMANDS:");
    println!("    info             Print processor identification");
    println!("    perf             Print aggregated telemetry");
    println!("    set <STATE>      Apply a performance state (powersave|balanced|performance|extreme)");
    println!("    reset            Reinitialize the engine");
    println!("    stats            Print daemon operation counters");
    println!("    ping             Check daemon liveness");
    println!();
    println!("With no command, an interactive dashboard is started.");
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let mut socket_path = paths::SOCKET_PATH.to_string();
    let mut command: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                return Ok(());
            }
            "-v" | "--version" => {
                println!("hyperclock {}", VERSION);
                return Ok(());
            }
            "-s" | "--socket" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --socket requires a path argument");
                    std::process::exit(1);
                }
                socket_path = args[i].clone();
            }
            _ => command.push(args[i].clone()),
        }
        i += 1;
    }

    if !command.is_empty() {
        return run_command(&socket_path, &command);
    }

    // Terminal init
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, socket_path);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    Ok(())
}

fn run_app(
    terminal: &mut Terminal<ratatui::backend::CrosstermBackend<std::io::Stdout>>,
    socket_path: String,
) -> anyhow::Result<()> {
    let mut app = App::new(socket_path);
    app.refresh();

    loop {
        terminal.draw(|f| ui(f, &app))?;

        let timeout = app
            .refresh_interval
            .saturating_sub(app.last_refresh.elapsed());
        if event::poll(timeout).unwrap_or(false) {
            if let Event::Key(key_event) = event::read()? {
                if handle_key_event(&mut app, key_event)? {
                    return Ok(());
                }
            }
        }

        if app.last_refresh.elapsed() >= app.refresh_interval {
            app.refresh();
        }
    }
}

fn run_command(socket_path: &str, command: &[String]) -> anyhow::Result<()> {
    let mut client = DaemonClient::connect_to(socket_path).map_err(|e| {
        anyhow::anyhow!("Could not reach hyperclockd at {}: {}", socket_path, e)
    })?;

    match command[0].as_str() {
        "info" => {
            let info = client.cpu_info()?;
            println!("Vendor:        {} ({})", info.vendor, info.architecture.label());
            if !info.brand.is_empty() {
                println!("Brand:         {}", info.brand);
            }
            println!("Cores:         {}", info.core_count);
            println!("Threads:       {}", info.thread_count);
            println!("Base:          {} MHz", info.base_frequency_mhz);
            println!("Max:           {} MHz", info.max_frequency_mhz);
            println!("Core 0:        {} MHz", info.current_frequency_mhz);
            println!("SMT:           {}", if info.hyperthreading { "yes" } else { "no" });
            println!("Turbo:         {}", if info.turbo_boost { "enabled" } else { "disabled" });
        }
        "perf" => {
            let perf = client.performance_data()?;
            println!("State:         {}", perf.state.label());
            println!("Usage:         {}%", perf.usage_percent);
            println!("Temperature:   {}°C", perf.temperature_c);
            println!("Power:         {} W", perf.power_watts);
            println!("Frequency:     {} MHz", perf.current_frequency_mhz);
            println!("Voltage:       {:.2} V", perf.voltage_mv as f32 / 1000.0);
        }
        "set" => {
            let Some(name) = command.get(1) else {
                eprintln!("Usage: hyperclock set <powersave|balanced|performance|extreme>");
                std::process::exit(1);
            };
            let state: PerformanceState = match name.parse() {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
            };
            client.set_state(state)?;
            println!("Performance state set to {}", state.label());
        }
        "reset" => {
            client.reset()?;
            println!("Engine reset");
        }
        "stats" => {
            let stats = client.statistics()?;
            println!("Total operations:  {}", stats.total_operations);
            println!("Failed operations: {}", stats.failed_operations);
        }
        "ping" => {
            client.ping()?;
            println!("pong ({})", client.version()?);
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_help();
            std::process::exit(1);
        }
    }

    Ok(())
}
