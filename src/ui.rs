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

use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::widgets::{Block, BorderType, Borders, Gauge, Paragraph};

use crate::app::App;
use hc_protocol::PerformanceState;

pub fn ui(f: &mut Frame, app: &App) {
    let size = f.area();

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // header
            Constraint::Length(10), // cpu info + telemetry
            Constraint::Length(3),  // state selector
            Constraint::Min(1),     // status message
            Constraint::Length(1),  // help line
        ])
        .split(size);

    draw_header(f, app, rows[0]);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);
    draw_cpu_info(f, app, middle[0]);
    draw_telemetry(f, app, middle[1]);

    draw_state_bar(f, app, rows[2]);
    draw_status(f, app, rows[3]);

    let help = Paragraph::new("1 power save | 2 balanced | 3 performance | 4 extreme | r reset | q quit")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(help, rows[4]);
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let (status, color) = if app.connected {
        ("Connected", Color::Green)
    } else {
        ("Not Connected", Color::Red)
    };
    let line = Line::from(vec![
        Span::styled(" Hyperclock ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("- CPU performance control   "),
        Span::styled(status, Style::default().fg(color)),
        Span::raw(format!("   ({})", app.socket_path)),
    ]);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded);
    f.render_widget(Paragraph::new(line).block(block), area);
}

fn draw_cpu_info(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(" Processor ");

    let mut lines: Vec<Line> = Vec::new();
    match &app.cpu_info {
        Some(info) => {
            let name = if info.brand.is_empty() {
                info.vendor.clone()
            } else {
                info.brand.clone()
            };
            lines.push(Line::from(format!("Name:     {}", name)));
            lines.push(Line::from(format!("Vendor:   {} ({})", info.vendor, info.architecture.label())));
            lines.push(Line::from(format!(
                "Topology: {} cores / {} threads",
                info.core_count, info.thread_count
            )));
            lines.push(Line::from(format!(
                "Base:     {} MHz   Max: {} MHz",
                info.base_frequency_mhz, info.max_frequency_mhz
            )));
            lines.push(Line::from(format!("Core 0:   {} MHz", info.current_frequency_mhz)));
            lines.push(Line::from(format!(
                "SMT: {}   Turbo: {}",
                if info.hyperthreading { "yes" } else { "no" },
                if info.turbo_boost { "yes" } else { "no" }
            )));
        }
        None => lines.push(Line::from("(no data - daemon unreachable)")),
    }
    if let Some(stats) = &app.stats {
        lines.push(Line::from(format!(
            "Ops: {} total / {} failed",
            stats.total_operations, stats.failed_operations
        )));
    }

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_telemetry(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(" Telemetry ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(perf) = &app.perf else {
        f.render_widget(Paragraph::new("(no data - daemon unreachable)"), inner);
        return;
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(inner);

    let usage = Gauge::default()
        .gauge_style(Style::default().fg(Color::Cyan))
        .label(format!("Usage {}%", perf.usage_percent))
        .percent(perf.usage_percent.min(100) as u16);
    f.render_widget(usage, rows[0]);

    let temp = Gauge::default()
        .gauge_style(Style::default().fg(if perf.temperature_c >= 85 {
            Color::Red
        } else {
            Color::Yellow
        }))
        .label(format!("Temp {}°C", perf.temperature_c))
        .percent(perf.temperature_c.min(100) as u16);
    f.render_widget(temp, rows[1]);

    let freq = Paragraph::new(format!("Frequency: {} MHz (mean)", perf.current_frequency_mhz));
    f.render_widget(freq, rows[2]);

    let power = Paragraph::new(format!(
        "Power: {} W   Voltage: {:.2} V",
        perf.power_watts,
        perf.voltage_mv as f32 / 1000.0
    ));
    f.render_widget(power, rows[3]);
}

fn draw_state_bar(f: &mut Frame, app: &App, area: Rect) {
    let current = app.current_state();
    let mut spans: Vec<Span> = Vec::new();
    for (i, state) in PerformanceState::ALL.iter().enumerate() {
        let label = format!(" {} {} ", i + 1, state.label());
        if Some(*state) == current {
            spans.push(Span::styled(
                label,
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ));
        } else {
            spans.push(Span::raw(label));
        }
        spans.push(Span::raw(" "));
    }
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(" Performance State ");
    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn draw_status(f: &mut Frame, app: &App, area: Rect) {
    let style = if app.status_message.contains("failed") || app.status_message.contains("Not connected") {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::Green)
    };
    let status = Paragraph::new(app.status_message.as_str()).style(style);
    f.render_widget(status, area);
}
