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

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::App;
use hc_protocol::PerformanceState;

/// Main event handler that processes keyboard input.
/// Returns Ok(true) when the application should exit.
pub fn handle_key_event(app: &mut App, key_event: KeyEvent) -> anyhow::Result<bool> {
    let KeyEvent { code, modifiers, .. } = key_event;

    if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
        return Ok(true);
    }

    match code {
        KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
        KeyCode::Char('1') => app.set_state(PerformanceState::PowerSave),
        KeyCode::Char('2') => app.set_state(PerformanceState::Balanced),
        KeyCode::Char('3') => app.set_state(PerformanceState::Performance),
        KeyCode::Char('4') => app.set_state(PerformanceState::Extreme),
        KeyCode::Char('r') => app.reset(),
        KeyCode::Char('i') => app.refresh(),
        _ => {}
    }

    Ok(false)
}
