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

use std::time::{Duration, Instant};

use hc_core::constants::client;
use hc_core::DaemonClient;
use hc_protocol::{CpuInfo, EngineStatistics, PerformanceData, PerformanceState};

/// How long a status message stays visible
const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(3);

/// Dashboard application state
pub struct App {
    pub socket_path: String,
    client: Option<DaemonClient>,
    pub connected: bool,
    pub cpu_info: Option<CpuInfo>,
    pub perf: Option<PerformanceData>,
    pub stats: Option<EngineStatistics>,
    pub status_message: String,
    status_set_at: Option<Instant>,
    pub refresh_interval: Duration,
    pub last_refresh: Instant,
}

impl App {
    pub fn new(socket_path: String) -> Self {
        Self {
            socket_path,
            client: None,
            connected: false,
            cpu_info: None,
            perf: None,
            stats: None,
            status_message: String::new(),
            status_set_at: None,
            refresh_interval: Duration::from_millis(client::POLL_INTERVAL_MS),
            last_refresh: Instant::now(),
        }
    }

    fn ensure_client(&mut self) -> Option<&mut DaemonClient> {
        if self.client.is_none() {
            match DaemonClient::connect_to(&self.socket_path) {
                Ok(client) => {
                    self.client = Some(client);
                    self.connected = true;
                }
                Err(_) => {
                    self.connected = false;
                }
            }
        }
        self.client.as_mut()
    }

    fn drop_client(&mut self) {
        self.client = None;
        self.connected = false;
    }

    /// Poll the daemon for identity, telemetry and counters
    pub fn refresh(&mut self) {
        self.last_refresh = Instant::now();

        // Expire stale status messages
        if let Some(at) = self.status_set_at {
            if at.elapsed() >= STATUS_MESSAGE_TTL {
                self.status_message.clear();
                self.status_set_at = None;
            }
        }

        if self.cpu_info.is_none() {
            let Some(client) = self.ensure_client() else {
                return;
            };
            match client.cpu_info() {
                Ok(info) => self.cpu_info = Some(info),
                Err(_) => {
                    self.drop_client();
                    return;
                }
            }
        }

        let Some(client) = self.ensure_client() else {
            return;
        };
        match client.performance_data() {
            Ok(perf) => {
                self.perf = Some(perf);
                self.connected = true;
            }
            Err(_) => {
                self.drop_client();
                return;
            }
        }

        if let Some(client) = self.ensure_client() {
            if let Ok(stats) = client.statistics() {
                self.stats = Some(stats);
            }
        }
    }

    /// Request a performance state change and refresh telemetry
    pub fn set_state(&mut self, state: PerformanceState) {
        let result = match self.ensure_client() {
            Some(client) => client.set_state(state),
            None => {
                self.set_status(format!("Not connected to daemon at {}", self.socket_path));
                return;
            }
        };

        match result {
            Ok(()) => self.set_status(format!("Performance state set to {}", state.label())),
            Err(e) => {
                self.set_status(format!("State change failed: {}", e));
                self.drop_client();
            }
        }
        self.refresh();
    }

    /// Request a full engine reset and refresh everything
    pub fn reset(&mut self) {
        let result = match self.ensure_client() {
            Some(client) => client.reset(),
            None => {
                self.set_status(format!("Not connected to daemon at {}", self.socket_path));
                return;
            }
        };

        match result {
            Ok(()) => {
                self.set_status("Engine reset".to_string());
                // Identity may have been re-detected
                self.cpu_info = None;
            }
            Err(e) => {
                self.set_status(format!("Reset failed: {}", e));
                self.drop_client();
            }
        }
        self.refresh();
    }

    pub fn set_status(&mut self, message: String) {
        self.status_message = message;
        self.status_set_at = Some(Instant::now());
    }

    /// Current global state as reported by the last telemetry poll
    pub fn current_state(&self) -> Option<PerformanceState> {
        self.perf.map(|p| p.state)
    }
}
