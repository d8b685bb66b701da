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

//! Hyperclock terminal client library
//!
//! The binary in `main.rs` wires these modules to a terminal; they are
//! exported here so integration tests can drive them directly.

pub mod app;
pub mod events;
pub mod ui;
