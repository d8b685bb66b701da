//! Hyperclock Core Library
//!
//! A CPU performance state engine with a pluggable register backend.
//!
//! # Features
//!
//! - **Register Backend**: MSR-style register access and CPUID-style
//!   identification behind one trait, with a deterministic simulation
//! - **Topology Detection**: Vendor classification, core/thread counts and
//!   frequency range derived from identification words
//! - **Core State Table**: Fixed-capacity per-core records behind a single
//!   reader/writer lock
//! - **State Machine**: Performance state transitions driven per core through
//!   the register backend, with continue-on-error semantics
//! - **Dispatcher**: Buffer-contract request routing with operation counters
//! - **Daemon Client**: Typed Unix-socket client for hyperclockd
//!
//! # Module Structure
//!
//! - `registers` - Register backend trait and simulation
//! - `cpuid` - Pure identification-word decoding
//! - `topology` - One-shot processor detection
//! - `engine` - Core table, state machine, telemetry
//! - `dispatch` - Request dispatcher and statistics
//! - `config` - Daemon settings persistence
//! - `daemon_client` - Client for the daemon socket
//!
//! # Example
//!
//! ```
//! use hc_core::{Dispatcher, SimulatedRegisters};
//! use hc_protocol::PerformanceState;
//!
//! let dispatcher = Dispatcher::new(SimulatedRegisters::new());
//! let transition = dispatcher.engine().set_state(PerformanceState::Performance);
//! assert!(transition.fully_applied());
//! ```

pub mod config;
pub mod constants;
pub mod cpuid;
pub mod daemon_client;
pub mod dispatch;
pub mod engine;
pub mod registers;
pub mod topology;

#[cfg(test)]
mod test_utils;

// Re-export primary types
pub use daemon_client::DaemonClient;
pub use dispatch::Dispatcher;
pub use engine::{CoreRecord, Engine, EngineLimits, StateTransition};
pub use registers::{RegisterBackend, SimulatedRegisters};
pub use topology::{detect, ProcessorIdentity};

// Re-export error types
pub use hc_error::{ClockError, Result};
