//! Unified error handling for Hyperclock
//!
//! This crate provides a single error type used across all Hyperclock components.
//! It uses thiserror for ergonomic error definitions with proper Display and Error trait impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using ClockError
pub type Result<T> = std::result::Result<T, ClockError>;

/// Unified error type for all Hyperclock operations
#[derive(thiserror::Error, Debug)]
pub enum ClockError {
    // ============================================================================
    // Register Backend Errors
    // ============================================================================
    #[error("Unsupported register: {0:#x}")]
    UnsupportedRegister(u32),

    #[error("Hardware fault: {0}")]
    HardwareFault(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    // ============================================================================
    // Request Validation Errors
    // ============================================================================
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Buffer too small: need {required} bytes, got {provided}")]
    BufferTooSmall {
        required: usize,
        provided: usize,
    },

    #[error("Invalid request code: {0:#x}")]
    InvalidRequest(u32),

    // ============================================================================
    // I/O and Configuration Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    // ============================================================================
    // Daemon and IPC Errors
    // ============================================================================
    #[error("Daemon not available")]
    DaemonNotAvailable,

    #[error("Daemon connection failed: {0}")]
    DaemonConnection(String),

    #[error("Daemon request failed: {0}")]
    DaemonRequest(String),

    #[error("Daemon response error: {0}")]
    DaemonResponse(String),

    #[error("IPC protocol error: {0}")]
    IpcProtocol(String),

    #[error("Message too large: {size} bytes (max {max_size} bytes)")]
    MessageTooLarge {
        size: usize,
        max_size: usize,
    },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Generic(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl ClockError {
    /// Create a generic error from a string
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid-parameter error from a string
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Create a daemon error from a string
    pub fn daemon(msg: impl Into<String>) -> Self {
        Self::DaemonRequest(msg.into())
    }

    /// Create a hardware fault error from a string
    pub fn hardware(msg: impl Into<String>) -> Self {
        Self::HardwareFault(msg.into())
    }
}

// Allow converting from String to ClockError
impl From<String> for ClockError {
    fn from(s: String) -> Self {
        Self::Generic(s)
    }
}

// Allow converting from &str to ClockError
impl From<&str> for ClockError {
    fn from(s: &str) -> Self {
        Self::Generic(s.to_string())
    }
}
