//! Daemon Client
//!
//! Communicates with the privileged hyperclockd daemon via Unix socket.
//! Provides a safe, typed interface to the engine without requiring the
//! caller to hold any privileges itself.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::time::Duration;

use hc_error::{ClockError, Result};
use hc_protocol::{
    CpuInfo, EngineStatistics, PerformanceData, PerformanceState, Request, RequestEnvelope,
    Response, ResponseData, ResponseEnvelope, MAX_MESSAGE_SIZE,
};

use crate::constants::{client, paths};

/// Blocking JSON-lines client for the daemon socket
pub struct DaemonClient {
    reader: BufReader<UnixStream>,
    writer: UnixStream,
}

impl DaemonClient {
    /// Connect to the default daemon socket
    pub fn connect() -> Result<Self> {
        Self::connect_to(paths::SOCKET_PATH)
    }

    /// Connect to an explicit socket path with read/write timeouts applied
    pub fn connect_to(socket_path: &str) -> Result<Self> {
        let stream = UnixStream::connect(socket_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound
                || e.kind() == std::io::ErrorKind::ConnectionRefused
            {
                ClockError::DaemonNotAvailable
            } else {
                ClockError::DaemonConnection(format!("{}: {}", socket_path, e))
            }
        })?;

        let timeout = Some(Duration::from_millis(client::TIMEOUT_MS));
        stream
            .set_read_timeout(timeout)
            .map_err(|e| ClockError::DaemonConnection(e.to_string()))?;
        stream
            .set_write_timeout(timeout)
            .map_err(|e| ClockError::DaemonConnection(e.to_string()))?;

        let writer = stream
            .try_clone()
            .map_err(|e| ClockError::DaemonConnection(e.to_string()))?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
        })
    }

    /// Send one request and wait for its correlated response
    pub fn request(&mut self, request: Request) -> Result<ResponseData> {
        request.validate().map_err(ClockError::InvalidParameter)?;

        let envelope = RequestEnvelope::new(request);
        let mut line = serde_json::to_string(&envelope)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;

        let mut response_line = String::with_capacity(256);
        let n = self.reader.read_line(&mut response_line)?;
        if n == 0 {
            return Err(ClockError::DaemonConnection(
                "daemon closed the connection".to_string(),
            ));
        }
        if response_line.len() > MAX_MESSAGE_SIZE {
            return Err(ClockError::MessageTooLarge {
                size: response_line.len(),
                max_size: MAX_MESSAGE_SIZE,
            });
        }

        let response: ResponseEnvelope = serde_json::from_str(response_line.trim())
            .map_err(|e| ClockError::DaemonResponse(format!("invalid response: {}", e)))?;
        if response.id != envelope.id {
            return Err(ClockError::IpcProtocol(format!(
                "response id {} does not match request id {}",
                response.id, envelope.id
            )));
        }

        match response.response {
            Response::Ok(data) => Ok(data),
            Response::Error { message } => Err(ClockError::DaemonRequest(message)),
        }
    }

    /// Liveness probe
    pub fn ping(&mut self) -> Result<()> {
        let data = self.request(Request::Ping)?;
        match data.value.as_deref() {
            Some("pong") => Ok(()),
            other => Err(ClockError::DaemonResponse(format!(
                "unexpected ping reply: {:?}",
                other
            ))),
        }
    }

    /// Daemon version string
    pub fn version(&mut self) -> Result<String> {
        let data = self.request(Request::Version)?;
        data.value
            .ok_or_else(|| ClockError::DaemonResponse("missing version".to_string()))
    }

    /// Processor identification and flags
    pub fn cpu_info(&mut self) -> Result<CpuInfo> {
        let data = self.request(Request::GetCpuInfo)?;
        data.cpu_info
            .ok_or_else(|| ClockError::DaemonResponse("missing cpu info".to_string()))
    }

    /// Aggregated telemetry
    pub fn performance_data(&mut self) -> Result<PerformanceData> {
        let data = self.request(Request::GetPerformanceData)?;
        data.performance
            .ok_or_else(|| ClockError::DaemonResponse("missing performance data".to_string()))
    }

    /// Apply a performance state to all cores
    pub fn set_state(&mut self, state: PerformanceState) -> Result<()> {
        self.request(Request::SetPerformanceState {
            state: u32::from(state),
        })?;
        Ok(())
    }

    /// Reinitialize the engine
    pub fn reset(&mut self) -> Result<()> {
        self.request(Request::Reset)?;
        Ok(())
    }

    /// Dispatcher operation counters
    pub fn statistics(&mut self) -> Result<EngineStatistics> {
        let data = self.request(Request::GetStatistics)?;
        data.statistics
            .ok_or_else(|| ClockError::DaemonResponse("missing statistics".to_string()))
    }
}
