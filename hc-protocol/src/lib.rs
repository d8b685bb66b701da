use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global request ID counter for correlation
static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Maximum message size for IPC (8KB)
pub const MAX_MESSAGE_SIZE: usize = 8 * 1024;

/// Generate a unique request ID for correlation
pub fn generate_request_id() -> u64 {
    REQUEST_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

// ============================================================================
// Performance States and Architectures
// ============================================================================

/// Coarse operating point applied to all cores at once.
///
/// The discriminants are the wire encoding (0 = power save .. 3 = extreme).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceState {
    PowerSave = 0,
    #[default]
    Balanced = 1,
    Performance = 2,
    Extreme = 3,
}

impl PerformanceState {
    /// All states in wire-code order
    pub const ALL: [PerformanceState; 4] = [
        PerformanceState::PowerSave,
        PerformanceState::Balanced,
        PerformanceState::Performance,
        PerformanceState::Extreme,
    ];

    /// Human-readable label used by the client UI
    pub fn label(&self) -> &'static str {
        match self {
            PerformanceState::PowerSave => "Power Save",
            PerformanceState::Balanced => "Balanced",
            PerformanceState::Performance => "Performance",
            PerformanceState::Extreme => "Extreme",
        }
    }
}

impl TryFrom<u32> for PerformanceState {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, u32> {
        match value {
            0 => Ok(PerformanceState::PowerSave),
            1 => Ok(PerformanceState::Balanced),
            2 => Ok(PerformanceState::Performance),
            3 => Ok(PerformanceState::Extreme),
            other => Err(other),
        }
    }
}

impl From<PerformanceState> for u32 {
    fn from(state: PerformanceState) -> u32 {
        state as u32
    }
}

impl FromStr for PerformanceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "powersave" | "power_save" | "0" => Ok(PerformanceState::PowerSave),
            "balanced" | "1" => Ok(PerformanceState::Balanced),
            "performance" | "2" => Ok(PerformanceState::Performance),
            "extreme" | "3" => Ok(PerformanceState::Extreme),
            other => Err(format!(
                "Unknown performance state: {:?} (expected powersave, balanced, performance or extreme)",
                other
            )),
        }
    }
}

impl fmt::Display for PerformanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Detected processor architecture family
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CpuArchitecture {
    #[default]
    Unknown = 0,
    Intel = 1,
    Amd = 2,
    Arm = 3,
}

impl CpuArchitecture {
    pub fn label(&self) -> &'static str {
        match self {
            CpuArchitecture::Unknown => "Unknown",
            CpuArchitecture::Intel => "Intel",
            CpuArchitecture::Amd => "AMD",
            CpuArchitecture::Arm => "ARM",
        }
    }
}

impl From<u32> for CpuArchitecture {
    fn from(value: u32) -> Self {
        match value {
            1 => CpuArchitecture::Intel,
            2 => CpuArchitecture::Amd,
            3 => CpuArchitecture::Arm,
            _ => CpuArchitecture::Unknown,
        }
    }
}

impl From<CpuArchitecture> for u32 {
    fn from(arch: CpuArchitecture) -> u32 {
        arch as u32
    }
}

// ============================================================================
// Engine Request Codes
// ============================================================================

/// Numeric request codes for the engine dispatcher.
///
/// Codes pack a device type, an access class, a function number and a
/// transfer method: `device << 16 | access << 14 | function << 2 | method`.
pub mod codes {
    const DEVICE_TYPE: u32 = 0x8880;

    pub const METHOD_BUFFERED: u32 = 0;
    pub const ACCESS_ANY: u32 = 0;
    pub const ACCESS_WRITE_DATA: u32 = 2;

    pub const fn control_code(function: u32, method: u32, access: u32) -> u32 {
        (DEVICE_TYPE << 16) | (access << 14) | (function << 2) | method
    }

    pub const GET_CPU_INFO: u32 = control_code(0x800, METHOD_BUFFERED, ACCESS_ANY);
    pub const GET_PERFORMANCE_DATA: u32 = control_code(0x801, METHOD_BUFFERED, ACCESS_ANY);
    pub const SET_PERFORMANCE_STATE: u32 = control_code(0x802, METHOD_BUFFERED, ACCESS_WRITE_DATA);
    pub const RESET_ENGINE: u32 = control_code(0x803, METHOD_BUFFERED, ACCESS_WRITE_DATA);

    pub fn request_name(code: u32) -> &'static str {
        match code {
            GET_CPU_INFO => "GetCpuInfo",
            GET_PERFORMANCE_DATA => "GetPerformanceData",
            SET_PERFORMANCE_STATE => "SetPerformanceState",
            RESET_ENGINE => "Reset",
            _ => "Unknown",
        }
    }
}

// ============================================================================
// Fixed Wire Layouts
// ============================================================================

/// Wire size of the CPU info response structure
pub const CPU_INFO_WIRE_SIZE: usize = 88;

/// Wire size of the performance data response structure
pub const PERFORMANCE_DATA_WIRE_SIZE: usize = 24;

/// Wire size of the set-performance-state request payload
pub const SET_STATE_WIRE_SIZE: usize = 4;

/// Maximum visible vendor string length (excluding terminator)
pub const VENDOR_STRING_LEN: usize = 12;

/// Maximum visible brand string length (excluding terminator)
pub const BRAND_STRING_LEN: usize = 48;

fn write_fixed_str(dest: &mut [u8], s: &str) {
    let bytes = s.as_bytes();
    let visible = dest.len() - 1;
    let n = bytes.len().min(visible);
    dest[..n].copy_from_slice(&bytes[..n]);
    for b in dest[n..].iter_mut() {
        *b = 0;
    }
}

fn read_fixed_str(src: &[u8]) -> String {
    let end = src.iter().position(|b| *b == 0).unwrap_or(src.len());
    String::from_utf8_lossy(&src[..end]).into_owned()
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

/// Processor identification response.
///
/// Fixed little-endian layout (88 bytes):
/// vendor[13], brand[49], architecture:u32, core_count:u32, thread_count:u32,
/// base_frequency_mhz:u32, max_frequency_mhz:u32, current_frequency_mhz:u32,
/// hyperthreading:u8, turbo_boost:u8.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CpuInfo {
    pub vendor: String,
    pub brand: String,
    pub architecture: CpuArchitecture,
    pub core_count: u32,
    pub thread_count: u32,
    pub base_frequency_mhz: u32,
    pub max_frequency_mhz: u32,
    pub current_frequency_mhz: u32,
    pub hyperthreading: bool,
    pub turbo_boost: bool,
}

impl CpuInfo {
    pub const WIRE_SIZE: usize = CPU_INFO_WIRE_SIZE;

    pub fn to_wire(&self) -> [u8; CPU_INFO_WIRE_SIZE] {
        let mut buf = [0u8; CPU_INFO_WIRE_SIZE];
        write_fixed_str(&mut buf[0..13], &self.vendor);
        write_fixed_str(&mut buf[13..62], &self.brand);
        buf[62..66].copy_from_slice(&u32::from(self.architecture).to_le_bytes());
        buf[66..70].copy_from_slice(&self.core_count.to_le_bytes());
        buf[70..74].copy_from_slice(&self.thread_count.to_le_bytes());
        buf[74..78].copy_from_slice(&self.base_frequency_mhz.to_le_bytes());
        buf[78..82].copy_from_slice(&self.max_frequency_mhz.to_le_bytes());
        buf[82..86].copy_from_slice(&self.current_frequency_mhz.to_le_bytes());
        buf[86] = self.hyperthreading as u8;
        buf[87] = self.turbo_boost as u8;
        buf
    }

    pub fn from_wire(buf: &[u8]) -> Result<Self, String> {
        if buf.len() < CPU_INFO_WIRE_SIZE {
            return Err(format!(
                "CPU info buffer too short: {} < {}",
                buf.len(),
                CPU_INFO_WIRE_SIZE
            ));
        }
        Ok(Self {
            vendor: read_fixed_str(&buf[0..13]),
            brand: read_fixed_str(&buf[13..62]),
            architecture: CpuArchitecture::from(read_u32(buf, 62)),
            core_count: read_u32(buf, 66),
            thread_count: read_u32(buf, 70),
            base_frequency_mhz: read_u32(buf, 74),
            max_frequency_mhz: read_u32(buf, 78),
            current_frequency_mhz: read_u32(buf, 82),
            hyperthreading: buf[86] != 0,
            turbo_boost: buf[87] != 0,
        })
    }
}

/// Aggregated telemetry response.
///
/// Fixed little-endian layout (24 bytes): state, usage, temperature,
/// power, current frequency, voltage — six u32 fields.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PerformanceData {
    pub state: PerformanceState,
    pub usage_percent: u32,
    pub temperature_c: u32,
    pub power_watts: u32,
    pub current_frequency_mhz: u32,
    pub voltage_mv: u32,
}

impl PerformanceData {
    pub const WIRE_SIZE: usize = PERFORMANCE_DATA_WIRE_SIZE;

    pub fn to_wire(&self) -> [u8; PERFORMANCE_DATA_WIRE_SIZE] {
        let mut buf = [0u8; PERFORMANCE_DATA_WIRE_SIZE];
        buf[0..4].copy_from_slice(&u32::from(self.state).to_le_bytes());
        buf[4..8].copy_from_slice(&self.usage_percent.to_le_bytes());
        buf[8..12].copy_from_slice(&self.temperature_c.to_le_bytes());
        buf[12..16].copy_from_slice(&self.power_watts.to_le_bytes());
        buf[16..20].copy_from_slice(&self.current_frequency_mhz.to_le_bytes());
        buf[20..24].copy_from_slice(&self.voltage_mv.to_le_bytes());
        buf
    }

    pub fn from_wire(buf: &[u8]) -> Result<Self, String> {
        if buf.len() < PERFORMANCE_DATA_WIRE_SIZE {
            return Err(format!(
                "Performance data buffer too short: {} < {}",
                buf.len(),
                PERFORMANCE_DATA_WIRE_SIZE
            ));
        }
        let state = PerformanceState::try_from(read_u32(buf, 0))
            .map_err(|v| format!("Invalid performance state on wire: {}", v))?;
        Ok(Self {
            state,
            usage_percent: read_u32(buf, 4),
            temperature_c: read_u32(buf, 8),
            power_watts: read_u32(buf, 12),
            current_frequency_mhz: read_u32(buf, 16),
            voltage_mv: read_u32(buf, 20),
        })
    }
}

/// Dispatcher operation counters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineStatistics {
    pub total_operations: u64,
    pub failed_operations: u64,
}

// ============================================================================
// IPC Envelopes
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Unique request ID for correlation and debugging
    pub id: u64,
    /// The actual request
    #[serde(flatten)]
    pub request: Request,
}

impl RequestEnvelope {
    pub fn new(request: Request) -> Self {
        Self {
            id: generate_request_id(),
            request,
        }
    }

    pub fn with_id(request: Request, id: u64) -> Self {
        Self { id, request }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "data")]
pub enum Request {
    Ping,
    Version,
    GetCpuInfo,
    GetPerformanceData,
    SetPerformanceState { state: u32 },
    Reset,
    GetStatistics,
}

impl Request {
    /// Validate request parameters before sending to daemon
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Request::Ping
            | Request::Version
            | Request::GetCpuInfo
            | Request::GetPerformanceData
            | Request::Reset
            | Request::GetStatistics => Ok(()),

            Request::SetPerformanceState { state } => validate_state_code(*state),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Request::Ping => "Ping",
            Request::Version => "Version",
            Request::GetCpuInfo => "GetCpuInfo",
            Request::GetPerformanceData => "GetPerformanceData",
            Request::SetPerformanceState { .. } => "SetPerformanceState",
            Request::Reset => "Reset",
            Request::GetStatistics => "GetStatistics",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Request ID this response corresponds to
    pub id: u64,
    /// The actual response
    #[serde(flatten)]
    pub response: Response,
}

impl ResponseEnvelope {
    pub fn new(id: u64, response: Response) -> Self {
        Self { id, response }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Response {
    #[serde(rename = "ok")]
    Ok(ResponseData),
    #[serde(rename = "error")]
    Error { message: String },
}

/// Response data - one optional slot per payload kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_info: Option<CpuInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<EngineStatistics>,
}

impl ResponseData {
    pub fn none() -> Self {
        Self::default()
    }
    pub fn string(v: String) -> Self {
        Self { value: Some(v), ..Self::default() }
    }
    pub fn cpu(info: CpuInfo) -> Self {
        Self { cpu_info: Some(info), ..Self::default() }
    }
    pub fn perf(data: PerformanceData) -> Self {
        Self { performance: Some(data), ..Self::default() }
    }
    pub fn stats(stats: EngineStatistics) -> Self {
        Self { statistics: Some(stats), ..Self::default() }
    }
}

impl Response {
    pub fn ok() -> Self {
        Response::Ok(ResponseData::none())
    }

    pub fn ok_string(s: impl Into<String>) -> Self {
        Response::Ok(ResponseData::string(s.into()))
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Response::Error { message: msg.into() }
    }
}

// ============================================================================
// Validation
// ============================================================================

pub fn validate_state_code(state: u32) -> Result<(), String> {
    if PerformanceState::try_from(state).is_err() {
        return Err(format!(
            "Performance state out of range: {} (must be 0-3)",
            state
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_codes_round_trip() {
        for state in PerformanceState::ALL {
            assert_eq!(PerformanceState::try_from(u32::from(state)), Ok(state));
        }
        assert_eq!(PerformanceState::try_from(4), Err(4));
        assert!(validate_state_code(3).is_ok());
        assert!(validate_state_code(4).is_err());
    }

    #[test]
    fn state_parses_from_cli_names() {
        assert_eq!("powersave".parse(), Ok(PerformanceState::PowerSave));
        assert_eq!("power-save".parse(), Ok(PerformanceState::PowerSave));
        assert_eq!("Balanced".parse(), Ok(PerformanceState::Balanced));
        assert_eq!("2".parse(), Ok(PerformanceState::Performance));
        assert!("turbo".parse::<PerformanceState>().is_err());
    }

    #[test]
    fn request_codes_match_source_convention() {
        assert_eq!(codes::GET_CPU_INFO, 0x8880_2000);
        assert_eq!(codes::GET_PERFORMANCE_DATA, 0x8880_2004);
        assert_eq!(codes::SET_PERFORMANCE_STATE, 0x8880_A008);
        assert_eq!(codes::RESET_ENGINE, 0x8880_A00C);
        assert_eq!(codes::request_name(codes::RESET_ENGINE), "Reset");
        assert_eq!(codes::request_name(0xDEAD_BEEF), "Unknown");
    }

    #[test]
    fn cpu_info_wire_layout() {
        let info = CpuInfo {
            vendor: "GenuineIntel".to_string(),
            brand: "Intel(R)".to_string(),
            architecture: CpuArchitecture::Intel,
            core_count: 4,
            thread_count: 8,
            base_frequency_mhz: 3000,
            max_frequency_mhz: 4500,
            current_frequency_mhz: 3000,
            hyperthreading: true,
            turbo_boost: true,
        };
        let wire = info.to_wire();
        assert_eq!(wire.len(), CPU_INFO_WIRE_SIZE);
        // Vendor occupies the first 13 bytes with a NUL terminator
        assert_eq!(&wire[0..12], b"GenuineIntel");
        assert_eq!(wire[12], 0);
        assert_eq!(read_u32(&wire, 62), 1); // Intel
        assert_eq!(wire[86], 1);
        assert_eq!(wire[87], 1);

        let decoded = CpuInfo::from_wire(&wire).unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn cpu_info_truncates_overlong_strings() {
        let info = CpuInfo {
            vendor: "ThisVendorNameIsFarTooLong".to_string(),
            brand: "B".repeat(64),
            architecture: CpuArchitecture::Unknown,
            core_count: 1,
            thread_count: 1,
            base_frequency_mhz: 1000,
            max_frequency_mhz: 2000,
            current_frequency_mhz: 1000,
            hyperthreading: false,
            turbo_boost: false,
        };
        let decoded = CpuInfo::from_wire(&info.to_wire()).unwrap();
        assert_eq!(decoded.vendor.len(), VENDOR_STRING_LEN);
        assert_eq!(decoded.brand.len(), BRAND_STRING_LEN);
    }

    #[test]
    fn performance_data_wire_layout() {
        let data = PerformanceData {
            state: PerformanceState::Performance,
            usage_percent: 80,
            temperature_c: 45,
            power_watts: 20,
            current_frequency_mhz: 3600,
            voltage_mv: 1200,
        };
        let wire = data.to_wire();
        assert_eq!(read_u32(&wire, 0), 2);
        assert_eq!(read_u32(&wire, 16), 3600);
        assert_eq!(PerformanceData::from_wire(&wire).unwrap(), data);

        // An undersized buffer is rejected rather than partially decoded
        assert!(PerformanceData::from_wire(&wire[..PERFORMANCE_DATA_WIRE_SIZE - 1]).is_err());
    }

    #[test]
    fn request_envelope_serialization() {
        let envelope = RequestEnvelope::with_id(Request::SetPerformanceState { state: 2 }, 7);
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"cmd\":\"SetPerformanceState\""));
        assert!(json.contains("\"id\":7"));

        let parsed: RequestEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, 7);
        assert!(matches!(
            parsed.request,
            Request::SetPerformanceState { state: 2 }
        ));
    }

    #[test]
    fn response_envelope_serialization() {
        let envelope = ResponseEnvelope::new(3, Response::error("no such state"));
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"status\":\"error\""));

        let ok = ResponseEnvelope::new(4, Response::ok_string("pong"));
        let json = serde_json::to_string(&ok).unwrap();
        let parsed: ResponseEnvelope = serde_json::from_str(&json).unwrap();
        match parsed.response {
            Response::Ok(data) => assert_eq!(data.value.as_deref(), Some("pong")),
            Response::Error { .. } => panic!("expected ok response"),
        }
    }

    #[test]
    fn set_state_request_validation() {
        assert!(Request::SetPerformanceState { state: 3 }.validate().is_ok());
        assert!(Request::SetPerformanceState { state: 4 }.validate().is_err());
        assert!(Request::GetCpuInfo.validate().is_ok());
    }
}
