//! Constants and configuration values for Hyperclock
//!
//! Centralizes all magic numbers, paths, and configuration defaults.
//! This is the SINGLE SOURCE OF TRUTH for all configuration values.
//! Never use magic numbers in other files - add them here first.

/// Model-specific register ids and their simulated contents
pub mod msr {
    /// IA32_PERF_STATUS
    pub const PERF_STATUS: u32 = 0x198;

    /// IA32_PERF_CTL
    pub const PERF_CTL: u32 = 0x199;

    /// IA32_THERM_STATUS
    pub const THERMAL_STATUS: u32 = 0x19C;

    /// MSR_PLATFORM_INFO
    pub const PLATFORM_INFO: u32 = 0xCE;

    /// Simulated IA32_PERF_STATUS contents
    pub const SIM_PERF_STATUS: u64 = 0x1F40;

    /// Simulated IA32_PERF_CTL contents
    pub const SIM_PERF_CTL: u64 = 0x1B58;

    /// Simulated IA32_THERM_STATUS contents
    pub const SIM_THERMAL_STATUS: u64 = 0x28;

    /// Simulated MSR_PLATFORM_INFO contents.
    /// Bits [8:15] carry the base ratio: 8 here, so 800 MHz base.
    pub const SIM_PLATFORM_INFO: u64 = 0x0800_0800;

    /// Mask for the ratio field written into the performance-control register
    pub const PERF_CTL_RATIO_MASK: u64 = 0xFF;
}

/// Processor identification function numbers
pub mod cpuid {
    /// Vendor string query
    pub const VENDOR: u32 = 0;

    /// Feature and topology query
    pub const FEATURES: u32 = 1;

    /// AMD extended topology query
    pub const AMD_TOPOLOGY: u32 = 0x8000_0008;

    /// First of the three brand string queries (0x80000002..=0x80000004)
    pub const BRAND_FIRST: u32 = 0x8000_0002;

    /// Number of consecutive brand string queries
    pub const BRAND_CHUNKS: u32 = 3;
}

/// Core table dimensions and initial telemetry
pub mod table {
    /// Backing capacity of the per-core table; only the detected prefix is live
    pub const MAX_CPU_CORES: usize = 256;

    /// Initial per-core temperature after (re)initialization
    pub const INITIAL_TEMPERATURE_C: u32 = 40;

    /// Initial per-core utilization after (re)initialization
    pub const INITIAL_UTILIZATION_PCT: u32 = 10;

    /// Lowest temperature a core record may report
    pub const TEMPERATURE_FLOOR_C: u32 = 30;

    /// Highest temperature a core record may report
    pub const TEMPERATURE_CEILING_C: u32 = 100;

    /// Temperature rise per update above base frequency
    pub const TEMPERATURE_RISE_C: u32 = 5;

    /// Temperature fall per update below base frequency
    pub const TEMPERATURE_FALL_C: u32 = 2;
}

/// Topology fallbacks when detection yields nothing usable
pub mod defaults {
    pub const CORE_COUNT: u32 = 4;
    pub const THREAD_COUNT: u32 = 8;
    pub const BASE_FREQUENCY_MHZ: u32 = 3000;
    pub const MAX_FREQUENCY_MHZ: u32 = 4500;

    /// Global thermal limit installed at initialization
    pub const THERMAL_LIMIT_C: u32 = 85;

    /// Global power limit installed at initialization
    pub const POWER_LIMIT_W: u32 = 65;

    /// Turbo defaults to enabled
    pub const TURBO_ENABLED: bool = true;
}

/// Frequency scaling ratios, expressed as integer numerator/denominator pairs
pub mod freq {
    /// Denominator shared by all scaling ratios
    pub const RATIO_DEN: u32 = 10;

    /// Lowest admissible frequency: base * 4/10
    pub const MIN_RATIO_NUM: u32 = 4;

    /// Power-save target: base * 6/10
    pub const POWER_SAVE_NUM: u32 = 6;

    /// Performance target: base * 12/10
    pub const PERFORMANCE_NUM: u32 = 12;

    /// MHz per platform-info ratio step
    pub const PLATFORM_STEP_MHZ: u32 = 100;
}

/// Fixed telemetry estimates
pub mod telemetry {
    /// Estimated power draw per active core
    pub const POWER_PER_CORE_W: u32 = 5;

    /// Reported core voltage in millivolts
    pub const VOLTAGE_MV: u32 = 1200;
}

/// Filesystem locations
pub mod paths {
    /// Default daemon socket path
    pub const SOCKET_PATH: &str = "/run/hyperclockd.sock";

    /// Daemon configuration directory
    pub const CONFIG_DIR: &str = "/etc/hyperclock";

    /// Daemon configuration file name
    pub const CONFIG_FILE: &str = "daemon.json";
}

/// Client-side tunables
pub mod client {
    /// Socket read/write timeout in milliseconds
    pub const TIMEOUT_MS: u64 = 5000;

    /// Dashboard poll interval in milliseconds
    pub const POLL_INTERVAL_MS: u64 = 1000;
}
