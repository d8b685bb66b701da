//! Topology and vendor detection
//!
//! Runs once at engine initialization (and again on reset). Detection never
//! fails: every backend error degrades to the documented fallback topology so
//! the engine is usable even when register access is entirely broken.

use serde::{Deserialize, Serialize};
use tracing::debug;

use hc_protocol::CpuArchitecture;

use crate::constants::{cpuid as fns, defaults, msr};
use crate::cpuid;
use crate::registers::RegisterBackend;

/// Immutable processor identity established at initialization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessorIdentity {
    pub architecture: CpuArchitecture,
    pub vendor: String,
    pub brand: String,
    pub core_count: u32,
    pub thread_count: u32,
    pub base_frequency_mhz: u32,
    pub max_frequency_mhz: u32,
}

impl ProcessorIdentity {
    /// Lowest frequency any core may be driven to: base * 4/10
    pub fn min_frequency_mhz(&self) -> u32 {
        use crate::constants::freq;
        self.base_frequency_mhz * freq::MIN_RATIO_NUM / freq::RATIO_DEN
    }

    pub fn hyperthreading(&self) -> bool {
        self.thread_count > self.core_count
    }
}

/// Detect vendor, topology and frequency range through the register backend.
///
/// Identification failures are treated as zeroed words and a failed
/// platform-info read as a zero frequency, both of which land in the fallback
/// path: 4 cores / 8 threads and 3000 / 4500 MHz.
pub fn detect(backend: &dyn RegisterBackend) -> ProcessorIdentity {
    let vendor_words = backend.identify(fns::VENDOR, 0).unwrap_or([0; 4]);
    let vendor = cpuid::vendor_string(&vendor_words);
    let architecture = cpuid::classify_vendor(&vendor);

    let (mut core_count, mut thread_count) = match architecture {
        CpuArchitecture::Intel => {
            let words = backend.identify(fns::FEATURES, 0).unwrap_or([0; 4]);
            cpuid::intel_topology(&words)
        }
        CpuArchitecture::Amd => {
            let words = backend.identify(fns::AMD_TOPOLOGY, 0).unwrap_or([0; 4]);
            cpuid::amd_topology(&words)
        }
        _ => (0, 0),
    };

    let brand = if architecture != CpuArchitecture::Unknown {
        let mut chunks = [[0u32; 4]; 3];
        for (i, chunk) in chunks.iter_mut().enumerate() {
            *chunk = backend
                .identify(fns::BRAND_FIRST + i as u32, 0)
                .unwrap_or([0; 4]);
        }
        cpuid::brand_string(&chunks)
    } else {
        String::new()
    };

    let mut base_frequency_mhz = 0;
    let mut max_frequency_mhz = 0;
    if matches!(architecture, CpuArchitecture::Intel | CpuArchitecture::Amd) {
        if let Ok(value) = backend.read_register(msr::PLATFORM_INFO) {
            base_frequency_mhz = cpuid::platform_base_frequency_mhz(value);
            max_frequency_mhz = base_frequency_mhz * 2;
        }
    }

    if core_count == 0 {
        core_count = defaults::CORE_COUNT;
        thread_count = defaults::THREAD_COUNT;
    }
    if base_frequency_mhz == 0 {
        base_frequency_mhz = defaults::BASE_FREQUENCY_MHZ;
        max_frequency_mhz = defaults::MAX_FREQUENCY_MHZ;
    }

    debug!(
        vendor = %vendor,
        architecture = architecture.label(),
        cores = core_count,
        threads = thread_count,
        base_mhz = base_frequency_mhz,
        max_mhz = max_frequency_mhz,
        "Processor detection complete"
    );

    ProcessorIdentity {
        architecture,
        vendor,
        brand,
        core_count,
        thread_count,
        base_frequency_mhz,
        max_frequency_mhz,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{MockRegisterBackend, SimulatedRegisters};
    use hc_error::ClockError;

    #[test]
    fn detects_the_simulated_intel_part() {
        let identity = detect(&SimulatedRegisters::new());
        assert_eq!(identity.architecture, CpuArchitecture::Intel);
        assert_eq!(identity.vendor, "GenuineIntel");
        // Brand text stops at the first space of "Intel(R) Core(TM) ..."
        assert_eq!(identity.brand, "Intel(R)");
        assert_eq!(identity.core_count, 12);
        assert_eq!(identity.thread_count, 24);
        // Platform-info ratio 8 -> 800 MHz base, doubled max
        assert_eq!(identity.base_frequency_mhz, 800);
        assert_eq!(identity.max_frequency_mhz, 1600);
        assert!(identity.hyperthreading());
    }

    #[test]
    fn unknown_vendor_uses_fallback_topology() {
        let mut backend = MockRegisterBackend::new();
        backend.expect_identify().returning(|_, _| Ok([0; 4]));
        backend
            .expect_read_register()
            .returning(|r| Err(ClockError::UnsupportedRegister(r)));

        let identity = detect(&backend);
        assert_eq!(identity.architecture, CpuArchitecture::Unknown);
        assert_eq!(identity.vendor, "");
        assert_eq!(identity.brand, "");
        assert_eq!(identity.core_count, 4);
        assert_eq!(identity.thread_count, 8);
        assert_eq!(identity.base_frequency_mhz, 3000);
        assert_eq!(identity.max_frequency_mhz, 4500);
        assert!(identity.hyperthreading());
    }

    #[test]
    fn identify_failure_degrades_to_fallbacks() {
        let mut backend = MockRegisterBackend::new();
        backend
            .expect_identify()
            .returning(|_, _| Err(ClockError::HardwareFault("bus stall".to_string())));
        backend
            .expect_read_register()
            .returning(|_| Ok(0));

        let identity = detect(&backend);
        assert_eq!(identity.architecture, CpuArchitecture::Unknown);
        assert_eq!(identity.core_count, 4);
        assert_eq!(identity.base_frequency_mhz, 3000);
        assert_eq!(identity.max_frequency_mhz, 4500);
    }

    #[test]
    fn zero_platform_frequency_uses_frequency_fallback() {
        let sim = SimulatedRegisters::new();
        let mut backend = MockRegisterBackend::new();
        backend
            .expect_identify()
            .returning(move |f, s| sim.identify(f, s));
        backend.expect_read_register().returning(|_| Ok(0));

        let identity = detect(&backend);
        assert_eq!(identity.architecture, CpuArchitecture::Intel);
        assert_eq!(identity.core_count, 12);
        assert_eq!(identity.base_frequency_mhz, 3000);
        assert_eq!(identity.max_frequency_mhz, 4500);
    }

    #[test]
    fn min_frequency_is_forty_percent_of_base() {
        let identity = ProcessorIdentity {
            architecture: CpuArchitecture::Intel,
            vendor: "GenuineIntel".to_string(),
            brand: String::new(),
            core_count: 4,
            thread_count: 8,
            base_frequency_mhz: 3000,
            max_frequency_mhz: 4500,
        };
        assert_eq!(identity.min_frequency_mhz(), 1200);
    }
}
