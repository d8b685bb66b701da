/*
 * Test utilities for the Hyperclock engine
 *
 * Deterministic register backends used across the engine and dispatcher
 * tests. They answer identification like the simulation backend but report a
 * zero platform frequency, which lands detection in the documented 3000/4500
 * MHz fallback - the envelope the test suite asserts exact numbers against.
 */

use hc_error::{ClockError, Result};

use crate::constants::msr;
use crate::registers::{IdentifyWords, RegisterBackend, SimulatedRegisters};

/// Scriptable backend for engine tests
pub struct TestBackend {
    /// Value served for the platform-info register
    pub platform_info: u64,
    /// When set, every register write fails with a hardware fault
    pub fail_writes: bool,
}

impl RegisterBackend for TestBackend {
    fn read_register(&self, register: u32) -> Result<u64> {
        match register {
            msr::PLATFORM_INFO => Ok(self.platform_info),
            _ => SimulatedRegisters::new().read_register(register),
        }
    }

    fn write_register(&self, register: u32, value: u64) -> Result<()> {
        if self.fail_writes {
            return Err(ClockError::HardwareFault(format!(
                "simulated write fault on register {:#x}",
                register
            )));
        }
        SimulatedRegisters::new().write_register(register, value)
    }

    fn identify(&self, function: u32, subfunction: u32) -> Result<IdentifyWords> {
        SimulatedRegisters::new().identify(function, subfunction)
    }
}

/// Backend whose detection lands in the 3000/4500 MHz fallback (12 Intel
/// cores, zero platform frequency) and whose register writes succeed
pub fn fallback_backend() -> TestBackend {
    TestBackend {
        platform_info: 0,
        fail_writes: false,
    }
}

/// Same topology as [`fallback_backend`], but every write fails
pub fn failing_write_backend() -> TestBackend {
    TestBackend {
        platform_info: 0,
        fail_writes: true,
    }
}
