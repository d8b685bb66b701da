//! Request dispatcher
//!
//! Validates and routes the four engine requests, enforcing the fixed buffer
//! layouts of the control protocol. Statistics accounting lives here: every
//! request bumps the total counter, every failure additionally bumps the
//! failure counter, regardless of which component reported the failure.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use hc_error::{ClockError, Result};
use hc_protocol::{codes, CpuInfo, EngineStatistics, PerformanceData, PerformanceState};
use hc_protocol::SET_STATE_WIRE_SIZE;

use crate::engine::Engine;
use crate::registers::RegisterBackend;

/// Engine plus the operation counters of the request path
pub struct Dispatcher<B: RegisterBackend> {
    engine: Engine<B>,
    total_operations: AtomicU64,
    failed_operations: AtomicU64,
}

impl<B: RegisterBackend> Dispatcher<B> {
    pub fn new(backend: B) -> Self {
        Self {
            engine: Engine::new(backend),
            total_operations: AtomicU64::new(0),
            failed_operations: AtomicU64::new(0),
        }
    }

    /// Direct access to the engine for out-of-band queries
    pub fn engine(&self) -> &Engine<B> {
        &self.engine
    }

    /// Handle one request against the fixed buffer contracts.
    ///
    /// Returns the number of bytes written into `output`. Validation errors
    /// are returned before any byte of `output` is touched.
    pub fn handle_request(&self, code: u32, input: &[u8], output: &mut [u8]) -> Result<usize> {
        self.total_operations.fetch_add(1, Ordering::Relaxed);
        trace!("Dispatching request {:#x} ({})", code, codes::request_name(code));

        let result = self.dispatch(code, input, output);
        if result.is_err() {
            self.failed_operations.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    fn dispatch(&self, code: u32, input: &[u8], output: &mut [u8]) -> Result<usize> {
        match code {
            codes::GET_CPU_INFO => {
                if output.len() < CpuInfo::WIRE_SIZE {
                    return Err(ClockError::BufferTooSmall {
                        required: CpuInfo::WIRE_SIZE,
                        provided: output.len(),
                    });
                }
                let wire = self.engine.cpu_info().to_wire();
                output[..CpuInfo::WIRE_SIZE].copy_from_slice(&wire);
                Ok(CpuInfo::WIRE_SIZE)
            }

            codes::GET_PERFORMANCE_DATA => {
                if output.len() < PerformanceData::WIRE_SIZE {
                    return Err(ClockError::BufferTooSmall {
                        required: PerformanceData::WIRE_SIZE,
                        provided: output.len(),
                    });
                }
                let wire = self.engine.performance_data().to_wire();
                output[..PerformanceData::WIRE_SIZE].copy_from_slice(&wire);
                Ok(PerformanceData::WIRE_SIZE)
            }

            codes::SET_PERFORMANCE_STATE => {
                if input.len() < SET_STATE_WIRE_SIZE {
                    return Err(ClockError::BufferTooSmall {
                        required: SET_STATE_WIRE_SIZE,
                        provided: input.len(),
                    });
                }
                let raw = u32::from_le_bytes([input[0], input[1], input[2], input[3]]);
                let state = PerformanceState::try_from(raw).map_err(|value| {
                    ClockError::InvalidParameter(format!(
                        "performance state {} out of range (0-3)",
                        value
                    ))
                })?;
                let transition = self.engine.set_state(state);
                debug!(
                    state = state.label(),
                    applied = transition.cores_applied,
                    targeted = transition.cores_targeted,
                    "Performance state applied"
                );
                Ok(0)
            }

            codes::RESET_ENGINE => {
                self.engine.reset();
                self.total_operations.store(0, Ordering::Relaxed);
                self.failed_operations.store(0, Ordering::Relaxed);
                Ok(0)
            }

            other => Err(ClockError::InvalidRequest(other)),
        }
    }

    /// Snapshot of the operation counters
    pub fn statistics(&self) -> EngineStatistics {
        EngineStatistics {
            total_operations: self.total_operations.load(Ordering::Relaxed),
            failed_operations: self.failed_operations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fallback_backend;
    use hc_protocol::CpuArchitecture;

    fn dispatcher() -> Dispatcher<crate::test_utils::TestBackend> {
        Dispatcher::new(fallback_backend())
    }

    #[test]
    fn cpu_info_request_fills_the_wire_structure() {
        let d = dispatcher();
        let mut out = [0u8; CpuInfo::WIRE_SIZE];
        let written = d.handle_request(codes::GET_CPU_INFO, &[], &mut out).unwrap();
        assert_eq!(written, CpuInfo::WIRE_SIZE);

        let info = CpuInfo::from_wire(&out).unwrap();
        assert_eq!(info.vendor, "GenuineIntel");
        assert_eq!(info.architecture, CpuArchitecture::Intel);
        assert_eq!(info.base_frequency_mhz, 3000);
        assert_eq!(info.max_frequency_mhz, 4500);
    }

    #[test]
    fn short_output_buffer_is_rejected_untouched() {
        let d = dispatcher();
        let mut out = [0xAAu8; CpuInfo::WIRE_SIZE - 1];
        let err = d
            .handle_request(codes::GET_CPU_INFO, &[], &mut out)
            .unwrap_err();
        assert!(matches!(
            err,
            ClockError::BufferTooSmall { required: 88, provided: 87 }
        ));
        assert!(out.iter().all(|b| *b == 0xAA));

        let mut out = [0xAAu8; PerformanceData::WIRE_SIZE - 1];
        let err = d
            .handle_request(codes::GET_PERFORMANCE_DATA, &[], &mut out)
            .unwrap_err();
        assert!(matches!(err, ClockError::BufferTooSmall { .. }));
        assert!(out.iter().all(|b| *b == 0xAA));
    }

    #[test]
    fn set_state_round_trip_through_buffers() {
        let d = dispatcher();
        let input = 2u32.to_le_bytes();
        d.handle_request(codes::SET_PERFORMANCE_STATE, &input, &mut [])
            .unwrap();

        let mut out = [0u8; PerformanceData::WIRE_SIZE];
        d.handle_request(codes::GET_PERFORMANCE_DATA, &[], &mut out)
            .unwrap();
        let data = PerformanceData::from_wire(&out).unwrap();
        assert_eq!(data.state, PerformanceState::Performance);
        assert_eq!(data.current_frequency_mhz, 3600);
    }

    #[test]
    fn set_state_rejects_short_input_and_bad_state() {
        let d = dispatcher();
        let err = d
            .handle_request(codes::SET_PERFORMANCE_STATE, &[2, 0], &mut [])
            .unwrap_err();
        assert!(matches!(
            err,
            ClockError::BufferTooSmall { required: 4, provided: 2 }
        ));

        let err = d
            .handle_request(codes::SET_PERFORMANCE_STATE, &4u32.to_le_bytes(), &mut [])
            .unwrap_err();
        assert!(matches!(err, ClockError::InvalidParameter(_)));

        // Neither attempt changed the engine state
        assert_eq!(
            d.engine().performance_data().state,
            PerformanceState::Balanced
        );
    }

    #[test]
    fn unknown_request_code_is_rejected() {
        let d = dispatcher();
        let err = d.handle_request(0x1234, &[], &mut []).unwrap_err();
        assert!(matches!(err, ClockError::InvalidRequest(0x1234)));
    }

    #[test]
    fn counters_track_totals_and_failures() {
        let d = dispatcher();
        let mut out = [0u8; PerformanceData::WIRE_SIZE];
        d.handle_request(codes::GET_PERFORMANCE_DATA, &[], &mut out)
            .unwrap();
        let _ = d.handle_request(0x1234, &[], &mut []);
        let _ = d.handle_request(codes::SET_PERFORMANCE_STATE, &[], &mut []);

        let stats = d.statistics();
        assert_eq!(stats.total_operations, 3);
        assert_eq!(stats.failed_operations, 2);
    }

    #[test]
    fn reset_reinitializes_engine_and_zeroes_counters() {
        let d = dispatcher();
        let input = 3u32.to_le_bytes();
        d.handle_request(codes::SET_PERFORMANCE_STATE, &input, &mut [])
            .unwrap();
        assert_eq!(
            d.engine().performance_data().state,
            PerformanceState::Extreme
        );

        d.handle_request(codes::RESET_ENGINE, &[], &mut []).unwrap();
        assert_eq!(
            d.engine().performance_data().state,
            PerformanceState::Balanced
        );
        for core in d.engine().cores() {
            assert_eq!(core.temperature_c, 40);
            assert_eq!(core.utilization_pct, 10);
        }
        let stats = d.statistics();
        assert_eq!(stats.total_operations, 0);
        assert_eq!(stats.failed_operations, 0);
    }
}
