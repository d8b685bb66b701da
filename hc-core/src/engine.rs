//! Performance state engine
//!
//! One engine instance owns the mirrored model of the processor: the
//! immutable-between-resets identity, a fixed-capacity per-core table, and
//! the global control fields. Everything mutable lives behind a single
//! `RwLock`; see the locking contract on [`Engine`].

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use hc_error::{ClockError, Result};
use hc_protocol::{CpuInfo, PerformanceData, PerformanceState};

use crate::constants::{defaults, freq, msr, table, telemetry};
use crate::registers::RegisterBackend;
use crate::topology::{self, ProcessorIdentity};

/// Per-core mirror record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreRecord {
    pub core_id: u8,
    pub current_frequency_mhz: u32,
    pub base_frequency_mhz: u32,
    pub max_frequency_mhz: u32,
    pub temperature_c: u32,
    pub utilization_pct: u32,
    pub state: PerformanceState,
}

impl CoreRecord {
    fn initial(core_id: u8, identity: &ProcessorIdentity) -> Self {
        Self {
            core_id,
            current_frequency_mhz: identity.base_frequency_mhz,
            base_frequency_mhz: identity.base_frequency_mhz,
            max_frequency_mhz: identity.max_frequency_mhz,
            temperature_c: table::INITIAL_TEMPERATURE_C,
            utilization_pct: table::INITIAL_UTILIZATION_PCT,
            state: PerformanceState::Balanced,
        }
    }
}

/// Fixed-capacity core table; only the detected prefix is addressable.
struct CoreTable {
    cores: Box<[CoreRecord; table::MAX_CPU_CORES]>,
    active: usize,
}

impl CoreTable {
    fn new(identity: &ProcessorIdentity) -> Self {
        let template = CoreRecord::initial(0, identity);
        let mut cores = Box::new([template; table::MAX_CPU_CORES]);
        for (i, core) in cores.iter_mut().enumerate() {
            core.core_id = i as u8;
        }
        let active = (identity.core_count as usize).min(table::MAX_CPU_CORES);
        Self { cores, active }
    }

    /// Length-tagged view over the live entries; slots past the detected core
    /// count are initialized placeholders and never handed out.
    fn active(&self) -> &[CoreRecord] {
        &self.cores[..self.active]
    }

    fn active_mut(&mut self) -> &mut [CoreRecord] {
        &mut self.cores[..self.active]
    }
}

/// Everything guarded by the engine lock
struct EngineState {
    identity: ProcessorIdentity,
    cores: CoreTable,
    global_state: PerformanceState,
    thermal_limit_c: u32,
    power_limit_w: u32,
    turbo_enabled: bool,
}

impl EngineState {
    fn initialize(backend: &dyn RegisterBackend) -> Self {
        let identity = topology::detect(backend);
        let cores = CoreTable::new(&identity);
        info!(
            cores = cores.active,
            base_mhz = identity.base_frequency_mhz,
            "Engine state initialized"
        );
        Self {
            identity,
            cores,
            global_state: PerformanceState::Balanced,
            thermal_limit_c: defaults::THERMAL_LIMIT_C,
            power_limit_w: defaults::POWER_LIMIT_W,
            turbo_enabled: defaults::TURBO_ENABLED,
        }
    }
}

/// Outcome of one state transition.
///
/// A transition that passed state validation always succeeds as a whole, even
/// when individual cores could not be reprogrammed; the failed indices are
/// reported here so callers can observe partial application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub state: PerformanceState,
    pub cores_targeted: u32,
    pub cores_applied: u32,
    pub failed_cores: Vec<u8>,
}

impl StateTransition {
    pub fn fully_applied(&self) -> bool {
        self.failed_cores.is_empty()
    }
}

/// Global limit fields mirrored from the engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    pub thermal_limit_c: u32,
    pub power_limit_w: u32,
    pub turbo_enabled: bool,
}

/// Compute the per-core target frequency for a state
pub fn target_frequency(state: PerformanceState, base_mhz: u32, max_mhz: u32) -> u32 {
    match state {
        PerformanceState::PowerSave => base_mhz * freq::POWER_SAVE_NUM / freq::RATIO_DEN,
        PerformanceState::Balanced => base_mhz,
        PerformanceState::Performance => base_mhz * freq::PERFORMANCE_NUM / freq::RATIO_DEN,
        PerformanceState::Extreme => max_mhz,
    }
}

/// The performance state engine.
///
/// # Locking contract
///
/// A single reader/writer lock guards the identity, the core table and the
/// global fields. `set_state` holds the write lock across its entire per-core
/// loop, so a reader can never observe a table where some cores carry the old
/// state and some the new one. Read-only queries take the shared lock.
pub struct Engine<B: RegisterBackend> {
    backend: B,
    state: RwLock<EngineState>,
}

impl<B: RegisterBackend> Engine<B> {
    /// Build an engine around a register backend, running detection and core
    /// table initialization. Never fails; detection degrades to fallbacks.
    pub fn new(backend: B) -> Self {
        let state = EngineState::initialize(&backend);
        Self {
            backend,
            state: RwLock::new(state),
        }
    }

    /// Snapshot of the processor identity
    pub fn identity(&self) -> ProcessorIdentity {
        self.state.read().identity.clone()
    }

    /// Snapshot of the live core records
    pub fn cores(&self) -> Vec<CoreRecord> {
        self.state.read().cores.active().to_vec()
    }

    /// Current global limit fields
    pub fn limits(&self) -> EngineLimits {
        let state = self.state.read();
        EngineLimits {
            thermal_limit_c: state.thermal_limit_c,
            power_limit_w: state.power_limit_w,
            turbo_enabled: state.turbo_enabled,
        }
    }

    /// Install global limits (typically from daemon configuration). A reset
    /// reverts these to the built-in defaults.
    pub fn configure_limits(&self, limits: EngineLimits) {
        let mut state = self.state.write();
        state.thermal_limit_c = limits.thermal_limit_c;
        state.power_limit_w = limits.power_limit_w;
        state.turbo_enabled = limits.turbo_enabled;
        debug!(
            thermal_c = limits.thermal_limit_c,
            power_w = limits.power_limit_w,
            turbo = limits.turbo_enabled,
            "Engine limits configured"
        );
    }

    /// Apply a performance state to every core.
    ///
    /// The write lock is held for the whole loop. Per-core failures do not
    /// abort the transition and do not fail the operation; the affected
    /// records are left untouched and their indices reported in the result.
    pub fn set_state(&self, requested: PerformanceState) -> StateTransition {
        let mut state = self.state.write();
        state.global_state = requested;

        let base = state.identity.base_frequency_mhz;
        let max = state.identity.max_frequency_mhz;
        let target = target_frequency(requested, base, max);
        let count = state.cores.active;

        let mut failed_cores = Vec::new();
        for core_id in 0..count {
            match self.apply_core_frequency(&mut state, core_id as u8, target) {
                Ok(()) => {
                    state.cores.cores[core_id].state = requested;
                }
                Err(e) => {
                    warn!(core = core_id, error = %e, "Core frequency update failed");
                    failed_cores.push(core_id as u8);
                }
            }
        }

        debug!(
            state = requested.label(),
            target_mhz = target,
            applied = count - failed_cores.len(),
            targeted = count,
            "State transition complete"
        );

        StateTransition {
            state: requested,
            cores_targeted: count as u32,
            cores_applied: (count - failed_cores.len()) as u32,
            failed_cores,
        }
    }

    /// Drive one core to a frequency, updating its mirror record.
    ///
    /// Fails with `InvalidParameter` for an out-of-range core id or a
    /// frequency outside `[base * 0.4, max]`, leaving the table unchanged.
    pub fn update_core_frequency(&self, core_id: u8, frequency_mhz: u32) -> Result<()> {
        let mut state = self.state.write();
        self.apply_core_frequency(&mut state, core_id, frequency_mhz)
    }

    fn apply_core_frequency(
        &self,
        state: &mut EngineState,
        core_id: u8,
        frequency_mhz: u32,
    ) -> Result<()> {
        if core_id as usize >= state.cores.active {
            return Err(ClockError::InvalidParameter(format!(
                "core id {} out of range (0-{})",
                core_id,
                state.cores.active.saturating_sub(1)
            )));
        }

        let base = state.identity.base_frequency_mhz;
        let max = state.identity.max_frequency_mhz;
        let min = state.identity.min_frequency_mhz();
        if frequency_mhz < min || frequency_mhz > max {
            return Err(ClockError::InvalidParameter(format!(
                "frequency {} MHz outside [{}, {}]",
                frequency_mhz, min, max
            )));
        }

        // Register-backed architectures program the ratio field of the
        // performance-control register; either register failure propagates.
        if matches!(
            state.identity.architecture,
            hc_protocol::CpuArchitecture::Intel | hc_protocol::CpuArchitecture::Amd
        ) {
            let current = self.backend.read_register(msr::PERF_CTL)?;
            let ratio = (frequency_mhz / freq::PLATFORM_STEP_MHZ) as u64 & msr::PERF_CTL_RATIO_MASK;
            let next = (current & !msr::PERF_CTL_RATIO_MASK) | ratio;
            self.backend.write_register(msr::PERF_CTL, next)?;
        }

        let core = &mut state.cores.cores[core_id as usize];
        core.current_frequency_mhz = frequency_mhz;
        if frequency_mhz > base {
            core.temperature_c =
                (core.temperature_c + table::TEMPERATURE_RISE_C).min(table::TEMPERATURE_CEILING_C);
        } else if frequency_mhz < base {
            core.temperature_c = core
                .temperature_c
                .saturating_sub(table::TEMPERATURE_FALL_C)
                .max(table::TEMPERATURE_FLOOR_C);
        }
        core.utilization_pct = (frequency_mhz * 100 / max).min(100);

        Ok(())
    }

    /// Aggregated telemetry: integer means over the live cores plus the fixed
    /// power and voltage estimates.
    pub fn performance_data(&self) -> PerformanceData {
        let state = self.state.read();
        let cores = state.cores.active();
        let count = cores.len().max(1) as u32;

        let mut total_usage = 0u32;
        let mut total_temp = 0u32;
        let mut total_freq = 0u32;
        for core in cores {
            total_usage += core.utilization_pct;
            total_temp += core.temperature_c;
            total_freq += core.current_frequency_mhz;
        }

        PerformanceData {
            state: state.global_state,
            usage_percent: total_usage / count,
            temperature_c: total_temp / count,
            power_watts: cores.len() as u32 * telemetry::POWER_PER_CORE_W,
            current_frequency_mhz: total_freq / count,
            voltage_mv: telemetry::VOLTAGE_MV,
        }
    }

    /// Identity plus live flags, with core 0's frequency as representative
    pub fn cpu_info(&self) -> CpuInfo {
        let state = self.state.read();
        let current = state
            .cores
            .active()
            .first()
            .map(|c| c.current_frequency_mhz)
            .unwrap_or(state.identity.base_frequency_mhz);
        CpuInfo {
            vendor: state.identity.vendor.clone(),
            brand: state.identity.brand.clone(),
            architecture: state.identity.architecture,
            core_count: state.identity.core_count,
            thread_count: state.identity.thread_count,
            base_frequency_mhz: state.identity.base_frequency_mhz,
            max_frequency_mhz: state.identity.max_frequency_mhz,
            current_frequency_mhz: current,
            hyperthreading: state.identity.hyperthreading(),
            turbo_boost: state.turbo_enabled,
        }
    }

    /// Full reinitialization: re-run detection and rebuild the core table,
    /// discarding all prior telemetry and configured limits.
    pub fn reset(&self) {
        let mut state = self.state.write();
        *state = EngineState::initialize(&self.backend);
        info!("Engine reset to initial state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::MockRegisterBackend;
    use crate::test_utils::{failing_write_backend, fallback_backend};

    fn engine_3000() -> Engine<crate::test_utils::TestBackend> {
        Engine::new(fallback_backend())
    }

    #[test]
    fn initialization_fills_the_table_with_defaults() {
        let engine = engine_3000();
        let cores = engine.cores();
        assert_eq!(cores.len(), 12);
        for (i, core) in cores.iter().enumerate() {
            assert_eq!(core.core_id, i as u8);
            assert_eq!(core.current_frequency_mhz, 3000);
            assert_eq!(core.temperature_c, 40);
            assert_eq!(core.utilization_pct, 10);
            assert_eq!(core.state, PerformanceState::Balanced);
        }
    }

    #[test]
    fn target_frequencies_per_state() {
        assert_eq!(target_frequency(PerformanceState::PowerSave, 3000, 4500), 1800);
        assert_eq!(target_frequency(PerformanceState::Balanced, 3000, 4500), 3000);
        assert_eq!(target_frequency(PerformanceState::Performance, 3000, 4500), 3600);
        assert_eq!(target_frequency(PerformanceState::Extreme, 3000, 4500), 4500);
    }

    #[test]
    fn set_state_drives_every_core() {
        let engine = engine_3000();

        for (state, expected) in [
            (PerformanceState::PowerSave, 1800),
            (PerformanceState::Balanced, 3000),
            (PerformanceState::Performance, 3600),
            (PerformanceState::Extreme, 4500),
        ] {
            let transition = engine.set_state(state);
            assert!(transition.fully_applied());
            assert_eq!(transition.cores_targeted, 12);
            assert_eq!(transition.cores_applied, 12);
            for core in engine.cores() {
                assert_eq!(core.current_frequency_mhz, expected);
                assert_eq!(core.state, state);
            }
        }
    }

    #[test]
    fn set_state_is_idempotent() {
        let engine = engine_3000();
        engine.set_state(PerformanceState::Performance);
        let first = engine.cores();
        engine.set_state(PerformanceState::Performance);
        assert_eq!(engine.cores(), first);
    }

    #[test]
    fn update_rejects_out_of_range_core() {
        let engine = engine_3000();
        let before = engine.cores();
        let err = engine.update_core_frequency(12, 3000).unwrap_err();
        assert!(matches!(err, ClockError::InvalidParameter(_)));
        assert_eq!(engine.cores(), before);
    }

    #[test]
    fn update_rejects_out_of_range_frequency() {
        let engine = engine_3000();
        let before = engine.cores();
        // Below base * 0.4
        assert!(engine.update_core_frequency(0, 1199).is_err());
        // Above max
        assert!(engine.update_core_frequency(0, 4501).is_err());
        assert_eq!(engine.cores(), before);

        // Both boundaries are inclusive
        assert!(engine.update_core_frequency(0, 1200).is_ok());
        assert!(engine.update_core_frequency(0, 4500).is_ok());
    }

    #[test]
    fn update_keeps_frequency_within_envelope() {
        let engine = engine_3000();
        for freq in [1200, 1800, 3000, 3600, 4500] {
            engine.update_core_frequency(3, freq).unwrap();
            let core = engine.cores()[3];
            assert!(core.current_frequency_mhz >= 1200);
            assert!(core.current_frequency_mhz <= 4500);
        }
    }

    #[test]
    fn temperature_tracks_frequency_direction() {
        let engine = engine_3000();
        // Above base: +5 per update, capped at 100
        for _ in 0..20 {
            engine.update_core_frequency(0, 4500).unwrap();
        }
        assert_eq!(engine.cores()[0].temperature_c, 100);

        // Below base: -2 per update, floored at 30
        for _ in 0..50 {
            engine.update_core_frequency(0, 1800).unwrap();
        }
        assert_eq!(engine.cores()[0].temperature_c, 30);

        // At base: unchanged
        let before = engine.cores()[0].temperature_c;
        engine.update_core_frequency(0, 3000).unwrap();
        assert_eq!(engine.cores()[0].temperature_c, before);
    }

    #[test]
    fn utilization_is_frequency_fraction_of_max() {
        let engine = engine_3000();
        engine.update_core_frequency(0, 2250).unwrap();
        assert_eq!(engine.cores()[0].utilization_pct, 50);
        engine.update_core_frequency(0, 4500).unwrap();
        assert_eq!(engine.cores()[0].utilization_pct, 100);
    }

    #[test]
    fn telemetry_means_truncate_like_integer_division() {
        let engine = engine_3000();
        // Drive cores to non-uniform frequencies so the means do not divide
        // evenly: 11 cores at 3000, one core at 3601.
        engine.update_core_frequency(0, 3601).unwrap();
        let data = engine.performance_data();
        // (11*3000 + 3601) / 12 = 36601 / 12 = 3050 (truncated from 3050.08)
        assert_eq!(data.current_frequency_mhz, 3050);
        // Utilization: 11 cores at 10%, one at 3601*100/4500 = 80 -> 190/12 = 15
        assert_eq!(data.usage_percent, 15);
        // Temperature: 11 at 40, one at 45 -> 485/12 = 40
        assert_eq!(data.temperature_c, 40);
        assert_eq!(data.power_watts, 60);
        assert_eq!(data.voltage_mv, 1200);
        assert_eq!(data.state, PerformanceState::Balanced);
    }

    #[test]
    fn cpu_info_reports_core_zero_frequency() {
        let engine = engine_3000();
        engine.update_core_frequency(0, 3600).unwrap();
        let info = engine.cpu_info();
        assert_eq!(info.current_frequency_mhz, 3600);
        assert_eq!(info.core_count, 12);
        assert_eq!(info.thread_count, 24);
        assert!(info.hyperthreading);
        assert!(info.turbo_boost);
        assert_eq!(info.vendor, "GenuineIntel");
    }

    #[test]
    fn per_core_write_failures_are_contained() {
        let engine = Engine::new(failing_write_backend());
        let transition = engine.set_state(PerformanceState::Extreme);
        assert_eq!(transition.cores_targeted, 12);
        assert_eq!(transition.cores_applied, 0);
        assert_eq!(transition.failed_cores.len(), 12);
        // Failed cores keep their previous record entirely
        for core in engine.cores() {
            assert_eq!(core.current_frequency_mhz, 3000);
            assert_eq!(core.state, PerformanceState::Balanced);
            assert_eq!(core.temperature_c, 40);
        }
        // The global state still switched; telemetry reports it
        assert_eq!(engine.performance_data().state, PerformanceState::Extreme);
    }

    #[test]
    fn unknown_architecture_skips_register_programming() {
        let mut backend = MockRegisterBackend::new();
        backend.expect_identify().returning(|_, _| Ok([0; 4]));
        // No read_register/write_register expectations: an Unknown
        // architecture must not touch the performance-control register.
        let engine = Engine::new(backend);
        let transition = engine.set_state(PerformanceState::PowerSave);
        assert!(transition.fully_applied());
        assert_eq!(engine.cores()[0].current_frequency_mhz, 1800);
    }

    #[test]
    fn reset_restores_defaults_after_mutations() {
        let engine = engine_3000();
        engine.set_state(PerformanceState::Extreme);
        engine.configure_limits(EngineLimits {
            thermal_limit_c: 95,
            power_limit_w: 125,
            turbo_enabled: false,
        });
        engine.reset();

        for core in engine.cores() {
            assert_eq!(core.current_frequency_mhz, 3000);
            assert_eq!(core.temperature_c, 40);
            assert_eq!(core.utilization_pct, 10);
            assert_eq!(core.state, PerformanceState::Balanced);
        }
        let limits = engine.limits();
        assert_eq!(limits.thermal_limit_c, 85);
        assert_eq!(limits.power_limit_w, 65);
        assert!(limits.turbo_enabled);
        assert_eq!(engine.performance_data().state, PerformanceState::Balanced);
    }

    #[test]
    fn configure_limits_is_visible_in_cpu_info() {
        let engine = engine_3000();
        engine.configure_limits(EngineLimits {
            thermal_limit_c: 90,
            power_limit_w: 105,
            turbo_enabled: false,
        });
        assert!(!engine.cpu_info().turbo_boost);
        assert_eq!(engine.limits().power_limit_w, 105);
    }
}
