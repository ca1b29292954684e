//! Correction Engine - control surface and shared active state
//!
//! Owns the state the input thread, the shell and the correction loop share:
//! the active weapon's offsets, the two trigger button flags, the enable
//! switches and the "a loop is alive" flag. All of it sits behind one mutex;
//! nothing is read or written outside it.
//!
//! # Phases
//!
//! ```text
//!            both held + enabled + no loop
//!   Idle ─────────────────────────────────► Armed (loop spawned)
//!    ▲                                        │
//!    │ loop retires on its next tick          │ button released / disabled
//!    └──────────────── Disarming ◄────────────┘
//! ```
//!
//! The loop re-evaluates `system_enabled && correction_enabled && right_held
//! && left_held` every tick and clears `loop_running` in the same critical
//! section in which it observes the condition as false. A press that races
//! with a retiring loop therefore either sees `loop_running == true` before
//! the loop has looked (and the loop will see the press), or sees `false`
//! after the loop is gone and spawns a new one.

use super::error::EngineError;
use super::pointer::PointerDevice;
use super::worker::CorrectionWorker;
use crate::profiles::{Axis, RecoilOffsets, TuningParameters, WeaponSlot};
use chrono::{DateTime, Local};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Corrections smaller than this on both axes are not fed to the accumulator
pub const MOVEMENT_THRESHOLD: f64 = 0.01;

/// The two buttons that must both be held to arm the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerButton {
    Left,
    Right,
}

/// Observable engine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    /// No loop alive
    Idle,
    /// Loop alive and its continuation condition holds
    Armed,
    /// Loop alive but will exit on its next tick
    Disarming,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct LoopStats {
    pub(crate) loops_started: u64,
    pub(crate) ticks: u64,
    pub(crate) corrections_applied: u64,
}

/// State shared between the input path, the shell and the correction loop
#[derive(Debug, Clone)]
pub(crate) struct ActiveState {
    pub(crate) offsets: RecoilOffsets,
    pub(crate) active_weapon: WeaponSlot,
    pub(crate) right_held: bool,
    pub(crate) left_held: bool,
    pub(crate) loop_running: bool,
    pub(crate) loop_generation: u64,
    pub(crate) correction_enabled: bool,
    pub(crate) system_enabled: bool,
    pub(crate) factor: f64,
    pub(crate) tuning: TuningParameters,
    pub(crate) agent: String,
    pub(crate) scope: String,
    pub(crate) stats: LoopStats,
}

impl ActiveState {
    fn new(tuning: TuningParameters) -> Self {
        Self {
            offsets: RecoilOffsets::default(),
            active_weapon: WeaponSlot::Primary,
            right_held: false,
            left_held: false,
            loop_running: false,
            loop_generation: 0,
            correction_enabled: false,
            system_enabled: true,
            factor: 1.0,
            tuning,
            agent: "default".to_string(),
            scope: "default".to_string(),
            stats: LoopStats::default(),
        }
    }

    /// Loop continuation condition
    pub(crate) fn should_continue(&self) -> bool {
        self.system_enabled && self.correction_enabled && self.right_held && self.left_held
    }

    fn phase(&self) -> EnginePhase {
        match (self.loop_running, self.should_continue()) {
            (false, _) => EnginePhase::Idle,
            (true, true) => EnginePhase::Armed,
            (true, false) => EnginePhase::Disarming,
        }
    }

    /// Claims the loop slot if the loop should run and none is alive.
    ///
    /// Must be called with the lock held; returns the new loop's generation.
    fn try_arm(&mut self) -> Option<u64> {
        if self.loop_running || !self.should_continue() {
            return None;
        }
        self.loop_running = true;
        self.loop_generation += 1;
        self.stats.loops_started += 1;
        Some(self.loop_generation)
    }
}

/// Releases the loop slot held by `generation`, if it still holds it
pub(crate) fn release_loop_slot(state: &mut ActiveState, generation: u64) {
    if state.loop_generation == generation && state.loop_running {
        state.loop_running = false;
    }
}

#[derive(Debug, Clone, Copy)]
enum Switch {
    Correction,
    System,
}

/// Point-in-time view of the engine for the shell
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub phase: EnginePhase,
    pub active_weapon: WeaponSlot,
    pub offsets: RecoilOffsets,
    pub right_held: bool,
    pub left_held: bool,
    pub correction_enabled: bool,
    pub system_enabled: bool,
    pub factor: f64,
    pub loop_generation: u64,
}

/// Session counters
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub session_start: DateTime<Local>,
    pub session_duration: chrono::Duration,
    pub loops_started: u64,
    pub ticks: u64,
    pub corrections_applied: u64,
    pub current_factor: f64,
}

/// Computes one tick's correction as `(horizontal, vertical)`.
///
/// `offset * factor * sensitivity` per axis, clamped to
/// `[-max_movement, max_movement]`. Non-finite results are rejected rather
/// than clamped.
pub fn compute_correction(
    offsets: RecoilOffsets,
    factor: f64,
    tuning: &TuningParameters,
) -> Result<(f64, f64), EngineError> {
    let limit = f64::from(tuning.max_movement);
    let adjust = |axis: Axis, offset: f64| -> Result<f64, EngineError> {
        let value = offset * factor * tuning.sensitivity;
        if !value.is_finite() {
            return Err(EngineError::InvalidCorrection {
                axis,
                value,
                offset,
                factor,
                sensitivity: tuning.sensitivity,
            });
        }
        Ok(value.clamp(-limit, limit))
    };

    let horizontal = adjust(Axis::Horizontal, offsets.horizontal)?;
    let vertical = adjust(Axis::Vertical, offsets.vertical)?;
    Ok((horizontal, vertical))
}

/// The real-time correction engine.
///
/// Constructed once by the application and shared by reference (`Arc`) with
/// the input router and the shell. All methods are synchronous and short:
/// they flip flags under the lock and at most spawn one detached loop task on
/// the captured runtime, so they are safe to call from a host hook thread.
pub struct CorrectionEngine {
    state: Arc<Mutex<ActiveState>>,
    pointer: Arc<dyn PointerDevice>,
    runtime: Handle,
    session_start: DateTime<Local>,
}

impl CorrectionEngine {
    /// Creates the engine on the current tokio runtime
    pub fn new(
        pointer: Arc<dyn PointerDevice>,
        tuning: TuningParameters,
    ) -> Result<Self, EngineError> {
        let runtime = Handle::try_current().map_err(|e| EngineError::NoRuntime(e.to_string()))?;
        Ok(Self::with_runtime(pointer, tuning, runtime))
    }

    pub fn with_runtime(
        pointer: Arc<dyn PointerDevice>,
        tuning: TuningParameters,
        runtime: Handle,
    ) -> Self {
        info!(
            "Initializing correction engine with pointer '{}' and tuning {:?}",
            pointer.name(),
            tuning
        );
        Self {
            state: Arc::new(Mutex::new(ActiveState::new(tuning))),
            pointer,
            runtime,
            session_start: Local::now(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ActiveState>, EngineError> {
        self.state.lock().map_err(|_| EngineError::LockPoisoned)
    }

    /// Applies a trigger button press/release.
    ///
    /// The flag update and the arm check happen in one critical section, so a
    /// press that completes "both held" always sees its own update. Returns
    /// `true` if this call spawned a loop.
    pub fn handle_button(&self, button: TriggerButton, pressed: bool) -> Result<bool, EngineError> {
        let armed = {
            let mut state = self.lock()?;
            match button {
                TriggerButton::Left => state.left_held = pressed,
                TriggerButton::Right => state.right_held = pressed,
            }
            debug!(
                "Trigger {:?} {} (left={}, right={})",
                button,
                if pressed { "pressed" } else { "released" },
                state.left_held,
                state.right_held
            );
            if !pressed && state.loop_running {
                info!("Trigger released, correction loop stops on its next tick");
            }
            state.try_arm()
        };

        Ok(self.spawn_if_armed(armed))
    }

    fn spawn_if_armed(&self, generation: Option<u64>) -> bool {
        let Some(generation) = generation else {
            return false;
        };

        info!("Both triggers held, arming correction loop #{}", generation);
        let worker = CorrectionWorker::create(self.state.clone(), self.pointer.clone(), generation);
        self.runtime.spawn(worker.run_to_completion());
        true
    }

    /// Switches the active weapon and copies its offsets into the active state.
    ///
    /// A running loop picks the new values up on its next tick.
    pub fn activate_weapon(&self, slot: WeaponSlot, offsets: RecoilOffsets) -> Result<(), EngineError> {
        let mut state = self.lock()?;
        state.active_weapon = slot;
        state.offsets = offsets;
        info!(
            "Active weapon: {} (x={:.3}, y={:.2})",
            slot, offsets.horizontal, offsets.vertical
        );
        Ok(())
    }

    pub fn active_weapon(&self) -> Result<WeaponSlot, EngineError> {
        Ok(self.lock()?.active_weapon)
    }

    /// Replaces the active offsets without changing the active weapon
    pub fn set_active_offsets(&self, offsets: RecoilOffsets) -> Result<(), EngineError> {
        self.lock()?.offsets = offsets;
        debug!(
            "Active offsets updated (x={:.3}, y={:.2})",
            offsets.horizontal, offsets.vertical
        );
        Ok(())
    }

    /// Updates the active offsets only if `slot` is the active weapon.
    ///
    /// Returns whether the engine took the values.
    pub fn refresh_slot(&self, slot: WeaponSlot, offsets: RecoilOffsets) -> Result<bool, EngineError> {
        let mut state = self.lock()?;
        if state.active_weapon != slot {
            return Ok(false);
        }
        state.offsets = offsets;
        debug!("Active {} offsets refreshed", slot);
        Ok(true)
    }

    pub fn set_recoil_x(&self, value: f64) -> Result<(), EngineError> {
        self.lock()?.offsets.horizontal = value;
        info!("Active recoil X updated to {:.3}", value);
        Ok(())
    }

    pub fn set_recoil_y(&self, value: f64) -> Result<(), EngineError> {
        self.lock()?.offsets.vertical = value;
        info!("Active recoil Y updated to {:.2}", value);
        Ok(())
    }

    pub fn active_offsets(&self) -> Result<RecoilOffsets, EngineError> {
        Ok(self.lock()?.offsets)
    }

    /// Caller-supplied scalar applied on top of sensitivity (default 1.0)
    pub fn set_factor(&self, factor: f64) -> Result<(), EngineError> {
        if !factor.is_finite() {
            warn!("Ignoring non-finite correction factor {}", factor);
            return Ok(());
        }
        self.lock()?.factor = factor;
        info!("Correction factor set to {:.3}", factor);
        Ok(())
    }

    /// New tuning takes effect on the next tick
    pub fn apply_tuning(&self, tuning: TuningParameters) -> Result<(), EngineError> {
        self.lock()?.tuning = tuning;
        debug!("Engine tuning updated: {:?}", tuning);
        Ok(())
    }

    /// Enables correction; arms immediately if both triggers are already held
    pub fn start(&self) -> Result<(), EngineError> {
        self.set_correction_enabled(true)
    }

    /// Disables correction; a running loop exits within one tick
    pub fn stop(&self) -> Result<(), EngineError> {
        self.set_correction_enabled(false)
    }

    /// Returns the new state
    pub fn toggle_correction(&self) -> Result<bool, EngineError> {
        self.update_switch(Switch::Correction, |enabled| !enabled)
    }

    pub fn set_correction_enabled(&self, enabled: bool) -> Result<(), EngineError> {
        self.update_switch(Switch::Correction, |_| enabled)?;
        Ok(())
    }

    /// Master switch; folded into the loop's continuation condition
    pub fn set_system_enabled(&self, enabled: bool) -> Result<(), EngineError> {
        self.update_switch(Switch::System, |_| enabled)?;
        Ok(())
    }

    /// Returns the new state
    pub fn toggle_system(&self) -> Result<bool, EngineError> {
        self.update_switch(Switch::System, |enabled| !enabled)
    }

    /// Reads, rewrites and re-arms under one lock so concurrent toggles never
    /// lose a flip
    fn update_switch(
        &self,
        switch: Switch,
        update: impl FnOnce(bool) -> bool,
    ) -> Result<bool, EngineError> {
        let (enabled, armed) = {
            let mut state = self.lock()?;
            let flag = match switch {
                Switch::Correction => &mut state.correction_enabled,
                Switch::System => &mut state.system_enabled,
            };
            *flag = update(*flag);
            let enabled = *flag;
            (enabled, state.try_arm())
        };
        match switch {
            Switch::Correction => {
                info!("Recoil correction {}", if enabled { "enabled" } else { "disabled" })
            }
            Switch::System => info!("System {}", if enabled { "enabled" } else { "disabled" }),
        }
        self.spawn_if_armed(armed);
        Ok(enabled)
    }

    pub fn system_enabled(&self) -> Result<bool, EngineError> {
        Ok(self.lock()?.system_enabled)
    }

    /// Records the current agent and scope (bookkeeping only)
    pub fn set_agent_scope(&self, agent: &str, scope: &str) -> Result<(), EngineError> {
        let mut state = self.lock()?;
        state.agent = agent.to_string();
        state.scope = scope.to_string();
        info!("Agent set to {}, scope {}", agent, scope);
        Ok(())
    }

    pub fn agent_scope(&self) -> Result<(String, String), EngineError> {
        let state = self.lock()?;
        Ok((state.agent.clone(), state.scope.clone()))
    }

    pub fn snapshot(&self) -> Result<EngineSnapshot, EngineError> {
        let state = self.lock()?;
        Ok(EngineSnapshot {
            phase: state.phase(),
            active_weapon: state.active_weapon,
            offsets: state.offsets,
            right_held: state.right_held,
            left_held: state.left_held,
            correction_enabled: state.correction_enabled,
            system_enabled: state.system_enabled,
            factor: state.factor,
            loop_generation: state.loop_generation,
        })
    }

    pub fn phase(&self) -> Result<EnginePhase, EngineError> {
        Ok(self.lock()?.phase())
    }

    pub fn session_stats(&self) -> Result<SessionStats, EngineError> {
        let state = self.lock()?;
        Ok(SessionStats {
            session_start: self.session_start,
            session_duration: Local::now() - self.session_start,
            loops_started: state.stats.loops_started,
            ticks: state.stats.ticks,
            corrections_applied: state.stats.corrections_applied,
            current_factor: state.factor,
        })
    }
}
