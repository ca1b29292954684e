//! Correction loop with statum state machine
//!
//! One worker is spawned per arming. It re-reads the active state every tick,
//! so weapon switches and tuning edits apply on the next iteration without
//! restarting the loop.
//!
//! ```text
//! Armed ──(continuation false | error)──► Disarming ──► retire (slot released)
//! ```
//!
//! # Tick
//!
//! ```text
//! lock ─► continue? ─no─► release slot, stop
//!           │yes
//!           ▼
//!      copy offsets/factor/tuning ─► unlock
//!           ▼
//!      compute + clamp ─► accumulator ─► pointer.move_relative
//! ```

use super::accumulator::MotionAccumulator;
use super::engine::{compute_correction, release_loop_slot, ActiveState, MOVEMENT_THRESHOLD};
use super::error::EngineError;
use super::pointer::PointerDevice;
use statum::{machine, state};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, trace};

/// Lifecycle of a single correction loop
#[state]
#[derive(Debug, Clone)]
pub enum WorkerState {
    Armed,     // Ticking
    Disarming, // Left the loop, slot not yet released
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Keep going after the interval
    Continue(Duration),
    /// Continuation condition observed false; the slot is already released
    Stop,
}

/// A correction loop instance bound to one arming generation
#[machine]
pub(crate) struct CorrectionWorker<S: WorkerState> {
    shared: Arc<Mutex<ActiveState>>,
    pointer: Arc<dyn PointerDevice>,
    accumulator: MotionAccumulator,
    generation: u64,
    retired: bool,
    unreported_corrections: u64,
}

impl CorrectionWorker<Armed> {
    pub(crate) fn create(
        shared: Arc<Mutex<ActiveState>>,
        pointer: Arc<dyn PointerDevice>,
        generation: u64,
    ) -> Self {
        debug!("Creating correction worker #{}", generation);

        Self::new(
            shared,
            pointer,
            MotionAccumulator::new(), // remainders start at zero per loop
            generation,
            false,                    // retired
            0,                        // unreported_corrections
        )
    }

    /// Runs one iteration.
    ///
    /// The continuation check and the slot release happen under one lock, so
    /// a press racing with this tick either is seen here or finds the slot
    /// free and arms a new loop.
    pub fn tick(&mut self) -> Result<TickOutcome, EngineError> {
        let (offsets, factor, tuning) = {
            let mut state = self.shared.lock().map_err(|_| EngineError::LockPoisoned)?;
            state.stats.corrections_applied += self.unreported_corrections;
            self.unreported_corrections = 0;

            if !state.should_continue() || state.loop_generation != self.generation {
                release_loop_slot(&mut state, self.generation);
                self.retired = true;
                return Ok(TickOutcome::Stop);
            }

            state.stats.ticks += 1;
            (state.offsets, state.factor, state.tuning)
        };

        let interval = tuning
            .interval()
            .ok_or(EngineError::InvalidInterval(tuning.correction_interval_secs))?;

        if offsets.vertical <= 0.0 && offsets.horizontal == 0.0 {
            trace!("Nothing to correct this tick");
            return Ok(TickOutcome::Continue(interval));
        }

        let (horizontal, vertical) = compute_correction(offsets, factor, &tuning)?;
        if horizontal.abs() <= MOVEMENT_THRESHOLD && vertical.abs() <= MOVEMENT_THRESHOLD {
            return Ok(TickOutcome::Continue(interval));
        }

        let (dx, dy) = self.accumulator.accumulate(horizontal, vertical);
        if dx != 0 || dy != 0 {
            self.pointer.move_relative(dx, dy)?;
            self.unreported_corrections += 1;
            trace!("Moved pointer by ({}, {})", dx, dy);
        }

        Ok(TickOutcome::Continue(interval))
    }

    /// Ticks until the continuation condition fails or an error occurs
    pub async fn run(mut self) -> CorrectionWorker<Disarming> {
        info!("Correction loop #{} started", self.generation);

        loop {
            match self.tick() {
                Ok(TickOutcome::Continue(interval)) => tokio::time::sleep(interval).await,
                Ok(TickOutcome::Stop) => {
                    debug!("Continuation condition false, loop #{} exits", self.generation);
                    break;
                }
                Err(e) => {
                    error!("Correction loop #{} failed: {}", self.generation, e);
                    break;
                }
            }
        }

        self.transition()
    }

    /// Runs the loop and always releases its slot afterwards
    pub async fn run_to_completion(self) {
        let generation = self.generation;
        self.run().await.retire();
        debug!("Correction worker #{} finished", generation);
    }
}

impl CorrectionWorker<Disarming> {
    /// Releases the loop slot if this worker still holds it.
    ///
    /// A poisoned lock is recovered here so an errored loop never leaves the
    /// engine unable to re-arm.
    pub fn retire(self) {
        let mut state = match self.shared.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.stats.corrections_applied += self.unreported_corrections;
        if !self.retired {
            release_loop_slot(&mut state, self.generation);
        }
        info!(
            "Correction loop #{} stopped ({} ticks, {} corrections this session)",
            self.generation, state.stats.ticks, state.stats.corrections_applied
        );
    }
}
