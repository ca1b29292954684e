//! Recoil correction: the control surface, the per-arming loop and the
//! fractional motion carry-over between ticks.

pub mod accumulator;
pub mod engine;
pub mod error;
pub mod pointer;
pub mod worker;

pub use accumulator::MotionAccumulator;
pub use engine::{
    compute_correction, CorrectionEngine, EnginePhase, EngineSnapshot, SessionStats, TriggerButton,
    MOVEMENT_THRESHOLD,
};
pub use error::EngineError;
pub use pointer::{PointerDevice, PointerError};
