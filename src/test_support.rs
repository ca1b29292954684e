//! Test doubles shared by unit tests

use crate::correction::{PointerDevice, PointerError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Pointer that records every relative move instead of touching the host
#[derive(Debug, Default)]
pub struct RecordingPointer {
    moves: Mutex<Vec<(i32, i32)>>,
    fail_after: Mutex<Option<usize>>,
    in_flight: AtomicUsize,
    overlapped: AtomicBool,
}

impl RecordingPointer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `count` moves, then rejects every further one until healed
    pub fn failing_after(count: usize) -> Self {
        Self {
            fail_after: Mutex::new(Some(count)),
            ..Self::default()
        }
    }

    pub fn heal(&self) {
        *self.fail_after.lock().unwrap() = None;
    }

    pub fn moves(&self) -> Vec<(i32, i32)> {
        self.moves.lock().unwrap().clone()
    }

    /// Whether two moves were ever issued at the same time
    pub fn overlapping_moves_seen(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }
}

impl PointerDevice for RecordingPointer {
    fn position(&self) -> Result<(i32, i32), PointerError> {
        let moves = self.moves.lock().unwrap();
        Ok(moves
            .iter()
            .fold((0, 0), |(x, y), (dx, dy)| (x + dx, y + dy)))
    }

    fn move_relative(&self, dx: i32, dy: i32) -> Result<(), PointerError> {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        let result = {
            let mut moves = self.moves.lock().unwrap();
            match *self.fail_after.lock().unwrap() {
                Some(limit) if moves.len() >= limit => {
                    Err(PointerError::CommandFailed("injected failure".to_string()))
                }
                _ => {
                    moves.push((dx, dy));
                    Ok(())
                }
            }
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn move_to(&self, _x: i32, _y: i32) -> Result<(), PointerError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}
