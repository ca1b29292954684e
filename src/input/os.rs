//! Host capabilities: global input hook and pointer backend
//!
//! Both OS handles live on dedicated threads. The hook thread blocks inside
//! the platform listener and forwards events with `try_send`, so a slow
//! router never stalls the host's input queue. The pointer thread owns the
//! injection handle and executes commands from a channel, which makes moves
//! fire-and-forget for the correction loop.
//!
//! Built without the `os-input` feature, both entry points report the
//! capability as unavailable.

use super::{InputError, InputEvent};
use crate::correction::{PointerDevice, PointerError};
use tokio::sync::mpsc;

/// How long startup waits for the hook thread to report a registration failure
pub const HOOK_STARTUP_GRACE_MS: u64 = 250;

/// Normalized identifier for a host key name as printed by the backend.
///
/// `KeyA` becomes `A`, `Num1` becomes `1`, everything else is upper-cased
/// (`F9`, `SHIFTLEFT`).
pub fn key_identifier(host_name: &str) -> Option<String> {
    let stripped = host_name
        .strip_prefix("Key")
        .filter(|rest| !rest.is_empty())
        .or_else(|| {
            host_name
                .strip_prefix("Num")
                .filter(|rest| rest.chars().all(|c| c.is_ascii_digit()) && !rest.is_empty())
        })
        .unwrap_or(host_name);
    super::normalize_identifier(stripped)
}

/// Handle of the running global listener
#[derive(Debug)]
pub struct ListenerHandle {
    thread_name: String,
}

impl ListenerHandle {
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }
}

#[cfg(feature = "os-input")]
mod backend {
    use super::*;
    use crate::input::{ButtonState, MouseButton, ScrollDirection};
    use enigo::{Coordinate, Enigo, Mouse, Settings};
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;
    use tracing::{debug, error, info, warn};

    enum PointerCommand {
        MoveRelative(i32, i32),
        MoveTo(i32, i32),
        Position(std_mpsc::Sender<Result<(i32, i32), PointerError>>),
    }

    /// Pointer backed by the host injection API
    pub struct HostPointer {
        commands: std_mpsc::Sender<PointerCommand>,
    }

    impl HostPointer {
        pub fn open() -> Result<Self, PointerError> {
            let (commands, command_rx) = std_mpsc::channel::<PointerCommand>();
            let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), PointerError>>();

            std::thread::Builder::new()
                .name("pointer".to_string())
                .spawn(move || {
                    let mut enigo = match Enigo::new(&Settings::default()) {
                        Ok(enigo) => {
                            let _ = ready_tx.send(Ok(()));
                            enigo
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(PointerError::Unavailable(e.to_string())));
                            return;
                        }
                    };

                    while let Ok(command) = command_rx.recv() {
                        match command {
                            PointerCommand::MoveRelative(dx, dy) => {
                                if let Err(e) = enigo.move_mouse(dx, dy, Coordinate::Rel) {
                                    warn!("Relative move ({}, {}) rejected: {}", dx, dy, e);
                                }
                            }
                            PointerCommand::MoveTo(x, y) => {
                                if let Err(e) = enigo.move_mouse(x, y, Coordinate::Abs) {
                                    warn!("Absolute move to ({}, {}) rejected: {}", x, y, e);
                                }
                            }
                            PointerCommand::Position(reply) => {
                                let position = enigo
                                    .location()
                                    .map_err(|e| PointerError::CommandFailed(e.to_string()));
                                let _ = reply.send(position);
                            }
                        }
                    }
                    debug!("Pointer thread exiting");
                })
                .map_err(|e| PointerError::Unavailable(e.to_string()))?;

            ready_rx
                .recv()
                .map_err(|_| PointerError::Unavailable("pointer thread died".to_string()))??;
            info!("Pointer backend ready");
            Ok(Self { commands })
        }

        fn send(&self, command: PointerCommand) -> Result<(), PointerError> {
            self.commands
                .send(command)
                .map_err(|_| PointerError::Disconnected)
        }
    }

    impl PointerDevice for HostPointer {
        fn position(&self) -> Result<(i32, i32), PointerError> {
            let (reply_tx, reply_rx) = std_mpsc::channel();
            self.send(PointerCommand::Position(reply_tx))?;
            reply_rx
                .recv_timeout(Duration::from_millis(100))
                .map_err(|_| PointerError::Disconnected)?
        }

        fn move_relative(&self, dx: i32, dy: i32) -> Result<(), PointerError> {
            self.send(PointerCommand::MoveRelative(dx, dy))
        }

        fn move_to(&self, x: i32, y: i32) -> Result<(), PointerError> {
            self.send(PointerCommand::MoveTo(x, y))
        }

        fn name(&self) -> &str {
            "enigo"
        }
    }

    fn map_button(button: rdev::Button) -> MouseButton {
        match button {
            rdev::Button::Left => MouseButton::Left,
            rdev::Button::Right => MouseButton::Right,
            rdev::Button::Middle => MouseButton::Middle,
            rdev::Button::Unknown(1) => MouseButton::X1,
            rdev::Button::Unknown(2) => MouseButton::X2,
            rdev::Button::Unknown(other) => {
                debug!("Unmapped mouse button {}, treating as X2", other);
                MouseButton::X2
            }
        }
    }

    fn convert(event: rdev::EventType) -> Option<InputEvent> {
        match event {
            rdev::EventType::ButtonPress(button) => {
                Some(InputEvent::button(map_button(button), ButtonState::Pressed))
            }
            rdev::EventType::ButtonRelease(button) => {
                Some(InputEvent::button(map_button(button), ButtonState::Released))
            }
            rdev::EventType::KeyPress(key) => {
                key_identifier(&format!("{:?}", key)).and_then(|name| InputEvent::key(&name))
            }
            rdev::EventType::Wheel { delta_y, .. } => {
                ScrollDirection::from_delta(delta_y).map(InputEvent::scroll)
            }
            rdev::EventType::KeyRelease(_) | rdev::EventType::MouseMove { .. } => None,
        }
    }

    pub fn start_listener(tx: mpsc::Sender<InputEvent>) -> Result<ListenerHandle, InputError> {
        let thread_name = "input-hook".to_string();
        let (failure_tx, failure_rx) = std_mpsc::channel::<String>();

        std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                info!("Installing global input hook");
                let result = rdev::listen(move |event| {
                    let Some(input) = convert(event.event_type) else {
                        return;
                    };
                    if let Err(e) = tx.try_send(input) {
                        warn!("Dropping input event: {}", e);
                    }
                });

                if let Err(e) = result {
                    error!("Global input hook failed: {:?}", e);
                    let _ = failure_tx.send(format!("{:?}", e));
                }
            })
            .map_err(|e| InputError::HookUnavailable(e.to_string()))?;

        match failure_rx.recv_timeout(Duration::from_millis(HOOK_STARTUP_GRACE_MS)) {
            Ok(reason) => Err(InputError::HookUnavailable(reason)),
            Err(_) => {
                info!("Global input hook running on thread '{}'", thread_name);
                Ok(ListenerHandle { thread_name })
            }
        }
    }
}

#[cfg(not(feature = "os-input"))]
mod backend {
    use super::*;

    const UNAVAILABLE: &str = "built without the os-input feature";

    /// Placeholder when no host backend is compiled in
    pub struct HostPointer;

    impl HostPointer {
        pub fn open() -> Result<Self, PointerError> {
            Err(PointerError::Unavailable(UNAVAILABLE.to_string()))
        }
    }

    impl PointerDevice for HostPointer {
        fn position(&self) -> Result<(i32, i32), PointerError> {
            Err(PointerError::Unavailable(UNAVAILABLE.to_string()))
        }

        fn move_relative(&self, _dx: i32, _dy: i32) -> Result<(), PointerError> {
            Err(PointerError::Unavailable(UNAVAILABLE.to_string()))
        }

        fn move_to(&self, _x: i32, _y: i32) -> Result<(), PointerError> {
            Err(PointerError::Unavailable(UNAVAILABLE.to_string()))
        }
    }

    pub fn start_listener(_tx: mpsc::Sender<InputEvent>) -> Result<ListenerHandle, InputError> {
        Err(InputError::HookUnavailable(UNAVAILABLE.to_string()))
    }
}

pub use backend::{start_listener, HostPointer};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_key_names_normalize() {
        assert_eq!(key_identifier("KeyA").as_deref(), Some("A"));
        assert_eq!(key_identifier("Num1").as_deref(), Some("1"));
        assert_eq!(key_identifier("F9").as_deref(), Some("F9"));
        assert_eq!(key_identifier("ShiftLeft").as_deref(), Some("SHIFTLEFT"));
        assert_eq!(key_identifier("NumLock").as_deref(), Some("NUMLOCK"));
        assert_eq!(key_identifier("Key").as_deref(), Some("KEY"));
    }

    #[cfg(not(feature = "os-input"))]
    #[test]
    fn missing_backend_is_reported_as_unavailable() {
        assert!(matches!(HostPointer::open(), Err(PointerError::Unavailable(_))));
        let (tx, _rx) = mpsc::channel(1);
        assert!(matches!(start_listener(tx), Err(InputError::HookUnavailable(_))));
    }
}
