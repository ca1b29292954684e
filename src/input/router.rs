//! Input Event Router - host events to engine and profile actions
//!
//! Runs as one tokio task fed by the host listener. For every event:
//!
//! 1. left/right button presses and releases go to the engine unconditionally
//! 2. if a hotkey recording is pending, the event's identifier becomes the
//!    new binding and nothing is dispatched
//! 3. while the master switch is off only the master toggle is dispatched
//! 4. the identifier is resolved against weapon and reserved bindings
//!
//! Handling is synchronous and short: flag flips on the engine and a profile
//! read. The router never waits on the filesystem or the correction loop.

use super::hotkeys::{ControlAction, HotkeyAction, HotkeyDispatcher};
use super::{ButtonState, InputError, InputEvent, MouseButton};
use crate::correction::{CorrectionEngine, TriggerButton};
use crate::profiles::{HotkeyBinding, ProfileError, ProfileStore, WeaponSlot};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Requests the shell receives from the router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellCommand {
    OpenSettings,
}

/// Requests the shell sends to the router
#[derive(Debug)]
pub enum RouterCommand {
    /// Record the next press as `binding`; answers with the stored identifier
    CaptureHotkey {
        binding: HotkeyBinding,
        response_tx: oneshot::Sender<Result<String, ProfileError>>,
    },
    CancelCapture,
}

/// What handling one event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A trigger button changed; `armed` if this event spawned the loop
    ButtonUpdated { armed: bool },
    WeaponSelected(WeaponSlot),
    /// Secondary hotkey while the secondary weapon is disabled
    SecondaryDisabled,
    Control(ControlAction),
    /// Identifier stored as a new binding
    Captured(String),
    Ignored,
}

struct PendingCapture {
    binding: HotkeyBinding,
    response_tx: oneshot::Sender<Result<String, ProfileError>>,
}

pub struct InputEventRouter {
    engine: Arc<CorrectionEngine>,
    store: ProfileStore,
    dispatcher: HotkeyDispatcher,
    shell_tx: mpsc::Sender<ShellCommand>,
    capture: Option<PendingCapture>,
    events_handled: u64,
}

impl InputEventRouter {
    pub fn new(
        engine: Arc<CorrectionEngine>,
        store: ProfileStore,
        shell_tx: mpsc::Sender<ShellCommand>,
    ) -> Self {
        Self {
            engine,
            store,
            dispatcher: HotkeyDispatcher::new(),
            shell_tx,
            capture: None,
            events_handled: 0,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    pub fn handle_command(&mut self, command: RouterCommand) {
        match command {
            RouterCommand::CaptureHotkey {
                binding,
                response_tx,
            } => {
                if self.capture.is_some() {
                    warn!("Replacing pending hotkey recording with {}", binding);
                }
                info!("Recording next input as {}", binding);
                self.capture = Some(PendingCapture {
                    binding,
                    response_tx,
                });
            }
            RouterCommand::CancelCapture => {
                if let Some(pending) = self.capture.take() {
                    info!("Hotkey recording for {} cancelled", pending.binding);
                }
            }
        }
    }

    pub fn handle_event(&mut self, event: InputEvent) -> Result<RouteOutcome, InputError> {
        self.events_handled += 1;
        debug!("Routing {} from {}", event, event.timestamp().format("%H:%M:%S%.3f"));

        let mut outcome = RouteOutcome::Ignored;
        if let InputEvent::Button { button, state, .. } = &event {
            let trigger = match button {
                MouseButton::Left => Some(TriggerButton::Left),
                MouseButton::Right => Some(TriggerButton::Right),
                _ => None,
            };
            if let Some(trigger) = trigger {
                let armed = self
                    .engine
                    .handle_button(trigger, *state == ButtonState::Pressed)?;
                outcome = RouteOutcome::ButtonUpdated { armed };
            }
        }

        let Some(identifier) = event.identifier() else {
            return Ok(outcome);
        };

        if let Some(pending) = self.capture.take() {
            return self.finish_capture(pending, &identifier);
        }

        if !self.engine.system_enabled()?
            && ControlAction::from_identifier(&identifier) != Some(ControlAction::ToggleMasterEnable)
        {
            debug!("System disabled, not dispatching {}", identifier);
            return Ok(outcome);
        }

        let settings = self.store.snapshot()?;
        match self.dispatcher.resolve(&identifier, &settings) {
            Some(HotkeyAction::SelectWeapon(slot)) => self.select_weapon(slot, settings.secondary_enabled),
            Some(HotkeyAction::Control(action)) => self.run_control(action),
            None => Ok(outcome),
        }
    }

    fn finish_capture(
        &mut self,
        pending: PendingCapture,
        identifier: &str,
    ) -> Result<RouteOutcome, InputError> {
        let result = self
            .store
            .set_hotkey(pending.binding, Some(identifier))
            .map(|stored| stored.unwrap_or_else(|| identifier.to_string()));

        let outcome = match &result {
            Ok(stored) => {
                info!("{} recorded as {}", pending.binding, stored);
                Ok(RouteOutcome::Captured(stored.clone()))
            }
            Err(e) => {
                warn!("Could not store {}: {}", pending.binding, e);
                Ok(RouteOutcome::Ignored)
            }
        };

        if pending.response_tx.send(result).is_err() {
            debug!("Hotkey recording requester went away");
        }
        outcome
    }

    fn select_weapon(
        &self,
        slot: WeaponSlot,
        secondary_enabled: bool,
    ) -> Result<RouteOutcome, InputError> {
        if slot == WeaponSlot::Secondary && !secondary_enabled {
            warn!("Secondary weapon hotkey pressed but secondary weapon is disabled");
            return Ok(RouteOutcome::SecondaryDisabled);
        }

        let offsets = self.store.offsets(slot)?;
        self.engine.activate_weapon(slot, offsets)?;
        Ok(RouteOutcome::WeaponSelected(slot))
    }

    fn run_control(&self, action: ControlAction) -> Result<RouteOutcome, InputError> {
        match action {
            ControlAction::ToggleCorrection => {
                self.engine.toggle_correction()?;
            }
            ControlAction::OpenSettings => {
                if let Err(e) = self.shell_tx.try_send(ShellCommand::OpenSettings) {
                    warn!("Could not forward open-settings request: {}", e);
                }
            }
            ControlAction::ToggleMasterEnable => {
                self.engine.toggle_system()?;
            }
        }
        Ok(RouteOutcome::Control(action))
    }

    /// Processes events and commands until shutdown or until the event source closes
    pub async fn run_until_shutdown(
        mut self,
        mut events: mpsc::Receiver<InputEvent>,
        mut commands: mpsc::Receiver<RouterCommand>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        info!("Input router started");

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Shutdown signal received for input router");
                    break;
                }

                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("Router command channel closed");
                        break;
                    }
                },

                event = events.recv() => match event {
                    Some(event) => {
                        if let Err(e) = self.handle_event(event) {
                            error!("Error routing input event: {}", e);
                        }
                    }
                    None => {
                        warn!("Input event channel closed");
                        break;
                    }
                },
            }
        }

        info!("Input router stopped after {} events", self.events_handled);
    }
}

/// Handle for the router task
#[derive(Debug)]
pub struct RouterHandle {
    commands: mpsc::Sender<RouterCommand>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task_handle: JoinHandle<()>,
}

impl RouterHandle {
    pub fn spawn(router: InputEventRouter, events: mpsc::Receiver<InputEvent>) -> Self {
        let (commands, command_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task_handle = tokio::spawn(router.run_until_shutdown(events, command_rx, shutdown_rx));
        debug!("Input router task spawned");

        Self {
            commands,
            shutdown_tx: Some(shutdown_tx),
            task_handle,
        }
    }

    /// Waits for the next press and stores it as `binding`
    pub async fn capture_hotkey(&self, binding: HotkeyBinding) -> Result<String, InputError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.commands
            .send(RouterCommand::CaptureHotkey {
                binding,
                response_tx,
            })
            .await
            .map_err(|e| InputError::ChannelError(e.to_string()))?;

        let stored = response_rx
            .await
            .map_err(|e| InputError::ChannelError(e.to_string()))??;
        Ok(stored)
    }

    pub async fn cancel_capture(&self) -> Result<(), InputError> {
        self.commands
            .send(RouterCommand::CancelCapture)
            .await
            .map_err(|e| InputError::ChannelError(e.to_string()))
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task_handle.await {
            error!("Input router task ended abnormally: {}", e);
        }
    }
}
