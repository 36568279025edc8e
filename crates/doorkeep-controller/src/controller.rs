//! The lock controller.
//!
//! [`LockController`] owns the door's [`StateMachine`] and the single armed
//! wait. Attempts and overrides come in through [`handle_attempt`] and
//! [`override_open`]; door-sensor confirmations and timeouts come back from
//! the wait task spawned on every arm.
//!
//! All state lives behind one mutex that is never held across an await.
//! Code evaluation runs unlocked, so a cycle can move on while a verdict is
//! pending; stale verdicts and stale wait outcomes are recognised by the
//! machine's generation and dropped.
//!
//! [`handle_attempt`]: LockController::handle_attempt
//! [`override_open`]: LockController::override_open

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use doorkeep_core::constants::{
    DOOR_OPEN_WAIT, LIGHTS_OFF_CODE, LIGHTS_ON_CODE, OPEN_WAIT, OTP_NAME, RESET_TO_IDLE,
    SENSOR_POLL_INTERVAL,
};
use doorkeep_core::{Attempt, Clock, OverrideSource, SystemClock};
use doorkeep_hardware::{Actuator, ContactState, DoorSensor};
use doorkeep_storage::{CodeBook, CodeStore, DenyReason, Verdict};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::notify::{Notifier, redact_code};
use crate::otp::{DisabledOtp, OtpValidator};
use crate::state_machine::{DoorState, StateMachine, StateTransition};

/// Controller timing and reserved codes.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// How long the latch waits for the door to open.
    pub open_wait: Duration,
    /// How long the door may stay open.
    pub close_wait: Duration,
    /// Reject indicator hold time.
    pub reset_idle: Duration,
    pub sensor_poll: Duration,
    pub lights_on_code: String,
    pub lights_off_code: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            open_wait: OPEN_WAIT,
            close_wait: DOOR_OPEN_WAIT,
            reset_idle: RESET_TO_IDLE,
            sensor_poll: SENSOR_POLL_INTERVAL,
            lights_on_code: LIGHTS_ON_CODE.to_string(),
            lights_off_code: LIGHTS_OFF_CODE.to_string(),
        }
    }
}

impl ControllerConfig {
    pub fn with_open_wait(mut self, open_wait: Duration) -> Self {
        self.open_wait = open_wait;
        self
    }

    pub fn with_close_wait(mut self, close_wait: Duration) -> Self {
        self.close_wait = close_wait;
        self
    }

    pub fn with_reset_idle(mut self, reset_idle: Duration) -> Self {
        self.reset_idle = reset_idle;
        self
    }

    pub fn with_sensor_poll(mut self, sensor_poll: Duration) -> Self {
        self.sensor_poll = sensor_poll;
        self
    }

    pub fn with_lights_codes(mut self, on: impl Into<String>, off: impl Into<String>) -> Self {
        self.lights_on_code = on.into();
        self.lights_off_code = off.into();
        self
    }
}

/// Latch, indicators and door contact.
#[derive(Clone)]
pub struct DoorHardware {
    pub actuator: Arc<dyn Actuator>,
    pub sensor: Arc<dyn DoorSensor>,
}

impl DoorHardware {
    pub fn new(actuator: impl Actuator + 'static, sensor: impl DoorSensor + 'static) -> Self {
        Self {
            actuator: Arc::new(actuator),
            sensor: Arc::new(sensor),
        }
    }
}

/// What the controller did with an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Door already unlocked, or nothing to evaluate.
    Ignored,
    /// Denied while still typing; waiting for more digits.
    Partial,
    Admitted { name: String, silent: bool },
    Rejected(DenyReason),
    /// Empty terminal submission; back to idle.
    Cleared,
    /// Lighting override code; carries the new override.
    Lights(bool),
    /// The cycle moved on while the code was evaluated.
    Preempted,
}

/// Input for [`LockController::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    Attempt(Attempt),
    Override(OverrideSource),
    DarkOutside(bool),
}

/// What an armed wait is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKind {
    /// Door to open after unlock (T_open).
    DoorOpen,
    /// Door to close again (T_close).
    DoorClose,
    /// Reject indicator hold (T_idle).
    ResetIdle,
}

impl WaitKind {
    fn expected_contact(self) -> Option<ContactState> {
        match self {
            WaitKind::DoorOpen => Some(ContactState::Open),
            WaitKind::DoorClose => Some(ContactState::Closed),
            WaitKind::ResetIdle => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitOutcome {
    Confirmed,
    TimedOut,
}

struct ArmedWait {
    generation: u64,
    kind: WaitKind,
    token: CancellationToken,
}

struct Cycle {
    machine: StateMachine,
    armed: Option<ArmedWait>,
    dark_outside: bool,
    lights_override: Option<bool>,
}

impl Cycle {
    fn disarm(&mut self) {
        if let Some(wait) = self.armed.take() {
            wait.token.cancel();
            debug!(kind = ?wait.kind, generation = wait.generation, "wait cancelled");
        }
    }

    fn ambient_light(&self) -> bool {
        self.lights_override.unwrap_or(self.dark_outside)
    }
}

enum Decision {
    Admit { name: String, silent: bool },
    Deny(DenyReason),
    Lights(bool),
}

struct Inner<S> {
    codebook: CodeBook<S>,
    hardware: DoorHardware,
    otp: Arc<dyn OtpValidator>,
    clock: Arc<dyn Clock>,
    notifier: Notifier,
    config: ControllerConfig,
    cycle: Mutex<Cycle>,
}

/// Drives one door through its lock cycle.
///
/// Cheap to clone; clones share the same door. Must be used inside a Tokio
/// runtime, since arming a wait spawns a task.
pub struct LockController<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for LockController<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub struct LockControllerBuilder<S> {
    codebook: CodeBook<S>,
    hardware: DoorHardware,
    notifier: Notifier,
    config: ControllerConfig,
    otp: Arc<dyn OtpValidator>,
    clock: Arc<dyn Clock>,
}

impl<S: CodeStore + 'static> LockControllerBuilder<S> {
    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn otp(mut self, otp: impl OtpValidator + 'static) -> Self {
        self.otp = Arc::new(otp);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the controller and engage the latch.
    pub fn build(self) -> LockController<S> {
        let controller = LockController {
            inner: Arc::new(Inner {
                codebook: self.codebook,
                hardware: self.hardware,
                otp: self.otp,
                clock: self.clock,
                notifier: self.notifier,
                config: self.config,
                cycle: Mutex::new(Cycle {
                    machine: StateMachine::new(),
                    armed: None,
                    dark_outside: false,
                    lights_override: None,
                }),
            }),
        };
        controller.actuate("lock", controller.inner.hardware.actuator.lock());
        controller
    }
}

impl<S: CodeStore + 'static> LockController<S> {
    /// Start building a controller.
    ///
    /// # Arguments
    ///
    /// * `codebook` - Codes checked on every attempt
    /// * `hardware` - Latch, indicators and door contact
    /// * `notifier` - Outbound operator notifications
    ///
    /// # Returns
    ///
    /// A builder with default timings, no one-time passwords and the
    /// system clock.
    pub fn builder(
        codebook: CodeBook<S>,
        hardware: DoorHardware,
        notifier: Notifier,
    ) -> LockControllerBuilder<S> {
        LockControllerBuilder {
            codebook,
            hardware,
            notifier,
            config: ControllerConfig::default(),
            otp: Arc::new(DisabledOtp),
            clock: Arc::new(SystemClock),
        }
    }

    /// Current door state.
    ///
    /// A snapshot: waits running in the background may move the door on
    /// right after this returns.
    pub fn state(&self) -> DoorState {
        self.cycle().machine.current_state()
    }

    pub fn generation(&self) -> u64 {
        self.cycle().machine.generation()
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> Vec<StateTransition> {
        self.cycle().machine.history().iter().cloned().collect()
    }

    /// Effective ambient light: the override if set, else the dark-outside input.
    pub fn ambient_light(&self) -> bool {
        self.cycle().ambient_light()
    }

    pub fn codebook(&self) -> &CodeBook<S> {
        &self.inner.codebook
    }

    /// Present a code.
    ///
    /// Ignored while the door is unlocked. Otherwise the cycle restarts in
    /// `Presenting` and the code is checked against the one-time password
    /// (terminal attempts only), the lighting codes and the code book.
    pub async fn handle_attempt(&self, attempt: Attempt) -> AttemptOutcome {
        let redacted = redact_code(&attempt.digits);

        let generation = {
            let mut cycle = self.cycle();
            let state = cycle.machine.current_state();
            if !state.is_locked() {
                debug!(state = %state, digits = %redacted, "attempt ignored while unlocked");
                return AttemptOutcome::Ignored;
            }

            if attempt.digits.is_empty() {
                if !attempt.is_terminal() {
                    return AttemptOutcome::Ignored;
                }
                self.enter_idle(&mut cycle);
                return AttemptOutcome::Cleared;
            }

            cycle.disarm();
            if !self.transition(&mut cycle, DoorState::Presenting) {
                return AttemptOutcome::Ignored;
            }
            self.actuate("wait", self.inner.hardware.actuator.wait());
            cycle.machine.generation()
        };

        let decision = self.decide(&attempt).await;

        let mut cycle = self.cycle();
        if cycle.machine.generation() != generation {
            warn!(digits = %redacted, "cycle moved on during evaluation, discarding verdict");
            return AttemptOutcome::Preempted;
        }

        match decision {
            Decision::Admit { name, silent } => {
                if !self.transition(&mut cycle, DoorState::AwaitingOpen) {
                    return AttemptOutcome::Ignored;
                }
                info!(digits = %redacted, name = %name, silent, "unlocked with code");
                self.actuate("unlock", self.inner.hardware.actuator.unlock());
                self.inner.notifier.opened(&attempt.digits, &name, silent);
                self.arm(&mut cycle, WaitKind::DoorOpen);
                AttemptOutcome::Admitted { name, silent }
            }
            Decision::Deny(reason) if attempt.is_terminal() => {
                if !self.transition(&mut cycle, DoorState::Rejecting) {
                    return AttemptOutcome::Ignored;
                }
                info!(digits = %redacted, reason = %reason, "invalid code");
                self.actuate("reject", self.inner.hardware.actuator.reject());
                self.inner.notifier.invalid_code(&attempt.digits);
                self.arm(&mut cycle, WaitKind::ResetIdle);
                AttemptOutcome::Rejected(reason)
            }
            Decision::Deny(reason) => {
                debug!(len = attempt.digits.len(), reason = %reason, "partial code not admitted");
                AttemptOutcome::Partial
            }
            Decision::Lights(on) => {
                info!(on, "lights override");
                cycle.lights_override = Some(on);
                self.apply_ambient(&cycle);
                self.enter_idle(&mut cycle);
                AttemptOutcome::Lights(on)
            }
        }
    }

    /// Unlock without evaluating a code.
    ///
    /// Accepted while locked, including mid-entry and while rejecting.
    /// Returns `false` when the door is already unlocked.
    pub fn override_open(&self, source: OverrideSource) -> bool {
        let mut cycle = self.cycle();
        let state = cycle.machine.current_state();
        if !state.is_locked() {
            info!(source = %source, state = %state, "override ignored, door already unlocked");
            return false;
        }

        cycle.disarm();
        if !self.transition(&mut cycle, DoorState::AwaitingOpen) {
            return false;
        }
        info!(source = %source, "unlocked with override");
        self.actuate("unlock", self.inner.hardware.actuator.unlock());
        self.inner.notifier.override_open(source);
        self.arm(&mut cycle, WaitKind::DoorOpen);
        true
    }

    /// Update the dark-outside input for the ambient light.
    pub fn set_dark_outside(&self, dark: bool) {
        let mut cycle = self.cycle();
        if cycle.dark_outside == dark {
            return;
        }
        debug!(dark, "dark outside changed");
        cycle.dark_outside = dark;
        self.apply_ambient(&cycle);
    }

    /// Cancel any armed wait, relock and return to idle.
    pub fn shutdown(&self) {
        let mut cycle = self.cycle();
        info!(state = %cycle.machine.current_state(), "controller shutting down");
        self.enter_idle(&mut cycle);
    }

    /// Handle events in order until the sender side closes.
    pub async fn run(&self, mut events: mpsc::Receiver<ControllerEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                ControllerEvent::Attempt(attempt) => {
                    let outcome = self.handle_attempt(attempt).await;
                    debug!(?outcome, "attempt handled");
                }
                ControllerEvent::Override(source) => {
                    self.override_open(source);
                }
                ControllerEvent::DarkOutside(dark) => self.set_dark_outside(dark),
            }
        }
        debug!("controller event stream closed");
    }

    async fn decide(&self, attempt: &Attempt) -> Decision {
        let now = self.inner.clock.now();

        if attempt.is_terminal() && self.inner.otp.validate(&attempt.digits, now) {
            return Decision::Admit {
                name: OTP_NAME.to_string(),
                silent: true,
            };
        }

        let config = &self.inner.config;
        if attempt.digits == config.lights_on_code {
            return Decision::Lights(true);
        }
        if attempt.digits == config.lights_off_code {
            return Decision::Lights(false);
        }

        let evaluation = self.inner.codebook.evaluate(&attempt.digits, now).await;
        match evaluation.verdict {
            Verdict::Admit { silent } => Decision::Admit {
                name: evaluation.name.unwrap_or_default(),
                silent,
            },
            Verdict::Deny(reason) => Decision::Deny(reason),
        }
    }

    fn cycle(&self) -> MutexGuard<'_, Cycle> {
        self.inner
            .cycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, cycle: &mut Cycle, to: DoorState) -> bool {
        let held = cycle.machine.time_in_current_state();
        match cycle.machine.transition_to(to) {
            Ok(transition) => {
                debug!(
                    from = %transition.from,
                    to = %transition.to,
                    generation = transition.generation,
                    held_ms = held.as_millis() as u64,
                    "state transition"
                );
                true
            }
            Err(e) => {
                error!(error = %e, "rejected state transition");
                false
            }
        }
    }

    fn enter_idle(&self, cycle: &mut Cycle) {
        cycle.disarm();
        if cycle.machine.current_state() == DoorState::Idle {
            return;
        }
        if !self.transition(cycle, DoorState::Idle) {
            cycle.machine.reset();
        }
        self.actuate("lock", self.inner.hardware.actuator.lock());
    }

    fn apply_ambient(&self, cycle: &Cycle) {
        let on = cycle.ambient_light();
        self.actuate("ambient light", self.inner.hardware.actuator.set_ambient_light(on));
    }

    fn actuate(&self, action: &'static str, result: doorkeep_hardware::Result<()>) {
        if let Err(e) = result {
            error!(action, error = %e, "actuator call failed");
        }
    }

    /// Replace the armed wait with a new one for the current generation.
    fn arm(&self, cycle: &mut Cycle, kind: WaitKind) {
        cycle.disarm();

        let config = &self.inner.config;
        let timeout = match kind {
            WaitKind::DoorOpen => config.open_wait,
            WaitKind::DoorClose => config.close_wait,
            WaitKind::ResetIdle => config.reset_idle,
        };
        let generation = cycle.machine.generation();
        let token = CancellationToken::new();
        cycle.armed = Some(ArmedWait {
            generation,
            kind,
            token: token.clone(),
        });
        debug!(?kind, generation, ?timeout, "wait armed");

        let controller = self.clone();
        tokio::spawn(async move {
            controller.watch(generation, kind, timeout, token).await;
        });
    }

    /// Race the timeout, the door contact and cancellation.
    async fn watch(
        self,
        generation: u64,
        kind: WaitKind,
        timeout: Duration,
        token: CancellationToken,
    ) {
        let expected = kind.expected_contact();
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        let mut poll = tokio::time::interval(self.inner.config.sensor_poll);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let outcome = loop {
            tokio::select! {
                biased;
                () = token.cancelled() => return,
                () = &mut deadline => {
                    // A change that landed between polls still counts
                    break if expected.is_some_and(|state| self.contact_is(state)) {
                        WaitOutcome::Confirmed
                    } else {
                        WaitOutcome::TimedOut
                    };
                }
                _ = poll.tick(), if expected.is_some() => {
                    if expected.is_some_and(|state| self.contact_is(state)) {
                        break WaitOutcome::Confirmed;
                    }
                }
            }
        };

        self.finish_wait(generation, kind, outcome);
    }

    fn contact_is(&self, expected: ContactState) -> bool {
        match self.inner.hardware.sensor.contact_state() {
            Ok(state) => state == expected,
            Err(e) => {
                warn!(error = %e, "door sensor read failed");
                false
            }
        }
    }

    fn finish_wait(&self, generation: u64, kind: WaitKind, outcome: WaitOutcome) {
        let mut cycle = self.cycle();
        let still_armed = cycle
            .armed
            .as_ref()
            .is_some_and(|wait| wait.generation == generation && wait.kind == kind);
        if !still_armed || cycle.machine.generation() != generation {
            debug!(?kind, generation, "stale wait outcome ignored");
            return;
        }
        cycle.armed = None;

        match (kind, outcome) {
            (WaitKind::DoorOpen, WaitOutcome::Confirmed) => {
                info!("door opened");
                if self.transition(&mut cycle, DoorState::AwaitingClose) {
                    self.arm(&mut cycle, WaitKind::DoorClose);
                }
            }
            (WaitKind::DoorOpen, WaitOutcome::TimedOut) => {
                warn!("door never opened, relocking");
                self.inner.notifier.door_not_opened();
                self.enter_idle(&mut cycle);
            }
            (WaitKind::DoorClose, WaitOutcome::Confirmed) => {
                info!("door closed, relocking");
                self.enter_idle(&mut cycle);
            }
            (WaitKind::DoorClose, WaitOutcome::TimedOut) => {
                warn!("door not closed, relocking");
                self.inner.notifier.door_not_closed();
                self.enter_idle(&mut cycle);
            }
            (WaitKind::ResetIdle, _) => {
                debug!("reject hold elapsed");
                self.enter_idle(&mut cycle);
            }
        }
    }
}
