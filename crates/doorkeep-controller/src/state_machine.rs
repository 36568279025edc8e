//! Door lock state machine.
//!
//! # States
//!
//! - `Idle`: latch engaged, waiting for a code
//! - `Presenting`: a code is being entered or evaluated
//! - `Rejecting`: the last terminal code was denied; returns to `Idle` after a pause
//! - `AwaitingOpen`: latch released, waiting for the door to open
//! - `AwaitingClose`: door open, waiting for it to close
//!
//! # Valid Transitions
//!
//! - Idle → Presenting → AwaitingOpen | Rejecting | Idle
//! - Rejecting → Idle | Presenting | AwaitingOpen
//! - Idle | Presenting → AwaitingOpen (override)
//! - AwaitingOpen → AwaitingClose | Idle
//! - AwaitingClose → Idle
//!
//! Every transition bumps the machine's generation. Timers and sensor waits
//! remember the generation they were armed in and are ignored once it moves
//! on.
//!
//! # Examples
//!
//! ```
//! use doorkeep_controller::{DoorState, StateMachine};
//!
//! let mut machine = StateMachine::new();
//! assert_eq!(machine.current_state(), DoorState::Idle);
//!
//! machine.transition_to(DoorState::Presenting).unwrap();
//! assert_eq!(machine.generation(), 1);
//!
//! assert!(machine.transition_to(DoorState::AwaitingClose).is_err());
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use doorkeep_core::{Error, Result};

/// Maximum number of transitions kept for diagnostics.
const MAX_HISTORY_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorState {
    Idle,
    Presenting,
    AwaitingOpen,
    AwaitingClose,
    Rejecting,
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            DoorState::Idle => "Idle",
            DoorState::Presenting => "Presenting",
            DoorState::AwaitingOpen => "AwaitingOpen",
            DoorState::AwaitingClose => "AwaitingClose",
            DoorState::Rejecting => "Rejecting",
        };
        write!(f, "{}", state_str)
    }
}

impl DoorState {
    /// Check whether the door may move from this state to `target`.
    ///
    /// # Arguments
    ///
    /// * `target` - The state to move to
    ///
    /// # Returns
    ///
    /// `true` if the transition table allows it.
    ///
    /// # Examples
    ///
    /// ```
    /// use doorkeep_controller::DoorState;
    ///
    /// assert!(DoorState::Idle.can_transition_to(&DoorState::Presenting));
    /// assert!(!DoorState::AwaitingClose.can_transition_to(&DoorState::Presenting));
    /// ```
    pub fn can_transition_to(&self, target: &DoorState) -> bool {
        matches!(
            (self, target),
            // From Idle
            (DoorState::Idle, DoorState::Presenting | DoorState::AwaitingOpen)
            // From Presenting; a further key press restarts the presentation
            | (
                DoorState::Presenting,
                DoorState::Presenting
                    | DoorState::AwaitingOpen
                    | DoorState::Rejecting
                    | DoorState::Idle
            )
            // From Rejecting
            | (
                DoorState::Rejecting,
                DoorState::Idle | DoorState::Presenting | DoorState::AwaitingOpen
            )
            // From AwaitingOpen
            | (DoorState::AwaitingOpen, DoorState::AwaitingClose | DoorState::Idle)
            // From AwaitingClose
            | (DoorState::AwaitingClose, DoorState::Idle)
        )
    }

    /// Whether the latch is engaged in this state.
    pub fn is_locked(&self) -> bool {
        !matches!(self, DoorState::AwaitingOpen | DoorState::AwaitingClose)
    }
}

/// Record of a single state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: DoorState,
    pub to: DoorState,
    /// Generation the machine entered with this transition.
    pub generation: u64,
    #[serde(skip, default = "Instant::now")]
    pub timestamp: Instant,
}

/// Door state plus cycle bookkeeping.
#[derive(Debug)]
pub struct StateMachine {
    current_state: DoorState,
    state_entered_at: Instant,
    generation: u64,
    history: VecDeque<StateTransition>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current_state: DoorState::Idle,
            state_entered_at: Instant::now(),
            generation: 0,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    pub fn current_state(&self) -> DoorState {
        self.current_state
    }

    /// Monotonic counter bumped on every transition.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// How long the machine has been in its current state.
    pub fn time_in_current_state(&self) -> Duration {
        self.state_entered_at.elapsed()
    }

    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// The `count` most recent transitions, oldest first.
    pub fn last_transitions(&self, count: usize) -> Vec<StateTransition> {
        let skip = self.history.len().saturating_sub(count);
        self.history.iter().skip(skip).cloned().collect()
    }

    /// Move to `new_state` if the transition table allows it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStateTransition`] and leaves the machine
    /// untouched when the transition is not allowed.
    pub fn transition_to(&mut self, new_state: DoorState) -> Result<StateTransition> {
        if !self.current_state.can_transition_to(&new_state) {
            return Err(Error::InvalidStateTransition {
                from: self.current_state.to_string(),
                to: new_state.to_string(),
            });
        }

        Ok(self.perform_state_change(new_state))
    }

    /// Force the machine back to `Idle` regardless of the transition table.
    pub fn reset(&mut self) -> StateTransition {
        self.perform_state_change(DoorState::Idle)
    }

    fn perform_state_change(&mut self, new_state: DoorState) -> StateTransition {
        self.generation += 1;
        let transition = StateTransition {
            from: self.current_state,
            to: new_state,
            generation: self.generation,
            timestamp: Instant::now(),
        };

        self.current_state = new_state;
        self.state_entered_at = transition.timestamp;

        self.history.push_back(transition.clone());
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }

        transition
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_new_machine_starts_idle() {
        let machine = StateMachine::new();
        assert_eq!(machine.current_state(), DoorState::Idle);
        assert_eq!(machine.generation(), 0);
        assert!(machine.history().is_empty());
    }

    #[rstest]
    #[case(DoorState::Idle, DoorState::Presenting, true)]
    #[case(DoorState::Idle, DoorState::AwaitingOpen, true)]
    #[case(DoorState::Idle, DoorState::Rejecting, false)]
    #[case(DoorState::Idle, DoorState::AwaitingClose, false)]
    #[case(DoorState::Presenting, DoorState::Presenting, true)]
    #[case(DoorState::Presenting, DoorState::Rejecting, true)]
    #[case(DoorState::Presenting, DoorState::AwaitingClose, false)]
    #[case(DoorState::Rejecting, DoorState::Presenting, true)]
    #[case(DoorState::Rejecting, DoorState::AwaitingClose, false)]
    #[case(DoorState::AwaitingOpen, DoorState::AwaitingClose, true)]
    #[case(DoorState::AwaitingOpen, DoorState::Presenting, false)]
    #[case(DoorState::AwaitingClose, DoorState::Idle, true)]
    #[case(DoorState::AwaitingClose, DoorState::AwaitingOpen, false)]
    fn test_transition_table(
        #[case] from: DoorState,
        #[case] to: DoorState,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(&to), allowed);
    }

    #[test]
    fn test_full_cycle_bumps_generation() {
        let mut machine = StateMachine::new();
        machine.transition_to(DoorState::Presenting).unwrap();
        machine.transition_to(DoorState::AwaitingOpen).unwrap();
        machine.transition_to(DoorState::AwaitingClose).unwrap();
        let last = machine.transition_to(DoorState::Idle).unwrap();

        assert_eq!(last.from, DoorState::AwaitingClose);
        assert_eq!(last.generation, 4);
        assert_eq!(machine.generation(), 4);
        assert_eq!(machine.history().len(), 4);
    }

    #[test]
    fn test_invalid_transition_leaves_state() {
        let mut machine = StateMachine::new();
        let err = machine.transition_to(DoorState::AwaitingClose).unwrap_err();

        assert!(matches!(err, Error::InvalidStateTransition { .. }));
        assert_eq!(
            err.to_string(),
            "Invalid state transition from Idle to AwaitingClose"
        );
        assert_eq!(machine.current_state(), DoorState::Idle);
        assert_eq!(machine.generation(), 0);
    }

    #[test]
    fn test_time_in_state_restarts_on_transition() {
        let mut machine = StateMachine::new();
        std::thread::sleep(Duration::from_millis(20));
        assert!(machine.time_in_current_state() >= Duration::from_millis(20));

        machine.transition_to(DoorState::Presenting).unwrap();
        assert!(machine.time_in_current_state() < Duration::from_millis(20));
    }

    #[test]
    fn test_reset_from_anywhere() {
        let mut machine = StateMachine::new();
        machine.transition_to(DoorState::AwaitingOpen).unwrap();

        let transition = machine.reset();
        assert_eq!(transition.from, DoorState::AwaitingOpen);
        assert_eq!(machine.current_state(), DoorState::Idle);
        assert_eq!(machine.generation(), 2);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut machine = StateMachine::new();
        machine.transition_to(DoorState::Presenting).unwrap();
        for _ in 0..(MAX_HISTORY_SIZE + 20) {
            machine.transition_to(DoorState::Presenting).unwrap();
        }

        assert_eq!(machine.history().len(), MAX_HISTORY_SIZE);
        let recent = machine.last_transitions(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].generation, machine.generation());
    }

    #[rstest]
    #[case(DoorState::Idle, true)]
    #[case(DoorState::Rejecting, true)]
    #[case(DoorState::AwaitingOpen, false)]
    #[case(DoorState::AwaitingClose, false)]
    fn test_is_locked(#[case] state: DoorState, #[case] locked: bool) {
        assert_eq!(state.is_locked(), locked);
    }
}
