//! Coalesces rapid input (search keystrokes) into a single committed value.
//! Each new value replaces whatever is pending and restarts the delay; a value
//! is only committed by a poll at or after its deadline.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum DebounceState<T> {
    Idle,
    Pending { value: T, deadline: Instant },
}

#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    state: DebounceState<T>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Debouncer {
            delay,
            state: DebounceState::Idle,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn state(&self) -> &DebounceState<T> {
        &self.state
    }

    pub fn push(&mut self, value: T, now: Instant) {
        self.state = DebounceState::Pending {
            value,
            deadline: now + self.delay,
        };
    }

    /// Takes the pending value once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.state {
            DebounceState::Pending { deadline, .. } if now >= *deadline => {
                match std::mem::replace(&mut self.state, DebounceState::Idle) {
                    DebounceState::Pending { value, .. } => Some(value),
                    DebounceState::Idle => None,
                }
            }
            _ => None,
        }
    }

    pub fn pending(&self) -> Option<&T> {
        match &self.state {
            DebounceState::Pending { value, .. } => Some(value),
            DebounceState::Idle => None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        match &self.state {
            DebounceState::Pending { deadline, .. } => Some(*deadline),
            DebounceState::Idle => None,
        }
    }

    pub fn cancel(&mut self) {
        self.state = DebounceState::Idle;
    }
}
