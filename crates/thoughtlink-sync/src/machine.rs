//! Connection state machine.
//!
//! ```text
//! Disconnected --Connect--> Connecting --HandshakeOk--> Connected
//! Connecting --Failure|Rejected--> Backoff --TimerFired--> Connecting
//! Connected --Failure--> Backoff
//! Connected|Connecting|Backoff --Pause--> Disconnected
//! * --Stop--> Disconnected
//! ```

use crate::error::{SyncError, SyncResult};
use thoughtlink_core::ConnectionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineEvent {
    Connect,
    HandshakeOk,
    Rejected,
    Failure,
    TimerFired,
    Pause,
    Stop,
}

#[derive(Debug, Default)]
pub struct ConnectionMachine {
    state: ConnectionState,
}

impl ConnectionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The target of `event` from `from`, or `None` if the edge does not exist.
    pub fn next(from: ConnectionState, event: MachineEvent) -> Option<ConnectionState> {
        use ConnectionState::*;
        use MachineEvent::*;
        match (from, event) {
            (_, Stop) => Some(Disconnected),
            (Disconnected, Connect) => Some(Connecting),
            (Connecting, HandshakeOk) => Some(Connected),
            (Connecting, Failure | Rejected) => Some(Backoff),
            (Connected, Failure) => Some(Backoff),
            (Backoff, TimerFired) => Some(Connecting),
            (Connected | Connecting | Backoff, Pause) => Some(Disconnected),
            _ => None,
        }
    }

    /// Apply `event`. An undefined edge is an error and leaves the state as is.
    pub fn apply(&mut self, event: MachineEvent) -> SyncResult<ConnectionState> {
        match Self::next(self.state, event) {
            Some(to) => {
                self.state = to;
                Ok(to)
            }
            None => Err(SyncError::InvalidTransition { from: self.state, event }),
        }
    }
}
