use mrot_core::Response;
use tracing::trace;

use crate::config::KeyMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Closed,
    UnmappedKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Accepted(Response),
    Ignored(IgnoreReason),
}

/// Filters raw key events down to the two valid responses.
///
/// The gate is open only during a trial's stimulus-response window. The first
/// accepted key closes it in the same call, so any later event for the same
/// trial (another key or the response timeout) finds it closed.
#[derive(Debug, Clone)]
pub struct InputGate {
    keys: KeyMap,
    open: bool,
}

impl InputGate {
    pub fn new(keys: KeyMap) -> Self {
        Self { keys, open: false }
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    /// Closes the gate, returning whether it was open.
    pub fn close(&mut self) -> bool {
        std::mem::replace(&mut self.open, false)
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn submit(&mut self, raw_key: &str) -> GateOutcome {
        if !self.open {
            trace!(key = raw_key, "gate closed");
            return GateOutcome::Ignored(IgnoreReason::Closed);
        }
        match self.keys.resolve(raw_key) {
            Some(response) => {
                self.open = false;
                GateOutcome::Accepted(response)
            }
            None => {
                trace!(key = raw_key, "unmapped key");
                GateOutcome::Ignored(IgnoreReason::UnmappedKey)
            }
        }
    }
}
