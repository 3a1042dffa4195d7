use serde::{Deserialize, Serialize};

use crate::phase::Block;
use crate::stimulus::{Orientation, TrialSpec};

/// Per-trial state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    Fixation,
    Stimulus,
    Responded,
    TimedOut,
    Feedback,
    Done,
}

impl TrialState {
    /// True once a result for the trial has been logged.
    pub fn is_recorded(&self) -> bool {
        matches!(
            self,
            TrialState::Responded | TrialState::TimedOut | TrialState::Feedback | TrialState::Done
        )
    }
}

/// A participant's answer for one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Response {
    Normal,
    Mirrored,
    Timeout,
}

impl Response {
    /// The orientation this response claims, `None` for a timeout.
    pub fn orientation(&self) -> Option<Orientation> {
        match self {
            Response::Normal => Some(Orientation::Normal),
            Response::Mirrored => Some(Orientation::Mirrored),
            Response::Timeout => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Response::Normal => "normal",
            Response::Mirrored => "mirrored",
            Response::Timeout => "timeout",
        }
    }
}

/// Recorded result per trial. Append-only; never mutated once logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialResult {
    /// 1-based position within the block.
    pub trial_number: usize,
    pub spec: TrialSpec,
    pub response: Response,
    pub reaction_time_ms: u64,
    pub is_correct: bool,
    pub block: Block,
    /// Clock reading when the result was recorded.
    pub timestamp_ms: u64,
}

impl TrialResult {
    pub fn angle(&self) -> u16 {
        self.spec.angle
    }

    pub fn orientation(&self) -> Orientation {
        self.spec.orientation
    }

    pub fn timed_out(&self) -> bool {
        self.response == Response::Timeout
    }
}
