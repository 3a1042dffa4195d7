use mrot_core::{Block, TrialSpec, TrialState};
use mrot_timing::TimerId;

use crate::display::Feedback;

/// The trial currently driven by the scheduler.
#[derive(Debug, Clone)]
pub struct ActiveTrial {
    pub spec: TrialSpec,
    pub block: Block,
    pub state: TrialState,
    pub timestamps: TrialTimestamps,
    /// Set once the result is logged, so feedback can be re-shown on resume.
    pub feedback: Option<Feedback>,
    pub(crate) pending: Option<TimerId>,
}

#[derive(Debug, Clone, Default)]
pub struct TrialTimestamps {
    pub start: u64,
    pub fixation_start: u64,
    pub stimulus_onset: Option<u64>,
    pub response: Option<u64>,
}

impl ActiveTrial {
    pub fn new(spec: TrialSpec, block: Block, now_ms: u64) -> Self {
        Self {
            spec,
            block,
            state: TrialState::Fixation,
            timestamps: TrialTimestamps {
                start: now_ms,
                fixation_start: now_ms,
                stimulus_onset: None,
                response: None,
            },
            feedback: None,
            pending: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == TrialState::Done
    }
}
