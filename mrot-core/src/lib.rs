pub mod participant;
pub mod phase;
pub mod stimulus;
pub mod trial;

pub use participant::ParticipantMeta;
pub use phase::{Block, SessionPhase};
pub use stimulus::{Orientation, Stimulus, TrialSpec};
pub use trial::{Response, TrialResult, TrialState};
