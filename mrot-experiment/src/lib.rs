pub mod aggregate;
pub mod config;
pub mod display;
pub mod error;
pub mod gate;
pub mod generator;
pub mod recorder;
pub mod scheduler;
pub mod session;
pub mod trial;

pub use aggregate::Summary;
pub use config::{ExperimentConfig, KeyMap, TrialDurations};
pub use display::{Feedback, Frame, NullPresenter, Presenter, RecordingPresenter};
pub use error::{ConfigError, ScheduleError, SessionError};
pub use gate::{GateOutcome, IgnoreReason, InputGate};
pub use generator::generate;
pub use recorder::ResponseRecorder;
pub use scheduler::{TimerOutcome, TrialScheduler, TrialTimer};
pub use session::{Session, SessionEvent, SessionState};
pub use trial::{ActiveTrial, TrialTimestamps};
