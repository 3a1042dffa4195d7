use std::path::PathBuf;

use mrot_core::SessionPhase;
use thiserror::Error;

/// Rejected experiment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no characters configured")]
    NoCharacters,
    #[error("no rotation angles configured")]
    NoAngles,
    #[error("character {0:?} is listed more than once")]
    DuplicateCharacter(char),
    #[error("angle {0} is listed more than once")]
    DuplicateAngle(u16),
    #[error("angle {0} is outside 0..360")]
    AngleOutOfRange(u16),
    #[error("response keys must be non-empty and distinct (normal={normal:?}, mirrored={mirrored:?})")]
    InvalidKeys { normal: String, mirrored: String },
    #[error("{0} duration must be greater than zero")]
    ZeroDuration(&'static str),
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Contract violations caught by the trial scheduler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("trial {active} has not finished; refusing to start another")]
    TrialInProgress { active: usize },
    #[error("cannot start a trial while paused")]
    Paused,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{operation} is not allowed during the {phase:?} phase")]
    WrongPhase {
        operation: &'static str,
        phase: SessionPhase,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}
