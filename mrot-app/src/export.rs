//! JSON export of a finished (or abandoned) session.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use mrot_core::{Block, Orientation, ParticipantMeta, TrialResult};
use mrot_experiment::{ExperimentConfig, Presenter, Session, Summary};
use mrot_timing::{Clock, LatencyStats};
use rand::Rng;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ExportDocument<'a> {
    pub participant: &'a ParticipantMeta,
    pub config: &'a ExperimentConfig,
    pub elapsed_ms: u64,
    pub practice: Summary,
    pub formal: Summary,
    pub formal_by_angle: Vec<AngleRow>,
    pub formal_by_orientation: Vec<OrientationRow>,
    pub timer_lateness: LatencyStats,
    pub results: &'a [TrialResult],
}

#[derive(Debug, Serialize)]
pub struct AngleRow {
    pub angle: u16,
    #[serde(flatten)]
    pub summary: Summary,
}

#[derive(Debug, Serialize)]
pub struct OrientationRow {
    pub orientation: Orientation,
    #[serde(flatten)]
    pub summary: Summary,
}

impl<'a> ExportDocument<'a> {
    pub fn from_session<C, R, D>(session: &'a Session<C, R, D>) -> Self
    where
        C: Clock,
        R: Rng,
        D: Presenter,
    {
        Self {
            participant: session.participant_meta(),
            config: session.config(),
            elapsed_ms: session.elapsed_ms(),
            practice: session.summary(Block::Practice),
            formal: session.summary(Block::Formal),
            formal_by_angle: session
                .angle_breakdown(Block::Formal)
                .into_iter()
                .map(|(angle, summary)| AngleRow { angle, summary })
                .collect(),
            formal_by_orientation: session
                .orientation_breakdown(Block::Formal)
                .into_iter()
                .map(|(orientation, summary)| OrientationRow {
                    orientation,
                    summary,
                })
                .collect(),
            timer_lateness: session.timer_lateness(),
            results: session.log(),
        }
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .with_context(|| format!("serializing results to {}", path.display()))?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}
