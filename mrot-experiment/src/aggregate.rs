//! Accuracy and reaction-time aggregates over the trial log.
//!
//! All functions are pure. An empty input yields zeroes, never a division by
//! zero. Reaction-time aggregates only consider correct trials.

use mrot_core::{Block, Orientation, TrialResult};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub trials: usize,
    pub correct: usize,
    pub accuracy_pct: u32,
    pub mean_rt_ms: u64,
    pub min_rt_ms: u64,
    pub max_rt_ms: u64,
}

impl Summary {
    pub fn of<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a TrialResult>,
    {
        let mut trials = 0usize;
        let mut correct = 0usize;
        let mut rt_sum = 0u64;
        let mut min_rt = u64::MAX;
        let mut max_rt = 0u64;

        for entry in entries {
            trials += 1;
            if entry.is_correct {
                correct += 1;
                rt_sum += entry.reaction_time_ms;
                min_rt = min_rt.min(entry.reaction_time_ms);
                max_rt = max_rt.max(entry.reaction_time_ms);
            }
        }

        Self {
            trials,
            correct,
            accuracy_pct: percentage(correct, trials),
            mean_rt_ms: rounded_mean(rt_sum, correct),
            min_rt_ms: if correct > 0 { min_rt } else { 0 },
            max_rt_ms: max_rt,
        }
    }
}

/// `round(100 * correct / total)`, 0 for an empty input.
pub fn accuracy<'a, I>(entries: I) -> u32
where
    I: IntoIterator<Item = &'a TrialResult>,
{
    Summary::of(entries).accuracy_pct
}

/// Rounded mean reaction time over correct entries, 0 if there are none.
pub fn mean_reaction_time<'a, I>(entries: I) -> u64
where
    I: IntoIterator<Item = &'a TrialResult>,
{
    Summary::of(entries).mean_rt_ms
}

pub fn min_reaction_time<'a, I>(entries: I) -> u64
where
    I: IntoIterator<Item = &'a TrialResult>,
{
    Summary::of(entries).min_rt_ms
}

pub fn max_reaction_time<'a, I>(entries: I) -> u64
where
    I: IntoIterator<Item = &'a TrialResult>,
{
    Summary::of(entries).max_rt_ms
}

pub fn in_block(entries: &[TrialResult], block: Block) -> impl Iterator<Item = &TrialResult> {
    entries.iter().filter(move |e| e.block == block)
}

/// One summary per configured angle, in the order given. Angles with no
/// logged trials still appear, with zeroed aggregates.
pub fn group_by_angle(entries: &[TrialResult], angles: &[u16]) -> Vec<(u16, Summary)> {
    angles
        .iter()
        .map(|&angle| {
            (
                angle,
                Summary::of(entries.iter().filter(|e| e.angle() == angle)),
            )
        })
        .collect()
}

pub fn group_by_orientation(entries: &[TrialResult]) -> [(Orientation, Summary); 2] {
    Orientation::BOTH.map(|orientation| {
        (
            orientation,
            Summary::of(entries.iter().filter(|e| e.orientation() == orientation)),
        )
    })
}

fn percentage(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    (100.0 * part as f64 / whole as f64).round() as u32
}

fn rounded_mean(sum: u64, count: usize) -> u64 {
    if count == 0 {
        return 0;
    }
    (sum as f64 / count as f64).round() as u64
}
