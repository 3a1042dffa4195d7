use mrot_core::{Block, Response, TrialResult, TrialSpec};

/// A response is correct iff it names the stimulus's actual orientation.
/// Timeouts are never correct.
pub fn is_correct(spec: &TrialSpec, response: Response) -> bool {
    response.orientation() == Some(spec.orientation)
}

/// Elapsed time since onset, clamped from below so clock coincidences never
/// produce zero or near-zero latencies.
pub fn reaction_time(onset_ms: u64, now_ms: u64, floor_ms: u64) -> u64 {
    now_ms.saturating_sub(onset_ms).max(floor_ms)
}

/// Append-only trial log.
#[derive(Debug, Clone)]
pub struct ResponseRecorder {
    floor_ms: u64,
    log: Vec<TrialResult>,
}

impl ResponseRecorder {
    pub fn new(floor_ms: u64) -> Self {
        Self {
            floor_ms,
            log: Vec::new(),
        }
    }

    pub fn record(
        &mut self,
        spec: &TrialSpec,
        response: Response,
        block: Block,
        stimulus_onset_ms: u64,
        now_ms: u64,
    ) -> &TrialResult {
        let result = TrialResult {
            trial_number: spec.sequence_index + 1,
            spec: spec.clone(),
            response,
            reaction_time_ms: reaction_time(stimulus_onset_ms, now_ms, self.floor_ms),
            is_correct: is_correct(spec, response),
            block,
            timestamp_ms: now_ms,
        };
        self.log.push(result);
        &self.log[self.log.len() - 1]
    }

    pub fn log(&self) -> &[TrialResult] {
        &self.log
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn clear(&mut self) {
        self.log.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrot_core::Orientation;

    fn spec(orientation: Orientation) -> TrialSpec {
        TrialSpec {
            character: 'R',
            orientation,
            angle: 120,
            sequence_index: 3,
        }
    }

    #[test]
    fn fast_responses_are_clamped_to_the_floor() {
        let mut rec = ResponseRecorder::new(50);
        let result = rec.record(
            &spec(Orientation::Normal),
            Response::Normal,
            Block::Formal,
            1_000,
            1_030,
        );
        assert_eq!(result.reaction_time_ms, 50);
        assert_eq!(result.response, Response::Normal);
        assert!(result.is_correct);
        assert_eq!(result.trial_number, 4);
    }

    #[test]
    fn onset_after_now_does_not_underflow() {
        assert_eq!(reaction_time(500, 400, 50), 50);
        assert_eq!(reaction_time(500, 1_234, 50), 734);
    }

    #[test]
    fn correctness_follows_orientation() {
        let mirrored = spec(Orientation::Mirrored);
        assert!(is_correct(&mirrored, Response::Mirrored));
        assert!(!is_correct(&mirrored, Response::Normal));
        assert!(!is_correct(&mirrored, Response::Timeout));
        assert!(!is_correct(&spec(Orientation::Normal), Response::Timeout));
    }

    #[test]
    fn log_only_grows() {
        let mut rec = ResponseRecorder::new(50);
        let first = rec
            .record(&spec(Orientation::Normal), Response::Timeout, Block::Practice, 0, 3_000)
            .clone();
        rec.record(&spec(Orientation::Normal), Response::Normal, Block::Practice, 0, 400);
        assert_eq!(rec.len(), 2);
        assert_eq!(rec.log()[0], first);
        assert!(!first.is_correct);
        assert_eq!(first.reaction_time_ms, 3_000);
    }
}
