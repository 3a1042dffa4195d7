//! Per-trial timing state machine.
//!
//! `Fixation → Stimulus → (Responded | TimedOut) → Feedback → Done`
//!
//! At most one timer belonging to the active trial is pending at any time:
//! arming a new one always cancels the previous one first. Every timer carries
//! the scheduler generation it was armed under, and the generation is bumped
//! whenever pending work is thrown away (pause, abort, new trial). A timer
//! from an older generation is inert even if its cancellation was lost.

use mrot_core::{Block, Response, TrialResult, TrialSpec, TrialState};
use mrot_timing::{Fired, TimerQueue};
use tracing::{debug, trace, warn};

use crate::config::{KeyMap, TrialDurations};
use crate::display::{Feedback, Presenter};
use crate::error::ScheduleError;
use crate::gate::{GateOutcome, InputGate};
use crate::recorder::ResponseRecorder;
use crate::trial::ActiveTrial;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialTimer {
    FixationElapsed,
    ResponseTimeout,
    FeedbackElapsed,
}

/// What a fired timer did to the active trial.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerOutcome {
    /// Stale, superseded, or fired in a state it does not apply to.
    Ignored,
    StimulusShown,
    TimedOut(TrialResult),
    /// Feedback finished; the session may advance.
    Done,
}

#[derive(Debug, Clone)]
pub struct TrialScheduler {
    durations: TrialDurations,
    gate: InputGate,
    timers: TimerQueue<TrialTimer>,
    current: Option<ActiveTrial>,
    generation: u64,
    paused: bool,
}

impl TrialScheduler {
    pub fn new(durations: TrialDurations, keys: KeyMap) -> Self {
        Self {
            durations,
            gate: InputGate::new(keys),
            timers: TimerQueue::new(),
            current: None,
            generation: 0,
            paused: false,
        }
    }

    /// Begins a trial in `Fixation`. Refuses while the previous trial has not
    /// reached `Done`, leaving its timers untouched.
    pub fn start_trial<D: Presenter>(
        &mut self,
        spec: TrialSpec,
        block: Block,
        now_ms: u64,
        presenter: &mut D,
    ) -> Result<(), ScheduleError> {
        if self.paused {
            warn!(trial = spec.sequence_index, "start_trial while paused");
            return Err(ScheduleError::Paused);
        }
        if let Some(active) = &self.current {
            if !active.is_done() {
                warn!(
                    active = active.spec.sequence_index,
                    state = ?active.state,
                    requested = spec.sequence_index,
                    "start_trial while a trial is still running"
                );
                return Err(ScheduleError::TrialInProgress {
                    active: active.spec.sequence_index,
                });
            }
        }

        self.invalidate();
        debug!(
            trial = spec.sequence_index,
            character = %spec.character,
            angle = spec.angle,
            orientation = spec.orientation.as_str(),
            "trial started"
        );
        self.current = Some(ActiveTrial::new(spec, block, now_ms));
        self.enter_fixation(now_ms, presenter);
        Ok(())
    }

    /// Routes a raw key through the input gate. Returns the logged result when
    /// the key is accepted.
    pub fn submit_key<D: Presenter>(
        &mut self,
        raw_key: &str,
        now_ms: u64,
        recorder: &mut ResponseRecorder,
        presenter: &mut D,
    ) -> Option<TrialResult> {
        if self.paused {
            trace!(key = raw_key, "key ignored while paused");
            return None;
        }
        match self.gate.submit(raw_key) {
            GateOutcome::Accepted(response) => {
                if self.state() != Some(TrialState::Stimulus) {
                    // The gate is only ever open during Stimulus.
                    warn!(state = ?self.state(), "gate accepted a key outside the stimulus window");
                    return None;
                }
                self.conclude(response, now_ms, recorder, presenter)
            }
            GateOutcome::Ignored(_) => None,
        }
    }

    pub fn on_timer<D: Presenter>(
        &mut self,
        fired: Fired<TrialTimer>,
        recorder: &mut ResponseRecorder,
        presenter: &mut D,
    ) -> TimerOutcome {
        if fired.generation != self.generation || self.paused {
            trace!(
                kind = ?fired.kind,
                generation = fired.generation,
                current = self.generation,
                paused = self.paused,
                "stale timer ignored"
            );
            return TimerOutcome::Ignored;
        }
        let now_ms = fired.fired_at_ms;
        let Some(trial) = self.current.as_mut() else {
            return TimerOutcome::Ignored;
        };
        if trial.pending == Some(fired.id) {
            trial.pending = None;
        }

        match (trial.state, fired.kind) {
            (TrialState::Fixation, TrialTimer::FixationElapsed) => {
                self.enter_stimulus(now_ms, presenter);
                TimerOutcome::StimulusShown
            }
            (TrialState::Stimulus, TrialTimer::ResponseTimeout) => {
                // A key accepted in the same tick already closed the gate.
                if !self.gate.close() {
                    return TimerOutcome::Ignored;
                }
                match self.conclude(Response::Timeout, now_ms, recorder, presenter) {
                    Some(result) => TimerOutcome::TimedOut(result),
                    None => TimerOutcome::Ignored,
                }
            }
            (TrialState::Feedback, TrialTimer::FeedbackElapsed) => {
                trial.state = TrialState::Done;
                debug!(trial = trial.spec.sequence_index, "trial done");
                presenter.clear();
                TimerOutcome::Done
            }
            (state, kind) => {
                trace!(?state, ?kind, "timer does not apply to current state");
                TimerOutcome::Ignored
            }
        }
    }

    /// Freezes the active trial: cancels its timer and closes the gate.
    pub fn suspend(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        self.invalidate();
    }

    /// Restarts the interrupted trial. An unanswered trial goes back to
    /// `Fixation` with its full duration; a trial already in feedback shows
    /// its feedback again for the full feedback duration.
    pub fn resume<D: Presenter>(&mut self, now_ms: u64, presenter: &mut D) {
        if !self.paused {
            return;
        }
        self.paused = false;
        let Some(trial) = self.current.as_ref() else {
            return;
        };
        if trial.is_done() {
            return;
        }
        if !trial.state.is_recorded() {
            debug!(trial = trial.spec.sequence_index, "resuming from fixation");
            self.enter_fixation(now_ms, presenter);
            return;
        }

        let feedback = trial.feedback;
        debug!(trial = trial.spec.sequence_index, "resuming feedback");
        if let Some(t) = self.current.as_mut() {
            t.state = TrialState::Feedback;
        }
        if let Some(feedback) = feedback {
            presenter.show_feedback(&feedback);
        }
        self.arm(TrialTimer::FeedbackElapsed, self.durations.feedback_ms, now_ms);
    }

    /// Drops the active trial and everything scheduled for it.
    pub fn abort(&mut self) {
        self.invalidate();
        self.current = None;
        self.paused = false;
    }

    pub fn pop_due(&mut self, now_ms: u64) -> Option<Fired<TrialTimer>> {
        self.timers.pop_due(now_ms)
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn state(&self) -> Option<TrialState> {
        self.current.as_ref().map(|t| t.state)
    }

    pub fn current(&self) -> Option<&ActiveTrial> {
        self.current.as_ref()
    }

    pub fn is_gate_open(&self) -> bool {
        self.gate.is_open()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn enter_fixation<D: Presenter>(&mut self, now_ms: u64, presenter: &mut D) {
        let Some(trial) = self.current.as_mut() else {
            return;
        };
        trial.state = TrialState::Fixation;
        trial.timestamps.fixation_start = now_ms;
        trial.timestamps.stimulus_onset = None;
        presenter.show_fixation();
        self.arm(TrialTimer::FixationElapsed, self.durations.fixation_ms, now_ms);
    }

    fn enter_stimulus<D: Presenter>(&mut self, now_ms: u64, presenter: &mut D) {
        let Some(trial) = self.current.as_mut() else {
            return;
        };
        trial.state = TrialState::Stimulus;
        trial.timestamps.stimulus_onset = Some(now_ms);
        let stimulus = trial.spec.stimulus();
        debug!(trial = trial.spec.sequence_index, onset_ms = now_ms, "stimulus on");
        presenter.show_stimulus(&stimulus);
        self.gate.open();
        self.arm(
            TrialTimer::ResponseTimeout,
            self.durations.response_timeout_ms,
            now_ms,
        );
    }

    /// Shared exit from the stimulus window for both a response and a
    /// timeout: close the gate, cancel the sibling timer, log, then feedback.
    fn conclude<D: Presenter>(
        &mut self,
        response: Response,
        now_ms: u64,
        recorder: &mut ResponseRecorder,
        presenter: &mut D,
    ) -> Option<TrialResult> {
        self.gate.close();
        self.disarm();

        let trial = self.current.as_mut()?;
        trial.state = match response {
            Response::Timeout => TrialState::TimedOut,
            _ => TrialState::Responded,
        };
        trial.timestamps.response = Some(now_ms);
        let onset_ms = trial.timestamps.stimulus_onset.unwrap_or(now_ms);
        let result = recorder
            .record(&trial.spec, response, trial.block, onset_ms, now_ms)
            .clone();
        debug!(
            trial = result.trial_number,
            block = result.block.as_str(),
            response = response.as_str(),
            rt_ms = result.reaction_time_ms,
            correct = result.is_correct,
            "response recorded"
        );

        let feedback = Feedback {
            correct: result.is_correct,
            reaction_time_ms: result.reaction_time_ms,
            response,
        };
        trial.feedback = Some(feedback);
        trial.state = TrialState::Feedback;
        presenter.show_feedback(&feedback);
        self.arm(TrialTimer::FeedbackElapsed, self.durations.feedback_ms, now_ms);
        Some(result)
    }

    fn arm(&mut self, kind: TrialTimer, delay_ms: u64, now_ms: u64) {
        let generation = self.generation;
        if let Some(trial) = self.current.as_mut() {
            if let Some(previous) = trial.pending.take() {
                self.timers.cancel(previous);
            }
            trial.pending = Some(self.timers.schedule(now_ms + delay_ms, kind, generation));
        }
    }

    fn disarm(&mut self) {
        if let Some(trial) = self.current.as_mut() {
            if let Some(id) = trial.pending.take() {
                self.timers.cancel(id);
            }
        }
    }

    /// Cancels everything pending and moves to a new generation.
    fn invalidate(&mut self) {
        self.gate.close();
        self.timers.cancel_all();
        if let Some(trial) = self.current.as_mut() {
            trial.pending = None;
        }
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{Frame, RecordingPresenter};
    use mrot_core::Orientation;

    fn spec(index: usize) -> TrialSpec {
        TrialSpec {
            character: 'R',
            orientation: Orientation::Normal,
            angle: 60,
            sequence_index: index,
        }
    }

    fn scheduler() -> TrialScheduler {
        TrialScheduler::new(TrialDurations::default(), KeyMap::default())
    }

    /// Fires every timer due at `now`, like the session's poll loop.
    fn drain(
        s: &mut TrialScheduler,
        now: u64,
        rec: &mut ResponseRecorder,
        p: &mut RecordingPresenter,
    ) -> Vec<TimerOutcome> {
        let mut out = Vec::new();
        while let Some(fired) = s.pop_due(now) {
            out.push(s.on_timer(fired, rec, p));
        }
        out
    }

    #[test]
    fn full_trial_with_response() {
        let mut s = scheduler();
        let mut rec = ResponseRecorder::new(50);
        let mut p = RecordingPresenter::default();

        s.start_trial(spec(0), Block::Practice, 0, &mut p).unwrap();
        assert_eq!(s.state(), Some(TrialState::Fixation));
        assert!(!s.is_gate_open());
        assert_eq!(s.pending_timers(), 1);

        assert_eq!(drain(&mut s, 499, &mut rec, &mut p), vec![]);
        assert_eq!(
            drain(&mut s, 500, &mut rec, &mut p),
            vec![TimerOutcome::StimulusShown]
        );
        assert!(s.is_gate_open());
        assert_eq!(s.pending_timers(), 1);

        let result = s.submit_key("f", 912, &mut rec, &mut p).unwrap();
        assert_eq!(result.reaction_time_ms, 412);
        assert!(result.is_correct);
        assert_eq!(s.state(), Some(TrialState::Feedback));
        assert!(!s.is_gate_open());
        assert_eq!(s.pending_timers(), 1, "timeout replaced by feedback timer");

        assert_eq!(
            drain(&mut s, 1_412, &mut rec, &mut p),
            vec![TimerOutcome::Done]
        );
        assert_eq!(s.pending_timers(), 0);
        assert_eq!(
            p.frames,
            vec![
                Frame::Fixation,
                Frame::Stimulus(spec(0).stimulus()),
                Frame::Feedback(Feedback {
                    correct: true,
                    reaction_time_ms: 412,
                    response: Response::Normal,
                }),
                Frame::Clear,
            ]
        );
    }

    #[test]
    fn timeout_records_an_incorrect_result() {
        let mut s = scheduler();
        let mut rec = ResponseRecorder::new(50);
        let mut p = RecordingPresenter::default();

        s.start_trial(spec(0), Block::Formal, 0, &mut p).unwrap();
        drain(&mut s, 500, &mut rec, &mut p);
        let outcomes = drain(&mut s, 3_500, &mut rec, &mut p);
        assert_eq!(outcomes.len(), 1);
        let TimerOutcome::TimedOut(result) = &outcomes[0] else {
            panic!("expected a timeout, got {outcomes:?}");
        };
        assert_eq!(result.response, Response::Timeout);
        assert!(!result.is_correct);
        assert_eq!(result.reaction_time_ms, 3_000);

        assert_eq!(s.submit_key("f", 3_501, &mut rec, &mut p), None);
        assert_eq!(rec.len(), 1);
    }

    #[test]
    fn key_then_timeout_in_same_tick_logs_once() {
        let mut s = scheduler();
        let mut rec = ResponseRecorder::new(50);
        let mut p = RecordingPresenter::default();

        s.start_trial(spec(0), Block::Formal, 0, &mut p).unwrap();
        drain(&mut s, 500, &mut rec, &mut p);
        assert!(s.submit_key("j", 3_500, &mut rec, &mut p).is_some());
        // The timeout was cancelled; only feedback remains.
        let outcomes = drain(&mut s, 3_500, &mut rec, &mut p);
        assert!(outcomes.iter().all(|o| !matches!(o, TimerOutcome::TimedOut(_))));
        assert_eq!(rec.len(), 1);
    }

    #[test]
    fn timeout_then_key_in_same_tick_logs_once() {
        let mut s = scheduler();
        let mut rec = ResponseRecorder::new(50);
        let mut p = RecordingPresenter::default();

        s.start_trial(spec(0), Block::Formal, 0, &mut p).unwrap();
        drain(&mut s, 500, &mut rec, &mut p);
        let fired = s.pop_due(3_500).unwrap();
        assert!(matches!(
            s.on_timer(fired, &mut rec, &mut p),
            TimerOutcome::TimedOut(_)
        ));
        assert_eq!(s.submit_key("f", 3_500, &mut rec, &mut p), None);
        assert_eq!(rec.len(), 1);
        assert_eq!(rec.log()[0].response, Response::Timeout);
    }

    #[test]
    fn a_timeout_that_lost_its_cancellation_is_inert() {
        let mut s = scheduler();
        let mut rec = ResponseRecorder::new(50);
        let mut p = RecordingPresenter::default();

        s.start_trial(spec(0), Block::Formal, 0, &mut p).unwrap();
        drain(&mut s, 500, &mut rec, &mut p);
        // Snapshot the pending timeout as if the host had already dequeued it.
        let stale = Fired {
            id: s.current().unwrap().pending.unwrap(),
            kind: TrialTimer::ResponseTimeout,
            generation: s.generation(),
            deadline_ms: 3_500,
            fired_at_ms: 3_500,
        };
        s.submit_key("f", 900, &mut rec, &mut p).unwrap();
        assert_eq!(s.on_timer(stale, &mut rec, &mut p), TimerOutcome::Ignored);
        assert_eq!(rec.len(), 1);
    }

    #[test]
    fn double_start_is_refused() {
        let mut s = scheduler();
        let mut p = RecordingPresenter::default();

        s.start_trial(spec(0), Block::Formal, 0, &mut p).unwrap();
        let generation = s.generation();
        assert_eq!(
            s.start_trial(spec(1), Block::Formal, 10, &mut p),
            Err(ScheduleError::TrialInProgress { active: 0 })
        );
        assert_eq!(s.pending_timers(), 1);
        assert_eq!(s.generation(), generation);
        assert_eq!(s.current().unwrap().spec.sequence_index, 0);
    }

    #[test]
    fn pause_during_stimulus_leaves_only_the_post_resume_timeout() {
        let mut s = scheduler();
        let mut rec = ResponseRecorder::new(50);
        let mut p = RecordingPresenter::default();

        s.start_trial(spec(0), Block::Formal, 0, &mut p).unwrap();
        drain(&mut s, 500, &mut rec, &mut p);
        let old_generation = s.generation();

        s.suspend();
        assert!(!s.is_gate_open());
        assert_eq!(s.pending_timers(), 0);
        assert_eq!(s.submit_key("f", 1_000, &mut rec, &mut p), None);

        s.resume(10_000, &mut p);
        assert_eq!(s.state(), Some(TrialState::Fixation));
        assert_ne!(s.generation(), old_generation);
        drain(&mut s, 10_500, &mut rec, &mut p);
        assert_eq!(s.state(), Some(TrialState::Stimulus));
        assert_eq!(s.pending_timers(), 1);

        // The pre-pause timeout deadline passes without effect.
        let stale = Fired {
            id: s.current().unwrap().pending.unwrap(),
            kind: TrialTimer::ResponseTimeout,
            generation: old_generation,
            deadline_ms: 3_500,
            fired_at_ms: 10_600,
        };
        assert_eq!(s.on_timer(stale, &mut rec, &mut p), TimerOutcome::Ignored);

        let outcomes = drain(&mut s, 13_500, &mut rec, &mut p);
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], TimerOutcome::TimedOut(_)));
        assert_eq!(rec.len(), 1);
        assert_eq!(rec.log()[0].reaction_time_ms, 3_000);
    }

    #[test]
    fn pause_during_feedback_does_not_record_twice() {
        let mut s = scheduler();
        let mut rec = ResponseRecorder::new(50);
        let mut p = RecordingPresenter::default();

        s.start_trial(spec(0), Block::Formal, 0, &mut p).unwrap();
        drain(&mut s, 500, &mut rec, &mut p);
        s.submit_key("f", 800, &mut rec, &mut p).unwrap();

        s.suspend();
        s.resume(5_000, &mut p);
        assert_eq!(s.state(), Some(TrialState::Feedback));
        assert!(matches!(p.last(), Some(Frame::Feedback(_))));
        assert_eq!(drain(&mut s, 5_499, &mut rec, &mut p), vec![]);
        assert_eq!(drain(&mut s, 5_500, &mut rec, &mut p), vec![TimerOutcome::Done]);
        assert_eq!(rec.len(), 1);
    }

    #[test]
    fn timers_fired_while_paused_are_deferred() {
        let mut s = scheduler();
        let mut rec = ResponseRecorder::new(50);
        let mut p = RecordingPresenter::default();

        s.start_trial(spec(0), Block::Formal, 0, &mut p).unwrap();
        let pending = Fired {
            id: s.current().unwrap().pending.unwrap(),
            kind: TrialTimer::FixationElapsed,
            generation: s.generation(),
            deadline_ms: 500,
            fired_at_ms: 500,
        };
        s.suspend();
        assert_eq!(s.on_timer(pending, &mut rec, &mut p), TimerOutcome::Ignored);
        assert_eq!(s.state(), Some(TrialState::Fixation));
    }

    #[test]
    fn next_trial_starts_cleanly_after_done() {
        let mut s = scheduler();
        let mut rec = ResponseRecorder::new(50);
        let mut p = RecordingPresenter::default();

        s.start_trial(spec(0), Block::Formal, 0, &mut p).unwrap();
        drain(&mut s, 500, &mut rec, &mut p);
        s.submit_key("f", 700, &mut rec, &mut p).unwrap();
        drain(&mut s, 1_200, &mut rec, &mut p);
        assert_eq!(s.state(), Some(TrialState::Done));

        s.start_trial(spec(1), Block::Formal, 1_200, &mut p).unwrap();
        assert_eq!(s.pending_timers(), 1);
        assert_eq!(s.next_deadline(), Some(1_700));
    }

    #[test]
    fn abort_cancels_everything() {
        let mut s = scheduler();
        let mut rec = ResponseRecorder::new(50);
        let mut p = RecordingPresenter::default();

        s.start_trial(spec(0), Block::Formal, 0, &mut p).unwrap();
        drain(&mut s, 500, &mut rec, &mut p);
        s.abort();
        assert_eq!(s.pending_timers(), 0);
        assert!(!s.is_gate_open());
        assert_eq!(s.state(), None);
        assert_eq!(drain(&mut s, 10_000, &mut rec, &mut p), vec![]);
    }
}
