use mrot_core::{Block, Orientation, ParticipantMeta, SessionPhase, TrialResult, TrialSpec, TrialState};
use mrot_timing::{Clock, LatencyRecorder, LatencyStats};
use rand::Rng;
use tracing::{debug, info, trace, warn};

use crate::aggregate::{self, Summary};
use crate::config::ExperimentConfig;
use crate::display::Presenter;
use crate::error::SessionError;
use crate::generator::generate;
use crate::recorder::ResponseRecorder;
use crate::scheduler::{TimerOutcome, TrialScheduler};

/// Notifications for the host, in the order things happened.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    TrialStarted {
        block: Block,
        number: usize,
        total: usize,
    },
    StimulusShown {
        block: Block,
        number: usize,
    },
    ResponseRecorded(TrialResult),
    BlockFinished {
        block: Block,
        summary: Summary,
    },
    BreakStarted,
    Paused,
    Resumed,
    Completed,
}

/// State of the block in progress. Rebuilt at the start of every block and
/// dropped on quit.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub block: Block,
    pub current_trial_index: usize,
    pub block_trials: Vec<TrialSpec>,
    scheduler: TrialScheduler,
}

impl SessionState {
    pub fn is_paused(&self) -> bool {
        self.scheduler.is_paused()
    }

    pub fn input_gate_open(&self) -> bool {
        self.scheduler.is_gate_open()
    }

    pub fn active_timers(&self) -> usize {
        self.scheduler.pending_timers()
    }

    pub fn trial_state(&self) -> Option<TrialState> {
        self.scheduler.state()
    }

    pub fn current_spec(&self) -> Option<&TrialSpec> {
        self.block_trials.get(self.current_trial_index)
    }
}

/// Owns the session and is the only thing that mutates it.
///
/// The host drives it from one thread: forward raw keys to
/// [`Session::handle_key`] and call [`Session::poll`] whenever the clock may
/// have passed [`Session::next_deadline_ms`].
pub struct Session<C, R, D>
where
    C: Clock,
    R: Rng,
    D: Presenter,
{
    config: ExperimentConfig,
    clock: C,
    rng: R,
    presenter: D,
    phase: SessionPhase,
    state: Option<SessionState>,
    recorder: ResponseRecorder,
    participant: ParticipantMeta,
    started_at_ms: Option<u64>,
    lateness: LatencyRecorder,
}

impl<C, R, D> Session<C, R, D>
where
    C: Clock,
    R: Rng,
    D: Presenter,
{
    pub fn new(config: ExperimentConfig, clock: C, rng: R, presenter: D) -> Result<Self, SessionError> {
        config.validate()?;
        let recorder = ResponseRecorder::new(config.rt_floor_ms);
        Ok(Self {
            config,
            clock,
            rng,
            presenter,
            phase: SessionPhase::Instructions,
            state: None,
            recorder,
            participant: ParticipantMeta::default(),
            started_at_ms: None,
            lateness: LatencyRecorder::default(),
        })
    }

    /// Leaves the instructions and runs the practice block. Starting again
    /// after completion begins a fresh run with an empty log.
    pub fn start(&mut self, participant: ParticipantMeta) -> Result<Vec<SessionEvent>, SessionError> {
        if !matches!(self.phase, SessionPhase::Instructions | SessionPhase::Complete) {
            return Err(self.wrong_phase("start"));
        }
        self.recorder.clear();
        self.lateness.clear();
        self.participant = participant;
        self.started_at_ms = Some(self.clock.now_ms());
        info!(participant = %self.participant.participant_id, "session started");

        let mut events = Vec::new();
        self.enter_phase(SessionPhase::Practice, &mut events)?;
        Ok(events)
    }

    /// Participant is ready for the formal block.
    pub fn confirm_break(&mut self) -> Result<Vec<SessionEvent>, SessionError> {
        if !self.phase.is_break() {
            return Err(self.wrong_phase("confirm_break"));
        }
        let mut events = Vec::new();
        self.enter_phase(SessionPhase::Formal, &mut events)?;
        Ok(events)
    }

    /// Participant is not ready; the session ends as a quit.
    pub fn decline_break(&mut self) -> Result<(), SessionError> {
        if !self.phase.is_break() {
            return Err(self.wrong_phase("decline_break"));
        }
        self.quit();
        Ok(())
    }

    /// Fires every timer that is due by now.
    pub fn poll(&mut self) -> Result<Vec<SessionEvent>, SessionError> {
        let now_ms = self.clock.now_ms();
        let mut events = Vec::new();
        loop {
            let Some(state) = self.state.as_mut() else {
                break;
            };
            if state.is_paused() {
                break;
            }
            let Some(fired) = state.scheduler.pop_due(now_ms) else {
                break;
            };
            self.lateness.record(fired.late_ms());
            let block = state.block;
            let number = state.current_trial_index + 1;
            match state
                .scheduler
                .on_timer(fired, &mut self.recorder, &mut self.presenter)
            {
                TimerOutcome::Ignored => {}
                TimerOutcome::StimulusShown => {
                    events.push(SessionEvent::StimulusShown { block, number })
                }
                TimerOutcome::TimedOut(result) => {
                    events.push(SessionEvent::ResponseRecorded(result))
                }
                TimerOutcome::Done => self.advance(&mut events)?,
            }
        }
        Ok(events)
    }

    /// Forwards a raw key identifier to the input gate.
    pub fn handle_key(&mut self, raw_key: &str) -> Vec<SessionEvent> {
        let now_ms = self.clock.now_ms();
        let Some(state) = self.state.as_mut() else {
            trace!(key = raw_key, phase = ?self.phase, "key outside a block");
            return Vec::new();
        };
        if state.is_paused() {
            return Vec::new();
        }
        state
            .scheduler
            .submit_key(raw_key, now_ms, &mut self.recorder, &mut self.presenter)
            .map(SessionEvent::ResponseRecorded)
            .into_iter()
            .collect()
    }

    /// Suspends the running block. All pending timers are cancelled and the
    /// gate stays closed until [`Session::resume`].
    pub fn pause(&mut self) -> Vec<SessionEvent> {
        let Some(state) = self.state.as_mut() else {
            return Vec::new();
        };
        if state.is_paused() {
            return Vec::new();
        }
        state.scheduler.suspend();
        info!(
            block = state.block.as_str(),
            trial = state.current_trial_index + 1,
            "paused"
        );
        vec![SessionEvent::Paused]
    }

    /// Restarts the interrupted trial: from fixation if it was not answered
    /// yet, otherwise from the start of its feedback.
    pub fn resume(&mut self) -> Vec<SessionEvent> {
        let now_ms = self.clock.now_ms();
        let Some(state) = self.state.as_mut() else {
            return Vec::new();
        };
        if !state.is_paused() {
            return Vec::new();
        }
        state.scheduler.resume(now_ms, &mut self.presenter);
        info!(
            block = state.block.as_str(),
            trial = state.current_trial_index + 1,
            "resumed"
        );
        vec![SessionEvent::Resumed]
    }

    /// Cancels every timer and discards the block state. The log is kept for
    /// export until the next [`Session::start`].
    pub fn quit(&mut self) {
        if let Some(mut state) = self.state.take() {
            state.scheduler.abort();
            info!(
                block = state.block.as_str(),
                trial = state.current_trial_index + 1,
                "session quit"
            );
        }
        self.phase = SessionPhase::Instructions;
        self.presenter.clear();
    }

    /// Quit and forget the run entirely.
    pub fn restart(&mut self) {
        self.quit();
        self.recorder.clear();
        self.lateness.clear();
        self.participant = ParticipantMeta::default();
        self.started_at_ms = None;
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    pub fn is_paused(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.is_paused())
    }

    pub fn log(&self) -> &[TrialResult] {
        self.recorder.log()
    }

    pub fn participant_meta(&self) -> &ParticipantMeta {
        &self.participant
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn presenter(&self) -> &D {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut D {
        &mut self.presenter
    }

    /// `(trial_number, block_len)` for the running block.
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.state
            .as_ref()
            .map(|s| (s.current_trial_index + 1, s.block_trials.len()))
    }

    pub fn summary(&self, block: Block) -> Summary {
        Summary::of(aggregate::in_block(self.log(), block))
    }

    /// Accuracy and mean RT of the block in progress, or of the last block
    /// once none is running.
    pub fn running_summary(&self) -> Summary {
        let block = match (&self.state, self.phase) {
            (Some(state), _) => state.block,
            (None, SessionPhase::Instructions | SessionPhase::Practice | SessionPhase::Break) => {
                Block::Practice
            }
            (None, _) => Block::Formal,
        };
        self.summary(block)
    }

    pub fn angle_breakdown(&self, block: Block) -> Vec<(u16, Summary)> {
        let entries: Vec<TrialResult> = aggregate::in_block(self.log(), block).cloned().collect();
        aggregate::group_by_angle(&entries, &self.config.angles)
    }

    pub fn orientation_breakdown(&self, block: Block) -> [(Orientation, Summary); 2] {
        let entries: Vec<TrialResult> = aggregate::in_block(self.log(), block).cloned().collect();
        aggregate::group_by_orientation(&entries)
    }

    /// Time since [`Session::start`], 0 before the first start.
    pub fn elapsed_ms(&self) -> u64 {
        self.started_at_ms
            .map(|t| self.clock.elapsed_ms(t))
            .unwrap_or(0)
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Earliest pending timer deadline. `None` while paused or outside a
    /// block.
    pub fn next_deadline_ms(&self) -> Option<u64> {
        let state = self.state.as_ref()?;
        if state.is_paused() {
            return None;
        }
        state.scheduler.next_deadline()
    }

    pub fn timer_lateness(&self) -> LatencyStats {
        self.lateness.stats()
    }

    /// Moves to the next trial once the active one is done, or closes the
    /// block after its last trial.
    fn advance(&mut self, events: &mut Vec<SessionEvent>) -> Result<(), SessionError> {
        let Some(state) = self.state.as_mut() else {
            return Ok(());
        };
        if state.scheduler.state() != Some(TrialState::Done) {
            warn!(state = ?state.scheduler.state(), "advance before the trial finished");
            return Ok(());
        }
        state.current_trial_index += 1;
        if state.current_trial_index >= state.block_trials.len() {
            return self.finish_block(events);
        }
        self.start_current(events)
    }

    fn start_current(&mut self, events: &mut Vec<SessionEvent>) -> Result<(), SessionError> {
        let now_ms = self.clock.now_ms();
        let Some(state) = self.state.as_mut() else {
            return Ok(());
        };
        let Some(spec) = state.block_trials.get(state.current_trial_index).cloned() else {
            return Ok(());
        };
        state
            .scheduler
            .start_trial(spec, state.block, now_ms, &mut self.presenter)?;
        events.push(SessionEvent::TrialStarted {
            block: state.block,
            number: state.current_trial_index + 1,
            total: state.block_trials.len(),
        });
        Ok(())
    }

    fn begin_block(&mut self, block: Block, events: &mut Vec<SessionEvent>) -> Result<(), SessionError> {
        let size = self.config.block_len(block == Block::Practice);
        let block_trials = generate(size, &self.config.angles, &self.config.characters, &mut self.rng);
        if block_trials.len() < size {
            warn!(
                requested = size,
                available = block_trials.len(),
                "block capped at the number of distinct stimuli"
            );
        }
        info!(block = block.as_str(), trials = block_trials.len(), "block started");

        if block_trials.is_empty() {
            self.state = None;
            return self.finish_block_of(block, events);
        }
        self.state = Some(SessionState {
            block,
            current_trial_index: 0,
            block_trials,
            scheduler: TrialScheduler::new(self.config.timing.clone(), self.config.keys.clone()),
        });
        self.start_current(events)
    }

    fn finish_block(&mut self, events: &mut Vec<SessionEvent>) -> Result<(), SessionError> {
        let Some(mut state) = self.state.take() else {
            return Ok(());
        };
        state.scheduler.abort();
        self.finish_block_of(state.block, events)
    }

    fn finish_block_of(&mut self, block: Block, events: &mut Vec<SessionEvent>) -> Result<(), SessionError> {
        let summary = self.summary(block);
        info!(
            block = block.as_str(),
            trials = summary.trials,
            accuracy_pct = summary.accuracy_pct,
            mean_rt_ms = summary.mean_rt_ms,
            "block finished"
        );
        events.push(SessionEvent::BlockFinished { block, summary });

        match self.phase.next(!self.config.confirm_between_blocks) {
            Some(next) => self.enter_phase(next, events),
            None => Ok(()),
        }
    }

    fn enter_phase(&mut self, next: SessionPhase, events: &mut Vec<SessionEvent>) -> Result<(), SessionError> {
        debug!(from = ?self.phase, to = ?next, "phase change");
        self.phase = next;
        if let Some(block) = next.block() {
            return self.begin_block(block, events);
        }
        match next {
            SessionPhase::Break => {
                self.presenter.clear();
                events.push(SessionEvent::BreakStarted);
                Ok(())
            }
            SessionPhase::Complete => {
                self.presenter.clear();
                let lateness = self.lateness.stats();
                info!(
                    elapsed_ms = self.elapsed_ms(),
                    timer_late_mean_ms = lateness.mean_ms,
                    timer_late_max_ms = lateness.max_ms,
                    "session complete"
                );
                events.push(SessionEvent::Completed);
                Ok(())
            }
            SessionPhase::Instructions | SessionPhase::Practice | SessionPhase::Formal => Ok(()),
        }
    }

    fn wrong_phase(&self, operation: &'static str) -> SessionError {
        SessionError::WrongPhase {
            operation,
            phase: self.phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::NullPresenter;
    use mrot_timing::ManualClock;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn small_config() -> ExperimentConfig {
        ExperimentConfig {
            characters: vec!['R', 'J'],
            angles: vec![0, 60, 120, 180, 240, 300],
            practice_trials: 2,
            formal_trials: 3,
            ..ExperimentConfig::default()
        }
    }

    fn session(config: ExperimentConfig) -> (Session<ManualClock, StdRng, NullPresenter>, ManualClock) {
        let clock = ManualClock::new(0);
        let s = Session::new(config, clock.clone(), StdRng::seed_from_u64(11), NullPresenter).unwrap();
        (s, clock)
    }

    #[test]
    fn invalid_config_is_refused() {
        let mut config = small_config();
        config.angles.clear();
        let result = Session::new(config, ManualClock::new(0), StdRng::seed_from_u64(0), NullPresenter);
        assert!(matches!(result, Err(SessionError::Config(_))));
    }

    #[test]
    fn start_enters_practice_with_first_trial() {
        let (mut s, _clock) = session(small_config());
        let events = s.start(ParticipantMeta::new("p1")).unwrap();

        assert_eq!(s.phase(), SessionPhase::Practice);
        assert_eq!(
            events,
            vec![SessionEvent::TrialStarted {
                block: Block::Practice,
                number: 1,
                total: 2
            }]
        );
        let state = s.state().unwrap();
        assert!(!state.is_paused());
        assert_eq!(state.active_timers(), 1);
        assert!(!state.input_gate_open());
        assert_eq!(s.progress(), Some((1, 2)));
        assert_eq!(s.participant_meta().participant_id, "p1");
    }

    #[test]
    fn operations_in_the_wrong_phase_are_rejected() {
        let (mut s, _clock) = session(small_config());
        assert!(matches!(
            s.confirm_break(),
            Err(SessionError::WrongPhase { operation: "confirm_break", .. })
        ));
        s.start(ParticipantMeta::default()).unwrap();
        assert!(matches!(
            s.start(ParticipantMeta::default()),
            Err(SessionError::WrongPhase { operation: "start", .. })
        ));
    }

    #[test]
    fn keys_outside_a_block_are_ignored() {
        let (mut s, _clock) = session(small_config());
        assert!(s.handle_key("f").is_empty());
        assert!(s.log().is_empty());
    }

    #[test]
    fn pause_freezes_timers_and_gate() {
        let (mut s, clock) = session(small_config());
        s.start(ParticipantMeta::default()).unwrap();
        clock.advance(500);
        s.poll().unwrap();
        assert!(s.state().unwrap().input_gate_open());

        assert_eq!(s.pause(), vec![SessionEvent::Paused]);
        assert!(s.pause().is_empty());
        assert!(s.is_paused());
        assert!(s.state().unwrap().is_paused());
        assert!(!s.state().unwrap().input_gate_open());
        assert_eq!(s.state().unwrap().active_timers(), 0);
        assert_eq!(s.next_deadline_ms(), None);

        clock.advance(60_000);
        assert!(s.poll().unwrap().is_empty());
        assert!(s.handle_key("f").is_empty());
        assert!(s.log().is_empty());

        assert_eq!(s.resume(), vec![SessionEvent::Resumed]);
        assert_eq!(s.state().unwrap().trial_state(), Some(TrialState::Fixation));
        assert_eq!(s.next_deadline_ms(), Some(60_500 + 500));
    }

    #[test]
    fn quit_discards_state_but_keeps_the_log() {
        let (mut s, clock) = session(small_config());
        s.start(ParticipantMeta::new("p2")).unwrap();
        clock.advance(500);
        s.poll().unwrap();
        clock.advance(300);
        assert_eq!(s.handle_key("f").len(), 1);

        s.quit();
        assert!(s.state().is_none());
        assert_eq!(s.phase(), SessionPhase::Instructions);
        assert_eq!(s.log().len(), 1);
        assert_eq!(s.next_deadline_ms(), None);

        s.restart();
        assert!(s.log().is_empty());
        assert_eq!(s.participant_meta(), &ParticipantMeta::default());
        assert_eq!(s.elapsed_ms(), 0);
    }
}
