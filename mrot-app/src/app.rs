use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use mrot_core::{Block, ParticipantMeta, SessionPhase};
use mrot_experiment::{ExperimentConfig, Session, SessionEvent, Summary};
use mrot_timing::MonotonicClock;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::export::ExportDocument;
use crate::terminal::TerminalPresenter;

/// Upper bound on how long the loop blocks waiting for input.
const IDLE_POLL: Duration = Duration::from_millis(50);

pub struct App {
    session: Session<MonotonicClock, StdRng, TerminalPresenter>,
    participant: ParticipantMeta,
    output: Option<PathBuf>,
    practice_summary: Summary,
    exported: bool,
    should_exit: bool,
}

impl App {
    pub fn new(
        config: ExperimentConfig,
        participant: ParticipantMeta,
        seed: Option<u64>,
        output: Option<PathBuf>,
    ) -> Result<Self> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let session = Session::new(config, MonotonicClock::new(), rng, TerminalPresenter::new())
            .context("invalid experiment configuration")?;

        Ok(Self {
            session,
            participant,
            output,
            practice_summary: Summary::default(),
            exported: false,
            should_exit: false,
        })
    }

    pub fn run(mut self) -> Result<()> {
        TerminalPresenter::enter().context("entering raw terminal mode")?;
        let result = self.event_loop();
        let restored = TerminalPresenter::leave();
        result?;
        restored.context("restoring terminal")?;

        self.export()?;
        let formal = self.session.summary(Block::Formal);
        if formal.trials > 0 {
            println!(
                "Formal block: {} trials, {}% correct, mean RT {} ms",
                formal.trials, formal.accuracy_pct, formal.mean_rt_ms
            );
        }
        if let Some(path) = &self.output {
            if self.exported {
                println!("Results written to {}", path.display());
            }
        }
        Ok(())
    }

    fn event_loop(&mut self) -> Result<()> {
        let config = self.session.config().clone();
        self.session.presenter_mut().show_instructions(&config)?;

        while !self.should_exit {
            let events = self.session.poll()?;
            self.report(events)?;

            if event::poll(self.wait_time())? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_input(key)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Time until the next timer is due, capped so input stays responsive.
    fn wait_time(&self) -> Duration {
        match self.session.next_deadline_ms() {
            Some(deadline) => {
                let remaining = deadline.saturating_sub(self.session.now_ms());
                Duration::from_millis(remaining).min(IDLE_POLL)
            }
            None => IDLE_POLL,
        }
    }

    fn handle_input(&mut self, key: KeyEvent) -> Result<()> {
        let ctrl_c =
            key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl_c || key.code == KeyCode::Esc {
            info!(phase = ?self.session.phase(), "quit requested");
            self.session.quit();
            self.should_exit = true;
            return Ok(());
        }

        let confirm = matches!(key.code, KeyCode::Enter);
        match self.session.phase() {
            SessionPhase::Instructions if confirm => {
                let events = self.session.start(self.participant.clone())?;
                self.report(events)?;
            }
            SessionPhase::Break if confirm => {
                let events = self.session.confirm_break()?;
                self.report(events)?;
            }
            SessionPhase::Break if matches!(key.code, KeyCode::Char('n' | 'N')) => {
                self.session.decline_break()?;
                self.should_exit = true;
            }
            SessionPhase::Complete if confirm || key.code == KeyCode::Char('q') => {
                self.should_exit = true;
            }
            SessionPhase::Practice | SessionPhase::Formal => self.handle_trial_key(key)?,
            phase => debug!(?phase, code = ?key.code, "key ignored"),
        }
        Ok(())
    }

    fn handle_trial_key(&mut self, key: KeyEvent) -> Result<()> {
        let KeyCode::Char(c) = key.code else {
            return Ok(());
        };
        let raw = c.to_string();
        let is_response = self.session.config().keys.resolve(&raw).is_some();

        let events = if c == ' ' && !is_response {
            if self.session.is_paused() {
                self.session.resume()
            } else {
                self.session.pause()
            }
        } else {
            self.session.handle_key(&raw)
        };
        self.report(events)
    }

    fn report(&mut self, events: Vec<SessionEvent>) -> Result<()> {
        for event in events {
            debug!(?event, "session event");
            match event {
                SessionEvent::TrialStarted {
                    block,
                    number,
                    total,
                } => {
                    let status = format!("{} {number}/{total}", block.as_str());
                    self.session.presenter_mut().set_status(status);
                }
                SessionEvent::ResponseRecorded(result) => {
                    let running = self.session.running_summary();
                    let status = format!(
                        "{} {}/{} · {}% correct · mean RT {} ms",
                        result.block.as_str(),
                        result.trial_number,
                        self.session.progress().map_or(0, |(_, total)| total),
                        running.accuracy_pct,
                        running.mean_rt_ms
                    );
                    self.session.presenter_mut().set_status(status);
                }
                SessionEvent::BlockFinished { block, summary } => {
                    info!(block = block.as_str(), ?summary, "block finished");
                    if block == Block::Practice {
                        self.practice_summary = summary;
                    }
                }
                SessionEvent::BreakStarted => {
                    let summary = self.practice_summary;
                    let presenter = self.session.presenter_mut();
                    presenter.set_status("");
                    presenter.show_break(&summary)?;
                }
                SessionEvent::Paused => self.session.presenter_mut().show_paused()?,
                SessionEvent::Completed => {
                    self.export()?;
                    let formal = self.session.summary(Block::Formal);
                    let by_angle = self.session.angle_breakdown(Block::Formal);
                    let by_orientation = self.session.orientation_breakdown(Block::Formal);
                    let elapsed_ms = self.session.elapsed_ms();
                    let presenter = self.session.presenter_mut();
                    presenter.set_status("");
                    presenter.show_results(&formal, &by_angle, &by_orientation, elapsed_ms)?;
                }
                SessionEvent::StimulusShown { .. } | SessionEvent::Resumed => {}
            }
        }
        Ok(())
    }

    /// Writes the results file once, if an output path was given and any
    /// trial was recorded.
    fn export(&mut self) -> Result<()> {
        if self.exported || self.session.log().is_empty() {
            return Ok(());
        }
        let Some(path) = &self.output else {
            return Ok(());
        };
        ExportDocument::from_session(&self.session).write_to(path)?;
        info!(path = %path.display(), trials = self.session.log().len(), "results exported");
        self.exported = true;
        Ok(())
    }
}
