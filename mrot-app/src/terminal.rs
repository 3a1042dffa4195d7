//! Full-screen terminal presenter built on crossterm.

use std::io::{self, Stdout, Write, stdout};

use crossterm::{
    cursor, execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use mrot_core::{Orientation, Response, Stimulus};
use mrot_experiment::{ExperimentConfig, Feedback, Presenter, Summary};
use tracing::warn;

use crate::glyph;

/// Draws every frame centred on an otherwise blank screen, with an optional
/// status line along the bottom row.
pub struct TerminalPresenter {
    out: Stdout,
    status: String,
}

impl TerminalPresenter {
    pub fn new() -> Self {
        Self {
            out: stdout(),
            status: String::new(),
        }
    }

    /// Raw mode, alternate screen, hidden cursor.
    pub fn enter() -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), EnterAlternateScreen, cursor::Hide)
    }

    pub fn leave() -> io::Result<()> {
        execute!(stdout(), cursor::Show, LeaveAlternateScreen)?;
        terminal::disable_raw_mode()
    }

    /// Shown under the next frame drawn.
    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn show_instructions(&mut self, config: &ExperimentConfig) -> io::Result<()> {
        let lines = vec![
            "Mental rotation".to_string(),
            String::new(),
            "A rotated character will appear after a fixation cross.".to_string(),
            "Decide whether it is drawn normally or mirror-reversed.".to_string(),
            String::new(),
            format!(
                "[{}] normal      [{}] mirrored",
                config.keys.normal.to_uppercase(),
                config.keys.mirrored.to_uppercase()
            ),
            String::new(),
            format!(
                "{} practice trials, then {} formal trials.",
                config.practice_trials, config.formal_trials
            ),
            "Answer as quickly and accurately as you can.".to_string(),
            String::new(),
            "Enter to begin · Space to pause · Esc to quit".to_string(),
        ];
        self.draw(&lines, None)
    }

    pub fn show_break(&mut self, practice: &Summary) -> io::Result<()> {
        let lines = vec![
            "Practice complete".to_string(),
            String::new(),
            format!("Accuracy: {}%", practice.accuracy_pct),
            format!("Mean reaction time: {} ms", practice.mean_rt_ms),
            String::new(),
            "Enter to start the formal block · N to stop here".to_string(),
        ];
        self.draw(&lines, None)
    }

    pub fn show_paused(&mut self) -> io::Result<()> {
        let lines = vec![
            "Paused".to_string(),
            String::new(),
            "Space to continue · Esc to quit".to_string(),
        ];
        self.draw(&lines, Some(Color::Yellow))
    }

    pub fn show_results(
        &mut self,
        formal: &Summary,
        by_angle: &[(u16, Summary)],
        by_orientation: &[(Orientation, Summary); 2],
        elapsed_ms: u64,
    ) -> io::Result<()> {
        let mut lines = vec![
            "Experiment complete".to_string(),
            String::new(),
            format!(
                "Accuracy: {}%   Mean RT: {} ms   ({} trials)",
                formal.accuracy_pct, formal.mean_rt_ms, formal.trials
            ),
            format!("Experiment time: {}", format_elapsed(elapsed_ms)),
            String::new(),
            "angle   accuracy   mean RT".to_string(),
        ];
        lines.extend(by_angle.iter().map(|(angle, s)| {
            format!("{angle:>4}°   {:>6}%   {:>5} ms", s.accuracy_pct, s.mean_rt_ms)
        }));
        lines.push(String::new());
        lines.extend(by_orientation.iter().map(|(orientation, s)| {
            format!(
                "{:<8}  {:>6}%   {:>5} ms",
                orientation.as_str(),
                s.accuracy_pct,
                s.mean_rt_ms
            )
        }));
        lines.push(String::new());
        lines.push("Enter to exit".to_string());
        self.draw(&lines, None)
    }

    fn draw(&mut self, lines: &[String], color: Option<Color>) -> io::Result<()> {
        let (cols, rows) = terminal::size()?;
        queue!(self.out, terminal::Clear(ClearType::All))?;

        let top = rows.saturating_sub(lines.len() as u16) / 2;
        for (i, line) in lines.iter().enumerate() {
            let width = line.chars().count() as u16;
            queue!(
                self.out,
                cursor::MoveTo(cols.saturating_sub(width) / 2, top + i as u16)
            )?;
            if let Some(color) = color {
                queue!(self.out, SetForegroundColor(color))?;
            }
            queue!(self.out, Print(line), ResetColor)?;
        }

        if !self.status.is_empty() {
            queue!(
                self.out,
                cursor::MoveTo(1, rows.saturating_sub(1)),
                SetForegroundColor(Color::DarkGrey),
                Print(&self.status),
                ResetColor
            )?;
        }
        self.out.flush()
    }

    fn draw_or_warn(&mut self, frame: &str, lines: &[String], color: Option<Color>) {
        if let Err(e) = self.draw(lines, color) {
            warn!(frame, error = %e, "failed to draw frame");
        }
    }
}

impl Default for TerminalPresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Presenter for TerminalPresenter {
    fn show_fixation(&mut self) {
        self.draw_or_warn("fixation", &["+".to_string()], None);
    }

    fn show_stimulus(&mut self, stimulus: &Stimulus) {
        let lines = glyph::render(stimulus).unwrap_or_else(|| {
            // No bitmap: name the transform instead of drawing it.
            let mirrored = if stimulus.mirrored { " (mirrored)" } else { "" };
            vec![
                stimulus.character.to_string(),
                format!("rotated {}°{mirrored}", stimulus.angle),
            ]
        });
        self.draw_or_warn("stimulus", &lines, None);
    }

    fn show_feedback(&mut self, feedback: &Feedback) {
        let (headline, color) = match (feedback.response, feedback.correct) {
            (Response::Timeout, _) => ("Too slow", Color::Yellow),
            (_, true) => ("Correct", Color::Green),
            (_, false) => ("Wrong", Color::Red),
        };
        let lines = vec![
            headline.to_string(),
            format!("{} ms", feedback.reaction_time_ms),
        ];
        self.draw_or_warn("feedback", &lines, Some(color));
    }

    fn clear(&mut self) {
        if let Err(e) = execute!(self.out, terminal::Clear(ClearType::All)) {
            warn!(error = %e, "failed to clear screen");
        }
    }
}

/// `m:ss` for the results screen.
pub fn format_elapsed(elapsed_ms: u64) -> String {
    let secs = elapsed_ms / 1_000;
    format!("{}:{:02}", secs / 60, secs % 60)
}
