use mrot_core::{Response, Stimulus};

/// Correctness feedback shown after each trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feedback {
    pub correct: bool,
    pub reaction_time_ms: u64,
    pub response: Response,
}

/// Presentation seam. The experiment calls these at each trial transition
/// and never deals with rendering details itself.
pub trait Presenter {
    fn show_fixation(&mut self);
    fn show_stimulus(&mut self, stimulus: &Stimulus);
    fn show_feedback(&mut self, feedback: &Feedback);
    fn clear(&mut self);
}

impl<P: Presenter + ?Sized> Presenter for Box<P> {
    fn show_fixation(&mut self) {
        (**self).show_fixation()
    }
    fn show_stimulus(&mut self, stimulus: &Stimulus) {
        (**self).show_stimulus(stimulus)
    }
    fn show_feedback(&mut self, feedback: &Feedback) {
        (**self).show_feedback(feedback)
    }
    fn clear(&mut self) {
        (**self).clear()
    }
}

/// Discards every frame. For headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPresenter;

impl Presenter for NullPresenter {
    fn show_fixation(&mut self) {}
    fn show_stimulus(&mut self, _stimulus: &Stimulus) {}
    fn show_feedback(&mut self, _feedback: &Feedback) {}
    fn clear(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Fixation,
    Stimulus(Stimulus),
    Feedback(Feedback),
    Clear,
}

/// Keeps every frame it is asked to show, in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingPresenter {
    pub frames: Vec<Frame>,
}

impl RecordingPresenter {
    pub fn stimuli(&self) -> impl Iterator<Item = &Stimulus> {
        self.frames.iter().filter_map(|f| match f {
            Frame::Stimulus(s) => Some(s),
            _ => None,
        })
    }

    pub fn last(&self) -> Option<&Frame> {
        self.frames.last()
    }
}

impl Presenter for RecordingPresenter {
    fn show_fixation(&mut self) {
        self.frames.push(Frame::Fixation);
    }
    fn show_stimulus(&mut self, stimulus: &Stimulus) {
        self.frames.push(Frame::Stimulus(*stimulus));
    }
    fn show_feedback(&mut self, feedback: &Feedback) {
        self.frames.push(Frame::Feedback(*feedback));
    }
    fn clear(&mut self) {
        self.frames.push(Frame::Clear);
    }
}
