use std::sync::Arc;

use funnel_core::event_bus::{self, EventSink};
use funnel_core::{AnswerMap, SessionContext, StepCatalog, StepDefinition, StepType};
use tracing::{debug, info};

use crate::ordering::resolve_order;
use crate::store::SavedProgress;

/// Outcome of an `advance` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// A new step was entered.
    Entered { index: usize, step_id: String },
    /// No visible step remains after the current one. Answers were still merged.
    EndOfFunnel,
}

/// Navigation state for one session.
#[derive(Debug, Clone)]
pub struct SequencerState {
    pub ordered_steps: Vec<StepDefinition>,
    pub current_index: usize,
    pub history: Vec<usize>,
    pub answers: AnswerMap,
}

impl SequencerState {
    pub fn new(ordered_steps: Vec<StepDefinition>) -> Self {
        Self {
            ordered_steps,
            current_index: 0,
            history: Vec::new(),
            answers: AnswerMap::new(),
        }
    }

    /// Index of the first analysis step, or the funnel length when there is none.
    pub fn quiz_end_index(&self) -> usize {
        self.ordered_steps
            .iter()
            .position(|s| s.step_type == StepType::Analysis)
            .unwrap_or(self.ordered_steps.len())
    }

    /// First index after the current one whose step is visible for `answers`.
    fn next_visible_index(&self) -> Option<usize> {
        (self.current_index + 1..self.ordered_steps.len()).find(|&i| {
            let step = &self.ordered_steps[i];
            let visible = step.is_visible(&self.answers);
            if !visible {
                if let Some(condition) = &step.condition {
                    debug!(step_id = %step.id, %condition, "step skipped by condition");
                }
            }
            visible
        })
    }
}

/// Drives a visitor through the ordered funnel: conditional skipping,
/// back-navigation history and progress. Every successful advance emits one
/// `StepEntered` event on the attached event sink.
pub struct FunnelSequencer {
    state: SequencerState,
    session: Arc<SessionContext>,
    event_sink: Arc<dyn EventSink>,
    started: bool,
}

impl std::fmt::Debug for FunnelSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunnelSequencer")
            .field("steps", &self.state.ordered_steps.len())
            .field("current_index", &self.state.current_index)
            .field("history", &self.state.history.len())
            .finish()
    }
}

impl FunnelSequencer {
    /// Builds the ordered funnel from the catalog and an optional persisted order.
    pub fn new(
        catalog: &StepCatalog,
        persisted_order: Option<&[String]>,
        session: Arc<SessionContext>,
    ) -> Self {
        let ordered_steps = resolve_order(catalog.steps(), persisted_order);
        info!(
            steps = ordered_steps.len(),
            custom_order = persisted_order.is_some(),
            "funnel sequencer initialized"
        );
        Self {
            state: SequencerState::new(ordered_steps),
            session,
            event_sink: event_bus::noop_sink(),
            started: false,
        }
    }

    /// Attach an event sink for emitting step events.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Emits the entry event for the step the visitor lands on. Only the
    /// first call per session emits.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        if let Some(step) = self.current_step() {
            let event =
                event_bus::step_entered(self.session.session_id(), &step.id, self.state.current_index);
            self.event_sink.emit(event);
        }
    }

    /// Merges `answer_patch` and moves to the next visible step.
    pub fn advance(&mut self, answer_patch: AnswerMap) -> Advance {
        self.state.answers.merge(answer_patch);

        let Some(next) = self.state.next_visible_index() else {
            debug!(current_index = self.state.current_index, "end of funnel reached");
            return Advance::EndOfFunnel;
        };

        self.state.history.push(self.state.current_index);
        self.state.current_index = next;
        let step_id = self.state.ordered_steps[next].id.clone();

        debug!(step_id = %step_id, index = next, "entered step");
        self.event_sink
            .emit(event_bus::step_entered(self.session.session_id(), &step_id, next));

        Advance::Entered {
            index: next,
            step_id,
        }
    }

    /// Returns to the previously visited step. No-op when there is no history.
    pub fn go_back(&mut self) -> bool {
        match self.state.history.pop() {
            Some(previous) => {
                debug!(from = self.state.current_index, to = previous, "navigated back");
                self.state.current_index = previous;
                true
            }
            None => false,
        }
    }

    /// Progress through the quiz part of the funnel, in `[0, 1]`.
    pub fn progress_fraction(&self) -> f64 {
        let quiz_end = self.state.quiz_end_index();
        if quiz_end == 0 {
            return 1.0;
        }
        ((self.state.current_index + 1) as f64 / quiz_end as f64).min(1.0)
    }

    /// 1-based position of the current question among all question steps,
    /// with the total question count.
    pub fn question_position(&self) -> Option<(usize, usize)> {
        let current = self.current_step()?;
        if current.step_type != StepType::Question {
            return None;
        }
        let questions: Vec<&StepDefinition> = self
            .state
            .ordered_steps
            .iter()
            .filter(|s| s.step_type == StepType::Question)
            .collect();
        let position = questions.iter().position(|s| s.id == current.id)?;
        Some((position + 1, questions.len()))
    }

    /// The progress bar is only shown on the quiz screens.
    pub fn shows_progress(&self) -> bool {
        self.current_step().is_some_and(|s| {
            matches!(
                s.step_type,
                StepType::Landing | StepType::Transition | StepType::Info | StepType::Question
            )
        })
    }

    pub fn current_step(&self) -> Option<&StepDefinition> {
        self.state.ordered_steps.get(self.state.current_index)
    }

    pub fn current_index(&self) -> usize {
        self.state.current_index
    }

    pub fn can_go_back(&self) -> bool {
        !self.state.history.is_empty()
    }

    /// True when no visible step follows the current one.
    pub fn is_finished(&self) -> bool {
        self.state.next_visible_index().is_none()
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.state.answers
    }

    pub fn ordered_steps(&self) -> &[StepDefinition] {
        &self.state.ordered_steps
    }

    pub fn state(&self) -> &SequencerState {
        &self.state
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    /// Snapshot of the run for mirroring to local storage.
    pub fn progress_snapshot(&self) -> Option<SavedProgress> {
        self.current_step().map(|step| SavedProgress {
            answers: self.state.answers.clone(),
            current_step: step.id.clone(),
        })
    }

    /// Restores a mirrored run. The history starts empty. An unknown step id,
    /// or a step with no visible successor (a finished run), leaves the
    /// sequencer untouched.
    pub fn resume(&mut self, saved: SavedProgress) -> bool {
        let steps = &self.state.ordered_steps;
        let Some(index) = steps.iter().position(|s| s.id == saved.current_step) else {
            debug!(step_id = %saved.current_step, "saved step no longer exists, not resuming");
            return false;
        };
        if !steps[index + 1..].iter().any(|s| s.is_visible(&saved.answers)) {
            debug!(step_id = %saved.current_step, "saved run already finished, not resuming");
            return false;
        }
        self.state.current_index = index;
        self.state.history.clear();
        self.state.answers = saved.answers;
        info!(step_id = %saved.current_step, "resumed saved progress");
        true
    }
}
