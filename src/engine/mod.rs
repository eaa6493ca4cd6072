//! Review engine loop and its command/event boundary
//!
//! The host shell (editor UI, DOM wiring, whatever renders the
//! document) talks to the engine over channels only: commands in,
//! events out. Grading, classification, and persistence all happen
//! inside the loop, so the scheduling core stays free of any UI event
//! model and is testable without one.
//!
//! Grading a span follows the cache-first ordering: the scheduler
//! result is staged into the review store, the state-change event is
//! emitted from the already-updated cache, and only then does the
//! write-through to storage run.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::cloze::{ClozeParser, ClozeSpan};
use crate::review::{
    classify, next_schedule, ContextId, Grade, ReviewConfig, SpanState, Visibility,
};
use crate::sync::ReviewSync;

/// Commands from the interaction surface
#[derive(Debug, Clone)]
pub enum ReviewCommand {
    /// Switch to a document context and render its text. Loads review
    /// history on the first switch; re-issuing the same context only
    /// re-renders.
    SetContext { context: ContextId, text: String },
    /// The document re-rendered (edit, refresh). Re-parses and
    /// re-classifies against the cache as-is; never triggers a load.
    DocumentRendered { text: String },
    /// The user opened a span
    RevealSpan { locator: String },
    /// A grade from the grading prompt. Honored only while that prompt
    /// is still open.
    SubmitGrade { prompt_id: Uuid, grade: Grade },
    /// Close the grading prompt without grading
    DismissPrompt { prompt_id: Uuid },
    /// Reload review history from the backends
    ForceResync,
    /// Engine shutting down
    Shutdown,
}

/// Events to the interaction surface
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewEvent {
    /// Full re-render: every span in document order with its state
    SpanStates { spans: Vec<SpanView> },
    /// One span's state changed
    StateChanged {
        locator: String,
        state: SpanState,
        visibility: Visibility,
    },
    /// A grading prompt opened for a span
    PromptOpened { prompt_id: Uuid, locator: String },
    /// The prompt closed without a grade (timeout or explicit dismiss)
    PromptDismissed { prompt_id: Uuid },
}

/// A span plus its classified state, as the renderer should draw it
#[derive(Debug, Clone, PartialEq)]
pub struct SpanView {
    pub locator: String,
    pub content: String,
    pub audio_text: Option<String>,
    pub state: SpanState,
    pub visibility: Visibility,
}

/// Handle for the review engine loop
pub struct ReviewEngine {
    sender: mpsc::Sender<ReviewCommand>,
}

impl ReviewEngine {
    pub fn set_context(&self, context: ContextId, text: impl Into<String>) {
        let _ = self.sender.try_send(ReviewCommand::SetContext {
            context,
            text: text.into(),
        });
    }

    pub fn document_rendered(&self, text: impl Into<String>) {
        let _ = self
            .sender
            .try_send(ReviewCommand::DocumentRendered { text: text.into() });
    }

    pub fn reveal_span(&self, locator: impl Into<String>) {
        let _ = self.sender.try_send(ReviewCommand::RevealSpan {
            locator: locator.into(),
        });
    }

    pub fn submit_grade(&self, prompt_id: Uuid, grade: Grade) {
        let _ = self
            .sender
            .try_send(ReviewCommand::SubmitGrade { prompt_id, grade });
    }

    pub fn dismiss_prompt(&self, prompt_id: Uuid) {
        let _ = self
            .sender
            .try_send(ReviewCommand::DismissPrompt { prompt_id });
    }

    pub fn force_resync(&self) {
        let _ = self.sender.try_send(ReviewCommand::ForceResync);
    }

    pub fn shutdown(&self) {
        let _ = self.sender.try_send(ReviewCommand::Shutdown);
    }

    /// Clone of the internal sender for external command producers
    pub fn sender_clone(&self) -> mpsc::Sender<ReviewCommand> {
        self.sender.clone()
    }
}

/// An open grading prompt; at most one at a time
struct OpenPrompt {
    id: Uuid,
    locator: String,
    deadline: Option<Instant>,
}

struct EngineState {
    sync: Arc<ReviewSync>,
    config: ReviewConfig,
    parser: ClozeParser,
    events: mpsc::Sender<ReviewEvent>,
    context: Option<ContextId>,
    spans: Vec<ClozeSpan>,
    open_prompt: Option<OpenPrompt>,
}

/// Start the review engine.
///
/// Spawns the engine loop and returns the command handle plus the
/// event receiver the host should drain.
pub fn start_review_engine(
    sync: Arc<ReviewSync>,
    config: ReviewConfig,
) -> (ReviewEngine, mpsc::Receiver<ReviewEvent>) {
    let (command_tx, command_rx) = mpsc::channel(64);
    let (event_tx, event_rx) = mpsc::channel(64);

    let state = EngineState {
        sync,
        config,
        parser: ClozeParser::new(),
        events: event_tx,
        context: None,
        spans: Vec::new(),
        open_prompt: None,
    };

    tokio::spawn(async move {
        engine_loop(state, command_rx).await;
    });

    (ReviewEngine { sender: command_tx }, event_rx)
}

async fn engine_loop(mut state: EngineState, mut receiver: mpsc::Receiver<ReviewCommand>) {
    log::info!("review engine started");

    loop {
        let deadline = state.open_prompt.as_ref().and_then(|p| p.deadline);

        tokio::select! {
            command = receiver.recv() => {
                match command {
                    Some(ReviewCommand::Shutdown) | None => {
                        log::info!("review engine shutting down");
                        break;
                    }
                    Some(command) => state.handle(command).await,
                }
            }

            _ = sleep_until_deadline(deadline), if deadline.is_some() => {
                state.dismiss_open_prompt().await;
            }
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        // Guarded out by `if deadline.is_some()`
        None => std::future::pending().await,
    }
}

impl EngineState {
    async fn handle(&mut self, command: ReviewCommand) {
        match command {
            ReviewCommand::SetContext { context, text } => {
                self.sync.ensure_loaded(&context).await;
                self.context = Some(context);
                self.spans = self.parser.parse(&text);
                self.emit_span_states().await;
            }

            ReviewCommand::DocumentRendered { text } => {
                if self.context.is_none() {
                    log::warn!("document rendered before any context was set");
                    return;
                }
                self.spans = self.parser.parse(&text);
                self.emit_span_states().await;
            }

            ReviewCommand::RevealSpan { locator } => {
                self.reveal(&locator).await;
            }

            ReviewCommand::SubmitGrade { prompt_id, grade } => {
                self.submit_grade(prompt_id, grade).await;
            }

            ReviewCommand::DismissPrompt { prompt_id } => {
                match &self.open_prompt {
                    Some(prompt) if prompt.id == prompt_id => {
                        self.dismiss_open_prompt().await;
                    }
                    _ => {
                        log::debug!("dismiss for prompt {} which is not open", prompt_id);
                    }
                }
            }

            ReviewCommand::ForceResync => {
                let Some(context) = self.context.clone() else {
                    log::warn!("force resync requested before any context was set");
                    return;
                };
                self.sync.force_resync(&context).await;
                self.emit_span_states().await;
            }

            // Handled in the loop
            ReviewCommand::Shutdown => {}
        }
    }

    async fn reveal(&mut self, locator: &str) {
        if !self.spans.iter().any(|s| s.locator == locator) {
            log::warn!("reveal for unknown locator '{}'", locator);
            return;
        }

        let schedule = self.sync.schedule(locator);
        let state = classify(schedule.as_ref(), Utc::now(), &self.config);

        // Revealing shows the text either way; cooling spans just never
        // get a grading prompt
        self.emit(ReviewEvent::StateChanged {
            locator: locator.to_string(),
            state,
            visibility: Visibility::Visible,
        })
        .await;

        if !state.allows_grading() {
            log::debug!("span '{}' is cooling, no grading prompt", locator);
            return;
        }

        // A new prompt replaces any prompt still open
        self.dismiss_open_prompt().await;

        let prompt_id = Uuid::new_v4();
        let deadline = self
            .config
            .prompt_timeout_ms
            .map(|ms| Instant::now() + std::time::Duration::from_millis(ms));
        self.open_prompt = Some(OpenPrompt {
            id: prompt_id,
            locator: locator.to_string(),
            deadline,
        });
        self.emit(ReviewEvent::PromptOpened {
            prompt_id,
            locator: locator.to_string(),
        })
        .await;
    }

    async fn submit_grade(&mut self, prompt_id: Uuid, grade: Grade) {
        let prompt = match self.open_prompt.take() {
            Some(prompt) if prompt.id == prompt_id => prompt,
            other => {
                // Prompt already timed out or was dismissed; the grade
                // must not be applied twice (or at all)
                log::debug!("ignoring grade for closed prompt {}", prompt_id);
                self.open_prompt = other;
                return;
            }
        };

        let Some(context) = self.context.clone() else {
            log::warn!("grade submitted before any context was set");
            return;
        };

        let now = Utc::now();
        let previous = self.sync.schedule(&prompt.locator);
        let next = next_schedule(previous.as_ref(), grade, now);
        log::info!(
            "graded '{}' in context '{}': grade={:?} interval={:.4}d ease={:.2}",
            prompt.locator,
            context,
            grade,
            next.interval,
            next.ease_factor
        );

        // Cache first, visuals from the cache, persistence last
        self.sync.stage(&prompt.locator, next.clone());
        let state = classify(Some(&next), now, &self.config);
        self.emit(ReviewEvent::StateChanged {
            locator: prompt.locator.clone(),
            state,
            visibility: state.default_visibility(),
        })
        .await;

        self.sync.persist(&context, &prompt.locator).await;
    }

    async fn dismiss_open_prompt(&mut self) {
        if let Some(prompt) = self.open_prompt.take() {
            log::debug!("prompt {} for '{}' dismissed", prompt.id, prompt.locator);
            self.emit(ReviewEvent::PromptDismissed {
                prompt_id: prompt.id,
            })
            .await;
        }
    }

    async fn emit_span_states(&mut self) {
        let now = Utc::now();
        let spans: Vec<SpanView> = self
            .spans
            .iter()
            .map(|span| {
                let schedule = self.sync.schedule(&span.locator);
                let state = classify(schedule.as_ref(), now, &self.config);
                SpanView {
                    locator: span.locator.clone(),
                    content: span.content.clone(),
                    audio_text: span.audio_text.clone(),
                    state,
                    visibility: state.default_visibility(),
                }
            })
            .collect();
        self.emit(ReviewEvent::SpanStates { spans }).await;
    }

    async fn emit(&self, event: ReviewEvent) {
        if self.events.send(event).await.is_err() {
            log::debug!("event receiver dropped");
        }
    }
}
