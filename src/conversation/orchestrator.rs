//! Turn orchestrator
//!
//! Runs the conversation state machine as a single tokio task. Every input
//! (user commands, transcript updates, playback changes, timer expiries and
//! responder results) arrives on one channel and is handled to completion
//! before the next, so no locking is needed around the state machine, the
//! timers or the message log. Callers interact through a cloneable
//! [`OrchestratorHandle`].

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::log::{Message, MessageLog, Role};
use super::state::{
    ConversationEvent, ConversationState, TransitionReason, TransitionResult, TurnAction, TurnId,
    TurnStateMachine,
};
use super::timer::{DeadlineTimer, TimerKind};
use crate::config::TurnConfig;
use crate::responder::{Responder, ResponderError};
use crate::services::{CaptureService, PlaybackService};

/// Capacity of the UI event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Error types for orchestrator handle operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Turn orchestrator is not running")]
    NotRunning,
}

/// Everything the orchestrator task reacts to
#[derive(Debug)]
enum Input {
    StartTurn,
    EndTurn,
    ClearLog,
    Transcript { confirmed: String, tentative: String },
    CaptureFailed(String),
    PlaybackChanged(bool),
    TimerElapsed { kind: TimerKind, generation: u64 },
    ReplySettled {
        turn: TurnId,
        result: Result<String, ResponderError>,
    },
    Shutdown,
}

/// Feedback moments the UI may render as a sound or vibration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    /// The utterance was captured and sent to the responder
    ProcessingStarted,
    /// A reply is about to be spoken
    ResponseReady,
}

/// Event broadcast to UI subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    /// The conversation state changed
    StateChanged {
        previous: ConversationState,
        new: ConversationState,
        reason: TransitionReason,
        turn: TurnId,
    },
    /// The live transcript changed while listening
    TranscriptChanged { text: String },
    /// A message was added to the log
    MessageAppended { message: Message },
    /// The log was cleared
    LogCleared,
    /// The capture service reported an error
    CaptureError { message: String },
    /// A feedback cue
    Cue { cue: Cue },
}

/// Snapshot of everything the UI displays
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorStatus {
    /// Current state
    pub state: ConversationState,
    /// State description for UI display
    pub description: String,
    /// Active (or most recent) turn
    pub turn: TurnId,
    /// Live transcript of the current turn
    pub transcript: String,
    /// Text of the last reply (including the fallback)
    pub last_response: Option<String>,
    /// Last capture error, cleared when a new turn starts
    pub last_error: Option<String>,
    /// Message log in insertion order
    pub messages: Vec<Message>,
}

/// Cloneable handle to a running orchestrator
///
/// Used both by the UI (commands, status, events) and by the capture and
/// playback services to report what they observe.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::UnboundedSender<Input>,
    status: Arc<RwLock<OrchestratorStatus>>,
    events: broadcast::Sender<OrchestratorEvent>,
}

/// Receiving side created by [`channel`], consumed by [`TurnOrchestrator::new`]
#[derive(Debug)]
pub struct OrchestratorInbox {
    rx: mpsc::UnboundedReceiver<Input>,
    sender: mpsc::WeakUnboundedSender<Input>,
    status: Arc<RwLock<OrchestratorStatus>>,
    events: broadcast::Sender<OrchestratorEvent>,
}

/// Create a handle and the inbox the orchestrator will read from
///
/// The handle exists before the orchestrator so services can be built with a
/// clone of it.
pub fn channel() -> (OrchestratorHandle, OrchestratorInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    let status = Arc::new(RwLock::new(OrchestratorStatus {
        description: ConversationState::Idle.description().to_string(),
        ..Default::default()
    }));

    let inbox = OrchestratorInbox {
        rx,
        sender: tx.downgrade(),
        status: Arc::clone(&status),
        events: events.clone(),
    };
    let handle = OrchestratorHandle { tx, status, events };
    (handle, inbox)
}

impl OrchestratorHandle {
    fn send(&self, input: Input) -> Result<(), OrchestratorError> {
        self.tx.send(input).map_err(|_| OrchestratorError::NotRunning)
    }

    /// Start a turn (valid from `idle`; ignored otherwise)
    pub fn start_turn(&self) -> Result<(), OrchestratorError> {
        self.send(Input::StartTurn)
    }

    /// End the current turn now, using whatever was captured so far
    pub fn end_turn(&self) -> Result<(), OrchestratorError> {
        self.send(Input::EndTurn)
    }

    /// Empty the message log. Callers should only do this while `idle`.
    pub fn clear_log(&self) -> Result<(), OrchestratorError> {
        self.send(Input::ClearLog)
    }

    /// Report the capture service's current confirmed and tentative text
    pub fn transcript_changed(
        &self,
        confirmed: impl Into<String>,
        tentative: impl Into<String>,
    ) -> Result<(), OrchestratorError> {
        self.send(Input::Transcript {
            confirmed: confirmed.into(),
            tentative: tentative.into(),
        })
    }

    /// Report a capture error, shown to the user verbatim
    pub fn capture_error(&self, message: impl Into<String>) -> Result<(), OrchestratorError> {
        self.send(Input::CaptureFailed(message.into()))
    }

    /// Report the playback service's `is_playing` value
    pub fn playback_changed(&self, is_playing: bool) -> Result<(), OrchestratorError> {
        self.send(Input::PlaybackChanged(is_playing))
    }

    /// Stop the orchestrator task
    pub fn shutdown(&self) -> Result<(), OrchestratorError> {
        self.send(Input::Shutdown)
    }

    /// Latest published status
    pub fn status(&self) -> OrchestratorStatus {
        self.status.read().clone()
    }

    /// Current conversation state
    pub fn state(&self) -> ConversationState {
        self.status.read().state
    }

    /// Subscribe to UI events
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    /// Whether the orchestrator task is still accepting input
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// The turn orchestration engine
pub struct TurnOrchestrator {
    machine: TurnStateMachine,
    log: MessageLog,
    capture: Arc<dyn CaptureService>,
    playback: Arc<dyn PlaybackService>,
    responder: Arc<dyn Responder>,
    silence_timer: DeadlineTimer,
    recovery_timer: DeadlineTimer,
    inbox: mpsc::UnboundedReceiver<Input>,
    sender: mpsc::WeakUnboundedSender<Input>,
    status: Arc<RwLock<OrchestratorStatus>>,
    events: broadcast::Sender<OrchestratorEvent>,
    /// Last `is_playing` value reported by the playback service
    playing: bool,
    last_response: Option<String>,
    last_error: Option<String>,
    reply_task: Option<JoinHandle<()>>,
}

impl TurnOrchestrator {
    pub fn new(
        config: &TurnConfig,
        inbox: OrchestratorInbox,
        capture: Arc<dyn CaptureService>,
        playback: Arc<dyn PlaybackService>,
        responder: Arc<dyn Responder>,
    ) -> Self {
        Self {
            machine: TurnStateMachine::new(config.fallback_reply.clone()),
            log: MessageLog::new(),
            capture,
            playback,
            responder,
            silence_timer: DeadlineTimer::new(TimerKind::Silence, config.silence_delay()),
            recovery_timer: DeadlineTimer::new(TimerKind::Recovery, config.recovery_delay()),
            inbox: inbox.rx,
            sender: inbox.sender,
            status: inbox.status,
            events: inbox.events,
            playing: false,
            last_response: None,
            last_error: None,
            reply_task: None,
        }
    }

    /// Run the orchestrator on its own task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process inputs until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        tracing::info!(
            "Turn orchestrator started (responder: {}, silence: {}ms, recovery: {}ms)",
            self.responder.name(),
            self.silence_timer.delay().as_millis(),
            self.recovery_timer.delay().as_millis()
        );
        self.publish_status();

        while let Some(input) = self.inbox.recv().await {
            if matches!(input, Input::Shutdown) {
                break;
            }
            self.handle_input(input);
            self.publish_status();
        }

        self.teardown();
        tracing::info!("Turn orchestrator stopped");
    }

    fn handle_input(&mut self, input: Input) {
        match input {
            Input::StartTurn => self.dispatch(ConversationEvent::StartRequested),
            Input::EndTurn => self.dispatch(ConversationEvent::StopRequested),
            Input::ClearLog => self.clear_log(),
            Input::Transcript {
                confirmed,
                tentative,
            } => {
                if self.machine.state() != ConversationState::Listening {
                    tracing::debug!(
                        "Ignoring transcript update in {:?} state",
                        self.machine.state()
                    );
                    return;
                }
                let text = format!("{}{}", confirmed, tentative);
                if text != self.machine.live_transcript() {
                    self.emit(OrchestratorEvent::TranscriptChanged { text: text.clone() });
                }
                self.dispatch(ConversationEvent::TranscriptChanged { text });
            }
            Input::CaptureFailed(message) => {
                tracing::warn!("Capture error: {}", message);
                self.last_error = Some(message.clone());
                self.emit(OrchestratorEvent::CaptureError { message });
                // Capture is gone; finish the turn with what was heard so far
                if self.machine.state() == ConversationState::Listening {
                    self.dispatch(ConversationEvent::StopRequested);
                }
            }
            Input::PlaybackChanged(is_playing) => {
                let was_playing = std::mem::replace(&mut self.playing, is_playing);
                match (was_playing, is_playing) {
                    (false, true) => self.dispatch(ConversationEvent::PlaybackStarted),
                    (true, false) => self.dispatch(ConversationEvent::PlaybackEnded),
                    _ => {}
                }
            }
            Input::TimerElapsed { kind, generation } => match kind {
                TimerKind::Silence => {
                    if self.silence_timer.accept(generation) {
                        self.dispatch(ConversationEvent::SilenceElapsed);
                    }
                }
                TimerKind::Recovery => {
                    if self.recovery_timer.accept(generation) {
                        tracing::debug!("Recovery timer fired");
                        self.dispatch(ConversationEvent::RecoveryElapsed);
                    }
                }
            },
            Input::ReplySettled { turn, result } => {
                self.reply_task = None;
                let event = match result {
                    Ok(reply) => ConversationEvent::ReplyReady { turn, reply },
                    Err(e) => {
                        tracing::error!(
                            "Responder '{}' failed for turn {}: {}",
                            self.responder.name(),
                            turn,
                            e
                        );
                        ConversationEvent::ReplyFailed {
                            turn,
                            error: e.to_string(),
                        }
                    }
                };
                self.dispatch(event);
            }
            Input::Shutdown => {}
        }
    }

    /// Feed an event to the state machine and carry out the resulting actions
    fn dispatch(&mut self, event: ConversationEvent) {
        let dwell = self.machine.time_in_state();
        let Some(result) = self.machine.process_event(event) else {
            return;
        };
        let TransitionResult {
            previous_state,
            new_state,
            reason,
            actions,
        } = result;

        if reason == TransitionReason::UserStart {
            self.last_error = None;
            self.last_response = None;
        }

        for action in actions {
            self.execute(action);
        }

        if previous_state != new_state {
            tracing::debug!("Left {:?} after {}ms", previous_state, dwell.as_millis());
            self.emit(OrchestratorEvent::StateChanged {
                previous: previous_state,
                new: new_state,
                reason,
                turn: self.machine.turn(),
            });
            match new_state {
                ConversationState::Processing => self.emit(OrchestratorEvent::Cue {
                    cue: Cue::ProcessingStarted,
                }),
                ConversationState::Responding => self.emit(OrchestratorEvent::Cue {
                    cue: Cue::ResponseReady,
                }),
                _ => {}
            }
        }
    }

    fn execute(&mut self, action: TurnAction) {
        match action {
            TurnAction::OpenCapture => {
                if let Err(e) = self.capture.start() {
                    // Handled as the next input so the current transition completes first
                    self.enqueue(Input::CaptureFailed(e.to_string()));
                }
            }
            TurnAction::CloseCapture => self.capture.stop(),
            TurnAction::ArmSilenceTimer => {
                let sender = self.sender.clone();
                self.silence_timer
                    .arm(move |kind, generation| notify_timer(&sender, kind, generation));
            }
            TurnAction::CancelSilenceTimer => self.silence_timer.cancel(),
            TurnAction::ArmRecoveryTimer => {
                let sender = self.sender.clone();
                self.recovery_timer
                    .arm(move |kind, generation| notify_timer(&sender, kind, generation));
            }
            TurnAction::CancelRecoveryTimer => self.recovery_timer.cancel(),
            TurnAction::RequestReply { turn, utterance } => self.request_reply(turn, utterance),
            TurnAction::RecordExchange { utterance, reply } => {
                for (role, text) in [(Role::User, utterance), (Role::Assistant, reply.clone())] {
                    let appended = self.log.append(role, &text).cloned();
                    if let Some(message) = appended {
                        self.emit(OrchestratorEvent::MessageAppended { message });
                    }
                }
                self.last_response = Some(reply);
            }
            TurnAction::Speak { text } => {
                // Only a fresh false -> true edge counts as this reply starting
                self.playing = false;
                self.playback.speak(&text);
            }
        }
    }

    fn request_reply(&mut self, turn: TurnId, utterance: String) {
        tracing::info!(
            "Requesting reply for turn {} ({} characters)",
            turn,
            utterance.len()
        );
        let responder = Arc::clone(&self.responder);
        let sender = self.sender.clone();

        if let Some(previous) = self.reply_task.take() {
            previous.abort();
        }
        self.reply_task = Some(tokio::spawn(async move {
            // A panicking responder surfaces as a JoinError and takes the fallback path
            let call = tokio::spawn(async move { responder.respond(&utterance).await });
            let result = call
                .await
                .unwrap_or_else(|e| Err(ResponderError::TaskFailed(e.to_string())));
            if let Some(tx) = sender.upgrade() {
                let _ = tx.send(Input::ReplySettled { turn, result });
            }
        }));
    }

    fn clear_log(&mut self) {
        let state = self.machine.state();
        if !state.can_clear_log() {
            tracing::warn!("Clearing message log while {:?}", state);
        }
        self.log.clear();
        self.emit(OrchestratorEvent::LogCleared);
        tracing::info!("Message log cleared");
    }

    fn enqueue(&self, input: Input) {
        if let Some(tx) = self.sender.upgrade() {
            let _ = tx.send(input);
        }
    }

    fn emit(&self, event: OrchestratorEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    fn publish_status(&self) {
        let state = self.machine.state();
        let mut status = self.status.write();
        status.state = state;
        status.description = state.description().to_string();
        status.turn = self.machine.turn();
        status.transcript = self.machine.live_transcript().to_string();
        status.last_response = self.last_response.clone();
        status.last_error = self.last_error.clone();
        status.messages = self.log.messages().to_vec();
    }

    fn teardown(&mut self) {
        self.silence_timer.cancel();
        self.recovery_timer.cancel();
        if let Some(task) = self.reply_task.take() {
            task.abort();
        }
        if self.machine.state().is_capturing() {
            self.capture.stop();
        }
        self.machine.reset();
        self.publish_status();
    }
}

fn notify_timer(sender: &mpsc::WeakUnboundedSender<Input>, kind: TimerKind, generation: u64) {
    if let Some(tx) = sender.upgrade() {
        let _ = tx.send(Input::TimerElapsed { kind, generation });
    }
}
