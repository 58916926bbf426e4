//! Conversation turn state machine
//!
//! Defines the states, events and transitions of a single conversational turn.
//! The machine is pure: it never touches capture, playback or the responder.
//! Each accepted event yields a [`TransitionResult`] listing the side effects
//! the orchestrator must carry out.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Conversation state
///
/// Exactly one of these holds at any time. There is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    /// Waiting for the user to start a turn
    #[default]
    Idle,
    /// Capture is open and the utterance is accumulating
    Listening,
    /// Waiting for the responder to answer
    Processing,
    /// Speaking the reply
    Responding,
}

impl ConversationState {
    /// Returns a human-readable description of the state
    pub fn description(&self) -> &'static str {
        match self {
            ConversationState::Idle => "Ready",
            ConversationState::Listening => "Listening",
            ConversationState::Processing => "Thinking",
            ConversationState::Responding => "Speaking",
        }
    }

    /// Returns whether the capture service is open in this state
    pub fn is_capturing(&self) -> bool {
        matches!(self, ConversationState::Listening)
    }

    /// Returns whether the message log may be cleared in this state
    pub fn can_clear_log(&self) -> bool {
        matches!(self, ConversationState::Idle)
    }
}

/// Identifier of a conversational turn, increasing by one per `listening` entry
pub type TurnId = u64;

/// Events that can trigger state transitions
#[derive(Debug, Clone)]
pub enum ConversationEvent {
    /// User asked to start a turn
    StartRequested,
    /// The confirmed + tentative transcript changed
    TranscriptChanged {
        /// Concatenated live transcript
        text: String,
    },
    /// The silence timer expired
    SilenceElapsed,
    /// User asked to end the turn
    StopRequested,
    /// Responder answered
    ReplyReady {
        /// Turn the request was issued for
        turn: TurnId,
        /// Reply text
        reply: String,
    },
    /// Responder failed
    ReplyFailed {
        /// Turn the request was issued for
        turn: TurnId,
        /// Error description (diagnostics only)
        error: String,
    },
    /// Playback reported it is playing
    PlaybackStarted,
    /// Playback reported it stopped playing
    PlaybackEnded,
    /// The recovery timer expired
    RecoveryElapsed,
}

/// Reason for entering a state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionReason {
    /// User started a turn
    UserStart,
    /// A new transcript fragment arrived
    SpeechActivity,
    /// Silence timer inferred the end of the utterance
    EndOfSpeech,
    /// User ended the turn
    UserStop,
    /// Nothing was said
    EmptyUtterance,
    /// Responder produced a reply
    ReplyReceived,
    /// Responder failed, the fallback reply is used
    ReplyFallback { error: String },
    /// Playback confirmed it started
    PlaybackStarted,
    /// Playback finished
    PlaybackFinished,
    /// Playback never started before the recovery deadline
    PlaybackAbandoned,
}

/// Side effect requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnAction {
    /// Open the capture service
    OpenCapture,
    /// Close the capture service
    CloseCapture,
    /// (Re)arm the silence timer
    ArmSilenceTimer,
    /// Cancel the silence timer
    CancelSilenceTimer,
    /// Invoke the responder once for this turn
    RequestReply { turn: TurnId, utterance: String },
    /// Append the user and assistant messages, in that order
    RecordExchange { utterance: String, reply: String },
    /// Hand the reply to the playback service
    Speak { text: String },
    /// Arm the recovery timer
    ArmRecoveryTimer,
    /// Cancel the recovery timer
    CancelRecoveryTimer,
}

/// Result of a state transition
#[derive(Debug, Clone)]
pub struct TransitionResult {
    /// State before the event
    pub previous_state: ConversationState,
    /// State after the event (may equal `previous_state`)
    pub new_state: ConversationState,
    /// Reason for the transition
    pub reason: TransitionReason,
    /// Side effects, in execution order
    pub actions: Vec<TurnAction>,
}

impl TransitionResult {
    /// Whether the state actually changed
    pub fn changed_state(&self) -> bool {
        self.previous_state != self.new_state
    }
}

/// Conversation turn state machine
///
/// Owns the current state, the utterance buffers and the has-started flag.
/// Timer bookkeeping and service calls belong to the orchestrator.
pub struct TurnStateMachine {
    /// Current state
    state: ConversationState,
    /// When the current state was entered
    state_entered_at: Instant,
    /// Current (or last) turn
    turn: TurnId,
    /// Latest concatenated transcript
    live_transcript: String,
    /// Snapshot taken each time the silence timer is armed
    buffered_utterance: Option<String>,
    /// Trimmed utterance handed to the responder
    pending_utterance: Option<String>,
    /// Whether playback confirmed it started for this turn
    has_started: bool,
    /// Reply used when the responder fails
    fallback_reply: String,
}

impl TurnStateMachine {
    /// Creates a new state machine in the Idle state
    pub fn new(fallback_reply: impl Into<String>) -> Self {
        Self {
            state: ConversationState::Idle,
            state_entered_at: Instant::now(),
            turn: 0,
            live_transcript: String::new(),
            buffered_utterance: None,
            pending_utterance: None,
            has_started: false,
            fallback_reply: fallback_reply.into(),
        }
    }

    /// Returns the current state
    pub fn state(&self) -> ConversationState {
        self.state
    }

    /// Returns the active (or most recent) turn
    pub fn turn(&self) -> TurnId {
        self.turn
    }

    /// Returns how long the machine has been in the current state
    pub fn time_in_state(&self) -> std::time::Duration {
        self.state_entered_at.elapsed()
    }

    /// Returns the live transcript
    pub fn live_transcript(&self) -> &str {
        &self.live_transcript
    }

    /// Returns whether playback has confirmed it started this turn
    pub fn has_started(&self) -> bool {
        self.has_started
    }

    /// Returns the fallback reply
    pub fn fallback_reply(&self) -> &str {
        &self.fallback_reply
    }

    /// Process an event and return the transition result if it was accepted
    ///
    /// Returns `None` if the event has no effect in the current state. A
    /// transcript update in `Listening` always refreshes the live transcript,
    /// even when it does not re-arm the silence timer.
    pub fn process_event(&mut self, event: ConversationEvent) -> Option<TransitionResult> {
        use ConversationEvent as E;
        use ConversationState as S;

        let (new_state, reason, actions) = match (self.state, event) {
            // IDLE
            (S::Idle, E::StartRequested) => {
                self.turn += 1;
                self.live_transcript.clear();
                self.buffered_utterance = None;
                self.pending_utterance = None;
                self.has_started = false;
                (
                    S::Listening,
                    TransitionReason::UserStart,
                    vec![
                        TurnAction::CancelSilenceTimer,
                        TurnAction::CancelRecoveryTimer,
                        TurnAction::OpenCapture,
                    ],
                )
            }

            // LISTENING
            (S::Listening, E::TranscriptChanged { text }) => {
                if text == self.live_transcript {
                    return None;
                }
                self.live_transcript = text;
                if self.live_transcript.is_empty() {
                    return None;
                }
                self.buffered_utterance = Some(self.live_transcript.clone());
                (
                    S::Listening,
                    TransitionReason::SpeechActivity,
                    vec![TurnAction::ArmSilenceTimer],
                )
            }
            (S::Listening, E::SilenceElapsed) => {
                self.finish_utterance(TransitionReason::EndOfSpeech)
            }
            (S::Listening, E::StopRequested) => self.finish_utterance(TransitionReason::UserStop),

            // PROCESSING
            (S::Processing, E::ReplyReady { turn, reply }) if turn == self.turn => {
                if reply.trim().is_empty() {
                    self.fallback_transition("empty reply".to_string())
                } else {
                    self.reply_transition(reply, TransitionReason::ReplyReceived)
                }
            }
            (S::Processing, E::ReplyFailed { turn, error }) if turn == self.turn => {
                self.fallback_transition(error)
            }
            (_, E::ReplyReady { turn, .. }) | (_, E::ReplyFailed { turn, .. }) => {
                tracing::debug!(
                    "Discarding responder result for turn {} (active turn {}, state {:?})",
                    turn,
                    self.turn,
                    self.state
                );
                return None;
            }

            // RESPONDING
            (S::Responding, E::PlaybackStarted) if !self.has_started => {
                self.has_started = true;
                (
                    S::Responding,
                    TransitionReason::PlaybackStarted,
                    vec![TurnAction::CancelRecoveryTimer],
                )
            }
            (S::Responding, E::PlaybackEnded) if self.has_started => {
                self.has_started = false;
                (S::Idle, TransitionReason::PlaybackFinished, Vec::new())
            }
            (S::Responding, E::RecoveryElapsed) if !self.has_started => {
                (S::Idle, TransitionReason::PlaybackAbandoned, Vec::new())
            }

            _ => return None,
        };

        let result = TransitionResult {
            previous_state: self.state,
            new_state,
            reason,
            actions,
        };
        self.apply_transition(&result);
        Some(result)
    }

    /// Listening -> Processing, or straight back to Idle when nothing was said
    fn finish_utterance(
        &mut self,
        reason: TransitionReason,
    ) -> (ConversationState, TransitionReason, Vec<TurnAction>) {
        let snapshot = self
            .buffered_utterance
            .take()
            .unwrap_or_else(|| self.live_transcript.clone());
        let utterance = snapshot.trim().to_string();
        let mut actions = vec![TurnAction::CancelSilenceTimer, TurnAction::CloseCapture];

        if utterance.is_empty() {
            return (ConversationState::Idle, TransitionReason::EmptyUtterance, actions);
        }

        self.pending_utterance = Some(utterance.clone());
        actions.push(TurnAction::RequestReply {
            turn: self.turn,
            utterance,
        });
        (ConversationState::Processing, reason, actions)
    }

    fn fallback_transition(
        &mut self,
        error: String,
    ) -> (ConversationState, TransitionReason, Vec<TurnAction>) {
        let reply = self.fallback_reply.clone();
        self.reply_transition(reply, TransitionReason::ReplyFallback { error })
    }

    fn reply_transition(
        &mut self,
        reply: String,
        reason: TransitionReason,
    ) -> (ConversationState, TransitionReason, Vec<TurnAction>) {
        let utterance = self.pending_utterance.take().unwrap_or_default();
        self.has_started = false;
        (
            ConversationState::Responding,
            reason,
            vec![
                TurnAction::RecordExchange {
                    utterance,
                    reply: reply.clone(),
                },
                TurnAction::Speak { text: reply },
                TurnAction::ArmRecoveryTimer,
            ],
        )
    }

    /// Apply a transition, updating internal state
    fn apply_transition(&mut self, result: &TransitionResult) {
        if !result.changed_state() {
            tracing::debug!(
                "Conversation self-transition in {:?} (reason: {:?})",
                result.new_state,
                result.reason
            );
            return;
        }

        self.state = result.new_state;
        self.state_entered_at = Instant::now();

        if result.new_state == ConversationState::Idle {
            self.buffered_utterance = None;
            self.pending_utterance = None;
            self.has_started = false;
        }

        tracing::info!(
            "Conversation state transition: {:?} -> {:?} (turn {}, reason: {:?})",
            result.previous_state,
            result.new_state,
            self.turn,
            result.reason
        );
    }

    /// Reset the state machine to Idle, keeping the turn counter
    pub fn reset(&mut self) {
        self.state = ConversationState::Idle;
        self.state_entered_at = Instant::now();
        self.live_transcript.clear();
        self.buffered_utterance = None;
        self.pending_utterance = None;
        self.has_started = false;
        tracing::info!("Conversation state machine reset to Idle");
    }
}
