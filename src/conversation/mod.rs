//! Conversation turn orchestration
//!
//! Coordinates one voice conversation turn at a time: capture the user's
//! speech, decide when they have finished, ask a responder for a reply,
//! speak it, and return to idle.
//!
//! ## States
//!
//! 1. **IDLE** - Waiting for the user to start a turn
//! 2. **LISTENING** - Capture is open, transcript fragments are arriving
//! 3. **PROCESSING** - The utterance was sent to the responder
//! 4. **RESPONDING** - The reply is being spoken
//!
//! ## State Transitions
//!
//! ```text
//!                 start               silence / stop
//! ┌──────┐ ─────────────────► ┌───────────┐ ─────────────────► ┌────────────┐
//! │ IDLE │                    │ LISTENING │                    │ PROCESSING │
//! └──────┘ ◄───────────────── └───────────┘                    └────────────┘
//!    ▲      empty utterance                                           │
//!    │                                                   reply / fallback
//!    │                                                                ▼
//!    │       playback ended / recovery timeout               ┌────────────┐
//!    └────────────────────────────────────────────────────── │ RESPONDING │
//!                                                            └────────────┘
//! ```
//!
//! Every transcript update while listening re-arms the silence timer; the
//! utterance ends when it expires or the user stops the turn. The recovery
//! timer returns the machine to idle if playback never starts.
//!
//! ## Events
//!
//! Subscribers to [`OrchestratorHandle::subscribe`] receive state changes,
//! live transcript updates, appended messages, capture errors and feedback
//! cues (see [`OrchestratorEvent`]).

pub mod log;
pub mod orchestrator;
pub mod state;
pub mod timer;

pub use log::{Message, MessageLog, Role};
pub use orchestrator::{
    channel, Cue, OrchestratorError, OrchestratorEvent, OrchestratorHandle, OrchestratorInbox,
    OrchestratorStatus, TurnOrchestrator,
};
pub use state::{
    ConversationEvent, ConversationState, TransitionReason, TransitionResult, TurnAction, TurnId,
    TurnStateMachine,
};
pub use timer::{DeadlineTimer, TimerKind};
