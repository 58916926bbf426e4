//! Capture and playback service contracts
//!
//! The orchestrator never talks to a microphone or a speaker directly. It
//! drives these traits, and the implementations report back through an
//! [`OrchestratorHandle`](crate::conversation::OrchestratorHandle).

pub mod capture;
pub mod playback;
pub mod terminal;

pub use capture::{CaptureError, CaptureService};
pub use playback::{estimated_speech_duration, PlaybackService};
pub use terminal::{TerminalCapture, TerminalPlayback};
