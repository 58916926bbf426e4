//! Speech playback contract

use std::time::Duration;

/// Minimum estimated speaking time
const MIN_SPEECH_DURATION_MS: u64 = 3000;

/// Estimated speaking time per character
const SPEECH_MS_PER_CHAR: u64 = 80;

/// A best-effort text-to-speech sink
///
/// Start and end are reported by calling
/// [`OrchestratorHandle::playback_changed`](crate::conversation::OrchestratorHandle::playback_changed)
/// on every change of [`is_playing`](PlaybackService::is_playing). A playback
/// error is reported as `false`. Implementations are allowed to never report
/// a start at all; the orchestrator recovers from that on its own.
pub trait PlaybackService: Send + Sync {
    /// Begin speaking `text`, cancelling any unfinished playback first
    fn speak(&self, text: &str);

    /// Whether audio is currently playing
    fn is_playing(&self) -> bool;
}

/// Rough speaking time for `text`, used by implementations that cannot
/// observe the end of playback directly
pub fn estimated_speech_duration(text: &str) -> Duration {
    let chars = text.chars().count() as u64;
    Duration::from_millis(MIN_SPEECH_DURATION_MS.max(chars * SPEECH_MS_PER_CHAR))
}
