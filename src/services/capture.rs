//! Speech capture contract

/// Error types for capture operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Speech recognition unavailable: {0}")]
    Unavailable(String),

    #[error("Capture failed: {0}")]
    Failed(String),
}

/// A live speech-to-text source
///
/// While started, the implementation reports the confirmed and tentative
/// transcript through
/// [`OrchestratorHandle::transcript_changed`](crate::conversation::OrchestratorHandle::transcript_changed)
/// and recognition errors through
/// [`OrchestratorHandle::capture_error`](crate::conversation::OrchestratorHandle::capture_error).
pub trait CaptureService: Send + Sync {
    /// Open the microphone and begin streaming transcript updates
    fn start(&self) -> Result<(), CaptureError>;

    /// Close the microphone. Idempotent, and safe to call when not started.
    fn stop(&self);
}
