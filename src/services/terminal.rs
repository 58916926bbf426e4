//! Terminal-backed capture and playback
//!
//! Stand-ins for a microphone and a speaker used by the `jarvis` binary:
//! typed lines act as recognised speech and replies are printed instead of
//! spoken, with playback lasting as long as the text would take to say.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::capture::{CaptureError, CaptureService};
use super::playback::{estimated_speech_duration, PlaybackService};
use crate::conversation::OrchestratorHandle;

/// Capture service fed with typed lines
///
/// Every line fed while open is appended to the confirmed transcript.
pub struct TerminalCapture {
    handle: OrchestratorHandle,
    /// Confirmed text; `None` while closed
    transcript: Mutex<Option<String>>,
}

impl TerminalCapture {
    pub fn new(handle: OrchestratorHandle) -> Self {
        Self {
            handle,
            transcript: Mutex::new(None),
        }
    }

    pub fn is_open(&self) -> bool {
        self.transcript.lock().is_some()
    }

    /// Feed one recognised fragment. Returns false if capture is closed.
    pub fn feed(&self, fragment: &str) -> bool {
        let mut guard = self.transcript.lock();
        let Some(confirmed) = guard.as_mut() else {
            return false;
        };

        let fragment = fragment.trim();
        if fragment.is_empty() {
            return true;
        }
        if !confirmed.is_empty() {
            confirmed.push(' ');
        }
        confirmed.push_str(fragment);

        if let Err(e) = self.handle.transcript_changed(confirmed.clone(), "") {
            tracing::warn!("Failed to report transcript: {}", e);
        }
        true
    }
}

impl CaptureService for TerminalCapture {
    fn start(&self) -> Result<(), CaptureError> {
        *self.transcript.lock() = Some(String::new());
        tracing::debug!("Terminal capture opened");
        Ok(())
    }

    fn stop(&self) {
        if self.transcript.lock().take().is_some() {
            tracing::debug!("Terminal capture closed");
        }
    }
}

/// Playback service that prints replies
pub struct TerminalPlayback {
    handle: OrchestratorHandle,
    playing: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TerminalPlayback {
    pub fn new(handle: OrchestratorHandle) -> Self {
        Self {
            handle,
            playing: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }
}

impl PlaybackService for TerminalPlayback {
    fn speak(&self, text: &str) {
        if let Some(previous) = self.task.lock().take() {
            previous.abort();
            if self.playing.swap(false, Ordering::SeqCst) {
                let _ = self.handle.playback_changed(false);
            }
        }

        let handle = self.handle.clone();
        let playing = Arc::clone(&self.playing);
        let text = text.to_string();
        let duration = estimated_speech_duration(&text);

        let task = tokio::spawn(async move {
            playing.store(true, Ordering::SeqCst);
            let _ = handle.playback_changed(true);
            println!("Jarvis: {}", text);

            tokio::time::sleep(duration).await;

            playing.store(false, Ordering::SeqCst);
            let _ = handle.playback_changed(false);
        });
        *self.task.lock() = Some(task);
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::channel;

    #[test]
    fn test_feed_is_ignored_while_closed() {
        let (handle, _inbox) = channel();
        let capture = TerminalCapture::new(handle);
        assert!(!capture.is_open());
        assert!(!capture.feed("oi"));
    }

    #[test]
    fn test_start_and_stop_toggle_capture() {
        let (handle, _inbox) = channel();
        let capture = TerminalCapture::new(handle);

        capture.start().unwrap();
        assert!(capture.is_open());
        assert!(capture.feed("que horas"));
        assert!(capture.feed("são"));

        capture.stop();
        assert!(!capture.is_open());
        // Stopping twice is harmless
        capture.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_reports_start_and_end() {
        let (handle, _inbox) = channel();
        let playback = TerminalPlayback::new(handle);

        playback.speak("Olá!");
        tokio::task::yield_now().await;
        assert!(playback.is_playing());

        tokio::time::sleep(std::time::Duration::from_millis(3001)).await;
        assert!(!playback.is_playing());
    }
}
