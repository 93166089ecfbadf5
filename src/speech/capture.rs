//! Single-utterance speech capture: trait, event set and session handle.
//!
//! A [`SpeechCapture`] backend hands out one [`CaptureSession`] per
//! `start()`. The session owns the event subscription: events arrive on a
//! per-session channel and dropping the session both unsubscribes and asks
//! the backend to stop. The backend side holds the matching
//! [`CaptureEmitter`], which forwards at most one result and always closes
//! the session with [`CaptureEvent::CaptureEnded`] when it is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// The silence timeout elapsed before any speech was heard.
    #[error("I didn't hear anything. Please try speaking again.")]
    NoSpeechDetected,

    /// Any other recognition failure, tagged with a short machine code
    /// (`audio-capture`, `transcription`, …).
    #[error("Speech recognition error: {code}")]
    RecognitionError { code: String },

    /// `start()` was called while a session is still running.
    #[error("a speech capture session is already active")]
    AlreadyActive,

    /// No recognition backend is installed.
    #[error("Speech recognition is not available: {0}")]
    Unavailable(String),
}

impl CaptureError {
    pub fn recognition(code: impl Into<String>) -> Self {
        CaptureError::RecognitionError { code: code.into() }
    }
}

// ---------------------------------------------------------------------------
// CaptureEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Final recognized text of the utterance.
    TranscriptReady(String),
    /// The session failed.
    CaptureError(CaptureError),
    /// The session is over; no further events follow.
    CaptureEnded,
}

// ---------------------------------------------------------------------------
// SpeechCapture trait
// ---------------------------------------------------------------------------

/// A speech-to-text capability that captures one utterance per session.
///
/// Only one session may be active; a second `start()` before the first has
/// ended fails with [`CaptureError::AlreadyActive`].
pub trait SpeechCapture: Send + Sync {
    fn start(&self) -> Result<CaptureSession, CaptureError>;
}

// ---------------------------------------------------------------------------
// CaptureSession / CaptureEmitter
// ---------------------------------------------------------------------------

/// Consumer side of one capture session.
pub struct CaptureSession {
    events: mpsc::UnboundedReceiver<CaptureEvent>,
    stop: Arc<AtomicBool>,
}

impl CaptureSession {
    /// Create a connected emitter/session pair.
    pub fn channel() -> (CaptureEmitter, CaptureSession) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let emitter = CaptureEmitter {
            tx,
            stop: Arc::clone(&stop),
            result_sent: false,
            active: None,
        };
        (emitter, CaptureSession { events: rx, stop })
    }

    /// Ask the backend to end the capture early.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Next event, or `None` once the backend side is gone.
    pub async fn next_event(&mut self) -> Option<CaptureEvent> {
        self.events.recv().await
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Producer side of one capture session, owned by the backend.
pub struct CaptureEmitter {
    tx: mpsc::UnboundedSender<CaptureEvent>,
    stop: Arc<AtomicBool>,
    result_sent: bool,
    active: Option<Arc<AtomicBool>>,
}

impl CaptureEmitter {
    /// Clear `flag` once the result is emitted, or on drop when there is
    /// none. It is always cleared before the consumer can observe the
    /// result, so a `start()` issued in response is accepted.
    pub fn releasing(mut self, flag: Arc<AtomicBool>) -> Self {
        self.active = Some(flag);
        self
    }

    /// `true` once the consumer called `stop()` or dropped its session.
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn transcript(&mut self, text: impl Into<String>) {
        self.emit(CaptureEvent::TranscriptReady(text.into()));
    }

    pub fn error(&mut self, error: CaptureError) {
        self.emit(CaptureEvent::CaptureError(error));
    }

    fn emit(&mut self, event: CaptureEvent) {
        if self.result_sent {
            log::debug!("capture: dropping extra result {event:?}");
            return;
        }
        self.result_sent = true;
        self.release();
        // The consumer may already have dropped its session.
        let _ = self.tx.send(event);
    }

    fn release(&mut self) {
        if let Some(flag) = self.active.take() {
            flag.store(false, Ordering::Release);
        }
    }
}

impl Drop for CaptureEmitter {
    fn drop(&mut self) {
        self.release();
        let _ = self.tx.send(CaptureEvent::CaptureEnded);
    }
}

// ---------------------------------------------------------------------------
// UnavailableCapture
// ---------------------------------------------------------------------------

/// Stand-in backend used when no recognizer could be loaded.
pub struct UnavailableCapture {
    reason: String,
}

impl UnavailableCapture {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl SpeechCapture for UnavailableCapture {
    fn start(&self) -> Result<CaptureSession, CaptureError> {
        Err(CaptureError::Unavailable(self.reason.clone()))
    }
}

// ---------------------------------------------------------------------------
// ScriptedCapture  (test-only)
// ---------------------------------------------------------------------------

/// Test double: every `start()` replays the next scripted result.
///
/// `Some(Ok(text))` emits a transcript, `Some(Err(e))` an error, `None`
/// nothing (as if stopped before any result). `CaptureEnded` always
/// follows. When `hold_open` is set the emitter is parked until the session
/// is stopped, so tests can observe an in-progress capture.
#[cfg(test)]
pub struct ScriptedCapture {
    script: std::sync::Mutex<std::collections::VecDeque<Option<Result<String, CaptureError>>>>,
    starts: std::sync::atomic::AtomicUsize,
    held: std::sync::Mutex<Vec<CaptureEmitter>>,
    hold_open: bool,
}

#[cfg(test)]
impl ScriptedCapture {
    pub fn new(script: Vec<Option<Result<String, CaptureError>>>) -> Self {
        Self {
            script: std::sync::Mutex::new(script.into()),
            starts: std::sync::atomic::AtomicUsize::new(0),
            held: std::sync::Mutex::new(Vec::new()),
            hold_open: false,
        }
    }

    /// Sessions stay open with no events until released.
    pub fn held_open() -> Self {
        Self {
            hold_open: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Drop every parked emitter, ending their sessions.
    pub fn release(&self) {
        self.held.lock().unwrap().clear();
    }
}

#[cfg(test)]
impl SpeechCapture for ScriptedCapture {
    fn start(&self) -> Result<CaptureSession, CaptureError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let (mut emitter, session) = CaptureSession::channel();
        if self.hold_open {
            self.held.lock().unwrap().push(emitter);
            return Ok(session);
        }
        match self.script.lock().unwrap().pop_front().flatten() {
            Some(Ok(text)) => emitter.transcript(text),
            Some(Err(e)) => emitter.error(e),
            None => {}
        }
        Ok(session)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emitter_forwards_one_result_then_ends() {
        let (mut emitter, mut session) = CaptureSession::channel();
        emitter.transcript("first");
        emitter.error(CaptureError::NoSpeechDetected);
        drop(emitter);

        assert_eq!(
            session.next_event().await,
            Some(CaptureEvent::TranscriptReady("first".into()))
        );
        assert_eq!(session.next_event().await, Some(CaptureEvent::CaptureEnded));
        assert_eq!(session.next_event().await, None);
    }

    #[tokio::test]
    async fn ended_without_result() {
        let (emitter, mut session) = CaptureSession::channel();
        drop(emitter);
        assert_eq!(session.next_event().await, Some(CaptureEvent::CaptureEnded));
    }

    #[test]
    fn stop_and_drop_signal_the_emitter() {
        let (emitter, session) = CaptureSession::channel();
        assert!(!emitter.stop_requested());
        session.stop();
        assert!(emitter.stop_requested());

        let (emitter, session) = CaptureSession::channel();
        drop(session);
        assert!(emitter.stop_requested());
    }

    #[test]
    fn releasing_clears_active_flag_on_drop() {
        let flag = Arc::new(AtomicBool::new(true));
        let (emitter, _session) = CaptureSession::channel();
        let emitter = emitter.releasing(Arc::clone(&flag));
        assert!(flag.load(Ordering::Acquire));
        drop(emitter);
        assert!(!flag.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn result_releases_active_flag_before_it_is_delivered() {
        let flag = Arc::new(AtomicBool::new(true));
        let (emitter, mut session) = CaptureSession::channel();
        let mut emitter = emitter.releasing(Arc::clone(&flag));

        emitter.transcript("Chlorophyll absorbs light");
        assert_eq!(
            session.next_event().await,
            Some(CaptureEvent::TranscriptReady("Chlorophyll absorbs light".into()))
        );
        // The capture thread has not finished yet, but a new start is allowed.
        assert!(!flag.load(Ordering::Acquire));

        drop(emitter);
        assert_eq!(session.next_event().await, Some(CaptureEvent::CaptureEnded));
    }

    #[test]
    fn unavailable_capture_never_starts() {
        let capture = UnavailableCapture::new("no model");
        assert!(matches!(
            capture.start(),
            Err(CaptureError::Unavailable(reason)) if reason == "no model"
        ));
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            CaptureError::NoSpeechDetected.to_string(),
            "I didn't hear anything. Please try speaking again."
        );
        assert_eq!(
            CaptureError::recognition("audio-capture").to_string(),
            "Speech recognition error: audio-capture"
        );
    }
}
