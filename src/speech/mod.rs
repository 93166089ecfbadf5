//! Speech input and output for spoken answers.
//!
//! # Architecture
//!
//! ```text
//!  SpeechCapture (trait)                       SpeechPlayback (trait)
//!   ├─ MicrophoneCapture                        └─ CommandSynthesizer
//!   │    cpal ─▶ downmix ─▶ resample 16k            say / espeak-ng / PowerShell
//!   │         ─▶ UtteranceDetector ─▶ Transcriber
//!   └─ UnavailableCapture
//!
//!  start() ─▶ CaptureSession ─▶ next_event(): TranscriptReady | CaptureError
//!                                             then CaptureEnded
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use study_buddy::config::SpeechConfig;
//! use study_buddy::speech::{CaptureEvent, MicrophoneCapture, SpeechCapture, WhisperTranscriber};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = SpeechConfig::default();
//!     let whisper = WhisperTranscriber::load("models/ggml-base.en.bin", &config.language, false)
//!         .expect("model not found");
//!     let capture = MicrophoneCapture::new(Arc::new(whisper), &config);
//!
//!     let mut session = capture.start().unwrap();
//!     while let Some(event) = session.next_event().await {
//!         if let CaptureEvent::TranscriptReady(text) = event {
//!             println!("{text}");
//!         }
//!     }
//! }
//! ```

pub mod audio;
pub mod capture;
pub mod microphone;
pub mod playback;
pub mod whisper;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use capture::{
    CaptureEmitter, CaptureError, CaptureEvent, CaptureSession, SpeechCapture, UnavailableCapture,
};
pub use microphone::MicrophoneCapture;
pub use playback::{CommandSynthesizer, PlaybackError, SpeechPlayback};
pub use whisper::{TranscribeError, Transcriber, WhisperTranscriber};

#[cfg(test)]
pub use capture::ScriptedCapture;
#[cfg(test)]
pub use playback::MockPlayback;
