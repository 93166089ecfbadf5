//! Offline transcription of a captured utterance.
//!
//! [`Transcriber`] is object-safe and `Send + Sync` so the capture thread can
//! hold it behind an `Arc<dyn Transcriber>`. [`WhisperTranscriber`] wraps a
//! `whisper_rs::WhisperContext` loaded from a local GGML model.

use std::path::Path;

use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// Whisper refuses input shorter than one second; shorter clips are padded
/// with trailing silence up to this length.
pub const MIN_TRANSCRIBE_SAMPLES: usize = 17_600;

// ---------------------------------------------------------------------------
// TranscribeError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum TranscribeError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Whisper context initialisation failed: {0}")]
    ContextInit(String),

    #[error("Transcription error: {0}")]
    Inference(String),
}

// ---------------------------------------------------------------------------
// Transcriber trait
// ---------------------------------------------------------------------------

/// Turns 16 kHz mono `f32` audio into text.
pub trait Transcriber: Send + Sync {
    fn transcribe(&self, audio: &[f32]) -> Result<String, TranscribeError>;
}

/// ISO-639-1 code from a locale tag: `"en-US"` → `"en"`. Empty input means
/// auto-detect.
pub fn whisper_language(locale: &str) -> Option<String> {
    let code = locale
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if code.is_empty() || code == "auto" {
        None
    } else {
        Some(code)
    }
}

/// Whisper emits bracketed markers such as `[BLANK_AUDIO]` or `(silence)`
/// for clips without words.
pub fn is_non_speech(text: &str) -> bool {
    let t = text.trim();
    t.is_empty()
        || (t.starts_with('[') && t.ends_with(']'))
        || (t.starts_with('(') && t.ends_with(')'))
}

fn inference_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

// ---------------------------------------------------------------------------
// WhisperTranscriber
// ---------------------------------------------------------------------------

pub struct WhisperTranscriber {
    ctx: WhisperContext,
    language: Option<String>,
    n_threads: i32,
}

impl std::fmt::Debug for WhisperTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperTranscriber")
            .field("language", &self.language)
            .field("n_threads", &self.n_threads)
            .finish_non_exhaustive()
    }
}

// SAFETY: WhisperContext is Send+Sync as declared by whisper-rs; the model
// weights are read-only after loading and each call creates its own state.
unsafe impl Send for WhisperTranscriber {}
unsafe impl Sync for WhisperTranscriber {}

impl WhisperTranscriber {
    /// Load the GGML model at `model_path`.
    ///
    /// `locale` is the configured recognition language (`"en-US"`); only
    /// its language part is passed to Whisper.
    pub fn load(
        model_path: impl AsRef<Path>,
        locale: &str,
        use_gpu: bool,
    ) -> Result<Self, TranscribeError> {
        let path = model_path.as_ref();
        if !path.exists() {
            return Err(TranscribeError::ModelNotFound(path.display().to_string()));
        }
        let path_str = path.to_str().ok_or_else(|| {
            TranscribeError::ModelNotFound(format!("non-UTF-8 model path: {}", path.display()))
        })?;

        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu(use_gpu);
        let ctx = WhisperContext::new_with_params(path_str, ctx_params)
            .map_err(|e| TranscribeError::ContextInit(e.to_string()))?;

        log::info!("whisper: loaded {} (gpu={use_gpu})", path.display());
        Ok(Self {
            ctx,
            language: whisper_language(locale),
            n_threads: inference_threads(),
        })
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, audio: &[f32]) -> Result<String, TranscribeError> {
        let mut padded;
        let audio = if audio.len() < MIN_TRANSCRIBE_SAMPLES {
            padded = audio.to_vec();
            padded.resize(MIN_TRANSCRIBE_SAMPLES, 0.0);
            &padded[..]
        } else {
            audio
        };

        let mut fp = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        fp.set_language(self.language.as_deref());
        fp.set_n_threads(self.n_threads);
        fp.set_single_segment(true);
        fp.set_no_context(true);
        fp.set_print_progress(false);
        fp.set_print_realtime(false);
        fp.set_print_special(false);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| TranscribeError::ContextInit(e.to_string()))?;

        let started = std::time::Instant::now();
        state
            .full(fp, audio)
            .map_err(|e| TranscribeError::Inference(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| TranscribeError::Inference(e.to_string()))?;

        let mut text = String::new();
        for i in 0..n_segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| TranscribeError::Inference(format!("segment {i}: {e}")))?;
            text.push_str(&segment);
        }

        log::debug!(
            "whisper: {} samples in {} ms",
            audio.len(),
            started.elapsed().as_millis()
        );
        Ok(text.trim().to_string())
    }
}

// ---------------------------------------------------------------------------
// MockTranscriber  (test-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub struct MockTranscriber {
    response: Result<String, TranscribeError>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockTranscriber {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            response: Ok(text.into()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn err(error: TranscribeError) -> Self {
        Self {
            response: Err(error),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl Transcriber for MockTranscriber {
    fn transcribe(&self, _audio: &[f32]) -> Result<String, TranscribeError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.response.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
