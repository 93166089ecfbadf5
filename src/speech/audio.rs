//! Sample conversion and utterance endpointing for spoken answers.
//!
//! Whisper wants 16 kHz mono `f32`. Device buffers are converted with
//! [`downmix`] and a [`Resampler`], then fed to an
//! [`UtteranceDetector`] which decides when the student has finished
//! speaking (or never started).
//!
//! ```rust
//! use study_buddy::speech::audio::{Endpoint, EndpointSettings, UtteranceDetector};
//!
//! let mut detector = UtteranceDetector::new(EndpointSettings {
//!     vad_threshold: 0.01,
//!     no_speech_samples: 16_000,
//!     end_of_utterance_samples: 960,
//!     max_utterance_samples: 160_000,
//! });
//!
//! assert_eq!(detector.push(&vec![0.3_f32; 4_800]), Endpoint::Listening);
//! assert_eq!(detector.push(&vec![0.0_f32; 960]), Endpoint::Complete);
//! assert_eq!(detector.finish().map(|a| a.len()), Some(4_800));
//! ```

use crate::config::SpeechConfig;

/// Sample rate expected by the transcriber.
pub const TARGET_RATE: u32 = 16_000;

/// 30 ms at 16 kHz.
pub const FRAME_SAMPLES: usize = 480;

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Average interleaved channels into one. `channels == 0` yields nothing.
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    let width = usize::from(channels);
    if width <= 1 {
        return if width == 0 { Vec::new() } else { samples.to_vec() };
    }
    samples
        .chunks_exact(width)
        .map(|frame| frame.iter().sum::<f32>() / width as f32)
        .collect()
}

/// Streaming linear-interpolation resampler from a device rate to
/// [`TARGET_RATE`].
///
/// Output sample `n` always sits at input position `n * source / 16000`
/// counted from the first sample ever pushed, so splitting the input into
/// device buffers does not change the result.
///
/// ```rust
/// use study_buddy::speech::audio::Resampler;
///
/// let mut r = Resampler::new(48_000);
/// let mut out = r.process(&vec![0.5_f32; 1_000]);
/// out.extend(r.process(&vec![0.5_f32; 1_000]));
/// assert_eq!(out.len(), 667);
/// ```
#[derive(Debug, Clone)]
pub struct Resampler {
    /// Input samples per output sample. `None` passes audio through.
    step: Option<f64>,
    /// Position of the next output sample, relative to `carry`.
    pos: f64,
    /// Last input sample of the previous buffer.
    carry: Option<f32>,
}

impl Resampler {
    pub fn new(source_rate: u32) -> Self {
        let step = (source_rate != TARGET_RATE && source_rate != 0)
            .then(|| f64::from(source_rate) / f64::from(TARGET_RATE));
        Self {
            step,
            pos: 0.0,
            carry: None,
        }
    }

    /// Convert the next buffer of mono samples.
    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        let Some(step) = self.step else {
            return samples.to_vec();
        };
        if samples.is_empty() {
            return Vec::new();
        }

        let mut input = Vec::with_capacity(samples.len() + 1);
        input.extend(self.carry);
        input.extend_from_slice(samples);

        let mut out = Vec::with_capacity((samples.len() as f64 / step) as usize + 1);
        loop {
            let idx = self.pos as usize;
            if idx + 1 >= input.len() {
                break;
            }
            let frac = (self.pos - idx as f64) as f32;
            out.push(input[idx] + (input[idx + 1] - input[idx]) * frac);
            self.pos += step;
        }

        let last = input.len() - 1;
        self.pos -= last as f64;
        self.carry = Some(input[last]);
        out
    }
}

/// Root-mean-square amplitude; `0.0` for an empty slice.
pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt()
}

/// Cut leading and trailing frames whose RMS is at or below `threshold`.
pub fn trim_silence(audio: &[f32], threshold: f32) -> &[f32] {
    let voiced = |i: &usize| {
        let start = i * FRAME_SAMPLES;
        let end = (start + FRAME_SAMPLES).min(audio.len());
        rms(&audio[start..end]) > threshold
    };
    let frames = audio.len().div_ceil(FRAME_SAMPLES);

    let Some(first) = (0..frames).find(voiced) else {
        return &audio[..0];
    };
    let last = (0..frames).rfind(voiced).unwrap_or(first);

    let end = ((last + 1) * FRAME_SAMPLES).min(audio.len());
    &audio[first * FRAME_SAMPLES..end]
}

// ---------------------------------------------------------------------------
// UtteranceDetector
// ---------------------------------------------------------------------------

/// Endpointing thresholds, all counted in 16 kHz samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndpointSettings {
    pub vad_threshold: f32,
    /// Give up if no voiced frame arrives within this many samples.
    pub no_speech_samples: usize,
    /// Trailing silence that ends an utterance.
    pub end_of_utterance_samples: usize,
    /// Hard cap on utterance length.
    pub max_utterance_samples: usize,
}

impl EndpointSettings {
    pub fn from_config(config: &SpeechConfig) -> Self {
        let secs = |s: f32| (s.max(0.0) * TARGET_RATE as f32) as usize;
        Self {
            vad_threshold: config.vad_threshold,
            no_speech_samples: secs(config.no_speech_timeout_secs),
            end_of_utterance_samples: config.end_of_utterance_ms as usize * TARGET_RATE as usize / 1000,
            max_utterance_samples: secs(config.max_utterance_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Keep feeding audio.
    Listening,
    /// Timed out before any speech.
    NoSpeech,
    /// Speech followed by enough silence, or the length cap was hit.
    Complete,
}

/// Frame-by-frame voice activity tracker for a single utterance.
pub struct UtteranceDetector {
    settings: EndpointSettings,
    pending: Vec<f32>,
    audio: Vec<f32>,
    heard_speech: bool,
    trailing_silence: usize,
    state: Endpoint,
}

impl UtteranceDetector {
    pub fn new(settings: EndpointSettings) -> Self {
        Self {
            settings,
            pending: Vec::with_capacity(FRAME_SAMPLES),
            audio: Vec::new(),
            heard_speech: false,
            trailing_silence: 0,
            state: Endpoint::Listening,
        }
    }

    /// Feed 16 kHz mono samples. Once an endpoint is reached further input
    /// is ignored and the same endpoint is returned.
    pub fn push(&mut self, samples: &[f32]) -> Endpoint {
        if self.state != Endpoint::Listening {
            return self.state;
        }
        self.pending.extend_from_slice(samples);

        let mut consumed = 0;
        while self.pending.len() - consumed >= FRAME_SAMPLES {
            let frame = &self.pending[consumed..consumed + FRAME_SAMPLES];
            consumed += FRAME_SAMPLES;

            if rms(frame) > self.settings.vad_threshold {
                self.heard_speech = true;
                self.trailing_silence = 0;
            } else if self.heard_speech {
                self.trailing_silence += FRAME_SAMPLES;
            }
            self.audio.extend_from_slice(frame);

            self.state = self.evaluate();
            if self.state != Endpoint::Listening {
                break;
            }
        }
        self.pending.drain(..consumed);
        self.state
    }

    fn evaluate(&self) -> Endpoint {
        let s = &self.settings;
        if !self.heard_speech {
            if self.audio.len() >= s.no_speech_samples || self.audio.len() >= s.max_utterance_samples {
                return Endpoint::NoSpeech;
            }
            return Endpoint::Listening;
        }
        if self.trailing_silence >= s.end_of_utterance_samples || self.audio.len() >= s.max_utterance_samples {
            return Endpoint::Complete;
        }
        Endpoint::Listening
    }

    pub fn heard_speech(&self) -> bool {
        self.heard_speech
    }

    /// The utterance with surrounding silence trimmed, or `None` when no
    /// speech was heard.
    pub fn finish(self) -> Option<Vec<f32>> {
        if !self.heard_speech {
            return None;
        }
        let trimmed = trim_silence(&self.audio, self.settings.vad_threshold);
        Some(trimmed.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> EndpointSettings {
        EndpointSettings {
            vad_threshold: 0.01,
            no_speech_samples: 4_800,
            end_of_utterance_samples: 1_440,
            max_utterance_samples: 16_000,
        }
    }

    fn loud(n: usize) -> Vec<f32> {
        vec![0.4; n]
    }

    fn quiet(n: usize) -> Vec<f32> {
        vec![0.0; n]
    }

    #[test]
    fn downmix_averages_channels() {
        let mono = downmix(&[0.2, 0.4, -1.0, 1.0], 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.3).abs() < 1e-6);
        assert_eq!(mono[1], 0.0);
        assert_eq!(downmix(&[0.1, 0.2], 1), vec![0.1, 0.2]);
        assert!(downmix(&[0.1, 0.2], 0).is_empty());
    }

    fn ramp(n: usize) -> Vec<f32> {
        (0..n).map(|i| i as f32 / n as f32).collect()
    }

    #[test]
    fn resample_lengths() {
        assert_eq!(Resampler::new(16_000).process(&loud(160)).len(), 160);
        assert_eq!(Resampler::new(48_000).process(&loud(480)).len(), 160);
        assert!(Resampler::new(48_000).process(&[]).is_empty());
    }

    #[test]
    fn resample_preserves_constant_signal() {
        let out = Resampler::new(48_000).process(&loud(960));
        assert!(out.iter().all(|s| (s - 0.4).abs() < 1e-6));
    }

    #[test]
    fn chunked_input_matches_a_single_pass() {
        let input = ramp(44_100);
        let whole = Resampler::new(44_100).process(&input);

        let mut chunked = Resampler::new(44_100);
        let mut pieces = Vec::new();
        for chunk in input.chunks(441) {
            pieces.extend(chunked.process(chunk));
        }

        assert_eq!(pieces.len(), whole.len());
        assert!(pieces.iter().zip(&whole).all(|(a, b)| (a - b).abs() < 1e-5));
    }

    #[test]
    fn one_second_of_44k_gives_one_second_of_16k() {
        let mut r = Resampler::new(44_100);
        let total: usize = ramp(44_100).chunks(512).map(|c| r.process(c).len()).sum();
        assert!((15_999..=16_000).contains(&total), "got {total}");
    }

    #[test]
    fn upsampling_interpolates_between_samples() {
        let out = Resampler::new(8_000).process(&[0.0, 1.0]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], 0.0);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn trim_keeps_voiced_middle() {
        let mut audio = quiet(960);
        audio.extend(loud(480));
        audio.extend(quiet(960));
        assert_eq!(trim_silence(&audio, 0.01).len(), 480);
        assert!(trim_silence(&quiet(960), 0.01).is_empty());
    }

    #[test]
    fn silence_times_out_as_no_speech() {
        let mut det = UtteranceDetector::new(settings());
        assert_eq!(det.push(&quiet(4_320)), Endpoint::Listening);
        assert_eq!(det.push(&quiet(480)), Endpoint::NoSpeech);
        assert!(!det.heard_speech());
        assert!(det.finish().is_none());
    }

    #[test]
    fn speech_then_silence_completes() {
        let mut det = UtteranceDetector::new(settings());
        assert_eq!(det.push(&quiet(960)), Endpoint::Listening);
        assert_eq!(det.push(&loud(2_400)), Endpoint::Listening);
        assert_eq!(det.push(&quiet(960)), Endpoint::Listening);
        assert_eq!(det.push(&quiet(480)), Endpoint::Complete);

        let audio = det.finish().unwrap();
        assert_eq!(audio.len(), 2_400);
    }

    #[test]
    fn speech_after_silence_resets_the_end_timer() {
        let mut det = UtteranceDetector::new(settings());
        det.push(&loud(480));
        det.push(&quiet(960));
        assert_eq!(det.push(&loud(480)), Endpoint::Listening);
        assert_eq!(det.push(&quiet(960)), Endpoint::Listening);
    }

    #[test]
    fn speech_past_no_speech_window_is_not_a_timeout() {
        let mut det = UtteranceDetector::new(settings());
        det.push(&quiet(2_400));
        assert_eq!(det.push(&loud(4_800)), Endpoint::Listening);
    }

    #[test]
    fn length_cap_completes_continuous_speech() {
        let mut det = UtteranceDetector::new(settings());
        assert_eq!(det.push(&loud(15_840)), Endpoint::Listening);
        assert_eq!(det.push(&loud(480)), Endpoint::Complete);
        assert_eq!(det.push(&loud(480)), Endpoint::Complete);
    }

    #[test]
    fn partial_frames_are_buffered() {
        let mut det = UtteranceDetector::new(settings());
        for _ in 0..10 {
            det.push(&loud(100));
        }
        assert!(det.heard_speech());
    }

    #[test]
    fn settings_from_config() {
        let config = SpeechConfig::default();
        let s = EndpointSettings::from_config(&config);
        assert_eq!(s.no_speech_samples, (config.no_speech_timeout_secs * 16_000.0) as usize);
        assert_eq!(s.end_of_utterance_samples, config.end_of_utterance_ms as usize * 16);
    }
}
