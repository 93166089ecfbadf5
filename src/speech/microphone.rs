//! Microphone-backed [`SpeechCapture`] built on `cpal` and a [`Transcriber`].
//!
//! Each session runs on its own `speech-capture` thread, which owns the cpal
//! stream (not `Send` on every platform), feeds device buffers through the
//! [`UtteranceDetector`] and transcribes the finished utterance. Thread
//! outcomes map onto capture events as follows:
//!
//! | outcome                                 | event                          |
//! |-----------------------------------------|--------------------------------|
//! | utterance transcribed to words          | `TranscriptReady(text)`        |
//! | silence timeout / transcript empty      | `NoSpeechDetected`             |
//! | device could not be opened or vanished  | `RecognitionError(audio-capture)` |
//! | Whisper failed                          | `RecognitionError(transcription)` |
//! | stopped before any speech               | none                           |
//!
//! `CaptureEnded` always follows.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::config::SpeechConfig;
use crate::speech::audio::{downmix, Endpoint, EndpointSettings, Resampler, UtteranceDetector};
use crate::speech::capture::{CaptureEmitter, CaptureError, CaptureSession, SpeechCapture};
use crate::speech::whisper::{is_non_speech, Transcriber};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// MicrophoneCapture
// ---------------------------------------------------------------------------

pub struct MicrophoneCapture {
    transcriber: Arc<dyn Transcriber>,
    device_name: Option<String>,
    endpoint: EndpointSettings,
    active: Arc<AtomicBool>,
}

impl MicrophoneCapture {
    pub fn new(transcriber: Arc<dyn Transcriber>, config: &SpeechConfig) -> Self {
        Self {
            transcriber,
            device_name: config.audio_device.clone(),
            endpoint: EndpointSettings::from_config(config),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl SpeechCapture for MicrophoneCapture {
    fn start(&self) -> Result<CaptureSession, CaptureError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CaptureError::AlreadyActive);
        }

        let (emitter, session) = CaptureSession::channel();
        let emitter = emitter.releasing(Arc::clone(&self.active));
        let transcriber = Arc::clone(&self.transcriber);
        let device_name = self.device_name.clone();
        let endpoint = self.endpoint;

        std::thread::Builder::new()
            .name("speech-capture".into())
            .spawn(move || {
                let source = match open_input(device_name.as_deref()) {
                    Ok(source) => source,
                    Err(e) => {
                        log::error!("capture: {e}");
                        let mut emitter = emitter;
                        emitter.error(CaptureError::recognition("audio-capture"));
                        return;
                    }
                };
                run_session(emitter, source, endpoint, transcriber.as_ref());
            })
            .map_err(|e| {
                // The closure, and with it the emitter, is dropped on failure.
                log::error!("capture: failed to spawn capture thread: {e}");
                CaptureError::recognition("audio-capture")
            })?;

        log::info!("capture: listening");
        Ok(session)
    }
}

// ---------------------------------------------------------------------------
// Device handling
// ---------------------------------------------------------------------------

struct InputSource {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
}

fn open_input(name: Option<&str>) -> Result<InputSource, String> {
    let host = cpal::default_host();

    let device = match name {
        Some(wanted) => host
            .input_devices()
            .map_err(|e| format!("cannot enumerate input devices: {e}"))?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| format!("input device {wanted:?} not found"))?,
        None => host
            .default_input_device()
            .ok_or_else(|| "no input device found on the default audio host".to_string())?,
    };

    let supported = device
        .default_input_config()
        .map_err(|e| format!("failed to query default input config: {e}"))?;
    let sample_format = supported.sample_format();

    Ok(InputSource {
        device,
        config: supported.into(),
        sample_format,
    })
}

fn build_stream(source: &InputSource, tx: mpsc::Sender<Vec<f32>>) -> Result<cpal::Stream, String> {
    let on_error = |err: cpal::StreamError| log::error!("cpal stream error: {err}");

    let stream = match source.sample_format {
        cpal::SampleFormat::F32 => source.device.build_input_stream(
            &source.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let _ = tx.send(data.to_vec());
            },
            on_error,
            None,
        ),
        cpal::SampleFormat::I16 => source.device.build_input_stream(
            &source.config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let samples = data.iter().map(|&s| f32::from(s) / 32_768.0).collect();
                let _ = tx.send(samples);
            },
            on_error,
            None,
        ),
        other => return Err(format!("unsupported sample format {other:?}")),
    }
    .map_err(|e| format!("failed to build input stream: {e}"))?;

    stream
        .play()
        .map_err(|e| format!("failed to start audio stream: {e}"))?;
    Ok(stream)
}

// ---------------------------------------------------------------------------
// Session loop
// ---------------------------------------------------------------------------

fn run_session(
    mut emitter: CaptureEmitter,
    source: InputSource,
    endpoint: EndpointSettings,
    transcriber: &dyn Transcriber,
) {
    let channels = source.config.channels;
    let rate = source.config.sample_rate.0;

    let (tx, rx) = mpsc::channel::<Vec<f32>>();
    let stream = match build_stream(&source, tx) {
        Ok(stream) => stream,
        Err(e) => {
            log::error!("capture: {e}");
            emitter.error(CaptureError::recognition("audio-capture"));
            return;
        }
    };

    let mut resampler = Resampler::new(rate);
    let mut detector = UtteranceDetector::new(endpoint);
    let reached = loop {
        if emitter.stop_requested() {
            break None;
        }
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(chunk) => {
                let pcm = resampler.process(&downmix(&chunk, channels));
                match detector.push(&pcm) {
                    Endpoint::Listening => {}
                    done => break Some(done),
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                log::error!("capture: input stream closed unexpectedly");
                emitter.error(CaptureError::recognition("audio-capture"));
                return;
            }
        }
    };
    drop(stream);

    match reached {
        Some(Endpoint::NoSpeech) => {
            log::info!("capture: no speech before timeout");
            emitter.error(CaptureError::NoSpeechDetected);
        }
        _ => match detector.finish() {
            Some(audio) => {
                if let Err(e) = transcribe_into(&mut emitter, transcriber, &audio) {
                    log::error!("capture: {e}");
                }
            }
            None => log::info!("capture: stopped before any speech"),
        },
    }
}

/// Transcribe `audio` and emit the outcome.
fn transcribe_into(
    emitter: &mut CaptureEmitter,
    transcriber: &dyn Transcriber,
    audio: &[f32],
) -> Result<(), crate::speech::whisper::TranscribeError> {
    match transcriber.transcribe(audio) {
        Ok(text) if is_non_speech(&text) => {
            emitter.error(CaptureError::NoSpeechDetected);
            Ok(())
        }
        Ok(text) => {
            log::info!("capture: transcript ready ({} chars)", text.chars().count());
            emitter.transcript(text);
            Ok(())
        }
        Err(e) => {
            emitter.error(CaptureError::recognition("transcription"));
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::capture::CaptureEvent;
    use crate::speech::whisper::{MockTranscriber, TranscribeError};

    async fn drain(mut session: CaptureSession) -> Vec<CaptureEvent> {
        let mut events = Vec::new();
        while let Some(event) = session.next_event().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn words_become_a_transcript() {
        let (mut emitter, session) = CaptureSession::channel();
        let t = MockTranscriber::ok("Plants turn light into glucose");
        transcribe_into(&mut emitter, &t, &[0.2; 4_800]).unwrap();
        drop(emitter);

        assert_eq!(
            drain(session).await,
            vec![
                CaptureEvent::TranscriptReady("Plants turn light into glucose".into()),
                CaptureEvent::CaptureEnded,
            ]
        );
    }

    #[tokio::test]
    async fn blank_transcript_is_no_speech() {
        let (mut emitter, session) = CaptureSession::channel();
        transcribe_into(&mut emitter, &MockTranscriber::ok("[BLANK_AUDIO]"), &[0.2; 480]).unwrap();
        drop(emitter);

        assert_eq!(
            drain(session).await,
            vec![
                CaptureEvent::CaptureError(CaptureError::NoSpeechDetected),
                CaptureEvent::CaptureEnded,
            ]
        );
    }

    #[tokio::test]
    async fn whisper_failure_is_a_recognition_error() {
        let (mut emitter, session) = CaptureSession::channel();
        let t = MockTranscriber::err(TranscribeError::Inference("boom".into()));
        assert!(transcribe_into(&mut emitter, &t, &[0.2; 480]).is_err());
        drop(emitter);

        assert_eq!(
            drain(session).await,
            vec![
                CaptureEvent::CaptureError(CaptureError::recognition("transcription")),
                CaptureEvent::CaptureEnded,
            ]
        );
    }

    #[tokio::test]
    async fn transcript_frees_the_microphone_before_the_thread_exits() {
        let capture = MicrophoneCapture::new(
            Arc::new(MockTranscriber::ok("x")),
            &SpeechConfig::default(),
        );
        capture.active.store(true, Ordering::Release);

        let (emitter, mut session) = CaptureSession::channel();
        let mut emitter = emitter.releasing(Arc::clone(&capture.active));
        transcribe_into(&mut emitter, &MockTranscriber::ok("Glucose"), &[0.2; 480]).unwrap();

        assert_eq!(
            session.next_event().await,
            Some(CaptureEvent::TranscriptReady("Glucose".into()))
        );
        assert!(!capture.is_active());
        drop(emitter);
    }

    #[test]
    fn second_start_while_active_is_rejected() {
        let capture = MicrophoneCapture::new(
            Arc::new(MockTranscriber::ok("x")),
            &SpeechConfig::default(),
        );
        // Simulate a running session without touching audio hardware.
        capture.active.store(true, Ordering::Release);
        assert!(matches!(capture.start(), Err(CaptureError::AlreadyActive)));
        assert!(capture.is_active());
    }
}
