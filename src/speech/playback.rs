//! Reading feedback aloud.
//!
//! [`CommandSynthesizer`] drives the platform's speech command as a child
//! process. Only one utterance plays at a time: every `speak` kills the
//! previous child before spawning the next. A child that finishes on its own
//! is reaped by a short-lived watcher thread.

use std::io;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use thiserror::Error;

/// Environment variable carrying the text to commands that do not take it as
/// an argument.
pub const TEXT_ENV: &str = "STUDY_BUDDY_SPEECH_TEXT";

const REAP_INTERVAL: Duration = Duration::from_millis(200);

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    /// No speech program could be started.
    #[error("Text-to-speech is not supported: {0}")]
    Unavailable(String),

    #[error("Text-to-speech is not supported or there is no feedback to read.")]
    EmptyText,
}

// ---------------------------------------------------------------------------
// SpeechPlayback trait
// ---------------------------------------------------------------------------

pub trait SpeechPlayback: Send + Sync {
    /// Stop any utterance in progress, then start reading `text`.
    fn speak(&self, text: &str) -> Result<(), PlaybackError>;

    /// Stop the current utterance, if any.
    fn cancel(&self);
}

// ---------------------------------------------------------------------------
// CommandSynthesizer
// ---------------------------------------------------------------------------

pub struct CommandSynthesizer {
    program: String,
    args: Vec<String>,
    append_text: bool,
    current: Arc<Mutex<Option<Child>>>,
}

impl CommandSynthesizer {
    /// `command` is `[program, args...]`; the text is appended as the last
    /// argument and also exported as [`TEXT_ENV`]. `None` picks the platform
    /// default.
    pub fn new(command: Option<Vec<String>>) -> Self {
        let (parts, append_text) = match command.filter(|c| !c.is_empty()) {
            Some(custom) => (custom, true),
            None => platform_command(),
        };
        let mut parts = parts.into_iter();
        let program = parts.next().unwrap_or_default();
        Self {
            program,
            args: parts.collect(),
            append_text,
            current: Arc::new(Mutex::new(None)),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Clear the slot if its child has exited on its own.
    fn reap_finished(slot: &mut Option<Child>) -> bool {
        let finished = match slot.as_mut().map(Child::try_wait) {
            Some(Ok(Some(status))) => {
                log::debug!("playback: utterance finished ({status})");
                true
            }
            Some(Err(e)) => {
                log::warn!("playback: lost track of speech process: {e}");
                true
            }
            Some(Ok(None)) | None => false,
        };
        if finished {
            *slot = None;
        }
        finished
    }

    /// Poll the child spawned as `pid` until it exits or is replaced.
    fn watch(current: Arc<Mutex<Option<Child>>>, pid: u32) {
        let spawned = thread::Builder::new()
            .name("speech-playback-reaper".into())
            .spawn(move || loop {
                thread::sleep(REAP_INTERVAL);
                let mut slot = current.lock().unwrap_or_else(PoisonError::into_inner);
                if slot.as_ref().map(Child::id) != Some(pid) || Self::reap_finished(&mut slot) {
                    break;
                }
            });
        if let Err(e) = spawned {
            log::warn!("playback: could not start reaper thread: {e}");
        }
    }

    fn stop_current(slot: &mut Option<Child>) {
        if let Some(mut child) = slot.take() {
            if let Ok(None) = child.try_wait() {
                log::debug!("playback: interrupting utterance (pid {})", child.id());
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }
}

impl SpeechPlayback for CommandSynthesizer {
    fn speak(&self, text: &str) -> Result<(), PlaybackError> {
        if text.trim().is_empty() {
            return Err(PlaybackError::EmptyText);
        }

        let mut slot = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        Self::stop_current(&mut slot);

        let mut command = Command::new(&self.program);
        command.args(&self.args).env(TEXT_ENV, text);
        if self.append_text {
            command.arg(text);
        }
        let child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    PlaybackError::Unavailable(format!("'{}' not found", self.program))
                } else {
                    PlaybackError::Unavailable(format!("failed to run '{}': {e}", self.program))
                }
            })?;

        log::info!("playback: speaking {} chars via {}", text.chars().count(), self.program);
        let pid = child.id();
        *slot = Some(child);
        drop(slot);
        Self::watch(Arc::clone(&self.current), pid);
        Ok(())
    }

    fn cancel(&self) {
        let mut slot = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        Self::stop_current(&mut slot);
    }
}

impl Drop for CommandSynthesizer {
    fn drop(&mut self) {
        let mut slot = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        Self::stop_current(&mut slot);
    }
}

/// Default speech command and whether it takes the text as an argument.
fn platform_command() -> (Vec<String>, bool) {
    let (parts, append_text): (&[&str], bool) = if cfg!(target_os = "macos") {
        (&["say", "-v", "Samantha"][..], true)
    } else if cfg!(target_os = "windows") {
        // PowerShell would parse a trailing argument as script text.
        (
            &[
                "powershell",
                "-NoProfile",
                "-Command",
                "Add-Type -AssemblyName System.Speech; \
                 $s = New-Object System.Speech.Synthesis.SpeechSynthesizer; \
                 $s.Speak($env:STUDY_BUDDY_SPEECH_TEXT)",
            ][..],
            false,
        )
    } else {
        (&["espeak-ng", "-v", "en-us"][..], true)
    };
    (parts.iter().map(|s| s.to_string()).collect(), append_text)
}

// ---------------------------------------------------------------------------
// MockPlayback  (test-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
#[derive(Default)]
pub struct MockPlayback {
    spoken: Mutex<Vec<String>>,
    cancels: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockPlayback {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl SpeechPlayback for MockPlayback {
    fn speak(&self, text: &str) -> Result<(), PlaybackError> {
        if text.trim().is_empty() {
            return Err(PlaybackError::EmptyText);
        }
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
