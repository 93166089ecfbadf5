//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

/// Environment variable that supplies the generative-language API key.
///
/// Takes precedence over `generative.api_key` in `settings.toml`.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

// ---------------------------------------------------------------------------
// GenerativeConfig
// ---------------------------------------------------------------------------

/// Settings for the generative-language service (Gemini `generateContent`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerativeConfig {
    /// Service root, without the API version segment.
    pub base_url: String,
    /// API version path segment (e.g. `"v1beta"`).
    pub api_version: String,
    /// Model identifier (e.g. `"gemini-2.0-flash"`).
    pub model: String,
    /// API key. Usually left empty in favour of [`API_KEY_ENV`].
    pub api_key: Option<String>,
    /// Per-request timeout in seconds. `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".into(),
            api_version: "v1beta".into(),
            model: "gemini-2.0-flash".into(),
            api_key: None,
            timeout_secs: None,
        }
    }
}

impl GenerativeConfig {
    /// Resolve the API key from the process environment, then from the
    /// settings file. Empty strings count as missing.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(std::env::var(API_KEY_ENV).ok())
    }

    /// Same as [`resolve_api_key`](Self::resolve_api_key) with the
    /// environment value supplied by the caller.
    pub fn resolve_api_key_with(&self, env_value: Option<String>) -> Option<String> {
        env_value
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api_key.clone().filter(|k| !k.trim().is_empty()))
    }

    /// Full `generateContent` endpoint URL (without the key parameter).
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.api_version,
            self.model
        )
    }
}

// ---------------------------------------------------------------------------
// QuizConfig
// ---------------------------------------------------------------------------

/// Quiz generation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizConfig {
    /// Minimum notes length in characters before generation is attempted.
    pub min_notes_chars: usize,
    /// Number of questions requested from the model.
    pub question_count: usize,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            min_notes_chars: 50,
            question_count: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// Speech capture and playback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// BCP-47 locale used for recognition and playback.
    pub language: String,
    /// GGML Whisper model file stem, looked up in the models directory.
    pub whisper_model: String,
    /// Attempt GPU-accelerated inference when available.
    pub use_gpu: bool,
    /// Audio input device name. `None` means the system default.
    pub audio_device: Option<String>,
    /// RMS level above which a 30 ms frame counts as speech.
    pub vad_threshold: f32,
    /// Seconds of silence before a capture gives up with "no speech".
    pub no_speech_timeout_secs: f32,
    /// Trailing silence (ms) that ends an utterance once speech started.
    pub end_of_utterance_ms: u32,
    /// Hard cap on a single utterance, in seconds.
    pub max_utterance_secs: f32,
    /// Playback program override. Text is appended as the last argument.
    pub playback_command: Option<Vec<String>>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language: "en-US".into(),
            whisper_model: "ggml-base.en".into(),
            use_gpu: false,
            audio_device: None,
            vad_threshold: 0.01,
            no_speech_timeout_secs: 8.0,
            end_of_utterance_ms: 1_200,
            max_utterance_secs: 30.0,
            playback_command: None,
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// egui window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Initial inner window size in logical pixels.
    pub window_size: (f32, f32),
    /// Last saved window position. `None` lets the window manager decide.
    pub window_position: Option<(f32, f32)>,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            window_size: (720.0, 640.0),
            window_position: None,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use study_buddy::config::AppConfig;
///
/// // Returns Default when the file is missing.
/// let config = AppConfig::load().unwrap();
/// assert_eq!(config.quiz.question_count, 5);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Generative-language service settings.
    pub generative: GenerativeConfig,
    /// Quiz limits.
    pub quiz: QuizConfig,
    /// Speech capture / playback settings.
    pub speech: SpeechConfig,
    /// Window settings.
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.generative.base_url, loaded.generative.base_url);
        assert_eq!(original.generative.model, loaded.generative.model);
        assert_eq!(original.generative.api_key, loaded.generative.api_key);
        assert_eq!(original.generative.timeout_secs, loaded.generative.timeout_secs);
        assert_eq!(original.quiz.min_notes_chars, loaded.quiz.min_notes_chars);
        assert_eq!(original.quiz.question_count, loaded.quiz.question_count);
        assert_eq!(original.speech.language, loaded.speech.language);
        assert_eq!(original.speech.whisper_model, loaded.speech.whisper_model);
        assert_eq!(original.speech.end_of_utterance_ms, loaded.speech.end_of_utterance_ms);
        assert_eq!(original.ui.window_size, loaded.ui.window_size);
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.generative.model, "gemini-2.0-flash");
        assert_eq!(config.quiz.min_notes_chars, 50);
    }

    #[test]
    fn partial_file_keeps_set_fields() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[generative]\napi_key = \"AIza-user\"\n").expect("write");

        let cfg = AppConfig::load_from(&path).expect("partial file should load");

        assert_eq!(cfg.generative.api_key.as_deref(), Some("AIza-user"));
        assert_eq!(cfg.generative.resolve_api_key_with(None).as_deref(), Some("AIza-user"));
        assert_eq!(cfg.generative.model, "gemini-2.0-flash");
        assert_eq!(cfg.quiz.min_notes_chars, 50);
        assert_eq!(cfg.speech.language, "en-US");
    }

    #[test]
    fn missing_fields_within_a_table_use_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[quiz]\nquestion_count = 3\n\n[speech]\nuse_gpu = true\n").expect("write");

        let cfg = AppConfig::load_from(&path).expect("load");

        assert_eq!(cfg.quiz.question_count, 3);
        assert_eq!(cfg.quiz.min_notes_chars, 50);
        assert!(cfg.speech.use_gpu);
        assert_eq!(cfg.speech.whisper_model, "ggml-base.en");
        assert_eq!(cfg.ui.window_size, (720.0, 640.0));
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.generative.api_version, "v1beta");
        assert!(cfg.generative.api_key.is_none());
        assert!(cfg.generative.timeout_secs.is_none());
        assert_eq!(cfg.quiz.question_count, 5);
        assert_eq!(cfg.speech.language, "en-US");
        assert!(cfg.speech.playback_command.is_none());
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.generative.api_key = Some("AIza-test".into());
        cfg.generative.timeout_secs = Some(30);
        cfg.quiz.question_count = 3;
        cfg.speech.audio_device = Some("USB Mic".into());
        cfg.speech.playback_command = Some(vec!["espeak-ng".into(), "-s".into(), "150".into()]);
        cfg.ui.window_position = Some((100.0, 200.0));

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.generative.api_key.as_deref(), Some("AIza-test"));
        assert_eq!(loaded.generative.timeout_secs, Some(30));
        assert_eq!(loaded.quiz.question_count, 3);
        assert_eq!(loaded.speech.audio_device.as_deref(), Some("USB Mic"));
        assert_eq!(
            loaded.speech.playback_command,
            Some(vec!["espeak-ng".to_string(), "-s".to_string(), "150".to_string()])
        );
        assert_eq!(loaded.ui.window_position, Some((100.0, 200.0)));
    }

    #[test]
    fn env_key_takes_precedence() {
        let mut cfg = GenerativeConfig::default();
        cfg.api_key = Some("from-file".into());

        assert_eq!(
            cfg.resolve_api_key_with(Some("from-env".into())).as_deref(),
            Some("from-env")
        );
        assert_eq!(cfg.resolve_api_key_with(None).as_deref(), Some("from-file"));
    }

    #[test]
    fn blank_keys_count_as_missing() {
        let mut cfg = GenerativeConfig::default();
        cfg.api_key = Some("   ".into());

        assert!(cfg.resolve_api_key_with(Some(String::new())).is_none());
    }

    #[test]
    fn endpoint_joins_segments() {
        let mut cfg = GenerativeConfig::default();
        cfg.base_url = "http://localhost:8080/".into();
        assert_eq!(
            cfg.endpoint(),
            "http://localhost:8080/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }
}
