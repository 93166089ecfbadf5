//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\study-buddy\
//!   macOS:   ~/Library/Application Support/study-buddy/
//!   Linux:   ~/.config/study-buddy/
//!
//! Data dir (Whisper models):
//!   Windows: %LOCALAPPDATA%\study-buddy\models\
//!   macOS:   ~/Library/Application Support/study-buddy/models/
//!   Linux:   ~/.local/share/study-buddy/models/

use std::path::PathBuf;

/// Resolved application directory and file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory holding `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory for downloaded GGML Whisper model files.
    pub models_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "study-buddy";

    /// Resolves all paths, falling back to the current directory when the
    /// platform provides no standard location.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self {
            settings_file: config_dir.join("settings.toml"),
            config_dir,
            models_dir: data_dir.join("models"),
        }
    }

    /// Path of the Whisper model file named `model` (without extension).
    pub fn model_file(&self, model: &str) -> PathBuf {
        self.models_dir.join(format!("{model}.bin"))
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths.models_dir.ends_with("models"));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
    }

    #[test]
    fn model_file_appends_bin_extension() {
        let paths = AppPaths::new();
        let file = paths.model_file("ggml-base.en");
        assert!(file.file_name().is_some_and(|n| n == "ggml-base.en.bin"));
        assert!(file.starts_with(&paths.models_dir));
    }
}
