//! Application entry point: StudyBuddy.
//!
//! # Startup sequence
//!
//! 1. Initialise logging and load `.env` from the working directory.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create the [`tokio`] runtime.
//! 4. Build the Gemini client, question generator and answer evaluator.
//! 5. Load the Whisper model for speech capture (degrade if missing).
//! 6. Build the speech playback command.
//! 7. Spawn the session controller on the runtime.
//! 8. Run [`eframe::run_native`]: blocks the main thread until the window
//!    is closed.

use std::sync::Arc;

use eframe::egui;
use tokio::sync::mpsc;

use study_buddy::{
    app::StudyBuddyApp,
    config::{AppConfig, AppPaths},
    genai::{AnswerEvaluator, GeminiClient, GenerativeClient, PromptBuilder, QuestionGenerator},
    session::{new_shared_session, SessionCommand, SessionController},
    speech::{
        CommandSynthesizer, MicrophoneCapture, SpeechCapture, SpeechPlayback, UnavailableCapture,
        WhisperTranscriber,
    },
};

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let (width, height) = config.ui.window_size;
    let mut vp = egui::ViewportBuilder::default()
        .with_title("StudyBuddy")
        .with_inner_size([width, height])
        .with_min_inner_size([480.0, 420.0]);

    if let Some((x, y)) = config.ui.window_position {
        vp = vp.with_position(egui::pos2(x, y));
    }

    eframe::NativeOptions {
        viewport: vp,
        ..Default::default()
    }
}

fn build_capture(config: &AppConfig) -> Arc<dyn SpeechCapture> {
    let model_path = AppPaths::new().model_file(&config.speech.whisper_model);

    match WhisperTranscriber::load(&model_path, &config.speech.language, config.speech.use_gpu) {
        Ok(whisper) => Arc::new(MicrophoneCapture::new(Arc::new(whisper), &config.speech)),
        Err(e) => {
            log::warn!(
                "Could not load Whisper model ({}): {e}. Spoken answers are disabled.",
                model_path.display()
            );
            Arc::new(UnavailableCapture::new(format!(
                "no speech model at {}",
                model_path.display()
            )))
        }
    }
}

fn main() -> anyhow::Result<()> {
    // 1. Logging + .env
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Ok(path) = dotenvy::dotenv() {
        log::info!("Loaded environment from {}", path.display());
    }
    log::info!("StudyBuddy starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    // 4. Generative side
    let gemini = GeminiClient::from_config(&config.generative);
    if !gemini.is_configured() {
        log::warn!(
            "No API key found; set {} or generative.api_key in settings.toml",
            study_buddy::config::API_KEY_ENV
        );
    }
    let client: Arc<dyn GenerativeClient> = Arc::new(gemini);
    let prompts = PromptBuilder::new(config.quiz.question_count);
    let generator = QuestionGenerator::new(Arc::clone(&client), prompts.clone(), config.quiz.min_notes_chars);
    let evaluator = AnswerEvaluator::new(client, prompts);

    // 5-6. Speech
    let capture = build_capture(&config);
    let playback: Arc<dyn SpeechPlayback> =
        Arc::new(CommandSynthesizer::new(config.speech.playback_command.clone()));

    // 7. Session controller
    let session = new_shared_session();
    let (command_tx, command_rx) = mpsc::channel::<SessionCommand>(16);
    let controller = SessionController::new(Arc::clone(&session), generator, evaluator, capture, playback);
    rt.spawn(controller.run(command_rx));

    // 8. UI (blocks until the window is closed)
    let app = StudyBuddyApp::new(session, command_tx, &config);
    eframe::run_native(
        "StudyBuddy",
        native_options(&config),
        Box::new(move |_cc| Ok(Box::new(app))),
    )
    .map_err(|e| anyhow::anyhow!("eframe: {e}"))?;

    log::info!("StudyBuddy shut down");
    Ok(())
}
