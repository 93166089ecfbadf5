//! StudyBuddy window: egui/eframe application.
//!
//! # Architecture
//!
//! [`StudyBuddyApp`] is the top-level [`eframe::App`]. It owns:
//!
//! * `session`: [`SharedSession`] read once per frame under a short lock.
//! * `command_tx`: sends [`SessionCommand`]s to the controller task.
//! * `notes_draft`: the text being typed before a session starts.
//!
//! The UI never mutates the session itself.
//!
//! # Views
//!
//! | View | Content |
//! |------|---------|
//! | `Initial` | notes editor + "Start Learning Session" |
//! | `Quiz` | question, mic toggle, transcript, feedback, next/finish |
//! | `Complete` | "Great Job!" + "Start a New Topic" |
//!
//! A modal loading window covers every view while a request is in flight and
//! a dismissable error window is shown whenever the session holds an error.

use std::time::Duration;

use eframe::egui;
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::genai::{Classification, Feedback};
use crate::session::{lock, Session, SessionCommand, SharedSession, View};

const GREEN: egui::Color32 = egui::Color32::from_rgb(21, 128, 61);
const RED: egui::Color32 = egui::Color32::from_rgb(220, 38, 38);
const SLATE: egui::Color32 = egui::Color32::from_rgb(100, 116, 139);

// ---------------------------------------------------------------------------
// StudyBuddyApp
// ---------------------------------------------------------------------------

pub struct StudyBuddyApp {
    session: SharedSession,
    command_tx: mpsc::Sender<SessionCommand>,
    notes_draft: String,
    min_notes_chars: usize,
}

impl StudyBuddyApp {
    pub fn new(session: SharedSession, command_tx: mpsc::Sender<SessionCommand>, config: &AppConfig) -> Self {
        Self {
            session,
            command_tx,
            notes_draft: String::new(),
            min_notes_chars: config.quiz.min_notes_chars,
        }
    }

    fn send(&self, command: SessionCommand) {
        if let Err(e) = self.command_tx.try_send(command) {
            log::warn!("ui: could not send command: {e}");
        }
    }

    // ── Views ────────────────────────────────────────────────────────────

    fn draw_initial(&mut self, ui: &mut egui::Ui, session: &Session) {
        ui.vertical_centered(|ui| {
            ui.heading(egui::RichText::new("StudyBuddy").size(30.0).strong().color(GREEN));
            ui.label(egui::RichText::new("Your personal AI learning partner.").color(SLATE));
        });
        ui.add_space(16.0);

        ui.label("Paste your lesson notes here:");
        ui.add(
            egui::TextEdit::multiline(&mut self.notes_draft)
                .desired_rows(12)
                .desired_width(f32::INFINITY)
                .hint_text("e.g., Photosynthesis is the process used by plants, algae, and certain bacteria..."),
        );

        let count = self.notes_draft.chars().count();
        let color = if count < self.min_notes_chars { SLATE } else { GREEN };
        ui.label(
            egui::RichText::new(format!("{count} characters (minimum {})", self.min_notes_chars))
                .size(11.0)
                .color(color),
        );
        ui.add_space(8.0);

        let start = egui::Button::new(egui::RichText::new("Start Learning Session").strong().size(16.0))
            .fill(GREEN)
            .min_size(egui::vec2(ui.available_width(), 40.0));
        if ui.add_enabled(!session.loading.active, start).clicked() {
            self.send(SessionCommand::StartSession {
                notes: self.notes_draft.clone(),
            });
        }
    }

    fn draw_quiz(&mut self, ui: &mut egui::Ui, session: &Session) {
        let (Some(question), Some((position, total))) = (session.current_question(), session.progress()) else {
            return;
        };

        ui.vertical_centered(|ui| {
            ui.label(
                egui::RichText::new(format!("Question {position} of {total}"))
                    .size(12.0)
                    .color(SLATE),
            );
            ui.add_space(4.0);
            ui.label(egui::RichText::new(question).size(20.0).strong());
            ui.add_space(20.0);

            let (mic_label, mic_color) = if session.capturing {
                ("■ Stop", RED)
            } else {
                ("🎤 Answer", GREEN)
            };
            let mic = egui::Button::new(egui::RichText::new(mic_label).size(18.0).strong())
                .fill(mic_color)
                .corner_radius(egui::CornerRadius::same(40))
                .min_size(egui::vec2(96.0, 96.0));
            if ui.add_enabled(!session.loading.active, mic).clicked() {
                self.send(SessionCommand::ToggleCapture);
            }

            ui.add_space(6.0);
            let hint = if session.capturing {
                "Listening..."
            } else {
                "Click the mic to answer"
            };
            ui.label(egui::RichText::new(hint).color(SLATE));
        });

        if !session.transcript.is_empty() {
            ui.add_space(12.0);
            egui::Frame::new()
                .fill(egui::Color32::from_gray(235))
                .corner_radius(egui::CornerRadius::same(8))
                .inner_margin(egui::Margin::same(12))
                .show(ui, |ui| {
                    ui.set_width(ui.available_width());
                    ui.label(egui::RichText::new("Here's what I heard:").size(12.0).color(SLATE));
                    ui.label(session.transcript.as_str());
                });
        }

        if let Some(feedback) = &session.feedback {
            ui.add_space(12.0);
            self.draw_feedback(ui, feedback);
        }

        if session.can_advance() {
            ui.add_space(16.0);
            ui.vertical_centered(|ui| {
                let label = if position < total {
                    "Next Question"
                } else {
                    "Finish Quiz"
                };
                let next = egui::Button::new(egui::RichText::new(label).strong().size(16.0)).fill(SLATE);
                if ui.add(next).clicked() {
                    self.send(SessionCommand::Advance);
                }
            });
        }
    }

    fn draw_feedback(&self, ui: &mut egui::Ui, feedback: &Feedback) {
        let (fill, accent) = feedback_colors(feedback.classification);
        egui::Frame::new()
            .fill(fill)
            .stroke(egui::Stroke::new(2.0, accent))
            .corner_radius(egui::CornerRadius::same(8))
            .inner_margin(egui::Margin::same(12))
            .show(ui, |ui| {
                ui.set_width(ui.available_width());
                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new("Feedback:").strong().size(16.0).color(accent));
                    ui.label(
                        egui::RichText::new(feedback.classification.label())
                            .size(11.0)
                            .color(accent),
                    );
                });
                ui.add_space(4.0);
                ui.label(feedback.text.as_str());
                ui.add_space(6.0);
                if ui.link("🔊 Read Aloud").clicked() {
                    self.send(SessionCommand::SpeakFeedback);
                }
            });
    }

    fn draw_complete(&mut self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.add_space(32.0);
            ui.heading(egui::RichText::new("Great Job!").size(30.0).strong().color(GREEN));
            ui.add_space(8.0);
            ui.label(
                egui::RichText::new("You've completed all the questions for this topic.").color(SLATE),
            );
            ui.add_space(24.0);
            let restart = egui::Button::new(egui::RichText::new("Start a New Topic").strong().size(16.0))
                .fill(GREEN);
            if ui.add(restart).clicked() {
                self.notes_draft.clear();
                self.send(SessionCommand::Restart);
            }
        });
    }

    // ── Overlays ─────────────────────────────────────────────────────────

    fn draw_loading(&self, ctx: &egui::Context, label: &str) {
        egui::Window::new("loading")
            .title_bar(false)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.add(egui::Spinner::new().size(32.0).color(GREEN));
                    ui.add_space(8.0);
                    ui.label(egui::RichText::new(label).strong());
                });
            });
    }

    fn draw_error(&self, ctx: &egui::Context, message: &str) {
        egui::Window::new(egui::RichText::new("An Error Occurred").color(RED).strong())
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.set_max_width(360.0);
                ui.label(message);
                ui.add_space(8.0);
                if ui.add(egui::Button::new("Close").fill(RED)).clicked() {
                    self.send(SessionCommand::DismissError);
                }
            });
    }
}

/// Panel fill and accent for each verdict.
fn feedback_colors(classification: Classification) -> (egui::Color32, egui::Color32) {
    match classification {
        Classification::Correct => (egui::Color32::from_rgb(220, 252, 231), GREEN),
        Classification::PartiallyCorrect => (
            egui::Color32::from_rgb(254, 249, 195),
            egui::Color32::from_rgb(161, 98, 7),
        ),
        Classification::Incorrect => (egui::Color32::from_rgb(254, 226, 226), RED),
        Classification::EvaluationFailed => (egui::Color32::from_rgb(241, 245, 249), SLATE),
    }
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for StudyBuddyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let session = lock(&self.session).clone();

        // The controller updates the session from another thread.
        let interval = if session.loading.active || session.capturing {
            Duration::from_millis(66)
        } else {
            Duration::from_millis(250)
        };
        ctx.request_repaint_after(interval);

        let frame = egui::Frame::new()
            .fill(egui::Color32::from_rgb(248, 250, 252))
            .inner_margin(egui::Margin::same(24));

        egui::CentralPanel::default().frame(frame).show(ctx, |ui| {
            egui::ScrollArea::vertical().auto_shrink([false; 2]).show(ui, |ui| {
                match session.view {
                    View::Initial => self.draw_initial(ui, &session),
                    View::Quiz => self.draw_quiz(ui, &session),
                    View::Complete => self.draw_complete(ui),
                }
            });
        });

        if session.loading.active {
            self.draw_loading(ctx, &session.loading.label);
        }
        if let Some(message) = &session.error {
            self.draw_error(ctx, message);
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("StudyBuddy window closing");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
