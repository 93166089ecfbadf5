//! StudyBuddy: paste study notes, answer generated questions out loud and
//! get spoken feedback.

pub mod app;
pub mod config;
pub mod genai;
pub mod session;
pub mod speech;
