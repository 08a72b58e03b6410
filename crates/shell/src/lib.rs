#![deny(unsafe_code)]

//! State core for the Thespis chat shell.
//!
//! The view layer renders [`app::ViewState`] snapshots and forwards user input
//! as [`chat::ShellEvent`]s; everything stateful lives here.
pub mod app;
/// Session list, composer, and the event contracts between them.
pub mod chat;
/// Settings persistence.
pub mod settings;

pub use app::{ChatShell, HintView, SessionView, ViewState};
