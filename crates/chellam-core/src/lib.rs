//! chellam-core — Reply pipeline and live-typing scheduler, no UI.
//!
//! One cooperative session loop owns all conversation state. Timers and the
//! background reply worker talk to it only through its task queue, and
//! frontends (the TUI) rebuild the transcript from the `ChatEvent` stream.

pub mod config;
pub mod controller;
pub mod engine;
pub mod events;
pub mod indicator;
pub mod reveal;
pub mod session;
pub mod timer;
pub mod transcript;
pub mod types;
pub mod worker;
