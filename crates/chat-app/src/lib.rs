#![deny(unsafe_code)]

/// Terminal front-end for the chat lifecycle.
///
/// Reads prompts and commands from stdin, prints the transcript to stdout, and keeps logs
/// on stderr.
pub mod app;
/// System clipboard integration.
pub mod clipboard;
pub mod render;
/// Settings loading and persistence.
pub mod settings;
