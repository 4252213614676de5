// Presentation layer - HTTP surface and one-shot CLI
pub mod app_state;
pub mod cli;
pub mod handlers;
