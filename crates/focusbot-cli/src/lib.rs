//! focusbot CLI
//!
//! Provides the `focusbot` binary:
//! - `run` (default): long-poll Telegram and serve the bot
//! - `check-config`: validate configuration and print a redacted summary

pub mod app;
pub mod commands;
pub mod config;

pub use commands::{Cli, Commands};
pub use config::{redact_secret, ConfigSummary};
