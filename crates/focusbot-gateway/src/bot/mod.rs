//! Command layer: turns inbound updates into collaborator calls and replies.

pub mod commands;
pub mod format;
pub mod handler;
pub mod runner;

pub use commands::{BotCommand, BotRequest, MenuAction};
pub use handler::{BotHandler, BotServices, BotSettings};
pub use runner::run_updates;
