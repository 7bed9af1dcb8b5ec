//! Telegram productivity assistant.
//!
//! Every outbound message goes through a [`SendGateway`], which mirrors the
//! transport-assigned id into a bounded per-chat [`RetentionStore`]. On
//! `/clear` the [`BulkRetraction`] policy deletes the recent part of that
//! history newest-first and forgets the rest.

pub mod bot;
pub mod channels;
pub mod error;
pub mod retention;
pub mod services;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bot::{BotHandler, BotServices, BotSettings};
pub use error::GatewayError;
pub use retention::{
    BulkRetraction, RetentionStore, RetractionReport, SendGateway, SentMessageRecord,
    DEFAULT_MAX_KEEP, DEFAULT_WINDOW_HOURS,
};
