//! Messaging transport abstraction and its Telegram implementation.

pub mod error;
pub mod telegram;
pub mod transport;
pub mod types;

pub use error::ChannelError;
pub use telegram::{TelegramChannel, TelegramTransport};
pub use transport::Transport;
pub use types::{
    ConversationId, InboundUpdate, InlineButton, InlineKeyboard, MediaSource, MessageId,
    ParseMode, SendOptions, SentMessage,
};
