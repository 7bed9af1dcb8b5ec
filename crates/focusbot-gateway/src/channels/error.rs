use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Failed to send message: {0}")]
    SendFailed(String),

    #[error("Message not found")]
    MessageNotFound,

    #[error("Message can't be deleted: {0}")]
    MessageNotDeletable(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("File download failed: {0}")]
    Download(String),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Channel error: {0}")]
    Other(String),
}
