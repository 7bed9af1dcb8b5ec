use thiserror::Error;

use crate::channels::ChannelError;
use crate::services::ServiceError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}
