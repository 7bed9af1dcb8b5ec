//! Sent-message retention and bulk retraction.

pub mod gateway;
pub mod retraction;
pub mod store;

pub use gateway::SendGateway;
pub use retraction::{
    BulkRetraction, RetractionAttempt, RetractionFailure, RetractionOutcome, RetractionReport,
    DEFAULT_WINDOW_HOURS,
};
pub use store::{RetentionStore, SentMessageRecord, DEFAULT_MAX_KEEP};
