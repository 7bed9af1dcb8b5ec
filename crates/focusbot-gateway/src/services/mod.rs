//! External collaborators: calendar, task extraction, transcription,
//! progress log and report mail.

pub mod calendar;
pub mod error;
pub mod mailer;
pub mod progress;
pub mod task_parser;
pub mod transcriber;

use std::time::Duration;

use reqwest::Client;

pub use calendar::{CalendarEvent, CalendarService, EventTime, GoogleCalendarClient, NewEvent};
pub use error::ServiceError;
pub use mailer::{Attachment, EmailMessage, GmailMailer, ReportMailer};
pub use progress::{DayTally, ProgressEntry, ProgressLog, ProgressReport, TaskStatus};
pub use task_parser::{OpenAiTaskParser, TaskDraft, TaskParser};
pub use transcriber::{OpenAiTranscriber, Transcriber};

pub(crate) fn http_client(timeout_secs: u64) -> Result<Client, ServiceError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Turn a non-2xx response into [`ServiceError::Api`] carrying the body.
pub(crate) async fn ensure_success(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Api {
        service,
        status: status.as_u16(),
        body,
    })
}
