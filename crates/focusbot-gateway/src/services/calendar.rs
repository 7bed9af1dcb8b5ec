//! Google Calendar v3 over REST.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use focusbot_config::CalendarSettings;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{ensure_success, http_client, ServiceError};

/// Start or end of an event: `date_time` for timed events, `date` for all-day ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventTime {
    pub fn at(date_time: DateTime<FixedOffset>) -> Self {
        Self {
            date_time: Some(date_time),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub start: EventTime,
    #[serde(default)]
    pub end: EventTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

#[async_trait]
pub trait CalendarService: Send + Sync {
    /// Single (expanded) events overlapping `[start, end)`, ordered by start time.
    async fn list_events_between(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<CalendarEvent>, ServiceError>;

    async fn add_event(&self, event: &NewEvent) -> Result<CalendarEvent, ServiceError>;
}

#[derive(Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<CalendarEvent>,
}

#[derive(Serialize)]
struct InsertBody<'a> {
    summary: &'a str,
    description: &'a str,
    start: EventTime,
    end: EventTime,
}

pub struct GoogleCalendarClient {
    client: Client,
    access_token: SecretString,
    calendar_id: String,
    base_url: String,
}

impl GoogleCalendarClient {
    pub fn new(settings: &CalendarSettings, timeout_secs: u64) -> Result<Self, ServiceError> {
        let access_token = settings
            .access_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                ServiceError::Configuration("calendar access token is not set".to_string())
            })?;

        Ok(Self {
            client: http_client(timeout_secs)?,
            access_token: SecretString::from(access_token),
            calendar_id: settings.calendar_id.clone(),
            base_url: settings.base_url.clone(),
        })
    }

    fn events_url(&self) -> Result<Url, ServiceError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            ServiceError::Configuration(format!("invalid calendar base url: {e}"))
        })?;
        url.path_segments_mut()
            .map_err(|_| ServiceError::Configuration("calendar base url cannot be a base".into()))?
            .pop_if_empty()
            .extend(["calendar", "v3", "calendars", self.calendar_id.as_str(), "events"]);
        Ok(url)
    }
}

#[async_trait]
impl CalendarService for GoogleCalendarClient {
    async fn list_events_between(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<CalendarEvent>, ServiceError> {
        let response = self
            .client
            .get(self.events_url()?)
            .bearer_auth(self.access_token.expose_secret())
            .query(&[
                ("timeMin", start.to_rfc3339()),
                ("timeMax", end.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ])
            .send()
            .await?;

        let list: EventList = ensure_success("calendar", response).await?.json().await?;
        debug!(count = list.items.len(), "fetched calendar events");
        Ok(list.items)
    }

    async fn add_event(&self, event: &NewEvent) -> Result<CalendarEvent, ServiceError> {
        let body = InsertBody {
            summary: &event.title,
            description: &event.description,
            start: EventTime::at(event.start),
            end: EventTime::at(event.end),
        };

        let response = self
            .client
            .post(self.events_url()?)
            .bearer_auth(self.access_token.expose_secret())
            .json(&body)
            .send()
            .await?;

        Ok(ensure_success("calendar", response).await?.json().await?)
    }
}
