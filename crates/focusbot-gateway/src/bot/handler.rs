use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use tracing::{error, info, warn};

use super::commands::{BotCommand, BotRequest, MenuAction};
use super::format::{format_event, offset_label, today_bounds, DIVIDER};
use crate::channels::{
    ChannelError, ConversationId, InboundUpdate, MediaSource, SendOptions, Transport,
};
use crate::retention::{BulkRetraction, RetentionStore, SendGateway, DEFAULT_WINDOW_HOURS};
use crate::services::{
    Attachment, CalendarService, EmailMessage, NewEvent, ProgressLog, ProgressReport,
    ReportMailer, ServiceError, TaskParser, TaskStatus, Transcriber,
};

pub const NO_EVENTS_GIF: &str = "https://media.giphy.com/media/l0MYt5jPR6QX5pnqM/giphy.gif";
pub const TASK_ADDED_GIF: &str = "https://media.giphy.com/media/26xBukh7Pn9xq/200w.gif";
pub const VOICE_GIF: &str = "https://media.giphy.com/media/xT0xeJpnrWC4XWblEk/giphy.gif";

const REPORT_SUBJECT: &str = "📊 Productivity Report";

/// Collaborators the command layer calls into.
#[derive(Clone)]
pub struct BotServices {
    pub calendar: Arc<dyn CalendarService>,
    pub task_parser: Arc<dyn TaskParser>,
    pub transcriber: Arc<dyn Transcriber>,
    pub progress: Arc<ProgressLog>,
    pub mailer: Option<Arc<dyn ReportMailer>>,
}

#[derive(Debug, Clone)]
pub struct BotSettings {
    pub utc_offset: FixedOffset,
    pub retention_window_hours: i64,
    pub report_recipient: Option<String>,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            utc_offset: FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap_or_else(|| Utc.fix()),
            retention_window_hours: DEFAULT_WINDOW_HOURS,
            report_recipient: None,
        }
    }
}

/// Reacts to one request at a time; every reply goes through the [`SendGateway`].
///
/// Collaborator failures become user-facing text. Only transport errors on
/// the reply itself are returned.
pub struct BotHandler {
    gateway: SendGateway,
    retraction: BulkRetraction,
    services: BotServices,
    settings: BotSettings,
}

impl BotHandler {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<RetentionStore>,
        services: BotServices,
        settings: BotSettings,
    ) -> Self {
        Self {
            gateway: SendGateway::new(transport.clone(), store.clone()),
            retraction: BulkRetraction::new(transport, store),
            services,
            settings,
        }
    }

    pub fn gateway(&self) -> &SendGateway {
        &self.gateway
    }

    pub fn settings(&self) -> &BotSettings {
        &self.settings
    }

    pub async fn handle_update(&self, update: InboundUpdate) -> Result<(), ChannelError> {
        self.handle(update.conversation_id, update.request).await
    }

    pub async fn handle(
        &self,
        conversation: ConversationId,
        request: BotRequest,
    ) -> Result<(), ChannelError> {
        match request {
            BotRequest::Command(command) => match command {
                BotCommand::Start | BotCommand::Help => self.start(conversation).await,
                BotCommand::Today => self.today(conversation).await,
                BotCommand::AddTask(text) => self.add_task(conversation, &text).await,
                BotCommand::Done(task) => {
                    self.update_task(conversation, &task, TaskStatus::Done).await
                }
                BotCommand::Pending(task) => {
                    self.update_task(conversation, &task, TaskStatus::Pending).await
                }
                BotCommand::Report => self.report(conversation).await,
                BotCommand::Clear => self.clear(conversation).await,
            },
            BotRequest::Voice { file_id } => self.voice(conversation, &file_id).await,
            BotRequest::Menu(action) => self.menu(conversation, action).await,
        }
    }

    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.settings.utc_offset)
    }

    async fn reply(&self, conversation: ConversationId, text: &str) -> Result<(), ChannelError> {
        self.gateway
            .send_text(conversation, text, SendOptions::default())
            .await
            .map(|_| ())
    }

    async fn reply_markdown(
        &self,
        conversation: ConversationId,
        text: &str,
    ) -> Result<(), ChannelError> {
        self.gateway
            .send_text(conversation, text, SendOptions::markdown())
            .await
            .map(|_| ())
    }

    async fn menu(
        &self,
        conversation: ConversationId,
        action: MenuAction,
    ) -> Result<(), ChannelError> {
        match action {
            MenuAction::Today => self.today(conversation).await,
            MenuAction::AddTask => {
                self.reply(conversation, "💡 Use `/addtask <task description>` to add a task.")
                    .await
            }
            MenuAction::Report => self.report(conversation).await,
            MenuAction::Clear => self.clear(conversation).await,
            MenuAction::DoneInfo => {
                self.reply_markdown(conversation, "✅ Usage: `/done <task title>`").await
            }
            MenuAction::PendingInfo => {
                self.reply_markdown(conversation, "⏳ Usage: `/pending <task title>`").await
            }
        }
    }

    async fn start(&self, conversation: ConversationId) -> Result<(), ChannelError> {
        let text = [
            "👋 *Welcome to Productivity Bot!*",
            "",
            "✨ I help you manage your day better.",
            DIVIDER,
            "⚡ Commands:",
            "• `/today` → View today’s schedule",
            "• `/addtask <text>` → Add a task",
            "• `/done <task>` → Mark a task done",
            "• `/pending <task>` → Mark a task pending",
            "• `/report` → See progress report",
            "• `/clear` → Reset stats & remove recent bot messages",
            DIVIDER,
            "🎙️ You can also send me a *voice note* and I'll transcribe it.",
        ]
        .join("\n");

        let options = SendOptions::markdown().with_keyboard(MenuAction::keyboard(&MenuAction::ALL));
        self.gateway.send_text(conversation, &text, options).await?;
        Ok(())
    }

    async fn today(&self, conversation: ConversationId) -> Result<(), ChannelError> {
        let offset = self.settings.utc_offset;
        let (start, end) = today_bounds(self.now());

        let events = match self.services.calendar.list_events_between(start, end).await {
            Ok(events) => events,
            Err(e) => {
                error!(conversation = %conversation, error = %e, "failed to fetch today's events");
                return self
                    .reply(conversation, "❌ Couldn’t fetch events. Check Google auth.")
                    .await;
            }
        };

        if events.is_empty() {
            let options = SendOptions::markdown()
                .with_caption("☀️ *No events today!* Relax, recharge, and focus 🎯");
            self.gateway
                .send_animation(conversation, MediaSource::url(NO_EVENTS_GIF), options)
                .await?;
            return Ok(());
        }

        let mut lines = vec![
            format!("📅 *Today's Schedule* _(Timezone: {})_", offset_label(offset)),
            DIVIDER.to_string(),
        ];
        lines.extend(events.iter().map(|event| format_event(event, offset)));

        let options = SendOptions::markdown()
            .with_keyboard(MenuAction::keyboard(&[MenuAction::AddTask, MenuAction::Report]));
        self.gateway
            .send_text(conversation, &lines.join("\n"), options)
            .await?;
        Ok(())
    }

    async fn add_task(&self, conversation: ConversationId, text: &str) -> Result<(), ChannelError> {
        let text = text.trim();
        if text.is_empty() {
            return self
                .reply_markdown(conversation, "Usage: `/addtask <task description>`")
                .await;
        }

        let draft = match self.services.task_parser.parse_task(text, self.now()).await {
            Ok(draft) => draft,
            Err(e) => {
                warn!(conversation = %conversation, error = %e, "could not parse task");
                return self
                    .reply(conversation, "❌ Sorry, I couldn’t understand that task.")
                    .await;
            }
        };

        let event = NewEvent {
            title: draft.title.clone(),
            description: String::new(),
            start: draft.start,
            end: draft.end,
        };
        if let Err(e) = self.services.calendar.add_event(&event).await {
            error!(conversation = %conversation, error = %e, "failed to add event");
            return self.reply(conversation, "❌ Failed to add event.").await;
        }

        info!(conversation = %conversation, title = %draft.title, "task added");
        let caption = format!(
            "✅ *Task Added!*\n{DIVIDER}\n📝 {}\n📅 {}\n⏰ {} - {}\n{DIVIDER}\n📌 Added to Google Calendar!",
            draft.title,
            draft.start.format("%Y-%m-%d"),
            draft.start.format("%H:%M"),
            draft.end.format("%H:%M"),
        );
        self.gateway
            .send_animation(
                conversation,
                MediaSource::url(TASK_ADDED_GIF),
                SendOptions::markdown().with_caption(caption),
            )
            .await?;
        Ok(())
    }

    async fn update_task(
        &self,
        conversation: ConversationId,
        task: &str,
        status: TaskStatus,
    ) -> Result<(), ChannelError> {
        let task = task.trim();
        if task.is_empty() {
            return self
                .reply_markdown(conversation, &format!("Usage: `/{status} <task title>`"))
                .await;
        }

        let today = self.now().date_naive();
        if let Err(e) = self.services.progress.log_task_update(task, status, today).await {
            error!(conversation = %conversation, error = %e, %status, "failed to log task update");
            return self
                .reply(conversation, &format!("❌ Could not mark as {status}."))
                .await;
        }

        let icon = match status {
            TaskStatus::Done => "✅",
            TaskStatus::Pending => "⏳",
        };
        self.reply_markdown(conversation, &format!("{icon} Task marked as *{status}*: {task}"))
            .await
    }

    async fn report(&self, conversation: ConversationId) -> Result<(), ChannelError> {
        let report = match self.services.progress.report().await {
            Ok(report) => report,
            Err(ServiceError::NoData) => {
                return self
                    .reply(
                        conversation,
                        "ℹ️ No data yet. Try adding and completing tasks first!",
                    )
                    .await;
            }
            Err(e) => {
                error!(conversation = %conversation, error = %e, "failed to build report");
                return self.reply(conversation, "❌ Could not generate report.").await;
            }
        };

        self.reply_markdown(conversation, "📊 *Your Progress Report!*").await?;
        self.gateway
            .send_document(
                conversation,
                MediaSource::path(report.log_path.clone()),
                SendOptions::default(),
            )
            .await?;
        self.reply_markdown(conversation, &report.render()).await?;

        let (Some(mailer), Some(recipient)) =
            (&self.services.mailer, &self.settings.report_recipient)
        else {
            return Ok(());
        };
        match mail_report(&**mailer, recipient, &report).await {
            Ok(()) => {
                self.reply(conversation, &format!("📧 Report also sent to {recipient}!"))
                    .await
            }
            Err(e) => {
                error!(conversation = %conversation, error = %e, "failed to email report");
                self.reply(conversation, "⚠️ Couldn’t email the report.").await
            }
        }
    }

    async fn clear(&self, conversation: ConversationId) -> Result<(), ChannelError> {
        let deleted = self
            .retraction
            .clear_recent(conversation, self.settings.retention_window_hours)
            .await;

        if let Err(e) = self.services.progress.reset().await {
            error!(conversation = %conversation, error = %e, "failed to reset progress log");
            return self.reply(conversation, "❌ Could not clear data.").await;
        }

        self.reply(
            conversation,
            &format!(
                "🗑️ Chat cleaned.\n• Deleted {deleted} recent bot messages\n• Cleared progress data\n\n✨ Fresh start!"
            ),
        )
        .await
    }

    async fn voice(&self, conversation: ConversationId, file_id: &str) -> Result<(), ChannelError> {
        const FAILED: &str = "❌ Voice transcription failed. Check the OpenAI API key.";

        let audio = match self.gateway.transport().download_file(file_id).await {
            Ok(audio) => audio,
            Err(e) => {
                error!(conversation = %conversation, error = %e, "failed to download voice note");
                return self.reply(conversation, FAILED).await;
            }
        };

        let text = match self.services.transcriber.transcribe(audio, "voice.ogg").await {
            Ok(text) => text,
            Err(e) => {
                error!(conversation = %conversation, error = %e, "transcription failed");
                return self.reply(conversation, FAILED).await;
            }
        };

        if text.is_empty() {
            return self
                .reply(conversation, "Hmm, I didn’t catch that. Try again?")
                .await;
        }

        self.gateway
            .send_animation(
                conversation,
                MediaSource::url(VOICE_GIF),
                SendOptions::markdown().with_caption(format!("🗣️ You said: *{text}*")),
            )
            .await?;
        Ok(())
    }
}

async fn mail_report(
    mailer: &dyn ReportMailer,
    recipient: &str,
    report: &ProgressReport,
) -> Result<(), ServiceError> {
    let data = tokio::fs::read(&report.log_path).await?;
    let file_name = report
        .log_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "progress.jsonl".to_string());

    let message = EmailMessage {
        to: recipient.to_string(),
        subject: REPORT_SUBJECT.to_string(),
        body: format!(
            "Attached is your latest productivity report.\n\n{}",
            report.render()
        ),
        attachments: vec![Attachment {
            file_name,
            content_type: "application/json".to_string(),
            data,
        }],
    };
    mailer.send(&message).await
}
