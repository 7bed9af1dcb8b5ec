//! Telegram transport and update listener built on teloxide.
//!
//! [`TelegramTransport`] implements [`Transport`] against the Bot API.
//! [`TelegramChannel`] long-polls for updates, filters senders against the
//! allow-list and forwards commands, voice notes and menu presses as
//! [`InboundUpdate`]s through an mpsc channel.

use async_trait::async_trait;
use chrono::Utc;
use focusbot_config::TelegramSettings;
use teloxide::net::Download;
use teloxide::payloads::{
    SendAnimationSetters, SendDocumentSetters, SendMessageSetters, SendPhotoSetters,
};
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, InputFile, Me, MessageId as TgMessageId,
    ParseMode as TgParseMode,
};
use teloxide::utils::command::BotCommands;
use teloxide::{ApiError, RequestError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use super::error::ChannelError;
use super::transport::Transport;
use super::types::{
    ConversationId, InboundUpdate, InlineKeyboard, MediaSource, MessageId, ParseMode,
    SendOptions, SentMessage,
};
use crate::bot::{BotCommand, BotRequest, MenuAction};

const UPDATE_BUFFER: usize = 256;

/// Bot API client behind the [`Transport`] seam.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot_token: &str) -> Self {
        Self::with_bot(Bot::new(bot_token))
    }

    pub fn with_bot(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

#[allow(deprecated)]
fn parse_mode(mode: ParseMode) -> TgParseMode {
    match mode {
        ParseMode::Markdown => TgParseMode::Markdown,
        ParseMode::Html => TgParseMode::Html,
    }
}

pub fn keyboard_markup(keyboard: &InlineKeyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.callback_data.clone()))
            .collect::<Vec<_>>()
    }))
}

pub fn input_file(source: &MediaSource) -> Result<InputFile, ChannelError> {
    match source {
        MediaSource::Url(raw) => {
            let url = Url::parse(raw)
                .map_err(|e| ChannelError::SendFailed(format!("Invalid media url '{raw}': {e}")))?;
            Ok(InputFile::url(url))
        }
        MediaSource::Path(path) => Ok(InputFile::file(path.clone())),
        MediaSource::Bytes { file_name, data } => {
            Ok(InputFile::memory(data.clone()).file_name(file_name.clone()))
        }
    }
}

fn sent_message(msg: &Message) -> SentMessage {
    SentMessage {
        conversation_id: ConversationId(msg.chat.id.0),
        message_id: MessageId(msg.id.0),
        date: msg.date,
    }
}

pub fn map_send_error(err: RequestError) -> ChannelError {
    match err {
        err @ RequestError::RetryAfter(_) => ChannelError::RateLimited(err.to_string()),
        err @ RequestError::Network(_) => ChannelError::ConnectionFailed(err.to_string()),
        other => ChannelError::SendFailed(format!("Telegram send error: {other}")),
    }
}

/// Deletion outcomes the retraction policy tells apart.
pub fn map_delete_error(err: RequestError) -> ChannelError {
    match err {
        RequestError::Api(ApiError::MessageToDeleteNotFound) => ChannelError::MessageNotFound,
        RequestError::Api(ApiError::MessageCantBeDeleted) => {
            ChannelError::MessageNotDeletable("message can't be deleted".to_string())
        }
        err @ RequestError::RetryAfter(_) => ChannelError::RateLimited(err.to_string()),
        err @ RequestError::Network(_) => ChannelError::ConnectionFailed(err.to_string()),
        other => ChannelError::Other(format!("Telegram delete error: {other}")),
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(
        &self,
        conversation: ConversationId,
        text: &str,
        options: &SendOptions,
    ) -> Result<SentMessage, ChannelError> {
        let mut request = self.bot.send_message(ChatId(conversation.0), text);
        if let Some(mode) = options.parse_mode {
            request = request.parse_mode(parse_mode(mode));
        }
        if let Some(keyboard) = &options.keyboard {
            request = request.reply_markup(keyboard_markup(keyboard));
        }
        let msg = request.await.map_err(map_send_error)?;
        Ok(sent_message(&msg))
    }

    async fn send_animation(
        &self,
        conversation: ConversationId,
        animation: &MediaSource,
        options: &SendOptions,
    ) -> Result<SentMessage, ChannelError> {
        let mut request = self
            .bot
            .send_animation(ChatId(conversation.0), input_file(animation)?);
        if let Some(caption) = &options.caption {
            request = request.caption(caption.clone());
        }
        if let Some(mode) = options.parse_mode {
            request = request.parse_mode(parse_mode(mode));
        }
        if let Some(keyboard) = &options.keyboard {
            request = request.reply_markup(keyboard_markup(keyboard));
        }
        let msg = request.await.map_err(map_send_error)?;
        Ok(sent_message(&msg))
    }

    async fn send_photo(
        &self,
        conversation: ConversationId,
        photo: &MediaSource,
        options: &SendOptions,
    ) -> Result<SentMessage, ChannelError> {
        let mut request = self.bot.send_photo(ChatId(conversation.0), input_file(photo)?);
        if let Some(caption) = &options.caption {
            request = request.caption(caption.clone());
        }
        if let Some(mode) = options.parse_mode {
            request = request.parse_mode(parse_mode(mode));
        }
        if let Some(keyboard) = &options.keyboard {
            request = request.reply_markup(keyboard_markup(keyboard));
        }
        let msg = request.await.map_err(map_send_error)?;
        Ok(sent_message(&msg))
    }

    async fn send_document(
        &self,
        conversation: ConversationId,
        document: &MediaSource,
        options: &SendOptions,
    ) -> Result<SentMessage, ChannelError> {
        let mut request = self
            .bot
            .send_document(ChatId(conversation.0), input_file(document)?);
        if let Some(caption) = &options.caption {
            request = request.caption(caption.clone());
        }
        if let Some(mode) = options.parse_mode {
            request = request.parse_mode(parse_mode(mode));
        }
        if let Some(keyboard) = &options.keyboard {
            request = request.reply_markup(keyboard_markup(keyboard));
        }
        let msg = request.await.map_err(map_send_error)?;
        Ok(sent_message(&msg))
    }

    async fn delete_message(
        &self,
        conversation: ConversationId,
        message_id: MessageId,
    ) -> Result<(), ChannelError> {
        self.bot
            .delete_message(ChatId(conversation.0), TgMessageId(message_id.0))
            .await
            .map_err(map_delete_error)?;
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, ChannelError> {
        let file = self
            .bot
            .get_file(file_id)
            .await
            .map_err(|e| ChannelError::Download(format!("Failed to resolve file: {e}")))?;

        let mut buffer = Vec::new();
        self.bot
            .download_file(&file.path, &mut buffer)
            .await
            .map_err(|e| ChannelError::Download(format!("Failed to download file: {e}")))?;
        Ok(buffer)
    }
}

/// Check whether a user is allowed based on the allowed_users list.
///
/// If `allowed_users` is empty, all users are allowed.
/// Otherwise, the username or user ID (as string) must be in the list.
pub fn is_user_allowed(allowed_users: &[String], username: Option<&str>, user_id: u64) -> bool {
    if allowed_users.is_empty() {
        return true;
    }
    let user_id_str = user_id.to_string();
    allowed_users.iter().any(|allowed| {
        allowed == &user_id_str
            || username.is_some_and(|uname| uname == allowed.strip_prefix('@').unwrap_or(allowed))
    })
}

/// Read a slash command. Plain chat text is not a request.
pub fn parse_text_request(text: &str, bot_username: &str) -> Option<BotRequest> {
    if !text.starts_with('/') {
        return None;
    }
    match BotCommand::parse(text, bot_username) {
        Ok(command) => Some(BotRequest::Command(command)),
        Err(e) => {
            debug!(text, error = %e, "ignoring unknown command");
            None
        }
    }
}

fn request_from_message(msg: &Message, bot_username: &str) -> Option<BotRequest> {
    if let Some(voice) = msg.voice() {
        return Some(BotRequest::Voice {
            file_id: voice.file.id.to_string(),
        });
    }
    parse_text_request(msg.text()?, bot_username)
}

/// Long-polling listener that turns Telegram updates into [`InboundUpdate`]s.
pub struct TelegramChannel {
    config: TelegramSettings,
    update_tx: Option<mpsc::Sender<InboundUpdate>>,
    update_rx: Option<mpsc::Receiver<InboundUpdate>>,
    bot_handle: Option<JoinHandle<()>>,
}

impl TelegramChannel {
    pub fn new(config: TelegramSettings) -> Self {
        let (tx, rx) = mpsc::channel(UPDATE_BUFFER);
        Self {
            config,
            update_tx: Some(tx),
            update_rx: Some(rx),
            bot_handle: None,
        }
    }

    pub fn take_update_receiver(&mut self) -> Option<mpsc::Receiver<InboundUpdate>> {
        self.update_rx.take()
    }

    pub fn is_running(&self) -> bool {
        self.bot_handle.is_some()
    }

    pub async fn start(&mut self) -> Result<(), ChannelError> {
        if self.bot_handle.is_some() {
            return Err(ChannelError::Other(
                "Telegram channel already started".to_string(),
            ));
        }

        let bot = Bot::new(&self.config.bot_token);

        let me: Me = bot
            .get_me()
            .await
            .map_err(|e| ChannelError::ConnectionFailed(format!("Failed to get bot info: {e}")))?;
        let bot_username = me.username().to_string();

        info!(
            "Telegram bot @{} started, listening for updates",
            bot_username
        );

        let update_tx = self.update_tx.clone().ok_or(ChannelError::ChannelClosed)?;
        let allowed_users = self.config.allowed_users.clone();

        let message_tx = update_tx.clone();
        let message_allowed = allowed_users.clone();
        let on_message = move |msg: Message| {
            let tx = message_tx.clone();
            let allowed = message_allowed.clone();
            let bot_uname = bot_username.clone();

            async move {
                let Some(from) = msg.from.as_ref() else {
                    warn!("Ignoring message with no sender");
                    return respond(());
                };
                if !is_user_allowed(&allowed, from.username.as_deref(), from.id.0) {
                    debug!(
                        "Ignoring message from non-allowed user: {:?} (id: {})",
                        from.username, from.id
                    );
                    return respond(());
                }

                if let Some(request) = request_from_message(&msg, &bot_uname) {
                    let update = InboundUpdate {
                        conversation_id: ConversationId(msg.chat.id.0),
                        sender: from.username.clone().unwrap_or_else(|| "unknown".to_string()),
                        request,
                        timestamp: msg.date,
                    };
                    if let Err(e) = tx.send(update).await {
                        error!("Failed to forward Telegram message: {}", e);
                    }
                }

                respond(())
            }
        };

        let on_callback = move |bot: Bot, query: CallbackQuery| {
            let tx = update_tx.clone();
            let allowed = allowed_users.clone();

            async move {
                if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
                    warn!("Failed to answer callback query: {}", e);
                }

                let from = &query.from;
                if !is_user_allowed(&allowed, from.username.as_deref(), from.id.0) {
                    debug!("Ignoring button press from non-allowed user (id: {})", from.id);
                    return respond(());
                }

                let Some(action) = query.data.as_deref().and_then(MenuAction::parse) else {
                    debug!("Ignoring unknown callback data: {:?}", query.data);
                    return respond(());
                };
                let Some(chat_id) = query.message.as_ref().map(|m| m.chat().id) else {
                    return respond(());
                };

                let update = InboundUpdate {
                    conversation_id: ConversationId(chat_id.0),
                    sender: from.username.clone().unwrap_or_else(|| "unknown".to_string()),
                    request: BotRequest::Menu(action),
                    timestamp: Utc::now(),
                };
                if let Err(e) = tx.send(update).await {
                    error!("Failed to forward Telegram button press: {}", e);
                }

                respond(())
            }
        };

        let handle = tokio::spawn(async move {
            let handler = dptree::entry()
                .branch(Update::filter_message().endpoint(on_message))
                .branch(Update::filter_callback_query().endpoint(on_callback));

            Dispatcher::builder(bot, handler).build().dispatch().await;
        });

        self.bot_handle = Some(handle);
        Ok(())
    }

    /// Abort polling and close the update stream.
    pub async fn stop(&mut self) -> Result<(), ChannelError> {
        if let Some(handle) = self.bot_handle.take() {
            handle.abort();
            info!("Telegram polling task aborted");
        }

        self.update_tx.take();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::InlineButton;

    fn test_config() -> TelegramSettings {
        TelegramSettings {
            bot_token: "test:fake-token".to_string(),
            allowed_users: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_download_file_resolves_path_then_fetches() {
        use wiremock::matchers::{method, path_regex};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)/bot[^/]+/getfile$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": {
                    "file_id": "voice-1",
                    "file_unique_id": "unique-1",
                    "file_size": 3,
                    "file_path": "voice/file_1.oga"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"/voice/file_1\.oga$"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .expect(1)
            .mount(&server)
            .await;

        let api_url = reqwest::Url::parse(&server.uri()).unwrap();
        let transport = TelegramTransport::with_bot(
            Bot::new(test_config().bot_token).set_api_url(api_url),
        );

        let audio = transport.download_file("voice-1").await.unwrap();
        assert_eq!(audio, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_download_file_unknown_id_is_download_error() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: invalid file_id"
            })))
            .mount(&server)
            .await;

        let api_url = reqwest::Url::parse(&server.uri()).unwrap();
        let transport = TelegramTransport::with_bot(
            Bot::new(test_config().bot_token).set_api_url(api_url),
        );

        let err = transport.download_file("missing").await.unwrap_err();
        assert!(matches!(err, ChannelError::Download(_)));
    }

    #[test]
    fn test_is_user_allowed_empty_list() {
        assert!(is_user_allowed(&[], Some("anyone"), 12345));
        assert!(is_user_allowed(&[], None, 12345));
    }

    #[test]
    fn test_is_user_allowed_by_id() {
        let allowed = vec!["12345".to_string()];
        assert!(is_user_allowed(&allowed, Some("john"), 12345));
        assert!(!is_user_allowed(&allowed, Some("john"), 99999));
    }

    #[test]
    fn test_is_user_allowed_by_username() {
        let allowed = vec!["@john".to_string(), "jane".to_string()];
        assert!(is_user_allowed(&allowed, Some("john"), 99999));
        assert!(is_user_allowed(&allowed, Some("jane"), 99999));
        assert!(!is_user_allowed(&allowed, Some("eve"), 99999));
        assert!(!is_user_allowed(&allowed, None, 99999));
    }

    #[test]
    fn test_parse_text_request() {
        assert_eq!(
            parse_text_request("/today", "focusbot"),
            Some(BotRequest::Command(BotCommand::Today))
        );
        assert_eq!(
            parse_text_request("/addtask gym at 7", "focusbot"),
            Some(BotRequest::Command(BotCommand::AddTask("gym at 7".to_string())))
        );
        assert_eq!(parse_text_request("hello there", "focusbot"), None);
        assert_eq!(parse_text_request("/unknown", "focusbot"), None);
    }

    #[test]
    fn test_keyboard_markup_layout() {
        let keyboard = InlineKeyboard::single_column([
            InlineButton::new("📅 Today", "today"),
            InlineButton::new("📊 Report", "report"),
        ]);
        let markup = keyboard_markup(&keyboard);

        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0].len(), 1);
        assert_eq!(markup.inline_keyboard[1][0].text, "📊 Report");
    }

    #[test]
    fn test_input_file_rejects_bad_url() {
        assert!(matches!(
            input_file(&MediaSource::url("not a url")),
            Err(ChannelError::SendFailed(_))
        ));
        assert!(input_file(&MediaSource::url("https://media.giphy.com/a.gif")).is_ok());
    }

    #[test]
    fn test_map_delete_error() {
        assert!(matches!(
            map_delete_error(RequestError::Api(ApiError::MessageToDeleteNotFound)),
            ChannelError::MessageNotFound
        ));
        assert!(matches!(
            map_delete_error(RequestError::Api(ApiError::MessageCantBeDeleted)),
            ChannelError::MessageNotDeletable(_)
        ));
        assert!(matches!(
            map_delete_error(RequestError::Api(ApiError::BotBlocked)),
            ChannelError::Other(_)
        ));
    }

    #[test]
    fn test_map_send_error() {
        assert!(matches!(
            map_send_error(RequestError::Api(ApiError::ChatNotFound)),
            ChannelError::SendFailed(_)
        ));
    }

    #[test]
    fn test_telegram_channel_creation() {
        let channel = TelegramChannel::new(test_config());
        assert!(channel.update_tx.is_some());
        assert!(channel.update_rx.is_some());
        assert!(!channel.is_running());
    }

    #[tokio::test]
    async fn test_telegram_channel_take_receiver() {
        let mut channel = TelegramChannel::new(test_config());

        assert!(channel.take_update_receiver().is_some());
        assert!(channel.take_update_receiver().is_none());
    }

    #[tokio::test]
    async fn test_stop_closes_update_stream() {
        let mut channel = TelegramChannel::new(test_config());
        let mut rx = channel.take_update_receiver().unwrap();

        channel.stop().await.unwrap();
        assert!(rx.recv().await.is_none());
    }
}
