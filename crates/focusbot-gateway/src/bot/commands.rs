use teloxide::utils::command::BotCommands;

use crate::channels::{InlineButton, InlineKeyboard};

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Productivity bot commands:")]
pub enum BotCommand {
    #[command(description = "show the menu")]
    Start,
    #[command(description = "show the menu")]
    Help,
    #[command(description = "view today's schedule")]
    Today,
    #[command(description = "add a task, e.g. /addtask dentist tomorrow 11am")]
    AddTask(String),
    #[command(description = "mark a task done")]
    Done(String),
    #[command(description = "mark a task pending")]
    Pending(String),
    #[command(description = "progress report")]
    Report,
    #[command(description = "remove recent bot messages and reset stats")]
    Clear,
}

/// Inline menu buttons and the callback data they carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Today,
    AddTask,
    Report,
    DoneInfo,
    PendingInfo,
    Clear,
}

impl MenuAction {
    pub const ALL: [MenuAction; 6] = [
        MenuAction::Today,
        MenuAction::AddTask,
        MenuAction::Report,
        MenuAction::DoneInfo,
        MenuAction::PendingInfo,
        MenuAction::Clear,
    ];

    pub fn callback_data(self) -> &'static str {
        match self {
            MenuAction::Today => "today",
            MenuAction::AddTask => "add_task",
            MenuAction::Report => "report",
            MenuAction::DoneInfo => "done_info",
            MenuAction::PendingInfo => "pending_info",
            MenuAction::Clear => "clear",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MenuAction::Today => "📅 Today",
            MenuAction::AddTask => "➕ Add Task",
            MenuAction::Report => "📊 Report",
            MenuAction::DoneInfo => "✅ Done",
            MenuAction::PendingInfo => "⏳ Pending",
            MenuAction::Clear => "🗑️ Clear Data",
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.callback_data() == data)
    }

    pub fn button(self) -> InlineButton {
        InlineButton::new(self.label(), self.callback_data())
    }

    pub fn keyboard(actions: &[MenuAction]) -> InlineKeyboard {
        InlineKeyboard::single_column(actions.iter().map(|a| a.button()))
    }
}

/// Everything the bot reacts to, independent of the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotRequest {
    Command(BotCommand),
    Voice { file_id: String },
    Menu(MenuAction),
}
