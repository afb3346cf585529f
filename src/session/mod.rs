use crate::chart::ChartSpec;
use crate::export::ExportData;
use chrono::{DateTime, Local};

pub mod chat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Bot,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub label: String,
    pub present: u64,
    pub absent: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSpec {
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attachments {
    pub table: Option<TableSpec>,
    pub chart: Option<ChartSpec>,
}

/// One transcript entry. Messages are never edited after they are appended.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: u64,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Local>,
    pub attachments: Attachments,
    pub is_error: bool,
    pub export: Option<ExportData>,
    pub share_date: Option<String>,
}

impl Message {
    pub fn user(id: u64, text: impl Into<String>) -> Self {
        Self::plain(id, Role::User, text.into(), false)
    }

    pub fn bot(id: u64, text: impl Into<String>) -> Self {
        Self::plain(id, Role::Bot, text.into(), false)
    }

    pub fn bot_error(id: u64, text: impl Into<String>) -> Self {
        Self::plain(id, Role::Bot, text.into(), true)
    }

    fn plain(id: u64, role: Role, text: String, is_error: bool) -> Self {
        Self {
            id,
            role,
            text,
            timestamp: Local::now(),
            attachments: Attachments::default(),
            is_error,
            export: None,
            share_date: None,
        }
    }

    pub fn chart_mount(&self) -> String {
        format!("chat-chart-{}", self.id)
    }

    /// Whether the export/share actions apply to this message.
    pub fn has_actions(&self) -> bool {
        self.role == Role::Bot
            && (self.attachments.table.is_some()
                || self.attachments.chart.is_some()
                || self.export.is_some())
    }
}

/// A transcript slot: either a real message or the in-flight typing placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Message(Message),
    Typing,
}
