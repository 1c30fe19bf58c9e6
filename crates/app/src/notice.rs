use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// How long a notice stays up unless dismissed first.
pub const NOTICE_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct NoticeBoard {
    next_id: u64,
    notices: Vec<Notice>,
}

impl NoticeBoard {
    pub fn push(&mut self, level: NoticeLevel, message: String, now: DateTime<Utc>) -> u64 {
        self.next_id += 1;
        self.notices.push(Notice {
            id: self.next_id,
            level,
            message,
            created_at: now,
        });
        self.next_id
    }

    pub fn error(&mut self, message: String) -> u64 {
        self.push(NoticeLevel::Error, message, Utc::now())
    }

    pub fn info(&mut self, message: String) -> u64 {
        self.push(NoticeLevel::Info, message, Utc::now())
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.notices.len();
        self.notices.retain(|notice| notice.id != id);
        self.notices.len() != before
    }

    /// Drops notices past their display window.
    pub fn expire(&mut self, now: DateTime<Utc>) {
        self.notices.retain(|notice| !is_expired(notice, now));
    }

    pub fn all(&self) -> &[Notice] {
        &self.notices
    }
}

fn is_expired(notice: &Notice, now: DateTime<Utc>) -> bool {
    let age = now.signed_duration_since(notice.created_at);
    age.to_std().map_or(false, |age| age >= NOTICE_TTL)
}
