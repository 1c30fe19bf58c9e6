use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::reactions::{ReactionKind, ReactionState};
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Privacy {
    #[default]
    Public,
    Friends,
    Private,
}

impl Privacy {
    pub fn as_str(self) -> &'static str {
        match self {
            Privacy::Public => "PUBLIC",
            Privacy::Friends => "FRIENDS",
            Privacy::Private => "PRIVATE",
        }
    }
}

impl FromStr for Privacy {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PUBLIC" => Ok(Privacy::Public),
            "FRIENDS" => Ok(Privacy::Friends),
            "PRIVATE" => Ok(Privacy::Private),
            _ => Err(CoreError::InvalidPrivacy(value.to_string())),
        }
    }
}

impl fmt::Display for Privacy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

impl MediaKind {
    /// Accepts both bare kinds (`image`) and mime types (`video/mp4`).
    pub fn from_type(value: &str) -> Self {
        let lowered = value.trim().to_ascii_lowercase();
        let head = lowered.split('/').next().unwrap_or_default();
        match head {
            "image" => MediaKind::Image,
            "video" => MediaKind::Video,
            _ => MediaKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaItem {
    pub url: String,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub id: String,
    pub author_id: Option<String>,
    pub author: String,
    pub avatar_url: Option<String>,
    pub avatar_initials: String,
    pub content: String,
    pub media: Vec<MediaItem>,
    pub privacy: Privacy,
    pub like_count: u64,
    pub comment_count: u64,
    pub is_liked: bool,
    pub is_saved: bool,
    pub reaction: Option<ReactionKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn reactions(&self) -> ReactionState {
        ReactionState {
            active: self.reaction,
            count: self.like_count,
        }
    }

    pub fn apply_reactions(&mut self, state: ReactionState) {
        self.reaction = state.active;
        self.is_liked = state.is_liked();
        self.like_count = state.count;
    }

    pub fn apply_edit(&mut self, edit: &PostEdit) {
        self.content = edit.content.clone();
        self.privacy = edit.privacy;
    }

    pub fn edit_snapshot(&self) -> PostEdit {
        PostEdit {
            content: self.content.clone(),
            privacy: self.privacy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostEdit {
    pub content: String,
    pub privacy: Privacy,
}
