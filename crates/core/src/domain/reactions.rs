use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const LONG_PRESS_THRESHOLD: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReactionKind {
    Like,
    Love,
    Haha,
    Wow,
    Sad,
    Angry,
}

impl ReactionKind {
    pub const ALL: [ReactionKind; 6] = [
        ReactionKind::Like,
        ReactionKind::Love,
        ReactionKind::Haha,
        ReactionKind::Wow,
        ReactionKind::Sad,
        ReactionKind::Angry,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReactionKind::Like => "LIKE",
            ReactionKind::Love => "LOVE",
            ReactionKind::Haha => "HAHA",
            ReactionKind::Wow => "WOW",
            ReactionKind::Sad => "SAD",
            ReactionKind::Angry => "ANGRY",
        }
    }
}

impl FromStr for ReactionKind {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        ReactionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| CoreError::InvalidReaction(trimmed.to_string()))
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressKind {
    Tap,
    LongPress,
}

pub fn classify_press(held: Duration) -> PressKind {
    if held >= LONG_PRESS_THRESHOLD {
        PressKind::LongPress
    } else {
        PressKind::Tap
    }
}

/// The viewer's reaction on a post and the post's total reaction count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReactionState {
    pub active: Option<ReactionKind>,
    pub count: u64,
}

impl ReactionState {
    pub fn is_liked(&self) -> bool {
        self.active.is_some()
    }

    /// A tap adds or removes the default reaction.
    pub fn quick_toggle(self) -> Self {
        match self.active {
            Some(_) => self.cleared(),
            None => Self {
                active: Some(ReactionKind::Like),
                count: self.count + 1,
            },
        }
    }

    /// Picking a kind from the picker. Re-picking the active kind removes it;
    /// switching kinds keeps the count.
    pub fn select(self, kind: ReactionKind) -> Self {
        match self.active {
            Some(current) if current == kind => self.cleared(),
            Some(_) => Self {
                active: Some(kind),
                count: self.count,
            },
            None => Self {
                active: Some(kind),
                count: self.count + 1,
            },
        }
    }

    fn cleared(self) -> Self {
        Self {
            active: None,
            count: self.count.saturating_sub(1),
        }
    }
}
