use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    Reaction,
    Comment,
    Reply,
    Share,
    FriendRequest,
    Mention,
    Other,
}

impl NotificationKind {
    pub fn from_type(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "LIKE" | "REACTION" => NotificationKind::Reaction,
            "COMMENT" => NotificationKind::Comment,
            "REPLY" => NotificationKind::Reply,
            "SHARE" => NotificationKind::Share,
            "FRIEND_REQUEST" => NotificationKind::FriendRequest,
            "MENTION" => NotificationKind::Mention,
            _ => NotificationKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub message: String,
    pub actor: Option<String>,
    pub post_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

#[cfg(test)]
mod tests {
    use super::NotificationKind;

    #[test]
    fn kind_from_type_is_lenient() {
        assert_eq!(NotificationKind::from_type("like"), NotificationKind::Reaction);
        assert_eq!(
            NotificationKind::from_type("FRIEND_REQUEST"),
            NotificationKind::FriendRequest
        );
        assert_eq!(NotificationKind::from_type("poke"), NotificationKind::Other);
    }
}
