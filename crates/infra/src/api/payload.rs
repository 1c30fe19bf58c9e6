//! Raw backend payloads and their one-time normalization into core entities.
//!
//! The backend is not consistent about field names (`content` vs `text`,
//! `avatar` vs `userAvatar` vs a nested `user.avatar`, paged vs bare lists),
//! so every fallback chain lives here and nowhere else. Alternative names are
//! separate fields rather than serde aliases: a payload may carry several of
//! them at once, and the first one present wins.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use murmur_core::domain::comments::Comment;
use murmur_core::domain::identity::{UserProfile, display_identity};
use murmur_core::domain::notifications::{Notification, NotificationKind};
use murmur_core::domain::posts::{MediaItem, MediaKind, Post};
use murmur_core::domain::reactions::ReactionKind;
use murmur_core::types::pagination::{Page, PageRequest};
use serde::Deserialize;

use crate::api::ApiError;
use crate::backend::LikeState;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    pub fn into_string(self) -> String {
        match self {
            RawId::Text(value) => value,
            RawId::Number(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawUser {
    pub id: Option<RawId>,
    pub user_id: Option<RawId>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub avatar_url: Option<String>,
}

impl RawUser {
    pub fn into_profile(self) -> Result<UserProfile, ApiError> {
        let user_id = self
            .user_id
            .or(self.id)
            .ok_or_else(|| ApiError::InvalidResponse("profile without id".to_string()))?
            .into_string();
        Ok(UserProfile {
            user_id,
            first_name: self.first_name,
            last_name: self.last_name,
            username: self.username,
            avatar_url: first_present([self.avatar, self.avatar_url]),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawMedia {
    Url(String),
    Item {
        url: String,
        #[serde(default, rename = "type")]
        kind: Option<String>,
        #[serde(default, rename = "mediaType")]
        media_type: Option<String>,
    },
}

impl RawMedia {
    fn into_media(self) -> MediaItem {
        match self {
            RawMedia::Url(url) => {
                let kind = kind_from_extension(&url);
                MediaItem { url, kind }
            }
            RawMedia::Item {
                url,
                kind,
                media_type,
            } => {
                let kind = match kind.or(media_type) {
                    Some(kind) => MediaKind::from_type(&kind),
                    None => kind_from_extension(&url),
                };
                MediaItem { url, kind }
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPost {
    pub id: Option<RawId>,
    pub content: Option<String>,
    pub text: Option<String>,
    pub media: Vec<RawMedia>,
    pub images: Vec<RawMedia>,
    pub privacy: Option<String>,
    pub like_count: Option<u64>,
    pub likes_count: Option<u64>,
    pub reaction_count: Option<u64>,
    pub comment_count: Option<u64>,
    pub comments_count: Option<u64>,
    pub is_liked: Option<bool>,
    pub is_saved: Option<bool>,
    pub reaction: Option<String>,
    pub reaction_type: Option<String>,
    pub user_reaction: Option<String>,
    pub user_id: Option<RawId>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub user_avatar: Option<String>,
    pub avatar: Option<String>,
    pub user: Option<RawUser>,
    pub author: Option<RawUser>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl RawPost {
    pub fn into_post(self) -> Result<Post, ApiError> {
        let id = self
            .id
            .ok_or_else(|| ApiError::InvalidResponse("post without id".to_string()))?
            .into_string();
        let user = self.user.or(self.author).unwrap_or_default();
        let identity = display_identity(
            self.first_name.as_deref().or(user.first_name.as_deref()),
            self.last_name.as_deref().or(user.last_name.as_deref()),
            self.username.as_deref().or(user.username.as_deref()),
        );
        let avatar_url = first_present([self.user_avatar, self.avatar, user.avatar, user.avatar_url]);
        let author_id = self.user_id.or(user.user_id).or(user.id).map(RawId::into_string);
        let media = if self.media.is_empty() { self.images } else { self.media };

        let parsed_reaction = first_some([self.reaction, self.reaction_type, self.user_reaction])
            .and_then(|value| value.parse::<ReactionKind>().ok());
        let is_liked = self.is_liked.unwrap_or(parsed_reaction.is_some());
        let reaction = if is_liked {
            parsed_reaction.or(Some(ReactionKind::Like))
        } else {
            None
        };

        Ok(Post {
            id,
            author_id,
            author: identity.name,
            avatar_url,
            avatar_initials: identity.initials,
            content: self.content.or(self.text).unwrap_or_default(),
            media: media.into_iter().map(RawMedia::into_media).collect(),
            privacy: self
                .privacy
                .and_then(|value| value.parse().ok())
                .unwrap_or_default(),
            like_count: first_some([self.like_count, self.likes_count, self.reaction_count])
                .unwrap_or(0),
            comment_count: self.comment_count.or(self.comments_count).unwrap_or(0),
            is_liked,
            is_saved: self.is_saved.unwrap_or(false),
            reaction,
            created_at: timestamp_or_now(self.created_at.as_deref())?,
            updated_at: self.updated_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawComment {
    pub id: Option<RawId>,
    pub content: Option<String>,
    pub text: Option<String>,
    pub user_id: Option<RawId>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub user_avatar: Option<String>,
    pub avatar: Option<String>,
    pub user: Option<RawUser>,
    pub author: Option<RawUser>,
    pub created_at: Option<String>,
    pub like_count: Option<u64>,
    pub likes_count: Option<u64>,
    pub is_liked: Option<bool>,
    pub parent_comment_id: Option<RawId>,
    pub parent_id: Option<RawId>,
    pub replies: Vec<RawComment>,
    pub reply_count: Option<u64>,
    pub replies_count: Option<u64>,
}

impl RawComment {
    /// Replies nested deeper than one level are flattened under the owning
    /// top-level comment, in arrival order.
    pub fn into_comment(mut self) -> Result<Comment, ApiError> {
        let nested = std::mem::take(&mut self.replies);
        let reported = self.reply_count.take().or(self.replies_count.take());
        let mut comment = self.into_leaf(None)?;
        let mut replies = Vec::with_capacity(nested.len());
        collect_replies(nested, &comment.id, &mut replies)?;
        let loaded = replies.len() as u64;
        comment.reply_count = reported.map_or(loaded, |count| count.max(loaded));
        comment.replies = replies;
        Ok(comment)
    }

    fn into_leaf(self, owner_id: Option<&str>) -> Result<Comment, ApiError> {
        let id = self
            .id
            .ok_or_else(|| ApiError::InvalidResponse("comment without id".to_string()))?
            .into_string();
        let user = self.user.or(self.author).unwrap_or_default();
        let identity = display_identity(
            self.first_name.as_deref().or(user.first_name.as_deref()),
            self.last_name.as_deref().or(user.last_name.as_deref()),
            self.username.as_deref().or(user.username.as_deref()),
        );
        let parent_comment_id = match owner_id {
            Some(owner) => Some(owner.to_string()),
            None => self.parent_comment_id.or(self.parent_id).map(RawId::into_string),
        };
        Ok(Comment {
            id,
            text: self.content.or(self.text).unwrap_or_default(),
            author: identity.name,
            avatar_url: first_present([self.user_avatar, self.avatar, user.avatar, user.avatar_url]),
            avatar_initials: identity.initials,
            user_id: self.user_id.or(user.user_id).or(user.id).map(RawId::into_string),
            created_at: timestamp_or_now(self.created_at.as_deref())?,
            like_count: self.like_count.or(self.likes_count).unwrap_or(0),
            is_liked: self.is_liked.unwrap_or(false),
            parent_comment_id,
            replies: Vec::new(),
            reply_count: 0,
            pending: false,
        })
    }
}

fn collect_replies(
    raw: Vec<RawComment>,
    owner_id: &str,
    out: &mut Vec<Arc<Comment>>,
) -> Result<(), ApiError> {
    for mut reply in raw {
        let nested = std::mem::take(&mut reply.replies);
        out.push(Arc::new(reply.into_leaf(Some(owner_id))?));
        collect_replies(nested, owner_id, out)?;
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawNotification {
    pub id: Option<RawId>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub notification_type: Option<String>,
    pub message: Option<String>,
    pub content: Option<String>,
    pub actor: Option<RawUser>,
    pub actor_name: Option<String>,
    pub post_id: Option<RawId>,
    pub created_at: Option<String>,
    pub is_read: Option<bool>,
    pub read: Option<bool>,
}

impl RawNotification {
    pub fn into_notification(self) -> Result<Notification, ApiError> {
        let id = self
            .id
            .ok_or_else(|| ApiError::InvalidResponse("notification without id".to_string()))?
            .into_string();
        let actor = match (self.actor_name, self.actor) {
            (Some(name), _) if !name.trim().is_empty() => Some(name),
            (_, Some(actor)) => Some(
                display_identity(
                    actor.first_name.as_deref(),
                    actor.last_name.as_deref(),
                    actor.username.as_deref(),
                )
                .name,
            ),
            _ => None,
        };
        Ok(Notification {
            id,
            kind: NotificationKind::from_type(
                self.kind.or(self.notification_type).as_deref().unwrap_or_default(),
            ),
            message: self.message.or(self.content).unwrap_or_default(),
            actor,
            post_id: self.post_id.map(RawId::into_string),
            created_at: timestamp_or_now(self.created_at.as_deref())?,
            is_read: self.is_read.or(self.read).unwrap_or(false),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawLikeState {
    pub liked: Option<bool>,
    pub is_liked: Option<bool>,
    pub like_count: Option<u64>,
    pub likes_count: Option<u64>,
    pub reaction: Option<String>,
    pub reaction_type: Option<String>,
}

impl RawLikeState {
    pub fn into_like_state(self, expected: bool) -> LikeState {
        LikeState {
            liked: self.liked.or(self.is_liked).unwrap_or(expected),
            like_count: self.like_count.or(self.likes_count),
            reaction: self
                .reaction
                .or(self.reaction_type)
                .and_then(|value| value.parse().ok()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawPage<T> {
    Bare(Vec<T>),
    Paged(RawPaged<T>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPaged<T> {
    items: Option<Vec<T>>,
    content: Option<Vec<T>>,
    data: Option<Vec<T>>,
    page: Option<u32>,
    number: Option<u32>,
    total: Option<usize>,
    total_elements: Option<usize>,
    total_count: Option<usize>,
}

impl<T> RawPage<T> {
    pub fn into_page<U, F>(self, request: PageRequest, mut convert: F) -> Result<Page<U>, ApiError>
    where
        F: FnMut(T) -> Result<U, ApiError>,
    {
        let (raw_items, page, total) = match self {
            RawPage::Bare(items) => (items, None, None),
            RawPage::Paged(paged) => {
                let items = first_some([paged.items, paged.content, paged.data]).ok_or_else(|| {
                    ApiError::InvalidResponse("page without items".to_string())
                })?;
                let total = first_some([paged.total, paged.total_elements, paged.total_count]);
                (items, paged.page.or(paged.number), total)
            }
        };
        let mut items = Vec::with_capacity(raw_items.len());
        for raw in raw_items {
            items.push(convert(raw)?);
        }
        let offset = request.page as usize * request.size as usize;
        // Without a total, a full page suggests there may be another one.
        let total = total.unwrap_or_else(|| {
            let seen = offset + items.len();
            if items.len() >= request.size as usize {
                seen + 1
            } else {
                seen
            }
        });
        Ok(Page {
            items,
            page: page.unwrap_or(request.page),
            total,
        })
    }
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| ApiError::InvalidResponse(format!("invalid timestamp: {value}")))
}

fn timestamp_or_now(value: Option<&str>) -> Result<DateTime<Utc>, ApiError> {
    match value {
        Some(value) => parse_timestamp(value),
        None => Ok(Utc::now()),
    }
}

fn first_some<T, const N: usize>(candidates: [Option<T>; N]) -> Option<T> {
    candidates.into_iter().flatten().next()
}

fn first_present<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
}

fn kind_from_extension(url: &str) -> MediaKind {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let extension = path.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match extension.as_str() {
        "mp4" | "webm" | "mov" | "m4v" => MediaKind::Video,
        "jpg" | "jpeg" | "png" | "gif" | "webp" | "avif" => MediaKind::Image,
        _ => MediaKind::Other,
    }
}
