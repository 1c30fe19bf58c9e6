use async_trait::async_trait;
use murmur_core::domain::comments::Comment;
use murmur_core::domain::identity::UserProfile;
use murmur_core::domain::notifications::Notification;
use murmur_core::domain::posts::{Post, PostEdit};
use murmur_core::domain::reactions::ReactionKind;
use murmur_core::types::pagination::{Page, PageRequest};

use crate::api::ApiError;

/// Like state echoed by the backend. `like_count` is authoritative when
/// present; otherwise the optimistic count stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LikeState {
    pub liked: bool,
    pub like_count: Option<u64>,
    pub reaction: Option<ReactionKind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub text: String,
    pub parent_comment_id: Option<String>,
}

/// Everything the views need from the backend. The REST client and the
/// in-memory store both implement it and are interchangeable.
#[async_trait]
pub trait SocialBackend: Send + Sync {
    async fn current_user(&self) -> Result<UserProfile, ApiError>;

    async fn list_feed(&self, request: PageRequest) -> Result<Page<Post>, ApiError>;
    async fn get_post(&self, post_id: &str) -> Result<Post, ApiError>;
    async fn update_post(&self, post_id: &str, edit: &PostEdit) -> Result<Post, ApiError>;
    async fn delete_post(&self, post_id: &str) -> Result<(), ApiError>;

    async fn like_post(&self, post_id: &str) -> Result<LikeState, ApiError>;
    async fn unlike_post(&self, post_id: &str) -> Result<LikeState, ApiError>;
    async fn react_post(
        &self,
        post_id: &str,
        reaction: Option<ReactionKind>,
    ) -> Result<LikeState, ApiError>;
    async fn save_post(&self, post_id: &str) -> Result<(), ApiError>;
    async fn unsave_post(&self, post_id: &str) -> Result<(), ApiError>;

    async fn list_comments(
        &self,
        post_id: &str,
        request: PageRequest,
    ) -> Result<Page<Comment>, ApiError>;
    async fn create_comment(&self, post_id: &str, comment: &NewComment)
    -> Result<Comment, ApiError>;
    async fn like_comment(&self, comment_id: &str) -> Result<(), ApiError>;
    async fn unlike_comment(&self, comment_id: &str) -> Result<(), ApiError>;

    async fn fetch_profiles_batch(&self, user_ids: &[String])
    -> Result<Vec<UserProfile>, ApiError>;
    async fn fetch_profile(&self, user_id: &str) -> Result<UserProfile, ApiError>;

    async fn list_notifications(
        &self,
        request: PageRequest,
    ) -> Result<Page<Notification>, ApiError>;
    async fn mark_notification_read(&self, notification_id: &str) -> Result<(), ApiError>;
}
