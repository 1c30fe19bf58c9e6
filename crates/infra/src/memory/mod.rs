use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use murmur_core::domain::comments::{Comment, CommentForest};
use murmur_core::domain::identity::UserProfile;
use murmur_core::domain::notifications::{Notification, NotificationKind};
use murmur_core::domain::posts::{Post, PostEdit, Privacy};
use murmur_core::domain::reactions::{ReactionKind, ReactionState};
use murmur_core::types::pagination::{Page, PageRequest};
use tokio::sync::{Mutex, Notify, RwLock};
use uuid::Uuid;

use crate::api::{ApiError, ErrorBody};
use crate::backend::{LikeState, NewComment, SocialBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    CurrentUser,
    ListFeed,
    GetPost,
    UpdatePost,
    DeletePost,
    LikePost,
    UnlikePost,
    ReactPost,
    SavePost,
    UnsavePost,
    ListComments,
    CreateComment,
    LikeComment,
    UnlikeComment,
    ProfilesBatch,
    Profile,
    ListNotifications,
    MarkNotificationRead,
}

/// Holds the next call to an endpoint until released.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl Gate {
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[derive(Debug, Default)]
struct Store {
    viewer: UserProfile,
    users: HashMap<String, UserProfile>,
    posts: Vec<Post>,
    comments: HashMap<String, CommentForest>,
    notifications: Vec<Notification>,
}

#[derive(Debug, Default)]
struct Controls {
    failures: HashMap<Endpoint, ErrorBody>,
    gates: HashMap<Endpoint, Gate>,
    calls: HashMap<Endpoint, usize>,
}

/// Backend kept entirely in memory, for offline runs and tests. Posts are
/// stored newest first, comments oldest first, as the server would list them.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    store: RwLock<Store>,
    controls: Mutex<Controls>,
}

impl InMemoryBackend {
    pub fn new(viewer: UserProfile) -> Self {
        let mut store = Store::default();
        store.users.insert(viewer.user_id.clone(), viewer.clone());
        store.viewer = viewer;
        Self {
            store: RwLock::new(store),
            controls: Mutex::new(Controls::default()),
        }
    }

    pub fn with_user(mut self, user: UserProfile) -> Self {
        self.store
            .get_mut()
            .users
            .insert(user.user_id.clone(), user);
        self
    }

    /// Later posts are listed first.
    pub fn with_post(mut self, post: Post) -> Self {
        let store = self.store.get_mut();
        store.comments.entry(post.id.clone()).or_default();
        store.posts.insert(0, post);
        self
    }

    pub fn with_comment(mut self, post_id: &str, comment: Comment) -> Self {
        let forest = self.store.get_mut().comments.entry(post_id.to_string()).or_default();
        *forest = forest.extend_loaded(vec![comment]);
        self
    }

    pub fn with_notification(mut self, notification: Notification) -> Self {
        self.store.get_mut().notifications.insert(0, notification);
        self
    }

    /// A small social graph for offline runs of the CLI.
    pub fn seeded() -> Self {
        let now = Utc::now();
        let viewer = profile("u-1", Some("An"), Some("Nguyen"), "an.nguyen");
        let mut backend = Self::new(viewer)
            .with_user(profile("u-2", Some("Binh"), Some("Tran"), "binh"))
            .with_user(profile("u-3", None, None, "jdoe"));
        for (idx, (author, content)) in [
            ("u-2", "First light over the harbour this morning."),
            ("u-3", "Anyone up for a code review swap?"),
            ("u-1", "Shipped the new comment threads today."),
        ]
        .into_iter()
        .enumerate()
        {
            let created_at = now - Duration::hours(6 - idx as i64 * 2);
            let post = {
                let store = backend.store.get_mut();
                let user = store.users.get(author).cloned().unwrap_or_default();
                let identity = user.identity();
                Post {
                    id: format!("p-{}", idx + 1),
                    author_id: Some(user.user_id.clone()),
                    author: identity.name,
                    avatar_url: user.avatar_url.clone(),
                    avatar_initials: identity.initials,
                    content: content.to_string(),
                    media: Vec::new(),
                    privacy: Privacy::Public,
                    like_count: idx as u64 * 3,
                    comment_count: 0,
                    is_liked: false,
                    is_saved: false,
                    reaction: None,
                    created_at,
                    updated_at: None,
                }
            };
            backend = backend.with_post(post);
        }
        {
            let store = backend.store.get_mut();
            let author = store.users.get("u-2").cloned().unwrap_or_default();
            let replier = store.users.get("u-3").cloned().unwrap_or_default();
            let root = comment_by(&author, "c-1", "Looks great!", None, now - Duration::hours(1));
            let reply = comment_by(&replier, "c-2", "Agreed.", Some("c-1"), now - Duration::minutes(30));
            let forest = CommentForest::new()
                .extend_loaded(vec![root])
                .append_reply("c-1", reply);
            store.comments.insert("p-3".to_string(), forest);
            if let Some(post) = store.posts.iter_mut().find(|post| post.id == "p-3") {
                post.comment_count = 2;
            }
            for idx in 0..12 {
                store.notifications.insert(
                    0,
                    Notification {
                        id: format!("n-{}", idx + 1),
                        kind: if idx % 2 == 0 {
                            NotificationKind::Reaction
                        } else {
                            NotificationKind::Comment
                        },
                        message: format!("Activity #{} on your post", idx + 1),
                        actor: Some(author.identity().name),
                        post_id: Some("p-3".to_string()),
                        created_at: now - Duration::minutes(120 - idx as i64 * 10),
                        is_read: idx < 4,
                    },
                );
            }
        }
        backend
    }

    /// Every later call to `endpoint` fails with a 500 carrying `body`.
    pub async fn fail(&self, endpoint: Endpoint, body: ErrorBody) {
        self.controls.lock().await.failures.insert(endpoint, body);
    }

    pub async fn recover(&self, endpoint: Endpoint) {
        self.controls.lock().await.failures.remove(&endpoint);
    }

    /// The next call to `endpoint` blocks until the returned gate is released.
    pub async fn hold(&self, endpoint: Endpoint) -> Gate {
        let gate = Gate::default();
        self.controls
            .lock()
            .await
            .gates
            .insert(endpoint, gate.clone());
        gate
    }

    pub async fn calls(&self, endpoint: Endpoint) -> usize {
        self.controls
            .lock()
            .await
            .calls
            .get(&endpoint)
            .copied()
            .unwrap_or(0)
    }

    pub async fn post(&self, post_id: &str) -> Option<Post> {
        let store = self.store.read().await;
        store.posts.iter().find(|post| post.id == post_id).cloned()
    }

    pub async fn comments(&self, post_id: &str) -> CommentForest {
        let store = self.store.read().await;
        store.comments.get(post_id).cloned().unwrap_or_default()
    }

    async fn enter(&self, endpoint: Endpoint) -> Result<(), ApiError> {
        let gate = {
            let mut controls = self.controls.lock().await;
            *controls.calls.entry(endpoint).or_default() += 1;
            controls.gates.remove(&endpoint)
        };
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        let controls = self.controls.lock().await;
        match controls.failures.get(&endpoint) {
            Some(body) => Err(ApiError::Status {
                status: 500,
                body: body.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn profile(id: &str, first: Option<&str>, last: Option<&str>, username: &str) -> UserProfile {
    UserProfile {
        user_id: id.to_string(),
        first_name: first.map(str::to_string),
        last_name: last.map(str::to_string),
        username: Some(username.to_string()),
        avatar_url: None,
    }
}

fn comment_by(
    user: &UserProfile,
    id: &str,
    text: &str,
    parent: Option<&str>,
    created_at: chrono::DateTime<Utc>,
) -> Comment {
    let identity = user.identity();
    Comment {
        id: id.to_string(),
        text: text.to_string(),
        author: identity.name,
        avatar_url: user.avatar_url.clone(),
        avatar_initials: identity.initials,
        user_id: Some(user.user_id.clone()),
        created_at,
        like_count: 0,
        is_liked: false,
        parent_comment_id: parent.map(str::to_string),
        replies: Vec::new(),
        reply_count: 0,
        pending: false,
    }
}

fn page_of<T: Clone>(items: &[T], request: PageRequest) -> Page<T> {
    let start = (request.page as usize).saturating_mul(request.size as usize);
    let end = start.saturating_add(request.size as usize).min(items.len());
    let slice = if start < items.len() {
        items[start..end].to_vec()
    } else {
        Vec::new()
    };
    Page {
        items: slice,
        page: request.page,
        total: items.len(),
    }
}

fn not_found(what: &str, id: &str) -> ApiError {
    ApiError::NotFound(format!("{what} {id}"))
}

impl Store {
    fn post_mut(&mut self, post_id: &str) -> Result<&mut Post, ApiError> {
        self.posts
            .iter_mut()
            .find(|post| post.id == post_id)
            .ok_or_else(|| not_found("post", post_id))
    }

    fn apply_reaction(&mut self, post_id: &str, reaction: Option<ReactionKind>) -> Result<LikeState, ApiError> {
        let post = self.post_mut(post_id)?;
        let current = post.reactions();
        let next = match reaction {
            Some(kind) => ReactionState {
                active: Some(kind),
                count: if current.is_liked() {
                    current.count
                } else {
                    current.count + 1
                },
            },
            None => ReactionState {
                active: None,
                count: if current.is_liked() {
                    current.count.saturating_sub(1)
                } else {
                    current.count
                },
            },
        };
        post.apply_reactions(next);
        Ok(LikeState {
            liked: post.is_liked,
            like_count: Some(post.like_count),
            reaction: post.reaction,
        })
    }

    fn comment_post_id(&self, comment_id: &str) -> Option<String> {
        self.comments
            .iter()
            .find(|(_, forest)| forest.find(comment_id).is_some())
            .map(|(post_id, _)| post_id.clone())
    }

    fn set_comment_like(&mut self, comment_id: &str, liked: bool) -> Result<(), ApiError> {
        let post_id = self
            .comment_post_id(comment_id)
            .ok_or_else(|| not_found("comment", comment_id))?;
        if let Some(forest) = self.comments.get_mut(&post_id) {
            let unchanged = forest
                .find(comment_id)
                .is_some_and(|node| node.is_liked == liked);
            if !unchanged {
                *forest = forest.toggle_like(comment_id, liked);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SocialBackend for InMemoryBackend {
    async fn current_user(&self) -> Result<UserProfile, ApiError> {
        self.enter(Endpoint::CurrentUser).await?;
        Ok(self.store.read().await.viewer.clone())
    }

    async fn list_feed(&self, request: PageRequest) -> Result<Page<Post>, ApiError> {
        self.enter(Endpoint::ListFeed).await?;
        Ok(page_of(&self.store.read().await.posts, request))
    }

    async fn get_post(&self, post_id: &str) -> Result<Post, ApiError> {
        self.enter(Endpoint::GetPost).await?;
        self.post(post_id).await.ok_or_else(|| not_found("post", post_id))
    }

    async fn update_post(&self, post_id: &str, edit: &PostEdit) -> Result<Post, ApiError> {
        self.enter(Endpoint::UpdatePost).await?;
        let mut store = self.store.write().await;
        let post = store.post_mut(post_id)?;
        post.apply_edit(edit);
        post.updated_at = Some(Utc::now());
        Ok(post.clone())
    }

    async fn delete_post(&self, post_id: &str) -> Result<(), ApiError> {
        self.enter(Endpoint::DeletePost).await?;
        let mut store = self.store.write().await;
        let before = store.posts.len();
        store.posts.retain(|post| post.id != post_id);
        if store.posts.len() == before {
            return Err(not_found("post", post_id));
        }
        store.comments.remove(post_id);
        Ok(())
    }

    async fn like_post(&self, post_id: &str) -> Result<LikeState, ApiError> {
        self.enter(Endpoint::LikePost).await?;
        let mut store = self.store.write().await;
        let current = store.post_mut(post_id)?.reaction;
        store.apply_reaction(post_id, Some(current.unwrap_or(ReactionKind::Like)))
    }

    async fn unlike_post(&self, post_id: &str) -> Result<LikeState, ApiError> {
        self.enter(Endpoint::UnlikePost).await?;
        self.store.write().await.apply_reaction(post_id, None)
    }

    async fn react_post(
        &self,
        post_id: &str,
        reaction: Option<ReactionKind>,
    ) -> Result<LikeState, ApiError> {
        self.enter(Endpoint::ReactPost).await?;
        self.store.write().await.apply_reaction(post_id, reaction)
    }

    async fn save_post(&self, post_id: &str) -> Result<(), ApiError> {
        self.enter(Endpoint::SavePost).await?;
        self.store.write().await.post_mut(post_id)?.is_saved = true;
        Ok(())
    }

    async fn unsave_post(&self, post_id: &str) -> Result<(), ApiError> {
        self.enter(Endpoint::UnsavePost).await?;
        self.store.write().await.post_mut(post_id)?.is_saved = false;
        Ok(())
    }

    async fn list_comments(
        &self,
        post_id: &str,
        request: PageRequest,
    ) -> Result<Page<Comment>, ApiError> {
        self.enter(Endpoint::ListComments).await?;
        let store = self.store.read().await;
        let forest = store
            .comments
            .get(post_id)
            .ok_or_else(|| not_found("post", post_id))?;
        let roots: Vec<Comment> = forest.iter().map(|node| Comment::clone(node)).collect();
        Ok(page_of(&roots, request))
    }

    async fn create_comment(
        &self,
        post_id: &str,
        comment: &NewComment,
    ) -> Result<Comment, ApiError> {
        self.enter(Endpoint::CreateComment).await?;
        let mut store = self.store.write().await;
        let forest = store
            .comments
            .get(post_id)
            .cloned()
            .ok_or_else(|| not_found("post", post_id))?;
        let owner = match comment.parent_comment_id.as_deref() {
            None => None,
            Some(parent_id) => {
                let parent = forest
                    .find(parent_id)
                    .ok_or_else(|| not_found("comment", parent_id))?;
                Some(
                    parent
                        .parent_comment_id
                        .clone()
                        .unwrap_or_else(|| parent.id.clone()),
                )
            }
        };
        let viewer = store.viewer.clone();
        let created = comment_by(
            &viewer,
            &format!("c-{}", Uuid::new_v4()),
            &comment.text,
            owner.as_deref(),
            Utc::now(),
        );
        let updated = match owner.as_deref() {
            Some(owner) => forest.append_reply(owner, created.clone()),
            None => forest.extend_loaded(vec![created.clone()]),
        };
        store.comments.insert(post_id.to_string(), updated);
        store.post_mut(post_id)?.comment_count += 1;
        Ok(created)
    }

    async fn like_comment(&self, comment_id: &str) -> Result<(), ApiError> {
        self.enter(Endpoint::LikeComment).await?;
        self.store.write().await.set_comment_like(comment_id, true)
    }

    async fn unlike_comment(&self, comment_id: &str) -> Result<(), ApiError> {
        self.enter(Endpoint::UnlikeComment).await?;
        self.store.write().await.set_comment_like(comment_id, false)
    }

    async fn fetch_profiles_batch(
        &self,
        user_ids: &[String],
    ) -> Result<Vec<UserProfile>, ApiError> {
        self.enter(Endpoint::ProfilesBatch).await?;
        let store = self.store.read().await;
        Ok(user_ids
            .iter()
            .filter_map(|id| store.users.get(id).cloned())
            .collect())
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<UserProfile, ApiError> {
        self.enter(Endpoint::Profile).await?;
        let store = self.store.read().await;
        store
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| not_found("user", user_id))
    }

    async fn list_notifications(
        &self,
        request: PageRequest,
    ) -> Result<Page<Notification>, ApiError> {
        self.enter(Endpoint::ListNotifications).await?;
        Ok(page_of(&self.store.read().await.notifications, request))
    }

    async fn mark_notification_read(&self, notification_id: &str) -> Result<(), ApiError> {
        self.enter(Endpoint::MarkNotificationRead).await?;
        let mut store = self.store.write().await;
        let notification = store
            .notifications
            .iter_mut()
            .find(|notification| notification.id == notification_id)
            .ok_or_else(|| not_found("notification", notification_id))?;
        notification.is_read = true;
        Ok(())
    }
}
