use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use murmur_core::domain::comments::{Comment, CommentForest};
use murmur_core::domain::identity::{UNKNOWN_AUTHOR, UserProfile};
use murmur_core::domain::interaction::{InFlight, InFlightKey, InteractionOutcome};
use murmur_core::domain::posts::Post;
use murmur_core::domain::reactions::{PressKind, ReactionKind, ReactionState, classify_press};
use murmur_core::error::CoreError;
use murmur_core::types::pagination::{Page, PageState};
use murmur_core::types::temp_id::{TempIdGenerator, is_temp_id};
use murmur_infra::profiles::anonymous_authors;
use murmur_infra::{ApiError, LikeState, NewComment, SocialBackend, apply_profiles, resolve_profiles};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::notice::{Notice, NoticeBoard};
use crate::views::{LoadOutcome, report_failure};

/// What a rendered post shows: the post, its comment forest and the inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostSnapshot {
    pub post: Post,
    pub comments: CommentForest,
    pub draft: String,
    pub reply_drafts: HashMap<String, String>,
}

#[derive(Debug)]
struct PostState {
    post: Post,
    comments: CommentForest,
    comment_pages: PageState<String>,
    draft: String,
    reply_drafts: HashMap<String, String>,
    in_flight: InFlight,
    temp_ids: TempIdGenerator,
    notices: NoticeBoard,
    mounted: bool,
}

/// One mounted post with optimistic likes, saves, reactions and comments.
///
/// The lock is never held across a backend call: local state changes first,
/// the call runs unlocked, and the result is applied under a fresh lock. A
/// second trigger of the same action meanwhile sees the in-flight key and is
/// skipped.
#[derive(Clone)]
pub struct PostView {
    backend: Arc<dyn SocialBackend>,
    viewer: UserProfile,
    state: Arc<Mutex<PostState>>,
}

impl PostView {
    pub async fn open(
        backend: Arc<dyn SocialBackend>,
        viewer: UserProfile,
        post_id: &str,
        comments_page_size: u32,
    ) -> Result<Self, PostViewError> {
        let post = backend.get_post(post_id).await?;
        Ok(Self::from_post(backend, viewer, post, comments_page_size)?)
    }

    pub fn from_post(
        backend: Arc<dyn SocialBackend>,
        viewer: UserProfile,
        post: Post,
        comments_page_size: u32,
    ) -> Result<Self, CoreError> {
        let state = PostState {
            post,
            comments: CommentForest::new(),
            comment_pages: PageState::new(comments_page_size)?,
            draft: String::new(),
            reply_drafts: HashMap::new(),
            in_flight: InFlight::default(),
            temp_ids: TempIdGenerator::default(),
            notices: NoticeBoard::default(),
            mounted: true,
        };
        Ok(Self {
            backend,
            viewer,
            state: Arc::new(Mutex::new(state)),
        })
    }

    pub async fn snapshot(&self) -> PostSnapshot {
        let state = self.state.lock().await;
        PostSnapshot {
            post: state.post.clone(),
            comments: state.comments.clone(),
            draft: state.draft.clone(),
            reply_drafts: state.reply_drafts.clone(),
        }
    }

    /// Notices still on screen.
    pub async fn notices(&self) -> Vec<Notice> {
        let mut state = self.state.lock().await;
        state.notices.expire(Utc::now());
        state.notices.all().to_vec()
    }

    pub async fn dismiss_notice(&self, id: u64) -> bool {
        self.state.lock().await.notices.dismiss(id)
    }

    pub async fn is_in_flight(&self, key: &InFlightKey) -> bool {
        self.state.lock().await.in_flight.is_active(key)
    }

    pub async fn has_more_comments(&self) -> bool {
        self.state.lock().await.comment_pages.has_more()
    }

    /// Results of calls still in flight are dropped once the view is gone.
    pub async fn unmount(&self) {
        self.state.lock().await.mounted = false;
    }

    pub async fn set_draft(&self, text: &str) {
        self.state.lock().await.draft = text.to_string();
    }

    pub async fn set_reply_draft(&self, parent_comment_id: &str, text: &str) {
        self.state
            .lock()
            .await
            .reply_drafts
            .insert(parent_comment_id.to_string(), text.to_string());
    }

    pub async fn load_more_comments(&self) -> LoadOutcome {
        let (post_id, request) = {
            let mut state = self.state.lock().await;
            if !state.mounted {
                return LoadOutcome::Skipped;
            }
            let Some(request) = state.comment_pages.begin_load() else {
                return LoadOutcome::Skipped;
            };
            (state.post.id.clone(), request)
        };

        let result = match self.backend.list_comments(&post_id, request).await {
            Ok(mut page) => {
                let user_ids = anonymous_authors(&page.items);
                if !user_ids.is_empty() {
                    let profiles = resolve_profiles(self.backend.as_ref(), &user_ids).await;
                    page.items = apply_profiles(page.items, &profiles);
                }
                Ok(page)
            }
            Err(err) => Err(err),
        };

        let mut state = self.state.lock().await;
        match result {
            Ok(page) => {
                let ids = page.items.iter().map(|comment| comment.id.clone()).collect();
                let count = state.comment_pages.finish_load(
                    Page {
                        items: ids,
                        page: page.page,
                        total: page.total,
                    },
                    String::clone,
                );
                state.comments = state.comments.extend_loaded(page.items);
                LoadOutcome::Loaded(count)
            }
            Err(err) => {
                state.comment_pages.fail_load();
                if !state.mounted {
                    return LoadOutcome::Skipped;
                }
                let message = report_failure(&mut state.notices, "load comments", &err);
                LoadOutcome::Failed { message }
            }
        }
    }

    /// Quick tap on the like button.
    pub async fn toggle_like(&self) -> InteractionOutcome {
        self.react(|before| before.quick_toggle(), false).await
    }

    /// Picking a reaction from the long-press picker.
    pub async fn select_reaction(&self, kind: ReactionKind) -> InteractionOutcome {
        self.react(|before| before.select(kind), true).await
    }

    /// A press on the like button: short presses toggle, long presses open the
    /// picker, where `picked` is the kind chosen (if any).
    pub async fn press_like(
        &self,
        held: Duration,
        picked: Option<ReactionKind>,
    ) -> InteractionOutcome {
        match (classify_press(held), picked) {
            (PressKind::Tap, _) => self.toggle_like().await,
            (PressKind::LongPress, Some(kind)) => self.select_reaction(kind).await,
            (PressKind::LongPress, None) => InteractionOutcome::Skipped,
        }
    }

    async fn react<F>(&self, next: F, picker: bool) -> InteractionOutcome
    where
        F: FnOnce(ReactionState) -> ReactionState,
    {
        let (post_id, before, after) = {
            let mut state = self.state.lock().await;
            let post_id = state.post.id.clone();
            if !state.mounted
                || post_id.is_empty()
                || !state.in_flight.try_begin(InFlightKey::PostLike(post_id.clone()))
            {
                return InteractionOutcome::Skipped;
            }
            let before = state.post.reactions();
            let after = next(before);
            state.post.apply_reactions(after);
            (post_id, before, after)
        };

        let result = if picker {
            self.backend.react_post(&post_id, after.active).await
        } else if after.is_liked() {
            self.backend.like_post(&post_id).await
        } else {
            self.backend.unlike_post(&post_id).await
        };

        let mut state = self.state.lock().await;
        state.in_flight.finish(&InFlightKey::PostLike(post_id.clone()));
        if !state.mounted {
            debug!(post_id = %post_id, "like resolved after unmount");
            return settled(&result);
        }
        match result {
            Ok(LikeState { like_count, .. }) => {
                if let Some(count) = like_count {
                    state.post.like_count = count;
                }
                InteractionOutcome::Confirmed
            }
            Err(err) => {
                state.post.apply_reactions(before);
                let message = report_failure(&mut state.notices, "like post", &err);
                InteractionOutcome::RolledBack { message }
            }
        }
    }

    pub async fn toggle_save(&self) -> InteractionOutcome {
        let (post_id, saved) = {
            let mut state = self.state.lock().await;
            let post_id = state.post.id.clone();
            if !state.mounted
                || post_id.is_empty()
                || !state.in_flight.try_begin(InFlightKey::PostSave(post_id.clone()))
            {
                return InteractionOutcome::Skipped;
            }
            let saved = !state.post.is_saved;
            state.post.is_saved = saved;
            (post_id, saved)
        };

        let result = if saved {
            self.backend.save_post(&post_id).await
        } else {
            self.backend.unsave_post(&post_id).await
        };

        let mut state = self.state.lock().await;
        state.in_flight.finish(&InFlightKey::PostSave(post_id.clone()));
        if !state.mounted {
            debug!(post_id = %post_id, "save resolved after unmount");
            return settled(&result);
        }
        match result {
            Ok(()) => InteractionOutcome::Confirmed,
            Err(err) => {
                state.post.is_saved = !saved;
                let message = report_failure(&mut state.notices, "save post", &err);
                InteractionOutcome::RolledBack { message }
            }
        }
    }

    /// Posts the top-level draft. The placeholder goes on top of the forest
    /// right away and is swapped for the server's copy on success.
    pub async fn submit_comment(&self) -> InteractionOutcome {
        let (post_id, temp_id, attempted, text) = {
            let mut state = self.state.lock().await;
            let post_id = state.post.id.clone();
            let text = state.draft.trim().to_string();
            if !state.mounted || post_id.is_empty() || text.is_empty() {
                return InteractionOutcome::Skipped;
            }
            if !state
                .in_flight
                .try_begin(InFlightKey::PostComment(post_id.clone()))
            {
                return InteractionOutcome::Skipped;
            }
            let attempted = std::mem::take(&mut state.draft);
            let placeholder = self.placeholder(&mut state, text.clone(), None);
            let temp_id = placeholder.id.clone();
            state.comments = state.comments.append_top_level(placeholder);
            state.post.comment_count += 1;
            (post_id, temp_id, attempted, text)
        };

        let request = NewComment {
            text,
            parent_comment_id: None,
        };
        let result = self.backend.create_comment(&post_id, &request).await;

        let mut state = self.state.lock().await;
        state
            .in_flight
            .finish(&InFlightKey::PostComment(post_id.clone()));
        if !state.mounted {
            debug!(post_id = %post_id, "comment resolved after unmount");
            return settled(&result);
        }
        match result {
            Ok(confirmed) => {
                let confirmed = self.confirmed(&state.comments, &temp_id, confirmed, None);
                state.comments = state.comments.replace_by_id(&temp_id, confirmed);
                InteractionOutcome::Confirmed
            }
            Err(err) => {
                state.comments = state.comments.remove_by_id(&temp_id);
                state.post.comment_count = state.post.comment_count.saturating_sub(1);
                if state.draft.is_empty() {
                    state.draft = attempted;
                }
                let message = report_failure(&mut state.notices, "create comment", &err);
                InteractionOutcome::RolledBack { message }
            }
        }
    }

    /// Posts the reply draft kept for `parent_comment_id`. Replying to a reply
    /// attaches to the top-level comment that owns it.
    pub async fn submit_reply(&self, parent_comment_id: &str) -> InteractionOutcome {
        let (post_id, owner_id, temp_id, attempted, text) = {
            let mut state = self.state.lock().await;
            let post_id = state.post.id.clone();
            let text = state
                .reply_drafts
                .get(parent_comment_id)
                .map(|draft| draft.trim().to_string())
                .unwrap_or_default();
            if !state.mounted || post_id.is_empty() || text.is_empty() {
                return InteractionOutcome::Skipped;
            }
            let Some(owner_id) = state.comments.find(parent_comment_id).map(|node| {
                node.parent_comment_id
                    .clone()
                    .unwrap_or_else(|| node.id.clone())
            }) else {
                return InteractionOutcome::Skipped;
            };
            if is_temp_id(&owner_id)
                || !state.in_flight.try_begin(InFlightKey::Reply(owner_id.clone()))
            {
                return InteractionOutcome::Skipped;
            }
            let attempted = state
                .reply_drafts
                .remove(parent_comment_id)
                .unwrap_or_default();
            let placeholder = self.placeholder(&mut state, text.clone(), Some(owner_id.clone()));
            let temp_id = placeholder.id.clone();
            state.comments = state.comments.append_reply(&owner_id, placeholder);
            state.post.comment_count += 1;
            (post_id, owner_id, temp_id, attempted, text)
        };

        let request = NewComment {
            text,
            parent_comment_id: Some(owner_id.clone()),
        };
        let result = self.backend.create_comment(&post_id, &request).await;

        let mut state = self.state.lock().await;
        state.in_flight.finish(&InFlightKey::Reply(owner_id.clone()));
        if !state.mounted {
            debug!(post_id = %post_id, parent = %owner_id, "reply resolved after unmount");
            return settled(&result);
        }
        match result {
            Ok(confirmed) => {
                let confirmed =
                    self.confirmed(&state.comments, &temp_id, confirmed, Some(owner_id));
                state.comments = state.comments.replace_by_id(&temp_id, confirmed);
                InteractionOutcome::Confirmed
            }
            Err(err) => {
                state.comments = state.comments.remove_by_id(&temp_id);
                state.post.comment_count = state.post.comment_count.saturating_sub(1);
                state
                    .reply_drafts
                    .entry(parent_comment_id.to_string())
                    .or_insert(attempted);
                let message = report_failure(&mut state.notices, "create reply", &err);
                InteractionOutcome::RolledBack { message }
            }
        }
    }

    pub async fn toggle_comment_like(&self, comment_id: &str) -> InteractionOutcome {
        let liked = {
            let mut state = self.state.lock().await;
            let Some(node) = state.comments.find(comment_id) else {
                return InteractionOutcome::Skipped;
            };
            if !state.mounted || node.pending {
                return InteractionOutcome::Skipped;
            }
            let liked = !node.is_liked;
            if !state
                .in_flight
                .try_begin(InFlightKey::CommentLike(comment_id.to_string()))
            {
                return InteractionOutcome::Skipped;
            }
            state.comments = state.comments.toggle_like(comment_id, liked);
            liked
        };

        let result = if liked {
            self.backend.like_comment(comment_id).await
        } else {
            self.backend.unlike_comment(comment_id).await
        };

        let mut state = self.state.lock().await;
        state
            .in_flight
            .finish(&InFlightKey::CommentLike(comment_id.to_string()));
        if !state.mounted {
            debug!(comment_id, "comment like resolved after unmount");
            return settled(&result);
        }
        match result {
            Ok(()) => InteractionOutcome::Confirmed,
            Err(err) => {
                state.comments = state.comments.toggle_like(comment_id, !liked);
                let message = report_failure(&mut state.notices, "like comment", &err);
                InteractionOutcome::RolledBack { message }
            }
        }
    }

    fn placeholder(&self, state: &mut PostState, text: String, parent: Option<String>) -> Comment {
        let now = Utc::now();
        let temp_id = state.temp_ids.next_id(now);
        Comment::placeholder(
            temp_id,
            text,
            &self.viewer.identity(),
            self.viewer.avatar_url.clone(),
            parent,
            now,
        )
    }

    /// The server copy may come back without author names; the placeholder
    /// already shows the viewer's, so keep those.
    fn confirmed(
        &self,
        forest: &CommentForest,
        temp_id: &str,
        mut confirmed: Comment,
        parent: Option<String>,
    ) -> Comment {
        if confirmed.author == UNKNOWN_AUTHOR {
            if let Some(placeholder) = forest.find(temp_id) {
                confirmed.author = placeholder.author.clone();
                confirmed.avatar_initials = placeholder.avatar_initials.clone();
                if confirmed.avatar_url.is_none() {
                    confirmed.avatar_url = placeholder.avatar_url.clone();
                }
            }
        }
        if confirmed.parent_comment_id.is_none() {
            confirmed.parent_comment_id = parent;
        }
        confirmed.pending = false;
        confirmed
    }
}

/// Outcome for a call that finished after unmount. Nothing local is touched,
/// so a failure reports `Skipped` rather than a rollback.
fn settled<T>(result: &Result<T, ApiError>) -> InteractionOutcome {
    match result {
        Ok(_) => InteractionOutcome::Confirmed,
        Err(err) => {
            debug!(error = %err, "failure after unmount left unreverted");
            InteractionOutcome::Skipped
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PostViewError {
    #[error("api error: {0}")]
    Api(#[from] ApiError),
    #[error("invalid view: {0}")]
    Core(#[from] CoreError),
}
