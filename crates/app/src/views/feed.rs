use std::sync::Arc;

use chrono::Utc;
use murmur_core::domain::identity::UserProfile;
use murmur_core::domain::interaction::{InFlight, InFlightKey, InteractionOutcome};
use murmur_core::domain::posts::{Post, PostEdit};
use murmur_core::error::CoreError;
use murmur_core::types::pagination::PageState;
use murmur_infra::SocialBackend;
use tokio::sync::Mutex;
use tracing::info;

use crate::notice::{Notice, NoticeBoard};
use crate::views::post::{PostView, PostViewError};
use crate::views::{LoadOutcome, report_failure};

#[derive(Debug)]
struct FeedState {
    pages: PageState<Post>,
    in_flight: InFlight,
    notices: NoticeBoard,
}

/// Paged list of posts with optimistic edit and delete.
#[derive(Clone)]
pub struct FeedView {
    backend: Arc<dyn SocialBackend>,
    viewer: UserProfile,
    comments_page_size: u32,
    state: Arc<Mutex<FeedState>>,
}

impl FeedView {
    pub fn new(
        backend: Arc<dyn SocialBackend>,
        viewer: UserProfile,
        page_size: u32,
        comments_page_size: u32,
    ) -> Result<Self, CoreError> {
        if comments_page_size == 0 {
            return Err(CoreError::InvalidPageSize(comments_page_size));
        }
        let state = FeedState {
            pages: PageState::new(page_size)?,
            in_flight: InFlight::default(),
            notices: NoticeBoard::default(),
        };
        Ok(Self {
            backend,
            viewer,
            comments_page_size,
            state: Arc::new(Mutex::new(state)),
        })
    }

    pub async fn posts(&self) -> Vec<Post> {
        self.state.lock().await.pages.items().to_vec()
    }

    pub async fn has_more(&self) -> bool {
        self.state.lock().await.pages.has_more()
    }

    pub async fn total_count(&self) -> usize {
        self.state.lock().await.pages.total_count()
    }

    /// Notices still on screen.
    pub async fn notices(&self) -> Vec<Notice> {
        let mut state = self.state.lock().await;
        state.notices.expire(Utc::now());
        state.notices.all().to_vec()
    }

    pub async fn load_more(&self) -> LoadOutcome {
        let Some(request) = self.state.lock().await.pages.begin_load() else {
            return LoadOutcome::Skipped;
        };
        let result = self.backend.list_feed(request).await;
        let mut state = self.state.lock().await;
        match result {
            Ok(page) => {
                let count = state.pages.finish_load(page, |post| post.id.clone());
                LoadOutcome::Loaded(count)
            }
            Err(err) => {
                state.pages.fail_load();
                let message = report_failure(&mut state.notices, "load feed", &err);
                LoadOutcome::Failed { message }
            }
        }
    }

    /// Applies the edit locally, then replaces the post with the server's
    /// copy. Blank content is rejected without a call.
    pub async fn edit_post(&self, post_id: &str, edit: PostEdit) -> InteractionOutcome {
        if edit.content.trim().is_empty() {
            return InteractionOutcome::Skipped;
        }
        let previous = {
            let mut state = self.state.lock().await;
            let Some(idx) = position(&state.pages, post_id) else {
                return InteractionOutcome::Skipped;
            };
            if !state
                .in_flight
                .try_begin(InFlightKey::PostEdit(post_id.to_string()))
            {
                return InteractionOutcome::Skipped;
            }
            let post = &mut state.pages.items_mut()[idx];
            let previous = post.edit_snapshot();
            post.apply_edit(&edit);
            previous
        };

        let result = self.backend.update_post(post_id, &edit).await;

        let mut state = self.state.lock().await;
        state
            .in_flight
            .finish(&InFlightKey::PostEdit(post_id.to_string()));
        let idx = position(&state.pages, post_id);
        match result {
            Ok(updated) => {
                if let Some(idx) = idx {
                    state.pages.items_mut()[idx] = updated;
                }
                InteractionOutcome::Confirmed
            }
            Err(err) => {
                if let Some(idx) = idx {
                    state.pages.items_mut()[idx].apply_edit(&previous);
                }
                let message = report_failure(&mut state.notices, "edit post", &err);
                InteractionOutcome::RolledBack { message }
            }
        }
    }

    /// Drops the post from the list right away and puts it back in the same
    /// slot when the server refuses.
    pub async fn delete_post(&self, post_id: &str) -> InteractionOutcome {
        let (idx, removed) = {
            let mut state = self.state.lock().await;
            let Some(idx) = position(&state.pages, post_id) else {
                return InteractionOutcome::Skipped;
            };
            if !state
                .in_flight
                .try_begin(InFlightKey::PostDelete(post_id.to_string()))
            {
                return InteractionOutcome::Skipped;
            }
            let Some(removed) = state.pages.remove_at(idx) else {
                state
                    .in_flight
                    .finish(&InFlightKey::PostDelete(post_id.to_string()));
                return InteractionOutcome::Skipped;
            };
            (idx, removed)
        };

        let result = self.backend.delete_post(post_id).await;

        let mut state = self.state.lock().await;
        state
            .in_flight
            .finish(&InFlightKey::PostDelete(post_id.to_string()));
        match result {
            Ok(()) => {
                state.pages.confirm_removed();
                state.notices.info("Post deleted".to_string());
                info!(post_id, "post deleted");
                InteractionOutcome::Confirmed
            }
            Err(err) => {
                state.pages.insert_at(idx, removed);
                let message = report_failure(&mut state.notices, "delete post", &err);
                InteractionOutcome::RolledBack { message }
            }
        }
    }

    /// Opens a loaded post without refetching it; unknown ids go to the
    /// backend.
    pub async fn open_post(&self, post_id: &str) -> Result<PostView, PostViewError> {
        let loaded = {
            let state = self.state.lock().await;
            position(&state.pages, post_id).map(|idx| state.pages.items()[idx].clone())
        };
        match loaded {
            Some(post) => Ok(PostView::from_post(
                self.backend.clone(),
                self.viewer.clone(),
                post,
                self.comments_page_size,
            )?),
            None => {
                PostView::open(
                    self.backend.clone(),
                    self.viewer.clone(),
                    post_id,
                    self.comments_page_size,
                )
                .await
            }
        }
    }
}

fn position(pages: &PageState<Post>, post_id: &str) -> Option<usize> {
    pages.items().iter().position(|post| post.id == post_id)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use murmur_core::domain::interaction::InteractionOutcome;
    use murmur_core::domain::posts::{PostEdit, Privacy};
    use murmur_infra::{Endpoint, ErrorBody, InMemoryBackend, SocialBackend};

    use super::FeedView;
    use crate::notice::NoticeLevel;
    use crate::views::LoadOutcome;

    async fn loaded_feed(page_size: u32) -> (Arc<InMemoryBackend>, FeedView) {
        let backend = Arc::new(InMemoryBackend::seeded());
        let viewer = backend.current_user().await.unwrap();
        let feed = FeedView::new(backend.clone(), viewer, page_size, 20).unwrap();
        (backend, feed)
    }

    fn ids(posts: &[murmur_core::domain::posts::Post]) -> Vec<&str> {
        posts.iter().map(|post| post.id.as_str()).collect()
    }

    #[tokio::test]
    async fn pages_until_exhausted() {
        let (backend, feed) = loaded_feed(2).await;
        assert!(feed.has_more().await);
        assert_eq!(feed.load_more().await, LoadOutcome::Loaded(2));
        assert_eq!(feed.load_more().await, LoadOutcome::Loaded(1));
        assert_eq!(feed.load_more().await, LoadOutcome::Skipped);
        assert_eq!(ids(&feed.posts().await), vec!["p-3", "p-2", "p-1"]);
        assert_eq!(feed.total_count().await, 3);
        assert_eq!(backend.calls(Endpoint::ListFeed).await, 2);
    }

    #[tokio::test]
    async fn failed_page_can_be_retried() {
        let (backend, feed) = loaded_feed(10).await;
        backend
            .fail(Endpoint::ListFeed, ErrorBody::message("Feed unavailable"))
            .await;
        assert_eq!(
            feed.load_more().await,
            LoadOutcome::Failed {
                message: "Feed unavailable".to_string()
            }
        );
        assert!(feed.posts().await.is_empty());
        backend.recover(Endpoint::ListFeed).await;
        assert_eq!(feed.load_more().await, LoadOutcome::Loaded(3));
    }

    #[tokio::test]
    async fn concurrent_page_loads_are_guarded() {
        let (backend, feed) = loaded_feed(10).await;
        let gate = backend.hold(Endpoint::ListFeed).await;
        let task = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.load_more().await })
        };
        gate.wait_entered().await;
        assert_eq!(feed.load_more().await, LoadOutcome::Skipped);
        gate.release();
        assert_eq!(task.await.unwrap(), LoadOutcome::Loaded(3));
        assert_eq!(backend.calls(Endpoint::ListFeed).await, 1);
    }

    #[tokio::test]
    async fn edit_takes_server_copy_or_rolls_back() {
        let (backend, feed) = loaded_feed(10).await;
        feed.load_more().await;
        let edit = PostEdit {
            content: "Rewritten".to_string(),
            privacy: Privacy::Friends,
        };
        assert!(feed.edit_post("p-2", edit).await.is_confirmed());
        let post = feed.posts().await[1].clone();
        assert_eq!(post.content, "Rewritten");
        assert_eq!(post.privacy, Privacy::Friends);
        assert!(post.updated_at.is_some());

        backend.fail(Endpoint::UpdatePost, ErrorBody::default()).await;
        let outcome = feed
            .edit_post(
                "p-2",
                PostEdit {
                    content: "Again".to_string(),
                    privacy: Privacy::Private,
                },
            )
            .await;
        assert!(matches!(outcome, InteractionOutcome::RolledBack { .. }));
        let post = feed.posts().await[1].clone();
        assert_eq!(post.content, "Rewritten");
        assert_eq!(post.privacy, Privacy::Friends);
        assert_eq!(feed.notices().await.len(), 1);
    }

    #[tokio::test]
    async fn blank_edit_is_skipped() {
        let (backend, feed) = loaded_feed(10).await;
        feed.load_more().await;
        let edit = PostEdit {
            content: "  ".to_string(),
            privacy: Privacy::Public,
        };
        assert_eq!(feed.edit_post("p-1", edit).await, InteractionOutcome::Skipped);
        assert_eq!(backend.calls(Endpoint::UpdatePost).await, 0);
    }

    #[tokio::test]
    async fn failed_delete_restores_slot() {
        let (backend, feed) = loaded_feed(10).await;
        feed.load_more().await;
        let before = feed.posts().await;

        backend.fail(Endpoint::DeletePost, ErrorBody::error("forbidden")).await;
        let gate = backend.hold(Endpoint::DeletePost).await;
        let task = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.delete_post("p-2").await })
        };
        gate.wait_entered().await;
        assert_eq!(ids(&feed.posts().await), vec!["p-3", "p-1"]);
        assert_eq!(feed.total_count().await, 3);
        assert_eq!(feed.delete_post("p-2").await, InteractionOutcome::Skipped);
        gate.release();

        assert_eq!(
            task.await.unwrap(),
            InteractionOutcome::RolledBack {
                message: "forbidden".to_string()
            }
        );
        assert_eq!(feed.posts().await, before);
        assert_eq!(feed.total_count().await, 3);

        backend.recover(Endpoint::DeletePost).await;
        assert!(feed.delete_post("p-2").await.is_confirmed());
        assert_eq!(ids(&feed.posts().await), vec!["p-3", "p-1"]);
        assert_eq!(feed.total_count().await, 2);
        assert!(backend.post("p-2").await.is_none());
    }

    #[tokio::test]
    async fn paging_after_delete_does_not_skip_posts() {
        let (backend, feed) = loaded_feed(2).await;
        assert_eq!(feed.load_more().await, LoadOutcome::Loaded(2));
        assert!(feed.delete_post("p-2").await.is_confirmed());
        assert!(feed.has_more().await);

        assert_eq!(feed.load_more().await, LoadOutcome::Loaded(1));
        assert_eq!(ids(&feed.posts().await), vec!["p-3", "p-1"]);
        assert!(!feed.has_more().await);
        assert_eq!(feed.load_more().await, LoadOutcome::Skipped);
        assert_eq!(backend.calls(Endpoint::ListFeed).await, 2);
    }

    #[tokio::test]
    async fn confirmed_delete_leaves_info_notice() {
        let (_backend, feed) = loaded_feed(10).await;
        feed.load_more().await;
        assert!(feed.delete_post("p-1").await.is_confirmed());
        let notices = feed.notices().await;
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Info);
        assert_eq!(notices[0].message, "Post deleted");
    }

    #[tokio::test]
    async fn open_post_reuses_loaded_copy() {
        let (backend, feed) = loaded_feed(10).await;
        feed.load_more().await;
        let view = feed.open_post("p-3").await.unwrap();
        assert_eq!(view.snapshot().await.post.comment_count, 2);
        assert_eq!(backend.calls(Endpoint::GetPost).await, 0);

        assert!(feed.open_post("missing").await.is_err());
        assert_eq!(backend.calls(Endpoint::GetPost).await, 1);
    }
}
