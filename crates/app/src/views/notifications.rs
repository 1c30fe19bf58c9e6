use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use murmur_core::domain::interaction::{InFlight, InFlightKey, InteractionOutcome};
use murmur_core::domain::notifications::Notification;
use murmur_core::error::CoreError;
use murmur_core::types::pagination::{LoadMode, PageState};
use murmur_infra::SocialBackend;
use tokio::sync::Mutex;
use tracing::debug;

use crate::notice::{Notice, NoticeBoard};
use crate::views::{LoadOutcome, report_failure};

#[derive(Debug)]
struct PanelState {
    open: bool,
    mode: LoadMode,
    pages: PageState<Notification>,
    in_flight: InFlight,
    notices: NoticeBoard,
    // Bumped by every scroll trigger; a debounced trigger only fires if it is
    // still the latest when its timer ends.
    trigger_seq: u64,
    // Bumped on close so loads started before it are discarded.
    lifecycle: u64,
}

/// Notification dropdown. The first page loads on open; further pages load
/// on an explicit "load more" until that is used once, then on scroll.
#[derive(Clone)]
pub struct NotificationsPanel {
    backend: Arc<dyn SocialBackend>,
    debounce: Duration,
    state: Arc<Mutex<PanelState>>,
}

impl NotificationsPanel {
    pub fn new(
        backend: Arc<dyn SocialBackend>,
        page_size: u32,
        debounce: Duration,
    ) -> Result<Self, CoreError> {
        let state = PanelState {
            open: false,
            mode: LoadMode::Manual,
            pages: PageState::new(page_size)?,
            in_flight: InFlight::default(),
            notices: NoticeBoard::default(),
            trigger_seq: 0,
            lifecycle: 0,
        };
        Ok(Self {
            backend,
            debounce,
            state: Arc::new(Mutex::new(state)),
        })
    }

    pub async fn is_open(&self) -> bool {
        self.state.lock().await.open
    }

    pub async fn mode(&self) -> LoadMode {
        self.state.lock().await.mode
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.lock().await.pages.items().to_vec()
    }

    pub async fn has_more(&self) -> bool {
        self.state.lock().await.pages.has_more()
    }

    pub async fn total_count(&self) -> usize {
        self.state.lock().await.pages.total_count()
    }

    /// Unread among the loaded notifications.
    pub async fn unread_count(&self) -> usize {
        let state = self.state.lock().await;
        state
            .pages
            .items()
            .iter()
            .filter(|notification| !notification.is_read)
            .count()
    }

    /// Notices still on screen.
    pub async fn notices(&self) -> Vec<Notice> {
        let mut state = self.state.lock().await;
        state.notices.expire(Utc::now());
        state.notices.all().to_vec()
    }

    pub async fn open(&self) -> LoadOutcome {
        {
            let mut state = self.state.lock().await;
            if state.open {
                return LoadOutcome::Skipped;
            }
            state.open = true;
        }
        self.fetch_next().await
    }

    /// Back to manual mode with nothing loaded. Loads still running are
    /// discarded when they finish.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.open = false;
        state.mode = LoadMode::Manual;
        state.pages.reset();
        state.trigger_seq += 1;
        state.lifecycle += 1;
    }

    /// The "load more" button. Switches the panel to scroll loading for the
    /// rest of this open.
    pub async fn load_more(&self) -> LoadOutcome {
        {
            let mut state = self.state.lock().await;
            if !state.open {
                return LoadOutcome::Skipped;
            }
            state.mode = LoadMode::Auto;
        }
        self.fetch_next().await
    }

    /// The bottom sentinel scrolled into view. Only acts in auto mode, and
    /// only for the last trigger within the debounce window.
    pub async fn on_intersect(&self) -> LoadOutcome {
        let seq = {
            let mut state = self.state.lock().await;
            if !state.open || state.mode != LoadMode::Auto || !state.pages.has_more() {
                return LoadOutcome::Skipped;
            }
            state.trigger_seq += 1;
            state.trigger_seq
        };
        tokio::time::sleep(self.debounce).await;
        {
            let state = self.state.lock().await;
            if state.trigger_seq != seq || !state.open {
                debug!(seq, "scroll trigger superseded");
                return LoadOutcome::Skipped;
            }
        }
        self.fetch_next().await
    }

    async fn fetch_next(&self) -> LoadOutcome {
        let (request, lifecycle) = {
            let mut state = self.state.lock().await;
            let Some(request) = state.pages.begin_load() else {
                return LoadOutcome::Skipped;
            };
            (request, state.lifecycle)
        };

        let result = self.backend.list_notifications(request).await;

        let mut state = self.state.lock().await;
        if state.lifecycle != lifecycle {
            debug!(page = request.page, "notifications page arrived after close");
            return LoadOutcome::Skipped;
        }
        match result {
            Ok(page) => {
                let count = state
                    .pages
                    .finish_load(page, |notification| notification.id.clone());
                LoadOutcome::Loaded(count)
            }
            Err(err) => {
                state.pages.fail_load();
                let message = report_failure(&mut state.notices, "load notifications", &err);
                LoadOutcome::Failed { message }
            }
        }
    }

    pub async fn mark_read(&self, notification_id: &str) -> InteractionOutcome {
        {
            let mut state = self.state.lock().await;
            let Some(idx) = position(&state.pages, notification_id) else {
                return InteractionOutcome::Skipped;
            };
            if state.pages.items()[idx].is_read
                || !state
                    .in_flight
                    .try_begin(InFlightKey::NotificationRead(notification_id.to_string()))
            {
                return InteractionOutcome::Skipped;
            }
            state.pages.items_mut()[idx].is_read = true;
        }

        let result = self.backend.mark_notification_read(notification_id).await;

        let mut state = self.state.lock().await;
        state
            .in_flight
            .finish(&InFlightKey::NotificationRead(notification_id.to_string()));
        match result {
            Ok(()) => InteractionOutcome::Confirmed,
            Err(err) => {
                if let Some(idx) = position(&state.pages, notification_id) {
                    state.pages.items_mut()[idx].is_read = false;
                }
                let message = report_failure(&mut state.notices, "mark notification read", &err);
                InteractionOutcome::RolledBack { message }
            }
        }
    }
}

fn position(pages: &PageState<Notification>, notification_id: &str) -> Option<usize> {
    pages
        .items()
        .iter()
        .position(|notification| notification.id == notification_id)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use murmur_core::domain::interaction::InteractionOutcome;
    use murmur_core::types::pagination::LoadMode;
    use murmur_infra::{Endpoint, ErrorBody, InMemoryBackend};

    use super::NotificationsPanel;
    use crate::views::LoadOutcome;

    const DEBOUNCE: Duration = Duration::from_millis(500);

    fn panel(page_size: u32) -> (Arc<InMemoryBackend>, NotificationsPanel) {
        let backend = Arc::new(InMemoryBackend::seeded());
        let panel = NotificationsPanel::new(backend.clone(), page_size, DEBOUNCE).unwrap();
        (backend, panel)
    }

    #[tokio::test]
    async fn open_loads_first_page_once() {
        let (backend, panel) = panel(5);
        assert_eq!(panel.open().await, LoadOutcome::Loaded(5));
        assert_eq!(panel.open().await, LoadOutcome::Skipped);
        assert_eq!(panel.total_count().await, 12);
        assert_eq!(panel.unread_count().await, 5);
        assert_eq!(panel.mode().await, LoadMode::Manual);
        assert_eq!(backend.calls(Endpoint::ListNotifications).await, 1);
    }

    #[tokio::test]
    async fn load_more_is_guarded_while_pending() {
        let (backend, panel) = panel(5);
        panel.open().await;
        let gate = backend.hold(Endpoint::ListNotifications).await;
        let task = {
            let panel = panel.clone();
            tokio::spawn(async move { panel.load_more().await })
        };
        gate.wait_entered().await;
        assert_eq!(panel.load_more().await, LoadOutcome::Skipped);
        gate.release();
        assert_eq!(task.await.unwrap(), LoadOutcome::Loaded(5));
        assert_eq!(backend.calls(Endpoint::ListNotifications).await, 2);
        assert_eq!(panel.notifications().await.len(), 10);
        assert_eq!(panel.unread_count().await, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn scroll_is_ignored_until_load_more_is_used() {
        let (backend, panel) = panel(5);
        panel.open().await;
        assert_eq!(panel.on_intersect().await, LoadOutcome::Skipped);
        assert_eq!(backend.calls(Endpoint::ListNotifications).await, 1);

        assert_eq!(panel.load_more().await, LoadOutcome::Loaded(5));
        assert_eq!(panel.mode().await, LoadMode::Auto);
        assert_eq!(panel.on_intersect().await, LoadOutcome::Loaded(2));
        assert!(!panel.has_more().await);
        assert_eq!(panel.on_intersect().await, LoadOutcome::Skipped);
        assert_eq!(panel.mode().await, LoadMode::Auto);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_triggers_collapse_into_one_load() {
        let (backend, panel) = panel(3);
        panel.open().await;
        panel.load_more().await;

        let started = tokio::time::Instant::now();
        let (first, second) = tokio::join!(panel.on_intersect(), panel.on_intersect());
        assert_eq!(first, LoadOutcome::Skipped);
        assert_eq!(second, LoadOutcome::Loaded(3));
        assert!(started.elapsed() >= DEBOUNCE);
        assert_eq!(backend.calls(Endpoint::ListNotifications).await, 3);

        assert_eq!(panel.on_intersect().await, LoadOutcome::Loaded(3));
        assert_eq!(panel.notifications().await.len(), 12);
    }

    #[tokio::test]
    async fn close_resets_to_manual_and_discards_late_page() {
        let (backend, panel) = panel(5);
        panel.open().await;
        panel.load_more().await;
        assert_eq!(panel.mode().await, LoadMode::Auto);

        let gate = backend.hold(Endpoint::ListNotifications).await;
        let task = {
            let panel = panel.clone();
            tokio::spawn(async move { panel.load_more().await })
        };
        gate.wait_entered().await;
        panel.close().await;
        gate.release();
        assert_eq!(task.await.unwrap(), LoadOutcome::Skipped);

        assert!(!panel.is_open().await);
        assert_eq!(panel.mode().await, LoadMode::Manual);
        assert!(panel.notifications().await.is_empty());
        assert_eq!(panel.load_more().await, LoadOutcome::Skipped);

        assert_eq!(panel.open().await, LoadOutcome::Loaded(5));
        assert_eq!(panel.notifications().await[0].id, "n-12");
        assert_eq!(panel.mode().await, LoadMode::Manual);
    }

    #[tokio::test]
    async fn failed_page_reports_and_allows_retry() {
        let (backend, panel) = panel(5);
        backend
            .fail(Endpoint::ListNotifications, ErrorBody::message("Try later"))
            .await;
        assert_eq!(
            panel.open().await,
            LoadOutcome::Failed {
                message: "Try later".to_string()
            }
        );
        assert_eq!(panel.notices().await.len(), 1);
        backend.recover(Endpoint::ListNotifications).await;
        assert_eq!(panel.load_more().await, LoadOutcome::Loaded(5));
    }

    #[tokio::test]
    async fn mark_read_is_optimistic() {
        let (backend, panel) = panel(5);
        panel.open().await;
        assert!(panel.mark_read("n-12").await.is_confirmed());
        assert_eq!(panel.unread_count().await, 4);
        assert_eq!(panel.mark_read("n-12").await, InteractionOutcome::Skipped);

        backend
            .fail(Endpoint::MarkNotificationRead, ErrorBody::default())
            .await;
        assert!(matches!(
            panel.mark_read("n-11").await,
            InteractionOutcome::RolledBack { .. }
        ));
        assert_eq!(panel.unread_count().await, 4);
        assert_eq!(panel.mark_read("n-1").await, InteractionOutcome::Skipped);
    }
}
