use chrono::Utc;
use murmur_core::domain::comments::Comment;
use murmur_core::domain::identity::UserProfile;
use murmur_core::domain::interaction::InteractionOutcome;
use murmur_core::domain::posts::{Post, PostEdit};
use murmur_core::error::CoreError;
use murmur_core::types::time_ago::time_ago;
use murmur_infra::ApiError;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::cli::Command;
use crate::state::AppState;
use crate::views::LoadOutcome;
use crate::views::feed::FeedView;
use crate::views::notifications::NotificationsPanel;
use crate::views::post::{PostView, PostViewError};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("api error: {0}")]
    Api(#[from] ApiError),
    #[error("{0}")]
    View(#[from] PostViewError),
    #[error("{0}")]
    Core(#[from] CoreError),
    #[error("{action} failed: {message}")]
    RolledBack { action: &'static str, message: String },
    #[error("{action} skipped: {reason}")]
    Skipped { action: &'static str, reason: &'static str },
    #[error("{0}")]
    LoadFailed(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Runs one subcommand. With `json` the result is printed as JSON instead of
/// text.
pub async fn run(state: &AppState, command: Command, json: bool) -> Result<(), CommandError> {
    let viewer = viewer(state).await;
    match command {
        Command::Feed { pages } => {
            let feed = feed(state, viewer)?;
            load_pages(pages, || feed.load_more()).await?;
            let posts = feed.posts().await;
            if json {
                return emit(&posts);
            }
            for post in &posts {
                print_post(post);
            }
            println!("{} of {} posts", posts.len(), feed.total_count().await);
        }
        Command::Post { id } => {
            let view = open_post(state, viewer, &id).await?;
            load_pages(u32::MAX, || view.load_more_comments()).await?;
            let snapshot = view.snapshot().await;
            if json {
                return emit(&snapshot);
            }
            print_post(&snapshot.post);
            for comment in snapshot.comments.iter() {
                print_comment(comment, 1);
                for reply in &comment.replies {
                    print_comment(reply, 2);
                }
            }
        }
        Command::Like { id } => {
            let view = open_post(state, viewer, &id).await?;
            settle("like", view.toggle_like().await)?;
            show_post(&view.snapshot().await.post, json)?;
        }
        Command::Save { id } => {
            let view = open_post(state, viewer, &id).await?;
            settle("save", view.toggle_save().await)?;
            let post = view.snapshot().await.post;
            if json {
                return emit(&post);
            }
            println!("{} {}", post.id, if post.is_saved { "saved" } else { "unsaved" });
        }
        Command::React { id, kind } => {
            let view = open_post(state, viewer, &id).await?;
            settle("react", view.select_reaction(kind).await)?;
            show_post(&view.snapshot().await.post, json)?;
        }
        Command::Comment { id, text, reply_to } => {
            let view = open_post(state, viewer, &id).await?;
            let outcome = match reply_to {
                Some(parent) => {
                    load_pages(u32::MAX, || view.load_more_comments()).await?;
                    view.set_reply_draft(&parent, &text).await;
                    view.submit_reply(&parent).await
                }
                None => {
                    view.set_draft(&text).await;
                    view.submit_comment().await
                }
            };
            settle("comment", outcome)?;
            let snapshot = view.snapshot().await;
            if json {
                return emit(&snapshot);
            }
            println!("comments: {}", snapshot.post.comment_count);
        }
        Command::Edit {
            id,
            content,
            privacy,
        } => {
            let feed = feed(state, viewer)?;
            let post = load_until_found(&feed, &id).await?;
            let edit = PostEdit {
                content,
                privacy: privacy.unwrap_or(post.privacy),
            };
            settle("edit", feed.edit_post(&id, edit).await)?;
            if let Some(post) = feed.posts().await.iter().find(|post| post.id == id) {
                show_post(post, json)?;
            }
        }
        Command::Delete { id } => {
            let feed = feed(state, viewer)?;
            load_until_found(&feed, &id).await?;
            settle("delete", feed.delete_post(&id).await)?;
            println!("deleted {id}");
        }
        Command::Notifications { pages, read } => {
            let panel = NotificationsPanel::new(
                state.backend.clone(),
                state.config.page_size,
                state.config.scroll_debounce,
            )?;
            loaded(panel.open().await)?;
            if pages > 1 {
                loaded(panel.load_more().await)?;
            }
            for _ in 2..pages {
                match panel.on_intersect().await {
                    LoadOutcome::Loaded(_) => {}
                    LoadOutcome::Skipped => break,
                    LoadOutcome::Failed { message } => return Err(CommandError::LoadFailed(message)),
                }
            }
            if let Some(notification_id) = read {
                settle("mark read", panel.mark_read(&notification_id).await)?;
            }
            let notifications = panel.notifications().await;
            if json {
                return emit(&notifications);
            }
            let now = Utc::now();
            for notification in &notifications {
                println!(
                    "{} {:>10}  {}{}",
                    if notification.is_read { " " } else { "*" },
                    time_ago(notification.created_at, now),
                    notification.message,
                    notification
                        .actor
                        .as_ref()
                        .map(|actor| format!(" ({actor})"))
                        .unwrap_or_default(),
                );
            }
            println!(
                "{} unread of {} loaded, {} total",
                panel.unread_count().await,
                notifications.len(),
                panel.total_count().await
            );
        }
    }
    Ok(())
}

/// The signed-in user, or the anonymous identity when it cannot be fetched.
async fn viewer(state: &AppState) -> UserProfile {
    match state.backend.current_user().await {
        Ok(profile) => profile,
        Err(err) => {
            warn!(error = %err, "current user lookup failed, using default identity");
            UserProfile::default()
        }
    }
}

fn feed(state: &AppState, viewer: UserProfile) -> Result<FeedView, CoreError> {
    FeedView::new(
        state.backend.clone(),
        viewer,
        state.config.page_size,
        state.config.comments_page_size,
    )
}

async fn open_post(state: &AppState, viewer: UserProfile, id: &str) -> Result<PostView, CommandError> {
    Ok(PostView::open(
        state.backend.clone(),
        viewer,
        id,
        state.config.comments_page_size,
    )
    .await?)
}

async fn load_pages<F, Fut>(limit: u32, mut next: F) -> Result<(), CommandError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = LoadOutcome>,
{
    for _ in 0..limit {
        match next().await {
            LoadOutcome::Loaded(0) | LoadOutcome::Skipped => break,
            LoadOutcome::Loaded(_) => {}
            LoadOutcome::Failed { message } => return Err(CommandError::LoadFailed(message)),
        }
    }
    Ok(())
}

async fn load_until_found(feed: &FeedView, id: &str) -> Result<Post, CommandError> {
    loop {
        if let Some(post) = feed.posts().await.into_iter().find(|post| post.id == id) {
            return Ok(post);
        }
        match feed.load_more().await {
            LoadOutcome::Loaded(_) => {}
            LoadOutcome::Skipped => return Err(ApiError::NotFound(format!("post {id}")).into()),
            LoadOutcome::Failed { message } => return Err(CommandError::LoadFailed(message)),
        }
    }
}

fn loaded(outcome: LoadOutcome) -> Result<(), CommandError> {
    match outcome {
        LoadOutcome::Failed { message } => Err(CommandError::LoadFailed(message)),
        _ => Ok(()),
    }
}

fn settle(action: &'static str, outcome: InteractionOutcome) -> Result<(), CommandError> {
    match outcome {
        InteractionOutcome::Confirmed => Ok(()),
        InteractionOutcome::Skipped => Err(CommandError::Skipped {
            action,
            reason: "nothing to send",
        }),
        InteractionOutcome::RolledBack { message } => {
            Err(CommandError::RolledBack { action, message })
        }
    }
}

fn emit<T: Serialize + ?Sized>(value: &T) -> Result<(), CommandError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn show_post(post: &Post, json: bool) -> Result<(), CommandError> {
    if json {
        return emit(post);
    }
    print_post(post);
    Ok(())
}

fn print_post(post: &Post) {
    println!(
        "[{}] {} · {} · {}",
        post.id,
        post.author,
        time_ago(post.created_at, Utc::now()),
        post.privacy
    );
    println!("  {}", post.content);
    let reaction = post
        .reaction
        .map(|kind| format!(" ({kind})"))
        .unwrap_or_default();
    println!(
        "  {} reactions{}, {} comments{}",
        post.like_count,
        reaction,
        post.comment_count,
        if post.is_saved { ", saved" } else { "" }
    );
}

fn print_comment(comment: &Comment, depth: usize) {
    println!(
        "{:indent$}{} ({}) {}: {}  [{} likes{}]",
        "",
        comment.author,
        comment.id,
        time_ago(comment.created_at, Utc::now()),
        comment.text,
        comment.like_count,
        if comment.reply_count > 0 {
            format!(", {} replies", comment.reply_count)
        } else {
            String::new()
        },
        indent = depth * 2
    );
}
