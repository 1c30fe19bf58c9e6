use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use murmur_core::domain::comments::Comment;
use murmur_core::domain::identity::{UNKNOWN_AUTHOR, UserProfile};
use tracing::{debug, warn};

use crate::backend::SocialBackend;

/// How many profiles are fetched one by one when the batch endpoint fails.
pub const INDIVIDUAL_FALLBACK_LIMIT: usize = 10;

/// Looks up profiles for `user_ids`. Never fails: a broken batch endpoint
/// degrades to individual lookups of the first few ids, and individual
/// failures are dropped.
pub async fn resolve_profiles(
    backend: &dyn SocialBackend,
    user_ids: &[String],
) -> HashMap<String, UserProfile> {
    let mut seen = HashSet::new();
    let ids: Vec<String> = user_ids
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect();
    if ids.is_empty() {
        return HashMap::new();
    }
    match backend.fetch_profiles_batch(&ids).await {
        Ok(profiles) => profiles
            .into_iter()
            .map(|profile| (profile.user_id.clone(), profile))
            .collect(),
        Err(err) => {
            warn!(error = %err, count = ids.len(), "profile batch failed, fetching individually");
            let mut profiles = HashMap::new();
            for id in ids.iter().take(INDIVIDUAL_FALLBACK_LIMIT) {
                match backend.fetch_profile(id).await {
                    Ok(profile) => {
                        profiles.insert(id.clone(), profile);
                    }
                    Err(err) => debug!(error = %err, user_id = %id, "profile lookup failed"),
                }
            }
            profiles
        }
    }
}

/// User ids of comments (and replies) that came back without a display name.
pub fn anonymous_authors(comments: &[Comment]) -> Vec<String> {
    let mut ids = Vec::new();
    for comment in comments {
        for node in std::iter::once(comment).chain(comment.replies.iter().map(Arc::as_ref)) {
            if needs_profile(node) {
                if let Some(user_id) = node.user_id.as_ref() {
                    ids.push(user_id.clone());
                }
            }
        }
    }
    ids
}

/// Fills in author identity for comments that only carried a user id.
/// Comments whose author is already known, or whose profile is missing, are
/// left as they are.
pub fn apply_profiles(
    comments: Vec<Comment>,
    profiles: &HashMap<String, UserProfile>,
) -> Vec<Comment> {
    comments
        .into_iter()
        .map(|mut comment| {
            fill_identity(&mut comment, profiles);
            if comment.replies.iter().any(|reply| needs_profile(reply)) {
                comment.replies = comment
                    .replies
                    .iter()
                    .map(|reply| {
                        let mut reply = Comment::clone(reply);
                        fill_identity(&mut reply, profiles);
                        Arc::new(reply)
                    })
                    .collect();
            }
            comment
        })
        .collect()
}

fn needs_profile(comment: &Comment) -> bool {
    comment.author == UNKNOWN_AUTHOR && comment.user_id.is_some()
}

fn fill_identity(comment: &mut Comment, profiles: &HashMap<String, UserProfile>) {
    if !needs_profile(comment) {
        return;
    }
    let Some(profile) = comment.user_id.as_ref().and_then(|id| profiles.get(id)) else {
        return;
    };
    let identity = profile.identity();
    comment.author = identity.name;
    comment.avatar_initials = identity.initials;
    if comment.avatar_url.is_none() {
        comment.avatar_url = profile.avatar_url.clone();
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use murmur_core::domain::identity::UserProfile;

    use super::*;
    use crate::api::ErrorBody;
    use crate::memory::{Endpoint, InMemoryBackend};

    fn user(id: &str, first: &str, last: &str) -> UserProfile {
        UserProfile {
            user_id: id.to_string(),
            first_name: Some(first.to_string()),
            last_name: Some(last.to_string()),
            username: None,
            avatar_url: Some(format!("https://cdn/{id}.png")),
        }
    }

    fn backend_with_users(count: usize) -> InMemoryBackend {
        let mut backend = InMemoryBackend::new(user("viewer", "View", "Er"));
        for idx in 0..count {
            backend = backend.with_user(user(&format!("u{idx}"), "First", "Last"));
        }
        backend
    }

    fn anonymous(id: &str, user_id: &str) -> Comment {
        Comment {
            id: id.to_string(),
            text: String::new(),
            author: UNKNOWN_AUTHOR.to_string(),
            avatar_url: None,
            avatar_initials: "U".to_string(),
            user_id: Some(user_id.to_string()),
            created_at: Utc::now(),
            like_count: 0,
            is_liked: false,
            parent_comment_id: None,
            replies: Vec::new(),
            reply_count: 0,
            pending: false,
        }
    }

    #[tokio::test]
    async fn batch_lookup_dedupes_ids() {
        let backend = backend_with_users(3);
        let ids = vec!["u0".to_string(), "u1".to_string(), "u0".to_string()];
        let profiles = resolve_profiles(&backend, &ids).await;
        assert_eq!(profiles.len(), 2);
        assert_eq!(backend.calls(Endpoint::ProfilesBatch).await, 1);
        assert_eq!(backend.calls(Endpoint::Profile).await, 0);
    }

    #[tokio::test]
    async fn falls_back_to_first_ten_individual_lookups() {
        let backend = backend_with_users(12);
        backend
            .fail(Endpoint::ProfilesBatch, ErrorBody::error("batch down"))
            .await;
        let mut ids: Vec<String> = (0..12).map(|idx| format!("u{idx}")).collect();
        ids.insert(1, "ghost".to_string());
        let profiles = resolve_profiles(&backend, &ids).await;
        assert_eq!(backend.calls(Endpoint::Profile).await, INDIVIDUAL_FALLBACK_LIMIT);
        assert_eq!(profiles.len(), INDIVIDUAL_FALLBACK_LIMIT - 1);
        assert!(!profiles.contains_key("ghost"));
        assert!(!profiles.contains_key("u9"));
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let backend = backend_with_users(1);
        assert!(resolve_profiles(&backend, &[]).await.is_empty());
        assert_eq!(backend.calls(Endpoint::ProfilesBatch).await, 0);
    }

    #[test]
    fn apply_profiles_fills_unknown_authors_only() {
        let mut root = anonymous("c1", "u0");
        root.replies.push(Arc::new(anonymous("r1", "u1")));
        let mut known = anonymous("c2", "u0");
        known.author = "Already Named".to_string();
        let missing = anonymous("c3", "nobody");

        let comments = vec![root, known, missing];
        assert_eq!(anonymous_authors(&comments), vec!["u0", "u1", "nobody"]);

        let mut profiles = HashMap::new();
        profiles.insert("u0".to_string(), user("u0", "An", "Nguyen"));
        profiles.insert("u1".to_string(), user("u1", "Binh", "Tran"));
        let filled = apply_profiles(comments, &profiles);

        assert_eq!(filled[0].author, "Nguyen An");
        assert_eq!(filled[0].avatar_url.as_deref(), Some("https://cdn/u0.png"));
        assert_eq!(filled[0].replies[0].author, "Tran Binh");
        assert_eq!(filled[0].replies[0].avatar_initials, "TB");
        assert_eq!(filled[1].author, "Already Named");
        assert_eq!(filled[2].author, UNKNOWN_AUTHOR);
    }
}
