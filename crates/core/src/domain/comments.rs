use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::identity::DisplayIdentity;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub id: String,
    pub text: String,
    pub author: String,
    pub avatar_url: Option<String>,
    pub avatar_initials: String,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub like_count: u64,
    pub is_liked: bool,
    pub parent_comment_id: Option<String>,
    pub replies: Vec<Arc<Comment>>,
    pub reply_count: u64,
    pub pending: bool,
}

impl Comment {
    /// Local stand-in shown while the create call is in flight. `user_id`
    /// stays empty until the server answers.
    pub fn placeholder(
        temp_id: String,
        text: String,
        identity: &DisplayIdentity,
        avatar_url: Option<String>,
        parent_comment_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: temp_id,
            text,
            author: identity.name.clone(),
            avatar_url,
            avatar_initials: identity.initials.clone(),
            user_id: None,
            created_at: now,
            like_count: 0,
            is_liked: false,
            parent_comment_id,
            replies: Vec::new(),
            reply_count: 0,
            pending: true,
        }
    }
}

/// Top-level comments of one post, each owning its replies.
///
/// Every mutation returns a new forest. Nodes off the changed path are shared
/// with the previous version, so `Arc::ptr_eq` holds for them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CommentForest {
    roots: Vec<Arc<Comment>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Root(usize),
    Reply(usize, usize),
}

impl CommentForest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_comments(comments: Vec<Comment>) -> Self {
        Self {
            roots: comments.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn roots(&self) -> &[Arc<Comment>] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Comment>> {
        self.roots.iter()
    }

    pub fn find(&self, id: &str) -> Option<&Arc<Comment>> {
        match self.locate(id)? {
            Location::Root(idx) => self.roots.get(idx),
            Location::Reply(idx, reply_idx) => self.roots.get(idx)?.replies.get(reply_idx),
        }
    }

    /// Newest own comments go on top.
    pub fn append_top_level(&self, comment: Comment) -> Self {
        let mut roots = Vec::with_capacity(self.roots.len() + 1);
        roots.push(Arc::new(comment));
        roots.extend(self.roots.iter().cloned());
        Self { roots }
    }

    /// Appends a server page in the order received. Ids already present are
    /// skipped.
    pub fn extend_loaded(&self, comments: Vec<Comment>) -> Self {
        let mut roots = self.roots.clone();
        for comment in comments {
            if self.locate(&comment.id).is_some() {
                continue;
            }
            roots.push(Arc::new(comment));
        }
        Self { roots }
    }

    pub fn append_reply(&self, parent_comment_id: &str, reply: Comment) -> Self {
        let Some(idx) = self.roots.iter().position(|root| root.id == parent_comment_id) else {
            return self.clone();
        };
        let mut parent = Comment::clone(&self.roots[idx]);
        parent.replies.push(Arc::new(reply));
        parent.reply_count += 1;
        self.with_root(idx, parent)
    }

    /// Sets the like flag on the node at any depth and moves its count by one.
    /// Unliking never takes the count below zero.
    pub fn toggle_like(&self, comment_id: &str, liked: bool) -> Self {
        self.rewrite(comment_id, |node| {
            let mut updated = node.clone();
            updated.is_liked = liked;
            updated.like_count = if liked {
                updated.like_count + 1
            } else {
                updated.like_count.saturating_sub(1)
            };
            updated
        })
    }

    pub fn replace_by_id(&self, temp_id: &str, confirmed: Comment) -> Self {
        self.rewrite(temp_id, |_| confirmed)
    }

    pub fn remove_by_id(&self, id: &str) -> Self {
        match self.locate(id) {
            None => self.clone(),
            Some(Location::Root(idx)) => {
                let mut roots = self.roots.clone();
                roots.remove(idx);
                Self { roots }
            }
            Some(Location::Reply(idx, reply_idx)) => {
                let mut parent = Comment::clone(&self.roots[idx]);
                parent.replies.remove(reply_idx);
                parent.reply_count = parent.reply_count.saturating_sub(1);
                self.with_root(idx, parent)
            }
        }
    }

    fn locate(&self, id: &str) -> Option<Location> {
        for (idx, root) in self.roots.iter().enumerate() {
            if root.id == id {
                return Some(Location::Root(idx));
            }
            if let Some(reply_idx) = root.replies.iter().position(|reply| reply.id == id) {
                return Some(Location::Reply(idx, reply_idx));
            }
        }
        None
    }

    fn rewrite<F>(&self, id: &str, edit: F) -> Self
    where
        F: FnOnce(&Comment) -> Comment,
    {
        match self.locate(id) {
            None => self.clone(),
            Some(Location::Root(idx)) => self.with_root(idx, edit(&self.roots[idx])),
            Some(Location::Reply(idx, reply_idx)) => {
                let updated = edit(&self.roots[idx].replies[reply_idx]);
                let mut parent = Comment::clone(&self.roots[idx]);
                parent.replies[reply_idx] = Arc::new(updated);
                self.with_root(idx, parent)
            }
        }
    }

    fn with_root(&self, idx: usize, node: Comment) -> Self {
        let mut roots = self.roots.clone();
        roots[idx] = Arc::new(node);
        Self { roots }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use super::{Comment, CommentForest};

    fn comment(id: &str) -> Comment {
        Comment {
            id: id.to_string(),
            text: format!("text of {id}"),
            author: "Nguyen An".to_string(),
            avatar_url: None,
            avatar_initials: "NA".to_string(),
            user_id: Some("u1".to_string()),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            like_count: 0,
            is_liked: false,
            parent_comment_id: None,
            replies: Vec::new(),
            reply_count: 0,
            pending: false,
        }
    }

    fn reply(id: &str, parent: &str) -> Comment {
        Comment {
            parent_comment_id: Some(parent.to_string()),
            ..comment(id)
        }
    }

    fn forest_ab() -> CommentForest {
        CommentForest::from_comments(vec![comment("c1"), comment("c2")])
    }

    #[test]
    fn append_top_level_prepends() {
        let forest = forest_ab().append_top_level(comment("c3"));
        let ids: Vec<_> = forest.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c3", "c1", "c2"]);
    }

    #[test]
    fn extend_loaded_keeps_server_order_and_skips_known_ids() {
        let forest = CommentForest::new()
            .append_top_level(comment("c2"))
            .extend_loaded(vec![comment("c1"), comment("c2"), comment("c3")]);
        let ids: Vec<_> = forest.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c1", "c3"]);
    }

    #[test]
    fn reply_attaches_to_correct_parent() {
        let forest = forest_ab();
        let updated = forest.append_reply("c1", reply("r1", "c1"));
        let a = &updated.roots()[0];
        let b = &updated.roots()[1];
        assert_eq!(a.replies.len(), 1);
        assert_eq!(a.replies[0].id, "r1");
        assert_eq!(a.reply_count, forest.roots()[0].reply_count + 1);
        assert!(b.replies.is_empty());
        assert!(Arc::ptr_eq(b, &forest.roots()[1]));
    }

    #[test]
    fn replies_append_in_arrival_order() {
        let forest = forest_ab()
            .append_reply("c1", reply("r1", "c1"))
            .append_reply("c1", reply("r2", "c1"));
        let ids: Vec<_> = forest.roots()[0].replies.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2"]);
        assert_eq!(forest.roots()[0].reply_count, 2);
    }

    #[test]
    fn unknown_parent_is_noop() {
        let forest = forest_ab();
        let updated = forest.append_reply("does-not-exist", reply("r1", "x"));
        assert_eq!(updated, forest);
    }

    #[test]
    fn toggle_like_round_trip_restores_state() {
        let forest = forest_ab().append_reply("c1", reply("r1", "c1"));
        for id in ["c2", "r1"] {
            let liked = forest.toggle_like(id, true);
            let node = liked.find(id).unwrap();
            assert!(node.is_liked);
            assert_eq!(node.like_count, 1);
            let restored = liked.toggle_like(id, false);
            assert_eq!(restored, forest);
        }
    }

    #[test]
    fn like_count_never_goes_negative() {
        let mut forest = forest_ab();
        for _ in 0..5 {
            forest = forest.toggle_like("c1", false);
        }
        let node = forest.find("c1").unwrap();
        assert_eq!(node.like_count, 0);
        assert!(!node.is_liked);
    }

    #[test]
    fn unlike_clamps_inconsistent_server_count() {
        let forest = CommentForest::from_comments(vec![Comment {
            is_liked: true,
            like_count: 0,
            ..comment("c1")
        }]);
        let updated = forest.toggle_like("c1", false);
        assert_eq!(updated.find("c1").unwrap().like_count, 0);
    }

    #[test]
    fn toggle_like_adjusts_count_whatever_the_flag() {
        let forest = CommentForest::from_comments(vec![Comment {
            like_count: 3,
            ..comment("c1")
        }]);
        let unliked = forest.toggle_like("c1", false);
        let node = unliked.find("c1").unwrap();
        assert_eq!(node.like_count, 2);
        assert!(!node.is_liked);

        let liked_twice = forest.toggle_like("c1", true).toggle_like("c1", true);
        let node = liked_twice.find("c1").unwrap();
        assert_eq!(node.like_count, 5);
        assert!(node.is_liked);
    }

    #[test]
    fn forest_serializes_as_plain_array() {
        let forest = forest_ab().append_reply("c1", reply("r1", "c1"));
        let value = serde_json::to_value(&forest).unwrap();
        let roots = value.as_array().unwrap();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0]["id"], "c1");
        assert_eq!(roots[0]["replies"][0]["id"], "r1");
        assert_eq!(roots[0]["replies"][0]["parent_comment_id"], "c1");
        assert_eq!(roots[1]["reply_count"], 0);
    }

    #[test]
    fn toggle_like_on_reply_shares_untouched_roots() {
        let forest = forest_ab().append_reply("c1", reply("r1", "c1"));
        let updated = forest.toggle_like("r1", true);
        assert!(Arc::ptr_eq(&updated.roots()[1], &forest.roots()[1]));
        assert!(!Arc::ptr_eq(&updated.roots()[0], &forest.roots()[0]));
        assert!(!forest.find("r1").unwrap().is_liked);
    }

    #[test]
    fn placeholder_replaced_by_confirmed_comment() {
        let forest = CommentForest::new();
        let pending = Comment {
            pending: true,
            text: "hi".to_string(),
            ..comment("temp-1")
        };
        let forest = forest.append_top_level(pending);
        assert_eq!(forest.len(), 1);
        assert!(forest.roots()[0].pending);

        let confirmed = Comment {
            text: "hi".to_string(),
            ..comment("server-99")
        };
        let forest = forest.replace_by_id("temp-1", confirmed);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest.roots()[0].id, "server-99");
        assert!(!forest.roots()[0].pending);
        assert!(forest.find("temp-1").is_none());
    }

    #[test]
    fn replace_missing_id_is_noop() {
        let forest = forest_ab();
        assert_eq!(forest.replace_by_id("temp-9", comment("server-1")), forest);
    }

    #[test]
    fn remove_reply_decrements_parent_count() {
        let forest = forest_ab().append_reply("c1", reply("temp-r", "c1"));
        let removed = forest.remove_by_id("temp-r");
        assert_eq!(removed, forest_ab());
    }

    #[test]
    fn remove_root_and_missing() {
        let forest = forest_ab();
        let removed = forest.remove_by_id("c1");
        assert_eq!(removed.len(), 1);
        assert_eq!(removed.roots()[0].id, "c2");
        assert_eq!(forest.remove_by_id("nope"), forest);
    }
}
