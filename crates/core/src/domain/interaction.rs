use std::collections::HashSet;

/// One guarded action on one target. Different targets never block each
/// other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InFlightKey {
    PostLike(String),
    PostSave(String),
    PostComment(String),
    Reply(String),
    CommentLike(String),
    PostEdit(String),
    PostDelete(String),
    NotificationRead(String),
}

#[derive(Debug, Default)]
pub struct InFlight {
    active: HashSet<InFlightKey>,
}

impl InFlight {
    /// Returns false when the same action is already pending.
    pub fn try_begin(&mut self, key: InFlightKey) -> bool {
        self.active.insert(key)
    }

    pub fn finish(&mut self, key: &InFlightKey) {
        self.active.remove(key);
    }

    pub fn is_active(&self, key: &InFlightKey) -> bool {
        self.active.contains(key)
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionOutcome {
    /// Nothing was applied or reverted: the guard tripped, input was missing,
    /// or the view was gone when the call failed.
    Skipped,
    Confirmed,
    RolledBack { message: String },
}

impl InteractionOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, InteractionOutcome::Confirmed)
    }
}
