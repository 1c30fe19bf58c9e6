pub mod comments;
pub mod identity;
pub mod interaction;
pub mod notifications;
pub mod posts;
pub mod reactions;
