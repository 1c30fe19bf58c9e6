pub mod api;
pub mod backend;
pub mod memory;
pub mod profiles;

pub use api::{ApiError, ErrorBody, RestBackend, FALLBACK_ERROR_MESSAGE};
pub use backend::{LikeState, NewComment, SocialBackend};
pub use memory::{Endpoint, Gate, InMemoryBackend};
pub use profiles::{apply_profiles, resolve_profiles};
