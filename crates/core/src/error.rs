use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid privacy: {0}")]
    InvalidPrivacy(String),
    #[error("invalid reaction: {0}")]
    InvalidReaction(String),
    #[error("invalid page size: {0}")]
    InvalidPageSize(u32),
}
