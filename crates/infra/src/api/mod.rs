pub mod client;
pub mod error;
pub mod payload;

pub use client::RestBackend;
pub use error::{ApiError, ErrorBody, FALLBACK_ERROR_MESSAGE};
