pub mod feed;
pub mod notifications;
pub mod post;

use murmur_infra::ApiError;
use tracing::warn;

use crate::notice::NoticeBoard;

/// Result of a paging request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Skipped,
    Loaded(usize),
    Failed { message: String },
}

/// Logs a failed call and puts its user-facing message on the board.
pub(crate) fn report_failure(notices: &mut NoticeBoard, action: &'static str, err: &ApiError) -> String {
    warn!(error = %err, action, "request failed, local state reverted");
    let message = err.user_message();
    notices.error(message.clone());
    message
}
