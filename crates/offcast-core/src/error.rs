//! Error types for Offcast Core

use crate::types::{DownloadState, VideoId};
use thiserror::Error;

/// Result type alias for coordinator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coordinator and SDK boundary error types
#[derive(Error, Debug)]
pub enum Error {
    /// Subscription or list setup failed; the coordinator degrades to
    /// manual/poll refresh instead of giving up
    #[error("SDK boundary unavailable: {0}")]
    BoundaryUnavailable(String),

    /// The SDK refused a pause/resume/remove for a specific video
    #[error("{operation} rejected for {video_id}: {reason}")]
    OperationRejected {
        operation: &'static str,
        video_id: VideoId,
        reason: String,
    },

    /// Operation targeted a video absent from the mapping
    #[error("no tracked download for {0}")]
    NotFound(VideoId),

    /// Result superseded by a concurrent refresh or event push
    #[error("result for {0} superseded by a concurrent update")]
    Stale(VideoId),

    /// A per-record transition the lifecycle does not allow
    #[error("invalid download state transition: {from} -> {to}")]
    InvalidStateTransition {
        from: DownloadState,
        to: DownloadState,
    },
}

impl Error {
    /// Create an `OperationRejected` error
    pub fn rejected(
        operation: &'static str,
        video_id: &VideoId,
        reason: impl Into<String>,
    ) -> Self {
        Error::OperationRejected {
            operation,
            video_id: video_id.clone(),
            reason: reason.into(),
        }
    }

    /// Returns true if retrying (or a manual refresh) may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::BoundaryUnavailable(_) | Error::OperationRejected { .. } | Error::Stale(_)
        )
    }

    /// Returns the stable error code for user-visible messaging and logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::BoundaryUnavailable(_) => "BOUNDARY_UNAVAILABLE",
            Error::OperationRejected { .. } => "OPERATION_REJECTED",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Stale(_) => "STALE_RESULT",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
        }
    }
}
