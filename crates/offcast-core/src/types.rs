//! Core types for download session coordination

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Opaque identifier for a video known to the streaming SDK
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VideoId(pub String);

impl VideoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VideoId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for VideoId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an SDK event subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Download lifecycle states reported by the SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DownloadState {
    /// Accepted by the download engine, not yet transferring
    Queued,
    /// Actively transferring
    Downloading,
    /// Transfer suspended, resumable
    Paused,
    /// Fully stored on device
    Completed,
    /// Transfer failed; a restart is an SDK-side operation
    Failed,
    /// Deleted from device storage; the record is evicted
    Removed,
}

impl DownloadState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: DownloadState) -> bool {
        use DownloadState::*;
        matches!(
            (self, target),
            // From Queued
            (Queued, Downloading) |
            // From Downloading
            (Downloading, Paused) | (Downloading, Completed) | (Downloading, Failed) |
            // From Paused
            (Paused, Downloading) |
            // From Failed (the engine may restart it)
            (Failed, Downloading) |
            // Removal is allowed from every state
            (Queued, Removed) | (Downloading, Removed) | (Paused, Removed)
                | (Completed, Removed) | (Failed, Removed)
        )
    }

    /// Removed records are gone for good
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadState::Removed)
    }

    /// Only `Downloading` counts against the single-active policy
    pub fn is_active(&self) -> bool {
        matches!(self, DownloadState::Downloading)
    }
}

impl std::fmt::Display for DownloadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadState::Queued => write!(f, "queued"),
            DownloadState::Downloading => write!(f, "downloading"),
            DownloadState::Paused => write!(f, "paused"),
            DownloadState::Completed => write!(f, "completed"),
            DownloadState::Failed => write!(f, "failed"),
            DownloadState::Removed => write!(f, "removed"),
        }
    }
}

/// One tracked video's download lifecycle entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRecord {
    /// Primary key
    pub video_id: VideoId,
    /// Display title, if the SDK knows one
    pub title: Option<String>,
    /// Thumbnail for list rendering
    pub thumbnail_url: Option<Url>,
    /// Lifecycle state
    pub state: DownloadState,
    /// Bytes stored so far
    pub downloaded_bytes: u64,
    /// Expected total size (0 if the SDK has not sized it yet)
    pub total_bytes: u64,
    /// SDK-reported completion percentage in [0, 100]
    pub progress_percentage: f64,
    /// Last time the SDK touched this record
    pub updated_at: DateTime<Utc>,
}

impl DownloadRecord {
    /// Create a fresh queued record
    pub fn new(video_id: impl Into<VideoId>) -> Self {
        Self {
            video_id: video_id.into(),
            title: None,
            thumbnail_url: None,
            state: DownloadState::Queued,
            downloaded_bytes: 0,
            total_bytes: 0,
            progress_percentage: 0.0,
            updated_at: Utc::now(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_thumbnail(mut self, url: Url) -> Self {
        self.thumbnail_url = Some(url);
        self
    }

    pub fn with_total_bytes(mut self, total: u64) -> Self {
        self.total_bytes = total;
        self
    }

    /// Title for rendering, with the fallback the screens use
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled Video")
    }

    /// Completion in [0, 100]; derived from byte counts when the SDK has
    /// sized the download, otherwise the reported percentage
    pub fn progress(&self) -> f64 {
        if self.total_bytes > 0 {
            (self.downloaded_bytes as f64 / self.total_bytes as f64 * 100.0).clamp(0.0, 100.0)
        } else {
            self.progress_percentage.clamp(0.0, 100.0)
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == DownloadState::Completed
    }

    /// Enforce byte-count and percentage bounds on SDK-supplied data
    pub(crate) fn normalize(&mut self) {
        if self.total_bytes > 0 {
            self.downloaded_bytes = self.downloaded_bytes.min(self.total_bytes);
        }
        self.progress_percentage = self.progress_percentage.clamp(0.0, 100.0);
    }
}

/// Aggregate point-query result for a single video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadInfo {
    pub video_id: VideoId,
    pub state: DownloadState,
    pub is_downloaded: bool,
    pub is_downloading: bool,
}

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Poll cadence when the event subscription is unavailable (ms)
    pub poll_interval_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
        }
    }
}
