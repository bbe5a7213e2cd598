//! SDK client boundary
//!
//! The native streaming SDK owns playback, licensing, and the on-device
//! download engine. This module defines the async surface the coordinator
//! consumes: full-list fetches, per-video control operations, point status
//! queries, and the progress event stream with its subscription handle.
//!
//! Every operation may fail (network, SDK internal error, unknown video);
//! callers never treat a boundary failure as fatal.

use crate::error::Result;
use crate::types::{DownloadRecord, DownloadState, SubscriptionId, VideoId};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A batch of records pushed by the SDK event stream, in receipt order
pub type EventBatch = Vec<DownloadRecord>;

/// Live subscription to the SDK's download progress stream
///
/// The receiver yields batches until the subscription is released with
/// [`SdkClient::unsubscribe`] or the SDK drops the stream on its side.
pub struct EventSubscription {
    pub id: SubscriptionId,
    pub events: mpsc::Receiver<EventBatch>,
}

/// Async operations exposed by the native SDK's download engine
#[async_trait]
pub trait SdkClient: Send + Sync {
    /// Full authoritative snapshot of every download the SDK tracks
    async fn list(&self) -> Result<Vec<DownloadRecord>>;

    /// Suspend an active download
    async fn pause(&self, video_id: &VideoId) -> Result<()>;

    /// Restart a paused download
    async fn resume(&self, video_id: &VideoId) -> Result<()>;

    /// Delete a download and its stored media
    async fn remove(&self, video_id: &VideoId) -> Result<()>;

    /// Point query for a single download's state
    async fn status(&self, video_id: &VideoId) -> Result<DownloadState>;

    /// Open the progress event stream
    async fn subscribe(&self) -> Result<EventSubscription>;

    /// Release a subscription previously returned by [`subscribe`]
    ///
    /// [`subscribe`]: SdkClient::subscribe
    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()>;
}
