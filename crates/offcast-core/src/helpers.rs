//! Point-query helpers used outside the coordinator
//!
//! Thin wrappers over the SDK boundary for one-off checks, the kind a
//! player view performs before deciding whether to offer a download or
//! play-offline button. These never touch the coordinator's mapping.

use crate::boundary::SdkClient;
use crate::error::Result;
use crate::types::{DownloadInfo, DownloadState, VideoId};
use tracing::debug;

/// Current download state for a single video
pub async fn check_status(client: &dyn SdkClient, video_id: &VideoId) -> Result<DownloadState> {
    let state = client.status(video_id).await?;
    debug!(%video_id, %state, "download status");
    Ok(state)
}

/// True if the video is fully stored on device
pub async fn is_downloaded(client: &dyn SdkClient, video_id: &VideoId) -> Result<bool> {
    Ok(check_status(client, video_id).await? == DownloadState::Completed)
}

/// True if the video is actively transferring
pub async fn is_downloading(client: &dyn SdkClient, video_id: &VideoId) -> Result<bool> {
    Ok(check_status(client, video_id).await? == DownloadState::Downloading)
}

/// Aggregate view for screens that need all three answers at once
pub async fn download_info(client: &dyn SdkClient, video_id: &VideoId) -> Result<DownloadInfo> {
    let state = check_status(client, video_id).await?;
    Ok(DownloadInfo {
        video_id: video_id.clone(),
        state,
        is_downloaded: state == DownloadState::Completed,
        is_downloading: state == DownloadState::Downloading,
    })
}
