//! In-memory SDK engine for demos and tests
//!
//! The real download engine ships inside the native SDK. This simulation
//! implements the same boundary surface: registered titles gain bytes on
//! every tick, completion and removal are pushed to subscribers as event
//! batches, and pause/resume/remove behave like the device engine.
//!
//! The engine itself happily runs several downloads at once; keeping a
//! single download active is the coordinator's policy, not the SDK's.

use crate::boundary::{EventBatch, EventSubscription, SdkClient};
use crate::error::{Error, Result};
use crate::types::{DownloadRecord, DownloadState, SubscriptionId, VideoId};
use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Fraction of the total size transferred per tick
const TICK_STEPS: u64 = 20;

struct SimState {
    records: IndexMap<VideoId, DownloadRecord>,
    subscribers: HashMap<SubscriptionId, mpsc::Sender<EventBatch>>,
}

/// Simulated download engine behind the [`SdkClient`] boundary
pub struct SimulatedSdk {
    state: Mutex<SimState>,
}

impl SimulatedSdk {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                records: IndexMap::new(),
                subscribers: HashMap::new(),
            }),
        }
    }

    /// Register a title with the engine; it starts out queued
    pub fn register(&self, record: DownloadRecord) {
        let mut state = self.state.lock().unwrap();
        state.records.insert(record.video_id.clone(), record);
    }

    /// Admit a queued (or failed) download into active transfer
    pub fn begin(&self, video_id: &VideoId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let record = state
            .records
            .get_mut(video_id)
            .ok_or_else(|| Error::NotFound(video_id.clone()))?;
        if !record.state.can_transition_to(DownloadState::Downloading) {
            return Err(Error::InvalidStateTransition {
                from: record.state,
                to: DownloadState::Downloading,
            });
        }
        record.state = DownloadState::Downloading;
        record.updated_at = Utc::now();
        let batch = vec![record.clone()];
        Self::broadcast(&mut state, batch);
        Ok(())
    }

    /// Advance every active download by one step and push progress to
    /// subscribers
    pub fn tick(&self) {
        let mut state = self.state.lock().unwrap();
        let mut batch = Vec::new();
        for record in state.records.values_mut() {
            if record.state != DownloadState::Downloading {
                continue;
            }
            if record.total_bytes > 0 {
                let step = (record.total_bytes / TICK_STEPS).max(1);
                record.downloaded_bytes = (record.downloaded_bytes + step).min(record.total_bytes);
                record.progress_percentage = record.progress();
                if record.downloaded_bytes >= record.total_bytes {
                    record.state = DownloadState::Completed;
                }
            } else {
                record.progress_percentage = (record.progress_percentage + 5.0).min(100.0);
                if record.progress_percentage >= 100.0 {
                    record.state = DownloadState::Completed;
                }
            }
            record.updated_at = Utc::now();
            batch.push(record.clone());
        }
        if !batch.is_empty() {
            Self::broadcast(&mut state, batch);
        }
    }

    /// Run [`tick`] on an interval until the handle is aborted
    ///
    /// [`tick`]: SimulatedSdk::tick
    pub fn spawn_ticker(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.tick();
            }
        })
    }

    fn broadcast(state: &mut SimState, batch: EventBatch) {
        state.subscribers.retain(|id, tx| match tx.try_send(batch.clone()) {
            Ok(()) => true,
            // Lagging subscriber: skip this batch, keep the stream
            Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(subscription = %id, "dropping dead subscriber");
                false
            }
        });
    }

    fn mutate(
        &self,
        video_id: &VideoId,
        operation: &'static str,
        expected: DownloadState,
        to: DownloadState,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let record = state
            .records
            .get_mut(video_id)
            .ok_or_else(|| Error::NotFound(video_id.clone()))?;
        if record.state != expected {
            return Err(Error::rejected(
                operation,
                video_id,
                format!("engine state is {}", record.state),
            ));
        }
        record.state = to;
        record.updated_at = Utc::now();
        let batch = vec![record.clone()];
        Self::broadcast(&mut state, batch);
        Ok(())
    }
}

impl Default for SimulatedSdk {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SdkClient for SimulatedSdk {
    async fn list(&self) -> Result<Vec<DownloadRecord>> {
        Ok(self.state.lock().unwrap().records.values().cloned().collect())
    }

    async fn pause(&self, video_id: &VideoId) -> Result<()> {
        self.mutate(
            video_id,
            "pause",
            DownloadState::Downloading,
            DownloadState::Paused,
        )
    }

    async fn resume(&self, video_id: &VideoId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let record = state
            .records
            .get_mut(video_id)
            .ok_or_else(|| Error::NotFound(video_id.clone()))?;
        // The engine's resume also admits queued and failed downloads
        if !matches!(
            record.state,
            DownloadState::Paused | DownloadState::Queued | DownloadState::Failed
        ) {
            return Err(Error::rejected(
                "resume",
                video_id,
                format!("engine state is {}", record.state),
            ));
        }
        record.state = DownloadState::Downloading;
        record.updated_at = Utc::now();
        let batch = vec![record.clone()];
        Self::broadcast(&mut state, batch);
        Ok(())
    }

    async fn remove(&self, video_id: &VideoId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let mut record = state
            .records
            .shift_remove(video_id)
            .ok_or_else(|| Error::NotFound(video_id.clone()))?;
        record.state = DownloadState::Removed;
        record.updated_at = Utc::now();
        Self::broadcast(&mut state, vec![record]);
        Ok(())
    }

    async fn status(&self, video_id: &VideoId) -> Result<DownloadState> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(video_id)
            .map(|record| record.state)
            .ok_or_else(|| Error::NotFound(video_id.clone()))
    }

    async fn subscribe(&self) -> Result<EventSubscription> {
        let id = SubscriptionId::new();
        let (tx, rx) = mpsc::channel(64);
        self.state.lock().unwrap().subscribers.insert(id, tx);
        Ok(EventSubscription { id, events: rx })
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        self.state.lock().unwrap().subscribers.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sized(id: &str, total: u64) -> DownloadRecord {
        DownloadRecord::new(id).with_total_bytes(total)
    }

    #[tokio::test]
    async fn test_tick_progresses_and_completes() {
        let engine = SimulatedSdk::new();
        engine.register(sized("a", 100));
        engine.begin(&"a".into()).unwrap();

        engine.tick();
        assert_eq!(engine.status(&"a".into()).await.unwrap(), DownloadState::Downloading);

        for _ in 0..TICK_STEPS {
            engine.tick();
        }
        assert_eq!(engine.status(&"a".into()).await.unwrap(), DownloadState::Completed);
    }

    #[tokio::test]
    async fn test_pause_stops_progress() {
        let engine = SimulatedSdk::new();
        engine.register(sized("a", 100));
        engine.begin(&"a".into()).unwrap();
        engine.tick();

        engine.pause(&"a".into()).await.unwrap();
        let before = engine.list().await.unwrap()[0].downloaded_bytes;
        engine.tick();
        let after = engine.list().await.unwrap()[0].downloaded_bytes;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_remove_broadcasts_removed_record() {
        let engine = SimulatedSdk::new();
        engine.register(sized("a", 100));
        let mut sub = engine.subscribe().await.unwrap();

        engine.remove(&"a".into()).await.unwrap();
        let batch = sub.events.recv().await.unwrap();
        assert_eq!(batch[0].state, DownloadState::Removed);
        assert!(engine.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_engine_allows_parallel_downloads() {
        // Single-active is app policy; the engine itself has no cap
        let engine = SimulatedSdk::new();
        engine.register(sized("a", 100));
        engine.register(sized("b", 100));
        engine.begin(&"a".into()).unwrap();
        engine.begin(&"b".into()).unwrap();

        let active = engine
            .list()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.state.is_active())
            .count();
        assert_eq!(active, 2);
    }
}
