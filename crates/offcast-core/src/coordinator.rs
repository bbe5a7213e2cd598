//! Download session coordinator
//!
//! Coordinates:
//! - the authoritative mapping from video id to download record
//! - SDK progress-event application, in receipt order
//! - full-list reconciliation (manual refresh and degraded-mode polling)
//! - the single-active-download policy on resume
//! - change notification for the presentation layer
//!
//! The SDK's download engine is assumed unsafe under concurrent control
//! mutations, so every engine-mutating sequence here is awaited step by
//! step rather than joined.

use crate::{
    boundary::{EventBatch, SdkClient},
    error::{Error, Result},
    types::{CoordinatorConfig, DownloadRecord, DownloadState, SubscriptionId, VideoId},
};
use chrono::Utc;
use indexmap::map::Entry;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Record plus the bookkeeping needed to detect stale completions
struct Tracked {
    record: DownloadRecord,
    /// Stamped from the table's mutation counter whenever `record.state`
    /// changes. A control operation captures this before suspending; if
    /// the value moved while the SDK call was in flight, the completion
    /// lost the race and its write is dropped.
    state_seq: u64,
}

/// Mapping state under a single lock; guards are never held across awaits
#[derive(Default)]
struct Table {
    entries: IndexMap<VideoId, Tracked>,
    /// Global mutation counter, the source of `state_seq` stamps
    seq: u64,
    /// Evictions logged while a list fetch is in flight, so its result
    /// cannot resurrect a download removed after the fetch began. Pruned
    /// by every listing that absorbs them; cleared when no fetch remains.
    evictions: Vec<(u64, VideoId)>,
    listings_in_flight: u32,
}

/// State shared with the event pump / poll loop
struct Shared {
    table: RwLock<Table>,
    /// Cleared by `stop()`; checked before applying any async result
    alive: AtomicBool,
    /// Bumped on every mapping change; the presentation layer's
    /// re-render trigger
    changed: watch::Sender<u64>,
}

impl Shared {
    fn notify(&self) {
        self.changed.send_modify(|v| *v = v.wrapping_add(1));
    }

    /// Apply one event batch in receipt order
    async fn apply_batch(&self, batch: EventBatch) {
        if !self.alive.load(Ordering::SeqCst) {
            return;
        }
        let mut changed = false;
        {
            let mut table = self.table.write().await;
            for mut record in batch {
                record.normalize();
                table.seq += 1;
                let seq = table.seq;

                if record.state == DownloadState::Removed {
                    if table.entries.shift_remove(&record.video_id).is_some() {
                        if table.listings_in_flight > 0 {
                            table.evictions.push((seq, record.video_id.clone()));
                        }
                        changed = true;
                    }
                    continue;
                }

                match table.entries.entry(record.video_id.clone()) {
                    Entry::Occupied(mut slot) => {
                        let tracked = slot.get_mut();
                        let from = tracked.record.state;
                        if from != record.state && !from.can_transition_to(record.state) {
                            warn!(
                                video_id = %record.video_id,
                                %from,
                                to = %record.state,
                                "ignoring event with invalid transition"
                            );
                            continue;
                        }
                        if from != record.state {
                            tracked.state_seq = seq;
                        }
                        tracked.record = record;
                        changed = true;
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(Tracked {
                            record,
                            state_seq: seq,
                        });
                        changed = true;
                    }
                }
            }
        }
        if changed {
            self.notify();
        }
    }

    /// Register a list fetch; returns the sequence point it started at
    async fn begin_listing(&self) -> u64 {
        let mut table = self.table.write().await;
        table.listings_in_flight += 1;
        table.seq
    }

    /// Back out of a list fetch that failed before producing a result
    async fn abort_listing(&self) {
        let mut table = self.table.write().await;
        table.listings_in_flight = table.listings_in_flight.saturating_sub(1);
        if table.listings_in_flight == 0 {
            table.evictions.clear();
        }
    }

    /// Replace the mapping wholesale with an authoritative listing.
    ///
    /// Returns false if the result was discarded because the coordinator
    /// was torn down while the fetch was in flight.
    async fn apply_listing(&self, started: u64, listing: Vec<DownloadRecord>) -> bool {
        let mut table = self.table.write().await;
        table.listings_in_flight = table.listings_in_flight.saturating_sub(1);
        if !self.alive.load(Ordering::SeqCst) {
            return false;
        }
        table.seq += 1;
        let seq = table.seq;

        // Ids removed after this fetch began must not come back
        let blocked: HashSet<VideoId> = table
            .evictions
            .iter()
            .filter(|(s, _)| *s > started)
            .map(|(_, id)| id.clone())
            .collect();

        let mut next = IndexMap::with_capacity(listing.len());
        for mut record in listing {
            if record.state == DownloadState::Removed || blocked.contains(&record.video_id) {
                continue;
            }
            record.normalize();
            // Keep the state-sequence stamp when the state is unchanged so
            // in-flight control completions still match
            let state_seq = match table.entries.get(&record.video_id) {
                Some(prev) if prev.record.state == record.state => prev.state_seq,
                _ => seq,
            };
            next.insert(record.video_id.clone(), Tracked { record, state_seq });
        }
        table.entries = next;
        table.evictions.retain(|(s, _)| *s > started);
        if table.listings_in_flight == 0 {
            table.evictions.clear();
        }
        drop(table);
        self.notify();
        true
    }
}

/// Client-side owner of download state for one SDK instance
///
/// The coordinator holds the only writable view of the mapping; screens
/// read [`snapshot`] and watch [`subscribe_changes`] for re-renders.
///
/// [`snapshot`]: DownloadCoordinator::snapshot
/// [`subscribe_changes`]: DownloadCoordinator::subscribe_changes
pub struct DownloadCoordinator {
    client: Arc<dyn SdkClient>,
    config: CoordinatorConfig,
    shared: Arc<Shared>,
    /// Live subscription handle, present while the event stream is up
    subscription: Mutex<Option<SubscriptionId>>,
    /// Event pump, or the poll loop in degraded mode
    pump: Mutex<Option<JoinHandle<()>>>,
    /// A refresh in progress is not re-entered
    refresh_gate: Mutex<()>,
}

impl DownloadCoordinator {
    /// Create a coordinator over an SDK client
    pub fn new(client: Arc<dyn SdkClient>, config: CoordinatorConfig) -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            client,
            config,
            shared: Arc::new(Shared {
                table: RwLock::new(Table::default()),
                alive: AtomicBool::new(false),
                changed,
            }),
            subscription: Mutex::new(None),
            pump: Mutex::new(None),
            refresh_gate: Mutex::new(()),
        }
    }

    /// Create a coordinator with default configuration
    pub fn with_defaults(client: Arc<dyn SdkClient>) -> Self {
        Self::new(client, CoordinatorConfig::default())
    }

    /// True between `start()` and `stop()`
    pub fn is_running(&self) -> bool {
        self.shared.alive.load(Ordering::SeqCst)
    }

    /// Subscribe to SDK events and perform the initial full fetch.
    ///
    /// Never fails fatally: if the subscription cannot be opened the
    /// coordinator degrades to polling `list()`, and if the initial fetch
    /// fails it continues with an empty view until a refresh succeeds.
    #[instrument(skip(self))]
    pub async fn start(&self) {
        if self.shared.alive.swap(true, Ordering::SeqCst) {
            debug!("coordinator already running");
            return;
        }

        {
            // Fresh lifecycle, fresh bookkeeping: results from a previous
            // run can no longer apply
            let mut table = self.shared.table.write().await;
            table.evictions.clear();
            table.listings_in_flight = 0;
        }

        match self.client.subscribe().await {
            Ok(sub) => {
                info!(subscription = %sub.id, "subscribed to SDK download events");
                *self.subscription.lock().await = Some(sub.id);
                let shared = Arc::clone(&self.shared);
                *self.pump.lock().await = Some(tokio::spawn(Self::pump_events(shared, sub.events)));
            }
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "event subscription failed, degrading to polling");
                let shared = Arc::clone(&self.shared);
                let client = Arc::clone(&self.client);
                let interval = Duration::from_millis(self.config.poll_interval_ms.max(1));
                *self.pump.lock().await =
                    Some(tokio::spawn(Self::poll_loop(shared, client, interval)));
            }
        }

        if let Err(e) = self.refresh().await {
            warn!(error = %e, code = e.error_code(), "initial download fetch failed, continuing with empty view");
        }
    }

    /// Tear down the subscription and stop applying async results.
    ///
    /// Idempotent. The liveness flag drops first, so a refresh or event
    /// already in flight can no longer mutate the mapping; the
    /// subscription handle is then released on every path.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        self.shared.alive.store(false, Ordering::SeqCst);

        if let Some(pump) = self.pump.lock().await.take() {
            pump.abort();
        }

        if let Some(id) = self.subscription.lock().await.take() {
            if let Err(e) = self.client.unsubscribe(id).await {
                warn!(error = %e, "unsubscribe failed during teardown");
            }
        }

        info!("download coordinator stopped");
    }

    /// Re-fetch the full list and replace the mapping wholesale.
    ///
    /// A refresh already in progress is not re-entered; the concurrent
    /// call returns Ok without fetching.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<()> {
        let Ok(_gate) = self.refresh_gate.try_lock() else {
            debug!("refresh already in progress");
            return Ok(());
        };

        let started = self.shared.begin_listing().await;
        let listing = match self.client.list().await {
            Ok(listing) => listing,
            Err(e) => {
                self.shared.abort_listing().await;
                return Err(e);
            }
        };

        if !self.shared.apply_listing(started, listing).await {
            debug!("refresh result dropped after teardown");
        }
        Ok(())
    }

    /// Suspend an active download.
    ///
    /// The record must exist and be downloading. State transitions only
    /// after the SDK confirms; a boundary failure leaves the mapping
    /// untouched and surfaces to the caller.
    #[instrument(skip(self))]
    pub async fn pause(&self, video_id: &VideoId) -> Result<()> {
        let observed = {
            let table = self.shared.table.read().await;
            let tracked = table
                .entries
                .get(video_id)
                .ok_or_else(|| Error::NotFound(video_id.clone()))?;
            if tracked.record.state != DownloadState::Downloading {
                return Err(Error::InvalidStateTransition {
                    from: tracked.record.state,
                    to: DownloadState::Paused,
                });
            }
            tracked.state_seq
        };

        self.client.pause(video_id).await?;
        self.finish_transition(video_id, observed, DownloadState::Paused)
            .await;
        Ok(())
    }

    /// Resume a paused download, displacing whatever is active.
    ///
    /// At most one download may be active, so every other downloading
    /// record is paused first, in mapping order, one awaited step at a
    /// time. Displaced downloads stay paused: resuming them again would
    /// reintroduce a second active download. Already-downloading targets
    /// are a no-op. Any failing step aborts the rest and triggers a
    /// reconciling refresh before the error surfaces.
    #[instrument(skip(self))]
    pub async fn resume(&self, video_id: &VideoId) -> Result<()> {
        let (observed, active) = {
            let table = self.shared.table.read().await;
            let tracked = table
                .entries
                .get(video_id)
                .ok_or_else(|| Error::NotFound(video_id.clone()))?;
            if tracked.record.state == DownloadState::Downloading {
                return Ok(());
            }
            if !tracked
                .record
                .state
                .can_transition_to(DownloadState::Downloading)
            {
                return Err(Error::InvalidStateTransition {
                    from: tracked.record.state,
                    to: DownloadState::Downloading,
                });
            }
            let active: Vec<(VideoId, u64)> = table
                .entries
                .iter()
                .filter(|(id, tr)| *id != video_id && tr.record.state.is_active())
                .map(|(id, tr)| (id.clone(), tr.state_seq))
                .collect();
            (tracked.state_seq, active)
        };

        for (other, seq) in &active {
            debug!(displacing = %other, target = %video_id, "pausing active download");
            if let Err(e) = self.client.pause(other).await {
                warn!(video_id = %other, error = %e, "displacement pause failed, resynchronizing");
                self.corrective_refresh().await;
                return Err(e);
            }
            self.finish_transition(other, *seq, DownloadState::Paused)
                .await;
        }

        match self.client.resume(video_id).await {
            Ok(()) => {
                self.finish_transition(video_id, observed, DownloadState::Downloading)
                    .await;
                info!(%video_id, "download resumed");
                Ok(())
            }
            Err(e) => {
                self.corrective_refresh().await;
                Err(e)
            }
        }
    }

    /// Remove a download and evict its record.
    ///
    /// On boundary failure the record is retained and a reconciling
    /// refresh runs, since the removal may have partially succeeded on
    /// the device.
    #[instrument(skip(self))]
    pub async fn remove(&self, video_id: &VideoId) -> Result<()> {
        {
            let table = self.shared.table.read().await;
            if !table.entries.contains_key(video_id) {
                return Err(Error::NotFound(video_id.clone()));
            }
        }

        match self.client.remove(video_id).await {
            Ok(()) => {
                self.evict(video_id).await;
                info!(%video_id, "download removed");
                Ok(())
            }
            Err(e) => {
                self.corrective_refresh().await;
                Err(e)
            }
        }
    }

    /// Point-in-time view of all records, in insertion order
    pub async fn snapshot(&self) -> Vec<DownloadRecord> {
        self.shared
            .table
            .read()
            .await
            .entries
            .values()
            .map(|tracked| tracked.record.clone())
            .collect()
    }

    /// Receiver bumped on every mapping change; screens watch this to
    /// re-render
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.shared.changed.subscribe()
    }

    /// Commit a control-operation completion unless it lost the race to
    /// a concurrent event push or refresh
    async fn finish_transition(&self, video_id: &VideoId, observed_seq: u64, to: DownloadState) {
        if !self.shared.alive.load(Ordering::SeqCst) {
            return;
        }
        let mut table = self.shared.table.write().await;
        table.seq += 1;
        let seq = table.seq;
        let Some(tracked) = table.entries.get_mut(video_id) else {
            debug!(%video_id, "dropping completion for evicted record");
            return;
        };
        if tracked.state_seq != observed_seq {
            debug!(%video_id, %to, "dropping stale completion");
            return;
        }
        if tracked.record.state == to {
            return;
        }
        tracked.state_seq = seq;
        tracked.record.state = to;
        tracked.record.updated_at = Utc::now();
        drop(table);
        self.shared.notify();
    }

    async fn evict(&self, video_id: &VideoId) {
        if !self.shared.alive.load(Ordering::SeqCst) {
            return;
        }
        let mut table = self.shared.table.write().await;
        table.seq += 1;
        let seq = table.seq;
        if table.entries.shift_remove(video_id).is_some() {
            if table.listings_in_flight > 0 {
                table.evictions.push((seq, video_id.clone()));
            }
            drop(table);
            self.shared.notify();
        }
    }

    /// Best-effort resynchronization after a failed control sequence
    async fn corrective_refresh(&self) {
        if let Err(e) = self.refresh().await {
            warn!(error = %e, code = e.error_code(), "corrective refresh failed");
        }
    }

    async fn pump_events(shared: Arc<Shared>, mut events: mpsc::Receiver<EventBatch>) {
        while let Some(batch) = events.recv().await {
            if !shared.alive.load(Ordering::SeqCst) {
                break;
            }
            debug!(records = batch.len(), "applying event batch");
            shared.apply_batch(batch).await;
        }
        debug!("event stream closed");
    }

    async fn poll_loop(shared: Arc<Shared>, client: Arc<dyn SdkClient>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if !shared.alive.load(Ordering::SeqCst) {
                break;
            }
            let started = shared.begin_listing().await;
            match client.list().await {
                Ok(listing) => {
                    if !shared.apply_listing(started, listing).await {
                        break;
                    }
                }
                Err(e) => {
                    shared.abort_listing().await;
                    warn!(error = %e, "poll fetch failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::EventSubscription;
    use async_trait::async_trait;
    use std::collections::HashSet as StdHashSet;
    use std::sync::Mutex as StdMutex;

    /// Scripted SDK client: seeded listing, per-operation failure
    /// injection, and an operation log for sequence assertions.
    struct MockSdk {
        records: StdMutex<Vec<DownloadRecord>>,
        failing: StdMutex<StdHashSet<&'static str>>,
        ops: StdMutex<Vec<String>>,
        subscribers: StdMutex<Vec<mpsc::Sender<EventBatch>>>,
    }

    impl MockSdk {
        fn new(records: Vec<DownloadRecord>) -> Arc<Self> {
            Arc::new(Self {
                records: StdMutex::new(records),
                failing: StdMutex::new(StdHashSet::new()),
                ops: StdMutex::new(Vec::new()),
                subscribers: StdMutex::new(Vec::new()),
            })
        }

        fn fail(&self, op: &'static str) {
            self.failing.lock().unwrap().insert(op);
        }

        fn check(&self, op: &'static str, video_id: Option<&VideoId>) -> Result<()> {
            let entry = match video_id {
                Some(id) => format!("{op}:{id}"),
                None => op.to_string(),
            };
            self.ops.lock().unwrap().push(entry);
            if self.failing.lock().unwrap().contains(op) {
                return Err(match video_id {
                    Some(id) => Error::rejected(op, id, "injected failure"),
                    None => Error::BoundaryUnavailable("injected failure".into()),
                });
            }
            Ok(())
        }

        fn ops(&self) -> Vec<String> {
            self.ops.lock().unwrap().clone()
        }

        async fn push(&self, batch: EventBatch) {
            let senders = self.subscribers.lock().unwrap().clone();
            for tx in senders {
                let _ = tx.send(batch.clone()).await;
            }
        }
    }

    #[async_trait]
    impl SdkClient for MockSdk {
        async fn list(&self) -> Result<Vec<DownloadRecord>> {
            self.check("list", None)?;
            Ok(self.records.lock().unwrap().clone())
        }

        async fn pause(&self, video_id: &VideoId) -> Result<()> {
            self.check("pause", Some(video_id))
        }

        async fn resume(&self, video_id: &VideoId) -> Result<()> {
            self.check("resume", Some(video_id))
        }

        async fn remove(&self, video_id: &VideoId) -> Result<()> {
            self.check("remove", Some(video_id))
        }

        async fn status(&self, video_id: &VideoId) -> Result<DownloadState> {
            self.check("status", Some(video_id))?;
            self.records
                .lock()
                .unwrap()
                .iter()
                .find(|r| &r.video_id == video_id)
                .map(|r| r.state)
                .ok_or_else(|| Error::NotFound(video_id.clone()))
        }

        async fn subscribe(&self) -> Result<EventSubscription> {
            self.check("subscribe", None)?;
            let (tx, rx) = mpsc::channel(64);
            self.subscribers.lock().unwrap().push(tx);
            Ok(EventSubscription {
                id: SubscriptionId::new(),
                events: rx,
            })
        }

        async fn unsubscribe(&self, _id: SubscriptionId) -> Result<()> {
            self.check("unsubscribe", None)
        }
    }

    fn record(id: &str, state: DownloadState) -> DownloadRecord {
        let mut r = DownloadRecord::new(id).with_total_bytes(100);
        r.state = state;
        r
    }

    async fn started(records: Vec<DownloadRecord>) -> (Arc<MockSdk>, DownloadCoordinator) {
        let sdk = MockSdk::new(records);
        let coordinator = DownloadCoordinator::with_defaults(sdk.clone());
        coordinator.start().await;
        (sdk, coordinator)
    }

    fn state_of(snapshot: &[DownloadRecord], id: &str) -> DownloadState {
        snapshot
            .iter()
            .find(|r| r.video_id.as_str() == id)
            .expect("record present")
            .state
    }

    #[tokio::test]
    async fn test_start_populates_mapping() {
        let (_sdk, coordinator) = started(vec![
            record("a", DownloadState::Downloading),
            record("b", DownloadState::Paused),
        ])
        .await;

        let snapshot = coordinator.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].video_id.as_str(), "a");
        assert_eq!(snapshot[1].video_id.as_str(), "b");
    }

    #[tokio::test]
    async fn test_start_degrades_when_list_fails() {
        let sdk = MockSdk::new(vec![record("a", DownloadState::Downloading)]);
        sdk.fail("list");
        let coordinator = DownloadCoordinator::with_defaults(sdk.clone());
        coordinator.start().await;

        assert!(coordinator.is_running());
        assert!(coordinator.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_pause_transitions_on_success() {
        let (_sdk, coordinator) = started(vec![record("a", DownloadState::Downloading)]).await;

        coordinator.pause(&"a".into()).await.unwrap();
        let snapshot = coordinator.snapshot().await;
        assert_eq!(state_of(&snapshot, "a"), DownloadState::Paused);
    }

    #[tokio::test]
    async fn test_pause_requires_downloading() {
        let (_sdk, coordinator) = started(vec![record("a", DownloadState::Paused)]).await;

        let err = coordinator.pause(&"a".into()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
        let snapshot = coordinator.snapshot().await;
        assert_eq!(state_of(&snapshot, "a"), DownloadState::Paused);
    }

    #[tokio::test]
    async fn test_pause_failure_leaves_state_unchanged() {
        let (sdk, coordinator) = started(vec![record("a", DownloadState::Downloading)]).await;
        sdk.fail("pause");

        let err = coordinator.pause(&"a".into()).await.unwrap_err();
        assert_eq!(err.error_code(), "OPERATION_REJECTED");
        let snapshot = coordinator.snapshot().await;
        assert_eq!(state_of(&snapshot, "a"), DownloadState::Downloading);
    }

    #[tokio::test]
    async fn test_unknown_video_reports_not_found() {
        let (_sdk, coordinator) = started(vec![]).await;

        assert!(matches!(
            coordinator.pause(&"ghost".into()).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            coordinator.remove(&"ghost".into()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resume_is_idempotent_when_active() {
        let (sdk, coordinator) = started(vec![record("a", DownloadState::Downloading)]).await;

        coordinator.resume(&"a".into()).await.unwrap();
        // No engine calls beyond the startup subscribe + list
        let ops = sdk.ops();
        assert!(!ops.iter().any(|op| op.starts_with("resume")));
    }

    #[tokio::test]
    async fn test_resume_displaces_active_download() {
        let (sdk, coordinator) = started(vec![
            record("a", DownloadState::Downloading),
            record("b", DownloadState::Paused),
        ])
        .await;

        coordinator.resume(&"b".into()).await.unwrap();

        let snapshot = coordinator.snapshot().await;
        assert_eq!(state_of(&snapshot, "a"), DownloadState::Paused);
        assert_eq!(state_of(&snapshot, "b"), DownloadState::Downloading);

        // Displacement is sequential: pause(a) strictly before resume(b)
        let ops = sdk.ops();
        let pause_at = ops.iter().position(|op| op == "pause:a").unwrap();
        let resume_at = ops.iter().position(|op| op == "resume:b").unwrap();
        assert!(pause_at < resume_at);
    }

    #[tokio::test]
    async fn test_single_active_invariant_across_sequence() {
        let (_sdk, coordinator) = started(vec![
            record("a", DownloadState::Downloading),
            record("b", DownloadState::Paused),
            record("c", DownloadState::Paused),
        ])
        .await;

        for id in ["b", "c", "a", "c"] {
            coordinator.resume(&id.into()).await.unwrap();
            let snapshot = coordinator.snapshot().await;
            let active = snapshot.iter().filter(|r| r.state.is_active()).count();
            assert_eq!(active, 1, "after resume({id})");
        }
    }

    #[tokio::test]
    async fn test_resume_failure_triggers_refresh() {
        let (sdk, coordinator) = started(vec![record("a", DownloadState::Paused)]).await;
        sdk.fail("resume");

        assert!(coordinator.resume(&"a".into()).await.is_err());
        let ops = sdk.ops();
        // startup list plus the corrective one
        assert!(ops.iter().filter(|op| *op == "list").count() >= 2);
    }

    #[tokio::test]
    async fn test_remove_evicts_record() {
        let (_sdk, coordinator) = started(vec![
            record("a", DownloadState::Completed),
            record("b", DownloadState::Paused),
        ])
        .await;

        coordinator.remove(&"a".into()).await.unwrap();
        let snapshot = coordinator.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].video_id.as_str(), "b");
    }

    #[tokio::test]
    async fn test_remove_failure_retains_and_refreshes() {
        let (sdk, coordinator) = started(vec![record("a", DownloadState::Paused)]).await;
        sdk.fail("remove");

        assert!(coordinator.remove(&"a".into()).await.is_err());
        assert_eq!(coordinator.snapshot().await.len(), 1);
        let ops = sdk.ops();
        assert!(ops.iter().filter(|op| *op == "list").count() >= 2);
    }

    #[tokio::test]
    async fn test_event_batch_updates_mapping() {
        let (sdk, coordinator) = started(vec![record("a", DownloadState::Downloading)]).await;
        let mut changes = coordinator.subscribe_changes();

        let mut update = record("a", DownloadState::Downloading);
        update.downloaded_bytes = 40;
        sdk.push(vec![update]).await;
        changes.changed().await.unwrap();

        let snapshot = coordinator.snapshot().await;
        assert_eq!(snapshot[0].downloaded_bytes, 40);
    }

    #[tokio::test]
    async fn test_event_creates_unknown_record() {
        let (sdk, coordinator) = started(vec![]).await;
        let mut changes = coordinator.subscribe_changes();

        sdk.push(vec![record("new", DownloadState::Queued)]).await;
        changes.changed().await.unwrap();

        let snapshot = coordinator.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].video_id.as_str(), "new");
    }

    #[tokio::test]
    async fn test_event_cannot_mutate_completed_record() {
        let (sdk, coordinator) = started(vec![
            record("a", DownloadState::Completed),
            record("probe", DownloadState::Queued),
        ])
        .await;
        let mut changes = coordinator.subscribe_changes();

        // Invalid transition for "a" is ignored; "probe" confirms the
        // batch was processed
        sdk.push(vec![
            record("a", DownloadState::Downloading),
            record("probe", DownloadState::Downloading),
        ])
        .await;
        changes.changed().await.unwrap();

        let snapshot = coordinator.snapshot().await;
        assert_eq!(state_of(&snapshot, "a"), DownloadState::Completed);
        assert_eq!(state_of(&snapshot, "probe"), DownloadState::Downloading);
    }

    #[tokio::test]
    async fn test_stop_releases_subscription() {
        let (sdk, coordinator) = started(vec![]).await;

        coordinator.stop().await;
        coordinator.stop().await; // idempotent

        assert!(!coordinator.is_running());
        let ops = sdk.ops();
        assert_eq!(ops.iter().filter(|op| *op == "unsubscribe").count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_replaces_mapping_wholesale() {
        let (sdk, coordinator) = started(vec![
            record("a", DownloadState::Downloading),
            record("b", DownloadState::Paused),
        ])
        .await;

        *sdk.records.lock().unwrap() = vec![record("b", DownloadState::Completed)];
        coordinator.refresh().await.unwrap();

        let snapshot = coordinator.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(state_of(&snapshot, "b"), DownloadState::Completed);
    }
}
