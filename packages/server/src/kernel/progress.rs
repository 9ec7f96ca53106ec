//! Progress streaming for long-running jobs (bulk imports, re-analysis).
//!
//! Two layers per `(user, job)`:
//! - live delivery through the in-process [`StreamHub`]
//! - a seq-numbered event log in the cache for reconnect replay
//!
//! Events carry a monotonically increasing `seq` assigned by the single
//! writer (the job's [`ProgressTracker`]). Subscribers supply a
//! `last_seen` cursor; they receive every logged event past it, then
//! switch to live delivery, de-duplicated by seq. The stream terminates
//! once a terminal event has been delivered. Terminal events stay
//! replayable until the log's TTL expires.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use crate::common::entity_ids::{JobId, UserId};
use crate::kernel::cache::{self, cache_get_json, cache_set_json, CacheStore};
use crate::kernel::stream_hub::StreamHub;

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Running,
    Done,
    Cancelled,
    Failed,
}

impl ProgressStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressStatus::Running)
    }
}

/// One progress update. The wire shape of the streaming protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub seq: u64,
    pub status: ProgressStatus,
    pub processed: u64,
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn topic(user: UserId, job: JobId) -> String {
    format!("progress:{}:{}", user, job)
}

// ============================================================================
// Publisher side
// ============================================================================

/// Single writer for one job's progress stream.
///
/// Owned by the job loop; assigns seq numbers, appends to the cache log,
/// and fans out to live subscribers. Cache failures degrade to live-only
/// delivery (reconnect replay is lost, the job keeps running).
pub struct ProgressTracker {
    hub: StreamHub,
    cache: Arc<dyn CacheStore>,
    user: UserId,
    job: JobId,
    ttl: Duration,
    seq: AtomicU64,
}

impl ProgressTracker {
    pub fn job_id(&self) -> JobId {
        self.job
    }

    /// Publish the next event. Returns the seq it was assigned.
    pub async fn publish(
        &self,
        status: ProgressStatus,
        processed: u64,
        total: u64,
        succeeded: u64,
        failed: u64,
        last_url: Option<String>,
        error: Option<String>,
    ) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let event = ProgressEvent {
            seq,
            status,
            processed,
            total,
            succeeded,
            failed,
            last_url,
            error,
        };

        let key = cache::keys::progress(self.user, self.job);
        let mut log: Vec<ProgressEvent> =
            cache_get_json(self.cache.as_ref(), &key).await.unwrap_or_default();
        log.push(event.clone());
        cache_set_json(self.cache.as_ref(), &key, &log, Some(self.ttl)).await;

        match serde_json::to_value(&event) {
            Ok(value) => {
                self.hub.publish(&topic(self.user, self.job), value).await;
            }
            Err(e) => warn!(error = %e, "progress event failed to serialize"),
        }

        seq
    }
}

// ============================================================================
// Subscriber side
// ============================================================================

/// A subscriber's view of one job's stream.
///
/// Yields events strictly ordered by seq, starting after `last_seen`,
/// ending with the terminal event.
pub struct ProgressSubscription {
    replay: VecDeque<ProgressEvent>,
    rx: broadcast::Receiver<serde_json::Value>,
    last_seen: u64,
    finished: bool,
}

impl ProgressSubscription {
    /// Next event, or `None` once the stream has terminated.
    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        loop {
            if self.finished {
                return None;
            }

            let event = if let Some(event) = self.replay.pop_front() {
                event
            } else {
                match self.rx.recv().await {
                    Ok(value) => match serde_json::from_value(value) {
                        Ok(event) => event,
                        Err(_) => continue,
                    },
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            };

            // Seq-order dedup across the replay/live seam
            if event.seq <= self.last_seen {
                continue;
            }
            self.last_seen = event.seq;

            if event.status.is_terminal() {
                self.finished = true;
            }
            return Some(event);
        }
    }
}

// ============================================================================
// Service
// ============================================================================

/// Entry point for both sides of progress streaming.
#[derive(Clone)]
pub struct ProgressStreams {
    hub: StreamHub,
    cache: Arc<dyn CacheStore>,
}

impl ProgressStreams {
    pub fn new(hub: StreamHub, cache: Arc<dyn CacheStore>) -> Self {
        Self { hub, cache }
    }

    /// Mint a job id and its tracker. `expected_duration` bounds the
    /// replay log's lifetime (plus a fixed tail for late subscribers).
    pub fn start_job(&self, user: UserId, expected_duration: Duration) -> ProgressTracker {
        ProgressTracker {
            hub: self.hub.clone(),
            cache: self.cache.clone(),
            user,
            job: Uuid::new_v4(),
            ttl: expected_duration + cache::keys::TTL_PROGRESS_TAIL,
            seq: AtomicU64::new(0),
        }
    }

    /// Subscribe to a job's stream from a cursor (0 = from the start).
    pub async fn subscribe(
        &self,
        user: UserId,
        job: JobId,
        last_seen: u64,
    ) -> ProgressSubscription {
        // Live subscription first, then the log read: overlap between the
        // two is de-duplicated by seq, a gap is impossible this way round.
        let rx = self.hub.subscribe(&topic(user, job)).await;

        let key = cache::keys::progress(user, job);
        let log: Vec<ProgressEvent> =
            cache_get_json(self.cache.as_ref(), &key).await.unwrap_or_default();

        ProgressSubscription {
            replay: log.into_iter().collect(),
            rx,
            last_seen,
            finished: false,
        }
    }

    /// Flag a job for cancellation. The job loop checks between items.
    pub async fn request_cancel(&self, user: UserId, job: JobId) {
        let key = cache::keys::job_cancel(user, job);
        if let Err(e) = self
            .cache
            .set(&key, b"1", Some(Duration::from_secs(24 * 60 * 60)))
            .await
        {
            warn!(job = %job, error = %e, "failed to set cancel flag");
        }
    }

    /// Whether cancellation has been requested.
    pub async fn is_cancelled(&self, user: UserId, job: JobId) -> bool {
        let key = cache::keys::job_cancel(user, job);
        matches!(self.cache.get(&key).await, Ok(Some(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::cache::InMemoryCacheStore;

    fn service() -> ProgressStreams {
        ProgressStreams::new(StreamHub::new(), Arc::new(InMemoryCacheStore::new()))
    }

    #[tokio::test]
    async fn events_arrive_in_seq_order_without_gaps() {
        let streams = service();
        let user = Uuid::new_v4();
        let tracker = streams.start_job(user, Duration::from_secs(60));
        let job = tracker.job_id();

        let mut sub = streams.subscribe(user, job, 0).await;

        for i in 1..=4u64 {
            tracker
                .publish(ProgressStatus::Running, i, 5, i, 0, None, None)
                .await;
        }
        tracker
            .publish(ProgressStatus::Done, 5, 5, 5, 0, None, None)
            .await;

        let mut seqs = Vec::new();
        while let Some(event) = sub.next_event().await {
            seqs.push(event.seq);
        }
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn reconnect_replays_only_past_cursor() {
        let streams = service();
        let user = Uuid::new_v4();
        let tracker = streams.start_job(user, Duration::from_secs(60));
        let job = tracker.job_id();

        for i in 1..=7u64 {
            tracker
                .publish(ProgressStatus::Running, i, 10, i, 0, None, None)
                .await;
        }

        // Late subscriber with last_seen = 5
        let mut sub = streams.subscribe(user, job, 5).await;

        for i in 8..=9u64 {
            tracker
                .publish(ProgressStatus::Running, i, 10, i, 0, None, None)
                .await;
        }
        tracker
            .publish(ProgressStatus::Done, 10, 10, 10, 0, None, None)
            .await;

        let first = sub.next_event().await.unwrap();
        assert_eq!(first.seq, 6);

        let mut last = first;
        while let Some(event) = sub.next_event().await {
            assert_eq!(event.seq, last.seq + 1);
            last = event;
        }
        assert_eq!(last.seq, 10);
        assert_eq!(last.status, ProgressStatus::Done);
    }

    #[tokio::test]
    async fn terminal_event_is_replayed_for_late_subscribers() {
        let streams = service();
        let user = Uuid::new_v4();
        let tracker = streams.start_job(user, Duration::from_secs(60));
        let job = tracker.job_id();

        tracker
            .publish(ProgressStatus::Running, 1, 2, 1, 0, None, None)
            .await;
        tracker
            .publish(ProgressStatus::Done, 2, 2, 2, 0, None, None)
            .await;

        // Subscriber arriving after completion still sees the whole log
        let mut sub = streams.subscribe(user, job, 0).await;
        assert_eq!(sub.next_event().await.unwrap().seq, 1);
        let terminal = sub.next_event().await.unwrap();
        assert_eq!(terminal.status, ProgressStatus::Done);
        assert!(sub.next_event().await.is_none());
    }

    #[tokio::test]
    async fn cancellation_flag_roundtrip() {
        let streams = service();
        let user = Uuid::new_v4();
        let job = Uuid::new_v4();

        assert!(!streams.is_cancelled(user, job).await);
        streams.request_cancel(user, job).await;
        assert!(streams.is_cancelled(user, job).await);
    }

    #[tokio::test]
    async fn streams_are_isolated_per_job() {
        let streams = service();
        let user = Uuid::new_v4();
        let t1 = streams.start_job(user, Duration::from_secs(60));
        let t2 = streams.start_job(user, Duration::from_secs(60));

        t1.publish(ProgressStatus::Done, 1, 1, 1, 0, None, None).await;

        let mut sub2 = streams.subscribe(user, t2.job_id(), 0).await;
        t2.publish(ProgressStatus::Done, 2, 2, 2, 0, None, None).await;

        let event = sub2.next_event().await.unwrap();
        assert_eq!(event.processed, 2);
        assert!(sub2.next_event().await.is_none());
    }
}
