//! # Snapshot requests
//!
//! Queries that need the live display state register a pending request, ask
//! the display process for a refresh and wait until the next `CURRENT_STATUS`
//! acknowledgement or the timeout, whichever comes first.
//!
//! Requests issued while a refresh is already outstanding piggyback on it:
//! only one `UPDATE` notification is emitted per acknowledgement cycle.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use serde_json::Value;
use tokio::{sync::oneshot, time::Instant};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::bus::{NotificationBus, names};
use crate::snapshot::DisplaySnapshot;

type RequestId = String;

/// A query waiting for the next snapshot.
pub struct PendingRequest {
    request_id: RequestId,
    deadline: Instant,
    /// Taken on fulfillment, so a request completes at most once.
    completion: Option<oneshot::Sender<DisplaySnapshot>>,
}

impl PendingRequest {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn fulfilled(&self) -> bool {
        self.completion.is_none()
    }

    fn fulfill(&mut self, snapshot: &DisplaySnapshot) -> bool {
        match self.completion.take() {
            Some(sender) => sender.send(snapshot.clone()).is_ok(),
            None => false,
        }
    }
}

pub struct SnapshotRequests {
    bus: NotificationBus,
    pending: Arc<DashMap<RequestId, PendingRequest>>,
    refresh_outstanding: AtomicBool,
    timeout: Duration,
}

impl SnapshotRequests {
    pub fn new(bus: NotificationBus, timeout: Duration) -> Self {
        Self {
            bus,
            pending: Arc::new(DashMap::new()),
            refresh_outstanding: AtomicBool::new(false),
            timeout,
        }
    }

    /// Asks for a fresh snapshot and waits for it. `None` means the display
    /// process did not acknowledge in time; callers fall back to the last
    /// known snapshot.
    #[instrument(skip(self))]
    pub async fn fresh_snapshot(&self) -> Option<DisplaySnapshot> {
        let (tx, rx) = oneshot::channel();
        let request_id = Uuid::new_v4().to_string();
        self.pending.insert(
            request_id.clone(),
            PendingRequest {
                request_id: request_id.clone(),
                deadline: Instant::now() + self.timeout,
                completion: Some(tx),
            },
        );
        let _guard = PendingGuard {
            requests: self,
            request_id: request_id.clone(),
        };

        if !self.refresh_outstanding.swap(true, Ordering::SeqCst) {
            self.bus.send(names::UPDATE, Value::Null);
        } else {
            debug!(%request_id, "Joining outstanding refresh");
        }

        let sleep = tokio::time::sleep(self.timeout);
        tokio::pin!(sleep);

        tokio::select! {
            _ = &mut sleep => {
                debug!(%request_id, "Snapshot request timed out");
                None
            }
            result = rx => result.ok(),
        }
    }

    /// Completes every pending request with `snapshot`. Returns how many
    /// waiters received it.
    pub fn fulfill(&self, snapshot: &DisplaySnapshot) -> usize {
        self.refresh_outstanding.store(false, Ordering::SeqCst);
        let ids: Vec<RequestId> = self.pending.iter().map(|e| e.key().clone()).collect();
        ids.iter()
            .filter_map(|id| self.pending.remove(id))
            .map(|(_, mut pending)| pending.fulfill(snapshot))
            .filter(|delivered| *delivered)
            .count()
    }

    /// Drops requests whose deadline has passed.
    pub fn expire(&self) -> usize {
        let now = Instant::now();
        let before = self.pending.len();
        self.pending.retain(|_, pending| pending.deadline > now);
        let expired = before - self.pending.len();
        self.settle();
        expired
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn refresh_outstanding(&self) -> bool {
        self.refresh_outstanding.load(Ordering::SeqCst)
    }

    // 待機者がいなくなったら次のリクエストで再度UPDATEを送る
    fn settle(&self) {
        if self.pending.is_empty() {
            self.refresh_outstanding.store(false, Ordering::SeqCst);
        }
    }
}

/// Removes a request from the table when its waiter finishes or is dropped.
struct PendingGuard<'a> {
    requests: &'a SnapshotRequests,
    request_id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.requests.pending.remove(&self.request_id);
        self.requests.settle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(brightness: u64) -> DisplaySnapshot {
        serde_json::from_value(json!({"moduleData": [], "brightness": brightness})).unwrap()
    }

    fn setup(timeout: Duration) -> (NotificationBus, Arc<SnapshotRequests>) {
        let bus = NotificationBus::new(16);
        let requests = Arc::new(SnapshotRequests::new(bus.clone(), timeout));
        (bus, requests)
    }

    #[tokio::test]
    async fn test_fresh_snapshot_is_delivered() {
        let (bus, requests) = setup(Duration::from_secs(5));
        let mut rx = bus.subscribe();

        let waiter = tokio::spawn({
            let requests = requests.clone();
            async move { requests.fresh_snapshot().await }
        });

        let update = rx.recv().await.unwrap();
        assert_eq!(update.notification, names::UPDATE);

        assert_eq!(requests.fulfill(&snapshot(60)), 1);
        let result = waiter.await.unwrap().unwrap();
        assert_eq!(result.brightness, Some(60.into()));
        assert!(requests.is_empty());
        assert!(!requests.refresh_outstanding());
    }

    #[tokio::test]
    async fn test_timeout_returns_none_and_cleans_up() {
        let (_bus, requests) = setup(Duration::from_millis(50));

        let started = std::time::Instant::now();
        assert!(requests.fresh_snapshot().await.is_none());
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(requests.is_empty());
        assert!(!requests.refresh_outstanding());
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_refresh() {
        let (bus, requests) = setup(Duration::from_secs(5));
        let mut rx = bus.subscribe();

        let first = tokio::spawn({
            let requests = requests.clone();
            async move { requests.fresh_snapshot().await }
        });
        let second = tokio::spawn({
            let requests = requests.clone();
            async move { requests.fresh_snapshot().await }
        });

        while requests.len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let updates: Vec<_> = rx
            .drain()
            .into_iter()
            .filter(|n| n.notification == names::UPDATE)
            .collect();
        assert_eq!(updates.len(), 1);

        assert_eq!(requests.fulfill(&snapshot(10)), 2);
        assert!(first.await.unwrap().is_some());
        assert!(second.await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_fulfillment_happens_once() {
        let (_bus, requests) = setup(Duration::from_secs(5));

        let waiter = tokio::spawn({
            let requests = requests.clone();
            async move { requests.fresh_snapshot().await }
        });
        while requests.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(requests.fulfill(&snapshot(1)), 1);
        assert_eq!(requests.fulfill(&snapshot(2)), 0);
        assert_eq!(waiter.await.unwrap().unwrap().brightness, Some(1.into()));
    }

    #[tokio::test]
    async fn test_dropped_waiter_is_removed() {
        let (_bus, requests) = setup(Duration::from_secs(5));

        let waiter = tokio::spawn({
            let requests = requests.clone();
            async move { requests.fresh_snapshot().await }
        });
        while requests.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        waiter.abort();
        let _ = waiter.await;

        assert!(requests.is_empty());
        assert!(!requests.refresh_outstanding());
    }

    #[test]
    fn test_pending_request_single_fulfillment() {
        let (tx, _rx) = oneshot::channel();
        let mut pending = PendingRequest {
            request_id: "req".to_string(),
            deadline: Instant::now(),
            completion: Some(tx),
        };
        assert!(!pending.fulfilled());
        assert!(pending.fulfill(&snapshot(5)));
        assert!(pending.fulfilled());
        assert!(!pending.fulfill(&snapshot(6)));
        assert_eq!(pending.request_id(), "req");
    }
}
