//! Standing queries shared between subscribers.
//!
//! One poller runs per distinct query no matter how many dashboards are
//! watching it. Snapshots fan out through a `watch` channel, unchanged
//! result sets are not re-sent, and the poller stops once its last
//! subscriber is gone.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::watch;
use tracing::debug;

use crate::backend::{BackendError, Direction, Snapshot, Subscription};

/// Runs one query and returns its full result set.
pub type Fetch = Arc<dyn Fn() -> BoxFuture<'static, Result<Snapshot, BackendError>> + Send + Sync>;

/// Latest outcome of a query; `None` until the first poll completes.
type Latest = Option<Result<Snapshot, BackendError>>;

/// Identity of a standing query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub collection: String,
    pub order_field: String,
    pub direction: Direction,
}

struct LiveQuery {
    sender: watch::Sender<Latest>,
    /// Replaced by each new subscriber so polls use the freshest ID token.
    fetch: Arc<Mutex<Fetch>>,
}

type Queries = Arc<Mutex<HashMap<QueryKey, LiveQuery>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of running pollers.
///
/// Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct LiveQueries {
    queries: Queries,
    interval: Duration,
}

impl std::fmt::Debug for LiveQueries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveQueries")
            .field("active", &self.active())
            .field("interval", &self.interval)
            .finish()
    }
}

impl LiveQueries {
    /// Create an empty registry polling every `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            queries: Arc::default(),
            interval,
        }
    }

    /// Number of pollers currently running.
    #[must_use]
    pub fn active(&self) -> usize {
        lock(&self.queries).len()
    }

    /// Subscribe to `key`, starting its poller if none is running.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn subscribe(&self, key: QueryKey, fetch: Fetch) -> Subscription {
        let mut receiver = {
            let mut queries = lock(&self.queries);
            if let Some(query) = queries.get(&key) {
                *lock(&query.fetch) = fetch;
                query.sender.subscribe()
            } else {
                let (sender, receiver) = watch::channel(None);
                let fetch = Arc::new(Mutex::new(fetch));
                queries.insert(
                    key.clone(),
                    LiveQuery {
                        sender: sender.clone(),
                        fetch: Arc::clone(&fetch),
                    },
                );
                debug!(collection = %key.collection, "Live query started");
                tokio::spawn(poll(
                    Arc::clone(&self.queries),
                    key,
                    sender,
                    fetch,
                    self.interval,
                ));
                receiver
            }
        };

        Box::pin(async_stream::stream! {
            loop {
                let latest = receiver.borrow_and_update().clone();
                match latest {
                    Some(Ok(snapshot)) => yield Ok(snapshot),
                    Some(Err(err)) => {
                        yield Err(err);
                        break;
                    }
                    None => {}
                }
                if receiver.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}

/// Poll one query until it fails or nobody is listening.
async fn poll(
    queries: Queries,
    key: QueryKey,
    sender: watch::Sender<Latest>,
    fetch: Arc<Mutex<Fetch>>,
    interval: Duration,
) {
    loop {
        let current = Arc::clone(&*lock(&fetch));
        let result = current().await;
        let failed = result.is_err();

        sender.send_if_modified(|latest| {
            if matches!((&*latest, &result), (Some(Ok(previous)), Ok(next)) if previous == next) {
                return false;
            }
            *latest = Some(result);
            true
        });

        if failed {
            lock(&queries).remove(&key);
            debug!(collection = %key.collection, "Live query failed");
            return;
        }

        tokio::time::sleep(interval).await;

        // Checked under the registry lock so a concurrent subscribe either
        // joins this poller or starts a new one.
        let idle = {
            let mut queries = lock(&queries);
            let idle = sender.receiver_count() == 0;
            if idle {
                queries.remove(&key);
            }
            idle
        };
        if idle {
            debug!(collection = %key.collection, "Live query stopped");
            return;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::{FutureExt, StreamExt};
    use shopfloor_core::DocumentId;

    use super::*;
    use crate::backend::{Fields, StoredDocument};

    const INTERVAL: Duration = Duration::from_millis(5);

    fn key(collection: &str) -> QueryKey {
        QueryKey {
            collection: collection.to_string(),
            order_field: "createdAt".to_string(),
            direction: Direction::Descending,
        }
    }

    fn doc(id: &str) -> StoredDocument {
        StoredDocument {
            id: DocumentId::parse(id).unwrap(),
            fields: Fields::new(),
        }
    }

    /// A fetch returning `snapshot(call_number)` and counting its calls.
    fn counting(
        calls: &Arc<AtomicUsize>,
        snapshot: impl Fn(usize) -> Result<Snapshot, BackendError> + Send + Sync + 'static,
    ) -> Fetch {
        let calls = Arc::clone(calls);
        Arc::new(move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            let result = snapshot(n);
            async move { result }.boxed()
        })
    }

    async fn wait_until_idle(live: &LiveQueries) {
        for _ in 0..200 {
            if live.active() == 0 {
                return;
            }
            tokio::time::sleep(INTERVAL).await;
        }
        panic!("poller still running");
    }

    #[tokio::test]
    async fn test_subscribers_share_one_poller() {
        let live = LiveQueries::new(INTERVAL);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut first = live.subscribe(key("products"), counting(&calls, |_| Ok(vec![doc("a")])));
        let mut second = live.subscribe(key("products"), counting(&calls, |_| Ok(vec![doc("a")])));
        assert_eq!(live.active(), 1);

        assert_eq!(first.next().await.unwrap().unwrap(), vec![doc("a")]);
        assert_eq!(second.next().await.unwrap().unwrap(), vec![doc("a")]);

        let _other = live.subscribe(key("archive"), counting(&calls, |_| Ok(Vec::new())));
        assert_eq!(live.active(), 2);
    }

    #[tokio::test]
    async fn test_unchanged_snapshots_are_not_resent() {
        let live = LiveQueries::new(INTERVAL);
        let calls = Arc::new(AtomicUsize::new(0));
        let mut products = live.subscribe(key("products"), counting(&calls, |_| Ok(vec![doc("a")])));

        assert_eq!(products.next().await.unwrap().unwrap(), vec![doc("a")]);
        let next = tokio::time::timeout(Duration::from_millis(60), products.next()).await;

        assert!(next.is_err(), "unchanged snapshot was re-sent");
        assert!(calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_changed_snapshot_is_sent() {
        let live = LiveQueries::new(INTERVAL);
        let calls = Arc::new(AtomicUsize::new(0));
        let mut products = live.subscribe(
            key("products"),
            counting(&calls, |n| {
                if n == 0 {
                    Ok(Vec::new())
                } else {
                    Ok(vec![doc("a")])
                }
            }),
        );

        assert!(products.next().await.unwrap().unwrap().is_empty());
        assert_eq!(products.next().await.unwrap().unwrap(), vec![doc("a")]);
    }

    #[tokio::test]
    async fn test_poller_stops_without_subscribers() {
        let live = LiveQueries::new(INTERVAL);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut products = live.subscribe(key("products"), counting(&calls, |_| Ok(Vec::new())));
        products.next().await.unwrap().unwrap();
        drop(products);

        wait_until_idle(&live).await;
        let stopped_at = calls.load(Ordering::SeqCst);
        tokio::time::sleep(INTERVAL * 4).await;
        assert_eq!(calls.load(Ordering::SeqCst), stopped_at);
    }

    #[tokio::test]
    async fn test_error_ends_subscription_and_poller() {
        let live = LiveQueries::new(INTERVAL);
        let calls = Arc::new(AtomicUsize::new(0));
        let mut products = live.subscribe(
            key("products"),
            counting(&calls, |_| Err(BackendError::permission_denied())),
        );

        assert_eq!(
            products.next().await.unwrap().unwrap_err(),
            BackendError::permission_denied()
        );
        assert!(products.next().await.is_none());
        wait_until_idle(&live).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
