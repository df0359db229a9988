//! In-process session store with expiry sweeping.
//!
//! Same semantics as tower-sessions' `MemoryStore`, plus
//! [`AdminSessionStore::delete_expired`] and a background sweep so records
//! of admins who never come back do not accumulate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tower_sessions::SessionStore;
use tower_sessions::cookie::time::OffsetDateTime;
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store;
use tracing::debug;

type Records = Mutex<HashMap<Id, Record>>;

fn lock(records: &Records) -> MutexGuard<'_, HashMap<Id, Record>> {
    records.lock().unwrap_or_else(PoisonError::into_inner)
}

fn is_active(record: &Record, now: OffsetDateTime) -> bool {
    record.expiry_date > now
}

/// Session records held in the process.
///
/// Cheap to clone; clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct AdminSessionStore {
    records: Arc<Records>,
}

impl AdminSessionStore {
    /// Remove every expired record; returns how many were removed.
    pub fn delete_expired(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let mut records = lock(&self.records);
        let before = records.len();
        records.retain(|_, record| is_active(record, now));
        before - records.len()
    }

    /// Number of records held, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    /// Whether no records are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweep expired records every `period` until the store is dropped.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn spawn_expiry_sweep(&self, period: Duration) {
        let records: Weak<Records> = Arc::downgrade(&self.records);
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            // The first tick completes immediately.
            ticks.tick().await;
            loop {
                ticks.tick().await;
                let Some(records) = records.upgrade() else {
                    break;
                };
                let removed = Self { records }.delete_expired();
                if removed > 0 {
                    debug!(removed, "Expired sessions removed");
                }
            }
        });
    }
}

#[async_trait]
impl SessionStore for AdminSessionStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        let mut records = lock(&self.records);
        while records.contains_key(&record.id) {
            record.id = Id::default();
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        lock(&self.records).insert(record.id, record.clone());
        Ok(())
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let now = OffsetDateTime::now_utc();
        Ok(lock(&self.records)
            .get(session_id)
            .filter(|record| is_active(record, now))
            .cloned())
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        lock(&self.records).remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tower_sessions::cookie::time::Duration as TimeDuration;

    use super::*;

    fn record(expires_in: TimeDuration) -> Record {
        Record {
            id: Id::default(),
            data: HashMap::default(),
            expiry_date: OffsetDateTime::now_utc() + expires_in,
        }
    }

    #[tokio::test]
    async fn test_expired_record_is_not_loaded() {
        let store = AdminSessionStore::default();
        let stale = record(TimeDuration::hours(-1));
        store.save(&stale).await.unwrap();

        assert!(store.load(&stale.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_expired_keeps_active_records() {
        let store = AdminSessionStore::default();
        let live = record(TimeDuration::hours(1));
        store.save(&live).await.unwrap();
        store.save(&record(TimeDuration::hours(-1))).await.unwrap();
        store.save(&record(TimeDuration::seconds(-1))).await.unwrap();

        assert_eq!(store.delete_expired(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.load(&live.id).await.unwrap().unwrap().id, live.id);
    }

    #[tokio::test]
    async fn test_create_assigns_unused_id() {
        let store = AdminSessionStore::default();
        let first = record(TimeDuration::hours(1));
        store.save(&first).await.unwrap();

        let mut second = first.clone();
        store.create(&mut second).await.unwrap();

        assert_ne!(second.id, first.id);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_records() {
        let store = AdminSessionStore::default();
        store.save(&record(TimeDuration::hours(-1))).await.unwrap();

        store.spawn_expiry_sweep(Duration::from_millis(5));

        for _ in 0..200 {
            if store.is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expired session was not swept");
    }
}
