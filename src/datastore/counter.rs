//! Persisted counter over a preferences store

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use super::preferences::{Preferences, PreferencesStore};
use crate::error::{LabError, Result};

/// A single named, non-negative counter inside a [`PreferencesStore`].
///
/// Values default to 0 when the key is unset and only ever move through
/// [`CounterStore::increment`].
#[derive(Debug, Clone)]
pub struct CounterStore {
    store: Arc<PreferencesStore>,
    key: String,
}

impl CounterStore {
    pub fn new(store: Arc<PreferencesStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn read(&self) -> Result<i64> {
        let prefs = self.store.data().await?;
        Ok(value_of(&prefs, &self.key))
    }

    /// Add one to the counter as a single transaction and return the new value.
    pub async fn increment(&self) -> Result<i64> {
        let key = self.key.clone();
        let prefs = self
            .store
            .update_data(move |prefs| {
                let current = value_of(prefs, &key);
                let next = current
                    .checked_add(1)
                    .ok_or_else(|| LabError::StorageFailure(format!("counter {} overflowed", key)))?;
                prefs.insert(key, next);
                Ok(())
            })
            .await?;

        let value = value_of(&prefs, &self.key);
        debug!("Counter {} incremented to {}", self.key, value);
        Ok(value)
    }

    /// Start observing the counter. The subscription ends when it is dropped.
    pub async fn subscribe(&self) -> Result<CounterSubscription> {
        let rx = self.store.subscribe().await?;
        let last = value_of(&rx.borrow(), &self.key);
        Ok(CounterSubscription {
            rx,
            key: self.key.clone(),
            last,
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.store.subscriber_count()
    }
}

/// Push-style view of one counter.
#[derive(Debug)]
pub struct CounterSubscription {
    rx: watch::Receiver<Preferences>,
    key: String,
    last: i64,
}

impl CounterSubscription {
    /// Last value this subscription observed
    pub fn current(&self) -> i64 {
        self.last
    }

    /// Wait until the counter holds a different value.
    ///
    /// Returns `None` once the underlying store has been dropped.
    pub async fn changed(&mut self) -> Option<i64> {
        loop {
            self.rx.changed().await.ok()?;
            let value = value_of(&self.rx.borrow_and_update(), &self.key);
            if value != self.last {
                self.last = value;
                return Some(value);
            }
        }
    }

    pub fn unsubscribe(self) {
        debug!("Counter {} unsubscribed", self.key);
    }
}

fn value_of(prefs: &Preferences, key: &str) -> i64 {
    prefs.get(key).copied().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::scratch_dir;
    use std::time::Duration;

    fn counter(tag: &str) -> (CounterStore, std::path::PathBuf) {
        let dir = scratch_dir(tag);
        let store = Arc::new(PreferencesStore::open(&dir, "settings"));
        (CounterStore::new(store, "example_counter"), dir)
    }

    #[tokio::test]
    async fn test_fresh_counter_reads_zero() {
        let (counter, _dir) = counter("counter-fresh");
        assert_eq!(counter.read().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_increment_returns_new_value() {
        let (counter, dir) = counter("counter-inc");
        assert_eq!(counter.increment().await.unwrap(), 1);
        assert_eq!(counter.increment().await.unwrap(), 2);
        assert_eq!(counter.read().await.unwrap(), 2);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let (counter, dir) = counter("counter-race");

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let counter = counter.clone();
                tokio::spawn(async move { counter.increment().await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(counter.read().await.unwrap(), 64);

        let reopened = CounterStore::new(
            Arc::new(PreferencesStore::open(&dir, "settings")),
            "example_counter",
        );
        assert_eq!(reopened.read().await.unwrap(), 64);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_overflow_is_storage_failure() {
        let (counter, dir) = counter("counter-overflow");
        counter
            .store
            .update_data(|prefs| {
                prefs.insert("example_counter".into(), i64::MAX);
                Ok(())
            })
            .await
            .unwrap();

        assert!(matches!(counter.increment().await, Err(LabError::StorageFailure(_))));
        assert_eq!(counter.read().await.unwrap(), i64::MAX);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_subscription_sees_other_writers() {
        let (counter, dir) = counter("counter-sub");
        let mut sub = counter.subscribe().await.unwrap();
        assert_eq!(sub.current(), 0);

        let writer = counter.clone();
        tokio::spawn(async move { writer.increment().await });

        let seen = tokio::time::timeout(Duration::from_secs(5), sub.changed())
            .await
            .unwrap();
        assert_eq!(seen, Some(1));
        assert_eq!(sub.current(), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_other_keys_do_not_wake_subscription() {
        let (counter, dir) = counter("counter-otherkey");
        let mut sub = counter.subscribe().await.unwrap();

        counter
            .store
            .update_data(|prefs| {
                prefs.insert("unrelated".into(), 5);
                Ok(())
            })
            .await
            .unwrap();

        let woke = tokio::time::timeout(Duration::from_millis(100), sub.changed()).await;
        assert!(woke.is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_unsubscribe_and_drop_release_subscribers() {
        let (counter, _dir) = counter("counter-unsub");
        let first = counter.subscribe().await.unwrap();
        let second = counter.subscribe().await.unwrap();
        assert_eq!(counter.subscriber_count(), 2);

        first.unsubscribe();
        assert_eq!(counter.subscriber_count(), 1);

        drop(second);
        assert_eq!(counter.subscriber_count(), 0);
    }
}
