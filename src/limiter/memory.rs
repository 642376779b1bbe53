//! In-process counter store: a mutex-guarded fixed-window map.
//!
//! Suitable for tests and single-process deployments. The mutex makes the
//! increment-then-read indivisible; nothing awaits while it is held.

use super::{CounterError, CounterStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct WindowSlot {
    count: u64,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryCounterStore {
    windows: Mutex<HashMap<String, WindowSlot>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        MemoryCounterStore {
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Current count for `key` within its live window, if any.
    pub fn current(&self, key: &str) -> Option<u64> {
        let windows = self.windows.lock().ok()?;
        windows
            .get(key)
            .filter(|slot| slot.expires_at > Instant::now())
            .map(|slot| slot.count)
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, CounterError> {
        let now = Instant::now();
        let mut windows = self
            .windows
            .lock()
            .map_err(|_| CounterError::Unavailable("counter store lock".into()))?;
        let slot = windows.entry(key.to_string()).or_insert(WindowSlot {
            count: 0,
            expires_at: now + window,
        });
        if slot.expires_at <= now {
            // Window elapsed: start a fresh one.
            slot.count = 0;
            slot.expires_at = now + window;
        }
        slot.count += 1;
        Ok(slot.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_hit_initializes_to_one() {
        let store = MemoryCounterStore::new();
        let n = store.increment("k", Duration::from_secs(60)).await.unwrap();
        assert_eq!(n, 1);
        assert_eq!(store.current("k"), Some(1));
    }

    #[tokio::test]
    async fn hits_within_window_accumulate() {
        let store = MemoryCounterStore::new();
        for expected in 1..=4 {
            let n = store.increment("k", Duration::from_secs(60)).await.unwrap();
            assert_eq!(n, expected);
        }
    }

    #[tokio::test]
    async fn expired_window_reinitializes() {
        let store = MemoryCounterStore::new();
        store.increment("k", Duration::from_millis(20)).await.unwrap();
        store.increment("k", Duration::from_millis(20)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.current("k"), None);
        let n = store.increment("k", Duration::from_millis(20)).await.unwrap();
        assert_eq!(n, 1);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let store = MemoryCounterStore::new();
        store.increment("a", Duration::from_secs(60)).await.unwrap();
        store.increment("a", Duration::from_secs(60)).await.unwrap();
        let n = store.increment("b", Duration::from_secs(60)).await.unwrap();
        assert_eq!(n, 1);
        assert_eq!(store.current("a"), Some(2));
    }
}
