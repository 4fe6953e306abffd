use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use crate::error::{PreviewError, PreviewResult};

/// Lazily computed, request-scoped value.
///
/// The first caller runs the initializer while holding the slot; concurrent
/// callers wait and then observe the same stored `Ok` or `Err`. A
/// `Cancelled` result, or a caller dropped mid-computation, leaves the slot
/// empty so the next caller computes again.
#[derive(Debug)]
pub struct Memo<T> {
    slot: tokio::sync::Mutex<Option<PreviewResult<T>>>,
}

impl<T: Clone> Memo<T> {
    pub fn new() -> Self {
        Self {
            slot: tokio::sync::Mutex::new(None),
        }
    }

    pub async fn get_or_try_init<F, Fut>(&self, init: F) -> PreviewResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PreviewResult<T>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(result) = slot.as_ref() {
            return result.clone();
        }

        let result = init().await;
        if !matches!(result, Err(PreviewError::Cancelled)) {
            *slot = Some(result.clone());
        }
        result
    }

    /// Stored result, if computed and not currently being computed.
    pub fn peek(&self) -> Option<PreviewResult<T>> {
        self.slot.try_lock().ok().and_then(|slot| slot.clone())
    }
}

impl<T: Clone> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Family of memos addressed by key.
#[derive(Debug)]
pub struct MemoMap<K, V> {
    entries: Mutex<HashMap<K, Arc<V>>>,
}

impl<K: Eq + Hash, V> MemoMap<K, V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the entry for `key`, creating it with `make` on first use.
    pub fn get_or_insert_with(&self, key: K, make: impl FnOnce() -> V) -> Arc<V> {
        let mut entries = self.entries.lock();
        Arc::clone(entries.entry(key).or_insert_with(|| Arc::new(make())))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash, V> Default for MemoMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_computation() {
        let memo = Arc::new(Memo::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let memo = Arc::clone(&memo);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                memo.get_or_try_init(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(42)
                })
                .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_are_memoized() {
        let memo = Memo::<u32>::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let result = memo
                .get_or_try_init(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(PreviewError::Internal("boom".to_string()))
                })
                .await;
            assert!(matches!(result, Err(PreviewError::Internal(_))));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_result_is_not_memoized() {
        let memo = Memo::<u32>::new();

        let first = memo
            .get_or_try_init(|| async { Err(PreviewError::Cancelled) })
            .await;
        assert!(matches!(first, Err(PreviewError::Cancelled)));
        assert!(memo.peek().is_none());

        let second = memo.get_or_try_init(|| async { Ok(7) }).await;
        assert_eq!(second.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_dropped_caller_leaves_slot_empty() {
        let memo = Memo::<u32>::new();

        let timed_out = tokio::time::timeout(
            Duration::from_millis(10),
            memo.get_or_try_init(|| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(1)
            }),
        )
        .await;
        assert!(timed_out.is_err());

        let value = memo.get_or_try_init(|| async { Ok(2) }).await;
        assert_eq!(value.unwrap(), 2);
    }

    #[test]
    fn test_memo_map_reuses_entries() {
        let map: MemoMap<&str, Memo<u32>> = MemoMap::new();
        let a = map.get_or_insert_with("a", Memo::new);
        let again = map.get_or_insert_with("a", Memo::new);
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(map.len(), 1);
    }
}
