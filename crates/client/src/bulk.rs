//! Concurrent bulk lookups.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;

use tokio::task::JoinSet;

use markcache_core::Error;

/// Run `lookup` for every key concurrently and collect the successes.
///
/// One task per key. A key whose lookup errors or panics is logged and left
/// out of the result; its siblings are unaffected.
pub async fn resolve_many<K, T, F, Fut>(keys: impl IntoIterator<Item = K>, mut lookup: F) -> HashMap<K, T>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + 'static,
    T: Send + 'static,
    F: FnMut(K) -> Fut,
    Fut: Future<Output = Result<T, Error>> + Send + 'static,
{
    let mut join_set = JoinSet::new();
    let mut pending = HashMap::new();

    for key in keys {
        if pending.values().any(|k| k == &key) {
            continue;
        }
        let handle = join_set.spawn(lookup(key.clone()));
        pending.insert(handle.id(), key);
    }

    let mut results = HashMap::with_capacity(pending.len());
    while let Some(joined) = join_set.join_next_with_id().await {
        match joined {
            Ok((id, Ok(value))) => {
                if let Some(key) = pending.remove(&id) {
                    results.insert(key, value);
                }
            }
            Ok((id, Err(e))) => {
                let key = pending.remove(&id);
                if e.is_input_error() {
                    tracing::debug!(key = ?key, error = %e, "bulk lookup rejected input");
                } else {
                    tracing::warn!(key = ?key, error = %e, "bulk lookup failed");
                }
            }
            Err(e) => {
                let key = pending.remove(&e.id());
                tracing::warn!(key = ?key, error = %e, "bulk lookup panicked");
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_collects_successes() {
        let results = resolve_many(vec![1u32, 2, 3], |n| async move { Ok::<_, Error>(n * 10) }).await;
        assert_eq!(results, HashMap::from([(1, 10), (2, 20), (3, 30)]));
    }

    #[tokio::test]
    async fn test_errors_and_panics_are_isolated() {
        let results = resolve_many(vec![1u32, 2, 3, 4, 5], |n| async move {
            match n {
                2 => Err(Error::InvalidInput("two".into())),
                3 => panic!("three"),
                n => Ok(n),
            }
        })
        .await;

        assert_eq!(results.len(), 3);
        assert!(!results.contains_key(&2));
        assert!(!results.contains_key(&3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_concurrently() {
        let start = tokio::time::Instant::now();
        let results = resolve_many(0u32..8, |n| async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, Error>(n)
        })
        .await;

        assert_eq!(results.len(), 8);
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_duplicate_keys_run_once() {
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let results = resolve_many(vec!["a".to_string(), "a".to_string()], |k| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok::<_, Error>(k.len())
            }
        })
        .await;

        assert_eq!(results.len(), 1);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty() {
        let results = resolve_many(Vec::<String>::new(), |k| async move { Ok::<_, Error>(k) }).await;
        assert!(results.is_empty());
    }
}
