//! Bounded fan-out shared by the paging and enrichment phases.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::sources::RequestError;
use crate::utils::ProgressTracker;

/// Clamp a requested worker count into `1..=max`
pub fn clamp_workers(requested: usize, max: usize) -> usize {
    requested.clamp(1, max.max(1))
}

/// Run `task` once per key with at most `workers` tasks in flight.
///
/// Tasks complete in any order; results are keyed, so callers read them back
/// in key order once every task has joined. A task that dies without
/// producing a result is reported as an error for its key.
pub(crate) async fn run_bounded<K, T, F, Fut>(
    keys: Vec<K>,
    workers: usize,
    progress: &ProgressTracker,
    task: F,
) -> BTreeMap<K, Result<T, RequestError>>
where
    K: Ord + Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T, RequestError>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut set = JoinSet::new();

    for key in keys.iter().cloned() {
        let semaphore = semaphore.clone();
        let work = task(key.clone());
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            (key, work.await)
        });
    }

    let mut results = BTreeMap::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((key, result)) => {
                progress.record(result.is_ok());
                results.insert(key, result);
            }
            Err(err) => tracing::error!("Worker task failed: {}", err),
        }
    }

    for key in keys {
        results.entry(key).or_insert_with(|| {
            progress.record(false);
            Err(RequestError::Other("worker task aborted".to_string()))
        });
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_clamp_workers() {
        assert_eq!(clamp_workers(0, 2), 1);
        assert_eq!(clamp_workers(1, 2), 1);
        assert_eq!(clamp_workers(8, 2), 2);
        assert_eq!(clamp_workers(3, 4), 3);
        assert_eq!(clamp_workers(5, 0), 1);
    }

    #[tokio::test]
    async fn test_never_exceeds_worker_count() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let progress = ProgressTracker::new("test", 20, 100);

        let results = {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            run_bounded((0..20u32).collect(), 3, &progress, move |key| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(key * 10)
                }
            })
            .await
        };

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(results.len(), 20);
        assert_eq!(results[&7].as_ref().unwrap(), &70);
        assert_eq!(progress.snapshot().completed, 20);
    }

    #[tokio::test]
    async fn test_failures_are_keyed() {
        let progress = ProgressTracker::new("test", 3, 100);
        let results = run_bounded(vec!["a", "b", "c"], 2, &progress, |key| async move {
            if key == "b" {
                Err(RequestError::Network("down".to_string()))
            } else {
                Ok(key.len())
            }
        })
        .await;

        assert!(results["a"].is_ok());
        assert!(results["b"].is_err());
        assert!(results["c"].is_ok());
        assert_eq!(progress.snapshot().failed, 1);
    }

    #[tokio::test]
    async fn test_panicking_task_reported_as_error() {
        let progress = ProgressTracker::new("test", 2, 100);
        let results = run_bounded(vec![1u32, 2], 2, &progress, |key| async move {
            if key == 2 {
                panic!("boom");
            }
            Ok(key)
        })
        .await;

        assert!(results[&1].is_ok());
        assert!(matches!(results[&2], Err(RequestError::Other(_))));
        assert_eq!(progress.snapshot().completed, 2);
    }
}
