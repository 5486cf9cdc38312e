//! Bounded-concurrency task runner.
//!
//! External tool invocations (thumbnail resizing, palette extraction) are
//! cheap to await but expensive for the OS to run in parallel, so batches go
//! through this queue. Admission follows submission order; completion order
//! is whatever the underlying work decides. A failing task never takes its
//! siblings down with it -- per-task results go back to the caller.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Used when CPU detection fails.
const FALLBACK_LIMIT: usize = 4;

/// Detected CPU thread count minus one, floor 1.
pub fn default_limit() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1).max(1))
        .unwrap_or(FALLBACK_LIMIT)
}

/// Runs `tasks` with at most `limit` in flight, returning each task's result
/// in submission order.
pub async fn run<T, Fut>(tasks: Vec<Fut>, limit: usize) -> Vec<Result<T>>
where
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut set = JoinSet::new();
    let count = tasks.len();

    for (index, task) in tasks.into_iter().enumerate() {
        // Acquiring before spawning is what throttles admission; the
        // semaphore is never closed.
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("work semaphore closed");
        set.spawn(async move {
            let result = task.await;
            drop(permit);
            (index, result)
        });
    }

    let mut results: Vec<Option<Result<T>>> = (0..count).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, result)) => results[index] = Some(result),
            Err(join_err) => {
                // A panicked task burns its slot but must not abort siblings.
                log::error!("queued task panicked: {join_err}");
            }
        }
    }

    results
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err(anyhow!("queued task panicked"))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn never_exceeds_the_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .collect();

        let results = run(tasks, 3).await;
        assert_eq!(results.len(), 20);
        assert!(results.iter().all(|r| r.is_ok()));
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn every_task_runs_exactly_once() {
        let started = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let started = started.clone();
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    Ok(i)
                }
            })
            .collect();

        let results = run(tasks, 2).await;
        assert_eq!(started.load(Ordering::SeqCst), 50);
        for (i, r) in results.into_iter().enumerate() {
            assert_eq!(r.unwrap(), i);
        }
    }

    #[tokio::test]
    async fn a_failing_task_does_not_abort_siblings() {
        let tasks: Vec<_> = (0..4)
            .map(|i| async move {
                if i == 1 {
                    Err(anyhow!("task {i} failed"))
                } else {
                    Ok(i)
                }
            })
            .collect();

        let results = run(tasks, 1).await;
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
        assert!(results[3].is_ok());
    }

    #[test]
    fn default_limit_is_at_least_one() {
        assert!(default_limit() >= 1);
    }
}
