//! Bounded concurrency for independent units of work

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Run `work` over every item with at most `max_parallel` in flight
///
/// Results come back in input order.
pub async fn run_bounded<T, R, F, Fut>(items: Vec<T>, max_parallel: usize, work: F) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));

    let futures = items.into_iter().map(|item| {
        let semaphore = Arc::clone(&semaphore);
        let unit = work(item);
        async move {
            let _permit = semaphore.acquire().await.ok();
            unit.await
        }
    });

    join_all(futures).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_preserves_order() {
        let results = run_bounded(vec![3u64, 1, 2], 2, |n| async move {
            tokio::time::sleep(Duration::from_millis(n * 5)).await;
            n * 10
        })
        .await;
        assert_eq!(results, vec![30, 10, 20]);
    }

    #[tokio::test]
    async fn test_respects_bound() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        run_bounded((0..8).collect::<Vec<_>>(), 3, |_| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }
}
