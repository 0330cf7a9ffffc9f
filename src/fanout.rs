//! Bounded-concurrency fan-out.
//!
//! A fixed set of workers pulls item indices from a shared cursor and writes
//! each result into a pre-sized slot at the item's original position, so the
//! output order always matches the input order no matter which calls finish
//! first. One failed item never aborts the rest; callers resolve failures to
//! `R::default()` inside the closure.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

pub async fn map_bounded<T, R, F, Fut>(items: Vec<T>, workers: usize, f: F) -> Vec<R>
where
    T: Clone + Send + Sync + 'static,
    R: Default + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }

    let items = Arc::new(items);
    let cursor = Arc::new(AtomicUsize::new(0));
    let f = Arc::new(f);
    let (tx, mut rx) = mpsc::channel::<(usize, R)>(total);

    let worker_count = workers.clamp(1, total);
    let mut handles = Vec::with_capacity(worker_count);

    for _ in 0..worker_count {
        let items = Arc::clone(&items);
        let cursor = Arc::clone(&cursor);
        let f = Arc::clone(&f);
        let tx = tx.clone();

        handles.push(tokio::spawn(async move {
            loop {
                let index = cursor.fetch_add(1, Ordering::SeqCst);
                if index >= items.len() {
                    break;
                }

                let result = f(items[index].clone()).await;
                if tx.send((index, result)).await.is_err() {
                    break;
                }
            }
        }));
    }
    drop(tx);

    let mut slots: Vec<R> = Vec::with_capacity(total);
    slots.resize_with(total, R::default);

    while let Some((index, result)) = rx.recv().await {
        slots[index] = result;
    }

    for handle in handles {
        let _ = handle.await;
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn output_order_matches_input_order_despite_completion_order() {
        // Earlier items sleep longer, so completion order is reversed.
        let items: Vec<u64> = (0..12).collect();
        let results = map_bounded(items, 4, |n| async move {
            tokio::time::sleep(Duration::from_millis(60 - n * 5)).await;
            n * 10
        })
        .await;

        assert_eq!(results, (0..12).map(|n| n * 10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn one_failed_item_resolves_to_default_without_aborting_others() {
        let items = vec!["ok-1", "boom", "ok-2"];
        let results = map_bounded(items, 2, |name| async move {
            if name == "boom" {
                Vec::new()
            } else {
                vec![name.to_string()]
            }
        })
        .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0], vec!["ok-1".to_string()]);
        assert!(results[1].is_empty());
        assert_eq!(results[2], vec!["ok-2".to_string()]);
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_the_worker_bound() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let in_flight_probe = Arc::clone(&in_flight);
        let peak_probe = Arc::clone(&peak);

        let items: Vec<usize> = (0..32).collect();
        let results = map_bounded(items, 8, move |n| {
            let in_flight = Arc::clone(&in_flight_probe);
            let peak = Arc::clone(&peak_probe);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                n
            }
        })
        .await;

        assert_eq!(results.len(), 32);
        assert!(peak.load(Ordering::SeqCst) <= 8);
    }

    #[tokio::test]
    async fn empty_input_produces_empty_output() {
        let results: Vec<u64> = map_bounded(Vec::<u64>::new(), 8, |n| async move { n }).await;
        assert!(results.is_empty());
    }
}
