use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};

/// Run `job` over `items` on at most `workers` concurrent tasks and funnel the
/// outputs into one receiver. Output order follows completion, not input.
///
/// The receiver closes once every job has finished, so a caller can drain it
/// with `while let Some(out) = rx.recv().await` and treat the end of the loop
/// as a barrier. All state mutation belongs on the receiving side.
pub fn fan_out<I, T, F, Fut>(items: Vec<I>, workers: usize, job: F) -> mpsc::Receiver<T>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    let workers = workers.max(1);
    let (tx, rx) = mpsc::channel(workers * 2);
    let permits = Arc::new(Semaphore::new(workers));
    let job = Arc::new(job);

    for item in items {
        let tx = tx.clone();
        let permits = Arc::clone(&permits);
        let job = Arc::clone(&job);
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let out = job(item).await;
            // Receiver dropped means the run is over; nothing left to report to.
            let _ = tx.send(out).await;
        });
    }

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn every_item_is_delivered_once() {
        let mut rx = fan_out((0..25).collect::<Vec<u32>>(), 5, |n| async move { n * 2 });
        let mut seen = Vec::new();
        while let Some(n) = rx.recv().await {
            seen.push(n);
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..25).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (r, p) = (Arc::clone(&running), Arc::clone(&peak));

        let mut rx = fan_out((0..20).collect::<Vec<u32>>(), 3, move |_| {
            let running = Arc::clone(&r);
            let peak = Arc::clone(&p);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }
        });
        while rx.recv().await.is_some() {}

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn empty_input_closes_immediately() {
        let mut rx = fan_out(Vec::<u8>::new(), 5, |n| async move { n });
        assert!(rx.recv().await.is_none());
    }
}
