use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use publish_engine::TaskQueue;

async fn track(
    value: u64,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
) -> u64 {
    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    peak.fetch_max(now, Ordering::SeqCst);
    // Later inputs finish first.
    tokio::time::sleep(Duration::from_millis(40 - value * 10)).await;
    in_flight.fetch_sub(1, Ordering::SeqCst);
    value * 2
}

async fn run_with(queue: TaskQueue) -> (Vec<u64>, usize) {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let results = queue
        .run(0..4u64, |value| track(value, in_flight.clone(), peak.clone()))
        .await;
    (results, peak.load(Ordering::SeqCst))
}

#[tokio::test(start_paused = true)]
async fn default_queue_runs_one_task_at_a_time() {
    let queue = TaskQueue::default();
    assert_eq!(queue.concurrency(), 1);

    let (results, peak) = run_with(queue).await;
    assert_eq!(results, vec![0, 2, 4, 6]);
    assert_eq!(peak, 1);
}

#[tokio::test(start_paused = true)]
async fn wider_queue_keeps_input_order() {
    let (results, peak) = run_with(TaskQueue::new(3)).await;
    assert_eq!(results, vec![0, 2, 4, 6]);
    assert_eq!(peak, 3);
}

#[test]
fn zero_concurrency_means_one() {
    assert_eq!(TaskQueue::new(0).concurrency(), 1);
}

#[tokio::test]
async fn empty_input_yields_nothing() {
    let results: Vec<u8> = TaskQueue::default()
        .run(Vec::<u8>::new(), |value| async move { value })
        .await;
    assert!(results.is_empty());
}
