use std::time::Duration;

use proptest::prelude::*;
use tokio::sync::mpsc::Receiver;
use waivepipe::error::Result;
use waivepipe::pipeline::limiter::RateLimiter;
use waivepipe::pipeline::runtime::Runtime;

fn drain_now(rx: &mut Receiver<u32>) -> Vec<u32> {
    let mut out = Vec::new();
    while let Ok(item) = rx.try_recv() {
        out.push(item);
    }
    out
}

async fn settle() {
    tokio::time::sleep(Duration::from_secs(2)).await;
}

#[tokio::test(start_paused = true)]
async fn emits_exactly_max_concurrency_before_any_release() -> Result<()> {
    let limiter = RateLimiter::new(10);
    let (tx, mut rx, _cancel, _handle) = Runtime::new()
        .buffer(32)
        .spawn::<u32, u32, _>(limiter.clone());

    for i in 0..15 {
        tx.send(i).await.expect("send");
    }
    settle().await;

    assert_eq!(drain_now(&mut rx), (0..10).collect::<Vec<_>>());
    assert_eq!(limiter.occupied_slots(), 10);
    assert_eq!(limiter.available_slots(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn one_release_admits_exactly_one_more() -> Result<()> {
    let limiter = RateLimiter::new(10);
    let (tx, mut rx, _cancel, _handle) = Runtime::new()
        .buffer(32)
        .spawn::<u32, u32, _>(limiter.clone());

    for i in 0..15 {
        tx.send(i).await.expect("send");
    }
    settle().await;
    assert_eq!(drain_now(&mut rx).len(), 10);

    limiter.release_slot();
    settle().await;
    assert_eq!(drain_now(&mut rx), vec![10]);

    // Nothing further without another release, even across poll ticks.
    settle().await;
    assert!(drain_now(&mut rx).is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn completes_once_upstream_is_done_and_buffer_is_empty() -> Result<()> {
    let limiter = RateLimiter::new(2);
    let (tx, mut rx, _cancel, handle) = Runtime::new()
        .buffer(8)
        .spawn::<u32, u32, _>(limiter.clone());

    for i in 0..5 {
        tx.send(i).await.expect("send");
    }
    drop(tx);

    let mut seen = Vec::new();
    while seen.len() < 5 {
        let item = rx.recv().await.expect("item");
        seen.push(item);
        limiter.release_slot();
    }

    handle.await??;
    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    assert!(rx.recv().await.is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn releases_never_raise_capacity_above_max() {
    let limiter = RateLimiter::new(3);
    for _ in 0..10 {
        limiter.release_slot();
    }
    assert_eq!(limiter.available_slots(), 3);
    assert_eq!(limiter.occupied_slots(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_admission() -> Result<()> {
    let limiter = RateLimiter::new(1);
    let (tx, mut rx, cancel, handle) = Runtime::new()
        .buffer(8)
        .spawn::<u32, u32, _>(limiter.clone());

    for i in 0..3 {
        tx.send(i).await.expect("send");
    }
    settle().await;
    assert_eq!(drain_now(&mut rx), vec![0]);

    cancel.cancel();
    handle.await??;

    limiter.release_slot();
    assert!(rx.recv().await.is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn poll_interval_recovers_admission_without_notification() -> Result<()> {
    let limiter = RateLimiter::with_poll_interval(1, Duration::from_millis(100));
    let (tx, mut rx, _cancel, _handle) = Runtime::new()
        .buffer(8)
        .spawn::<u32, u32, _>(limiter.clone());

    tx.send(1).await.expect("send");
    tx.send(2).await.expect("send");
    assert_eq!(rx.recv().await, Some(1));

    // A clone shares the counter; the release is seen on the next check.
    limiter.clone().release_slot();
    let next = tokio::time::timeout(Duration::from_millis(250), rx.recv()).await;
    assert_eq!(next.ok().flatten(), Some(2));
    Ok(())
}

proptest! {
    #[test]
    fn never_emits_more_than_max_without_releases(max in 1usize..8, extra in 1usize..8) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .expect("tokio runtime");

        let emitted = rt.block_on(async move {
            let limiter = RateLimiter::new(max);
            let (tx, mut rx, _cancel, _handle) = Runtime::new()
                .buffer(32)
                .spawn::<u32, u32, _>(limiter);
            for i in 0..(max + extra) as u32 {
                tx.send(i).await.expect("send");
            }
            settle().await;
            drain_now(&mut rx).len()
        });

        prop_assert_eq!(emitted, max);
    }
}
