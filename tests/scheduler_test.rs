//! Integration tests for the scheduler loop: inlet routing, ticks and
//! shutdown. Time is paused so tick timing is deterministic.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use workq::config::EngineLimits;
use workq::engine::{Registry, Scheduler};
use workq::error::Error;
use workq::model::{Mode, WorkItem};

type Outcomes = Arc<Mutex<Vec<(u32, bool)>>>;

fn registry(interval_ms: u64) -> Arc<Registry<u32>> {
    Arc::new(Registry::new(
        Duration::from_millis(interval_ms),
        EngineLimits::default(),
    ))
}

fn item(mode: Mode, n: u32, outcomes: &Outcomes) -> WorkItem<u32> {
    let outcomes = Arc::clone(outcomes);
    WorkItem::new(mode, "tick", n)
        .action(|_| async { Ok(()) })
        .callback(move |n, ok| outcomes.lock().unwrap().push((*n, ok)))
}

fn count(outcomes: &Outcomes) -> usize {
    outcomes.lock().unwrap().len()
}

#[tokio::test(start_paused = true)]
async fn submitted_items_complete_on_ticks() {
    let outcomes: Outcomes = Arc::default();
    let (scheduler, inlet) = Scheduler::start(registry(100), 10);

    inlet.submit(item(Mode::Ordered, 1, &outcomes)).await.unwrap();
    inlet
        .submit(item(Mode::Concurrent, 2, &outcomes))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(count(&outcomes), 0);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let mut seen = outcomes.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec![(1, true), (2, true)]);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn try_submit_reports_full_inlet() {
    let outcomes: Outcomes = Arc::default();
    let (scheduler, inlet) = Scheduler::start(registry(100), 1);

    // No await yet, so the inlet task has not drained anything.
    inlet.try_submit(item(Mode::Ordered, 1, &outcomes)).unwrap();
    let second = inlet.try_submit(item(Mode::Ordered, 2, &outcomes));
    assert!(matches!(second, Err(Error::InletFull)));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(*outcomes.lock().unwrap(), vec![(1, true)]);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn submit_after_shutdown_reports_closed_inlet() {
    let outcomes: Outcomes = Arc::default();
    let (scheduler, inlet) = Scheduler::start(registry(100), 4);

    scheduler.shutdown().await;

    let result = inlet.submit(item(Mode::Ordered, 1, &outcomes)).await;
    assert!(matches!(result, Err(Error::InletClosed)));
}

#[tokio::test(start_paused = true)]
async fn interval_change_applies_to_next_wait() {
    let outcomes: Outcomes = Arc::default();
    let registry = registry(100);
    let (scheduler, inlet) = Scheduler::start(Arc::clone(&registry), 10);

    inlet.submit(item(Mode::Ordered, 1, &outcomes)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(count(&outcomes), 1);

    // The wait already under way (until t=200ms) keeps the old interval.
    registry.set_sweep_interval(Duration::from_secs(5));
    inlet.submit(item(Mode::Ordered, 2, &outcomes)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(count(&outcomes), 2);

    // The next tick is 5s after t=200ms.
    inlet.submit(item(Mode::Ordered, 3, &outcomes)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(count(&outcomes), 2);

    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(count(&outcomes), 3);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_in_flight_sweep() {
    let outcomes: Outcomes = Arc::default();
    let (scheduler, inlet) = Scheduler::start(registry(50), 10);

    let recorder = Arc::clone(&outcomes);
    inlet
        .submit(
            WorkItem::new(Mode::Ordered, "slow", 1)
                .action(|_| async {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok(())
                })
                .callback(move |n, ok| recorder.lock().unwrap().push((*n, ok))),
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(count(&outcomes), 0);

    scheduler.shutdown().await;
    assert_eq!(*outcomes.lock().unwrap(), vec![(1, true)]);
}

#[tokio::test(start_paused = true)]
async fn failing_actions_never_stop_the_tick_loop() {
    let outcomes: Outcomes = Arc::default();
    let (scheduler, inlet) = Scheduler::start(registry(100), 10);

    let recorder = Arc::clone(&outcomes);
    inlet
        .submit(
            WorkItem::new(Mode::Concurrent, "tick", 1)
                .action(|_| async { Err(anyhow::anyhow!("nope")) })
                .callback(move |n, ok| recorder.lock().unwrap().push((*n, ok))),
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    inlet
        .submit(item(Mode::Concurrent, 2, &outcomes))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(*outcomes.lock().unwrap(), vec![(1, false), (2, true)]);
    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn dropped_scheduler_keeps_routing_and_ticking() {
    let outcomes: Outcomes = Arc::default();
    let (_, inlet) = Scheduler::start(registry(100), 4);

    tokio::time::sleep(Duration::from_millis(10)).await;
    inlet.submit(item(Mode::Ordered, 1, &outcomes)).await.unwrap();
    inlet
        .submit(item(Mode::Concurrent, 2, &outcomes))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    let mut seen = outcomes.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec![(1, true), (2, true)]);
}
