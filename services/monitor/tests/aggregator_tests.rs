//! Integration tests for the aggregator's merge, enrichment, and
//! preemption behavior, driven through the real bus and the in-memory
//! queue simulator.

use std::sync::Arc;
use std::time::Duration;

use fairq_bus::{BusEndpoints, EventPublisher, Frame, TableSubscriber};
use fairq_events::{now_epoch, JobStatus, LifecycleEvent};
use fairq_id::{ClientId, JobId, QueueId};
use fairq_monitor::queue::MockQueueService;
use fairq_monitor::{Aggregator, Config, DisplayState, Identity, KillThreshold, MonitorContext};
use tokio::sync::watch;

fn test_config(endpoints: BusEndpoints) -> Config {
    Config {
        client_id: ClientId::new(),
        queue_url: "http://127.0.0.1:8080".to_string(),
        queue_id: QueueId::parse("qm-1").unwrap(),
        endpoints,
        identity: Identity::named("alice"),
        tick_interval: Duration::from_millis(20),
        recv_timeout: Duration::from_millis(50),
        poll_interval: Duration::from_millis(10),
        wait_timeout: Duration::from_millis(50),
        event_log_capacity: 100,
        kill_threshold: KillThreshold::default(),
    }
}

fn test_context(queue: Arc<MockQueueService>) -> MonitorContext {
    MonitorContext::new(test_config(BusEndpoints::loopback(0, 0)), queue)
}

fn mock_queue() -> Arc<MockQueueService> {
    Arc::new(MockQueueService::new(QueueId::parse("qm-1").unwrap()))
}

fn event(id: &str, status: JobStatus, time: f64, user: &str) -> LifecycleEvent {
    LifecycleEvent {
        status,
        time: Some(time),
        user: Some(user.to_string()),
        id: JobId::parse(id).unwrap(),
        queue_id: QueueId::parse("qm-1").unwrap(),
    }
}

/// Polls `predicate` over the snapshot channel until it holds or the
/// deadline passes.
async fn wait_for_snapshot(
    snapshots: &mut watch::Receiver<DisplayState>,
    predicate: impl Fn(&DisplayState) -> bool,
) -> DisplayState {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        {
            let state = snapshots.borrow_and_update().clone();
            if predicate(&state) {
                return state;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("snapshot predicate not satisfied within deadline");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn rows_are_enriched_from_the_most_recent_matching_event() {
    let queue = mock_queue();
    queue.seed_pending("p1").await;

    let ctx = test_context(Arc::clone(&queue));
    let (_threshold_tx, threshold_rx) = watch::channel(KillThreshold::default());
    let aggregator = Aggregator::bind(&ctx, threshold_rx).await.unwrap();
    let endpoints = aggregator.endpoints();
    let mut snapshots = aggregator.snapshots();

    let shutdown = ctx.shutdown_signal();
    tokio::spawn(async move { aggregator.run(shutdown).await });

    let mut publisher = EventPublisher::new(endpoints.events);
    publisher
        .publish(&Frame::event(&event("p1", JobStatus::Pending, 5.0, "bob")).unwrap())
        .await
        .unwrap();
    publisher
        .publish(&Frame::event(&event("p1", JobStatus::Pending, 6.0, "carol")).unwrap())
        .await
        .unwrap();

    let state = wait_for_snapshot(&mut snapshots, |state| {
        state
            .rows()
            .first()
            .is_some_and(|row| row.user.as_deref() == Some("carol"))
    })
    .await;

    let row = &state.rows()[0];
    assert_eq!(row.status, JobStatus::Pending);
    assert_eq!(row.time, Some(6.0));

    ctx.shutdown();
}

#[tokio::test]
async fn evicted_entries_stop_enriching() {
    let queue = mock_queue();
    queue.seed_pending("0").await;
    queue.seed_pending("3").await;

    let mut config = test_config(BusEndpoints::loopback(0, 0));
    config.event_log_capacity = 3;
    let ctx = MonitorContext::new(config, queue);

    let (_threshold_tx, threshold_rx) = watch::channel(KillThreshold::default());
    let aggregator = Aggregator::bind(&ctx, threshold_rx).await.unwrap();
    let endpoints = aggregator.endpoints();
    let mut snapshots = aggregator.snapshots();

    let shutdown = ctx.shutdown_signal();
    tokio::spawn(async move { aggregator.run(shutdown).await });

    // Four inserts into a log of three: the first entry must be gone
    // from every later enrichment lookup.
    let mut publisher = EventPublisher::new(endpoints.events);
    for i in 0..4 {
        publisher
            .publish(
                &Frame::event(&event(&i.to_string(), JobStatus::Pending, i as f64, "owner"))
                    .unwrap(),
            )
            .await
            .unwrap();
    }

    let state = wait_for_snapshot(&mut snapshots, |state| {
        let rows = state.rows();
        rows.len() == 2
            && rows.iter().any(|row| {
                row.id.as_str() == "3" && row.user.is_some()
            })
    })
    .await;

    let evicted = state
        .rows()
        .iter()
        .find(|row| row.id.as_str() == "0")
        .expect("authoritative row survives eviction");
    assert_eq!(evicted.user, None);
    assert_eq!(evicted.time, None);

    ctx.shutdown();
}

#[tokio::test]
async fn running_job_over_budget_is_halted_exactly_once() {
    let queue = mock_queue();
    let running = queue.seed_running("r1").await;

    let ctx = test_context(Arc::clone(&queue));
    let (_threshold_tx, threshold_rx) = watch::channel(KillThreshold::FiveMinutes);
    let aggregator = Aggregator::bind(&ctx, threshold_rx).await.unwrap();
    let endpoints = aggregator.endpoints();
    let mut snapshots = aggregator.snapshots();

    let shutdown = ctx.shutdown_signal();
    tokio::spawn(async move { aggregator.run(shutdown).await });

    // The running event was observed 400 seconds ago; 400s > 300s.
    let mut publisher = EventPublisher::new(endpoints.events);
    publisher
        .publish(
            &Frame::event(&event("r1", JobStatus::Running, now_epoch() - 400.0, "bob")).unwrap(),
        )
        .await
        .unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while queue.halt_calls().await.is_empty() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "halt was never issued"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // The mock removes the halted job, so later ticks see an idle queue
    // and must not issue further halts.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(queue.halt_calls().await, vec![running.id.clone()]);

    wait_for_snapshot(&mut snapshots, |state| state.rows().is_empty()).await;
    ctx.shutdown();
}

#[tokio::test]
async fn running_job_within_budget_is_left_alone() {
    let queue = mock_queue();
    queue.seed_running("r1").await;

    let ctx = test_context(Arc::clone(&queue));
    let (_threshold_tx, threshold_rx) = watch::channel(KillThreshold::FiveMinutes);
    let aggregator = Aggregator::bind(&ctx, threshold_rx).await.unwrap();
    let endpoints = aggregator.endpoints();

    let shutdown = ctx.shutdown_signal();
    tokio::spawn(async move { aggregator.run(shutdown).await });

    let mut publisher = EventPublisher::new(endpoints.events);
    publisher
        .publish(
            &Frame::event(&event("r1", JobStatus::Running, now_epoch() - 100.0, "bob")).unwrap(),
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(queue.halt_calls().await.is_empty());

    ctx.shutdown();
}

#[tokio::test]
async fn unknown_age_is_never_preempted() {
    let queue = mock_queue();
    queue.seed_running("r1").await;

    let ctx = test_context(Arc::clone(&queue));
    // Tightest budget available; still must not fire without a timestamp.
    let (_threshold_tx, threshold_rx) = watch::channel(KillThreshold::TenSeconds);
    let aggregator = Aggregator::bind(&ctx, threshold_rx).await.unwrap();
    let mut snapshots = aggregator.snapshots();

    let shutdown = ctx.shutdown_signal();
    tokio::spawn(async move { aggregator.run(shutdown).await });

    let state = wait_for_snapshot(&mut snapshots, |state| !state.rows().is_empty()).await;
    assert_eq!(state.rows()[0].time, None);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(queue.halt_calls().await.is_empty());

    ctx.shutdown();
}

#[tokio::test]
async fn threshold_can_be_changed_at_runtime() {
    let queue = mock_queue();
    let running = queue.seed_running("r1").await;

    let ctx = test_context(Arc::clone(&queue));
    let (threshold_tx, threshold_rx) = watch::channel(KillThreshold::Unlimited);
    let aggregator = Aggregator::bind(&ctx, threshold_rx).await.unwrap();
    let endpoints = aggregator.endpoints();

    let shutdown = ctx.shutdown_signal();
    tokio::spawn(async move { aggregator.run(shutdown).await });

    let mut publisher = EventPublisher::new(endpoints.events);
    publisher
        .publish(
            &Frame::event(&event("r1", JobStatus::Running, now_epoch() - 400.0, "bob")).unwrap(),
        )
        .await
        .unwrap();

    // Unlimited: nothing happens no matter how old the job is.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(queue.halt_calls().await.is_empty());

    // Tighten the budget; the next tick enforces it.
    threshold_tx.send(KillThreshold::FiveMinutes).unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while queue.halt_calls().await.is_empty() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "halt was never issued after tightening the threshold"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(queue.halt_calls().await, vec![running.id]);

    ctx.shutdown();
}

#[tokio::test]
async fn manual_kill_halts_regardless_of_age() {
    let queue = mock_queue();
    let running = queue.seed_running("r1").await;

    let ctx = test_context(Arc::clone(&queue));
    // Unlimited budget: only the operator action may halt anything.
    let (_threshold_tx, threshold_rx) = watch::channel(KillThreshold::Unlimited);
    let aggregator = Aggregator::bind(&ctx, threshold_rx).await.unwrap();

    let outcome = aggregator.kill_running().await.unwrap();
    assert!(outcome.is_some());
    assert_eq!(queue.halt_calls().await, vec![running.id]);
}

#[tokio::test]
async fn queue_failure_broadcasts_nothing_and_flags_unavailable() {
    let queue = mock_queue();
    queue.seed_pending("p1").await;

    let ctx = test_context(Arc::clone(&queue));
    let (_threshold_tx, threshold_rx) = watch::channel(KillThreshold::default());
    let aggregator = Aggregator::bind(&ctx, threshold_rx).await.unwrap();
    let endpoints = aggregator.endpoints();
    let mut snapshots = aggregator.snapshots();

    let shutdown = ctx.shutdown_signal();
    tokio::spawn(async move { aggregator.run(shutdown).await });

    wait_for_snapshot(&mut snapshots, |state| !state.rows().is_empty()).await;

    let mut subscriber = TableSubscriber::connect(endpoints.table).await.unwrap();
    queue.set_unreachable(true).await;

    wait_for_snapshot(&mut snapshots, |state| state.is_unavailable()).await;

    // Drain whatever was in flight before the outage; after that the
    // subscriber must see silence, never a partial table.
    let mut quiet = false;
    for _ in 0..20 {
        match subscriber.recv(Duration::from_millis(60)).await.unwrap() {
            Some(_) => continue,
            None => {
                quiet = true;
                break;
            }
        }
    }
    assert!(quiet, "frames kept flowing while the queue was down");

    // Recovery on the next successful cycle.
    queue.set_unreachable(false).await;
    wait_for_snapshot(&mut snapshots, |state| !state.rows().is_empty()).await;

    ctx.shutdown();
}
