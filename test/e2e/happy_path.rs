//! End-to-end happy path test.
//!
//! Wires every component over real TCP sockets and one shared in-memory
//! queue, then walks the canonical flow:
//!
//! 1. First process wins the election and runs the aggregator
//! 2. Owner "alice" submits a job; it is accepted as pending
//! 3. The pending announcement enriches the next broadcast table
//! 4. A second client's view sees `{pending, J, alice, waiting >= 0}`
//! 5. The queue promotes the job; the running announcement follows
//! 6. The view sees the enriched running row, then cancels it via halt
//!
//! ## Running
//!
//! ```bash
//! cargo test -p fairq-e2e --test happy_path
//! ```

use std::sync::Arc;
use std::time::Duration;

use fairq_bus::BusEndpoints;
use fairq_events::JobStatus;
use fairq_id::{ClientId, QueueId};
use fairq_monitor::queue::{MockQueueService, Program};
use fairq_monitor::{
    assume_role, CancelAction, Config, Identity, JobProgress, JobPublisher, KillThreshold,
    LocalView, MonitorContext, Role,
};
use tokio::sync::watch;

fn config_for(endpoints: BusEndpoints, user: &str) -> Config {
    Config {
        client_id: ClientId::new(),
        queue_url: "http://127.0.0.1:8080".to_string(),
        queue_id: QueueId::parse("qm-1").unwrap(),
        endpoints,
        identity: Identity::named(user),
        tick_interval: Duration::from_millis(20),
        recv_timeout: Duration::from_millis(50),
        poll_interval: Duration::from_millis(10),
        wait_timeout: Duration::from_millis(40),
        event_log_capacity: 100,
        kill_threshold: KillThreshold::default(),
    }
}

async fn wait_until<F: Fn() -> bool>(what: &str, predicate: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !predicate() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn submitted_job_is_visible_enriched_and_cancelable() {
    let queue = Arc::new(
        MockQueueService::new(QueueId::parse("qm-1").unwrap()).with_loading_polls(1),
    );

    // First process: wins the election, runs the merge loop.
    let monitor_ctx = MonitorContext::new(
        config_for(BusEndpoints::loopback(0, 0), "operator"),
        Arc::clone(&queue) as _,
    );
    let (_threshold_tx, threshold_rx) = watch::channel(KillThreshold::default());
    let Role::Aggregator(aggregator) = assume_role(&monitor_ctx, threshold_rx).await.unwrap()
    else {
        panic!("first process must win the election");
    };
    let endpoints = aggregator.endpoints();
    let aggregator_shutdown = monitor_ctx.shutdown_signal();
    tokio::spawn(async move { aggregator.run(aggregator_shutdown).await });

    // Second process: alice's client, pointed at the live endpoints.
    let client_ctx = MonitorContext::new(config_for(endpoints, "alice"), Arc::clone(&queue) as _);

    let mut publisher = JobPublisher::new(&client_ctx);
    let handle = publisher
        .submit(&Program::new("rabi-scan", serde_json::json!({"averages": 1024})))
        .await
        .unwrap();
    let job_id = handle.id().clone();

    let mut view = LocalView::connect(&client_ctx).await.unwrap();
    view.track(&handle);
    let snapshots = view.snapshots();
    let view_shutdown = client_ctx.shutdown_signal();
    tokio::spawn(async move { view.run(view_shutdown).await });

    // The merged table reaches alice's view with her row enriched.
    wait_until("enriched pending row", || {
        snapshots.borrow().rows().iter().any(|row| {
            row.id == job_id
                && row.status == JobStatus::Pending
                && row.user.as_deref() == Some("alice")
                && row.waiting_secs(fairq_events::now_epoch()) >= Some(0.0)
        })
    })
    .await;

    // Follow the job in the background while the queue promotes it.
    let (progress_tx, progress_rx) = watch::channel(JobProgress::default());
    let watch_shutdown = client_ctx.shutdown_signal();
    let watch_handle = handle.clone();
    let watcher = tokio::spawn(async move {
        publisher.watch(&watch_handle, &progress_tx, watch_shutdown).await;
    });

    queue.promote_next().await.expect("job should be queued");
    watcher.await.unwrap();
    assert_eq!(*progress_rx.borrow(), JobProgress::Running);

    wait_until("enriched running row", || {
        snapshots.borrow().rows().iter().any(|row| {
            row.id == job_id
                && row.status == JobStatus::Running
                && row.user.as_deref() == Some("alice")
        })
    })
    .await;

    // Alice changes her mind; the running job is halted, not canceled.
    // The spawned view owns the original; reconnect a fresh one for the
    // user action, seeded from the same broadcast state.
    let mut action_view = LocalView::connect(&client_ctx).await.unwrap();
    action_view.track(&handle);
    action_view.replace_table(snapshots.borrow().rows().to_vec());
    let action = action_view.cancel_tracked().await.unwrap();
    assert_eq!(action, CancelAction::Halted);
    assert_eq!(queue.halt_calls().await, vec![job_id.clone()]);

    // The authoritative queue no longer reports the job, so it vanishes
    // from the broadcast table regardless of retained log entries.
    wait_until("row removed after halt", || {
        snapshots.borrow().rows().iter().all(|row| row.id != job_id)
    })
    .await;

    client_ctx.shutdown();
    monitor_ctx.shutdown();
}

#[tokio::test]
async fn second_monitor_process_mirrors_without_enrichment() {
    let queue = Arc::new(MockQueueService::new(QueueId::parse("qm-1").unwrap()));
    queue.seed_pending("p1").await;

    let ctx1 = MonitorContext::new(
        config_for(BusEndpoints::loopback(0, 0), "operator"),
        Arc::clone(&queue) as _,
    );
    let (_t1, threshold1) = watch::channel(KillThreshold::default());
    let Role::Aggregator(aggregator) = assume_role(&ctx1, threshold1).await.unwrap() else {
        panic!("first process must win the election");
    };
    let endpoints = aggregator.endpoints();
    let shutdown1 = ctx1.shutdown_signal();
    tokio::spawn(async move { aggregator.run(shutdown1).await });

    let ctx2 = MonitorContext::new(config_for(endpoints, "operator"), Arc::clone(&queue) as _);
    let (_t2, threshold2) = watch::channel(KillThreshold::default());
    let Role::Mirror(mirror) = assume_role(&ctx2, threshold2).await.unwrap() else {
        panic!("second process must fall back to mirror mode");
    };

    let snapshots = mirror.snapshots();
    let shutdown2 = ctx2.shutdown_signal();
    let mirror = Arc::new(mirror);
    let runner = Arc::clone(&mirror);
    tokio::spawn(async move { runner.run(shutdown2).await });

    wait_until("mirror sees the pending job", || {
        snapshots
            .borrow()
            .rows()
            .iter()
            .any(|row| row.id.as_str() == "p1" && row.user.is_none() && row.time.is_none())
    })
    .await;

    ctx2.shutdown();
    ctx1.shutdown();
}
