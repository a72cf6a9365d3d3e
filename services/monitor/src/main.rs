//! fairq monitor binary.
//!
//! Starts one monitor process: elects a role (aggregator or mirror),
//! runs its loop, and prints each table snapshot to the terminal until
//! Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use fairq_monitor::queue::{HttpQueueService, MockQueueService, QueueService};
use fairq_monitor::render::{ConsoleSink, TableSink};
use fairq_monitor::{assume_role, Config, Identity, KillThreshold, MonitorContext, Role};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "fairq-monitor", about = "Fair visibility over one shared execution queue")]
struct Args {
    /// Run against an in-memory queue simulator instead of the gateway.
    #[arg(long)]
    mock: bool,

    /// Owner identity announced with submitted jobs.
    #[arg(long)]
    user: Option<String>,

    /// Occupancy budget for the running job (inf, 10s, 30s, 1min, 2min, 5min).
    #[arg(long)]
    threshold: Option<String>,

    /// Queue gateway base URL.
    #[arg(long)]
    queue_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(url) = args.queue_url {
        config.queue_url = url;
    }
    if let Some(user) = args.user {
        config.identity = Identity::named(user);
    }
    if let Some(token) = args.threshold {
        config.kill_threshold = token.parse::<KillThreshold>()?;
    }

    info!(
        client_id = %config.client_id,
        queue_url = %config.queue_url,
        queue_id = %config.queue_id,
        threshold = %config.kill_threshold,
        "starting fairq monitor"
    );

    let queue: Arc<dyn QueueService> = if args.mock {
        info!("using in-memory queue simulator");
        Arc::new(MockQueueService::new(config.queue_id.clone()))
    } else {
        Arc::new(HttpQueueService::new(&config.queue_url, config.queue_id.clone()))
    };

    let ctx = MonitorContext::new(config, queue);

    // The threshold sender stays alive for the whole run; a future
    // control surface changes the budget through it.
    let (threshold_tx, threshold_rx) = watch::channel(ctx.config().kill_threshold);

    let snapshots;
    let role_task = match assume_role(&ctx, threshold_rx).await? {
        Role::Aggregator(aggregator) => {
            snapshots = aggregator.snapshots();
            let shutdown = ctx.shutdown_signal();
            tokio::spawn(async move { aggregator.run(shutdown).await })
        }
        Role::Mirror(mirror) => {
            snapshots = mirror.snapshots();
            let shutdown = ctx.shutdown_signal();
            tokio::spawn(async move { mirror.run(shutdown).await })
        }
    };

    let render_task = tokio::spawn(render_loop(snapshots, ctx.shutdown_signal()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
        }
        result = role_task => {
            match result {
                Ok(()) => info!("role loop exited"),
                Err(e) => error!(error = %e, "role task panicked"),
            }
        }
    }

    // Signal shutdown and give the loops one poll cycle to observe it.
    ctx.shutdown();
    drop(threshold_tx);
    tokio::time::sleep(Duration::from_millis(500)).await;
    let _ = render_task.await;

    info!("monitor shutdown complete");
    Ok(())
}

async fn render_loop(
    mut snapshots: watch::Receiver<fairq_monitor::DisplayState>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut sink = ConsoleSink::new();
    loop {
        tokio::select! {
            res = snapshots.changed() => {
                if res.is_err() {
                    break;
                }
                let state = snapshots.borrow_and_update().clone();
                sink.present(&state, None);
            }
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
