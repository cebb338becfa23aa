use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tokio::{
    signal,
    sync::{mpsc::unbounded_channel, watch},
    task::{JoinError, JoinSet},
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yakker_stream::{
    aggregator::EventAggregator,
    constants::SHUTDOWN_GRACE,
    export::LivedataWriter,
    feed::{DemoFeed, FeedListener, FeedState},
    processor::Processor,
    server,
    settings::{AppArgs, Settings},
    smoother::RollingSmoother,
    snapshot::SnapshotStore,
};

type TaskExit = (&'static str, yakker_stream::Result<()>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = AppArgs::parse();
    let settings = Settings::load(&args)?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&settings.log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Some(metrics_addr) = settings.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()?;
    }

    export_build_info();

    let shutdown_listener = shutdown_listener()?;

    // A taken port must fail startup before anything else runs.
    let http_listener = server::bind(settings.http_addr()).await?;

    let store = Arc::new(SnapshotStore::default());
    let (tx, rx) = unbounded_channel();
    let (state_tx, state_rx) = watch::channel(FeedState::Disconnected);
    let mut tasks: JoinSet<TaskExit> = JoinSet::new();

    if settings.demo {
        info!(
            port = settings.port,
            poll_interval = ?settings.poll_interval(),
            "Yakker Stream starting in DEMO mode"
        );

        let mut demo_feed = DemoFeed::new(settings.poll_interval(), tx, state_tx);
        tasks.spawn({
            let shutdown_listener = shutdown_listener.clone();
            async move { ("demo feed", demo_feed.run(shutdown_listener).await) }
        });
    } else {
        let feed_url = settings.feed_url()?;
        info!(
            port = settings.port,
            %feed_url,
            "Yakker Stream starting in LIVE mode"
        );

        let feed_listener = FeedListener::new(feed_url, settings.auth_value(), tx, state_tx);
        tasks.spawn({
            let shutdown_listener = shutdown_listener.clone();
            async move { ("feed listener", feed_listener.run(shutdown_listener).await) }
        });
    }

    let mut processor = Processor::new(
        EventAggregator::new(settings.aggregator_policy()),
        RollingSmoother::new(settings.smoother_config()),
        rx,
        store.clone(),
        state_rx,
    )
    .with_livedata(LivedataWriter::new(&settings.livedata_path))
    .with_console(settings.console_enabled());
    tasks.spawn({
        let shutdown_listener = shutdown_listener.clone();
        async move { ("processor", processor.run(shutdown_listener).await) }
    });

    tasks.spawn({
        let shutdown_listener = shutdown_listener.clone();
        async move {
            (
                "http server",
                server::serve(http_listener, store, shutdown_listener).await,
            )
        }
    });

    let outcome = supervise(tasks, shutdown_listener).await;

    info!("Yakker Stream shutting down");

    outcome
}

/// Runs until a shutdown signal or the first task stops, then cancels and
/// drains the rest. A task that errors, panics, or stops before shutdown was
/// requested makes the whole process fail.
async fn supervise(
    mut tasks: JoinSet<TaskExit>,
    shutdown_listener: CancellationToken,
) -> anyhow::Result<()> {
    let mut failure = None;

    tokio::select! {
        biased;
        _ = shutdown_listener.cancelled() => {
            info!("shutdown signal received");
        }
        Some(joined) = tasks.join_next() => {
            failure = Some(task_failure(&joined).unwrap_or_else(|| {
                format!("{} stopped before shutdown was requested", task_name(&joined))
            }));
            log_task_exit(joined);
        }
    }

    shutdown_listener.cancel();

    let drained = timeout(SHUTDOWN_GRACE, async {
        while let Some(joined) = tasks.join_next().await {
            if failure.is_none() {
                failure = task_failure(&joined);
            }
            log_task_exit(joined);
        }
    })
    .await;
    if drained.is_err() {
        warn!(grace = ?SHUTDOWN_GRACE, "tasks still running after shutdown grace; aborting");
        tasks.abort_all();
    }

    match failure {
        Some(failure) => anyhow::bail!(failure),
        None => Ok(()),
    }
}

fn task_name(joined: &Result<TaskExit, JoinError>) -> &'static str {
    match joined {
        Ok((task, _)) => task,
        Err(_) => "task",
    }
}

fn task_failure(joined: &Result<TaskExit, JoinError>) -> Option<String> {
    match joined {
        Ok((_, Ok(()))) => None,
        Ok((task, Err(err))) => Some(format!("{task} exited with error: {err}")),
        Err(err) => Some(format!("task panicked or was cancelled: {err}")),
    }
}

fn log_task_exit(joined: Result<TaskExit, JoinError>) {
    match joined {
        Ok((task, Ok(()))) => info!(task, "task stopped"),
        Ok((task, Err(err))) => error!(task, ?err, "task exited with error"),
        Err(err) => error!(?err, "task panicked or was cancelled"),
    }
}

fn shutdown_listener() -> anyhow::Result<CancellationToken> {
    let cancellation_token = CancellationToken::new();
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    tokio::spawn({
        let cancellation_token = cancellation_token.clone();
        async move {
            tokio::select! {
                _ = sigterm.recv() => cancellation_token.cancel(),
                _ = signal::ctrl_c() => cancellation_token.cancel(),
            }
        }
    });

    Ok(cancellation_token)
}

fn export_build_info() {
    let version = option_env!("BUILD_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
    let build_commit = option_env!("BUILD_COMMIT").unwrap_or("UNKNOWN");
    let build_date = option_env!("DATE").unwrap_or("UNKNOWN");
    let pkg_version = env!("CARGO_PKG_VERSION");

    metrics::gauge!(
        "yakker_stream_build_info",
        "version" => version,
        "commit" => build_commit,
        "date" => build_date,
        "pkg_version" => pkg_version
    )
    .set(1);
}
