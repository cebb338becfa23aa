//! HTTP endpoints served from the snapshot store.

use anyhow::Result;
use std::{
    sync::Arc,
    time::Instant,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use yakker_stream::{
    Error,
    feed::FeedState,
    metric::MetricName,
    server,
    snapshot::{MetricSnapshot, Snapshot, SnapshotStore},
};

struct TestServer {
    base: String,
    store: Arc<SnapshotStore>,
    shutdown: CancellationToken,
    handle: JoinHandle<yakker_stream::Result<()>>,
}

async fn start() -> Result<TestServer> {
    let listener = server::bind("127.0.0.1:0".parse()?).await?;
    let base = format!("http://{}", listener.local_addr()?);
    let store = Arc::new(SnapshotStore::default());
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(server::serve(listener, store.clone(), shutdown.clone()));
    Ok(TestServer {
        base,
        store,
        shutdown,
        handle,
    })
}

fn live_snapshot(sequence: u64, values: &[(MetricName, f64)]) -> Snapshot {
    let now = Instant::now();
    let metrics = MetricName::ALL.map(|metric| {
        match values.iter().find(|(name, _)| *name == metric) {
            Some(&(_, value)) => MetricSnapshot {
                metric,
                value: Some(value),
                sample_count: 1,
                computed_at: Some(now),
                last_accepted: Some(now),
                stale: false,
            },
            None => MetricSnapshot::empty(metric),
        }
    });
    Snapshot::new(sequence, FeedState::Connected, metrics)
}

#[tokio::test]
async fn test_endpoints_render_current_snapshot() -> Result<()> {
    let server = start().await?;
    server.store.replace(live_snapshot(
        1,
        &[
            (MetricName::ExitVelocity, 101.4),
            (MetricName::PitchVelocity, 88.6),
            (MetricName::SpinRate, 2301.2),
        ],
    ));

    let response = reqwest::get(format!("{}/livedata.xml", server.base)).await?;
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "application/xml");
    let body = response.text().await?;
    assert!(body.contains(r#"<hitting h="101.4" rbi="" double="" triple=""/>"#));
    assert!(body.contains(r#"<pitching er="88.6" pitches="2301"/>"#));

    let body = reqwest::get(format!("{}/data.xml", server.base))
        .await?
        .text()
        .await?;
    assert!(body.contains("<ExitVelo>101.4</ExitVelo>"));
    assert!(body.contains("<Hangtime></Hangtime>"));

    let response = reqwest::get(format!("{}/", server.base)).await?;
    assert_eq!(
        response.headers()["content-type"],
        "text/html; charset=utf-8"
    );
    let body = response.text().await?;
    assert!(body.contains("101.4 mph"));
    assert!(body.contains("-- ft"));

    server.shutdown.cancel();
    server.handle.await??;
    Ok(())
}

#[tokio::test]
async fn test_readers_see_replacements() -> Result<()> {
    let server = start().await?;
    let url = format!("{}/data.xml", server.base);

    let before = reqwest::get(&url).await?.text().await?;
    assert!(before.contains("<SpinRate></SpinRate>"));

    server
        .store
        .replace(live_snapshot(2, &[(MetricName::SpinRate, 1987.0)]));
    let after = reqwest::get(&url).await?.text().await?;
    assert!(after.contains("<SpinRate>1987</SpinRate>"));

    server.shutdown.cancel();
    server.handle.await??;
    Ok(())
}

#[tokio::test]
async fn test_unknown_path_is_not_found() -> Result<()> {
    let server = start().await?;
    let response = reqwest::get(format!("{}/scores.json", server.base)).await?;
    assert_eq!(response.status(), 404);

    server.shutdown.cancel();
    server.handle.await??;
    Ok(())
}

#[tokio::test]
async fn test_port_in_use_is_fatal() -> Result<()> {
    let taken = server::bind("127.0.0.1:0".parse()?).await?;
    let addr = taken.local_addr()?;

    let err = server::bind(addr).await.unwrap_err();
    assert!(matches!(err, Error::Bind { .. }));
    assert!(err.to_string().contains(&addr.port().to_string()));
    Ok(())
}
