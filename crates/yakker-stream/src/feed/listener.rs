use crate::{
    Error, Result,
    constants::{CONNECT_TIMEOUT, ERROR_AFTER_RETRIES, MAX_RETRY_DELAY, MIN_RETRY_DELAY, READ_IDLE_TIMEOUT},
    feed::{FeedState, payload::parse_message},
    metric::MetricEvent,
};
use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use futures::StreamExt;
use tokio::{
    net::TcpStream,
    sync::{mpsc::UnboundedSender, watch},
    time::{sleep, timeout},
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Message,
        client::IntoClientRequest,
        handshake::client::Request,
        http::{HeaderValue, header::AUTHORIZATION},
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

type FeedStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why a receive session ended without an error.
enum SessionEnd {
    Shutdown,
    Dropped,
}

/// Holds one authenticated websocket to the telemetry feed and forwards each
/// decoded message to the processor. Connection failures and drops are
/// retried with exponential backoff until shutdown.
pub struct FeedListener {
    url: Url,
    auth: Option<String>,
    tx: UnboundedSender<MetricEvent>,
    state: watch::Sender<FeedState>,
}

fn reconnect_backoff() -> ExponentialBackoff {
    ExponentialBuilder::default()
        .with_min_delay(MIN_RETRY_DELAY)
        .with_max_delay(MAX_RETRY_DELAY)
        .with_max_times(usize::MAX)
        .with_jitter()
        .build()
}

impl FeedListener {
    pub fn new(
        url: Url,
        auth: Option<String>,
        tx: UnboundedSender<MetricEvent>,
        state: watch::Sender<FeedState>,
    ) -> Self {
        Self {
            url,
            auth,
            tx,
            state,
        }
    }

    pub async fn run(&self, shutdown_listener: CancellationToken) -> Result<()> {
        info!(url = %self.url, "feed listener starting");

        let mut backoff = reconnect_backoff();
        let mut retry_count = 0;

        loop {
            if shutdown_listener.is_cancelled() {
                break;
            }

            // Connect, abandoning the attempt on shutdown.
            self.set_state(FeedState::Connecting);
            let attempt = tokio::select! {
                biased;
                _ = shutdown_listener.cancelled() => break,
                attempt = self.connect() => attempt,
            };

            let mut stream = match attempt {
                Ok(stream) => {
                    // A good connection restarts the delay schedule.
                    backoff = reconnect_backoff();
                    retry_count = 0;
                    self.set_state(FeedState::Connected);
                    metrics::counter!("yakker_stream_feed_connected").increment(1);
                    info!(url = %self.url, "connected to telemetry feed");
                    stream
                }
                // Network and handshake failures back off and retry.
                Err(err) if err.is_connectivity() => {
                    self.set_state(FeedState::Disconnected);
                    retry_count += 1;
                    metrics::counter!("yakker_stream_feed_connection_failed").increment(1);
                    let retry_delay = backoff.next().unwrap_or(MAX_RETRY_DELAY);

                    if retry_count <= ERROR_AFTER_RETRIES {
                        warn!(
                            ?err,
                            ?retry_delay,
                            retry_count,
                            "cannot connect to telemetry feed; retrying after delay (transient)"
                        );
                    } else {
                        error!(
                            ?err,
                            ?retry_delay,
                            retry_count,
                            "cannot connect to telemetry feed after multiple retries (persistent issue)"
                        );
                    }

                    tokio::select! {
                        biased;
                        _ = shutdown_listener.cancelled() => break,
                        _ = sleep(retry_delay) => continue,
                    }
                }
                // Anything else (a bad auth value) will not fix itself.
                Err(err) => {
                    self.set_state(FeedState::Disconnected);
                    return Err(err);
                }
            };

            // Read until shutdown or the session drops.
            match self.receive(&mut stream, &shutdown_listener).await {
                Ok(SessionEnd::Shutdown) => {
                    if let Err(err) = stream.close(None).await {
                        debug!(?err, "error closing feed connection");
                    }
                    break;
                }
                Ok(SessionEnd::Dropped) => {
                    warn!("telemetry feed disconnected; reconnecting");
                }
                Err(err) if err.is_connectivity() => {
                    warn!(?err, "telemetry feed interrupted; reconnecting");
                }
                Err(err) => {
                    self.set_state(FeedState::Disconnected);
                    return Err(err);
                }
            }

            // Dropped: wait out the next delay before reconnecting.
            self.set_state(FeedState::Disconnected);
            metrics::counter!("yakker_stream_feed_disconnected").increment(1);

            let retry_delay = backoff.next().unwrap_or(MAX_RETRY_DELAY);
            tokio::select! {
                biased;
                _ = shutdown_listener.cancelled() => break,
                _ = sleep(retry_delay) => {}
            }
        }

        self.set_state(FeedState::Disconnected);
        info!("shutdown signal detected; feed listener stopped");
        Ok(())
    }

    fn request(&self) -> Result<Request> {
        let mut request = self.url.as_str().into_client_request()?;
        if let Some(auth) = &self.auth {
            request
                .headers_mut()
                .insert(AUTHORIZATION, HeaderValue::from_str(auth)?);
        }
        Ok(request)
    }

    async fn connect(&self) -> Result<FeedStream> {
        let request = self.request()?;
        let (stream, response) = timeout(CONNECT_TIMEOUT, connect_async(request))
            .await
            .map_err(|_| Error::ConnectTimeout(CONNECT_TIMEOUT))??;
        debug!(status = %response.status(), "feed handshake complete");
        Ok(stream)
    }

    async fn receive(
        &self,
        stream: &mut FeedStream,
        shutdown_listener: &CancellationToken,
    ) -> Result<SessionEnd> {
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown_listener.cancelled() => return Ok(SessionEnd::Shutdown),
                next = timeout(READ_IDLE_TIMEOUT, stream.next()) => next,
            };

            let message = match next {
                Err(_) => {
                    warn!(idle = ?READ_IDLE_TIMEOUT, "no frames from telemetry feed");
                    return Ok(SessionEnd::Dropped);
                }
                Ok(None) => return Ok(SessionEnd::Dropped),
                Ok(Some(message)) => message?,
            };

            match message {
                Message::Text(text) => self.forward(&text)?,
                Message::Close(frame) => {
                    info!(?frame, "telemetry feed sent close frame");
                    return Ok(SessionEnd::Dropped);
                }
                _ => {}
            }
        }
    }

    fn forward(&self, text: &str) -> Result<()> {
        metrics::counter!("yakker_stream_feed_messages").increment(1);
        match parse_message(text, crate::now()) {
            Ok(Some(event)) => self.tx.send(event).map_err(|_| Error::EventChannelClosed),
            Ok(None) => Ok(()),
            Err(err) => {
                warn!(?err, "dropping malformed feed message");
                metrics::counter!("yakker_stream_feed_parse_failed").increment(1);
                Ok(())
            }
        }
    }

    fn set_state(&self, state: FeedState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "feed state changed");
        }
    }
}
