use crate::{
    aggregator::AggregatorPolicy,
    constants::{
        DEFAULT_EVENT_GRACE_MS, DEFAULT_LIVEDATA_PATH, DEFAULT_MIN_EXIT_VELOCITY_MPH,
        DEFAULT_POLL_INTERVAL_SECS, DEFAULT_PORT, DEFAULT_STALE_TIMEOUT_SECS, ENV_PREFIX,
    },
    smoother::SmootherConfig,
    staleness::StalenessPolicy,
};
use anyhow::{Context, Result, bail};
use clap::Parser;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::{
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use url::Url;

const AUTHORIZATION_PREFIX: &str = "authorization:";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// `EnvFilter` directive.
    pub log: String,
    pub ws_url: Option<String>,
    /// Bare header value or a full `Authorization: ...` line.
    pub auth_header: Option<String>,
    pub port: u16,
    pub demo: bool,
    pub no_console: bool,
    pub poll_interval: f64,
    pub stale_timeout: f64,
    pub min_exit_velocity_enabled: bool,
    pub min_exit_velocity_mph: f64,
    pub event_grace_ms: u64,
    pub livedata_path: PathBuf,
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log: "info".to_string(),
            ws_url: None,
            auth_header: None,
            port: DEFAULT_PORT,
            demo: false,
            no_console: false,
            poll_interval: DEFAULT_POLL_INTERVAL_SECS,
            stale_timeout: DEFAULT_STALE_TIMEOUT_SECS,
            min_exit_velocity_enabled: false,
            min_exit_velocity_mph: DEFAULT_MIN_EXIT_VELOCITY_MPH,
            event_grace_ms: DEFAULT_EVENT_GRACE_MS,
            livedata_path: PathBuf::from(DEFAULT_LIVEDATA_PATH),
            metrics_addr: None,
        }
    }
}

#[derive(Debug, Default, Parser)]
#[command(version, about = "Live Yakker telemetry for dashboards and scoreboards")]
pub struct AppArgs {
    /// Optional settings file; environment (YAKKER_*) and flags override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log filter directive, e.g. "info" or "yakker_stream=debug"
    #[arg(long)]
    pub log: Option<String>,

    /// Feed websocket URL (ws:// or wss://)
    #[arg(long)]
    pub ws_url: Option<String>,

    /// Authorization header value, with or without the "Authorization:" prefix
    #[arg(long)]
    pub auth_header: Option<String>,

    /// HTTP port for the dashboard and XML endpoints
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Generate synthetic readings instead of connecting to the feed
    #[arg(long)]
    pub demo: bool,

    /// Suppress the per-event console summary
    #[arg(long)]
    pub no_console: bool,

    /// Seconds between demo readings
    #[arg(long)]
    pub poll_interval: Option<f64>,

    /// Seconds without an accepted reading before a metric is shown as a placeholder
    #[arg(long)]
    pub stale_timeout: Option<f64>,

    /// Drop exit velocities below --min-exit-velocity-mph
    #[arg(long)]
    pub min_exit_velocity: bool,

    /// Exit velocity threshold in mph
    #[arg(long)]
    pub min_exit_velocity_mph: Option<f64>,

    /// Quiet period in milliseconds before an event is closed
    #[arg(long)]
    pub event_grace_ms: Option<u64>,

    /// Where the scoreboard livedata XML is written
    #[arg(long)]
    pub livedata_path: Option<PathBuf>,

    /// Prometheus listener address
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

impl Settings {
    /// File (when given, and then it must exist), then `YAKKER_*` environment
    /// variables.
    pub fn new<P: AsRef<Path>>(path: Option<P>) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();

        if let Some(file) = path {
            builder = builder
                .add_source(File::with_name(&file.as_ref().to_string_lossy()).required(true));
        }
        builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .and_then(|config| config.try_deserialize())
    }

    /// Full startup resolution: file, environment, flags, then validation.
    pub fn load(args: &AppArgs) -> Result<Self> {
        let mut settings =
            Self::new(args.config.as_deref()).context("failed to load settings")?;
        settings.apply_args(args);
        settings.validate()?;
        Ok(settings)
    }

    pub fn apply_args(&mut self, args: &AppArgs) {
        if let Some(log) = &args.log {
            self.log = log.clone();
        }
        if let Some(ws_url) = &args.ws_url {
            self.ws_url = Some(ws_url.clone());
        }
        if let Some(auth_header) = &args.auth_header {
            self.auth_header = Some(auth_header.clone());
        }
        if let Some(port) = args.port {
            self.port = port;
        }
        self.demo |= args.demo;
        self.no_console |= args.no_console;
        if let Some(poll_interval) = args.poll_interval {
            self.poll_interval = poll_interval;
        }
        if let Some(stale_timeout) = args.stale_timeout {
            self.stale_timeout = stale_timeout;
        }
        self.min_exit_velocity_enabled |= args.min_exit_velocity;
        if let Some(threshold) = args.min_exit_velocity_mph {
            self.min_exit_velocity_mph = threshold;
        }
        if let Some(grace) = args.event_grace_ms {
            self.event_grace_ms = grace;
        }
        if let Some(path) = &args.livedata_path {
            self.livedata_path = path.clone();
        }
        if args.metrics_addr.is_some() {
            self.metrics_addr = args.metrics_addr;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.log.trim().is_empty() {
            bail!("log: filter directive cannot be empty");
        }

        if !self.demo {
            self.feed_url()?;
            let Some(auth) = self.auth_value() else {
                bail!("auth_header: an authorization value is required unless --demo is set");
            };
            if HeaderValue::from_str(&auth).is_err() {
                bail!("auth_header: contains characters not allowed in an HTTP header");
            }
        }

        if self.port == 0 {
            bail!("port: must be greater than 0");
        }

        if !(self.poll_interval.is_finite() && self.poll_interval > 0.0) {
            bail!("poll_interval: must be positive, got {}", self.poll_interval);
        }

        if !(self.stale_timeout.is_finite() && self.stale_timeout > 0.0) {
            bail!("stale_timeout: must be positive, got {}", self.stale_timeout);
        }

        if self.event_grace_ms == 0 {
            bail!("event_grace_ms: must be greater than 0");
        }

        if !(self.min_exit_velocity_mph.is_finite() && self.min_exit_velocity_mph >= 0.0) {
            bail!(
                "min_exit_velocity_mph: must be a non-negative number, got {}",
                self.min_exit_velocity_mph
            );
        }

        if self.livedata_path.as_os_str().is_empty() {
            bail!("livedata_path: cannot be empty");
        }

        Ok(())
    }

    pub fn feed_url(&self) -> Result<Url> {
        let Some(raw) = self.ws_url.as_deref().map(str::trim).filter(|url| !url.is_empty()) else {
            bail!("ws_url: a feed URL is required unless --demo is set");
        };
        let url = Url::parse(raw).with_context(|| format!("ws_url: invalid URL {raw:?}"))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            bail!("ws_url: scheme must be ws or wss, got {:?}", url.scheme());
        }
        Ok(url)
    }

    /// Header value sent to the feed, with any `Authorization:` prefix removed.
    pub fn auth_value(&self) -> Option<String> {
        let raw = self.auth_header.as_deref()?.trim();
        let value = match raw.get(..AUTHORIZATION_PREFIX.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(AUTHORIZATION_PREFIX) => {
                raw[AUTHORIZATION_PREFIX.len()..].trim()
            }
            _ => raw,
        };
        (!value.is_empty()).then(|| value.to_string())
    }

    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval)
    }

    pub fn stale_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.stale_timeout)
    }

    pub fn event_grace(&self) -> Duration {
        Duration::from_millis(self.event_grace_ms)
    }

    pub fn aggregator_policy(&self) -> AggregatorPolicy {
        let policy = AggregatorPolicy {
            grace: self.event_grace(),
            ..AggregatorPolicy::default()
        };
        if self.min_exit_velocity_enabled {
            policy.with_min_exit_velocity(self.min_exit_velocity_mph)
        } else {
            policy
        }
    }

    pub fn smoother_config(&self) -> SmootherConfig {
        SmootherConfig {
            staleness: StalenessPolicy::new(self.stale_timeout()),
            ..SmootherConfig::default()
        }
    }

    pub fn console_enabled(&self) -> bool {
        !self.no_console
    }
}
