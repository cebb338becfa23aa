use std::time::Duration;

pub const ENV_PREFIX: &str = "YAKKER";

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_POLL_INTERVAL_SECS: f64 = 1.0;
pub const DEFAULT_STALE_TIMEOUT_SECS: f64 = 10.0;
pub const DEFAULT_MIN_EXIT_VELOCITY_MPH: f64 = 65.0;
pub const DEFAULT_EVENT_GRACE_MS: u64 = 500;
pub const DEFAULT_LIVEDATA_PATH: &str = "livedata.xml";

/// Hit distances shorter than this are catcher throwbacks, not batted balls.
pub const MIN_HIT_DISTANCE_FT: f64 = 80.0;

// Throwback profile: soft and flat, reported without a pitch.
pub const THROWBACK_MAX_EXIT_VELOCITY_MPH: f64 = 60.0;
pub const THROWBACK_MIN_ANGLE_DEG: f64 = 10.0;
pub const THROWBACK_MAX_ANGLE_DEG: f64 = 20.0;
pub const MIN_CONTRIBUTING_EVENTS_FOR_HIT: usize = 2;

pub const ROLLING_RETENTION: Duration = Duration::from_secs(10);
pub const SMOOTHING_WINDOW: Duration = Duration::from_secs(1);
pub const PUBLISH_INTERVAL: Duration = Duration::from_secs(1);
pub const EVENT_SWEEP_INTERVAL: Duration = Duration::from_millis(100);

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const READ_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
pub const MIN_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);
pub const ERROR_AFTER_RETRIES: u32 = 3;

pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
