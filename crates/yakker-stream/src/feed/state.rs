use std::fmt;

/// Connection lifecycle of the feed client:
/// `Disconnected -> Connecting -> Connected -> Disconnected` on error, looping
/// with backoff until shutdown. Demo mode never connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Demo,
}

impl FeedState {
    pub const fn as_str(self) -> &'static str {
        match self {
            FeedState::Disconnected => "disconnected",
            FeedState::Connecting => "connecting",
            FeedState::Connected => "connected",
            FeedState::Demo => "demo",
        }
    }
}

impl fmt::Display for FeedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
