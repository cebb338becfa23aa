pub mod demo;
pub mod listener;
pub mod payload;
mod state;

pub use demo::DemoFeed;
pub use listener::FeedListener;
pub use state::FeedState;
