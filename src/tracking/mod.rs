//! Tracking sink — the analytics side-channel of the dialogue.

pub mod event;
pub mod http;
pub mod sink;

pub use event::{EventKind, TrackingEvent};
pub use http::HttpTrackingTransport;
pub use sink::{BufferedTracker, NoopTracker, TrackingSink, TrackingTransport};
