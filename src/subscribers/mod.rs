//! # Event subscribers.
//!
//! Subscribers observe the events published by every event loop and running
//! child. They cannot influence scheduling.
//!
//! ```text
//! EventLoop / runner ── publish(Event) ──► Bus ──► Scheduler listener ──► SubscriberSet
//!                                                                          ├──► LogWriter
//!                                                                          └──► custom ...
//! ```
//!
//! - [`Subscribe`]: the extension point.
//! - [`SubscriberSet`]: non-blocking fan-out with per-subscriber queues.
//! - [`LogWriter`]: prints events (`logging` feature).

#[cfg(feature = "logging")]
mod log;
mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
