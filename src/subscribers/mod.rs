//! # Event subscribers for the taskloom scheduler.
//!
//! This module provides the [`Subscribe`] trait for plugging custom event
//! handlers into the scheduler, and [`SubscriberSet`] which fans events out to
//! them without blocking the driver.
//!
//! ```text
//! Driver ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//!                                                     ├─► [queue] worker ─► sub1.on_event()
//!                                                     ├─► [queue] worker ─► sub2.on_event()
//!                                                     └─► ...
//! ```
//!
//! The built-in [`LogWriter`] (feature `logging`) prints events to stdout.

mod set;
mod subscriber;

#[cfg(feature = "logging")]
mod log;

pub use set::SubscriberSet;
pub use subscriber::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
