//! Scheduler events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the scheduler driver.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publisher**: the scheduler driver (run loop).
//! - **Consumers**: the `SubscriberSet` listener spawned by
//!   [`TaskScheduler`](crate::TaskScheduler), plus any raw receiver obtained
//!   via [`TaskScheduler::subscribe`](crate::TaskScheduler::subscribe).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
