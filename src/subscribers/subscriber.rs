//! # Event subscriber trait.
//!
//! [`Subscribe`] is the extension point for observing scheduler events.
//!
//! Each subscriber gets:
//! - a **dedicated worker task** (runs independently of the driver),
//! - a **per-subscriber bounded queue** (capacity via [`Subscribe::queue_capacity`]),
//! - **panic isolation** (panics are caught and reported, other subscribers
//!   are unaffected).
//!
//! ## Example
//! ```
//! use async_trait::async_trait;
//! use taskloom::{Event, EventKind, Subscribe};
//!
//! struct Metrics;
//!
//! #[async_trait]
//! impl Subscribe for Metrics {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::TaskFailed) {
//!             // export a metric, etc.
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "metrics" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Event subscriber for scheduler observability.
///
/// Implementations should use async I/O, handle their own errors, and avoid
/// blocking the executor; slow processing only affects this subscriber's
/// queue.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Called from a dedicated worker task, never in the driver context.
    /// Events are delivered in FIFO order per subscriber.
    async fn on_event(&self, event: &Event);

    /// Returns the subscriber name used in overflow/panic diagnostics.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose —
    /// override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity for this subscriber.
    ///
    /// On overflow the new event is dropped for this subscriber only.
    /// The runtime clamps capacity to a minimum of 1. Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
