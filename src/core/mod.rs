//! Scheduler core: the run loop and its state.
//!
//! The only public API from this module is [`TaskScheduler`]. Internal
//! modules:
//! - [`registry`]: the task registry and per-task state machine;
//! - [`policy`]: pure selection logic (priority / groups / deprioritization);
//! - [`driver`]: the run loop that steps tasks and handles cancellation;
//! - [`scheduler`]: the caller-facing facade.

mod driver;
mod policy;
mod registry;
mod scheduler;

pub use scheduler::TaskScheduler;
