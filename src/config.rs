//! Scheduler configuration.

/// Configuration for a [`TaskScheduler`](crate::TaskScheduler).
///
/// # Example
/// ```
/// use taskloom::SchedulerConfig;
///
/// let mut cfg = SchedulerConfig::default();
/// cfg.bus_capacity = 256;
/// assert_eq!(cfg.bus_capacity, 256);
/// ```
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Capacity of the event bus channel (clamped to a minimum of 1).
    pub bus_capacity: usize,
}

impl Default for SchedulerConfig {
    /// Provides a default configuration:
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self { bus_capacity: 1024 }
    }
}
