//! Time-stepping seam.
//!
//! The kernel never integrates anything itself; it only needs to know
//! whether the configured method can start from a single state, which
//! gates local time stepping during array construction.

use serde::{Deserialize, Serialize};

/// A time-integration method, as seen by the kernel.
pub trait TimeStepper: Send + Sync {
    /// Unique name for this method.
    fn name(&self) -> &str;

    /// True when the method needs no externally supplied history to begin
    /// stepping.
    fn is_self_starting(&self) -> bool;
}

/// Resolved time state handed to every element at local initialization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeInfo {
    pub initial_time: f64,
    pub initial_dt: f64,
    /// Coarse synchronization interval; equals `|initial_dt|` under global
    /// stepping.
    pub slab_size: f64,
}
