//! Thread-per-worker JavaScript worker pool.
//!
//! Every worker runs its own interpreter on a dedicated OS thread and talks to
//! the others only through queued text messages. Worker 0 is the thread that
//! owns the pool; errors raised anywhere in the pool are delivered to it as
//! error events.

pub mod js;

pub use js::*;
