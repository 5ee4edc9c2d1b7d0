//! Thread-local id of the worker running on the current thread.
//!
//! Worker threads set their id once at startup and clear it before exit, so
//! error hooks can attribute a failure to the right worker without taking the
//! pool lock. Threads that never set an id (the pool owner's thread, fetch
//! threads, tests) see `None`.

use super::WorkerId;
use std::cell::Cell;

thread_local! {
    static CURRENT_WORKER: Cell<Option<WorkerId>> = const { Cell::new(None) };
}

#[inline]
pub fn set_current_worker_id(id: Option<WorkerId>) {
    CURRENT_WORKER.with(|c| c.set(id));
}

#[inline]
pub fn current_worker_id() -> Option<WorkerId> {
    CURRENT_WORKER.with(|c| c.get())
}
