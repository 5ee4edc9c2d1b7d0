// Cross-thread wake primitives
//
// A `Notifier` parks a worker's pump loop until someone queues work for it.
// A `Signal` is a fire-once latch used for the startup handshakes.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Wakes a thread that is parked waiting for work
///
/// Signals coalesce: any number of `signal` calls made while nobody is waiting
/// produce exactly one wakeup, and a signal sent before the waiter parks is
/// never lost.
pub trait Notifier: Send + Sync {
    /// Block until signalled, consuming the pending signal
    fn wait(&self);

    /// Like [`Notifier::wait`], giving up after `timeout`. Returns whether a
    /// signal was consumed.
    fn wait_timeout(&self, timeout: Duration) -> bool;

    fn signal(&self);
}

/// Notifier backed by a mutex-protected flag and a condition variable
#[derive(Default)]
pub struct CondvarNotifier {
    pending: Mutex<bool>,
    cond: Condvar,
}

impl CondvarNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Notifier for CondvarNotifier {
    fn wait(&self) {
        let mut pending = self.pending.lock();
        while !*pending {
            self.cond.wait(&mut pending);
        }
        *pending = false;
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock();
        while !*pending {
            if self.cond.wait_until(&mut pending, deadline).timed_out() {
                break;
            }
        }
        std::mem::replace(&mut *pending, false)
    }

    fn signal(&self) {
        let mut pending = self.pending.lock();
        *pending = true;
        self.cond.notify_one();
    }
}

/// Fire-once latch
///
/// Once fired it stays fired; every current and future waiter returns.
#[derive(Default)]
pub struct Signal {
    fired: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the latch. Returns `false` if it had already fired.
    pub fn fire(&self) -> bool {
        let mut fired = self.fired.lock();
        if *fired {
            return false;
        }
        *fired = true;
        self.cond.notify_all();
        true
    }

    pub fn wait(&self) {
        let mut fired = self.fired.lock();
        while !*fired {
            self.cond.wait(&mut fired);
        }
    }

    pub fn is_fired(&self) -> bool {
        *self.fired.lock()
    }
}
