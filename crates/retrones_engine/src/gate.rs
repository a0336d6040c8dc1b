use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Counting semaphore used to hand execution between threads.
///
/// `acquire` blocks until a credit is available; each `release` adds one
/// credit and wakes one waiter. A closed gate never blocks again, which is
/// how teardown guarantees that nobody stays parked on it.
#[derive(Debug, Default)]
pub(crate) struct Gate {
    state: Mutex<GateState>,
    wakeup: Condvar,
}

#[derive(Debug, Default)]
struct GateState {
    permits: usize,
    waiting: usize,
    expected: usize,
    closed: bool,
}

impl Gate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until a credit is available, then consume it.
    pub(crate) fn acquire(&self) {
        drop(self.park(self.lock()));
    }

    /// Announce an upcoming `acquire_expected`.
    ///
    /// From here until that acquire completes, `release_expected` may add a
    /// credit for it.
    pub(crate) fn expect(&self) {
        self.lock().expected += 1;
    }

    /// `acquire` for a caller that announced itself with `expect`.
    pub(crate) fn acquire_expected(&self) {
        let mut state = self.park(self.lock());
        state.expected = state.expected.saturating_sub(1);
    }

    fn park<'a>(&'a self, mut state: MutexGuard<'a, GateState>) -> MutexGuard<'a, GateState> {
        state.waiting += 1;
        while state.permits == 0 && !state.closed {
            state = self
                .wakeup
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.waiting -= 1;
        if state.permits > 0 {
            state.permits -= 1;
        }
        state
    }

    /// Consume a credit if one is available, without blocking.
    pub(crate) fn try_acquire(&self) -> bool {
        let mut state = self.lock();
        if state.permits > 0 {
            state.permits -= 1;
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    pub(crate) fn release(&self) {
        let mut state = self.lock();
        state.permits += 1;
        self.wakeup.notify_one();
    }

    /// Add a credit only if none is pending.
    ///
    /// Returns `true` when a credit was added.
    pub(crate) fn release_if_unavailable(&self) -> bool {
        let mut state = self.lock();
        if state.permits > 0 {
            return false;
        }
        state.permits = 1;
        self.wakeup.notify_one();
        true
    }

    /// Add a credit only for an announced acquirer that has none yet.
    ///
    /// With nobody announced this is a no-op, so no credit can outlive the
    /// stop it was meant for.
    pub(crate) fn release_expected(&self) -> bool {
        let mut state = self.lock();
        if state.expected == 0 || state.permits > 0 {
            return false;
        }
        state.permits = 1;
        self.wakeup.notify_one();
        true
    }

    #[cfg(test)]
    pub(crate) fn available(&self) -> usize {
        self.lock().permits
    }

    /// Number of threads currently parked in `acquire`.
    pub(crate) fn waiting(&self) -> usize {
        self.lock().waiting
    }

    pub(crate) fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.wakeup.notify_all();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }
}
