//! Per-module lifecycle state and active-call counting.
//!
//! State and the call counter share one mutex so that "state is Running" and
//! "count was incremented" are observed together. The unloader waits on the
//! condition variable for the count to drain.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::state::ModuleState;

#[derive(Debug)]
struct Inner {
    state: ModuleState,
    active_calls: usize,
}

/// Lifecycle state plus in-flight call counter of one module.
#[derive(Debug)]
pub struct Lifecycle {
    inner: Mutex<Inner>,
    idle: Condvar,
}

impl Lifecycle {
    pub fn new(state: ModuleState) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state,
                active_calls: 0,
            }),
            idle: Condvar::new(),
        }
    }

    pub fn state(&self) -> ModuleState {
        self.inner.lock().state
    }

    pub fn active_calls(&self) -> usize {
        self.inner.lock().active_calls
    }

    /// Move to `next`. Returns the previous state, or the current state if
    /// the edge is not legal (nothing changes then).
    pub fn transition(&self, next: ModuleState) -> Result<ModuleState, ModuleState> {
        let mut inner = self.inner.lock();
        let prev = inner.state;
        if !prev.can_transition_to(next) {
            return Err(prev);
        }
        inner.state = next;
        Ok(prev)
    }

    /// Register an in-flight call. Fails with the current state unless the
    /// module is `Running`.
    pub fn try_enter(&self) -> Result<(), ModuleState> {
        let mut inner = self.inner.lock();
        if !inner.state.accepts_calls() {
            return Err(inner.state);
        }
        inner.active_calls += 1;
        Ok(())
    }

    /// Release an in-flight call and wake the unloader when idle.
    pub fn exit(&self) {
        let mut inner = self.inner.lock();
        inner.active_calls = inner.active_calls.saturating_sub(1);
        if inner.active_calls == 0 {
            self.idle.notify_all();
        }
    }

    /// Stop accepting calls. Idempotent for a module already shutting down,
    /// so a timed-out unload can be retried.
    pub fn begin_shutdown(&self) -> Result<(), ModuleState> {
        let mut inner = self.inner.lock();
        match inner.state {
            ModuleState::ShuttingDown => Ok(()),
            ModuleState::Running => {
                inner.state = ModuleState::ShuttingDown;
                Ok(())
            }
            other => Err(other),
        }
    }

    /// Block until no calls are in flight or `timeout` elapses. On timeout
    /// returns the number of calls still active.
    pub fn wait_idle(&self, timeout: Duration) -> Result<(), usize> {
        let mut inner = self.inner.lock();
        self.idle
            .wait_while_for(&mut inner, |inner| inner.active_calls > 0, timeout);
        match inner.active_calls {
            0 => Ok(()),
            n => Err(n),
        }
    }
}
