//! One-shot start gate.
//!
//! Released by the transfer worker either on the first successful write into
//! the ring or when the transfer ends without one, so a single wait point in
//! `start`/`seek` covers both "data is flowing" and "the transfer already
//! failed". Resettable between transfer runs.

use std::sync::{Condvar, Mutex};

pub(crate) struct Gate {
    state: Mutex<bool>,
    condvar: Condvar,
}

impl Gate {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Opens the gate and wakes all waiters. Idempotent.
    pub(crate) fn set(&self) {
        let mut state = self.state.lock().expect("gate mutex poisoned");
        *state = true;
        drop(state);
        self.condvar.notify_all();
    }

    /// Closes the gate for the next transfer run.
    pub(crate) fn reset(&self) {
        *self.state.lock().expect("gate mutex poisoned") = false;
    }

    /// Blocks until the gate is open.
    pub(crate) fn wait(&self) {
        let mut state = self.state.lock().expect("gate mutex poisoned");
        while !*state {
            state = self.condvar.wait(state).expect("gate mutex poisoned");
        }
    }
}
