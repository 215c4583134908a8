// Copyright 2026 the Fresco Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cross-thread hand-off between redraw workers and the UI thread.
//!
//! Workers use a [`Synchronizer`] for two things: running a closure on the
//! UI thread and getting its result back ([`Synchronizer::run_in_main`]), and
//! announcing that the current redraw cycle is over
//! ([`Synchronizer::signal_exit`]).
//!
//! The UI thread drains requests either from its event loop
//! ([`Synchronizer::process_pending`], after the host waker fires) or while
//! blocked in [`Synchronizer::wait_for_exit`].
//!
//! ```text
//!   worker                            UI thread
//!   ──────                            ─────────
//!   run_in_main(f) ── slot ──► awaken ─► waker() ─► process_pending()
//!        ▲                      │                     │ runs f
//!        └──── result ◄─────────┼─────────────────────┘
//!                               └─► (blocked) condvar ─► wait_for_exit()
//!   signal_exit() ─────────────────────────────────────► exit observed
//! ```
//!
//! Queued requests are always drained before an exit is reported.
//!
//! `run_in_main` blocks the calling worker until the UI thread gets to the
//! request. It must never be called while holding a lock the UI thread may
//! take, or the two threads deadlock.

use core::fmt;

use crossbeam_channel::bounded;
use parking_lot::{Condvar, Mutex, MutexGuard};

type Slot = Box<dyn FnOnce() + Send>;
type ExitSlot = Box<dyn FnMut() + Send>;

/// A cross-thread request could not be completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncError {
    /// The request was dropped without being run.
    Disconnected,
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("UI thread dropped the request without running it"),
        }
    }
}

impl core::error::Error for SyncError {}

#[derive(Default)]
struct State {
    slots: Vec<Slot>,
    exit_posted: bool,
    main_blocked: bool,
}

/// Mutex and condition variable pair plus a host wake callback.
pub struct Synchronizer {
    state: Mutex<State>,
    cond: Condvar,
    waker: Box<dyn Fn() + Send + Sync>,
    exit_slot: Mutex<Option<ExitSlot>>,
}

impl fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.state.lock();
        f.debug_struct("Synchronizer")
            .field("pending", &st.slots.len())
            .field("exit_posted", &st.exit_posted)
            .field("main_blocked", &st.main_blocked)
            .finish_non_exhaustive()
    }
}

impl Synchronizer {
    /// Creates a synchronizer.
    ///
    /// `waker` is called from worker threads when the UI thread has work and
    /// is not already blocked waiting. It should schedule a call to
    /// [`process_pending`](Self::process_pending) on the UI thread's event
    /// loop and must not block.
    pub fn new<F: Fn() + Send + Sync + 'static>(waker: F) -> Self {
        Self {
            state: Mutex::new(State::default()),
            cond: Condvar::new(),
            waker: Box::new(waker),
            exit_slot: Mutex::new(None),
        }
    }

    /// Registers a callback fired by [`process_pending`](Self::process_pending)
    /// when it observes an exit. Replaces any previous callback.
    pub fn connect_exit<F: FnMut() + Send + 'static>(&self, slot: F) {
        *self.exit_slot.lock() = Some(Box::new(slot));
    }

    /// Reports that the current cycle is over. Called from any thread.
    pub fn signal_exit(&self) {
        let mut st = self.state.lock();
        let wake = self.awaken(&st);
        st.exit_posted = true;
        drop(st);
        if wake {
            (self.waker)();
        }
    }

    /// Runs `f` on the UI thread and returns its result, blocking the caller
    /// until it has run.
    pub fn run_in_main<R, F>(&self, f: F) -> Result<R, SyncError>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        let mut st = self.state.lock();
        let wake = self.awaken(&st);
        st.slots.push(Box::new(move || {
            _ = tx.send(f());
        }));
        drop(st);
        if wake {
            (self.waker)();
        }
        rx.recv().map_err(|_| SyncError::Disconnected)
    }

    /// Blocks the UI thread until an exit is signalled, servicing
    /// [`run_in_main`](Self::run_in_main) requests meanwhile. Consumes the
    /// exit.
    pub fn wait_for_exit(&self) {
        let mut st = self.state.lock();
        st.main_blocked = true;
        loop {
            if !st.slots.is_empty() {
                Self::process_slots(&mut st);
            } else if st.exit_posted {
                st.exit_posted = false;
                break;
            } else {
                self.cond.wait(&mut st);
            }
        }
        st.main_blocked = false;
    }

    /// Services pending requests from the UI thread's event loop.
    ///
    /// Returns `true` if an exit was pending; it is consumed and the
    /// [`connect_exit`](Self::connect_exit) callback has fired.
    pub fn process_pending(&self) -> bool {
        let mut st = self.state.lock();
        if !st.slots.is_empty() {
            Self::process_slots(&mut st);
        }
        if !st.exit_posted {
            return false;
        }
        st.exit_posted = false;
        drop(st);
        if let Some(slot) = self.exit_slot.lock().as_mut() {
            slot();
        }
        true
    }

    /// Returns `true` if an exit or a request is waiting.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        let st = self.state.lock();
        st.exit_posted || !st.slots.is_empty()
    }

    /// Decides how to get the UI thread's attention. Returns `true` if the
    /// host waker must be called once the lock is released.
    fn awaken(&self, st: &State) -> bool {
        if st.exit_posted || !st.slots.is_empty() {
            // Already notified.
            return false;
        }
        if st.main_blocked {
            self.cond.notify_all();
            false
        } else {
            true
        }
    }

    fn process_slots(st: &mut MutexGuard<'_, State>) {
        while !st.slots.is_empty() {
            let slots = core::mem::take(&mut st.slots);
            MutexGuard::unlocked(st, || {
                for slot in slots {
                    slot();
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    fn counting() -> (Arc<AtomicUsize>, Synchronizer) {
        let wakes = Arc::new(AtomicUsize::new(0));
        let w = Arc::clone(&wakes);
        let sync = Synchronizer::new(move || {
            w.fetch_add(1, Ordering::SeqCst);
        });
        (wakes, sync)
    }

    #[test]
    fn exit_wakes_host_once() {
        let (wakes, sync) = counting();
        sync.signal_exit();
        sync.signal_exit();
        assert_eq!(wakes.load(Ordering::SeqCst), 1, "second signal coalesces");
        assert!(sync.has_pending());
        assert!(sync.process_pending(), "exit observed");
        assert!(!sync.process_pending(), "exit consumed");
    }

    #[test]
    fn wait_for_exit_returns_after_signal() {
        let (_, sync) = counting();
        let sync = Arc::new(sync);
        let s = Arc::clone(&sync);
        let worker = thread::spawn(move || s.signal_exit());
        sync.wait_for_exit();
        worker.join().unwrap();
        assert!(!sync.has_pending(), "exit consumed by the wait");
    }

    #[test]
    fn run_in_main_served_while_waiting() {
        let (_, sync) = counting();
        let sync = Arc::new(sync);
        let main_id = thread::current().id();
        let s = Arc::clone(&sync);
        let worker = thread::spawn(move || {
            let ran_on = s.run_in_main(move || thread::current().id()).unwrap();
            s.signal_exit();
            ran_on
        });
        sync.wait_for_exit();
        assert_eq!(worker.join().unwrap(), main_id, "closure ran on the waiting thread");
    }

    #[test]
    fn run_in_main_served_by_process_pending() {
        let (wakes, sync) = counting();
        let sync = Arc::new(sync);
        let s = Arc::clone(&sync);
        let worker = thread::spawn(move || s.run_in_main(|| 6 * 7).unwrap());
        while wakes.load(Ordering::SeqCst) == 0 {
            thread::yield_now();
        }
        assert!(!sync.process_pending(), "request only, no exit");
        assert_eq!(worker.join().unwrap(), 42);
    }

    #[test]
    fn requests_drain_before_exit() {
        let (_, sync) = counting();
        let sync = Arc::new(sync);
        let order = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&sync);
        let o = Arc::clone(&order);
        let worker = thread::spawn(move || {
            let o2 = Arc::clone(&o);
            s.run_in_main(move || o2.lock().push("request")).unwrap();
            o.lock().push("exit");
            s.signal_exit();
        });
        sync.wait_for_exit();
        worker.join().unwrap();
        assert_eq!(*order.lock(), ["request", "exit"]);
    }

    #[test]
    fn exit_slot_fires_from_process_pending() {
        let (_, sync) = counting();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);
        sync.connect_exit(move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        sync.signal_exit();
        assert!(sync.process_pending());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn error_message() {
        assert_eq!(
            SyncError::Disconnected.to_string(),
            "UI thread dropped the request without running it"
        );
    }
}
