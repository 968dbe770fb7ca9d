/*!
 * Observable State Cell
 *
 * A small value guarded by parking_lot::Mutex and paired with a Condvar so that
 * threads can block until the value leaves a given state. Every mutation wakes
 * all waiters; waiters re-check their predicate, so spurious wakeups are harmless.
 *
 * Worker loops use this for both suspension points:
 * - PAUSED wait: block until the state is no longer paused
 * - inter-tick sleep: block until a deadline passes or the state becomes stopped
 */

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Outcome of a bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome<S> {
    /// The predicate stopped holding before the deadline
    Released(S),
    /// The deadline passed while the predicate still held
    TimedOut(S),
}

impl<S: Copy> WaitOutcome<S> {
    #[inline]
    pub fn state(&self) -> S {
        match *self {
            Self::Released(s) | Self::TimedOut(s) => s,
        }
    }

    #[inline]
    pub fn timed_out(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }
}

/// Mutex + condvar pair around a copyable state value
pub struct StateCell<S> {
    value: Mutex<S>,
    changed: Condvar,
}

impl<S: Copy> StateCell<S> {
    pub const fn new(initial: S) -> Self {
        Self {
            value: Mutex::new(initial),
            changed: Condvar::new(),
        }
    }

    /// Current value (may be stale by the time the caller inspects it)
    #[inline]
    pub fn get(&self) -> S {
        *self.value.lock()
    }

    /// Overwrite the value and wake every waiter
    pub fn set(&self, next: S) -> S {
        let mut guard = self.value.lock();
        let prev = std::mem::replace(&mut *guard, next);
        drop(guard);
        self.changed.notify_all();
        prev
    }

    /// Apply a transition atomically
    ///
    /// `f` returns the new value, or `None` to leave the state untouched.
    /// Waiters are only notified when a transition happened. Returns the value
    /// observed before the call together with whether it changed.
    pub fn transition<F>(&self, f: F) -> (S, bool)
    where
        F: FnOnce(&S) -> Option<S>,
    {
        let mut guard = self.value.lock();
        let prev = *guard;
        match f(&prev) {
            Some(next) => {
                *guard = next;
                drop(guard);
                self.changed.notify_all();
                (prev, true)
            }
            None => (prev, false),
        }
    }

    /// Run `f` on the value under the lock, then wake every waiter
    ///
    /// Side effects performed inside `f` become visible together with the new value.
    pub fn update<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut S) -> R,
    {
        let mut guard = self.value.lock();
        let result = f(&mut *guard);
        drop(guard);
        self.changed.notify_all();
        result
    }

    /// Block while `pred` holds, returning the first value for which it doesn't
    pub fn wait_while<F>(&self, mut pred: F) -> S
    where
        F: FnMut(&S) -> bool,
    {
        let mut guard = self.value.lock();
        self.changed.wait_while(&mut guard, |s| pred(&*s));
        *guard
    }

    /// Block while `pred` holds, but no later than `deadline`
    pub fn wait_while_until<F>(&self, deadline: Instant, mut pred: F) -> WaitOutcome<S>
    where
        F: FnMut(&S) -> bool,
    {
        let mut guard = self.value.lock();
        let result = self
            .changed
            .wait_while_until(&mut guard, |s| pred(&*s), deadline);
        if result.timed_out() && pred(&*guard) {
            WaitOutcome::TimedOut(*guard)
        } else {
            WaitOutcome::Released(*guard)
        }
    }

    /// Block while `pred` holds, for at most `timeout`
    pub fn wait_while_for<F>(&self, timeout: Duration, pred: F) -> WaitOutcome<S>
    where
        F: FnMut(&S) -> bool,
    {
        self.wait_while_until(Instant::now() + timeout, pred)
    }
}

impl<S: Copy + Default> Default for StateCell<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S: Copy + std::fmt::Debug> std::fmt::Debug for StateCell<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StateCell").field(&self.get()).finish()
    }
}
