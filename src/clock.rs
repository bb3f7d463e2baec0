//! Single logical tick source and timed-callback queue.
//!
//! The engine is driven by an externally supplied logical step (the host
//! advances `now()` by calling [`Clock::advance`] once per tick). Everything
//! else — phase timers, periodic refills, tracker updates — is expressed as
//! a callback scheduled against this clock so that ordering stays
//! deterministic and independent of wall-clock time.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};

use tracing::error;

pub type Tick = u64;

/// Handle returned by [`Clock::schedule_every`], usable with [`Clock::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleHandle(u64);

type Callback = Box<dyn FnMut(&mut Clock) + Send>;

struct Recurring {
    period: Tick,
    callback: Callback,
    cancelled: bool,
}

struct Due {
    tick: Tick,
    sequence: u64,
    kind: DueKind,
}

enum DueKind {
    Once(Callback),
    Recurring(ScheduleHandle),
}

impl PartialEq for Due {
    fn eq(&self, other: &Self) -> bool {
        self.tick == other.tick && self.sequence == other.sequence
    }
}
impl Eq for Due {}

// Reversed ordering so `BinaryHeap` (a max-heap) pops the earliest tick
// first, then the earliest scheduling order (FIFO within a tick).
impl Ord for Due {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .tick
            .cmp(&self.tick)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}
impl PartialOrd for Due {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Cooperative-single-threaded scheduler.
///
/// All mutation happens on the engine thread inside [`Clock::advance`];
/// nothing here suspends mid-callback. A callback that panics is isolated —
/// logged and discarded — and, if it belongs to a recurring registration,
/// the registration continues ticking unless separately cancelled.
#[derive(Default)]
pub struct Clock {
    now: Tick,
    queue: BinaryHeap<Due>,
    recurring: std::collections::HashMap<u64, Recurring>,
    next_sequence: u64,
    next_handle: u64,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Tick {
        self.now
    }

    /// Queue `callback` to run exactly once when `now() == tick` (or the
    /// first `advance` past it, if `tick` has already elapsed).
    pub fn schedule_at(&mut self, tick: Tick, callback: impl FnMut(&mut Clock) + Send + 'static) {
        let sequence = self.next_sequence();
        self.queue.push(Due {
            tick,
            sequence,
            kind: DueKind::Once(Box::new(callback)),
        });
    }

    /// Queue `callback` to run every `period` ticks starting at `now() + period`.
    /// Returns a handle that can be passed to [`Clock::cancel`]; cancellation
    /// is observable on or before the next due tick.
    pub fn schedule_every(
        &mut self,
        period: Tick,
        callback: impl FnMut(&mut Clock) + Send + 'static,
    ) -> ScheduleHandle {
        let handle = ScheduleHandle(self.next_handle);
        self.next_handle += 1;
        self.recurring.insert(
            handle.0,
            Recurring {
                period,
                callback: Box::new(callback),
                cancelled: false,
            },
        );
        self.requeue_recurring(handle, self.now + period);
        handle
    }

    pub fn cancel(&mut self, handle: ScheduleHandle) {
        if let Some(r) = self.recurring.get_mut(&handle.0) {
            r.cancelled = true;
        }
    }

    fn next_sequence(&mut self) -> u64 {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }

    fn requeue_recurring(&mut self, handle: ScheduleHandle, tick: Tick) {
        let sequence = self.next_sequence();
        self.queue.push(Due {
            tick,
            sequence,
            kind: DueKind::Recurring(handle),
        });
    }

    /// Advance the clock to `tick`, running every due callback in
    /// tick-then-scheduling order.
    pub fn advance(&mut self, tick: Tick) {
        self.now = tick;
        while let Some(due) = self.queue.peek() {
            if due.tick > self.now {
                break;
            }
            let due = self.queue.pop().expect("peeked Some above");
            match due.kind {
                DueKind::Once(mut callback) => {
                    self.run_isolated(|clock| callback(clock));
                }
                DueKind::Recurring(handle) => {
                    let cancelled = self
                        .recurring
                        .get(&handle.0)
                        .map(|r| r.cancelled)
                        .unwrap_or(true);
                    if cancelled {
                        self.recurring.remove(&handle.0);
                        continue;
                    }

                    // Take the callback out so we can call it with `&mut self`
                    // without a double-borrow, then put it back.
                    let mut recurring = self.recurring.remove(&handle.0).expect("checked above");
                    self.run_isolated(|clock| (recurring.callback)(clock));
                    let period = recurring.period;
                    let still_cancelled = recurring.cancelled;
                    self.recurring.insert(handle.0, recurring);
                    if !still_cancelled {
                        self.requeue_recurring(handle, self.now + period);
                    } else {
                        self.recurring.remove(&handle.0);
                    }
                }
            }
        }
    }

    fn run_isolated(&mut self, mut f: impl FnMut(&mut Clock)) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| f(self)));
        if let Err(payload) = result {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            error!(%message, "scheduled callback panicked; isolated and discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn schedule_at_runs_once_at_tick() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut clock = Clock::new();
        let calls2 = calls.clone();
        clock.schedule_at(3, move |c| calls2.lock().unwrap().push(c.now()));
        clock.advance(1);
        clock.advance(2);
        assert!(calls.lock().unwrap().is_empty());
        clock.advance(3);
        assert_eq!(*calls.lock().unwrap(), vec![3]);
        clock.advance(4);
        assert_eq!(*calls.lock().unwrap(), vec![3]);
    }

    #[test]
    fn same_tick_callbacks_run_in_scheduling_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut clock = Clock::new();
        for i in 0..5 {
            let order = order.clone();
            clock.schedule_at(5, move |_| order.lock().unwrap().push(i));
        }
        clock.advance(5);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn schedule_every_reschedules_after_each_invocation() {
        let calls = Arc::new(Mutex::new(0u32));
        let mut clock = Clock::new();
        let calls2 = calls.clone();
        clock.schedule_every(10, move |_| *calls2.lock().unwrap() += 1);
        for tick in 1..=35 {
            clock.advance(tick);
        }
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[test]
    fn cancel_stops_future_recurrences() {
        let calls = Arc::new(Mutex::new(0u32));
        let mut clock = Clock::new();
        let calls2 = calls.clone();
        let handle = clock.schedule_every(10, move |_| *calls2.lock().unwrap() += 1);
        clock.advance(10);
        assert_eq!(*calls.lock().unwrap(), 1);
        clock.cancel(handle);
        for tick in 11..=40 {
            clock.advance(tick);
        }
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn panicking_callback_is_isolated() {
        let mut clock = Clock::new();
        clock.schedule_at(1, |_| panic!("boom"));
        let calls = Arc::new(Mutex::new(0u32));
        let calls2 = calls.clone();
        clock.schedule_at(1, move |_| *calls2.lock().unwrap() += 1);
        clock.advance(1);
        assert_eq!(*calls.lock().unwrap(), 1);
    }
}
