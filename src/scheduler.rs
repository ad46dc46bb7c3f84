//! Periodic tick sources driven by an external clock.
//!
//! The scheduler never reads a clock itself. The host reports the current
//! time and pulls due events out one at a time with [`Scheduler::pop_due`],
//! so a handler that cancels a source stops it before its next firing even
//! when several firings were due in the same call.

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct TimerHandle(u32);

#[derive(Clone, Debug)]
struct Periodic<E> {
    handle: TimerHandle,
    interval: u64,
    due: u64,
    event: E,
}

#[derive(Clone, Debug)]
pub struct Scheduler<E> {
    now: u64,
    timers: Vec<Periodic<E>>,
    next_handle: u32,
}

impl<E: Copy> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Copy> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            now: 0,
            timers: Vec::new(),
            next_handle: 0,
        }
    }

    /// Fires `event` every `interval` clock units, first at `now + interval`.
    pub fn register_periodic(&mut self, interval: u64, event: E) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        let interval = interval.max(1);
        self.timers.push(Periodic {
            handle,
            interval,
            due: self.now + interval,
            event,
        });
        handle
    }

    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.handle != handle);
        self.timers.len() != before
    }

    pub fn is_active(&self, handle: TimerHandle) -> bool {
        self.timers.iter().any(|t| t.handle == handle)
    }

    pub fn active_count(&self) -> usize {
        self.timers.len()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    /// Returns the earliest event due at or before `until` and reschedules
    /// its source. Ties go to the source registered first. Once nothing is
    /// due the internal clock moves to `until`.
    pub fn pop_due(&mut self, until: u64) -> Option<(TimerHandle, E)> {
        let next = self
            .timers
            .iter_mut()
            .filter(|t| t.due <= until)
            .min_by_key(|t| (t.due, t.handle));
        match next {
            Some(timer) => {
                self.now = self.now.max(timer.due);
                timer.due += timer.interval;
                log::trace!("timer {:?} fired at {}", timer.handle, self.now);
                Some((timer.handle, timer.event))
            }
            None => {
                self.now = self.now.max(until);
                None
            }
        }
    }
}
