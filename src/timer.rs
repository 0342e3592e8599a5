//! Cooperative timer queue driven by the host's frame callback.
//!
//! A [`Scheduler`] owns every pending [`Timer`] of one view. Timers live in an
//! arena and are threaded into a singly linked list in the order they were
//! first scheduled; a flush walks that list once and fires every timer whose
//! time has come. The host calls [`Scheduler::wake`] once per frame and uses
//! the returned [`FrameRequest`] to decide when to call it again.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Instant;

use tracing::trace;

/// Timers due within this many milliseconds are served by the next frame.
const FRAME_HORIZON_MS: f64 = 24.0;
/// A gap between wakes longer than this is treated as a suspended host.
const POKE_DELAY_MS: f64 = 1000.0;

/// Source of monotonic milliseconds.
pub trait Clock {
    fn now(&self) -> f64;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Clock that only moves when told to. Clones share the same reading.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now: f64) {
        self.now.set(now);
    }

    pub fn advance(&self, millis: f64) {
        self.now.set(self.now.get() + millis);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}

/// What the host should do after a wake.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameRequest {
    /// Call [`Scheduler::wake`] again on the next display frame.
    NextFrame,
    /// Nothing is due soon; wake again after this many milliseconds.
    After(f64),
    /// The queue is empty.
    Idle,
}

type Callback = Box<dyn FnMut(f64)>;

struct Slot {
    callback: Option<Callback>,
    active: bool,
    time: f64,
    next: Option<usize>,
    linked: bool,
    /// Bumped by every restart and stop so a running callback can tell
    /// whether it was replaced while it ran.
    epoch: u64,
    handles: usize,
}

#[derive(Default)]
struct Queue {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    clock_now: Option<f64>,
    clock_last: f64,
    clock_skew: f64,
    frame_armed: bool,
}

impl Queue {
    fn slot_mut(&mut self, index: usize) -> Option<&mut Slot> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    fn allocate(&mut self) -> usize {
        let slot = Slot {
            callback: None,
            active: false,
            time: f64::INFINITY,
            next: None,
            linked: false,
            epoch: 0,
            handles: 1,
        };
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(slot);
                index
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, index: usize) {
        if let Some(entry) = self.slots.get_mut(index)
            && entry.take().is_some()
        {
            self.free.push(index);
        }
    }

    fn link(&mut self, index: usize) {
        match self.tail {
            Some(tail) => {
                if let Some(slot) = self.slot_mut(tail) {
                    slot.next = Some(index);
                }
            }
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        if let Some(slot) = self.slot_mut(index) {
            slot.linked = true;
        }
    }

    /// Unlinks stopped timers and returns the earliest pending time.
    fn nap(&mut self) -> f64 {
        let mut earliest = f64::INFINITY;
        let mut previous: Option<usize> = None;
        let mut cursor = self.head;

        while let Some(index) = cursor {
            let Some(slot) = self.slot_mut(index) else {
                break;
            };

            if slot.active {
                earliest = earliest.min(slot.time);
                previous = Some(index);
                cursor = slot.next;
                continue;
            }

            let next = slot.next.take();
            slot.linked = false;
            let orphaned = slot.handles == 0;
            match previous {
                Some(previous) => {
                    if let Some(previous) = self.slot_mut(previous) {
                        previous.next = next;
                    }
                }
                None => self.head = next,
            }
            if orphaned {
                self.release(index);
            }
            cursor = next;
        }

        self.tail = previous;
        earliest
    }

    fn request_for(&mut self, earliest: f64, now: f64) -> FrameRequest {
        if earliest == f64::INFINITY {
            self.frame_armed = false;
            return FrameRequest::Idle;
        }

        let delay = earliest - now;
        if delay > FRAME_HORIZON_MS {
            self.frame_armed = false;
            FrameRequest::After(delay)
        } else {
            self.frame_armed = true;
            FrameRequest::NextFrame
        }
    }
}

struct Shared {
    queue: RefCell<Queue>,
    clock: Box<dyn Clock>,
}

/// Handle to a timer queue. Clones refer to the same queue; dropping the last
/// handle drops every pending callback.
#[derive(Clone)]
pub struct Scheduler {
    shared: Rc<Shared>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = self.shared.queue.borrow();
        f.debug_struct("Scheduler")
            .field("slots", &queue.slots.len())
            .field("clock_skew", &queue.clock_skew)
            .field("frame_armed", &queue.frame_armed)
            .finish()
    }
}

impl Scheduler {
    pub fn new(clock: impl Clock + 'static) -> Self {
        let clock_last = clock.now();
        Self {
            shared: Rc::new(Shared {
                queue: RefCell::new(Queue {
                    clock_last,
                    ..Queue::default()
                }),
                clock: Box::new(clock),
            }),
        }
    }

    /// Scheduler backed by the monotonic system clock.
    pub fn system() -> Self {
        Self::new(SystemClock::new())
    }

    /// Current time in milliseconds. Stable for the duration of a flush.
    pub fn now(&self) -> f64 {
        let queue = self.shared.queue.borrow();
        queue
            .clock_now
            .unwrap_or_else(|| self.shared.clock.now() + queue.clock_skew)
    }

    /// Schedules `callback` to run every frame once `time + delay` has passed.
    /// `time` defaults to [`Scheduler::now`].
    pub fn timer(
        &self,
        callback: impl FnMut(f64) + 'static,
        delay: f64,
        time: Option<f64>,
    ) -> Timer {
        let index = self.shared.queue.borrow_mut().allocate();
        let timer = Timer {
            shared: Rc::downgrade(&self.shared),
            index,
        };
        timer.restart(callback, delay, time);
        timer
    }

    /// Like [`Scheduler::timer`] but fires once, reporting the elapsed time
    /// since `time` rather than since the delay expired.
    pub fn timeout(
        &self,
        callback: impl FnOnce(f64) + 'static,
        delay: f64,
        time: Option<f64>,
    ) -> Timer {
        let index = self.shared.queue.borrow_mut().allocate();
        let timer = Timer {
            shared: Rc::downgrade(&self.shared),
            index,
        };
        let own = timer.clone();
        let mut callback = Some(callback);
        timer.restart(
            move |elapsed| {
                own.stop();
                if let Some(callback) = callback.take() {
                    callback(elapsed + delay);
                }
            },
            delay,
            time,
        );
        timer
    }

    /// Fires every due timer without touching the frame bookkeeping.
    pub fn flush(&self) {
        let cached = self.shared.queue.borrow().clock_now.is_some();
        if !cached {
            let now = self.now();
            self.shared.queue.borrow_mut().clock_now = Some(now);
        }

        self.fire_due();

        if !cached {
            self.shared.queue.borrow_mut().clock_now = None;
        }
    }

    /// Frame-driver entry point.
    pub fn wake(&self) -> FrameRequest {
        let raw = self.shared.clock.now();
        {
            let mut queue = self.shared.queue.borrow_mut();
            let gap = raw - queue.clock_last;
            if queue.frame_armed && gap > POKE_DELAY_MS {
                queue.clock_skew -= gap;
                trace!(gap, "clock skew corrected after a stalled frame");
            }
            queue.clock_last = raw;
            queue.clock_now = Some(raw + queue.clock_skew);
        }

        self.fire_due();

        let mut queue = self.shared.queue.borrow_mut();
        let now = queue.clock_now.take().unwrap_or(raw + queue.clock_skew);
        let earliest = queue.nap();
        let request = queue.request_for(earliest, now);
        trace!(?request, "timer queue flushed");
        request
    }

    /// Skew check for hosts that can run a coarse interval while frames are
    /// suspended.
    pub fn poke(&self) {
        let raw = self.shared.clock.now();
        let mut queue = self.shared.queue.borrow_mut();
        let gap = raw - queue.clock_last;
        if gap > POKE_DELAY_MS {
            queue.clock_skew -= gap;
            queue.clock_last = raw;
        }
    }

    /// The request the host should honour right now, without firing anything.
    pub fn next_request(&self) -> FrameRequest {
        let now = self.now();
        let mut queue = self.shared.queue.borrow_mut();
        let earliest = queue.nap();
        queue.request_for(earliest, now)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.next_request(), FrameRequest::Idle)
    }

    fn fire_due(&self) {
        let mut cursor = self.shared.queue.borrow().head;

        while let Some(index) = cursor {
            let due = {
                let mut queue = self.shared.queue.borrow_mut();
                let now = queue.clock_now.unwrap_or(f64::NEG_INFINITY);
                queue.slot_mut(index).and_then(|slot| {
                    let elapsed = now - slot.time;
                    if slot.active && elapsed >= 0.0 {
                        let epoch = slot.epoch;
                        slot.callback.take().map(|callback| (callback, elapsed, epoch))
                    } else {
                        None
                    }
                })
            };

            if let Some((mut callback, elapsed, epoch)) = due {
                callback(elapsed);
                let leftover = {
                    let mut queue = self.shared.queue.borrow_mut();
                    match queue.slot_mut(index) {
                        Some(slot)
                            if slot.active && slot.epoch == epoch && slot.callback.is_none() =>
                        {
                            slot.callback = Some(callback);
                            None
                        }
                        _ => Some(callback),
                    }
                };
                drop(leftover);
            }

            cursor = self
                .shared
                .queue
                .borrow()
                .slots
                .get(index)
                .and_then(Option::as_ref)
                .and_then(|slot| slot.next);
        }
    }
}

/// Handle to one timer slot. Handles are cheap to clone; the slot is
/// recycled once it is stopped, unlinked and no handle remains.
pub struct Timer {
    shared: Weak<Shared>,
    index: usize,
}

impl Timer {
    /// Replaces the callback and due time. A stopped timer rejoins the end of
    /// the queue; a pending one keeps its place.
    pub fn restart(&self, callback: impl FnMut(f64) + 'static, delay: f64, time: Option<f64>) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };

        let start = match time {
            Some(time) => time,
            None => {
                let queue = shared.queue.borrow();
                queue
                    .clock_now
                    .unwrap_or_else(|| shared.clock.now() + queue.clock_skew)
            }
        };

        let previous = {
            let mut queue = shared.queue.borrow_mut();
            let linked = queue.slot_mut(self.index).is_some_and(|slot| slot.linked);
            if !linked {
                queue.link(self.index);
            }
            queue.slot_mut(self.index).and_then(|slot| {
                slot.active = true;
                slot.time = start + delay;
                slot.epoch += 1;
                slot.callback.replace(Box::new(callback))
            })
        };
        drop(previous);
    }

    /// Stops the timer. Stopping twice is a no-op.
    pub fn stop(&self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };

        let previous = {
            let mut queue = shared.queue.borrow_mut();
            queue.slot_mut(self.index).and_then(|slot| {
                if !slot.active {
                    return None;
                }
                slot.active = false;
                slot.time = f64::INFINITY;
                slot.epoch += 1;
                slot.callback.take()
            })
        };
        drop(previous);
    }

    pub fn is_active(&self) -> bool {
        self.shared.upgrade().is_some_and(|shared| {
            shared
                .queue
                .borrow_mut()
                .slot_mut(self.index)
                .is_some_and(|slot| slot.active)
        })
    }
}

impl Clone for Timer {
    fn clone(&self) -> Self {
        if let Some(shared) = self.shared.upgrade()
            && let Some(slot) = shared.queue.borrow_mut().slot_mut(self.index)
        {
            slot.handles += 1;
        }
        Self {
            shared: self.shared.clone(),
            index: self.index,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let Ok(mut queue) = shared.queue.try_borrow_mut() else {
            return;
        };

        let release = queue.slot_mut(self.index).is_some_and(|slot| {
            slot.handles = slot.handles.saturating_sub(1);
            slot.handles == 0 && !slot.linked
        });
        if release {
            queue.release(self.index);
        }
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("index", &self.index)
            .field("active", &self.is_active())
            .finish()
    }
}
