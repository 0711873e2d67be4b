use std::collections::BinaryHeap;

/// Timed events the machine can enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum EventKind {
    /// End of the OAM DMA bus-conflict window.
    DmaComplete,
    /// Completion of a serial transfer started through SC.
    SerialDone,
}

/// Sentinel returned by `cycles_to_next` when nothing is queued.
pub(super) const NO_EVENT: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScheduledEvent {
    fire_at: u64,
    /// Monotonic insertion counter. Events posted at the same cycle fire in
    /// the order they were scheduled.
    seq: u64,
    kind: EventKind,
}

// `BinaryHeap` is a max-heap, so the ordering is reversed to surface the
// earliest (fire_at, seq) pair first.
impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (other.fire_at, other.seq).cmp(&(self.fire_at, self.seq))
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Monotonic cycle clock plus a priority queue of pending timed events.
///
/// `advance` only moves the clock; firing happens in `pop_due`, which the
/// bus drains after every instruction step. Events are posted at
/// instruction boundaries, so ties on the fire cycle are resolved by
/// insertion order.
pub(super) struct Scheduler {
    current_cycle: u64,
    next_seq: u64,
    queue: BinaryHeap<ScheduledEvent>,
    /// Fire cycle of the most recently popped event, used to catch heap
    /// ordering corruption.
    last_popped: u64,
}

impl Scheduler {
    pub(super) fn new() -> Self {
        Self {
            current_cycle: 0,
            next_seq: 0,
            queue: BinaryHeap::new(),
            last_popped: 0,
        }
    }

    /// Enqueue `kind` to fire `delay_cycles` from now.
    pub(super) fn schedule(&mut self, kind: EventKind, delay_cycles: u64) {
        let event = ScheduledEvent {
            fire_at: self.current_cycle + delay_cycles,
            seq: self.next_seq,
            kind,
        };
        self.next_seq += 1;
        self.queue.push(event);

        log::trace!("scheduled {:?} to fire at cycle {}", kind, event.fire_at);
    }

    /// Remove every pending event of `kind`, rebuilding the heap.
    pub(super) fn deschedule(&mut self, kind: EventKind) {
        let events: Vec<ScheduledEvent> = std::mem::take(&mut self.queue).into_vec();
        self.queue = events.into_iter().filter(|e| e.kind != kind).collect();

        log::trace!("descheduled all {:?} events", kind);
    }

    /// Advance the clock by `cycles`. Does not fire events.
    pub(super) fn advance(&mut self, cycles: u64) {
        self.current_cycle += cycles;
    }

    /// Pop the next due event, if any. Callers drain this in a loop and
    /// dispatch on the returned kind.
    pub(super) fn pop_due(&mut self) -> Option<EventKind> {
        let next = *self.queue.peek()?;
        if next.fire_at > self.current_cycle {
            return None;
        }
        self.queue.pop();

        // Popping out of fire order means the heap invariant is broken,
        // which is a bug in the scheduler itself.
        assert!(
            next.fire_at >= self.last_popped,
            "scheduler heap ordering violated: popped cycle {} after {}",
            next.fire_at,
            self.last_popped,
        );
        self.last_popped = next.fire_at;

        Some(next.kind)
    }

    /// Cycles until the next pending event fires, saturating at 0 for
    /// already-due events. Returns `NO_EVENT` when the queue is empty.
    pub(super) fn cycles_to_next(&self) -> u64 {
        match self.queue.peek() {
            Some(event) => event.fire_at.saturating_sub(self.current_cycle),
            None => NO_EVENT,
        }
    }

    pub(super) fn current_cycle(&self) -> u64 {
        self.current_cycle
    }

    /// Drop all pending events and rewind the clock to zero.
    pub(super) fn reset(&mut self) {
        self.queue.clear();
        self.current_cycle = 0;
        self.next_seq = 0;
        self.last_popped = 0;

        log::debug!("scheduler reset");
    }
}
