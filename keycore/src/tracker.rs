//! Bounded tracking of physical key state.
//!
//! The tracker keeps a fixed number of slots, one per physical key currently
//! of interest. Slots are claimed lazily as transitions arrive and reclaimed
//! once a released key outlives the tapping interval, so a key's tap timing
//! stays observable for exactly as long as tap detection needs it.

use embassy_time::Duration;

use crate::time::{self, Tick};

/// State recorded for one tracked physical key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackedKey {
    /// Scancode of the key occupying this slot; 0 marks a free slot.
    pub scancode: u8,
    /// Whether the key is currently down.
    pub down: bool,
    /// Consecutive down/up flips within the tapping interval. Maintained for
    /// keymap extensions; the dispatcher does not act on it.
    pub toggles: u8,
    /// Timestamp of the most recent transition.
    pub event_time: Tick,
    /// Timestamp of the previous transition of the same key.
    pub prior_time: Tick,
}

/// Fixed-capacity key-state tracker.
///
/// `ROLLOVER` bounds how many physical keys are tracked simultaneously; it is
/// unrelated to the six-slot limit of the boot-keyboard report. Transitions
/// arriving with every slot held down are dropped.
pub struct KeyTracker<const ROLLOVER: usize = 16> {
    slots: [TrackedKey; ROLLOVER],
    tapping_interval: u16,
}

impl<const ROLLOVER: usize> KeyTracker<ROLLOVER> {
    /// Creates an empty tracker bounding taps by `tapping_interval`.
    #[must_use]
    pub fn new(tapping_interval: Duration) -> Self {
        Self {
            slots: [TrackedKey::default(); ROLLOVER],
            tapping_interval: time::ticks(tapping_interval),
        }
    }

    /// Records a press or release of `scancode` observed at `now`.
    ///
    /// Returns `false` when every slot is occupied by a held key and the
    /// event had to be dropped.
    pub fn update(&mut self, scancode: u8, down: bool, now: Tick) -> bool {
        self.age(now);

        let Some(index) = self.find_slot(scancode, now) else {
            return false;
        };
        let slot = &mut self.slots[index];

        if slot.scancode == scancode
            && slot.down != down
            && now.since(slot.event_time) <= self.tapping_interval
        {
            slot.toggles = (slot.toggles + 1) & 0x7F;
        } else {
            slot.toggles = 1;
        }

        // Keep the pre-edge timestamp around for tap-duration measurement;
        // a slot claimed for a different key has no usable history.
        slot.prior_time = if slot.scancode == scancode {
            slot.event_time
        } else {
            now
        };

        slot.scancode = scancode;
        slot.down = down;
        slot.event_time = now;
        true
    }

    /// Frees every released slot whose last transition is older than the
    /// tapping interval.
    fn age(&mut self, now: Tick) {
        for slot in &mut self.slots {
            if slot.scancode != 0
                && !slot.down
                && now.since(slot.event_time) > self.tapping_interval
            {
                *slot = TrackedKey::default();
            }
        }
    }

    /// Finds the slot to record `scancode` into: an exact match wins, then
    /// the first free slot, then the released slot with the oldest
    /// transition. `None` when all slots hold keys that are still down.
    fn find_slot(&self, scancode: u8, now: Tick) -> Option<usize> {
        let mut available = None;
        let mut oldest: Option<usize> = None;

        for (index, slot) in self.slots.iter().enumerate() {
            if slot.scancode == scancode {
                return Some(index);
            }

            if available.is_some() {
                continue;
            }

            if slot.scancode == 0 {
                available = Some(index);
                continue;
            }

            if !slot.down {
                let older = match oldest {
                    None => true,
                    Some(o) => now.since(slot.event_time) > now.since(self.slots[o].event_time),
                };
                if older {
                    oldest = Some(index);
                }
            }
        }

        available.or(oldest)
    }

    /// Whether the slot's last release-after-press fits the tapping interval.
    #[must_use]
    pub fn tap(&self, key: &TrackedKey) -> bool {
        key.event_time.since(key.prior_time) <= self.tapping_interval
    }

    /// Ordered iteration over every slot; callers skip free slots.
    pub fn slots(&self) -> core::slice::Iter<'_, TrackedKey> {
        self.slots.iter()
    }

    /// Forgets all tracked keys.
    pub fn clear(&mut self) {
        self.slots = [TrackedKey::default(); ROLLOVER];
    }
}
