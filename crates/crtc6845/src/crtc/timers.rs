/*
    MartyPC
    https://github.com/dbalsom/martypc

    Copyright 2022-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    crtc::timers.rs

    One-shot timer table for the CRTC. Each timer is identified by a fixed
    tag; re-adjusting a tag overwrites its pending entry. Timers due at the
    same character clock fire in the order they were scheduled.

*/

use serde_derive::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimerId {
    Line,
    DeOff,
    CursorOn,
    CursorOff,
    HsyncOn,
    HsyncOff,
    LightPenLatch,
    UpdateAddr,
    UpdateTransfer,
    BlockCopy,
}

pub const TIMER_COUNT: usize = 10;

const TIMER_IDS: [TimerId; TIMER_COUNT] = [
    TimerId::Line,
    TimerId::DeOff,
    TimerId::CursorOn,
    TimerId::CursorOff,
    TimerId::HsyncOn,
    TimerId::HsyncOff,
    TimerId::LightPenLatch,
    TimerId::UpdateAddr,
    TimerId::UpdateTransfer,
    TimerId::BlockCopy,
];

#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimerSlot {
    pub armed: bool,
    /// Cycle at which the timer was (re)scheduled.
    pub sched_at: u64,
    /// Cycle at which the timer is due.
    pub fire_at: u64,
    /// Scheduling order, for stable same-cycle firing.
    pub seq: u64,
    /// Optional payload delivered back on expiry.
    pub param: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimerSet {
    slots: [TimerSlot; TIMER_COUNT],
    next_seq: u64,
}

impl Default for TimerSet {
    fn default() -> Self {
        Self {
            slots: [TimerSlot::default(); TIMER_COUNT],
            next_seq: 0,
        }
    }
}

impl TimerSet {
    pub fn new() -> Self {
        Default::default()
    }

    /// Arm (or re-arm) a timer to fire `delay` character clocks from `now`.
    pub fn adjust(&mut self, id: TimerId, now: u64, delay: u64) {
        self.adjust_param(id, now, delay, 0);
    }

    pub fn adjust_param(&mut self, id: TimerId, now: u64, delay: u64, param: u32) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots[id as usize] = TimerSlot {
            armed: true,
            sched_at: now,
            fire_at: now + delay,
            seq,
            param,
        };
    }

    pub fn cancel(&mut self, id: TimerId) {
        self.slots[id as usize].armed = false;
    }

    #[inline]
    pub fn enabled(&self, id: TimerId) -> bool {
        self.slots[id as usize].armed
    }

    /// Character clocks elapsed since the timer was last scheduled.
    #[inline]
    pub fn elapsed(&self, id: TimerId, now: u64) -> u64 {
        let slot = &self.slots[id as usize];
        if slot.armed {
            now.saturating_sub(slot.sched_at)
        }
        else {
            0
        }
    }

    /// Find the next timer due at or before `deadline`. Ties on due cycle
    /// resolve in scheduling order.
    pub fn next_due(&self, deadline: u64) -> Option<TimerId> {
        let mut best: Option<(TimerId, u64, u64)> = None;
        for id in TIMER_IDS {
            let slot = &self.slots[id as usize];
            if !slot.armed || slot.fire_at > deadline {
                continue;
            }
            match best {
                Some((_, fire_at, seq)) if (slot.fire_at, slot.seq) >= (fire_at, seq) => {}
                _ => best = Some((id, slot.fire_at, slot.seq)),
            }
        }
        best.map(|(id, _, _)| id)
    }

    /// Disarm a due timer, returning its (due cycle, payload).
    pub fn take(&mut self, id: TimerId) -> (u64, u32) {
        let slot = &mut self.slots[id as usize];
        slot.armed = false;
        (slot.fire_at, slot.param)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjust_overwrites_pending_entry() {
        let mut timers = TimerSet::new();
        timers.adjust(TimerId::LightPenLatch, 0, 10);
        timers.adjust(TimerId::LightPenLatch, 5, 10);
        assert_eq!(timers.next_due(10), None);
        assert_eq!(timers.next_due(15), Some(TimerId::LightPenLatch));
    }

    #[test]
    fn same_cycle_fires_in_scheduling_order() {
        let mut timers = TimerSet::new();
        timers.adjust(TimerId::HsyncOn, 0, 8);
        timers.adjust(TimerId::DeOff, 0, 8);

        assert_eq!(timers.next_due(8), Some(TimerId::HsyncOn));
        timers.take(TimerId::HsyncOn);
        assert_eq!(timers.next_due(8), Some(TimerId::DeOff));
        timers.take(TimerId::DeOff);
        assert_eq!(timers.next_due(8), None);
    }

    #[test]
    fn earliest_deadline_wins() {
        let mut timers = TimerSet::new();
        timers.adjust(TimerId::Line, 0, 50);
        timers.adjust(TimerId::CursorOn, 0, 12);
        assert_eq!(timers.next_due(100), Some(TimerId::CursorOn));
    }

    #[test]
    fn elapsed_counts_from_schedule_point() {
        let mut timers = TimerSet::new();
        timers.adjust(TimerId::Line, 100, 57);
        assert_eq!(timers.elapsed(TimerId::Line, 130), 30);
        timers.cancel(TimerId::Line);
        assert_eq!(timers.elapsed(TimerId::Line, 130), 0);
    }
}
