//! Event flags (§4.9 "Event flags", §8 testable property 6). The EE's
//! `ClearEventFlag` syscall has famously inverted semantics compared to
//! every other RTOS event-flag API: it ANDs the pattern with the argument
//! rather than clearing those bits, and this recompiler preserves that
//! exactly rather than "fixing" it.

use crate::codes::{KE_EVF_COND, KE_UNKNOWN_EVFID};
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

const FIRST_EVF_ID: u32 = 1;

pub const WEF_OR: u32 = 0x01;
pub const WEF_CLEAR: u32 = 0x10;
pub const WEF_CLEAR_ALL: u32 = 0x20;

struct EvfState {
    pattern: u32,
    attr: u32,
    option: u32,
    waiters: u32,
    deleted: bool,
}

struct EvfObject {
    state: Mutex<EvfState>,
    cv: Condvar,
}

#[derive(Default)]
pub struct EventFlagTable {
    inner: Mutex<HashMap<u32, Arc<EvfObject>>>,
    next_id: Mutex<u32>,
}

/// True when `pattern` satisfies `bits` under `mode`'s OR/AND rule (§4.9
/// "Wait modes"): with `WEF_OR`, any bit of `bits` set in `pattern`;
/// without it, every bit of `bits` must be set.
fn condition_met(pattern: u32, bits: u32, mode: u32) -> bool {
    if mode & WEF_OR != 0 {
        pattern & bits != 0
    } else {
        pattern & bits == bits
    }
}

/// Applies the wait-side `CLEAR`/`CLEAR_ALL` side effect to a pattern that
/// has just satisfied `bits` under `mode`. This is the ordinary
/// "consume the bits that woke me" semantics and is distinct from the
/// inverted `ClearEventFlag` syscall below.
fn apply_wait_clear(pattern: u32, bits: u32, mode: u32) -> u32 {
    if mode & WEF_CLEAR_ALL != 0 {
        0
    } else if mode & WEF_CLEAR != 0 {
        pattern & !bits
    } else {
        pattern
    }
}

impl EventFlagTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            next_id: Mutex::new(FIRST_EVF_ID),
        }
    }

    pub fn create(&self, attr: u32, option: u32, init_pattern: u32) -> u32 {
        let id = {
            let mut next = self.next_id.lock().unwrap();
            let id = *next;
            *next += 1;
            id
        };
        let obj = EvfObject {
            state: Mutex::new(EvfState {
                pattern: init_pattern,
                attr,
                option,
                waiters: 0,
                deleted: false,
            }),
            cv: Condvar::new(),
        };
        self.inner.lock().unwrap().insert(id, Arc::new(obj));
        id
    }

    fn find(&self, id: u32) -> Option<Arc<EvfObject>> {
        self.inner.lock().unwrap().get(&id).cloned()
    }

    pub fn delete(&self, id: u32) -> i32 {
        let Some(obj) = self.inner.lock().unwrap().remove(&id) else {
            return KE_UNKNOWN_EVFID;
        };
        obj.state.lock().unwrap().deleted = true;
        obj.cv.notify_all();
        0
    }

    /// `pattern |= bits` and wake every waiter (§4.9).
    pub fn set(&self, id: u32, bits: u32) -> i32 {
        let Some(obj) = self.find(id) else {
            return KE_UNKNOWN_EVFID;
        };
        let mut state = obj.state.lock().unwrap();
        state.pattern |= bits;
        obj.cv.notify_all();
        0
    }

    /// `pattern &= bits` — EE semantics, not `pattern &= !bits` (§4.9, §8
    /// property 6).
    pub fn clear(&self, id: u32, bits: u32) -> i32 {
        let Some(obj) = self.find(id) else {
            return KE_UNKNOWN_EVFID;
        };
        let mut state = obj.state.lock().unwrap();
        state.pattern &= bits;
        0
    }

    /// Blocks until `condition_met` or deletion or `should_stop`; applies
    /// the wait-side clear as a side effect and returns
    /// `(return_code, pattern_at_satisfaction)`.
    pub fn wait(&self, id: u32, bits: u32, mode: u32, should_stop: impl Fn() -> bool) -> (i32, u32) {
        let Some(obj) = self.find(id) else {
            return (KE_UNKNOWN_EVFID, 0);
        };
        let mut state = obj.state.lock().unwrap();
        state.waiters += 1;
        loop {
            if state.deleted {
                state.waiters -= 1;
                return (-1, 0);
            }
            if condition_met(state.pattern, bits, mode) {
                let result = state.pattern;
                state.pattern = apply_wait_clear(state.pattern, bits, mode);
                state.waiters -= 1;
                return (0, result);
            }
            if should_stop() {
                state.waiters -= 1;
                return (-1, 0);
            }
            let (guard, _timeout) = obj
                .cv
                .wait_timeout(state, std::time::Duration::from_millis(50))
                .unwrap();
            state = guard;
        }
    }

    /// Non-blocking variant of [`EventFlagTable::wait`]: `KE_EVF_COND` if
    /// the condition does not currently hold.
    pub fn poll(&self, id: u32, bits: u32, mode: u32) -> (i32, u32) {
        let Some(obj) = self.find(id) else {
            return (KE_UNKNOWN_EVFID, 0);
        };
        let mut state = obj.state.lock().unwrap();
        if !condition_met(state.pattern, bits, mode) {
            return (KE_EVF_COND, state.pattern);
        }
        let result = state.pattern;
        state.pattern = apply_wait_clear(state.pattern, bits, mode);
        (0, result)
    }

    pub fn pattern(&self, id: u32) -> Option<u32> {
        let obj = self.find(id)?;
        Some(obj.state.lock().unwrap().pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_event_flag_ands_rather_than_masks_off() {
        let table = EventFlagTable::new();
        let id = table.create(0, 0, 0b111);
        table.clear(id, 0b011);
        assert_eq!(table.pattern(id), Some(0b011));
    }

    #[test]
    fn poll_or_clear_matches_scenario_2() {
        let table = EventFlagTable::new();
        let id = table.create(0, 0, 0x7);
        let (rc, result) = table.poll(id, 0x1, WEF_OR | WEF_CLEAR);
        assert_eq!(rc, 0);
        assert_eq!(result, 0x7);
        assert_eq!(table.pattern(id), Some(0x6));
    }

    #[test]
    fn set_zero_and_clear_all_ones_are_pattern_noops() {
        let table = EventFlagTable::new();
        let id = table.create(0, 0, 0xABCD);
        table.set(id, 0);
        assert_eq!(table.pattern(id), Some(0xABCD));
        table.clear(id, !0u32);
        assert_eq!(table.pattern(id), Some(0xABCD));
    }

    #[test]
    fn and_mode_requires_all_bits() {
        let table = EventFlagTable::new();
        let id = table.create(0, 0, 0b011);
        assert_eq!(table.poll(id, 0b111, 0).0, KE_EVF_COND);
        table.set(id, 0b100);
        assert_eq!(table.poll(id, 0b111, 0).0, 0);
    }

    #[test]
    fn unknown_evf_id() {
        let table = EventFlagTable::new();
        assert_eq!(table.set(42, 1), KE_UNKNOWN_EVFID);
    }
}
