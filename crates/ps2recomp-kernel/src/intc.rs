//! INTC/DMAC enable and handler registration (§4.9 "INTC/DMAC"). VBLANK
//! start/end (causes 2 and 3) are the only causes this recompiler's
//! `ps2recomp-io` VSync worker ever actually raises (§4.10), but the table
//! itself is cause-agnostic.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

pub const INTC_VBLANK_START: u32 = 2;
pub const INTC_VBLANK_END: u32 = 3;

struct Handler {
    cause: u32,
    handler: u32,
    mode: u32,
    arg: u32,
    fire_count: AtomicU32,
}

#[derive(Default)]
pub struct IntcTable {
    enabled: Mutex<HashSet<u32>>,
    handlers: Mutex<HashMap<u32, Handler>>,
    next_id: Mutex<u32>,
}

impl IntcTable {
    pub fn new() -> Self {
        Self {
            enabled: Mutex::new(HashSet::new()),
            handlers: Mutex::new(HashMap::new()),
            next_id: Mutex::new(1),
        }
    }

    pub fn enable(&self, cause: u32) -> i32 {
        self.enabled.lock().unwrap().insert(cause);
        1
    }

    pub fn disable(&self, cause: u32) -> i32 {
        self.enabled.lock().unwrap().remove(&cause);
        1
    }

    pub fn is_enabled(&self, cause: u32) -> bool {
        self.enabled.lock().unwrap().contains(&cause)
    }

    pub fn add_handler(&self, cause: u32, handler: u32, mode: u32, arg: u32) -> u32 {
        let id = {
            let mut next = self.next_id.lock().unwrap();
            let id = *next;
            *next += 1;
            id
        };
        self.handlers.lock().unwrap().insert(
            id,
            Handler {
                cause,
                handler,
                mode,
                arg,
                fire_count: AtomicU32::new(0),
            },
        );
        id
    }

    pub fn remove_handler(&self, id: u32) -> i32 {
        if self.handlers.lock().unwrap().remove(&id).is_some() {
            0
        } else {
            -1
        }
    }

    /// Called by the VSync worker (or a real DMAC model, if one is added
    /// later) when `cause` occurs. Increments the fire counter of every
    /// handler registered against that cause, but only while the cause is
    /// enabled — matches scenario 4's "DisableIntc(2) → only cause-3
    /// counter advances".
    pub fn fire(&self, cause: u32) {
        if !self.is_enabled(cause) {
            return;
        }
        for h in self.handlers.lock().unwrap().values() {
            if h.cause == cause {
                h.fire_count.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    pub fn fire_count(&self, id: u32) -> Option<u32> {
        self.handlers
            .lock()
            .unwrap()
            .get(&id)
            .map(|h| h.fire_count.load(Ordering::SeqCst))
    }

    /// Exposes the `(handler, mode, arg)` triple a full implementation
    /// would need to actually invoke the guest handler function; unused by
    /// `fire` itself since handler invocation is out of this crate's scope
    /// (the generated code's dispatch table owns calling guest functions).
    pub fn handler_args(&self, id: u32) -> Option<(u32, u32, u32)> {
        self.handlers
            .lock()
            .unwrap()
            .get(&id)
            .map(|h| (h.handler, h.mode, h.arg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabling_one_cause_leaves_the_other_advancing() {
        let intc = IntcTable::new();
        let h2 = intc.add_handler(INTC_VBLANK_START, 0x1000, 0, 0xCAFE0002);
        let h3 = intc.add_handler(INTC_VBLANK_END, 0x1010, 0, 0xCAFE0003);
        intc.enable(INTC_VBLANK_START);
        intc.enable(INTC_VBLANK_END);
        intc.fire(INTC_VBLANK_START);
        intc.fire(INTC_VBLANK_END);
        assert_eq!(intc.fire_count(h2), Some(1));
        assert_eq!(intc.fire_count(h3), Some(1));

        intc.disable(INTC_VBLANK_START);
        intc.fire(INTC_VBLANK_START);
        intc.fire(INTC_VBLANK_END);
        assert_eq!(intc.fire_count(h2), Some(1));
        assert_eq!(intc.fire_count(h3), Some(2));

        intc.enable(INTC_VBLANK_START);
        intc.fire(INTC_VBLANK_START);
        assert_eq!(intc.fire_count(h2), Some(2));
    }

    #[test]
    fn remove_handler_drops_it_from_future_fires() {
        let intc = IntcTable::new();
        let id = intc.add_handler(INTC_VBLANK_START, 0, 0, 0);
        intc.enable(INTC_VBLANK_START);
        assert_eq!(intc.remove_handler(id), 0);
        intc.fire(INTC_VBLANK_START);
        assert_eq!(intc.fire_count(id), None);
    }
}
