//! Alarms (§4.9 "Alarms"). Cycle-accurate timing is out of scope (§1
//! Non-goals), so `SetAlarm` is allowed to fire immediately: `arg` is
//! treated as a semaphore id and signalled right away rather than being
//! scheduled `usec` in the future.

use crate::sema::SemaTable;

/// Returns the (always-zero, per the original) alarm id. `handler` is
/// accepted but never invoked — only the semaphore-post idiom every game
/// actually relies on is modelled.
pub fn set_alarm(semas: &SemaTable, _usec: u32, _handler: u32, arg: u32) -> i32 {
    semas.signal_sema(arg);
    0
}

pub fn cancel_alarm(_alarm_id: u32, _handler: u32) -> i32 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_alarm_signals_the_semaphore_named_by_arg() {
        let semas = SemaTable::new();
        let id = semas.create_sema(0, 0, 0, 1);
        assert_eq!(set_alarm(&semas, 16_000, 0x1000, id), 0);
        assert_eq!(semas.poll_sema(id), 0);
    }

    #[test]
    fn cancel_alarm_always_succeeds() {
        assert_eq!(cancel_alarm(1, 0), 0);
    }
}
