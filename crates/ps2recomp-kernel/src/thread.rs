//! Thread management syscalls (§4.9 "Threads"). A guest thread maps to a
//! detached host OS thread (§5's "preemptive OS threads" scheduling model
//! and §9's note that cooperative schedulers are unsuitable here).

use crate::codes::{KE_DORMANT, KE_ILLEGAL_THID, KE_UNKNOWN_THID};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::warn;

pub const MAIN_THREAD_ID: u32 = 1;
const FIRST_SPAWNED_THREAD_ID: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    Dormant,
    Ready,
    Running,
    Waiting,
}

impl ThreadStatus {
    /// Encodes as the `status` word of the EE `ee_thread_status_t` layout.
    fn as_word(self) -> u32 {
        match self {
            ThreadStatus::Dormant => 0x10,
            ThreadStatus::Ready => 0x02,
            ThreadStatus::Running => 0x01,
            ThreadStatus::Waiting => 0x04,
        }
    }
}

/// The seven-word parameter block `CreateThread` reads, plus the bits the
/// table needs to track lifetime and report `ReferThreadStatus`.
#[derive(Debug, Clone)]
pub struct ThreadParam {
    pub attr: u32,
    pub entry: u32,
    pub stack: u32,
    pub stack_size: u32,
    pub priority: u32,
    pub gp: u32,
    pub option: u32,
}

#[derive(Debug, Clone)]
struct ThreadEntry {
    param: ThreadParam,
    arg: u32,
    started: bool,
    status: ThreadStatus,
}

/// Guest threads known by known-broken entry point name (audio mixer
/// threads the C++ original never actually spawns); `StartThread` accepts
/// these without spawning a host thread, matching the original's allowlist
/// for threads whose recompiled bodies spin forever on hardware this
/// recompiler does not model.
pub fn is_known_broken_thread_entry(name: &str) -> bool {
    matches!(name, "_audsrv_thread" | "sceSdVoiceTrans" | "scdDriveThread")
}

#[derive(Default)]
pub struct ThreadTable {
    inner: Mutex<HashMap<u32, ThreadEntry>>,
    next_id: Mutex<u32>,
}

impl ThreadTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            next_id: Mutex::new(FIRST_SPAWNED_THREAD_ID),
        }
    }

    pub fn create_thread(&self, param: ThreadParam) -> u32 {
        let id = {
            let mut next = self.next_id.lock().unwrap();
            let id = *next;
            *next += 1;
            id
        };
        self.inner.lock().unwrap().insert(
            id,
            ThreadEntry {
                param,
                arg: 0,
                started: false,
                status: ThreadStatus::Dormant,
            },
        );
        id
    }

    pub fn delete_thread(&self, tid: u32) -> i32 {
        if self.inner.lock().unwrap().remove(&tid).is_some() {
            0
        } else {
            KE_UNKNOWN_THID
        }
    }

    /// Reads back the spawn parameters so the caller (`ps2recomp-runtime`'s
    /// host-thread spawn) can set up the child's ABI; transitions the
    /// thread to `Running`. Returns `KE_ILLEGAL_THID` for thread 0,
    /// `KE_UNKNOWN_THID` if the id was never created, `KE_DORMANT` is
    /// never returned here (starting a dormant thread is the whole point).
    pub fn start_thread(&self, tid: u32, arg: u32) -> Result<ThreadParam, i32> {
        if tid == 0 {
            return Err(KE_ILLEGAL_THID);
        }
        let mut table = self.inner.lock().unwrap();
        let entry = table.get_mut(&tid).ok_or(KE_UNKNOWN_THID)?;
        entry.arg = arg;
        entry.started = true;
        entry.status = ThreadStatus::Running;
        Ok(entry.param.clone())
    }

    pub fn exit_thread(&self, tid: u32) {
        if let Some(entry) = self.inner.lock().unwrap().get_mut(&tid) {
            entry.status = ThreadStatus::Dormant;
        }
    }

    /// Writes the 10-word `ee_thread_status_t`-shaped status block
    /// (§4.9): `[status, attr, option, entry, stack, stack_size, gp,
    /// initPriority, currentPriority, waitType]`.
    pub fn refer_status(&self, tid: u32) -> Result<[u32; 10], i32> {
        let table = self.inner.lock().unwrap();
        let entry = table.get(&tid).ok_or(KE_UNKNOWN_THID)?;
        Ok([
            entry.status.as_word(),
            entry.param.attr,
            entry.param.option,
            entry.param.entry,
            entry.param.stack,
            entry.param.stack_size,
            entry.param.gp,
            entry.param.priority,
            entry.param.priority,
            0,
        ])
    }

    pub fn contains(&self, tid: u32) -> bool {
        self.inner.lock().unwrap().contains_key(&tid)
    }
}

pub fn warn_unknown_thread(tid: u32) {
    warn!(tid, "thread syscall: unknown thread id");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param() -> ThreadParam {
        ThreadParam {
            attr: 0,
            entry: 0x1000,
            stack: 0x100000,
            stack_size: 0x4000,
            priority: 10,
            gp: 0x2000,
            option: 0,
        }
    }

    #[test]
    fn ids_start_at_two_and_increase() {
        let table = ThreadTable::new();
        let a = table.create_thread(param());
        let b = table.create_thread(param());
        assert_eq!(a, 2);
        assert_eq!(b, 3);
    }

    #[test]
    fn starting_thread_zero_is_illegal() {
        let table = ThreadTable::new();
        assert_eq!(table.start_thread(0, 0), Err(KE_ILLEGAL_THID));
    }

    #[test]
    fn starting_unknown_thread_is_unknown_thid() {
        let table = ThreadTable::new();
        assert_eq!(table.start_thread(99, 0), Err(KE_UNKNOWN_THID));
    }

    #[test]
    fn start_thread_transitions_to_running_and_records_arg() {
        let table = ThreadTable::new();
        let id = table.create_thread(param());
        let p = table.start_thread(id, 0xCAFE).unwrap();
        assert_eq!(p.entry, 0x1000);
        let status = table.refer_status(id).unwrap();
        assert_eq!(status[0], ThreadStatus::Running.as_word());
    }

    #[test]
    fn delete_then_refer_status_is_unknown_thid() {
        let table = ThreadTable::new();
        let id = table.create_thread(param());
        assert_eq!(table.delete_thread(id), 0);
        assert_eq!(table.refer_status(id), Err(KE_UNKNOWN_THID));
    }
}
