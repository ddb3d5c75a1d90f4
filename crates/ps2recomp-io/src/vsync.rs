//! VSync worker (§4.10 "VSync worker", §8 scenario 3). A dedicated host
//! thread ticks at 60 Hz; `SetVSyncFlag` resets the guest-visible flag and
//! tick counter and starts it, `WaitVSyncTick` blocks the calling guest
//! thread on the next increment.

use ps2recomp_kernel::intc::{IntcTable, INTC_VBLANK_END, INTC_VBLANK_START};
use ps2recomp_runtime::memory::GuestMemory;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

const VSYNC_HZ: u64 = 60;
const VSYNC_PERIOD: Duration = Duration::from_nanos(1_000_000_000 / VSYNC_HZ);

/// Owns the 60 Hz tick thread. Dropping this stops the worker (its loop
/// checks `running` every tick).
pub struct VsyncWorker {
    running: Arc<AtomicBool>,
    tick: Arc<AtomicU64>,
    tick_cv: Arc<(Mutex<()>, Condvar)>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl VsyncWorker {
    /// Resets `*flag_addr = 0` and `*tick_addr = 0` in guest memory, then
    /// starts the 60 Hz thread that sets `*flag_addr = 1` and increments
    /// `*tick_addr` every tick (§4.10). Also fires the INTC VBLANK
    /// start/end causes each tick, matching §4.9's note that those two
    /// causes come from this worker.
    pub fn start(mem: Arc<Mutex<GuestMemory>>, intc: Arc<IntcTable>, flag_addr: u32, tick_addr: u32) -> Self {
        {
            let mut mem = mem.lock().unwrap();
            let _ = mem.write32(flag_addr, 0);
            let _ = mem.write64(tick_addr, 0);
        }
        let running = Arc::new(AtomicBool::new(true));
        let tick = Arc::new(AtomicU64::new(0));
        let tick_cv = Arc::new((Mutex::new(()), Condvar::new()));

        let thread_running = running.clone();
        let thread_tick = tick.clone();
        let thread_cv = tick_cv.clone();
        let handle = std::thread::spawn(move || {
            while thread_running.load(Ordering::SeqCst) {
                std::thread::sleep(VSYNC_PERIOD);
                if !thread_running.load(Ordering::SeqCst) {
                    break;
                }
                {
                    let mut mem = mem.lock().unwrap();
                    let _ = mem.write32(flag_addr, 1);
                    let next = thread_tick.fetch_add(1, Ordering::SeqCst) + 1;
                    let _ = mem.write64(tick_addr, next);
                }
                intc.fire(INTC_VBLANK_START);
                intc.fire(INTC_VBLANK_END);
                let _guard = thread_cv.0.lock().unwrap();
                thread_cv.1.notify_all();
            }
        });

        Self {
            running,
            tick,
            tick_cv,
            handle: Some(handle),
        }
    }

    pub fn current_tick(&self) -> u64 {
        self.tick.load(Ordering::SeqCst)
    }

    /// Blocks until the tick counter advances past `since`, the worker
    /// stops, or `should_stop` (the runtime's cooperative stop flag)
    /// observes a request — matching §5's "all wait primitives wake on
    /// three events".
    pub fn wait_vsync_tick(&self, should_stop: impl Fn() -> bool) -> i32 {
        let since = self.current_tick();
        loop {
            if !self.running.load(Ordering::SeqCst) {
                return -1;
            }
            if self.current_tick() > since {
                return 0;
            }
            if should_stop() {
                return -1;
            }
            let guard = self.tick_cv.0.lock().unwrap();
            let _ = self.tick_cv.1.wait_timeout(guard, Duration::from_millis(50)).unwrap();
        }
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for VsyncWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vsync_flag_and_tick_advance_within_300ms() {
        let mem = Arc::new(Mutex::new(GuestMemory::new()));
        let intc = Arc::new(IntcTable::new());
        intc.enable(INTC_VBLANK_START);
        intc.enable(INTC_VBLANK_END);
        {
            let mut m = mem.lock().unwrap();
            let _ = m.write32(0x1000, 0xDEADBEEF);
            let _ = m.write64(0x1010, 0xAAAA_AAAA_BBBB_BBBB);
        }
        let mut worker = VsyncWorker::start(mem.clone(), intc, 0x1000, 0x1010);

        std::thread::sleep(Duration::from_millis(300));
        let flag = mem.lock().unwrap().read32(0x1000).unwrap();
        let tick_a = mem.lock().unwrap().read64(0x1010).unwrap();
        assert_eq!(flag, 1);
        assert!(tick_a > 0);

        std::thread::sleep(Duration::from_millis(50));
        let tick_b = mem.lock().unwrap().read64(0x1010).unwrap();
        assert!(tick_b >= tick_a);

        worker.stop();
    }
}
