//! End-to-end kernel scenarios from the spec's testable-properties section:
//! a blocked `WaitSema` that a second thread unblocks via `SignalSema`.

use ps2recomp_kernel::sema::SemaTable;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn semaphore_wakeup_across_threads() {
    let semas = Arc::new(SemaTable::new());
    let id = semas.create_sema(0, 0, 0, 1);

    let waiter_semas = semas.clone();
    let waiter = std::thread::spawn(move || waiter_semas.wait_sema(id, || false));

    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(semas.signal_sema(id), 0);

    assert_eq!(waiter.join().unwrap(), 0);
    let status = semas.refer_status(id).unwrap();
    assert_eq!(status.count, 0);
    assert_eq!(status.waiters, 0);
}
