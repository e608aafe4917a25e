//! End-to-end scheduling scenarios driven against the real public API, real
//! `SIGVTALRM` delivery and real `ucontext` switches (spec.md §8).
//!
//! The library's scheduler is a single process-wide singleton that can only
//! be installed once (`init` rejects a second call), so every scenario below
//! runs sequentially inside one `#[test]` rather than one scenario per
//! `#[test]` — splitting them across functions would mean every scenario
//! after the first sees an already-initialized library and fails with
//! `DoubleInit`. All timing assertions are loose (`>` / `>=`, not exact
//! counts) since real preemption timing is not deterministic down to the
//! quantum.

use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::time::Duration;

static COUNTER_A: AtomicU32 = AtomicU32::new(0);
static COUNTER_B: AtomicU32 = AtomicU32::new(0);
static WOKE_TID: AtomicI32 = AtomicI32::new(-1);
static BLOCKABLE_PROGRESS: AtomicU32 = AtomicU32::new(0);

extern "C" fn spin_a() {
    loop {
        COUNTER_A.fetch_add(1, Ordering::Relaxed);
        std::hint::spin_loop();
    }
}

extern "C" fn spin_b() {
    loop {
        COUNTER_B.fetch_add(1, Ordering::Relaxed);
        std::hint::spin_loop();
    }
}

extern "C" fn sleeper() {
    vthread::sleep(3);
    WOKE_TID.store(vthread::get_tid(), Ordering::Relaxed);
    loop {
        std::hint::spin_loop();
    }
}

extern "C" fn blockable() {
    loop {
        BLOCKABLE_PROGRESS.fetch_add(1, Ordering::Relaxed);
        std::hint::spin_loop();
    }
}

/// Falls off the end of its entry immediately, exercising the launcher's
/// implicit self-terminate (GLOSSARY "Launcher").
extern "C" fn quick_exit() {}

#[test]
fn full_scheduling_lifecycle() {
    let _ = env_logger::try_init();

    assert_eq!(vthread::init(1000), 0, "first init call should succeed");
    assert_eq!(vthread::init(1000), -1, "a second init call must be rejected");

    // spawn assigns the lowest free TID, starting at 1.
    let a = vthread::spawn(spin_a);
    let b = vthread::spawn(spin_b);
    assert_eq!(a, 1);
    assert_eq!(b, 2);

    std::thread::sleep(Duration::from_millis(20));
    assert!(COUNTER_A.load(Ordering::Relaxed) > 0, "a should have run");
    assert!(COUNTER_B.load(Ordering::Relaxed) > 0, "b should have run");
    assert!(vthread::get_quantums(a) > 0);
    assert!(vthread::get_quantums(b) > 0);

    // terminating b frees its slot for immediate reuse.
    assert_eq!(vthread::terminate(b), 0);
    assert_eq!(vthread::get_quantums(b), -1, "a dead tid reports -1");
    let c = vthread::spawn(quick_exit);
    assert_eq!(c, 2, "the lowest free slot (b's old one) is reused");

    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(vthread::get_quantums(c), -1, "quick_exit self-terminated");

    // sleep(n) blocks for at least n + 1 total quanta, then wakes.
    let total_before = vthread::get_total_quantums();
    let s = vthread::spawn(sleeper);
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(WOKE_TID.load(Ordering::Relaxed), s, "the sleeper should have woken and recorded its own tid");
    assert!(vthread::get_total_quantums() >= total_before + 3 + 1);

    // block/resume.
    let blocked = vthread::spawn(blockable);
    std::thread::sleep(Duration::from_millis(10));
    assert_eq!(vthread::block(blocked), 0);
    let progress_at_block = BLOCKABLE_PROGRESS.load(Ordering::Relaxed);
    std::thread::sleep(Duration::from_millis(10));
    assert_eq!(
        BLOCKABLE_PROGRESS.load(Ordering::Relaxed),
        progress_at_block,
        "a blocked thread makes no further progress"
    );
    assert_eq!(vthread::resume(blocked), 0);
    std::thread::sleep(Duration::from_millis(10));
    assert!(
        BLOCKABLE_PROGRESS.load(Ordering::Relaxed) > progress_at_block,
        "a resumed thread runs again"
    );

    // tid 0 is exempt from block/sleep.
    assert_eq!(vthread::block(0), -1);
    assert_eq!(vthread::sleep(1), -1);

    // invalid tids are rejected uniformly.
    assert_eq!(vthread::get_quantums(vthread::MAX_TID as i32), -1);
    assert_eq!(vthread::block(-1), -1);
    assert_eq!(vthread::resume(vthread::MAX_TID as i32), -1);
    assert_eq!(vthread::terminate(999_999), -1);
}
