//! Compile-time parameters and the runtime configuration passed to [`crate::init`].

/// The number of thread slots in the TCB table, including the reserved
/// slot 0 for the initial thread. Valid TIDs are `[0, MAX_TID)`.
pub const MAX_TID: usize = 100;

/// The size, in bytes, of each spawned thread's stack.
///
/// Slot 0 never gets one of these: the initial thread runs on the stack the
/// OS gave the process.
pub const STACK_SIZE: usize = 4096;

/// Runtime configuration for [`crate::init`].
///
/// This is a thin wrapper around the quantum length so that call sites read
/// `SchedulerConfig::new(quantum_usec)` instead of a bare integer, and so a
/// future knob (e.g. a different timer signal) has somewhere to live without
/// changing `init`'s signature again.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub(crate) quantum_usec: i64
}

impl SchedulerConfig {
    /// Creates a configuration with the given quantum length in microseconds.
    ///
    /// `quantum_usec` is not validated here; [`crate::init`] rejects
    /// non-positive values.
    pub fn new(quantum_usec: i64) -> SchedulerConfig {
        SchedulerConfig { quantum_usec }
    }
}
