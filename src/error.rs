//! The error taxonomy described in spec.md §7.
//!
//! Library misuse is recoverable: it is reported as [`LibraryError`] and
//! surfaces at the public API boundary as a `-1` return, exactly like the
//! original C contract. OS primitive failure is not recoverable — see the
//! [`fatal_os_error`] macro below, grounded on the teacher's `panic_fmt`
//! lang item (`examples/aticu-VeOS/kernel/src/lib.rs`), which prints a
//! diagnostic and ends the process instead of returning.

use crate::tid::Tid;
use thiserror::Error;

/// Misuse of the library surface, per spec.md §7.1.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LibraryError {
    #[error("{0:?} is not a valid, live thread")]
    InvalidTid(Tid),
    #[error("spawn entry point must not be null")]
    NullEntry,
    #[error("no free thread slots (MAX_TID reached)")]
    TooManyThreads,
    #[error("the main thread (tid 0) cannot be blocked")]
    MainThreadCannotBlock,
    #[error("the main thread (tid 0) cannot sleep")]
    MainThreadCannotSleep,
    #[error("sleep quantum count must be positive, got {0}")]
    NonPositiveSleep(i32),
    #[error("init may only be called once")]
    DoubleInit,
    #[error("quantum length must be positive, got {0}")]
    NonPositiveQuantum(i64),
    #[error("the library has not been initialized")]
    NotInitialized
}

impl LibraryError {
    /// Logs the error at `warn` and returns the `-1` convention used by
    /// every public entry point.
    pub(crate) fn into_code(self) -> i32 {
        log::warn!("thread library error: {self}");
        -1
    }
}

/// Prints a `system error:` diagnostic to stderr and aborts the process.
///
/// OS primitive failure (`sigprocmask`, `sigaction`, `setitimer`,
/// `getcontext`/`makecontext`) cannot be recovered from: the scheduler's
/// invariants depend on every one of these calls succeeding (spec.md §7,
/// §9). This never returns.
macro_rules! fatal_os_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
        eprintln!("system error: {}", format_args!($($arg)*));
        ::std::process::exit(1);
    }};
}

pub(crate) use fatal_os_error;
