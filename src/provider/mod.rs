//! Metric providers
//!
//! A provider owns one sample source, serializes every read through a single
//! lock, and exposes one-shot accessors plus a [`watch`](CpuProvider::watch)
//! stream. After `shutdown` every operation fails with
//! [`MetricsError::Shutdown`](crate::MetricsError::Shutdown).

pub mod cpu;
pub mod power;

pub use cpu::CpuProvider;
pub use power::PowerProvider;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a provider mutex, recovering the data if a panicking reader poisoned it.
///
/// Provider state is replaced whole on every read, so a poisoned guard never
/// exposes a half-written value.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
