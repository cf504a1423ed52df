//! Small helpers shared across the runtime.

use std::any::Any;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::task::JoinError;

/// Locks a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_info(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Describes why a spawned transition did not return.
pub(crate) fn join_info(err: JoinError) -> String {
    if err.is_panic() {
        panic_info(&*err.into_panic())
    } else {
        "transition task cancelled".to_string()
    }
}
