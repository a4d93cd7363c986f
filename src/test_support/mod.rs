//! Scripted collaborators shared by unit and integration tests.
//!
//! Every double records what it was asked to do and answers from a queue
//! seeded by the test. Doubles are cheap to clone; clones share state so a
//! test can keep one handle for assertions while the code under test owns
//! another. Running out of scripted answers is reported as an error rather
//! than a panic so the failure surfaces through the code path under test.

mod cloud;
mod env;
mod interactive;
mod runner;
mod services;
mod stores;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use cloud::{CloudCall, CloudOp, FakeCloud};
pub use env::{ENV_LOCK, EnvGuard};
pub use interactive::{RecordingReporter, ScriptedPrompter};
pub use runner::{CommandInvocation, ScriptedRunner};
pub use services::{FakeDirectory, FakeOperator, FakeRuntime};
pub use stores::{MemoryAccessCache, MemoryRegistry};

/// Locks `mutex`, recovering the data if a panicking test poisoned it.
fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
