//! Process environment overrides for tests that load settings.

use std::env;
use std::ffi::OsString;

use tokio::sync::{Mutex, MutexGuard};

/// Held by every test that touches `GANTRY_*` or credential variables.
pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Overrides environment variables until dropped.
///
/// The previous values are put back in reverse order, so naming a variable
/// twice still restores its original value.
pub struct EnvGuard {
    saved: Vec<(String, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets every `(name, value)` in `set` and removes every name in
    /// `unset`, waiting for [`ENV_LOCK`] first.
    pub async fn set_vars(set: &[(&str, &str)], unset: &[&str]) -> Self {
        let lock = ENV_LOCK.lock().await;
        let mut saved = Vec::with_capacity(set.len() + unset.len());
        for (name, value) in set {
            saved.push(((*name).to_owned(), env::var_os(name)));
            // SAFETY: `ENV_LOCK` is held, so no other test reads or writes the environment.
            unsafe { env::set_var(name, value) };
        }
        for name in unset {
            saved.push(((*name).to_owned(), env::var_os(name)));
            // SAFETY: as above.
            unsafe { env::remove_var(name) };
        }
        Self { saved, _lock: lock }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (name, value) in self.saved.iter().rev() {
            // SAFETY: `_lock` is still held while the guard is alive.
            unsafe {
                match value {
                    Some(previous) => env::set_var(name, previous),
                    None => env::remove_var(name),
                }
            }
        }
    }
}
