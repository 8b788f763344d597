use std::sync::Mutex;
use std::sync::MutexGuard;

// A poisoned lock means a holder panicked mid-update. Registry and
// connection state stay structurally valid between lock acquisitions, so
// continuing with the inner value beats taking the whole bridge down.

pub fn mutex_lock_or_recover<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            eprintln!("Warning: continuing past poisoned mutex");
            poisoned.into_inner()
        }
    }
}
