use std::{
    path::Path,
    sync::{Mutex, OnceLock},
};

use dynprice::project_dirs::HOME_ENV_VAR;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Points `DYNPRICE_HOME` at a scratch root for the guard's lifetime.
pub struct DynpriceHomeGuard {
    previous: Option<String>,
    _lock: std::sync::MutexGuard<'static, ()>,
}

impl DynpriceHomeGuard {
    pub fn set(path: &Path) -> Self {
        let lock = ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        let previous = std::env::var(HOME_ENV_VAR).ok();
        // SAFETY: tests run under a global lock to prevent concurrent env mutations.
        unsafe {
            std::env::set_var(HOME_ENV_VAR, path);
        }
        Self {
            previous,
            _lock: lock,
        }
    }
}

impl Drop for DynpriceHomeGuard {
    fn drop(&mut self) {
        // SAFETY: tests run under a global lock to prevent concurrent env mutations.
        unsafe {
            match self.previous.take() {
                Some(value) => std::env::set_var(HOME_ENV_VAR, value),
                None => std::env::remove_var(HOME_ENV_VAR),
            }
        }
    }
}
