use std::sync::{Mutex, OnceLock};

use crate::error::Result;

/// Metadata fetched on first use and kept for the owner's lifetime
///
/// The init lock makes concurrent first callers share a single fetch; a
/// failed fetch leaves the cell empty so a later call can retry.
#[derive(Debug)]
pub(crate) struct LazyMetadata<T> {
    cell: OnceLock<T>,
    init: Mutex<()>,
}

impl<T> LazyMetadata<T> {
    pub fn new() -> Self {
        LazyMetadata {
            cell: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// Already populated with `value`
    pub fn with_value(value: T) -> Self {
        let lazy = Self::new();
        let _ = lazy.cell.set(value);
        lazy
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn get_or_try_init<F>(&self, fetch: F) -> Result<&T>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }

        let _guard = self.init.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }

        let value = fetch()?;
        Ok(self.cell.get_or_init(|| value))
    }
}
