//! In-process cache for tests and ephemeral sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{CacheError, LocalCache};

/// Cache held in memory. `set_failing(true)` makes every call fail, which is
/// how tests check that cache problems never reach the caller.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
    failing: AtomicBool,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with [`CacheError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Read a value synchronously, bypassing the failure switch.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(CacheError::Unavailable)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LocalCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check()?;
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.check()?;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.check()?;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}
