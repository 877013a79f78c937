//! Environment variable access behind a trait, so configuration can be
//! resolved from the process environment, from command-line overrides, or
//! from an in-memory map in tests.
//!
//! | Source | Type |
//! |---|---|
//! | Process environment | [`SystemEnv`] |
//! | Overrides on top of another source | [`LayeredEnv`] |
//! | Tests | `InMemoryEnv` (`#[cfg(test)]`) |

use std::collections::HashMap;
use std::env::VarError;

/// Does **not** require `Send + Sync`; configuration is resolved once on the
/// main task before the server starts.
pub trait ReadEnv {
    fn var(&self, key: &str) -> Result<String, VarError>;
}

/// Zero-sized type, delegates to `std::env`.
pub struct SystemEnv;

impl ReadEnv for SystemEnv {
    #[inline]
    fn var(&self, key: &str) -> Result<String, VarError> {
        std::env::var(key)
    }
}

/// Values set here win over the wrapped source.
///
/// Used to apply command-line flags over the environment (which itself may
/// have been seeded from a config file).
pub struct LayeredEnv<E> {
    overrides: HashMap<String, String>,
    base: E,
}

impl<E: ReadEnv> LayeredEnv<E> {
    pub fn new(base: E) -> Self {
        Self {
            overrides: HashMap::new(),
            base,
        }
    }

    /// Sets `key` only when `value` is `Some`, so optional CLI flags can be
    /// passed straight through.
    pub fn with(mut self, key: &str, value: Option<impl Into<String>>) -> Self {
        if let Some(value) = value {
            self.overrides.insert(key.to_string(), value.into());
        }
        self
    }
}

impl<E: ReadEnv> ReadEnv for LayeredEnv<E> {
    fn var(&self, key: &str) -> Result<String, VarError> {
        match self.overrides.get(key) {
            Some(value) => Ok(value.clone()),
            None => self.base.var(key),
        }
    }
}

#[cfg(test)]
pub use in_memory::InMemoryEnv;
