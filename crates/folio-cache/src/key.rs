//! Cache keys derived from a call-site name and its arguments.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Key for a memoized computation, rendered as `"{prefix}:{name}:{args}"`.
///
/// Arguments are fingerprinted with their JSON serialization, so equal
/// arguments always render the same key and argument order matters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheKey {
    prefix: Option<String>,
    name: String,
    args: Vec<Value>,
    cacheable: bool,
}

impl CacheKey {
    /// Starts a key for the computation called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            prefix: None,
            name: name.into(),
            args: Vec::new(),
            cacheable: true,
        }
    }

    /// Namespaces the key.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Appends an argument to the fingerprint.
    #[must_use]
    pub fn arg<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => self.args.push(v),
            Err(e) => {
                tracing::warn!(name = %self.name, error = %e, "Unserializable cache key argument");
                self.cacheable = false;
            }
        }
        self
    }

    /// Returns the computation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// False when an argument could not be fingerprinted; such calls bypass
    /// the cache instead of risking a collision.
    #[must_use]
    pub const fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    /// Renders the key string.
    #[must_use]
    pub fn render(&self) -> String {
        let args = Value::Array(self.args.clone());
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}:{args}", self.name),
            None => format!("{}:{args}", self.name),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
