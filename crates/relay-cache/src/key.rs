//! Deterministic cache keys.
//!
//! A key encodes the operation name plus its named arguments. Arguments are
//! held in a `BTreeMap`, so insertion order never matters: two logically
//! identical calls always produce the same key, and the JSON encoding of
//! `[operation, args]` keeps different calls from colliding.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn builder(operation: impl Into<String>) -> CacheKeyBuilder {
        CacheKeyBuilder {
            operation: operation.into(),
            args: BTreeMap::new(),
        }
    }

    /// Key for an operation without arguments.
    pub fn operation(operation: impl Into<String>) -> Self {
        Self::builder(operation).build()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    operation: String,
    args: BTreeMap<String, Value>,
}

impl CacheKeyBuilder {
    /// Add a named argument. A repeated name replaces the earlier value.
    #[must_use]
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn build(self) -> CacheKey {
        let encoded = serde_json::to_string(&(&self.operation, &self.args))
            .unwrap_or_else(|_| format!("{}:{:?}", self.operation, self.args));
        CacheKey(encoded)
    }
}
