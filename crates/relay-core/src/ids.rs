//! ID prefixes for store-assigned identities.
//!
//! IDs are generated by the store as `{prefix}-{8 hex chars}`, e.g. `run-a3f8b2c1`.

pub const PREFIX_RECORD: &str = "rec";
pub const PREFIX_RUN: &str = "run";

pub const ALL_PREFIXES: &[&str] = &[PREFIX_RECORD, PREFIX_RUN];
