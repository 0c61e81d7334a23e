//! Entity structs exchanged between adapters, the store, and the orchestrator.
//!
//! All structs derive `Serialize`, `Deserialize`, and `JsonSchema` so they can
//! be printed by the CLI and validated in tests.

mod record;
mod run;

pub use record::{NaturalKey, NormalizedRecord, StoredRecord};
pub use run::{RunCounters, SyncRun};
