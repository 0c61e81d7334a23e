//! Repository methods on [`RelayService`](crate::service::RelayService).

pub mod records;
pub mod runs;

pub use records::decide;
pub use runs::{INTERRUPTED_MESSAGE, RunFilter};
