//! Service layer over [`RelayDb`].
//!
//! All repo methods are implemented as `impl RelayService` in `repos/`.

use crate::RelayDb;
use crate::error::DatabaseError;

/// Record store and run log.
pub struct RelayService {
    db: RelayDb,
}

impl RelayService {
    /// Open a service over a local database file, or `":memory:"` for tests.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new_local(db_path: &str) -> Result<Self, DatabaseError> {
        let db = RelayDb::open_local(db_path).await?;
        Ok(Self { db })
    }

    #[must_use]
    pub const fn from_db(db: RelayDb) -> Self {
        Self { db }
    }

    /// Access the underlying database handle.
    #[must_use]
    pub const fn db(&self) -> &RelayDb {
        &self.db
    }
}
