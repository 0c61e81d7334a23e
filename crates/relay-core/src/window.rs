//! Half-open time windows and chunking.

use chrono::{DateTime, TimeDelta, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::SyncError;

/// A non-empty half-open range `[start, end)`.
///
/// Deserializing goes through [`Window::new`], so an empty or inverted
/// window is rejected there too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, JsonSchema)]
pub struct Window {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl<'de> Deserialize<'de> for Window {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Bounds {
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        }

        let Bounds { start, end } = Bounds::deserialize(deserializer)?;
        Self::new(start, end).map_err(serde::de::Error::custom)
    }
}

impl Window {
    /// # Errors
    ///
    /// Returns `SyncError::Validation` (field `window`) unless `start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, SyncError> {
        if start >= end {
            return Err(SyncError::invalid_field(
                "window",
                format!("window start {start} must precede end {end}"),
            ));
        }
        Ok(Self { start, end })
    }

    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    /// Split into consecutive non-overlapping chunks of at most `size`, in
    /// ascending order. The last chunk may be shorter.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Validation` (field `chunk_size`) if `size` is not
    /// positive.
    pub fn chunks(&self, size: TimeDelta) -> Result<Vec<Self>, SyncError> {
        if size <= TimeDelta::zero() {
            return Err(SyncError::invalid_field(
                "chunk_size",
                "chunk size must be positive",
            ));
        }

        let mut chunks = Vec::new();
        let mut cursor = self.start;
        while cursor < self.end {
            let next = cursor
                .checked_add_signed(size)
                .map_or(self.end, |t| t.min(self.end));
            chunks.push(Self {
                start: cursor,
                end: next,
            });
            cursor = next;
        }
        Ok(chunks)
    }
}
