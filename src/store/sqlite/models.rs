//! Database row models.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;
use tracing::instrument;

use super::schema;
use crate::session::Session;
use crate::store::{StoreError, StoreErrorKind};

/// A stored session document.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::sessions)]
pub struct SessionRow {
    id: String,
    revision: i64,
    document: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl SessionRow {
    /// Decodes the JSON document and checks it against the row's bookkeeping.
    #[instrument(skip(self), fields(session_id = %self.id, revision = self.revision))]
    pub fn decode(&self) -> Result<Session, StoreError> {
        let session = Session::from_document(&self.document)?;
        if session.id() != &self.id {
            return Err(StoreError::new(StoreErrorKind::InvalidDocument(format!(
                "row '{}' holds document for '{}'",
                self.id,
                session.id()
            ))));
        }
        Ok(session.with_revision(to_revision(self.revision)?))
    }
}

/// Insertable row for a new session.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::sessions)]
pub struct NewSessionRow {
    id: String,
    revision: i64,
    document: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

/// Converts a revision to its column type.
#[track_caller]
pub fn to_column(revision: u64) -> Result<i64, StoreError> {
    i64::try_from(revision).map_err(|_| StoreError::backend(format!("revision {} overflows", revision)))
}

/// Converts a revision column back to a revision.
#[track_caller]
pub fn to_revision(column: i64) -> Result<u64, StoreError> {
    u64::try_from(column).map_err(|_| {
        StoreError::new(StoreErrorKind::InvalidDocument(format!(
            "negative revision {}",
            column
        )))
    })
}
