//! SQLite-backed session store.
//!
//! One row per session holds the JSON document and its revision. Commits made
//! through this handle are pushed to subscribers immediately; commits made by
//! other processes sharing the database file are picked up by polling.

mod models;
mod schema; // Diesel generated schema - internal use only

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use self::models::{NewSessionRow, SessionRow, to_column, to_revision};
use super::{FeedHub, SessionFeed, SessionStore, StoreError, StoreErrorKind};
use crate::SyncConfig;
use crate::session::{Session, SessionId};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Shortest poll period; `tokio::time::interval` rejects zero.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Session store persisted in a SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    db_path: String,
    hub: FeedHub,
    pollers: Mutex<HashSet<SessionId>>,
    poll_interval: Duration,
    /// Held from commit until publish so local commits reach the hub in order.
    commits: tokio::sync::Mutex<()>,
}

impl SqliteStore {
    /// Opens (and if needed creates and migrates) the database at `db_path`.
    ///
    /// Use `":memory:"` only for single-connection experiments; every
    /// operation opens its own connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database cannot be opened or migrated.
    #[instrument(skip(db_path), fields(db_path = %db_path.as_ref()))]
    pub fn open(
        db_path: impl AsRef<str>,
        poll_interval: Duration,
        feed_capacity: usize,
    ) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref().to_string();
        info!(path = %db_path, "Opening SQLite session store");

        let mut conn = connect(&db_path)?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| StoreError::backend(format!("Migrations failed: {}", e)))?;
        debug!(applied = applied.len(), "Migrations applied");

        if poll_interval < MIN_POLL_INTERVAL {
            warn!(?poll_interval, "Poll interval too short, clamping");
        }

        Ok(Self {
            inner: Arc::new(Inner {
                db_path,
                hub: FeedHub::new(feed_capacity),
                pollers: Mutex::new(HashSet::new()),
                poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
                commits: tokio::sync::Mutex::new(()),
            }),
        })
    }

    /// Opens the store described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database cannot be opened or migrated.
    pub fn from_config(config: &SyncConfig) -> Result<Self, StoreError> {
        Self::open(
            config.db_path().to_string_lossy(),
            config.poll_interval(),
            *config.feed_capacity(),
        )
    }

    /// Returns the database path.
    pub fn db_path(&self) -> &str {
        &self.inner.db_path
    }

    /// Runs a database operation on the blocking pool with a fresh connection.
    async fn blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T, StoreError> + Send + 'static,
    {
        let db_path = self.inner.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = connect(&db_path)?;
            op(&mut conn)
        })
        .await
        .map_err(|e| StoreError::backend(format!("Store task failed: {}", e)))?
    }

    /// Starts the poller for `id` unless one is already running.
    fn ensure_poller(&self, id: &str) {
        let mut pollers = self
            .inner
            .pollers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !pollers.insert(id.to_string()) {
            return;
        }

        debug!(session_id = id, "Starting session poller");
        let store = self.clone();
        let id = id.to_string();
        tokio::spawn(async move { store.poll(id).await });
    }

    /// Polls `id` for foreign commits until its last subscriber is gone.
    #[instrument(skip(self))]
    async fn poll(self, id: SessionId) {
        let mut ticker = tokio::time::interval(self.inner.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if self.retire_if_unwatched(&id) {
                debug!("No subscribers left, poller exiting");
                return;
            }

            match self.read(&id).await {
                Ok(session) => self.inner.hub.publish(&session),
                Err(err) if matches!(err.kind, StoreErrorKind::InvalidDocument(_)) => {
                    error!(error = %err, "Stored document no longer decodes");
                    self.inner.hub.publish_error(&id, err);
                    self.retire(&id);
                    return;
                }
                Err(err) => warn!(error = %err, "Poll failed, retrying next tick"),
            }
        }
    }

    fn retire_if_unwatched(&self, id: &str) -> bool {
        let mut pollers = self
            .inner
            .pollers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.inner.hub.has_subscribers(id) {
            return false;
        }
        pollers.remove(id);
        true
    }

    fn retire(&self, id: &str) {
        self.inner
            .pollers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }
}

#[track_caller]
fn connect(db_path: &str) -> Result<SqliteConnection, StoreError> {
    let mut conn = SqliteConnection::establish(db_path)
        .map_err(|e| StoreError::backend(format!("Failed to connect to '{}': {}", db_path, e)))?;
    conn.batch_execute(&format!("PRAGMA busy_timeout = {};", BUSY_TIMEOUT_MS))?;
    Ok(conn)
}

fn read_row(conn: &mut SqliteConnection, id: &str) -> Result<Session, StoreError> {
    let row = schema::sessions::table
        .filter(schema::sessions::id.eq(id))
        .select(SessionRow::as_select())
        .first(conn)
        .optional()?;

    match row {
        Some(row) => row.decode(),
        None => Err(StoreError::new(StoreErrorKind::NotFound(id.to_string()))),
    }
}

fn stored_revision(conn: &mut SqliteConnection, id: &str) -> Result<Option<u64>, StoreError> {
    let revision = schema::sessions::table
        .filter(schema::sessions::id.eq(id))
        .select(schema::sessions::revision)
        .first::<i64>(conn)
        .optional()?;
    revision.map(to_revision).transpose()
}

#[async_trait]
impl SessionStore for SqliteStore {
    #[instrument(skip(self, session), fields(session_id = %session.id()))]
    async fn create(&self, session: &Session) -> Result<Session, StoreError> {
        let committed = session.clone().with_revision(1);
        let document = committed.to_document()?;
        let now = Utc::now().naive_utc();
        let row = NewSessionRow::new(committed.id().clone(), to_column(1)?, document, now, now);
        let id = committed.id().clone();

        let _commit = self.inner.commits.lock().await;
        self.blocking(move |conn| {
            match diesel::insert_into(schema::sessions::table)
                .values(&row)
                .execute(conn)
            {
                Ok(_) => Ok(()),
                Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                    Err(StoreError::new(StoreErrorKind::AlreadyExists(id)))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await?;

        info!("Session row inserted");
        self.inner.hub.publish(&committed);
        Ok(committed)
    }

    #[instrument(skip(self))]
    async fn read(&self, id: &str) -> Result<Session, StoreError> {
        let id = id.to_string();
        self.blocking(move |conn| read_row(conn, &id)).await
    }

    #[instrument(skip(self, session), fields(session_id = %session.id()))]
    async fn write(
        &self,
        session: &Session,
        expected_revision: u64,
    ) -> Result<Session, StoreError> {
        let committed = session.clone().with_revision(expected_revision + 1);
        let document = committed.to_document()?;
        let expected = to_column(expected_revision)?;
        let next = to_column(expected_revision + 1)?;
        let id = committed.id().clone();

        let _commit = self.inner.commits.lock().await;
        self.blocking(move |conn| {
            use schema::sessions::dsl;

            let now = Utc::now().naive_utc();
            let updated = diesel::update(
                dsl::sessions
                    .filter(dsl::id.eq(id.as_str()))
                    .filter(dsl::revision.eq(expected)),
            )
            .set((
                dsl::revision.eq(next),
                dsl::document.eq(document),
                dsl::updated_at.eq(now),
            ))
            .execute(conn)?;

            if updated == 1 {
                return Ok(());
            }

            match stored_revision(conn, &id)? {
                None => Err(StoreError::new(StoreErrorKind::NotFound(id))),
                Some(actual) => Err(StoreError::new(StoreErrorKind::Conflict {
                    expected: expected_revision,
                    actual,
                })),
            }
        })
        .await
        .inspect_err(|err| warn!(error = %err, "Write not committed"))?;

        debug!(revision = committed.revision(), "Session row updated");
        self.inner.hub.publish(&committed);
        Ok(committed)
    }

    #[instrument(skip(self))]
    async fn subscribe(&self, id: &str) -> Result<SessionFeed, StoreError> {
        // Receiver first: a commit landing before the read is then not lost.
        let receiver = self.inner.hub.subscribe(id);
        let current = self.read(id).await?;
        self.ensure_poller(id);

        debug!(revision = current.revision(), "Subscribed to session feed");
        Ok(SessionFeed::new(id.to_string(), current, receiver))
    }
}
