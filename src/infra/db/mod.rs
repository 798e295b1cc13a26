//! SQLite-backed cache state store.
//!
//! Every session owns a dedicated connection that lives for one group of
//! operations. Statements are prepared once per connection by sqlx's statement
//! cache and re-bound for each URL.

mod util;

pub use util::map_sqlx_error;

use async_trait::async_trait;
use sqlx::{
    ConnectOptions, Connection, FromRow, SqliteConnection, query, query_as, query_scalar,
    sqlite::SqliteConnectOptions,
};
use tracing::debug;

use crate::application::repos::{CacheSession, CacheStateStore, StoreError};
use crate::domain::entities::{CacheLookup, CacheRecord, QueueEntry};
use crate::domain::types::LinkStatus;
use crate::infra::error::InfraError;

const LOOKUP_SQL: &str = "SELECT c.location, c.date, k.status \
    FROM link_checks k \
    LEFT JOIN cache_items c ON c.url = k.url \
    WHERE k.url = ?1";

const ENQUEUE_SQL: &str = "INSERT OR IGNORE INTO capture_queue (url, created) \
    SELECT ?1, ?2 \
    WHERE ?1 NOT IN (SELECT url FROM excluded_urls) \
    AND ?1 NOT IN (SELECT url FROM link_checks)";

const LOG_ACTIVITY_SQL: &str = "INSERT INTO cache_activity (id, date, views) VALUES (?1, ?2, 1) \
    ON CONFLICT(id) DO UPDATE SET views = cache_activity.views + 1, date = excluded.date";

const CONTENT_TYPE_SQL: &str = "SELECT content_type FROM cache_items WHERE id = ?1";

const PENDING_QUEUE_SQL: &str = "SELECT url, created FROM capture_queue \
    WHERE lock IS NULL \
    ORDER BY created, id \
    LIMIT ?1";

#[derive(Debug, Clone)]
pub struct SqliteCacheStore {
    location: String,
    create_if_missing: bool,
}

impl SqliteCacheStore {
    pub fn new(location: impl Into<String>, create_if_missing: bool) -> Self {
        Self {
            location: location.into(),
            create_if_missing,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    fn options(&self) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .filename(&self.location)
            .create_if_missing(self.create_if_missing)
    }

    async fn connect(&self) -> Result<SqliteConnection, StoreError> {
        self.options()
            .connect()
            .await
            .map_err(|err| StoreError::open(&self.location, err))
    }

    /// Create or upgrade the schema.
    pub async fn run_migrations(&self) -> Result<(), InfraError> {
        let mut conn = self
            .connect()
            .await
            .map_err(|err| InfraError::migration(&self.location, err))?;

        sqlx::migrate!("./migrations")
            .run(&mut conn)
            .await
            .map_err(|err| InfraError::migration(&self.location, err))?;

        conn.close()
            .await
            .map_err(|err| InfraError::migration(&self.location, err))
    }
}

#[async_trait]
impl CacheStateStore for SqliteCacheStore {
    async fn open(&self) -> Result<Box<dyn CacheSession>, StoreError> {
        let conn = self.connect().await?;
        debug!(location = %self.location, "opened cache store session");
        Ok(Box::new(SqliteSession { conn }))
    }
}

pub struct SqliteSession {
    conn: SqliteConnection,
}

#[derive(Debug, FromRow)]
struct LookupRow {
    location: Option<String>,
    date: Option<i64>,
    status: i64,
}

#[derive(Debug, FromRow)]
struct QueueRow {
    url: String,
    created: i64,
}

#[async_trait]
impl CacheSession for SqliteSession {
    async fn lookup_attributes(&mut self, url: &str) -> Result<CacheLookup, StoreError> {
        let row = query_as::<_, LookupRow>(LOOKUP_SQL)
            .bind(url)
            .fetch_optional(&mut self.conn)
            .await
            .map_err(map_sqlx_error)?;

        let lookup = match row {
            None => CacheLookup::NotFound,
            Some(LookupRow {
                location: Some(location),
                date,
                status,
            }) if !location.is_empty() => CacheLookup::Found(CacheRecord {
                url: url.to_string(),
                location,
                status: LinkStatus::from_code(status),
                date: date.unwrap_or_default(),
            }),
            Some(_) => CacheLookup::Empty,
        };
        debug!(url, ?lookup, "cache lookup");
        Ok(lookup)
    }

    async fn enqueue_for_caching(&mut self, url: &str, now: i64) -> Result<(), StoreError> {
        let result = query(ENQUEUE_SQL)
            .bind(url)
            .bind(now)
            .execute(&mut self.conn)
            .await
            .map_err(map_sqlx_error)?;
        debug!(url, inserted = result.rows_affected(), "enqueue for caching");
        Ok(())
    }

    async fn log_activity(&mut self, cache_id: &str, now: i64) -> Result<(), StoreError> {
        query(LOG_ACTIVITY_SQL)
            .bind(cache_id)
            .bind(now)
            .execute(&mut self.conn)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn content_type(&mut self, cache_id: &str) -> Result<Option<String>, StoreError> {
        let value: Option<Option<String>> = query_scalar(CONTENT_TYPE_SQL)
            .bind(cache_id)
            .fetch_optional(&mut self.conn)
            .await
            .map_err(map_sqlx_error)?;
        Ok(value.flatten().filter(|content_type| !content_type.is_empty()))
    }

    async fn pending_queue(&mut self, limit: u32) -> Result<Vec<QueueEntry>, StoreError> {
        let rows = query_as::<_, QueueRow>(PENDING_QUEUE_SQL)
            .bind(i64::from(limit))
            .fetch_all(&mut self.conn)
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows
            .into_iter()
            .map(|row| QueueEntry {
                url: row.url,
                created: row.created,
            })
            .collect())
    }

    async fn close(self: Box<Self>) -> Result<(), StoreError> {
        let SqliteSession { conn } = *self;
        conn.close().await.map_err(map_sqlx_error)
    }
}
