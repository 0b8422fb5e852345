//! Entry CRUD operations for the SQLite backend.
//!
//! Implements [`StoreBackend`] for [`CacheDb`]: store bookkeeping in the
//! `stores` table, entries keyed by `(store_name, key_hash)`.

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::hash::compute_entry_key;
use super::{Entry, StoreBackend};
use crate::Error;
use crate::request::RequestKey;
use crate::response::ResponseSnapshot;

const SELECT_ENTRY: &str = "SELECT
    method, url, request_headers_json, request_body,
    status, status_text, headers_json, body,
    stored_at, replay_attempts
FROM entries WHERE store_name = ?1 AND key_hash = ?2";

/// Row as read from SQLite, before JSON and timestamp decoding.
struct RawEntry {
    method: String,
    url: String,
    request_headers_json: String,
    request_body: Option<Vec<u8>>,
    status: i64,
    status_text: String,
    headers_json: String,
    body: Vec<u8>,
    stored_at: String,
    replay_attempts: i64,
}

impl RawEntry {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            method: row.get(0)?,
            url: row.get(1)?,
            request_headers_json: row.get(2)?,
            request_body: row.get(3)?,
            status: row.get(4)?,
            status_text: row.get(5)?,
            headers_json: row.get(6)?,
            body: row.get(7)?,
            stored_at: row.get(8)?,
            replay_attempts: row.get(9)?,
        })
    }

    fn decode(self) -> Result<Entry, Error> {
        let status = u16::try_from(self.status)
            .map_err(|_| Error::CorruptEntry(format!("status {} out of range", self.status)))?;
        let stored_at = DateTime::parse_from_rfc3339(&self.stored_at)
            .map_err(|e| Error::CorruptEntry(format!("stored_at {}: {e}", self.stored_at)))?
            .with_timezone(&Utc);

        Ok(Entry {
            key: RequestKey { method: self.method, url: self.url },
            request_headers: serde_json::from_str(&self.request_headers_json)?,
            request_body: self.request_body.map(Bytes::from),
            response: ResponseSnapshot {
                status,
                status_text: self.status_text,
                headers: serde_json::from_str(&self.headers_json)?,
                body: Bytes::from(self.body),
            },
            stored_at,
            replay_attempts: u32::try_from(self.replay_attempts).unwrap_or(u32::MAX),
        })
    }
}

#[async_trait::async_trait]
impl StoreBackend for CacheDb {
    async fn open(&self, store: &str) -> Result<(), Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO stores (name, created_at) VALUES (?1, ?2)",
                    params![store, Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn match_entry(&self, store: &str, key: &RequestKey) -> Result<Option<Entry>, Error> {
        let store = store.to_string();
        let hash = compute_entry_key(key);
        self.conn
            .call(move |conn| -> Result<Option<Entry>, Error> {
                let result = conn.query_row(SELECT_ENTRY, params![store, hash], RawEntry::from_row);

                match result {
                    Ok(raw) => Ok(Some(raw.decode()?)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Uses UPSERT semantics and creates the store row on first write.
    async fn put(&self, store: &str, entry: &Entry) -> Result<(), Error> {
        let store = store.to_string();
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let request_headers_json = serde_json::to_string(&entry.request_headers)?;
                let headers_json = serde_json::to_string(&entry.response.headers)?;

                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO stores (name, created_at) VALUES (?1, ?2)",
                    params![store, Utc::now().to_rfc3339()],
                )?;
                tx.execute(
                    "INSERT INTO entries (
                    store_name, key_hash, method, url, request_headers_json, request_body,
                    status, status_text, headers_json, body, stored_at, replay_attempts
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                ON CONFLICT(store_name, key_hash) DO UPDATE SET
                    method = excluded.method,
                    url = excluded.url,
                    request_headers_json = excluded.request_headers_json,
                    request_body = excluded.request_body,
                    status = excluded.status,
                    status_text = excluded.status_text,
                    headers_json = excluded.headers_json,
                    body = excluded.body,
                    stored_at = excluded.stored_at,
                    replay_attempts = excluded.replay_attempts",
                    params![
                        &store,
                        compute_entry_key(&entry.key),
                        &entry.key.method,
                        &entry.key.url,
                        request_headers_json,
                        entry.request_body.as_deref(),
                        i64::from(entry.response.status),
                        &entry.response.status_text,
                        headers_json,
                        entry.response.body.as_ref(),
                        entry.stored_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                        i64::from(entry.replay_attempts),
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, store: &str, key: &RequestKey) -> Result<bool, Error> {
        let store = store.to_string();
        let hash = compute_entry_key(key);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM entries WHERE store_name = ?1 AND key_hash = ?2",
                    params![store, hash],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn record_attempt(&self, store: &str, key: &RequestKey, attempts: u32) -> Result<bool, Error> {
        let store = store.to_string();
        let hash = compute_entry_key(key);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "UPDATE entries SET replay_attempts = ?1 WHERE store_name = ?2 AND key_hash = ?3",
                    params![i64::from(attempts), store, hash],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self, store: &str) -> Result<Vec<RequestKey>, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<RequestKey>, Error> {
                let mut stmt = conn.prepare("SELECT method, url FROM entries WHERE store_name = ?1 ORDER BY rowid")?;
                let keys = stmt
                    .query_map(params![store], |row| Ok(RequestKey { method: row.get(0)?, url: row.get(1)? }))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    async fn list_store_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM stores ORDER BY rowid")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Entries go with the store via `ON DELETE CASCADE`.
    async fn delete_store(&self, store: &str) -> Result<bool, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM stores WHERE name = ?1", params![store])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}
