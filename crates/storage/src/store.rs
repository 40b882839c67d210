//! SQLite usage store implementation.

use crate::{Error, ProviderUsage, Result, UsageRecord, UsageSummary};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, params};
use std::path::Path;
use uuid::Uuid;

/// SQLite-backed usage ledger.
pub struct UsageStore {
    conn: Connection,
}

impl UsageStore {
    /// Open or create a usage store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory usage store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS usage (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                provider TEXT NOT NULL,
                model TEXT NOT NULL,
                input_tokens INTEGER NOT NULL DEFAULT 0,
                output_tokens INTEGER NOT NULL DEFAULT 0,
                total_tokens INTEGER NOT NULL DEFAULT 0,
                elapsed_ms REAL NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_usage_timestamp
                ON usage(timestamp);
            "#,
        )?;
        Ok(())
    }

    /// Append a record to the ledger.
    pub fn append(&self, record: &UsageRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO usage (id, timestamp, provider, model, input_tokens, output_tokens, total_tokens, elapsed_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id.to_string(),
                record.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
                record.provider,
                record.model,
                record.input_tokens,
                record.output_tokens,
                record.total_tokens,
                record.elapsed_ms,
            ],
        )?;
        Ok(())
    }

    /// The `limit` most recent records, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<UsageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, provider, model, input_tokens, output_tokens, total_tokens, elapsed_ms
             FROM usage ORDER BY timestamp DESC, rowid DESC LIMIT ?1",
        )?;

        let rows = stmt
            .query_map([i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
                Ok(RawRecord {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    provider: row.get(2)?,
                    model: row.get(3)?,
                    input_tokens: row.get(4)?,
                    output_tokens: row.get(5)?,
                    total_tokens: row.get(6)?,
                    elapsed_ms: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(RawRecord::into_record).collect()
    }

    /// Per-provider totals over the whole ledger.
    pub fn summary(&self) -> Result<UsageSummary> {
        let mut stmt = self.conn.prepare(
            "SELECT provider, COUNT(*), COALESCE(SUM(input_tokens), 0), COALESCE(SUM(output_tokens), 0)
             FROM usage GROUP BY provider ORDER BY provider",
        )?;

        let by_provider = stmt
            .query_map([], |row| {
                Ok(ProviderUsage {
                    provider: row.get(0)?,
                    requests: count(row.get(1)?),
                    input_tokens: count(row.get(2)?),
                    output_tokens: count(row.get(3)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(UsageSummary::from_providers(by_provider))
    }
}

/// A row as stored, before the id and timestamp are parsed.
struct RawRecord {
    id: String,
    timestamp: String,
    provider: String,
    model: String,
    input_tokens: u64,
    output_tokens: u64,
    total_tokens: u64,
    elapsed_ms: f64,
}

impl RawRecord {
    fn into_record(self) -> Result<UsageRecord> {
        let id = self
            .id
            .parse::<Uuid>()
            .map_err(|e| Error::Corrupt(format!("id {}: {e}", self.id)))?;
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| Error::Corrupt(format!("timestamp {}: {e}", self.timestamp)))?
            .with_timezone(&Utc);
        Ok(UsageRecord {
            id,
            timestamp,
            provider: self.provider,
            model: self.model,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            total_tokens: self.total_tokens,
            elapsed_ms: self.elapsed_ms,
        })
    }
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
