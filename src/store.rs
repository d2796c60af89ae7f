use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection};

use crate::error::PairstreamError;
use crate::model::tick::Tick;

type Result<T> = std::result::Result<T, PairstreamError>;

/// SQLite-backed tick store.
///
/// Implements the persistence boundary: single/bulk append of immutable
/// ticks and range queries sorted ascending by time. Shared across tasks as
/// `Arc<TickStore>`; writes are append-only, so readers never coordinate
/// with writers beyond the connection lock.
pub struct TickStore {
    conn: Mutex<Connection>,
}

impl TickStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(dir) = path.as_ref().parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        Self::init(Connection::open(path.as_ref())?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS ticks (
                symbol TEXT NOT NULL,
                ts_ms INTEGER NOT NULL,
                price REAL NOT NULL,
                size REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_ticks_symbol_ts ON ticks(symbol, ts_ms);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("tick store mutex poisoned")
    }

    /// Append a single tick.
    pub fn insert_tick(&self, tick: &Tick) -> Result<()> {
        self.conn().execute(
            "INSERT INTO ticks (symbol, ts_ms, price, size) VALUES (?1, ?2, ?3, ?4)",
            params![
                tick.symbol.to_ascii_uppercase(),
                tick.ts.timestamp_millis(),
                tick.price,
                tick.size,
            ],
        )?;
        Ok(())
    }

    /// Append a batch inside one transaction, skipping records that fail to
    /// insert instead of aborting the batch. Returns the number inserted.
    pub fn insert_ticks(&self, ticks: &[Tick]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx
                .prepare("INSERT INTO ticks (symbol, ts_ms, price, size) VALUES (?1, ?2, ?3, ?4)")?;
            for tick in ticks {
                if !tick.price.is_finite() || !tick.size.is_finite() {
                    tracing::debug!(symbol = %tick.symbol, "Skipping tick with non-finite fields");
                    continue;
                }
                match stmt.execute(params![
                    tick.symbol.to_ascii_uppercase(),
                    tick.ts.timestamp_millis(),
                    tick.price,
                    tick.size,
                ]) {
                    Ok(_) => inserted += 1,
                    Err(e) => {
                        tracing::debug!(symbol = %tick.symbol, error = %e, "Skipping unstorable tick");
                    }
                }
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Ticks for one symbol, optionally bounded to an inclusive time range,
    /// sorted ascending by time.
    pub fn query_ticks(
        &self,
        symbol: &str,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<Tick>> {
        let symbol = symbol.to_ascii_uppercase();
        let conn = self.conn();

        let mut rows: Vec<(i64, f64, f64)> = Vec::new();
        match range {
            Some((from, to)) => {
                let mut stmt = conn.prepare(
                    "SELECT ts_ms, price, size FROM ticks
                     WHERE symbol = ?1 AND ts_ms >= ?2 AND ts_ms <= ?3
                     ORDER BY ts_ms ASC",
                )?;
                let mapped = stmt.query_map(
                    params![symbol, from.timestamp_millis(), to.timestamp_millis()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )?;
                for row in mapped {
                    rows.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT ts_ms, price, size FROM ticks WHERE symbol = ?1 ORDER BY ts_ms ASC",
                )?;
                let mapped =
                    stmt.query_map([&symbol], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
                for row in mapped {
                    rows.push(row?);
                }
            }
        }

        Ok(rows
            .into_iter()
            .filter_map(|(ts_ms, price, size)| {
                let ts = Utc.timestamp_millis_opt(ts_ms).single()?;
                Some(Tick {
                    symbol: symbol.clone(),
                    ts,
                    price,
                    size,
                })
            })
            .collect())
    }

    /// Total number of stored ticks across all symbols.
    pub fn tick_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM ticks", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
