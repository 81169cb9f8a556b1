use crate::bus::{EventBus, Subscription};
use crate::error::StoreError;
use crate::store::{EventStore, Snapshot};
use ember_core::{DomainEvent, TimestampMs};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::warn;

const MAX_RETRIES: u32 = 5;
const BUSY_TIMEOUT_MS: u32 = 2_000;

/// Embedded, file-backed [`EventStore`] (`spec.md` §4.1): a relational
/// table `events(id, type, data, ts, metadata)` indexed on `ts`, written
/// in WAL mode. Transient lock contention (`SQLITE_BUSY`) is retried up
/// to [`MAX_RETRIES`] times with linear backoff (`50 * attempt` ms), per
/// the teacher's retry-on-busy idiom generalized from
/// `jackbot-data`'s exchange rate-limit retry modules.
pub struct SqliteEventStore {
    conn: Mutex<Connection>,
    bus: EventBus,
}

impl std::fmt::Debug for SqliteEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteEventStore").finish_non_exhaustive()
    }
}

impl SqliteEventStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Fatal(e.to_string()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Fatal(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| StoreError::Fatal(e.to_string()))?;
        conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS as u64))
            .map_err(|e| StoreError::Fatal(e.to_string()))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                type TEXT NOT NULL,
                data TEXT NOT NULL,
                ts INTEGER NOT NULL,
                metadata TEXT
             );
             CREATE INDEX IF NOT EXISTS events_ts_idx ON events (ts);",
        )
        .map_err(|e| StoreError::Fatal(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
            bus: EventBus::new(),
        })
    }

    /// Runs `f` against the connection, retrying on `SQLITE_BUSY` with
    /// linear backoff up to [`MAX_RETRIES`] attempts.
    fn with_retry<T>(&self, mut f: impl FnMut(&Connection) -> rusqlite::Result<T>) -> Result<T, StoreError> {
        let conn = self.conn.lock();
        let mut attempt = 0;
        loop {
            match f(&conn) {
                Ok(value) => return Ok(value),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::DatabaseBusy && attempt < MAX_RETRIES =>
                {
                    attempt += 1;
                    let delay = Duration::from_millis(50 * attempt as u64);
                    warn!(attempt, ?delay, "sqlite busy, retrying");
                    thread::sleep(delay);
                }
                Err(e) => return Err(StoreError::Transient(e.to_string())),
            }
        }
    }
}

impl EventStore for SqliteEventStore {
    fn append(&self, events: Vec<DomainEvent>) -> Result<(), StoreError> {
        for event in &events {
            event.validate()?;
        }
        if events.is_empty() {
            return Ok(());
        }

        self.with_retry(|conn| {
            let tx = conn.unchecked_transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT OR IGNORE INTO events (id, type, data, ts, metadata) VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for event in &events {
                    let data = serde_json::to_string(&event.kind).expect("DomainEvent kind always serializes");
                    let metadata = event
                        .metadata
                        .as_ref()
                        .map(|m| serde_json::to_string(m).expect("metadata always serializes"));
                    stmt.execute(params![
                        event.id.0.to_string(),
                        event.type_name(),
                        data,
                        event.ts,
                        metadata
                    ])?;
                }
            }
            tx.commit()
        })?;

        for event in &events {
            self.bus.publish(event);
        }
        Ok(())
    }

    fn read(&self, after: Option<TimestampMs>) -> Result<Vec<DomainEvent>, StoreError> {
        self.with_retry(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, data, ts, metadata FROM events WHERE ts > ?1 ORDER BY ts ASC",
            )?;
            let rows = stmt.query_map(params![after.unwrap_or(i64::MIN)], |row| {
                let id: String = row.get(0)?;
                let data: String = row.get(1)?;
                let ts: TimestampMs = row.get(2)?;
                let metadata: Option<String> = row.get(3)?;
                Ok((id, data, ts, metadata))
            })?;

            let mut out = Vec::new();
            for row in rows {
                let (id, data, ts, metadata) = row?;
                out.push((id, data, ts, metadata));
            }
            Ok(out)
        })
        .map(|rows| {
            rows.into_iter()
                .filter_map(|(id, data, ts, metadata)| {
                    let kind = serde_json::from_str(&data).ok()?;
                    let metadata = metadata.and_then(|m| serde_json::from_str(&m).ok());
                    let id = uuid::Uuid::parse_str(&id).ok()?;
                    Some(DomainEvent {
                        id: ember_core::EventId(id),
                        ts,
                        metadata,
                        kind,
                    })
                })
                .collect()
        })
    }

    fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    fn len(&self) -> usize {
        self.with_retry(|conn| conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get::<_, i64>(0)))
            .unwrap_or(0) as usize
    }

    fn restore(&self, snapshot: &Snapshot<serde_json::Value>) -> Result<(), StoreError> {
        self.with_retry(|conn| conn.execute("DELETE FROM events WHERE ts <= ?1", params![snapshot.ts]))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::{EventKind, MarketTick};

    fn tick_event(ts: i64) -> DomainEvent {
        let tick = MarketTick::new(ts, "SIM", None, None, Some(100.0), None, None).unwrap();
        DomainEvent::new(ts, EventKind::MarketTick(tick))
    }

    #[test]
    fn append_and_read_round_trips_through_sqlite() {
        let store = SqliteEventStore::open_in_memory().unwrap();
        store.append(vec![tick_event(1), tick_event(2)]).unwrap();
        let events = store.read(None).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].ts, 1);
    }

    #[test]
    fn duplicate_id_is_ignored_via_on_conflict() {
        let store = SqliteEventStore::open_in_memory().unwrap();
        let event = tick_event(1);
        store.append(vec![event.clone()]).unwrap();
        store.append(vec![event]).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn read_after_filters_by_ts() {
        let store = SqliteEventStore::open_in_memory().unwrap();
        store.append(vec![tick_event(1), tick_event(2), tick_event(3)]).unwrap();
        let events = store.read(Some(1)).unwrap();
        assert_eq!(events.len(), 2);
    }
}
