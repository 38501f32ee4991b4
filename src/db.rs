use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{IntelError, IntelResult};
use crate::governor::UsageLog;
use crate::models::{Card, CardDraft};

pub const USAGE_LOG_KEY: &str = "api_usage_logs";
pub const API_KEY_KEY: &str = "gemini_api_key";

/// Durable home for cards, the API usage log and the stored credential.
pub struct Database {
    conn: Connection,
    path: PathBuf,
    clock: Rc<dyn Clock>,
}

impl Database {
    pub fn open(path: &Path) -> IntelResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
            clock: Rc::new(SystemClock),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> IntelResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn,
            path: PathBuf::from(":memory:"),
            clock: Rc::new(SystemClock),
        };
        db.init()?;
        Ok(db)
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn init(&self) -> IntelResult<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cards (
                id TEXT PRIMARY KEY,
                seq INTEGER NOT NULL,
                body TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_cards_seq ON cards(seq);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> IntelResult<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('cards', 'settings')",
            [],
            |row| row.get(0),
        )?;
        if tables < 2 {
            return Err(IntelError::Persistence(
                "Database not initialized. Run 'intel init' first.".to_string(),
            ));
        }
        Ok(())
    }

    // --- Card operations ---

    /// Upsert a card by id. Unsaved drafts get a fresh id and keep the look
    /// they carry; the timestamp is refreshed and never moves backwards.
    pub fn put_card(&self, draft: CardDraft) -> IntelResult<Card> {
        let now = self.clock.now_ms();
        debug!(id = ?draft.id(), company = %draft.data().company_name, "saving card");
        let tx = self.conn.unchecked_transaction()?;

        let mut card = match draft {
            CardDraft::Saved(card) => card,
            CardDraft::Unsaved { data, theme_color, icon } => Card {
                id: uuid::Uuid::new_v4().to_string(),
                data,
                timestamp: now,
                theme_color,
                icon,
            },
        };

        let existing: Option<(i64, String)> = tx
            .query_row(
                "SELECT seq, body FROM cards WHERE id = ?1",
                [&card.id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match existing {
            Some((seq, body)) => {
                let previous = serde_json::from_str::<Card>(&body)
                    .map(|c| c.timestamp)
                    .unwrap_or(i64::MIN);
                card.timestamp = now.max(previous);
                tx.execute(
                    "UPDATE cards SET body = ?1 WHERE id = ?2",
                    params![encode(&card)?, card.id],
                )?;
                debug!(id = %card.id, seq, "overwrote card");
            }
            None => {
                card.timestamp = now;
                tx.execute(
                    "INSERT INTO cards (id, seq, body)
                     VALUES (?1, (SELECT COALESCE(MAX(seq), 0) + 1 FROM cards), ?2)",
                    params![card.id, encode(&card)?],
                )?;
                info!(id = %card.id, company = %card.data.company_name, "saved card");
            }
        }

        tx.commit()?;
        Ok(card)
    }

    /// Every card, in the order they were first saved.
    pub fn list_cards(&self) -> IntelResult<Vec<Card>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, body FROM cards ORDER BY seq")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut cards = Vec::new();
        for row in rows {
            let (id, body) = row?;
            match serde_json::from_str::<Card>(&body) {
                Ok(card) => cards.push(card),
                Err(e) => warn!(%id, error = %e, "skipping unreadable card"),
            }
        }
        Ok(cards)
    }

    pub fn get_card(&self, id: &str) -> IntelResult<Option<Card>> {
        let body: Option<String> = self
            .conn
            .query_row("SELECT body FROM cards WHERE id = ?1", [id], |row| row.get(0))
            .optional()?;
        match body {
            Some(body) => serde_json::from_str(&body)
                .map(Some)
                .map_err(|e| IntelError::Persistence(format!("Corrupt card {}: {}", id, e))),
            None => Ok(None),
        }
    }

    /// Removes one card. Missing ids are not an error.
    pub fn delete_card(&self, id: &str) -> IntelResult<bool> {
        let removed = self.conn.execute("DELETE FROM cards WHERE id = ?1", [id])?;
        if removed > 0 {
            info!(%id, "deleted card");
        }
        Ok(removed > 0)
    }

    pub fn clear_cards(&self) -> IntelResult<usize> {
        let removed = self.conn.execute("DELETE FROM cards", [])?;
        warn!(removed, "cleared all cards");
        Ok(removed)
    }

    // --- Settings ---

    pub fn get_setting(&self, key: &str) -> IntelResult<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> IntelResult<()> {
        self.conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_setting(&self, key: &str) -> IntelResult<()> {
        self.conn.execute("DELETE FROM settings WHERE key = ?1", [key])?;
        Ok(())
    }

    pub fn api_key(&self) -> IntelResult<Option<String>> {
        Ok(self
            .get_setting(API_KEY_KEY)?
            .filter(|k| !k.trim().is_empty()))
    }
}

impl UsageLog for Database {
    fn load(&self) -> IntelResult<Vec<i64>> {
        let Some(raw) = self.get_setting(USAGE_LOG_KEY)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<i64>>(&raw) {
            Ok(log) => Ok(log.into_iter().filter(|ts| *ts >= 0).collect()),
            Err(e) => {
                warn!(error = %e, "usage log unreadable, starting fresh");
                Ok(Vec::new())
            }
        }
    }

    fn store(&self, timestamps: &[i64]) -> IntelResult<()> {
        let raw = serde_json::to_string(timestamps)
            .map_err(|e| IntelError::Persistence(e.to_string()))?;
        self.set_setting(USAGE_LOG_KEY, &raw)
    }
}

fn encode(card: &Card) -> IntelResult<String> {
    serde_json::to_string(card).map_err(|e| IntelError::Persistence(e.to_string()))
}

/// Rough serialized size of a snapshot, for the storage indicator only.
pub fn estimate_size_bytes(cards: &[Card]) -> usize {
    cards
        .iter()
        .map(|card| serde_json::to_string(card).map(|s| s.len()).unwrap_or(0))
        .sum()
}
