use rusqlite::{params, Connection};
use std::sync::Mutex;
use uuid::Uuid;
use crate::Game;

/// Infrastructure failures of the persistence layer. Kept separate from the
/// domain [`crate::GameError`] taxonomy; callers must not conflate the two.
#[derive(Debug)]
pub enum StorageError {
    DatabaseError(String),
    SerializationError(String),
    GameNotFound,
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

/// SQLite-backed persistence for games. Each game is stored as one JSON
/// document; the join code is indexed alongside for lookup.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(path: &str) -> Result<Self, StorageError> {
        log::info!("Opening game store at {}", path);
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS games (
                id TEXT PRIMARY KEY,
                code TEXT NOT NULL,
                data TEXT NOT NULL
            );"
        )?;
        Ok(SqliteStore { conn: Mutex::new(conn) })
    }

    /// Load all persisted games.
    pub fn load_all_games(&self) -> Result<Vec<Game>, StorageError> {
        let conn = self.conn.lock().expect("store lock poisoned");
        let mut stmt = conn.prepare("SELECT data FROM games")?;
        let rows = stmt.query_map([], |row| {
            let json: String = row.get(0)?;
            Ok(json)
        })?;

        let mut games = Vec::new();
        for row in rows {
            let json = row?;
            let game: Game = serde_json::from_str(&json)?;
            games.push(game);
        }
        log::debug!("Loaded {} game(s) from store", games.len());
        Ok(games)
    }

    /// Insert a new game (or replace the document with the same id).
    pub fn insert_game(&self, game: &Game) -> Result<(), StorageError> {
        let json = serde_json::to_string(game)?;
        let id = game.get_id().to_string();
        let conn = self.conn.lock().expect("store lock poisoned");
        conn.execute(
            "INSERT OR REPLACE INTO games (id, code, data) VALUES (?1, ?2, ?3)",
            params![id, game.code(), json],
        )?;
        Ok(())
    }

    /// Update an existing game document.
    pub fn update_game(&self, game: &Game) -> Result<(), StorageError> {
        let json = serde_json::to_string(game)?;
        let id = game.get_id().to_string();
        let conn = self.conn.lock().expect("store lock poisoned");
        conn.execute(
            "UPDATE games SET data = ?2 WHERE id = ?1",
            params![id, json],
        )?;
        Ok(())
    }

    /// Delete a game by id.
    pub fn delete_game(&self, game_id: Uuid) -> Result<(), StorageError> {
        let id = game_id.to_string();
        let conn = self.conn.lock().expect("store lock poisoned");
        let deleted = conn.execute(
            "DELETE FROM games WHERE id = ?1",
            params![id],
        )?;
        if deleted == 0 {
            log::warn!("Attempted to delete non-existent game {}", id);
            return Err(StorageError::GameNotFound);
        }
        Ok(())
    }

    /// Whether any stored game already uses this join code.
    pub fn code_exists(&self, code: &str) -> Result<bool, StorageError> {
        let conn = self.conn.lock().expect("store lock poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM games WHERE code = ?1",
            params![code],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
