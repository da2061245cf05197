use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;
use tokio::sync::broadcast;
use serde::{Serialize, Deserialize};

use crate::codes::{generate_game_code, uuid_to_short_id};
use crate::geo::Point;
use crate::sqlite_store::SqliteStore;
use crate::{
    AnswerOutcome, EndReason, ExtractionPoint, Game, GameError, GameResults, GameSettings,
    GameStatus, LifecycleTransition, LocationOutcome, PlayerStatus, Role, TaskSpec,
    TransitionSuccess, Winner,
};

/// Event broadcast to WebSocket subscribers when game state changes.
/// Delivery is fire-and-forget; game state never depends on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    StateChanged(GameStateResponse),
    TaskCompleted { game_id: Uuid, player_id: Uuid, task_number: u8, tasks_completed: u32 },
    PlayerStatusChanged { game_id: Uuid, player_id: Uuid, status: PlayerStatus },
    PlayerEscaped { game_id: Uuid, player_id: Uuid },
    GameEnded { game_id: Uuid, winner: Winner, reason: EndReason },
}

/// Fixed-interval schedule for the expiration sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweeperConfig {
    pub interval_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> SweeperConfig {
        SweeperConfig { interval_secs: 60 }
    }
}

/// Manages multiple concurrent chase games.
#[derive(Clone)]
pub struct GameManager {
    games: Arc<RwLock<HashMap<Uuid, Arc<RwLock<Game>>>>>,
    code_index: Arc<RwLock<HashMap<String, Uuid>>>,
    broadcasters: Arc<RwLock<HashMap<Uuid, broadcast::Sender<GameEvent>>>>,
    db: Option<Arc<SqliteStore>>,
    sweeper: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

/// Response for creating a new game
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateGameResponse {
    pub game_id: Uuid,
    pub code: String,
}

/// A player's entry in a state response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub player_id: Uuid,
    pub short_id: String,
    pub name: String,
    pub role: Role,
    pub status: PlayerStatus,
    pub tasks_completed: u32,
}

/// Response for getting game state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStateResponse {
    pub game_id: Uuid,
    pub code: String,
    pub name: String,
    pub status: GameStatus,
    pub task_count: usize,
    pub start_time_ms: Option<u64>,
    pub end_time_ms: Option<u64>,
    pub remaining_ms: Option<u64>,
    pub players: Vec<PlayerSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<GameResults>,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum GameManagerError {
    GameNotFound,
    Game(GameError),
    LockError,
}

impl From<GameError> for GameManagerError {
    fn from(err: GameError) -> Self {
        GameManagerError::Game(err)
    }
}

pub fn epoch_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl GameManager {
    /// Create a new game manager (in-memory only)
    pub fn new() -> Self {
        GameManager {
            games: Arc::new(RwLock::new(HashMap::new())),
            code_index: Arc::new(RwLock::new(HashMap::new())),
            broadcasters: Arc::new(RwLock::new(HashMap::new())),
            db: None,
            sweeper: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a game manager backed by SQLite. Loads existing games from the database.
    pub fn with_db(path: &str) -> Result<Self, String> {
        let store = SqliteStore::open(path).map_err(|e| format!("{:?}", e))?;
        let existing_games = store.load_all_games().map_err(|e| format!("{:?}", e))?;
        let mut games_map = HashMap::new();
        let mut codes_map = HashMap::new();
        let mut broadcasters_map = HashMap::new();
        for game in existing_games {
            let id = *game.get_id();
            codes_map.insert(game.code().to_string(), id);
            games_map.insert(id, Arc::new(RwLock::new(game)));
            let (tx, _) = broadcast::channel(64);
            broadcasters_map.insert(id, tx);
        }
        log::info!("Loaded {} game(s) from database", games_map.len());
        Ok(GameManager {
            games: Arc::new(RwLock::new(games_map)),
            code_index: Arc::new(RwLock::new(codes_map)),
            broadcasters: Arc::new(RwLock::new(broadcasters_map)),
            db: Some(Arc::new(store)),
            sweeper: Arc::new(Mutex::new(None)),
        })
    }

    fn persist_insert(&self, game: &Game) {
        if let Some(db) = &self.db {
            if let Err(e) = db.insert_game(game) {
                log::error!("Failed to persist game insert: {:?}", e);
            }
        }
    }

    fn persist_update(&self, game: &Game) {
        if let Some(db) = &self.db {
            if let Err(e) = db.update_game(game) {
                log::error!("Failed to persist game update: {:?}", e);
            }
        }
    }

    fn persist_delete(&self, game_id: Uuid) {
        if let Some(db) = &self.db {
            if let Err(e) = db.delete_game(game_id) {
                log::error!("Failed to persist game delete: {:?}", e);
            }
        }
    }

    fn emit(&self, game_id: Uuid, event: GameEvent) {
        if let Ok(broadcasters) = self.broadcasters.read() {
            if let Some(tx) = broadcasters.get(&game_id) {
                let _ = tx.send(event);
            }
        }
    }

    /// Generate a join code no live or stored game is using.
    fn unique_code(&self) -> Result<String, GameManagerError> {
        let mut rng = rand::thread_rng();
        let codes = self.code_index.read().map_err(|_| GameManagerError::LockError)?;
        loop {
            let code = generate_game_code(&mut rng);
            if codes.contains_key(&code) {
                continue;
            }
            if let Some(db) = &self.db {
                if db.code_exists(&code).unwrap_or(false) {
                    continue;
                }
            }
            return Ok(code);
        }
    }

    /// Create a new game in `Setup` with a fresh collision-checked join code.
    pub fn create_game(
        &self,
        name: String,
        extraction_point: ExtractionPoint,
        duration_mins: u32,
        settings: GameSettings,
    ) -> Result<CreateGameResponse, GameManagerError> {
        let game_id = Uuid::new_v4();
        let code = self.unique_code()?;

        let game = Game::new(game_id, code.clone(), name, extraction_point, duration_mins, settings);
        self.persist_insert(&game);

        let mut games = self.games.write().map_err(|_| GameManagerError::LockError)?;
        games.insert(game_id, Arc::new(RwLock::new(game)));
        drop(games);

        let mut codes = self.code_index.write().map_err(|_| GameManagerError::LockError)?;
        codes.insert(code.clone(), game_id);
        drop(codes);

        let (tx, _) = broadcast::channel(64);
        let mut broadcasters = self.broadcasters.write().map_err(|_| GameManagerError::LockError)?;
        broadcasters.insert(game_id, tx);

        Ok(CreateGameResponse { game_id, code })
    }

    /// Resolve a join code to a game id.
    pub fn find_by_code(&self, code: &str) -> Result<Uuid, GameManagerError> {
        let codes = self.code_index.read().map_err(|_| GameManagerError::LockError)?;
        codes.get(code).copied().ok_or(GameManagerError::GameNotFound)
    }

    fn build_state_response(game: &Game, now_ms: u64) -> GameStateResponse {
        GameStateResponse {
            game_id: *game.get_id(),
            code: game.code().to_string(),
            name: game.name.clone(),
            status: game.status(),
            task_count: game.tasks().len(),
            start_time_ms: game.start_time_ms(),
            end_time_ms: game.end_time_ms(),
            remaining_ms: game.start_time_ms().map(|_| game.remaining_ms(now_ms)),
            players: game
                .players()
                .iter()
                .map(|p| PlayerSummary {
                    player_id: p.id,
                    short_id: uuid_to_short_id(p.id),
                    name: p.name.clone(),
                    role: p.role,
                    status: p.status,
                    tasks_completed: p.stats.tasks_completed,
                })
                .collect(),
            results: game.results().cloned(),
        }
    }

    /// Run a closure against one game under its write lock, persist the new
    /// document and broadcast a state snapshot. The per-game write lock is
    /// what serializes concurrent submissions: validate-and-append happens
    /// in one critical section.
    fn with_game_mut<T>(
        &self,
        game_id: Uuid,
        f: impl FnOnce(&mut Game) -> Result<T, GameError>,
    ) -> Result<T, GameManagerError> {
        let games = self.games.read().map_err(|_| GameManagerError::LockError)?;
        let game_lock = games.get(&game_id).ok_or(GameManagerError::GameNotFound)?;
        let mut game = game_lock.write().map_err(|_| GameManagerError::LockError)?;

        let result = f(&mut game)?;
        self.persist_update(&game);

        let state_response = Self::build_state_response(&game, epoch_ms_now());
        drop(game);
        drop(games);

        self.emit(game_id, GameEvent::StateChanged(state_response));
        Ok(result)
    }

    fn with_game<T>(
        &self,
        game_id: Uuid,
        f: impl FnOnce(&Game) -> Result<T, GameError>,
    ) -> Result<T, GameManagerError> {
        let games = self.games.read().map_err(|_| GameManagerError::LockError)?;
        let game_lock = games.get(&game_id).ok_or(GameManagerError::GameNotFound)?;
        let game = game_lock.read().map_err(|_| GameManagerError::LockError)?;
        Ok(f(&game)?)
    }

    /// Get the state of a game
    pub fn get_game_state(&self, game_id: Uuid) -> Result<GameStateResponse, GameManagerError> {
        self.with_game(game_id, |game| Ok(Self::build_state_response(game, epoch_ms_now())))
    }

    /// Replace a game's task list (exactly six).
    pub fn attach_tasks(&self, game_id: Uuid, specs: Vec<TaskSpec>) -> Result<(), GameManagerError> {
        self.with_game_mut(game_id, |game| game.attach_tasks(specs))
    }

    /// Join a game as a new player.
    pub fn join_game(&self, game_id: Uuid, name: String, role: Role) -> Result<Uuid, GameManagerError> {
        let player_id = self.with_game_mut(game_id, |game| game.join(name, role, epoch_ms_now()))?;
        self.emit(game_id, GameEvent::PlayerStatusChanged {
            game_id,
            player_id,
            status: PlayerStatus::Waiting,
        });
        Ok(player_id)
    }

    /// Add a predefined slot to a game.
    pub fn add_slot(
        &self,
        game_id: Uuid,
        name: String,
        role: Role,
        team: Option<String>,
        password: String,
    ) -> Result<(), GameManagerError> {
        self.with_game_mut(game_id, |game| game.add_slot(name, role, team, password))
    }

    /// Claim (or rejoin) a predefined slot.
    pub fn claim_slot(&self, game_id: Uuid, name: &str, password: &str) -> Result<Uuid, GameManagerError> {
        self.with_game_mut(game_id, |game| game.claim_slot(name, password, epoch_ms_now()))
    }

    /// Drive a game's lifecycle (open/start/pause/resume/end/cancel).
    pub fn transition(
        &self,
        game_id: Uuid,
        transition: LifecycleTransition,
    ) -> Result<TransitionSuccess, GameManagerError> {
        self.transition_at(game_id, transition, epoch_ms_now())
    }

    fn transition_at(
        &self,
        game_id: Uuid,
        transition: LifecycleTransition,
        now_ms: u64,
    ) -> Result<TransitionSuccess, GameManagerError> {
        let result = self.with_game_mut(game_id, |game| game.apply(transition, now_ms))?;
        if result == TransitionSuccess::Ended {
            let (winner, reason) = self.with_game(game_id, |game| {
                let results = game.results().ok_or(GameError::NotFound)?;
                Ok((results.winner, results.end_reason))
            })?;
            self.emit(game_id, GameEvent::GameEnded { game_id, winner, reason });
        }
        Ok(result)
    }

    /// Submit a task answer for a fugitive.
    pub fn submit_answer(
        &self,
        game_id: Uuid,
        player_id: Uuid,
        ordinal: u8,
        raw_answer: &str,
        location: Option<Point>,
    ) -> Result<AnswerOutcome, GameManagerError> {
        let outcome = self.with_game_mut(game_id, |game| {
            game.submit_answer(player_id, ordinal, raw_answer, location, epoch_ms_now())
        })?;
        if outcome.correct {
            self.emit(game_id, GameEvent::TaskCompleted {
                game_id,
                player_id,
                task_number: ordinal,
                tasks_completed: outcome.tasks_completed,
            });
        }
        Ok(outcome)
    }

    /// Record a location fix for a player.
    pub fn update_location(
        &self,
        game_id: Uuid,
        player_id: Uuid,
        lat: f64,
        lon: f64,
        accuracy_m: Option<f64>,
    ) -> Result<LocationOutcome, GameManagerError> {
        let outcome = self.with_game_mut(game_id, |game| {
            game.update_location(player_id, lat, lon, accuracy_m, epoch_ms_now())
        })?;
        if outcome.escaped {
            self.emit(game_id, GameEvent::PlayerEscaped { game_id, player_id });
            self.emit(game_id, GameEvent::PlayerStatusChanged {
                game_id,
                player_id,
                status: PlayerStatus::Escaped,
            });
        }
        Ok(outcome)
    }

    /// Hunter capture of a fugitive.
    pub fn mark_caught(
        &self,
        game_id: Uuid,
        player_id: Uuid,
        location: Option<Point>,
    ) -> Result<(), GameManagerError> {
        self.with_game_mut(game_id, |game| game.mark_caught(player_id, location, epoch_ms_now()))?;
        self.emit(game_id, GameEvent::PlayerStatusChanged {
            game_id,
            player_id,
            status: PlayerStatus::Caught,
        });
        Ok(())
    }

    /// List all games
    pub fn list_games(&self) -> Result<Vec<Uuid>, GameManagerError> {
        let games = self.games.read().map_err(|_| GameManagerError::LockError)?;
        Ok(games.keys().copied().collect())
    }

    /// Hard-delete a game and its players. Refused while the game is active.
    pub fn remove_game(&self, game_id: Uuid) -> Result<(), GameManagerError> {
        let code = {
            let games = self.games.read().map_err(|_| GameManagerError::LockError)?;
            let game_lock = games.get(&game_id).ok_or(GameManagerError::GameNotFound)?;
            let game = game_lock.read().map_err(|_| GameManagerError::LockError)?;
            if game.status() == GameStatus::Active {
                return Err(GameManagerError::Game(GameError::GameAlreadyActive));
            }
            game.code().to_string()
        };

        let mut games = self.games.write().map_err(|_| GameManagerError::LockError)?;
        games.remove(&game_id).ok_or(GameManagerError::GameNotFound)?;
        drop(games);

        if let Ok(mut codes) = self.code_index.write() {
            codes.remove(&code);
        }

        self.persist_delete(game_id);

        if let Ok(mut broadcasters) = self.broadcasters.write() {
            broadcasters.remove(&game_id);
        }

        Ok(())
    }

    /// Subscribe to game state change events
    pub fn subscribe(&self, game_id: Uuid) -> Result<broadcast::Receiver<GameEvent>, GameManagerError> {
        let broadcasters = self.broadcasters.read().map_err(|_| GameManagerError::LockError)?;
        let tx = broadcasters.get(&game_id).ok_or(GameManagerError::GameNotFound)?;
        Ok(tx.subscribe())
    }

    // ---- expiration sweep -------------------------------------------------

    /// End every active game whose configured duration has elapsed at
    /// `now_ms`. Returns the number of games ended. A failure on one game is
    /// logged and does not stop the sweep; a second sweep over the same
    /// games is a no-op because `End` requires an active or paused game.
    pub fn sweep_expired(&self, now_ms: u64) -> usize {
        let expired: Vec<Uuid> = {
            let games = match self.games.read() {
                Ok(g) => g,
                Err(_) => return 0,
            };
            games
                .iter()
                .filter_map(|(&id, lock)| {
                    let game = lock.read().ok()?;
                    (game.status() == GameStatus::Active && game.is_expired(now_ms)).then_some(id)
                })
                .collect()
        };

        let mut ended = 0;
        for game_id in expired {
            match self.transition_at(
                game_id,
                LifecycleTransition::End { reason: EndReason::TimeExpired },
                now_ms,
            ) {
                Ok(_) => ended += 1,
                // Lost the race against a manual end or another sweep.
                Err(GameManagerError::Game(GameError::InvalidGameStatus)) => {}
                Err(e) => {
                    log::warn!("Expiration sweep failed for game {}: {:?}", game_id, e);
                }
            }
        }
        if ended > 0 {
            log::info!("Expiration sweep ended {} game(s)", ended);
        }
        ended
    }

    /// Spawn the periodic expiration sweeper. Owned by this manager; call
    /// [`GameManager::shutdown`] to stop it. Starting twice replaces the
    /// previous schedule.
    pub fn start_sweeper(&self, config: SweeperConfig) {
        let mgr = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(tokio::time::Duration::from_secs(config.interval_secs.max(1)));
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                mgr.sweep_expired(epoch_ms_now());
            }
        });

        let mut sweeper = self.sweeper.lock().expect("sweeper lock poisoned");
        if let Some(old) = sweeper.replace(handle) {
            old.abort();
        }
    }

    /// Stop the expiration sweeper if it is running.
    pub fn shutdown(&self) {
        let mut sweeper = self.sweeper.lock().expect("sweeper lock poisoned");
        if let Some(handle) = sweeper.take() {
            handle.abort();
        }
    }
}

impl Default for GameManager {
    fn default() -> Self {
        Self::new()
    }
}
