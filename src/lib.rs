//! This crate provides the game progression engine for Klopjacht, a
//! location-based outdoor chase game: fugitives complete six tasks in strict
//! order by scanning codes in the field, then race to an extraction point
//! before hunters catch them or the clock runs out.
//! ## Example usage
//! ```
//! use klopjacht::{Game, GameSettings, ExtractionPoint, LifecycleTransition,
//!                 TaskSpec, TaskLocation, EndReason, GameStatus, Role};
//! use klopjacht::geo::Point;
//!
//! let extraction = ExtractionPoint {
//!     point: Point::new(52.37, 4.90),
//!     address: None,
//!     radius_m: 50.0,
//! };
//! let mut g = Game::new(
//!     uuid::Uuid::new_v4(),
//!     "KLPJ42".to_string(),
//!     "City Chase".to_string(),
//!     extraction,
//!     60,
//!     GameSettings::default(),
//! );
//!
//! let specs: Vec<TaskSpec> = (1..=6)
//!     .map(|n| TaskSpec {
//!         question: format!("Question {}", n),
//!         answer: format!("Answer {}", n),
//!         location: TaskLocation { point: Point::new(52.37, 4.90), address: None },
//!         code: None,
//!     })
//!     .collect();
//! g.attach_tasks(specs).unwrap();
//!
//! let fugitive = g.join("Renske".to_string(), Role::Fugitive, 0).unwrap();
//! g.apply(LifecycleTransition::Start, 1_000).unwrap();
//! assert_eq!(g.status(), GameStatus::Active);
//!
//! for n in 1..=6 {
//!     let outcome = g
//!         .submit_answer(fugitive, n, &format!("  answer {} ", n), None, 2_000)
//!         .unwrap();
//!     assert!(outcome.correct);
//! }
//!
//! // Within 50m of the extraction point with all tasks done: escaped.
//! let outcome = g.update_location(fugitive, 52.37, 4.90, None, 3_000).unwrap();
//! assert!(outcome.escaped);
//!
//! g.apply(LifecycleTransition::End { reason: EndReason::Manual }, 4_000).unwrap();
//! assert_eq!(g.status(), GameStatus::Completed);
//! ```

pub mod codes;
pub mod geo;
mod game_state;
mod player;
mod result;
mod tasks;

#[cfg(feature = "server")]
pub mod game_manager;
#[cfg(feature = "server")]
pub mod sqlite_store;
#[cfg(feature = "server")]
pub mod validation;
#[cfg(feature = "server")]
pub mod api;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use game_state::*;
pub use player::*;
pub use result::*;
pub use tasks::*;

use geo::{is_within_radius, Point};

pub const DEFAULT_EXTRACTION_RADIUS_M: f64 = 50.0;
pub const MIN_DURATION_MINS: u32 = 30;
pub const MAX_DURATION_MINS: u32 = 480;

/// The configured escape location: reach it with all six tasks done and you
/// are out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionPoint {
    pub point: Point,
    pub address: Option<String>,
    pub radius_m: f64,
}

/// Per-game tunables, passed in explicitly at creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GameSettings {
    pub max_players: u32,
    pub location_update_interval_secs: u32,
    pub warning_threshold_mins: u32,
}

impl Default for GameSettings {
    fn default() -> GameSettings {
        GameSettings {
            max_players: 20,
            location_update_interval_secs: 30,
            warning_threshold_mins: 10,
        }
    }
}

/// An admin-defined seat a player claims with a password at join time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredefinedSlot {
    pub name: String,
    pub role: Role,
    pub team: Option<String>,
    pub password: String,
    pub joined: bool,
    pub player_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaughtRecord {
    pub player_id: Uuid,
    pub name: String,
    pub at_ms: Option<u64>,
    pub location: Option<Point>,
}

/// Final outcome snapshot, taken once when the game completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameResults {
    pub winner: Winner,
    pub end_reason: EndReason,
    pub escaped: Vec<Uuid>,
    pub caught: Vec<CaughtRecord>,
    pub tasks_completed_total: u32,
    pub ended_at_ms: u64,
}

/// The primary way to drive a game through its lifecycle. Used as an
/// argument to [Game::apply](struct.Game.html#method.apply).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleTransition {
    /// Setup -> Waiting: the lobby opens for joins.
    Open,
    Start,
    Pause,
    Resume,
    End { reason: EndReason },
    Cancel,
}

/// What a fugitive should do next after a correct answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NextStep {
    Task { number: u8, location: TaskLocation },
    Extraction { point: ExtractionPoint, remaining_ms: u64 },
}

/// Result of an answer submission. A wrong answer is a normal outcome, not
/// an error: `correct` is false and nothing was mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub tasks_completed: u32,
    pub next_step: Option<NextStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationOutcome {
    /// True when this fix put a finished fugitive inside the extraction
    /// radius and they escaped.
    pub escaped: bool,
    pub tasks_completed: u32,
}

/// Primary game state. Owns the task ledger, the players and the lifecycle
/// clock. All "now" inputs are explicit epoch-millisecond timestamps so the
/// engine stays deterministic under test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    id: Uuid,
    code: String,
    pub name: String,
    pub description: Option<String>,
    status: GameStatus,
    extraction_point: ExtractionPoint,
    duration_mins: u32,
    settings: GameSettings,
    start_time_ms: Option<u64>,
    end_time_ms: Option<u64>,
    paused_at_ms: Option<u64>,
    resumed_at_ms: Option<u64>,
    total_paused_ms: u64,
    tasks: Vec<Task>,
    players: Vec<Player>,
    slots: Vec<PredefinedSlot>,
    results: Option<GameResults>,
}

impl Game {
    /// Duration is clamped to the allowed 30..=480 minute range.
    pub fn new(
        id: Uuid,
        code: String,
        name: String,
        extraction_point: ExtractionPoint,
        duration_mins: u32,
        settings: GameSettings,
    ) -> Game {
        Game {
            id,
            code,
            name,
            description: None,
            status: GameStatus::Setup,
            extraction_point,
            duration_mins: duration_mins.clamp(MIN_DURATION_MINS, MAX_DURATION_MINS),
            settings,
            start_time_ms: None,
            end_time_ms: None,
            paused_at_ms: None,
            resumed_at_ms: None,
            total_paused_ms: 0,
            tasks: Vec::new(),
            players: Vec::new(),
            slots: Vec::new(),
            results: None,
        }
    }

    pub fn get_id(&self) -> &Uuid {
        &self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// See [`GameStatus`](enum.GameStatus.html)
    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn extraction_point(&self) -> &ExtractionPoint {
        &self.extraction_point
    }

    pub fn duration_mins(&self) -> u32 {
        self.duration_mins
    }

    pub fn start_time_ms(&self) -> Option<u64> {
        self.start_time_ms
    }

    pub fn end_time_ms(&self) -> Option<u64> {
        self.end_time_ms
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn slots(&self) -> &[PredefinedSlot] {
        &self.slots
    }

    pub fn results(&self) -> Option<&GameResults> {
        self.results.as_ref()
    }

    pub fn player(&self, player_id: Uuid) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    fn player_mut(&mut self, player_id: Uuid) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    /// Task by 1-based ordinal number.
    pub fn task(&self, ordinal: u8) -> Option<&Task> {
        self.tasks.iter().find(|t| t.number == ordinal)
    }

    /// The task a player has to do next, or `None` once all six are done.
    pub fn next_task_for(&self, player_id: Uuid) -> Result<Option<&Task>, GameError> {
        let player = self.player(player_id).ok_or(GameError::NotFound)?;
        let next = player.tasks_completed() as u8 + 1;
        Ok(self.task(next))
    }

    // ---- time -------------------------------------------------------------

    /// Game time elapsed at `now_ms`, with accumulated pause time discounted.
    /// While paused, the clock is frozen at the pause timestamp.
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        let Some(start) = self.start_time_ms else {
            return 0;
        };
        let reference = match (self.status, self.paused_at_ms) {
            (GameStatus::Paused, Some(paused_at)) => paused_at,
            _ => now_ms,
        };
        reference.saturating_sub(start).saturating_sub(self.total_paused_ms)
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_mins as u64 * 60_000
    }

    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.duration_ms().saturating_sub(self.elapsed_ms(now_ms))
    }

    /// Whether the configured duration has run out.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.start_time_ms.is_some() && self.elapsed_ms(now_ms) >= self.duration_ms()
    }

    // ---- setup ------------------------------------------------------------

    /// Replace the task list. Exactly six tasks, renumbered 1..=6 in the
    /// order supplied; answers are normalized on write.
    pub fn attach_tasks(&mut self, specs: Vec<TaskSpec>) -> Result<(), GameError> {
        match self.status {
            GameStatus::Setup | GameStatus::Waiting => {}
            GameStatus::Active | GameStatus::Paused => {
                return Err(GameError::GameAlreadyActive);
            }
            GameStatus::Completed | GameStatus::Cancelled => {
                return Err(GameError::InvalidGameStatus);
            }
        }
        if specs.len() != TASKS_PER_GAME {
            return Err(GameError::InvalidTaskCount);
        }
        self.tasks = specs
            .into_iter()
            .enumerate()
            .map(|(i, spec)| Task::from_spec(i as u8 + 1, spec))
            .collect();
        Ok(())
    }

    fn name_taken(&self, name: &str) -> bool {
        self.players.iter().any(|p| p.name == name)
            || self.slots.iter().any(|s| s.name == name && !s.joined)
    }

    /// Join as a fresh player. Allowed in setup, waiting and active games.
    pub fn join(&mut self, name: String, role: Role, now_ms: u64) -> Result<Uuid, GameError> {
        match self.status {
            GameStatus::Setup | GameStatus::Waiting | GameStatus::Active => {}
            _ => return Err(GameError::InvalidGameStatus),
        }
        if self.players.len() as u32 >= self.settings.max_players {
            return Err(GameError::GameFull);
        }
        if self.name_taken(&name) {
            return Err(GameError::DuplicateName);
        }
        let player = Player::new(name, role, now_ms);
        let id = player.id;
        self.players.push(player);
        Ok(id)
    }

    /// Add a predefined slot. Slot names are unique within the game.
    pub fn add_slot(
        &mut self,
        name: String,
        role: Role,
        team: Option<String>,
        password: String,
    ) -> Result<(), GameError> {
        if self.slots.iter().any(|s| s.name == name) {
            return Err(GameError::DuplicateName);
        }
        self.slots.push(PredefinedSlot {
            name,
            role,
            team,
            password,
            joined: false,
            player_id: None,
        });
        Ok(())
    }

    /// Remove an unclaimed slot. A slot that has been joined is immutable.
    pub fn remove_slot(&mut self, name: &str) -> Result<(), GameError> {
        let slot = self
            .slots
            .iter()
            .position(|s| s.name == name)
            .ok_or(GameError::NotFound)?;
        if self.slots[slot].joined {
            return Err(GameError::SlotAlreadyJoined);
        }
        self.slots.remove(slot);
        Ok(())
    }

    /// Claim a predefined slot with its password. Claiming an already-joined
    /// slot with the correct password is a rejoin and returns the existing
    /// player id.
    pub fn claim_slot(&mut self, name: &str, password: &str, now_ms: u64) -> Result<Uuid, GameError> {
        let idx = self
            .slots
            .iter()
            .position(|s| s.name == name)
            .ok_or(GameError::NotFound)?;
        if self.slots[idx].password != password {
            return Err(GameError::InvalidSlotPassword);
        }
        if self.slots[idx].joined {
            return self.slots[idx].player_id.ok_or(GameError::NotFound);
        }
        let slot = &self.slots[idx];
        let mut player = Player::new(slot.name.clone(), slot.role, now_ms);
        player.team = slot.team.clone();
        let id = player.id;
        self.players.push(player);
        let slot = &mut self.slots[idx];
        slot.joined = true;
        slot.player_id = Some(id);
        Ok(id)
    }

    /// Remove a player. Refused while the game is active.
    pub fn remove_player(&mut self, player_id: Uuid) -> Result<(), GameError> {
        if self.status == GameStatus::Active {
            return Err(GameError::GameAlreadyActive);
        }
        let idx = self
            .players
            .iter()
            .position(|p| p.id == player_id)
            .ok_or(GameError::NotFound)?;
        self.players.remove(idx);
        Ok(())
    }

    // ---- lifecycle --------------------------------------------------------

    /// The primary function used to progress the game lifecycle:
    ///
    /// Setup -> Waiting -> Active <-> Paused -> Completed
    ///
    /// with Cancel allowed from any non-terminal state. Terminal states
    /// never transition again.
    pub fn apply(
        &mut self,
        entry: LifecycleTransition,
        now_ms: u64,
    ) -> Result<TransitionSuccess, GameError> {
        match entry {
            LifecycleTransition::Open => {
                if self.status != GameStatus::Setup {
                    return Err(GameError::InvalidGameStatus);
                }
                self.status = GameStatus::Waiting;
                Ok(TransitionSuccess::Opened)
            }
            LifecycleTransition::Start => {
                match self.status {
                    GameStatus::Setup | GameStatus::Waiting => {}
                    _ => return Err(GameError::InvalidGameStatus),
                }
                if self.tasks.len() != TASKS_PER_GAME {
                    return Err(GameError::IncompleteTasks);
                }
                if self.players.is_empty() {
                    return Err(GameError::NoPlayers);
                }
                self.status = GameStatus::Active;
                self.start_time_ms = Some(now_ms);
                self.end_time_ms = Some(now_ms + self.duration_ms());
                for player in &mut self.players {
                    if player.status == PlayerStatus::Waiting {
                        player.activate(now_ms);
                    }
                }
                Ok(TransitionSuccess::Started)
            }
            LifecycleTransition::Pause => {
                if self.status != GameStatus::Active {
                    return Err(GameError::InvalidGameStatus);
                }
                self.status = GameStatus::Paused;
                self.paused_at_ms = Some(now_ms);
                for player in &mut self.players {
                    if player.status == PlayerStatus::Active {
                        player.status = PlayerStatus::Waiting;
                    }
                }
                Ok(TransitionSuccess::Paused)
            }
            LifecycleTransition::Resume => {
                if self.status != GameStatus::Paused {
                    return Err(GameError::InvalidGameStatus);
                }
                self.status = GameStatus::Active;
                self.resumed_at_ms = Some(now_ms);
                if let Some(paused_at) = self.paused_at_ms.take() {
                    self.total_paused_ms += now_ms.saturating_sub(paused_at);
                }
                for player in &mut self.players {
                    if player.status == PlayerStatus::Waiting {
                        player.activate(now_ms);
                    }
                }
                Ok(TransitionSuccess::Resumed)
            }
            LifecycleTransition::End { reason } => {
                match self.status {
                    GameStatus::Active | GameStatus::Paused => {}
                    _ => return Err(GameError::InvalidGameStatus),
                }
                self.finish(reason, now_ms);
                Ok(TransitionSuccess::Ended)
            }
            LifecycleTransition::Cancel => {
                if self.status.is_terminal() {
                    return Err(GameError::InvalidGameStatus);
                }
                self.status = GameStatus::Cancelled;
                for player in &mut self.players {
                    player.settle_time_active(now_ms);
                    player.status = PlayerStatus::Completed;
                }
                Ok(TransitionSuccess::Cancelled)
            }
        }
    }

    /// Snapshot results and settle every player. The winner rule is uniform
    /// across end reasons: any escaped fugitive wins it for the fugitives,
    /// every fugitive caught wins it for the hunters, anything else is a
    /// draw.
    fn finish(&mut self, reason: EndReason, now_ms: u64) {
        let fugitives: Vec<&Player> = self
            .players
            .iter()
            .filter(|p| p.role == Role::Fugitive)
            .collect();

        let any_escaped = fugitives.iter().any(|p| p.status == PlayerStatus::Escaped);
        let all_caught = !fugitives.is_empty()
            && fugitives.iter().all(|p| p.status == PlayerStatus::Caught);

        let winner = if any_escaped {
            Winner::Fugitives
        } else if all_caught {
            Winner::Hunters
        } else {
            Winner::None
        };

        let escaped = fugitives
            .iter()
            .filter(|p| p.status == PlayerStatus::Escaped)
            .map(|p| p.id)
            .collect();
        let caught = fugitives
            .iter()
            .filter(|p| p.status == PlayerStatus::Caught)
            .map(|p| CaughtRecord {
                player_id: p.id,
                name: p.name.clone(),
                at_ms: p.capture.as_ref().map(|c| c.at_ms),
                location: p.capture.as_ref().and_then(|c| c.location),
            })
            .collect();
        let tasks_completed_total = fugitives
            .iter()
            .map(|p| p.tasks_completed() as u32)
            .sum();

        self.results = Some(GameResults {
            winner,
            end_reason: reason,
            escaped,
            caught,
            tasks_completed_total,
            ended_at_ms: now_ms,
        });
        self.status = GameStatus::Completed;
        self.end_time_ms = Some(now_ms);
        for player in &mut self.players {
            player.settle_time_active(now_ms);
            player.status = PlayerStatus::Completed;
        }
    }

    // ---- progression ------------------------------------------------------

    /// Submit an answer for the task with the given ordinal. See
    /// [`AnswerOutcome`]: an incorrect answer is a normal result, every
    /// guard failure is a [`GameError`].
    pub fn submit_answer(
        &mut self,
        player_id: Uuid,
        ordinal: u8,
        raw_answer: &str,
        location: Option<Point>,
        now_ms: u64,
    ) -> Result<AnswerOutcome, GameError> {
        if self.status != GameStatus::Active || self.is_expired(now_ms) {
            return Err(GameError::GameNotActive);
        }
        let player = self.player(player_id).ok_or(GameError::NotFound)?;
        if player.role != Role::Fugitive {
            return Err(GameError::InvalidRole);
        }
        match player.status {
            PlayerStatus::Active | PlayerStatus::Waiting => {}
            _ => return Err(GameError::PlayerNotActive),
        }

        let completed = player.tasks_completed() as u8;
        if ordinal != completed + 1 {
            if ordinal >= 1 && ordinal <= completed {
                return Err(GameError::TaskAlreadyCompleted);
            }
            return Err(GameError::SequentialCompletionRequired);
        }

        let task = self.task(ordinal).ok_or(GameError::NotFound)?;
        if !task.matches_answer(raw_answer) {
            return Ok(AnswerOutcome {
                correct: false,
                tasks_completed: completed as u32,
                next_step: None,
            });
        }

        // Correct: append to the ledger and the player inside the same
        // critical section the caller serialized us into.
        let task_idx = self
            .tasks
            .iter()
            .position(|t| t.number == ordinal)
            .ok_or(GameError::NotFound)?;
        self.tasks[task_idx].record_completion(player_id, now_ms);

        let remaining = self.remaining_ms(now_ms);
        let next_location = self.task(ordinal + 1).map(|t| (t.number, t.location.clone()));
        let extraction = self.extraction_point.clone();

        let player = self.player_mut(player_id).ok_or(GameError::NotFound)?;
        if player.status == PlayerStatus::Waiting {
            player.activate(now_ms);
        }
        player.record_task_completion(ordinal, location, now_ms);
        if let Some(point) = location {
            player.record_location(point, None, now_ms);
        }
        let tasks_completed = player.stats.tasks_completed;

        let next_step = match next_location {
            Some((number, location)) => Some(NextStep::Task { number, location }),
            None => Some(NextStep::Extraction {
                point: extraction,
                remaining_ms: remaining,
            }),
        };

        Ok(AnswerOutcome {
            correct: true,
            tasks_completed,
            next_step,
        })
    }

    /// Record a location fix. A fugitive who has finished all six tasks and
    /// is inside the extraction radius escapes on the spot.
    pub fn update_location(
        &mut self,
        player_id: Uuid,
        lat: f64,
        lon: f64,
        accuracy_m: Option<f64>,
        now_ms: u64,
    ) -> Result<LocationOutcome, GameError> {
        if self.status != GameStatus::Active {
            return Err(GameError::InactiveContext);
        }
        let extraction = self.extraction_point.clone();
        let player = self.player_mut(player_id).ok_or(GameError::NotFound)?;
        if player.status != PlayerStatus::Active {
            return Err(GameError::InactiveContext);
        }

        let point = Point::new(lat, lon);
        player.record_location(point, accuracy_m, now_ms);

        let mut escaped = false;
        if player.role == Role::Fugitive
            && player.tasks_completed() == TASKS_PER_GAME
            && is_within_radius(Some(&point), &extraction.point, extraction.radius_m)
        {
            player.status = PlayerStatus::Escaped;
            player.settle_time_active(now_ms);
            escaped = true;
        }

        Ok(LocationOutcome {
            escaped,
            tasks_completed: player.stats.tasks_completed,
        })
    }

    /// Hunter-initiated capture of a fugitive.
    pub fn mark_caught(
        &mut self,
        player_id: Uuid,
        location: Option<Point>,
        now_ms: u64,
    ) -> Result<(), GameError> {
        if self.status != GameStatus::Active {
            return Err(GameError::GameNotActive);
        }
        let player = self.player_mut(player_id).ok_or(GameError::NotFound)?;
        if player.role != Role::Fugitive {
            return Err(GameError::InvalidRole);
        }
        match player.status {
            PlayerStatus::Active | PlayerStatus::Waiting => {}
            _ => return Err(GameError::PlayerNotActive),
        }
        let at_location = location.or_else(|| player.current_point().copied());
        player.status = PlayerStatus::Caught;
        player.capture = Some(Capture { at_ms: now_ms, location: at_location });
        player.settle_time_active(now_ms);
        Ok(())
    }

    /// Mark a player disconnected (transport-level signal from the caller).
    pub fn mark_disconnected(&mut self, player_id: Uuid, now_ms: u64) -> Result<(), GameError> {
        let player = self.player_mut(player_id).ok_or(GameError::NotFound)?;
        if player.status == PlayerStatus::Active || player.status == PlayerStatus::Waiting {
            player.settle_time_active(now_ms);
            player.status = PlayerStatus::Disconnected;
        }
        Ok(())
    }
}
