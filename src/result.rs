use std::error::Error;
use std::fmt;
use serde::{Serialize, Deserialize};

/// Successful lifecycle transition outcomes, mirroring [`crate::LifecycleTransition`].
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub enum TransitionSuccess {
    Opened,
    Started,
    Paused,
    Resumed,
    Ended,
    Cancelled,
}

/// Recoverable, caller-facing failures of the game progression engine.
/// Store/I-O failures are not represented here; they propagate through the
/// storage layer's own error type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameError {
    /// Referenced game, player or task does not exist.
    NotFound,
    /// Attached task list is not exactly six tasks.
    InvalidTaskCount,
    /// Mutation attempted on a game that has already started.
    GameAlreadyActive,
    /// Operation requires an active, unexpired game.
    GameNotActive,
    /// Operation requires both an active game and an active player.
    InactiveContext,
    /// Player is not in a state that allows task progression.
    PlayerNotActive,
    /// Operation restricted to fugitives.
    InvalidRole,
    /// Task submitted out of order.
    SequentialCompletionRequired,
    /// Task was already completed by this player.
    TaskAlreadyCompleted,
    /// Lifecycle transition attempted from an illegal source state.
    InvalidGameStatus,
    /// Game start attempted with zero joined players.
    NoPlayers,
    /// Game start attempted without all six tasks attached.
    IncompleteTasks,
    /// Join attempted on a game at its player limit.
    GameFull,
    /// Player or slot name already taken within the game.
    DuplicateName,
    /// Wrong password for a predefined player slot.
    InvalidSlotPassword,
    /// Edit or delete attempted on a slot that was already claimed.
    SlotAlreadyJoined,
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            GameError::NotFound => {
                write!(f, "Error: Referenced game, player or task does not exist.")},
            GameError::InvalidTaskCount => {
                write!(f, "Error: A game requires exactly six tasks.")},
            GameError::GameAlreadyActive => {
                write!(f, "Error: Attempted to modify a game that has already started.")},
            GameError::GameNotActive => {
                write!(f, "Error: Attempted an operation that requires an active game.")},
            GameError::InactiveContext => {
                write!(f, "Error: Both the game and the player must be active.")},
            GameError::PlayerNotActive => {
                write!(f, "Error: Player is not active in this game.")},
            GameError::InvalidRole => {
                write!(f, "Error: Only fugitives can perform this operation.")},
            GameError::SequentialCompletionRequired => {
                write!(f, "Error: Tasks must be completed in order.")},
            GameError::TaskAlreadyCompleted => {
                write!(f, "Error: Task was already completed.")},
            GameError::InvalidGameStatus => {
                write!(f, "Error: Lifecycle transition not allowed from the current status.")},
            GameError::NoPlayers => {
                write!(f, "Error: Attempted to start a game with no joined players.")},
            GameError::IncompleteTasks => {
                write!(f, "Error: Attempted to start a game without all six tasks attached.")},
            GameError::GameFull => {
                write!(f, "Error: Game has reached its maximum player count.")},
            GameError::DuplicateName => {
                write!(f, "Error: Name is already taken in this game.")},
            GameError::InvalidSlotPassword => {
                write!(f, "Error: Wrong password for this player slot.")},
            GameError::SlotAlreadyJoined => {
                write!(f, "Error: Slot was already claimed and cannot be changed.")},
        }
    }
}

impl Error for GameError {}
