use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Point;

/// Number of tasks every game carries. Enforced when tasks are attached.
pub const TASKS_PER_GAME: usize = 6;

/// Where a task physically takes place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskLocation {
    pub point: Point,
    pub address: Option<String>,
}

/// Ledger entry: a player completed this task at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCompletion {
    pub player_id: Uuid,
    pub at_ms: u64,
}

/// One of the six tasks owned by a game. Not independently addressable;
/// always reached through its game by ordinal number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// 1-based ordinal, contiguous 1..=6 within a game.
    pub number: u8,
    pub question: String,
    /// Stored normalized (trimmed, lowercased).
    pub answer: String,
    pub location: TaskLocation,
    /// Opaque scannable-code artifact from the external renderer.
    pub code: Option<String>,
    pub completions: Vec<TaskCompletion>,
}

/// Caller-supplied task definition, before normalization and numbering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub question: String,
    pub answer: String,
    pub location: TaskLocation,
    #[serde(default)]
    pub code: Option<String>,
}

impl Task {
    pub fn from_spec(number: u8, spec: TaskSpec) -> Task {
        Task {
            number,
            question: spec.question,
            answer: normalize_answer(&spec.answer),
            location: spec.location,
            code: spec.code,
            completions: Vec::new(),
        }
    }

    /// Case-insensitive, whitespace-trimmed answer comparison.
    pub fn matches_answer(&self, raw: &str) -> bool {
        normalize_answer(raw) == self.answer
    }

    /// Pure ledger append. Sequencing and correctness are validated by the
    /// progress layer before this is called.
    pub fn record_completion(&mut self, player_id: Uuid, at_ms: u64) {
        self.completions.push(TaskCompletion { player_id, at_ms });
    }
}

pub fn normalize_answer(raw: &str) -> String {
    raw.trim().to_lowercase()
}
