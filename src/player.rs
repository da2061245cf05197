use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game_state::{PlayerStatus, Role};
use crate::geo::{distance_meters, Point};

/// Oldest location points are evicted once the history reaches this length.
pub const LOCATION_HISTORY_CAP: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerLocation {
    pub point: Point,
    pub accuracy_m: Option<f64>,
    pub updated_at_ms: u64,
}

/// A task a player has completed, in completion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedTask {
    pub task_number: u8,
    pub at_ms: u64,
    pub location: Option<Point>,
}

/// Capture record for a fugitive marked caught by a hunter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    pub at_ms: u64,
    pub location: Option<Point>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub tasks_completed: u32,
    pub distance_traveled_m: f64,
    pub time_active_ms: u64,
}

/// A participant in exactly one game. Created on join or claimed from a
/// predefined slot; identity is never reused across games.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub status: PlayerStatus,
    pub team: Option<String>,
    pub current_location: Option<PlayerLocation>,
    pub location_history: Vec<PlayerLocation>,
    pub completed_tasks: Vec<CompletedTask>,
    pub capture: Option<Capture>,
    pub stats: PlayerStats,
    pub joined_at_ms: u64,
    pub activated_at_ms: Option<u64>,
}

impl Player {
    pub fn new(name: String, role: Role, joined_at_ms: u64) -> Player {
        Player {
            id: Uuid::new_v4(),
            name,
            role,
            status: PlayerStatus::Waiting,
            team: None,
            current_location: None,
            location_history: Vec::new(),
            completed_tasks: Vec::new(),
            capture: None,
            stats: PlayerStats::default(),
            joined_at_ms,
            activated_at_ms: None,
        }
    }

    pub fn activate(&mut self, now_ms: u64) {
        self.status = PlayerStatus::Active;
        if self.activated_at_ms.is_none() {
            self.activated_at_ms = Some(now_ms);
        }
    }

    /// Append a location fix, updating the current position, the bounded
    /// history and the traveled-distance rollup.
    pub fn record_location(&mut self, point: Point, accuracy_m: Option<f64>, now_ms: u64) {
        if let Some(prev) = &self.current_location {
            self.stats.distance_traveled_m += distance_meters(prev.point, point);
        }
        let fix = PlayerLocation { point, accuracy_m, updated_at_ms: now_ms };
        self.current_location = Some(fix.clone());
        if self.location_history.len() >= LOCATION_HISTORY_CAP {
            self.location_history.remove(0);
        }
        self.location_history.push(fix);
    }

    pub fn record_task_completion(&mut self, task_number: u8, location: Option<Point>, now_ms: u64) {
        self.completed_tasks.push(CompletedTask { task_number, at_ms: now_ms, location });
        self.stats.tasks_completed = self.completed_tasks.len() as u32;
    }

    /// Freeze the time-active rollup when the player leaves `Active`.
    pub fn settle_time_active(&mut self, now_ms: u64) {
        if let Some(activated) = self.activated_at_ms {
            self.stats.time_active_ms = now_ms.saturating_sub(activated);
        }
    }

    pub fn tasks_completed(&self) -> usize {
        self.completed_tasks.len()
    }

    pub fn current_point(&self) -> Option<&Point> {
        self.current_location.as_ref().map(|l| &l.point)
    }
}
