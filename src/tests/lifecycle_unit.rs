use crate::geo::Point;
use crate::{
    EndReason, ExtractionPoint, Game, GameError, GameSettings, GameStatus, LifecycleTransition,
    PlayerStatus, Role, TaskLocation, TaskSpec, TransitionSuccess, Winner,
    MAX_DURATION_MINS, MIN_DURATION_MINS,
};

fn extraction() -> ExtractionPoint {
    ExtractionPoint {
        point: Point::new(52.37, 4.90),
        address: Some("Centraal Station".to_string()),
        radius_m: 50.0,
    }
}

fn make_game(duration_mins: u32) -> Game {
    Game::new(
        uuid::Uuid::new_v4(),
        "KLPJ42".to_string(),
        "City Chase".to_string(),
        extraction(),
        duration_mins,
        GameSettings::default(),
    )
}

fn task_specs(count: usize) -> Vec<TaskSpec> {
    (1..=count)
        .map(|n| TaskSpec {
            question: format!("Question {}", n),
            answer: format!("Answer {}", n),
            location: TaskLocation { point: Point::new(52.37, 4.90), address: None },
            code: None,
        })
        .collect()
}

/// Game in `Waiting` with six tasks and one joined fugitive.
fn ready_game() -> (Game, uuid::Uuid) {
    let mut g = make_game(60);
    g.attach_tasks(task_specs(6)).unwrap();
    g.apply(LifecycleTransition::Open, 0).unwrap();
    let fugitive = g.join("Renske".to_string(), Role::Fugitive, 0).unwrap();
    (g, fugitive)
}

#[test]
fn new_game_starts_in_setup() {
    let g = make_game(60);
    assert_eq!(g.status(), GameStatus::Setup);
    assert!(g.start_time_ms().is_none());
    assert!(g.results().is_none());
}

#[test]
fn duration_is_clamped_to_allowed_range() {
    assert_eq!(make_game(5).duration_mins(), MIN_DURATION_MINS);
    assert_eq!(make_game(1000).duration_mins(), MAX_DURATION_MINS);
    assert_eq!(make_game(90).duration_mins(), 90);
}

#[test]
fn attach_rejects_wrong_task_count() {
    let mut g = make_game(60);
    assert_eq!(g.attach_tasks(task_specs(5)), Err(GameError::InvalidTaskCount));
    assert_eq!(g.attach_tasks(task_specs(7)), Err(GameError::InvalidTaskCount));
    assert_eq!(g.attach_tasks(task_specs(6)), Ok(()));
    assert_eq!(g.tasks().len(), 6);
}

#[test]
fn attach_renumbers_tasks_contiguously() {
    let mut g = make_game(60);
    g.attach_tasks(task_specs(6)).unwrap();
    let numbers: Vec<u8> = g.tasks().iter().map(|t| t.number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn attach_rejected_once_active() {
    let (mut g, _) = ready_game();
    g.apply(LifecycleTransition::Start, 1_000).unwrap();
    assert_eq!(g.attach_tasks(task_specs(6)), Err(GameError::GameAlreadyActive));
}

#[test]
fn start_requires_six_tasks() {
    let mut g = make_game(60);
    g.join("Renske".to_string(), Role::Fugitive, 0).unwrap();
    assert_eq!(
        g.apply(LifecycleTransition::Start, 0),
        Err(GameError::IncompleteTasks)
    );
    assert_eq!(g.status(), GameStatus::Setup);
}

#[test]
fn start_requires_a_joined_player() {
    let mut g = make_game(60);
    g.attach_tasks(task_specs(6)).unwrap();
    assert_eq!(g.apply(LifecycleTransition::Start, 0), Err(GameError::NoPlayers));
    assert_eq!(g.status(), GameStatus::Setup);
}

#[test]
fn start_sets_clock_and_promotes_players() {
    let (mut g, fugitive) = ready_game();
    assert_eq!(
        g.apply(LifecycleTransition::Start, 10_000),
        Ok(TransitionSuccess::Started)
    );
    assert_eq!(g.status(), GameStatus::Active);
    assert_eq!(g.start_time_ms(), Some(10_000));
    assert_eq!(g.end_time_ms(), Some(10_000 + 60 * 60_000));
    assert_eq!(g.player(fugitive).unwrap().status, PlayerStatus::Active);
}

#[test]
fn start_from_setup_without_open_is_allowed() {
    let mut g = make_game(60);
    g.attach_tasks(task_specs(6)).unwrap();
    g.join("Renske".to_string(), Role::Fugitive, 0).unwrap();
    assert!(g.apply(LifecycleTransition::Start, 0).is_ok());
}

#[test]
fn open_only_from_setup() {
    let (mut g, _) = ready_game();
    assert_eq!(g.apply(LifecycleTransition::Open, 0), Err(GameError::InvalidGameStatus));
}

#[test]
fn pause_and_resume_toggle_player_status() {
    let (mut g, fugitive) = ready_game();
    g.apply(LifecycleTransition::Start, 0).unwrap();

    g.apply(LifecycleTransition::Pause, 10_000).unwrap();
    assert_eq!(g.status(), GameStatus::Paused);
    assert_eq!(g.player(fugitive).unwrap().status, PlayerStatus::Waiting);

    g.apply(LifecycleTransition::Resume, 20_000).unwrap();
    assert_eq!(g.status(), GameStatus::Active);
    assert_eq!(g.player(fugitive).unwrap().status, PlayerStatus::Active);
}

#[test]
fn paused_time_is_discounted_from_the_clock() {
    let (mut g, _) = ready_game();
    g.apply(LifecycleTransition::Start, 0).unwrap();

    g.apply(LifecycleTransition::Pause, 10 * 60_000).unwrap();
    // Clock frozen while paused
    assert_eq!(g.elapsed_ms(25 * 60_000), 10 * 60_000);

    g.apply(LifecycleTransition::Resume, 30 * 60_000).unwrap();
    // 40 minutes wall time, 20 of them paused
    assert_eq!(g.elapsed_ms(40 * 60_000), 20 * 60_000);
    assert_eq!(g.remaining_ms(40 * 60_000), 40 * 60_000);
    assert!(!g.is_expired(40 * 60_000));
    // Expiry shifts out by the paused duration
    assert!(!g.is_expired(60 * 60_000));
    assert!(g.is_expired(80 * 60_000));
}

#[test]
fn pause_only_from_active_resume_only_from_paused() {
    let (mut g, _) = ready_game();
    assert_eq!(g.apply(LifecycleTransition::Pause, 0), Err(GameError::InvalidGameStatus));
    g.apply(LifecycleTransition::Start, 0).unwrap();
    assert_eq!(g.apply(LifecycleTransition::Resume, 0), Err(GameError::InvalidGameStatus));
}

#[test]
fn end_from_active_and_from_paused() {
    let (mut g, _) = ready_game();
    g.apply(LifecycleTransition::Start, 0).unwrap();
    g.apply(LifecycleTransition::Pause, 1_000).unwrap();
    assert_eq!(
        g.apply(LifecycleTransition::End { reason: EndReason::Manual }, 2_000),
        Ok(TransitionSuccess::Ended)
    );
    assert_eq!(g.status(), GameStatus::Completed);
}

#[test]
fn end_refused_before_start() {
    let (mut g, _) = ready_game();
    assert_eq!(
        g.apply(LifecycleTransition::End { reason: EndReason::Manual }, 0),
        Err(GameError::InvalidGameStatus)
    );
}

#[test]
fn terminal_states_never_transition_again() {
    let (mut g, _) = ready_game();
    g.apply(LifecycleTransition::Start, 0).unwrap();
    g.apply(LifecycleTransition::End { reason: EndReason::Manual }, 1_000).unwrap();

    for entry in [
        LifecycleTransition::Open,
        LifecycleTransition::Start,
        LifecycleTransition::Pause,
        LifecycleTransition::Resume,
        LifecycleTransition::End { reason: EndReason::Manual },
        LifecycleTransition::Cancel,
    ] {
        assert_eq!(g.apply(entry, 2_000), Err(GameError::InvalidGameStatus));
    }
    assert_eq!(g.status(), GameStatus::Completed);

    let (mut cancelled, _) = ready_game();
    cancelled.apply(LifecycleTransition::Cancel, 0).unwrap();
    assert_eq!(
        cancelled.apply(LifecycleTransition::Start, 0),
        Err(GameError::InvalidGameStatus)
    );
}

#[test]
fn cancel_allowed_from_any_non_terminal_state() {
    let mut setup = make_game(60);
    assert_eq!(setup.apply(LifecycleTransition::Cancel, 0), Ok(TransitionSuccess::Cancelled));

    let (mut active, fugitive) = ready_game();
    active.apply(LifecycleTransition::Start, 0).unwrap();
    active.apply(LifecycleTransition::Cancel, 1_000).unwrap();
    assert_eq!(active.status(), GameStatus::Cancelled);
    assert_eq!(active.player(fugitive).unwrap().status, PlayerStatus::Completed);
}

#[test]
fn end_settles_every_player_to_completed() {
    let (mut g, fugitive) = ready_game();
    let hunter = g.join("Wolf".to_string(), Role::Hunter, 0).unwrap();
    g.apply(LifecycleTransition::Start, 0).unwrap();
    g.apply(LifecycleTransition::End { reason: EndReason::Manual }, 60_000).unwrap();

    assert_eq!(g.player(fugitive).unwrap().status, PlayerStatus::Completed);
    assert_eq!(g.player(hunter).unwrap().status, PlayerStatus::Completed);
    assert_eq!(g.end_time_ms(), Some(60_000));
}

#[test]
fn winner_is_fugitives_when_any_escaped() {
    let (mut g, first) = ready_game();
    let second = g.join("Vos".to_string(), Role::Fugitive, 0).unwrap();
    g.apply(LifecycleTransition::Start, 0).unwrap();

    for n in 1..=6 {
        g.submit_answer(first, n, &format!("answer {}", n), None, 1_000).unwrap();
    }
    let outcome = g.update_location(first, 52.37, 4.90, None, 2_000).unwrap();
    assert!(outcome.escaped);
    g.mark_caught(second, Some(Point::new(52.36, 4.89)), 3_000).unwrap();

    g.apply(LifecycleTransition::End { reason: EndReason::Manual }, 4_000).unwrap();
    let results = g.results().unwrap();
    assert_eq!(results.winner, Winner::Fugitives);
    assert_eq!(results.escaped, vec![first]);
    assert_eq!(results.caught.len(), 1);
    assert_eq!(results.caught[0].player_id, second);
    assert_eq!(results.caught[0].at_ms, Some(3_000));
    assert_eq!(results.tasks_completed_total, 6);
}

#[test]
fn winner_is_hunters_when_all_fugitives_caught() {
    let (mut g, fugitive) = ready_game();
    g.apply(LifecycleTransition::Start, 0).unwrap();
    g.mark_caught(fugitive, None, 1_000).unwrap();
    g.apply(LifecycleTransition::End { reason: EndReason::Manual }, 2_000).unwrap();
    assert_eq!(g.results().unwrap().winner, Winner::Hunters);
}

#[test]
fn winner_is_none_when_undecided_regardless_of_reason() {
    let (mut g, _) = ready_game();
    g.apply(LifecycleTransition::Start, 0).unwrap();
    g.apply(LifecycleTransition::End { reason: EndReason::Manual }, 1_000).unwrap();
    assert_eq!(g.results().unwrap().winner, Winner::None);

    let (mut g2, _) = ready_game();
    g2.apply(LifecycleTransition::Start, 0).unwrap();
    g2.apply(LifecycleTransition::End { reason: EndReason::TimeExpired }, 1_000).unwrap();
    assert_eq!(g2.results().unwrap().winner, Winner::None);
    assert_eq!(g2.results().unwrap().end_reason, EndReason::TimeExpired);
}

#[test]
fn join_rejects_duplicate_names_and_full_games() {
    let mut g = Game::new(
        uuid::Uuid::new_v4(),
        "KLPJ43".to_string(),
        "Small".to_string(),
        extraction(),
        60,
        GameSettings { max_players: 2, ..GameSettings::default() },
    );
    g.join("Renske".to_string(), Role::Fugitive, 0).unwrap();
    assert_eq!(
        g.join("Renske".to_string(), Role::Hunter, 0),
        Err(GameError::DuplicateName)
    );
    g.join("Wolf".to_string(), Role::Hunter, 0).unwrap();
    assert_eq!(
        g.join("Das".to_string(), Role::Spectator, 0),
        Err(GameError::GameFull)
    );
}

#[test]
fn slots_claim_rejoin_and_immutability() {
    let mut g = make_game(60);
    g.add_slot("Fox".to_string(), Role::Fugitive, Some("Rood".to_string()), "geheim".to_string())
        .unwrap();
    assert_eq!(
        g.add_slot("Fox".to_string(), Role::Hunter, None, "x".to_string()),
        Err(GameError::DuplicateName)
    );

    assert_eq!(g.claim_slot("Fox", "fout", 0), Err(GameError::InvalidSlotPassword));
    assert_eq!(g.claim_slot("Das", "geheim", 0), Err(GameError::NotFound));

    let id = g.claim_slot("Fox", "geheim", 0).unwrap();
    let player = g.player(id).unwrap();
    assert_eq!(player.role, Role::Fugitive);
    assert_eq!(player.team.as_deref(), Some("Rood"));

    // Rejoin returns the same player; a joined slot cannot be removed.
    assert_eq!(g.claim_slot("Fox", "geheim", 0), Ok(id));
    assert_eq!(g.remove_slot("Fox"), Err(GameError::SlotAlreadyJoined));
}

#[test]
fn remove_unjoined_slot() {
    let mut g = make_game(60);
    g.add_slot("Fox".to_string(), Role::Fugitive, None, "geheim".to_string()).unwrap();
    assert_eq!(g.remove_slot("Fox"), Ok(()));
    assert_eq!(g.remove_slot("Fox"), Err(GameError::NotFound));
}

#[test]
fn remove_player_refused_while_active() {
    let (mut g, fugitive) = ready_game();
    g.apply(LifecycleTransition::Start, 0).unwrap();
    assert_eq!(g.remove_player(fugitive), Err(GameError::GameAlreadyActive));

    g.apply(LifecycleTransition::Pause, 1_000).unwrap();
    assert_eq!(g.remove_player(fugitive), Ok(()));
    assert!(g.player(fugitive).is_none());
}

#[test]
fn game_serde_round_trip() {
    let (mut g, fugitive) = ready_game();
    g.apply(LifecycleTransition::Start, 0).unwrap();
    g.submit_answer(fugitive, 1, "answer 1", None, 1_000).unwrap();

    let json = serde_json::to_string(&g).unwrap();
    let back: Game = serde_json::from_str(&json).unwrap();
    assert_eq!(back.status(), GameStatus::Active);
    assert_eq!(back.code(), g.code());
    assert_eq!(back.player(fugitive).unwrap().tasks_completed(), 1);
    assert_eq!(back.tasks()[0].completions.len(), 1);
}
