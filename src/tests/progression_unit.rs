use crate::geo::Point;
use crate::{
    EndReason, ExtractionPoint, Game, GameError, GameSettings, LifecycleTransition, NextStep,
    PlayerStatus, Role, TaskLocation, TaskSpec, Winner, TASKS_PER_GAME,
};

fn make_game() -> Game {
    Game::new(
        uuid::Uuid::new_v4(),
        "KLPJ77".to_string(),
        "Night Run".to_string(),
        ExtractionPoint {
            point: Point::new(52.0907, 5.1214),
            address: None,
            radius_m: 50.0,
        },
        60,
        GameSettings::default(),
    )
}

fn task_specs() -> Vec<TaskSpec> {
    (1..=TASKS_PER_GAME)
        .map(|n| TaskSpec {
            question: format!("Question {}", n),
            answer: format!("Answer {}", n),
            location: TaskLocation {
                point: Point::new(52.09, 5.12),
                address: Some(format!("Stop {}", n)),
            },
            code: Some(format!("QR-{}", n)),
        })
        .collect()
}

fn active_game() -> (Game, uuid::Uuid, uuid::Uuid) {
    let mut g = make_game();
    g.attach_tasks(task_specs()).unwrap();
    let fugitive = g.join("Renske".to_string(), Role::Fugitive, 0).unwrap();
    let hunter = g.join("Wolf".to_string(), Role::Hunter, 0).unwrap();
    g.apply(LifecycleTransition::Start, 0).unwrap();
    (g, fugitive, hunter)
}

#[test]
fn answers_match_after_normalization() {
    let (mut g, fugitive, _) = active_game();
    let outcome = g
        .submit_answer(fugitive, 1, "  ANSWER 1  ", None, 1_000)
        .unwrap();
    assert!(outcome.correct);
    assert_eq!(outcome.tasks_completed, 1);
}

#[test]
fn wrong_answer_is_a_normal_outcome_and_mutates_nothing() {
    let (mut g, fugitive, _) = active_game();
    let outcome = g.submit_answer(fugitive, 1, "wrong", None, 1_000).unwrap();
    assert!(!outcome.correct);
    assert_eq!(outcome.tasks_completed, 0);
    assert!(outcome.next_step.is_none());
    assert!(g.task(1).unwrap().completions.is_empty());
    assert_eq!(g.player(fugitive).unwrap().tasks_completed(), 0);

    // The same answer still works afterwards.
    assert!(g.submit_answer(fugitive, 1, "answer 1", None, 2_000).unwrap().correct);
}

#[test]
fn tasks_must_be_completed_in_order() {
    let (mut g, fugitive, _) = active_game();
    assert_eq!(
        g.submit_answer(fugitive, 3, "answer 3", None, 1_000),
        Err(GameError::SequentialCompletionRequired)
    );
    g.submit_answer(fugitive, 1, "answer 1", None, 2_000).unwrap();
    assert_eq!(
        g.submit_answer(fugitive, 3, "answer 3", None, 3_000),
        Err(GameError::SequentialCompletionRequired)
    );
}

#[test]
fn completed_task_rejects_resubmission() {
    let (mut g, fugitive, _) = active_game();
    g.submit_answer(fugitive, 1, "answer 1", None, 1_000).unwrap();
    assert_eq!(
        g.submit_answer(fugitive, 1, "answer 1", None, 2_000),
        Err(GameError::TaskAlreadyCompleted)
    );
    // The ledger kept a single completion.
    assert_eq!(g.task(1).unwrap().completions.len(), 1);
}

#[test]
fn correct_answer_points_at_the_next_task() {
    let (mut g, fugitive, _) = active_game();
    let outcome = g.submit_answer(fugitive, 1, "answer 1", None, 1_000).unwrap();
    match outcome.next_step {
        Some(NextStep::Task { number, location }) => {
            assert_eq!(number, 2);
            assert_eq!(location.address.as_deref(), Some("Stop 2"));
        }
        other => panic!("expected next task, got {:?}", other),
    }
}

#[test]
fn sixth_answer_points_at_the_extraction_point() {
    let (mut g, fugitive, _) = active_game();
    for n in 1..=5 {
        g.submit_answer(fugitive, n, &format!("answer {}", n), None, 1_000).unwrap();
    }
    let outcome = g
        .submit_answer(fugitive, 6, "answer 6", None, 30 * 60_000)
        .unwrap();
    match outcome.next_step {
        Some(NextStep::Extraction { remaining_ms, .. }) => {
            assert_eq!(remaining_ms, 30 * 60_000);
        }
        other => panic!("expected extraction step, got {:?}", other),
    }
    assert_eq!(outcome.tasks_completed, 6);
}

#[test]
fn hunters_and_spectators_cannot_submit_answers() {
    let (mut g, _, hunter) = active_game();
    assert_eq!(
        g.submit_answer(hunter, 1, "answer 1", None, 1_000),
        Err(GameError::InvalidRole)
    );
}

#[test]
fn submissions_rejected_outside_active_play() {
    let mut g = make_game();
    g.attach_tasks(task_specs()).unwrap();
    let fugitive = g.join("Renske".to_string(), Role::Fugitive, 0).unwrap();
    assert_eq!(
        g.submit_answer(fugitive, 1, "answer 1", None, 1_000),
        Err(GameError::GameNotActive)
    );

    g.apply(LifecycleTransition::Start, 0).unwrap();
    g.apply(LifecycleTransition::Pause, 1_000).unwrap();
    assert_eq!(
        g.submit_answer(fugitive, 1, "answer 1", None, 2_000),
        Err(GameError::GameNotActive)
    );
}

#[test]
fn submissions_rejected_after_expiry() {
    let (mut g, fugitive, _) = active_game();
    assert_eq!(
        g.submit_answer(fugitive, 1, "answer 1", None, 61 * 60_000),
        Err(GameError::GameNotActive)
    );
}

#[test]
fn caught_fugitive_cannot_progress() {
    let (mut g, fugitive, _) = active_game();
    g.mark_caught(fugitive, None, 1_000).unwrap();
    assert_eq!(
        g.submit_answer(fugitive, 1, "answer 1", None, 2_000),
        Err(GameError::PlayerNotActive)
    );
    assert_eq!(
        g.update_location(fugitive, 52.09, 5.12, None, 2_000),
        Err(GameError::InactiveContext)
    );
}

#[test]
fn unknown_player_is_not_found() {
    let (mut g, _, _) = active_game();
    let stranger = uuid::Uuid::new_v4();
    assert_eq!(
        g.submit_answer(stranger, 1, "answer 1", None, 1_000),
        Err(GameError::NotFound)
    );
    assert_eq!(
        g.update_location(stranger, 52.0, 5.0, None, 1_000),
        Err(GameError::NotFound)
    );
    assert_eq!(g.mark_caught(stranger, None, 1_000), Err(GameError::NotFound));
}

#[test]
fn location_update_without_all_tasks_never_escapes() {
    let (mut g, fugitive, _) = active_game();
    for n in 1..=5 {
        g.submit_answer(fugitive, n, &format!("answer {}", n), None, 1_000).unwrap();
    }
    // Standing on the extraction point with five of six tasks done.
    let outcome = g.update_location(fugitive, 52.0907, 5.1214, None, 2_000).unwrap();
    assert!(!outcome.escaped);
    assert_eq!(g.player(fugitive).unwrap().status, PlayerStatus::Active);
}

#[test]
fn finished_fugitive_escapes_inside_the_radius() {
    let (mut g, fugitive, _) = active_game();
    for n in 1..=6 {
        g.submit_answer(fugitive, n, &format!("answer {}", n), None, 1_000).unwrap();
    }
    // Roughly 500m out: no escape yet.
    let outcome = g.update_location(fugitive, 52.0952, 5.1214, None, 2_000).unwrap();
    assert!(!outcome.escaped);

    let outcome = g.update_location(fugitive, 52.0907, 5.1214, None, 3_000).unwrap();
    assert!(outcome.escaped);
    assert_eq!(g.player(fugitive).unwrap().status, PlayerStatus::Escaped);
}

#[test]
fn escaped_fugitive_cannot_be_caught() {
    let (mut g, fugitive, _) = active_game();
    for n in 1..=6 {
        g.submit_answer(fugitive, n, &format!("answer {}", n), None, 1_000).unwrap();
    }
    g.update_location(fugitive, 52.0907, 5.1214, None, 2_000).unwrap();
    assert_eq!(
        g.mark_caught(fugitive, None, 3_000),
        Err(GameError::PlayerNotActive)
    );
}

#[test]
fn catch_falls_back_to_last_known_location() {
    let (mut g, fugitive, _) = active_game();
    g.update_location(fugitive, 52.10, 5.10, None, 1_000).unwrap();
    g.mark_caught(fugitive, None, 2_000).unwrap();

    let capture = g.player(fugitive).unwrap().capture.as_ref().unwrap();
    assert_eq!(capture.at_ms, 2_000);
    assert_eq!(capture.location, Some(Point::new(52.10, 5.10)));
}

#[test]
fn hunters_record_locations_but_never_escape() {
    let (mut g, _, hunter) = active_game();
    let outcome = g.update_location(hunter, 52.0907, 5.1214, None, 1_000).unwrap();
    assert!(!outcome.escaped);
    assert_eq!(g.player(hunter).unwrap().location_history.len(), 1);
}

#[test]
fn cannot_catch_a_hunter() {
    let (mut g, _, hunter) = active_game();
    assert_eq!(g.mark_caught(hunter, None, 1_000), Err(GameError::InvalidRole));
}

#[test]
fn disconnect_marks_player_and_is_idempotent() {
    let (mut g, fugitive, _) = active_game();
    g.mark_disconnected(fugitive, 1_000).unwrap();
    assert_eq!(g.player(fugitive).unwrap().status, PlayerStatus::Disconnected);
    // A second signal leaves the caught/escaped/disconnected status alone.
    g.mark_disconnected(fugitive, 2_000).unwrap();
    assert_eq!(g.player(fugitive).unwrap().status, PlayerStatus::Disconnected);
}

#[test]
fn next_task_for_walks_the_ledger() {
    let (mut g, fugitive, _) = active_game();
    assert_eq!(g.next_task_for(fugitive).unwrap().unwrap().number, 1);
    g.submit_answer(fugitive, 1, "answer 1", None, 1_000).unwrap();
    assert_eq!(g.next_task_for(fugitive).unwrap().unwrap().number, 2);
    for n in 2..=6 {
        g.submit_answer(fugitive, n, &format!("answer {}", n), None, 1_000).unwrap();
    }
    assert!(g.next_task_for(fugitive).unwrap().is_none());
}

#[test]
fn full_game_walkthrough_ends_with_fugitive_win() {
    let (mut g, fugitive, hunter) = active_game();

    g.update_location(hunter, 52.08, 5.13, None, 1_000).unwrap();
    for n in 1..=6u8 {
        let at = Point::new(52.09, 5.12);
        let outcome = g
            .submit_answer(fugitive, n, &format!("answer {}", n), Some(at), n as u64 * 60_000)
            .unwrap();
        assert!(outcome.correct);
        assert_eq!(outcome.tasks_completed, n as u32);
    }
    let outcome = g.update_location(fugitive, 52.0907, 5.1214, None, 7 * 60_000).unwrap();
    assert!(outcome.escaped);

    g.apply(LifecycleTransition::End { reason: EndReason::TimeExpired }, 60 * 60_000)
        .unwrap();
    let results = g.results().unwrap();
    assert_eq!(results.winner, Winner::Fugitives);
    assert_eq!(results.tasks_completed_total, 6);

    // Every task carries exactly one completion by our fugitive.
    for task in g.tasks() {
        assert_eq!(task.completions.len(), 1);
        assert_eq!(task.completions[0].player_id, fugitive);
    }
}
