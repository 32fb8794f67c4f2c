use std::time::Duration;

use game_core::{Room, RoomConfig, RoomError};
use game_types::{GameMode, GamePhase, LetterStatus, PlayerId, WordMode};

fn test_config() -> RoomConfig {
    RoomConfig {
        max_players: 4,
        max_guesses: 6,
        word_length: 5,
        competitive_time_limit: Some(Duration::from_secs(300)),
    }
}

fn test_room(game_mode: GameMode, word_mode: WordMode) -> Room {
    Room::new("ABC123".to_string(), game_mode, word_mode, true, test_config())
}

fn add(room: &mut Room, name: &str) -> PlayerId {
    room.add_player(name.to_string(), None).unwrap().id
}

/// Readies everyone and walks the room into the playing phase.
fn start_playing(room: &mut Room, target: &str) {
    let ids: Vec<PlayerId> = room.players.iter().map(|p| p.id).collect();
    for id in &ids {
        room.set_ready(*id, true).unwrap();
    }
    let creator = room.creator_id.unwrap();
    room.can_start(creator).unwrap();
    room.begin_countdown().unwrap();
    room.begin_playing(target.to_string(), None).unwrap();
}

#[test]
fn first_player_becomes_creator() {
    let mut room = test_room(GameMode::Casual, WordMode::Random);
    let alice = add(&mut room, "Alice");
    let bob = add(&mut room, "Bob");

    assert_eq!(room.creator_id, Some(alice));
    assert!(room.player(alice).unwrap().is_creator);
    assert!(!room.player(bob).unwrap().is_creator);
}

#[test]
fn room_rejects_joins_past_capacity() {
    let mut room = test_room(GameMode::Casual, WordMode::Random);
    for i in 0..4 {
        add(&mut room, &format!("Player{i}"));
    }
    let result = room.add_player("Late".to_string(), None);
    assert_eq!(result.unwrap_err(), RoomError::RoomFull);
}

#[test]
fn room_rejects_joins_once_started() {
    let mut room = test_room(GameMode::Casual, WordMode::Random);
    add(&mut room, "Alice");
    start_playing(&mut room, "crate");

    let result = room.add_player("Late".to_string(), None);
    assert_eq!(result.unwrap_err(), RoomError::GameInProgress);
}

#[test]
fn start_requires_creator_and_readiness() {
    let mut room = test_room(GameMode::Casual, WordMode::Random);
    let alice = add(&mut room, "Alice");
    let bob = add(&mut room, "Bob");

    assert_eq!(room.can_start(bob).unwrap_err(), RoomError::NotCreator);
    assert_eq!(
        room.can_start(alice).unwrap_err(),
        RoomError::PlayersNotReady
    );

    room.set_ready(alice, true).unwrap();
    room.set_ready(bob, true).unwrap();
    assert!(room.can_start(alice).is_ok());
}

#[test]
fn solo_player_can_start() {
    let mut room = test_room(GameMode::Casual, WordMode::Random);
    let alice = add(&mut room, "Alice");
    room.set_ready(alice, true).unwrap();
    assert!(room.can_start(alice).is_ok());
}

#[test]
fn phase_machine_runs_a_full_round() {
    let mut room = test_room(GameMode::Casual, WordMode::Random);
    let alice = add(&mut room, "Alice");
    let bob = add(&mut room, "Bob");

    assert_eq!(room.phase, GamePhase::Waiting);
    start_playing(&mut room, "crate");
    assert_eq!(room.phase, GamePhase::Playing);

    let outcome = room.submit_guess(alice, "crate", false, true).unwrap();
    assert!(outcome.is_win);
    assert!(outcome.finished);
    assert!(!outcome.round_over); // Bob still playing

    let outcome = room.submit_guess(bob, "crane", false, true).unwrap();
    assert!(!outcome.is_win);
    assert!(!outcome.finished);

    let outcome = room.submit_guess(bob, "crate", false, true).unwrap();
    assert!(outcome.round_over);

    let results = room.finish_round().unwrap();
    assert_eq!(room.phase, GamePhase::Results);
    assert_eq!(results.word, "crate");
    // Alice won in one guess, Bob in two.
    assert_eq!(results.results[0].player_id, alice);
    assert_eq!(results.results[1].player_id, bob);
}

#[test]
fn readying_up_in_results_resets_for_rematch() {
    let mut room = test_room(GameMode::Casual, WordMode::Random);
    let alice = add(&mut room, "Alice");
    start_playing(&mut room, "crate");
    room.submit_guess(alice, "crate", false, true).unwrap();
    room.finish_round().unwrap();

    let reset = room.set_ready(alice, true).unwrap();
    assert!(reset);
    assert_eq!(room.phase, GamePhase::Waiting);

    let player = room.player(alice).unwrap();
    assert!(player.is_ready);
    assert!(player.guesses.is_empty());
    assert!(!player.finished);
    assert!(!player.won);
    assert_eq!(player.finish_time_secs, None);
}

#[test]
fn guesses_rejected_outside_playing_phase() {
    let mut room = test_room(GameMode::Casual, WordMode::Random);
    let alice = add(&mut room, "Alice");
    assert_eq!(
        room.submit_guess(alice, "crate", false, true).unwrap_err(),
        RoomError::NotPlaying
    );
}

#[test]
fn finished_player_cannot_keep_guessing() {
    let mut room = test_room(GameMode::Casual, WordMode::Random);
    let alice = add(&mut room, "Alice");
    let bob = add(&mut room, "Bob");
    start_playing(&mut room, "crate");

    room.submit_guess(alice, "crate", false, true).unwrap();
    assert_eq!(
        room.submit_guess(alice, "slate", false, true).unwrap_err(),
        RoomError::AlreadyFinished
    );

    // Bob exhausts all six guesses without winning.
    for _ in 0..6 {
        room.submit_guess(bob, "crane", false, true).unwrap();
    }
    let bob_state = room.player(bob).unwrap();
    assert!(bob_state.finished);
    assert!(!bob_state.won);
}

#[test]
fn invalid_word_needs_two_rejections_before_forced_override() {
    let mut room = test_room(GameMode::Casual, WordMode::Random);
    let alice = add(&mut room, "Alice");
    start_playing(&mut room, "crate");

    // Forced on the first attempt does not skip validation.
    assert!(room.submit_guess(alice, "zzzzz", true, false).is_err());
    assert!(room.submit_guess(alice, "zzzzz", false, false).is_err());
    // Third identical resubmission with the forced flag goes through.
    let outcome = room.submit_guess(alice, "zzzzz", true, false).unwrap();
    assert!(!outcome.is_win);
    assert_eq!(room.player(alice).unwrap().guesses.len(), 1);
}

#[test]
fn switching_rejected_word_resets_override_progress() {
    let mut room = test_room(GameMode::Casual, WordMode::Random);
    let alice = add(&mut room, "Alice");
    start_playing(&mut room, "crate");

    assert!(room.submit_guess(alice, "zzzzz", false, false).is_err());
    assert!(room.submit_guess(alice, "qqqqq", false, false).is_err());
    // Only one rejection of this exact word so far.
    assert!(room.submit_guess(alice, "qqqqq", true, false).is_err());
}

#[test]
fn wrong_length_guess_is_invalid() {
    let mut room = test_room(GameMode::Casual, WordMode::Random);
    let alice = add(&mut room, "Alice");
    start_playing(&mut room, "crate");

    assert_eq!(
        room.submit_guess(alice, "cart", false, true).unwrap_err(),
        RoomError::InvalidWord("cart".to_string())
    );
    assert!(room.player(alice).unwrap().guesses.is_empty());
}

#[test]
fn creator_transfer_prefers_connected_players() {
    let mut room = test_room(GameMode::Casual, WordMode::Random);
    let alice = add(&mut room, "Alice");
    let bob = add(&mut room, "Bob");
    let carol = add(&mut room, "Carol");

    room.mark_disconnected(bob, 0).unwrap();
    let outcome = room.remove_player(alice).unwrap();

    // Bob is lowest-index but disconnected; Carol inherits.
    assert_eq!(outcome.new_creator, Some(carol));
    assert_eq!(room.creator_id, Some(carol));
    assert_eq!(room.players.iter().filter(|p| p.is_creator).count(), 1);
}

#[test]
fn creator_transfer_falls_back_to_disconnected_player() {
    let mut room = test_room(GameMode::Casual, WordMode::Random);
    let alice = add(&mut room, "Alice");
    let bob = add(&mut room, "Bob");

    room.mark_disconnected(bob, 0).unwrap();
    let outcome = room.remove_player(alice).unwrap();
    assert_eq!(outcome.new_creator, Some(bob));
}

#[test]
fn duplicate_disconnect_reports_no_new_transition() {
    let mut room = test_room(GameMode::Casual, WordMode::Random);
    let alice = add(&mut room, "Alice");

    assert!(room.mark_disconnected(alice, 100).unwrap());
    assert!(!room.mark_disconnected(alice, 200).unwrap());
}

#[test]
fn removing_last_player_empties_the_room() {
    let mut room = test_room(GameMode::Casual, WordMode::Random);
    let alice = add(&mut room, "Alice");
    let outcome = room.remove_player(alice).unwrap();
    assert!(outcome.now_empty);
    assert_eq!(room.creator_id, None);
}

#[test]
fn sabotage_start_requires_picked_word() {
    let mut room = test_room(GameMode::Casual, WordMode::Sabotage);
    let alice = add(&mut room, "Alice");
    room.set_ready(alice, true).unwrap();

    assert_eq!(room.can_start(alice).unwrap_err(), RoomError::WordNotPicked);
    room.pick_word(alice, "crate").unwrap();
    assert!(room.can_start(alice).is_ok());
    assert_eq!(room.picked_word(), Some("crate"));
}

#[test]
fn pick_word_is_creator_only_and_sabotage_only() {
    let mut room = test_room(GameMode::Casual, WordMode::Random);
    let alice = add(&mut room, "Alice");
    let bob = add(&mut room, "Bob");

    assert_eq!(
        room.pick_word(bob, "crate").unwrap_err(),
        RoomError::NotCreator
    );
    assert_eq!(
        room.pick_word(alice, "crate").unwrap_err(),
        RoomError::NotSabotageMode
    );
}

#[test]
fn settings_are_creator_only_and_locked_after_start() {
    let mut room = test_room(GameMode::Casual, WordMode::Random);
    let alice = add(&mut room, "Alice");
    let bob = add(&mut room, "Bob");

    assert_eq!(
        room.set_game_mode(bob, GameMode::Competitive).unwrap_err(),
        RoomError::NotCreator
    );
    room.set_game_mode(alice, GameMode::Competitive).unwrap();
    room.set_visibility(alice, false).unwrap();

    start_playing(&mut room, "crate");
    assert_eq!(
        room.set_word_mode(alice, WordMode::Daily).unwrap_err(),
        RoomError::SettingsLocked
    );
}

#[test]
fn competitive_rooms_have_a_time_limit() {
    let mut config = test_config();
    config.competitive_time_limit = Some(Duration::ZERO);
    let mut room = Room::new(
        "ABC123".to_string(),
        GameMode::Competitive,
        WordMode::Random,
        true,
        config,
    );
    let alice = room.add_player("Alice".to_string(), None).unwrap().id;
    room.set_ready(alice, true).unwrap();
    room.begin_countdown().unwrap();
    room.begin_playing("crate".to_string(), None).unwrap();

    std::thread::sleep(Duration::from_millis(5));
    assert!(room.time_expired());
}

#[test]
fn casual_rooms_never_expire() {
    let mut room = test_room(GameMode::Casual, WordMode::Random);
    add(&mut room, "Alice");
    start_playing(&mut room, "crate");
    assert_eq!(room.time_limit(), None);
    assert!(!room.time_expired());
}

#[test]
fn public_views_carry_colors_but_never_letters() {
    let mut room = test_room(GameMode::Casual, WordMode::Random);
    let alice = add(&mut room, "Alice");
    add(&mut room, "Bob");
    start_playing(&mut room, "crate");

    room.submit_guess(alice, "crane", false, true).unwrap();

    let view = room.player(alice).unwrap().public_view();
    assert_eq!(view.guess_colors.len(), 1);
    assert_eq!(view.guess_colors[0][0], LetterStatus::Correct);

    let json = serde_json::to_string(&view).unwrap();
    assert!(!json.contains("crane"));
}

#[test]
fn game_snapshot_reproduces_own_board_only() {
    let mut room = test_room(GameMode::Casual, WordMode::Random);
    let alice = add(&mut room, "Alice");
    let bob = add(&mut room, "Bob");
    start_playing(&mut room, "crate");

    room.submit_guess(alice, "crane", false, true).unwrap();
    room.submit_guess(bob, "slate", false, true).unwrap();

    let snapshot = room.game_snapshot(alice).unwrap();
    assert_eq!(snapshot.own_guesses, vec!["crane".to_string()]);
    assert_eq!(snapshot.own_results.len(), 1);

    let json = serde_json::to_string(&snapshot).unwrap();
    assert!(json.contains("crane"));
    assert!(!json.contains("slate"));
    assert!(!json.contains("crate"));
}

#[test]
fn lobby_visibility_tracks_phase_and_fullness() {
    let mut room = test_room(GameMode::Casual, WordMode::Random);
    let alice = add(&mut room, "Alice");
    assert!(room.is_lobby_visible());

    room.set_visibility(alice, false).unwrap();
    assert!(!room.is_lobby_visible());
    room.set_visibility(alice, true).unwrap();

    start_playing(&mut room, "crate");
    assert!(!room.is_lobby_visible());
}
