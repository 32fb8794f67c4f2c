use std::collections::HashMap;

use game_types::{LetterStatus, Player, PlayerResult};

/// Judge a guess against the target word, letter by letter.
///
/// Duplicate letters are handled in two passes: exact-position matches are
/// claimed first, then remaining target letters satisfy `Present` marks from
/// left to right. Both words are compared lowercased.
pub fn evaluate_guess(guess: &str, target: &str) -> Vec<LetterStatus> {
    let guess: Vec<char> = guess.to_lowercase().chars().collect();
    let target: Vec<char> = target.to_lowercase().chars().collect();

    let mut remaining: HashMap<char, u32> = HashMap::new();
    for ch in &target {
        *remaining.entry(*ch).or_insert(0) += 1;
    }

    let mut result = vec![LetterStatus::Absent; guess.len()];

    // First pass: exact positions.
    for (i, &ch) in guess.iter().enumerate() {
        if i < target.len() && ch == target[i] {
            result[i] = LetterStatus::Correct;
            if let Some(count) = remaining.get_mut(&ch) {
                *count -= 1;
            }
        }
    }

    // Second pass: right letter, wrong spot.
    for (i, &ch) in guess.iter().enumerate() {
        if result[i] == LetterStatus::Correct {
            continue;
        }
        if let Some(count) = remaining.get_mut(&ch) {
            if *count > 0 {
                *count -= 1;
                result[i] = LetterStatus::Present;
            }
        }
    }

    result
}

/// Competitive score for a finished round. Deterministic in guess count and
/// elapsed seconds only; losses score zero.
pub fn competitive_score(max_guesses: usize, guesses_used: usize, elapsed_secs: u64, won: bool) -> i32 {
    if !won {
        return 0;
    }
    let guess_bonus = (max_guesses as i32 + 1 - guesses_used as i32) * 100;
    let time_bonus = (300i64 - elapsed_secs as i64).max(0) as i32;
    guess_bonus + time_bonus
}

/// Final standings: winners before losers, then fewest guesses, then fastest
/// finish. Unfinished players sort last within the losers.
pub fn rank_results(players: &[Player]) -> Vec<PlayerResult> {
    let mut results: Vec<PlayerResult> = players
        .iter()
        .map(|p| PlayerResult {
            player_id: p.id,
            display_name: p.display_name.clone(),
            won: p.won,
            guess_count: p.guesses.len(),
            finish_time_secs: p.finish_time_secs,
            score: p.score,
        })
        .collect();

    results.sort_by(|a, b| {
        b.won
            .cmp(&a.won)
            .then(a.guess_count.cmp(&b.guess_count))
            .then(match (a.finish_time_secs, b.finish_time_secs) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
    });

    results
}
