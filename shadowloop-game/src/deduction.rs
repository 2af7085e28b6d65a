//! End-of-session role deduction scoring.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cast::{Character, CharacterId};
use crate::numbers::ratio_pct;

/// One line of the deduction breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductionLine {
    pub character: CharacterId,
    pub name: String,
    /// `None` when the observer left the character unguessed.
    pub guess: Option<String>,
    pub actual: String,
    pub correct: bool,
}

/// Scored comparison of the observer's guesses against the hidden roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeductionReport {
    /// Hidden (non-civilian) roles correctly named.
    pub solved: usize,
    /// Number of hidden roles in the roster.
    pub hidden: usize,
    /// Correct guesses of any role, civilians included.
    pub correct_total: usize,
    pub accuracy_pct: f64,
    pub perfect: bool,
    /// Every role holder plus every wrongly guessed civilian, roster order.
    pub lines: Vec<DeductionLine>,
}

/// Score `guesses` against `characters`.
///
/// Characters without a guess count as guessed `civilian`.
#[must_use]
pub fn score(characters: &[Character], guesses: &BTreeMap<CharacterId, String>) -> DeductionReport {
    let mut solved = 0;
    let mut hidden = 0;
    let mut correct_total = 0;
    let mut lines = Vec::new();
    for character in characters {
        let guess = guesses
            .get(&character.id)
            .map(|guess| guess.trim().to_string())
            .filter(|guess| !guess.is_empty());
        let effective = guess.as_deref().unwrap_or(crate::constants::CIVILIAN_ROLE);
        let correct = effective == character.role;
        let civilian = character.is_civilian();
        if !civilian {
            hidden += 1;
        }
        if correct {
            correct_total += 1;
            if !civilian {
                solved += 1;
            }
        }
        if !correct || !civilian {
            lines.push(DeductionLine {
                character: character.id,
                name: character.name.clone(),
                guess,
                actual: character.role.clone(),
                correct,
            });
        }
    }
    DeductionReport {
        solved,
        hidden,
        correct_total,
        accuracy_pct: ratio_pct(correct_total, characters.len()),
        perfect: solved == hidden,
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::Location;
    use crate::state::fixtures::{person, with_role};

    fn roster() -> Vec<Character> {
        vec![
            with_role(person(1, Location::Site(0), 3), "killer", None),
            with_role(person(2, Location::Site(1), 3), "cultist", None),
            person(3, Location::Site(2), 3),
            person(4, Location::Site(3), 3),
        ]
    }

    #[test]
    fn naming_every_hidden_role_is_perfect() {
        let guesses = BTreeMap::from([
            (CharacterId(1), String::from("killer")),
            (CharacterId(2), String::from("cultist")),
        ]);
        let report = score(&roster(), &guesses);
        assert!(report.perfect);
        assert_eq!(report.solved, 2);
        assert_eq!(report.hidden, 2);
        assert_eq!(report.correct_total, 4);
        assert!((report.accuracy_pct - 100.0).abs() < f64::EPSILON);
        assert_eq!(report.lines.len(), 2);
    }

    #[test]
    fn wrong_guesses_are_listed() {
        let guesses = BTreeMap::from([
            (CharacterId(1), String::from("killer")),
            (CharacterId(3), String::from("cultist")),
        ]);
        let report = score(&roster(), &guesses);
        assert!(!report.perfect);
        assert_eq!(report.solved, 1);
        let wrong: Vec<_> = report
            .lines
            .iter()
            .filter(|line| !line.correct)
            .map(|line| line.character)
            .collect();
        assert_eq!(wrong, [CharacterId(2), CharacterId(3)]);
    }
}
