use std::collections::BTreeSet;
use std::fmt;

use clap::ValueEnum;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use shadowloop_game::{CharacterId, Location, SessionState};

/// One observer command issued at noon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverCommand {
    Move { id: CharacterId, to: Location },
    Swap { first: CharacterId, second: CharacterId },
    Ask(CharacterId),
    Soothe(CharacterId),
    Note { id: CharacterId, guess: String },
}

/// Policy interface for automated observers.
pub trait ObserverPolicy {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    /// Next command to try this noon, or `None` to stop issuing commands.
    fn next_command(&mut self, state: &SessionState) -> Option<ObserverCommand>;

    /// Called once per noon before the first command.
    fn begin_noon(&mut self, _state: &SessionState) {}
}

/// Built-in observer strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Never acts; every noon is forfeited.
    Passive,
    /// Soothes and shelters the most shaken characters.
    Caretaker,
    /// Questions everyone and notes what it learns.
    Inquisitor,
    /// Seeded random commands.
    Random,
}

impl PolicyKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Passive => "Passive",
            Self::Caretaker => "Caretaker",
            Self::Inquisitor => "Inquisitor",
            Self::Random => "Random",
        }
    }

    #[must_use]
    pub fn create_policy(self, seed: u64) -> Box<dyn ObserverPolicy> {
        match self {
            Self::Passive => Box::new(PassivePolicy),
            Self::Caretaker => Box::new(CaretakerPolicy::default()),
            Self::Inquisitor => Box::new(InquisitorPolicy::default()),
            Self::Random => Box::new(RandomPolicy::new(seed)),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

struct PassivePolicy;

impl ObserverPolicy for PassivePolicy {
    fn name(&self) -> &'static str {
        "Passive"
    }

    fn next_command(&mut self, _state: &SessionState) -> Option<ObserverCommand> {
        None
    }
}

/// Tends the lowest-sanity characters; each one is handled at most once a noon.
#[derive(Default)]
struct CaretakerPolicy {
    handled: BTreeSet<CharacterId>,
}

impl ObserverPolicy for CaretakerPolicy {
    fn name(&self) -> &'static str {
        "Caretaker"
    }

    fn begin_noon(&mut self, _state: &SessionState) {
        self.handled.clear();
    }

    fn next_command(&mut self, state: &SessionState) -> Option<ObserverCommand> {
        if state.action_points == 0 {
            return None;
        }
        let target = state
            .living()
            .filter(|c| !c.location.is_station() && !self.handled.contains(&c.id))
            .min_by_key(|c| (c.sanity, c.id))?;
        self.handled.insert(target.id);
        if target.at_full_sanity() {
            Some(ObserverCommand::Move {
                id: target.id,
                to: Location::Station,
            })
        } else {
            Some(ObserverCommand::Soothe(target.id))
        }
    }
}

/// Asks each character once, then writes down every revealed role.
#[derive(Default)]
struct InquisitorPolicy {
    asked: BTreeSet<CharacterId>,
}

impl ObserverPolicy for InquisitorPolicy {
    fn name(&self) -> &'static str {
        "Inquisitor"
    }

    fn next_command(&mut self, state: &SessionState) -> Option<ObserverCommand> {
        if let Some(known) = state
            .characters
            .iter()
            .find(|c| c.known && c.guess_role.as_deref() != Some(c.role.as_str()))
        {
            return Some(ObserverCommand::Note {
                id: known.id,
                guess: known.role.clone(),
            });
        }
        let target = state
            .living()
            .find(|c| !c.known && !self.asked.contains(&c.id))?;
        self.asked.insert(target.id);
        Some(ObserverCommand::Ask(target.id))
    }
}

/// Issues random commands from a seeded stream; a few per noon.
struct RandomPolicy {
    rng: ChaCha20Rng,
    budget: u32,
}

const RANDOM_COMMANDS_PER_NOON: u32 = 6;

impl RandomPolicy {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            budget: 0,
        }
    }
}

impl ObserverPolicy for RandomPolicy {
    fn name(&self) -> &'static str {
        "Random"
    }

    fn begin_noon(&mut self, _state: &SessionState) {
        self.budget = RANDOM_COMMANDS_PER_NOON;
    }

    fn next_command(&mut self, state: &SessionState) -> Option<ObserverCommand> {
        if self.budget == 0 {
            return None;
        }
        self.budget -= 1;
        let living: Vec<CharacterId> = state.living().map(|c| c.id).collect();
        let id = *living.choose(&mut self.rng)?;
        let command = match self.rng.gen_range(0..5) {
            0 => {
                let sites: Vec<Location> = state.layout.sites().collect();
                let to = if self.rng.gen_bool(0.3) {
                    Location::Station
                } else {
                    sites.choose(&mut self.rng).copied().unwrap_or(Location::Station)
                };
                ObserverCommand::Move { id, to }
            }
            1 => {
                let second = *living.choose(&mut self.rng)?;
                ObserverCommand::Swap { first: id, second }
            }
            2 => ObserverCommand::Ask(id),
            3 => ObserverCommand::Soothe(id),
            _ => {
                let roles: Vec<&str> = state
                    .scripts
                    .parts()
                    .into_iter()
                    .flat_map(|part| part.roles.iter().map(|req| req.name.as_str()))
                    .collect();
                let guess = roles.choose(&mut self.rng).copied().unwrap_or("civilian");
                ObserverCommand::Note {
                    id,
                    guess: guess.to_string(),
                }
            }
        };
        Some(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadowloop_game::{GameEngine, SessionConfig, StaticLoader};

    fn noon_state(seed: u64) -> SessionState {
        let mut session = GameEngine::new(StaticLoader)
            .create_session(seed, SessionConfig::default(), ())
            .unwrap();
        session.advance_to_noon();
        session.into_state()
    }

    #[test]
    fn passive_never_acts() {
        let state = noon_state(1);
        assert!(PolicyKind::Passive.create_policy(1).next_command(&state).is_none());
    }

    #[test]
    fn caretaker_visits_each_character_once() {
        let state = noon_state(2);
        let mut policy = PolicyKind::Caretaker.create_policy(2);
        policy.begin_noon(&state);
        let mut seen = BTreeSet::new();
        while let Some(command) = policy.next_command(&state) {
            let id = match command {
                ObserverCommand::Soothe(id) | ObserverCommand::Move { id, .. } => id,
                other => panic!("unexpected command {other:?}"),
            };
            assert!(seen.insert(id));
        }
        let off_station = state.living().filter(|c| !c.location.is_station()).count();
        assert_eq!(seen.len(), off_station);
    }

    #[test]
    fn inquisitor_notes_revealed_roles_first() {
        let mut state = noon_state(3);
        state.characters[0].known = true;
        let mut policy = PolicyKind::Inquisitor.create_policy(3);
        let expected = ObserverCommand::Note {
            id: state.characters[0].id,
            guess: state.characters[0].role.clone(),
        };
        assert_eq!(policy.next_command(&state), Some(expected));
    }

    #[test]
    fn random_policy_is_seeded() {
        let state = noon_state(4);
        let mut first = PolicyKind::Random.create_policy(9);
        let mut second = PolicyKind::Random.create_policy(9);
        first.begin_noon(&state);
        second.begin_noon(&state);
        for _ in 0..RANDOM_COMMANDS_PER_NOON {
            assert_eq!(first.next_command(&state), second.next_command(&state));
        }
        assert!(first.next_command(&state).is_none());
    }
}
