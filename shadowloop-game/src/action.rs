//! Observer commands gated by phase, liveness and action points.
//!
//! Malformed input (unknown ids, sites off the map) is a [`CommandError`].
//! Well-formed commands the rules refuse come back as a rejected
//! [`ActionOutcome`] and leave the state untouched.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cast::{CharacterId, Location};
use crate::constants::{SOOTHE_AMOUNT, SOOTHE_COST, SWAP_COST};
use crate::movement::ArrivalOutcome;
use crate::narration::{EventKind, EventSeverity};
use crate::phase::Phase;
use crate::rules::RuleTag;
use crate::state::SessionState;

/// Hard failures for commands that reference things that do not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("no character with id {0}")]
    UnknownCharacter(CharacterId),
    #[error("{location} is not on a map of {site_count} sites")]
    LocationOutOfRange { location: Location, site_count: u8 },
}

/// Broad class of a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionClass {
    /// The command makes no sense in the current state.
    InvalidCommand,
    /// The command is well-formed but a game rule forbids it.
    RuleViolation,
}

/// Reason a command was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    #[error("the session is over")]
    SessionOver,
    #[error("actions are only possible at noon")]
    NotNoon,
    #[error("{name} is dead")]
    TargetDead { name: String },
    #[error("not enough action points (need {needed}, have {available})")]
    InsufficientActionPoints { needed: u32, available: u32 },
    #[error("{name} is already at {location}")]
    AlreadyThere { name: String, location: Location },
    #[error("{to} cannot be reached from {from}")]
    Unreachable { from: Location, to: Location },
    #[error("{location} is closed for the day")]
    LocationBlocked { location: Location },
    #[error("a character cannot swap with itself")]
    SwapWithSelf,
    #[error("characters at the station cannot be swapped")]
    SwapAtStation,
    #[error("{first} and {second} are not in adjacent sites")]
    SwapNotAdjacent { first: String, second: String },
    #[error("{name} is corrupted and refuses to answer")]
    TargetCorrupted { name: String },
    #[error("{name} has already been questioned")]
    AlreadyKnown { name: String },
    #[error("{name} must be at full sanity to be interrogated")]
    InterrogationNeedsComposure { name: String },
    #[error("{name} is already at full sanity")]
    AlreadyComposed { name: String },
    #[error("nobody can be soothed at the station")]
    SootheAtStation,
    #[error("{remaining} action point(s) left; spend them before ending the turn")]
    ActionPointsRemaining { remaining: u32 },
}

impl Rejection {
    #[must_use]
    pub const fn class(&self) -> RejectionClass {
        match self {
            Self::SessionOver
            | Self::NotNoon
            | Self::TargetDead { .. }
            | Self::AlreadyThere { .. }
            | Self::SwapWithSelf
            | Self::AlreadyKnown { .. }
            | Self::AlreadyComposed { .. } => RejectionClass::InvalidCommand,
            Self::InsufficientActionPoints { .. }
            | Self::Unreachable { .. }
            | Self::LocationBlocked { .. }
            | Self::SwapAtStation
            | Self::SwapNotAdjacent { .. }
            | Self::TargetCorrupted { .. }
            | Self::InterrogationNeedsComposure { .. }
            | Self::SootheAtStation
            | Self::ActionPointsRemaining { .. } => RejectionClass::RuleViolation,
        }
    }
}

/// Result of a well-formed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub accepted: bool,
    pub message: String,
    /// Action points spent; zero when rejected.
    pub cost: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
}

impl ActionOutcome {
    #[must_use]
    pub fn accepted(message: impl Into<String>, cost: u32) -> Self {
        Self {
            accepted: true,
            message: message.into(),
            cost,
            rejection: None,
        }
    }

    #[must_use]
    pub fn rejected(rejection: Rejection) -> Self {
        Self {
            accepted: false,
            message: rejection.to_string(),
            cost: 0,
            rejection: Some(rejection),
        }
    }
}

/// Noon command handlers borrowing the session state.
pub(crate) struct ActionController<'a> {
    state: &'a mut SessionState,
}

impl<'a> ActionController<'a> {
    pub(crate) const fn new(state: &'a mut SessionState) -> Self {
        Self { state }
    }

    fn lookup(&self, id: CharacterId) -> Result<usize, CommandError> {
        self.state
            .index_of(id)
            .ok_or(CommandError::UnknownCharacter(id))
    }

    fn check_location(&self, location: Location) -> Result<(), CommandError> {
        if self.state.layout.contains(location) {
            Ok(())
        } else {
            Err(CommandError::LocationOutOfRange {
                location,
                site_count: self.state.layout.site_count,
            })
        }
    }

    /// Session open, noon, enough points, living target.
    fn gate(&self, idx: usize, cost: u32) -> Result<(), Rejection> {
        if self.state.is_over() {
            return Err(Rejection::SessionOver);
        }
        if self.state.phase != Some(Phase::Noon) {
            return Err(Rejection::NotNoon);
        }
        let character = &self.state.characters[idx];
        if character.is_dead {
            return Err(Rejection::TargetDead {
                name: character.name.clone(),
            });
        }
        self.gate_points(cost)
    }

    fn gate_points(&self, cost: u32) -> Result<(), Rejection> {
        let available = self.state.action_points;
        if cost > 0 && available < cost {
            return Err(Rejection::InsufficientActionPoints {
                needed: cost,
                available,
            });
        }
        Ok(())
    }

    fn spend(&mut self, cost: u32, message: String, payload: serde_json::Value) -> ActionOutcome {
        self.state.action_points = self.state.action_points.saturating_sub(cost);
        self.state.push_event(
            EventKind::ActionTaken,
            EventSeverity::Info,
            &["action"],
            message.clone(),
            payload,
        );
        ActionOutcome::accepted(message, cost)
    }

    fn refuse(&mut self, rejection: Rejection) -> ActionOutcome {
        log::debug!("command rejected: {rejection}");
        self.state.push_event(
            EventKind::ActionRejected,
            EventSeverity::Info,
            &["action", "rejected"],
            rejection.to_string(),
            serde_json::to_value(&rejection).unwrap_or(serde_json::Value::Null),
        );
        ActionOutcome::rejected(rejection)
    }

    pub(crate) fn move_character(
        &mut self,
        id: CharacterId,
        destination: Location,
    ) -> Result<ActionOutcome, CommandError> {
        let idx = self.lookup(id)?;
        self.check_location(destination)?;
        let cost = self.state.rules.move_cost(destination, self.state.layout);
        if let Err(rejection) = self.gate(idx, cost) {
            return Ok(self.refuse(rejection));
        }
        let character = &self.state.characters[idx];
        let (name, from) = (character.name.clone(), character.location);
        let reachable = match (from, destination) {
            _ if from == destination => {
                return Ok(self.refuse(Rejection::AlreadyThere {
                    name,
                    location: from,
                }));
            }
            (Location::Station, Location::Site(_)) | (Location::Site(_), Location::Station) => true,
            _ => self.state.layout.are_adjacent(from, destination),
        };
        if !reachable {
            return Ok(self.refuse(Rejection::Unreachable {
                from,
                to: destination,
            }));
        }
        if self.state.blocked_locations.contains(&destination) {
            return Ok(self.refuse(Rejection::LocationBlocked {
                location: destination,
            }));
        }
        let landed = self
            .state
            .arrive(idx, destination, "observer")
            .map_or(from, ArrivalOutcome::final_location);
        Ok(self.spend(
            cost,
            format!("Moved {name} from {from} to {landed}"),
            serde_json::json!({ "character": id, "from": from, "to": destination, "landed": landed }),
        ))
    }

    pub(crate) fn swap(
        &mut self,
        first: CharacterId,
        second: CharacterId,
    ) -> Result<ActionOutcome, CommandError> {
        let a = self.lookup(first)?;
        let b = self.lookup(second)?;
        for idx in [a, b] {
            if let Err(rejection) = self.gate(idx, SWAP_COST) {
                return Ok(self.refuse(rejection));
            }
        }
        if a == b {
            return Ok(self.refuse(Rejection::SwapWithSelf));
        }
        let (loc_a, loc_b) = (
            self.state.characters[a].location,
            self.state.characters[b].location,
        );
        if loc_a.is_station() || loc_b.is_station() {
            return Ok(self.refuse(Rejection::SwapAtStation));
        }
        if !self.state.layout.are_adjacent(loc_a, loc_b) {
            return Ok(self.refuse(Rejection::SwapNotAdjacent {
                first: self.state.characters[a].name.clone(),
                second: self.state.characters[b].name.clone(),
            }));
        }
        self.state.arrive(a, loc_b, "observer");
        self.state.arrive(b, loc_a, "observer");
        let message = format!(
            "Swapped {} and {}",
            self.state.characters[a].name, self.state.characters[b].name
        );
        Ok(self.spend(
            SWAP_COST,
            message,
            serde_json::json!({ "first": first, "second": second }),
        ))
    }

    pub(crate) fn ask(&mut self, id: CharacterId) -> Result<ActionOutcome, CommandError> {
        let idx = self.lookup(id)?;
        let cost = self.state.rules.ask_cost();
        if let Err(rejection) = self.gate(idx, cost) {
            return Ok(self.refuse(rejection));
        }
        let character = &self.state.characters[idx];
        let name = character.name.clone();
        if character.known {
            return Ok(self.refuse(Rejection::AlreadyKnown { name }));
        }
        if character.intrigue {
            return Ok(self.refuse(Rejection::TargetCorrupted { name }));
        }
        if self.state.rules.has(&RuleTag::Interrogation) && !character.at_full_sanity() {
            return Ok(self.refuse(Rejection::InterrogationNeedsComposure { name }));
        }
        let character = &mut self.state.characters[idx];
        character.known = true;
        let (role, sanity, max) = (
            character.role.clone(),
            character.sanity,
            character.max_sanity,
        );
        Ok(self.spend(
            cost,
            format!("{name} confides: role {role}, sanity {sanity}/{max}"),
            serde_json::json!({ "character": id, "role": role, "sanity": sanity }),
        ))
    }

    /// Free note; allowed in any phase until the session ends.
    pub(crate) fn mark_note(
        &mut self,
        id: CharacterId,
        guess: &str,
    ) -> Result<ActionOutcome, CommandError> {
        let idx = self.lookup(id)?;
        if self.state.is_over() {
            return Ok(self.refuse(Rejection::SessionOver));
        }
        let guess = guess.trim();
        let character = &mut self.state.characters[idx];
        let name = character.name.clone();
        let message = if guess.is_empty() {
            character.guess_role = None;
            format!("Cleared the note on {name}")
        } else {
            character.guess_role = Some(guess.to_string());
            format!("Marked {name} as {guess}")
        };
        Ok(self.spend(
            0,
            message,
            serde_json::json!({ "character": id, "guess": guess }),
        ))
    }

    pub(crate) fn soothe(&mut self, id: CharacterId) -> Result<ActionOutcome, CommandError> {
        let idx = self.lookup(id)?;
        if let Err(rejection) = self.gate(idx, SOOTHE_COST) {
            return Ok(self.refuse(rejection));
        }
        let character = &self.state.characters[idx];
        let name = character.name.clone();
        if character.location.is_station() {
            return Ok(self.refuse(Rejection::SootheAtStation));
        }
        if character.at_full_sanity() {
            return Ok(self.refuse(Rejection::AlreadyComposed { name }));
        }
        let character = &mut self.state.characters[idx];
        character.sanity = (character.sanity + SOOTHE_AMOUNT).min(character.max_sanity);
        let sanity = character.sanity;
        Ok(self.spend(
            SOOTHE_COST,
            format!("Soothed {name} (sanity {sanity})"),
            serde_json::json!({ "character": id, "sanity": sanity }),
        ))
    }

    /// Gate for ending the turn; the session runs the phases itself.
    pub(crate) fn check_end_turn(&mut self) -> Option<ActionOutcome> {
        let rejection = if self.state.is_over() {
            Rejection::SessionOver
        } else if self.state.phase != Some(Phase::Noon) {
            Rejection::NotNoon
        } else if self.state.action_points > 0 {
            Rejection::ActionPointsRemaining {
                remaining: self.state.action_points,
            }
        } else {
            return None;
        };
        Some(self.refuse(rejection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::fixtures::{person, state_with, with_role};

    fn noon(main: Option<&str>, sub: Option<&str>, cast: Vec<crate::cast::Character>) -> SessionState {
        let mut state = state_with(main, sub, cast);
        state.phase = Some(Phase::Noon);
        state.action_points = state.config.base_action_points;
        state
    }

    #[test]
    fn move_spends_points_and_resolves_arrival() {
        let walker = with_role(person(1, Location::Station, 3), "witness", Some(0));
        let mut state = noon(None, None, vec![walker]);
        let outcome = ActionController::new(&mut state)
            .move_character(CharacterId(1), Location::Site(2))
            .unwrap();
        assert!(outcome.accepted);
        assert_eq!(outcome.cost, 1);
        assert_eq!(state.action_points, 4);
        assert_eq!(state.characters[0].location, Location::Station);
        assert_eq!(state.characters[0].sanity, 2);
    }

    #[test]
    fn move_rejections_leave_state_untouched() {
        let mut state = noon(None, None, vec![person(1, Location::Site(0), 3)]);
        let mut ctl = ActionController::new(&mut state);
        let far = ctl.move_character(CharacterId(1), Location::Site(5)).unwrap();
        assert_eq!(
            far.rejection.as_ref().map(Rejection::class),
            Some(RejectionClass::RuleViolation)
        );
        let same = ctl.move_character(CharacterId(1), Location::Site(0)).unwrap();
        assert_eq!(
            same.rejection.as_ref().map(Rejection::class),
            Some(RejectionClass::InvalidCommand)
        );
        assert_eq!(state.action_points, 5);
        assert_eq!(state.characters[0].location, Location::Site(0));
    }

    #[test]
    fn malformed_commands_are_errors() {
        let mut state = noon(None, None, vec![person(1, Location::Site(0), 3)]);
        let mut ctl = ActionController::new(&mut state);
        assert_eq!(
            ctl.ask(CharacterId(99)),
            Err(CommandError::UnknownCharacter(CharacterId(99)))
        );
        assert!(matches!(
            ctl.move_character(CharacterId(1), Location::Site(12)),
            Err(CommandError::LocationOutOfRange { .. })
        ));
    }

    #[test]
    fn blocked_and_lockdown_moves() {
        let mut state = noon(None, Some("lockdown"), vec![person(1, Location::Site(2), 3)]);
        state.blocked_locations.insert(Location::Site(1));
        let mut ctl = ActionController::new(&mut state);
        let blocked = ctl.move_character(CharacterId(1), Location::Site(1)).unwrap();
        assert!(matches!(
            blocked.rejection,
            Some(Rejection::LocationBlocked { .. })
        ));
        let quarantined = ctl.move_character(CharacterId(1), Location::Site(3)).unwrap();
        assert_eq!(quarantined.cost, 2);
        assert_eq!(state.action_points, 3);
    }

    #[test]
    fn actions_outside_noon_or_after_the_end_are_refused() {
        let mut state = noon(None, None, vec![person(1, Location::Site(0), 2)]);
        state.phase = Some(Phase::Dusk);
        let outcome = ActionController::new(&mut state)
            .soothe(CharacterId(1))
            .unwrap();
        assert_eq!(outcome.rejection, Some(Rejection::NotNoon));

        state.phase = Some(Phase::Noon);
        state.ending = Some(crate::state::Ending::Victory);
        let outcome = ActionController::new(&mut state)
            .mark_note(CharacterId(1), "killer")
            .unwrap();
        assert_eq!(outcome.rejection, Some(Rejection::SessionOver));
    }

    #[test]
    fn swap_needs_adjacent_sites() {
        let mut state = noon(
            None,
            None,
            vec![
                person(1, Location::Site(0), 3),
                person(2, Location::Site(11), 3),
                person(3, Location::Station, 3),
            ],
        );
        let mut ctl = ActionController::new(&mut state);
        let at_station = ctl.swap(CharacterId(1), CharacterId(3)).unwrap();
        assert_eq!(at_station.rejection, Some(Rejection::SwapAtStation));
        let ok = ctl.swap(CharacterId(1), CharacterId(2)).unwrap();
        assert!(ok.accepted);
        assert_eq!(state.characters[0].location, Location::Site(11));
        assert_eq!(state.characters[1].location, Location::Site(0));
        assert_eq!(state.action_points, 4);
    }

    #[test]
    fn ask_reveals_once_and_respects_corruption() {
        let informant = with_role(person(1, Location::Site(0), 3), "killer", None);
        let mut shady = person(2, Location::Site(0), 3);
        shady.intrigue = true;
        let mut state = noon(None, None, vec![informant, shady]);
        let mut ctl = ActionController::new(&mut state);
        let first = ctl.ask(CharacterId(1)).unwrap();
        assert!(first.accepted);
        assert!(first.message.contains("killer"));
        let again = ctl.ask(CharacterId(1)).unwrap();
        assert!(matches!(again.rejection, Some(Rejection::AlreadyKnown { .. })));
        let corrupted = ctl.ask(CharacterId(2)).unwrap();
        assert!(matches!(
            corrupted.rejection,
            Some(Rejection::TargetCorrupted { .. })
        ));
        assert!(state.characters[0].known);
        assert_eq!(state.action_points, 4);
    }

    #[test]
    fn ask_cost_follows_sub_rules() {
        let mut shaken = person(1, Location::Site(0), 3);
        shaken.sanity = 2;
        let mut state = noon(None, Some("interrogation"), vec![shaken, person(2, Location::Site(1), 3)]);
        let mut ctl = ActionController::new(&mut state);
        let refused = ctl.ask(CharacterId(1)).unwrap();
        assert!(matches!(
            refused.rejection,
            Some(Rejection::InterrogationNeedsComposure { .. })
        ));
        let asked = ctl.ask(CharacterId(2)).unwrap();
        assert_eq!(asked.cost, 2);

        let mut free = noon(None, Some("cheap_ask"), vec![person(1, Location::Site(0), 3)]);
        free.action_points = 0;
        let outcome = ActionController::new(&mut free).ask(CharacterId(1)).unwrap();
        assert!(outcome.accepted);
        assert_eq!(outcome.cost, 0);
    }

    #[test]
    fn soothe_caps_at_max_and_skips_the_station() {
        let mut hurt = person(1, Location::Site(4), 3);
        hurt.sanity = 2;
        let mut state = noon(None, None, vec![hurt, person(2, Location::Station, 1)]);
        let mut ctl = ActionController::new(&mut state);
        assert!(ctl.soothe(CharacterId(1)).unwrap().accepted);
        let full = ctl.soothe(CharacterId(1)).unwrap();
        assert!(matches!(full.rejection, Some(Rejection::AlreadyComposed { .. })));
        let station = ctl.soothe(CharacterId(2)).unwrap();
        assert_eq!(station.rejection, Some(Rejection::SootheAtStation));
        assert_eq!(state.characters[0].sanity, 3);
    }

    #[test]
    fn notes_are_free_and_reach_the_dead() {
        let mut dead = person(1, Location::Site(4), 3);
        dead.is_dead = true;
        let mut state = noon(None, None, vec![dead]);
        state.phase = Some(Phase::Night);
        let mut ctl = ActionController::new(&mut state);
        let outcome = ctl.mark_note(CharacterId(1), " killer ").unwrap();
        assert!(outcome.accepted);
        assert_eq!(outcome.cost, 0);
        ctl.mark_note(CharacterId(1), "").unwrap();
        assert_eq!(state.characters[0].guess_role, None);
        assert_eq!(state.action_points, 5);
    }

    #[test]
    fn insufficient_points_are_a_rule_violation() {
        let mut state = noon(None, Some("high_cost_move"), vec![person(1, Location::Site(0), 3)]);
        state.action_points = 1;
        let outcome = ActionController::new(&mut state)
            .move_character(CharacterId(1), Location::Site(1))
            .unwrap();
        assert_eq!(
            outcome.rejection,
            Some(Rejection::InsufficientActionPoints {
                needed: 2,
                available: 1
            })
        );
    }

    #[test]
    fn end_turn_requires_spent_points() {
        let mut state = noon(None, None, vec![person(1, Location::Site(0), 3)]);
        let refused = ActionController::new(&mut state).check_end_turn();
        assert!(matches!(
            refused.and_then(|o| o.rejection),
            Some(Rejection::ActionPointsRemaining { remaining: 5 })
        ));
        state.action_points = 0;
        assert!(ActionController::new(&mut state).check_end_turn().is_none());
    }
}
