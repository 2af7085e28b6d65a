//! Live session state: roster, graves, clocks and the narration journal.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use crate::cast::{Character, CharacterId, Location};
use crate::config::SessionConfig;
use crate::movement::{ArrivalOutcome, MapLayout, check_sanity_threshold, resolve_arrival};
use crate::narration::{Event, EventId, EventKind, EventSeverity, EventTag, EventTagSet};
use crate::numbers::usize_to_u16;
use crate::phase::Phase;
use crate::rng::RngBundle;
use crate::rules::ActiveRules;
use crate::script::ScriptPart;

/// Marker left where a character died.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grave {
    pub character: CharacterId,
    pub name: String,
    pub location: Location,
    pub day: u32,
}

/// Why a session was lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum DefeatCause {
    AllDead,
    /// A foreshadow event with the `defeat` effect fired.
    ScriptedEvent { name: String },
    /// The loss predicate registered for `tag` held at night.
    RuleBroken { tag: String },
}

/// Terminal result of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Ending {
    Victory,
    Defeat(DefeatCause),
}

impl Ending {
    #[must_use]
    pub const fn is_victory(&self) -> bool {
        matches!(self, Self::Victory)
    }
}

impl fmt::Display for Ending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Victory => f.write_str("victory: the cast survived until the deadline"),
            Self::Defeat(DefeatCause::AllDead) => f.write_str("defeat: everyone is dead"),
            Self::Defeat(DefeatCause::ScriptedEvent { name }) => {
                write!(f, "defeat: {name} sealed the town's fate")
            }
            Self::Defeat(DefeatCause::RuleBroken { tag }) => {
                write!(f, "defeat: the {tag} rule was broken")
            }
        }
    }
}

/// The main, sub and foreshadow parts a scenario was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSelection {
    pub main: ScriptPart,
    pub sub: ScriptPart,
    pub foreshadow: ScriptPart,
}

impl ScriptSelection {
    /// Parts in requirement-merge order.
    #[must_use]
    pub const fn parts(&self) -> [&ScriptPart; 3] {
        [&self.main, &self.sub, &self.foreshadow]
    }
}

/// Which foreshadow event of the selected part has fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForeshadowSlot {
    Panic,
    Intrigue,
}

/// Mutable per-session state owned exclusively by a [`crate::Session`].
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub seed: u64,
    pub config: SessionConfig,
    pub layout: MapLayout,
    pub scripts: ScriptSelection,
    pub rules: ActiveRules,
    /// Roster order; abilities resolve in this order.
    pub characters: Vec<Character>,
    /// Holders of roles flagged as masterminds.
    pub masterminds: BTreeSet<CharacterId>,
    pub graves: Vec<Grave>,
    pub day: u32,
    /// Last phase executed; `None` before the first sunrise.
    pub phase: Option<Phase>,
    pub action_points: u32,
    pub ending: Option<Ending>,
    pub blocked_locations: BTreeSet<Location>,
    pub fired_events: BTreeSet<ForeshadowSlot>,
    /// Pending scripted defeat raised by a foreshadow event.
    pub scripted_defeat: Option<String>,
    /// Character the observer steers; skipped by auto-move.
    pub controlled: Option<CharacterId>,
    pub events: Vec<Event>,
    #[serde(skip)]
    next_seq: u16,
    #[serde(skip)]
    rng: Rc<RngBundle>,
}

impl SessionState {
    #[must_use]
    pub fn new(
        seed: u64,
        config: SessionConfig,
        scripts: ScriptSelection,
        characters: Vec<Character>,
        masterminds: BTreeSet<CharacterId>,
        rng: Rc<RngBundle>,
    ) -> Self {
        let rules = ActiveRules::from_selection(&scripts);
        Self {
            seed,
            layout: MapLayout::from_config(&config),
            config,
            scripts,
            rules,
            characters,
            masterminds,
            graves: Vec::new(),
            day: 1,
            phase: None,
            action_points: 0,
            ending: None,
            blocked_locations: BTreeSet::new(),
            fired_events: BTreeSet::new(),
            scripted_defeat: None,
            controlled: None,
            events: Vec::new(),
            next_seq: 0,
            rng,
        }
    }

    /// Shared handle to the session's RNG streams.
    #[must_use]
    pub fn rng(&self) -> Rc<RngBundle> {
        Rc::clone(&self.rng)
    }

    #[must_use]
    pub const fn is_over(&self) -> bool {
        self.ending.is_some()
    }

    #[must_use]
    pub fn index_of(&self, id: CharacterId) -> Option<usize> {
        self.characters.iter().position(|c| c.id == id)
    }

    #[must_use]
    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == id)
    }

    pub fn living(&self) -> impl Iterator<Item = &Character> {
        self.characters.iter().filter(|c| c.is_alive())
    }

    /// Indices of living characters standing at `location`, in roster order.
    #[must_use]
    pub fn living_at(&self, location: Location) -> Vec<usize> {
        self.characters
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_alive() && c.location == location)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Whether a holder of a mastermind role is alive and corrupted.
    #[must_use]
    pub fn corrupted_mastermind_alive(&self) -> bool {
        self.living()
            .any(|c| c.intrigue && self.masterminds.contains(&c.id))
    }

    /// Append an event to the journal, stamped with the current day and phase.
    pub fn push_event(
        &mut self,
        kind: EventKind,
        severity: EventSeverity,
        tags: &[&str],
        message: impl Into<String>,
        payload: serde_json::Value,
    ) {
        if self.events.last().is_some_and(|last| last.id.day != self.day) {
            self.next_seq = 0;
        }
        let tags: EventTagSet = tags.iter().map(|tag| EventTag::new(tag)).collect();
        let event = Event {
            id: EventId::new(self.day, self.next_seq),
            phase: self.phase,
            kind,
            severity,
            tags,
            message: message.into(),
            payload,
        };
        self.next_seq = self.next_seq.saturating_add(1);
        self.events.push(event);
    }

    /// Move into a new phase and announce it.
    pub(crate) fn enter_phase(&mut self, phase: Phase) {
        self.phase = Some(phase);
        log::debug!("day {} entering {phase:?}", self.day);
        self.push_event(
            EventKind::PhaseStarted,
            EventSeverity::Info,
            &["phase"],
            format!("=== Day {} - {} ===", self.day, phase.label()),
            serde_json::Value::Null,
        );
    }

    /// Resolve an arrival for the character at `idx` and narrate it.
    ///
    /// Returns `None` when no character sits at `idx`; nothing moves.
    pub fn arrive(
        &mut self,
        idx: usize,
        destination: Location,
        cause: &str,
    ) -> Option<ArrivalOutcome> {
        let layout = self.layout;
        let penalty = self.config.forbidden_penalty;
        let Some(character) = self.characters.get_mut(idx) else {
            log::debug!("arrival for missing roster slot {idx} ignored");
            return None;
        };
        let from = character.location;
        let outcome = resolve_arrival(character, destination, layout, penalty);
        let name = character.name.clone();
        let id = character.id;
        match outcome {
            ArrivalOutcome::Arrived { location } => {
                if location != from {
                    self.push_event(
                        EventKind::CharacterMoved,
                        EventSeverity::Info,
                        &[cause],
                        format!("{name} moves {from} -> {location}"),
                        serde_json::json!({ "character": id, "from": from, "to": location }),
                    );
                }
            }
            ArrivalOutcome::Bounced {
                attempted,
                penalty,
                broke,
            } => {
                self.push_event(
                    EventKind::ForbiddenBounce,
                    EventSeverity::Warning,
                    &[cause, "forbidden"],
                    format!(
                        "{name} is repelled from forbidden {attempted} and flees to the Station (-{penalty} sanity)"
                    ),
                    serde_json::json!({ "character": id, "attempted": attempted, "penalty": penalty }),
                );
                if broke {
                    self.narrate_breakdown(idx);
                }
            }
        }
        Some(outcome)
    }

    /// Subtract sanity from a living character, then apply the threshold latch.
    pub fn damage_sanity(&mut self, idx: usize, amount: i32, cause: &str) {
        let Some(character) = self.characters.get_mut(idx) else {
            return;
        };
        if character.is_dead || amount <= 0 {
            return;
        }
        character.sanity -= amount;
        let broke = check_sanity_threshold(character);
        let (name, id, sanity) = (character.name.clone(), character.id, character.sanity);
        self.push_event(
            EventKind::SanityChanged,
            EventSeverity::Info,
            &[cause, "sanity"],
            format!("{name} loses {amount} sanity ({sanity} left)"),
            serde_json::json!({ "character": id, "delta": -amount, "sanity": sanity }),
        );
        if broke {
            self.narrate_breakdown(idx);
        }
    }

    fn narrate_breakdown(&mut self, idx: usize) {
        let Some(character) = self.characters.get(idx) else {
            return;
        };
        let (name, id) = (character.name.clone(), character.id);
        self.push_event(
            EventKind::SanityBroken,
            EventSeverity::Warning,
            &["sanity", "intrigue"],
            format!("{name} breaks down and falls under the shadow's sway"),
            serde_json::json!({ "character": id }),
        );
    }

    /// Mark a living character dead.
    pub fn kill(&mut self, idx: usize, cause: &str) {
        let Some(character) = self.characters.get_mut(idx) else {
            return;
        };
        if character.is_dead {
            return;
        }
        character.is_dead = true;
        let (name, id, location) = (character.name.clone(), character.id, character.location);
        self.push_event(
            EventKind::CharacterKilled,
            EventSeverity::Critical,
            &[cause, "death"],
            format!("{name} dies at {location}"),
            serde_json::json!({ "character": id, "location": location }),
        );
    }

    /// Set the intrigue flag; returns whether it was newly set.
    pub fn corrupt(&mut self, idx: usize, cause: &str) -> bool {
        let Some(character) = self.characters.get_mut(idx) else {
            return false;
        };
        if character.is_dead || character.intrigue {
            return false;
        }
        character.intrigue = true;
        let (name, id) = (character.name.clone(), character.id);
        self.push_event(
            EventKind::IntrigueSpread,
            EventSeverity::Warning,
            &[cause, "intrigue"],
            format!("{name} is drawn into the intrigue"),
            serde_json::json!({ "character": id }),
        );
        true
    }

    /// Dig a grave for every dead character that has none yet.
    pub fn record_graves(&mut self) {
        let fresh: Vec<Grave> = self
            .characters
            .iter()
            .filter(|c| c.is_dead && !self.graves.iter().any(|g| g.character == c.id))
            .map(|c| Grave {
                character: c.id,
                name: c.name.clone(),
                location: c.location,
                day: self.day,
            })
            .collect();
        for grave in fresh {
            self.push_event(
                EventKind::GraveDug,
                EventSeverity::Info,
                &["grave"],
                format!("A grave for {} rises at {}", grave.name, grave.location),
                serde_json::json!({ "character": grave.character, "location": grave.location }),
            );
            self.graves.push(grave);
        }
    }

    /// Seal the session with `ending`; later calls are ignored.
    pub fn finish(&mut self, ending: Ending) {
        if self.ending.is_some() {
            return;
        }
        let severity = if ending.is_victory() {
            EventSeverity::Info
        } else {
            EventSeverity::Critical
        };
        log::debug!("session {} ended on day {}: {ending}", self.seed, self.day);
        self.push_event(
            EventKind::SessionEnded,
            severity,
            &["ending"],
            ending.to_string(),
            serde_json::to_value(&ending).unwrap_or(serde_json::Value::Null),
        );
        self.ending = Some(ending);
    }

    /// Journal length, used by the session to forward new lines to its sink.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Number of events logged today.
    #[must_use]
    pub fn events_today(&self) -> u16 {
        usize_to_u16(self.events.iter().filter(|e| e.id.day == self.day).count())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::cast::{PoolEntry, Region};
    use crate::script::ScriptPart;

    pub fn part(id: &str, tag: Option<&str>) -> ScriptPart {
        ScriptPart {
            id: id.to_string(),
            name: id.to_string(),
            rule_tag: tag.map(str::to_string),
            roles: Vec::new(),
            panic_event: None,
            intrigue_event: None,
        }
    }

    pub fn person(id: u32, location: Location, sanity: i32) -> Character {
        let entry = PoolEntry {
            id: CharacterId(id),
            name: format!("C{id}"),
            gender: None,
            home: location.site(),
            sanity,
            forbidden_region: None,
        };
        Character::from_entry(&entry, location)
    }

    pub fn with_role(mut c: Character, role: &str, forbidden: Option<u8>) -> Character {
        c.role = role.to_string();
        c.forbidden_region = forbidden.map(Region);
        c
    }

    pub fn state_with(main: Option<&str>, sub: Option<&str>, characters: Vec<Character>) -> SessionState {
        let scripts = ScriptSelection {
            main: part("main", main),
            sub: part("sub", sub),
            foreshadow: part("omen", None),
        };
        SessionState::new(
            11,
            SessionConfig::default(),
            scripts,
            characters,
            BTreeSet::new(),
            Rc::new(RngBundle::from_user_seed(11)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn graves_are_dug_once_per_character() {
        let mut state = state_with(
            None,
            None,
            vec![person(1, Location::Site(0), 2), person(2, Location::Site(4), 2)],
        );
        state.kill(0, "test");
        state.record_graves();
        state.record_graves();
        assert_eq!(state.graves.len(), 1);
        assert_eq!(state.graves[0].location, Location::Site(0));
        assert_eq!(state.graves[0].day, 1);
    }

    #[test]
    fn kill_is_one_way_and_narrated_once() {
        let mut state = state_with(None, None, vec![person(1, Location::Site(0), 2)]);
        state.kill(0, "test");
        state.kill(0, "test");
        let deaths = state
            .events
            .iter()
            .filter(|e| e.kind == EventKind::CharacterKilled)
            .count();
        assert_eq!(deaths, 1);
    }

    #[test]
    fn sanity_damage_latches_and_corrupts() {
        let mut state = state_with(None, None, vec![person(1, Location::Site(0), 1)]);
        state.damage_sanity(0, 1, "test");
        assert!(state.characters[0].sanity_broken);
        assert!(state.characters[0].intrigue);
        assert!(
            state
                .events
                .iter()
                .any(|e| e.kind == EventKind::SanityBroken)
        );
    }

    #[test]
    fn arrival_for_missing_slot_reports_nothing() {
        let mut state = state_with(None, None, vec![person(1, Location::Site(0), 2)]);
        assert_eq!(state.arrive(5, Location::Site(1), "test"), None);
        assert!(state.events.is_empty());
        assert_eq!(
            state.arrive(0, Location::Site(1), "test"),
            Some(ArrivalOutcome::Arrived {
                location: Location::Site(1)
            })
        );
        assert_eq!(state.characters[0].location, Location::Site(1));
    }

    #[test]
    fn finish_keeps_first_ending() {
        let mut state = state_with(None, None, vec![person(1, Location::Site(0), 1)]);
        state.finish(Ending::Defeat(DefeatCause::AllDead));
        state.finish(Ending::Victory);
        assert_eq!(state.ending, Some(Ending::Defeat(DefeatCause::AllDead)));
    }

    #[test]
    fn event_ids_are_sequential_within_a_day() {
        let mut state = state_with(None, None, vec![person(1, Location::Site(0), 3)]);
        state.damage_sanity(0, 1, "a");
        state.damage_sanity(0, 1, "b");
        assert_eq!(state.events[0].id, EventId::new(1, 0));
        assert_eq!(state.events[1].id, EventId::new(1, 1));
        assert_eq!(state.events_today(), 2);

        state.day = 2;
        state.damage_sanity(0, 1, "c");
        assert_eq!(state.events[2].id, EventId::new(2, 0));
    }
}
