//! The five daily phases and the work each one performs.
//!
//! Phase structs borrow the session state for the duration of a single
//! phase so each step only touches the slices it owns.
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ability::AbilityEngine;
use crate::cast::Location;
use crate::constants::VIRUS_STATION_LOSS;
use crate::events;
use crate::movement::calculate_auto_move;
use crate::narration::{EventKind, EventSeverity};
use crate::rules::{self, RuleTag};
use crate::state::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Sunrise,
    Morning,
    Noon,
    Dusk,
    Night,
}

impl Phase {
    pub const ALL: [Self; 5] = [
        Self::Sunrise,
        Self::Morning,
        Self::Noon,
        Self::Dusk,
        Self::Night,
    ];

    /// Phase that follows this one; night wraps to the next sunrise.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Sunrise => Self::Morning,
            Self::Morning => Self::Noon,
            Self::Noon => Self::Dusk,
            Self::Dusk => Self::Night,
            Self::Night => Self::Sunrise,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sunrise => "Sunrise",
            Self::Morning => "Morning",
            Self::Noon => "Noon",
            Self::Dusk => "Dusk",
            Self::Night => "Night",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub(crate) struct SunrisePhase<'a> {
    state: &'a mut SessionState,
    abilities: &'a AbilityEngine,
}

impl<'a> SunrisePhase<'a> {
    pub(crate) const fn new(state: &'a mut SessionState, abilities: &'a AbilityEngine) -> Self {
        Self { state, abilities }
    }

    pub(crate) fn run(&mut self) {
        self.state.blocked_locations.clear();
        let exposure = self.state.config.exposure_loss;
        let exposed: Vec<usize> = self
            .state
            .characters
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_alive() && !c.location.is_station())
            .map(|(idx, _)| idx)
            .collect();
        for idx in exposed {
            self.state.damage_sanity(idx, exposure, "exposure");
        }
        self.abilities.run_phase(self.state, Phase::Sunrise);
    }
}

pub(crate) struct MorningPhase<'a> {
    state: &'a mut SessionState,
}

impl<'a> MorningPhase<'a> {
    pub(crate) const fn new(state: &'a mut SessionState) -> Self {
        Self { state }
    }

    pub(crate) fn run(&mut self) {
        let rng = self.state.rng();
        if self.state.rules.has(&RuleTag::StormySeas)
            && rng
                .movement()
                .gen_bool(self.state.config.storm_skip_chance)
        {
            self.state.push_event(
                EventKind::CharacterMoved,
                EventSeverity::Warning,
                &["storm"],
                "A storm rages; nobody can travel this morning",
                serde_json::Value::Null,
            );
            return;
        }
        let layout = self.state.layout;
        let stay_chance = self.state.config.stay_chance;
        let virus = self.state.rules.has(&RuleTag::VirusStation);
        for idx in 0..self.state.characters.len() {
            let character = &self.state.characters[idx];
            if character.is_dead || Some(character.id) == self.state.controlled {
                continue;
            }
            let current = character.location;
            if current.is_station() {
                continue;
            }
            let next = calculate_auto_move(
                current,
                &self.state.blocked_locations,
                layout,
                stay_chance,
                &mut *rng.movement(),
            );
            let Some(outcome) = self.state.arrive(idx, next, "morning") else {
                continue;
            };
            let landed = outcome.final_location();
            if virus && landed == Location::Station {
                self.state
                    .damage_sanity(idx, VIRUS_STATION_LOSS, "virus_station");
            }
        }
    }
}

pub(crate) struct NoonPhase<'a> {
    state: &'a mut SessionState,
}

impl<'a> NoonPhase<'a> {
    pub(crate) const fn new(state: &'a mut SessionState) -> Self {
        Self { state }
    }

    pub(crate) fn run(&mut self) {
        self.state.action_points = self.state.config.base_action_points;
    }
}

pub(crate) struct DuskPhase<'a> {
    state: &'a mut SessionState,
    abilities: &'a AbilityEngine,
}

impl<'a> DuskPhase<'a> {
    pub(crate) const fn new(state: &'a mut SessionState, abilities: &'a AbilityEngine) -> Self {
        Self { state, abilities }
    }

    pub(crate) fn run(&mut self) {
        self.state.action_points = 0;
        self.abilities.run_phase(self.state, Phase::Dusk);
        events::check_panic(self.state);
        if let Some(ending) = rules::immediate_ending(self.state) {
            self.state.finish(ending);
        }
    }
}

pub(crate) struct NightPhase<'a> {
    state: &'a mut SessionState,
    abilities: &'a AbilityEngine,
}

impl<'a> NightPhase<'a> {
    pub(crate) const fn new(state: &'a mut SessionState, abilities: &'a AbilityEngine) -> Self {
        Self { state, abilities }
    }

    pub(crate) fn run(&mut self) {
        self.abilities.run_phase(self.state, Phase::Night);
        self.spread_intrigue();
        events::check_intrigue(self.state);
        self.state.record_graves();
        if let Some(ending) = rules::evaluate(self.state) {
            self.state.finish(ending);
        }
    }

    /// Contagion from a snapshot of tonight's corrupted, then at most one cure.
    fn spread_intrigue(&mut self) {
        let rng = self.state.rng();
        let contagion = self.state.config.contagion_chance;
        let carriers: Vec<usize> = self
            .state
            .characters
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_alive() && c.intrigue)
            .map(|(idx, _)| idx)
            .collect();
        for carrier in carriers {
            let location = self.state.characters[carrier].location;
            let neighbours: Vec<usize> = self
                .state
                .living_at(location)
                .into_iter()
                .filter(|idx| *idx != carrier)
                .collect();
            if neighbours.is_empty() {
                continue;
            }
            let mut stream = rng.contagion();
            if !stream.gen_bool(contagion) {
                continue;
            }
            let target = neighbours.choose(&mut *stream).copied();
            drop(stream);
            if let Some(target) = target {
                self.state.corrupt(target, "contagion");
            }
        }

        let corrupted: Vec<usize> = self
            .state
            .characters
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_alive() && c.intrigue)
            .map(|(idx, _)| idx)
            .collect();
        if corrupted.is_empty() {
            return;
        }
        let mut stream = rng.contagion();
        if !stream.gen_bool(self.state.config.cure_chance) {
            return;
        }
        let cured = corrupted.choose(&mut *stream).copied();
        drop(stream);
        if let Some(idx) = cured {
            self.state.characters[idx].intrigue = false;
            let (name, id) = (
                self.state.characters[idx].name.clone(),
                self.state.characters[idx].id,
            );
            self.state.push_event(
                EventKind::IntrigueCured,
                EventSeverity::Info,
                &["contagion", "intrigue"],
                format!("{name} shakes off the intrigue"),
                serde_json::json!({ "character": id }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::fixtures::{person, state_with, with_role};

    fn engine() -> AbilityEngine {
        AbilityEngine::new(&[])
    }

    #[test]
    fn phases_cycle_in_order() {
        let mut phase = Phase::Sunrise;
        for expected in Phase::ALL.iter().cycle().skip(1).take(5) {
            phase = phase.next();
            assert_eq!(phase, *expected);
        }
        assert_eq!(Phase::Night.next(), Phase::Sunrise);
    }

    #[test]
    fn every_sunrise_costs_exposure_outside_the_station() {
        let mut state = state_with(
            None,
            None,
            vec![person(1, Location::Site(0), 2), person(2, Location::Station, 2)],
        );
        state.blocked_locations.insert(Location::Site(4));
        assert_eq!(state.day, 1);
        SunrisePhase::new(&mut state, &engine()).run();
        assert!(state.blocked_locations.is_empty());
        assert_eq!(state.characters[0].sanity, 1);
        assert_eq!(state.characters[1].sanity, 2);

        state.day = 2;
        SunrisePhase::new(&mut state, &engine()).run();
        assert_eq!(state.characters[0].sanity, 0);
        assert_eq!(state.characters[1].sanity, 2);
    }

    #[test]
    fn morning_leaves_station_and_dead_in_place() {
        let mut dead = person(1, Location::Site(3), 2);
        dead.is_dead = true;
        let mut state = state_with(
            None,
            None,
            vec![dead, person(2, Location::Station, 2)],
        );
        state.config.stay_chance = 0.0;
        MorningPhase::new(&mut state).run();
        assert_eq!(state.characters[0].location, Location::Site(3));
        assert_eq!(state.characters[1].location, Location::Station);
    }

    #[test]
    fn morning_moves_to_a_neighbour() {
        let mut state = state_with(None, None, vec![person(1, Location::Site(3), 2)]);
        state.config.stay_chance = 0.0;
        MorningPhase::new(&mut state).run();
        let location = state.characters[0].location;
        assert!(state.layout.are_adjacent(Location::Site(3), location));
    }

    #[test]
    fn controlled_character_is_not_auto_moved() {
        let mut state = state_with(None, None, vec![person(1, Location::Site(3), 2)]);
        state.config.stay_chance = 0.0;
        state.controlled = Some(state.characters[0].id);
        MorningPhase::new(&mut state).run();
        assert_eq!(state.characters[0].location, Location::Site(3));
    }

    #[test]
    fn virus_station_taxes_bounced_arrivals() {
        let walker = with_role(person(1, Location::Site(2), 2), "witness", Some(1));
        let mut state = state_with(None, Some("virus_station"), vec![walker]);
        state.config.stay_chance = 0.0;
        state.blocked_locations.insert(Location::Site(1));
        MorningPhase::new(&mut state).run();
        assert_eq!(state.characters[0].location, Location::Station);
        assert_eq!(state.characters[0].sanity, 0);
        assert!(state.characters[0].sanity_broken);
    }

    #[test]
    fn noon_resets_and_dusk_forfeits_points() {
        let mut state = state_with(None, None, vec![person(1, Location::Site(3), 2)]);
        NoonPhase::new(&mut state).run();
        assert_eq!(state.action_points, 5);
        DuskPhase::new(&mut state, &engine()).run();
        assert_eq!(state.action_points, 0);
        assert!(state.ending.is_none());
    }

    #[test]
    fn night_digs_graves_and_declares_victory_on_last_day() {
        let mut dead = person(1, Location::Site(3), 2);
        dead.is_dead = true;
        let mut state = state_with(None, None, vec![dead, person(2, Location::Site(6), 2)]);
        NightPhase::new(&mut state, &engine()).run();
        assert_eq!(state.graves.len(), 1);
        assert!(state.ending.is_none());

        state.day = state.config.max_days;
        NightPhase::new(&mut state, &engine()).run();
        assert_eq!(state.graves.len(), 1);
        assert!(state.ending.as_ref().is_some_and(|e| e.is_victory()));
    }

    #[test]
    fn certain_contagion_reaches_every_neighbour_over_time() {
        let mut carrier = person(1, Location::Site(5), 2);
        carrier.intrigue = true;
        let mut state = state_with(None, None, vec![carrier, person(2, Location::Site(5), 2)]);
        state.config.contagion_chance = 1.0;
        state.config.cure_chance = 0.0;
        NightPhase::new(&mut state, &engine()).run();
        assert!(state.characters[1].intrigue);
    }

    #[test]
    fn certain_cure_clears_one_corrupted() {
        let mut a = person(1, Location::Site(5), 2);
        a.intrigue = true;
        let mut b = person(2, Location::Site(9), 2);
        b.intrigue = true;
        let mut state = state_with(None, None, vec![a, b]);
        state.config.contagion_chance = 0.0;
        state.config.cure_chance = 1.0;
        NightPhase::new(&mut state, &engine()).run();
        let corrupted = state.characters.iter().filter(|c| c.intrigue).count();
        assert_eq!(corrupted, 1);
    }
}
