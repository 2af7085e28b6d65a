//! Foreshadow events: the panic event armed at dusk by a broken character
//! and the intrigue event armed at night by a corrupted mastermind.
//!
//! Each slot fires at most once per session.
use rand::Rng;
use rand::seq::SliceRandom;

use crate::cast::Location;
use crate::narration::{EventKind, EventSeverity};
use crate::rules::RuleTag;
use crate::script::{EventDirective, EventEffect};
use crate::state::{ForeshadowSlot, SessionState};

const TOXIC_GAS_DAMAGE: i32 = 2;
const SPILL_DAMAGE: i32 = 1;

/// Fire the panic event when any living character has broken down.
pub fn check_panic(state: &mut SessionState) -> bool {
    let armed = state.living().any(|c| c.sanity_broken);
    if !armed {
        return false;
    }
    let Some(directive) = state.scripts.foreshadow.panic_event.clone() else {
        return false;
    };
    trigger(state, ForeshadowSlot::Panic, &directive)
}

/// Fire the intrigue event when a corrupted mastermind is alive.
pub fn check_intrigue(state: &mut SessionState) -> bool {
    if !state.corrupted_mastermind_alive() {
        return false;
    }
    let Some(directive) = state.scripts.foreshadow.intrigue_event.clone() else {
        return false;
    };
    trigger(state, ForeshadowSlot::Intrigue, &directive)
}

fn trigger(state: &mut SessionState, slot: ForeshadowSlot, directive: &EventDirective) -> bool {
    if !state.fired_events.insert(slot) {
        return false;
    }
    state.push_event(
        EventKind::ForeshadowTriggered,
        EventSeverity::Critical,
        &["foreshadow"],
        format!("Foreshadowing: {} strikes {}", directive.name, directive.location),
        serde_json::json!({
            "slot": slot,
            "name": directive.name,
            "location": directive.location,
            "effect": directive.effect,
        }),
    );
    apply_effect(state, directive);
    true
}

/// Apply a directive's effect to the characters at its location.
pub fn apply_effect(state: &mut SessionState, directive: &EventDirective) {
    let location = directive.location;
    let cause = directive.name.as_str();
    match directive.effect {
        EventEffect::SpreadInsanity => sanity_blast(state, location, SPILL_DAMAGE, cause),
        EventEffect::ToxicGas => sanity_blast(state, location, TOXIC_GAS_DAMAGE, cause),
        EventEffect::Riot => {
            sanity_blast(state, location, SPILL_DAMAGE, cause);
            riot(state, location, cause);
        }
        EventEffect::RandomTeleport => {
            let rng = state.rng();
            for idx in state.living_at(location) {
                let site_count = state.layout.site_count;
                let destination = Location::Site(rng.event().gen_range(0..site_count));
                state.arrive(idx, destination, cause);
            }
        }
        EventEffect::Suicide => {
            let victim = state
                .living_at(location)
                .into_iter()
                .find(|idx| state.characters[*idx].sanity <= 0);
            if let Some(idx) = victim {
                state.kill(idx, cause);
            }
        }
        EventEffect::KillOne => {
            let rng = state.rng();
            let victim = state.living_at(location).choose(&mut *rng.event()).copied();
            if let Some(idx) = victim {
                state.kill(idx, cause);
            }
        }
        EventEffect::Massacre => {
            for idx in state.living_at(location) {
                state.kill(idx, cause);
            }
        }
        EventEffect::Defeat => {
            state.scripted_defeat = Some(directive.name.clone());
        }
    }
}

/// Sanity loss at `location`; under cognitive collapse the adjacent sites
/// and the station lose one more point each.
fn sanity_blast(state: &mut SessionState, location: Location, amount: i32, cause: &str) {
    for idx in state.living_at(location) {
        state.damage_sanity(idx, amount, cause);
    }
    if !state.rules.has(&RuleTag::CognitiveCollapse) {
        return;
    }
    let mut spill: Vec<Location> = match location {
        Location::Site(site) => state
            .layout
            .neighbors(site)
            .into_iter()
            .map(Location::Site)
            .collect(),
        Location::Station => Vec::new(),
    };
    if !location.is_station() {
        spill.push(Location::Station);
    }
    for target in spill {
        for idx in state.living_at(target) {
            state.damage_sanity(idx, SPILL_DAMAGE, "cognitive_collapse");
        }
    }
}

/// Scatter everyone at `location` and close it for the rest of the day.
fn riot(state: &mut SessionState, location: Location, cause: &str) {
    let rng = state.rng();
    for idx in state.living_at(location) {
        let options: Vec<Location> = match location {
            Location::Site(site) => state
                .layout
                .neighbors(site)
                .into_iter()
                .map(Location::Site)
                .filter(|site| !state.blocked_locations.contains(site))
                .collect(),
            Location::Station => state.layout.sites().collect(),
        };
        let destination = options.choose(&mut *rng.event()).copied();
        if let Some(destination) = destination {
            state.arrive(idx, destination, cause);
        }
    }
    state.blocked_locations.insert(location);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::fixtures::{person, state_with};

    fn directive(effect: EventEffect, location: Location) -> EventDirective {
        EventDirective {
            name: String::from("Omen"),
            location,
            effect,
        }
    }

    #[test]
    fn panic_needs_a_broken_character_and_fires_once() {
        let mut state = state_with(
            None,
            None,
            vec![person(1, Location::Site(0), 2), person(2, Location::Site(0), 2)],
        );
        state.scripts.foreshadow.panic_event =
            Some(directive(EventEffect::SpreadInsanity, Location::Site(0)));
        assert!(!check_panic(&mut state));

        state.characters[0].sanity_broken = true;
        assert!(check_panic(&mut state));
        assert_eq!(state.characters[1].sanity, 1);
        assert!(!check_panic(&mut state));
        assert_eq!(state.characters[1].sanity, 1);
    }

    #[test]
    fn intrigue_needs_a_corrupted_mastermind() {
        let mut state = state_with(
            None,
            None,
            vec![person(1, Location::Site(3), 2), person(2, Location::Site(3), 2)],
        );
        state.scripts.foreshadow.intrigue_event =
            Some(directive(EventEffect::Massacre, Location::Site(3)));
        state.characters[0].intrigue = true;
        assert!(!check_intrigue(&mut state));

        state.masterminds.insert(state.characters[0].id);
        assert!(check_intrigue(&mut state));
        assert!(state.characters.iter().all(|c| c.is_dead));
    }

    #[test]
    fn toxic_gas_spills_under_cognitive_collapse() {
        let characters = vec![
            person(1, Location::Site(4), 3),
            person(2, Location::Site(5), 3),
            person(3, Location::Station, 3),
            person(4, Location::Site(8), 3),
        ];
        let mut state = state_with(None, Some("cognitive_collapse"), characters);
        apply_effect(&mut state, &directive(EventEffect::ToxicGas, Location::Site(4)));
        let sanity: Vec<i32> = state.characters.iter().map(|c| c.sanity).collect();
        assert_eq!(sanity, [1, 2, 2, 3]);
    }

    #[test]
    fn riot_scatters_and_blocks() {
        let mut state = state_with(
            None,
            None,
            vec![person(1, Location::Site(6), 3), person(2, Location::Site(6), 3)],
        );
        apply_effect(&mut state, &directive(EventEffect::Riot, Location::Site(6)));
        assert!(state.blocked_locations.contains(&Location::Site(6)));
        for c in &state.characters {
            assert_eq!(c.sanity, 2);
            assert!(state.layout.are_adjacent(Location::Site(6), c.location));
        }
    }

    #[test]
    fn suicide_takes_the_broken_character_at_the_location() {
        let mut state = state_with(
            None,
            None,
            vec![person(1, Location::Site(7), 2), person(2, Location::Site(7), 0)],
        );
        apply_effect(&mut state, &directive(EventEffect::Suicide, Location::Site(7)));
        assert!(state.characters[0].is_alive());
        assert!(state.characters[1].is_dead);
    }

    #[test]
    fn kill_one_and_defeat() {
        let mut state = state_with(
            None,
            None,
            vec![person(1, Location::Site(3), 2), person(2, Location::Site(3), 2)],
        );
        apply_effect(&mut state, &directive(EventEffect::KillOne, Location::Site(3)));
        assert_eq!(state.characters.iter().filter(|c| c.is_dead).count(), 1);

        apply_effect(&mut state, &directive(EventEffect::Defeat, Location::Site(1)));
        assert_eq!(state.scripted_defeat.as_deref(), Some("Omen"));
    }

    #[test]
    fn teleport_lands_everyone_on_the_ring() {
        let mut state = state_with(
            None,
            None,
            vec![person(1, Location::Station, 3), person(2, Location::Station, 3)],
        );
        apply_effect(
            &mut state,
            &directive(EventEffect::RandomTeleport, Location::Station),
        );
        for c in &state.characters {
            assert!(state.layout.contains(c.location));
        }
    }
}
