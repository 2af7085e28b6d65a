//! Rule registry: loss predicates keyed by rule tag and sub-rule modifiers.
//!
//! Evaluation order is fixed so at most one ending fires per night:
//!
//! 1. everyone dead
//! 2. a scripted defeat raised by a foreshadow event
//! 3. the main part's loss predicate
//! 4. the sub part's loss predicate
//! 5. victory once the last day's night is reached
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use crate::cast::{Character, Location, Region};
use crate::constants::{
    ALTAR_GRAVES_PER_LOCATION, ANDROID_ROLE, ASK_COST, BASE_MOVE_COST, BIOHAZARD_BROKEN_COUNT,
    FESTIVAL_CORRUPTED_LIMIT, INTERROGATION_ASK_COST, LOCKDOWN_SURCHARGE, QUARANTINE_REGION,
    REACTOR_SITE, SACRIFICE_GRAVE_COUNT, STATION_CROWD_LIMIT, STRICT_GRAVE_LIMIT, TYCOON_ROLE,
    VAMPIRE_GRAVE_LIMIT, VAMPIRE_ROLE,
};
use crate::movement::MapLayout;
use crate::state::{DefeatCause, Ending, ScriptSelection, SessionState};

/// Known rule tags; anything else is carried verbatim as `Unregistered`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuleTag {
    HumanSacrifice,
    SecretAltar,
    EvilFestival,
    GravesLimitStrict,
    StationLimit,
    Biohazard,
    AiAwakening,
    ReactorMeltdown,
    VampireHunt,
    SuccessionWar,
    GhostShip,
    NoEmptyZone,
    Masquerade,
    Lockdown,
    HighCostMove,
    CheapAsk,
    Interrogation,
    StormySeas,
    VirusStation,
    CognitiveCollapse,
    /// The part carries no rule tag.
    Untagged,
    /// A tag with no predicate or modifier configured.
    Unregistered(String),
}

impl RuleTag {
    const KNOWN: [(&'static str, Self); 20] = [
        ("human_sacrifice", Self::HumanSacrifice),
        ("secret_altar", Self::SecretAltar),
        ("evil_festival", Self::EvilFestival),
        ("graves_limit_strict", Self::GravesLimitStrict),
        ("station_limit", Self::StationLimit),
        ("biohazard", Self::Biohazard),
        ("ai_awakening", Self::AiAwakening),
        ("reactor_meltdown", Self::ReactorMeltdown),
        ("vampire_hunt", Self::VampireHunt),
        ("succession_war", Self::SuccessionWar),
        ("ghost_ship", Self::GhostShip),
        ("no_empty_zone", Self::NoEmptyZone),
        ("masquerade", Self::Masquerade),
        ("lockdown", Self::Lockdown),
        ("high_cost_move", Self::HighCostMove),
        ("cheap_ask", Self::CheapAsk),
        ("interrogation", Self::Interrogation),
        ("stormy_seas", Self::StormySeas),
        ("virus_station", Self::VirusStation),
        ("cognitive_collapse", Self::CognitiveCollapse),
    ];

    #[must_use]
    pub fn parse(tag: &str) -> Self {
        let tag = tag.trim();
        if tag.is_empty() {
            return Self::Untagged;
        }
        Self::KNOWN
            .iter()
            .find(|(name, _)| *name == tag)
            .map_or_else(|| Self::Unregistered(tag.to_string()), |(_, rule)| rule.clone())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Untagged => "",
            Self::Unregistered(tag) => tag.as_str(),
            known => Self::KNOWN
                .iter()
                .find(|(_, rule)| rule == known)
                .map_or("", |(name, _)| *name),
        }
    }

    /// Loss predicate registered for this tag.
    #[must_use]
    pub fn loss_predicate(&self) -> Option<LossPredicate> {
        let predicate: LossPredicate = match self {
            Self::HumanSacrifice => human_sacrifice,
            Self::SecretAltar => secret_altar,
            Self::EvilFestival => evil_festival,
            Self::GravesLimitStrict => graves_limit_strict,
            Self::StationLimit => station_limit,
            Self::Biohazard => biohazard,
            Self::AiAwakening => ai_awakening,
            Self::ReactorMeltdown => reactor_meltdown,
            Self::VampireHunt => vampire_hunt,
            Self::SuccessionWar => succession_war,
            Self::GhostShip => ghost_ship,
            Self::NoEmptyZone => no_empty_zone,
            Self::Unregistered(tag) => {
                log::debug!("rule tag '{tag}' has no predicate configured");
                return None;
            }
            _ => return None,
        };
        Some(predicate)
    }
}

impl Serialize for RuleTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Loss check evaluated against the session at night.
pub type LossPredicate = fn(&SessionState) -> bool;

/// Rule tags switched on by the selected main and sub parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveRules {
    pub main: RuleTag,
    pub sub: RuleTag,
}

impl ActiveRules {
    #[must_use]
    pub fn new(main: &str, sub: &str) -> Self {
        let rules = Self {
            main: RuleTag::parse(main),
            sub: RuleTag::parse(sub),
        };
        for tag in [&rules.main, &rules.sub] {
            if let RuleTag::Unregistered(name) = tag {
                log::debug!("rule tag '{name}' is not registered; it will never fire");
            }
        }
        rules
    }

    #[must_use]
    pub fn from_selection(scripts: &ScriptSelection) -> Self {
        Self::new(scripts.main.rule_tag(), scripts.sub.rule_tag())
    }

    /// Whether either active part carries `tag`.
    #[must_use]
    pub fn has(&self, tag: &RuleTag) -> bool {
        &self.main == tag || &self.sub == tag
    }

    /// AP cost of moving to `destination`.
    #[must_use]
    pub fn move_cost(&self, destination: Location, layout: MapLayout) -> u32 {
        let mut cost = BASE_MOVE_COST;
        if self.has(&RuleTag::Lockdown)
            && layout.region_of(destination) == Some(Region(QUARANTINE_REGION))
        {
            cost += LOCKDOWN_SURCHARGE;
        }
        if self.has(&RuleTag::HighCostMove) {
            cost *= 2;
        }
        cost
    }

    /// AP cost of questioning a character.
    #[must_use]
    pub fn ask_cost(&self) -> u32 {
        if self.has(&RuleTag::Interrogation) {
            INTERROGATION_ASK_COST
        } else if self.has(&RuleTag::CheapAsk) {
            0
        } else {
            ASK_COST
        }
    }
}

/// Endings that fire as soon as they hold, whatever the phase.
#[must_use]
pub fn immediate_ending(state: &SessionState) -> Option<Ending> {
    if !state.characters.is_empty() && state.characters.iter().all(|c| c.is_dead) {
        return Some(Ending::Defeat(DefeatCause::AllDead));
    }
    state
        .scripted_defeat
        .as_ref()
        .map(|name| Ending::Defeat(DefeatCause::ScriptedEvent { name: name.clone() }))
}

/// Run the registry in order and return the first ending that holds.
#[must_use]
pub fn evaluate(state: &SessionState) -> Option<Ending> {
    if let Some(ending) = immediate_ending(state) {
        return Some(ending);
    }
    for tag in [&state.rules.main, &state.rules.sub] {
        if let Some(predicate) = tag.loss_predicate()
            && predicate(state)
        {
            return Some(Ending::Defeat(DefeatCause::RuleBroken {
                tag: tag.as_str().to_string(),
            }));
        }
    }
    (state.day >= state.config.max_days).then_some(Ending::Victory)
}

fn living_count(state: &SessionState, filter: impl Fn(&Character) -> bool) -> usize {
    state.living().filter(|c| filter(c)).count()
}

fn human_sacrifice(state: &SessionState) -> bool {
    state.graves.len() >= SACRIFICE_GRAVE_COUNT
}

fn secret_altar(state: &SessionState) -> bool {
    let mut per_location: BTreeMap<Location, usize> = BTreeMap::new();
    for grave in &state.graves {
        *per_location.entry(grave.location).or_default() += 1;
    }
    per_location
        .values()
        .any(|count| *count >= ALTAR_GRAVES_PER_LOCATION)
}

fn evil_festival(state: &SessionState) -> bool {
    living_count(state, |c| c.intrigue) > FESTIVAL_CORRUPTED_LIMIT
}

fn graves_limit_strict(state: &SessionState) -> bool {
    state.graves.len() > STRICT_GRAVE_LIMIT
}

fn station_limit(state: &SessionState) -> bool {
    living_count(state, |c| c.location.is_station()) > STATION_CROWD_LIMIT
}

fn biohazard(state: &SessionState) -> bool {
    living_count(state, |c| c.sanity <= 0) >= BIOHAZARD_BROKEN_COUNT
}

fn ai_awakening(state: &SessionState) -> bool {
    state
        .living()
        .any(|c| c.has_role(ANDROID_ROLE) && c.intrigue)
}

fn reactor_meltdown(state: &SessionState) -> bool {
    state.living_at(Location::Site(REACTOR_SITE)).is_empty()
}

fn vampire_hunt(state: &SessionState) -> bool {
    state.living().any(|c| c.has_role(VAMPIRE_ROLE)) && state.graves.len() > VAMPIRE_GRAVE_LIMIT
}

fn succession_war(state: &SessionState) -> bool {
    state
        .characters
        .iter()
        .any(|c| c.has_role(TYCOON_ROLE) && c.is_dead)
}

fn ghost_ship(state: &SessionState) -> bool {
    state.graves.iter().any(|g| g.location.is_station())
}

fn no_empty_zone(state: &SessionState) -> bool {
    (0..state.layout.region_count()).any(|region| {
        state
            .layout
            .region_sites(Region(region))
            .all(|site| state.living_at(site).is_empty())
    })
}
