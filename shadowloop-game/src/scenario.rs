//! Scenario builder: picks the script triple, samples a roster and deals
//! the hidden roles.
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::cast::{CastPool, Character, CharacterId, Location};
use crate::config::{ConfigError, SessionConfig};
use crate::movement::MapLayout;
use crate::rules::{ActiveRules, RuleTag};
use crate::script::{RoleRequirement, ScriptCatalog, ScriptCategory, ScriptPart};
use crate::state::ScriptSelection;

/// Reasons a scenario cannot be built; no partial scenario is ever returned.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScenarioError {
    #[error("the catalog has no {0} script parts")]
    EmptyCategory(&'static str),
    #[error("cast pool holds {available} characters but the roster needs {needed}")]
    PoolTooSmall { needed: usize, available: usize },
    #[error("selected scripts need {needed} role holders but the roster has {roster}")]
    RosterTooSmall { needed: usize, roster: usize },
    #[error("event '{event}' of part '{part}' targets {location}, which is off the map")]
    EventOffMap {
        part: String,
        event: String,
        location: Location,
    },
    #[error("{character} lives at site {site}, which is off the map")]
    HomeOffMap { character: CharacterId, site: u8 },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Output of a successful build.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub scripts: ScriptSelection,
    /// Roster in pool id order.
    pub characters: Vec<Character>,
    pub masterminds: BTreeSet<CharacterId>,
}

impl Scenario {
    /// Number of characters holding `role`.
    #[must_use]
    pub fn role_count(&self, role: &str) -> usize {
        self.characters.iter().filter(|c| c.has_role(role)).count()
    }
}

/// Builds scenarios from a catalog it never mutates.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioBuilder<'a> {
    catalog: &'a ScriptCatalog,
    config: &'a SessionConfig,
}

impl<'a> ScenarioBuilder<'a> {
    #[must_use]
    pub const fn new(catalog: &'a ScriptCatalog, config: &'a SessionConfig) -> Self {
        Self { catalog, config }
    }

    /// Select parts and deal roles using `rng` for every random choice.
    ///
    /// # Errors
    ///
    /// Returns `ScenarioError` when the configuration is invalid, a category
    /// is empty, the pool or roster is too small, or data points off the map.
    pub fn build<R: Rng + ?Sized>(
        &self,
        pool: &CastPool,
        rng: &mut R,
    ) -> Result<Scenario, ScenarioError> {
        self.config.validate()?;
        let layout = MapLayout::from_config(self.config);
        let scripts = self.select_parts(rng)?;
        for part in scripts.parts() {
            check_events(part, layout)?;
        }

        let roster_size = self.config.roster_size;
        if pool.len() < roster_size {
            return Err(ScenarioError::PoolTooSmall {
                needed: roster_size,
                available: pool.len(),
            });
        }
        let requirements: Vec<&RoleRequirement> = scripts
            .parts()
            .into_iter()
            .flat_map(|part| part.roles.iter())
            .collect();
        let needed: usize = requirements
            .iter()
            .map(|req| usize::try_from(req.count).unwrap_or(usize::MAX))
            .fold(0, usize::saturating_add);
        if needed > roster_size {
            return Err(ScenarioError::RosterTooSmall {
                needed,
                roster: roster_size,
            });
        }

        let mut sampled: Vec<_> = pool
            .entries
            .choose_multiple(&mut *rng, roster_size)
            .collect();
        sampled.sort_by_key(|entry| entry.id);

        let mut characters = Vec::with_capacity(roster_size);
        for entry in &sampled {
            let location = match entry.home {
                Some(site) if site >= layout.site_count => {
                    return Err(ScenarioError::HomeOffMap {
                        character: entry.id,
                        site,
                    });
                }
                Some(site) => Location::Site(site),
                None => Location::Site(rng.gen_range(0..layout.site_count)),
            };
            characters.push(Character::from_entry(entry, location));
        }

        let mut order: Vec<usize> = (0..characters.len()).collect();
        order.shuffle(&mut *rng);
        let mut assigned = vec![false; characters.len()];
        let mut masterminds = BTreeSet::new();
        for req in requirements {
            for _ in 0..req.count {
                let pick = order
                    .iter()
                    .copied()
                    .find(|idx| {
                        !assigned[*idx]
                            && req
                                .gender
                                .is_none_or(|gender| characters[*idx].gender == Some(gender))
                    })
                    .or_else(|| order.iter().copied().find(|idx| !assigned[*idx]));
                let Some(idx) = pick else {
                    return Err(ScenarioError::RosterTooSmall {
                        needed,
                        roster: roster_size,
                    });
                };
                assigned[idx] = true;
                let character = &mut characters[idx];
                character.role.clone_from(&req.name);
                character.forbidden_region = sampled[idx].forbidden_region;
                if let Some(sanity) = req.sanity {
                    character.sanity = sanity;
                    character.max_sanity = sanity;
                }
                if req.mastermind {
                    masterminds.insert(character.id);
                }
                log::debug!("dealt role '{}' to {}", req.name, character.name);
            }
        }

        if self.config.seed_intrigue
            && let Some(character) = characters.choose_mut(&mut *rng)
        {
            character.intrigue = true;
        }

        let rules = ActiveRules::from_selection(&scripts);
        if rules.has(&RuleTag::Masquerade) {
            for character in &mut characters {
                character.gender = None;
            }
        }

        log::debug!(
            "scenario built: main '{}', sub '{}', foreshadow '{}', {} role holder(s)",
            scripts.main.id,
            scripts.sub.id,
            scripts.foreshadow.id,
            needed
        );
        Ok(Scenario {
            scripts,
            characters,
            masterminds,
        })
    }

    fn select_parts<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<ScriptSelection, ScenarioError> {
        let mut pick = |category: ScriptCategory| -> Result<ScriptPart, ScenarioError> {
            self.catalog
                .parts(category)
                .choose(&mut *rng)
                .cloned()
                .ok_or(ScenarioError::EmptyCategory(category.label()))
        };
        Ok(ScriptSelection {
            main: pick(ScriptCategory::Main)?,
            sub: pick(ScriptCategory::Sub)?,
            foreshadow: pick(ScriptCategory::Foreshadow)?,
        })
    }
}

fn check_events(part: &ScriptPart, layout: MapLayout) -> Result<(), ScenarioError> {
    for event in [&part.panic_event, &part.intrigue_event].into_iter().flatten() {
        if !layout.contains(event.location) {
            return Err(ScenarioError::EventOffMap {
                part: part.id.clone(),
                event: event.name.clone(),
                location: event.location,
            });
        }
    }
    Ok(())
}
