//! Data-driven role abilities.
//!
//! Each `role_data` row names a role, the phase it acts in, how it picks
//! targets and what it does to them. One resolver interprets every row.
use rand::seq::SliceRandom;
use std::collections::HashMap;

use crate::cast::Location;
use crate::phase::Phase;
use crate::script::{AbilityDirective, EffectKind, ScriptCatalog, TargetingRule};
use crate::state::SessionState;

/// Lookup table from role name to its ability rows.
#[derive(Debug, Clone, Default)]
pub struct AbilityEngine {
    table: HashMap<String, Vec<AbilityDirective>>,
}

impl AbilityEngine {
    #[must_use]
    pub fn new(directives: &[AbilityDirective]) -> Self {
        let mut table: HashMap<String, Vec<AbilityDirective>> = HashMap::new();
        for directive in directives {
            table
                .entry(directive.role.clone())
                .or_default()
                .push(directive.clone());
        }
        Self { table }
    }

    #[must_use]
    pub fn from_catalog(catalog: &ScriptCatalog) -> Self {
        Self::new(&catalog.role_data)
    }

    /// Rows for `role` that act during `phase`, in catalog order.
    pub fn directives_for<'a>(
        &'a self,
        role: &str,
        phase: Phase,
    ) -> impl Iterator<Item = &'a AbilityDirective> {
        self.table
            .get(role)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter(move |directive| directive.phase == phase)
    }

    /// Run every living character's abilities for `phase` in roster order.
    pub fn run_phase(&self, state: &mut SessionState, phase: Phase) {
        for idx in 0..state.characters.len() {
            self.run(idx, state, phase);
        }
    }

    /// Resolve the abilities of the character at `actor` for `phase`.
    ///
    /// No-op when the actor is dead or its role has no row for the phase.
    pub fn run(&self, actor: usize, state: &mut SessionState, phase: Phase) {
        let Some(character) = state.characters.get(actor) else {
            return;
        };
        if character.is_dead {
            return;
        }
        let role = character.role.clone();
        for directive in self.directives_for(&role, phase) {
            // An earlier row may have killed the actor.
            if state.characters.get(actor).is_none_or(|c| c.is_dead) {
                return;
            }
            resolve(actor, directive, state);
        }
    }
}

fn resolve(actor: usize, directive: &AbilityDirective, state: &mut SessionState) {
    let targets = select_targets(actor, &directive.targeting, state);
    log::trace!(
        "{} ({}) {:?} -> {} target(s)",
        state.characters[actor].name,
        directive.role,
        directive.effect,
        targets.len()
    );
    if targets.is_empty() {
        return;
    }
    let cause = directive.role.as_str();
    match directive.effect {
        EffectKind::Kill => {
            for target in targets {
                state.kill(target, cause);
            }
        }
        EffectKind::AddIntrigue => {
            for target in targets {
                state.corrupt(target, cause);
            }
        }
        EffectKind::SanityDamage => {
            for target in targets {
                state.damage_sanity(target, directive.magnitude, cause);
            }
        }
        EffectKind::RelocateSelf => {
            let destination: Option<Location> = targets
                .first()
                .and_then(|idx| state.characters.get(*idx))
                .map(|c| c.location);
            if let Some(destination) = destination
                && state.characters[actor].location != destination
            {
                state.arrive(actor, destination, cause);
            }
        }
    }
}

/// Indices of the characters an ability acts on.
fn select_targets(actor: usize, rule: &TargetingRule, state: &SessionState) -> Vec<usize> {
    let location = state.characters[actor].location;
    let others: Vec<usize> = state
        .living_at(location)
        .into_iter()
        .filter(|idx| *idx != actor)
        .collect();
    match rule {
        TargetingRule::AllOthersInLocation => others,
        TargetingRule::RandomOtherInLocation => {
            let rng = state.rng();
            let mut stream = rng.ability();
            others.choose(&mut *stream).copied().into_iter().collect()
        }
        TargetingRule::IsolationPair => {
            if others.len() == 1 {
                others
            } else {
                Vec::new()
            }
        }
        TargetingRule::LocateRole { role } => {
            let holders: Vec<usize> = state
                .characters
                .iter()
                .enumerate()
                .filter(|(idx, c)| *idx != actor && c.is_alive() && c.has_role(role))
                .map(|(idx, _)| idx)
                .collect();
            if holders.len() == 1 {
                holders
            } else {
                Vec::new()
            }
        }
    }
}
