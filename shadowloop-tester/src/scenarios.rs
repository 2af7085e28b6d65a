use anyhow::{Result, ensure};
use std::collections::BTreeSet;

use shadowloop_game::{CharacterId, EventKind};

use crate::logic::{PolicyKind, SimulationPlan, SimulationSummary};

/// Named simulation plan runnable from the CLI.
#[derive(Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub plan: SimulationPlan,
}

impl TestScenario {
    #[must_use]
    pub fn simulation(name: impl Into<String>, plan: SimulationPlan) -> Self {
        Self {
            name: name.into(),
            plan,
        }
    }

    /// Same checks, different observer.
    #[must_use]
    pub fn with_policy(mut self, policy: PolicyKind) -> Self {
        self.plan.policy = policy;
        self
    }
}

const SCENARIOS: [(&str, &str); 7] = [
    ("smoke", "Smoke Test"),
    ("deterministic-replay", "Deterministic Replay Verification"),
    ("role-assignment", "Role Assignment Completeness"),
    ("sanity-bounds", "Sanity Bounds and Corruption Latch"),
    ("forbidden-regions", "Forbidden Region Enforcement"),
    ("action-points", "Action Point Monotonicity"),
    ("ending-exclusivity", "Single Ending and Grave Idempotence"),
];

pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    SCENARIOS.to_vec()
}

/// Every scenario key, in listing order.
pub fn all_scenario_keys() -> Vec<String> {
    SCENARIOS.iter().map(|(key, _)| (*key).to_string()).collect()
}

pub fn get_scenario(name: &str) -> Option<TestScenario> {
    let key = name.to_lowercase();
    let (key, title) = SCENARIOS
        .iter()
        .find(|(candidate, _)| *candidate == key.as_str())?;
    let plan = match *key {
        "smoke" => SimulationPlan::new(PolicyKind::Caretaker).with_expectation(smoke_expectation),
        "deterministic-replay" => SimulationPlan::new(PolicyKind::Random)
            .with_replay()
            .with_expectation(replay_expectation),
        "role-assignment" => {
            SimulationPlan::new(PolicyKind::Passive).with_expectation(role_assignment_expectation)
        }
        "sanity-bounds" => {
            SimulationPlan::new(PolicyKind::Caretaker).with_expectation(sanity_expectation)
        }
        "forbidden-regions" => {
            SimulationPlan::new(PolicyKind::Random).with_expectation(forbidden_expectation)
        }
        "action-points" => {
            SimulationPlan::new(PolicyKind::Inquisitor).with_expectation(action_point_expectation)
        }
        "ending-exclusivity" => {
            SimulationPlan::new(PolicyKind::Random).with_expectation(ending_expectation)
        }
        _ => return None,
    };
    Some(TestScenario::simulation(*title, plan))
}

fn smoke_expectation(summary: &SimulationSummary) -> Result<()> {
    let state = &summary.final_state;
    ensure!(summary.ending.is_some(), "session never reached an ending");
    ensure!(
        state.day <= state.config.max_days,
        "session ran past the last day ({} > {})",
        state.day,
        state.config.max_days
    );
    ensure!(!summary.narration.is_empty(), "nothing was narrated");
    ensure!(
        summary.narration.len() == state.events.len(),
        "sink saw {} lines but the journal holds {}",
        summary.narration.len(),
        state.events.len()
    );
    Ok(())
}

fn replay_expectation(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.replay_digest == Some(summary.digest),
        "replay digest {:?} differs from {:#x}",
        summary.replay_digest,
        summary.digest
    );
    Ok(())
}

fn role_assignment_expectation(summary: &SimulationSummary) -> Result<()> {
    let state = &summary.final_state;
    let mut needed = 0;
    for part in state.scripts.parts() {
        for req in &part.roles {
            let holders = state
                .characters
                .iter()
                .filter(|c| c.role == req.name)
                .count();
            let expected = usize::try_from(req.count)?;
            ensure!(
                holders >= expected,
                "role '{}' from '{}' has {holders} holder(s), needs {expected}",
                req.name,
                part.id
            );
            needed += expected;
        }
    }
    let dealt = state.characters.iter().filter(|c| !c.is_civilian()).count();
    ensure!(
        dealt == needed,
        "{dealt} characters hold roles but the scripts ask for {needed}"
    );
    ensure!(
        state.characters.len() == state.config.roster_size,
        "roster has {} characters, expected {}",
        state.characters.len(),
        state.config.roster_size
    );
    Ok(())
}

fn sanity_expectation(summary: &SimulationSummary) -> Result<()> {
    for character in &summary.final_state.characters {
        ensure!(
            character.sanity <= character.max_sanity,
            "{} sits at {} sanity over a ceiling of {}",
            character.name,
            character.sanity,
            character.max_sanity
        );
        if character.is_alive() && character.sanity <= 0 {
            ensure!(
                character.sanity_broken,
                "{} reached {} sanity without the breakdown latch",
                character.name,
                character.sanity
            );
        }
    }
    Ok(())
}

fn forbidden_expectation(summary: &SimulationSummary) -> Result<()> {
    let state = &summary.final_state;
    for character in state.living() {
        let region = state.layout.region_of(character.location);
        ensure!(
            character.forbidden_region.is_none() || region != character.forbidden_region,
            "{} stands inside its forbidden region at {}",
            character.name,
            character.location
        );
    }
    Ok(())
}

fn action_point_expectation(summary: &SimulationSummary) -> Result<()> {
    let base = summary.final_state.config.base_action_points;
    for noon in &summary.noons {
        let mut last = base;
        for points in &noon.points_trace {
            ensure!(
                *points <= last,
                "day {}: action points rose from {last} to {points}",
                noon.day
            );
            last = *points;
        }
        ensure!(
            noon.points_left <= base,
            "day {}: {} points left over a base of {base}",
            noon.day,
            noon.points_left
        );
    }
    Ok(())
}

fn ending_expectation(summary: &SimulationSummary) -> Result<()> {
    let state = &summary.final_state;
    let endings = state
        .events
        .iter()
        .filter(|event| event.kind == EventKind::SessionEnded)
        .count();
    ensure!(endings == 1, "journal records {endings} endings");
    let buried: BTreeSet<CharacterId> = state.graves.iter().map(|g| g.character).collect();
    ensure!(
        buried.len() == state.graves.len(),
        "a character was buried twice"
    );
    for grave in &state.graves {
        let dead = state
            .character(grave.character)
            .is_some_and(|c| c.is_dead);
        ensure!(dead, "grave for living character {}", grave.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::ObserverRunner;

    #[test]
    fn every_listed_scenario_resolves() {
        for (key, title) in list_scenarios() {
            let scenario = get_scenario(key).unwrap();
            assert_eq!(scenario.name, title);
        }
        assert!(get_scenario("weather").is_none());
    }

    #[test]
    fn listed_scenarios_pass_on_a_few_seeds() {
        let runner = ObserverRunner::new(false);
        for key in all_scenario_keys() {
            let scenario = get_scenario(&key).unwrap();
            for seed in [1, 2, 3] {
                let summary = runner.run_plan(&scenario.plan, seed).unwrap();
                for expectation in &scenario.plan.expectations {
                    expectation.evaluate(&summary).unwrap();
                }
            }
        }
    }

    #[test]
    fn policy_override_keeps_expectations() {
        let scenario = get_scenario("smoke")
            .unwrap()
            .with_policy(PolicyKind::Passive);
        assert_eq!(scenario.plan.policy, PolicyKind::Passive);
        assert_eq!(scenario.plan.expectations.len(), 1);
    }
}
