use anyhow::{Context, Result};
use std::sync::Arc;

use shadowloop_game::{
    ActionOutcome, CommandError, DeductionReport, Ending, GameEngine, NarrationLog, Phase,
    Session, SessionConfig, SessionState, StaticLoader,
};

use crate::logic::policy::{ObserverCommand, ObserverPolicy, PolicyKind};

/// Upper bound on commands tried per noon, accepted or not.
const MAX_COMMANDS_PER_NOON: usize = 24;

/// Declarative plan for running a simulation session.
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub policy: PolicyKind,
    pub config: SessionConfig,
    /// Run every seed twice and record the second digest.
    pub replay: bool,
    pub expectations: Vec<SimulationExpectation>,
}

impl SimulationPlan {
    #[must_use]
    pub fn new(policy: PolicyKind) -> Self {
        Self {
            policy,
            config: SessionConfig::default(),
            replay: false,
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub const fn with_replay(mut self) -> Self {
        self.replay = true;
        self
    }

    #[must_use]
    pub fn with_expectation(mut self, expectation: impl Into<SimulationExpectation>) -> Self {
        self.expectations.push(expectation.into());
        self
    }
}

/// Assertion hook run after a simulation completes.
type SimulationExpectationFn =
    Arc<dyn Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static>;

#[derive(Clone)]
pub struct SimulationExpectation(SimulationExpectationFn);

impl std::fmt::Debug for SimulationExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationExpectation").finish()
    }
}

impl SimulationExpectation {
    /// Run the hook against a finished summary.
    ///
    /// # Errors
    ///
    /// Returns the hook's failure message.
    pub fn evaluate(&self, summary: &SimulationSummary) -> Result<()> {
        (self.0)(summary)
    }
}

impl<F> From<F> for SimulationExpectation
where
    F: Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self(Arc::new(f))
    }
}

/// One noon as the observer played it.
#[derive(Debug, Clone, Default)]
pub struct NoonRecord {
    pub day: u32,
    pub accepted: usize,
    pub rejected: usize,
    pub points_left: u32,
    /// Action points after each accepted command, in order.
    pub points_trace: Vec<u32>,
}

/// Complete record of a simulation run.
#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub seed: u64,
    pub policy: PolicyKind,
    pub noons: Vec<NoonRecord>,
    pub final_state: SessionState,
    pub ending: Option<Ending>,
    pub deduction: DeductionReport,
    pub narration: NarrationLog,
    pub digest: u64,
    pub replay_digest: Option<u64>,
    pub rng_draws: [u64; 5],
}

impl SimulationSummary {
    #[must_use]
    pub fn ending_label(&self) -> String {
        self.ending
            .as_ref()
            .map_or_else(|| String::from("unfinished"), ToString::to_string)
    }

    #[must_use]
    pub fn commands_accepted(&self) -> usize {
        self.noons.iter().map(|noon| noon.accepted).sum()
    }

    #[must_use]
    pub fn commands_rejected(&self) -> usize {
        self.noons.iter().map(|noon| noon.rejected).sum()
    }
}

/// Headless deterministic runner for observer policies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObserverRunner {
    verbose: bool,
}

impl ObserverRunner {
    #[must_use]
    pub const fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Play one session for `seed` under `plan`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be opened or a command names
    /// a character the session does not know.
    pub fn run_plan(&self, plan: &SimulationPlan, seed: u64) -> Result<SimulationSummary> {
        let mut summary = self.play(plan, seed)?;
        if plan.replay {
            summary.replay_digest = Some(self.play(plan, seed)?.digest);
        }
        Ok(summary)
    }

    fn play(&self, plan: &SimulationPlan, seed: u64) -> Result<SimulationSummary> {
        let engine = GameEngine::new(StaticLoader);
        let mut session = engine
            .create_session(seed, plan.config.clone(), NarrationLog::new())
            .with_context(|| format!("opening session for seed {seed}"))?;
        let mut policy = plan.policy.create_policy(seed);
        let mut noons = Vec::new();

        session.advance_to_noon();
        while !session.is_over() {
            let record = play_noon(&mut session, policy.as_mut())?;
            if self.verbose {
                println!(
                    "  day {} ({}): {} accepted, {} rejected, {} AP left",
                    record.day,
                    policy.name(),
                    record.accepted,
                    record.rejected,
                    record.points_left
                );
            }
            noons.push(record);
            if session.action_points() == 0 {
                session.end_turn();
            } else {
                session.advance_phase();
                session.advance_to_noon();
            }
        }

        let deduction = session.submit_notes();
        let digest = session.narration_digest();
        let rng_draws = session.state().rng().draw_counts();
        let ending = session.ending().cloned();
        log::debug!("seed {seed} finished: {ending:?}");
        let narration = session.sink().clone();
        Ok(SimulationSummary {
            seed,
            policy: plan.policy,
            noons,
            final_state: session.into_state(),
            ending,
            deduction,
            narration,
            digest,
            replay_digest: None,
            rng_draws,
        })
    }
}

fn play_noon(
    session: &mut Session<NarrationLog>,
    policy: &mut dyn ObserverPolicy,
) -> Result<NoonRecord> {
    debug_assert_eq!(session.phase(), Some(Phase::Noon));
    let mut record = NoonRecord {
        day: session.day(),
        ..NoonRecord::default()
    };
    policy.begin_noon(session.state());
    for _ in 0..MAX_COMMANDS_PER_NOON {
        let Some(command) = policy.next_command(session.state()) else {
            break;
        };
        let outcome = issue(session, &command)
            .with_context(|| format!("issuing {command:?} on day {}", record.day))?;
        if outcome.accepted {
            record.accepted += 1;
            record.points_trace.push(session.action_points());
        } else {
            record.rejected += 1;
        }
    }
    record.points_left = session.action_points();
    Ok(record)
}

fn issue(
    session: &mut Session<NarrationLog>,
    command: &ObserverCommand,
) -> Result<ActionOutcome, CommandError> {
    match command {
        ObserverCommand::Move { id, to } => session.move_character(*id, *to),
        ObserverCommand::Swap { first, second } => session.swap(*first, *second),
        ObserverCommand::Ask(id) => session.ask(*id),
        ObserverCommand::Soothe(id) => session.soothe(*id),
        ObserverCommand::Note { id, guess } => session.mark_note(*id, guess),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_policy_finishes_a_session() {
        let runner = ObserverRunner::new(false);
        for policy in [
            PolicyKind::Passive,
            PolicyKind::Caretaker,
            PolicyKind::Inquisitor,
            PolicyKind::Random,
        ] {
            let summary = runner.run_plan(&SimulationPlan::new(policy), 17).unwrap();
            assert!(summary.ending.is_some(), "{policy} left the session open");
            assert!(!summary.noons.is_empty());
            assert!(summary.narration.len() >= summary.final_state.events.len());
        }
    }

    #[test]
    fn replay_records_a_matching_digest() {
        let plan = SimulationPlan::new(PolicyKind::Random).with_replay();
        let summary = ObserverRunner::new(false).run_plan(&plan, 99).unwrap();
        assert_eq!(summary.replay_digest, Some(summary.digest));
    }

    #[test]
    fn passive_observer_spends_nothing() {
        let summary = ObserverRunner::new(false)
            .run_plan(&SimulationPlan::new(PolicyKind::Passive), 5)
            .unwrap();
        assert_eq!(summary.commands_accepted(), 0);
        assert!(summary.noons.iter().all(|noon| noon.points_left == 5));
    }
}
