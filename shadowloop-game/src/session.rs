//! Live session wrapper binding the phase orchestrator, the ability engine
//! and a narration sink to one exclusively owned [`SessionState`].
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::ability::AbilityEngine;
use crate::action::{ActionController, ActionOutcome, CommandError};
use crate::cast::{CastPool, CharacterId, Location};
use crate::config::SessionConfig;
use crate::deduction::{self, DeductionReport};
use crate::narration::{self, EventKind, EventSeverity, NarrationSink};
use crate::phase::{DuskPhase, MorningPhase, NightPhase, NoonPhase, Phase, SunrisePhase};
use crate::rng::RngBundle;
use crate::scenario::{Scenario, ScenarioBuilder, ScenarioError};
use crate::script::ScriptCatalog;
use crate::state::{Ending, SessionState};

/// A running game: state plus the machinery that advances it.
///
/// Every journal entry is forwarded to the sink once, in order, right after
/// the call that produced it returns.
#[derive(Debug)]
pub struct Session<S: NarrationSink = ()> {
    state: SessionState,
    abilities: AbilityEngine,
    sink: S,
    forwarded: usize,
}

impl<S: NarrationSink> Session<S> {
    /// Build a scenario from `catalog` and `pool` and open a session on it.
    ///
    /// The scenario is dealt from the bundle's scenario stream, so the same
    /// seed always yields the same roster.
    ///
    /// # Errors
    ///
    /// Returns `ScenarioError` when the configuration is invalid or the data
    /// cannot produce a legal roster.
    pub fn start(
        catalog: &ScriptCatalog,
        pool: &CastPool,
        config: SessionConfig,
        seed: u64,
        sink: S,
    ) -> Result<Self, ScenarioError> {
        let rng = Rc::new(RngBundle::from_user_seed(seed));
        let scenario = ScenarioBuilder::new(catalog, &config).build(pool, &mut *rng.scenario())?;
        let abilities = AbilityEngine::from_catalog(catalog);
        Ok(Self::from_scenario(scenario, config, seed, abilities, rng, sink))
    }

    /// Open a session on an already dealt scenario.
    #[must_use]
    pub fn from_scenario(
        scenario: Scenario,
        config: SessionConfig,
        seed: u64,
        abilities: AbilityEngine,
        rng: Rc<RngBundle>,
        sink: S,
    ) -> Self {
        let Scenario {
            scripts,
            characters,
            masterminds,
        } = scenario;
        let mut state =
            SessionState::new(seed, config, scripts, characters, masterminds, rng);
        let message = format!(
            "Scripts drawn: {} / {} / {}",
            state.scripts.main.name, state.scripts.sub.name, state.scripts.foreshadow.name
        );
        let payload = serde_json::json!({
            "main": state.scripts.main.id,
            "sub": state.scripts.sub.id,
            "foreshadow": state.scripts.foreshadow.id,
            "roster": state.characters.len(),
        });
        state.push_event(
            EventKind::ScenarioBuilt,
            EventSeverity::Info,
            &["scenario"],
            message,
            payload,
        );
        log::debug!(
            "session {seed} opened with {} characters",
            state.characters.len()
        );
        let mut session = Self {
            state,
            abilities,
            sink,
            forwarded: 0,
        };
        session.flush();
        session
    }

    /// Execute the next phase. Returns the phase that ran, or `None` once
    /// the session is over.
    pub fn advance_phase(&mut self) -> Option<Phase> {
        let phase = self.step();
        self.flush();
        phase
    }

    /// Run phases until the session parks at noon or ends.
    pub fn advance_to_noon(&mut self) {
        while self.state.phase != Some(Phase::Noon) && self.step().is_some() {}
        self.flush();
    }

    fn step(&mut self) -> Option<Phase> {
        if self.state.is_over() {
            return None;
        }
        let next = match self.state.phase {
            None => Phase::Sunrise,
            Some(Phase::Night) => {
                self.state.day += 1;
                Phase::Sunrise
            }
            Some(phase) => phase.next(),
        };
        self.state.enter_phase(next);
        match next {
            Phase::Sunrise => SunrisePhase::new(&mut self.state, &self.abilities).run(),
            Phase::Morning => MorningPhase::new(&mut self.state).run(),
            Phase::Noon => NoonPhase::new(&mut self.state).run(),
            Phase::Dusk => DuskPhase::new(&mut self.state, &self.abilities).run(),
            Phase::Night => NightPhase::new(&mut self.state, &self.abilities).run(),
        }
        Some(next)
    }

    fn flush(&mut self) {
        for event in self.state.events.iter().skip(self.forwarded) {
            self.sink.narrate(&event.message);
        }
        self.forwarded = self.state.event_count();
    }

    fn command<F>(&mut self, f: F) -> Result<ActionOutcome, CommandError>
    where
        F: FnOnce(&mut ActionController<'_>) -> Result<ActionOutcome, CommandError>,
    {
        let result = f(&mut ActionController::new(&mut self.state));
        self.flush();
        result
    }

    /// Escort a character to `destination`.
    ///
    /// # Errors
    ///
    /// Returns `CommandError` for an unknown id or an off-map destination.
    pub fn move_character(
        &mut self,
        id: CharacterId,
        destination: Location,
    ) -> Result<ActionOutcome, CommandError> {
        self.command(|ctl| ctl.move_character(id, destination))
    }

    /// Exchange the sites of two characters on adjacent sites.
    ///
    /// # Errors
    ///
    /// Returns `CommandError` when either id is unknown.
    pub fn swap(
        &mut self,
        first: CharacterId,
        second: CharacterId,
    ) -> Result<ActionOutcome, CommandError> {
        self.command(|ctl| ctl.swap(first, second))
    }

    /// Question a character, revealing role and sanity.
    ///
    /// # Errors
    ///
    /// Returns `CommandError` for an unknown id.
    pub fn ask(&mut self, id: CharacterId) -> Result<ActionOutcome, CommandError> {
        self.command(|ctl| ctl.ask(id))
    }

    /// Record the observer's role guess for a character.
    ///
    /// # Errors
    ///
    /// Returns `CommandError` for an unknown id.
    pub fn mark_note(&mut self, id: CharacterId, guess: &str) -> Result<ActionOutcome, CommandError> {
        self.command(|ctl| ctl.mark_note(id, guess))
    }

    /// Restore one point of sanity.
    ///
    /// # Errors
    ///
    /// Returns `CommandError` for an unknown id.
    pub fn soothe(&mut self, id: CharacterId) -> Result<ActionOutcome, CommandError> {
        self.command(|ctl| ctl.soothe(id))
    }

    /// Close the noon window and play through to the next noon.
    ///
    /// Rejected while action points remain.
    pub fn end_turn(&mut self) -> ActionOutcome {
        if let Some(rejected) = ActionController::new(&mut self.state).check_end_turn() {
            self.flush();
            return rejected;
        }
        let day = self.state.day;
        while let Some(phase) = self.step() {
            if phase == Phase::Noon {
                break;
            }
        }
        self.flush();
        let message = match &self.state.ending {
            Some(ending) => format!("Day {day} closes: {ending}"),
            None => format!("Day {} begins", self.state.day),
        };
        ActionOutcome::accepted(message, 0)
    }

    /// Exempt one character from morning auto-movement, or clear the
    /// exemption with `None`.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::UnknownCharacter` for an unknown id.
    pub fn take_control(&mut self, id: Option<CharacterId>) -> Result<(), CommandError> {
        if let Some(id) = id
            && self.state.index_of(id).is_none()
        {
            return Err(CommandError::UnknownCharacter(id));
        }
        self.state.controlled = id;
        Ok(())
    }

    /// Score explicit role guesses and journal the result.
    pub fn submit_deduction(&mut self, guesses: &BTreeMap<CharacterId, String>) -> DeductionReport {
        let report = deduction::score(&self.state.characters, guesses);
        let message = if report.perfect {
            format!("Deduction perfect: {}/{} roles named", report.solved, report.hidden)
        } else {
            format!("Deduction: {}/{} roles named", report.solved, report.hidden)
        };
        self.state.push_event(
            EventKind::DeductionScored,
            EventSeverity::Info,
            &["deduction"],
            message,
            serde_json::json!({
                "solved": report.solved,
                "hidden": report.hidden,
                "accuracy_pct": report.accuracy_pct,
            }),
        );
        self.flush();
        report
    }

    /// Score the notes left with [`Session::mark_note`].
    pub fn submit_notes(&mut self) -> DeductionReport {
        let guesses: BTreeMap<CharacterId, String> = self
            .state
            .characters
            .iter()
            .filter_map(|c| c.guess_role.clone().map(|guess| (c.id, guess)))
            .collect();
        self.submit_deduction(&guesses)
    }

    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Mutable access for harnesses; changes are not journaled.
    pub const fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    #[must_use]
    pub fn into_state(self) -> SessionState {
        self.state
    }

    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    pub const fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    #[must_use]
    pub const fn is_over(&self) -> bool {
        self.state.is_over()
    }

    #[must_use]
    pub const fn ending(&self) -> Option<&Ending> {
        self.state.ending.as_ref()
    }

    #[must_use]
    pub const fn day(&self) -> u32 {
        self.state.day
    }

    #[must_use]
    pub const fn phase(&self) -> Option<Phase> {
        self.state.phase
    }

    #[must_use]
    pub const fn action_points(&self) -> u32 {
        self.state.action_points
    }

    /// Hash of the journal so far; equal seeds give equal digests.
    #[must_use]
    pub fn narration_digest(&self) -> u64 {
        narration::narration_digest(&self.state.events)
    }
}
