//! Shadowloop Game Engine
//!
//! Platform-agnostic core for the Shadowloop hidden-role simulation: scenario
//! dealing, the five-phase day cycle, role abilities, observer commands and
//! the scripted win/loss evaluator. No rendering or input handling lives here.

pub mod ability;
pub mod action;
pub mod cast;
pub mod config;
pub mod constants;
pub mod deduction;
pub mod events;
pub mod movement;
pub mod narration;
pub mod numbers;
pub mod phase;
pub mod rng;
pub mod rules;
pub mod scenario;
pub mod script;
pub mod session;
pub mod state;

pub use ability::AbilityEngine;
pub use action::{ActionOutcome, CommandError, Rejection, RejectionClass};
pub use cast::{CastPool, Character, CharacterId, Gender, Location, PoolEntry, Region};
pub use config::{ConfigError, SessionConfig};
pub use deduction::{DeductionLine, DeductionReport};
pub use movement::{ArrivalOutcome, MapLayout};
pub use narration::{Event, EventKind, EventSeverity, NarrationLog, NarrationSink};
pub use phase::Phase;
pub use rng::{RngBundle, RngStream};
pub use rules::{ActiveRules, RuleTag};
pub use scenario::{Scenario, ScenarioBuilder, ScenarioError};
pub use script::{
    AbilityDirective, CatalogError, EventDirective, EventEffect, RoleRequirement, ScriptCatalog,
    ScriptCategory, ScriptPart,
};
pub use session::Session;
pub use state::{DefeatCause, Ending, Grave, ScriptSelection, SessionState};

use thiserror::Error;

/// Trait for abstracting data loading operations
/// Platform-specific implementations should provide this
pub trait DataLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load and validate the script catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read or fails validation.
    fn load_catalog(&self) -> Result<ScriptCatalog, Self::Error>;

    /// Load the pool of characters a roster is sampled from.
    ///
    /// # Errors
    ///
    /// Returns an error if the cast data cannot be read, parsed or validated.
    fn load_cast(&self) -> Result<CastPool, Self::Error>;
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("script catalog: {0}")]
    Catalog(#[from] CatalogError),
    #[error("cast pool: {0}")]
    Cast(#[source] CatalogError),
}

/// Loader serving the assets compiled into the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticLoader;

impl DataLoader for StaticLoader {
    type Error = LoadError;

    fn load_catalog(&self) -> Result<ScriptCatalog, Self::Error> {
        Ok(ScriptCatalog::default_catalog()?)
    }

    fn load_cast(&self) -> Result<CastPool, Self::Error> {
        CastPool::default_pool().map_err(LoadError::Cast)
    }
}

/// Main game engine for opening sessions
pub struct GameEngine<L>
where
    L: DataLoader,
{
    data_loader: L,
}

impl<L> GameEngine<L>
where
    L: DataLoader,
{
    /// Create a new game engine with the provided data loader
    pub const fn new(data_loader: L) -> Self {
        Self { data_loader }
    }

    /// Deal a scenario for `seed` and open a session narrating into `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if the data cannot be loaded or no legal roster can
    /// be dealt under `config`.
    pub fn create_session<S: NarrationSink>(
        &self,
        seed: u64,
        config: SessionConfig,
        sink: S,
    ) -> Result<Session<S>, anyhow::Error> {
        let catalog = self.data_loader.load_catalog()?;
        let pool = self.data_loader.load_cast()?;
        let session = Session::start(&catalog, &pool, config, seed, sink)?;
        Ok(session)
    }
}
