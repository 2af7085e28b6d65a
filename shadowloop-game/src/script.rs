//! Script catalog data: script parts, role requirements, ability directives
//! and foreshadow events.
//!
//! The catalog is parsed and validated once by the loader, then handed to
//! the engine, which only ever reads it.
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::cast::{CharacterId, Gender, Location, Region};
use crate::constants::CIVILIAN_ROLE;
use crate::phase::Phase;

const fn default_count() -> u32 {
    1
}

const fn default_magnitude() -> i32 {
    1
}

/// A role a script part needs filled, `count` times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRequirement {
    pub name: String,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub gender: Option<Gender>,
    /// Corrupted masterminds arm the intrigue foreshadow event.
    #[serde(default)]
    pub mastermind: bool,
    /// Replaces the holder's starting and maximum sanity.
    #[serde(default)]
    pub sanity: Option<i32>,
}

/// Effect applied by a foreshadow event to the characters at its location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventEffect {
    SpreadInsanity,
    ToxicGas,
    Riot,
    RandomTeleport,
    Suicide,
    KillOne,
    Massacre,
    Defeat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDirective {
    pub name: String,
    pub location: Location,
    pub effect: EventEffect,
}

/// One selectable bundle of rules, roles and events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptPart {
    pub id: String,
    pub name: String,
    /// Selects the loss predicate or modifier this part switches on.
    #[serde(default)]
    pub rule_tag: Option<String>,
    #[serde(default)]
    pub roles: Vec<RoleRequirement>,
    #[serde(default)]
    pub panic_event: Option<EventDirective>,
    #[serde(default)]
    pub intrigue_event: Option<EventDirective>,
}

impl ScriptPart {
    #[must_use]
    pub fn rule_tag(&self) -> &str {
        self.rule_tag.as_deref().unwrap_or("")
    }
}

/// How an ability picks the characters it acts on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum TargetingRule {
    RandomOtherInLocation,
    AllOthersInLocation,
    /// Only when the actor shares its location with exactly one other.
    IsolationPair,
    /// The unique living holder of `role`, used as a position.
    LocateRole { role: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Kill,
    AddIntrigue,
    SanityDamage,
    RelocateSelf,
}

/// Data-table row interpreted by the ability engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityDirective {
    pub role: String,
    pub phase: Phase,
    pub targeting: TargetingRule,
    pub effect: EffectKind,
    #[serde(default = "default_magnitude")]
    pub magnitude: i32,
}

/// Category a script part is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptCategory {
    Main,
    Sub,
    Foreshadow,
}

impl ScriptCategory {
    pub const ALL: [Self; 3] = [Self::Main, Self::Sub, Self::Foreshadow];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Sub => "sub",
            Self::Foreshadow => "foreshadow",
        }
    }
}

/// Read-only catalog of script parts grouped by category plus role data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ScriptCatalog {
    #[serde(default)]
    pub main: Vec<ScriptPart>,
    #[serde(default)]
    pub sub: Vec<ScriptPart>,
    #[serde(default)]
    pub foreshadow: Vec<ScriptPart>,
    #[serde(default)]
    pub role_data: Vec<AbilityDirective>,
}

/// Errors raised while loading or validating script data.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("script data could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{category} part at index {index} has an empty {field}")]
    EmptyField {
        category: &'static str,
        index: usize,
        field: &'static str,
    },
    #[error("script part id '{0}' appears more than once")]
    DuplicatePartId(String),
    #[error("part '{part}' requires role '{role}' zero times")]
    ZeroCount { part: String, role: String },
    #[error("part '{part}' lists the reserved role 'civilian' as a requirement")]
    ReservedRole { part: String },
    #[error("part '{part}' sets a non-positive sanity override {value} for '{role}'")]
    SanityOverride {
        part: String,
        role: String,
        value: i32,
    },
    #[error("foreshadow part '{0}' defines no events")]
    ForeshadowWithoutEvents(String),
    #[error("ability for role '{role}' has a non-positive magnitude {magnitude}")]
    Magnitude { role: String, magnitude: i32 },
    #[error("ability row has an empty role name")]
    EmptyAbilityRole,
    #[error("cast id {0} appears more than once")]
    DuplicateCharacterId(CharacterId),
    #[error("cast entry {character} has an empty name")]
    EmptyCharacterName { character: CharacterId },
    #[error("cast entry {character} starts with non-positive sanity {value}")]
    CastSanity { character: CharacterId, value: i32 },
    #[error("cast entry {character} lives at site {site}, but the map has {site_count} sites")]
    CastHomeOffMap {
        character: CharacterId,
        site: u8,
        site_count: u8,
    },
    #[error("cast entry {character} forbids {region}, but the map has {region_count} regions")]
    CastRegionOffMap {
        character: CharacterId,
        region: Region,
        region_count: u8,
    },
}

impl ScriptCatalog {
    /// Parse and validate a catalog from JSON.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` when the JSON is malformed or violates catalog rules.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Embedded default catalog.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the embedded asset fails validation.
    pub fn default_catalog() -> Result<Self, CatalogError> {
        Self::from_json(include_str!("../assets/scripts.json"))
    }

    #[must_use]
    pub fn parts(&self, category: ScriptCategory) -> &[ScriptPart] {
        match category {
            ScriptCategory::Main => &self.main,
            ScriptCategory::Sub => &self.sub,
            ScriptCategory::Foreshadow => &self.foreshadow,
        }
    }

    /// Validate catalog invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        for category in ScriptCategory::ALL {
            for (index, part) in self.parts(category).iter().enumerate() {
                validate_part(category, index, part)?;
                if !seen.insert(part.id.as_str()) {
                    return Err(CatalogError::DuplicatePartId(part.id.clone()));
                }
            }
        }
        for directive in &self.role_data {
            if directive.role.trim().is_empty() {
                return Err(CatalogError::EmptyAbilityRole);
            }
            if directive.magnitude <= 0 {
                return Err(CatalogError::Magnitude {
                    role: directive.role.clone(),
                    magnitude: directive.magnitude,
                });
            }
        }
        Ok(())
    }
}

fn validate_part(
    category: ScriptCategory,
    index: usize,
    part: &ScriptPart,
) -> Result<(), CatalogError> {
    for (field, value) in [("id", &part.id), ("name", &part.name)] {
        if value.trim().is_empty() {
            return Err(CatalogError::EmptyField {
                category: category.label(),
                index,
                field,
            });
        }
    }
    for req in &part.roles {
        if req.name.trim().is_empty() {
            return Err(CatalogError::EmptyField {
                category: category.label(),
                index,
                field: "roles.name",
            });
        }
        if req.name == CIVILIAN_ROLE {
            return Err(CatalogError::ReservedRole {
                part: part.id.clone(),
            });
        }
        if req.count == 0 {
            return Err(CatalogError::ZeroCount {
                part: part.id.clone(),
                role: req.name.clone(),
            });
        }
        if let Some(value) = req.sanity
            && value <= 0
        {
            return Err(CatalogError::SanityOverride {
                part: part.id.clone(),
                role: req.name.clone(),
                value,
            });
        }
    }
    if category == ScriptCategory::Foreshadow
        && part.panic_event.is_none()
        && part.intrigue_event.is_none()
    {
        return Err(CatalogError::ForeshadowWithoutEvents(part.id.clone()));
    }
    Ok(())
}
