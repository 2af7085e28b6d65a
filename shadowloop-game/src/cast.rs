//! Cast pool entries and the live character records built from them.
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::constants::{CIVILIAN_ROLE, DEFAULT_REGION_SIZE, DEFAULT_SITE_COUNT, REGION_NAMES};
use crate::movement::MapLayout;
use crate::script::CatalogError;

/// Stable identifier of a character, taken from the cast pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(pub u32);

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "M")]
    Male,
}

/// A place a character can stand: one of the ring sites or the station hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// Safe hub, exempt from forbidden-region checks and ring adjacency.
    Station,
    Site(u8),
}

impl Location {
    #[must_use]
    pub const fn is_station(self) -> bool {
        matches!(self, Self::Station)
    }

    #[must_use]
    pub const fn site(self) -> Option<u8> {
        match self {
            Self::Station => None,
            Self::Site(index) => Some(index),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Station => f.write_str("Station"),
            Self::Site(index) => write!(f, "Loc{index}"),
        }
    }
}

/// Contiguous block of ring sites (`site / region_size`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Region(pub u8);

impl Region {
    #[must_use]
    pub fn name(self) -> &'static str {
        REGION_NAMES
            .get(usize::from(self.0))
            .copied()
            .unwrap_or("outskirts")
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (region {})", self.name(), self.0)
    }
}

/// One entry of the cast pool the scenario builder samples from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolEntry {
    pub id: CharacterId,
    pub name: String,
    #[serde(default)]
    pub gender: Option<Gender>,
    /// Starting site; `None` lets the builder pick one.
    #[serde(default)]
    pub home: Option<u8>,
    pub sanity: i32,
    #[serde(default)]
    pub forbidden_region: Option<Region>,
}

/// Complete cast pool handed to the scenario builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CastPool {
    pub entries: Vec<PoolEntry>,
}

impl CastPool {
    /// Parse the pool from JSON and check it against the default map.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the JSON cannot be parsed or an entry is
    /// malformed.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let pool: Self = serde_json::from_str(json)?;
        pool.validate(MapLayout::new(DEFAULT_SITE_COUNT, DEFAULT_REGION_SIZE))?;
        Ok(pool)
    }

    /// Embedded default cast of fifteen townsfolk.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the embedded asset is malformed.
    pub fn default_pool() -> Result<Self, CatalogError> {
        Self::from_json(include_str!("../assets/cast.json"))
    }

    /// Check ids are unique and every home and forbidden region lies on `layout`.
    ///
    /// # Errors
    ///
    /// Returns the first malformed entry.
    pub fn validate(&self, layout: MapLayout) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.id) {
                return Err(CatalogError::DuplicateCharacterId(entry.id));
            }
            if entry.name.trim().is_empty() {
                return Err(CatalogError::EmptyCharacterName { character: entry.id });
            }
            if entry.sanity <= 0 {
                return Err(CatalogError::CastSanity {
                    character: entry.id,
                    value: entry.sanity,
                });
            }
            if let Some(site) = entry.home
                && site >= layout.site_count
            {
                return Err(CatalogError::CastHomeOffMap {
                    character: entry.id,
                    site,
                    site_count: layout.site_count,
                });
            }
            if let Some(region) = entry.forbidden_region
                && region.0 >= layout.region_count()
            {
                return Err(CatalogError::CastRegionOffMap {
                    character: entry.id,
                    region,
                    region_count: layout.region_count(),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Live character record owned by a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub gender: Option<Gender>,
    pub location: Location,
    pub sanity: i32,
    pub max_sanity: i32,
    pub is_dead: bool,
    pub role: String,
    pub forbidden_region: Option<Region>,
    /// Corruption flag spread by intrigue.
    pub intrigue: bool,
    /// Latched the first time sanity reaches zero.
    pub sanity_broken: bool,
    pub known: bool,
    pub guess_role: Option<String>,
}

impl Character {
    /// Fresh civilian built from a pool entry, standing at `location`.
    #[must_use]
    pub fn from_entry(entry: &PoolEntry, location: Location) -> Self {
        Self {
            id: entry.id,
            name: entry.name.clone(),
            gender: entry.gender,
            location,
            sanity: entry.sanity,
            max_sanity: entry.sanity,
            is_dead: false,
            role: CIVILIAN_ROLE.to_string(),
            forbidden_region: None,
            intrigue: false,
            sanity_broken: false,
            known: false,
            guess_role: None,
        }
    }

    #[must_use]
    pub const fn is_alive(&self) -> bool {
        !self.is_dead
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }

    #[must_use]
    pub fn is_civilian(&self) -> bool {
        self.has_role(CIVILIAN_ROLE)
    }

    #[must_use]
    pub const fn at_full_sanity(&self) -> bool {
        self.sanity >= self.max_sanity
    }
}
