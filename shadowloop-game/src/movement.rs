//! Ring map geometry, arrival resolution and automatic morning movement.
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::cast::{Character, Location, Region};
use crate::config::SessionConfig;

/// Ring of sites grouped into equal contiguous regions, plus the station hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapLayout {
    pub site_count: u8,
    pub region_size: u8,
}

impl MapLayout {
    #[must_use]
    pub const fn new(site_count: u8, region_size: u8) -> Self {
        Self {
            site_count,
            region_size,
        }
    }

    #[must_use]
    pub const fn from_config(cfg: &SessionConfig) -> Self {
        Self::new(cfg.site_count, cfg.region_size)
    }

    /// Whether `location` exists on this map.
    #[must_use]
    pub const fn contains(self, location: Location) -> bool {
        match location {
            Location::Station => true,
            Location::Site(site) => site < self.site_count,
        }
    }

    /// Region of a site; the station belongs to none.
    #[must_use]
    pub const fn region_of(self, location: Location) -> Option<Region> {
        match location {
            Location::Station => None,
            Location::Site(site) => {
                if self.region_size == 0 {
                    None
                } else {
                    Some(Region(site / self.region_size))
                }
            }
        }
    }

    #[must_use]
    pub const fn region_count(self) -> u8 {
        if self.region_size == 0 {
            0
        } else {
            self.site_count / self.region_size
        }
    }

    /// The two ring neighbours of `site`, counter-clockwise first.
    #[must_use]
    pub const fn neighbors(self, site: u8) -> [u8; 2] {
        let last = self.site_count.saturating_sub(1);
        let left = if site == 0 { last } else { site - 1 };
        let right = if site >= last { 0 } else { site + 1 };
        [left, right]
    }

    /// Ring adjacency; the station is adjacent to nothing.
    #[must_use]
    pub const fn are_adjacent(self, a: Location, b: Location) -> bool {
        match (a, b) {
            (Location::Site(x), Location::Site(y)) => {
                let [left, right] = self.neighbors(x);
                x != y && (y == left || y == right)
            }
            _ => false,
        }
    }

    /// Every ring site in index order.
    pub fn sites(self) -> impl Iterator<Item = Location> {
        (0..self.site_count).map(Location::Site)
    }

    pub fn region_sites(self, region: Region) -> impl Iterator<Item = Location> {
        let start = region.0.saturating_mul(self.region_size);
        let end = start.saturating_add(self.region_size).min(self.site_count);
        (start..end).map(Location::Site)
    }
}

impl Default for MapLayout {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

/// How an arrival was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArrivalOutcome {
    /// The character now stands at the requested location.
    Arrived { location: Location },
    /// Entering the forbidden region sent the character to the station.
    Bounced {
        attempted: Location,
        penalty: i32,
        /// Sanity latch tripped by the penalty.
        broke: bool,
    },
}

impl ArrivalOutcome {
    #[must_use]
    pub const fn final_location(self) -> Location {
        match self {
            Self::Arrived { location } => location,
            Self::Bounced { .. } => Location::Station,
        }
    }
}

/// Place `character` at `destination`, enforcing its forbidden region.
pub fn resolve_arrival(
    character: &mut Character,
    destination: Location,
    layout: MapLayout,
    penalty: i32,
) -> ArrivalOutcome {
    character.location = destination;
    if destination.is_station() {
        return ArrivalOutcome::Arrived {
            location: destination,
        };
    }
    let region = layout.region_of(destination);
    if region.is_some() && region == character.forbidden_region {
        character.location = Location::Station;
        character.sanity -= penalty;
        let broke = check_sanity_threshold(character);
        return ArrivalOutcome::Bounced {
            attempted: destination,
            penalty,
            broke,
        };
    }
    ArrivalOutcome::Arrived {
        location: destination,
    }
}

/// Trip the one-time sanity latch; returns whether it tripped on this call.
///
/// A living character at or below zero sanity becomes corrupted the first
/// time only. Later drops leave the intrigue flag untouched, so a cure
/// sticks even while sanity stays at zero.
pub fn check_sanity_threshold(character: &mut Character) -> bool {
    if character.is_dead || character.sanity_broken || character.sanity > 0 {
        return false;
    }
    character.sanity_broken = true;
    character.intrigue = true;
    true
}

/// Pick tomorrow-morning's position for a character standing at `current`.
pub fn calculate_auto_move<R: Rng + ?Sized>(
    current: Location,
    blocked: &BTreeSet<Location>,
    layout: MapLayout,
    stay_chance: f64,
    rng: &mut R,
) -> Location {
    let Location::Site(site) = current else {
        return current;
    };
    if rng.gen_bool(stay_chance.clamp(0.0, 1.0)) {
        return current;
    }
    let open: Vec<Location> = layout
        .neighbors(site)
        .into_iter()
        .map(Location::Site)
        .filter(|candidate| !blocked.contains(candidate))
        .collect();
    open.choose(rng).copied().unwrap_or(current)
}
