//! Centralized balance and tuning constants for the Shadowloop engine.
//!
//! Session-level knobs that a driver may tune live in [`crate::SessionConfig`];
//! the values here are the defaults it falls back to plus the fixed names
//! the rule registry keys on.

// Map layout ---------------------------------------------------------------
pub const DEFAULT_SITE_COUNT: u8 = 12;
pub const DEFAULT_REGION_SIZE: u8 = 3;
/// Site watched by the `reactor_meltdown` rule.
pub const REACTOR_SITE: u8 = 2;
/// Region whose entry costs extra under the `lockdown` rule.
pub const QUARANTINE_REGION: u8 = 1;
pub const REGION_NAMES: [&str; 4] = ["shrine", "hospital", "city", "school"];

// Session pacing -----------------------------------------------------------
pub const DEFAULT_MAX_DAYS: u32 = 4;
pub const DEFAULT_ACTION_POINTS: u32 = 5;
pub const DEFAULT_ROSTER_SIZE: usize = 12;

// Sanity and movement ------------------------------------------------------
pub const FORBIDDEN_REGION_PENALTY: i32 = 1;
pub const SUNRISE_EXPOSURE_LOSS: i32 = 1;
pub const VIRUS_STATION_LOSS: i32 = 1;
pub const SOOTHE_AMOUNT: i32 = 1;
pub const AUTO_MOVE_STAY_CHANCE: f64 = 0.5;
pub const STORM_SKIP_CHANCE: f64 = 0.5;

// Intrigue -----------------------------------------------------------------
pub const INTRIGUE_CONTAGION_CHANCE: f64 = 0.2;
pub const INTRIGUE_CURE_CHANCE: f64 = 0.1;

// Roles --------------------------------------------------------------------
pub const CIVILIAN_ROLE: &str = "civilian";
pub const ANDROID_ROLE: &str = "android";
pub const VAMPIRE_ROLE: &str = "vampire";
pub const TYCOON_ROLE: &str = "tycoon";

// Action costs -------------------------------------------------------------
pub const BASE_MOVE_COST: u32 = 1;
pub const LOCKDOWN_SURCHARGE: u32 = 1;
pub const SWAP_COST: u32 = 1;
pub const ASK_COST: u32 = 1;
pub const INTERROGATION_ASK_COST: u32 = 2;
pub const SOOTHE_COST: u32 = 1;

// Loss thresholds ----------------------------------------------------------
pub const SACRIFICE_GRAVE_COUNT: usize = 6;
pub const ALTAR_GRAVES_PER_LOCATION: usize = 3;
pub const FESTIVAL_CORRUPTED_LIMIT: usize = 4;
pub const STRICT_GRAVE_LIMIT: usize = 3;
pub const STATION_CROWD_LIMIT: usize = 3;
pub const BIOHAZARD_BROKEN_COUNT: usize = 3;
pub const VAMPIRE_GRAVE_LIMIT: usize = 4;
