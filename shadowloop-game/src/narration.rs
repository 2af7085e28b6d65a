//! Structured narration events and the one-way sink they are forwarded to.
//!
//! Every human-readable line the engine produces is first recorded as an
//! [`Event`] in the session journal. Presentation layers receive the plain
//! message through a [`NarrationSink`] and never feed anything back.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::hash::Hasher;
use twox_hash::XxHash64;

use crate::phase::Phase;

/// Maximum tag capacity stored inline without additional allocations.
pub type EventTagSet = SmallVec<[EventTag; 4]>;

/// Short stable label attached to an event (`death`, `forbidden`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventTag(pub String);

impl EventTag {
    /// Construct a tag from a string slice, trimming whitespace.
    #[must_use]
    pub fn new(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

/// Stable, deterministic identifier for a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId {
    /// One-based day counter when the event occurred.
    pub day: u32,
    /// Per-day sequence number (0-based).
    pub seq: u16,
}

impl EventId {
    #[must_use]
    pub const fn new(day: u32, seq: u16) -> Self {
        Self { day, seq }
    }
}

/// Mechanical event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ScenarioBuilt,
    PhaseStarted,
    CharacterMoved,
    ForbiddenBounce,
    SanityChanged,
    SanityBroken,
    AbilityResolved,
    CharacterKilled,
    IntrigueSpread,
    IntrigueCured,
    ForeshadowTriggered,
    GraveDug,
    ActionTaken,
    ActionRejected,
    SessionEnded,
    DeductionScored,
}

/// Severity tier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSeverity {
    Info,
    Warning,
    Critical,
}

/// Structured narration entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    pub kind: EventKind,
    pub severity: EventSeverity,
    #[serde(default)]
    pub tags: EventTagSet,
    /// Human-readable line handed to the narration sink.
    pub message: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
}

/// Receiver of human-readable narration lines.
pub trait NarrationSink {
    fn narrate(&mut self, line: &str);
}

/// Discards every line.
impl NarrationSink for () {
    fn narrate(&mut self, _line: &str) {}
}

/// In-memory sink collecting lines in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NarrationLog {
    lines: Vec<String>,
}

impl NarrationLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether any recorded line contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.contains(needle))
    }
}

impl NarrationSink for NarrationLog {
    fn narrate(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

impl<S: NarrationSink + ?Sized> NarrationSink for &mut S {
    fn narrate(&mut self, line: &str) {
        (**self).narrate(line);
    }
}

/// Order-sensitive hash of a journal, used to compare replays.
#[must_use]
pub fn narration_digest(events: &[Event]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    for event in events {
        hasher.write_u32(event.id.day);
        hasher.write_u16(event.id.seq);
        hasher.write(event.message.as_bytes());
        hasher.write_u8(0);
    }
    hasher.finish()
}
