use crate::board::{BoardState, UNKNOWN_OCCUPANT};
use lazy_regex::regex;
use std::fmt;

/// The board rotates daily; a countdown showing at least this many hours has just been reset.
pub const RESET_MIN_HOURS: u32 = 20;

/// Last good observation. Lives for the whole process and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedMemory {
    pub last_occupant_name: Option<String>,
    pub last_countdown_text: Option<String>,
    pub last_fetch_succeeded: bool,
}

impl ObservedMemory {
    pub fn new() -> Self {
        ObservedMemory {
            last_occupant_name: None,
            last_countdown_text: None,
            last_fetch_succeeded: true,
        }
    }

    /// Known occupant, treating the display sentinel as nothing seen yet.
    fn known_occupant(&self) -> Option<&str> {
        self.last_occupant_name
            .as_deref()
            .filter(|name| *name != UNKNOWN_OCCUPANT)
    }

    /// Applies a decision. Unknown occupants never overwrite good state.
    pub fn record(&mut self, decision: &AnnounceDecision, current: &BoardState) {
        if !decision.update_memory {
            return;
        }
        if let Some(name) = current.occupant.name() {
            self.last_occupant_name = Some(name.to_string());
            self.last_countdown_text = current.countdown_text.clone();
        }
    }
}

impl Default for ObservedMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnounceReason {
    InitialObservation(String),
    OccupantChanged { from: String, to: String },
    TimerReset(String),
}

impl fmt::Display for AnnounceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnounceReason::InitialObservation(name) => {
                write!(f, "Initial observation of **{}**.", name)
            }
            AnnounceReason::OccupantChanged { from, to } => {
                write!(f, "Occupant changed from **{}** to **{}**.", from, to)
            }
            AnnounceReason::TimerReset(name) => {
                write!(f, "Timer reset, same occupant: **{}** remains.", name)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceDecision {
    /// `None` means nothing worth announcing.
    pub reason: Option<AnnounceReason>,
    pub update_memory: bool,
}

/// Rules in precedence order: initial observation, occupant change, timer reset, no change.
pub fn decide(previous: &ObservedMemory, current: &BoardState) -> AnnounceDecision {
    let Some(name) = current.occupant.name() else {
        return AnnounceDecision {
            reason: None,
            update_memory: false,
        };
    };

    let reason = match previous.known_occupant() {
        None => Some(AnnounceReason::InitialObservation(name.to_string())),
        Some(old) if old != name => Some(AnnounceReason::OccupantChanged {
            from: old.to_string(),
            to: name.to_string(),
        }),
        Some(_) => is_timer_reset(
            previous.last_countdown_text.as_deref(),
            current.countdown_text.as_deref(),
        )
        .then(|| AnnounceReason::TimerReset(name.to_string())),
    };

    AnnounceDecision {
        reason,
        update_memory: true,
    }
}

/// The countdown jumped back up near the top of the daily cycle.
pub fn is_timer_reset(previous: Option<&str>, current: Option<&str>) -> bool {
    if previous == current {
        return false;
    }
    let Some(hours) = current.and_then(countdown_hours) else {
        return false;
    };
    if hours < RESET_MIN_HOURS {
        return false;
    }
    previous
        .and_then(countdown_hours)
        .map_or(true, |before| hours > before)
}

/// Hour component of a countdown; countdowns under an hour read as zero.
pub fn countdown_hours(text: &str) -> Option<u32> {
    if let Some(c) = regex!(r"(?i)(\d+)\s*hours?").captures(text) {
        return c[1].parse().ok();
    }
    regex!(r"(?i)\d+\s*(?:minutes?|seconds?)")
        .is_match(text)
        .then_some(0)
}
