//! Schedule state carried between invocations
//!
//! `ScheduleState` is the only thing that survives from one step to the
//! next. It serializes to camelCase JSON and deserializes through a single
//! upgrade step that also accepts the older event shapes:
//!
//! - `first_name` / `last_name` at the top level instead of `passengers`
//! - `confirmation_number` instead of `identity.confirmationCode`
//! - `email` instead of `notifyTo`
//! - `check_in_times: {remaining, next}` instead of `remaining` / `due`

use serde::{Deserialize, Serialize};
use std::fmt;

use super::timemath::CheckInInstant;

/// Length of an airline record locator
pub const CONFIRMATION_CODE_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("confirmation code missing")]
    MissingConfirmation,

    #[error("invalid confirmation code '{0}': expected 6 letters or digits")]
    InvalidConfirmation(String),

    #[error("no passengers: need `passengers` or `first_name` and `last_name`")]
    MissingPassengers,

    #[error("passenger name cannot be empty")]
    EmptyName,
}

/// Reservation identity (record locator)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "WireIdentity")]
pub struct Identity {
    confirmation_code: String,
}

#[derive(Deserialize)]
struct WireIdentity {
    #[serde(rename = "confirmationCode", alias = "confirmation_number")]
    confirmation_code: String,
}

impl TryFrom<WireIdentity> for Identity {
    type Error = StateError;

    fn try_from(wire: WireIdentity) -> Result<Self, Self::Error> {
        Identity::new(&wire.confirmation_code)
    }
}

impl Identity {
    /// Normalizes to upper case; rejects anything but 6 ASCII alphanumerics
    pub fn new(code: &str) -> Result<Self, StateError> {
        let code = code.trim().to_ascii_uppercase();
        if code.is_empty() {
            return Err(StateError::MissingConfirmation);
        }
        if code.len() != CONFIRMATION_CODE_LEN || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(StateError::InvalidConfirmation(code));
        }
        Ok(Self { confirmation_code: code })
    }

    pub fn confirmation_code(&self) -> &str {
        &self.confirmation_code
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.confirmation_code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Passenger {
    pub first_name: String,
    pub last_name: String,
}

impl Passenger {
    pub fn new(first_name: &str, last_name: &str) -> Result<Self, StateError> {
        let first_name = first_name.trim();
        let last_name = last_name.trim();
        if first_name.is_empty() || last_name.is_empty() {
            return Err(StateError::EmptyName);
        }
        Ok(Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Remaining check-in instants, stored farthest first so the soonest is
/// popped from the tail. Never holds duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<CheckInInstant>")]
pub struct CheckInQueue(Vec<CheckInInstant>);

impl From<Vec<CheckInInstant>> for CheckInQueue {
    fn from(mut times: Vec<CheckInInstant>) -> Self {
        times.sort();
        times.dedup();
        times.reverse();
        Self(times)
    }
}

impl CheckInQueue {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Next instant that `pop_soonest` would return
    pub fn soonest(&self) -> Option<&CheckInInstant> {
        self.0.last()
    }

    pub(crate) fn pop_soonest(&mut self) -> Option<CheckInInstant> {
        self.0.pop()
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }

    fn remove(&mut self, instant: &CheckInInstant) {
        self.0.retain(|t| t != instant);
    }

    pub fn contains(&self, instant: &CheckInInstant) -> bool {
        self.0.contains(instant)
    }

    /// Farthest first, as stored
    pub fn iter(&self) -> impl Iterator<Item = &CheckInInstant> {
        self.0.iter()
    }

    /// Soonest first
    pub fn chronological(&self) -> impl Iterator<Item = &CheckInInstant> {
        self.0.iter().rev()
    }
}

/// Where a schedule stands between invocations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// A check-in instant is due
    Scheduled(CheckInInstant),
    /// Legs remain but nothing is due; the driver should advance
    Waiting,
    /// Nothing remains
    Done,
}

/// Unit of continuation passed between invocations
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "WireScheduleState")]
pub struct ScheduleState {
    pub identity: Identity,
    pub passengers: Vec<Passenger>,
    pub notify_to: Option<String>,
    pub remaining: CheckInQueue,
    pub due: Option<CheckInInstant>,
}

impl ScheduleState {
    pub fn phase(&self) -> Phase {
        match (self.due, self.remaining.is_empty()) {
            (Some(due), _) => Phase::Scheduled(due),
            (None, false) => Phase::Waiting,
            (None, true) => Phase::Done,
        }
    }

    /// Passenger whose name is used for reservation lookups
    pub fn lead_passenger(&self) -> Option<&Passenger> {
        self.passengers.first()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// Every shape a persisted state has taken
#[derive(Deserialize)]
struct WireScheduleState {
    #[serde(default)]
    identity: Option<Identity>,
    #[serde(default)]
    confirmation_number: Option<String>,
    #[serde(default)]
    passengers: Option<Vec<Passenger>>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default, rename = "notifyTo", alias = "email")]
    notify_to: Option<String>,
    #[serde(default)]
    remaining: Option<Vec<CheckInInstant>>,
    #[serde(default)]
    due: Option<CheckInInstant>,
    #[serde(default)]
    check_in_times: Option<LegacyCheckInTimes>,
}

#[derive(Deserialize)]
struct LegacyCheckInTimes {
    #[serde(default)]
    remaining: Vec<CheckInInstant>,
    #[serde(default)]
    next: Option<CheckInInstant>,
}

impl TryFrom<WireScheduleState> for ScheduleState {
    type Error = StateError;

    fn try_from(wire: WireScheduleState) -> Result<Self, Self::Error> {
        let identity = match (wire.identity, wire.confirmation_number) {
            (Some(identity), _) => identity,
            (None, Some(code)) => Identity::new(&code)?,
            (None, None) => return Err(StateError::MissingConfirmation),
        };

        let passengers = match (wire.passengers, wire.first_name, wire.last_name) {
            (Some(list), _, _) if !list.is_empty() => list,
            (_, Some(first), Some(last)) => vec![Passenger::new(&first, &last)?],
            _ => return Err(StateError::MissingPassengers),
        };

        let (remaining, due) = match wire.check_in_times {
            Some(legacy) if wire.remaining.is_none() && wire.due.is_none() => {
                (legacy.remaining, legacy.next)
            }
            _ => (wire.remaining.unwrap_or_default(), wire.due),
        };

        let mut remaining = CheckInQueue::from(remaining);
        if let Some(due) = &due {
            remaining.remove(due);
        }

        Ok(ScheduleState {
            identity,
            passengers,
            notify_to: wire.notify_to.filter(|s| !s.trim().is_empty()),
            remaining,
            due,
        })
    }
}
