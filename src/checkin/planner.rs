//! Itinerary planning
//!
//! Turns the flight legs of a reservation into the queue of check-in
//! instants the state machine consumes.

use chrono::{DateTime, FixedOffset, TimeZone};
use serde::{Deserialize, Serialize};

use super::timemath::{CheckInInstant, DEFAULT_SKEW_SECS};

/// One scheduled flight segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightLeg {
    pub departure: DateTime<FixedOffset>,
    /// Opaque description (e.g. "MDW-LAX"), passed through untouched
    #[serde(default)]
    pub label: Option<String>,
}

impl FlightLeg {
    pub fn new(departure: DateTime<FixedOffset>) -> Self {
        Self { departure, label: None }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Flight legs of one reservation, in the order the airline listed them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    pub legs: Vec<FlightLeg>,
}

impl Itinerary {
    pub fn new(legs: Vec<FlightLeg>) -> Self {
        Self { legs }
    }
}

/// Derives ordered check-in instants for an itinerary
#[derive(Debug, Clone, Copy)]
pub struct ItineraryPlanner {
    skew_secs: i64,
}

impl Default for ItineraryPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_SKEW_SECS)
    }
}

impl ItineraryPlanner {
    pub fn new(skew_secs: i64) -> Self {
        Self { skew_secs }
    }

    pub fn skew_secs(&self) -> i64 {
        self.skew_secs
    }

    /// Check-in instants for `itinerary`, farthest first and soonest last.
    ///
    /// Instants at or before `now` are dropped unless `include_expired` is
    /// set. Every remaining leg yields an entry, including legs that share
    /// an instant.
    pub fn plan<Tz: TimeZone>(
        &self,
        itinerary: &Itinerary,
        now: &DateTime<Tz>,
        include_expired: bool,
    ) -> Vec<CheckInInstant> {
        let mut times: Vec<CheckInInstant> = itinerary
            .legs
            .iter()
            .map(|leg| CheckInInstant::for_departure(leg.departure, self.skew_secs))
            .filter(|instant| include_expired || instant.at() > *now)
            .collect();

        // Stable, so equal instants keep leg order
        times.sort();
        times.reverse();
        times
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn legs_strategy() -> impl Strategy<Value = Vec<i64>> {
        prop::collection::vec(0i64..4_000_000_000i64, 0..8)
    }

    fn itinerary_from(secs: &[i64]) -> Itinerary {
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        Itinerary::new(
            secs.iter()
                .map(|s| FlightLeg::new(DateTime::from_timestamp(*s, 0).unwrap().with_timezone(&offset)))
                .collect(),
        )
    }

    proptest! {
        /// Output is descending, so the soonest is at the tail
        #[test]
        fn descending(secs in legs_strategy(), now_secs in 0i64..4_000_000_000i64) {
            let now = DateTime::from_timestamp(now_secs, 0).unwrap();
            let plan = ItineraryPlanner::default().plan(&itinerary_from(&secs), &now, false);
            for pair in plan.windows(2) {
                prop_assert!(pair[0] >= pair[1]);
            }
        }

        /// Without include_expired, every instant is strictly after now
        #[test]
        fn only_future(secs in legs_strategy(), now_secs in 0i64..4_000_000_000i64) {
            let now = DateTime::from_timestamp(now_secs, 0).unwrap();
            let plan = ItineraryPlanner::default().plan(&itinerary_from(&secs), &now, false);
            prop_assert!(plan.iter().all(|t| t.at() > now));
        }

        /// With include_expired, one instant per leg, even for shared departures
        #[test]
        fn include_expired_counts_legs(
            secs in prop::collection::vec(prop_oneof![0i64..4_000_000_000i64, 0i64..3i64], 0..8),
        ) {
            let plan = ItineraryPlanner::default().plan(&itinerary_from(&secs), &Utc::now(), true);
            prop_assert_eq!(plan.len(), secs.len());
        }

        /// Same input, same output
        #[test]
        fn deterministic(secs in legs_strategy(), now_secs in 0i64..4_000_000_000i64) {
            let now = DateTime::from_timestamp(now_secs, 0).unwrap();
            let planner = ItineraryPlanner::default();
            let itinerary = itinerary_from(&secs);
            prop_assert_eq!(planner.plan(&itinerary, &now, false), planner.plan(&itinerary, &now, false));
        }
    }
}
