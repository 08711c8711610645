/// Check-in schedule - Stateright model
/// Drives the real `CheckInStateMachine` through every interleaving of
/// outcomes, with a bounded retry budget per leg.
///
/// Run with: cargo test --release checkin_model -- --nocapture

use stateright::*;

use super::machine::{BoardingInfo, CheckInOutcome, CheckInStateMachine};
use super::state::{Identity, Passenger, Phase, ScheduleState};
use super::timemath::CheckInInstant;

/// Outcomes the airline can hand back, without payloads
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    Cancelled,
    NotYetAvailable,
    Transient,
    Permanent,
}

impl OutcomeKind {
    const ALL: [OutcomeKind; 5] = [
        OutcomeKind::Success,
        OutcomeKind::Cancelled,
        OutcomeKind::NotYetAvailable,
        OutcomeKind::Transient,
        OutcomeKind::Permanent,
    ];

    fn retries(self) -> bool {
        matches!(self, OutcomeKind::NotYetAvailable | OutcomeKind::Transient)
    }

    fn outcome(self) -> CheckInOutcome {
        match self {
            OutcomeKind::Success => CheckInOutcome::Success(BoardingInfo::default()),
            OutcomeKind::Cancelled => CheckInOutcome::ReservationCancelled,
            OutcomeKind::NotYetAvailable => CheckInOutcome::NotYetAvailable,
            OutcomeKind::Transient => CheckInOutcome::TransientFailure("timeout".to_string()),
            OutcomeKind::Permanent => CheckInOutcome::PermanentFailure("bad page".to_string()),
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum DriverAction {
    Advance,
    Attempt(OutcomeKind),
}

/// Schedule plus the bookkeeping the driver keeps around it
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct RunModel {
    pub schedule: ScheduleState,
    pub retries: u8,
    pub consumed: Vec<CheckInInstant>,
    pub done: bool,
}

#[derive(Clone)]
pub struct CheckInChecker {
    pub plans: Vec<Vec<CheckInInstant>>,
    pub max_retries: u8,
    machine: CheckInStateMachine,
}

fn instant(raw: &str) -> CheckInInstant {
    CheckInInstant::parse(raw).unwrap()
}

impl Default for CheckInChecker {
    fn default() -> Self {
        let t1 = instant("2099-08-17T18:50:05-05:00");
        let t2 = instant("2099-08-21T07:35:05-05:00");
        let t3 = instant("2099-08-24T12:00:05-07:00");
        Self {
            plans: vec![vec![], vec![t1], vec![t2, t1], vec![t3, t2, t1]],
            max_retries: 2,
            machine: CheckInStateMachine::default(),
        }
    }
}

impl Model for CheckInChecker {
    type State = RunModel;
    type Action = DriverAction;

    fn init_states(&self) -> Vec<Self::State> {
        self.plans
            .iter()
            .map(|plan| {
                let schedule = self
                    .machine
                    .schedule(
                        Identity::new("ABC123").unwrap(),
                        vec![Passenger::new("George", "Bush").unwrap()],
                        None,
                        plan.clone(),
                    )
                    .unwrap();
                let done = schedule.phase() == Phase::Done;
                RunModel { schedule, retries: 0, consumed: Vec::new(), done }
            })
            .collect()
    }

    fn actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>) {
        if state.done {
            return;
        }
        match state.schedule.phase() {
            Phase::Scheduled(_) => {
                for kind in OutcomeKind::ALL {
                    if !kind.retries() || state.retries < self.max_retries {
                        actions.push(DriverAction::Attempt(kind));
                    }
                }
            }
            Phase::Waiting => actions.push(DriverAction::Advance),
            Phase::Done => {}
        }
    }

    fn next_state(&self, state: &Self::State, action: Self::Action) -> Option<Self::State> {
        let mut next = state.clone();

        match action {
            DriverAction::Advance => {
                next.schedule = self.machine.advance(state.schedule.clone()).ok()?;
            }
            DriverAction::Attempt(kind) => {
                let due = state.schedule.due?;
                let (schedule, step) = self.machine.complete(state.schedule.clone(), &kind.outcome()).ok()?;
                next.schedule = schedule;
                if step.retry_in_place {
                    next.retries = state.retries.saturating_add(1);
                } else {
                    next.retries = 0;
                    next.consumed.push(due);
                }
                next.done = step.is_done;
            }
        }

        Some(next)
    }

    fn properties(&self) -> Vec<Property<Self>> {
        vec![
            // Safety: the due instant is never also queued
            Property::always("due_not_queued", |_, state: &RunModel| {
                state.schedule.due.map_or(true, |due| !state.schedule.remaining.contains(&due))
            }),
            // Safety: a consumed instant is never scheduled again
            Property::always("consumed_never_requeued", |_, state: &RunModel| {
                state.consumed.iter().all(|c| {
                    !state.schedule.remaining.contains(c) && state.schedule.due != Some(*c)
                })
            }),
            // Safety: remaining stays farthest first with no duplicates
            Property::always("remaining_descending", |_, state: &RunModel| {
                let times: Vec<_> = state.schedule.remaining.iter().collect();
                times.windows(2).all(|pair| pair[0] > pair[1])
            }),
            // Safety: done means nothing is left behind
            Property::always("done_is_empty", |_, state: &RunModel| {
                !state.done || (state.schedule.due.is_none() && state.schedule.remaining.is_empty())
            }),
            // Liveness: every schedule finishes once retries are bounded
            Property::eventually("schedule_finishes", |_, state: &RunModel| state.done),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stateright::Checker;

    #[test]
    fn checkin_model_check_safety() {
        let checker = CheckInChecker::default().checker().spawn_bfs().join();

        println!("States explored: {}", checker.unique_state_count());

        checker.assert_properties();
    }

    #[test]
    fn checkin_model_explores_retries() {
        let checker = CheckInChecker::default().checker().spawn_bfs().join();
        assert!(
            checker.unique_state_count() > 20,
            "Expected more than 20 states, got {}",
            checker.unique_state_count()
        );
    }

    #[test]
    fn checkin_model_two_leg_success_path() {
        let model = CheckInChecker::default();
        let mut state = model.init_states()[2].clone();
        assert!(matches!(state.schedule.phase(), Phase::Scheduled(_)));

        state = model
            .next_state(&state, DriverAction::Attempt(OutcomeKind::Transient))
            .unwrap();
        assert_eq!(state.retries, 1);
        assert!(state.consumed.is_empty());

        state = model
            .next_state(&state, DriverAction::Attempt(OutcomeKind::Success))
            .unwrap();
        assert_eq!(state.retries, 0);
        assert_eq!(state.schedule.phase(), Phase::Waiting);

        state = model.next_state(&state, DriverAction::Advance).unwrap();
        state = model
            .next_state(&state, DriverAction::Attempt(OutcomeKind::Success))
            .unwrap();
        assert!(state.done);
        assert_eq!(state.consumed.len(), 2);
    }

    #[test]
    fn checkin_model_cancel_ends_early() {
        let model = CheckInChecker::default();
        let state = model.init_states()[3].clone();

        let state = model
            .next_state(&state, DriverAction::Attempt(OutcomeKind::Cancelled))
            .unwrap();
        assert!(state.done);
        assert!(state.schedule.remaining.is_empty());

        let mut actions = Vec::new();
        model.actions(&state, &mut actions);
        assert!(actions.is_empty());
    }

    #[test]
    fn checkin_model_retry_budget_exhausted() {
        let model = CheckInChecker::default();
        let mut state = model.init_states()[1].clone();
        for _ in 0..model.max_retries {
            state = model
                .next_state(&state, DriverAction::Attempt(OutcomeKind::NotYetAvailable))
                .unwrap();
        }

        let mut actions = Vec::new();
        model.actions(&state, &mut actions);
        assert!(!actions.contains(&DriverAction::Attempt(OutcomeKind::Transient)));
        assert!(actions.contains(&DriverAction::Attempt(OutcomeKind::Permanent)));
    }
}
