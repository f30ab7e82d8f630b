use std::collections::VecDeque;
use std::time::Duration;

use bevy::prelude::*;
use serde::Serialize;

use constants::interaction::ENTER_DWELL_MS;

/// Which side of the portal the player is on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PortalState {
    #[default]
    Outside,
    Entering,
    Inside,
}

impl PortalState {
    pub fn as_str(self) -> &'static str {
        match self {
            PortalState::Outside => "outside",
            PortalState::Entering => "entering",
            PortalState::Inside => "inside",
        }
    }

    /// The only state reachable from `self`.
    pub fn successor(self) -> PortalState {
        match self {
            PortalState::Outside => PortalState::Entering,
            PortalState::Entering => PortalState::Inside,
            PortalState::Inside => PortalState::Outside,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    Proximity,
    UserEnter,
    DwellElapsed,
    UserExit,
    Hidden,
}

#[derive(Event, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortalTransition {
    pub from: PortalState,
    pub to: PortalState,
    pub cause: TransitionCause,
}

#[derive(Resource, Debug)]
pub struct PortalStateMachine {
    state: PortalState,
    dwell: Timer,
    cancelled: bool,
    pending: VecDeque<PortalTransition>,
}

impl Default for PortalStateMachine {
    fn default() -> Self {
        Self::new(Duration::from_millis(ENTER_DWELL_MS))
    }
}

impl PortalStateMachine {
    pub fn new(dwell: Duration) -> Self {
        Self {
            state: PortalState::Outside,
            dwell: Timer::new(dwell, TimerMode::Once),
            cancelled: false,
            pending: VecDeque::new(),
        }
    }

    pub fn state(&self) -> PortalState {
        self.state
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Replaces the dwell duration. An entering dwell already in flight keeps its elapsed time.
    pub fn set_dwell(&mut self, dwell: Duration) {
        self.dwell.set_duration(dwell);
    }

    pub fn dwell_remaining(&self) -> Option<Duration> {
        (self.state == PortalState::Entering && !self.cancelled).then(|| self.dwell.remaining())
    }

    /// `Outside -> Entering`. Returns false when the request was ignored.
    pub fn begin_entering(&mut self, cause: TransitionCause) -> bool {
        if self.cancelled || self.state != PortalState::Outside {
            return false;
        }
        self.dwell.reset();
        self.transition(PortalState::Entering, cause);
        true
    }

    /// Advances the entering dwell; completes `Entering -> Inside` once it elapses.
    pub fn tick(&mut self, delta: Duration) -> bool {
        if self.cancelled || self.state != PortalState::Entering {
            return false;
        }
        self.dwell.tick(delta);
        if !self.dwell.finished() {
            return false;
        }
        self.transition(PortalState::Inside, TransitionCause::DwellElapsed);
        true
    }

    pub fn exit(&mut self) -> bool {
        self.leave_inside(TransitionCause::UserExit)
    }

    pub fn visibility_hidden(&mut self) -> bool {
        self.leave_inside(TransitionCause::Hidden)
    }

    /// Stops the dwell for good. Returns true the first time only.
    pub fn cancel(&mut self) -> bool {
        if self.cancelled {
            return false;
        }
        self.cancelled = true;
        self.dwell.pause();
        true
    }

    pub fn drain_transitions(&mut self) -> impl Iterator<Item = PortalTransition> + '_ {
        self.pending.drain(..)
    }

    fn leave_inside(&mut self, cause: TransitionCause) -> bool {
        if self.cancelled || self.state != PortalState::Inside {
            return false;
        }
        self.transition(PortalState::Outside, cause);
        true
    }

    fn transition(&mut self, to: PortalState, cause: TransitionCause) {
        debug_assert_eq!(self.state.successor(), to);
        let from = self.state;
        self.state = to;
        self.pending.push_back(PortalTransition { from, to, cause });
    }
}

/// Ticks the entering dwell on the frame clock, independent of which render loop is active.
pub fn advance_dwell_timer(time: Res<Time>, mut machine: ResMut<PortalStateMachine>) {
    if machine.state() == PortalState::Entering {
        machine.tick(time.delta());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn dwell_completes_after_nine_hundred_ms() {
        let mut machine = PortalStateMachine::default();
        assert!(machine.begin_entering(TransitionCause::UserEnter));
        assert!(!machine.tick(Duration::from_millis(899)));
        assert_eq!(machine.state(), PortalState::Entering);
        assert!(machine.tick(Duration::from_millis(1)));
        assert_eq!(machine.state(), PortalState::Inside);

        let causes: Vec<_> = machine.drain_transitions().map(|t| t.cause).collect();
        assert_eq!(causes, vec![TransitionCause::UserEnter, TransitionCause::DwellElapsed]);
    }

    #[test]
    fn hidden_only_leaves_inside() {
        let mut machine = PortalStateMachine::default();
        assert!(!machine.visibility_hidden());
        assert_eq!(machine.state(), PortalState::Outside);

        machine.begin_entering(TransitionCause::Proximity);
        assert!(!machine.visibility_hidden());
        machine.tick(Duration::from_secs(1));
        assert!(machine.visibility_hidden());
        assert_eq!(machine.state(), PortalState::Outside);

        let last = machine.drain_transitions().last();
        assert_eq!(
            last,
            Some(PortalTransition {
                from: PortalState::Inside,
                to: PortalState::Outside,
                cause: TransitionCause::Hidden,
            })
        );
    }

    #[test]
    fn exit_while_entering_is_ignored() {
        let mut machine = PortalStateMachine::default();
        machine.begin_entering(TransitionCause::UserEnter);
        assert!(!machine.exit());
        assert_eq!(machine.state(), PortalState::Entering);
    }

    #[test]
    fn cancelled_dwell_never_fires() {
        let mut machine = PortalStateMachine::default();
        machine.begin_entering(TransitionCause::UserEnter);
        assert!(machine.cancel());
        assert!(!machine.cancel());
        assert!(!machine.tick(Duration::from_secs(5)));
        assert_eq!(machine.state(), PortalState::Entering);
        assert_eq!(machine.dwell_remaining(), None);
    }

    #[test]
    fn re_entering_restarts_the_dwell() {
        let mut machine = PortalStateMachine::default();
        machine.begin_entering(TransitionCause::UserEnter);
        machine.tick(Duration::from_millis(900));
        machine.exit();
        machine.begin_entering(TransitionCause::Proximity);
        assert!(!machine.tick(Duration::from_millis(500)));
        assert_eq!(machine.state(), PortalState::Entering);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Enter,
        Proximity,
        Exit,
        Hidden,
        Tick(u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Enter),
            Just(Op::Proximity),
            Just(Op::Exit),
            Just(Op::Hidden),
            (0u64..1200).prop_map(Op::Tick),
        ]
    }

    proptest! {
        #[test]
        fn transitions_walk_the_cycle_in_order(ops in prop::collection::vec(op(), 0..48)) {
            let mut machine = PortalStateMachine::default();
            let mut seen = Vec::new();
            for op in ops {
                match op {
                    Op::Enter => { machine.begin_entering(TransitionCause::UserEnter); }
                    Op::Proximity => { machine.begin_entering(TransitionCause::Proximity); }
                    Op::Exit => { machine.exit(); }
                    Op::Hidden => { machine.visibility_hidden(); }
                    Op::Tick(ms) => { machine.tick(Duration::from_millis(ms)); }
                }
                seen.extend(machine.drain_transitions());
            }

            let mut expected_from = PortalState::Outside;
            for transition in &seen {
                prop_assert_eq!(transition.from, expected_from);
                prop_assert_eq!(transition.to, transition.from.successor());
                expected_from = transition.to;
            }
            prop_assert_eq!(machine.state(), expected_from);
        }
    }
}
