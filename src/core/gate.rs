//! Readiness gate - leaves the loading phase exactly once.
//!
//! Opens on the first tick where the synthetic timer reached 100% AND every
//! preload attempt settled. Both conditions progress independently, so the
//! host evaluates the gate on every tick.
//!
//! With a maximum wait configured, a gate that has not opened by the deadline
//! turns `TimedOut` instead and stays there until re-armed.

use serde::Serialize;
use std::time::{Duration, Instant};

/// Both completion conditions hold
pub fn is_ready(progress_complete: bool, preload_complete: bool) -> bool {
    progress_complete && preload_complete
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    /// Not armed yet
    Idle,
    Waiting,
    Open,
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct ReadinessGate {
    state: GateState,
    max_wait: Option<Duration>,
    deadline: Option<Instant>,
    opened_at: Option<Instant>,
}

impl ReadinessGate {
    pub fn new(max_wait: Option<Duration>) -> Self {
        Self {
            state: GateState::Idle,
            max_wait,
            deadline: None,
            opened_at: None,
        }
    }

    /// Start waiting for a new loading cycle.
    pub fn arm(&mut self, now: Instant) {
        self.state = GateState::Waiting;
        self.deadline = self.max_wait.map(|wait| now + wait);
        self.opened_at = None;
    }

    /// Evaluate on a tick. True only on the tick the gate opens.
    pub fn evaluate(&mut self, now: Instant, progress_complete: bool, preload_complete: bool) -> bool {
        if self.state != GateState::Waiting {
            return false;
        }
        if is_ready(progress_complete, preload_complete) {
            self.state = GateState::Open;
            self.opened_at = Some(now);
            log::info!("Readiness gate open");
            return true;
        }
        if self.deadline.is_some_and(|deadline| now >= deadline) {
            self.state = GateState::TimedOut;
            log::warn!(
                "Readiness gate timed out (progress complete: {}, preload complete: {})",
                progress_complete,
                preload_complete
            );
        }
        false
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == GateState::Open
    }

    pub fn opened_at(&self) -> Option<Instant> {
        self.opened_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicate() {
        assert!(is_ready(true, true));
        assert!(!is_ready(true, false));
        assert!(!is_ready(false, true));
        assert!(!is_ready(false, false));
    }

    #[test]
    fn test_fires_once() {
        let t0 = Instant::now();
        let mut gate = ReadinessGate::new(None);
        gate.arm(t0);

        assert!(!gate.evaluate(t0, true, false));
        assert!(!gate.evaluate(t0, false, true));
        assert!(gate.evaluate(t0, true, true));
        assert!(!gate.evaluate(t0, true, true));
        assert!(!gate.evaluate(t0, true, true));
        assert!(gate.is_open());
        assert_eq!(gate.opened_at(), Some(t0));
    }

    #[test]
    fn test_unarmed_never_fires() {
        let mut gate = ReadinessGate::new(None);
        assert!(!gate.evaluate(Instant::now(), true, true));
        assert_eq!(gate.state(), GateState::Idle);
    }

    #[test]
    fn test_either_order_of_completion() {
        let t0 = Instant::now();
        // Timer first, preload later
        let mut gate = ReadinessGate::new(None);
        gate.arm(t0);
        let ticks = [(true, false), (true, false), (true, true)];
        let fired: Vec<bool> = ticks.iter().map(|&(p, l)| gate.evaluate(t0, p, l)).collect();
        assert_eq!(fired, vec![false, false, true]);

        // Preload first, timer later
        let mut gate = ReadinessGate::new(None);
        gate.arm(t0);
        let ticks = [(false, true), (false, true), (true, true)];
        let fired: Vec<bool> = ticks.iter().map(|&(p, l)| gate.evaluate(t0, p, l)).collect();
        assert_eq!(fired, vec![false, false, true]);
    }

    #[test]
    fn test_timeout() {
        let t0 = Instant::now();
        let mut gate = ReadinessGate::new(Some(Duration::from_secs(10)));
        gate.arm(t0);

        assert!(!gate.evaluate(t0 + Duration::from_secs(9), true, false));
        assert_eq!(gate.state(), GateState::Waiting);
        assert!(!gate.evaluate(t0 + Duration::from_secs(10), true, false));
        assert_eq!(gate.state(), GateState::TimedOut);

        // Late completion does not open a timed-out gate
        assert!(!gate.evaluate(t0 + Duration::from_secs(11), true, true));

        // Re-arming starts over
        gate.arm(t0 + Duration::from_secs(12));
        assert!(gate.evaluate(t0 + Duration::from_secs(13), true, true));
    }
}
