//! Clock and init generation for testbench simulation
//!
//! Every simulation starts with one clock cycle where `init` is high, and
//! that cycle's rising edge is the only one that ever sees `init = 1`:
//!
//! ```text
//! state:  Undefined  InitHighPreEdge  InitHighPostEdge  Running ...
//! clk:        X            0                 1             0  1  0  1
//! init:       X            1                 1             0  0  0  0
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleState {
    /// Nothing driven yet
    Undefined,
    InitHighPreEdge,
    InitHighPostEdge,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    None,
    Rising,
    Falling,
}

/// Values driven onto the `[clock, init]` inputs for one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drive {
    pub clock: bool,
    pub init: bool,
}

/// One scheduled evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub state: ScheduleState,
    pub drive: Drive,
    pub edge: Edge,
}

impl Tick {
    /// `done` and `success` are only read on running rising edges
    pub fn samples_outputs(&self) -> bool {
        self.state == ScheduleState::Running && self.edge == Edge::Rising
    }
}

/// Previous/current sample of one clock
#[derive(Debug, Clone, Default)]
pub struct ClockTracker {
    current: Option<bool>,
    previous: Option<bool>,
}

impl ClockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// An unknown previous value counts as the opposite level
    pub fn detect_edge(&self) -> Edge {
        match (self.previous, self.current) {
            (Some(false) | None, Some(true)) => Edge::Rising,
            (Some(true) | None, Some(false)) => Edge::Falling,
            _ => Edge::None,
        }
    }

    pub fn update(&mut self, value: bool) -> Edge {
        self.previous = self.current;
        self.current = Some(value);
        self.detect_edge()
    }

    pub fn toggle(&mut self) -> Edge {
        let next = !self.current.unwrap_or(true);
        self.update(next)
    }

    pub fn value(&self) -> Option<bool> {
        self.current
    }
}

#[derive(Debug, Clone)]
pub struct SimSchedule {
    state: ScheduleState,
    clock: ClockTracker,
    rising_edges: u64,
}

impl Default for SimSchedule {
    fn default() -> Self {
        Self::new()
    }
}

impl SimSchedule {
    pub fn new() -> Self {
        Self {
            state: ScheduleState::Undefined,
            clock: ClockTracker::new(),
            rising_edges: 0,
        }
    }

    pub fn state(&self) -> ScheduleState {
        self.state
    }

    /// Rising edges emitted so far, including the init edge
    pub fn rising_edges(&self) -> u64 {
        self.rising_edges
    }

    /// Move to the next state and return what to drive for it
    pub fn advance(&mut self) -> Tick {
        let (state, init, edge) = match self.state {
            ScheduleState::Undefined => {
                (ScheduleState::InitHighPreEdge, true, self.clock.update(false))
            }
            ScheduleState::InitHighPreEdge => {
                (ScheduleState::InitHighPostEdge, true, self.clock.update(true))
            }
            ScheduleState::InitHighPostEdge => {
                (ScheduleState::Running, false, self.clock.update(false))
            }
            ScheduleState::Running => (ScheduleState::Running, false, self.clock.toggle()),
        };
        self.state = state;
        if edge == Edge::Rising {
            self.rising_edges += 1;
        }
        Tick {
            state,
            drive: Drive {
                clock: self.clock.value().unwrap_or(false),
                init,
            },
            edge,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_sequence() {
        let mut schedule = SimSchedule::new();
        let drives: Vec<(bool, bool)> = (0..7)
            .map(|_| {
                let t = schedule.advance();
                (t.drive.clock, t.drive.init)
            })
            .collect();
        assert_eq!(
            drives,
            vec![
                (false, true),
                (true, true),
                (false, false),
                (true, false),
                (false, false),
                (true, false),
                (false, false),
            ]
        );
        assert_eq!(schedule.state(), ScheduleState::Running);
        assert_eq!(schedule.rising_edges(), 3);
    }

    #[test]
    fn test_only_running_rising_edges_sample() {
        let mut schedule = SimSchedule::new();
        let sampled: Vec<bool> = (0..6).map(|_| schedule.advance().samples_outputs()).collect();
        assert_eq!(sampled, vec![false, false, false, true, false, true]);
    }

    #[test]
    fn test_clock_tracker_edges() {
        let mut clk = ClockTracker::new();
        assert_eq!(clk.detect_edge(), Edge::None);
        assert_eq!(clk.update(true), Edge::Rising);
        assert_eq!(clk.update(true), Edge::None);
        assert_eq!(clk.toggle(), Edge::Falling);
        assert_eq!(clk.toggle(), Edge::Rising);
        assert_eq!(clk.value(), Some(true));
    }
}
