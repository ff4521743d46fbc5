//! Edge detection for boolean gate signals.

/// Enumerated gate states are represented here. A gate signal will be in exactly one of these states at any given time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GateState {
    Low,
    Rising,
    High,
    Falling,
}

/// The edges seen on a signal during one control tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TriggerEdge {
    pub rising: bool,
    pub falling: bool,
}

impl From<GateState> for TriggerEdge {
    fn from(state: GateState) -> Self {
        Self {
            rising: state == GateState::Rising,
            falling: state == GateState::Falling,
        }
    }
}

/// An edge detector which compares the current level of a gate against the level from the previous tick
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeDetector {
    // the last state allows us to detect rising and falling edges
    last: bool,
}

impl EdgeDetector {
    /// `EdgeDetector::new()` is a new edge detector that assumes the gate starts low
    pub fn new() -> Self {
        Self::default()
    }

    /// `ed.update(l)` is the gate state resulting from new level `l`, must be called exactly once per control tick
    pub fn update(&mut self, level: bool) -> GateState {
        let state = gate_state_from_last_and_curr(self.last, level);
        self.last = level;
        state
    }
}

/// `gate_state_from_last_and_curr(l, c)` is the gate state that results from the last and current inputs
fn gate_state_from_last_and_curr(last: bool, curr: bool) -> GateState {
    match (last, curr) {
        (false, false) => GateState::Low,
        (false, true) => GateState::Rising,
        (true, true) => GateState::High,
        (true, false) => GateState::Falling,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_states_follow_levels() {
        let mut ed = EdgeDetector::new();
        assert_eq!(ed.update(false), GateState::Low);
        assert_eq!(ed.update(true), GateState::Rising);
        assert_eq!(ed.update(true), GateState::High);
        assert_eq!(ed.update(false), GateState::Falling);
        assert_eq!(ed.update(false), GateState::Low);
    }

    #[test]
    fn held_gate_rises_once() {
        let mut ed = EdgeDetector::new();
        let rising = (0..100)
            .filter(|_| TriggerEdge::from(ed.update(true)).rising)
            .count();
        assert_eq!(rising, 1);
    }

    #[test]
    fn trigger_edge_from_gate_state() {
        assert_eq!(
            TriggerEdge::from(GateState::Rising),
            TriggerEdge {
                rising: true,
                falling: false
            }
        );
        assert_eq!(
            TriggerEdge::from(GateState::Falling),
            TriggerEdge {
                rising: false,
                falling: true
            }
        );
        assert_eq!(TriggerEdge::from(GateState::High), TriggerEdge::default());
        assert_eq!(TriggerEdge::from(GateState::Low), TriggerEdge::default());
    }
}
