use crate::controls::ButtonState;
use crate::gate::TriggerEdge;

/// A shift-register debouncer for a momentary push-button is represented here
///
/// The raw button level is shifted into an 8 bit history once per control tick. The button is considered pressed
/// once the whole history reads pressed, and edges are reported on the single tick where the history first settles
/// after a change. Chatter shorter than seven ticks never produces an edge.
#[derive(Debug, Clone, Copy, Default)]
pub struct Debouncer {
    history: u8,
    edge: TriggerEdge,
}

impl Debouncer {
    /// `Debouncer::new()` is a new debouncer with the button released
    pub fn new() -> Self {
        Self::default()
    }

    /// `Debouncer::with_level(p)` is a new debouncer which has already settled with pressed state `p`
    ///
    /// A button which is held at power-up does not report a rising edge once the history fills.
    pub fn with_level(pressed: bool) -> Self {
        Self {
            history: if pressed { 0xFF } else { 0x00 },
            edge: TriggerEdge::default(),
        }
    }

    /// `d.update(p)` shifts raw pressed state `p` into the history, must be called exactly once per control tick
    pub fn update(&mut self, pressed: bool) {
        self.history = (self.history << 1) | pressed as u8;
        self.edge = TriggerEdge {
            rising: self.history == RISING_PATTERN,
            falling: self.history == FALLING_PATTERN,
        };
    }

    /// `d.held()` is true iff the button has read pressed for the whole history window
    pub fn held(&self) -> bool {
        self.history == 0xFF
    }

    /// `d.edge()` is the edge detected by the most recent update
    pub fn edge(&self) -> TriggerEdge {
        self.edge
    }

    /// `d.state()` is the debounced button state as handed to the core each control tick
    pub fn state(&self) -> ButtonState {
        ButtonState {
            held: self.held(),
            edge: self.edge,
        }
    }
}

// one released sample followed by seven pressed ones
const RISING_PATTERN: u8 = 0b0111_1111;
// one pressed sample followed by seven released ones
const FALLING_PATTERN: u8 = 0b1000_0000;

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(d: &mut Debouncer, level: bool, ticks: usize) -> (usize, usize) {
        let mut rising = 0;
        let mut falling = 0;
        for _ in 0..ticks {
            d.update(level);
            rising += d.edge().rising as usize;
            falling += d.edge().falling as usize;
        }
        (rising, falling)
    }

    #[test]
    fn steady_press_gives_one_rising_edge() {
        let mut d = Debouncer::new();
        assert_eq!(feed(&mut d, true, 6), (0, 0));
        assert_eq!(feed(&mut d, true, 1), (1, 0));
        assert!(!d.held());
        assert_eq!(feed(&mut d, true, 50), (0, 0));
        assert!(d.held());
    }

    #[test]
    fn release_gives_one_falling_edge() {
        let mut d = Debouncer::new();
        feed(&mut d, true, 20);
        assert_eq!(feed(&mut d, false, 7), (0, 1));
        assert!(!d.held());
        assert_eq!(feed(&mut d, false, 50), (0, 0));
    }

    #[test]
    fn chatter_produces_no_edges() {
        let mut d = Debouncer::new();
        let mut rising = 0;
        for i in 0..100 {
            d.update(i % 3 != 0);
            rising += d.edge().rising as usize;
        }
        assert_eq!(rising, 0);
        assert!(!d.held());
    }

    #[test]
    fn edge_only_lasts_one_tick() {
        let mut d = Debouncer::new();
        feed(&mut d, true, 7);
        assert!(d.edge().rising);
        d.update(true);
        assert!(!d.edge().rising);
        assert!(!d.state().edge.rising);
    }

    #[test]
    fn seeded_held_button_reports_no_rising_edge() {
        let mut d = Debouncer::with_level(true);
        assert!(d.held());
        assert_eq!(feed(&mut d, true, 20), (0, 0));
        assert_eq!(feed(&mut d, false, 7), (0, 1));
    }

    #[test]
    fn bouncy_press_settles_to_single_edge() {
        let mut d = Debouncer::new();
        let mut rising = 0;
        for level in [true, false, true, true, false, true] {
            d.update(level);
            rising += d.edge().rising as usize;
        }
        let (r, _) = feed(&mut d, true, 20);
        assert_eq!(rising + r, 1);
    }
}
