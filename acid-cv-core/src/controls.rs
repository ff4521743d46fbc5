//! The front panel as seen by the core, one snapshot per control tick.

use crate::gate::TriggerEdge;

/// Valid states of a 3-way switch are represented here
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Switch3wayState {
    Up,
    Middle,
    Down,
}

/// The debounced state of a momentary push-button
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonState {
    /// The button is stably held down
    pub held: bool,
    /// Edges seen during this tick
    pub edge: TriggerEdge,
}

/// The front panel knobs, each in `[0.0, 1.0]`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Knobs {
    pub decay: f32,
    pub cutoff: f32,
    pub slide: f32,
    pub resonance: f32,
    pub env_mod: f32,
    pub accent: f32,
}

/// Everything the platform reads for one control tick
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlFrame {
    /// The debounced tap button
    pub tap: ButtonState,
    /// The top switch selects the waveform
    pub top_switch: Switch3wayState,
    /// The bottom switch selects the play mode
    pub bottom_switch: Switch3wayState,
    pub knobs: Knobs,
    /// The level of the gate input
    pub gate: bool,
    /// The uncalibrated reading of the pitch CV input
    pub raw_cv: u16,
}

impl Default for ControlFrame {
    fn default() -> Self {
        Self {
            tap: ButtonState::default(),
            top_switch: Switch3wayState::Up,
            bottom_switch: Switch3wayState::Up,
            knobs: Knobs::default(),
            gate: false,
            raw_cv: u16::MAX,
        }
    }
}

/// The controls which decide whether calibration runs, read once at power-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerUpControls {
    pub top_switch: Switch3wayState,
    pub bottom_switch: Switch3wayState,
    /// The raw, undebounced level of the tap button
    pub tap_pressed: bool,
}

impl PowerUpControls {
    /// `p.requests_calibration()` is true iff both switches are down and the tap button is held
    pub fn requests_calibration(&self) -> bool {
        self.top_switch == Switch3wayState::Down
            && self.bottom_switch == Switch3wayState::Down
            && self.tap_pressed
    }
}
