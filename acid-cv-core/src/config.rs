//! Tunable constants for the core, grouped so the firmware can override them in one place.

/// How the CV input is read at a calibration step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Capture {
    /// One raw reading
    Single,
    /// The rounded mean of `average_count` readings taken on consecutive ticks
    Averaged,
}

/// Configuration of the calibration procedure
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationConfig {
    /// The voltage the user patches in at each of the three steps
    pub reference_volts: [f32; 3],
    /// How each step reads the input
    pub captures: [Capture; 3],
    /// The number of readings in an averaged capture
    pub average_count: u8,
    /// Give up if any single wait lasts longer than this many ticks, `None` waits forever
    pub timeout_ticks: Option<u32>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            reference_volts: [1.0, 2.0, 3.0],
            captures: [Capture::Single, Capture::Averaged, Capture::Averaged],
            average_count: 10,
            timeout_ticks: None,
        }
    }
}

/// Configuration of the note handling
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// The octave of the lowest playable note, 0 volts plays C one octave above it
    pub base_octave: u8,
    /// Raw readings at or above this are near the rail, meaning nothing is patched in
    pub rail_threshold: u16,
    /// The fixed velocity of every note
    pub velocity: u8,
    /// The slide knob is clamped to this before being compared against `slide_threshold`
    pub slide_knob_max: f32,
    /// Notes slide when the clamped slide knob is above this
    pub slide_threshold: f32,
    /// Main envelope decay applied at startup, in milliseconds
    pub initial_decay_ms: f32,
    pub calibration: CalibrationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_octave: 2,
            rail_threshold: 63_200,
            velocity: 150,
            slide_knob_max: 0.5,
            slide_threshold: 0.1,
            initial_decay_ms: 2_000.0,
            calibration: CalibrationConfig::default(),
        }
    }
}
