use crate::board::{AnalogMuxSignal, Board, Switch3way};

use acid_cv_core::{
    controls::{ControlFrame, Knobs, PowerUpControls, Switch3wayState},
    debounce::Debouncer,
};

/// The user interface is represented here (i.e. the front panel pots, switches, and tap button that the user
/// interacts with, plus the gate and pitch CV jacks)
pub struct Ui {
    waveform_switch: Switch3wayState,
    mode_switch: Switch3wayState,

    knobs: Knobs,

    tap: Debouncer,

    // counter to decide which signal to update for a given round
    round_robbin_update_counter: u8,
}

impl Ui {
    /// `Ui::new(p)` is a new UI state starting from power-up controls `p`
    pub fn new(power_up: &PowerUpControls) -> Self {
        Self {
            waveform_switch: power_up.top_switch,
            mode_switch: power_up.bottom_switch,
            knobs: Knobs::default(),
            // a tap held at power-up must not read as a fresh press
            tap: Debouncer::with_level(power_up.tap_pressed),
            round_robbin_update_counter: 0,
        }
    }

    /// `Ui::power_up(board)` is the state of the controls which decide whether calibration runs
    pub fn power_up(board: &mut Board) -> PowerUpControls {
        PowerUpControls {
            top_switch: board.read_switch_3_way(Switch3way::Waveform),
            bottom_switch: board.read_switch_3_way(Switch3way::PlayMode),
            tap_pressed: board.tap_pressed(),
        }
    }

    /// `ui.update()` updates the UI state by reading and storing the panel control user inputs, and is the control
    /// frame for this tick
    ///
    /// It is required to call this function exactly once per control tick, the tap button is debounced in ticks.
    /// Reading the pots takes a significant amount of time. To avoid spending too much time in this function the
    /// pots and switches are updated "round-robbin" style, meaning that for a given call to this function not all of
    /// them will be updated, but repeated calls to this function will eventually update all of them. The tap
    /// button, gate, and pitch CV are read every time.
    pub fn update(&mut self, board: &mut Board) -> ControlFrame {
        // each call to this function updates a subset of the UI controls
        match self.round_robbin_update_counter {
            1 => self.waveform_switch = board.read_switch_3_way(Switch3way::Waveform),
            2 => self.mode_switch = board.read_switch_3_way(Switch3way::PlayMode),
            3 => self.knobs.decay = board.read_analog_signal(AnalogMuxSignal::Decay),
            4 => self.knobs.cutoff = board.read_analog_signal(AnalogMuxSignal::Cutoff),
            5 => self.knobs.slide = board.read_analog_signal(AnalogMuxSignal::Slide),
            6 => self.knobs.resonance = board.read_analog_signal(AnalogMuxSignal::Resonance),
            7 => self.knobs.env_mod = board.read_analog_signal(AnalogMuxSignal::EnvMod),
            8 => self.knobs.accent = board.read_analog_signal(AnalogMuxSignal::Accent),
            // reset the counter when we get to the end
            _ => self.round_robbin_update_counter = 0,
        }

        // incr the counter so next time we'll update the next control
        self.round_robbin_update_counter += 1;

        self.tap.update(board.tap_pressed());

        ControlFrame {
            tap: self.tap.state(),
            top_switch: self.waveform_switch,
            bottom_switch: self.mode_switch,
            knobs: self.knobs,
            gate: board.ext_gate(),
            raw_cv: board.pitch_cv_raw(),
        }
    }
}
