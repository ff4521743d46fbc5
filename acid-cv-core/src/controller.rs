use crate::calibration::{CalibrationOutcome, CalibrationState, CalibrationStateMachine};
use crate::config::Config;
use crate::controls::{ControlFrame, PowerUpControls};
use crate::curve::CalibrationCurve;
use crate::modes::{self, PlayMode};
use crate::notes::NoteEventManager;
use crate::pitch::PitchConverter;
use crate::storage::{self, CalibrationStorage};
use crate::voice::{Parameter, Voice};

/// The control-rate logic of the instrument is represented here
///
/// The controller owns the active calibration curve and its storage. Each control tick it either advances the
/// calibration procedure, or reads the panel and plays notes, never both.
pub struct Controller<S: CalibrationStorage> {
    config: Config,
    storage: S,
    curve: CalibrationCurve,
    calibration: CalibrationStateMachine,
    pitch: PitchConverter,
    notes: NoteEventManager,
    mode: PlayMode,
}

impl<S: CalibrationStorage> Controller<S> {
    /// `Controller::new(s, c, p)` is a new controller with storage `s`, config `c` and power-up controls `p`
    ///
    /// The stored calibration curve is loaded, or the default one if there is no valid stored curve. Calibration
    /// starts iff the power-up controls ask for it.
    pub fn new(mut storage: S, config: Config, power_up: PowerUpControls) -> Self {
        let curve = storage::load_or_default(&mut storage);
        Self {
            config,
            storage,
            curve,
            calibration: CalibrationStateMachine::at_power_up(&power_up, config.calibration),
            pitch: PitchConverter::from_config(&config),
            notes: NoteEventManager::new(config.velocity),
            mode: PlayMode::from(power_up.bottom_switch),
        }
    }

    /// `c.init_voice(v)` writes the startup settings which are not tied to a knob to voice `v`
    pub fn init_voice<V: Voice>(&self, voice: &mut V) {
        voice.set_parameter(Parameter::Decay(self.config.initial_decay_ms));
    }

    /// `c.tick(f, v)` runs one control tick with panel snapshot `f`, playing on voice `v`
    pub fn tick<V: Voice>(&mut self, frame: &ControlFrame, voice: &mut V) {
        if !self.calibration.is_done() {
            if let Some(outcome) = self.calibration.tick(frame.tap, frame.raw_cv) {
                self.finish_calibration(outcome);
            }
            self.notes.track_gate(frame.gate);
            return;
        }

        self.mode = PlayMode::from(frame.bottom_switch);
        self.mode.scaling().apply(&frame.knobs, voice);
        voice.set_parameter(Parameter::Waveform(modes::waveform(frame.top_switch)));

        let slide = frame.knobs.slide.min(self.config.slide_knob_max) > self.config.slide_threshold;
        let note = self.pitch.convert(frame.raw_cv, &self.curve);

        self.notes
            .process_cycle(frame.gate, frame.tap.edge, slide, self.mode, note, voice);
    }

    fn finish_calibration(&mut self, outcome: CalibrationOutcome) {
        if let CalibrationOutcome::Calibrated(curve) = outcome {
            self.curve = curve;
            if let Err(_e) = self.storage.save(&curve) {
                #[cfg(feature = "defmt")]
                defmt::error!("failed to save calibration: {}", _e);
            }
        }
    }

    /// `c.curve()` is the active calibration curve
    pub fn curve(&self) -> CalibrationCurve {
        self.curve
    }

    /// `c.is_calibrating()` is true iff the calibration procedure is running
    pub fn is_calibrating(&self) -> bool {
        !self.calibration.is_done()
    }

    /// `c.calibration_state()` is the state of the calibration procedure
    pub fn calibration_state(&self) -> CalibrationState {
        self.calibration.state()
    }

    /// `c.mode()` is the play mode as of the last tick
    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    #[cfg(test)]
    fn storage(&self) -> &S {
        &self.storage
    }
}
