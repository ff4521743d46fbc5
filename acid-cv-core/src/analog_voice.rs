//! # Analog voice
//!
//! A [`Voice`] for a DAC-driven analog signal path. Oscillator, filter and VCA are analog, this module generates the
//! control voltages for them: 1volt/octave pitch with slide, filter cutoff with the main envelope mixed in, VCA
//! level from the amplitude envelope, plus static resonance and waveform controls.

use heapless::Vec;
use synth_utils::adsr::{Adsr, Input};
use synth_utils::glide_processor::GlideProcessor;

use crate::pitch::NoteNumber;
use crate::voice::{Parameter, Voice};

/// One frame of control voltages for the analog signal path
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VoiceOutput {
    /// Pitch in volts, 1volt/octave, [`PITCH_ZERO_NOTE`] is 0 volts
    pub pitch_volts: f32,
    /// Filter cutoff control in `[0.0, 1.0]`
    pub vcf: f32,
    /// Filter resonance control in `[0.0, 1.0]`
    pub resonance: f32,
    /// VCA level in `[0.0, 1.0]`
    pub vca: f32,
    /// Saw to square blend in `[0.0, 1.0]`
    pub waveform: f32,
}

impl VoiceOutput {
    /// Every control at rest with the VCA closed
    pub const SILENT: Self = Self {
        pitch_volts: 0.0,
        vcf: 0.0,
        resonance: 0.0,
        vca: 0.0,
        waveform: 0.0,
    };

    fn is_finite(&self) -> bool {
        self.pitch_volts.is_finite()
            && self.vcf.is_finite()
            && self.resonance.is_finite()
            && self.vca.is_finite()
            && self.waveform.is_finite()
    }
}

/// The analog voice is represented here
pub struct AnalogVoice {
    sample_rate_hz: f32,

    // held notes, oldest first
    notes: Vec<NoteNumber, NOTE_LIST_CAPACITY>,

    main_env: Adsr,
    amp_env: Adsr,

    glide: GlideProcessor,
    sliding: bool,
    target_pitch: f32,
    accented: bool,

    cutoff_hz: f32,
    resonance: f32,
    decay_ms: f32,
    accent_decay_ms: f32,
    accent: f32,
    env_mod: f32,
    waveform: f32,
}

impl AnalogVoice {
    /// `AnalogVoice::new(sr)` is a new silent voice ticked at sample rate `sr`
    pub fn new(sample_rate_hz: f32) -> Self {
        let mut glide = GlideProcessor::new(sample_rate_hz);
        glide.set_time(0.0_f32);

        let mut voice = Self {
            sample_rate_hz,
            notes: Vec::new(),
            main_env: Adsr::new(sample_rate_hz),
            amp_env: new_amp_env(sample_rate_hz),
            glide,
            sliding: false,
            target_pitch: 0.0_f32,
            accented: false,
            cutoff_hz: MAX_CUTOFF_HZ / 2.0_f32,
            resonance: 0.0_f32,
            decay_ms: 2_000.0_f32,
            accent_decay_ms: 200.0_f32,
            accent: 0.0_f32,
            env_mod: 50.0_f32,
            waveform: 0.0_f32,
        };

        // the main envelope is a pure attack-decay, it never sustains
        voice.main_env.set_input(Input::Attack(ENV_ATTACK_S.into()));
        voice.main_env.set_input(Input::Sustain(0.0_f32.into()));
        voice.main_env.set_input(Input::Release(ENV_RELEASE_S.into()));
        voice.apply_main_decay();

        voice
    }

    /// `v.tick()` advances the voice by one sample and is the resulting control voltages, call at the sample rate
    ///
    /// If any control works out to a non-finite value the whole frame is replaced with silence.
    pub fn tick(&mut self) -> VoiceOutput {
        self.main_env.tick();
        self.amp_env.tick();
        let pitch_volts = self.glide.process(self.target_pitch);

        let accent = if self.accented {
            self.accent / 100.0_f32
        } else {
            0.0_f32
        };
        let env = self.main_env.value() * (1.0_f32 + accent);
        let vcf = self.cutoff_hz / MAX_CUTOFF_HZ + self.env_mod / 100.0_f32 * env;

        let out = VoiceOutput {
            pitch_volts,
            vcf: vcf.clamp(0.0_f32, 1.0_f32),
            resonance: (self.resonance / 100.0_f32).clamp(0.0_f32, 1.0_f32),
            vca: self.amp_env.value().clamp(0.0_f32, 1.0_f32),
            waveform: self.waveform.clamp(0.0_f32, 1.0_f32),
        };

        if out.is_finite() {
            out
        } else {
            VoiceOutput::SILENT
        }
    }

    /// `v.held_notes()` is the list of held notes, oldest first
    #[cfg(test)]
    fn held_notes(&self) -> &[NoteNumber] {
        &self.notes
    }

    fn apply_main_decay(&mut self) {
        let decay_ms = if self.accented {
            self.accent_decay_ms
        } else {
            self.decay_ms
        };
        self.main_env
            .set_input(Input::Decay((decay_ms.max(1.0_f32) / 1_000.0_f32).into()));
    }

    // the glide time is only touched when switching between jumps and slides
    fn set_sliding(&mut self, sliding: bool) {
        if sliding != self.sliding {
            self.glide
                .set_time(if sliding { SLIDE_TIME_S } else { 0.0_f32 });
            self.sliding = sliding;
        }
    }

    fn keep_newest(&mut self, count: usize) {
        if count < self.notes.len() {
            let skip = self.notes.len() - count;
            self.notes = self.notes.iter().skip(skip).copied().collect();
        }
    }
}

impl Voice for AnalogVoice {
    fn note_on(&mut self, note: NoteNumber, velocity: u8) {
        let legato = !self.notes.is_empty();

        self.keep_newest(NOTE_LIST_CAPACITY - 1);
        // there is room for at least one more after trimming
        let pushed = self.notes.push(note);
        debug_assert!(pushed.is_ok());

        self.target_pitch = pitch_volts(note);
        self.accented = ACCENT_VELOCITY <= velocity;
        self.apply_main_decay();

        self.set_sliding(legato);
        if !legato {
            self.main_env.gate_on();
            self.amp_env.gate_on();
        }
    }

    fn all_notes_off(&mut self) {
        self.notes.clear();
        self.main_env.gate_off();
        self.amp_env.gate_off();
    }

    fn trim_note_list(&mut self) {
        self.keep_newest(TRIMMED_NOTE_DEPTH);
    }

    fn retrigger_main_env(&mut self) {
        self.main_env.gate_on();
    }

    fn reset_amp_env(&mut self) {
        self.amp_env = new_amp_env(self.sample_rate_hz);
        self.amp_env.gate_on();
    }

    fn set_parameter(&mut self, parameter: Parameter) {
        match parameter {
            Parameter::Cutoff(hz) => self.cutoff_hz = hz,
            Parameter::Resonance(pct) => self.resonance = pct,
            Parameter::Decay(ms) => self.decay_ms = ms,
            Parameter::AccentDecay(ms) => self.accent_decay_ms = ms,
            Parameter::Accent(pct) => self.accent = pct,
            Parameter::EnvMod(pct) => self.env_mod = pct,
            Parameter::Waveform(w) => self.waveform = w,
        }
    }
}

/// `new_amp_env(sr)` is a new amplitude envelope at rest
///
/// Like the main envelope the amplitude envelope never sustains, every note dies away on its own over
/// `AMP_DECAY_S` whether or not anything releases it.
fn new_amp_env(sample_rate_hz: f32) -> Adsr {
    let mut env = Adsr::new(sample_rate_hz);
    env.set_input(Input::Attack(ENV_ATTACK_S.into()));
    env.set_input(Input::Decay(AMP_DECAY_S.into()));
    env.set_input(Input::Sustain(0.0_f32.into()));
    env.set_input(Input::Release(ENV_RELEASE_S.into()));
    env
}

/// `pitch_volts(n)` is note `n` as a 1volt/octave pitch voltage
fn pitch_volts(note: NoteNumber) -> f32 {
    (note.value() as f32 - PITCH_ZERO_NOTE as f32) / 12.0_f32
}

/// The note which the pitch output plays at 0 volts
pub const PITCH_ZERO_NOTE: u8 = 24;

/// Velocities at or above this are accented
pub const ACCENT_VELOCITY: u8 = 100;

/// The highest cutoff the filter control reaches, in Hz
pub const MAX_CUTOFF_HZ: f32 = 10_000.0_f32;

const NOTE_LIST_CAPACITY: usize = 8;

// a slide keeps only the note it slides from
const TRIMMED_NOTE_DEPTH: usize = 1;

const SLIDE_TIME_S: f32 = 0.06_f32;

const ENV_ATTACK_S: f32 = 0.003_f32;
const AMP_DECAY_S: f32 = 1.2_f32;
const ENV_RELEASE_S: f32 = 0.01_f32;
