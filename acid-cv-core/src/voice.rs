use crate::pitch::NoteNumber;

/// Enumerated synthesis engine inputs are represented here, each carries its new value
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parameter {
    /// Filter cutoff in Hz
    Cutoff(f32),
    /// Filter resonance in percent
    Resonance(f32),
    /// Main envelope decay in milliseconds
    Decay(f32),
    /// Main envelope decay for accented notes in milliseconds
    AccentDecay(f32),
    /// Accent amount in percent
    Accent(f32),
    /// Main envelope to filter cutoff amount in percent
    EnvMod(f32),
    /// Blend from saw at `0.0` to square at `1.0`
    Waveform(f32),
}

/// A monophonic synthesis engine which keeps its own list of held notes
///
/// The note handling only issues commands through this trait and never looks at the engine's state.
pub trait Voice {
    /// Start note `note` at `velocity`, sliding from the current note if one is still held
    fn note_on(&mut self, note: NoteNumber, velocity: u8);

    /// Release every held note
    fn all_notes_off(&mut self);

    /// Drop the oldest held notes beyond a small fixed depth
    fn trim_note_list(&mut self);

    /// Restart the attack of the main (filter) envelope
    fn retrigger_main_env(&mut self);

    /// Restart the amplitude envelope from silence
    fn reset_amp_env(&mut self);

    fn set_parameter(&mut self, parameter: Parameter);
}
