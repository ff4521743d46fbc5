//! # Pitch conversion
//!
//! Converts raw pitch CV readings to quantized note numbers using 1volt/octave scaling. The input is designed for
//! `[0, 5]` volts, 0 volts plays the C one octave above the base octave.

use crate::config::Config;
use crate::curve::CalibrationCurve;

/// A quantized semitone pitch, in MIDI note numbering
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NoteNumber(u8);

impl NoteNumber {
    /// `NoteNumber::new(n)` is note number `n`, no range is applied
    pub const fn new(n: u8) -> Self {
        Self(n)
    }

    /// `n.value()` is the MIDI note number of `n`
    pub fn value(self) -> u8 {
        self.0
    }
}

impl From<NoteNumber> for u8 {
    fn from(n: NoteNumber) -> Self {
        n.0
    }
}

/// A converter from raw CV readings to note numbers is represented here
///
/// The converter holds no state between conversions, the same reading and curve always give the same note.
#[derive(Debug, Clone, Copy)]
pub struct PitchConverter {
    base_octave: u8,
    rail_threshold: u16,
}

impl PitchConverter {
    /// `PitchConverter::new(b, r)` is a new converter with base octave `b` and near-rail threshold `r`
    ///
    /// The base octave is clamped so that the highest note still fits in a MIDI note number.
    pub fn new(base_octave: u8, rail_threshold: u16) -> Self {
        if MAX_BASE_OCTAVE < base_octave {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "base octave {} is out of range, using {}",
                base_octave,
                MAX_BASE_OCTAVE
            );
        }
        Self {
            base_octave: base_octave.min(MAX_BASE_OCTAVE),
            rail_threshold,
        }
    }

    /// `PitchConverter::from_config(c)` is a new converter using the pitch settings of config `c`
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.base_octave, config.rail_threshold)
    }

    /// `pc.min_note()` is the lowest note this converter produces
    pub fn min_note(&self) -> NoteNumber {
        NoteNumber(12 * self.base_octave)
    }

    /// `pc.max_note()` is the highest note this converter produces
    pub fn max_note(&self) -> NoteNumber {
        NoteNumber(12 * (self.base_octave + 6))
    }

    /// `pc.convert(r, c)` is raw CV reading `r` converted to a note number with calibration curve `c`
    ///
    /// Readings at or beyond the near-rail threshold mean nothing is patched in and play the 0 volt note instead of
    /// whatever the floating input happens to read. Voltages are clamped to `[0, 5]` and rounded half away from
    /// zero to the nearest semitone.
    ///
    /// # Examples
    ///
    /// ```
    /// # use acid_cv_core::{curve::CalibrationCurve, pitch::PitchConverter};
    /// let pc = PitchConverter::new(2, 63_200);
    /// let curve = CalibrationCurve::new(64_262, 12_826);
    /// // 1 volt is one octave above the 0 volt note
    /// assert_eq!(pc.convert(51_436, &curve).value(), 48);
    /// // nothing patched in reads near the rail, which plays the 0 volt note
    /// assert_eq!(pc.convert(65_000, &curve).value(), 36);
    /// ```
    pub fn convert(&self, raw_sample: u16, curve: &CalibrationCurve) -> NoteNumber {
        let volts = if self.rail_threshold <= raw_sample {
            0.0_f32
        } else {
            curve.volts(raw_sample).clamp(0.0_f32, MAX_VOLTS)
        };

        let zero_volt_note = 12.0_f32 * (self.base_octave as f32 + 1.0_f32);
        let note = libm::roundf(volts * 12.0_f32 + zero_volt_note);

        let lowest = self.min_note().0 as f32;
        let highest = self.max_note().0 as f32;
        NoteNumber(note.clamp(lowest, highest) as u8)
    }
}

impl Default for PitchConverter {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// The highest voltage the CV input is designed for, 5 octaves
pub const MAX_VOLTS: f32 = 5.0_f32;

// 12 * (MAX_BASE_OCTAVE + 6) must stay within a MIDI note number
const MAX_BASE_OCTAVE: u8 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    fn default_curve() -> CalibrationCurve {
        CalibrationCurve::new(64_262, 12_826)
    }

    #[test]
    fn note_range_follows_base_octave() {
        let pc = PitchConverter::new(2, 63_200);
        assert_eq!(pc.min_note(), NoteNumber::new(24));
        assert_eq!(pc.max_note(), NoteNumber::new(96));

        let pc = PitchConverter::new(0, 63_200);
        assert_eq!(pc.min_note(), NoteNumber::new(0));
        assert_eq!(pc.max_note(), NoteNumber::new(72));
    }

    #[test]
    fn whole_volts_are_octaves() {
        let pc = PitchConverter::default();
        let c = default_curve();
        assert_eq!(pc.convert(51_436, &c).value(), 48);
        assert_eq!(pc.convert(38_610, &c).value(), 60);
        assert_eq!(pc.convert(25_784, &c).value(), 72);
        assert_eq!(pc.convert(12_958, &c).value(), 84);
    }

    #[test]
    fn semitones_round_to_nearest() {
        let pc = PitchConverter::default();
        let c = default_curve();
        let semitone = 12_826.0 / 12.0;
        // 1V + 0.4 semitone stays on 48, 1V + 0.6 semitone goes to 49
        let raw = (51_436.0 - 0.4 * semitone) as u16;
        assert_eq!(pc.convert(raw, &c).value(), 48);
        let raw = (51_436.0 - 0.6 * semitone) as u16;
        assert_eq!(pc.convert(raw, &c).value(), 49);
    }

    #[test]
    fn readings_near_the_rail_play_zero_volts() {
        let pc = PitchConverter::default();
        let c = default_curve();
        for raw in [63_200, 63_201, 64_262, 65_000, u16::MAX] {
            assert_eq!(pc.convert(raw, &c).value(), 36);
        }
        // the rail guard wins even with a curve which would read these as higher voltages
        let offset_high = CalibrationCurve::new(200_000, 12_826);
        assert_eq!(pc.convert(63_300, &offset_high).value(), 36);
    }

    #[test]
    fn voltages_are_clamped_to_five_volts() {
        let pc = PitchConverter::default();
        let c = default_curve();
        // 0 raw is just over 5 volts
        assert_eq!(pc.convert(0, &c).value(), 96);
        // a steep curve makes small readings read far above the range
        let steep = CalibrationCurve::new(64_262, 400);
        assert_eq!(pc.convert(20_000, &steep).value(), 96);
    }

    #[test]
    fn readings_above_offset_clamp_to_zero_volts() {
        let pc = PitchConverter::new(2, u16::MAX);
        let c = default_curve();
        assert_eq!(pc.convert(65_000, &c).value(), 36);
    }

    #[test]
    fn every_reading_stays_in_range() {
        let curves = [
            default_curve(),
            CalibrationCurve::new(60_000, 400),
            CalibrationCurve::new(70_000, 20_000),
            CalibrationCurve::new(-5_000, 1_000),
            CalibrationCurve::new(64_262, 0),
        ];
        for base_octave in 0..=4 {
            let pc = PitchConverter::new(base_octave, 63_200);
            for c in curves.iter() {
                for raw in (0..=u16::MAX).step_by(97) {
                    let n = pc.convert(raw, c);
                    assert!(pc.min_note() <= n && n <= pc.max_note());
                }
            }
        }
    }

    #[test]
    fn conversion_is_deterministic() {
        let pc = PitchConverter::default();
        let c = default_curve();
        for raw in (0..=u16::MAX).step_by(13) {
            let first = pc.convert(raw, &c);
            for _ in 0..3 {
                assert_eq!(pc.convert(raw, &c), first);
            }
        }
    }

    #[test]
    fn oversized_base_octave_is_clamped() {
        let pc = PitchConverter::new(200, 63_200);
        assert_eq!(pc.max_note(), NoteNumber::new(120));
    }

    #[test]
    fn oversized_base_octave_from_config_still_converts_in_range() {
        let config = Config {
            base_octave: 9,
            ..Config::default()
        };
        let pc = PitchConverter::from_config(&config);
        assert_eq!(pc.min_note(), NoteNumber::new(48));
        assert_eq!(pc.convert(51_436, &default_curve()).value(), 72);
        assert_eq!(pc.convert(0, &default_curve()).value(), 120);
    }
}
