//! # Calibration curve
//!
//! The pitch CV input stage is inverting: the raw ADC reading falls as the input voltage rises. A calibration curve
//! holds the raw reading at 0 volts (`offset`) and the number of raw units per volt, so that
//!
//! `volts = (offset - raw) / units_per_volt`

use crate::error::CalibrationError;

/// A measured reference point, the raw reading taken while a known voltage was patched into the CV input.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationPoint {
    pub reference_volts: f32,
    pub raw_sample: u16,
}

/// The linear mapping from raw CV samples to volts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationCurve {
    /// The raw reading which corresponds to 0 volts
    pub offset: i32,
    /// How far the raw reading moves for a 1 volt change at the input
    pub units_per_volt: i32,
}

impl CalibrationCurve {
    /// The compiled-in curve, measured on a typical unit.
    pub const DEFAULT: Self = Self {
        offset: 64_262,
        units_per_volt: 12_826,
    };

    /// `CalibrationCurve::new(o, u)` is a new curve with offset `o` and scale `u`, no validation is applied.
    pub const fn new(offset: i32, units_per_volt: i32) -> Self {
        Self {
            offset,
            units_per_volt,
        }
    }

    /// `c.is_valid()` is true iff the scale of `c` is inside the sane band for the sensor
    pub fn is_valid(&self) -> bool {
        (MIN_UNITS_PER_VOLT..=MAX_UNITS_PER_VOLT).contains(&self.units_per_volt)
    }

    /// `c.volts(r)` is raw sample `r` converted to volts with curve `c`, unclamped
    ///
    /// An invalid curve yields 0 volts rather than dividing by a nonsense scale.
    pub fn volts(&self, raw_sample: u16) -> f32 {
        if !self.is_valid() {
            return 0.0_f32;
        }
        (self.offset - raw_sample as i32) as f32 / self.units_per_volt as f32
    }

    /// `CalibrationCurve::from_points(ps)` is the curve that passes through reference points `ps`.
    ///
    /// The slope of each interval between consecutive points is measured and the slopes are averaged to get the
    /// scale. The offset is extrapolated from the first point down to 0 volts using the averaged scale.
    ///
    /// # Errors
    ///
    /// * `DegenerateReferences` if fewer than two points are given or two consecutive points share a voltage
    ///
    /// * `OutOfBand` if the resulting scale is outside the sane band
    pub fn from_points(points: &[CalibrationPoint]) -> Result<Self, CalibrationError> {
        if points.len() < 2 {
            return Err(CalibrationError::DegenerateReferences);
        }

        let mut slope_total = 0.0_f32;
        for pair in points.windows(2) {
            let delta_volts = pair[1].reference_volts - pair[0].reference_volts;
            if delta_volts == 0.0_f32 {
                return Err(CalibrationError::DegenerateReferences);
            }
            // inverting input, the raw reading drops as the volts go up
            let delta_raw = pair[0].raw_sample as f32 - pair[1].raw_sample as f32;
            slope_total += delta_raw / delta_volts;
        }
        let units_per_volt = slope_total / (points.len() - 1) as f32;

        let first = points[0];
        let offset = first.raw_sample as f32 + units_per_volt * first.reference_volts;

        let curve = Self {
            offset: libm::roundf(offset) as i32,
            units_per_volt: libm::roundf(units_per_volt) as i32,
        };

        if curve.is_valid() {
            Ok(curve)
        } else {
            Err(CalibrationError::OutOfBand(curve.units_per_volt))
        }
    }
}

impl Default for CalibrationCurve {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Scales below this many raw units per volt can't come from a working input stage.
pub const MIN_UNITS_PER_VOLT: i32 = 400;

/// Scales above this many raw units per volt can't come from a working input stage.
pub const MAX_UNITS_PER_VOLT: i32 = 20_000;
