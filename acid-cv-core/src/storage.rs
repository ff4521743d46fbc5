//! # Calibration storage
//!
//! The calibration curve survives power cycles through a [`CalibrationStorage`] adapter. Stores which hold raw words
//! (on-chip flash) can use [`CalibrationRecord`] as their layout: two `u64` double words, a tagged checksum followed
//! by the curve.

use crate::curve::CalibrationCurve;
use crate::error::StorageError;

/// A persistence adapter for the calibration curve
pub trait CalibrationStorage {
    /// `s.load()` is the stored curve, it is not checked against the sane band
    fn load(&mut self) -> Result<CalibrationCurve, StorageError>;

    /// `s.save(c)` replaces the stored curve with `c`, completing before it returns
    fn save(&mut self, curve: &CalibrationCurve) -> Result<(), StorageError>;
}

/// `load_or_default(s)` is the stored curve if there is a valid one, otherwise the compiled-in default
///
/// When the stored curve is absent, corrupt, or outside the sane band, the default curve is written back so the next
/// power-up finds a valid record. A failure to write it back is not fatal.
pub fn load_or_default<S: CalibrationStorage>(storage: &mut S) -> CalibrationCurve {
    match storage.load() {
        Ok(curve) if curve.is_valid() => {
            #[cfg(feature = "defmt")]
            defmt::info!(
                "loaded calibration: offset {} upv {}",
                curve.offset,
                curve.units_per_volt
            );
            return curve;
        }
        Ok(_curve) => {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "stored calibration out of band (upv {}), restoring defaults",
                _curve.units_per_volt
            );
        }
        Err(_e) => {
            #[cfg(feature = "defmt")]
            defmt::warn!("no usable stored calibration ({}), restoring defaults", _e);
        }
    }

    let curve = CalibrationCurve::DEFAULT;
    if let Err(_e) = storage.save(&curve) {
        #[cfg(feature = "defmt")]
        defmt::error!("failed to restore default calibration: {}", _e);
    }
    curve
}

/// A calibration store which lives in RAM, for hosts without non-volatile memory and for tests
#[derive(Debug, Clone, Copy, Default)]
pub struct RamStorage {
    words: Option<[u64; CalibrationRecord::WORDS]>,
    fail_writes: bool,
    saves: u32,
}

impl RamStorage {
    /// `RamStorage::new()` is a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// `RamStorage::with_words(w)` is a new store holding raw record words `w`
    pub fn with_words(words: [u64; CalibrationRecord::WORDS]) -> Self {
        Self {
            words: Some(words),
            ..Self::default()
        }
    }

    /// `RamStorage::with_curve(c)` is a new store holding curve `c`
    pub fn with_curve(curve: &CalibrationCurve) -> Self {
        Self::with_words(CalibrationRecord::from_curve(curve).to_words())
    }

    /// `s.fail_writes(f)` makes every following save fail iff `f` is true
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// `s.saves()` is the number of successful saves
    pub fn saves(&self) -> u32 {
        self.saves
    }
}

impl CalibrationStorage for RamStorage {
    fn load(&mut self) -> Result<CalibrationCurve, StorageError> {
        let words = self.words.ok_or(StorageError::Absent)?;
        CalibrationRecord::from_words(words).map(|r| r.curve())
    }

    fn save(&mut self, curve: &CalibrationCurve) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Write);
        }
        self.words = Some(CalibrationRecord::from_curve(curve).to_words());
        self.saves += 1;
        Ok(())
    }
}

/// The stored layout of a calibration curve
///
/// Word 0 holds a magic tag in the upper half and a checksum of word 1 in the lower half. Word 1 holds the offset in
/// the upper half and the scale in the lower half, both as two's complement `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationRecord {
    curve: CalibrationCurve,
}

impl CalibrationRecord {
    /// The number of `u64` words in a record
    pub const WORDS: usize = 2;

    /// `CalibrationRecord::from_curve(c)` is the record holding curve `c`
    pub fn from_curve(curve: &CalibrationCurve) -> Self {
        Self { curve: *curve }
    }

    /// `r.curve()` is the curve held by record `r`
    pub fn curve(&self) -> CalibrationCurve {
        self.curve
    }

    /// `r.to_words()` is record `r` in its stored layout
    pub fn to_words(&self) -> [u64; Self::WORDS] {
        let offset = self.curve.offset as u32 as u64;
        let units_per_volt = self.curve.units_per_volt as u32 as u64;
        let payload = (offset << 32) | units_per_volt;
        let header = ((RECORD_MAGIC as u64) << 32) | checksum(payload) as u64;
        [header, payload]
    }

    /// `CalibrationRecord::from_words(w)` is the record stored as words `w`
    ///
    /// # Errors
    ///
    /// * `Absent` if the magic tag is missing, which includes erased flash
    ///
    /// * `Corrupt` if the tag is present but the checksum does not match
    pub fn from_words(words: [u64; Self::WORDS]) -> Result<Self, StorageError> {
        let [header, payload] = words;
        if (header >> 32) as u32 != RECORD_MAGIC {
            return Err(StorageError::Absent);
        }
        if header as u32 != checksum(payload) {
            return Err(StorageError::Corrupt);
        }
        Ok(Self {
            curve: CalibrationCurve {
                offset: (payload >> 32) as u32 as i32,
                units_per_volt: payload as u32 as i32,
            },
        })
    }
}

/// "ACV1"
const RECORD_MAGIC: u32 = 0x4143_5631;

/// `checksum(p)` is a 32 bit FNV-1a hash of the bytes of payload `p`
fn checksum(payload: u64) -> u32 {
    payload
        .to_le_bytes()
        .iter()
        .fold(0x811c_9dc5_u32, |hash, b| {
            (hash ^ *b as u32).wrapping_mul(0x0100_0193)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_words_round_trip() {
        let curve = CalibrationCurve::new(64_262, 12_826);
        let words = CalibrationRecord::from_curve(&curve).to_words();
        assert_eq!(CalibrationRecord::from_words(words).map(|r| r.curve()), Ok(curve));

        let negative = CalibrationCurve::new(-17, -12_826);
        let words = CalibrationRecord::from_curve(&negative).to_words();
        assert_eq!(CalibrationRecord::from_words(words).map(|r| r.curve()), Ok(negative));
    }

    #[test]
    fn erased_flash_is_absent() {
        assert_eq!(
            CalibrationRecord::from_words([u64::MAX; 2]),
            Err(StorageError::Absent)
        );
        assert_eq!(CalibrationRecord::from_words([0; 2]), Err(StorageError::Absent));
    }

    #[test]
    fn flipped_payload_bit_is_corrupt() {
        let mut words = CalibrationRecord::from_curve(&CalibrationCurve::DEFAULT).to_words();
        words[1] ^= 1 << 40;
        assert_eq!(CalibrationRecord::from_words(words), Err(StorageError::Corrupt));
    }

    #[test]
    fn empty_storage_loads_defaults_and_writes_them_back() {
        let mut s = RamStorage::new();
        assert_eq!(s.load(), Err(StorageError::Absent));
        assert_eq!(load_or_default(&mut s), CalibrationCurve::DEFAULT);
        assert_eq!(s.saves(), 1);
        assert_eq!(s.load(), Ok(CalibrationCurve::DEFAULT));
    }

    #[test]
    fn valid_stored_curve_is_used_as_is() {
        let stored = CalibrationCurve::new(63_000, 13_000);
        let mut s = RamStorage::with_curve(&stored);
        assert_eq!(load_or_default(&mut s), stored);
        assert_eq!(s.saves(), 0);
    }

    #[test]
    fn out_of_band_stored_curve_is_replaced() {
        for upv in [0, 399, 20_001, -12_826].iter() {
            let mut s = RamStorage::with_curve(&CalibrationCurve::new(64_262, *upv));
            assert_eq!(load_or_default(&mut s), CalibrationCurve::DEFAULT);
            assert_eq!(s.load(), Ok(CalibrationCurve::DEFAULT));
        }
    }

    #[test]
    fn corrupt_storage_loads_defaults() {
        let stored = CalibrationCurve::new(63_000, 13_000);
        let mut words = CalibrationRecord::from_curve(&stored).to_words();
        words[0] ^= 1;
        let mut s = RamStorage::with_words(words);
        assert_eq!(load_or_default(&mut s), CalibrationCurve::DEFAULT);
    }

    #[test]
    fn failed_write_back_still_gives_defaults() {
        let mut s = RamStorage::new();
        s.fail_writes(true);
        assert_eq!(load_or_default(&mut s), CalibrationCurve::DEFAULT);
        assert_eq!(s.saves(), 0);
        assert_eq!(s.save(&CalibrationCurve::DEFAULT), Err(StorageError::Write));
    }
}
