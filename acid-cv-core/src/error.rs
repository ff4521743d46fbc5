/// Errors from the persistence adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// Nothing has been stored yet (erased memory or unknown layout).
    Absent,
    /// A record was found but its checksum does not match.
    Corrupt,
    /// The backing store refused the write or erase.
    Write,
}

/// Errors from computing a calibration curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationError {
    /// The measured scale in raw units per volt is outside the sane band.
    OutOfBand(i32),
    /// Two reference points share the same voltage, so no slope can be taken.
    DegenerateReferences,
}
