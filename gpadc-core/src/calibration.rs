//! Factory calibration retrieval.
//!
//! The thermal sensor stores two 32-bit words in a non-volatile cell named
//! `calibration`. Anything other than exactly eight bytes is reported and the
//! zero defaults are kept; only a deferred provider aborts attach.

use core::fmt;

use crate::error::GpadcError;
use crate::variant::VariantDescriptor;

/// Name of the non-volatile cell holding the calibration words.
pub const CALIBRATION_CELL: &str = "calibration";

/// Expected payload size: two little-endian 32-bit words.
pub const CALIBRATION_LEN: usize = 8;

/// Largest payload accepted from the store; longer cells are truncated and rejected.
pub const CALIBRATION_BUFFER_LEN: usize = 16;

/// Why a cell lookup did not produce data.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CellError {
    NotFound,
    /// The storage provider has not probed yet.
    Deferred,
}

/// Non-volatile storage lookup.
pub trait CalibrationStore {
    /// Copies the cell named `name` into `buf` and returns its full length.
    ///
    /// The returned length may exceed `buf.len()`; only the prefix is copied.
    ///
    /// # Errors
    ///
    /// Returns [`CellError`] when the cell is missing or the provider is not ready.
    fn read_cell(&mut self, name: &str, buf: &mut [u8]) -> Result<usize, CellError>;
}

/// Store with no cells, for boards without calibration fuses.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoCalibrationStore;

impl CalibrationStore for NoCalibrationStore {
    fn read_cell(&mut self, _name: &str, _buf: &mut [u8]) -> Result<usize, CellError> {
        Err(CellError::NotFound)
    }
}

/// Non-fatal calibration failure.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationError {
    /// The cell exists but does not hold exactly two words.
    WrongSize(usize),
    /// No calibration cell is provisioned for this device.
    NotProvisioned,
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationError::WrongSize(len) => {
                write!(f, "calibration data has wrong size ({len} bytes)")
            }
            CalibrationError::NotProvisioned => f.write_str("calibration not provisioned"),
        }
    }
}

/// Two factory calibration words; zero when absent.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    words: [u32; 2],
}

impl Calibration {
    pub const ZERO: Self = Self { words: [0; 2] };

    #[must_use]
    pub const fn new(words: [u32; 2]) -> Self {
        Self { words }
    }

    #[must_use]
    pub const fn words(&self) -> [u32; 2] {
        self.words
    }

    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.words[0] == 0 && self.words[1] == 0
    }

    /// Decodes a raw cell payload.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::WrongSize`] unless `bytes` is exactly eight bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CalibrationError> {
        if bytes.len() != CALIBRATION_LEN {
            return Err(CalibrationError::WrongSize(bytes.len()));
        }
        let (low, high) = bytes.split_at(4);
        let word = |chunk: &[u8]| {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(chunk);
            u32::from_le_bytes(raw)
        };
        Ok(Self::new([word(low), word(high)]))
    }
}

/// Outcome of the attach-time calibration load.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CalibrationLoad {
    pub calibration: Calibration,
    /// Set when defaults were kept because of a non-fatal problem.
    pub warning: Option<CalibrationError>,
}

/// Loads calibration for variants that support it.
///
/// Variants without calibration support skip the lookup entirely.
///
/// # Errors
///
/// Returns [`GpadcError::Deferred`] when the store is not ready; every other
/// problem yields zero defaults plus a [`CalibrationError`] in the result.
pub fn load<S>(variant: &VariantDescriptor, store: &mut S) -> Result<CalibrationLoad, GpadcError>
where
    S: CalibrationStore + ?Sized,
{
    let defaults = |warning| CalibrationLoad {
        calibration: Calibration::ZERO,
        warning,
    };

    if !variant.supports_calibration {
        return Ok(defaults(None));
    }

    let mut buf = [0u8; CALIBRATION_BUFFER_LEN];
    let len = match store.read_cell(CALIBRATION_CELL, &mut buf) {
        Ok(len) => len,
        Err(CellError::Deferred) => return Err(GpadcError::Deferred),
        Err(CellError::NotFound) => {
            debug!("calibration cell absent, using defaults");
            return Ok(defaults(Some(CalibrationError::NotProvisioned)));
        }
    };

    let payload = buf.get(..len).unwrap_or(&buf[..]);
    match Calibration::from_bytes(payload) {
        Ok(calibration) if len == CALIBRATION_LEN => Ok(CalibrationLoad {
            calibration,
            warning: None,
        }),
        _ => {
            error!("calibration data has wrong size: {}", len);
            Ok(defaults(Some(CalibrationError::WrongSize(len))))
        }
    }
}
