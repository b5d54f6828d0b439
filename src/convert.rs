//! Scalar unit conversions
//!
//! Pure per-sample mappings selected by a small integer code on the wire.
//! The code is promoted to [`UnitConversion`] before any row is decoded, so
//! an out-of-range selector fails the sub-query up front with
//! [`ArchiveError::UnknownConversion`] instead of falling through silently.
//! Conversions apply only to scalar keywords; string-valued series never
//! reach this module.

use std::f64::consts::PI;

use crate::error::{ArchiveError, Result};

/// Closed set of supported scalar unit conversions
///
/// Discriminants match the selector codes the host sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitConversion {
    /// Pass the value through unchanged
    #[default]
    None = 0,
    /// Degrees to radians: x * π/180 (1° = 0.01745 rad)
    DegToRad = 1,
    /// Radians to degrees: x * 180/π (1 rad = 57.296°)
    RadToDeg = 2,
    /// Radians to arcseconds: x * 3600*180/π (1 rad = 206264.806")
    RadToArcsec = 3,
    /// Labelled Kelvin-to-Celsius in the archiver's conversion table
    KToC = 4,
    /// Labelled Celsius-to-Kelvin in the archiver's conversion table
    CToK = 5,
}

impl TryFrom<i32> for UnitConversion {
    type Error = ArchiveError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Self::None),
            1 => Ok(Self::DegToRad),
            2 => Ok(Self::RadToDeg),
            3 => Ok(Self::RadToArcsec),
            4 => Ok(Self::KToC),
            5 => Ok(Self::CToK),
            other => Err(ArchiveError::UnknownConversion(other)),
        }
    }
}

impl UnitConversion {
    /// Convert a single sample
    ///
    /// The two temperature entries keep the arithmetic the archiver has
    /// always shipped: KToC adds 273.15 and CToK subtracts it, which is the
    /// opposite of what the labels suggest. Kept as-is for compatibility
    /// until the conversion table owner rules on the naming.
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Self::None => x,
            Self::DegToRad => x * (PI / 180.0),
            Self::RadToDeg => x * (180.0 / PI),
            Self::RadToArcsec => x * (3600.0 * 180.0 / PI),
            Self::KToC => x + 273.15,
            Self::CToK => x - 273.15,
        }
    }
}
