//! Error taxonomy for the wear-leveling core.

use core::fmt;

use crate::config::ConfigError;

/// Errors returned by the logical device API.
///
/// `E` is the underlying flash driver's error type; it is propagated
/// verbatim; retry policy belongs to the driver, not this layer.
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error<E> {
    /// Caller-supplied index, offset or length is outside the device
    /// bounds. Detected before any hardware access.
    OutOfRange {
        /// The logical sector index of the request.
        sector: u32,
        /// The byte offset within the sector.
        offset: u32,
        /// The requested length in bytes (or sector count for erases).
        len: usize,
    },

    /// An underlying flash operation failed.
    ///
    /// When this surfaces from a write that triggered a rotation, the
    /// rotation was aborted before its commit point: the previous mapping
    /// generation stays authoritative and no committed data is lost.
    Io(E),

    /// No trustworthy mapping state could be established.
    Corrupted(CorruptionError),

    /// Invalid construction-time configuration for this flash.
    Config(ConfigError),
}

impl<E: fmt::Display> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange {
                sector,
                offset,
                len,
            } => write!(
                f,
                "out of range: logical sector {}, offset {}, length {}",
                sector, offset, len
            ),
            Self::Io(e) => write!(f, "flash error: {}", e),
            Self::Corrupted(e) => write!(f, "corruption: {}", e),
            Self::Config(e) => write!(f, "invalid configuration: {}", e),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> core::error::Error for Error<E> {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Corrupted(e) => Some(e),
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

/// Fatal mapping-state conditions requiring external intervention
/// (a reformat). Never repaired silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CorruptionError {
    /// No state-record slot held a record with a valid checksum.
    NoValidState,
    /// An interrupted rotation could not be replayed: the relocated
    /// sector's content no longer matches the recorded checksum.
    ReplayVerification,
}

impl fmt::Display for CorruptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoValidState => write!(f, "no valid mapping state record found"),
            Self::ReplayVerification => {
                write!(f, "interrupted rotation failed checksum verification")
            }
        }
    }
}

impl core::error::Error for CorruptionError {}
