//! Authoring of bootable PlayStation CD-ROM images.
//!
//! Given a [`DirTree`] describing an ISO9660 file system (plus optional
//! CD-DA audio tracks) this crate computes the complete on-disc layout and
//! emits a raw image of 2352-byte CD-ROM XA sectors, with correct EDC/ECC
//! and subheaders, alongside a CUE sheet indexing the tracks.
//!
//! The writing side of the CD formats mirrors what a PlayStation expects
//! to find on a pressed disc: a Mode 2 data track holding the file system
//! and file payloads, followed by red book audio tracks with the mandatory
//! two second pregap before the first one.

#![warn(missing_docs)]

#[macro_use]
extern crate arrayref;

pub mod builder;
pub mod cuesheet;
mod ecc;
mod edc;
mod layout;
pub mod listing;
pub mod msf;
mod record;
pub mod sector;
pub mod tree;
mod volume;
mod wave;
pub mod writer;

pub use builder::{build_image, BuildConfig, BuildSummary};
pub use layout::Layout;
pub use msf::Msf;
pub use sector::{SubHeader, XaForm};
pub use tree::{DirId, DirTree, EntryKind, FileKind};
pub use writer::ImageWriter;

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for image authoring operations.
#[derive(Error, Debug)]
pub enum Error {
    /// An entry with the same identifier already exists in the directory
    /// (identifiers are compared case-insensitively)
    #[error("duplicate entry `{0}`")]
    DuplicateEntry(String),
    /// Entry names are limited to 12 characters (not counting the `;1`
    /// version suffix of files)
    #[error("entry name `{0}` is longer than 12 characters")]
    NameTooLong(String),
    /// Stream payloads must be a whole number of sectors
    #[error("`{path}`: payload length {len} is not a multiple of {align} bytes")]
    MisalignedPayload {
        /// Source file with the bad length
        path: PathBuf,
        /// Observed length in bytes
        len: u64,
        /// Required alignment (2336 for XA/STR, 2048 for data-only STR)
        align: u32,
    },
    /// Raw XA or STR sector data was expected but the source starts with
    /// a RIFF header, so it's probably an unripped WAV container
    #[error("`{path}` is a RIFF container, not raw sector data")]
    UnexpectedRiff {
        /// Offending source file
        path: PathBuf,
    },
    /// Nothing may follow a CD-DA track within a directory: the audio
    /// payload lives outside the data track
    #[error("cannot place `{0}` past a CD-DA track")]
    EntryAfterAudio(String),
    /// CD-DA tracks can only be addressed through a CUE sheet
    #[error("CD-DA audio present but no cue sheet path configured")]
    AudioWithoutCue,
    /// The WAV source exists but can't be used as CD audio
    #[error("`{path}`: {desc}")]
    WavFormat {
        /// Offending source file
        path: PathBuf,
        /// What was wrong with it
        desc: String,
    },
    /// An input file couldn't be read
    #[error("could not read `{path}`: {source}")]
    Source {
        /// The file that failed
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },
    /// The output image or cue sheet couldn't be written
    #[error("image write failed: {0}")]
    Sink(#[from] io::Error),
    /// The image outgrew the 99:59:74 MSF address space
    #[error("sector {0} is outside the addressable MSF range")]
    LbaOutOfRange(u32),
}

/// Convenience type alias for a `Result<T, Error>`
pub type CdResult<T> = std::result::Result<T, Error>;

/// Volume-level identifier strings stored in the primary volume
/// descriptor. All of them are optional; unset fields fall back to the
/// conventional PlayStation defaults (or to spaces) when the descriptor
/// is encoded.
#[derive(Clone, Debug, Default)]
pub struct Identifiers {
    /// System identifier (defaults to `PLAYSTATION`)
    pub system: Option<String>,
    /// Volume identifier
    pub volume: Option<String>,
    /// Volume set identifier
    pub volume_set: Option<String>,
    /// Publisher identifier
    pub publisher: Option<String>,
    /// Data preparer identifier
    pub data_preparer: Option<String>,
    /// Application identifier (defaults to `PLAYSTATION`)
    pub application: Option<String>,
    /// Copyright file identifier (defaults to `COPYLEFTED`)
    pub copyright: Option<String>,
}

/// A calendar timestamp, always UTC. Used for directory record date
/// fields and the volume descriptor dates.
///
/// The build snapshots a single `Timestamp` per invocation so that two
/// builds of the same project with the same injected time are
/// byte-identical.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Timestamp {
    /// Full year (e.g. 2018)
    pub year: u16,
    /// Month, 1-12
    pub month: u8,
    /// Day of month, 1-31
    pub day: u8,
    /// Hour, 0-23
    pub hour: u8,
    /// Minute, 0-59
    pub minute: u8,
    /// Second, 0-59
    pub second: u8,
    /// Offset from GMT in 15 minute units
    pub gmt_offset: i8,
}

impl Timestamp {
    /// Build a `Timestamp` from seconds since the Unix epoch.
    pub fn from_unix(secs: i64) -> Timestamp {
        let days = secs.div_euclid(86_400);
        let rem = secs.rem_euclid(86_400);

        let (year, month, day) = civil_from_days(days);

        Timestamp {
            year,
            month,
            day,
            hour: (rem / 3_600) as u8,
            minute: (rem / 60 % 60) as u8,
            second: (rem % 60) as u8,
            gmt_offset: 0,
        }
    }

    /// Timestamp of a file's last modification, or the epoch if the
    /// platform can't report one.
    pub(crate) fn from_system_time(t: std::time::SystemTime) -> Timestamp {
        let secs = match t.duration_since(std::time::UNIX_EPOCH) {
            Ok(d) => d.as_secs() as i64,
            // Pre-1970 mtimes collapse to the epoch
            Err(_) => 0,
        };

        Timestamp::from_unix(secs)
    }

    /// The 7-byte directory record date format: year since 1900, month,
    /// day, hour, minute, second, GMT offset.
    pub(crate) fn record_bytes(&self) -> [u8; 7] {
        [
            self.year.wrapping_sub(1900) as u8,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            self.gmt_offset as u8,
        ]
    }
}

/// Gregorian calendar date for a day count relative to 1970-01-01
/// (Howard Hinnant's days-to-civil algorithm).
fn civil_from_days(days: i64) -> (u16, u8, u8) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = yoe + era * 400 + if m <= 2 { 1 } else { 0 };

    (y as u16, m as u8, d as u8)
}
