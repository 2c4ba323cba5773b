//! AstroPix detector readout decoding and binary data file format.
//!
//! This crate decodes the raw binary readout streams produced by the
//! AstroPix 3/4 pixel-detector chips into structured hit records and persists
//! them in the self-describing APXDF binary file format (magic word, JSON
//! header, flat fixed-size hit records).
//!
//! The data flow is: raw readout bytes from the board -> [`Readout`] framing
//! -> per-chip-version hit codec ([`Apx4Hit`], [`Apx3Hit`]) -> [`ApxdfWriter`]
//! persistence -> [`ApxdfReader`] playback -> optional [`apxdf_to_csv`]
//! export.
//!
//! Acquisition control (SPI commands, chip configuration, threshold scans) is
//! outside the scope of this crate; it produces the byte buffers consumed
//! here and consumes the hit records produced here.

pub mod bits;
mod convert;
mod error;
pub mod file;
pub mod hit;
pub mod readout;

pub use convert::apxdf_to_csv;
pub use error::{Error, Result};
pub use file::{ApxdfReader, ApxdfWriter, FileHeader, EXTENSION, MAGIC_WORD};
pub use hit::{gray_to_decimal, Apx3Hit, Apx4Hit, ChipVersion, Hit};
pub use readout::Readout;
