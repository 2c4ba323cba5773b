//! Hit codecs for the AstroPix chips.
//!
//! A hit is a fixed-size binary record whose fields are arbitrary-width
//! integers packed back to back. Each chip version has its own ordered
//! name -> bit-width layout; decoding walks that layout with [`crate::bits`]
//! and derives the physical quantities (timestamps in clock cycles, TOT in
//! microseconds) from the raw counters.

use std::fmt::Display;
use std::io::{self, Write};
use std::str::FromStr;

use serde::Serialize;

use crate::bits;
use crate::{Error, Result};

/// Convert a Gray code (reflected binary code) to its decimal value.
///
/// A Gray code is a binary numeral system where two consecutive values differ
/// by only one bit; the on-chip timestamp counters use it to avoid multi-bit
/// transition races. The decode is the canonical one, independent of the bit
/// width of the input.
#[must_use]
pub fn gray_to_decimal(gray: u64) -> u64 {
    let mut decimal = gray;
    let mut mask = gray;
    while mask != 0 {
        mask >>= 1;
        decimal ^= mask;
    }
    decimal
}

/// AstroPix chip version, selecting the hit layout, size, and derived-field
/// computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipVersion {
    V3,
    V4,
}

impl ChipVersion {
    /// Fixed binary hit record size in bytes for this chip version.
    #[must_use]
    pub fn hit_size(self) -> usize {
        match self {
            ChipVersion::V3 => Apx3Hit::SIZE,
            ChipVersion::V4 => Apx4Hit::SIZE,
        }
    }
}

impl Display for ChipVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChipVersion::V3 => write!(f, "v3"),
            ChipVersion::V4 => write!(f, "v4"),
        }
    }
}

impl FromStr for ChipVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "3" | "v3" => Ok(ChipVersion::V3),
            "4" | "v4" => Ok(ChipVersion::V4),
            other => Err(format!("unknown chip version '{other}', expected 3 or 4")),
        }
    }
}

/// One decoded detector event.
///
/// A hit's raw byte payload is immutable once constructed and all derived
/// fields are pure functions of the raw bytes; equality is raw-byte equality.
/// The raw bytes are what gets persisted, so nothing is discarded on a
/// write/read round trip.
pub trait Hit: Sized {
    /// Fixed size of the binary hit record in bytes.
    const SIZE: usize;

    /// Every raw and derived field name, in the stable output order used by
    /// [`to_csv`](Hit::to_csv).
    const CSV_FIELDS: &'static [&'static str];

    /// Decode a hit from exactly [`SIZE`](Self::SIZE) bytes, attaching an
    /// optional host-assigned wall-clock timestamp (seconds since the epoch).
    ///
    /// # Errors
    /// [`Error::HitSize`] if `data` is not exactly `SIZE` bytes long.
    fn decode(data: &[u8], timestamp: Option<f64>) -> Result<Self>;

    /// The original raw bytes of the hit record.
    fn data(&self) -> &[u8];

    /// Render the hit as one comma-separated text row, listing every raw and
    /// derived field in [`CSV_FIELDS`](Self::CSV_FIELDS) order.
    fn to_csv(&self) -> String;

    /// Write the original raw bytes verbatim to `writer`.
    ///
    /// # Errors
    /// Any `std::io::Error` writing.
    fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(self.data())
    }

    /// Comment-marked header row matching [`to_csv`](Hit::to_csv).
    #[must_use]
    fn csv_header() -> String {
        format!("#{}", Self::CSV_FIELDS.join(","))
    }
}

fn fmt_timestamp(timestamp: Option<f64>) -> String {
    timestamp.map(|t| t.to_string()).unwrap_or_default()
}

/// An AstroPix 4 hit.
///
/// The two on-chip timestamps each come as a Gray-coded 14-bit coarse counter
/// plus a Gray-coded 3-bit fine counter, composed and decoded into
/// `ts_dec1`/`ts_dec2` clock-cycle counts, from which the time over threshold
/// is derived.
#[derive(Serialize, Debug, Clone)]
pub struct Apx4Hit {
    data: [u8; Self::SIZE],
    pub chip_id: u8,
    pub payload: u8,
    pub row: u8,
    pub column: u8,
    pub ts_neg1: u8,
    pub ts_coarse1: u16,
    pub ts_fine1: u8,
    pub ts_tdc1: u8,
    pub ts_neg2: u8,
    pub ts_coarse2: u16,
    pub ts_fine2: u8,
    pub ts_tdc2: u8,
    /// First timestamp in clock cycles.
    pub ts_dec1: u32,
    /// Second timestamp in clock cycles, corrected for rollover.
    pub ts_dec2: u32,
    /// Time over threshold in microseconds.
    pub tot_us: f64,
    /// Host-assigned wall-clock timestamp, seconds since the epoch.
    pub timestamp: Option<f64>,
}

impl Apx4Hit {
    pub const SIZE: usize = 8;

    /// Ordered field layout; widths sum to `SIZE * 8` bits.
    pub const FIELDS: [(&'static str, usize); 12] = [
        ("chip_id", 5),
        ("payload", 3),
        ("row", 5),
        ("column", 5),
        ("ts_neg1", 1),
        ("ts_coarse1", 14),
        ("ts_fine1", 3),
        ("ts_tdc1", 5),
        ("ts_neg2", 1),
        ("ts_coarse2", 14),
        ("ts_fine2", 3),
        ("ts_tdc2", 5),
    ];

    /// Clock cycles per microsecond of the timestamp counters.
    pub const CLOCK_CYCLES_PER_US: u32 = 20;
    /// Rollover period of the composed 17-bit timestamp counter.
    pub const CLOCK_ROLLOVER: u32 = 1 << 17;

    /// Compose the coarse (MSBs) and fine (3 LSBs) Gray-coded counters into
    /// the timestamp value in clock cycles.
    #[must_use]
    pub fn compose_timestamp(ts_coarse: u16, ts_fine: u8) -> u32 {
        let gray = (u64::from(ts_coarse) << 3) + u64::from(ts_fine);
        gray_to_decimal(gray) as u32
    }
}

impl Hit for Apx4Hit {
    const SIZE: usize = Apx4Hit::SIZE;

    const CSV_FIELDS: &'static [&'static str] = &[
        "chip_id",
        "payload",
        "row",
        "column",
        "ts_neg1",
        "ts_coarse1",
        "ts_fine1",
        "ts_tdc1",
        "ts_neg2",
        "ts_coarse2",
        "ts_fine2",
        "ts_tdc2",
        "ts_dec1",
        "ts_dec2",
        "tot_us",
        "timestamp",
    ];

    fn decode(data: &[u8], timestamp: Option<f64>) -> Result<Self> {
        if data.len() != Self::SIZE {
            return Err(Error::HitSize {
                expected: Self::SIZE,
                actual: data.len(),
            });
        }
        let mut raw = [0u8; Self::SIZE];
        raw.copy_from_slice(data);

        let [chip_id, payload, row, column, ts_neg1, ts_coarse1, ts_fine1, ts_tdc1, ts_neg2, ts_coarse2, ts_fine2, ts_tdc2] =
            bits::unpack_fields(&raw, &Self::FIELDS)?;

        let ts_dec1 = Self::compose_timestamp(ts_coarse1 as u16, ts_fine1 as u8);
        let mut ts_dec2 = Self::compose_timestamp(ts_coarse2 as u16, ts_fine2 as u8);
        // The counter is monotonic but wraps; if the second timestamp comes
        // out lower it wrapped exactly once past the 17-bit rollover.
        if ts_dec2 < ts_dec1 {
            ts_dec2 += Self::CLOCK_ROLLOVER;
        }
        let tot_us = f64::from(ts_dec2 - ts_dec1) / f64::from(Self::CLOCK_CYCLES_PER_US);

        Ok(Apx4Hit {
            data: raw,
            chip_id: chip_id as u8,
            payload: payload as u8,
            row: row as u8,
            column: column as u8,
            ts_neg1: ts_neg1 as u8,
            ts_coarse1: ts_coarse1 as u16,
            ts_fine1: ts_fine1 as u8,
            ts_tdc1: ts_tdc1 as u8,
            ts_neg2: ts_neg2 as u8,
            ts_coarse2: ts_coarse2 as u16,
            ts_fine2: ts_fine2 as u8,
            ts_tdc2: ts_tdc2 as u8,
            ts_dec1,
            ts_dec2,
            tot_us,
            timestamp,
        })
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn to_csv(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            self.chip_id,
            self.payload,
            self.row,
            self.column,
            self.ts_neg1,
            self.ts_coarse1,
            self.ts_fine1,
            self.ts_tdc1,
            self.ts_neg2,
            self.ts_coarse2,
            self.ts_fine2,
            self.ts_tdc2,
            self.ts_dec1,
            self.ts_dec2,
            self.tot_us,
            fmt_timestamp(self.timestamp),
        )
    }
}

impl PartialEq for Apx4Hit {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for Apx4Hit {}

impl Display for Apx4Hit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Apx4Hit(chip_id={}, payload={}, row={}, column={}, ts_dec1={}, ts_dec2={}, tot_us={})",
            self.chip_id, self.payload, self.row, self.column, self.ts_dec1, self.ts_dec2, self.tot_us
        )
    }
}

/// An AstroPix 3 hit.
///
/// AstroPix 3 reports a single 8-bit timestamp and a 12-bit TOT counter split
/// into MSB and LSB fields; the pixel address is a packed location plus a
/// row/column flag.
#[derive(Serialize, Debug, Clone)]
pub struct Apx3Hit {
    data: [u8; Self::SIZE],
    pub chip_id: u8,
    pub payload: u8,
    /// 1 if `location` addresses a column, 0 for a row.
    pub col_flag: u8,
    pub location: u8,
    /// Raw 8-bit on-chip timestamp counter.
    pub ts: u8,
    pub tot_msb: u8,
    pub tot_lsb: u8,
    /// Full TOT counter, in clock cycles.
    pub tot_total: u16,
    /// Time over threshold in microseconds.
    pub tot_us: f64,
    /// Host-assigned wall-clock timestamp, seconds since the epoch.
    pub timestamp: Option<f64>,
}

impl Apx3Hit {
    pub const SIZE: usize = 5;

    /// Ordered field layout; widths sum to `SIZE * 8` bits.
    pub const FIELDS: [(&'static str, usize); 9] = [
        ("chip_id", 5),
        ("payload", 3),
        ("col_flag", 1),
        ("rsvd1", 1),
        ("location", 6),
        ("ts", 8),
        ("rsvd2", 4),
        ("tot_msb", 4),
        ("tot_lsb", 8),
    ];

    /// Clock cycles per microsecond of the TOT counter.
    pub const CLOCK_CYCLES_PER_US: u32 = 200;
}

impl Hit for Apx3Hit {
    const SIZE: usize = Apx3Hit::SIZE;

    const CSV_FIELDS: &'static [&'static str] = &[
        "chip_id",
        "payload",
        "col_flag",
        "location",
        "ts",
        "tot_msb",
        "tot_lsb",
        "tot_total",
        "tot_us",
        "timestamp",
    ];

    fn decode(data: &[u8], timestamp: Option<f64>) -> Result<Self> {
        if data.len() != Self::SIZE {
            return Err(Error::HitSize {
                expected: Self::SIZE,
                actual: data.len(),
            });
        }
        let mut raw = [0u8; Self::SIZE];
        raw.copy_from_slice(data);

        let [chip_id, payload, col_flag, _rsvd1, location, ts, _rsvd2, tot_msb, tot_lsb] =
            bits::unpack_fields(&raw, &Self::FIELDS)?;

        let tot_total = ((tot_msb << 8) + tot_lsb) as u16;
        let tot_us = f64::from(tot_total) / f64::from(Self::CLOCK_CYCLES_PER_US);

        Ok(Apx3Hit {
            data: raw,
            chip_id: chip_id as u8,
            payload: payload as u8,
            col_flag: col_flag as u8,
            location: location as u8,
            ts: ts as u8,
            tot_msb: tot_msb as u8,
            tot_lsb: tot_lsb as u8,
            tot_total,
            tot_us,
            timestamp,
        })
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn to_csv(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{}",
            self.chip_id,
            self.payload,
            self.col_flag,
            self.location,
            self.ts,
            self.tot_msb,
            self.tot_lsb,
            self.tot_total,
            self.tot_us,
            fmt_timestamp(self.timestamp),
        )
    }
}

impl PartialEq for Apx3Hit {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for Apx3Hit {}

impl Display for Apx3Hit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Apx3Hit(chip_id={}, payload={}, {}={}, ts={}, tot_us={})",
            self.chip_id,
            self.payload,
            if self.col_flag == 1 { "col" } else { "row" },
            self.location,
            self.ts,
            self.tot_us
        )
    }
}
