//! Batch conversion of data files to delimited text.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::file::ApxdfReader;
use crate::hit::Hit;
use crate::Result;

/// Convert the data file at `input` to a CSV file, one row per hit, preceded
/// by a `#`-marked header row naming every field.
///
/// If `output` is `None` the output path is `input` with its extension
/// replaced by `csv`. Returns the output path.
///
/// Any I/O or decode error aborts the whole conversion; there is no
/// partial-failure recovery.
///
/// # Errors
/// Any error opening or reading the input file, decoding a hit, or writing
/// the output file.
pub fn apxdf_to_csv<H: Hit>(input: &Path, output: Option<PathBuf>) -> Result<PathBuf> {
    let output = output.unwrap_or_else(|| input.with_extension("csv"));
    debug!("converting {input:?} to {output:?}");

    let reader = ApxdfReader::<H, _>::open(input)?;
    let mut writer = BufWriter::new(File::create(&output)?);
    writeln!(writer, "{}", H::csv_header())?;
    let mut num_hits = 0usize;
    for hit in reader {
        writeln!(writer, "{}", hit?.to_csv())?;
        num_hits += 1;
    }
    writer.flush()?;
    info!(num_hits, "wrote {}", output.display());

    Ok(output)
}
