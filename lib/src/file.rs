//! The AstroPix binary data file format.
//!
//! Layout:
//!
//! ```text
//! [6 byte magic word "%APXDF"]
//! [4 byte little-endian header payload length]
//! [UTF-8 JSON header payload]
//! [fixed-size raw hit records, back to back]
//! ```
//!
//! There is no index; hits are read strictly sequentially, one pass. A file
//! holds records for exactly one hit type, fixed when the file is opened.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::marker::PhantomData;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::hit::Hit;
use crate::{Error, Result};

/// Magic word marking the start of an AstroPix data file.
pub const MAGIC_WORD: [u8; 6] = *b"%APXDF";

/// Canonical file extension for AstroPix data files.
pub const EXTENSION: &str = "apx";

/// Free-form JSON file header, e.g. the chip configuration and run arguments.
///
/// Written once at the start of a file, never mutated. Equality is value
/// equality of the JSON content.
#[derive(Debug, Clone, PartialEq)]
pub struct FileHeader {
    info: Value,
}

impl FileHeader {
    #[must_use]
    pub fn new(info: Value) -> Self {
        FileHeader { info }
    }

    /// The header content.
    #[must_use]
    pub fn info(&self) -> &Value {
        &self.info
    }

    /// Serialize the header, including the magic word, to `writer`.
    ///
    /// # Errors
    /// Any `std::io::Error` writing, or a JSON encoding error.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&MAGIC_WORD)?;
        let data = serde_json::to_vec(&self.info)?;
        let num_bytes = u32::try_from(data.len()).expect("header payload fits in u32");
        writer.write_all(&num_bytes.to_le_bytes())?;
        writer.write_all(&data)?;
        Ok(())
    }

    /// Deserialize a header from `reader`, validating the magic word
    /// byte-for-byte before anything else.
    ///
    /// # Errors
    /// [`Error::MagicWord`] on a magic mismatch; any `std::io::Error`
    /// reading or JSON decoding error otherwise.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; MAGIC_WORD.len()];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC_WORD {
            return Err(Error::MagicWord {
                found: magic,
                expected: MAGIC_WORD,
            });
        }
        let mut len = [0u8; 4];
        reader.read_exact(&mut len)?;
        let mut data = vec![0u8; u32::from_le_bytes(len) as usize];
        reader.read_exact(&mut data)?;
        Ok(FileHeader {
            info: serde_json::from_slice(&data)?,
        })
    }
}

/// Streaming writer for AstroPix data files.
///
/// The magic word and header are written exactly once up front; hits are then
/// appended one at a time, as soon as they are decoded. The underlying file
/// is released when the writer is dropped, on every exit path.
pub struct ApxdfWriter<H, W>
where
    H: Hit,
    W: Write,
{
    writer: W,
    _hit: PhantomData<H>,
}

impl<H> ApxdfWriter<H, BufWriter<File>>
where
    H: Hit,
{
    /// Create (truncating) the file at `path` and write the header.
    ///
    /// # Errors
    /// Any error creating the file or writing the header.
    pub fn create<P: AsRef<Path>>(path: P, header: &FileHeader) -> Result<Self> {
        debug!("creating data file {:?}", path.as_ref());
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), header)
    }
}

impl<H, W> ApxdfWriter<H, W>
where
    H: Hit,
    W: Write,
{
    /// Wrap `writer`, writing the header immediately.
    ///
    /// # Errors
    /// Any error writing the header.
    pub fn new(mut writer: W, header: &FileHeader) -> Result<Self> {
        header.write(&mut writer)?;
        Ok(ApxdfWriter {
            writer,
            _hit: PhantomData,
        })
    }

    /// Append one hit's raw bytes.
    ///
    /// # Errors
    /// Any `std::io::Error` writing.
    pub fn write_hit(&mut self, hit: &H) -> Result<()> {
        hit.write(&mut self.writer)?;
        Ok(())
    }

    /// Flush the underlying writer.
    ///
    /// # Errors
    /// Any `std::io::Error` flushing.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Streaming reader for AstroPix data files.
///
/// The header is read and validated on open, before any hit. Hits are then
/// pulled sequentially via the [`Iterator`] implementation; the iteration is
/// one-pass and ends cleanly at end of data, while a partial trailing record
/// is reported as [`Error::Truncated`].
pub struct ApxdfReader<H, R>
where
    H: Hit,
    R: Read,
{
    header: FileHeader,
    reader: R,
    _hit: PhantomData<H>,
}

impl<H> ApxdfReader<H, BufReader<File>>
where
    H: Hit,
{
    /// Open the file at `path` and read its header.
    ///
    /// # Errors
    /// Any error opening the file or reading the header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        debug!("opening data file {:?}", path.as_ref());
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<H, R> ApxdfReader<H, R>
where
    H: Hit,
    R: Read,
{
    /// Wrap `reader`, reading the header immediately.
    ///
    /// # Errors
    /// Any error reading the header.
    pub fn new(mut reader: R) -> Result<Self> {
        let header = FileHeader::read(&mut reader)?;
        Ok(ApxdfReader {
            header,
            reader,
            _hit: PhantomData,
        })
    }

    #[must_use]
    pub fn header(&self) -> &FileHeader {
        &self.header
    }
}

impl<H, R> Iterator for ApxdfReader<H, R>
where
    H: Hit,
    R: Read,
{
    type Item = Result<H>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = vec![0u8; H::SIZE];
        let mut num_read = 0;
        while num_read < buf.len() {
            match self.reader.read(&mut buf[num_read..]) {
                Ok(0) => break,
                Ok(n) => num_read += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Some(Err(err.into())),
            }
        }
        match num_read {
            0 => None,
            n if n < H::SIZE => Some(Err(Error::Truncated {
                expected: H::SIZE,
                actual: n,
            })),
            _ => Some(H::decode(&buf, None)),
        }
    }
}
