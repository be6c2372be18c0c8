//! Job Record Format
//!
//! Framed, checksummed container for completed benchmark jobs.
//! Layout per record: [Header][Payload][Checksum]
//!
//! A journal is a plain concatenation of records.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Magic bytes: "LAT1"
pub const MAGIC: [u8; 4] = *b"LAT1";

/// Current format version
pub const VERSION: u16 = 1;

const CHECKSUM_SIZE: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("record truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("invalid magic: {0:?}")]
    BadMagic([u8; 4]),

    #[error("unsupported version: {0}")]
    UnsupportedVersion(u16),

    #[error("unknown payload encoding: {0}")]
    UnknownEncoding(u8),

    #[error("CRC mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("payload of {0} bytes does not fit in a record")]
    PayloadTooLarge(usize),

    #[error("payload serialization failed")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Payload encoding discriminant
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Json = 0,
}

impl TryFrom<u8> for Encoding {
    type Error = FormatError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Encoding::Json),
            other => Err(FormatError::UnknownEncoding(other)),
        }
    }
}

/// Record header (fixed size)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub magic: [u8; 4],
    pub version: u16,
    pub encoding: u8,
    pub created_at_unix: u64,
    pub payload_size_bytes: u32,
}

impl RecordHeader {
    pub const SIZE: usize = 19; // 4 + 2 + 1 + 8 + 4

    pub fn new(encoding: Encoding, created_at_unix: u64, payload_size_bytes: u32) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            encoding: encoding as u8,
            created_at_unix,
            payload_size_bytes,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.magic);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6] = self.encoding;
        buf[7..15].copy_from_slice(&self.created_at_unix.to_le_bytes());
        buf[15..19].copy_from_slice(&self.payload_size_bytes.to_le_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < Self::SIZE {
            return Err(FormatError::Truncated {
                needed: Self::SIZE,
                available: bytes.len(),
            });
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);

        let mut version = [0u8; 2];
        version.copy_from_slice(&bytes[4..6]);

        let mut created_at_unix = [0u8; 8];
        created_at_unix.copy_from_slice(&bytes[7..15]);

        let mut payload_size_bytes = [0u8; 4];
        payload_size_bytes.copy_from_slice(&bytes[15..19]);

        Ok(Self {
            magic,
            version: u16::from_le_bytes(version),
            encoding: bytes[6],
            created_at_unix: u64::from_le_bytes(created_at_unix),
            payload_size_bytes: u32::from_le_bytes(payload_size_bytes),
        })
    }

    pub fn validate(&self) -> Result<Encoding, FormatError> {
        if self.magic != MAGIC {
            return Err(FormatError::BadMagic(self.magic));
        }
        if self.version != VERSION {
            return Err(FormatError::UnsupportedVersion(self.version));
        }
        Encoding::try_from(self.encoding)
    }

    /// Header + payload + checksum
    pub fn record_size(&self) -> usize {
        Self::SIZE + self.payload_size_bytes as usize + CHECKSUM_SIZE
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Serialize one value into a framed record
pub fn encode_record<T: Serialize>(value: &T) -> Result<Vec<u8>, FormatError> {
    let payload = serde_json::to_vec(value)?;
    let payload_size =
        u32::try_from(payload.len()).map_err(|_| FormatError::PayloadTooLarge(payload.len()))?;

    let header = RecordHeader::new(Encoding::Json, unix_now(), payload_size);

    let mut buf = Vec::with_capacity(header.record_size());
    buf.extend_from_slice(&header.to_bytes());
    buf.extend_from_slice(&payload);

    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());

    Ok(buf)
}

/// A validated record: header plus borrowed payload
#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    pub header: RecordHeader,
    pub payload: &'a [u8],
}

impl RawRecord<'_> {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, FormatError> {
        Ok(serde_json::from_slice(self.payload)?)
    }
}

/// Validate the record at the start of `data`; returns it with its total size
pub fn split_record(data: &[u8]) -> Result<(RawRecord<'_>, usize), FormatError> {
    let header = RecordHeader::from_bytes(data)?;
    header.validate()?;

    let size = header.record_size();
    if data.len() < size {
        return Err(FormatError::Truncated {
            needed: size,
            available: data.len(),
        });
    }

    let checksum_at = size - CHECKSUM_SIZE;
    let mut expected = [0u8; CHECKSUM_SIZE];
    expected.copy_from_slice(&data[checksum_at..size]);
    let expected = u32::from_le_bytes(expected);

    let actual = crc32fast::hash(&data[..checksum_at]);
    if actual != expected {
        return Err(FormatError::ChecksumMismatch { expected, actual });
    }

    Ok((
        RawRecord {
            header,
            payload: &data[RecordHeader::SIZE..checksum_at],
        },
        size,
    ))
}

/// Deserialize a single record that occupies all of `data`
pub fn decode_record<T: DeserializeOwned>(data: &[u8]) -> Result<T, FormatError> {
    let (record, _) = split_record(data)?;
    record.decode()
}

/// Every record of a journal, in file order
pub fn split_journal(mut data: &[u8]) -> Result<Vec<RawRecord<'_>>, FormatError> {
    let mut records = Vec::new();
    while !data.is_empty() {
        let (record, size) = split_record(data)?;
        records.push(record);
        data = &data[size..];
    }
    Ok(records)
}

/// Decode every record of a journal as `T`
pub fn read_journal<T: DeserializeOwned>(data: &[u8]) -> Result<Vec<T>, FormatError> {
    split_journal(data)?.iter().map(RawRecord::decode).collect()
}

/// Appends records to a journal
pub struct JournalWriter<W: Write> {
    inner: W,
    records: usize,
}

impl JournalWriter<File> {
    /// Truncate (or create) the journal at `path`
    pub fn create(path: impl AsRef<Path>) -> Result<Self, FormatError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write> JournalWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, records: 0 }
    }

    pub fn append<T: Serialize>(&mut self, value: &T) -> Result<(), FormatError> {
        let record = encode_record(value)?;
        self.inner.write_all(&record)?;
        self.records += 1;
        Ok(())
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn finish(mut self) -> Result<W, FormatError> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Entry {
        instr: String,
        left: String,
        cycles: String,
    }

    fn entry(left: &str) -> Entry {
        Entry {
            instr: "divu".to_string(),
            left: left.to_string(),
            cycles: "ffffffffffffffff".to_string(),
        }
    }

    #[test]
    fn test_header_roundtrip() {
        let h = RecordHeader::new(Encoding::Json, 1728000000, 321);
        let h2 = RecordHeader::from_bytes(&h.to_bytes()).unwrap();
        assert_eq!(h, h2);
        assert_eq!(h2.validate().unwrap(), Encoding::Json);
    }

    #[test]
    fn test_record_roundtrip() {
        let bytes = encode_record(&entry("00000000000000ff")).unwrap();
        let back: Entry = decode_record(&bytes).unwrap();
        assert_eq!(back, entry("00000000000000ff"));
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let mut bytes = encode_record(&entry("1")).unwrap();
        bytes[RecordHeader::SIZE + 2] ^= 0x20;

        assert!(matches!(
            decode_record::<Entry>(&bytes),
            Err(FormatError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = encode_record(&entry("1")).unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            decode_record::<Entry>(&bytes),
            Err(FormatError::BadMagic(_))
        ));
    }

    #[test]
    fn test_truncated_record() {
        let bytes = encode_record(&entry("1")).unwrap();
        assert!(matches!(
            decode_record::<Entry>(&bytes[..bytes.len() - 1]),
            Err(FormatError::Truncated { .. })
        ));
        assert!(matches!(
            decode_record::<Entry>(&bytes[..5]),
            Err(FormatError::Truncated { needed, .. }) if needed == RecordHeader::SIZE
        ));
    }

    #[test]
    fn test_journal() {
        let mut writer = JournalWriter::new(Vec::new());
        writer.append(&entry("1")).unwrap();
        writer.append(&entry("2")).unwrap();
        assert_eq!(writer.records(), 2);
        let bytes = writer.finish().unwrap();

        let entries: Vec<Entry> = read_journal(&bytes).unwrap();
        assert_eq!(entries, vec![entry("1"), entry("2")]);
        assert!(read_journal::<Entry>(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_journal_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.jobs");

        let mut writer = JournalWriter::create(&path).unwrap();
        writer.append(&entry("3")).unwrap();
        writer.finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let records = split_journal(&bytes).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].decode::<Entry>().unwrap(), entry("3"));
    }
}
