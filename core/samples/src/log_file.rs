//! Sample log file
//!
//! One sample per line, four space-separated decimal fields
//! (`left right instrs cycles`), newline-terminated, no header.

use crate::{Sample, SampleError};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .delimiter(b' ')
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All);
    builder
}

fn writer_builder() -> csv::WriterBuilder {
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(b' ')
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'));
    builder
}

/// Parse samples from any reader. Blank lines are skipped.
pub fn parse_sample_log<R: Read>(reader: R) -> Result<Vec<Sample>, SampleError> {
    let mut samples = Vec::new();

    for record in reader_builder().from_reader(reader).records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        if record.len() != Sample::FIELD_COUNT {
            return Err(SampleError::Malformed {
                line,
                reason: format!(
                    "expected {} fields, found {}",
                    Sample::FIELD_COUNT,
                    record.len()
                ),
            });
        }

        let mut fields = [0u64; Sample::FIELD_COUNT];
        for (i, (raw, name)) in record.iter().zip(Sample::field_names()).enumerate() {
            fields[i] = raw.parse().map_err(|e| SampleError::Malformed {
                line,
                reason: format!("{} {:?}: {}", name, raw, e),
            })?;
        }

        samples.push(Sample::new(fields[0], fields[1], fields[2], fields[3]));
    }

    Ok(samples)
}

/// Read a sample log from disk. An empty file is an error.
pub fn read_sample_log(path: impl AsRef<Path>) -> Result<Vec<Sample>, SampleError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| SampleError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let samples = parse_sample_log(file)?;
    if samples.is_empty() {
        return Err(SampleError::Empty {
            path: path.display().to_string(),
        });
    }

    Ok(samples)
}

/// Write all samples to `path`, replacing any previous contents
pub fn write_sample_log(path: impl AsRef<Path>, samples: &[Sample]) -> Result<(), SampleError> {
    let mut writer = SampleLogWriter::create(path)?;
    for sample in samples {
        writer.append(sample)?;
    }
    writer.flush()
}

/// Incremental sample log writer
pub struct SampleLogWriter<W: Write> {
    inner: csv::Writer<W>,
}

impl SampleLogWriter<File> {
    /// Truncate (or create) the log at `path`
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SampleError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|source| SampleError::Io {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self::from_writer(file))
    }
}

impl<W: Write> SampleLogWriter<W> {
    pub fn from_writer(writer: W) -> Self {
        Self {
            inner: writer_builder().from_writer(writer),
        }
    }

    pub fn append(&mut self, sample: &Sample) -> Result<(), SampleError> {
        self.inner.serialize(sample)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), SampleError> {
        self.inner.flush().map_err(|source| SampleError::Io {
            path: "<sample log>".to_string(),
            source,
        })
    }

    /// Flush and hand back the underlying writer
    pub fn into_inner(self) -> Result<W, SampleError> {
        self.inner.into_inner().map_err(|e| SampleError::Io {
            path: "<sample log>".to_string(),
            source: std::io::Error::new(e.error().kind(), e.error().to_string()),
        })
    }
}
