//! Sequential reader for LIBSVM sparse text files
//!
//! Each non-blank line holds one labeled record:
//!
//! ```text
//! <label> <index>:<value> <index>:<value> ...
//! ```
//!
//! Labels are integers, indices are 1-based and strictly increasing, and
//! features that are not listed are zero. Records are returned as dense rows
//! whose length is the largest index found anywhere in the file.

use crate::core::{Result, SVMError};
use ndarray::Array2;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// One record: integer label and dense feature row
pub type LabeledRow = (i64, Vec<f64>);

/// Reader over a LIBSVM formatted source
///
/// Opening scans the whole input once to count records and find the
/// dimensionality, then rewinds. Reads advance a cursor; [`reset`] rewinds it
/// and clears a failed state.
///
/// [`reset`]: LibsvmFile::reset
pub struct LibsvmFile<R = BufReader<File>> {
    reader: R,
    filename: Option<PathBuf>,
    start: u64,
    shape: usize,
    samples: usize,
    /// Records handed out since the last rewind
    position: usize,
    /// Lines consumed since the last rewind, for error reporting
    line: usize,
    failed: bool,
}

impl LibsvmFile<BufReader<File>> {
    /// Open and scan a file on disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut reader = Self::from_reader(BufReader::new(file))?;
        reader.filename = Some(path.to_path_buf());
        Ok(reader)
    }
}

impl<R: BufRead + Seek> LibsvmFile<R> {
    /// Scan `reader` from its current position
    pub fn from_reader(mut reader: R) -> Result<Self> {
        let start = reader.stream_position()?;
        let (samples, shape) = scan(&mut reader)?;
        reader.seek(SeekFrom::Start(start))?;

        Ok(Self {
            reader,
            filename: None,
            start,
            shape,
            samples,
            position: 0,
            line: 0,
            failed: false,
        })
    }

    /// Number of features per record, the largest index in the input
    pub fn shape(&self) -> usize {
        self.shape
    }

    /// Number of records in the input
    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    /// No error so far and records remain
    pub fn good(&self) -> bool {
        !self.fail() && !self.eof()
    }

    /// A malformed record or an I/O error was hit
    pub fn fail(&self) -> bool {
        self.failed
    }

    /// Every record was read without error
    pub fn eof(&self) -> bool {
        !self.failed && self.position >= self.samples
    }

    /// Rewind to the first record and clear the failed state
    pub fn reset(&mut self) -> Result<()> {
        self.reader.seek(SeekFrom::Start(self.start))?;
        self.position = 0;
        self.line = 0;
        self.failed = false;
        Ok(())
    }

    /// Next record, or `None` at the end of the input
    pub fn read_one(&mut self) -> Result<Option<LabeledRow>> {
        let mut row = vec![0.0; self.shape];
        Ok(self.read_into(&mut row)?.map(|label| (label, row)))
    }

    /// Up to `count` records, fewer when the input runs out
    pub fn read(&mut self, count: usize) -> Result<Vec<LabeledRow>> {
        let mut records = Vec::with_capacity(count.min(self.samples));
        while records.len() < count {
            match self.read_one()? {
                Some(record) => records.push(record),
                None => break,
            }
        }
        Ok(records)
    }

    /// Every remaining record as labels and a `records x shape` matrix
    pub fn read_all(&mut self) -> Result<(Vec<i64>, Array2<f64>)> {
        let remaining = self.samples.saturating_sub(self.position);
        let mut labels = Vec::with_capacity(remaining);
        let mut data = Vec::with_capacity(remaining * self.shape);

        let mut row = vec![0.0; self.shape];
        while let Some(label) = self.read_into(&mut row)? {
            labels.push(label);
            data.extend_from_slice(&row);
        }

        let rows = Array2::from_shape_vec((labels.len(), self.shape), data)
            .map_err(|e| SVMError::InvalidDataset(e.to_string()))?;
        Ok((labels, rows))
    }

    /// Parse the next record into `row`, which must hold exactly `shape()`
    /// values; returns its label, or `None` at the end of the input
    pub fn read_into(&mut self, row: &mut [f64]) -> Result<Option<i64>> {
        if self.failed {
            return Err(SVMError::ReaderFailed);
        }
        if row.len() != self.shape {
            return Err(SVMError::ShapeMismatch {
                what: "row",
                expected: self.shape,
                actual: row.len(),
            });
        }

        let line = match self.next_line() {
            Ok(Some(line)) => line,
            Ok(None) => return Ok(None),
            Err(e) => {
                self.failed = true;
                return Err(e);
            }
        };

        match parse_record(&line, self.line, row) {
            Ok(label) => {
                self.position += 1;
                Ok(Some(label))
            }
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }

    /// Next non-blank line
    fn next_line(&mut self) -> Result<Option<String>> {
        let mut buf = String::new();
        loop {
            buf.clear();
            if self.reader.read_line(&mut buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;
            if !buf.trim().is_empty() {
                return Ok(Some(buf));
            }
        }
    }
}

impl<R> fmt::Display for LibsvmFile<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.filename {
            Some(path) => write!(f, "LibsvmFile('{}')", path.display())?,
            None => write!(f, "LibsvmFile(<stream>)")?,
        }
        write!(f, " <float64@({}, {})>", self.samples, self.shape)
    }
}

/// Count records and find the largest feature index
///
/// Tokens that do not look like `index:value` are ignored here; they are
/// reported when the record is actually read.
fn scan<R: BufRead>(reader: &mut R) -> Result<(usize, usize)> {
    let mut samples = 0;
    let mut shape = 0;
    let mut buf = String::new();

    loop {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            break;
        }
        let mut tokens = buf.split_whitespace();
        if tokens.next().is_none() {
            continue;
        }
        samples += 1;

        for token in tokens {
            if let Some(index) = token
                .split_once(':')
                .and_then(|(index, _)| index.parse::<usize>().ok())
            {
                shape = shape.max(index);
            }
        }
    }

    Ok((samples, shape))
}

/// Parse one line into `row`, which is zeroed first
fn parse_record(line: &str, line_no: usize, row: &mut [f64]) -> Result<i64> {
    let error = |message: String| SVMError::ParseError {
        line: line_no,
        message,
    };

    let mut tokens = line.split_whitespace();
    let label_str = tokens
        .next()
        .ok_or_else(|| error("Missing label".to_string()))?;
    let label = parse_label(label_str).ok_or_else(|| error(format!("Invalid label: {label_str}")))?;

    row.iter_mut().for_each(|v| *v = 0.0);
    let mut last_index = 0;
    for token in tokens {
        let (index_str, value_str) = token
            .split_once(':')
            .ok_or_else(|| error(format!("Invalid feature format: {token}")))?;

        let index = index_str
            .parse::<usize>()
            .map_err(|_| error(format!("Invalid feature index: {index_str}")))?;
        if index == 0 {
            return Err(error("Feature indices start at 1".to_string()));
        }
        if index <= last_index {
            return Err(error(format!(
                "Feature index {index} does not follow {last_index}"
            )));
        }
        if index > row.len() {
            return Err(error(format!(
                "Feature index {index} exceeds dimensionality {}",
                row.len()
            )));
        }

        let value = value_str
            .parse::<f64>()
            .map_err(|_| error(format!("Invalid feature value: {value_str}")))?;

        // 1-based in the file, 0-based in the row
        row[index - 1] = value;
        last_index = index;
    }

    Ok(label)
}

/// Integer label; `+1` and integral floats such as `2.0` are accepted
fn parse_label(s: &str) -> Option<i64> {
    if let Ok(label) = s.parse::<i64>() {
        return Some(label);
    }
    let value = s.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 {
        Some(value as i64)
    } else {
        None
    }
}
