//! Record providers feeding the source stage.
//!
//! The source treats a provider as opaque: it asks how many records exist and
//! pulls the next one. Which record comes next is the provider's business.

use crate::error::{Result, SentiflowError};
use crate::types::RawRecord;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Read};
use std::path::Path;

/// Header names that mark a CSV record dataset
const CSV_TEXT_COLUMNS: &[&str] = &["text", "Comment"];

/// Supplies raw records to the source.
#[cfg_attr(test, mockall::automock)]
pub trait RecordProvider {
    /// Number of records available. Zero makes the source close immediately.
    fn size(&self) -> usize;

    /// Next record, or `None` when the provider is exhausted.
    fn next_record(&mut self) -> Option<RawRecord>;
}

/// How [`VecProvider`] picks the next record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Each record once, in order, then exhausted
    Sequential,
    /// A uniformly random record every time; never exhausted
    #[default]
    Random,
}

/// In-memory provider over a fixed list of records
pub struct VecProvider {
    records: Vec<RawRecord>,
    policy: SelectionPolicy,
    cursor: usize,
    rng: StdRng,
}

impl VecProvider {
    pub fn new(records: Vec<RawRecord>, policy: SelectionPolicy) -> Self {
        Self {
            records,
            policy,
            cursor: 0,
            rng: StdRng::from_entropy(),
        }
    }

    /// Sequential provider over the given texts
    pub fn sequential<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let records = texts.into_iter().map(RawRecord::new).collect();
        Self::new(records, SelectionPolicy::Sequential)
    }

    /// Make random selection reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Load records from a file.
    ///
    /// A `.csv` file is read as a CSV dataset with a header row. Anything else
    /// goes through [`read_records`], which also recognises a CSV header on the
    /// first line.
    pub fn from_path(path: impl AsRef<Path>, policy: SelectionPolicy) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            SentiflowError::Config(format!("Failed to open records file {:?}: {}", path, e))
        })?;
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        let records = if is_csv {
            read_csv_records(file)?
        } else {
            read_records(std::io::BufReader::new(file))?
        };
        tracing::info!("Loaded {} records from {:?}", records.len(), path);
        Ok(Self::new(records, policy))
    }
}

/// Parse records from a line-oriented reader.
///
/// Lines starting with `{` are parsed as JSON (`{"text": .., "label": ..}`,
/// or the dataset's `Comment` / `Sentiment` columns); any other non-blank
/// line is taken as plain text. Records with blank text are skipped.
///
/// If the first non-blank line is a CSV header naming a `text` or `Comment`
/// column, the whole input is read with [`read_csv_records`] instead.
pub fn read_records(mut reader: impl BufRead) -> Result<Vec<RawRecord>> {
    let mut input = String::new();
    reader.read_to_string(&mut input)?;

    let first_line = input.lines().map(str::trim).find(|l| !l.is_empty());
    if first_line.is_some_and(is_csv_header) {
        return read_csv_records(input.as_bytes());
    }

    let mut records = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record = if trimmed.starts_with('{') {
            serde_json::from_str::<RawRecord>(trimmed).map_err(|e| SentiflowError::Record {
                line: line_no,
                message: e.to_string(),
            })?
        } else {
            RawRecord::new(trimmed)
        };

        if record.text.trim().is_empty() {
            tracing::debug!(line = line_no, "skipping record with empty text");
            continue;
        }
        records.push(record);
    }

    Ok(records)
}

/// Parse a CSV dataset with a header row.
///
/// The text column is `text` or `Comment`, the optional label column is
/// `label` or `Sentiment`. Other columns are ignored, quoted fields may hold
/// commas, and rows with blank text are skipped.
pub fn read_csv_records(reader: impl Read) -> Result<Vec<RawRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for row in csv_reader.deserialize::<RawRecord>() {
        let record = row.map_err(|e| SentiflowError::Record {
            line: e.position().map(|p| p.line() as usize).unwrap_or(0),
            message: e.to_string(),
        })?;
        if record.text.trim().is_empty() {
            tracing::debug!("skipping CSV row with empty text");
            continue;
        }
        records.push(record);
    }

    Ok(records)
}

fn is_csv_header(line: &str) -> bool {
    !line.starts_with('{')
        && line.contains(',')
        && line
            .split(',')
            .any(|column| CSV_TEXT_COLUMNS.contains(&column.trim().trim_matches('"')))
}

impl RecordProvider for VecProvider {
    fn size(&self) -> usize {
        self.records.len()
    }

    fn next_record(&mut self) -> Option<RawRecord> {
        match self.policy {
            SelectionPolicy::Sequential => {
                let record = self.records.get(self.cursor).cloned();
                if record.is_some() {
                    self.cursor += 1;
                }
                record
            }
            SelectionPolicy::Random => self.records.choose(&mut self.rng).cloned(),
        }
    }
}
