//! File-backed record store for raffle sales
//!
//! The store owns a single CSV file with the header
//! `numero,nome,telefone,data_compra`. Rows are append-only: registrations
//! add rows, nothing updates or deletes them. Every query re-reads the file,
//! which is the intended trade-off for the hundreds-of-rows data volumes
//! this tool targets.

use crate::error::{Error, Result};
use crate::record::{purchase_timestamp, valid_number, Record, STORE_HEADER};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Handle to the canonical raffle CSV file
///
/// Holds the backing file path; construct one per store file and pass it to
/// whoever needs access. There is no process-wide default.
#[derive(Debug, Clone)]
pub struct RaffleStore {
    path: PathBuf,
}

impl RaffleStore {
    /// Open a store at `path`, creating the file with its header row if absent
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        store.ensure_initialized()?;
        Ok(store)
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the backing file with the header row if it does not exist
    ///
    /// Idempotent. A pre-existing file is left untouched, whatever its
    /// header looks like.
    pub fn ensure_initialized(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        let file = File::create(&self.path).map_err(|e| Error::FileWrite {
            path: self.path.clone(),
            source: e,
        })?;
        let mut writer = csv::Writer::from_writer(file);
        writer
            .write_record(STORE_HEADER)
            .map_err(|e| self.csv_error(e))?;
        writer.flush().map_err(|e| Error::FileWrite {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(())
    }

    /// Read every record in file order
    ///
    /// This is the single read primitive behind all queries and the merge
    /// importer; nothing else parses the store file.
    pub fn read_records(&self) -> Result<Vec<Record>> {
        let file = File::open(&self.path).map_err(|e| Error::FileRead {
            path: self.path.clone(),
            source: e,
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(BufReader::new(file));

        let mut records = Vec::new();
        for result in reader.records() {
            let row = result.map_err(|e| self.csv_error(e))?;
            records.push(Record::from_store_row(&row));
        }
        Ok(records)
    }

    /// Register a single raffle number for a buyer
    ///
    /// Rejects numbers that are already taken or not integer-parseable, and
    /// empty buyer names. On success the appended record is returned, stamped
    /// with the current local time.
    pub fn register(&self, number: &str, name: &str, phone: &str) -> Result<Record> {
        if !valid_number(number) {
            return Err(Error::InvalidNumber(number.to_string()));
        }
        if name.trim().is_empty() {
            return Err(Error::EmptyName);
        }
        if self.find_by_number(number)?.is_some() {
            return Err(Error::DuplicateNumber(number.to_string()));
        }
        let record = Record::new(number, name, phone, purchase_timestamp());
        self.append_record(&record)?;
        Ok(record)
    }

    /// Register several numbers for the same buyer
    ///
    /// Each number is checked against the file independently and either
    /// appended or recorded as a duplicate; the loop never aborts early, so a
    /// batch can partially succeed. A repeat within the same batch collides
    /// with the copy appended moments before. All accepted rows share one
    /// timestamp, captured before the loop.
    pub fn register_many(
        &self,
        numbers: &[String],
        name: &str,
        phone: &str,
    ) -> Result<BatchOutcome> {
        if name.trim().is_empty() {
            return Err(Error::EmptyName);
        }
        let stamp = purchase_timestamp();
        let mut outcome = BatchOutcome::new(name);
        for number in numbers {
            if !valid_number(number) {
                outcome.invalid.push(number.clone());
                continue;
            }
            if self.find_by_number(number)?.is_some() {
                outcome.duplicates.push(number.clone());
                continue;
            }
            let record = Record::new(number.as_str(), name, phone, stamp.clone());
            self.append_record(&record)?;
            outcome.registered.push(number.clone());
        }
        Ok(outcome)
    }

    /// All records sorted ascending by the number's integer value
    ///
    /// The sort is stable, so rows whose numbers compare equal as integers
    /// (`"07"` and `"7"`) keep their file order. A stored number that does
    /// not parse (possible only through external file edits) is reported as
    /// `InvalidNumber` instead of producing an undefined order.
    pub fn list_all(&self) -> Result<Vec<Record>> {
        let records = self.read_records()?;
        let mut keyed: Vec<(i64, Record)> = Vec::with_capacity(records.len());
        for record in records {
            let key = record
                .number
                .parse::<i64>()
                .map_err(|_| Error::InvalidNumber(record.number.clone()))?;
            keyed.push((key, record));
        }
        keyed.sort_by_key(|(key, _)| *key);
        Ok(keyed.into_iter().map(|(_, record)| record).collect())
    }

    /// Look up a record by raffle number
    ///
    /// Exact text comparison: `"07"` and `"7"` are distinct keys. Returns the
    /// first match in file order.
    pub fn find_by_number(&self, number: &str) -> Result<Option<Record>> {
        Ok(self
            .read_records()?
            .into_iter()
            .find(|record| record.number == number))
    }

    /// All records whose buyer name contains `fragment`, case-insensitively
    ///
    /// Matches are returned in file order, not sorted.
    pub fn find_by_name(&self, fragment: &str) -> Result<Vec<Record>> {
        let needle = fragment.to_lowercase();
        Ok(self
            .read_records()?
            .into_iter()
            .filter(|record| record.name.to_lowercase().contains(&needle))
            .collect())
    }

    /// Copy the backing file byte-for-byte to `destination`
    ///
    /// No re-serialization happens; the exported file is identical to the
    /// store file at the time of the call.
    pub fn export<P: AsRef<Path>>(&self, destination: P) -> Result<()> {
        let destination = destination.as_ref();
        fs::copy(&self.path, destination).map_err(|e| Error::Copy {
            from: self.path.clone(),
            to: destination.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }

    /// Scan the file for damage that only external edits can introduce
    ///
    /// Reports numbers appearing on more than one row and numbers that would
    /// break the sorted listing. Read-only; nothing is repaired.
    pub fn verify(&self) -> Result<VerifyReport> {
        let records = self.read_records()?;
        let mut report = VerifyReport {
            rows: records.len(),
            duplicates: Vec::new(),
            invalid: Vec::new(),
        };
        let mut seen: HashSet<&str> = HashSet::new();
        let mut flagged: HashSet<&str> = HashSet::new();
        for record in &records {
            let number = record.number.as_str();
            if !valid_number(number) && !report.invalid.iter().any(|n| n == number) {
                report.invalid.push(number.to_string());
            }
            if !seen.insert(number) && flagged.insert(number) {
                report.duplicates.push(number.to_string());
            }
        }
        Ok(report)
    }

    /// Append one row with an open-append-close cycle
    ///
    /// No write buffering is kept across calls; every accepted row hits the
    /// file before the next uniqueness check runs.
    fn append_record(&self, record: &Record) -> Result<()> {
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::FileWrite {
                path: self.path.clone(),
                source: e,
            })?;
        let mut writer = csv::Writer::from_writer(file);
        writer
            .write_record(record.as_row())
            .map_err(|e| self.csv_error(e))?;
        writer.flush().map_err(|e| Error::FileWrite {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(())
    }

    fn csv_error(&self, source: csv::Error) -> Error {
        Error::Csv {
            path: self.path.clone(),
            source,
        }
    }
}

/// Outcome of a batch registration
///
/// Ordered lists of the numbers that were appended, the numbers skipped as
/// already taken, and the numbers rejected by validation. The batch counts as
/// a success in the original sense iff `registered` is non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Buyer the batch was registered to
    pub buyer: String,
    /// Numbers appended, in request order
    pub registered: Vec<String>,
    /// Numbers skipped because they were already taken
    pub duplicates: Vec<String>,
    /// Numbers rejected as not integer-parseable
    pub invalid: Vec<String>,
}

impl BatchOutcome {
    pub(crate) fn new(buyer: impl Into<String>) -> Self {
        Self {
            buyer: buyer.into(),
            registered: Vec::new(),
            duplicates: Vec::new(),
            invalid: Vec::new(),
        }
    }

    /// Whether at least one number was newly registered
    pub fn any_registered(&self) -> bool {
        !self.registered.is_empty()
    }
}

impl fmt::Display for BatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = Vec::new();
        if !self.registered.is_empty() {
            lines.push(format!(
                "Buyer {} registered with numbers: {}.",
                self.buyer,
                self.registered.join(", ")
            ));
        }
        if !self.duplicates.is_empty() {
            lines.push(format!(
                "Numbers already taken: {}.",
                self.duplicates.join(", ")
            ));
        }
        if !self.invalid.is_empty() {
            lines.push(format!("Invalid numbers: {}.", self.invalid.join(", ")));
        }
        write!(f, "{}", lines.join("\n"))
    }
}

/// Result of a store integrity scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Total data rows in the file
    pub rows: usize,
    /// Numbers appearing on more than one row, in first-repeat order
    pub duplicates: Vec<String>,
    /// Numbers that do not parse as integers, in file order
    pub invalid: Vec<String>,
}

impl VerifyReport {
    /// Whether the scan found nothing wrong
    pub fn is_clean(&self) -> bool {
        self.duplicates.is_empty() && self.invalid.is_empty()
    }
}
