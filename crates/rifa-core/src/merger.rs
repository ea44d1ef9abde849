//! Merge importer for reconciling an external CSV file against a store
//!
//! Duplicate numbers are resolved first-write-wins: rows already in the
//! destination, and earlier rows of the same import, always beat later ones.

use crate::error::{Error, Result};
use crate::record::{purchase_timestamp, valid_number, Record, STORE_HEADER};
use crate::store::RaffleStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Report of a completed merge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeReport {
    /// Numbers appended to the destination, in source-file order
    pub added: Vec<String>,
    /// Numbers skipped as already taken, in source-file order
    pub ignored: Vec<String>,
}

impl MergeReport {
    /// Count of rows appended to the destination
    pub fn total_added(&self) -> usize {
        self.added.len()
    }

    /// Count of rows skipped as duplicates
    pub fn total_ignored(&self) -> usize {
        self.ignored.len()
    }
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Merge complete. {} numbers added.", self.total_added())?;
        if !self.ignored.is_empty() {
            write!(
                f,
                " {} numbers ignored (already registered).",
                self.total_ignored()
            )?;
        }
        Ok(())
    }
}

/// Merge an external CSV file into the destination store file
///
/// The source needs only `numero` and `nome` columns, in any order; extra
/// columns are ignored and a missing `telefone` becomes the empty string.
/// Accepted rows are stamped with the current local time, never with a
/// `data_compra` value carried by the source. A missing destination is
/// created with the standard header first, so a merge can target a fresh
/// store. The destination is rewritten exactly once, after the source has
/// been read completely, so a source read failure leaves it untouched.
pub fn merge_files<D, S>(destination: D, source: S) -> Result<MergeReport>
where
    D: AsRef<Path>,
    S: AsRef<Path>,
{
    let source = source.as_ref();
    if !source.exists() {
        return Err(Error::SourceNotFound(source.to_path_buf()));
    }

    // Numbers already present in the destination seed the working set; the
    // rows themselves are kept for the final rewrite.
    let store = RaffleStore::open(destination)?;
    let existing = store.read_records()?;
    let mut taken: HashSet<String> = existing
        .iter()
        .map(|record| record.number.clone())
        .collect();

    let file = File::open(source).map_err(|e| Error::FileRead {
        path: source.to_path_buf(),
        source: e,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    // Map required columns by header name; position in the file is free.
    let headers = reader
        .headers()
        .map_err(|e| Error::Csv {
            path: source.to_path_buf(),
            source: e,
        })?
        .clone();
    let number_idx = headers.iter().position(|h| h == "numero");
    let name_idx = headers.iter().position(|h| h == "nome");
    let (number_idx, name_idx) = match (number_idx, name_idx) {
        (Some(number_idx), Some(name_idx)) => (number_idx, name_idx),
        _ => {
            return Err(Error::InvalidFormat {
                path: source.to_path_buf(),
                message: "required columns: numero, nome".to_string(),
            })
        }
    };
    let phone_idx = headers.iter().position(|h| h == "telefone");

    let mut accepted: Vec<Record> = Vec::new();
    let mut ignored: Vec<String> = Vec::new();

    for result in reader.records() {
        let row = result.map_err(|e| Error::Csv {
            path: source.to_path_buf(),
            source: e,
        })?;

        // Rows too short to carry both required cells are skipped, as are
        // rows whose number would not survive the store's write validation.
        let number = match row.get(number_idx) {
            Some(value) => value.trim(),
            None => continue,
        };
        let name = match row.get(name_idx) {
            Some(value) => value.trim(),
            None => continue,
        };
        if !valid_number(number) {
            continue;
        }
        if taken.contains(number) {
            ignored.push(number.to_string());
            continue;
        }

        let phone = phone_idx.and_then(|idx| row.get(idx)).unwrap_or("");
        taken.insert(number.to_string());
        accepted.push(Record::new(number, name, phone, purchase_timestamp()));
    }

    rewrite_destination(&store, &existing, &accepted)?;

    Ok(MergeReport {
        added: accepted
            .into_iter()
            .map(|record| record.number)
            .collect(),
        ignored,
    })
}

/// Find every CSV file under `dir`, recursively, in sorted path order
///
/// Follows symlinks. Non-CSV files and directories are skipped; the caller
/// decides what to merge and in which role.
pub fn discover_sources<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "csv") {
            sources.push(path.to_path_buf());
        }
    }
    sources.sort();
    Ok(sources)
}

/// Rewrite the destination as header, original rows, then accepted rows
///
/// The content is serialized in full and moved into place with a
/// same-directory temp file and a rename, so a failed write cannot leave a
/// truncated store behind.
fn rewrite_destination(
    store: &RaffleStore,
    existing: &[Record],
    accepted: &[Record],
) -> Result<()> {
    let path = store.path();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(STORE_HEADER)
        .map_err(|e| Error::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;
    for record in existing.iter().chain(accepted) {
        writer
            .write_record(record.as_row())
            .map_err(|e| Error::Csv {
                path: path.to_path_buf(),
                source: e,
            })?;
    }
    let buffer = writer.into_inner().map_err(|e| Error::FileWrite {
        path: path.to_path_buf(),
        source: e.into_error(),
    })?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("rifas.csv");
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));
    fs::write(&tmp_path, buffer).map_err(|e| Error::FileWrite {
        path: tmp_path.clone(),
        source: e,
    })?;
    fs::rename(&tmp_path, path).map_err(|e| Error::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(path: &Path, content: &str) {
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_merge_into_missing_destination() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("rifas.csv");
        let source = dir.path().join("vendas.csv");
        write_file(
            &source,
            "numero,nome,telefone,data_compra\n1,Ana,111,01/01/2020 00:00\n2,Bob,,\n",
        );

        let report = merge_files(&dest, &source).unwrap();
        assert_eq!(report.added, vec!["1", "2"]);
        assert!(report.ignored.is_empty());
        assert_eq!(report.total_added(), 2);

        let store = RaffleStore::open(&dest).unwrap();
        let rows = store.read_records().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Ana");
        assert_eq!(rows[1].name, "Bob");
    }

    #[test]
    fn test_merge_keeps_first_registration() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("rifas.csv");
        let store = RaffleStore::open(&dest).unwrap();
        store.register("5", "Alice", "111").unwrap();

        let source = dir.path().join("vendas.csv");
        write_file(&source, "numero,nome\n5,Bob\n");

        let report = merge_files(&dest, &source).unwrap();
        assert!(report.added.is_empty());
        assert_eq!(report.ignored, vec!["5"]);
        assert_eq!(report.total_ignored(), 1);

        let rows = store.read_records().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Alice");
    }

    #[test]
    fn test_merge_self_collision_within_source() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("rifas.csv");
        let source = dir.path().join("vendas.csv");
        write_file(&source, "numero,nome\n7,Ana\n7,Bob\n");

        let report = merge_files(&dest, &source).unwrap();
        assert_eq!(report.added, vec!["7"]);
        assert_eq!(report.ignored, vec!["7"]);

        let store = RaffleStore::open(&dest).unwrap();
        assert_eq!(store.find_by_number("7").unwrap().unwrap().name, "Ana");
    }

    #[test]
    fn test_merge_missing_source() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("rifas.csv");

        let err = merge_files(&dest, dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, Error::SourceNotFound(_)));
        // The source check runs before the destination is touched.
        assert!(!dest.exists());
    }

    #[test]
    fn test_merge_rejects_missing_required_headers() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("rifas.csv");
        let store = RaffleStore::open(&dest).unwrap();
        store.register("1", "Ana", "").unwrap();
        let before = fs::read(&dest).unwrap();

        let source = dir.path().join("vendas.csv");
        write_file(&source, "id,nome\n5,Bob\n");
        let err = merge_files(&dest, &source).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat { .. }));
        assert_eq!(fs::read(&dest).unwrap(), before);

        write_file(&source, "numero,comprador\n5,Bob\n");
        let err = merge_files(&dest, &source).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat { .. }));
        assert_eq!(fs::read(&dest).unwrap(), before);
    }

    #[test]
    fn test_merge_invalid_format_still_creates_destination() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("rifas.csv");
        let source = dir.path().join("vendas.csv");
        write_file(&source, "id,nome\n5,Bob\n");

        assert!(merge_files(&dest, &source).is_err());
        assert_eq!(
            fs::read_to_string(&dest).unwrap(),
            "numero,nome,telefone,data_compra\n"
        );
    }

    #[test]
    fn test_merge_maps_columns_by_name() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("rifas.csv");
        let source = dir.path().join("vendas.csv");
        write_file(&source, "extra,nome,numero\nx,Ana,3\n");

        let report = merge_files(&dest, &source).unwrap();
        assert_eq!(report.added, vec!["3"]);

        let store = RaffleStore::open(&dest).unwrap();
        let row = store.find_by_number("3").unwrap().unwrap();
        assert_eq!(row.name, "Ana");
        assert_eq!(row.phone, "");
    }

    #[test]
    fn test_merge_restamps_purchase_date() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("rifas.csv");
        let source = dir.path().join("vendas.csv");
        write_file(
            &source,
            "numero,nome,telefone,data_compra\n8,Ana,111,01/01/2020 00:00\n",
        );

        merge_files(&dest, &source).unwrap();

        let store = RaffleStore::open(&dest).unwrap();
        let row = store.find_by_number("8").unwrap().unwrap();
        assert_ne!(row.purchased_at, "01/01/2020 00:00");
    }

    #[test]
    fn test_merge_trims_number_and_name_only() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("rifas.csv");
        let source = dir.path().join("vendas.csv");
        write_file(&source, "numero,nome,telefone\n 9 , Ana ,  555  \n");

        let report = merge_files(&dest, &source).unwrap();
        assert_eq!(report.added, vec!["9"]);

        let store = RaffleStore::open(&dest).unwrap();
        let row = store.find_by_number("9").unwrap().unwrap();
        assert_eq!(row.name, "Ana");
        assert_eq!(row.phone, "  555  ");
    }

    #[test]
    fn test_merge_skips_short_rows() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("rifas.csv");
        let source = dir.path().join("vendas.csv");
        write_file(&source, "numero,nome\n5\n6,Bob\n");

        let report = merge_files(&dest, &source).unwrap();
        assert_eq!(report.added, vec!["6"]);
        assert!(report.ignored.is_empty());
    }

    #[test]
    fn test_merge_skips_nonnumeric_numbers() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("rifas.csv");
        let source = dir.path().join("vendas.csv");
        write_file(&source, "numero,nome\nabc,Eve\n7,Bob\n");

        let report = merge_files(&dest, &source).unwrap();
        assert_eq!(report.added, vec!["7"]);
        assert!(report.ignored.is_empty());
    }

    #[test]
    fn test_merge_appends_after_existing_rows() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("rifas.csv");
        let store = RaffleStore::open(&dest).unwrap();
        store.register("20", "Ana", "").unwrap();
        store.register("3", "Bob", "").unwrap();

        let source = dir.path().join("vendas.csv");
        write_file(&source, "numero,nome\n100,Eve\n");
        merge_files(&dest, &source).unwrap();

        let numbers: Vec<String> = store
            .read_records()
            .unwrap()
            .into_iter()
            .map(|record| record.number)
            .collect();
        assert_eq!(numbers, vec!["20", "3", "100"]);
    }

    #[test]
    fn test_merge_failed_source_read_leaves_destination_untouched() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("rifas.csv");
        let store = RaffleStore::open(&dest).unwrap();
        store.register("1", "Ana", "").unwrap();
        let before = fs::read(&dest).unwrap();

        let source = dir.path().join("vendas.csv");
        fs::write(&source, b"numero,nome\n\xff\xfe,Bob\n").unwrap();

        let err = merge_files(&dest, &source).unwrap_err();
        assert!(matches!(err, Error::Csv { .. }));
        assert_eq!(fs::read(&dest).unwrap(), before);
    }

    #[test]
    fn test_merge_report_message() {
        let report = MergeReport {
            added: vec!["1".to_string(), "2".to_string()],
            ignored: Vec::new(),
        };
        assert_eq!(report.to_string(), "Merge complete. 2 numbers added.");

        let report = MergeReport {
            added: Vec::new(),
            ignored: vec!["5".to_string()],
        };
        assert_eq!(
            report.to_string(),
            "Merge complete. 0 numbers added. 1 numbers ignored (already registered)."
        );
    }

    #[test]
    fn test_discover_sources_finds_csv_files_sorted() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        write_file(&dir.path().join("b.csv"), "numero,nome\n");
        write_file(&dir.path().join("a.csv"), "numero,nome\n");
        write_file(&dir.path().join("notes.txt"), "not a source");
        write_file(&dir.path().join("sub").join("c.csv"), "numero,nome\n");

        let sources = discover_sources(dir.path()).unwrap();
        assert_eq!(
            sources,
            vec![
                dir.path().join("a.csv"),
                dir.path().join("b.csv"),
                dir.path().join("sub").join("c.csv"),
            ]
        );
    }

    #[test]
    fn test_discover_sources_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = discover_sources(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::WalkDir(_)));
    }
}
