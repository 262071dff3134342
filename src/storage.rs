//! Tabular storage: named tables grouped under named locations.
//!
//! The pipeline only ever reads a whole table or replaces a whole table, so the
//! store exposes exactly those two operations plus an untyped read for the
//! wide source sheets whose year columns are configured at runtime.

use std::fs;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim, WriterBuilder};
use tracing::debug;

use crate::error::{EtlError, Result};
use crate::types::TableRecord;

/// A table read without a fixed schema: header plus string cells.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    /// Resolve the positions of `columns`, failing with every missing name at once.
    pub fn require_columns(&self, columns: &[&str]) -> Result<Vec<usize>> {
        check_columns(&self.name, &self.headers, columns)?;
        Ok(columns
            .iter()
            .filter_map(|c| self.column_index(c))
            .collect())
    }
}

pub trait TableStore {
    fn exists(&self, location: &str, name: &str) -> bool;

    fn read_raw(&self, location: &str, name: &str) -> Result<RawTable>;

    fn read_table<T: TableRecord>(&self, location: &str, name: &str) -> Result<Vec<T>>;

    /// Replace the whole table. There is no append mode.
    fn write_table<T: TableRecord>(&self, location: &str, name: &str, rows: &[T]) -> Result<()>;
}

/// CSV-file backed store: table `name` of `location` lives at
/// `<root>/<location>/<name>.csv`.
#[derive(Debug, Clone)]
pub struct CsvStore {
    root: PathBuf,
}

impl CsvStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn location_dir(&self, location: &str) -> PathBuf {
        self.root.join(location)
    }

    pub fn table_path(&self, location: &str, name: &str) -> PathBuf {
        self.location_dir(location).join(format!("{name}.csv"))
    }

    fn open_reader(&self, location: &str, name: &str) -> Result<csv::Reader<fs::File>> {
        let path = self.table_path(location, name);
        if !path.exists() {
            return Err(EtlError::TableNotFound {
                table: qualified(location, name),
                path,
            });
        }
        Ok(ReaderBuilder::new()
            .flexible(true)
            .trim(Trim::All)
            .from_path(&path)?)
    }
}

impl TableStore for CsvStore {
    fn exists(&self, location: &str, name: &str) -> bool {
        self.table_path(location, name).is_file()
    }

    fn read_raw(&self, location: &str, name: &str) -> Result<RawTable> {
        let mut rdr = self.open_reader(location, name)?;
        let headers = rdr.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }
        debug!(table = %qualified(location, name), rows = rows.len(), "read raw table");
        Ok(RawTable {
            name: qualified(location, name),
            headers,
            rows,
        })
    }

    fn read_table<T: TableRecord>(&self, location: &str, name: &str) -> Result<Vec<T>> {
        let mut rdr = self.open_reader(location, name)?;
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        check_columns(&qualified(location, name), &headers, T::COLUMNS)?;

        let mut rows = Vec::new();
        for result in rdr.deserialize::<T>() {
            rows.push(result?);
        }
        debug!(table = %qualified(location, name), rows = rows.len(), "read table");
        Ok(rows)
    }

    fn write_table<T: TableRecord>(&self, location: &str, name: &str, rows: &[T]) -> Result<()> {
        let dir = self.location_dir(location);
        fs::create_dir_all(&dir)?;
        let target = self.table_path(location, name);
        let temp = dir.join(format!(".{name}.csv.tmp"));

        let written = write_rows(&temp, rows).and_then(|()| Ok(fs::rename(&temp, &target)?));
        if let Err(err) = written {
            // The target is untouched; only the partial temp file needs removing.
            let _ = fs::remove_file(&temp);
            return Err(err);
        }
        debug!(table = %qualified(location, name), rows = rows.len(), "replaced table");
        Ok(())
    }
}

fn write_rows<T: TableRecord>(path: &Path, rows: &[T]) -> Result<()> {
    // Header is written by hand so empty tables still carry their schema.
    let mut wtr = WriterBuilder::new().has_headers(false).from_path(path)?;
    wtr.write_record(T::COLUMNS)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

fn qualified(location: &str, name: &str) -> String {
    format!("{location}/{name}")
}

fn check_columns(table: &str, headers: &[String], expected: &[&str]) -> Result<()> {
    let missing: Vec<String> = expected
        .iter()
        .filter(|c| !headers.iter().any(|h| h == *c))
        .map(|c| c.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(EtlError::SchemaMismatch {
            table: table.to_string(),
            missing,
            found: headers.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DimYear, YearMasterRow};
    use serde::{Deserialize, Serialize, Serializer};
    use tempfile::tempdir;

    #[derive(Debug, Deserialize)]
    struct Unwritable {
        id: u32,
    }

    impl Serialize for Unwritable {
        fn serialize<S: Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom(format!("row {} cannot be written", self.id)))
        }
    }

    impl TableRecord for Unwritable {
        const COLUMNS: &'static [&'static str] = &["id"];
    }

    #[test]
    fn failed_write_keeps_target_and_removes_temp_file() {
        let dir = tempdir().expect("tempdir");
        let store = CsvStore::new(dir.path());
        let kept = vec![DimYear {
            id: 1,
            year: "2020".into(),
            note: "-".into(),
        }];
        store.write_table("warehouse", "dim_x", &kept).expect("seed");

        let err = store
            .write_table("warehouse", "dim_x", &[Unwritable { id: 7 }])
            .expect_err("serialize fails");

        assert!(matches!(err, EtlError::Csv(_)));
        assert!(!store.location_dir("warehouse").join(".dim_x.csv.tmp").exists());
        let back: Vec<DimYear> = store.read_table("warehouse", "dim_x").expect("read");
        assert_eq!(back, kept);
    }

    #[test]
    fn write_then_read_keeps_rows_and_header() {
        let dir = tempdir().expect("tempdir");
        let store = CsvStore::new(dir.path());
        let rows = vec![
            DimYear {
                id: 1,
                year: "2020".into(),
                note: "-".into(),
            },
            DimYear {
                id: 2,
                year: "2021".into(),
                note: "census".into(),
            },
        ];

        store.write_table("warehouse", "dim_year", &rows).expect("write");
        let back: Vec<DimYear> = store.read_table("warehouse", "dim_year").expect("read");

        assert_eq!(back, rows);
        let text = fs::read_to_string(store.table_path("warehouse", "dim_year")).expect("file");
        assert!(text.starts_with("id,year,note\n"));
    }

    #[test]
    fn empty_tables_still_get_a_header() {
        let dir = tempdir().expect("tempdir");
        let store = CsvStore::new(dir.path());

        store
            .write_table::<DimYear>("warehouse", "dim_year", &[])
            .expect("write");

        let text = fs::read_to_string(store.table_path("warehouse", "dim_year")).expect("file");
        assert_eq!(text, "id,year,note\n");
        let back: Vec<DimYear> = store.read_table("warehouse", "dim_year").expect("read");
        assert!(back.is_empty());
    }

    #[test]
    fn missing_columns_are_a_schema_mismatch() {
        let dir = tempdir().expect("tempdir");
        let store = CsvStore::new(dir.path());
        fs::create_dir_all(store.location_dir("master")).expect("mkdir");
        fs::write(store.table_path("master", "year"), "Year,Comment\n2020,x\n").expect("seed");

        let err = store
            .read_table::<YearMasterRow>("master", "year")
            .expect_err("should fail");

        match err {
            EtlError::SchemaMismatch { missing, .. } => assert_eq!(missing, vec!["Notes"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn extra_columns_and_blank_cells_are_tolerated() {
        let dir = tempdir().expect("tempdir");
        let store = CsvStore::new(dir.path());
        fs::create_dir_all(store.location_dir("master")).expect("mkdir");
        fs::write(
            store.table_path("master", "year"),
            "Year,Notes,Owner\n2020.0,,ops\n2021, first ,ops\n",
        )
        .expect("seed");

        let rows: Vec<YearMasterRow> = store.read_table("master", "year").expect("read");

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].year.as_deref(), Some("2020.0"));
        assert_eq!(rows[0].notes, None);
        assert_eq!(rows[1].notes.as_deref(), Some("first"));
    }

    #[test]
    fn unknown_table_is_reported_with_its_path() {
        let dir = tempdir().expect("tempdir");
        let store = CsvStore::new(dir.path());

        assert!(!store.exists("warehouse", "dim_year"));
        let err = store
            .read_raw("warehouse", "dim_year")
            .expect_err("should fail");
        assert!(matches!(err, EtlError::TableNotFound { .. }));
    }
}
