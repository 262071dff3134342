use std::fs;
use std::path::Path;

use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use crate::error::Result;
use crate::util::format_int;

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let s = serde_json::to_string_pretty(value)?;
    fs::write(path, s)?;
    Ok(())
}

/// Render the first `max_rows` rows as a Markdown table.
pub fn render_preview<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    if rows.is_empty() || max_rows == 0 {
        return "(no rows)".to_string();
    }
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    Table::new(slice)
        .with(Style::markdown())
        .to_string()
}

pub fn preview_table<T>(title: &str, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{} ({} rows)\n", title, format_int(rows.len()));
    println!("{}\n", render_preview(rows, max_rows));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DimYear;
    use tempfile::tempdir;

    #[test]
    fn preview_is_markdown_and_truncated() {
        let rows: Vec<DimYear> = (2018..2023)
            .enumerate()
            .map(|(i, y)| DimYear {
                id: i as u32 + 1,
                year: y.to_string(),
                note: "-".into(),
            })
            .collect();

        let text = render_preview(&rows, 2);

        assert!(text.contains("| id |"));
        assert!(text.contains("2019"));
        assert!(!text.contains("2020"));
    }

    #[test]
    fn empty_preview_says_so() {
        assert_eq!(render_preview::<DimYear>(&[], 5), "(no rows)");
    }

    #[test]
    fn json_lands_in_nested_directory() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("warehouse").join("run_summary.json");

        write_json(&path, &serde_json::json!({ "fact_rows": 3 })).expect("write");

        let text = fs::read_to_string(&path).expect("read");
        assert!(text.contains("\"fact_rows\": 3"));
    }
}
