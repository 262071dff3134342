use std::collections::{BTreeSet, HashMap, HashSet};
use std::str::FromStr;

use tracing::info;

use crate::error::{EtlError, Result};
use crate::storage::RawTable;
use crate::types::{
    AreaMasterRow, FactStagingRow, IndicatorMasterRow, LatticeRow, LongRow, YearMasterRow,
};
use crate::util::{non_blank, normalize_area_code, normalize_year, parse_f64_safe, parse_integer_text};

pub const AREA_COLUMN: &str = "Province";
pub const INDICATOR_COLUMN: &str = "Indicator ID";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeltReport {
    pub sources: usize,
    pub wide_rows: usize,
    pub long_rows: usize,
    pub distinct_areas: usize,
    pub distinct_indicators: usize,
}

/// Concatenate the cleaned wide sheets and melt their year columns into long rows.
///
/// Each source must carry the area, indicator and every year column; other
/// columns are ignored. Output is sorted by (area, indicator, year).
pub fn melt_sources(
    sources: &[RawTable],
    year_columns: &[String],
) -> Result<(Vec<LongRow>, MeltReport)> {
    let mut required: Vec<&str> = vec![AREA_COLUMN, INDICATOR_COLUMN];
    required.extend(year_columns.iter().map(String::as_str));

    let mut wide_rows = 0usize;
    let mut long: Vec<LongRow> = Vec::new();
    for table in sources {
        let idx = table.require_columns(&required)?;
        let (area_idx, indicator_idx, year_idx) = (idx[0], idx[1], &idx[2..]);

        for row in &table.rows {
            wide_rows += 1;
            let cell = |i: usize| row.get(i).map(String::as_str);
            let area = cell(area_idx).unwrap_or_default().trim().to_string();
            let indicator_code = cell(indicator_idx).unwrap_or_default().trim().to_string();
            for (year, &i) in year_columns.iter().zip(year_idx) {
                long.push(LongRow {
                    area: area.clone(),
                    indicator_code: indicator_code.clone(),
                    year: normalize_year(year),
                    value: non_blank(cell(i)).map(str::to_string),
                });
            }
        }
    }

    long.sort_by(|a, b| {
        (&a.area, &a.indicator_code, &a.year).cmp(&(&b.area, &b.indicator_code, &b.year))
    });

    let report = MeltReport {
        sources: sources.len(),
        wide_rows,
        long_rows: long.len(),
        distinct_areas: long.iter().map(|r| r.area.as_str()).collect::<HashSet<_>>().len(),
        distinct_indicators: long
            .iter()
            .map(|r| r.indicator_code.as_str())
            .collect::<HashSet<_>>()
            .len(),
    };
    info!(
        sources = report.sources,
        wide_rows = report.wide_rows,
        long_rows = report.long_rows,
        areas = report.distinct_areas,
        indicators = report.distinct_indicators,
        "melted source sheets"
    );
    Ok((long, report))
}

/// Area x Indicator x Year from the masters, each side deduplicated, in master order.
pub fn cross_join_masters(
    area: &[AreaMasterRow],
    indicator: &[IndicatorMasterRow],
    year: &[YearMasterRow],
) -> Vec<LatticeRow> {
    let mut seen = HashSet::new();
    let areas: Vec<(String, String)> = area
        .iter()
        .filter_map(|r| {
            let code = normalize_area_code(non_blank(r.id.as_deref())?);
            let name = non_blank(r.area_name.as_deref()).unwrap_or_default().to_string();
            Some((code, name))
        })
        .filter(|pair| seen.insert(pair.clone()))
        .collect();

    let mut seen = HashSet::new();
    let indicators: Vec<(String, String, String)> = indicator
        .iter()
        .filter_map(|r| {
            let code = non_blank(r.indicator_code.as_deref())?.to_string();
            let name = non_blank(r.indicator_name.as_deref()).unwrap_or_default().to_string();
            let unit = non_blank(r.unit.as_deref()).unwrap_or_default().to_string();
            Some((code, name, unit))
        })
        .filter(|triple| seen.insert(triple.clone()))
        .collect();

    let mut seen = HashSet::new();
    let years: Vec<String> = year
        .iter()
        .filter_map(|r| non_blank(r.year.as_deref()).map(normalize_year))
        .filter(|y| seen.insert(y.clone()))
        .collect();

    info!(
        areas = areas.len(),
        indicators = indicators.len(),
        years = years.len(),
        "built master lattice"
    );

    let mut lattice = Vec::with_capacity(areas.len() * indicators.len() * years.len());
    for (area_code, area_name) in &areas {
        for (indicator_code, indicator_name, unit) in &indicators {
            for y in &years {
                lattice.push(LatticeRow {
                    area_code: area_code.clone(),
                    area: area_name.clone(),
                    indicator_code: indicator_code.clone(),
                    indicator_name: indicator_name.clone(),
                    unit: unit.clone(),
                    year: y.clone(),
                });
            }
        }
    }
    lattice
}

/// Every area, year and indicator code in the long data must occur in the lattice.
pub fn validate_against_lattice(lattice: &[LatticeRow], long: &[LongRow]) -> Result<()> {
    fn first_unknown<'a>(
        entity: &'static str,
        known: HashSet<&'a str>,
        values: impl Iterator<Item = &'a str>,
    ) -> Result<()> {
        let unknown: BTreeSet<&str> = values.filter(|v| !known.contains(v)).collect();
        match unknown.into_iter().next() {
            Some(value) => Err(EtlError::InvalidReference {
                entity,
                value: value.to_string(),
                master: "master lattice".to_string(),
            }),
            None => Ok(()),
        }
    }

    first_unknown(
        "area",
        lattice.iter().map(|r| r.area.as_str()).collect(),
        long.iter().map(|r| r.area.as_str()),
    )?;
    first_unknown(
        "year",
        lattice.iter().map(|r| r.year.as_str()).collect(),
        long.iter().map(|r| r.year.as_str()),
    )?;
    first_unknown(
        "indicator code",
        lattice.iter().map(|r| r.indicator_code.as_str()).collect(),
        long.iter().map(|r| r.indicator_code.as_str()),
    )
}

/// A lattice cell joined with its raw, not yet coerced, value.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    pub cell: LatticeRow,
    pub raw_value: Option<String>,
}

/// Left join the lattice with the long rows on (area, indicator code, year).
///
/// Cells with no data keep a missing value; a cell matched by several long rows
/// is emitted once per match.
pub fn align_to_lattice(lattice: Vec<LatticeRow>, long: &[LongRow]) -> Vec<AlignedRow> {
    let mut by_key: HashMap<(&str, &str, &str), Vec<&LongRow>> = HashMap::new();
    for row in long {
        by_key
            .entry((row.area.as_str(), row.indicator_code.as_str(), row.year.as_str()))
            .or_default()
            .push(row);
    }

    let mut aligned = Vec::with_capacity(lattice.len());
    for cell in lattice {
        let matches = by_key
            .get(&(cell.area.as_str(), cell.indicator_code.as_str(), cell.year.as_str()))
            .cloned()
            .unwrap_or_default();
        if matches.is_empty() {
            aligned.push(AlignedRow {
                cell,
                raw_value: None,
            });
            continue;
        }
        for m in matches {
            aligned.push(AlignedRow {
                cell: cell.clone(),
                raw_value: m.value.clone(),
            });
        }
    }
    aligned
}

/// Measurement unit of an indicator, which decides how its text values parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Percent,
    Average,
    Count,
    Rupiah,
}

impl FromStr for Unit {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "%" => Ok(Unit::Percent),
            "Average" => Ok(Unit::Average),
            "Count" => Ok(Unit::Count),
            "Rupiah" => Ok(Unit::Rupiah),
            other => Err(EtlError::InvalidUnit {
                unit: other.to_string(),
            }),
        }
    }
}

/// Turn a raw cell into a number according to its unit.
///
/// Blank and `-` are missing. `%` and `Average` use a decimal comma. `Count`
/// drops `.`/`,` thousands separators when the text is not already an integer.
pub fn coerce_value(unit: &str, raw: Option<&str>) -> Result<Option<f64>> {
    let raw = match non_blank(raw) {
        None | Some("-") => return Ok(None),
        Some(v) => v,
    };
    let parsed = match unit.parse::<Unit>()? {
        Unit::Percent | Unit::Average => parse_f64_safe(&raw.replace(',', ".")),
        Unit::Count => match parse_integer_text(raw).filter(|_| !raw.contains('.')) {
            Some(n) => Some(n as f64),
            None => parse_f64_safe(&raw.replace(['.', ','], "")),
        },
        Unit::Rupiah => parse_f64_safe(raw),
    };
    match parsed {
        Some(v) => Ok(Some(v)),
        None => Err(EtlError::InvalidValue {
            unit: unit.to_string(),
            value: raw.to_string(),
        }),
    }
}

pub fn coerce_rows(aligned: Vec<AlignedRow>) -> Result<Vec<FactStagingRow>> {
    let mut rows = Vec::with_capacity(aligned.len());
    for AlignedRow { cell, raw_value } in aligned {
        let value = coerce_value(&cell.unit, raw_value.as_deref())?;
        rows.push(FactStagingRow {
            area: cell.area,
            area_code: cell.area_code,
            indicator_code: cell.indicator_code,
            indicator_name: cell.indicator_name,
            unit: cell.unit,
            year: cell.year,
            value,
        });
    }
    let filled = rows.iter().filter(|r| r.value.is_some()).count();
    info!(rows = rows.len(), filled, "coerced staging values");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn years() -> Vec<String> {
        vec!["2020".to_string(), "2021".to_string()]
    }

    fn source(rows: &[[&str; 5]]) -> RawTable {
        RawTable {
            name: "cleaned/ict".into(),
            headers: ["No", "Province", "Indicator ID", "2020", "2021"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    fn masters() -> (Vec<AreaMasterRow>, Vec<IndicatorMasterRow>, Vec<YearMasterRow>) {
        let area = vec![
            AreaMasterRow {
                id: Some("11".into()),
                area_name: Some("Aceh".into()),
                ..Default::default()
            },
            AreaMasterRow {
                id: Some("5".into()),
                area_name: Some("Bali".into()),
                ..Default::default()
            },
        ];
        let indicator = vec![IndicatorMasterRow {
            indicator_code: Some("ICT01".into()),
            indicator_name: Some("Internet users".into()),
            unit: Some("%".into()),
            ..Default::default()
        }];
        let year = vec![
            YearMasterRow {
                year: Some("2020".into()),
                notes: None,
            },
            YearMasterRow {
                year: Some("2021.0".into()),
                notes: None,
            },
        ];
        (area, indicator, year)
    }

    #[test]
    fn melt_emits_one_row_per_year_column() {
        let table = source(&[["1", "Bali", "ICT01", "12,5", ""], ["2", "Aceh", "ICT01", "-", "3"]]);

        let (long, report) = melt_sources(&[table], &years()).expect("melt");

        assert_eq!(report.wide_rows, 2);
        assert_eq!(report.long_rows, 4);
        assert_eq!(long[0].area, "Aceh");
        assert_eq!(long[0].value.as_deref(), Some("-"));
        assert_eq!(long[3].area, "Bali");
        assert_eq!(long[3].year, "2021");
        assert_eq!(long[3].value, None);
    }

    #[test]
    fn melt_requires_every_year_column() {
        let mut table = source(&[]);
        table.headers.truncate(4);

        let err = melt_sources(&[table], &years()).expect_err("should fail");

        match err {
            EtlError::SchemaMismatch { missing, .. } => assert_eq!(missing, vec!["2021"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn lattice_is_the_full_cross_product() {
        let (area, indicator, year) = masters();

        let lattice = cross_join_masters(&area, &indicator, &year);

        assert_eq!(lattice.len(), 4);
        assert_eq!(lattice[2].area_code, "05");
        assert_eq!(lattice[1].year, "2021");
    }

    #[test]
    fn unknown_area_fails_validation() {
        let (area, indicator, year) = masters();
        let lattice = cross_join_masters(&area, &indicator, &year);
        let long = vec![LongRow {
            area: "Atlantis".into(),
            indicator_code: "ICT01".into(),
            year: "2020".into(),
            value: None,
        }];

        let err = validate_against_lattice(&lattice, &long).expect_err("should fail");

        assert!(matches!(
            err,
            EtlError::InvalidReference { entity: "area", .. }
        ));
    }

    #[test]
    fn alignment_fills_gaps_from_the_lattice() {
        let (area, indicator, year) = masters();
        let lattice = cross_join_masters(&area, &indicator, &year);
        let long = vec![LongRow {
            area: "Bali".into(),
            indicator_code: "ICT01".into(),
            year: "2021".into(),
            value: Some("7,25".into()),
        }];

        let staged = coerce_rows(align_to_lattice(lattice, &long)).expect("coerce");

        assert_eq!(staged.len(), 4);
        assert_eq!(staged[3].area_code, "05");
        assert_eq!(staged[3].value, Some(7.25));
        assert!(staged[..3].iter().all(|r| r.value.is_none()));
    }

    #[test]
    fn values_coerce_by_unit() {
        assert_eq!(coerce_value("%", Some("12,5")).expect("pct"), Some(12.5));
        assert_eq!(coerce_value("Average", Some("3,0")).expect("avg"), Some(3.0));
        assert_eq!(coerce_value("Count", Some("42")).expect("count"), Some(42.0));
        assert_eq!(
            coerce_value("Count", Some("1.234.567")).expect("count"),
            Some(1_234_567.0)
        );
        assert_eq!(coerce_value("Rupiah", Some("1500.5")).expect("idr"), Some(1500.5));
        assert_eq!(coerce_value("Count", Some("-")).expect("dash"), None);
        assert_eq!(coerce_value("%", None).expect("blank"), None);
    }

    #[test]
    fn unknown_unit_and_garbage_are_errors() {
        assert!(matches!(
            coerce_value("Kg", Some("1")),
            Err(EtlError::InvalidUnit { .. })
        ));
        assert!(matches!(
            coerce_value("%", Some("n/a")),
            Err(EtlError::InvalidValue { .. })
        ));
    }
}
