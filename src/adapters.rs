//! Per-dimension adapters: reshape master reference rows into dimension rows,
//! validate cross-master references, then merge, key and persist.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{info, warn};

use crate::dimension::{assign_keys, upsert, Upserted};
use crate::error::{EtlError, Result};
use crate::storage::TableStore;
use crate::types::{
    AreaMasterRow, DimIndicator, DimLocation, DimYear, Dimension, IncomeProvinceMasterRow,
    IndicatorMasterRow, YearMasterRow,
};
use crate::util::{
    fill_missing, non_blank, normalize_area_code, normalize_year, parse_integer_text,
};

/// Where a dimension table lives.
#[derive(Debug, Clone, Copy)]
pub struct DimTarget<'a> {
    pub location: &'a str,
    pub table: &'a str,
}

/// Year master rows keyed by their four-digit year; blank or non-year values
/// cannot be keyed and are skipped.
pub fn year_rows_from_master(master: &[YearMasterRow], null: &str) -> Vec<DimYear> {
    let mut skipped = 0usize;
    let rows: Vec<DimYear> = master
        .iter()
        .filter_map(|row| {
            let year = non_blank(row.year.as_deref())
                .and_then(parse_integer_text)
                .filter(|y| (1000..=9999).contains(y));
            match year {
                Some(year) => Some(DimYear {
                    id: 0,
                    year: year.to_string(),
                    note: fill_missing(row.notes.as_deref(), null),
                }),
                None => {
                    skipped += 1;
                    None
                }
            }
        })
        .collect();
    if skipped > 0 {
        warn!(skipped, "year master rows without a valid year were ignored");
    }
    rows
}

/// Every province named by the income master must exist in the area master.
///
/// A row with income attributes but no province name is an unknown reference;
/// a fully blank row is skipped.
pub fn validate_income_provinces(
    area: &[AreaMasterRow],
    income: &[IncomeProvinceMasterRow],
) -> Result<()> {
    let mut blank_rows = 0usize;
    for row in income {
        if non_blank(row.province.as_deref()).is_some() {
            continue;
        }
        if non_blank(row.income_level.as_deref()).is_some()
            || non_blank(row.income_level_id.as_deref()).is_some()
        {
            return Err(EtlError::InvalidReference {
                entity: "province",
                value: "(blank)".to_string(),
                master: "area master".to_string(),
            });
        }
        blank_rows += 1;
    }
    if blank_rows > 0 {
        warn!(skipped = blank_rows, "blank income master rows were ignored");
    }

    let known: HashSet<&str> = area
        .iter()
        .filter_map(|row| non_blank(row.area_name.as_deref()))
        .collect();
    let unknown: BTreeSet<&str> = income
        .iter()
        .filter_map(|row| non_blank(row.province.as_deref()))
        .filter(|name| !known.contains(name))
        .collect();

    match unknown.into_iter().next() {
        Some(name) => Err(EtlError::InvalidReference {
            entity: "province",
            value: name.to_string(),
            master: "area master".to_string(),
        }),
        None => Ok(()),
    }
}

/// Left join area master with income master on area name.
///
/// Areas without an income match get the sentinel for both income fields; an
/// area matched by several income rows yields one row per match and the merge
/// keeps the last.
pub fn location_rows_from_master(
    area: &[AreaMasterRow],
    income: &[IncomeProvinceMasterRow],
    null: &str,
) -> Result<Vec<DimLocation>> {
    validate_income_provinces(area, income)?;

    let mut income_by_name: HashMap<&str, Vec<&IncomeProvinceMasterRow>> = HashMap::new();
    for row in income {
        if let Some(name) = non_blank(row.province.as_deref()) {
            income_by_name.entry(name).or_default().push(row);
        }
    }

    let mut rows = Vec::with_capacity(area.len());
    let mut skipped = 0usize;
    for row in area {
        let Some(code) = non_blank(row.id.as_deref()) else {
            skipped += 1;
            continue;
        };
        let base = DimLocation {
            id: 0,
            area_code: normalize_area_code(code),
            area_name: fill_missing(row.area_name.as_deref(), null),
            area_type: fill_missing(row.area_type.as_deref(), null),
            region_name: fill_missing(row.region_group.as_deref(), null),
            region_code: fill_missing(row.region_id.as_deref(), null),
            income_level_name: null.to_string(),
            income_level_code: null.to_string(),
        };

        let matches = non_blank(row.area_name.as_deref())
            .and_then(|name| income_by_name.get(name))
            .map(Vec::as_slice)
            .unwrap_or_default();
        if matches.is_empty() {
            rows.push(base);
            continue;
        }
        for income_row in matches {
            rows.push(DimLocation {
                income_level_name: fill_missing(income_row.income_level.as_deref(), null),
                income_level_code: fill_missing(income_row.income_level_id.as_deref(), null),
                ..base.clone()
            });
        }
    }
    if skipped > 0 {
        warn!(skipped, "area master rows without an ID were ignored");
    }
    Ok(rows)
}

pub fn indicator_rows_from_master(master: &[IndicatorMasterRow], null: &str) -> Vec<DimIndicator> {
    let mut skipped = 0usize;
    let rows: Vec<DimIndicator> = master
        .iter()
        .filter_map(|row| {
            let Some(code) = non_blank(row.indicator_code.as_deref()) else {
                skipped += 1;
                return None;
            };
            Some(DimIndicator {
                id: 0,
                indicator_code: code.to_string(),
                indicator_name: fill_missing(row.indicator_name.as_deref(), null),
                theme_name: fill_missing(row.theme.as_deref(), null),
                technology_name: fill_missing(row.technology.as_deref(), null),
                technology_code: fill_missing(row.tech_id.as_deref(), null),
                category_name: fill_missing(row.category.as_deref(), null),
                category_code: fill_missing(row.category_id.as_deref(), null),
                new_category_name: fill_missing(row.new_category.as_deref(), null),
                new_category_code: fill_missing(row.new_category_id.as_deref(), null),
                unit: fill_missing(row.unit.as_deref(), null),
            })
        })
        .collect();
    if skipped > 0 {
        warn!(skipped, "indicator master rows without a code were ignored");
    }
    rows
}

/// Read the current dimension, merge `incoming`, renumber and replace it.
///
/// A dimension that has never been written is treated as empty.
pub fn reconcile<S, D>(
    store: &S,
    target: DimTarget<'_>,
    incoming: Vec<D>,
    normalize_existing: fn(D) -> D,
) -> Result<Upserted<D>>
where
    S: TableStore,
    D: Dimension,
{
    let existing: Vec<D> = if store.exists(target.location, target.table) {
        store
            .read_table::<D>(target.location, target.table)?
            .into_iter()
            .map(normalize_existing)
            .collect()
    } else {
        info!(table = target.table, "dimension not found, starting empty");
        Vec::new()
    };
    let existing_rows = existing.len();
    let incoming_rows = incoming.len();

    let merged = upsert(existing, incoming);
    let rows = assign_keys(merged.rows);
    store.write_table(target.location, target.table, &rows)?;

    info!(
        table = target.table,
        key = D::KEY_COLUMN,
        existing = existing_rows,
        incoming = incoming_rows,
        updated = merged.updated,
        inserted = merged.inserted,
        rows = rows.len(),
        "dimension reconciled"
    );
    if merged.collapsed > 0 {
        warn!(
            table = target.table,
            key = D::KEY_COLUMN,
            collapsed = merged.collapsed,
            "stored rows sharing a business key were collapsed"
        );
    }
    Ok(Upserted {
        rows,
        updated: merged.updated,
        inserted: merged.inserted,
        collapsed: merged.collapsed,
    })
}

pub fn reconcile_year<S: TableStore>(
    store: &S,
    target: DimTarget<'_>,
    master: &[YearMasterRow],
    null: &str,
) -> Result<Upserted<DimYear>> {
    let incoming = year_rows_from_master(master, null);
    reconcile(store, target, incoming, |mut row: DimYear| {
        row.year = normalize_year(&row.year);
        row
    })
}

/// Fails before touching storage when the income master names an unknown province.
pub fn reconcile_location<S: TableStore>(
    store: &S,
    target: DimTarget<'_>,
    area: &[AreaMasterRow],
    income: &[IncomeProvinceMasterRow],
    null: &str,
) -> Result<Upserted<DimLocation>> {
    let incoming = location_rows_from_master(area, income, null)?;
    reconcile(store, target, incoming, |mut row: DimLocation| {
        row.area_code = normalize_area_code(&row.area_code);
        row
    })
}

pub fn reconcile_indicator<S: TableStore>(
    store: &S,
    target: DimTarget<'_>,
    master: &[IndicatorMasterRow],
    null: &str,
) -> Result<Upserted<DimIndicator>> {
    let incoming = indicator_rows_from_master(master, null);
    reconcile(store, target, incoming, |row: DimIndicator| row)
}
