//! Fact table construction: resolve each staging row's dimension surrogate keys.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{info, warn};

use crate::types::{DimIndicator, DimLocation, DimYear, Dimension, FactRow, FactStagingRow};
use crate::util::{normalize_area_code, normalize_year};

/// Staging rows dropped because a dimension key did not resolve.
///
/// Each dropped row is counted once, against the first join that missed, in
/// join order location, year, indicator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnresolvedJoins {
    pub location: usize,
    pub year: usize,
    pub indicator: usize,
}

impl UnresolvedJoins {
    pub fn total(&self) -> usize {
        self.location + self.year + self.indicator
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactBuild {
    pub rows: Vec<FactRow>,
    pub unresolved: UnresolvedJoins,
}

fn key_index<D: Dimension>(rows: &[D]) -> HashMap<&str, u32> {
    rows.iter()
        .map(|row| (row.business_key(), row.surrogate_key()))
        .collect()
}

/// Inner-join staging rows against the finalized dimensions.
///
/// Staging area codes and years are normalized before lookup. Staging's own
/// area name, indicator name and unit are ignored; the dimensions own those
/// attributes. Output keeps staging order and never has more rows than the input.
pub fn build_facts(
    staging: &[FactStagingRow],
    dim_location: &[DimLocation],
    dim_indicator: &[DimIndicator],
    dim_year: &[DimYear],
) -> FactBuild {
    let locations = key_index(dim_location);
    let years = key_index(dim_year);
    let indicators = key_index(dim_indicator);

    let mut unresolved = UnresolvedJoins::default();
    let mut rows = Vec::with_capacity(staging.len());
    for row in staging {
        let Some(&dim_location_id) = locations.get(normalize_area_code(&row.area_code).as_str())
        else {
            unresolved.location += 1;
            continue;
        };
        let Some(&dim_year_id) = years.get(normalize_year(&row.year).as_str()) else {
            unresolved.year += 1;
            continue;
        };
        let Some(&dim_indicator_id) = indicators.get(row.indicator_code.trim()) else {
            unresolved.indicator += 1;
            continue;
        };
        rows.push(FactRow {
            dim_year_id,
            dim_indicator_id,
            dim_location_id,
            value: row.value,
        });
    }

    if unresolved.total() > 0 {
        warn!(
            dropped = unresolved.total(),
            location = unresolved.location,
            year = unresolved.year,
            indicator = unresolved.indicator,
            "staging rows without a matching dimension key were dropped"
        );
    }
    info!(staging = staging.len(), facts = rows.len(), "built fact rows");

    FactBuild { rows, unresolved }
}
