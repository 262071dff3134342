//! Stage orchestration: staging table, three dimensions, then the fact table.
//!
//! Every stage replaces its own target table before the next stage starts.
//! There is no cross-table transaction: a failure in a later stage leaves the
//! tables written by earlier stages in their new state and the fact table as
//! the previous run left it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::adapters::{reconcile_indicator, reconcile_location, reconcile_year, DimTarget};
use crate::config::PipelineConfig;
use crate::dimension::Upserted;
use crate::error::{EtlError, Result};
use crate::fact::{build_facts, FactBuild, UnresolvedJoins};
use crate::staging::{
    align_to_lattice, coerce_rows, cross_join_masters, melt_sources, validate_against_lattice,
    MeltReport,
};
use crate::storage::TableStore;
use crate::types::{
    AreaMasterRow, DimIndicator, DimLocation, DimYear, FactRow, FactStagingRow,
    IncomeProvinceMasterRow, IndicatorMasterRow, YearMasterRow,
};

#[derive(Debug, Clone, Default)]
pub struct Masters {
    pub area: Vec<AreaMasterRow>,
    pub income_province: Vec<IncomeProvinceMasterRow>,
    pub year: Vec<YearMasterRow>,
    pub indicator: Vec<IndicatorMasterRow>,
}

pub fn load_masters<S: TableStore>(store: &S, config: &PipelineConfig) -> Result<Masters> {
    let m = &config.masters;
    let masters = Masters {
        area: store.read_table(&m.location, &m.area)?,
        income_province: store.read_table(&m.location, &m.income_province)?,
        year: store.read_table(&m.location, &m.year)?,
        indicator: store.read_table(&m.location, &m.indicator)?,
    };
    info!(
        area = masters.area.len(),
        income_province = masters.income_province.len(),
        year = masters.year.len(),
        indicator = masters.indicator.len(),
        "loaded master data"
    );
    Ok(masters)
}

#[derive(Debug, Clone)]
pub struct StagingOutcome {
    pub rows: Vec<FactStagingRow>,
    pub melt: MeltReport,
}

/// Ingest the cleaned sheets, check them against the master lattice, coerce
/// values and replace the staging table.
pub fn build_staging<S: TableStore>(
    store: &S,
    config: &PipelineConfig,
    masters: &Masters,
) -> Result<StagingOutcome> {
    let sources = config
        .sources
        .tables
        .iter()
        .map(|name| store.read_raw(&config.sources.location, name))
        .collect::<Result<Vec<_>>>()?;
    let (long, melt) = melt_sources(&sources, &config.year_columns)?;

    let lattice = cross_join_masters(&masters.area, &masters.indicator, &masters.year);
    validate_against_lattice(&lattice, &long)?;
    let rows = coerce_rows(align_to_lattice(lattice, &long))?;

    store.write_table(&config.staging.location, &config.staging.table, &rows)?;
    info!(
        table = %config.staging.table,
        rows = rows.len(),
        "staging table written"
    );
    Ok(StagingOutcome { rows, melt })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DimensionSummary {
    pub rows: usize,
    pub updated: usize,
    pub inserted: usize,
}

impl<D> From<&Upserted<D>> for DimensionSummary {
    fn from(outcome: &Upserted<D>) -> Self {
        Self {
            rows: outcome.rows.len(),
            updated: outcome.updated,
            inserted: outcome.inserted,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generated_at: DateTime<Utc>,
    pub source_rows: usize,
    pub staging_rows: usize,
    pub dim_year: DimensionSummary,
    pub dim_location: DimensionSummary,
    pub dim_indicator: DimensionSummary,
    pub fact_rows: usize,
    pub unresolved: UnresolvedJoins,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub staging: Vec<FactStagingRow>,
    pub dim_year: Vec<DimYear>,
    pub dim_location: Vec<DimLocation>,
    pub dim_indicator: Vec<DimIndicator>,
    pub facts: Vec<FactRow>,
}

/// Resolve dimension keys for `staging` and replace the fact table.
///
/// In strict mode any unresolved row aborts the stage before the write.
pub fn publish_facts<S: TableStore>(
    store: &S,
    config: &PipelineConfig,
    staging: &[FactStagingRow],
    dim_location: &[DimLocation],
    dim_indicator: &[DimIndicator],
    dim_year: &[DimYear],
) -> Result<FactBuild> {
    let built = build_facts(staging, dim_location, dim_indicator, dim_year);
    if config.fail_on_unresolved_joins && built.unresolved.total() > 0 {
        return Err(EtlError::UnresolvedJoins {
            count: built.unresolved.total(),
        });
    }
    let wh = &config.warehouse;
    store.write_table(&wh.location, &wh.fact, &built.rows)?;
    info!(table = %wh.fact, rows = built.rows.len(), "fact table written");
    Ok(built)
}

/// Run every stage in order.
pub fn run<S: TableStore>(store: &S, config: &PipelineConfig) -> Result<RunOutcome> {
    let masters = load_masters(store, config)?;
    let staged = build_staging(store, config, &masters)?;

    let wh = &config.warehouse;
    let null = config.default_null_value.as_str();
    let dim_year = reconcile_year(
        store,
        DimTarget {
            location: &wh.location,
            table: &wh.dim_year,
        },
        &masters.year,
        null,
    )?;
    let dim_location = reconcile_location(
        store,
        DimTarget {
            location: &wh.location,
            table: &wh.dim_location,
        },
        &masters.area,
        &masters.income_province,
        null,
    )?;
    let dim_indicator = reconcile_indicator(
        store,
        DimTarget {
            location: &wh.location,
            table: &wh.dim_indicator,
        },
        &masters.indicator,
        null,
    )?;

    // The persisted staging table is the fact stage's input.
    let staging: Vec<FactStagingRow> =
        store.read_table(&config.staging.location, &config.staging.table)?;
    let built = publish_facts(
        store,
        config,
        &staging,
        &dim_location.rows,
        &dim_indicator.rows,
        &dim_year.rows,
    )?;

    let summary = RunSummary {
        generated_at: Utc::now(),
        source_rows: staged.melt.wide_rows,
        staging_rows: staging.len(),
        dim_year: (&dim_year).into(),
        dim_location: (&dim_location).into(),
        dim_indicator: (&dim_indicator).into(),
        fact_rows: built.rows.len(),
        unresolved: built.unresolved,
    };
    Ok(RunOutcome {
        summary,
        staging,
        dim_year: dim_year.rows,
        dim_location: dim_location.rows,
        dim_indicator: dim_indicator.rows,
        facts: built.rows,
    })
}
