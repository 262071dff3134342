//! Pipeline configuration, read from a TOML file and passed explicitly to the
//! pipeline entry point.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Placeholder written for missing dimension attributes.
    pub default_null_value: String,
    /// Abort instead of dropping staging rows whose dimension keys do not resolve.
    #[serde(default)]
    pub fail_on_unresolved_joins: bool,
    /// Wide year columns melted out of every cleaned source sheet.
    #[serde(default = "default_year_columns")]
    pub year_columns: Vec<String>,
    pub storage: StorageConfig,
    pub sources: SourceConfig,
    pub masters: MasterConfig,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub warehouse: WarehouseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub location: String,
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MasterConfig {
    pub location: String,
    pub area: String,
    pub income_province: String,
    pub year: String,
    pub indicator: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    pub location: String,
    pub table: String,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            location: "staging".to_string(),
            table: "main".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub location: String,
    pub dim_year: String,
    pub dim_location: String,
    pub dim_indicator: String,
    pub fact: String,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            location: "warehouse".to_string(),
            dim_year: "dim_year".to_string(),
            dim_location: "dim_location".to_string(),
            dim_indicator: "dim_indicator".to_string(),
            fact: "fact_it_ecosystem".to_string(),
        }
    }
}

fn default_year_columns() -> Vec<String> {
    (2018..=2023).map(|y| y.to_string()).collect()
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
default_null_value = "-"

[storage]
root = "data"

[sources]
location = "cleaned"
tables = ["ict_access", "ict_usage"]

[masters]
location = "master"
area = "area"
income_province = "income_province"
year = "year"
indicator = "indicator"
"#;

    #[test]
    fn defaults_fill_optional_sections() {
        let config = PipelineConfig::from_toml_str(MINIMAL).expect("parse");

        assert_eq!(config.default_null_value, "-");
        assert!(!config.fail_on_unresolved_joins);
        assert_eq!(config.year_columns.first().map(String::as_str), Some("2018"));
        assert_eq!(config.year_columns.len(), 6);
        assert_eq!(config.staging.table, "main");
        assert_eq!(config.warehouse.fact, "fact_it_ecosystem");
        assert_eq!(config.sources.tables.len(), 2);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let text = format!(
            "{MINIMAL}\n[warehouse]\nlocation = \"dw\"\nfact = \"fact_values\"\n"
        );
        let text = text.replacen(
            "default_null_value = \"-\"",
            "default_null_value = \"N/A\"\nfail_on_unresolved_joins = true\nyear_columns = [\"2022\"]",
            1,
        );

        let config = PipelineConfig::from_toml_str(&text).expect("parse");

        assert_eq!(config.default_null_value, "N/A");
        assert!(config.fail_on_unresolved_joins);
        assert_eq!(config.year_columns, vec!["2022"]);
        assert_eq!(config.warehouse.location, "dw");
        assert_eq!(config.warehouse.fact, "fact_values");
        assert_eq!(config.warehouse.dim_year, "dim_year");
    }

    #[test]
    fn missing_sentinel_is_a_config_error() {
        let text = MINIMAL.replace("default_null_value = \"-\"", "");

        let err = PipelineConfig::from_toml_str(&text).expect_err("should fail");

        assert!(matches!(err, crate::error::EtlError::Config(_)));
    }
}
