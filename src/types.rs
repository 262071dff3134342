use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// A row type with a fixed, named column layout on storage.
///
/// `COLUMNS` lists the stored header in field order; reads check it, writes emit it.
pub trait TableRecord: Serialize + DeserializeOwned {
    const COLUMNS: &'static [&'static str];
}

/// A dimension row: a unique business key plus a positional surrogate key.
pub trait Dimension: TableRecord + Clone {
    const KEY_COLUMN: &'static str;

    fn business_key(&self) -> &str;
    fn surrogate_key(&self) -> u32;
    fn set_surrogate_key(&mut self, key: u32);
}

// ---------------------------------------------------------------------------
// Master reference rows. Spreadsheet exports leave blanks, so every field is
// optional until the adapters fill it with the configured sentinel.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AreaMasterRow {
    #[serde(rename = "ID")]
    pub id: Option<String>,
    #[serde(rename = "AREA_NAME")]
    pub area_name: Option<String>,
    #[serde(rename = "AREA_TYPE")]
    pub area_type: Option<String>,
    #[serde(rename = "REGION_GROUP")]
    pub region_group: Option<String>,
    #[serde(rename = "ID_REGION")]
    pub region_id: Option<String>,
}

impl TableRecord for AreaMasterRow {
    const COLUMNS: &'static [&'static str] =
        &["ID", "AREA_NAME", "AREA_TYPE", "REGION_GROUP", "ID_REGION"];
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncomeProvinceMasterRow {
    #[serde(rename = "Provinsi")]
    pub province: Option<String>,
    #[serde(rename = "Tingkat_Pendapatan")]
    pub income_level: Option<String>,
    #[serde(rename = "ID_Pendapatan")]
    pub income_level_id: Option<String>,
}

impl TableRecord for IncomeProvinceMasterRow {
    const COLUMNS: &'static [&'static str] = &["Provinsi", "Tingkat_Pendapatan", "ID_Pendapatan"];
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct YearMasterRow {
    #[serde(rename = "Year")]
    pub year: Option<String>,
    #[serde(rename = "Notes")]
    pub notes: Option<String>,
}

impl TableRecord for YearMasterRow {
    const COLUMNS: &'static [&'static str] = &["Year", "Notes"];
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorMasterRow {
    #[serde(rename = "Indicator_Code")]
    pub indicator_code: Option<String>,
    #[serde(rename = "Indicator_Name")]
    pub indicator_name: Option<String>,
    #[serde(rename = "Theme")]
    pub theme: Option<String>,
    #[serde(rename = "Technology")]
    pub technology: Option<String>,
    #[serde(rename = "Tech_ID")]
    pub tech_id: Option<String>,
    #[serde(rename = "Category")]
    pub category: Option<String>,
    #[serde(rename = "Category_ID")]
    pub category_id: Option<String>,
    #[serde(rename = "Unit")]
    pub unit: Option<String>,
    #[serde(rename = "Category_ID.1")]
    pub new_category_id: Option<String>,
    #[serde(rename = "New_Category")]
    pub new_category: Option<String>,
}

impl TableRecord for IndicatorMasterRow {
    const COLUMNS: &'static [&'static str] = &[
        "Indicator_Code",
        "Indicator_Name",
        "Theme",
        "Technology",
        "Tech_ID",
        "Category",
        "Category_ID",
        "Unit",
        "Category_ID.1",
        "New_Category",
    ];
}

// ---------------------------------------------------------------------------
// Warehouse dimensions.

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Tabled)]
pub struct DimYear {
    #[serde(default)]
    pub id: u32,
    pub year: String,
    pub note: String,
}

impl TableRecord for DimYear {
    const COLUMNS: &'static [&'static str] = &["id", "year", "note"];
}

impl Dimension for DimYear {
    const KEY_COLUMN: &'static str = "year";

    fn business_key(&self) -> &str {
        &self.year
    }

    fn surrogate_key(&self) -> u32 {
        self.id
    }

    fn set_surrogate_key(&mut self, key: u32) {
        self.id = key;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Tabled)]
pub struct DimLocation {
    #[serde(default)]
    pub id: u32,
    pub area_code: String,
    pub area_name: String,
    pub area_type: String,
    pub region_name: String,
    pub region_code: String,
    pub income_level_name: String,
    pub income_level_code: String,
}

impl TableRecord for DimLocation {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "area_code",
        "area_name",
        "area_type",
        "region_name",
        "region_code",
        "income_level_name",
        "income_level_code",
    ];
}

impl Dimension for DimLocation {
    const KEY_COLUMN: &'static str = "area_code";

    fn business_key(&self) -> &str {
        &self.area_code
    }

    fn surrogate_key(&self) -> u32 {
        self.id
    }

    fn set_surrogate_key(&mut self, key: u32) {
        self.id = key;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Tabled)]
pub struct DimIndicator {
    #[serde(default)]
    pub id: u32,
    pub indicator_code: String,
    pub indicator_name: String,
    pub theme_name: String,
    pub technology_name: String,
    pub technology_code: String,
    pub category_name: String,
    pub category_code: String,
    pub new_category_name: String,
    pub new_category_code: String,
    pub unit: String,
}

impl TableRecord for DimIndicator {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "indicator_code",
        "indicator_name",
        "theme_name",
        "technology_name",
        "technology_code",
        "category_name",
        "category_code",
        "new_category_name",
        "new_category_code",
        "unit",
    ];
}

impl Dimension for DimIndicator {
    const KEY_COLUMN: &'static str = "indicator_code";

    fn business_key(&self) -> &str {
        &self.indicator_code
    }

    fn surrogate_key(&self) -> u32 {
        self.id
    }

    fn set_surrogate_key(&mut self, key: u32) {
        self.id = key;
    }
}

// ---------------------------------------------------------------------------
// Staging and fact rows.

/// One melted cell of a cleaned source sheet, before lattice alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct LongRow {
    pub area: String,
    pub indicator_code: String,
    pub year: String,
    pub value: Option<String>,
}

/// One cell of the Area x Indicator x Year lattice built from the masters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatticeRow {
    pub area_code: String,
    pub area: String,
    pub indicator_code: String,
    pub indicator_name: String,
    pub unit: String,
    pub year: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tabled)]
pub struct FactStagingRow {
    #[serde(rename = "Area")]
    #[tabled(rename = "Area")]
    pub area: String,
    #[serde(rename = "Area Code")]
    #[tabled(rename = "Area Code")]
    pub area_code: String,
    #[serde(rename = "Indicator Code")]
    #[tabled(rename = "Indicator Code")]
    pub indicator_code: String,
    #[serde(rename = "Indicator Name")]
    #[tabled(rename = "Indicator Name")]
    pub indicator_name: String,
    #[serde(rename = "Unit")]
    #[tabled(rename = "Unit")]
    pub unit: String,
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    #[tabled(display_with = "display_value")]
    pub value: Option<f64>,
}

impl TableRecord for FactStagingRow {
    const COLUMNS: &'static [&'static str] = &[
        "Area",
        "Area Code",
        "Indicator Code",
        "Indicator Name",
        "Unit",
        "Year",
        "Value",
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tabled)]
pub struct FactRow {
    pub dim_year_id: u32,
    pub dim_indicator_id: u32,
    pub dim_location_id: u32,
    #[tabled(display_with = "display_value")]
    pub value: Option<f64>,
}

impl TableRecord for FactRow {
    const COLUMNS: &'static [&'static str] =
        &["dim_year_id", "dim_indicator_id", "dim_location_id", "value"];
}

fn display_value(value: &Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
