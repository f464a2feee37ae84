use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum CalculationType {
    #[schemars(
        description = "Value entered directly per day; month-to-date is the sum of the entered days."
    )]
    Direct,

    #[schemars(
        description = "Derived by summing the daily values of the KPI's configured source KPIs."
    )]
    Cumulative,

    #[schemars(
        description = "Derived by evaluating an arithmetic formula that may reference other KPIs by id or display name."
    )]
    Formula,

    #[schemars(
        description = "Ratio of a numerator KPI over a denominator KPI, scaled by 100 when the unit is percent-like."
    )]
    Percentage,

    #[schemars(
        description = "Monthly goal derived once from a formula over month-to-date values; has no daily breakdown."
    )]
    Target,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Kpi {
    #[schemars(description = "Unique, stable identifier of the KPI within the brand's KPI set.")]
    pub id: String,

    #[schemars(
        description = "Display name shown on the dashboard. Formula references may use this name (case-insensitive) instead of the id."
    )]
    pub name: String,

    #[schemars(description = "Dashboard category this KPI belongs to (e.g. 'Sales', 'After Sales').")]
    pub category: String,

    #[schemars(
        description = "Free-text unit. The values '%'/'yüzde' select percentage semantics, 'TL'/'₺' select currency semantics."
    )]
    pub unit: String,

    #[schemars(description = "Which of the five calculation strategies derives this KPI's values.")]
    pub calculation_type: CalculationType,

    #[serde(default)]
    #[schemars(
        description = "Fallback target number, used for Target-type KPIs when no monthly target override exists."
    )]
    pub static_target: Option<f64>,

    #[serde(default)]
    #[schemars(
        description = "If true, the KPI has no daily breakdown; its month value comes from a single stored override."
    )]
    pub only_cumulative: bool,

    #[serde(default)]
    #[schemars(description = "Numerator KPI id. Only meaningful for Percentage-type KPIs.")]
    pub numerator_kpi_id: Option<String>,

    #[serde(default)]
    #[schemars(description = "Denominator KPI id. Only meaningful for Percentage-type KPIs.")]
    pub denominator_kpi_id: Option<String>,
}

/// Everything the engine needs for one brand/category/month, assembled by the
/// backend and rebuilt whenever the brand, category, year or month selection
/// changes. The engine holds no state of its own across calls.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct BrandData {
    #[schemars(description = "Brand this snapshot belongs to.")]
    pub brand: String,

    #[schemars(description = "Dashboard category this snapshot covers.")]
    pub category: String,

    #[schemars(description = "Calendar year of the selected month.")]
    pub year: i32,

    #[schemars(description = "Selected month (1 = January, 12 = December).")]
    pub month: u32,

    #[schemars(description = "The KPI set visible for this brand and category.")]
    pub kpis: Vec<Kpi>,

    #[serde(default)]
    #[schemars(
        description = "Entered raw numbers: KPI id -> day of month -> value. A missing entry means 'no data entered'."
    )]
    pub values: BTreeMap<String, BTreeMap<u32, f64>>,

    #[serde(default)]
    #[schemars(
        description = "Single monthly number per KPI id, used only when the KPI is marked only-cumulative."
    )]
    pub cumulative_overrides: BTreeMap<String, f64>,

    #[serde(default)]
    #[schemars(description = "Monthly target per KPI id, overriding the KPI's static target.")]
    pub monthly_targets: BTreeMap<String, f64>,

    #[serde(default)]
    #[schemars(
        description = "For Cumulative-type KPIs: ordered list of source KPI ids whose daily values sum into it."
    )]
    pub cumulative_sources: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    #[schemars(
        description = "Raw formula string per KPI id, used for both Formula and Target calculation types."
    )]
    pub formula_expressions: BTreeMap<String, String>,

    #[serde(default)]
    #[schemars(description = "Resolved unit string per KPI id, overriding the KPI's own unit field.")]
    pub unit_by_kpi_id: BTreeMap<String, String>,
}

impl BrandData {
    pub fn kpi(&self, id: &str) -> Option<&Kpi> {
        self.kpis.iter().find(|k| k.id == id)
    }

    /// The unit actually shown for a KPI: the per-id override when present,
    /// otherwise the KPI's own unit field.
    pub fn unit_for<'a>(&'a self, kpi: &'a Kpi) -> &'a str {
        self.unit_by_kpi_id
            .get(&kpi.id)
            .map(String::as_str)
            .unwrap_or(&kpi.unit)
    }

    /// Number of days in the selected month, or 0 if year/month are invalid.
    pub fn days_in_month(&self) -> u32 {
        days_in_month(self.year, self.month)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(BrandData)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    match (
        NaiveDate::from_ymd_opt(next_year, next_month, 1),
        NaiveDate::from_ymd_opt(year, month, 1),
    ) {
        (Some(next), Some(first)) => (next - first).num_days() as u32,
        _ => 0,
    }
}

/// Whether a unit string selects percentage semantics ('%' or 'yüzde').
pub fn is_percent_unit(unit: &str) -> bool {
    let trimmed = unit.trim();
    trimmed == "%" || trimmed.to_lowercase() == "yüzde"
}

/// Whether a unit string selects currency semantics ('TL' or '₺').
pub fn is_currency_unit(unit: &str) -> bool {
    let trimmed = unit.trim();
    trimmed == "₺" || trimmed.eq_ignore_ascii_case("TL")
}
