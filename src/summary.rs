use crate::engine::{ComputedValue, ComputedValues};
use crate::schema::BrandData;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRow {
    pub kpi_id: String,
    pub name: String,
    pub unit: String,
    pub daily: Option<f64>,
    pub cumulative: f64,
    pub target_value: Option<f64>,
    /// Month-to-date value as a share of the target, in percent.
    pub attainment: Option<f64>,
}

/// A renderable snapshot of one brand's computed dashboard for report
/// export, grouped by category in KPI-set order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub brand: String,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub categories: BTreeMap<String, Vec<SummaryRow>>,
}

impl DashboardSummary {
    pub fn from_computed(data: &BrandData, values: &ComputedValues, day: u32) -> Self {
        let mut categories: BTreeMap<String, Vec<SummaryRow>> = BTreeMap::new();

        for kpi in &data.kpis {
            let computed = match values.get(&kpi.id) {
                Some(computed) => computed,
                None => continue,
            };

            categories
                .entry(kpi.category.clone())
                .or_default()
                .push(SummaryRow {
                    kpi_id: kpi.id.clone(),
                    name: kpi.name.clone(),
                    unit: computed.unit.clone(),
                    daily: computed.daily,
                    cumulative: computed.cumulative,
                    target_value: computed.target_value,
                    attainment: attainment(computed),
                });
        }

        Self {
            brand: data.brand.clone(),
            year: data.year,
            month: data.month,
            day,
            categories,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str("Category,KPI,Unit,Daily,Cumulative,Target,Attainment %\n");

        for (category, rows) in &self.categories {
            for row in rows {
                output.push_str(&format!(
                    "{},{},{},{},{:.2},{},{}\n",
                    category,
                    row.name,
                    row.unit,
                    format_optional(row.daily),
                    row.cumulative,
                    format_optional(row.target_value),
                    format_optional(row.attainment),
                ));
            }
        }

        output
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "# KPI Report - {} ({}-{:02}, day {})\n\n",
            self.brand, self.year, self.month, self.day
        ));

        for (category, rows) in &self.categories {
            output.push_str(&format!("## {}\n\n", category));
            output.push_str("| KPI | Unit | Daily | Cumulative | Target | Attainment % |\n");
            output.push_str("|---|---|---|---|---|---|\n");

            for row in rows {
                output.push_str(&format!(
                    "| {} | {} | {} | {:.2} | {} | {} |\n",
                    row.name,
                    row.unit,
                    format_optional(row.daily),
                    row.cumulative,
                    format_optional(row.target_value),
                    format_optional(row.attainment),
                ));
            }
            output.push('\n');
        }

        output
    }

    pub fn total_rows(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }
}

fn attainment(computed: &ComputedValue) -> Option<f64> {
    let target = computed.target_value?;
    if target == 0.0 {
        return None;
    }
    Some(computed.cumulative / target * 100.0)
}

fn format_optional(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}
