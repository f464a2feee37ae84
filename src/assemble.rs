//! Conversion from the backend's flat data-entry rows into a [`BrandData`]
//! snapshot. Fetching and persistence stay on the backend side; this is the
//! pure grouping seam between the two.

use crate::schema::{BrandData, CalculationType, Kpi};
use serde::{Deserialize, Serialize};

/// One per-day data-entry row as delivered by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRow {
    pub kpi_id: String,
    pub day: u32,
    pub value: f64,
}

/// Context describing which brand/category/month a set of rows belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyContext {
    pub brand: String,
    pub category: String,
    pub year: i32,
    pub month: u32,
}

pub fn assemble_brand_data(
    context: AssemblyContext,
    kpis: Vec<Kpi>,
    rows: &[MetricRow],
) -> BrandData {
    let mut data = BrandData {
        brand: context.brand,
        category: context.category,
        year: context.year,
        month: context.month,
        kpis,
        ..Default::default()
    };

    for row in rows {
        data.values
            .entry(row.kpi_id.clone())
            .or_default()
            .insert(row.day, row.value);
    }

    // Every Cumulative-type KPI carries a source list in the snapshot,
    // empty until the backend wires one up.
    for kpi in &data.kpis {
        if kpi.only_cumulative {
            continue;
        }
        if kpi.calculation_type == CalculationType::Cumulative
            && !data.cumulative_sources.contains_key(&kpi.id)
        {
            data.cumulative_sources.insert(kpi.id.clone(), Vec::new());
        }
    }

    data
}
