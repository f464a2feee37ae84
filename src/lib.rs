//! # Dealer KPI Engine
//!
//! A library for computing the values a dealership reporting dashboard
//! displays: for every KPI in a brand's KPI set, a daily value, a
//! month-to-date cumulative value, and a target for the selected day.
//!
//! ## Core Concepts
//!
//! - **BrandData**: one brand/category/month snapshot of KPIs, entered
//!   values, targets, overrides and formula wiring, assembled by the backend
//! - **Calculation types**: direct, cumulative, formula, percentage, target
//!   strategies, plus an only-cumulative override mode
//! - **Formulas**: arithmetic expressions that reference other KPIs by id or
//!   display name via `{{token}}` or `[token]`
//! - **Degrade, never fail**: missing or malformed data becomes 0/absent so
//!   the dashboard always renders something
//!
//! ## Example
//!
//! ```rust,ignore
//! use dealer_kpi_engine::*;
//!
//! let data = BrandData {
//!     brand: "Aurora Motors".to_string(),
//!     category: "Sales".to_string(),
//!     year: 2024,
//!     month: 5,
//!     kpis: vec![/* the brand's KPI set */],
//!     ..Default::default()
//! };
//!
//! let values = compute_dashboard_values(&data, 15).unwrap();
//! let units = &values["sales_units"];
//! println!("{:?} MTD {}", units.daily, units.cumulative);
//! ```

pub mod adjustments;
pub mod assemble;
pub mod engine;
pub mod error;
pub mod expr;
pub mod formula;
pub mod resolver;
pub mod schema;
pub mod summary;

pub use adjustments::{DashboardAdjustments, KpiModification};
pub use assemble::{assemble_brand_data, AssemblyContext, MetricRow};
pub use engine::{compute_brand_values, ComputedValue, ComputedValues, KpiCalculator};
pub use error::{KpiEngineError, Result};
pub use expr::evaluate;
pub use formula::{parse as parse_formula, resolve_reference, Segment};
pub use schema::{
    days_in_month, is_currency_unit, is_percent_unit, BrandData, CalculationType, Kpi,
};
pub use summary::{DashboardSummary, SummaryRow};

use log::{debug, info};
use std::collections::BTreeSet;

pub struct KpiDashboardProcessor;

impl KpiDashboardProcessor {
    /// Validates the snapshot and computes the full value map for the
    /// selected day-of-month.
    ///
    /// Validation covers the things a correct assembler never produces
    /// (month out of range, day outside the month, duplicate KPI ids);
    /// everything data-shaped degrades inside the engine instead.
    pub fn process(data: &BrandData, day: u32) -> Result<ComputedValues> {
        validate_brand_data(data, day)?;

        info!(
            "Computing dashboard values for brand '{}' category '{}' ({}-{:02}, day {})",
            data.brand, data.category, data.year, data.month, day
        );
        debug!(
            "Snapshot contains {} KPIs, {} value series, {} monthly targets",
            data.kpis.len(),
            data.values.len(),
            data.monthly_targets.len()
        );

        Ok(compute_brand_values(data, day))
    }
}

/// Convenience wrapper around [`KpiDashboardProcessor::process`].
pub fn compute_dashboard_values(data: &BrandData, day: u32) -> Result<ComputedValues> {
    KpiDashboardProcessor::process(data, day)
}

fn validate_brand_data(data: &BrandData, day: u32) -> Result<()> {
    if !(1..=12).contains(&data.month) {
        return Err(KpiEngineError::InvalidMonth(data.month));
    }

    if day == 0 || day > data.days_in_month() {
        return Err(KpiEngineError::InvalidDay(day));
    }

    let mut seen = BTreeSet::new();
    for kpi in &data.kpis {
        if !seen.insert(kpi.id.as_str()) {
            return Err(KpiEngineError::DuplicateKpiId(kpi.id.clone()));
        }
    }

    for kpi in &data.kpis {
        if kpi.calculation_type == CalculationType::Percentage
            && kpi.numerator_kpi_id.is_none()
            && kpi.denominator_kpi_id.is_none()
        {
            return Err(KpiEngineError::ValidationError {
                kpi: kpi.id.clone(),
                details: "Percentage KPI has neither numerator nor denominator configured"
                    .to_string(),
            });
        }
    }

    Ok(())
}
