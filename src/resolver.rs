//! Shared value lookups used while evaluating one KPI's formula against
//! another KPI's data.
//!
//! These lookups never evaluate a referenced KPI's own formula, percentage
//! or target logic; a referenced Formula-type KPI with no raw entry simply
//! contributes zero. Only the engine evaluates the formula of the KPI it is
//! directly computing.

use crate::schema::{BrandData, CalculationType};

/// The raw entered number for a KPI on a given day, if the user entered one.
pub fn raw_entry(data: &BrandData, kpi_id: &str, day: u32) -> Option<f64> {
    data.values.get(kpi_id)?.get(&day).copied()
}

/// A KPI's value for a single day.
///
/// The raw entry wins when present. Otherwise Cumulative-type KPIs sum
/// their sources' raw entries for that day; every other type yields 0.
pub fn day_value(data: &BrandData, kpi_id: &str, day: u32) -> f64 {
    if let Some(entered) = raw_entry(data, kpi_id, day) {
        return entered;
    }

    match data.kpi(kpi_id).map(|k| k.calculation_type) {
        Some(CalculationType::Cumulative) => source_day_sum(data, kpi_id, day),
        _ => 0.0,
    }
}

/// A KPI's month-to-date value through the given day.
///
/// Only-cumulative KPIs return their stored monthly override (or 0).
/// Cumulative-type KPIs sum their sources' day values across days 1..=day.
/// Everything else sums its own raw entries.
pub fn cumulative_value(data: &BrandData, kpi_id: &str, day: u32) -> f64 {
    let kpi = match data.kpi(kpi_id) {
        Some(kpi) => kpi,
        None => return 0.0,
    };

    if kpi.only_cumulative {
        return data.cumulative_overrides.get(kpi_id).copied().unwrap_or(0.0);
    }

    match kpi.calculation_type {
        CalculationType::Cumulative => (1..=day)
            .map(|d| {
                data.cumulative_sources
                    .get(kpi_id)
                    .map(|sources| {
                        sources
                            .iter()
                            .map(|source| day_value(data, source, d))
                            .sum::<f64>()
                    })
                    .unwrap_or(0.0)
            })
            .sum(),
        _ => (1..=day)
            .map(|d| raw_entry(data, kpi_id, d).unwrap_or(0.0))
            .sum(),
    }
}

fn source_day_sum(data: &BrandData, kpi_id: &str, day: u32) -> f64 {
    data.cumulative_sources
        .get(kpi_id)
        .map(|sources| {
            sources
                .iter()
                .map(|source| raw_entry(data, source, day).unwrap_or(0.0))
                .sum()
        })
        .unwrap_or(0.0)
}
