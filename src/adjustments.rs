use crate::formula::resolve_reference;
use crate::schema::{BrandData, Kpi};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A batch of admin edits applied to a brand's data snapshot.
///
/// The admin screens send these as a declarative list; applying them never
/// mutates the base snapshot, preserving the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct DashboardAdjustments {
    #[schemars(
        description = "New KPIs to add to the brand's KPI set. Appended before modifications run so they can be targets of subsequent edits."
    )]
    #[serde(default)]
    pub new_kpis: Vec<Kpi>,

    #[schemars(description = "Ordered list of modifications applied after new KPIs are added.")]
    #[serde(default)]
    pub modifications: Vec<KpiModification>,
}

/// A single edit. Targets are matched by KPI id first, then by display name
/// (case-insensitive), the same resolution formulas use.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum KpiModification {
    /// Rename a KPI's display name.
    Rename { target: String, new_name: String },

    /// Remove a KPI and all data attached to it.
    Delete { target: String },

    /// Set or replace the entered value for one day.
    SetEntry { target: String, day: u32, value: f64 },

    /// Remove the entered value for one day.
    ClearEntry { target: String, day: u32 },

    /// Set or replace the monthly target.
    SetMonthlyTarget { target: String, value: f64 },

    /// Set or replace the stored monthly override for an only-cumulative KPI.
    SetCumulativeOverride { target: String, value: f64 },

    /// Set or replace the formula expression.
    SetFormula { target: String, expression: String },

    /// Override the displayed unit.
    SetUnit { target: String, unit: String },

    /// Multiply every entered value by a factor (e.g. -1.0 to flip sign).
    ScaleEntries { target: String, factor: f64 },
}

impl DashboardAdjustments {
    /// Applies the adjustments to a base snapshot, returning a new one.
    pub fn apply(&self, base: &BrandData) -> BrandData {
        let mut data = base.clone();

        data.kpis.extend(self.new_kpis.iter().cloned());

        for modification in &self.modifications {
            apply_single_modification(&mut data, modification);
        }

        data
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(DashboardAdjustments)
    }
}

fn apply_single_modification(data: &mut BrandData, modification: &KpiModification) {
    match modification {
        KpiModification::Rename { target, new_name } => {
            if let Some(id) = resolve_target(data, target) {
                if let Some(kpi) = data.kpis.iter_mut().find(|k| k.id == id) {
                    kpi.name = new_name.clone();
                }
            }
        }

        KpiModification::Delete { target } => {
            if let Some(id) = resolve_target(data, target) {
                data.kpis.retain(|k| k.id != id);
                data.values.remove(&id);
                data.cumulative_overrides.remove(&id);
                data.monthly_targets.remove(&id);
                data.cumulative_sources.remove(&id);
                data.formula_expressions.remove(&id);
                data.unit_by_kpi_id.remove(&id);
            }
        }

        KpiModification::SetEntry { target, day, value } => {
            if let Some(id) = resolve_target(data, target) {
                data.values.entry(id).or_default().insert(*day, *value);
            }
        }

        KpiModification::ClearEntry { target, day } => {
            if let Some(id) = resolve_target(data, target) {
                if let Some(entries) = data.values.get_mut(&id) {
                    entries.remove(day);
                }
            }
        }

        KpiModification::SetMonthlyTarget { target, value } => {
            if let Some(id) = resolve_target(data, target) {
                data.monthly_targets.insert(id, *value);
            }
        }

        KpiModification::SetCumulativeOverride { target, value } => {
            if let Some(id) = resolve_target(data, target) {
                data.cumulative_overrides.insert(id, *value);
            }
        }

        KpiModification::SetFormula { target, expression } => {
            if let Some(id) = resolve_target(data, target) {
                data.formula_expressions.insert(id, expression.clone());
            }
        }

        KpiModification::SetUnit { target, unit } => {
            if let Some(id) = resolve_target(data, target) {
                data.unit_by_kpi_id.insert(id, unit.clone());
            }
        }

        KpiModification::ScaleEntries { target, factor } => {
            if let Some(id) = resolve_target(data, target) {
                if let Some(entries) = data.values.get_mut(&id) {
                    for value in entries.values_mut() {
                        *value *= factor;
                    }
                }
            }
        }
    }
}

fn resolve_target(data: &BrandData, target: &str) -> Option<String> {
    resolve_reference(target, &data.kpis).map(str::to_string)
}
