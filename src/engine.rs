use crate::expr::{self, Token};
use crate::formula::{self, Segment};
use crate::resolver;
use crate::schema::{is_currency_unit, is_percent_unit, BrandData, CalculationType, Kpi};
use serde::Serialize;
use std::collections::BTreeMap;

/// Computed dashboard values for one KPI on the selected day.
///
/// `cumulative` is always a finite number (0 when no data exists); `daily`
/// and `target_value` carry an explicit absent marker so the presentation
/// layer can show "no data" / "no target defined" states.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputedValue {
    pub daily: Option<f64>,
    pub cumulative: f64,
    pub target_value: Option<f64>,
    pub unit: String,
    pub is_percent: bool,
    pub is_tl: bool,
    pub calculation_type: CalculationType,
    pub only_cumulative: bool,
}

pub type ComputedValues = BTreeMap<String, ComputedValue>;

pub struct KpiCalculator<'a> {
    data: &'a BrandData,
}

impl<'a> KpiCalculator<'a> {
    pub fn new(data: &'a BrandData) -> Self {
        Self { data }
    }

    pub fn compute(&self, kpi: &Kpi, day: u32) -> ComputedValue {
        let unit = self.data.unit_for(kpi).to_string();
        let is_percent = is_percent_unit(&unit);
        let is_tl = is_currency_unit(&unit);

        let (daily, cumulative) = if kpi.only_cumulative {
            // No daily breakdown; the month value is the stored override.
            (None, resolver::cumulative_value(self.data, &kpi.id, day))
        } else {
            match kpi.calculation_type {
                CalculationType::Direct => (
                    resolver::raw_entry(self.data, &kpi.id, day),
                    resolver::cumulative_value(self.data, &kpi.id, day),
                ),
                CalculationType::Cumulative => (
                    Some(resolver::day_value(self.data, &kpi.id, day)),
                    resolver::cumulative_value(self.data, &kpi.id, day),
                ),
                CalculationType::Formula => self.compute_formula(kpi, day),
                CalculationType::Percentage => self.compute_percentage(kpi, day, is_percent),
                CalculationType::Target => (None, self.compute_target_cumulative(kpi, day)),
            }
        };

        ComputedValue {
            daily,
            cumulative,
            target_value: self.target_value(kpi),
            unit,
            is_percent,
            is_tl,
            calculation_type: kpi.calculation_type,
            only_cumulative: kpi.only_cumulative,
        }
    }

    /// Formula KPIs: the expression is evaluated per day with references
    /// substituted by that day's values; the month-to-date value is the sum
    /// of the per-day evaluations, counting failed days as 0.
    fn compute_formula(&self, kpi: &Kpi, day: u32) -> (Option<f64>, f64) {
        let expression = match self.data.formula_expressions.get(&kpi.id) {
            Some(expression) => expression,
            None => return (None, 0.0),
        };

        let segments = formula::parse(expression);
        let daily = self.evaluate_segments(&segments, |id| resolver::day_value(self.data, id, day));
        let cumulative = (1..=day)
            .map(|d| {
                self.evaluate_segments(&segments, |id| resolver::day_value(self.data, id, d))
                    .unwrap_or(0.0)
            })
            .sum();

        (daily, cumulative)
    }

    /// Target KPIs: no daily value; the expression is evaluated once with
    /// references substituted by month-to-date values through the day.
    fn compute_target_cumulative(&self, kpi: &Kpi, day: u32) -> f64 {
        let expression = match self.data.formula_expressions.get(&kpi.id) {
            Some(expression) => expression,
            None => return 0.0,
        };

        let segments = formula::parse(expression);
        self.evaluate_segments(&segments, |id| resolver::cumulative_value(self.data, id, day))
            .unwrap_or(0.0)
    }

    fn compute_percentage(&self, kpi: &Kpi, day: u32, is_percent: bool) -> (Option<f64>, f64) {
        let daily = self.ratio(
            kpi,
            is_percent,
            |id| resolver::day_value(self.data, id, day),
        );
        let cumulative = self.ratio(
            kpi,
            is_percent,
            |id| resolver::cumulative_value(self.data, id, day),
        );
        (Some(daily), cumulative)
    }

    fn ratio<F>(&self, kpi: &Kpi, is_percent: bool, lookup: F) -> f64
    where
        F: Fn(&str) -> f64,
    {
        let numerator = kpi
            .numerator_kpi_id
            .as_deref()
            .map(&lookup)
            .unwrap_or(0.0);
        let denominator = kpi
            .denominator_kpi_id
            .as_deref()
            .map(&lookup)
            .unwrap_or(0.0);

        if denominator == 0.0 {
            return 0.0;
        }

        let ratio = numerator / denominator;
        if is_percent {
            ratio * 100.0
        } else {
            ratio
        }
    }

    /// Builds a token stream from the parsed segments, substituting each
    /// reference with a number token from the lookup. Unresolvable
    /// references contribute zero; malformed literal text fails the whole
    /// evaluation for that day.
    fn evaluate_segments<F>(&self, segments: &[Segment], lookup: F) -> Option<f64>
    where
        F: Fn(&str) -> f64,
    {
        let mut tokens: Vec<Token> = Vec::new();

        for segment in segments {
            match segment {
                Segment::Literal(text) => tokens.extend(expr::tokenize(text)?),
                Segment::Reference(token) => {
                    let value = formula::resolve_reference(token, &self.data.kpis)
                        .map(&lookup)
                        .unwrap_or(0.0);
                    tokens.push(Token::Number(value));
                }
            }
        }

        expr::evaluate_tokens(&tokens)
    }

    /// Monthly target override first; Target-type KPIs fall back to their
    /// static target; every other type has no target without an override.
    fn target_value(&self, kpi: &Kpi) -> Option<f64> {
        if let Some(&target) = self.data.monthly_targets.get(&kpi.id) {
            return Some(target);
        }

        match kpi.calculation_type {
            CalculationType::Target => kpi.static_target,
            _ => None,
        }
    }
}

/// Computes a fresh value map for every KPI in the brand's KPI set.
///
/// Infallible: missing or malformed data degrades to 0/absent per field.
/// The result is deterministic for identical inputs; nothing is cached
/// between calls.
pub fn compute_brand_values(data: &BrandData, day: u32) -> ComputedValues {
    let calculator = KpiCalculator::new(data);

    data.kpis
        .iter()
        .map(|kpi| (kpi.id.clone(), calculator.compute(kpi, day)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kpi(id: &str, name: &str, calculation_type: CalculationType) -> Kpi {
        Kpi {
            id: id.to_string(),
            name: name.to_string(),
            category: "Sales".to_string(),
            unit: "adet".to_string(),
            calculation_type,
            static_target: None,
            only_cumulative: false,
            numerator_kpi_id: None,
            denominator_kpi_id: None,
        }
    }

    fn set_entries(data: &mut BrandData, id: &str, entries: &[(u32, f64)]) {
        let map = data.values.entry(id.to_string()).or_default();
        for (day, value) in entries {
            map.insert(*day, *value);
        }
    }

    fn base_data() -> BrandData {
        BrandData {
            brand: "Aurora Motors".to_string(),
            category: "Sales".to_string(),
            year: 2024,
            month: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_direct_kpi() {
        let mut data = base_data();
        data.kpis.push(kpi("units", "Units Sold", CalculationType::Direct));
        set_entries(&mut data, "units", &[(1, 2.0), (2, 3.0), (4, 5.0)]);

        let values = compute_brand_values(&data, 4);
        let units = &values["units"];
        assert_eq!(units.daily, Some(5.0));
        assert_eq!(units.cumulative, 10.0);
        assert_eq!(units.target_value, None);

        // Day without an entry: daily absent, cumulative keeps its running total.
        let values = compute_brand_values(&data, 3);
        let units = &values["units"];
        assert_eq!(units.daily, None);
        assert_eq!(units.cumulative, 5.0);
    }

    #[test]
    fn test_cumulative_kpi() {
        let mut data = base_data();
        data.kpis
            .push(kpi("total", "Total Deliveries", CalculationType::Cumulative));
        data.kpis.push(kpi("s1", "Retail", CalculationType::Direct));
        data.kpis.push(kpi("s2", "Fleet", CalculationType::Direct));
        data.cumulative_sources.insert(
            "total".to_string(),
            vec!["s1".to_string(), "s2".to_string()],
        );
        set_entries(&mut data, "s1", &[(1, 1.0), (2, 2.0)]);
        set_entries(&mut data, "s2", &[(1, 10.0), (2, 20.0)]);

        let values = compute_brand_values(&data, 2);
        let total = &values["total"];
        assert_eq!(total.daily, Some(22.0));
        assert_eq!(total.cumulative, 33.0);
    }

    #[test]
    fn test_formula_kpi_reference_substitution() {
        let mut data = base_data();
        data.kpis.push(kpi("A", "Alpha", CalculationType::Direct));
        data.kpis.push(kpi("B", "Beta", CalculationType::Direct));
        data.kpis.push(kpi("sum", "Alpha Plus Beta", CalculationType::Formula));
        data.formula_expressions
            .insert("sum".to_string(), "{{A}}+{{B}}".to_string());
        set_entries(&mut data, "A", &[(5, 3.0)]);
        set_entries(&mut data, "B", &[(5, 4.0)]);

        let values = compute_brand_values(&data, 5);
        let sum = &values["sum"];
        assert_eq!(sum.daily, Some(7.0));
        // Days 1-4 evaluate to 0+0; day 5 contributes 7.
        assert_eq!(sum.cumulative, 7.0);
    }

    #[test]
    fn test_formula_kpi_negative_reference_value() {
        let mut data = base_data();
        data.kpis.push(kpi("adj", "Adjustment", CalculationType::Direct));
        data.kpis.push(kpi("net", "Net", CalculationType::Formula));
        data.formula_expressions
            .insert("net".to_string(), "{{adj}}+10".to_string());
        set_entries(&mut data, "adj", &[(1, -4.0)]);

        let values = compute_brand_values(&data, 1);
        assert_eq!(values["net"].daily, Some(6.0));
    }

    #[test]
    fn test_formula_kpi_missing_expression() {
        let mut data = base_data();
        data.kpis.push(kpi("f", "Orphan", CalculationType::Formula));

        let values = compute_brand_values(&data, 10);
        assert_eq!(values["f"].daily, None);
        assert_eq!(values["f"].cumulative, 0.0);
    }

    #[test]
    fn test_formula_kpi_malformed_expression() {
        let mut data = base_data();
        data.kpis.push(kpi("f", "Broken", CalculationType::Formula));
        data.formula_expressions
            .insert("f".to_string(), "{{nope}}+".to_string());

        let values = compute_brand_values(&data, 3);
        assert_eq!(values["f"].daily, None);
        assert_eq!(values["f"].cumulative, 0.0);
    }

    #[test]
    fn test_formula_unresolved_reference_is_zero() {
        let mut data = base_data();
        data.kpis.push(kpi("f", "Partial", CalculationType::Formula));
        data.formula_expressions
            .insert("f".to_string(), "{{ghost}}+5".to_string());

        let values = compute_brand_values(&data, 1);
        assert_eq!(values["f"].daily, Some(5.0));
    }

    #[test]
    fn test_percentage_kpi() {
        let mut data = base_data();
        data.kpis.push(kpi("won", "Deals Won", CalculationType::Direct));
        data.kpis.push(kpi("leads", "Leads", CalculationType::Direct));
        let mut rate = kpi("close_rate", "Close Rate", CalculationType::Percentage);
        rate.unit = "%".to_string();
        rate.numerator_kpi_id = Some("won".to_string());
        rate.denominator_kpi_id = Some("leads".to_string());
        data.kpis.push(rate);
        set_entries(&mut data, "won", &[(1, 2.0), (2, 3.0)]);
        set_entries(&mut data, "leads", &[(1, 10.0), (2, 10.0)]);

        let values = compute_brand_values(&data, 2);
        let rate = &values["close_rate"];
        assert!(rate.is_percent);
        assert_eq!(rate.daily, Some(30.0));
        assert_eq!(rate.cumulative, 25.0);
    }

    #[test]
    fn test_percentage_kpi_raw_ratio_without_percent_unit() {
        let mut data = base_data();
        data.kpis.push(kpi("won", "Deals Won", CalculationType::Direct));
        data.kpis.push(kpi("leads", "Leads", CalculationType::Direct));
        let mut rate = kpi("ratio", "Win Ratio", CalculationType::Percentage);
        rate.unit = "oran".to_string();
        rate.numerator_kpi_id = Some("won".to_string());
        rate.denominator_kpi_id = Some("leads".to_string());
        data.kpis.push(rate);
        set_entries(&mut data, "won", &[(1, 2.0)]);
        set_entries(&mut data, "leads", &[(1, 8.0)]);

        let values = compute_brand_values(&data, 1);
        assert_eq!(values["ratio"].daily, Some(0.25));
    }

    #[test]
    fn test_percentage_kpi_zero_denominator() {
        let mut data = base_data();
        data.kpis.push(kpi("won", "Deals Won", CalculationType::Direct));
        data.kpis.push(kpi("leads", "Leads", CalculationType::Direct));
        let mut rate = kpi("close_rate", "Close Rate", CalculationType::Percentage);
        rate.unit = "%".to_string();
        rate.numerator_kpi_id = Some("won".to_string());
        rate.denominator_kpi_id = Some("leads".to_string());
        data.kpis.push(rate);
        set_entries(&mut data, "won", &[(1, 2.0)]);

        let values = compute_brand_values(&data, 1);
        let rate = &values["close_rate"];
        assert_eq!(rate.daily, Some(0.0));
        assert_eq!(rate.cumulative, 0.0);
        assert!(rate.cumulative.is_finite());
    }

    #[test]
    fn test_target_kpi_uses_cumulative_substitution() {
        let mut data = base_data();
        data.kpis.push(kpi("units", "Units Sold", CalculationType::Direct));
        let mut goal = kpi("goal", "Sales Goal", CalculationType::Target);
        goal.static_target = Some(100.0);
        data.kpis.push(goal);
        data.formula_expressions
            .insert("goal".to_string(), "{{units}}*2".to_string());
        set_entries(&mut data, "units", &[(1, 3.0), (2, 4.0)]);

        let values = compute_brand_values(&data, 2);
        let goal = &values["goal"];
        assert_eq!(goal.daily, None);
        // Month-to-date of units through day 2 is 7, not day 2's 4.
        assert_eq!(goal.cumulative, 14.0);
        assert_eq!(goal.target_value, Some(100.0));
    }

    #[test]
    fn test_target_value_fallback_chain() {
        let mut data = base_data();
        let mut goal = kpi("goal", "Goal", CalculationType::Target);
        goal.static_target = Some(50.0);
        data.kpis.push(goal);
        data.kpis.push(kpi("units", "Units", CalculationType::Direct));
        data.monthly_targets.insert("units".to_string(), 80.0);

        let values = compute_brand_values(&data, 1);
        // Target-type without a monthly override falls back to static target.
        assert_eq!(values["goal"].target_value, Some(50.0));
        // Non-target type with a monthly override uses it.
        assert_eq!(values["units"].target_value, Some(80.0));

        data.monthly_targets.insert("goal".to_string(), 60.0);
        let values = compute_brand_values(&data, 1);
        assert_eq!(values["goal"].target_value, Some(60.0));
    }

    #[test]
    fn test_only_cumulative_overrides_any_type() {
        let mut data = base_data();
        let mut stock = kpi("stock", "Stock Level", CalculationType::Direct);
        stock.only_cumulative = true;
        data.kpis.push(stock);
        data.cumulative_overrides.insert("stock".to_string(), 250.0);
        set_entries(&mut data, "stock", &[(1, 5.0)]);

        for day in [1, 15, 31] {
            let values = compute_brand_values(&data, day);
            let stock = &values["stock"];
            assert_eq!(stock.daily, None);
            assert_eq!(stock.cumulative, 250.0);
        }
    }

    #[test]
    fn test_currency_unit_flag() {
        let mut data = base_data();
        let mut revenue = kpi("revenue", "Revenue", CalculationType::Direct);
        revenue.unit = "TL".to_string();
        data.kpis.push(revenue);

        let values = compute_brand_values(&data, 1);
        assert!(values["revenue"].is_tl);
        assert!(!values["revenue"].is_percent);
    }

    #[test]
    fn test_unit_override_drives_flags() {
        let mut data = base_data();
        data.kpis.push(kpi("m", "Margin", CalculationType::Direct));
        data.unit_by_kpi_id.insert("m".to_string(), "%".to_string());

        let values = compute_brand_values(&data, 1);
        assert_eq!(values["m"].unit, "%");
        assert!(values["m"].is_percent);
    }

    #[test]
    fn test_idempotent_output() {
        let mut data = base_data();
        data.kpis.push(kpi("a", "Alpha", CalculationType::Direct));
        data.kpis.push(kpi("f", "Derived", CalculationType::Formula));
        data.formula_expressions
            .insert("f".to_string(), "{{a}}*3".to_string());
        set_entries(&mut data, "a", &[(1, 1.5), (2, 2.5)]);

        let first = compute_brand_values(&data, 2);
        let second = compute_brand_values(&data, 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_self_referencing_formula_does_not_loop() {
        let mut data = base_data();
        data.kpis.push(kpi("loop", "Loop", CalculationType::Formula));
        data.formula_expressions
            .insert("loop".to_string(), "{{loop}}+1".to_string());

        // The resolver refuses to recurse into formulas, so the self
        // reference reads as 0 and the formula evaluates to 1.
        let values = compute_brand_values(&data, 1);
        assert_eq!(values["loop"].daily, Some(1.0));
    }
}
