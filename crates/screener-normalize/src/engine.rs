//! Normalization of raw facts into canonical reports.

use screener_core::{CanonicalFinancialReport, Period, RawFinancialReport, RawReportStore, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::rules::{MappingRules, TagGroup, VariablePeriodFields};

/// Maps raw reports onto canonical fields.
///
/// Cumulative tags are first converted to per-quarter values using the prior
/// quarter's raw report, then each canonical field takes the first candidate
/// group whose tags are all present.
pub struct NormalizationEngine {
    rules: MappingRules,
    variable_period: VariablePeriodFields,
    raw_reports: Arc<dyn RawReportStore>,
}

impl std::fmt::Debug for NormalizationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalizationEngine")
            .field("rules", &self.rules)
            .field("variable_period", &self.variable_period)
            .finish_non_exhaustive()
    }
}

impl NormalizationEngine {
    /// Create an engine with the basic rule set reading prior quarters from `raw_reports`.
    #[must_use]
    pub fn new(raw_reports: Arc<dyn RawReportStore>) -> Self {
        Self {
            rules: MappingRules::basic(),
            variable_period: VariablePeriodFields::basic(),
            raw_reports,
        }
    }

    /// Replace the mapping rules.
    #[must_use]
    pub fn with_rules(mut self, rules: MappingRules) -> Self {
        self.rules = rules;
        self
    }

    /// Replace the set of cumulative tags.
    #[must_use]
    pub fn with_variable_period_fields(mut self, fields: VariablePeriodFields) -> Self {
        self.variable_period = fields;
        self
    }

    /// Returns the mapping rules.
    #[must_use]
    pub const fn rules(&self) -> &MappingRules {
        &self.rules
    }

    /// Normalizes a raw report. The result may be invalid; call
    /// [`CanonicalFinancialReport::validate`] to find out which fields are missing.
    ///
    /// # Errors
    /// Returns an error if the report's period is out of range or the prior
    /// quarter cannot be read from the store.
    #[instrument(skip(self, raw), fields(cik = raw.cik, year = raw.year, quarter = raw.quarter))]
    pub async fn normalize(&self, raw: &RawFinancialReport) -> Result<CanonicalFinancialReport> {
        let period = raw.period()?;
        let facts = self.corrected_facts(raw, period).await?;
        Ok(apply_rules(&self.rules, &facts, raw.cik, period))
    }

    /// Returns the raw facts with cumulative tags converted to quarterly values.
    ///
    /// First quarters are left unmodified. For later quarters a cumulative tag
    /// without a prior-quarter value is dropped.
    async fn corrected_facts(
        &self,
        raw: &RawFinancialReport,
        period: Period,
    ) -> Result<HashMap<String, i64>> {
        let mut facts = raw.raw_fields.clone();
        if period.is_first_quarter() {
            return Ok(facts);
        }

        let present: Vec<&str> = self
            .variable_period
            .iter()
            .filter(|tag| facts.contains_key(*tag))
            .collect();
        if present.is_empty() {
            return Ok(facts);
        }

        let previous = period.previous();
        let prior = self.raw_reports.get_raw_report(raw.cik, previous).await?;

        for tag in present {
            match prior.as_ref().and_then(|report| report.get(tag)) {
                Some(prior_value) => {
                    if let Some(value) = facts.get_mut(tag) {
                        *value = value.saturating_sub(prior_value);
                    }
                }
                None => {
                    debug!(tag, previous = %previous, "No prior quarter value, dropping");
                    facts.remove(tag);
                }
            }
        }

        Ok(facts)
    }
}

/// Assigns each canonical field from the first available candidate group.
#[must_use]
pub fn apply_rules(
    rules: &MappingRules,
    facts: &HashMap<String, i64>,
    cik: i64,
    period: Period,
) -> CanonicalFinancialReport {
    let mut report = CanonicalFinancialReport::new(cik, period);
    for rule in rules.iter() {
        if let Some(value) = rule.groups.iter().find_map(|group| group_value(group, facts)) {
            report.set(rule.field, value);
        }
    }
    report
}

/// Sum of the group's tags, or `None` if any tag is missing.
fn group_value(group: &TagGroup, facts: &HashMap<String, i64>) -> Option<i64> {
    group
        .iter()
        .try_fold(0i64, |sum, tag| facts.get(tag).map(|v| sum.saturating_add(*v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use screener_core::CanonicalField;
    use screener_store::InMemoryStore;

    const OPERATING_CASH: &str = "NetCashProvidedByUsedInOperatingActivities";
    const CAPEX: &str = "PaymentsToAcquirePropertyPlantAndEquipment";

    fn full_report(cik: i64, period: Period) -> RawFinancialReport {
        RawFinancialReport::new(cik, period)
            .with_field("Revenues", 1_000)
            .with_field("CostsAndExpenses", 800)
            .with_field("NetIncomeLoss", 150)
            .with_field("AssetsCurrent", 400)
            .with_field("Assets", 2_000)
            .with_field("LiabilitiesCurrent", 100)
            .with_field("Liabilities", 500)
            .with_field(OPERATING_CASH, 300)
            .with_field(CAPEX, 90)
    }

    fn engine(store: Arc<InMemoryStore>) -> NormalizationEngine {
        NormalizationEngine::new(store)
    }

    #[tokio::test]
    async fn test_liabilities_triple_takes_priority() {
        let period = Period::new(2020, 1).unwrap();
        let raw = RawFinancialReport::new(1, period)
            .with_field("Liabilities", 500)
            .with_field("LiabilitiesCurrent", 100)
            .with_field("DeferredTaxLiabilitiesNoncurrent", 50)
            .with_field("LongTermDebtNoncurrent", 200);

        let report = engine(Arc::new(InMemoryStore::new()))
            .normalize(&raw)
            .await
            .unwrap();
        assert_eq!(report.total_liabilities, 350);
        assert_eq!(report.current_liabilities, 100);
    }

    #[tokio::test]
    async fn test_partial_group_falls_back() {
        let period = Period::new(2020, 1).unwrap();
        let raw = RawFinancialReport::new(1, period)
            .with_field("Liabilities", 500)
            .with_field("LiabilitiesCurrent", 100)
            .with_field("LongTermDebtNoncurrent", 200);

        let report = engine(Arc::new(InMemoryStore::new()))
            .normalize(&raw)
            .await
            .unwrap();
        assert_eq!(report.total_liabilities, 500);
    }

    #[rstest]
    #[case(&[("SalesRevenueNet", 7)], 7)]
    #[case(&[("Revenues", 5), ("SalesRevenueNet", 7)], 5)]
    #[case(&[], 0)]
    fn test_revenue_fallback(#[case] fields: &[(&str, i64)], #[case] expected: i64) {
        let facts: HashMap<String, i64> =
            fields.iter().map(|(k, v)| ((*k).to_string(), *v)).collect();
        let report = apply_rules(
            &MappingRules::basic(),
            &facts,
            1,
            Period::new(2020, 2).unwrap(),
        );
        assert_eq!(report.get(CanonicalField::Revenue), expected);
    }

    #[tokio::test]
    async fn test_first_quarter_keeps_cumulative_values() {
        let store = Arc::new(InMemoryStore::new());
        let q4 = Period::new(2019, 4).unwrap();
        store
            .put_raw_report(&full_report(1, q4).with_field(OPERATING_CASH, 1_000))
            .await
            .unwrap();

        let q1 = Period::new(2020, 1).unwrap();
        let report = engine(store).normalize(&full_report(1, q1)).await.unwrap();
        assert_eq!(report.operating_cash, 300);
        assert_eq!(report.capital_expenditures, 90);
        assert!(report.is_valid());
    }

    #[tokio::test]
    async fn test_later_quarter_subtracts_prior() {
        let store = Arc::new(InMemoryStore::new());
        let q2 = Period::new(2020, 2).unwrap();
        store
            .put_raw_report(
                &full_report(1, q2)
                    .with_field(OPERATING_CASH, 120)
                    .with_field(CAPEX, 40),
            )
            .await
            .unwrap();

        let q3 = Period::new(2020, 3).unwrap();
        let report = engine(store).normalize(&full_report(1, q3)).await.unwrap();
        assert_eq!(report.operating_cash, 180);
        assert_eq!(report.capital_expenditures, 50);
        assert_eq!(report.revenue, 1_000);
    }

    #[tokio::test]
    async fn test_missing_prior_drops_cumulative_fields() {
        let store = Arc::new(InMemoryStore::new());
        let q2 = Period::new(2020, 2).unwrap();
        let report = engine(store).normalize(&full_report(1, q2)).await.unwrap();

        assert_eq!(report.operating_cash, 0);
        assert_eq!(report.capital_expenditures, 0);
        assert_eq!(
            report.validate().unwrap_err().to_string(),
            "OperatingCash,CapitalExpenditures,"
        );
    }

    #[tokio::test]
    async fn test_prior_without_tag_drops_only_that_tag() {
        let store = Arc::new(InMemoryStore::new());
        let q1 = Period::new(2020, 1).unwrap();
        store
            .put_raw_report(&RawFinancialReport::new(1, q1).with_field(OPERATING_CASH, 100))
            .await
            .unwrap();

        let q2 = Period::new(2020, 2).unwrap();
        let report = engine(store).normalize(&full_report(1, q2)).await.unwrap();
        assert_eq!(report.operating_cash, 200);
        assert_eq!(report.capital_expenditures, 0);
        assert_eq!(
            report.validate().unwrap_err().to_string(),
            "CapitalExpenditures,"
        );
    }

    #[tokio::test]
    async fn test_equal_cumulative_values_leave_field_unset() {
        let store = Arc::new(InMemoryStore::new());
        let q1 = Period::new(2021, 1).unwrap();
        store.put_raw_report(&full_report(7, q1)).await.unwrap();

        let q2 = Period::new(2021, 2).unwrap();
        let report = engine(store).normalize(&full_report(7, q2)).await.unwrap();
        assert_eq!(report.operating_cash, 0);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_group_sum_saturates() {
        let facts: HashMap<String, i64> = [
            ("LiabilitiesCurrent".to_string(), i64::MAX),
            ("DeferredTaxLiabilitiesNoncurrent".to_string(), 1),
            ("LongTermDebtNoncurrent".to_string(), 1),
        ]
        .into_iter()
        .collect();
        let report = apply_rules(
            &MappingRules::basic(),
            &facts,
            1,
            Period::new(2020, 1).unwrap(),
        );
        assert_eq!(report.total_liabilities, i64::MAX);
    }
}
