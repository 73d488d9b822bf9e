//! Raw tag to canonical field mapping rules.

use screener_core::CanonicalField;
use std::collections::BTreeSet;

/// A set of raw tags that are summed when all of them are present.
pub type TagGroup = Vec<String>;

/// Candidate groups for one canonical field, highest priority first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldMappingRule {
    /// Field the groups populate.
    pub field: CanonicalField,
    /// Candidate groups in priority order.
    pub groups: Vec<TagGroup>,
}

impl FieldMappingRule {
    /// Creates a rule from string slices.
    #[must_use]
    pub fn new(field: CanonicalField, groups: &[&[&str]]) -> Self {
        Self {
            field,
            groups: groups
                .iter()
                .map(|group| group.iter().map(|tag| (*tag).to_string()).collect())
                .collect(),
        }
    }
}

/// The full rule set, one rule per canonical field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappingRules {
    rules: Vec<FieldMappingRule>,
}

impl Default for MappingRules {
    fn default() -> Self {
        Self::basic()
    }
}

impl MappingRules {
    /// Creates a rule set from explicit rules.
    #[must_use]
    pub const fn new(rules: Vec<FieldMappingRule>) -> Self {
        Self { rules }
    }

    /// The US-GAAP rule set used for screening.
    #[must_use]
    pub fn basic() -> Self {
        use CanonicalField::*;

        Self::new(vec![
            FieldMappingRule::new(Revenue, &[&["Revenues"], &["SalesRevenueNet"]]),
            FieldMappingRule::new(
                OperatingExpense,
                &[
                    &["CostsAndExpenses"],
                    &["OperatingExpenses"],
                    &["CostOfGoodsAndServicesSold"],
                ],
            ),
            FieldMappingRule::new(NetIncome, &[&["NetIncomeLoss"]]),
            FieldMappingRule::new(CurrentAssets, &[&["AssetsCurrent"]]),
            FieldMappingRule::new(TotalAssets, &[&["Assets"]]),
            FieldMappingRule::new(CurrentLiabilities, &[&["LiabilitiesCurrent"]]),
            FieldMappingRule::new(
                TotalLiabilities,
                &[
                    &[
                        "LiabilitiesCurrent",
                        "DeferredTaxLiabilitiesNoncurrent",
                        "LongTermDebtNoncurrent",
                    ],
                    &["Liabilities"],
                ],
            ),
            FieldMappingRule::new(
                OperatingCash,
                &[&["NetCashProvidedByUsedInOperatingActivities"]],
            ),
            FieldMappingRule::new(
                CapitalExpenditures,
                &[&["PaymentsToAcquirePropertyPlantAndEquipment"]],
            ),
        ])
    }

    /// Iterates over the rules.
    pub fn iter(&self) -> impl Iterator<Item = &FieldMappingRule> {
        self.rules.iter()
    }

    /// Returns the candidate groups for a field.
    #[must_use]
    pub fn groups_for(&self, field: CanonicalField) -> &[TagGroup] {
        self.rules
            .iter()
            .find(|rule| rule.field == field)
            .map(|rule| rule.groups.as_slice())
            .unwrap_or_default()
    }

    /// Every raw tag referenced by any rule, sorted and deduplicated.
    #[must_use]
    pub fn tags(&self) -> Vec<&str> {
        self.rules
            .iter()
            .flat_map(|rule| rule.groups.iter().flatten())
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Raw tags reported as fiscal-year-to-date cumulative values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariablePeriodFields(BTreeSet<String>);

impl Default for VariablePeriodFields {
    fn default() -> Self {
        Self::basic()
    }
}

impl VariablePeriodFields {
    /// Creates a set from tag names.
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tags.into_iter().map(Into::into).collect())
    }

    /// Cash-flow statement tags.
    #[must_use]
    pub fn basic() -> Self {
        Self::new([
            "NetCashProvidedByUsedInOperatingActivities",
            "PaymentsToAcquirePropertyPlantAndEquipment",
        ])
    }

    /// Returns true if `tag` is cumulative.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    /// Iterates over the tags.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_covers_every_field() {
        let rules = MappingRules::basic();
        for field in CanonicalField::ALL {
            assert!(!rules.groups_for(field).is_empty(), "{field} has no rule");
        }
    }

    #[test]
    fn test_total_liabilities_priority() {
        let rules = MappingRules::basic();
        let groups = rules.groups_for(CanonicalField::TotalLiabilities);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 3);
        assert_eq!(groups[1], vec!["Liabilities".to_string()]);
    }

    #[test]
    fn test_tags_are_deduplicated() {
        let rules = MappingRules::basic();
        let tags = rules.tags();
        assert_eq!(
            tags.iter().filter(|t| **t == "LiabilitiesCurrent").count(),
            1
        );
        assert_eq!(tags.len(), 14);
        assert!(tags.contains(&"CostOfGoodsAndServicesSold"));
    }

    #[test]
    fn test_variable_period_fields() {
        let fields = VariablePeriodFields::basic();
        assert!(fields.contains("NetCashProvidedByUsedInOperatingActivities"));
        assert!(!fields.contains("Revenues"));
        assert_eq!(fields.iter().count(), 2);
    }
}
