//! Field filters and preset views over normalized CNV tables

use crate::{CallClass, ExonRecord};
use std::collections::BTreeSet;

/// User filter selection. Empty sets and `None` bounds do not restrict.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub chromosomes: BTreeSet<String>,
    pub calls: BTreeSet<CallClass>,
    pub genes: BTreeSet<String>,
    pub min_depth: Option<f64>,
    pub min_weight: Option<f64>,
    pub min_log2: Option<f64>,
    pub max_het_del_frequency: Option<f64>,
    pub max_hom_del_frequency: Option<f64>,
    pub max_dup_frequency: Option<f64>,
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl FilterCriteria {
    /// Coordinate bounds, only when both are set and exactly one chromosome is selected
    pub fn coordinate_range(&self) -> Option<(u64, u64)> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if self.chromosomes.len() == 1 => Some((start, end)),
            _ => None,
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        *self == FilterCriteria::default()
    }

    pub fn matches(&self, record: &ExonRecord) -> bool {
        if !self.chromosomes.is_empty() && !self.chromosomes.contains(&record.chromosome) {
            return false;
        }
        if !self.calls.is_empty() && !self.calls.contains(&record.call) {
            return false;
        }
        if !self.genes.is_empty() && !self.genes.contains(&record.gene) {
            return false;
        }

        if !at_least(record.depth, self.min_depth)
            || !at_least(record.weight, self.min_weight)
            || !at_least(record.log2, self.min_log2)
        {
            return false;
        }

        if !at_most(record.het_del_frequency, self.max_het_del_frequency)
            || !at_most(record.hom_del_frequency, self.max_hom_del_frequency)
            || !at_most(record.dup_frequency, self.max_dup_frequency)
        {
            return false;
        }

        if let Some((start, end)) = self.coordinate_range() {
            if record.start < start || record.end > end {
                return false;
            }
        }

        true
    }
}

fn at_least(value: f64, bound: Option<f64>) -> bool {
    bound.map_or(true, |bound| value >= bound)
}

// Exons missing from the reference were never observed and pass any ceiling.
fn at_most(value: Option<f64>, ceiling: Option<f64>) -> bool {
    match (value, ceiling) {
        (Some(value), Some(ceiling)) => value <= ceiling,
        _ => true,
    }
}

/// Keep the rows matching every active criterion, in input order.
pub fn apply(table: &[ExonRecord], criteria: &FilterCriteria) -> Vec<ExonRecord> {
    if criteria.start.is_some() && criteria.end.is_some() && criteria.coordinate_range().is_none() {
        log::info!(
            "Ignoring coordinate range: {} chromosomes selected, range needs exactly one",
            criteria.chromosomes.len()
        );
    }

    table
        .iter()
        .filter(|record| criteria.matches(record))
        .cloned()
        .collect()
}

fn with_calls(table: &[ExonRecord], keep: impl Fn(CallClass) -> bool) -> Vec<ExonRecord> {
    table.iter().filter(|r| keep(r.call)).cloned().collect()
}

/// Homozygously deleted exons
pub fn hom_deletions(table: &[ExonRecord]) -> Vec<ExonRecord> {
    with_calls(table, |call| call == CallClass::HomDeletion)
}

/// Homo- and heterozygously deleted exons
pub fn deletions(table: &[ExonRecord]) -> Vec<ExonRecord> {
    with_calls(table, CallClass::is_deletion)
}

/// Duplicated exons
pub fn duplications(table: &[ExonRecord]) -> Vec<ExonRecord> {
    with_calls(table, |call| call == CallClass::Duplication)
}

/// Non wild type exons of genes on a candidate list
pub fn candidate_variants(table: &[ExonRecord], candidates: &BTreeSet<String>) -> Vec<ExonRecord> {
    table
        .iter()
        .filter(|r| r.call != CallClass::WildType && candidates.contains(&r.gene))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::record;

    fn table() -> Vec<ExonRecord> {
        let mut a = record("A", 1, CallClass::HetDeletion);
        a.depth = 50.0;
        a.log2 = -0.6;
        a.het_del_frequency = Some(0.2);
        let mut b = record("A", 2, CallClass::WildType);
        b.chromosome = "chr2".to_string();
        b.weight = 0.2;
        let mut c = record("B", 1, CallClass::Duplication);
        c.log2 = 0.5;
        c.dup_frequency = Some(0.01);
        let mut d = record("C", 4, CallClass::HomDeletion);
        d.log2 = -2.0;
        d.start = 10_000;
        d.end = 10_100;
        vec![a, b, c, d]
    }

    fn genes(rows: &[ExonRecord]) -> Vec<(String, u32)> {
        rows.iter().map(|r| (r.gene.clone(), r.exon)).collect()
    }

    #[test]
    fn test_identity_with_default_criteria() {
        let table = table();
        let criteria = FilterCriteria::default();
        assert!(criteria.is_unrestricted());
        assert_eq!(apply(&table, &criteria), table);
    }

    #[test]
    fn test_idempotent() {
        let table = table();
        let criteria = FilterCriteria {
            calls: [CallClass::HetDeletion, CallClass::HomDeletion].into_iter().collect(),
            min_log2: Some(-1.0),
            ..Default::default()
        };
        let once = apply(&table, &criteria);
        let twice = apply(&once, &criteria);
        assert_eq!(once, twice);
        assert_eq!(genes(&once), vec![("A".to_string(), 1)]);
    }

    #[test]
    fn test_set_filters() {
        let table = table();
        let criteria = FilterCriteria {
            chromosomes: ["chr1".to_string()].into_iter().collect(),
            genes: ["A".to_string(), "B".to_string()].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(genes(&apply(&table, &criteria)), vec![("A".to_string(), 1), ("B".to_string(), 1)]);
    }

    #[test]
    fn test_numeric_lower_bounds() {
        let table = table();
        let criteria = FilterCriteria {
            min_depth: Some(60.0),
            min_weight: Some(0.5),
            ..Default::default()
        };
        assert_eq!(genes(&apply(&table, &criteria)), vec![("B".to_string(), 1), ("C".to_string(), 4)]);
    }

    #[test]
    fn test_zero_bound_is_a_real_bound() {
        let table = table();
        let criteria = FilterCriteria {
            min_log2: Some(0.0),
            ..Default::default()
        };
        assert_eq!(genes(&apply(&table, &criteria)), vec![("A".to_string(), 2), ("B".to_string(), 1)]);
    }

    #[test]
    fn test_frequency_ceilings() {
        let table = table();
        let criteria = FilterCriteria {
            max_het_del_frequency: Some(0.1),
            max_dup_frequency: Some(0.0),
            ..Default::default()
        };
        assert_eq!(genes(&apply(&table, &criteria)), vec![("A".to_string(), 2), ("C".to_string(), 4)]);
    }

    #[test]
    fn test_coordinate_range_needs_single_chromosome() {
        let table = table();
        let mut criteria = FilterCriteria {
            start: Some(5_000),
            end: Some(20_000),
            ..Default::default()
        };
        assert_eq!(apply(&table, &criteria).len(), 4);

        criteria.chromosomes = ["chr1".to_string()].into_iter().collect();
        assert_eq!(genes(&apply(&table, &criteria)), vec![("C".to_string(), 4)]);

        criteria.end = None;
        assert_eq!(apply(&table, &criteria).len(), 3);
    }

    #[test]
    fn test_no_match_is_empty() {
        let criteria = FilterCriteria {
            genes: ["ZZZ".to_string()].into_iter().collect(),
            ..Default::default()
        };
        assert!(apply(&table(), &criteria).is_empty());
    }

    #[test]
    fn test_presets() {
        let table = table();
        assert_eq!(genes(&hom_deletions(&table)), vec![("C".to_string(), 4)]);
        assert_eq!(genes(&deletions(&table)), vec![("A".to_string(), 1), ("C".to_string(), 4)]);
        assert_eq!(genes(&duplications(&table)), vec![("B".to_string(), 1)]);

        let candidates: BTreeSet<String> = ["A".to_string(), "B".to_string()].into_iter().collect();
        assert_eq!(
            genes(&candidate_variants(&table, &candidates)),
            vec![("A".to_string(), 1), ("B".to_string(), 1)]
        );
    }
}
