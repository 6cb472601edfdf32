//! Trio join of an index table with its parental tables

use crate::{CallClass, ExonRecord};
use std::collections::{BTreeSet, HashMap};

/// Parental values carried onto an index row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParentCall {
    pub depth: f64,
    pub weight: f64,
    pub log2: f64,
    pub call: CallClass,
    pub copy_number_estimate: f64,
}

impl From<&ExonRecord> for ParentCall {
    fn from(record: &ExonRecord) -> Self {
        ParentCall {
            depth: record.depth,
            weight: record.weight,
            log2: record.log2,
            call: record.call,
            copy_number_estimate: record.copy_number_estimate,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrioRecord {
    pub index: ExonRecord,
    pub father: Option<ParentCall>,
    pub mother: Option<ParentCall>,
}

/// Call restrictions per family member. Empty sets do not restrict.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrioCriteria {
    pub index_calls: BTreeSet<CallClass>,
    pub father_calls: BTreeSet<CallClass>,
    pub mother_calls: BTreeSet<CallClass>,
}

impl TrioCriteria {
    pub fn matches(&self, row: &TrioRecord) -> bool {
        allowed(&self.index_calls, Some(row.index.call))
            && allowed(&self.father_calls, row.father.map(|p| p.call))
            && allowed(&self.mother_calls, row.mother.map(|p| p.call))
    }
}

fn allowed(calls: &BTreeSet<CallClass>, call: Option<CallClass>) -> bool {
    if calls.is_empty() {
        return true;
    }
    call.map_or(false, |call| calls.contains(&call))
}

fn index_parent<'a>(label: &str, table: &'a [ExonRecord]) -> HashMap<(&'a str, u32), ParentCall> {
    let mut by_exon = HashMap::with_capacity(table.len());
    let mut duplicates = 0usize;

    for record in table {
        if by_exon.contains_key(&record.key()) {
            duplicates += 1;
            continue;
        }
        by_exon.insert(record.key(), ParentCall::from(record));
    }

    if duplicates > 0 {
        log::warn!(
            "{} table has {} duplicate (gene, exon) keys, keeping the first occurrence",
            label,
            duplicates
        );
    }
    by_exon
}

/// Left join `index` with the parental tables on `(gene, exon)`
pub fn join_trio(index: &[ExonRecord], father: &[ExonRecord], mother: &[ExonRecord]) -> Vec<TrioRecord> {
    let father = index_parent("Father", father);
    let mother = index_parent("Mother", mother);

    index
        .iter()
        .map(|record| TrioRecord {
            index: record.clone(),
            father: father.get(&record.key()).copied(),
            mother: mother.get(&record.key()).copied(),
        })
        .collect()
}

/// Keep the trio rows matching every call restriction, in input order
pub fn apply_trio_filters(rows: &[TrioRecord], criteria: &TrioCriteria) -> Vec<TrioRecord> {
    rows.iter().filter(|row| criteria.matches(row)).cloned().collect()
}
