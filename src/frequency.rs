//! Population frequency annotation from the cohort reference

use crate::{
    reference::{BintestAggregate, ReferenceAggregate},
    ExonRecord, Frequencies,
};
use std::collections::HashMap;

/// What to store for an exon that is absent from the reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPolicy {
    /// Leave the frequency columns empty
    LeaveMissing,
    /// Absence means never observed: store zero
    Zero,
}

/// Per-(gene, exon) frequencies ready for joining
#[derive(Debug, Clone, Default)]
pub struct FrequencyIndex {
    by_exon: HashMap<(String, u32), Frequencies>,
}

impl FrequencyIndex {
    pub fn from_reference(reference: &[ReferenceAggregate]) -> Self {
        let by_exon = reference
            .iter()
            .map(|entry| ((entry.gene.clone(), entry.exon), entry.frequencies))
            .collect();
        Self { by_exon }
    }

    pub fn from_bintest(reference: &[BintestAggregate]) -> Self {
        let by_exon = reference
            .iter()
            .map(|entry| ((entry.gene.clone(), entry.exon), entry.frequencies))
            .collect();
        Self { by_exon }
    }

    pub fn get(&self, gene: &str, exon: u32) -> Option<Frequencies> {
        self.by_exon.get(&(gene.to_string(), exon)).copied()
    }

    pub fn len(&self) -> usize {
        self.by_exon.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_exon.is_empty()
    }
}

/// Left join a sample table against the reference on `(gene, exon)`.
pub fn annotate(mut table: Vec<ExonRecord>, reference: &FrequencyIndex, fill: FillPolicy) -> Vec<ExonRecord> {
    let mut missing = 0usize;

    for record in &mut table {
        let frequencies = match reference.get(&record.gene, record.exon) {
            Some(frequencies) => Some(frequencies),
            None => {
                missing += 1;
                match fill {
                    FillPolicy::LeaveMissing => None,
                    FillPolicy::Zero => Some(Frequencies::default()),
                }
            }
        };
        record.set_frequencies(frequencies);
    }

    if missing > 0 {
        log::debug!(
            "{} of {} exons not found in reference ({:?})",
            missing,
            table.len(),
            fill
        );
    }

    table
}

/// Annotate the primary table; unmatched exons keep empty frequencies
pub fn annotate_primary(table: Vec<ExonRecord>, reference: &FrequencyIndex) -> Vec<ExonRecord> {
    annotate(table, reference, FillPolicy::LeaveMissing)
}

/// Annotate a bintest table; unmatched exons get zero frequencies
pub fn annotate_bintest(table: Vec<ExonRecord>, reference: &FrequencyIndex) -> Vec<ExonRecord> {
    annotate(table, reference, FillPolicy::Zero)
}
