//! Detection of consecutively deleted or duplicated exons within a gene
//!
//! Rows of the requested variant class are grouped by gene and ordered by
//! exon. Each row gets the exon delta to its previous and next neighbour in
//! the group; a row whose delta is ±1 in either direction sits in a run.
//! Genes keep their run rows when the run count reaches the configured
//! minimum or covers the whole gene.

use crate::{CallClass, CnvError, CnvResult, ExonRecord, RunSizeConfig};
use std::collections::HashMap;

/// Variant class a consecutive-run view is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantClass {
    /// Homo- or heterozygous deletion (calls 0 and 1)
    Deletion,
    /// Duplication (call 3)
    Duplication,
}

impl VariantClass {
    pub fn matches(self, call: CallClass) -> bool {
        match self {
            VariantClass::Deletion => call.is_deletion(),
            VariantClass::Duplication => call == CallClass::Duplication,
        }
    }

    pub fn required_minimum(self, config: &RunSizeConfig) -> usize {
        match self {
            VariantClass::Deletion => config.min_deletion_run,
            VariantClass::Duplication => config.min_duplication_run,
        }
    }
}

/// An exon belonging to a qualifying consecutive run
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub record: ExonRecord,
    pub difference_previous: Option<i64>,
    pub difference_next: Option<i64>,
    /// Exons of this gene that passed the adjacency test
    pub run_size: usize,
}

impl RunRecord {
    fn is_adjacent(&self) -> bool {
        let adjacent = |delta: Option<i64>| matches!(delta, Some(-1) | Some(1));
        adjacent(self.difference_previous) || adjacent(self.difference_next)
    }
}

/// Validate run size configuration parameters
pub fn validate_run_size_config(config: &RunSizeConfig) -> CnvResult<()> {
    if config.min_deletion_run == 0 {
        return Err(CnvError::InvalidConfig(
            "minimum deletion run must be at least 1".to_string(),
        ));
    }
    if config.min_duplication_run == 0 {
        return Err(CnvError::InvalidConfig(
            "minimum duplication run must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Exon deltas to the previous and next row of one gene group.
///
/// `exons` must be sorted. The first row borrows the nearest following
/// previous-delta and the last row the nearest preceding next-delta, so a
/// group of two or more rows never leaves a boundary row empty.
pub fn adjacency_deltas(exons: &[u32]) -> Vec<(Option<i64>, Option<i64>)> {
    let n = exons.len();
    let mut previous: Vec<Option<i64>> = (0..n)
        .map(|i| (i > 0).then(|| exons[i] as i64 - exons[i - 1] as i64))
        .collect();
    let mut next: Vec<Option<i64>> = (0..n)
        .map(|i| (i + 1 < n).then(|| exons[i] as i64 - exons[i + 1] as i64))
        .collect();

    // back-fill
    for i in (0..n.saturating_sub(1)).rev() {
        if previous[i].is_none() {
            previous[i] = previous[i + 1];
        }
    }
    // forward-fill
    for i in 1..n {
        if next[i].is_none() {
            next[i] = next[i - 1];
        }
    }

    previous.into_iter().zip(next).collect()
}

/// Rows of `table` forming consecutive runs of `class`.
///
/// Output is grouped by gene in order of first appearance, exons ascending.
pub fn detect_runs(table: &[ExonRecord], class: VariantClass, required_minimum: usize) -> Vec<RunRecord> {
    let mut gene_order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&ExonRecord>> = HashMap::new();

    for record in table.iter().filter(|r| class.matches(r.call)) {
        groups
            .entry(record.gene.as_str())
            .or_insert_with(|| {
                gene_order.push(record.gene.as_str());
                Vec::new()
            })
            .push(record);
    }

    let mut runs = Vec::new();

    for gene in gene_order {
        let mut group = groups.remove(gene).unwrap_or_default();
        group.sort_by_key(|r| r.exon);

        let gene_size = match group.first() {
            Some(first) => first.gene_size,
            None => continue,
        };
        let exons: Vec<u32> = group.iter().map(|r| r.exon).collect();
        // A single-exon gene has no neighbour; it is its own whole-gene run.
        let lone_exon = exons.len() == 1 && gene_size == Some(1) && required_minimum <= 1;

        let selected: Vec<RunRecord> = group
            .into_iter()
            .zip(adjacency_deltas(&exons))
            .map(|(record, (difference_previous, difference_next))| RunRecord {
                record: record.clone(),
                difference_previous,
                difference_next,
                run_size: 0,
            })
            .filter(|run| lone_exon || run.is_adjacent())
            .collect();

        let run_size = selected.len();
        if run_size == 0 {
            continue;
        }

        let whole_gene = gene_size.map_or(false, |size| size as usize == run_size);
        if run_size < required_minimum && !whole_gene {
            log::debug!(
                "{}: {} consecutive exons below minimum {}",
                gene,
                run_size,
                required_minimum
            );
            continue;
        }

        for mut run in selected {
            run.run_size = run_size;
            runs.push(run);
        }
    }

    runs
}

/// Consecutive-run view for one variant class using the configured minimum
pub fn consecutive_runs(table: &[ExonRecord], class: VariantClass, config: &RunSizeConfig) -> Vec<RunRecord> {
    detect_runs(table, class, class.required_minimum(config))
}
