//! Normalization of raw CNVkit tables into the canonical per-exon schema

use crate::{
    call::classify,
    explode::{explode, split_gene_label},
    CnvError, CnvResult, ExonRecord, OmimAnnotation, RawCnvRow, ANTITARGET_MARKER,
    DEFAULT_COMMENT,
};
use std::collections::HashMap;

/// OMIM annotations keyed by gene symbol
#[derive(Debug, Clone, Default)]
pub struct OmimIndex {
    by_gene: HashMap<String, OmimAnnotation>,
}

impl OmimIndex {
    /// Build the index; the first annotation wins for a repeated gene
    pub fn new(annotations: Vec<OmimAnnotation>) -> Self {
        let mut by_gene = HashMap::with_capacity(annotations.len());
        for annotation in annotations {
            if by_gene.contains_key(&annotation.gene) {
                log::debug!("Duplicate OMIM entry for {}, keeping the first", annotation.gene);
                continue;
            }
            by_gene.insert(annotation.gene.clone(), annotation);
        }
        Self { by_gene }
    }

    pub fn get(&self, gene: &str) -> Option<&OmimAnnotation> {
        self.by_gene.get(gene)
    }

    pub fn len(&self) -> usize {
        self.by_gene.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_gene.is_empty()
    }
}

/// Explode, drop off-target bins, parse labels and classify.
fn prepare_rows(rows: Vec<RawCnvRow>) -> CnvResult<Vec<ExonRecord>> {
    let input_rows = rows.len();
    let exploded = explode(rows)?;
    let exploded_rows = exploded.len();

    let mut records = Vec::with_capacity(exploded_rows);
    for row in exploded {
        if row.gene.contains(ANTITARGET_MARKER) {
            continue;
        }

        let locus = row.locus();
        let (gene, exon) = split_gene_label(&row.gene, &locus)?;
        let call = classify(row.log2).map_err(|_| CnvError::InvalidSignal {
            value: row.log2.to_string(),
            locus: format!("{} {}", row.gene, locus),
        })?;

        if row.start > row.end {
            log::warn!("{} exon {} has start after end at {}", gene, exon, locus);
        }

        records.push(ExonRecord {
            copy_number_estimate: 2f64.powf(row.log2),
            chromosome: row.chromosome,
            start: row.start,
            end: row.end,
            gene,
            exon,
            depth: row.depth,
            weight: row.weight,
            log2: row.log2,
            call,
            gene_size: None,
            omim: None,
            het_del_frequency: None,
            hom_del_frequency: None,
            dup_frequency: None,
            comments: DEFAULT_COMMENT.to_string(),
        });
    }

    log::debug!(
        "Normalized {} input rows ({} after explode) into {} exon records",
        input_rows,
        exploded_rows,
        records.len()
    );

    Ok(records)
}

/// Normalize a raw table and merge OMIM annotations by gene.
pub fn normalize(rows: Vec<RawCnvRow>, omim: &OmimIndex) -> CnvResult<Vec<ExonRecord>> {
    let mut records = prepare_rows(rows)?;
    for record in &mut records {
        record.omim = omim.get(&record.gene).cloned();
    }
    Ok(records)
}

/// Normalize the index sample's primary table, attaching per-gene exon counts.
pub fn normalize_primary(rows: Vec<RawCnvRow>, omim: &OmimIndex) -> CnvResult<Vec<ExonRecord>> {
    let mut records = normalize(rows, omim)?;
    attach_gene_sizes(&mut records);
    Ok(records)
}

/// Normalize a parental table for trio comparison (no OMIM, no gene sizes).
pub fn normalize_parental(rows: Vec<RawCnvRow>) -> CnvResult<Vec<ExonRecord>> {
    prepare_rows(rows)
}

/// Set `gene_size` on every record to the number of records of its gene.
pub fn attach_gene_sizes(records: &mut [ExonRecord]) {
    let mut sizes: HashMap<String, u32> = HashMap::new();
    for record in records.iter() {
        *sizes.entry(record.gene.clone()).or_insert(0) += 1;
    }
    for record in records.iter_mut() {
        record.gene_size = sizes.get(&record.gene).copied();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CallClass;

    fn omim() -> OmimIndex {
        OmimIndex::new(vec![OmimAnnotation {
            gene: "BRCA1".to_string(),
            omim_gene_id: Some("113705".to_string()),
            disease: Some("Breast-ovarian cancer".to_string()),
            omim_phenotype_id: Some("604370".to_string()),
            inheritance: Some("AD".to_string()),
        }])
    }

    fn raw_table() -> Vec<RawCnvRow> {
        vec![
            RawCnvRow::new("chr17", 100, 200, "BRCA1_1", -1.5, 50.0, 0.8),
            RawCnvRow::new("chr17", 300, 400, "BRCA1_2", -0.6, 60.0, 0.9),
            RawCnvRow::new("chr17", 450, 900, "Antitarget", 0.1, 5.0, 0.1),
            RawCnvRow::new("chr17", 1000, 1100, "NBR1_1,NBR2_7", 0.5, 70.0, 0.9),
            RawCnvRow::new("chr17", 1200, 1300, "NBR1_2", 0.0, 70.0, 0.9),
        ]
    }

    #[test]
    fn test_normalize_drops_antitarget_and_classifies() {
        let records = normalize(raw_table(), &omim()).unwrap();

        assert_eq!(records.len(), 5);
        assert!(records.iter().all(|r| !r.gene.contains("Antitarget")));

        let calls: Vec<CallClass> = records.iter().map(|r| r.call).collect();
        assert_eq!(
            calls,
            vec![
                CallClass::HomDeletion,
                CallClass::HetDeletion,
                CallClass::Duplication,
                CallClass::Duplication,
                CallClass::WildType
            ]
        );
        assert_eq!(records[3].gene, "NBR2");
        assert_eq!(records[3].exon, 7);
    }

    #[test]
    fn test_normalize_copy_number_estimate() {
        let records = normalize(raw_table(), &omim()).unwrap();
        for r in &records {
            assert!((r.copy_number_estimate - 2f64.powf(r.log2)).abs() < 1e-9);
        }
        assert!((records[4].copy_number_estimate - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_omim_left_join() {
        let records = normalize(raw_table(), &omim()).unwrap();
        assert_eq!(
            records[0].omim.as_ref().and_then(|o| o.inheritance.as_deref()),
            Some("AD")
        );
        assert!(records[2].omim.is_none());
        assert!(records.iter().all(|r| r.comments == DEFAULT_COMMENT));
    }

    #[test]
    fn test_normalize_primary_gene_sizes() {
        let records = normalize_primary(raw_table(), &omim()).unwrap();
        let size_of = |gene: &str| records.iter().find(|r| r.gene == gene).unwrap().gene_size;
        assert_eq!(size_of("BRCA1"), Some(2));
        assert_eq!(size_of("NBR1"), Some(2));
        assert_eq!(size_of("NBR2"), Some(1));
    }

    #[test]
    fn test_normalize_parental_skips_annotation() {
        let records = normalize_parental(raw_table()).unwrap();
        assert_eq!(records.len(), 5);
        assert!(records.iter().all(|r| r.omim.is_none() && r.gene_size.is_none()));
    }

    #[test]
    fn test_normalize_rejects_nan_log2() {
        let rows = vec![RawCnvRow::new("chr1", 1, 2, "A_1", f64::NAN, 1.0, 1.0)];
        assert!(matches!(
            normalize(rows, &OmimIndex::default()),
            Err(CnvError::InvalidSignal { .. })
        ));
    }

    #[test]
    fn test_normalize_rejects_bad_label() {
        let rows = vec![RawCnvRow::new("chr1", 1, 2, "A_x", 0.0, 1.0, 1.0)];
        assert!(matches!(
            normalize(rows, &OmimIndex::default()),
            Err(CnvError::MalformedLabel { .. })
        ));
    }

    #[test]
    fn test_start_after_end_is_not_fatal() {
        let rows = vec![RawCnvRow::new("chr1", 20, 10, "A_1", 0.0, 1.0, 1.0)];
        assert_eq!(normalize(rows, &OmimIndex::default()).unwrap().len(), 1);
    }
}
