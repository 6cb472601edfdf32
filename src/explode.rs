//! Splitting of multi-gene probe rows and `gene_exon` labels

use crate::{CnvError, CnvResult, RawCnvRow};

/// Emit one row per comma-separated gene symbol, all other fields copied.
pub fn explode(rows: Vec<RawCnvRow>) -> CnvResult<Vec<RawCnvRow>> {
    let mut exploded = Vec::with_capacity(rows.len());

    for row in rows {
        if row.gene.trim().is_empty() {
            return Err(CnvError::MalformedGeneField(row.locus()));
        }

        if !row.gene.contains(',') {
            exploded.push(row);
            continue;
        }

        for gene in row.gene.split(',') {
            let gene = gene.trim();
            if gene.is_empty() {
                return Err(CnvError::MalformedGeneField(row.locus()));
            }
            exploded.push(RawCnvRow {
                gene: gene.to_string(),
                ..row.clone()
            });
        }
    }

    Ok(exploded)
}

/// Split a `<gene>_<exon>` label on its last underscore.
///
/// Gene symbols may themselves contain underscores; only the final token is
/// taken as the 1-based exon index.
pub fn split_gene_label(label: &str, locus: &str) -> CnvResult<(String, u32)> {
    let malformed = |reason: &str| CnvError::MalformedLabel {
        label: label.to_string(),
        locus: locus.to_string(),
        reason: reason.to_string(),
    };

    let (gene, exon) = label
        .rsplit_once('_')
        .ok_or_else(|| malformed("no '_<exon>' suffix"))?;

    if gene.is_empty() {
        return Err(malformed("empty gene symbol"));
    }

    let exon = exon
        .parse::<u32>()
        .map_err(|_| malformed("exon suffix is not an integer"))?;

    if exon == 0 {
        return Err(malformed("exon index must be at least 1"));
    }

    Ok((gene.to_string(), exon))
}
