//! Readers for CNVkit tables, OMIM annotations and candidate gene lists

use crate::{
    utils::open_table_reader, CnvError, CnvResult, OmimAnnotation, RawCnvRow,
};
use std::collections::BTreeSet;
use std::io::BufRead;
use std::path::Path;

/// Column indices for CNVkit `.cnr` / bintest parsing
#[derive(Debug, Clone)]
pub struct CnrColumnIndices {
    pub chromosome: usize,
    pub start: usize,
    pub end: usize,
    pub gene: usize,
    pub log2: usize,
    pub depth: usize,
    pub weight: usize,
}

impl CnrColumnIndices {
    pub fn from_header(header: &csv::StringRecord) -> CnvResult<Self> {
        let find = |name: &str| {
            header
                .iter()
                .position(|col| col.trim() == name)
                .ok_or_else(|| CnvError::MissingColumn(name.to_string()))
        };

        Ok(CnrColumnIndices {
            chromosome: find("chromosome")?,
            start: find("start")?,
            end: find("end")?,
            gene: find("gene")?,
            log2: find("log2")?,
            depth: find("depth")?,
            weight: find("weight")?,
        })
    }
}

fn parse_field<T: std::str::FromStr>(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    line: u64,
) -> CnvResult<T> {
    let value = record.get(index).unwrap_or("").trim();
    value
        .parse::<T>()
        .map_err(|_| CnvError::InvalidRecord(format!("invalid {} '{}' on line {}", name, value, line)))
}

/// Parse raw CNVkit rows from any tab-separated reader
pub fn parse_cnv_table<R: std::io::Read>(reader: R) -> CnvResult<Vec<RawCnvRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(reader);

    let indices = CnrColumnIndices::from_header(csv_reader.headers()?)?;
    let mut rows = Vec::new();

    for result in csv_reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let log2_text = record.get(indices.log2).unwrap_or("").trim();
        let log2 = log2_text.parse::<f64>().map_err(|_| CnvError::InvalidSignal {
            value: log2_text.to_string(),
            locus: format!("line {}", line),
        })?;

        rows.push(RawCnvRow {
            chromosome: record.get(indices.chromosome).unwrap_or("").trim().to_string(),
            start: parse_field(&record, indices.start, "start", line)?,
            end: parse_field(&record, indices.end, "end", line)?,
            gene: record.get(indices.gene).unwrap_or("").trim().to_string(),
            log2,
            depth: parse_field(&record, indices.depth, "depth", line)?,
            weight: parse_field(&record, indices.weight, "weight", line)?,
            line: Some(line),
        });
    }

    Ok(rows)
}

/// Read a CNVkit `.cnr` or `_bintest.tsv` file (plain or gzipped)
pub fn read_cnv_table<P: AsRef<Path>>(path: P) -> CnvResult<Vec<RawCnvRow>> {
    let reader = open_table_reader(&path)?;
    let rows = parse_cnv_table(reader)?;
    log::debug!("Read {} rows from {:?}", rows.len(), path.as_ref());
    Ok(rows)
}

/// Read an OMIM annotation table keyed by `gene`
pub fn read_omim_table<P: AsRef<Path>>(path: P) -> CnvResult<Vec<OmimAnnotation>> {
    let reader = open_table_reader(&path)?;
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(reader);

    let mut annotations = Vec::new();
    for result in csv_reader.deserialize() {
        let mut annotation: OmimAnnotation = result?;
        // Numeric MIM numbers are sometimes exported as floats ("113705.0")
        annotation.omim_gene_id = annotation
            .omim_gene_id
            .map(|id| id.split('.').next().unwrap_or("").to_string());
        annotations.push(annotation);
    }

    Ok(annotations)
}

/// Read a candidate gene list, one symbol per line
pub fn read_candidate_genes<P: AsRef<Path>>(path: P) -> CnvResult<BTreeSet<String>> {
    let reader = open_table_reader(&path)?;
    let mut genes = BTreeSet::new();

    for line in reader.lines() {
        let line = line?;
        let gene = line.trim();
        if gene.is_empty() || gene.starts_with('#') {
            continue;
        }
        genes.insert(gene.to_string());
    }

    Ok(genes)
}
