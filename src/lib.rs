//! # CNVizard - copy-number variant table processing
//!
//! A Rust implementation of the CNVizard backend: normalization and
//! classification of CNVkit per-exon tables, population-frequency annotation,
//! filtering, detection of consecutively affected exons and the offline
//! reference builder.

pub mod call;
pub mod consecutive;
pub mod explode;
pub mod export;
pub mod filter;
pub mod frequency;
pub mod normalize;
pub mod reference;
pub mod table;
pub mod trio;
pub mod utils;

pub use call::CallClass;

use serde::Deserialize;

/// Marker carried by CNVkit off-target background bins
pub const ANTITARGET_MARKER: &str = "Antitarget";

/// Placeholder written to the free-text comments column
pub const DEFAULT_COMMENT: &str = ".";

/// One row of a raw CNVkit table, before explode and label parsing
#[derive(Debug, Clone, PartialEq)]
pub struct RawCnvRow {
    pub chromosome: String,
    pub start: u64,
    pub end: u64,
    /// Comma-joined `<gene>_<exon>` labels as emitted by the caller
    pub gene: String,
    pub log2: f64,
    pub depth: f64,
    pub weight: f64,
    /// 1-based line in the source file, if the row was read from disk
    pub line: Option<u64>,
}

impl RawCnvRow {
    pub fn new(
        chromosome: &str,
        start: u64,
        end: u64,
        gene: &str,
        log2: f64,
        depth: f64,
        weight: f64,
    ) -> Self {
        Self {
            chromosome: chromosome.to_string(),
            start,
            end,
            gene: gene.to_string(),
            log2,
            depth,
            weight,
            line: None,
        }
    }

    /// Human readable row identity used in error messages
    pub fn locus(&self) -> String {
        match self.line {
            Some(line) => format!("{}:{}-{} (line {})", self.chromosome, self.start, self.end, line),
            None => format!("{}:{}-{}", self.chromosome, self.start, self.end),
        }
    }
}

/// OMIM annotation for a single gene
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OmimAnnotation {
    pub gene: String,
    #[serde(rename = "OMIMG", default)]
    pub omim_gene_id: Option<String>,
    #[serde(rename = "Disease", default)]
    pub disease: Option<String>,
    #[serde(rename = "OMIMP", default)]
    pub omim_phenotype_id: Option<String>,
    #[serde(rename = "Inheritance", default)]
    pub inheritance: Option<String>,
}

/// Population frequencies of the three variant classes at one exon
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Frequencies {
    pub het_del: f64,
    pub hom_del: f64,
    pub dup: f64,
}

/// Canonical per-exon row of a normalized CNV table
#[derive(Debug, Clone, PartialEq)]
pub struct ExonRecord {
    pub chromosome: String,
    pub start: u64,
    pub end: u64,
    pub gene: String,
    pub exon: u32,
    pub depth: f64,
    pub weight: f64,
    pub log2: f64,
    pub call: CallClass,
    pub copy_number_estimate: f64,
    /// Exon count of the gene within the primary table
    pub gene_size: Option<u32>,
    pub omim: Option<OmimAnnotation>,
    pub het_del_frequency: Option<f64>,
    pub hom_del_frequency: Option<f64>,
    pub dup_frequency: Option<f64>,
    pub comments: String,
}

impl ExonRecord {
    pub fn key(&self) -> (&str, u32) {
        (self.gene.as_str(), self.exon)
    }

    pub fn set_frequencies(&mut self, frequencies: Option<Frequencies>) {
        self.het_del_frequency = frequencies.map(|f| f.het_del);
        self.hom_del_frequency = frequencies.map(|f| f.hom_del);
        self.dup_frequency = frequencies.map(|f| f.dup);
    }
}

/// Minimum consecutive run sizes for the deletion and duplication views
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSizeConfig {
    pub min_deletion_run: usize,
    pub min_duplication_run: usize,
}

impl Default for RunSizeConfig {
    fn default() -> Self {
        Self {
            min_deletion_run: 2,
            min_duplication_run: 2,
        }
    }
}

/// Error types for the CNVizard library
#[derive(Debug, thiserror::Error)]
pub enum CnvError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Empty gene field at {0}")]
    MalformedGeneField(String),

    #[error("Malformed gene label '{label}' at {locus}: {reason}")]
    MalformedLabel {
        label: String,
        locus: String,
        reason: String,
    },

    #[error("Invalid log2 value '{value}' at {locus}")]
    InvalidSignal { value: String, locus: String },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type CnvResult<T> = Result<T, CnvError>;

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Minimal normalized record for unit tests
    pub fn record(gene: &str, exon: u32, call: CallClass) -> ExonRecord {
        ExonRecord {
            chromosome: "chr1".to_string(),
            start: 1000 * exon as u64,
            end: 1000 * exon as u64 + 100,
            gene: gene.to_string(),
            exon,
            depth: 100.0,
            weight: 1.0,
            log2: 0.0,
            call,
            copy_number_estimate: 1.0,
            gene_size: None,
            omim: None,
            het_del_frequency: None,
            hom_del_frequency: None,
            dup_frequency: None,
            comments: DEFAULT_COMMENT.to_string(),
        }
    }

    /// One gene with the given calls on exons 1..=n, gene_size set to n
    pub fn gene(gene: &str, calls: &[u8]) -> Vec<ExonRecord> {
        calls
            .iter()
            .enumerate()
            .map(|(i, &code)| {
                let mut r = record(gene, i as u32 + 1, CallClass::from_code(code).unwrap());
                r.gene_size = Some(calls.len() as u32);
                r
            })
            .collect()
    }
}
