//! TSV export of normalized tables and preset views

use crate::{
    consecutive::RunRecord,
    trio::{ParentCall, TrioRecord},
    utils::create_table_writer,
    CnvResult, ExonRecord,
};
use std::path::{Path, PathBuf};

/// Written in place of a missing value
pub const MISSING_VALUE: &str = "-";

const EXON_COLUMNS: [&str; 19] = [
    "chromosome",
    "start",
    "end",
    "gene",
    "exon",
    "depth",
    "weight",
    "log2",
    "call",
    "copy_number_estimate",
    "gene_size",
    "OMIMG",
    "Disease",
    "OMIMP",
    "Inheritance",
    "het_del_frequency",
    "hom_del_frequency",
    "dup_frequency",
    "comments",
];

const RUN_COLUMNS: [&str; 3] = ["difference_previous", "difference_next", "run_size"];

const PARENT_COLUMNS: [&str; 5] = ["depth", "weight", "log2", "call", "copy_number_estimate"];

/// A row that can be written as one line of a TSV table
pub trait TsvRow {
    fn header() -> Vec<String>;
    fn fields(&self) -> Vec<String>;
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| MISSING_VALUE.to_string(), |v| v.to_string())
}

fn optional_text(value: Option<&String>) -> String {
    match value {
        Some(text) if !text.is_empty() => text.clone(),
        _ => MISSING_VALUE.to_string(),
    }
}

impl TsvRow for ExonRecord {
    fn header() -> Vec<String> {
        EXON_COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    fn fields(&self) -> Vec<String> {
        let omim = self.omim.as_ref();
        vec![
            self.chromosome.clone(),
            self.start.to_string(),
            self.end.to_string(),
            self.gene.clone(),
            self.exon.to_string(),
            self.depth.to_string(),
            self.weight.to_string(),
            self.log2.to_string(),
            self.call.to_string(),
            self.copy_number_estimate.to_string(),
            optional(self.gene_size),
            optional_text(omim.and_then(|o| o.omim_gene_id.as_ref())),
            optional_text(omim.and_then(|o| o.disease.as_ref())),
            optional_text(omim.and_then(|o| o.omim_phenotype_id.as_ref())),
            optional_text(omim.and_then(|o| o.inheritance.as_ref())),
            optional(self.het_del_frequency),
            optional(self.hom_del_frequency),
            optional(self.dup_frequency),
            self.comments.clone(),
        ]
    }
}

impl TsvRow for RunRecord {
    fn header() -> Vec<String> {
        let mut header = ExonRecord::header();
        header.extend(RUN_COLUMNS.iter().map(|c| c.to_string()));
        header
    }

    fn fields(&self) -> Vec<String> {
        let mut fields = self.record.fields();
        fields.push(optional(self.difference_previous));
        fields.push(optional(self.difference_next));
        fields.push(self.run_size.to_string());
        fields
    }
}

fn parent_fields(parent: Option<&ParentCall>) -> Vec<String> {
    match parent {
        Some(p) => vec![
            p.depth.to_string(),
            p.weight.to_string(),
            p.log2.to_string(),
            p.call.to_string(),
            p.copy_number_estimate.to_string(),
        ],
        None => vec![MISSING_VALUE.to_string(); PARENT_COLUMNS.len()],
    }
}

impl TsvRow for TrioRecord {
    fn header() -> Vec<String> {
        let mut header = ExonRecord::header();
        for parent in ["father", "mother"] {
            header.extend(PARENT_COLUMNS.iter().map(|c| format!("{}_{}", parent, c)));
        }
        header
    }

    fn fields(&self) -> Vec<String> {
        let mut fields = self.index.fields();
        fields.extend(parent_fields(self.father.as_ref()));
        fields.extend(parent_fields(self.mother.as_ref()));
        fields
    }
}

/// Write rows as a tab-separated table with a header line
pub fn write_table<T: TsvRow, P: AsRef<Path>>(rows: &[T], path: P) -> CnvResult<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(create_table_writer(&path)?);

    writer.write_record(T::header())?;
    for row in rows {
        writer.write_record(row.fields())?;
    }
    writer.flush()?;

    log::debug!("Wrote {} rows to {:?}", rows.len(), path.as_ref());
    Ok(())
}

/// The preset views of one analysed sample
#[derive(Debug, Clone, Default)]
pub struct ExportBundle {
    pub total: Vec<ExonRecord>,
    pub bintest: Vec<ExonRecord>,
    pub hom_del: Vec<ExonRecord>,
    pub total_candidate: Vec<ExonRecord>,
    pub bintest_candidate: Vec<ExonRecord>,
    pub consecutive_del: Vec<RunRecord>,
    pub consecutive_dup: Vec<RunRecord>,
    /// Written only when parental tables were supplied
    pub trio: Option<Vec<TrioRecord>>,
}

/// Views written by [`export_views`], in order
pub const VIEW_NAMES: [&str; 7] = [
    "total",
    "bintest",
    "hom_del",
    "total_candidate",
    "bintest_candidate",
    "consecutive_del",
    "consecutive_dup",
];

/// Path of one view inside `dir`: `<prefix>_<view>.tsv`, or `<view>.tsv` without a prefix
pub fn view_path(dir: &Path, prefix: &str, view: &str) -> PathBuf {
    if prefix.is_empty() {
        dir.join(format!("{}.tsv", view))
    } else {
        dir.join(format!("{}_{}.tsv", prefix, view))
    }
}

/// Every path [`export_views`] writes for `bundle`
pub fn view_paths<P: AsRef<Path>>(bundle: &ExportBundle, dir: P, prefix: &str) -> Vec<PathBuf> {
    let dir = dir.as_ref();
    let mut paths: Vec<PathBuf> = VIEW_NAMES
        .iter()
        .map(|view| view_path(dir, prefix, view))
        .collect();
    if bundle.trio.is_some() {
        paths.push(view_path(dir, prefix, "trio"));
    }
    paths
}

/// Write every view of `bundle` into `dir` as `<prefix>_<view>.tsv`.
///
/// Returns the written paths in view order.
pub fn export_views<P: AsRef<Path>>(bundle: &ExportBundle, dir: P, prefix: &str) -> CnvResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let paths = view_paths(bundle, dir, prefix);
    write_table(&bundle.total, &paths[0])?;
    write_table(&bundle.bintest, &paths[1])?;
    write_table(&bundle.hom_del, &paths[2])?;
    write_table(&bundle.total_candidate, &paths[3])?;
    write_table(&bundle.bintest_candidate, &paths[4])?;
    write_table(&bundle.consecutive_del, &paths[5])?;
    write_table(&bundle.consecutive_dup, &paths[6])?;
    if let Some(trio) = &bundle.trio {
        write_table(trio, &paths[7])?;
    }

    log::info!("Exported {} views to {:?}", paths.len(), dir);
    Ok(paths)
}
