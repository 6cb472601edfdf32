//! Offline cohort reference: per-exon call frequencies and box-plot statistics

use crate::{CallClass, CnvError, CnvResult, ExonRecord, Frequencies};
use arrow::array::{Array, ArrayRef, Float64Array, StringArray, UInt32Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// Tukey fence multiplier applied to the inter-quartile range
pub const FENCE_FACTOR: f64 = 1.5;

/// Call tallies at one exon, ordered `[het_del, hom_del, dup, wildtype, total]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallCounts {
    pub het_del: u64,
    pub hom_del: u64,
    pub dup: u64,
    pub wildtype: u64,
    pub total: u64,
}

impl CallCounts {
    pub fn from_calls<I: IntoIterator<Item = CallClass>>(calls: I) -> Self {
        let mut counts = CallCounts::default();
        for call in calls {
            match call {
                CallClass::HetDeletion => counts.het_del += 1,
                CallClass::HomDeletion => counts.hom_del += 1,
                CallClass::WildType => counts.wildtype += 1,
                CallClass::Duplication => counts.dup += 1,
            }
            counts.total += 1;
        }
        counts
    }

    pub fn as_array(&self) -> [u64; 5] {
        [self.het_del, self.hom_del, self.dup, self.wildtype, self.total]
    }

    /// Frequencies of the three variant classes over `denominator` individuals
    pub fn frequencies(&self, denominator: u64) -> Frequencies {
        if denominator == 0 {
            return Frequencies::default();
        }
        let denominator = denominator as f64;
        Frequencies {
            het_del: self.het_del as f64 / denominator,
            hom_del: self.hom_del as f64 / denominator,
            dup: self.dup as f64 / denominator,
        }
    }
}

/// Distribution summary of one metric across the cohort
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SummaryStats {
    pub mean: f64,
    pub median: f64,
    pub q1: f64,
    pub q3: f64,
    /// Population standard deviation
    pub std: f64,
    pub min: f64,
    pub max: f64,
    /// `q1 - 1.5 * IQR`
    pub lower_fence: f64,
    /// `q3 + 1.5 * IQR`
    pub upper_fence: f64,
}

impl SummaryStats {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return SummaryStats::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let q1 = quantile(&sorted, 0.25);
        let q3 = quantile(&sorted, 0.75);
        let box_size = (q3 - q1) * FENCE_FACTOR;

        SummaryStats {
            mean,
            median: quantile(&sorted, 0.5),
            q1,
            q3,
            std: variance.sqrt(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            lower_fence: q1 - box_size,
            upper_fence: q3 + box_size,
        }
    }
}

/// Linearly interpolated quantile of sorted values
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Cohort statistics for one exon of the primary reference
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceAggregate {
    pub gene: String,
    pub exon: u32,
    pub call_counts: CallCounts,
    pub frequencies: Frequencies,
    pub depth: SummaryStats,
    pub log2: SummaryStats,
}

/// Bintest call frequencies for one exon, over the primary cohort size
#[derive(Debug, Clone, PartialEq)]
pub struct BintestAggregate {
    pub gene: String,
    pub exon: u32,
    pub call_counts: CallCounts,
    /// Individuals observed at this exon in the primary reference
    pub reference_total: u64,
    pub frequencies: Frequencies,
}

#[derive(Default)]
struct ExonObservations {
    depth: Vec<f64>,
    log2: Vec<f64>,
    calls: Vec<CallClass>,
}

fn group_by_exon(sample_tables: &[Vec<ExonRecord>]) -> BTreeMap<(String, u32), ExonObservations> {
    let mut groups: BTreeMap<(String, u32), ExonObservations> = BTreeMap::new();
    for record in sample_tables.iter().flatten() {
        let entry = groups.entry((record.gene.clone(), record.exon)).or_default();
        entry.depth.push(record.depth);
        entry.log2.push(record.log2);
        entry.calls.push(record.call);
    }
    groups
}

/// Aggregate normalized sample tables into the primary reference
pub fn aggregate(sample_tables: &[Vec<ExonRecord>]) -> Vec<ReferenceAggregate> {
    let groups: Vec<((String, u32), ExonObservations)> = group_by_exon(sample_tables).into_iter().collect();
    log::info!(
        "Aggregating {} exons from {} samples",
        groups.len(),
        sample_tables.len()
    );

    groups
        .into_par_iter()
        .map(|((gene, exon), observations)| {
            let call_counts = CallCounts::from_calls(observations.calls.iter().copied());
            ReferenceAggregate {
                gene,
                exon,
                frequencies: call_counts.frequencies(call_counts.total),
                call_counts,
                depth: SummaryStats::from_values(&observations.depth),
                log2: SummaryStats::from_values(&observations.log2),
            }
        })
        .collect()
}

/// Aggregate bintest tables, taking the frequency denominator from `primary`.
///
/// Exons missing from the primary reference fall back to their own bintest
/// count.
pub fn aggregate_bintest(
    bintest_tables: &[Vec<ExonRecord>],
    primary: &[ReferenceAggregate],
) -> Vec<BintestAggregate> {
    let totals: HashMap<(&str, u32), u64> = primary
        .iter()
        .map(|entry| ((entry.gene.as_str(), entry.exon), entry.call_counts.total))
        .collect();

    let mut aggregates = Vec::new();
    for ((gene, exon), observations) in group_by_exon(bintest_tables) {
        let call_counts = CallCounts::from_calls(observations.calls.iter().copied());
        let reference_total = match totals.get(&(gene.as_str(), exon)) {
            Some(&total) => total,
            None => {
                log::warn!(
                    "{} exon {} missing from primary reference, using bintest count {}",
                    gene,
                    exon,
                    call_counts.total
                );
                call_counts.total
            }
        };

        aggregates.push(BintestAggregate {
            frequencies: call_counts.frequencies(reference_total),
            gene,
            exon,
            call_counts,
            reference_total,
        });
    }

    aggregates
}

const COUNT_COLUMNS: [&str; 5] = [
    "het_del_count",
    "hom_del_count",
    "dup_count",
    "wildtype_count",
    "total_count",
];
const FREQUENCY_COLUMNS: [&str; 3] = ["het_del_frequency", "hom_del_frequency", "dup_frequency"];
const STAT_NAMES: [&str; 9] = [
    "mean",
    "median",
    "q1",
    "q3",
    "std",
    "min",
    "max",
    "actual_minimum",
    "actual_maximum",
];

fn stat_values(stats: &SummaryStats) -> [f64; 9] {
    [
        stats.mean,
        stats.median,
        stats.q1,
        stats.q3,
        stats.std,
        stats.min,
        stats.max,
        stats.lower_fence,
        stats.upper_fence,
    ]
}

fn stats_from_values(values: [f64; 9]) -> SummaryStats {
    SummaryStats {
        mean: values[0],
        median: values[1],
        q1: values[2],
        q3: values[3],
        std: values[4],
        min: values[5],
        max: values[6],
        lower_fence: values[7],
        upper_fence: values[8],
    }
}

/// Columns shared by both reference layouts: keys, counts and frequencies
fn key_columns<'a, I>(rows: I) -> (Vec<Field>, Vec<ArrayRef>)
where
    I: Iterator<Item = (&'a str, u32, CallCounts, Frequencies)> + Clone,
{
    let mut fields = vec![
        Field::new("gene", DataType::Utf8, false),
        Field::new("exon", DataType::UInt32, false),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(rows.clone().map(|r| r.0).collect::<Vec<_>>())),
        Arc::new(UInt32Array::from(rows.clone().map(|r| r.1).collect::<Vec<_>>())),
    ];

    for (i, name) in COUNT_COLUMNS.iter().enumerate() {
        fields.push(Field::new(*name, DataType::UInt64, false));
        columns.push(Arc::new(UInt64Array::from(
            rows.clone().map(|r| r.2.as_array()[i]).collect::<Vec<_>>(),
        )));
    }

    let frequency = |f: &Frequencies, i: usize| [f.het_del, f.hom_del, f.dup][i];
    for (i, name) in FREQUENCY_COLUMNS.iter().enumerate() {
        fields.push(Field::new(*name, DataType::Float64, false));
        columns.push(Arc::new(Float64Array::from(
            rows.clone().map(|r| frequency(&r.3, i)).collect::<Vec<_>>(),
        )));
    }

    (fields, columns)
}

fn write_batch<P: AsRef<Path>>(path: P, fields: Vec<Field>, columns: Vec<ArrayRef>) -> CnvResult<()> {
    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns)?;

    crate::utils::ensure_parent_dirs(&path)?;
    let file = File::create(&path)?;
    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

/// Persist the primary reference as Parquet
pub fn write_reference_parquet<P: AsRef<Path>>(reference: &[ReferenceAggregate], path: P) -> CnvResult<()> {
    let rows = reference
        .iter()
        .map(|r| (r.gene.as_str(), r.exon, r.call_counts, r.frequencies));
    let (mut fields, mut columns) = key_columns(rows);

    for (metric, select) in [
        ("depth", (|r: &ReferenceAggregate| r.depth) as fn(&ReferenceAggregate) -> SummaryStats),
        ("log2", |r: &ReferenceAggregate| r.log2),
    ] {
        for (i, stat) in STAT_NAMES.iter().enumerate() {
            fields.push(Field::new(format!("{}_{}", stat, metric), DataType::Float64, false));
            columns.push(Arc::new(Float64Array::from(
                reference
                    .iter()
                    .map(|r| stat_values(&select(r))[i])
                    .collect::<Vec<_>>(),
            )));
        }
    }

    write_batch(&path, fields, columns)?;
    log::info!("Wrote {} reference exons to {:?}", reference.len(), path.as_ref());
    Ok(())
}

/// Persist the bintest reference as Parquet
pub fn write_bintest_reference_parquet<P: AsRef<Path>>(reference: &[BintestAggregate], path: P) -> CnvResult<()> {
    let rows = reference
        .iter()
        .map(|r| (r.gene.as_str(), r.exon, r.call_counts, r.frequencies));
    let (mut fields, mut columns) = key_columns(rows);

    fields.push(Field::new("reference_total", DataType::UInt64, false));
    columns.push(Arc::new(UInt64Array::from(
        reference.iter().map(|r| r.reference_total).collect::<Vec<_>>(),
    )));

    write_batch(&path, fields, columns)?;
    log::info!("Wrote {} bintest reference exons to {:?}", reference.len(), path.as_ref());
    Ok(())
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> CnvResult<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| CnvError::MissingColumn(name.to_string()))
}

struct KeyColumns<'a> {
    gene: &'a StringArray,
    exon: &'a UInt32Array,
    counts: Vec<&'a UInt64Array>,
    frequencies: Vec<&'a Float64Array>,
}

impl<'a> KeyColumns<'a> {
    fn from_batch(batch: &'a RecordBatch) -> CnvResult<Self> {
        Ok(KeyColumns {
            gene: column(batch, "gene")?,
            exon: column(batch, "exon")?,
            counts: COUNT_COLUMNS
                .iter()
                .map(|name| column::<UInt64Array>(batch, name))
                .collect::<CnvResult<_>>()?,
            frequencies: FREQUENCY_COLUMNS
                .iter()
                .map(|name| column::<Float64Array>(batch, name))
                .collect::<CnvResult<_>>()?,
        })
    }

    fn row(&self, i: usize) -> (String, u32, CallCounts, Frequencies) {
        let count = |j: usize| self.counts[j].value(i);
        (
            self.gene.value(i).to_string(),
            self.exon.value(i),
            CallCounts {
                het_del: count(0),
                hom_del: count(1),
                dup: count(2),
                wildtype: count(3),
                total: count(4),
            },
            Frequencies {
                het_del: self.frequencies[0].value(i),
                hom_del: self.frequencies[1].value(i),
                dup: self.frequencies[2].value(i),
            },
        )
    }
}

fn read_batches<P: AsRef<Path>>(path: P) -> CnvResult<Vec<RecordBatch>> {
    let file = File::open(&path)
        .map_err(|_| CnvError::FileNotFound(path.as_ref().to_string_lossy().to_string()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok(batches)
}

/// Load a primary reference written by [`write_reference_parquet`]
pub fn read_reference_parquet<P: AsRef<Path>>(path: P) -> CnvResult<Vec<ReferenceAggregate>> {
    let mut reference = Vec::new();

    for batch in read_batches(&path)? {
        let keys = KeyColumns::from_batch(&batch)?;
        let mut stat_columns: HashMap<String, &Float64Array> = HashMap::new();
        for metric in ["depth", "log2"] {
            for stat in STAT_NAMES {
                let name = format!("{}_{}", stat, metric);
                let array = column::<Float64Array>(&batch, &name)?;
                stat_columns.insert(name, array);
            }
        }

        let stats = |metric: &str, i: usize| {
            let mut values = [0.0; 9];
            for (j, stat) in STAT_NAMES.iter().enumerate() {
                values[j] = stat_columns[&format!("{}_{}", stat, metric)].value(i);
            }
            stats_from_values(values)
        };

        for i in 0..batch.num_rows() {
            let (gene, exon, call_counts, frequencies) = keys.row(i);
            reference.push(ReferenceAggregate {
                gene,
                exon,
                call_counts,
                frequencies,
                depth: stats("depth", i),
                log2: stats("log2", i),
            });
        }
    }

    log::info!("Loaded {} reference exons from {:?}", reference.len(), path.as_ref());
    Ok(reference)
}

/// Load a bintest reference written by [`write_bintest_reference_parquet`]
pub fn read_bintest_reference_parquet<P: AsRef<Path>>(path: P) -> CnvResult<Vec<BintestAggregate>> {
    let mut reference = Vec::new();

    for batch in read_batches(&path)? {
        let keys = KeyColumns::from_batch(&batch)?;
        let totals = column::<UInt64Array>(&batch, "reference_total")?;

        for i in 0..batch.num_rows() {
            let (gene, exon, call_counts, frequencies) = keys.row(i);
            reference.push(BintestAggregate {
                gene,
                exon,
                call_counts,
                reference_total: totals.value(i),
                frequencies,
            });
        }
    }

    log::info!("Loaded {} bintest reference exons from {:?}", reference.len(), path.as_ref());
    Ok(reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::record;
    use tempfile::tempdir;

    fn sample(call: CallClass, depth: f64, log2: f64) -> Vec<ExonRecord> {
        let mut r = record("X", 1, call);
        r.depth = depth;
        r.log2 = log2;
        vec![r]
    }

    fn cohort() -> Vec<Vec<ExonRecord>> {
        vec![
            sample(CallClass::HomDeletion, 10.0, -2.0),
            sample(CallClass::HetDeletion, 20.0, -0.8),
            sample(CallClass::WildType, 30.0, 0.0),
            sample(CallClass::Duplication, 40.0, 0.6),
        ]
    }

    #[test]
    fn test_call_counts_and_frequencies() {
        let reference = aggregate(&cohort());
        assert_eq!(reference.len(), 1);

        let entry = &reference[0];
        assert_eq!(entry.call_counts.as_array(), [1, 1, 1, 1, 4]);
        assert_eq!(entry.frequencies.het_del, 0.25);
        assert_eq!(entry.frequencies.hom_del, 0.25);
        assert_eq!(entry.frequencies.dup, 0.25);
    }

    #[test]
    fn test_summary_stats() {
        let stats = SummaryStats::from_values(&[40.0, 10.0, 30.0, 20.0]);
        assert_eq!(stats.mean, 25.0);
        assert_eq!(stats.median, 25.0);
        assert_eq!(stats.q1, 17.5);
        assert_eq!(stats.q3, 32.5);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 40.0);
        assert!((stats.std - 125f64.sqrt()).abs() < 1e-12);
        assert_eq!(stats.lower_fence, 17.5 - 22.5);
        assert_eq!(stats.upper_fence, 32.5 + 22.5);
    }

    #[test]
    fn test_quantile_single_value() {
        assert_eq!(quantile(&[3.0], 0.25), 3.0);
        assert!(quantile(&[], 0.5).is_nan());
    }

    #[test]
    fn test_aggregate_groups_sorted_by_gene_and_exon() {
        let tables = vec![
            vec![record("B", 2, CallClass::WildType), record("A", 3, CallClass::WildType)],
            vec![record("A", 1, CallClass::HetDeletion), record("B", 2, CallClass::Duplication)],
        ];
        let reference = aggregate(&tables);
        let keys: Vec<(&str, u32)> = reference.iter().map(|r| (r.gene.as_str(), r.exon)).collect();
        assert_eq!(keys, vec![("A", 1), ("A", 3), ("B", 2)]);
        assert_eq!(reference[2].call_counts.total, 2);
        assert_eq!(reference[2].frequencies.dup, 0.5);
    }

    #[test]
    fn test_bintest_uses_primary_denominator() {
        let primary = aggregate(&cohort());
        let bintest = vec![
            sample(CallClass::HetDeletion, 20.0, -0.8),
            vec![record("Y", 2, CallClass::Duplication)],
        ];

        let aggregates = aggregate_bintest(&bintest, &primary);
        assert_eq!(aggregates.len(), 2);

        let x = aggregates.iter().find(|a| a.gene == "X").unwrap();
        assert_eq!(x.call_counts.total, 1);
        assert_eq!(x.reference_total, 4);
        assert_eq!(x.frequencies.het_del, 0.25);
        assert_eq!(x.frequencies.dup, 0.0);

        let y = aggregates.iter().find(|a| a.gene == "Y").unwrap();
        assert_eq!(y.reference_total, 1);
        assert_eq!(y.frequencies.dup, 1.0);
    }

    #[test]
    fn test_reference_parquet_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cnv_reference.parquet");

        let reference = aggregate(&cohort());
        write_reference_parquet(&reference, &path).unwrap();
        let loaded = read_reference_parquet(&path).unwrap();

        assert_eq!(loaded, reference);
    }

    #[test]
    fn test_bintest_parquet_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cnv_reference_bintest.parquet");

        let primary = aggregate(&cohort());
        let bintest = aggregate_bintest(&[sample(CallClass::HomDeletion, 5.0, -3.0)], &primary);
        write_bintest_reference_parquet(&bintest, &path).unwrap();

        assert_eq!(read_bintest_reference_parquet(&path).unwrap(), bintest);
    }

    #[test]
    fn test_read_missing_parquet() {
        assert!(matches!(
            read_reference_parquet("/nonexistent/reference.parquet"),
            Err(CnvError::FileNotFound(_))
        ));
    }
}
