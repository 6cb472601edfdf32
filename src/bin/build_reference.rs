//! CLI binary building the cohort reference Parquet files from many CNVkit samples

use anyhow::{bail, Context, Result};
use clap::Parser;
use cnvizard_rs::{
    normalize::{normalize, OmimIndex},
    reference::{aggregate, aggregate_bintest, write_bintest_reference_parquet, write_reference_parquet},
    table::{read_cnv_table, read_omim_table},
    utils::{get_num_cpus, validate_file_readable, Timer},
    ExonRecord,
};
use env_logger::Env;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// File name of the primary reference inside the output directory
const REFERENCE_FILE: &str = "cnv_reference.parquet";
/// File name of the bintest reference inside the output directory
const BINTEST_REFERENCE_FILE: &str = "cnv_reference_bintest.parquet";

#[derive(Parser, Debug)]
#[command(name = "build_reference")]
#[command(about = "Build the CNVizard cohort reference from CNVkit sample tables")]
#[command(long_about = "
Aggregates the per-exon tables of a sample cohort into a reference of call
counts, call frequencies and depth / log2 box-plot statistics for every
(gene, exon). The bintest reference counts bintest calls over the number of
samples seen at the same exon in the primary reference.

Outputs cnv_reference.parquet and, when bintest samples are given,
cnv_reference_bintest.parquet inside the output directory.
")]
struct Args {
    /// Sample CNVkit .cnr tables
    #[arg(long, value_name = "FILE", num_args = 1.., required = true)]
    samples: Vec<PathBuf>,

    /// Sample bintest tables
    #[arg(long, value_name = "FILE", num_args = 1..)]
    bintest_samples: Vec<PathBuf>,

    /// OMIM annotation table
    #[arg(long, value_name = "FILE", env = "CNVIZARD_OMIM")]
    omim: Option<PathBuf>,

    /// Output directory for the reference files
    #[arg(long, value_name = "DIR")]
    output_dir: PathBuf,

    /// Number of threads used to load samples and compute statistics
    #[arg(long, default_value_t = get_num_cpus())]
    threads: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Force overwrite of existing reference files
    #[arg(short, long)]
    force: bool,
}

/// Read and normalize every table in parallel. Any failing sample fails the batch.
fn load_samples(paths: &[PathBuf], omim: &OmimIndex) -> Result<Vec<Vec<ExonRecord>>> {
    paths
        .par_iter()
        .map(|path| {
            let rows = read_cnv_table(path).with_context(|| format!("Failed to read {:?}", path))?;
            normalize(rows, omim).with_context(|| format!("Failed to normalize {:?}", path))
        })
        .collect()
}

fn check_output(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("Output file {:?} already exists. Use --force to overwrite.", path);
    }
    Ok(())
}

fn build(args: &Args) -> Result<Vec<PathBuf>> {
    if args.threads == 0 {
        bail!("Number of threads must be at least 1");
    }
    for path in args.samples.iter().chain(&args.bintest_samples) {
        validate_file_readable(path)?;
    }

    let reference_path = args.output_dir.join(REFERENCE_FILE);
    let bintest_path = args.output_dir.join(BINTEST_REFERENCE_FILE);
    check_output(&reference_path, args.force)?;
    if !args.bintest_samples.is_empty() {
        check_output(&bintest_path, args.force)?;
    }

    let omim = match &args.omim {
        Some(path) => OmimIndex::new(
            read_omim_table(path).with_context(|| format!("Failed to read OMIM table {:?}", path))?,
        ),
        None => OmimIndex::default(),
    };

    let mut written = Vec::new();

    let reference = {
        let _timer = Timer::new("Building primary reference");
        let samples = load_samples(&args.samples, &omim)?;
        let reference = aggregate(&samples);
        write_reference_parquet(&reference, &reference_path)
            .with_context(|| format!("Failed to write {:?}", reference_path))?;
        reference
    };
    written.push(reference_path);

    if !args.bintest_samples.is_empty() {
        let _timer = Timer::new("Building bintest reference");
        let bintest_samples = load_samples(&args.bintest_samples, &omim)?;
        let bintest = aggregate_bintest(&bintest_samples, &reference);
        write_bintest_reference_parquet(&bintest, &bintest_path)
            .with_context(|| format!("Failed to write {:?}", bintest_path))?;
        written.push(bintest_path);
    }

    Ok(written)
}

fn run() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads.max(1))
        .build_global()
        .context("Failed to initialize thread pool")?;

    log::info!("Building reference from {} samples", args.samples.len());
    log::info!("Bintest samples: {}", args.bintest_samples.len());
    log::info!("Output directory: {:?}", args.output_dir);
    log::info!("Threads: {}", args.threads);

    for path in build(&args)? {
        log::info!("Wrote {:?}", path);
    }

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cnvizard_rs::reference::{read_bintest_reference_parquet, read_reference_parquet};
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn sample(log2: &[f64]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "chromosome\tstart\tend\tgene\tdepth\tlog2\tweight").unwrap();
        for (i, value) in log2.iter().enumerate() {
            let start = 100 * (i + 1);
            writeln!(file, "chr1\t{}\t{}\tGENE_{}\t40\t{}\t1", start, start + 50, i + 1, value).unwrap();
        }
        file
    }

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["build_reference"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_samples_required() {
        assert!(Args::try_parse_from(["build_reference", "--output-dir", "out"]).is_err());
    }

    #[test]
    fn test_build_reference() {
        let a = sample(&[-2.0, 0.0]);
        let b = sample(&[-0.6, 0.5]);
        let bintest = sample(&[-0.6]);
        let dir = tempdir().unwrap();

        let args = args(&[
            "--samples",
            a.path().to_str().unwrap(),
            b.path().to_str().unwrap(),
            "--bintest-samples",
            bintest.path().to_str().unwrap(),
            "--output-dir",
            dir.path().to_str().unwrap(),
        ]);

        let written = build(&args).unwrap();
        assert_eq!(written.len(), 2);

        let reference = read_reference_parquet(&written[0]).unwrap();
        assert_eq!(reference.len(), 2);
        assert_eq!(reference[0].exon, 1);
        assert_eq!(reference[0].call_counts.as_array(), [1, 1, 0, 0, 2]);
        assert_eq!(reference[1].call_counts.as_array(), [0, 0, 1, 1, 2]);

        let bintest = read_bintest_reference_parquet(&written[1]).unwrap();
        assert_eq!(bintest.len(), 1);
        assert_eq!(bintest[0].reference_total, 2);
        assert_eq!(bintest[0].frequencies.het_del, 0.5);

        // second run refuses to overwrite
        assert!(build(&args).is_err());
    }

    #[test]
    fn test_malformed_sample_fails_batch() {
        let good = sample(&[0.0]);
        let mut bad = NamedTempFile::new().unwrap();
        writeln!(bad, "chromosome\tstart\tend\tgene\tdepth\tlog2\tweight").unwrap();
        writeln!(bad, "chr1\t1\t2\tNOEXON\t40\t0.0\t1").unwrap();
        let dir = tempdir().unwrap();

        let args = args(&[
            "--samples",
            good.path().to_str().unwrap(),
            bad.path().to_str().unwrap(),
            "--output-dir",
            dir.path().to_str().unwrap(),
        ]);
        assert!(build(&args).is_err());
        assert!(!dir.path().join(REFERENCE_FILE).exists());
    }
}
