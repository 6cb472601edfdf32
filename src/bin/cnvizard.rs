//! CLI binary for CNVizard - normalizes, annotates, filters and exports a CNVkit sample

use clap::Parser;
use cnvizard_rs::{
    consecutive::{consecutive_runs, validate_run_size_config, VariantClass},
    export::{export_views, view_paths, ExportBundle},
    filter::{self, FilterCriteria},
    frequency::{annotate_bintest, annotate_primary, FrequencyIndex},
    normalize::{normalize, normalize_parental, normalize_primary, OmimIndex},
    reference::{read_bintest_reference_parquet, read_reference_parquet},
    table::{read_candidate_genes, read_cnv_table, read_omim_table},
    trio::{apply_trio_filters, join_trio, TrioCriteria, TrioRecord},
    utils::{validate_file_readable, Timer},
    CallClass, CnvError, CnvResult, ExonRecord, RunSizeConfig,
};
use env_logger::Env;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "cnvizard")]
#[command(about = "CNVizard - copy-number variant table analysis and export")]
#[command(long_about = "
CNVizard processes a CNVkit per-exon table (.cnr) of one sample:
1. Splits multi-gene rows and parses gene_exon labels, drops Antitarget bins
2. Classifies every exon from its log2 ratio
   (0 = hom. deletion, 1 = het. deletion, 2 = wild type, 3 = duplication)
3. Merges OMIM annotations and cohort reference frequencies
4. Applies the requested filters to the primary table
5. Detects consecutively deleted or duplicated exons per gene
6. Exports the preset views as TSV files

Reference frequencies come from Parquet files written by build_reference.
Resource paths can also be set with the CNVIZARD_OMIM, CNVIZARD_REFERENCE,
CNVIZARD_REFERENCE_BINTEST and CNVIZARD_CANDIDATES environment variables.
")]
struct Args {
    /// Path to the sample CNVkit .cnr table
    #[arg(long, value_name = "FILE")]
    cnr: PathBuf,

    /// Path to the sample bintest table
    #[arg(long, value_name = "FILE")]
    bintest: Option<PathBuf>,

    /// OMIM annotation table (gene, OMIMG, Disease, OMIMP, Inheritance)
    #[arg(long, value_name = "FILE", env = "CNVIZARD_OMIM")]
    omim: Option<PathBuf>,

    /// Primary cohort reference Parquet file
    #[arg(long, value_name = "FILE", env = "CNVIZARD_REFERENCE")]
    reference: Option<PathBuf>,

    /// Bintest cohort reference Parquet file
    #[arg(long, value_name = "FILE", env = "CNVIZARD_REFERENCE_BINTEST")]
    bintest_reference: Option<PathBuf>,

    /// Candidate gene list, one symbol per line
    #[arg(long, value_name = "FILE", env = "CNVIZARD_CANDIDATES")]
    candidates: Option<PathBuf>,

    /// CNVkit .cnr table of the father
    #[arg(long, value_name = "FILE")]
    father: Option<PathBuf>,

    /// CNVkit .cnr table of the mother
    #[arg(long, value_name = "FILE")]
    mother: Option<PathBuf>,

    /// Output directory for the exported views
    #[arg(long, value_name = "DIR")]
    output_dir: PathBuf,

    /// File name prefix for the exported views (defaults to the .cnr file stem)
    #[arg(long)]
    prefix: Option<String>,

    /// Keep only these chromosomes
    #[arg(long = "chromosome", value_name = "CHROM", value_delimiter = ',')]
    chromosomes: Vec<String>,

    /// Keep only these calls
    #[arg(long = "call", value_name = "CALL", value_delimiter = ',', value_parser = clap::value_parser!(u8).range(0..=3))]
    calls: Vec<u8>,

    /// Keep only these genes
    #[arg(long = "gene", value_name = "GENE", value_delimiter = ',')]
    genes: Vec<String>,

    /// Minimum read depth
    #[arg(long)]
    min_depth: Option<f64>,

    /// Minimum bin weight
    #[arg(long)]
    min_weight: Option<f64>,

    /// Minimum log2 ratio
    #[arg(long, allow_negative_numbers = true)]
    min_log2: Option<f64>,

    /// Maximum cohort frequency of heterozygous deletions
    #[arg(long)]
    max_het_del_frequency: Option<f64>,

    /// Maximum cohort frequency of homozygous deletions
    #[arg(long)]
    max_hom_del_frequency: Option<f64>,

    /// Maximum cohort frequency of duplications
    #[arg(long)]
    max_dup_frequency: Option<f64>,

    /// Start coordinate (needs --end and exactly one --chromosome)
    #[arg(long)]
    start: Option<u64>,

    /// End coordinate (needs --start and exactly one --chromosome)
    #[arg(long)]
    end: Option<u64>,

    /// Minimum number of consecutive deleted exons
    #[arg(long, default_value_t = 2)]
    min_deletion_run: usize,

    /// Minimum number of consecutive duplicated exons
    #[arg(long, default_value_t = 2)]
    min_duplication_run: usize,

    /// Trio view: keep only these index calls
    #[arg(long = "index-call", value_delimiter = ',', value_parser = clap::value_parser!(u8).range(0..=3))]
    index_calls: Vec<u8>,

    /// Trio view: keep only these paternal calls
    #[arg(long = "father-call", value_delimiter = ',', value_parser = clap::value_parser!(u8).range(0..=3))]
    father_calls: Vec<u8>,

    /// Trio view: keep only these maternal calls
    #[arg(long = "mother-call", value_delimiter = ',', value_parser = clap::value_parser!(u8).range(0..=3))]
    mother_calls: Vec<u8>,

    /// Also export every view unfiltered as <prefix>_all_<view>.tsv
    #[arg(long)]
    export_all: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force: bool,
}

fn call_set(codes: &[u8]) -> CnvResult<BTreeSet<CallClass>> {
    codes
        .iter()
        .map(|&code| {
            CallClass::from_code(code)
                .ok_or_else(|| CnvError::InvalidConfig(format!("unknown call code {}", code)))
        })
        .collect()
}

impl Args {
    fn filter_criteria(&self) -> CnvResult<FilterCriteria> {
        Ok(FilterCriteria {
            chromosomes: self.chromosomes.iter().cloned().collect(),
            calls: call_set(&self.calls)?,
            genes: self.genes.iter().cloned().collect(),
            min_depth: self.min_depth,
            min_weight: self.min_weight,
            min_log2: self.min_log2,
            max_het_del_frequency: self.max_het_del_frequency,
            max_hom_del_frequency: self.max_hom_del_frequency,
            max_dup_frequency: self.max_dup_frequency,
            start: self.start,
            end: self.end,
        })
    }

    fn trio_criteria(&self) -> CnvResult<TrioCriteria> {
        Ok(TrioCriteria {
            index_calls: call_set(&self.index_calls)?,
            father_calls: call_set(&self.father_calls)?,
            mother_calls: call_set(&self.mother_calls)?,
        })
    }

    fn run_size_config(&self) -> RunSizeConfig {
        RunSizeConfig {
            min_deletion_run: self.min_deletion_run,
            min_duplication_run: self.min_duplication_run,
        }
    }

    fn export_prefix(&self) -> String {
        self.prefix.clone().unwrap_or_else(|| {
            self.cnr
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.split('.').next().unwrap_or(n).to_string())
                .unwrap_or_default()
        })
    }
}

fn load_parent(path: Option<&Path>) -> CnvResult<Vec<ExonRecord>> {
    match path {
        Some(path) => normalize_parental(read_cnv_table(path)?),
        None => Ok(Vec::new()),
    }
}

/// Build the preset views from an annotated primary and bintest table
fn build_bundle(
    total: Vec<ExonRecord>,
    bintest: Vec<ExonRecord>,
    candidates: &BTreeSet<String>,
    run_sizes: &RunSizeConfig,
    trio: Option<Vec<TrioRecord>>,
) -> ExportBundle {
    ExportBundle {
        hom_del: filter::hom_deletions(&total),
        total_candidate: filter::candidate_variants(&total, candidates),
        bintest_candidate: filter::candidate_variants(&bintest, candidates),
        consecutive_del: consecutive_runs(&total, VariantClass::Deletion, run_sizes),
        consecutive_dup: consecutive_runs(&total, VariantClass::Duplication, run_sizes),
        trio,
        total,
        bintest,
    }
}

fn analyse(args: &Args) -> CnvResult<Vec<PathBuf>> {
    let inputs = [
        Some(&args.cnr),
        args.bintest.as_ref(),
        args.omim.as_ref(),
        args.reference.as_ref(),
        args.bintest_reference.as_ref(),
        args.candidates.as_ref(),
        args.father.as_ref(),
        args.mother.as_ref(),
    ];
    for path in inputs.into_iter().flatten() {
        validate_file_readable(path)?;
    }

    let criteria = args.filter_criteria()?;
    let trio_criteria = args.trio_criteria()?;
    let run_sizes = args.run_size_config();
    validate_run_size_config(&run_sizes)?;

    let omim = match &args.omim {
        Some(path) => OmimIndex::new(read_omim_table(path)?),
        None => OmimIndex::default(),
    };
    log::info!("OMIM annotations for {} genes", omim.len());

    let (total, bintest) = {
        let _timer = Timer::new("Normalizing sample tables");
        let mut total = normalize_primary(read_cnv_table(&args.cnr)?, &omim)?;
        log::info!("Normalized {} exons from {:?}", total.len(), args.cnr);

        let mut bintest = match &args.bintest {
            Some(path) => normalize(read_cnv_table(path)?, &omim)?,
            None => Vec::new(),
        };

        if let Some(path) = &args.reference {
            let index = FrequencyIndex::from_reference(&read_reference_parquet(path)?);
            total = annotate_primary(total, &index);
        }
        if let Some(path) = &args.bintest_reference {
            let index = FrequencyIndex::from_bintest(&read_bintest_reference_parquet(path)?);
            bintest = annotate_bintest(bintest, &index);
        }
        (total, bintest)
    };

    // Only the primary table follows the user filters.
    let filtered = filter::apply(&total, &criteria);
    log::info!("{} of {} exons pass the filters", filtered.len(), total.len());

    let candidates = match &args.candidates {
        Some(path) => read_candidate_genes(path)?,
        None => BTreeSet::new(),
    };

    let trio = if args.father.is_some() || args.mother.is_some() {
        let father = load_parent(args.father.as_deref())?;
        let mother = load_parent(args.mother.as_deref())?;
        let rows = join_trio(&total, &father, &mother);
        Some(apply_trio_filters(&rows, &trio_criteria))
    } else {
        None
    };

    let prefix = args.export_prefix();
    let mut exports = vec![(
        build_bundle(filtered, bintest.clone(), &candidates, &run_sizes, trio),
        prefix.clone(),
    )];
    if args.export_all {
        let all_prefix = if prefix.is_empty() {
            "all".to_string()
        } else {
            format!("{}_all", prefix)
        };
        exports.push((
            build_bundle(total, bintest, &candidates, &run_sizes, None),
            all_prefix,
        ));
    }

    if !args.force {
        for (bundle, prefix) in &exports {
            if let Some(existing) = view_paths(bundle, &args.output_dir, prefix)
                .into_iter()
                .find(|path| path.exists())
            {
                return Err(CnvError::Io(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("Output file {:?} already exists. Use --force to overwrite.", existing),
                )));
            }
        }
    }

    let bundle = &exports[0].0;
    log::info!("Homozygous deletions: {}", bundle.hom_del.len());
    log::info!("Consecutive deletions: {}", bundle.consecutive_del.len());
    log::info!("Consecutive duplications: {}", bundle.consecutive_dup.len());

    let _timer = Timer::new("Exporting views");
    let mut written = Vec::new();
    for (bundle, prefix) in &exports {
        written.extend(export_views(bundle, &args.output_dir, prefix)?);
    }
    Ok(written)
}

fn run() -> CnvResult<()> {
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

    log::info!("Starting CNVizard analysis");
    log::info!("Sample table: {:?}", args.cnr);
    log::info!("Output directory: {:?}", args.output_dir);

    let written = analyse(&args)?;
    for path in &written {
        log::info!("Wrote {:?}", path);
    }
    log::info!("Analysis completed successfully");

    Ok(())
}

/// Handle application errors and provide user-friendly messages
fn handle_error(error: CnvError) -> ! {
    match error {
        CnvError::FileNotFound(path) => {
            eprintln!("Error: File not found: {}", path);
            eprintln!("Please check that the file exists and is readable.");
        }
        CnvError::MissingColumn(column) => {
            eprintln!("Error: Required column '{}' not found", column);
            eprintln!("Please check that the table is a CNVkit .cnr or bintest file.");
        }
        e @ (CnvError::MalformedGeneField(_)
        | CnvError::MalformedLabel { .. }
        | CnvError::InvalidSignal { .. }
        | CnvError::InvalidRecord(_)) => {
            eprintln!("Error: {}", e);
            eprintln!("Please check that the table is properly formatted.");
        }
        CnvError::InvalidConfig(msg) => {
            eprintln!("Error: Invalid configuration: {}", msg);
            eprintln!("Please check your filter and run size options.");
        }
        CnvError::Parquet(ref e) => {
            eprintln!("Error: Reference file error: {}", e);
            eprintln!("Please rebuild the reference with build_reference.");
        }
        CnvError::Arrow(ref e) => {
            eprintln!("Error: Reference data error: {}", e);
            eprintln!("Please rebuild the reference with build_reference.");
        }
        CnvError::Csv(ref e) => {
            eprintln!("Error: Table processing error: {}", e);
        }
        CnvError::Io(ref e) => {
            eprintln!("Error: I/O error: {}", e);
            eprintln!("Please check file permissions and disk space.");
        }
    }
    std::process::exit(1);
}

fn main() {
    if let Err(e) = run() {
        handle_error(e);
    }
}
