fn main() {
    println!("cnvizard-rs - Copy-number variant table analysis");
    println!();
    println!("Tools:");
    println!("  cnvizard        - Normalize, annotate, filter and export one sample (.cnr → TSV views)");
    println!("  build_reference - Aggregate a sample cohort into the reference (.cnr → Parquet)");
    println!();
    println!("For help with each tool:");
    println!("  cargo run --bin cnvizard -- --help");
    println!("  cargo run --bin build_reference -- --help");
    println!();
    println!("Quick start:");
    println!("  cargo run --bin build_reference -- --samples cohort/*.cnr --output-dir reference/");
    println!("  cargo run --bin cnvizard -- --cnr sample.cnr --reference reference/cnv_reference.parquet --output-dir out/");
}
