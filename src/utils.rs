//! Utility functions for file handling and common operations

use crate::{CnvError, CnvResult};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Check if a file is gzip compressed
pub fn is_gzipped<P: AsRef<Path>>(path: P) -> CnvResult<bool> {
    let mut file = File::open(path)?;
    let mut buffer = [0; 2];

    match file.read_exact(&mut buffer) {
        Ok(()) => Ok(buffer == [0x1f, 0x8b]),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(CnvError::Io(e)),
    }
}

/// Open a tab-separated table, decompressing gzip input transparently
pub fn open_table_reader<P: AsRef<Path>>(path: P) -> CnvResult<Box<dyn BufRead>> {
    let file = File::open(&path)
        .map_err(|_| CnvError::FileNotFound(path.as_ref().to_string_lossy().to_string()))?;

    let reader: Box<dyn BufRead> = if is_gzipped(&path)? {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    Ok(reader)
}

/// Create an output table, gzip compressed when the path ends in `.gz`
pub fn create_table_writer<P: AsRef<Path>>(path: P) -> CnvResult<Box<dyn Write>> {
    ensure_parent_dirs(&path)?;
    let file = File::create(&path)?;

    let writer: Box<dyn Write> = if has_extension(&path, "gz") {
        Box::new(GzEncoder::new(BufWriter::new(file), Compression::default()))
    } else {
        Box::new(BufWriter::new(file))
    };

    Ok(writer)
}

/// Get the number of CPU cores, with a fallback default
pub fn get_num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}

/// Validate file paths and check if they exist
pub fn validate_file_exists<P: AsRef<Path>>(path: P) -> CnvResult<()> {
    if !path.as_ref().exists() {
        return Err(CnvError::FileNotFound(
            path.as_ref().to_string_lossy().to_string(),
        ));
    }
    Ok(())
}

/// Validate that a file is readable
pub fn validate_file_readable<P: AsRef<Path>>(path: P) -> CnvResult<()> {
    validate_file_exists(&path)?;

    File::open(&path)
        .map_err(|_| CnvError::FileNotFound(path.as_ref().to_string_lossy().to_string()))?;

    Ok(())
}

/// Check if a path has a specific extension
pub fn has_extension<P: AsRef<Path>>(path: P, extension: &str) -> bool {
    path.as_ref()
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Create parent directories if they don't exist
pub fn ensure_parent_dirs<P: AsRef<Path>>(path: P) -> CnvResult<()> {
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Timer utility for measuring execution time
pub struct Timer {
    start: std::time::Instant,
    name: String,
}

impl Timer {
    pub fn new(name: &str) -> Self {
        log::info!("Starting: {}", name);
        Timer {
            start: std::time::Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        log::info!("Finished '{}' in {:.2?}", self.name, self.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_is_gzipped() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "test content").unwrap();
        assert!(!is_gzipped(temp_file.path()).unwrap());

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(&[0x1f, 0x8b]).unwrap();
        assert!(is_gzipped(temp_file.path()).unwrap());

        let temp_file = NamedTempFile::new().unwrap();
        assert!(!is_gzipped(temp_file.path()).unwrap());
    }

    #[test]
    fn test_gz_writer_round_trips_through_reader() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/table.tsv.gz");

        {
            let mut writer = create_table_writer(&path).unwrap();
            writeln!(writer, "gene\texon").unwrap();
            writeln!(writer, "A\t1").unwrap();
        }

        assert!(is_gzipped(&path).unwrap());
        let lines: Vec<String> = open_table_reader(&path).unwrap().lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["gene\texon", "A\t1"]);
    }

    #[test]
    fn test_open_missing_table() {
        assert!(matches!(
            open_table_reader("/nonexistent/table.tsv"),
            Err(CnvError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_validate_file_exists() {
        let temp_file = NamedTempFile::new().unwrap();
        assert!(validate_file_exists(temp_file.path()).is_ok());
        assert!(validate_file_readable(temp_file.path()).is_ok());

        assert!(validate_file_exists("/nonexistent/file").is_err());
    }

    #[test]
    fn test_has_extension() {
        assert!(has_extension("sample.cnr", "cnr"));
        assert!(has_extension("sample.TSV.GZ", "gz"));
        assert!(!has_extension("sample.tsv", "gz"));
        assert!(!has_extension("sample", "cnr"));
    }

    #[test]
    fn test_get_num_cpus() {
        assert!(get_num_cpus() >= 1);
    }

    #[test]
    fn test_timer() {
        let timer = Timer::new("test");
        std::thread::sleep(std::time::Duration::from_millis(1));
        assert!(timer.elapsed().as_millis() >= 1);
    }
}
