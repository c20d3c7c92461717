use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::BufReader;
use std::path::Path;

use crate::error::{ReduceError, Result};

/// Read and parse a JSON document straight from a buffered file stream
pub fn read_and_parse_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = fs::File::open(path).map_err(|e| {
        ReduceError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open {}: {}", path.display(), e),
        ))
    })?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
                label
            ))
            .progress_chars("#>-"),
    );
    pb
}

/// Create the directory if needed; existing content is left in place
pub fn ensure_directory(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path)
}

/// Rayon pool with `workers` threads, or the rayon default for 0
pub fn create_thread_pool(workers: usize) -> Option<rayon::ThreadPool> {
    if workers == 0 {
        return None;
    }
    match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => Some(pool),
        Err(e) => {
            warn!("Failed to build a {}-thread pool, using the default: {}", workers, e);
            None
        }
    }
}
