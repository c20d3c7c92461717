use log::{info, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::coco::{CocoFile, Detection};
use crate::config::PROGRESS_INTERVAL;
use crate::error::{ReduceError, Result};
use crate::types::{CopyStats, ImageCount};
use crate::utils::{create_progress_bar, ensure_directory, read_and_parse_json};

/// Fail unless `path` names an existing file
pub fn check_input_exists(path: &Path, what: &str) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ReduceError::Config(format!(
            "{} not found: {}",
            what,
            path.display()
        )))
    }
}

/// Fail if `path` exists and overwriting was not requested
pub fn check_output_path(path: &Path, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        return Err(ReduceError::Config(format!(
            "output path already exists: {} (pass --overwrite to replace it)",
            path.display()
        )));
    }
    if path.is_dir() {
        return Err(ReduceError::Config(format!(
            "output path is a directory: {}",
            path.display()
        )));
    }
    Ok(())
}

/// Load a complete COCO document
pub fn load_coco_file(path: &Path) -> Result<CocoFile> {
    info!("Loading json file {}...", path.display());
    read_and_parse_json(path)
}

/// Load a detector results file
pub fn load_detections(path: &Path) -> Result<Vec<Detection>> {
    info!("Loading detections {}...", path.display());
    read_and_parse_json(path)
}

/// Serialize `value` as compact JSON, creating parent directories as needed
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_directory(parent)?;
    }
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    info!("Wrote {}", path.display());
    Ok(())
}

pub fn write_coco_file(path: &Path, coco: &CocoFile) -> Result<()> {
    write_json(path, coco)
}

pub fn write_detections(path: &Path, detections: &[Detection]) -> Result<()> {
    write_json(path, &detections)
}

/// `<dir>_reduced` next to `dir`
pub fn reduced_sibling_dir(dir: &Path) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "images".to_string());
    let reduced = format!("{}_reduced", name);
    match dir.parent() {
        Some(parent) => parent.join(reduced),
        None => PathBuf::from(reduced),
    }
}

/// Copy `file_names` from `src_dir` into `dst_dir`, replacing existing files.
///
/// Missing or failing sources are warned about and counted; only failing to
/// create the destination directory aborts.
pub fn copy_images(file_names: &[String], src_dir: &Path, dst_dir: &Path) -> Result<CopyStats> {
    ensure_directory(dst_dir)?;
    info!("{} images found", file_names.len());

    let pb = create_progress_bar(file_names.len() as u64, "Copy");
    let mut stats = CopyStats::default();
    for file_name in file_names {
        let source = src_dir.join(file_name);
        let target = dst_dir.join(file_name);
        pb.inc(1);

        if !source.is_file() {
            warn!("Image file not found: {}", source.display());
            stats.missing += 1;
            continue;
        }
        if let Some(parent) = target.parent() {
            if let Err(e) = ensure_directory(parent) {
                warn!("Failed to create {}: {}", parent.display(), e);
                stats.failed += 1;
                continue;
            }
        }
        match fs::copy(&source, &target) {
            Ok(_) => {
                stats.copied += 1;
                if stats.copied % PROGRESS_INTERVAL == 0 {
                    info!("{} images copied", stats.copied);
                }
            }
            Err(e) => {
                warn!("Failed to copy image {}: {}", source.display(), e);
                stats.failed += 1;
            }
        }
    }
    pb.finish_with_message("Copy complete");
    Ok(stats)
}

/// Count listed images, distinct annotated image ids and annotations
pub fn count_images(coco: &CocoFile) -> ImageCount {
    let annotated: HashSet<u64> = coco.annotations.iter().map(|a| a.image_id).collect();
    ImageCount {
        images: coco.images.len(),
        annotated_images: annotated.len(),
        annotations: coco.annotations.len(),
    }
}
