use log::info;
use std::path::PathBuf;

use crate::coco::CocoFile;
use crate::config::{Args, FilterConfig};
use crate::error::{ReduceError, Result};
use crate::index::CocoIndex;
use crate::io::{
    check_input_exists, check_output_path, copy_images, load_coco_file, load_detections,
    write_coco_file, write_detections,
};
use crate::predicates::{BlurScorer, PredicateBank};
use crate::selector::{filter_detections, select, CategoryRemap, Selection};
use crate::types::ReductionStats;
use crate::utils::create_thread_pool;

/// Files touched by one reduction run
#[derive(Debug, Clone, Default)]
pub struct ReduceJob {
    pub input_json: PathBuf,
    pub output_json: PathBuf,
    pub detections_json: Option<PathBuf>,
    pub detections_output: Option<PathBuf>,
    pub copy_images_to: Option<PathBuf>,
    pub workers: usize,
}

impl From<&Args> for ReduceJob {
    fn from(args: &Args) -> Self {
        Self {
            input_json: args.input_json.clone(),
            output_json: args.output_json.clone(),
            detections_json: args.detections_json.clone(),
            detections_output: args.detections_output.clone(),
            copy_images_to: args.copy_images_to.clone(),
            workers: args.workers,
        }
    }
}

/// Filter an in-memory COCO document and build the reduced document
pub fn reduce_coco_file(
    coco: &CocoFile,
    config: &FilterConfig,
    bank: &PredicateBank,
) -> Result<(CocoFile, Selection, CategoryRemap)> {
    let index = CocoIndex::build(coco);
    let remap = CategoryRemap::new(&index, &config.categories)?;

    info!("Filtering...");
    let mut selection = select(&index, &remap, bank, config);

    let reduced = CocoFile {
        info: coco.info.stamp(&config.stamp),
        licenses: coco.licenses.clone(),
        images: std::mem::take(&mut selection.images),
        annotations: std::mem::take(&mut selection.annotations),
        categories: selection.categories.clone(),
    };
    Ok((reduced, selection, remap))
}

/// Run the whole reduction: validate paths, filter, write and optionally copy images.
///
/// All path checks happen before anything is read or written.
pub fn process_reduction(
    job: &ReduceJob,
    config: &FilterConfig,
    scorer: Option<&dyn BlurScorer>,
) -> Result<ReductionStats> {
    check_input_exists(&job.input_json, "Input json path")?;
    check_output_path(&job.output_json, config.force_overwrite)?;
    let detections = match (&job.detections_json, &job.detections_output) {
        (Some(input), Some(output)) => {
            check_input_exists(input, "Detections json path")?;
            check_output_path(output, config.force_overwrite)?;
            Some((input, output))
        }
        (None, None) => None,
        _ => {
            return Err(ReduceError::Config(
                "detections input and output must be given together".to_string(),
            ))
        }
    };
    let image_dir = match (&job.copy_images_to, &config.image_dir) {
        (Some(_), None) => {
            return Err(ReduceError::Config(
                "copying images needs an image directory".to_string(),
            ))
        }
        (_, dir) => dir.clone(),
    };
    let bank = PredicateBank::from_config(config, scorer)?;
    info!("{} active predicates", bank.len());

    let coco = load_coco_file(&job.input_json)?;

    info!("Processing input json...");
    let (reduced, selection, remap) = match create_thread_pool(job.workers) {
        Some(pool) => pool.install(|| reduce_coco_file(&coco, config, &bank))?,
        None => reduce_coco_file(&coco, config, &bank)?,
    };

    info!("Saving new json file...");
    write_coco_file(&job.output_json, &reduced)?;
    info!("Filtered json saved.");

    if let Some((input, output)) = detections {
        let all = load_detections(input)?;
        let kept = filter_detections(&all, &selection, &remap);
        info!("Kept {} of {} detections", kept.len(), all.len());
        write_detections(output, &kept)?;
    }

    if let (Some(destination), Some(source)) = (&job.copy_images_to, image_dir) {
        let file_names: Vec<String> = reduced.images.iter().map(|i| i.file_name.clone()).collect();
        let copy_stats = copy_images(&file_names, &source, destination)?;
        copy_stats.print_summary();
    }

    let stats = selection.stats;
    stats.print_summary();
    Ok(stats)
}
