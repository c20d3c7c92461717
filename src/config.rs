use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

use crate::coco::{InfoStamp, Keypoint, DEFAULT_CONTRIBUTOR, DEFAULT_DESCRIPTION};

/// Default minimum `num_keypoints` for an annotation to take part in the spread check
pub const DEFAULT_SPREAD_MIN_KEYPOINTS: u32 = 6;
/// Images matched between two progress log lines
pub const PROGRESS_INTERVAL: usize = 500;

/// Command-line arguments for reducing a COCO keypoints file.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// Path to a json file in COCO format
    #[arg(short = 'i', long = "input_json")]
    pub input_json: PathBuf,

    /// Path to save the output json
    #[arg(short = 'o', long = "output_json")]
    pub output_json: PathBuf,

    /// Truncate the output files if they already exist
    #[arg(long = "overwrite")]
    pub overwrite: bool,

    /// Maximum number of images written to the output
    #[arg(short = 'c', long = "max_count_images")]
    pub max_count_images: Option<usize>,

    /// Minimum count of shoulder-to-ankle keypoints for a person (0 disables the check)
    #[arg(short = 'k', long = "min_keypoint_cnt_per_person", default_value_t = 0)]
    pub min_keypoint_cnt_per_person: usize,

    /// Whether one qualifying person is enough or every person must qualify
    #[arg(
        long = "keypoint_requirement",
        value_enum,
        default_value = "any-person"
    )]
    pub keypoint_requirement: KeypointRequirement,

    /// Category names to keep
    #[arg(long = "categories", value_delimiter = ',', default_value = "person")]
    pub categories: Vec<String>,

    /// Keep images that contain crowd annotations
    #[arg(long = "keep_crowd")]
    pub keep_crowd: bool,

    /// Drop images whose persons are too small or too big relative to the image
    #[arg(long = "filter_person_size")]
    pub filter_person_size: bool,

    /// Smallest allowed bbox height / image height
    #[arg(long = "min_height_ratio", default_value_t = 0.5, value_parser = validate_ratio)]
    pub min_height_ratio: f64,

    /// Smallest allowed bbox width / image width
    #[arg(long = "min_width_ratio", default_value_t = 0.15, value_parser = validate_ratio)]
    pub min_width_ratio: f64,

    /// Largest allowed bbox height / image height
    #[arg(long = "max_height_ratio", default_value_t = 0.95, value_parser = validate_ratio)]
    pub max_height_ratio: f64,

    /// Largest allowed bbox width / image width
    #[arg(long = "max_width_ratio", default_value_t = 0.95, value_parser = validate_ratio)]
    pub max_width_ratio: f64,

    /// Keep only images with a person whose keypoints lie farther apart than this many pixels
    #[arg(long = "min_keypoint_distance", value_parser = validate_positive)]
    pub min_keypoint_distance: Option<f64>,

    /// Minimum `num_keypoints` of a person considered by the keypoint distance check
    #[arg(long = "spread_min_keypoints", default_value_t = DEFAULT_SPREAD_MIN_KEYPOINTS)]
    pub spread_min_keypoints: u32,

    /// Directory holding the source images
    #[arg(short = 'p', long = "image_dir")]
    pub image_dir: Option<PathBuf>,

    /// Drop images whose file is missing from the image directory
    #[arg(long = "require_image_files")]
    pub require_image_files: bool,

    /// Drop images with a person crop whose Laplacian variance is below this value
    #[arg(
        short = 't',
        long = "blur_threshold",
        num_args = 0..=1,
        default_missing_value = "120.0",
        value_parser = validate_positive
    )]
    pub blur_threshold: Option<f64>,

    /// Copy the selected images into this directory
    #[arg(long = "copy_images_to")]
    pub copy_images_to: Option<PathBuf>,

    /// Detector results json filtered together with the main file
    #[arg(long = "detections_json")]
    pub detections_json: Option<PathBuf>,

    /// Where to save the filtered detector results
    #[arg(long = "detections_output")]
    pub detections_output: Option<PathBuf>,

    /// Order in which images are visited before the output cap applies
    #[arg(long = "order", value_enum, default_value = "ascending")]
    pub order: ImageOrder,

    /// Contributor written into the info block
    #[arg(long = "contributor", default_value = DEFAULT_CONTRIBUTOR)]
    pub contributor: String,

    /// Description written into the info block
    #[arg(long = "description", default_value = DEFAULT_DESCRIPTION)]
    pub description: String,

    /// Number of worker threads for predicate evaluation (0 = one per core)
    #[arg(long = "workers", default_value_t = 0)]
    pub workers: usize,
}

/// Quantifier for the keypoint count check
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum KeypointRequirement {
    /// Keep the image if at least one person has enough keypoints
    #[default]
    AnyPerson,
    /// Drop the image as soon as one person has too few keypoints
    EveryPerson,
}

/// Iteration order of image ids ahead of the output cap
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum ImageOrder {
    /// Ascending numeric image id
    #[default]
    Ascending,
    /// Order in which images first appear in the annotation list
    Source,
}

/// Bounds on bbox size relative to the image, all exclusive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeBounds {
    pub min_height_ratio: f64,
    pub min_width_ratio: f64,
    pub max_height_ratio: f64,
    pub max_width_ratio: f64,
}

impl Default for SizeBounds {
    fn default() -> Self {
        Self {
            min_height_ratio: 0.5,
            min_width_ratio: 0.15,
            max_height_ratio: 0.95,
            max_width_ratio: 0.95,
        }
    }
}

/// Spread check parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpreadConfig {
    pub min_distance: f64,
    pub min_keypoints: u32,
}

/// Pipeline configuration consumed by the library
#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub categories: Vec<String>,
    pub max_output_images: Option<usize>,
    pub exclude_crowd: bool,
    pub min_keypoint_cnt: usize,
    pub keypoint_requirement: KeypointRequirement,
    pub size_bounds: Option<SizeBounds>,
    pub spread: Option<SpreadConfig>,
    pub image_dir: Option<PathBuf>,
    pub require_image_files: bool,
    pub blur_threshold: Option<f64>,
    pub order: ImageOrder,
    pub force_overwrite: bool,
    pub stamp: InfoStamp,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            categories: vec!["person".to_string()],
            max_output_images: None,
            exclude_crowd: true,
            min_keypoint_cnt: 0,
            keypoint_requirement: KeypointRequirement::default(),
            size_bounds: None,
            spread: None,
            image_dir: None,
            require_image_files: false,
            blur_threshold: None,
            order: ImageOrder::default(),
            force_overwrite: false,
            stamp: InfoStamp::default(),
        }
    }
}

impl Args {
    /// Validate cross-flag constraints and build the pipeline configuration
    pub fn to_filter_config(&self) -> Result<FilterConfig, String> {
        let categories: Vec<String> = self
            .categories
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if categories.is_empty() {
            return Err("at least one category name is required".to_string());
        }

        let body_keypoints = Keypoint::body().count();
        if self.min_keypoint_cnt_per_person > body_keypoints {
            return Err(format!(
                "min_keypoint_cnt_per_person must not exceed {}",
                body_keypoints
            ));
        }

        let size_bounds = if self.filter_person_size {
            if self.min_height_ratio > self.max_height_ratio
                || self.min_width_ratio > self.max_width_ratio
            {
                return Err("minimum size ratios must not exceed maximum ratios".to_string());
            }
            Some(SizeBounds {
                min_height_ratio: self.min_height_ratio,
                min_width_ratio: self.min_width_ratio,
                max_height_ratio: self.max_height_ratio,
                max_width_ratio: self.max_width_ratio,
            })
        } else {
            None
        };

        let needs_images =
            self.require_image_files || self.blur_threshold.is_some() || self.copy_images_to.is_some();
        if needs_images && self.image_dir.is_none() {
            return Err(
                "--image_dir is required for --require_image_files, --blur_threshold and --copy_images_to"
                    .to_string(),
            );
        }

        if self.detections_json.is_some() != self.detections_output.is_some() {
            return Err("--detections_json and --detections_output must be given together".to_string());
        }

        if self.max_count_images == Some(0) {
            return Err("max_count_images must be greater than 0".to_string());
        }

        Ok(FilterConfig {
            categories,
            max_output_images: self.max_count_images,
            exclude_crowd: !self.keep_crowd,
            min_keypoint_cnt: self.min_keypoint_cnt_per_person,
            keypoint_requirement: self.keypoint_requirement,
            size_bounds,
            spread: self.min_keypoint_distance.map(|min_distance| SpreadConfig {
                min_distance,
                min_keypoints: self.spread_min_keypoints,
            }),
            image_dir: self.image_dir.clone(),
            require_image_files: self.require_image_files,
            blur_threshold: self.blur_threshold,
            order: self.order,
            force_overwrite: self.overwrite,
            stamp: InfoStamp {
                description: self.description.clone(),
                contributor: self.contributor.clone(),
                date: chrono::Local::now().date_naive(),
            },
        })
    }
}

/// Command-line arguments for copying the images listed in a COCO file.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct CopyArgs {
    /// Path to a json file in COCO format
    #[arg(short = 'i', long = "input_json")]
    pub input_json: PathBuf,

    /// Path to the image folder
    #[arg(short = 'p', long = "input_image_path")]
    pub input_image_path: PathBuf,

    /// Destination folder (defaults to `<input_image_path>_reduced`)
    #[arg(short = 'o', long = "output_dir")]
    pub output_dir: Option<PathBuf>,
}

impl CopyArgs {
    pub fn destination(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| crate::io::reduced_sibling_dir(&self.input_image_path))
    }
}

/// Command-line arguments for counting the images in a COCO file.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct CountArgs {
    /// Path to a json file in COCO format
    #[arg(short = 'i', long = "input_json")]
    pub input_json: PathBuf,
}

// Validate that the ratio is between 0.0 and 1.0
fn validate_ratio(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("RATIO must be between 0.0 and 1.0".to_string()),
    }
}

fn validate_positive(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if val.is_finite() && val > 0.0 => Ok(val),
        _ => Err("value must be a positive number".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["coco-reduce", "-i", "in.json", "-o", "out.json"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_validate_ratio() {
        assert!(validate_ratio("0.5").is_ok());
        assert!(validate_ratio("1.0").is_ok());
        assert!(validate_ratio("0.0").is_ok());
        assert!(validate_ratio("-0.1").is_err());
        assert!(validate_ratio("1.1").is_err());
        assert!(validate_ratio("abc").is_err());
    }

    #[test]
    fn test_validate_positive() {
        assert_eq!(validate_positive("120"), Ok(120.0));
        assert!(validate_positive("0").is_err());
        assert!(validate_positive("NaN").is_err());
    }

    #[test]
    fn test_defaults_map_to_crowd_filter_only() {
        let config = parse(&[]).to_filter_config().unwrap();
        assert_eq!(config.categories, vec!["person".to_string()]);
        assert!(config.exclude_crowd);
        assert_eq!(config.min_keypoint_cnt, 0);
        assert!(config.size_bounds.is_none());
        assert!(config.spread.is_none());
        assert!(config.blur_threshold.is_none());
        assert_eq!(config.order, ImageOrder::Ascending);
        assert!(!config.force_overwrite);
    }

    #[test]
    fn test_full_flag_set() {
        let config = parse(&[
            "-c",
            "100",
            "-k",
            "8",
            "--keypoint_requirement",
            "every-person",
            "--filter_person_size",
            "--min_keypoint_distance",
            "120",
            "--order",
            "source",
            "--overwrite",
            "--categories",
            "person,dog",
        ])
        .to_filter_config()
        .unwrap();
        assert_eq!(config.max_output_images, Some(100));
        assert_eq!(config.min_keypoint_cnt, 8);
        assert_eq!(config.keypoint_requirement, KeypointRequirement::EveryPerson);
        assert_eq!(config.size_bounds, Some(SizeBounds::default()));
        assert_eq!(
            config.spread,
            Some(SpreadConfig {
                min_distance: 120.0,
                min_keypoints: DEFAULT_SPREAD_MIN_KEYPOINTS
            })
        );
        assert_eq!(config.order, ImageOrder::Source);
        assert!(config.force_overwrite);
        assert_eq!(config.categories, vec!["person".to_string(), "dog".to_string()]);
    }

    #[test]
    fn test_image_flags_require_image_dir() {
        assert!(parse(&["--require_image_files"]).to_filter_config().is_err());
        assert!(parse(&["-t", "100"]).to_filter_config().is_err());
        assert!(parse(&["-t", "100", "-p", "imgs"]).to_filter_config().is_ok());

        let config = parse(&["-p", "imgs", "-t"]).to_filter_config().unwrap();
        assert_eq!(config.blur_threshold, Some(120.0));
    }

    #[test]
    fn test_detection_paths_come_in_pairs() {
        assert!(parse(&["--detections_json", "det.json"])
            .to_filter_config()
            .is_err());
        assert!(parse(&["--detections_json", "det.json", "--detections_output", "o.json"])
            .to_filter_config()
            .is_ok());
    }

    #[test]
    fn test_rejects_zero_cap_and_oversized_keypoint_count() {
        assert!(parse(&["-c", "0"]).to_filter_config().is_err());
        assert!(parse(&["-k", "13"]).to_filter_config().is_err());
        assert!(parse(&["-k", "12"]).to_filter_config().is_ok());
    }

    #[test]
    fn test_copy_destination_defaults_to_reduced_sibling() {
        let args = CopyArgs::parse_from(["coco-copy", "-i", "a.json", "-p", "/data/val2017"]);
        assert_eq!(args.destination(), PathBuf::from("/data/val2017_reduced"));
    }
}
