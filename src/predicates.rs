//! Per-image exclusion predicates
//!
//! Each predicate looks at one image and the annotations kept for it and either
//! lets it through or names the reason it is dropped. The bank only reads its
//! inputs, so images can be evaluated on any thread in any order.

use log::warn;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::coco::{Annotation, BBox, Image};
use crate::config::{FilterConfig, KeypointRequirement, SizeBounds, SpreadConfig};
use crate::error::{ReduceError, Result};

/// Scores the sharpness of regions of one image; lower means blurrier.
///
/// All boxes of an image are scored together so the file is decoded once.
pub trait BlurScorer: Sync {
    fn blur_scores(&self, image_path: &Path, bboxes: &[BBox]) -> Result<Vec<f64>>;
}

/// Why an image was left out of the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExclusionReason {
    NoAnnotations,
    Crowd,
    TooFewKeypoints,
    TooSmallPerson,
    TooBigPerson,
    SparseKeypoints,
    MissingImageFile,
    UnreadableImage,
    Blurry,
}

impl ExclusionReason {
    pub const ALL: [ExclusionReason; 9] = [
        ExclusionReason::NoAnnotations,
        ExclusionReason::Crowd,
        ExclusionReason::TooFewKeypoints,
        ExclusionReason::TooSmallPerson,
        ExclusionReason::TooBigPerson,
        ExclusionReason::SparseKeypoints,
        ExclusionReason::MissingImageFile,
        ExclusionReason::UnreadableImage,
        ExclusionReason::Blurry,
    ];
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NoAnnotations => "no annotations",
            Self::Crowd => "crowd annotation",
            Self::TooFewKeypoints => "too few keypoints",
            Self::TooSmallPerson => "person too small",
            Self::TooBigPerson => "person too big",
            Self::SparseKeypoints => "keypoints too close together",
            Self::MissingImageFile => "image file missing",
            Self::UnreadableImage => "image unreadable",
            Self::Blurry => "blurry person",
        };
        f.write_str(text)
    }
}

enum Predicate {
    Crowd,
    TooFewKeypoints {
        min: usize,
        requirement: KeypointRequirement,
    },
    PersonSize(SizeBounds),
    Spread(SpreadConfig),
    ImageFile { dir: PathBuf },
    Blur { dir: PathBuf, threshold: f64 },
}

/// The set of active predicates for one run
pub struct PredicateBank<'s> {
    predicates: Vec<Predicate>,
    scorer: Option<&'s dyn BlurScorer>,
}

impl<'s> PredicateBank<'s> {
    /// Assemble the predicates enabled by `config`.
    ///
    /// A blur threshold needs both an image directory and a scorer.
    pub fn from_config(config: &FilterConfig, scorer: Option<&'s dyn BlurScorer>) -> Result<Self> {
        let mut predicates = Vec::new();

        if config.exclude_crowd {
            predicates.push(Predicate::Crowd);
        }
        if config.min_keypoint_cnt > 0 {
            predicates.push(Predicate::TooFewKeypoints {
                min: config.min_keypoint_cnt,
                requirement: config.keypoint_requirement,
            });
        }
        if let Some(bounds) = config.size_bounds {
            predicates.push(Predicate::PersonSize(bounds));
        }
        if let Some(spread) = config.spread {
            predicates.push(Predicate::Spread(spread));
        }
        if config.require_image_files {
            let dir = image_dir(config, "--require_image_files")?;
            predicates.push(Predicate::ImageFile { dir });
        }
        if let Some(threshold) = config.blur_threshold {
            let dir = image_dir(config, "--blur_threshold")?;
            if scorer.is_none() {
                return Err(ReduceError::FeatureNotEnabled(
                    "blur filtering needs a blur scorer (build with the `laplacian` feature)"
                        .to_string(),
                ));
            }
            predicates.push(Predicate::Blur { dir, threshold });
        }

        Ok(Self { predicates, scorer })
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Returns the first reason to drop `image`, or `None` when it is kept
    pub fn evaluate(&self, image: &Image, annotations: &[&Annotation]) -> Option<ExclusionReason> {
        if annotations.is_empty() {
            return Some(ExclusionReason::NoAnnotations);
        }
        self.predicates
            .iter()
            .find_map(|predicate| self.check(predicate, image, annotations))
    }

    fn check(
        &self,
        predicate: &Predicate,
        image: &Image,
        annotations: &[&Annotation],
    ) -> Option<ExclusionReason> {
        match predicate {
            Predicate::Crowd => has_crowd(annotations).then_some(ExclusionReason::Crowd),
            Predicate::TooFewKeypoints { min, requirement } => {
                too_few_keypoints(annotations, *min, *requirement)
                    .then_some(ExclusionReason::TooFewKeypoints)
            }
            Predicate::PersonSize(bounds) => person_size(image, annotations, bounds),
            Predicate::Spread(spread) => {
                (!has_spread_pose(annotations, spread)).then_some(ExclusionReason::SparseKeypoints)
            }
            Predicate::ImageFile { dir } => (!dir.join(&image.file_name).is_file())
                .then_some(ExclusionReason::MissingImageFile),
            Predicate::Blur { dir, threshold } => {
                let scorer = self.scorer?;
                blurry(scorer, &dir.join(&image.file_name), annotations, *threshold)
            }
        }
    }
}

fn image_dir(config: &FilterConfig, flag: &str) -> Result<PathBuf> {
    config
        .image_dir
        .clone()
        .ok_or_else(|| ReduceError::Config(format!("{flag} needs an image directory")))
}

/// True when any annotation is a crowd region
pub fn has_crowd(annotations: &[&Annotation]) -> bool {
    annotations.iter().any(|a| a.is_crowd())
}

/// Keypoint count check over the shoulder-to-ankle joints
pub fn too_few_keypoints(
    annotations: &[&Annotation],
    min: usize,
    requirement: KeypointRequirement,
) -> bool {
    let short = |a: &&Annotation| a.body_keypoint_count() < min;
    match requirement {
        KeypointRequirement::AnyPerson => annotations.iter().all(short),
        KeypointRequirement::EveryPerson => annotations.iter().any(short),
    }
}

/// Bbox size relative to the image; too-small is checked before too-big per annotation
pub fn person_size(
    image: &Image,
    annotations: &[&Annotation],
    bounds: &SizeBounds,
) -> Option<ExclusionReason> {
    if image.width == 0 || image.height == 0 {
        warn!(
            "Image {} ({}) has no usable dimensions; dropping it",
            image.id, image.file_name
        );
        return Some(ExclusionReason::TooSmallPerson);
    }
    let (width, height) = (f64::from(image.width), f64::from(image.height));

    for annotation in annotations {
        let Some(bbox) = annotation.bbox() else {
            return Some(ExclusionReason::TooSmallPerson);
        };
        let height_ratio = bbox.height / height;
        let width_ratio = bbox.width / width;
        if height_ratio < bounds.min_height_ratio || width_ratio < bounds.min_width_ratio {
            return Some(ExclusionReason::TooSmallPerson);
        }
        if height_ratio > bounds.max_height_ratio || width_ratio > bounds.max_width_ratio {
            return Some(ExclusionReason::TooBigPerson);
        }
    }
    None
}

/// True when some eligible annotation has two present keypoints farther apart than the limit
pub fn has_spread_pose(annotations: &[&Annotation], spread: &SpreadConfig) -> bool {
    annotations
        .iter()
        .filter(|a| a.num_keypoints >= spread.min_keypoints)
        .any(|a| {
            let present: Vec<_> = a.keypoint_triples().filter(|kp| kp.is_present()).collect();
            present.iter().enumerate().any(|(i, first)| {
                present[i + 1..]
                    .iter()
                    .any(|second| first.distance(second) > spread.min_distance)
            })
        })
}

fn blurry(
    scorer: &dyn BlurScorer,
    path: &Path,
    annotations: &[&Annotation],
    threshold: f64,
) -> Option<ExclusionReason> {
    let bboxes: Vec<BBox> = annotations.iter().filter_map(|a| a.bbox()).collect();
    if bboxes.is_empty() {
        return None;
    }
    match scorer.blur_scores(path, &bboxes) {
        Ok(scores) => scores
            .iter()
            .any(|&score| score < threshold)
            .then_some(ExclusionReason::Blurry),
        Err(e) => {
            warn!("Skipping {}: {}", path.display(), e);
            Some(ExclusionReason::UnreadableImage)
        }
    }
}
