//! COCO keypoints dataset reducer
//!
//! This library filters a COCO keypoints file down to images whose persons pass a
//! configurable set of checks, rewrites the categories into a dense id space and
//! writes the reduced file next to an optional copy of the selected images.

#[cfg(feature = "laplacian")]
pub mod blur;
pub mod coco;
pub mod config;
pub mod dataset;
pub mod error;
pub mod index;
pub mod io;
pub mod predicates;
pub mod selector;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use coco::{Annotation, BBox, Category, CocoFile, Detection, Image, Info, InfoStamp, Keypoint};
pub use config::{Args, CopyArgs, CountArgs, FilterConfig, ImageOrder, KeypointRequirement};
pub use dataset::{process_reduction, reduce_coco_file, ReduceJob};
pub use error::{ReduceError, Result};
pub use index::CocoIndex;
pub use predicates::{BlurScorer, ExclusionReason, PredicateBank};
pub use selector::{filter_detections, select, CategoryRemap, Selection};
pub use types::{CopyStats, ImageCount, ReductionStats};

#[cfg(feature = "laplacian")]
pub use blur::LaplacianScorer;

/// The blur scorer compiled into this build, if any
pub fn default_blur_scorer() -> Option<&'static dyn BlurScorer> {
    #[cfg(feature = "laplacian")]
    {
        static SCORER: blur::LaplacianScorer = blur::LaplacianScorer;
        Some(&SCORER)
    }
    #[cfg(not(feature = "laplacian"))]
    {
        None
    }
}
