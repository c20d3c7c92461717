//! Category remapping and image selection

use indexmap::{IndexMap, IndexSet};
use log::{info, warn};
use rayon::prelude::*;

use crate::coco::{Annotation, Category, Detection, Image};
use crate::config::{FilterConfig, PROGRESS_INTERVAL};
use crate::error::{ReduceError, Result};
use crate::index::CocoIndex;
use crate::predicates::{ExclusionReason, PredicateBank};
use crate::types::ReductionStats;

/// Mapping from retained source category ids to dense ids starting at 1
#[derive(Debug, Clone, Default)]
pub struct CategoryRemap {
    ids: IndexMap<u64, u64>,
    categories: Vec<Category>,
}

impl CategoryRemap {
    /// Retain the categories whose name is listed in `names`, in source order
    pub fn new(index: &CocoIndex, names: &[String]) -> Result<Self> {
        let known = index.category_names();
        let missing: Vec<&str> = names
            .iter()
            .map(String::as_str)
            .filter(|name| !known.contains(name))
            .collect();
        if !missing.is_empty() {
            warn!("Did not find categories: {:?}", missing);
        }

        let mut remap = CategoryRemap::default();
        for (&original_id, category) in &index.categories {
            if !names.iter().any(|name| name == &category.name) {
                continue;
            }
            let new_id = remap.ids.len() as u64 + 1;
            remap.ids.insert(original_id, new_id);
            remap.categories.push(Category {
                id: new_id,
                ..(*category).clone()
            });
        }

        if remap.ids.is_empty() {
            return Err(ReduceError::Config(format!(
                "none of the requested categories {:?} exist in the input",
                names
            )));
        }
        Ok(remap)
    }

    pub fn get(&self, original_id: u64) -> Option<u64> {
        self.ids.get(&original_id).copied()
    }

    /// The retained categories carrying their new ids
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }
}

/// Output of a selection pass
#[derive(Debug, Default)]
pub struct Selection {
    pub images: Vec<Image>,
    pub annotations: Vec<Annotation>,
    pub categories: Vec<Category>,
    pub image_ids: IndexSet<u64>,
    pub stats: ReductionStats,
}

impl Selection {
    pub fn contains(&self, image_id: u64) -> bool {
        self.image_ids.contains(&image_id)
    }
}

/// Evaluate every annotated image and collect the survivors, honouring the cap.
///
/// Predicates run in parallel over an already ordered id list; the cap is
/// applied afterwards in that same order so the result does not depend on
/// thread scheduling.
pub fn select(
    index: &CocoIndex,
    remap: &CategoryRemap,
    bank: &PredicateBank,
    config: &FilterConfig,
) -> Selection {
    let ids = index.image_ids(config.order);

    let verdicts: Vec<(u64, Vec<(&Annotation, u64)>, Option<ExclusionReason>)> = ids
        .par_iter()
        .filter_map(|&id| {
            let image = index.image(id)?;
            let kept: Vec<(&Annotation, u64)> = index
                .annotations(id)
                .iter()
                .filter_map(|&a| remap.get(a.category_id).map(|new_id| (a, new_id)))
                .collect();
            let persons: Vec<&Annotation> = kept.iter().map(|&(a, _)| a).collect();
            let verdict = bank.evaluate(image, &persons);
            Some((id, kept, verdict))
        })
        .collect();

    let mut selection = Selection {
        categories: remap.categories().to_vec(),
        ..Selection::default()
    };
    selection.stats.candidates = verdicts.len();

    for (id, kept, verdict) in verdicts {
        if let Some(reason) = verdict {
            selection.stats.record_exclusion(reason);
            continue;
        }
        if config
            .max_output_images
            .is_some_and(|cap| selection.image_ids.len() >= cap)
        {
            selection.stats.capped += 1;
            continue;
        }

        for (annotation, category_id) in kept {
            selection.annotations.push(Annotation {
                category_id,
                ..annotation.clone()
            });
        }
        if let Some(image) = index.image(id) {
            selection.images.push(image.clone());
        }
        selection.image_ids.insert(id);

        if selection.image_ids.len() % PROGRESS_INTERVAL == 0 {
            info!("{} matching images found", selection.image_ids.len());
        }
    }

    selection.stats.selected_images = selection.images.len();
    selection.stats.selected_annotations = selection.annotations.len();
    info!("{} matching images found", selection.image_ids.len());
    selection
}

/// Keep detector results for selected images and retained categories
pub fn filter_detections(
    detections: &[Detection],
    selection: &Selection,
    remap: &CategoryRemap,
) -> Vec<Detection> {
    detections
        .iter()
        .filter(|d| selection.contains(d.image_id))
        .filter_map(|d| {
            let category_id = remap.get(d.category_id)?;
            Some(Detection {
                category_id,
                ..d.clone()
            })
        })
        .collect()
}
