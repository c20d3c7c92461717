use std::collections::BTreeMap;

use crate::predicates::ExclusionReason;

// Struct to hold selection statistics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReductionStats {
    pub candidates: usize,
    pub selected_images: usize,
    pub selected_annotations: usize,
    pub capped: usize,
    pub excluded: BTreeMap<ExclusionReason, usize>,
}

impl ReductionStats {
    pub fn record_exclusion(&mut self, reason: ExclusionReason) {
        *self.excluded.entry(reason).or_insert(0) += 1;
    }

    pub fn excluded_for(&self, reason: ExclusionReason) -> usize {
        self.excluded.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_excluded(&self) -> usize {
        self.excluded.values().sum()
    }

    pub fn print_summary(&self) {
        log::info!("=== Reduction Summary ===");
        log::info!("Annotated images considered: {}", self.candidates);
        log::info!("Images selected: {}", self.selected_images);
        log::info!("Annotations selected: {}", self.selected_annotations);
        log::info!("Images excluded: {}", self.total_excluded());
        for reason in ExclusionReason::ALL {
            let count = self.excluded_for(reason);
            if count > 0 {
                log::info!("Excluded ({}): {}", reason, count);
            }
        }
        if self.capped > 0 {
            log::warn!(
                "{} qualifying images dropped by the output cap",
                self.capped
            );
        }
    }
}

// Struct to hold image copy statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CopyStats {
    pub copied: usize,
    pub missing: usize,
    pub failed: usize,
}

impl CopyStats {
    pub fn print_summary(&self) {
        log::info!("{} images copied", self.copied);
        let skipped = self.missing + self.failed;
        if skipped > 0 {
            log::warn!(
                "Total skipped images: {} (missing source file: {}, copy failed: {})",
                skipped,
                self.missing,
                self.failed
            );
        }
    }
}

// Image counts reported for a COCO file
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImageCount {
    pub images: usize,
    pub annotated_images: usize,
    pub annotations: usize,
}

impl ImageCount {
    /// Images that are both listed and annotated, bounded by either list
    pub fn effective(&self) -> usize {
        self.images.min(self.annotated_images)
    }

    pub fn print_summary(&self) {
        log::info!("Images listed: {}", self.images);
        log::info!("Images with annotations: {}", self.annotated_images);
        log::info!("Annotations: {}", self.annotations);
        log::info!("{} images found in json file", self.effective());
    }
}
