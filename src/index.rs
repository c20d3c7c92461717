//! Lookup tables over a loaded COCO file
//!
//! Every table keeps insertion order. Duplicate image and category ids keep the
//! first record; annotations that point at an unknown image are dropped.

use indexmap::{IndexMap, IndexSet};
use log::{info, warn};

use crate::coco::{Annotation, Category, CocoFile, Image};
use crate::config::ImageOrder;

/// Indexed, read-only view of a [`CocoFile`]
#[derive(Debug, Default)]
pub struct CocoIndex<'a> {
    pub images: IndexMap<u64, &'a Image>,
    pub annotations_by_image: IndexMap<u64, Vec<&'a Annotation>>,
    pub categories: IndexMap<u64, &'a Category>,
    pub super_categories: IndexMap<String, IndexSet<u64>>,
    pub duplicate_images: usize,
    pub duplicate_categories: usize,
    pub orphan_annotations: usize,
}

impl<'a> CocoIndex<'a> {
    pub fn build(coco: &'a CocoFile) -> Self {
        let mut index = CocoIndex::default();
        index.index_images(&coco.images);
        index.index_annotations(&coco.annotations);
        index.index_categories(&coco.categories);

        info!("Original image count: {}", index.images.len());
        info!("Original annotation count: {}", coco.annotations.len());
        index
    }

    fn index_images(&mut self, images: &'a [Image]) {
        for image in images {
            if self.images.contains_key(&image.id) {
                warn!(
                    "Skipping duplicate image id {} ({})",
                    image.id, image.file_name
                );
                self.duplicate_images += 1;
                continue;
            }
            self.images.insert(image.id, image);
        }
    }

    fn index_annotations(&mut self, annotations: &'a [Annotation]) {
        let mut unknown_ids = IndexSet::new();
        for annotation in annotations {
            if !self.images.contains_key(&annotation.image_id) {
                if unknown_ids.insert(annotation.image_id) {
                    warn!(
                        "Skipping annotations referencing unknown image id {}",
                        annotation.image_id
                    );
                }
                self.orphan_annotations += 1;
                continue;
            }
            self.annotations_by_image
                .entry(annotation.image_id)
                .or_default()
                .push(annotation);
        }
    }

    fn index_categories(&mut self, categories: &'a [Category]) {
        for category in categories {
            if self.categories.contains_key(&category.id) {
                warn!(
                    "Skipping duplicate category id {} ({})",
                    category.id, category.name
                );
                self.duplicate_categories += 1;
                continue;
            }
            self.categories.insert(category.id, category);
            self.super_categories
                .entry(category.supercategory.clone())
                .or_default()
                .insert(category.id);
        }
    }

    pub fn image(&self, id: u64) -> Option<&'a Image> {
        self.images.get(&id).copied()
    }

    pub fn annotations(&self, image_id: u64) -> &[&'a Annotation] {
        self.annotations_by_image
            .get(&image_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Ids of annotated images in the requested visiting order
    pub fn image_ids(&self, order: ImageOrder) -> Vec<u64> {
        let mut ids: Vec<u64> = self.annotations_by_image.keys().copied().collect();
        if order == ImageOrder::Ascending {
            ids.sort_unstable();
        }
        ids
    }

    /// Names of all indexed categories
    pub fn category_names(&self) -> IndexSet<&'a str> {
        self.categories.values().map(|c| c.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coco::Info;

    fn sample() -> CocoFile {
        CocoFile {
            info: Info::default(),
            licenses: None,
            images: vec![
                Image::new(30, "c.jpg", 640, 480),
                Image::new(10, "a.jpg", 640, 480),
                Image::new(30, "dup.jpg", 1, 1),
                Image::new(20, "b.jpg", 640, 480),
            ],
            annotations: vec![
                Annotation::new(1, 30, 1),
                Annotation::new(2, 10, 1),
                Annotation::new(3, 99, 1),
                Annotation::new(4, 30, 1),
                Annotation::new(5, 99, 1),
            ],
            categories: vec![
                Category::new(1, "person", "person"),
                Category::new(2, "dog", "animal"),
                Category::new(1, "again", "person"),
                Category::new(3, "cat", "animal"),
            ],
        }
    }

    #[test]
    fn test_first_duplicate_wins() {
        let coco = sample();
        let index = CocoIndex::build(&coco);
        assert_eq!(index.images.len(), 3);
        assert_eq!(index.image(30).map(|i| i.file_name.as_str()), Some("c.jpg"));
        assert_eq!(index.duplicate_images, 1);
        assert_eq!(index.categories[&1].name, "person");
        assert_eq!(index.duplicate_categories, 1);
    }

    #[test]
    fn test_orphan_annotations_are_skipped() {
        let coco = sample();
        let index = CocoIndex::build(&coco);
        assert_eq!(index.orphan_annotations, 2);
        assert!(index.annotations(99).is_empty());
        let ids: Vec<u64> = index.annotations(30).iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[test]
    fn test_super_categories_group_ids() {
        let coco = sample();
        let index = CocoIndex::build(&coco);
        let animals: Vec<u64> = index.super_categories["animal"].iter().copied().collect();
        assert_eq!(animals, vec![2, 3]);
        assert_eq!(index.super_categories["person"].len(), 1);
    }

    #[test]
    fn test_image_id_orders() {
        let coco = sample();
        let index = CocoIndex::build(&coco);
        assert_eq!(index.image_ids(ImageOrder::Source), vec![30, 10]);
        assert_eq!(index.image_ids(ImageOrder::Ascending), vec![10, 30]);
    }
}
