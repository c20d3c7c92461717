//! COCO format data structures and utilities
//!
//! The structures keep every field they do not interpret in a passthrough map so
//! that a reduced file carries the same per-record content as its source.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Description written into the `info` block of a reduced file
pub const DEFAULT_DESCRIPTION: &str = "Reduced COCO 2017 Dataset";
/// Contributor written into the `info` block of a reduced file
pub const DEFAULT_CONTRIBUTOR: &str = "coco-reduce";
/// Version written into the `info` block of a reduced file
pub const REDUCED_VERSION: &str = "0.1";

/// The 17 COCO person keypoints in annotation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(usize)]
pub enum Keypoint {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl Keypoint {
    pub const COUNT: usize = 17;

    pub const ALL: [Keypoint; Keypoint::COUNT] = [
        Keypoint::Nose,
        Keypoint::LeftEye,
        Keypoint::RightEye,
        Keypoint::LeftEar,
        Keypoint::RightEar,
        Keypoint::LeftShoulder,
        Keypoint::RightShoulder,
        Keypoint::LeftElbow,
        Keypoint::RightElbow,
        Keypoint::LeftWrist,
        Keypoint::RightWrist,
        Keypoint::LeftHip,
        Keypoint::RightHip,
        Keypoint::LeftKnee,
        Keypoint::RightKnee,
        Keypoint::LeftAnkle,
        Keypoint::RightAnkle,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Shoulders through ankles; the head joints are not counted
    pub fn is_body(self) -> bool {
        (Keypoint::LeftShoulder..=Keypoint::RightAnkle).contains(&self)
    }

    pub fn body() -> impl Iterator<Item = Keypoint> {
        Self::ALL.into_iter().filter(|kp| kp.is_body())
    }
}

/// One (x, y, visibility) entry of an annotation's flat keypoint array
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeypointTriple {
    pub x: f64,
    pub y: f64,
    pub visibility: u8,
}

impl KeypointTriple {
    /// A keypoint counts as present when both coordinates are non-zero
    pub fn is_present(&self) -> bool {
        self.x != 0.0 && self.y != 0.0
    }

    pub fn distance(&self, other: &KeypointTriple) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Axis-aligned box in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// COCO image information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Image {
    pub id: u64,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Image {
    pub fn new(id: u64, file_name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id,
            file_name: file_name.into(),
            width,
            height,
            extra: Map::new(),
        }
    }
}

/// COCO annotation information
///
/// `bbox` and `keypoints` are kept as raw JSON numbers so integer coordinates
/// are written back as integers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Annotation {
    pub id: u64,
    pub image_id: u64,
    pub category_id: u64,
    #[serde(default)]
    pub iscrowd: u8,
    #[serde(default)]
    pub bbox: Vec<Number>,
    #[serde(default)]
    pub keypoints: Vec<Number>,
    #[serde(default)]
    pub num_keypoints: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Annotation {
    pub fn new(id: u64, image_id: u64, category_id: u64) -> Self {
        Self {
            id,
            image_id,
            category_id,
            iscrowd: 0,
            bbox: Vec::new(),
            keypoints: Vec::new(),
            num_keypoints: 0,
            extra: Map::new(),
        }
    }

    pub fn with_bbox(mut self, bbox: [f64; 4]) -> Self {
        self.bbox = bbox.iter().copied().filter_map(Number::from_f64).collect();
        self
    }

    pub fn with_keypoints(mut self, keypoints: &[f64]) -> Self {
        self.keypoints = keypoints.iter().copied().filter_map(Number::from_f64).collect();
        let labelled = self
            .keypoint_triples()
            .filter(|kp| kp.visibility > 0)
            .count();
        self.num_keypoints = labelled as u32;
        self
    }

    pub fn is_crowd(&self) -> bool {
        self.iscrowd == 1
    }

    /// The bounding box, or `None` when the annotation carries fewer than four values
    pub fn bbox(&self) -> Option<BBox> {
        match self.bbox.as_slice() {
            [x, y, w, h, ..] => Some(BBox::new(
                x.as_f64().unwrap_or(0.0),
                y.as_f64().unwrap_or(0.0),
                w.as_f64().unwrap_or(0.0),
                h.as_f64().unwrap_or(0.0),
            )),
            _ => None,
        }
    }

    /// The keypoint at `kp`, absent (all zero) when the array is too short
    pub fn keypoint(&self, kp: Keypoint) -> KeypointTriple {
        let value = |i: usize| {
            self.keypoints
                .get(i)
                .and_then(Number::as_f64)
                .unwrap_or(0.0)
        };
        let base = kp.index() * 3;
        KeypointTriple {
            x: value(base),
            y: value(base + 1),
            visibility: value(base + 2) as u8,
        }
    }

    pub fn keypoint_triples(&self) -> impl Iterator<Item = KeypointTriple> + '_ {
        Keypoint::ALL.into_iter().map(move |kp| self.keypoint(kp))
    }

    /// Number of present shoulder-to-ankle keypoints
    pub fn body_keypoint_count(&self) -> usize {
        Keypoint::body()
            .filter(|&kp| self.keypoint(kp).is_present())
            .count()
    }
}

/// COCO category information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub supercategory: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Category {
    pub fn new(id: u64, name: impl Into<String>, supercategory: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            supercategory: supercategory.into(),
            extra: Map::new(),
        }
    }
}

/// One entry of a detector results file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    pub image_id: u64,
    pub category_id: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Values stamped over the source `info` block
#[derive(Debug, Clone)]
pub struct InfoStamp {
    pub description: String,
    pub contributor: String,
    pub date: NaiveDate,
}

impl Default for InfoStamp {
    fn default() -> Self {
        Self {
            description: DEFAULT_DESCRIPTION.to_string(),
            contributor: DEFAULT_CONTRIBUTOR.to_string(),
            date: chrono::Local::now().date_naive(),
        }
    }
}

/// COCO dataset information, kept as the source object
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Info {
    pub fields: Map<String, Value>,
}

impl Info {
    /// Copy of the block with the provenance fields rewritten for a reduced file
    pub fn stamp(&self, stamp: &InfoStamp) -> Info {
        let mut fields = self.fields.clone();
        let mut set = |key: &str, value: String| {
            fields.insert(key.to_string(), Value::String(value));
        };
        set("description", stamp.description.clone());
        set("url", String::new());
        set("version", REDUCED_VERSION.to_string());
        set("year", stamp.date.year().to_string());
        set("contributor", stamp.contributor.clone());
        set("date_created", stamp.date.format("%Y/%m/%d").to_string());
        Info { fields }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// Complete COCO dataset structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CocoFile {
    pub info: Info,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub licenses: Option<Value>,
    pub images: Vec<Image>,
    pub annotations: Vec<Annotation>,
    pub categories: Vec<Category>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypoints_with(present: &[Keypoint]) -> Vec<f64> {
        let mut flat = vec![0.0; Keypoint::COUNT * 3];
        for (i, kp) in present.iter().enumerate() {
            let base = kp.index() * 3;
            flat[base] = 10.0 + i as f64;
            flat[base + 1] = 20.0 + i as f64;
            flat[base + 2] = 2.0;
        }
        flat
    }

    #[test]
    fn test_body_keypoints_skip_head() {
        let body: Vec<_> = Keypoint::body().collect();
        assert_eq!(body.len(), 12);
        assert_eq!(body.first(), Some(&Keypoint::LeftShoulder));
        assert_eq!(body.last(), Some(&Keypoint::RightAnkle));
        assert!(!Keypoint::Nose.is_body());
        assert!(!Keypoint::RightEar.is_body());
    }

    #[test]
    fn test_body_keypoint_count_ignores_head_and_zero_coords() {
        let mut flat = keypoints_with(&[
            Keypoint::Nose,
            Keypoint::LeftEye,
            Keypoint::LeftShoulder,
            Keypoint::RightKnee,
        ]);
        // x set but y zero: not present
        flat[Keypoint::LeftAnkle.index() * 3] = 5.0;
        let ann = Annotation::new(1, 1, 1).with_keypoints(&flat);
        assert_eq!(ann.body_keypoint_count(), 2);
    }

    #[test]
    fn test_short_keypoint_array_reads_as_absent() {
        let mut ann = Annotation::new(1, 1, 1);
        ann.keypoints = vec![Number::from(3), Number::from(4)];
        let kp = ann.keypoint(Keypoint::RightAnkle);
        assert!(!kp.is_present());
        assert_eq!(ann.body_keypoint_count(), 0);
    }

    #[test]
    fn test_integer_coordinates_survive_serialization() {
        let json = r#"{"id":7,"image_id":3,"category_id":1,"iscrowd":0,
            "bbox":[1,2,30,40],"keypoints":[0,0,0],"num_keypoints":0,"area":120.5}"#;
        let ann: Annotation = serde_json::from_str(json).unwrap();
        assert_eq!(ann.bbox(), Some(BBox::new(1.0, 2.0, 30.0, 40.0)));
        let out = serde_json::to_string(&ann).unwrap();
        assert!(out.contains(r#""bbox":[1,2,30,40]"#));
        assert!(out.contains(r#""area":120.5"#));
    }

    #[test]
    fn test_info_stamp_keeps_unknown_keys() {
        let mut fields = Map::new();
        fields.insert("description".into(), Value::from("COCO 2017 Dataset"));
        fields.insert("custom".into(), Value::from(42));
        let info = Info { fields };
        let stamp = InfoStamp {
            description: DEFAULT_DESCRIPTION.to_string(),
            contributor: "tester".to_string(),
            date: NaiveDate::from_ymd_opt(2021, 3, 9).unwrap(),
        };

        let stamped = info.stamp(&stamp);
        assert_eq!(stamped.get_str("description"), Some(DEFAULT_DESCRIPTION));
        assert_eq!(stamped.get_str("version"), Some("0.1"));
        assert_eq!(stamped.get_str("year"), Some("2021"));
        assert_eq!(stamped.get_str("date_created"), Some("2021/03/09"));
        assert_eq!(stamped.get_str("contributor"), Some("tester"));
        assert_eq!(stamped.get_str("url"), Some(""));
        assert_eq!(stamped.fields.get("custom"), Some(&Value::from(42)));
        // source block untouched
        assert_eq!(info.get_str("description"), Some("COCO 2017 Dataset"));
    }

    #[test]
    fn test_missing_top_level_key_is_an_error() {
        let json = r#"{"info":{},"images":[],"annotations":[]}"#;
        assert!(serde_json::from_str::<CocoFile>(json).is_err());
    }
}
