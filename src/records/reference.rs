//! Reference numbers and placed-object records.

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Deserializer, Serialize};

/// Globally unique id of one placed object: content file plus index within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RefNum {
    pub content_file: i32,
    pub index: u32,
}

impl RefNum {
    pub const fn new(content_file: i32, index: u32) -> Self {
        Self { content_file, index }
    }
}

impl fmt::Display for RefNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.content_file, self.index)
    }
}

/// Record type of the object a reference places.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Static,
    Activator,
    Door,
    Container,
    Creature,
    Npc,
    Light,
    Misc,
    Other,
}

fn lowercase_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    String::deserialize(deserializer).map(|id| id.to_lowercase())
}

fn default_scale() -> f32 {
    1.0
}

/// One entry of a cell's reference list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectReference {
    pub ref_num: RefNum,
    pub record_type: RecordType,
    /// Record id, lowercase.
    #[serde(deserialize_with = "lowercase_id")]
    pub id: String,
    /// World position.
    pub position: Vec3,
    /// Euler angles in radians, applied Z first, then Y, then X.
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(default = "default_scale")]
    pub scale: f32,
    /// Deletion marker: removes any earlier entry with the same reference number.
    #[serde(default)]
    pub deleted: bool,
}

impl ObjectReference {
    pub fn new(ref_num: RefNum, record_type: RecordType, id: &str, position: Vec3) -> Self {
        Self {
            ref_num,
            record_type,
            id: id.to_lowercase(),
            position,
            rotation: Vec3::ZERO,
            scale: 1.0,
            deleted: false,
        }
    }

    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// The same reference as a deletion marker.
    pub fn into_deleted(mut self) -> Self {
        self.deleted = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refnum_order_is_file_then_index() {
        let mut nums = vec![RefNum::new(1, 0), RefNum::new(0, 5), RefNum::new(0, 2)];
        nums.sort();
        assert_eq!(nums, vec![RefNum::new(0, 2), RefNum::new(0, 5), RefNum::new(1, 0)]);
        assert_eq!(RefNum::new(2, 7).to_string(), "2:7");
    }

    #[test]
    fn test_reference_id_is_lowercased() {
        let r = ObjectReference::new(RefNum::new(0, 1), RecordType::Static, "Rock_01", Vec3::ZERO);
        assert_eq!(r.id, "rock_01");
        assert_eq!(r.scale, 1.0);
        assert!(!r.deleted);
        assert!(r.into_deleted().deleted);
    }

    #[test]
    fn test_reference_json_defaults() {
        let json = r#"{
            "ref_num": {"content_file": 0, "index": 3},
            "record_type": "door",
            "id": "door_01",
            "position": [1.0, 2.0, 3.0]
        }"#;
        let r: ObjectReference = serde_json::from_str(json).unwrap();
        assert_eq!(r.record_type, RecordType::Door);
        assert_eq!(r.scale, 1.0);
        assert_eq!(r.rotation, Vec3::ZERO);
        assert!(!r.deleted);
    }

    #[test]
    fn test_reference_json_id_is_lowercased() {
        let json = r#"{
            "ref_num": {"content_file": 0, "index": 1},
            "record_type": "static",
            "id": "NorthMarker",
            "position": [0.0, 0.0, 0.0]
        }"#;
        let r: ObjectReference = serde_json::from_str(json).unwrap();
        assert_eq!(r.id, "northmarker");
    }
}
