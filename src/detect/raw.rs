//! Loosely-typed detector output.
//!
//! Pose detectors disagree on field names and nesting. Nothing here is trusted:
//! values are located with ordered [`Probe`] rules ("try A, else B, else give
//! up") instead of a rigid schema.

use serde_json::Value;

/// One raw detection record, exactly as the detector produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDetection(pub Value);

impl RawDetection {
    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for RawDetection {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// What a detector handed back for one request.
#[derive(Clone, Debug, PartialEq)]
pub enum RawBatch {
    /// An array of records.
    Many(Vec<RawDetection>),
    /// A bare record.
    One(RawDetection),
    /// `null`, or no result at all.
    Nothing,
    /// A JSON kind no detector is expected to produce (string, number, bool).
    Malformed(&'static str),
}

impl RawBatch {
    /// Records in producer order. Empty for `Nothing` and `Malformed`.
    pub fn records(&self) -> &[RawDetection] {
        match self {
            RawBatch::Many(records) => records,
            RawBatch::One(record) => std::slice::from_ref(record),
            RawBatch::Nothing | RawBatch::Malformed(_) => &[],
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, RawBatch::Malformed(_))
    }
}

impl From<Value> for RawBatch {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => RawBatch::Many(items.into_iter().map(RawDetection).collect()),
            Value::Object(_) => RawBatch::One(RawDetection(value)),
            Value::Null => RawBatch::Nothing,
            Value::Bool(_) => RawBatch::Malformed("bool"),
            Value::Number(_) => RawBatch::Malformed("number"),
            Value::String(_) => RawBatch::Malformed("string"),
        }
    }
}

impl From<Option<Value>> for RawBatch {
    fn from(value: Option<Value>) -> Self {
        value.map(RawBatch::from).unwrap_or(RawBatch::Nothing)
    }
}

/// Ordered list of field paths. The first path that resolves wins.
#[derive(Clone, Copy, Debug)]
pub struct Probe {
    paths: &'static [&'static [&'static str]],
}

impl Probe {
    pub const fn new(paths: &'static [&'static [&'static str]]) -> Self {
        Self { paths }
    }

    /// First finite number found along the probe paths.
    pub fn number(&self, value: &Value) -> Option<f32> {
        self.candidates(value)
            .filter_map(Value::as_f64)
            .map(|n| n as f32)
            .find(|n| n.is_finite())
    }

    /// First non-empty array found along the probe paths.
    pub fn non_empty_array<'a>(&self, value: &'a Value) -> Option<&'a [Value]> {
        self.candidates(value)
            .filter_map(Value::as_array)
            .find(|items| !items.is_empty())
            .map(Vec::as_slice)
    }

    fn candidates<'a>(self, value: &'a Value) -> impl Iterator<Item = &'a Value> + 'a {
        let paths = self.paths;
        paths.iter().filter_map(move |path| lookup(value, path))
    }
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |node, key| node.get(*key))
}

/// Where a detection keeps its keypoints: bodyPose, then poseNet, then flattened lists.
pub const KEYPOINT_COLLECTION: Probe =
    Probe::new(&[&["keypoints"], &["pose", "keypoints"], &["poses"]]);
/// Per-keypoint score.
pub const KEYPOINT_SCORE: Probe = Probe::new(&[&["score"], &["confidence"]]);
/// Keypoint x: flat, then nested under `position`.
pub const KEYPOINT_X: Probe = Probe::new(&[&["x"], &["position", "x"]]);
/// Keypoint y: flat, then nested under `position`.
pub const KEYPOINT_Y: Probe = Probe::new(&[&["y"], &["position", "y"]]);
/// Whole-detection confidence.
pub const DETECTION_SCORE: Probe = Probe::new(&[&["score"], &["confidence"]]);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn batch_shapes() {
        assert_eq!(RawBatch::from(json!([{}, {}])).records().len(), 2);
        assert_eq!(RawBatch::from(json!({"score": 1})).records().len(), 1);
        assert_eq!(RawBatch::from(Value::Null), RawBatch::Nothing);
        assert_eq!(RawBatch::from(None::<Value>), RawBatch::Nothing);
        assert!(RawBatch::from(json!("oops")).is_malformed());
        assert!(RawBatch::from(json!(3)).records().is_empty());
    }

    #[test]
    fn probe_prefers_first_numeric_path() {
        let kp = json!({"score": "high", "confidence": 0.7});
        assert_eq!(KEYPOINT_SCORE.number(&kp), Some(0.7));

        let nested = json!({"position": {"x": 12.5, "y": 3}});
        assert_eq!(KEYPOINT_X.number(&nested), Some(12.5));
        assert_eq!(KEYPOINT_Y.number(&nested), Some(3.0));

        let flat_wins = json!({"x": 1, "position": {"x": 2}});
        assert_eq!(KEYPOINT_X.number(&flat_wins), Some(1.0));
    }

    #[test]
    fn keypoint_collection_skips_empty_arrays() {
        let record = json!({"keypoints": [], "pose": {"keypoints": [{"x": 1}]}});
        let found = KEYPOINT_COLLECTION.non_empty_array(&record).unwrap();
        assert_eq!(found.len(), 1);

        assert!(KEYPOINT_COLLECTION.non_empty_array(&json!({"poses": "nope"})).is_none());
    }
}
