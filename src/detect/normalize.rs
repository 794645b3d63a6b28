//! Raw detection → canonical `PersonDetection`.
//!
//! Missing or mistyped fields are expected on live feeds (partial occlusion,
//! people entering frame). They are handled by per-field defaulting and silent
//! rejection, never surfaced as errors.

use serde::{Deserialize, Serialize};

use super::raw::{
    RawBatch, RawDetection, DETECTION_SCORE, KEYPOINT_COLLECTION, KEYPOINT_SCORE, KEYPOINT_X,
    KEYPOINT_Y,
};
use crate::geometry::Rect;

pub const DEFAULT_KEYPOINT_THRESHOLD: f32 = 0.3;
pub const DEFAULT_MIN_KEYPOINTS: usize = 3;
pub const DEFAULT_BOX_PADDING: f32 = 40.0;
pub const DEFAULT_CONFIDENCE: f32 = 0.85;

/// Keypoint in source-frame pixel space. `score` defaults to 0 when absent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

/// Canonical person detection in source-frame space. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersonDetection {
    pub bounding_box: Rect,
    pub confidence: f32,
    pub valid_keypoint_count: usize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizerConfig {
    /// A keypoint must score strictly above this to count.
    pub keypoint_threshold: f32,
    /// Fewer valid keypoints than this and the record is discarded.
    pub min_keypoints: usize,
    /// Margin added on every side of the keypoint hull before clamping.
    pub box_padding: f32,
    /// Used when the record carries no numeric score.
    pub default_confidence: f32,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            keypoint_threshold: DEFAULT_KEYPOINT_THRESHOLD,
            min_keypoints: DEFAULT_MIN_KEYPOINTS,
            box_padding: DEFAULT_BOX_PADDING,
            default_confidence: DEFAULT_CONFIDENCE,
        }
    }
}

/// Why a raw record produced no detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// No probe located a non-empty keypoint collection.
    NoKeypoints,
    /// Too few keypoints passed the score threshold.
    TooFewValid { valid: usize, required: usize },
}

/// Result of normalizing a whole detector batch.
#[derive(Clone, Debug, PartialEq)]
pub enum BatchOutcome {
    Detections(Vec<PersonDetection>),
    /// The detector returned something that is not a record or a list of records.
    Malformed(&'static str),
}

impl BatchOutcome {
    /// Detections to publish; a malformed batch publishes nothing.
    pub fn into_detections(self) -> Vec<PersonDetection> {
        match self {
            BatchOutcome::Detections(detections) => detections,
            BatchOutcome::Malformed(_) => Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Normalizer {
    config: NormalizerConfig,
    frame_width: f32,
    frame_height: f32,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig, frame_width: u32, frame_height: u32) -> Self {
        Self {
            config,
            frame_width: frame_width as f32,
            frame_height: frame_height as f32,
        }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Canonical detection, or `None` for records that cannot be trusted.
    pub fn normalize(&self, raw: &RawDetection) -> Option<PersonDetection> {
        match self.evaluate(raw) {
            Ok(detection) => Some(detection),
            Err(rejection) => {
                log::trace!("detection rejected: {:?}", rejection);
                None
            }
        }
    }

    /// Like [`normalize`](Self::normalize) but reports why a record was dropped.
    pub fn evaluate(&self, raw: &RawDetection) -> Result<PersonDetection, Rejection> {
        let value = raw.value();
        let keypoints = KEYPOINT_COLLECTION
            .non_empty_array(value)
            .ok_or(Rejection::NoKeypoints)?;

        let mut hull: Option<Rect> = None;
        let mut valid = 0usize;
        for kp in keypoints.iter().filter_map(resolve_keypoint) {
            if kp.score <= self.config.keypoint_threshold {
                continue;
            }
            valid += 1;
            hull = Some(match hull {
                None => Rect::from_corners(kp.x, kp.y, kp.x, kp.y),
                Some(r) => Rect::from_corners(
                    r.min_x.min(kp.x),
                    r.min_y.min(kp.y),
                    r.max_x.max(kp.x),
                    r.max_y.max(kp.y),
                ),
            });
        }

        let hull = match hull {
            Some(hull) if valid >= self.config.min_keypoints => hull,
            _ => {
                return Err(Rejection::TooFewValid {
                    valid,
                    required: self.config.min_keypoints,
                })
            }
        };

        let bounding_box = hull
            .expand(self.config.box_padding)
            .clamp_to(self.frame_width, self.frame_height);
        let confidence = DETECTION_SCORE
            .number(value)
            .unwrap_or(self.config.default_confidence);

        Ok(PersonDetection {
            bounding_box,
            confidence,
            valid_keypoint_count: valid,
        })
    }

    /// Normalize every record of a batch, preserving producer order.
    pub fn normalize_batch(&self, batch: &RawBatch) -> BatchOutcome {
        if let RawBatch::Malformed(kind) = batch {
            return BatchOutcome::Malformed(*kind);
        }
        BatchOutcome::Detections(
            batch
                .records()
                .iter()
                .filter_map(|raw| self.normalize(raw))
                .collect(),
        )
    }
}

/// Resolve one keypoint. `None` when either coordinate is missing or not a number.
/// Scores outside `[0, 1]` are treated as absent.
pub fn resolve_keypoint(value: &serde_json::Value) -> Option<Keypoint> {
    let x = KEYPOINT_X.number(value)?;
    let y = KEYPOINT_Y.number(value)?;
    let score = KEYPOINT_SCORE
        .number(value)
        .filter(|s| (0.0..=1.0).contains(s))
        .unwrap_or(0.0);
    Some(Keypoint { x, y, score })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn normalizer() -> Normalizer {
        Normalizer::new(NormalizerConfig::default(), 800, 600)
    }

    fn raw(value: Value) -> RawDetection {
        RawDetection(value)
    }

    #[test]
    fn body_pose_shape_is_accepted() {
        let det = normalizer()
            .normalize(&raw(json!({
                "confidence": 0.91,
                "keypoints": [
                    {"x": 200, "y": 150, "confidence": 0.9},
                    {"x": 260, "y": 150, "confidence": 0.8},
                    {"x": 230, "y": 300, "confidence": 0.7},
                ]
            })))
            .unwrap();
        assert_eq!(det.valid_keypoint_count, 3);
        assert_eq!(det.bounding_box, Rect::from_corners(160.0, 110.0, 300.0, 340.0));
        assert!((det.confidence - 0.91).abs() < 1e-6);
    }

    #[test]
    fn pose_net_shape_is_accepted() {
        let det = normalizer()
            .normalize(&raw(json!({
                "pose": {
                    "score": 0.4,
                    "keypoints": [
                        {"position": {"x": 100.0, "y": 100.0}, "score": 0.99},
                        {"position": {"x": 140.0, "y": 120.0}, "score": 0.95},
                        {"position": {"x": 120.0, "y": 200.0}, "score": 0.5},
                    ]
                }
            })))
            .unwrap();
        assert_eq!(det.bounding_box, Rect::from_corners(60.0, 60.0, 180.0, 240.0));
        // The pose-level score is nested, so the record-level fallback applies.
        assert_eq!(det.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn fewer_than_three_valid_points_is_rejected() {
        let record = raw(json!({
            "keypoints": [
                {"x": 10, "y": 10, "score": 0.9},
                {"x": 20, "y": 20, "score": 0.9},
                {"x": 30, "y": 30, "score": 0.3},
                {"x": 40, "y": 40},
                {"y": 50, "score": 0.9},
                {"x": "60", "y": 60, "score": 0.9},
            ]
        }));
        assert_eq!(
            normalizer().evaluate(&record),
            Err(Rejection::TooFewValid {
                valid: 2,
                required: 3
            })
        );
        assert!(normalizer().normalize(&record).is_none());
    }

    #[test]
    fn out_of_range_scores_count_as_zero() {
        let record = raw(json!({
            "keypoints": [
                {"x": 10, "y": 10, "score": 7.5},
                {"x": 20, "y": 20, "score": 42.0},
                {"x": 30, "y": 30, "score": 1.2},
                {"x": 40, "y": 40, "score": -0.5},
            ]
        }));
        assert_eq!(
            normalizer().evaluate(&record),
            Err(Rejection::TooFewValid {
                valid: 0,
                required: 3
            })
        );
        let kp = resolve_keypoint(&json!({"x": 1, "y": 2, "score": 1.0})).unwrap();
        assert_eq!(kp.score, 1.0);
        let kp = resolve_keypoint(&json!({"x": 1, "y": 2, "confidence": 3})).unwrap();
        assert_eq!(kp.score, 0.0);
    }

    #[test]
    fn low_scoring_points_do_not_block_acceptance() {
        let det = normalizer()
            .normalize(&raw(json!({
                "keypoints": [
                    {"x": 300, "y": 300, "score": 0.9},
                    {"x": 320, "y": 310, "score": 0.9},
                    {"x": 310, "y": 360, "score": 0.9},
                    {"x": 0, "y": 0, "score": 0.1},
                ]
            })))
            .unwrap();
        assert_eq!(det.valid_keypoint_count, 3);
        assert_eq!(det.bounding_box.min_x, 260.0);
    }

    #[test]
    fn box_is_padded_then_clamped_to_frame() {
        let det = normalizer()
            .normalize(&raw(json!({
                "keypoints": [
                    {"x": 5, "y": 5, "score": 0.9},
                    {"x": 790, "y": 20, "score": 0.9},
                    {"x": 400, "y": 595, "score": 0.9},
                ]
            })))
            .unwrap();
        assert_eq!(det.bounding_box, Rect::from_corners(0.0, 0.0, 800.0, 600.0));
    }

    #[test]
    fn records_without_keypoints_are_rejected() {
        let n = normalizer();
        for value in [
            json!({}),
            json!({"keypoints": []}),
            json!({"keypoints": "none"}),
            json!({"score": 0.99}),
        ] {
            assert_eq!(n.evaluate(&raw(value)), Err(Rejection::NoKeypoints));
        }
    }

    #[test]
    fn batch_keeps_order_and_drops_rejects() {
        let good = |x: f32| {
            json!({"keypoints": [
                {"x": x, "y": 100, "score": 0.9},
                {"x": x + 10.0, "y": 120, "score": 0.9},
                {"x": x + 5.0, "y": 200, "score": 0.9},
            ]})
        };
        let batch = RawBatch::from(json!([good(100.0), {"keypoints": []}, good(500.0)]));
        let detections = normalizer().normalize_batch(&batch).into_detections();
        assert_eq!(detections.len(), 2);
        assert!(detections[0].bounding_box.min_x < detections[1].bounding_box.min_x);
    }

    #[test]
    fn malformed_batch_is_reported() {
        let outcome = normalizer().normalize_batch(&RawBatch::from(json!(42)));
        assert_eq!(outcome, BatchOutcome::Malformed("number"));
        assert!(outcome.into_detections().is_empty());
    }
}
