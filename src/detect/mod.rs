mod backend;
mod backends;
mod normalize;
mod raw;

pub use backend::{Completion, DetectorSource, PoseDetector, PoseEventSource, PoseListener};
pub use backends::{StubPoseDetector, StubPoseEmitter};
pub use normalize::{
    resolve_keypoint, BatchOutcome, Keypoint, Normalizer, NormalizerConfig, PersonDetection,
    Rejection, DEFAULT_BOX_PADDING, DEFAULT_CONFIDENCE, DEFAULT_KEYPOINT_THRESHOLD,
    DEFAULT_MIN_KEYPOINTS,
};
pub use raw::{
    Probe, RawBatch, RawDetection, DETECTION_SCORE, KEYPOINT_COLLECTION, KEYPOINT_SCORE,
    KEYPOINT_X, KEYPOINT_Y,
};
