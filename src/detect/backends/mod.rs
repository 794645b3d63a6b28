pub mod stub;

pub use stub::{StubPoseDetector, StubPoseEmitter};
