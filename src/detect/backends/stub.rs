use anyhow::Result;
use serde_json::{json, Value};
use std::time::Duration;

use crate::detect::backend::{Completion, PoseDetector, PoseEventSource, PoseListener};
use crate::frame::Frame;

/// COCO keypoint layout as offsets from the body center, in body heights.
const SKELETON: [(&str, f32, f32); 17] = [
    ("nose", 0.0, -0.45),
    ("left_eye", -0.03, -0.48),
    ("right_eye", 0.03, -0.48),
    ("left_ear", -0.06, -0.46),
    ("right_ear", 0.06, -0.46),
    ("left_shoulder", -0.12, -0.30),
    ("right_shoulder", 0.12, -0.30),
    ("left_elbow", -0.16, -0.12),
    ("right_elbow", 0.16, -0.12),
    ("left_wrist", -0.17, 0.05),
    ("right_wrist", 0.17, 0.05),
    ("left_hip", -0.08, 0.05),
    ("right_hip", 0.08, 0.05),
    ("left_knee", -0.09, 0.25),
    ("right_knee", 0.09, 0.25),
    ("left_ankle", -0.09, 0.45),
    ("right_ankle", 0.09, 0.45),
];

/// Ankles are reported but below the acceptance threshold, like a desk-height camera.
const OCCLUDED_SCORE: f32 = 0.2;
const VISIBLE_SCORE: f32 = 0.9;

/// Keypoint positions for `people` figures swaying across a frame.
fn synthetic_people(frame: &Frame, people: usize) -> Vec<Vec<(&'static str, f32, f32, f32)>> {
    let w = frame.width as f32;
    let h = frame.height as f32;
    let body = h * 0.5;
    let amplitude = (w / (people as f32 + 1.0) / 4.0).max(1.0);
    let phase = (frame.sequence % 64) as f32 / 64.0;
    (0..people)
        .map(|i| {
            let sway = ((phase + i as f32 * 0.25).fract() * 2.0 - 1.0).abs() * 2.0 - 1.0;
            let cx = w * (i as f32 + 1.0) / (people as f32 + 1.0) + sway * amplitude;
            let cy = h * 0.5;
            SKELETON
                .iter()
                .map(|&(name, dx, dy)| {
                    let score = if name.ends_with("ankle") {
                        OCCLUDED_SCORE
                    } else {
                        VISIBLE_SCORE
                    };
                    (name, cx + dx * body, cy + dy * body, score)
                })
                .collect()
        })
        .collect()
}

/// Batch detector producing flat `{x, y, confidence}` keypoints.
///
/// With a latency set, results are delivered from a helper thread after the
/// delay, exercising the asynchronous completion path.
pub struct StubPoseDetector {
    people: usize,
    latency: Option<Duration>,
    warm_up_delay: Duration,
}

impl StubPoseDetector {
    pub fn new(people: usize) -> Self {
        Self {
            people,
            latency: None,
            warm_up_delay: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_warm_up_delay(mut self, delay: Duration) -> Self {
        self.warm_up_delay = delay;
        self
    }

    fn render(&self, frame: &Frame) -> Value {
        let records = synthetic_people(frame, self.people)
            .into_iter()
            .map(|points| {
                let keypoints: Vec<Value> = points
                    .into_iter()
                    .map(|(name, x, y, score)| {
                        json!({"name": name, "x": x, "y": y, "confidence": score})
                    })
                    .collect();
                json!({"confidence": 0.9, "keypoints": keypoints})
            })
            .collect();
        Value::Array(records)
    }
}

impl Default for StubPoseDetector {
    fn default() -> Self {
        Self::new(2)
    }
}

impl PoseDetector for StubPoseDetector {
    fn name(&self) -> &'static str {
        "stub-batch"
    }

    fn warm_up(&mut self) -> Result<()> {
        if !self.warm_up_delay.is_zero() {
            std::thread::sleep(self.warm_up_delay);
        }
        Ok(())
    }

    fn detect(&mut self, frame: &Frame, completion: Completion) -> Result<()> {
        let result = self.render(frame);
        match self.latency {
            None => {
                completion.deliver(result);
            }
            Some(latency) => {
                std::thread::Builder::new()
                    .name("stub-pose".into())
                    .spawn(move || {
                        std::thread::sleep(latency);
                        completion.deliver(result);
                    })?;
            }
        }
        Ok(())
    }
}

/// Event-style detector producing nested `{pose: {keypoints: [{position, score}]}}`
/// records, emitted once per fed frame.
pub struct StubPoseEmitter {
    people: usize,
    listener: Option<PoseListener>,
    subscriptions: usize,
}

impl StubPoseEmitter {
    pub fn new(people: usize) -> Self {
        Self {
            people,
            listener: None,
            subscriptions: 0,
        }
    }

    /// Number of times `subscribe` has been called.
    pub fn subscriptions(&self) -> usize {
        self.subscriptions
    }
}

impl PoseEventSource for StubPoseEmitter {
    fn name(&self) -> &'static str {
        "stub-events"
    }

    fn subscribe(&mut self, listener: PoseListener) -> Result<()> {
        self.subscriptions += 1;
        self.listener = Some(listener);
        Ok(())
    }

    fn feed(&mut self, frame: &Frame) -> Result<()> {
        let Some(listener) = &self.listener else {
            return Ok(());
        };
        let poses: Vec<Value> = synthetic_people(frame, self.people)
            .into_iter()
            .map(|points| {
                let keypoints: Vec<Value> = points
                    .into_iter()
                    .map(|(part, x, y, score)| {
                        json!({"part": part, "position": {"x": x, "y": y}, "score": score})
                    })
                    .collect();
                json!({"pose": {"score": 0.8, "keypoints": keypoints}, "skeleton": []})
            })
            .collect();
        listener.emit(Value::Array(poses));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Normalizer, NormalizerConfig};
    use crate::stream::SnapshotPublisher;
    use std::sync::Arc;

    fn publisher() -> Arc<SnapshotPublisher> {
        Arc::new(SnapshotPublisher::new(
            Normalizer::new(NormalizerConfig::default(), 800, 600),
            Duration::from_secs(2),
        ))
    }

    #[test]
    fn batch_stub_delivers_synchronously() -> Result<()> {
        let publisher = publisher();
        let frame = Frame::filled(800, 600, [0, 0, 0, 255], 3)?;
        let mut detector = StubPoseDetector::new(3);
        let ticket = publisher.issue().expect("ticket");
        detector.detect(&frame, Completion::new(ticket, publisher.clone()))?;

        let snap = publisher.current();
        assert_eq!(snap.len(), 3);
        // 17 points minus the two occluded ankles.
        assert!(snap.iter().all(|d| d.valid_keypoint_count == 15));
        assert!(snap.iter().all(|d| (d.confidence - 0.9).abs() < 1e-6));
        assert!(!publisher.in_flight());
        Ok(())
    }

    #[test]
    fn emitter_uses_nested_shape() -> Result<()> {
        let publisher = publisher();
        let frame = Frame::filled(800, 600, [0, 0, 0, 255], 1)?;
        let mut emitter = StubPoseEmitter::new(2);

        emitter.feed(&frame)?;
        assert!(publisher.current().is_empty(), "no listener yet");

        emitter.subscribe(PoseListener::new(publisher.clone()))?;
        emitter.feed(&frame)?;
        let snap = publisher.current();
        assert_eq!(snap.len(), 2);
        assert!(snap.iter().all(|d| d.confidence == crate::detect::DEFAULT_CONFIDENCE));
        assert_eq!(emitter.subscriptions(), 1);
        Ok(())
    }
}
