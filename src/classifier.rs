use serde::{Deserialize, Serialize};

use crate::types::{Classification, LandmarkFrame, Point, PostureSignals, PostureState, SubConditionKind};

/// Thresholds separating acceptable posture from the tracked sub-conditions.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Nose-to-shoulders angle above which the head counts as leaning forward.
    pub forward_head_angle_deg: i32,
    /// Ear-line deviation from horizontal above which the head counts as tilted.
    pub head_tilt_deviation_deg: f32,
    /// Shoulder height difference above which the spine counts as curved.
    pub shoulder_level_diff_px: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            forward_head_angle_deg: 107,
            head_tilt_deviation_deg: 15.0,
            shoulder_level_diff_px: 20.0,
        }
    }
}

/// Thresholds per-frame landmark coordinates into a posture verdict.
#[derive(Clone, Copy, Debug, Default)]
pub struct PostureClassifier {
    config: ClassifierConfig,
}

impl PostureClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, frame: &LandmarkFrame) -> Classification {
        let (Some(nose), Some(left_shoulder), Some(right_shoulder), Some(left_ear), Some(right_ear)) = (
            frame.nose,
            frame.left_shoulder,
            frame.right_shoulder,
            frame.left_ear,
            frame.right_ear,
        ) else {
            return Classification {
                overall: PostureState::NoPosture,
                active: Vec::new(),
                signals: None,
            };
        };

        let signals = PostureSignals {
            forward_head_angle: vertex_angle(left_shoulder, right_shoulder, nose),
            head_tilt_deviation: tilt_deviation(left_ear, right_ear),
            shoulder_level_diff: (left_shoulder.1 - right_shoulder.1).abs(),
        };

        let mut active = Vec::new();
        if signals.forward_head_angle > self.config.forward_head_angle_deg {
            active.push(SubConditionKind::ForwardHead);
        }
        if signals.head_tilt_deviation > self.config.head_tilt_deviation_deg {
            active.push(SubConditionKind::HeadTilt);
        }
        if signals.shoulder_level_diff > self.config.shoulder_level_diff_px {
            active.push(SubConditionKind::SpinalCurvature);
        }

        let overall = if active.is_empty() {
            PostureState::Good
        } else {
            PostureState::Bad
        };

        Classification {
            overall,
            active,
            signals: Some(signals),
        }
    }
}

/// Angle in degrees at `vertex` between the rays toward `p1` and `p2`,
/// rounded to the nearest integer. A degenerate zero-length ray yields 0
/// instead of NaN.
fn vertex_angle(p1: Point, p2: Point, vertex: Point) -> i32 {
    let a = (p1.0 - vertex.0, p1.1 - vertex.1);
    let b = (p2.0 - vertex.0, p2.1 - vertex.1);

    let norm_a = (a.0 * a.0 + a.1 * a.1).sqrt();
    let norm_b = (b.0 * b.0 + b.1 * b.1).sqrt();
    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        return 0;
    }

    let cos_theta = ((a.0 * b.0 + a.1 * b.1) / (norm_a * norm_b)).clamp(-1.0, 1.0);
    cos_theta.acos().to_degrees().round() as i32
}

/// Deviation of the ear-to-ear line from horizontal: the line's angle is
/// normalized into [0, 360), then folded toward whichever horizontal
/// direction (0 or 180) is closer.
fn tilt_deviation(left_ear: Point, right_ear: Point) -> f32 {
    let dx = right_ear.0 - left_ear.0;
    let dy = right_ear.1 - left_ear.1;

    let mut angle = dy.atan2(dx).to_degrees();
    if angle < 0.0 {
        angle += 360.0;
    }

    (angle - 180.0).abs().min(angle.abs())
}
