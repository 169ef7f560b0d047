use std::time::Instant;

/// Pixel coordinate of a body landmark, origin at the top-left of the frame.
pub type Point = (f32, f32);

/// Per-frame landmark coordinates handed over by the pose estimator.
///
/// `None` means the estimator could not locate the landmark in this frame;
/// the classifier treats any missing required landmark as "no posture".
#[derive(Clone, Debug, Default)]
pub struct LandmarkFrame {
    pub width: u32,
    pub height: u32,
    pub nose: Option<Point>,
    pub left_shoulder: Option<Point>,
    pub right_shoulder: Option<Point>,
    pub left_ear: Option<Point>,
    pub right_ear: Option<Point>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PostureState {
    /// No frame classified yet.
    #[default]
    Unknown,
    Good,
    Bad,
    /// Required landmarks missing, user likely out of frame.
    NoPosture,
}

impl PostureState {
    pub fn label(&self) -> &'static str {
        match self {
            PostureState::Unknown => "未识别",
            PostureState::Good => "姿态良好",
            PostureState::Bad => "不良坐姿",
            PostureState::NoPosture => "未检测到姿态",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubConditionKind {
    ForwardHead,
    HeadTilt,
    SpinalCurvature,
}

impl SubConditionKind {
    /// Every tracked kind, in alert priority order. The tracker and the
    /// alert scan iterate this slice rather than naming kinds one by one,
    /// so adding a kind only touches this module.
    pub const ALL: &'static [SubConditionKind] = &[
        SubConditionKind::ForwardHead,
        SubConditionKind::HeadTilt,
        SubConditionKind::SpinalCurvature,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SubConditionKind::ForwardHead => "头部前倾",
            SubConditionKind::HeadTilt => "歪头",
            SubConditionKind::SpinalCurvature => "脊柱侧弯",
        }
    }
}

/// Raw scalar signals measured by the geometric classifier, kept around so
/// callers can display them next to the verdict.
#[derive(Clone, Copy, Debug, Default)]
pub struct PostureSignals {
    /// Angle at the nose between the rays to both shoulders, degrees.
    pub forward_head_angle: i32,
    /// Deviation of the ear-to-ear line from horizontal, degrees.
    pub head_tilt_deviation: f32,
    /// Vertical pixel difference between the shoulders.
    pub shoulder_level_diff: f32,
}

/// Verdict for one frame.
#[derive(Clone, Debug)]
pub struct Classification {
    pub overall: PostureState,
    pub active: Vec<SubConditionKind>,
    pub signals: Option<PostureSignals>,
}

/// Emitted at most once per continuous occurrence of a sub-condition.
#[derive(Clone, Copy, Debug)]
pub struct AlertEvent {
    pub kind: SubConditionKind,
    /// Continuous active time of the occurrence when the alert fired, seconds.
    pub elapsed_secs: f64,
}

impl AlertEvent {
    pub fn message(&self) -> String {
        format!(
            "检测到{} {:.1} 秒，请立刻调整坐姿。",
            self.kind.label(),
            self.elapsed_secs
        )
    }
}

/// Aggregate statistics for one sub-condition, derived from the tracker.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KindStats {
    /// Occurrences whose continuous duration crossed the record threshold.
    pub count: u32,
    /// Mean of the recorded durations, 0.0 when nothing was recorded.
    pub avg_duration_secs: f64,
    pub durations_secs: Vec<f64>,
}

/// What the monitor loop hands back to the caller after each frame.
#[derive(Clone, Debug)]
pub struct FrameReport {
    pub classification: Classification,
    /// Live elapsed seconds per kind, 0.0 for inactive kinds.
    pub durations: Vec<(SubConditionKind, f64)>,
    pub alert: Option<AlertEvent>,
    pub timestamp: Instant,
}
