pub mod advice;
pub mod alert;
pub mod classifier;
pub mod config;
pub mod monitor;
pub mod tracker;
pub mod types;

// Re-exports for convenience
pub use advice::{AdviceClient, AdviceConfig, SessionSummary};
pub use alert::{AlertConfig, AlertDispatcher, LogChannel, NotificationChannel, start_dispatcher};
pub use classifier::{ClassifierConfig, PostureClassifier};
pub use config::Config;
pub use monitor::{process_frame, start_monitor};
pub use tracker::{StateTracker, TrackerConfig};
pub use types::{
    AlertEvent, Classification, FrameReport, KindStats, LandmarkFrame, PostureState,
    SubConditionKind,
};
