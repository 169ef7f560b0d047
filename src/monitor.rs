use std::{
    sync::{Arc, Mutex, MutexGuard},
    thread,
    time::Instant,
};

use crossbeam_channel::{Receiver, Sender};

use crate::{
    classifier::PostureClassifier,
    tracker::StateTracker,
    types::{AlertEvent, FrameReport, LandmarkFrame},
};

/// Runs one frame through the tracker: snapshot, classify, apply, record
/// check, alert check. This is the only path that mutates the tracker and
/// it must be called with frames in arrival order.
pub fn process_frame(
    tracker: &mut StateTracker,
    classifier: &PostureClassifier,
    frame: &LandmarkFrame,
) -> FrameReport {
    process_frame_at(tracker, classifier, frame, Instant::now())
}

pub fn process_frame_at(
    tracker: &mut StateTracker,
    classifier: &PostureClassifier,
    frame: &LandmarkFrame,
    now: Instant,
) -> FrameReport {
    tracker.begin_frame();
    let classification = classifier.classify(frame);
    tracker.set_state_at(classification.overall, &classification.active, now);
    tracker.end_frame_at(now);
    let alert = tracker.should_trigger_alert_at(now);

    FrameReport {
        durations: tracker.all_durations_at(now),
        classification,
        alert,
        timestamp: now,
    }
}

/// Consumes landmark frames in order on a dedicated thread, updating the
/// shared tracker and forwarding alerts. Unlike a preview pipeline this
/// never skips a frame: the tracker's occurrence bookkeeping depends on
/// seeing every transition.
///
/// Alerts go out with `try_send` so a full dispatcher queue drops the event
/// instead of stalling frame processing; the per-occurrence flag in the
/// tracker already guarantees it will not fire again for the same stretch.
pub fn start_monitor(
    classifier: PostureClassifier,
    tracker: Arc<Mutex<StateTracker>>,
    frame_rx: Receiver<LandmarkFrame>,
    alert_tx: Sender<AlertEvent>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for frame in frame_rx {
            let report = {
                let mut guard = lock_tracker(&tracker);
                process_frame(&mut guard, &classifier, &frame)
            };

            if let Some(alert) = report.alert {
                if alert_tx.try_send(alert).is_err() {
                    log::warn!("alert queue full, dropping {}", alert.message());
                }
            }
        }

        // Stream ended: close open occurrences so session stats are final.
        lock_tracker(&tracker).finish_session();
        log::info!("landmark stream ended, monitor stopped");
    })
}

fn lock_tracker(tracker: &Arc<Mutex<StateTracker>>) -> MutexGuard<'_, StateTracker> {
    match tracker.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crossbeam_channel::bounded;

    use super::*;
    use crate::{
        tracker::TrackerConfig,
        types::{PostureState, SubConditionKind},
    };

    fn upright() -> LandmarkFrame {
        LandmarkFrame {
            width: 960,
            height: 720,
            nose: Some((480.0, 200.0)),
            left_shoulder: Some((380.0, 400.0)),
            right_shoulder: Some((580.0, 400.0)),
            left_ear: Some((440.0, 180.0)),
            right_ear: Some((520.0, 180.0)),
        }
    }

    fn slouched() -> LandmarkFrame {
        let mut frame = upright();
        frame.nose = Some((480.0, 380.0));
        frame
    }

    #[test]
    fn frame_path_drives_tracker_through_alert() {
        let classifier = PostureClassifier::default();
        let mut tracker = StateTracker::new_at(TrackerConfig::default(), Instant::now());
        let base = Instant::now();
        let at = |secs: f64| base + Duration::from_secs_f64(secs);

        let report = process_frame_at(&mut tracker, &classifier, &upright(), at(0.0));
        assert_eq!(report.classification.overall, PostureState::Good);
        assert!(report.alert.is_none());

        let mut alert = None;
        for i in 1..=12 {
            let report = process_frame_at(&mut tracker, &classifier, &slouched(), at(i as f64));
            if report.alert.is_some() {
                alert = report.alert;
            }
        }
        let alert = alert.expect("sustained slouch raises an alert");
        assert_eq!(alert.kind, SubConditionKind::ForwardHead);
        assert!(alert.elapsed_secs >= 10.0);

        // Live duration visible in the report while the occurrence runs.
        let report = process_frame_at(&mut tracker, &classifier, &slouched(), at(13.0));
        let fh = report
            .durations
            .iter()
            .find(|(k, _)| *k == SubConditionKind::ForwardHead)
            .map(|(_, d)| *d)
            .unwrap_or(0.0);
        assert!((fh - 12.0).abs() < 1e-6);
    }

    #[test]
    fn missing_landmarks_report_no_posture() {
        let classifier = PostureClassifier::default();
        let mut tracker = StateTracker::new_at(TrackerConfig::default(), Instant::now());

        let report = process_frame(&mut tracker, &classifier, &LandmarkFrame::default());
        assert_eq!(report.classification.overall, PostureState::NoPosture);
        assert!(report.alert.is_none());
        assert!(report.durations.iter().all(|(_, d)| *d == 0.0));
    }

    #[test]
    fn worker_processes_stream_and_finishes_session() {
        let (frame_tx, frame_rx) = bounded(8);
        let (alert_tx, _alert_rx) = bounded(8);
        let tracker = Arc::new(Mutex::new(StateTracker::new(TrackerConfig::default())));

        let handle = start_monitor(
            PostureClassifier::default(),
            tracker.clone(),
            frame_rx,
            alert_tx,
        );

        for _ in 0..3 {
            frame_tx.send(slouched()).unwrap();
        }
        drop(frame_tx);
        handle.join().unwrap();

        let tracker = tracker.lock().unwrap();
        // Session finished: no occurrence left open, state back to Unknown.
        assert_eq!(tracker.state(), PostureState::Unknown);
        assert!(
            tracker
                .all_durations()
                .iter()
                .all(|(_, duration)| *duration == 0.0)
        );
    }
}
