use std::{
    env,
    path::Path,
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use anyhow::Result;
use crossbeam_channel::bounded;

use sitsense::{
    AdviceClient, Config, LandmarkFrame, LogChannel, NotificationChannel, PostureClassifier,
    SessionSummary, StateTracker, alert, monitor,
};

/// Demo wiring: replays a scripted landmark sequence through the monitor
/// worker and prints the end-of-session report. Real deployments feed the
/// frame channel from their own pose estimator.
fn main() -> Result<()> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => Config::load(Path::new(&path))?,
        None => Config::default(),
    };

    let (frame_tx, frame_rx) = bounded(32);
    let (alert_tx, alert_rx) = bounded(8);

    let channels: Vec<Box<dyn NotificationChannel>> = vec![Box::new(LogChannel)];
    let dispatcher = alert::start_dispatcher(config.alert, channels, alert_rx);

    let tracker = Arc::new(Mutex::new(StateTracker::new(config.tracker)));
    let worker = monitor::start_monitor(
        PostureClassifier::new(config.classifier),
        tracker.clone(),
        frame_rx,
        alert_tx,
    );

    let session_start = Instant::now();
    for frame in scripted_session() {
        frame_tx.send(frame)?;
        thread::sleep(Duration::from_millis(40));
    }
    drop(frame_tx);

    worker.join().ok();
    dispatcher.join().ok();

    let stats = match tracker.lock() {
        Ok(tracker) => tracker.all_stats(),
        Err(poisoned) => poisoned.into_inner().all_stats(),
    };
    let summary = SessionSummary::new(session_start.elapsed().as_secs_f64(), stats);

    println!("检测时长: {:.1} 秒", summary.duration_secs);
    for (kind, kind_stats) in &summary.stats {
        println!(
            "{}: {} 次, 平均持续 {:.1} 秒",
            kind.label(),
            kind_stats.count,
            kind_stats.avg_duration_secs
        );
    }
    for record in &summary.detailed_records {
        println!("  {record}");
    }

    let advice_config = config.advice.clone();
    if let Ok(api_key) = env::var(&advice_config.api_key_env) {
        let client = AdviceClient::new(advice_config, api_key)?;
        println!("\n坐姿评估报告:\n{}", client.generate(&summary));
    }

    Ok(())
}

fn scripted_session() -> Vec<LandmarkFrame> {
    let upright = LandmarkFrame {
        width: 960,
        height: 720,
        nose: Some((480.0, 200.0)),
        left_shoulder: Some((380.0, 400.0)),
        right_shoulder: Some((580.0, 400.0)),
        left_ear: Some((440.0, 180.0)),
        right_ear: Some((520.0, 180.0)),
    };
    let slouched = LandmarkFrame {
        nose: Some((480.0, 380.0)),
        ..upright.clone()
    };
    let out_of_frame = LandmarkFrame {
        width: 960,
        height: 720,
        ..LandmarkFrame::default()
    };

    let mut frames = Vec::new();
    frames.extend(std::iter::repeat_n(upright.clone(), 20));
    frames.extend(std::iter::repeat_n(slouched, 30));
    frames.extend(std::iter::repeat_n(out_of_frame, 10));
    frames.extend(std::iter::repeat_n(upright, 20));
    frames
}
