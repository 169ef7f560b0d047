use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::types::{AlertEvent, KindStats, PostureState, SubConditionKind};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Continuous activity after which an occurrence counts toward the
    /// session statistics.
    pub record_threshold_secs: f64,
    /// Continuous activity after which an occurrence raises an alert.
    pub alert_threshold_secs: f64,
    /// Wall time without a classification change before live timers reset.
    pub inactive_threshold_secs: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            record_threshold_secs: 15.0,
            alert_threshold_secs: 10.0,
            inactive_threshold_secs: 60.0,
        }
    }
}

/// Live timing state for one sub-condition.
#[derive(Clone, Debug, Default)]
struct SubConditionTimer {
    /// Set while an occurrence is running, cleared when it closes.
    active_since: Option<Instant>,
    /// One entry per closed occurrence that crossed the record threshold.
    durations_secs: Vec<f64>,
    /// Occurrences that crossed the record threshold, attributed at the
    /// moment of crossing rather than at close time.
    count_recorded: u32,
    current_occurrence_recorded: bool,
    alert_emitted: bool,
}

/// Converts the noisy per-frame classification stream into occurrence
/// timings, alert decisions and session statistics.
///
/// Exactly one call path mutates the tracker, once per frame and in frame
/// order: `begin_frame` → `set_state` → `end_frame`, then at most one
/// `should_trigger_alert` check. Polling accessors never mutate timing
/// state. No method returns an error or panics for any input sequence.
pub struct StateTracker {
    config: TrackerConfig,
    curr_state: PostureState,
    prev_state: PostureState,
    timers: HashMap<SubConditionKind, SubConditionTimer>,
    /// Kind of the most recent alert, cleared when Bad ends.
    last_alerted: Option<SubConditionKind>,
    /// Guards against a second alert when polling code re-checks within the
    /// same frame.
    alert_fired_this_frame: bool,
    inactive_secs: f64,
    inactive_mark: Instant,
}

impl StateTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self::new_at(config, Instant::now())
    }

    pub fn new_at(config: TrackerConfig, now: Instant) -> Self {
        let timers = SubConditionKind::ALL
            .iter()
            .map(|&kind| (kind, SubConditionTimer::default()))
            .collect();

        Self {
            config,
            curr_state: PostureState::Unknown,
            prev_state: PostureState::Unknown,
            timers,
            last_alerted: None,
            alert_fired_this_frame: false,
            inactive_secs: 0.0,
            inactive_mark: now,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Snapshots the previous overall state for the inactivity comparison.
    /// Call once at the top of each frame.
    pub fn begin_frame(&mut self) {
        self.prev_state = self.curr_state;
    }

    pub fn set_state(&mut self, overall: PostureState, active: &[SubConditionKind]) {
        self.set_state_at(overall, active, Instant::now());
    }

    /// Applies this frame's classification. Call exactly once per frame.
    pub fn set_state_at(
        &mut self,
        overall: PostureState,
        active: &[SubConditionKind],
        now: Instant,
    ) {
        let old_state = self.curr_state;
        self.curr_state = overall;
        self.alert_fired_this_frame = false;

        if old_state == PostureState::Bad && overall != PostureState::Bad {
            // Leaving Bad closes every open occurrence and rearms alerts.
            for &kind in SubConditionKind::ALL {
                self.close_occurrence(kind, now);
            }
            for timer in self.timers.values_mut() {
                timer.alert_emitted = false;
            }
            self.last_alerted = None;
        }

        if overall == PostureState::Bad {
            if old_state != PostureState::Bad {
                // Fresh Bad interval, every kind may alert again.
                for timer in self.timers.values_mut() {
                    timer.alert_emitted = false;
                }
                self.last_alerted = None;
            } else {
                // A kind that resolved while others stayed bad may alert on
                // a later fresh occurrence.
                for (kind, timer) in self.timers.iter_mut() {
                    if timer.alert_emitted && !active.contains(kind) {
                        timer.alert_emitted = false;
                    }
                }
            }

            for &kind in SubConditionKind::ALL {
                let is_active = active.contains(&kind);
                let running = self
                    .timers
                    .get(&kind)
                    .map(|t| t.active_since.is_some())
                    .unwrap_or(false);

                if is_active && !running {
                    self.begin_occurrence(kind, now);
                } else if !is_active && running {
                    self.close_occurrence(kind, now);
                }
            }
        }
    }

    fn begin_occurrence(&mut self, kind: SubConditionKind, now: Instant) {
        let Some(timer) = self.timers.get_mut(&kind) else {
            return;
        };
        timer.active_since = Some(now);
        timer.current_occurrence_recorded = false;
        timer.alert_emitted = false;
        log::debug!("{} occurrence started", kind.label());
    }

    /// Appends the elapsed duration to the history only when the occurrence
    /// had crossed the record threshold while it was active.
    fn close_occurrence(&mut self, kind: SubConditionKind, now: Instant) {
        let Some(timer) = self.timers.get_mut(&kind) else {
            return;
        };
        let Some(since) = timer.active_since.take() else {
            return;
        };

        let elapsed = now.duration_since(since).as_secs_f64();
        if timer.current_occurrence_recorded {
            timer.durations_secs.push(elapsed);
            log::info!("{} occurrence recorded: {:.1}s", kind.label(), elapsed);
        } else {
            log::debug!("{} occurrence ended below record threshold: {:.1}s", kind.label(), elapsed);
        }
        timer.alert_emitted = false;
    }

    pub fn end_frame(&mut self) -> bool {
        self.end_frame_at(Instant::now())
    }

    /// Inactivity accounting followed by the record-threshold check. Call
    /// once per frame after `set_state`. Returns true when the inactivity
    /// threshold fired and live timers were reset.
    pub fn end_frame_at(&mut self, now: Instant) -> bool {
        let mut reset_for_inactivity = false;

        let unchanged = self.curr_state == PostureState::Unknown
            || self.curr_state == self.prev_state;
        if unchanged {
            self.inactive_secs += now.duration_since(self.inactive_mark).as_secs_f64();
            self.inactive_mark = now;
            if self.inactive_secs >= self.config.inactive_threshold_secs {
                log::info!(
                    "no classification change for {:.0}s, resetting live timers",
                    self.inactive_secs
                );
                self.reset_at(now);
                reset_for_inactivity = true;
            }
        } else {
            self.inactive_secs = 0.0;
            self.inactive_mark = now;
        }

        self.check_and_record_at(now);
        reset_for_inactivity
    }

    /// Attributes the occurrence count at the moment the record threshold is
    /// first crossed, exactly once per occurrence.
    pub fn check_and_record_at(&mut self, now: Instant) {
        for &kind in SubConditionKind::ALL {
            let Some(timer) = self.timers.get_mut(&kind) else {
                continue;
            };
            let Some(since) = timer.active_since else {
                continue;
            };
            let elapsed = now.duration_since(since).as_secs_f64();
            if elapsed > self.config.record_threshold_secs && !timer.current_occurrence_recorded {
                timer.current_occurrence_recorded = true;
                timer.count_recorded += 1;
                log::info!(
                    "{} crossed {:.0}s, occurrence count now {}",
                    kind.label(),
                    self.config.record_threshold_secs,
                    timer.count_recorded
                );
            }
        }
    }

    pub fn should_trigger_alert(&mut self) -> Option<AlertEvent> {
        self.should_trigger_alert_at(Instant::now())
    }

    /// At most one alert per frame, chosen by the fixed priority order of
    /// `SubConditionKind::ALL`, and at most one per occurrence. When two
    /// kinds cross the threshold in the same frame only the higher-priority
    /// one fires now; the other fires on a later frame.
    pub fn should_trigger_alert_at(&mut self, now: Instant) -> Option<AlertEvent> {
        if self.alert_fired_this_frame || self.curr_state != PostureState::Bad {
            return None;
        }

        for &kind in SubConditionKind::ALL {
            let Some(timer) = self.timers.get_mut(&kind) else {
                continue;
            };
            let Some(since) = timer.active_since else {
                continue;
            };
            let elapsed = now.duration_since(since).as_secs_f64();
            if elapsed >= self.config.alert_threshold_secs && !timer.alert_emitted {
                timer.alert_emitted = true;
                self.alert_fired_this_frame = true;
                self.last_alerted = Some(kind);
                return Some(AlertEvent {
                    kind,
                    elapsed_secs: elapsed,
                });
            }
        }

        None
    }

    pub fn state(&self) -> PostureState {
        self.curr_state
    }

    pub fn last_alerted(&self) -> Option<SubConditionKind> {
        self.last_alerted
    }

    pub fn duration(&self, kind: SubConditionKind) -> f64 {
        self.duration_at(kind, Instant::now())
    }

    /// Live elapsed seconds of the running occurrence, 0.0 when inactive.
    pub fn duration_at(&self, kind: SubConditionKind, now: Instant) -> f64 {
        self.timers
            .get(&kind)
            .and_then(|t| t.active_since)
            .map(|since| now.duration_since(since).as_secs_f64())
            .unwrap_or(0.0)
    }

    pub fn all_durations(&self) -> Vec<(SubConditionKind, f64)> {
        self.all_durations_at(Instant::now())
    }

    pub fn all_durations_at(&self, now: Instant) -> Vec<(SubConditionKind, f64)> {
        SubConditionKind::ALL
            .iter()
            .map(|&kind| (kind, self.duration_at(kind, now)))
            .collect()
    }

    /// Aggregate statistics per kind, in priority order. Pure read: calling
    /// twice without an intervening frame yields identical results.
    pub fn all_stats(&self) -> Vec<(SubConditionKind, KindStats)> {
        SubConditionKind::ALL
            .iter()
            .map(|&kind| {
                let stats = self
                    .timers
                    .get(&kind)
                    .map(|timer| {
                        let avg = if timer.durations_secs.is_empty() {
                            0.0
                        } else {
                            timer.durations_secs.iter().sum::<f64>()
                                / timer.durations_secs.len() as f64
                        };
                        KindStats {
                            count: timer.count_recorded,
                            avg_duration_secs: avg,
                            durations_secs: timer.durations_secs.clone(),
                        }
                    })
                    .unwrap_or_default();
                (kind, stats)
            })
            .collect()
    }

    /// Closes every open occurrence at session end so that occurrences that
    /// crossed the record threshold still contribute their duration.
    pub fn finish_session(&mut self) {
        self.finish_session_at(Instant::now());
    }

    pub fn finish_session_at(&mut self, now: Instant) {
        for &kind in SubConditionKind::ALL {
            self.close_occurrence(kind, now);
        }
        self.curr_state = PostureState::Unknown;
        self.prev_state = PostureState::Unknown;
        self.last_alerted = None;
    }

    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    /// Drops all live timing state — open occurrences, alert flags, the
    /// inactivity clock — while keeping session-long counts and duration
    /// histories. In-flight occurrences are discarded, not closed.
    pub fn reset_at(&mut self, now: Instant) {
        self.curr_state = PostureState::Unknown;
        self.prev_state = PostureState::Unknown;
        for timer in self.timers.values_mut() {
            timer.active_since = None;
            timer.current_occurrence_recorded = false;
            timer.alert_emitted = false;
        }
        self.last_alerted = None;
        self.alert_fired_this_frame = false;
        self.inactive_secs = 0.0;
        self.inactive_mark = now;
    }

    /// Zeroes counts and duration histories to start a fresh session while
    /// reusing the tracker.
    pub fn reset_stats(&mut self) {
        for timer in self.timers.values_mut() {
            timer.count_recorded = 0;
            timer.durations_secs.clear();
            timer.current_occurrence_recorded = false;
        }
    }
}
