use std::{thread, time::Instant};

use anyhow::Result;
use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};

use crate::types::AlertEvent;

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Minimum interval between dispatched notifications, across all kinds.
    pub min_interval_secs: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: 5.0,
        }
    }
}

/// A notification side-channel: desktop toast, audio cue, message box.
/// Channels are tried in order; the first success wins and failures fall
/// through to the next one.
pub trait NotificationChannel: Send {
    fn name(&self) -> &'static str;
    fn notify(&self, event: &AlertEvent) -> Result<()>;
}

/// Always-available tail of the channel chain: writes the alert to the log.
pub struct LogChannel;

impl NotificationChannel for LogChannel {
    fn name(&self) -> &'static str {
        "log"
    }

    fn notify(&self, event: &AlertEvent) -> Result<()> {
        log::warn!("posture alert: {}", event.message());
        Ok(())
    }
}

/// Global throttle so a burst of alerts from different kinds never floods
/// the notification backends.
struct RateLimiter {
    min_interval_secs: f64,
    last_dispatch: Option<Instant>,
}

impl RateLimiter {
    fn new(min_interval_secs: f64) -> Self {
        Self {
            min_interval_secs,
            last_dispatch: None,
        }
    }

    fn allow(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_dispatch {
            if now.duration_since(last).as_secs_f64() < self.min_interval_secs {
                return false;
            }
        }
        self.last_dispatch = Some(now);
        true
    }
}

/// Rate-limits tracker alerts and routes them through the channel chain.
pub struct AlertDispatcher {
    limiter: RateLimiter,
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl AlertDispatcher {
    pub fn new(config: AlertConfig, channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self {
            limiter: RateLimiter::new(config.min_interval_secs),
            channels,
        }
    }

    pub fn dispatch(&mut self, event: &AlertEvent) {
        self.dispatch_at(event, Instant::now());
    }

    /// Drops the event when inside the rate-limit window, otherwise walks
    /// the chain until a channel accepts it. Channel failure is never fatal.
    pub fn dispatch_at(&mut self, event: &AlertEvent, now: Instant) {
        if !self.limiter.allow(now) {
            log::debug!("alert suppressed by rate limit: {}", event.message());
            return;
        }

        for channel in &self.channels {
            match channel.notify(event) {
                Ok(()) => {
                    log::info!("alert delivered via {}: {}", channel.name(), event.message());
                    return;
                }
                Err(err) => {
                    log::warn!("notification channel {} failed: {err:?}", channel.name());
                }
            }
        }

        log::error!("all notification channels failed for: {}", event.message());
    }
}

/// Consumes alert events on a dedicated thread so a slow notification
/// backend never stalls the frame-processing path. The sender side uses
/// `try_send` on a bounded channel and drops on backpressure.
pub fn start_dispatcher(
    config: AlertConfig,
    channels: Vec<Box<dyn NotificationChannel>>,
    event_rx: Receiver<AlertEvent>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut dispatcher = AlertDispatcher::new(config, channels);
        for event in event_rx {
            dispatcher.dispatch(&event);
        }
    })
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use anyhow::anyhow;

    use super::*;
    use crate::types::SubConditionKind;

    struct CountingChannel {
        delivered: Arc<AtomicUsize>,
        fail: bool,
    }

    impl NotificationChannel for CountingChannel {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn notify(&self, _event: &AlertEvent) -> Result<()> {
            if self.fail {
                return Err(anyhow!("backend unavailable"));
            }
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn event() -> AlertEvent {
        AlertEvent {
            kind: SubConditionKind::ForwardHead,
            elapsed_secs: 10.0,
        }
    }

    #[test]
    fn rate_limit_suppresses_rapid_alerts() {
        let delivered = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = AlertDispatcher::new(
            AlertConfig::default(),
            vec![Box::new(CountingChannel {
                delivered: delivered.clone(),
                fail: false,
            })],
        );

        let base = Instant::now();
        dispatcher.dispatch_at(&event(), base);
        dispatcher.dispatch_at(&event(), base + Duration::from_secs_f64(1.0));
        dispatcher.dispatch_at(&event(), base + Duration::from_secs_f64(4.9));
        assert_eq!(delivered.load(Ordering::SeqCst), 1);

        dispatcher.dispatch_at(&event(), base + Duration::from_secs_f64(5.0));
        assert_eq!(delivered.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failing_channel_falls_through_to_next() {
        let delivered = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = AlertDispatcher::new(
            AlertConfig::default(),
            vec![
                Box::new(CountingChannel {
                    delivered: delivered.clone(),
                    fail: true,
                }),
                Box::new(CountingChannel {
                    delivered: delivered.clone(),
                    fail: false,
                }),
            ],
        );

        dispatcher.dispatch_at(&event(), Instant::now());
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn all_channels_failing_is_not_fatal() {
        let delivered = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = AlertDispatcher::new(
            AlertConfig::default(),
            vec![Box::new(CountingChannel {
                delivered,
                fail: true,
            })],
        );

        dispatcher.dispatch_at(&event(), Instant::now());
    }
}
