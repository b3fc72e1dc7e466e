use crate::config::MonitorConfig;
use crate::thresholds::ThresholdPair;

/// Notification the orchestrator should attempt to deliver this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertNotification {
    pub temperature: f32,
    pub priority: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertStatus {
    pub active: bool,
    pub notify_interval_ms: u64,
    pub priority: bool,
    pub last_notify_ms: Option<u64>,
}

/// Breach detection plus the notification backoff policy.
///
/// In range means normal: the backoff drops to zero and priority re-arms the
/// moment a reading comes back inside the thresholds, so the next breach
/// notifies immediately even seconds after the last one.
#[derive(Debug)]
pub struct AlertEngine {
    pub config: MonitorConfig,
    status: AlertStatus,
}

impl AlertEngine {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            status: AlertStatus {
                active: false,
                notify_interval_ms: 0,
                priority: true,
                last_notify_ms: None,
            },
        }
    }

    /// Classifies the reading against the thresholds. Equality at either
    /// boundary is in range; only strict excursions alert. Returns a
    /// notification when one is due under the current backoff.
    pub fn evaluate(
        &mut self,
        temperature: f32,
        thresholds: &ThresholdPair,
        now_ms: u64,
    ) -> Option<AlertNotification> {
        let breached = temperature < thresholds.lower || temperature > thresholds.upper;
        if !breached {
            self.status.active = false;
            self.status.notify_interval_ms = 0;
            self.status.priority = true;
            return None;
        }

        self.status.active = true;
        if self.elapsed_since_notify(now_ms) < self.status.notify_interval_ms {
            return None;
        }

        Some(AlertNotification {
            temperature,
            priority: self.status.priority,
        })
    }

    /// Called after a delivery attempt, successful or not. Advances the
    /// backoff so a persisting breach notifies at most once per interval,
    /// and drops to normal priority for the repeats.
    pub fn note_notified(&mut self, now_ms: u64) {
        self.status.notify_interval_ms = self.config.notify_backoff_ms;
        self.status.priority = false;
        self.status.last_notify_ms = Some(now_ms);
    }

    pub fn status(&self) -> AlertStatus {
        self.status
    }

    pub fn is_alerting(&self) -> bool {
        self.status.active
    }

    fn elapsed_since_notify(&self, now_ms: u64) -> u64 {
        match self.status.last_notify_ms {
            Some(last) => now_ms.saturating_sub(last),
            None => u64::MAX,
        }
    }
}
