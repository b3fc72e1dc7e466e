use log::{info, warn};

use crate::alert::{AlertEngine, AlertNotification};
use crate::config::MonitorConfig;
use crate::display::DisplaySnapshot;
use crate::error::MonitorError;
use crate::input::InputController;
use crate::ports::{
    ControlPanel, DisplayPresenter, LinkIndicator, NotificationSink, TemperatureSource,
    ThresholdStorage,
};
use crate::thresholds::{ThresholdPair, ThresholdStore};
use crate::types::alert_payload;

/// Platform adapters the monitor drives. Host and device builds plug in
/// their own implementations.
pub struct MonitorPorts {
    pub sensor: Box<dyn TemperatureSource>,
    pub panel: Box<dyn ControlPanel>,
    pub display: Box<dyn DisplayPresenter>,
    pub sink: Box<dyn NotificationSink>,
    pub storage: Box<dyn ThresholdStorage>,
    pub link: Box<dyn LinkIndicator>,
}

/// Ties the input, threshold, alert and persistence pieces together. The
/// owning binary calls `tick` once per period and sleeps out the remainder;
/// any error escaping a tick is fatal and handled by its supervisor.
pub struct Monitor {
    config: MonitorConfig,
    input: InputController,
    thresholds: ThresholdStore,
    alerts: AlertEngine,
    ports: MonitorPorts,
    last_persist_check_ms: u64,
    last_report_ms: Option<u64>,
    last_shown: Option<DisplaySnapshot>,
    link_connected: Option<bool>,
}

impl Monitor {
    /// Loads the persisted thresholds, falling back to the configured
    /// defaults when no record exists yet.
    pub fn new(config: MonitorConfig, mut ports: MonitorPorts) -> Result<Self, MonitorError> {
        let pair = match ports
            .storage
            .read_record()
            .map_err(MonitorError::Persistence)?
        {
            Some(record) => ThresholdPair::decode(record),
            None => ThresholdPair {
                upper: config.default_upper,
                lower: config.default_lower,
            },
        };
        info!(
            "thresholds loaded: upper {:.1} lower {:.1}",
            pair.upper, pair.lower
        );

        Ok(Self {
            input: InputController::new(),
            thresholds: ThresholdStore::new(pair),
            alerts: AlertEngine::new(config.clone()),
            ports,
            config,
            last_persist_check_ms: 0,
            last_report_ms: None,
            last_shown: None,
            link_connected: None,
        })
    }

    pub fn tick(&mut self, now_ms: u64) -> Result<(), MonitorError> {
        let sample = self.ports.panel.sample();
        if self.input.poll_button_toggle(sample.button_pressed) {
            self.thresholds.toggle_selection();
            info!(
                "editing {} threshold",
                self.thresholds.selection().as_str()
            );
        }
        let delta = self.input.poll_encoder(sample.encoder_position);
        if delta != 0 {
            self.thresholds.apply_delta(delta);
        }

        let temperature = self
            .ports
            .sensor
            .read_temperature()
            .map_err(MonitorError::SensorRead)?;

        let thresholds = self.thresholds.pair();
        if let Some(notification) = self.alerts.evaluate(temperature, &thresholds, now_ms) {
            self.deliver_alert(notification, now_ms)?;
        }

        self.report_if_due(temperature, now_ms);
        self.refresh_display(temperature);
        self.refresh_link_indicator();
        self.sync_thresholds_if_due(now_ms)?;

        Ok(())
    }

    fn deliver_alert(
        &mut self,
        notification: AlertNotification,
        now_ms: u64,
    ) -> Result<(), MonitorError> {
        if !self.ports.sink.is_connected() {
            self.ports
                .sink
                .reconnect()
                .map_err(MonitorError::Connectivity)?;
        }

        let payload = alert_payload(
            notification.temperature,
            notification.priority,
            self.config.unit,
        );
        match self.ports.sink.send_alert(&payload) {
            Ok(()) => info!(
                "alert sent: {:.1} (critical {})",
                notification.temperature, notification.priority
            ),
            Err(err) => warn!("alert delivery failed: {err:#}"),
        }

        // Backoff advances either way; a failed delivery is not retried
        // until the next window.
        self.alerts.note_notified(now_ms);
        Ok(())
    }

    fn report_if_due(&mut self, temperature: f32, now_ms: u64) {
        let due = match self.last_report_ms {
            Some(last_ms) => now_ms.saturating_sub(last_ms) >= self.config.report_interval_ms,
            None => true,
        };
        if !due {
            return;
        }

        // Reports are best effort and wait for the link rather than forcing
        // a reconnect.
        if !self.ports.sink.is_connected() {
            return;
        }

        self.last_report_ms = Some(now_ms);
        if let Err(err) = self.ports.sink.send_report(temperature) {
            warn!("temperature report failed: {err:#}");
        }
    }

    fn refresh_display(&mut self, temperature: f32) {
        let pair = self.thresholds.pair();
        let snapshot = DisplaySnapshot {
            upper: pair.upper,
            current: temperature,
            lower: pair.lower,
            selection: self.thresholds.selection(),
            unit: self.config.unit,
        };
        if self.last_shown.as_ref() == Some(&snapshot) {
            return;
        }

        match self.ports.display.present(&snapshot) {
            Ok(()) => self.last_shown = Some(snapshot),
            Err(err) => warn!("display refresh failed: {err:#}"),
        }
    }

    fn refresh_link_indicator(&mut self) {
        let connected = self.ports.sink.is_connected();
        if self.link_connected == Some(connected) {
            return;
        }

        self.link_connected = Some(connected);
        self.ports.link.set_connected(connected);
        info!("network link {}", if connected { "up" } else { "down" });
    }

    /// Coarse sweep: re-read the record, write only when the live pair
    /// differs. At most one write per interval bounds flash wear.
    fn sync_thresholds_if_due(&mut self, now_ms: u64) -> Result<(), MonitorError> {
        if now_ms.saturating_sub(self.last_persist_check_ms) < self.config.persist_interval_ms {
            return Ok(());
        }
        self.last_persist_check_ms = now_ms;

        let on_disk = match self
            .ports
            .storage
            .read_record()
            .map_err(MonitorError::Persistence)?
        {
            Some(record) => ThresholdPair::decode(record),
            None => self.thresholds.persisted(),
        };
        if !self.thresholds.is_dirty(&on_disk) {
            return Ok(());
        }

        let pair = self.thresholds.pair();
        self.ports
            .storage
            .write_record(pair.encode())
            .map_err(MonitorError::Persistence)?;
        self.thresholds.mark_clean(pair);
        info!(
            "thresholds persisted: upper {:.1} lower {:.1}",
            pair.upper, pair.lower
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::ports::ControlSample;
    use crate::thresholds::Selection;

    #[derive(Default)]
    struct TestState {
        temperature: f32,
        sensor_fails: bool,
        sample: ControlSample,
        connected: bool,
        reconnect_succeeds: bool,
        reconnects: u32,
        send_fails: bool,
        alerts: Vec<serde_json::Value>,
        reports: Vec<f32>,
        record: Option<[u8; ThresholdPair::ENCODED_LEN]>,
        read_fails: bool,
        writes: u32,
        presented: Vec<DisplaySnapshot>,
        present_fails: bool,
        link_updates: Vec<bool>,
    }

    type Shared = Rc<RefCell<TestState>>;

    struct FakeSensor(Shared);

    impl TemperatureSource for FakeSensor {
        fn read_temperature(&mut self) -> anyhow::Result<f32> {
            let state = self.0.borrow();
            if state.sensor_fails {
                anyhow::bail!("sensor offline");
            }
            Ok(state.temperature)
        }
    }

    struct FakePanel(Shared);

    impl ControlPanel for FakePanel {
        fn sample(&mut self) -> ControlSample {
            self.0.borrow().sample
        }
    }

    struct FakeDisplay(Shared);

    impl DisplayPresenter for FakeDisplay {
        fn present(&mut self, snapshot: &DisplaySnapshot) -> anyhow::Result<()> {
            let mut state = self.0.borrow_mut();
            if state.present_fails {
                anyhow::bail!("display write failed");
            }
            state.presented.push(snapshot.clone());
            Ok(())
        }
    }

    struct FakeSink(Shared);

    impl NotificationSink for FakeSink {
        fn is_connected(&self) -> bool {
            self.0.borrow().connected
        }

        fn reconnect(&mut self) -> anyhow::Result<()> {
            let mut state = self.0.borrow_mut();
            state.reconnects += 1;
            if state.reconnect_succeeds {
                state.connected = true;
                Ok(())
            } else {
                anyhow::bail!("reconnect attempts exhausted")
            }
        }

        fn send_alert(&mut self, payload: &serde_json::Value) -> anyhow::Result<()> {
            let mut state = self.0.borrow_mut();
            if state.send_fails {
                anyhow::bail!("broker rejected publish");
            }
            state.alerts.push(payload.clone());
            Ok(())
        }

        fn send_report(&mut self, temperature: f32) -> anyhow::Result<()> {
            self.0.borrow_mut().reports.push(temperature);
            Ok(())
        }
    }

    struct FakeStorage(Shared);

    impl ThresholdStorage for FakeStorage {
        fn read_record(&mut self) -> anyhow::Result<Option<[u8; ThresholdPair::ENCODED_LEN]>> {
            let state = self.0.borrow();
            if state.read_fails {
                anyhow::bail!("record read failed");
            }
            Ok(state.record)
        }

        fn write_record(&mut self, record: [u8; ThresholdPair::ENCODED_LEN]) -> anyhow::Result<()> {
            let mut state = self.0.borrow_mut();
            state.writes += 1;
            state.record = Some(record);
            Ok(())
        }
    }

    struct FakeLink(Shared);

    impl LinkIndicator for FakeLink {
        fn set_connected(&mut self, connected: bool) {
            self.0.borrow_mut().link_updates.push(connected);
        }
    }

    fn shared() -> Shared {
        Rc::new(RefCell::new(TestState {
            temperature: 72.0,
            connected: true,
            reconnect_succeeds: true,
            ..Default::default()
        }))
    }

    fn monitor_with(state: &Shared, config: MonitorConfig) -> Monitor {
        let ports = MonitorPorts {
            sensor: Box::new(FakeSensor(state.clone())),
            panel: Box::new(FakePanel(state.clone())),
            display: Box::new(FakeDisplay(state.clone())),
            sink: Box::new(FakeSink(state.clone())),
            storage: Box::new(FakeStorage(state.clone())),
            link: Box::new(FakeLink(state.clone())),
        };
        Monitor::new(config, ports).unwrap()
    }

    fn monitor(state: &Shared) -> Monitor {
        monitor_with(state, MonitorConfig::default())
    }

    fn wide_config() -> MonitorConfig {
        MonitorConfig {
            default_upper: 90.0,
            default_lower: 30.0,
            ..MonitorConfig::default()
        }
    }

    #[test]
    fn breach_notifies_on_entry_and_again_after_recovery() {
        let state = shared();
        let mut monitor = monitor_with(&state, wide_config());

        let temps = [85.0, 95.0, 95.0, 88.0, 95.0];
        for (tick, temp) in temps.into_iter().enumerate() {
            state.borrow_mut().temperature = temp;
            monitor.tick(tick as u64 * 50).unwrap();
        }

        let alerts = state.borrow().alerts.clone();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0]["temperature_f"], serde_json::json!(95.0));
        assert_eq!(alerts[0]["critical_alert"], serde_json::json!(true));
        assert_eq!(alerts[1]["critical_alert"], serde_json::json!(true));
    }

    #[test]
    fn persisting_breach_renotifies_at_normal_priority_after_backoff() {
        let state = shared();
        state.borrow_mut().temperature = 95.0;
        let mut monitor = monitor_with(&state, wide_config());

        monitor.tick(0).unwrap();
        monitor.tick(50).unwrap();
        monitor.tick(599_999).unwrap();
        assert_eq!(state.borrow().alerts.len(), 1);

        monitor.tick(600_000).unwrap();
        let alerts = state.borrow().alerts.clone();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0]["critical_alert"], serde_json::json!(true));
        assert_eq!(alerts[1]["critical_alert"], serde_json::json!(false));
    }

    #[test]
    fn encoder_movement_adjusts_upper_threshold_and_redraws() {
        let state = shared();
        let mut monitor = monitor(&state);

        monitor.tick(0).unwrap();
        state.borrow_mut().sample.encoder_position = 3;
        monitor.tick(50).unwrap();

        let presented = state.borrow().presented.clone();
        assert_eq!(presented.len(), 2);
        let last = &presented[1];
        assert_eq!(last.upper, 83.0);
        assert_eq!(last.lower, 60.0);
    }

    #[test]
    fn button_release_switches_edited_threshold() {
        let state = shared();
        let mut monitor = monitor(&state);

        monitor.tick(0).unwrap();
        state.borrow_mut().sample.button_pressed = true;
        monitor.tick(50).unwrap();
        state.borrow_mut().sample.button_pressed = false;
        monitor.tick(100).unwrap();

        state.borrow_mut().sample.encoder_position = -2;
        monitor.tick(150).unwrap();

        let last = state.borrow().presented.last().unwrap().clone();
        assert_eq!(last.selection, Selection::Lower);
        assert_eq!(last.upper, 80.0);
        assert_eq!(last.lower, 58.0);
    }

    #[test]
    fn startup_prefers_stored_record_over_defaults() {
        let state = shared();
        state.borrow_mut().record = Some(
            ThresholdPair {
                upper: 75.0,
                lower: 55.0,
            }
            .encode(),
        );
        let mut monitor = monitor(&state);
        monitor.tick(0).unwrap();

        let shown = state.borrow().presented.last().unwrap().clone();
        assert_eq!(shown.upper, 75.0);
        assert_eq!(shown.lower, 55.0);
    }

    #[test]
    fn sweep_writes_dirty_thresholds_once_per_interval() {
        let state = shared();
        let mut monitor = monitor(&state);

        monitor.tick(0).unwrap();
        state.borrow_mut().sample.encoder_position = 5;
        monitor.tick(50).unwrap();
        assert_eq!(state.borrow().writes, 0);

        monitor.tick(300_000).unwrap();
        assert_eq!(state.borrow().writes, 1);
        let expected = ThresholdPair {
            upper: 85.0,
            lower: 60.0,
        }
        .encode();
        assert_eq!(state.borrow().record, Some(expected));

        monitor.tick(300_050).unwrap();
        monitor.tick(599_999).unwrap();
        assert_eq!(state.borrow().writes, 1);

        monitor.tick(600_000).unwrap();
        assert_eq!(state.borrow().writes, 1);
    }

    #[test]
    fn sweep_skips_clean_thresholds() {
        let state = shared();
        let mut monitor = monitor(&state);

        monitor.tick(0).unwrap();
        monitor.tick(300_000).unwrap();
        assert_eq!(state.borrow().writes, 0);
    }

    #[test]
    fn rebuild_reverts_adjustments_made_since_last_sweep() {
        let state = shared();
        {
            let mut monitor = monitor(&state);
            monitor.tick(0).unwrap();
            state.borrow_mut().sample.encoder_position = 4;
            monitor.tick(50).unwrap();
        }

        state.borrow_mut().sample.encoder_position = 0;
        let mut rebuilt = monitor(&state);
        rebuilt.tick(0).unwrap();

        let shown = state.borrow().presented.last().unwrap().clone();
        assert_eq!(shown.upper, 80.0);
    }

    #[test]
    fn sensor_failure_aborts_the_tick() {
        let state = shared();
        let mut monitor = monitor(&state);
        state.borrow_mut().sensor_fails = true;

        let err = monitor.tick(0).unwrap_err();
        assert!(matches!(err, MonitorError::SensorRead(_)));
        assert!(state.borrow().presented.is_empty());
        assert!(state.borrow().reports.is_empty());
    }

    #[test]
    fn alert_reconnects_and_sends_in_the_same_tick() {
        let state = shared();
        {
            let mut state = state.borrow_mut();
            state.connected = false;
            state.temperature = 95.0;
        }
        let mut monitor = monitor_with(&state, wide_config());

        monitor.tick(0).unwrap();

        assert_eq!(state.borrow().reconnects, 1);
        assert_eq!(state.borrow().alerts.len(), 1);
    }

    #[test]
    fn abandoned_reconnect_fails_the_tick() {
        let state = shared();
        {
            let mut state = state.borrow_mut();
            state.connected = false;
            state.reconnect_succeeds = false;
            state.temperature = 95.0;
        }
        let mut monitor = monitor_with(&state, wide_config());

        let err = monitor.tick(0).unwrap_err();
        assert!(matches!(err, MonitorError::Connectivity(_)));
        assert!(state.borrow().alerts.is_empty());
    }

    #[test]
    fn failed_delivery_still_advances_the_backoff() {
        let state = shared();
        {
            let mut state = state.borrow_mut();
            state.temperature = 95.0;
            state.send_fails = true;
        }
        let mut monitor = monitor_with(&state, wide_config());

        monitor.tick(0).unwrap();
        state.borrow_mut().send_fails = false;
        monitor.tick(50).unwrap();

        assert!(state.borrow().alerts.is_empty());
    }

    #[test]
    fn display_redraws_only_when_content_changes() {
        let state = shared();
        let mut monitor = monitor(&state);

        monitor.tick(0).unwrap();
        monitor.tick(50).unwrap();
        monitor.tick(100).unwrap();
        assert_eq!(state.borrow().presented.len(), 1);

        state.borrow_mut().temperature = 73.0;
        monitor.tick(150).unwrap();
        assert_eq!(state.borrow().presented.len(), 2);
    }

    #[test]
    fn failed_redraw_retries_next_tick() {
        let state = shared();
        state.borrow_mut().present_fails = true;
        let mut monitor = monitor(&state);

        monitor.tick(0).unwrap();
        assert!(state.borrow().presented.is_empty());

        state.borrow_mut().present_fails = false;
        monitor.tick(50).unwrap();
        assert_eq!(state.borrow().presented.len(), 1);
    }

    #[test]
    fn reports_follow_their_own_cadence() {
        let state = shared();
        let mut monitor = monitor(&state);

        monitor.tick(0).unwrap();
        monitor.tick(300_000).unwrap();
        assert_eq!(state.borrow().reports, vec![72.0]);

        monitor.tick(600_000).unwrap();
        assert_eq!(state.borrow().reports, vec![72.0, 72.0]);
    }

    #[test]
    fn reports_wait_for_the_link_without_forcing_it() {
        let state = shared();
        state.borrow_mut().connected = false;
        let mut monitor = monitor(&state);

        monitor.tick(0).unwrap();
        assert!(state.borrow().reports.is_empty());
        assert_eq!(state.borrow().reconnects, 0);

        state.borrow_mut().connected = true;
        monitor.tick(50).unwrap();
        assert_eq!(state.borrow().reports, vec![72.0]);
    }

    #[test]
    fn link_indicator_written_only_on_change() {
        let state = shared();
        let mut monitor = monitor(&state);

        monitor.tick(0).unwrap();
        monitor.tick(50).unwrap();
        assert_eq!(state.borrow().link_updates, vec![true]);

        state.borrow_mut().connected = false;
        monitor.tick(100).unwrap();
        assert_eq!(state.borrow().link_updates, vec![true, false]);
    }

    #[test]
    fn storage_failure_escapes_the_sweep() {
        let state = shared();
        let mut monitor = monitor(&state);
        monitor.tick(0).unwrap();

        state.borrow_mut().read_fails = true;
        let err = monitor.tick(300_000).unwrap_err();
        assert!(matches!(err, MonitorError::Persistence(_)));
    }
}
