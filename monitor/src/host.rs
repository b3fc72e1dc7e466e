use std::{
    io::ErrorKind,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering},
        Arc, OnceLock,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::Context;
use rumqttc::{Client, Connection, Event, Incoming, MqttOptions, QoS};
use tracing::{info, warn};

use tempmon_common::{
    ControlPanel, ControlSample, DisplayPresenter, DisplaySnapshot, LinkIndicator, Monitor,
    MonitorPorts, NetworkConfig, NotificationSink, RuntimeConfig, Selection, TemperatureSource,
    ThresholdPair, ThresholdStorage, TOPIC_CMD_BUTTON, TOPIC_CMD_ENCODER, TOPIC_MONITOR_ALERT,
    TOPIC_MONITOR_STATUS, TOPIC_MONITOR_TEMP,
};

pub fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = AppStore::new();

    // Restart shell: anything escaping the control loop tears the monitor
    // down and rebuilds it from configuration and persisted state after a
    // cooldown, like the device build does with a hardware reset.
    loop {
        let runtime = store.load_runtime_config().unwrap_or_else(|err| {
            warn!("failed to load runtime config from store: {err:#}");
            RuntimeConfig::default()
        });
        let cooldown = Duration::from_millis(runtime.monitor.restart_cooldown_ms);

        if let Err(err) = run_monitor(&store, runtime) {
            warn!(
                "monitor failed: {err:#}; restarting in {}s",
                cooldown.as_secs()
            );
            thread::sleep(cooldown);
        }
    }
}

fn run_monitor(store: &AppStore, runtime: RuntimeConfig) -> anyhow::Result<()> {
    let config = runtime.monitor.clone();

    let panel_state = PanelState::default();
    let sink = MqttSink::connect(
        &runtime.network,
        panel_state.clone(),
        config.reconnect_attempts,
        Duration::from_millis(config.reconnect_delay_ms),
    )?;

    let midpoint = std::env::var("TEMPMON_SIM_MIDPOINT")
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(68.0);

    let ports = MonitorPorts {
        sensor: Box::new(SimulatedSensor { midpoint, tick: 0 }),
        panel: Box::new(CommandPanel {
            state: panel_state,
            click_phase: false,
        }),
        display: Box::new(LogDisplay),
        sink: Box::new(sink),
        storage: Box::new(FileThresholdStorage {
            store: store.clone(),
        }),
        link: Box::new(LogLink),
    };

    let mut monitor = Monitor::new(config.clone(), ports)?;
    info!("monitor started (tick {}ms)", config.tick_ms);

    let tick = Duration::from_millis(config.tick_ms);
    loop {
        let started = Instant::now();
        monitor.tick(monotonic_ms())?;

        // One suspension per tick, for whatever budget remains.
        if let Some(remaining) = tick.checked_sub(started.elapsed()) {
            thread::sleep(remaining);
        }
    }
}

#[derive(Clone)]
struct AppStore {
    runtime_path: Arc<PathBuf>,
    thresholds_path: Arc<PathBuf>,
}

impl AppStore {
    fn new() -> Self {
        let data_dir = std::env::var("TEMPMON_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.tempmon"));

        Self {
            runtime_path: Arc::new(data_dir.join("runtime.json")),
            thresholds_path: Arc::new(data_dir.join("thresholds.bin")),
        }
    }

    fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        match std::fs::read(self.runtime_path.as_ref()) {
            Ok(raw) => Ok(serde_json::from_slice::<RuntimeConfig>(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }
}

struct FileThresholdStorage {
    store: AppStore,
}

impl ThresholdStorage for FileThresholdStorage {
    fn read_record(&mut self) -> anyhow::Result<Option<[u8; ThresholdPair::ENCODED_LEN]>> {
        match std::fs::read(self.store.thresholds_path.as_ref()) {
            Ok(raw) if raw.len() == ThresholdPair::ENCODED_LEN => {
                let mut record = [0u8; ThresholdPair::ENCODED_LEN];
                record.copy_from_slice(&raw);
                Ok(Some(record))
            }
            Ok(raw) => {
                warn!("threshold record has length {}; ignoring it", raw.len());
                Ok(None)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write_record(&mut self, record: [u8; ThresholdPair::ENCODED_LEN]) -> anyhow::Result<()> {
        let path = self.store.thresholds_path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, record)?;
        Ok(())
    }
}

struct SimulatedSensor {
    midpoint: f32,
    tick: u64,
}

impl TemperatureSource for SimulatedSensor {
    fn read_temperature(&mut self) -> anyhow::Result<f32> {
        self.tick = self.tick.saturating_add(1);

        // Hardware integration point: the device build reads a DS18B20
        // here. The wave steps every couple of seconds at the default tick.
        let step = self.tick / 40;
        Ok(self.midpoint + ((step % 8) as f32 * 0.2))
    }
}

#[derive(Clone, Default)]
struct PanelState {
    position: Arc<AtomicI32>,
    pending_clicks: Arc<AtomicU32>,
}

/// Stand-in control panel fed over the command topics. Each queued button
/// command is replayed as one pressed sample followed by a released one so
/// the edge detector sees a full press cycle.
struct CommandPanel {
    state: PanelState,
    click_phase: bool,
}

impl ControlPanel for CommandPanel {
    fn sample(&mut self) -> ControlSample {
        let pressed = if self.click_phase {
            self.click_phase = false;
            false
        } else if self.state.pending_clicks.load(Ordering::Relaxed) > 0 {
            self.state.pending_clicks.fetch_sub(1, Ordering::Relaxed);
            self.click_phase = true;
            true
        } else {
            false
        };

        ControlSample {
            encoder_position: self.state.position.load(Ordering::Relaxed),
            button_pressed: pressed,
        }
    }
}

struct LogDisplay;

impl DisplayPresenter for LogDisplay {
    fn present(&mut self, snapshot: &DisplaySnapshot) -> anyhow::Result<()> {
        let [upper, current, lower] = snapshot.lines();
        let (upper_mark, lower_mark) = match snapshot.selection {
            Selection::Upper => (">", " "),
            Selection::Lower => (" ", ">"),
        };
        info!("display: {upper_mark}{upper} | {current} | {lower_mark}{lower}");
        Ok(())
    }
}

struct LogLink;

impl LinkIndicator for LogLink {
    fn set_connected(&mut self, connected: bool) {
        info!("link led {}", if connected { "on" } else { "off" });
    }
}

struct MqttSink {
    client: Client,
    connected: Arc<AtomicBool>,
    reconnect_attempts: u32,
    reconnect_delay: Duration,
}

impl MqttSink {
    fn connect(
        network: &NetworkConfig,
        panel: PanelState,
        reconnect_attempts: u32,
        reconnect_delay: Duration,
    ) -> anyhow::Result<Self> {
        let mqtt_host = std::env::var("MQTT_HOST").unwrap_or(network.mqtt_host.clone());
        let mqtt_port = std::env::var("MQTT_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(network.mqtt_port);

        let mut mqtt_options = MqttOptions::new("tempmon-monitor-rust", mqtt_host, mqtt_port);
        let mqtt_user = std::env::var("MQTT_USER").unwrap_or(network.mqtt_user.clone());
        let mqtt_pass = std::env::var("MQTT_PASS").unwrap_or(network.mqtt_pass.clone());
        if !mqtt_user.is_empty() {
            mqtt_options.set_credentials(mqtt_user, mqtt_pass);
        }

        let (client, connection) = Client::new(mqtt_options, 32);
        let connected = Arc::new(AtomicBool::new(false));
        spawn_mqtt_poll(connection, connected.clone(), panel);

        client.subscribe(TOPIC_CMD_ENCODER, QoS::AtMostOnce)?;
        client.subscribe(TOPIC_CMD_BUTTON, QoS::AtMostOnce)?;
        client
            .publish(TOPIC_MONITOR_STATUS, QoS::AtLeastOnce, true, "online")
            .context("failed to publish monitor online status")?;

        Ok(Self {
            client,
            connected,
            reconnect_attempts,
            reconnect_delay,
        })
    }
}

impl NotificationSink for MqttSink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn reconnect(&mut self) -> anyhow::Result<()> {
        // The poll thread re-establishes the session on its own; wait it
        // out for a bounded number of attempts.
        for attempt in 1..=self.reconnect_attempts {
            if self.connected.load(Ordering::Relaxed) {
                return Ok(());
            }
            info!(
                "waiting for mqtt link (attempt {attempt}/{})",
                self.reconnect_attempts
            );
            thread::sleep(self.reconnect_delay);
        }

        if self.connected.load(Ordering::Relaxed) {
            return Ok(());
        }
        anyhow::bail!(
            "mqtt link still down after {} attempts",
            self.reconnect_attempts
        )
    }

    fn send_alert(&mut self, payload: &serde_json::Value) -> anyhow::Result<()> {
        let body = serde_json::to_vec(payload)?;
        self.client
            .publish(TOPIC_MONITOR_ALERT, QoS::AtLeastOnce, false, body)
            .context("failed to publish alert")?;
        Ok(())
    }

    fn send_report(&mut self, temperature: f32) -> anyhow::Result<()> {
        let body = format!("{temperature:.1}");
        self.client
            .publish(TOPIC_MONITOR_TEMP, QoS::AtLeastOnce, true, body)
            .context("failed to publish temperature report")?;
        Ok(())
    }
}

fn spawn_mqtt_poll(mut connection: Connection, connected: Arc<AtomicBool>, panel: PanelState) {
    thread::Builder::new()
        .name("mqtt-poll".into())
        .spawn(move || {
            for notification in connection.iter() {
                match notification {
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                        info!("mqtt connected");
                        connected.store(true, Ordering::Relaxed);
                    }
                    Ok(Event::Incoming(Incoming::Publish(message))) => {
                        let payload = String::from_utf8_lossy(&message.payload).to_string();
                        handle_command(&panel, &message.topic, payload.trim());
                    }
                    Ok(_) => {}
                    Err(err) => {
                        connected.store(false, Ordering::Relaxed);
                        warn!("mqtt poll error: {err}");
                        thread::sleep(Duration::from_secs(2));
                    }
                }
            }
        })
        .expect("failed to spawn mqtt poll thread");
}

fn handle_command(panel: &PanelState, topic: &str, payload: &str) {
    match topic {
        TOPIC_CMD_ENCODER => {
            if let Ok(delta) = payload.parse::<i32>() {
                panel.position.fetch_add(delta, Ordering::Relaxed);
            }
        }
        TOPIC_CMD_BUTTON => {
            panel.pending_clicks.fetch_add(1, Ordering::Relaxed);
        }
        _ => {}
    }
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
