use std::{
    fmt::Write,
    sync::{
        atomic::{AtomicBool, AtomicI32, Ordering},
        Arc, Mutex, OnceLock,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, bail, Context};
use ds18b20::{Ds18b20, Resolution};
use embedded_svc::{
    mqtt::client::QoS,
    wifi::{AuthMethod, ClientConfiguration, Configuration},
};
use esp_idf_hal::{
    delay::Ets,
    gpio::{AnyIOPin, AnyOutputPin, IOPin, Input, InputOutput, Output, PinDriver, Pull},
    i2c,
    units::FromValueType,
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{modem::Modem, prelude::Peripherals},
    log::EspLogger,
    mqtt::client::{EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration},
    nvs::{EspDefaultNvsPartition, EspNvs},
    wifi::{BlockingWifi, EspWifi},
};
use log::{info, warn};
use one_wire_bus::{Address, OneWire};
use ssd1306::{
    mode::TerminalMode,
    prelude::{DisplayConfig, I2CInterface},
    rotation::DisplayRotation,
    size::DisplaySize128x64,
    I2CDisplayInterface, Ssd1306,
};

use tempmon_common::{
    ControlPanel, ControlSample, DisplayPresenter, DisplaySnapshot, LinkIndicator, Monitor,
    MonitorPorts, NetworkConfig, NotificationSink, RuntimeConfig, Selection, TempUnit,
    TemperatureSource, ThresholdPair, ThresholdStorage, TOPIC_MONITOR_ALERT, TOPIC_MONITOR_STATUS,
    TOPIC_MONITOR_TEMP,
};

const NVS_NAMESPACE: &str = "tempmon";
const NVS_RUNTIME_KEY: &str = "runtime_json";
const NVS_THRESHOLDS_KEY: &str = "thresholds";

const DS18B20_PIN: i32 = 4;
const LINK_LED_PIN: i32 = 2;

const WATCHDOG_TIMEOUT_SEC: u32 = 90;
const WIFI_RESTART_GRACE_MS: u64 = 300_000;
const WIFI_CONNECT_ATTEMPTS: u32 = 5;
const WIFI_RETRY_DELAY_MS: u64 = 3_000;
const ENCODER_POLL_MS: u64 = 2;

struct Ds18b20Sensor {
    one_wire: OneWire<PinDriver<'static, AnyIOPin, InputOutput>>,
    address: Option<Address>,
    delay: Ets,
    unit: TempUnit,
}

struct EncoderPanel {
    position: Arc<AtomicI32>,
    button: PinDriver<'static, AnyIOPin, Input>,
}

#[derive(Clone, Copy, PartialEq)]
enum DecoderState {
    Idle,
    CwStep1,
    CwStep2,
    CcwStep1,
    CcwStep2,
}

struct QuadratureDecoder {
    state: DecoderState,
    last_a: bool,
    last_b: bool,
}

struct OledPresenter {
    display: Ssd1306<I2CInterface<i2c::I2cDriver<'static>>, DisplaySize128x64, TerminalMode>,
}

struct LedLink {
    led: Option<PinDriver<'static, AnyOutputPin, Output>>,
}

struct EspMqttSink {
    client: EspMqttClient<'static>,
    connected: Arc<AtomicBool>,
    reconnect_attempts: u32,
    reconnect_delay: Duration,
}

#[derive(Clone)]
struct NvsStore {
    partition: EspDefaultNvsPartition,
    lock: Arc<Mutex<()>>,
}

struct NvsThresholdStorage {
    store: NvsStore,
}

impl Ds18b20Sensor {
    fn new(pin: AnyIOPin, unit: TempUnit) -> anyhow::Result<Self> {
        let mut one_wire_pin = PinDriver::input_output_od(pin)?;
        one_wire_pin.set_pull(Pull::Up)?;
        one_wire_pin.set_high()?;

        let one_wire = OneWire::new(one_wire_pin)
            .map_err(|err| anyhow!("failed to initialize one-wire bus: {err:?}"))?;

        let mut sensor = Self {
            one_wire,
            address: None,
            delay: Ets,
            unit,
        };

        sensor.refresh_address();
        Ok(sensor)
    }

    fn refresh_address(&mut self) {
        let mut first_ds18: Option<Address> = None;
        let mut device_count = 0_u32;

        for addr in self.one_wire.devices(false, &mut self.delay) {
            match addr {
                Ok(address) => {
                    device_count = device_count.saturating_add(1);
                    if first_ds18.is_none() && address.family_code() == ds18b20::FAMILY_CODE {
                        first_ds18 = Some(address);
                    }
                }
                Err(err) => {
                    warn!("one-wire device scan failed: {err:?}");
                    break;
                }
            }
        }

        self.address = first_ds18;

        if let Some(address) = self.address {
            info!(
                "DS18B20 ready on GPIO{} ({} one-wire device(s), using {:?})",
                DS18B20_PIN, device_count, address
            );
        } else {
            warn!(
                "no DS18B20 found on GPIO{} ({} one-wire device(s) detected)",
                DS18B20_PIN, device_count
            );
        }
    }

    fn read_celsius(&mut self) -> anyhow::Result<f32> {
        if self.address.is_none() {
            self.refresh_address();
        }

        let Some(address) = self.address else {
            bail!("no DS18B20 on the one-wire bus");
        };

        let sensor = match Ds18b20::new::<core::convert::Infallible>(address) {
            Ok(sensor) => sensor,
            Err(err) => {
                self.address = None;
                bail!("invalid DS18B20 address {address:?}: {err:?}");
            }
        };

        if let Err(err) =
            ds18b20::start_simultaneous_temp_measurement(&mut self.one_wire, &mut self.delay)
        {
            self.address = None;
            bail!("failed to start DS18B20 conversion: {err:?}");
        }

        Resolution::Bits12.delay_for_measurement_time(&mut self.delay);

        match sensor.read_data(&mut self.one_wire, &mut self.delay) {
            Ok(data) => Ok(data.temperature),
            Err(err) => {
                self.address = None;
                Err(anyhow!("failed to read DS18B20 data: {err:?}"))
            }
        }
    }
}

impl TemperatureSource for Ds18b20Sensor {
    fn read_temperature(&mut self) -> anyhow::Result<f32> {
        let celsius = self.read_celsius()?;
        Ok(match self.unit {
            TempUnit::Fahrenheit => celsius_to_fahrenheit(celsius),
            TempUnit::Celsius => celsius,
        })
    }
}

impl QuadratureDecoder {
    fn new(a: bool, b: bool) -> Self {
        Self {
            state: DecoderState::Idle,
            last_a: a,
            last_b: b,
        }
    }

    // A falls first out of idle for clockwise, B first for counter-clockwise.
    // One full cycle through both-low and back out counts as a single detent.
    fn step(&mut self, a: bool, b: bool) -> Option<i32> {
        if a == self.last_a && b == self.last_b {
            return None;
        }
        self.last_a = a;
        self.last_b = b;

        match self.state {
            DecoderState::Idle => {
                if !a && b {
                    self.state = DecoderState::CwStep1;
                } else if a && !b {
                    self.state = DecoderState::CcwStep1;
                }
                None
            }
            DecoderState::CwStep1 => {
                if !a && !b {
                    self.state = DecoderState::CwStep2;
                } else if a && b {
                    self.state = DecoderState::Idle;
                }
                None
            }
            DecoderState::CwStep2 => {
                if a || b {
                    self.state = DecoderState::Idle;
                    return Some(1);
                }
                None
            }
            DecoderState::CcwStep1 => {
                if !a && !b {
                    self.state = DecoderState::CcwStep2;
                } else if a && b {
                    self.state = DecoderState::Idle;
                }
                None
            }
            DecoderState::CcwStep2 => {
                if a || b {
                    self.state = DecoderState::Idle;
                    return Some(-1);
                }
                None
            }
        }
    }
}

impl EncoderPanel {
    fn start(pin_a: AnyIOPin, pin_b: AnyIOPin, button_pin: AnyIOPin) -> anyhow::Result<Self> {
        let mut a = PinDriver::input(pin_a)?;
        a.set_pull(Pull::Up)?;
        let mut b = PinDriver::input(pin_b)?;
        b.set_pull(Pull::Up)?;

        let mut button = PinDriver::input(button_pin)?;
        button.set_pull(Pull::Up)?;

        let position = Arc::new(AtomicI32::new(0));
        let shared = position.clone();

        thread::Builder::new()
            .name("encoder-poll".to_string())
            .stack_size(4096)
            .spawn(move || {
                let mut decoder = QuadratureDecoder::new(a.is_high(), b.is_high());
                loop {
                    if let Some(step) = decoder.step(a.is_high(), b.is_high()) {
                        shared.fetch_add(step, Ordering::Relaxed);
                    }
                    thread::sleep(Duration::from_millis(ENCODER_POLL_MS));
                }
            })
            .expect("failed to spawn encoder thread");

        Ok(Self { position, button })
    }
}

impl ControlPanel for EncoderPanel {
    fn sample(&mut self) -> ControlSample {
        ControlSample {
            encoder_position: self.position.load(Ordering::Relaxed),
            // Active low behind the pull-up.
            button_pressed: self.button.is_low(),
        }
    }
}

impl OledPresenter {
    fn new(i2c0: i2c::I2C0, sda: AnyIOPin, scl: AnyIOPin) -> anyhow::Result<Self> {
        let driver = i2c::I2cDriver::new(
            i2c0,
            sda,
            scl,
            &i2c::config::Config::new().baudrate(400.kHz().into()),
        )?;

        let interface = I2CDisplayInterface::new(driver);
        let mut display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_terminal_mode();
        display
            .init()
            .map_err(|err| anyhow!("failed to init display: {err:?}"))?;
        let _ = display.clear();
        writeln!(display, "Starting...")?;

        Ok(Self { display })
    }
}

impl DisplayPresenter for OledPresenter {
    fn present(&mut self, snapshot: &DisplaySnapshot) -> anyhow::Result<()> {
        let [upper, current, lower] = snapshot.lines();
        let (upper_mark, lower_mark) = match snapshot.selection {
            Selection::Upper => (">", " "),
            Selection::Lower => (" ", ">"),
        };

        self.display
            .clear()
            .map_err(|err| anyhow!("display clear failed: {err:?}"))?;
        writeln!(self.display, "{upper_mark}{upper}")?;
        writeln!(self.display, " {current}")?;
        writeln!(self.display, "{lower_mark}{lower}")?;
        Ok(())
    }
}

fn init_link_led(pin: i32) -> LedLink {
    let driver = unsafe { PinDriver::output(AnyOutputPin::new(pin)) };
    match driver {
        Ok(mut led) => {
            let _ = led.set_low();
            LedLink { led: Some(led) }
        }
        Err(err) => {
            warn!("link LED unavailable on GPIO{pin}: {err}");
            LedLink { led: None }
        }
    }
}

impl LinkIndicator for LedLink {
    fn set_connected(&mut self, connected: bool) {
        let Some(led) = self.led.as_mut() else {
            return;
        };

        let result = if connected {
            led.set_high()
        } else {
            led.set_low()
        };

        if let Err(err) = result {
            warn!("failed to drive link LED: {err}");
        }
    }
}

impl NotificationSink for EspMqttSink {
    fn is_connected(&self) -> bool {
        is_wifi_station_connected() && self.connected.load(Ordering::Relaxed)
    }

    fn reconnect(&mut self) -> anyhow::Result<()> {
        // The client task re-establishes the session on its own; wait it
        // out for a bounded number of attempts.
        for attempt in 1..=self.reconnect_attempts {
            if self.is_connected() {
                return Ok(());
            }
            info!(
                "waiting for mqtt link (attempt {attempt}/{})",
                self.reconnect_attempts
            );
            thread::sleep(self.reconnect_delay);
        }

        if self.is_connected() {
            return Ok(());
        }
        bail!(
            "mqtt link still down after {} attempts",
            self.reconnect_attempts
        )
    }

    fn send_alert(&mut self, payload: &serde_json::Value) -> anyhow::Result<()> {
        let body = serde_json::to_vec(payload)?;
        self.client
            .publish(TOPIC_MONITOR_ALERT, QoS::AtLeastOnce, false, &body)
            .context("failed to publish alert")?;
        Ok(())
    }

    fn send_report(&mut self, temperature: f32) -> anyhow::Result<()> {
        let payload = format!("{temperature:.1}");
        self.client
            .publish(TOPIC_MONITOR_TEMP, QoS::AtLeastOnce, true, payload.as_bytes())
            .context("failed to publish temperature report")?;
        Ok(())
    }
}

impl ThresholdStorage for NvsThresholdStorage {
    fn read_record(&mut self) -> anyhow::Result<Option<[u8; ThresholdPair::ENCODED_LEN]>> {
        self.store.read_thresholds()
    }

    fn write_record(&mut self, record: [u8; ThresholdPair::ENCODED_LEN]) -> anyhow::Result<()> {
        self.store.write_thresholds(&record)
    }
}

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let nvs_store = NvsStore {
        partition: nvs_partition.clone(),
        lock: Arc::new(Mutex::new(())),
    };

    let mut runtime = nvs_store.load_runtime_config().unwrap_or_else(|err| {
        warn!("failed to load runtime config from NVS: {err:#}");
        RuntimeConfig::default()
    });
    ensure_wifi_defaults(&mut runtime);

    let cooldown = Duration::from_millis(runtime.monitor.restart_cooldown_ms);

    if let Err(err) = run_monitor(&nvs_store, runtime, sys_loop, nvs_partition) {
        warn!(
            "monitor failed: {err:#}; restarting in {}s",
            cooldown.as_secs()
        );
    }

    // run_monitor only returns on failure; a reboot rebuilds everything
    // from persisted state.
    restart_device(cooldown);
    Ok(())
}

fn run_monitor(
    nvs_store: &NvsStore,
    runtime: RuntimeConfig,
    sys_loop: EspSystemEventLoop,
    nvs_partition: EspDefaultNvsPartition,
) -> anyhow::Result<()> {
    let config = runtime.monitor.clone();

    let Peripherals {
        modem, pins, i2c0, ..
    } = Peripherals::take()?;

    let sensor = Ds18b20Sensor::new(pins.gpio4.downgrade(), config.unit)
        .context("failed to initialize temperature sensor")?;
    let panel = EncoderPanel::start(
        pins.gpio16.downgrade(),
        pins.gpio17.downgrade(),
        pins.gpio25.downgrade(),
    )?;
    let display = OledPresenter::new(i2c0, pins.gpio21.downgrade(), pins.gpio22.downgrade())
        .context("failed to initialize display")?;
    let link = init_link_led(LINK_LED_PIN);

    let wifi = connect_wifi(modem, sys_loop, nvs_partition, &runtime.network)
        .context("wifi startup failed")?;
    disable_wifi_power_save();

    init_watchdog(WATCHDOG_TIMEOUT_SEC)?;
    add_current_task_to_watchdog()?;

    let mqtt_connected = Arc::new(AtomicBool::new(false));
    let (mut client, conn) = create_mqtt_client(&runtime.network)?;
    spawn_mqtt_poll(mqtt_connected.clone(), conn);

    if let Err(err) = client.publish(TOPIC_MONITOR_STATUS, QoS::AtLeastOnce, true, b"online") {
        warn!("failed to publish online status: {err:?}");
    }

    let sink = EspMqttSink {
        client,
        connected: mqtt_connected,
        reconnect_attempts: config.reconnect_attempts,
        reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
    };

    let ports = MonitorPorts {
        sensor: Box::new(sensor),
        panel: Box::new(panel),
        display: Box::new(display),
        sink: Box::new(sink),
        storage: Box::new(NvsThresholdStorage {
            store: nvs_store.clone(),
        }),
        link: Box::new(link),
    };
    let mut monitor = Monitor::new(config.clone(), ports)?;

    // Keep services alive for the program lifetime.
    let _wifi = wifi;
    let mut wifi_disconnected_since: Option<Instant> = None;

    info!("monitor started (tick {}ms)", config.tick_ms);

    let tick = Duration::from_millis(config.tick_ms);
    loop {
        let started = Instant::now();
        feed_watchdog();
        maintain_wifi_health(&mut wifi_disconnected_since);

        monitor.tick(monotonic_ms())?;

        // One suspension per tick, for whatever budget remains.
        if let Some(remaining) = tick.checked_sub(started.elapsed()) {
            thread::sleep(remaining);
        }
    }
}

fn spawn_mqtt_poll(connected: Arc<AtomicBool>, mut conn: EspMqttConnection) {
    thread::Builder::new()
        .name("mqtt-poll".to_string())
        .stack_size(8192)
        .spawn(move || {
            loop {
                match conn.next() {
                    Ok(event) => match event.payload() {
                        EventPayload::Connected(_) => {
                            info!("mqtt connected");
                            connected.store(true, Ordering::Relaxed);
                        }
                        EventPayload::Disconnected => {
                            connected.store(false, Ordering::Relaxed);
                        }
                        // No command subscriptions; other events are uninteresting.
                        _ => {}
                    },
                    Err(err) => {
                        connected.store(false, Ordering::Relaxed);
                        warn!("mqtt poll error: {err:?}");
                        thread::sleep(Duration::from_secs(2));
                    }
                }
            }
        })
        .expect("failed to spawn mqtt thread");
}

fn ensure_wifi_defaults(runtime: &mut RuntimeConfig) {
    if runtime.network.wifi_ssid.is_empty() {
        runtime.network.wifi_ssid = option_env!("WIFI_SSID").unwrap_or("CHANGE_ME").to_string();
    }

    if runtime.network.wifi_pass.is_empty() {
        runtime.network.wifi_pass = option_env!("WIFI_PASS").unwrap_or("CHANGE_ME").to_string();
    }
}

fn has_station_credentials(network: &NetworkConfig) -> bool {
    let ssid = network.wifi_ssid.trim();
    !ssid.is_empty() && ssid != "CHANGE_ME"
}

fn connect_wifi(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs_partition: EspDefaultNvsPartition,
    network: &NetworkConfig,
) -> anyhow::Result<EspWifi<'static>> {
    if !has_station_credentials(network) {
        bail!("wifi credentials are not configured");
    }

    let mut esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs_partition))?;
    let mut wifi = BlockingWifi::wrap(&mut esp_wifi, sys_loop)?;

    let auth_method = if network.wifi_pass.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPAWPA2Personal
    };

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: network
            .wifi_ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi ssid too long"))?,
        password: network
            .wifi_pass
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi password too long"))?,
        auth_method,
        ..Default::default()
    }))?;

    wifi.start()?;
    info!("wifi started, connecting to `{}`", network.wifi_ssid);

    let mut last_err = None;
    for attempt in 1..=WIFI_CONNECT_ATTEMPTS {
        info!("wifi connect attempt {attempt}/{WIFI_CONNECT_ATTEMPTS}");
        match wifi.connect() {
            Ok(()) => match wifi.wait_netif_up() {
                Ok(()) => {
                    info!("wifi connected and netif up on attempt {attempt}");
                    last_err = None;
                    break;
                }
                Err(err) => {
                    warn!("wifi netif up failed on attempt {attempt}: {err:#}");
                    last_err = Some(err);
                }
            },
            Err(err) => {
                warn!("wifi connect failed on attempt {attempt}: {err:#}");
                last_err = Some(err);
            }
        }

        if attempt < WIFI_CONNECT_ATTEMPTS {
            let _ = wifi.disconnect();
            thread::sleep(Duration::from_millis(WIFI_RETRY_DELAY_MS));
        }
    }

    match last_err {
        None => Ok(esp_wifi),
        Some(err) => {
            let _ = wifi.disconnect();
            let _ = wifi.stop();
            Err(anyhow::Error::from(err)
                .context(format!("all {WIFI_CONNECT_ATTEMPTS} wifi connect attempts failed")))
        }
    }
}

fn create_mqtt_client(
    network: &NetworkConfig,
) -> anyhow::Result<(EspMqttClient<'static>, EspMqttConnection)> {
    let url = format!("mqtt://{}:{}", network.mqtt_host, network.mqtt_port);

    let conf = MqttClientConfiguration {
        client_id: Some("tempmon-monitor"),
        username: if network.mqtt_user.is_empty() {
            None
        } else {
            Some(network.mqtt_user.as_str())
        },
        password: if network.mqtt_pass.is_empty() {
            None
        } else {
            Some(network.mqtt_pass.as_str())
        },
        ..Default::default()
    };

    Ok(EspMqttClient::new(&url, &conf)?)
}

impl NvsStore {
    fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let _guard = self.lock.lock().unwrap();
        let mut nvs = EspNvs::new(self.partition.clone(), NVS_NAMESPACE, true)?;
        let mut buffer = vec![0_u8; 4096];

        match nvs.get_str(NVS_RUNTIME_KEY, &mut buffer)? {
            Some(value) => Ok(serde_json::from_str::<RuntimeConfig>(value)?),
            None => Ok(RuntimeConfig::default()),
        }
    }

    fn read_thresholds(&self) -> anyhow::Result<Option<[u8; ThresholdPair::ENCODED_LEN]>> {
        let _guard = self.lock.lock().unwrap();
        let mut nvs = EspNvs::new(self.partition.clone(), NVS_NAMESPACE, true)?;
        let mut buffer = [0_u8; 2 * ThresholdPair::ENCODED_LEN];

        match nvs.get_raw(NVS_THRESHOLDS_KEY, &mut buffer)? {
            Some(raw) if raw.len() == ThresholdPair::ENCODED_LEN => {
                let mut record = [0_u8; ThresholdPair::ENCODED_LEN];
                record.copy_from_slice(raw);
                Ok(Some(record))
            }
            Some(raw) => {
                warn!("threshold record has length {}; ignoring it", raw.len());
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn write_thresholds(&self, record: &[u8; ThresholdPair::ENCODED_LEN]) -> anyhow::Result<()> {
        let _guard = self.lock.lock().unwrap();
        let mut nvs = EspNvs::new(self.partition.clone(), NVS_NAMESPACE, true)?;
        nvs.set_raw(NVS_THRESHOLDS_KEY, record)?;
        Ok(())
    }
}

fn init_watchdog(timeout_sec: u32) -> anyhow::Result<()> {
    let config = esp_idf_svc::sys::esp_task_wdt_config_t {
        timeout_ms: timeout_sec.saturating_mul(1000),
        idle_core_mask: 0,
        trigger_panic: true,
    };
    let rc = unsafe { esp_idf_svc::sys::esp_task_wdt_init(&config) };
    if rc == esp_idf_svc::sys::ESP_OK || rc == esp_idf_svc::sys::ESP_ERR_INVALID_STATE {
        return Ok(());
    }
    Err(anyhow!("esp_task_wdt_init failed with code {}", rc))
}

fn add_current_task_to_watchdog() -> anyhow::Result<()> {
    let rc = unsafe { esp_idf_svc::sys::esp_task_wdt_add(core::ptr::null_mut()) };
    if rc == esp_idf_svc::sys::ESP_OK || rc == esp_idf_svc::sys::ESP_ERR_INVALID_STATE {
        return Ok(());
    }
    Err(anyhow!("esp_task_wdt_add failed with code {}", rc))
}

fn feed_watchdog() {
    let _ = unsafe { esp_idf_svc::sys::esp_task_wdt_reset() };
}

fn disable_wifi_power_save() {
    let rc = unsafe { esp_idf_svc::sys::esp_wifi_set_ps(0) };
    if rc == esp_idf_svc::sys::ESP_OK {
        info!("wifi power save disabled");
    } else {
        warn!("failed to disable wifi power save: esp_err_t={rc}");
    }
}

fn is_wifi_station_connected() -> bool {
    let mut ap_info = esp_idf_svc::sys::wifi_ap_record_t::default();
    let rc = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
    rc == esp_idf_svc::sys::ESP_OK
}

fn maintain_wifi_health(wifi_disconnected_since: &mut Option<Instant>) {
    if is_wifi_station_connected() {
        *wifi_disconnected_since = None;
        return;
    }

    match wifi_disconnected_since {
        Some(disconnected_since)
            if disconnected_since.elapsed().as_millis() as u64 >= WIFI_RESTART_GRACE_MS =>
        {
            warn!(
                "wifi disconnected for {}s; restarting device for recovery",
                WIFI_RESTART_GRACE_MS / 1000
            );
            restart_device(Duration::from_millis(100));
        }
        Some(_) => {}
        None => *wifi_disconnected_since = Some(Instant::now()),
    }
}

fn restart_device(delay: Duration) {
    thread::sleep(delay);
    unsafe { esp_idf_svc::sys::esp_restart() };
}

fn celsius_to_fahrenheit(temp_c: f32) -> f32 {
    temp_c * 9.0 / 5.0 + 32.0
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
