use serde_json::Value;

use crate::display::DisplaySnapshot;
use crate::thresholds::ThresholdPair;

/// Raw control readings for one tick, sampled by the platform layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlSample {
    pub encoder_position: i32,
    pub button_pressed: bool,
}

/// On-demand temperature reading in the configured unit. Calibration and
/// unit conversion live behind this trait.
pub trait TemperatureSource {
    fn read_temperature(&mut self) -> anyhow::Result<f32>;
}

/// Rotary encoder plus push button. Sampling never fails; a wedged input
/// just repeats its previous levels.
pub trait ControlPanel {
    fn sample(&mut self) -> ControlSample;
}

/// Renders the three-line status screen. Layout and selection marking are
/// the presenter's concern.
pub trait DisplayPresenter {
    fn present(&mut self, snapshot: &DisplaySnapshot) -> anyhow::Result<()>;
}

/// Transport for alert notifications and periodic temperature reports.
pub trait NotificationSink {
    fn is_connected(&self) -> bool;

    /// Blocking bounded reconnect. Returns once the link is usable again,
    /// or with an error after the attempt budget is exhausted.
    fn reconnect(&mut self) -> anyhow::Result<()>;

    fn send_alert(&mut self, payload: &Value) -> anyhow::Result<()>;

    fn send_report(&mut self, temperature: f32) -> anyhow::Result<()>;
}

/// Raw fixed-size record storage for the threshold pair.
pub trait ThresholdStorage {
    /// `Ok(None)` when no usable record exists yet.
    fn read_record(&mut self) -> anyhow::Result<Option<[u8; ThresholdPair::ENCODED_LEN]>>;

    fn write_record(&mut self, record: [u8; ThresholdPair::ENCODED_LEN]) -> anyhow::Result<()>;
}

/// Connectivity LED or equivalent. Pushed to only when the state changes.
pub trait LinkIndicator {
    fn set_connected(&mut self, connected: bool);
}
