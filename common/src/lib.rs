pub mod alert;
pub mod config;
pub mod display;
pub mod error;
pub mod input;
pub mod monitor;
pub mod ports;
pub mod thresholds;
pub mod topics;
pub mod types;

pub use alert::{AlertEngine, AlertNotification, AlertStatus};
pub use config::{MonitorConfig, NetworkConfig, RuntimeConfig};
pub use display::DisplaySnapshot;
pub use error::MonitorError;
pub use input::InputController;
pub use monitor::{Monitor, MonitorPorts};
pub use ports::{
    ControlPanel, ControlSample, DisplayPresenter, LinkIndicator, NotificationSink,
    TemperatureSource, ThresholdStorage,
};
pub use thresholds::{Selection, ThresholdPair, ThresholdStore};
pub use topics::*;
pub use types::{alert_payload, TempUnit};
