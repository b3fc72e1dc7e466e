use serde::{Deserialize, Serialize};

use crate::types::TempUnit;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub tick_ms: u64,
    pub notify_backoff_ms: u64,
    pub persist_interval_ms: u64,
    pub report_interval_ms: u64,
    pub restart_cooldown_ms: u64,
    pub reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
    pub unit: TempUnit,
    pub default_upper: f32,
    pub default_lower: f32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            notify_backoff_ms: 600_000,
            persist_interval_ms: 300_000,
            report_interval_ms: 600_000,
            restart_cooldown_ms: 60_000,
            reconnect_attempts: 5,
            reconnect_delay_ms: 3_000,
            unit: TempUnit::Fahrenheit,
            default_upper: 80.0,
            default_lower: 60.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub wifi_ssid: String,
    pub wifi_pass: String,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_pass: String::new(),
            mqtt_host: "192.168.1.100".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub monitor: MonitorConfig,
    pub network: NetworkConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            monitor: MonitorConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}
