use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TempUnit {
    Fahrenheit,
    Celsius,
}

impl TempUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fahrenheit => "FAHRENHEIT",
            Self::Celsius => "CELSIUS",
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Self::Fahrenheit => "F",
            Self::Celsius => "C",
        }
    }

    /// Payload key carrying the reading, e.g. `temperature_f`.
    pub fn payload_key(self) -> &'static str {
        match self {
            Self::Fahrenheit => "temperature_f",
            Self::Celsius => "temperature_c",
        }
    }
}

/// Notification body sent on a threshold breach. The reading is rounded to
/// one decimal so the wire value matches what the display shows.
pub fn alert_payload(temperature: f32, critical_alert: bool, unit: TempUnit) -> serde_json::Value {
    let rounded = (f64::from(temperature) * 10.0).round() / 10.0;
    let mut body = serde_json::Map::new();
    body.insert(unit.payload_key().to_string(), serde_json::json!(rounded));
    body.insert(
        "critical_alert".to_string(),
        serde_json::Value::Bool(critical_alert),
    );
    serde_json::Value::Object(body)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn payload_key_follows_unit() {
        let payload = alert_payload(72.0, true, TempUnit::Fahrenheit);
        assert_eq!(payload["temperature_f"], serde_json::json!(72.0));
        assert_eq!(payload["critical_alert"], serde_json::json!(true));

        let payload = alert_payload(22.0, false, TempUnit::Celsius);
        assert_eq!(payload["temperature_c"], serde_json::json!(22.0));
        assert_eq!(payload["critical_alert"], serde_json::json!(false));
    }

    #[test]
    fn payload_rounds_to_one_decimal() {
        let payload = alert_payload(72.4499, true, TempUnit::Fahrenheit);
        assert_eq!(payload["temperature_f"], serde_json::json!(72.4));

        let payload = alert_payload(95.25, true, TempUnit::Fahrenheit);
        assert_eq!(payload["temperature_f"], serde_json::json!(95.3));
    }
}
