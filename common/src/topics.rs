pub const TOPIC_MONITOR_ALERT: &str = "tempmon/monitor/alert";
pub const TOPIC_MONITOR_TEMP: &str = "tempmon/monitor/temperature";
pub const TOPIC_MONITOR_STATUS: &str = "tempmon/monitor/status";

pub const TOPIC_CMD_ENCODER: &str = "tempmon/cmnd/encoder/delta";
pub const TOPIC_CMD_BUTTON: &str = "tempmon/cmnd/encoder/button";
