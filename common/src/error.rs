use thiserror::Error;

/// Failure kinds that can escape a control-loop tick. Anything that reaches
/// the caller of `Monitor::tick` is fatal for the process; the supervisor
/// restarts after a cooldown.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Sensor read failed")]
    SensorRead(#[source] anyhow::Error),

    #[error("Network link down and reconnect abandoned")]
    Connectivity(#[source] anyhow::Error),

    #[error("Threshold persistence failed")]
    Persistence(#[source] anyhow::Error),
}
