use crate::thresholds::Selection;
use crate::types::TempUnit;

/// Everything the presenter needs for one refresh. The orchestrator keeps
/// the last shown snapshot and redraws only when this differs from it.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySnapshot {
    pub upper: f32,
    pub current: f32,
    pub lower: f32,
    pub selection: Selection,
    pub unit: TempUnit,
}

impl DisplaySnapshot {
    /// Upper threshold, current reading, lower threshold, one value per
    /// line. How the selection is marked is up to the presenter.
    pub fn lines(&self) -> [String; 3] {
        let suffix = self.unit.suffix();
        [
            format!("{:.1}{suffix}", self.upper),
            format!("{:.1}{suffix}", self.current),
            format!("{:.1}{suffix}", self.lower),
        ]
    }
}
