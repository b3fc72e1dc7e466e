/// Which threshold the rotary control currently edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Upper,
    Lower,
}

impl Selection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upper => "UPPER",
            Self::Lower => "LOWER",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Upper => Self::Lower,
            Self::Lower => Self::Upper,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPair {
    pub upper: f32,
    pub lower: f32,
}

impl ThresholdPair {
    /// Two little-endian f32 values, upper then lower. No version byte and
    /// no checksum; a record of the wrong length is treated as absent.
    pub const ENCODED_LEN: usize = 8;

    pub fn encode(self) -> [u8; Self::ENCODED_LEN] {
        let mut record = [0u8; Self::ENCODED_LEN];
        record[..4].copy_from_slice(&self.upper.to_le_bytes());
        record[4..].copy_from_slice(&self.lower.to_le_bytes());
        record
    }

    pub fn decode(record: [u8; Self::ENCODED_LEN]) -> Self {
        let mut upper = [0u8; 4];
        let mut lower = [0u8; 4];
        upper.copy_from_slice(&record[..4]);
        lower.copy_from_slice(&record[4..]);
        Self {
            upper: f32::from_le_bytes(upper),
            lower: f32::from_le_bytes(lower),
        }
    }
}

/// Live thresholds plus the selection state driven by the encoder button.
/// Tracks the last pair known to be in storage so the persistence sweep can
/// tell whether a write is due.
#[derive(Debug)]
pub struct ThresholdStore {
    pair: ThresholdPair,
    selection: Selection,
    persisted: ThresholdPair,
}

impl ThresholdStore {
    pub fn new(pair: ThresholdPair) -> Self {
        Self {
            pair,
            selection: Selection::Upper,
            persisted: pair,
        }
    }

    /// Adds a raw encoder delta to the selected threshold. Values are not
    /// clamped and the pair is allowed to cross.
    pub fn apply_delta(&mut self, delta: i32) {
        let value = match self.selection {
            Selection::Upper => &mut self.pair.upper,
            Selection::Lower => &mut self.pair.lower,
        };
        *value += delta as f32;
    }

    pub fn toggle_selection(&mut self) {
        self.selection = self.selection.toggled();
    }

    pub fn pair(&self) -> ThresholdPair {
        self.pair
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Last pair confirmed written, used when storage cannot be re-read.
    pub fn persisted(&self) -> ThresholdPair {
        self.persisted
    }

    /// Exact float comparison. A write is due only when the live pair
    /// differs from what storage holds.
    pub fn is_dirty(&self, persisted: &ThresholdPair) -> bool {
        self.pair != *persisted
    }

    pub fn mark_clean(&mut self, persisted: ThresholdPair) {
        self.persisted = persisted;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn store() -> ThresholdStore {
        ThresholdStore::new(ThresholdPair {
            upper: 80.0,
            lower: 60.0,
        })
    }

    #[test]
    fn delta_lands_on_selected_threshold_only() {
        let mut store = store();

        store.apply_delta(3);
        store.apply_delta(-1);
        assert_eq!(store.pair().upper, 82.0);
        assert_eq!(store.pair().lower, 60.0);

        store.toggle_selection();
        store.apply_delta(-5);
        assert_eq!(store.pair().upper, 82.0);
        assert_eq!(store.pair().lower, 55.0);
    }

    #[test]
    fn upper_accumulates_sum_of_deltas() {
        let mut store = store();

        let deltas = [1, 4, -2, 0, -7, 3];
        for delta in deltas {
            store.apply_delta(delta);
        }

        let sum: i32 = deltas.iter().sum();
        assert_eq!(store.pair().upper, 80.0 + sum as f32);
    }

    #[test]
    fn toggle_twice_restores_selection() {
        let mut store = store();
        assert_eq!(store.selection(), Selection::Upper);

        store.toggle_selection();
        assert_eq!(store.selection(), Selection::Lower);

        store.toggle_selection();
        assert_eq!(store.selection(), Selection::Upper);
    }

    #[test]
    fn thresholds_may_cross_without_correction() {
        let mut store = store();

        store.apply_delta(-30);
        assert_eq!(store.pair().upper, 50.0);
        assert_eq!(store.pair().lower, 60.0);
    }

    #[test]
    fn dirty_tracks_exact_inequality() {
        let mut store = store();
        let on_disk = store.persisted();
        assert!(!store.is_dirty(&on_disk));

        store.apply_delta(1);
        assert!(store.is_dirty(&on_disk));

        let live = store.pair();
        store.mark_clean(live);
        assert!(!store.is_dirty(&store.persisted()));
    }

    #[test]
    fn record_layout_is_upper_then_lower_le() {
        let pair = ThresholdPair {
            upper: 80.0,
            lower: 60.0,
        };

        let record = pair.encode();
        assert_eq!(record, [0x00, 0x00, 0xA0, 0x42, 0x00, 0x00, 0x70, 0x42]);
        assert_eq!(ThresholdPair::decode(record), pair);
    }
}
