use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoEntry {
    pub tick: u64,
    pub ticks_per_second: f64,
}

/// Ticks-per-second in effect from each listed tick onward.
///
/// Entries are strictly ascending by tick and there is always at least one, so
/// [`TempoMap::lookup`] is total.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
    entries: Vec<TempoEntry>,
}

impl TempoMap {
    pub fn new(ticks_per_second: f64) -> Self {
        Self {
            entries: vec![TempoEntry {
                tick: 0,
                ticks_per_second,
            }],
        }
    }

    /// Builds a map from explicit entries. Returns `None` if `entries` is empty or not strictly
    /// ascending by tick.
    pub fn from_entries(entries: Vec<TempoEntry>) -> Option<Self> {
        if entries.is_empty() || entries.windows(2).any(|pair| pair[0].tick >= pair[1].tick) {
            return None;
        }
        Some(Self { entries })
    }

    /// Appends a tempo change. A change at the tick of the last entry replaces it; one placed
    /// before the last entry is dropped.
    pub fn push(&mut self, tick: u64, ticks_per_second: f64) {
        let entry = TempoEntry {
            tick,
            ticks_per_second,
        };
        match self.entries.last_mut() {
            Some(last) if last.tick == tick => *last = entry,
            Some(last) if last.tick > tick => {
                warn!(tick, last = last.tick, "dropping out-of-order tempo change")
            }
            _ => self.entries.push(entry),
        }
    }

    /// Tempo of the last entry at or before `tick`, or the first entry if `tick` precedes all.
    pub fn lookup(&self, tick: u64) -> f64 {
        let after = self.entries.partition_point(|entry| entry.tick <= tick);
        self.entries[after.saturating_sub(1)].ticks_per_second
    }

    pub fn entries(&self) -> &[TempoEntry] {
        &self.entries
    }
}
