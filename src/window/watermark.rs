//! Per-origin watermark tracking (spec.md section 4.3, `WatermarkProcessor`).

use std::collections::HashMap;

struct OriginState {
    committed_ts: u64,
    last_seq: u64,
}

/// Tracks per-origin sequence numbers and committed timestamps; the global
/// watermark is the minimum committed timestamp across all known origins.
/// Origins register lazily on first update, so the watermark can stall
/// until every expected origin has reported at least once (spec.md
/// section 4.3, "Edge cases").
#[derive(Default)]
pub struct WatermarkProcessor {
    origins: HashMap<u64, OriginState>,
}

impl WatermarkProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records progress for `origin_id`. Committed timestamps are
    /// monotonic per origin (spec.md section 8, "Watermark monotonicity");
    /// an out-of-order update is clamped rather than rejected, since the
    /// transport is expected to deliver sequence numbers in order already.
    pub fn update(&mut self, origin_id: u64, ts: u64, seq: u64) {
        let state = self.origins.entry(origin_id).or_insert(OriginState { committed_ts: 0, last_seq: 0 });
        state.committed_ts = state.committed_ts.max(ts);
        state.last_seq = state.last_seq.max(seq);
    }

    pub fn watermark(&self) -> u64 {
        self.origins.values().map(|o| o.committed_ts).min().unwrap_or(0)
    }

    pub fn known_origins(&self) -> usize {
        self.origins.len()
    }

    pub fn origin_ts(&self, origin_id: u64) -> Option<u64> {
        self.origins.get(&origin_id).map(|o| o.committed_ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watermark_is_minimum_across_known_origins() {
        // spec.md section 8, scenario 3.
        let mut wp = WatermarkProcessor::new();
        wp.update(1, 20, 0);
        wp.update(2, 10, 0);
        assert_eq!(wp.watermark(), 10);
    }

    #[test]
    fn watermark_stalls_until_all_origins_report() {
        let mut wp = WatermarkProcessor::new();
        wp.update(1, 100, 0);
        assert_eq!(wp.watermark(), 100);
        wp.update(2, 0, 0);
        assert_eq!(wp.watermark(), 0);
    }

    #[test]
    fn committed_timestamp_is_monotonic_per_origin() {
        let mut wp = WatermarkProcessor::new();
        wp.update(1, 50, 0);
        wp.update(1, 30, 1);
        assert_eq!(wp.origin_ts(1), Some(50));
    }
}
