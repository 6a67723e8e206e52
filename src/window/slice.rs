//! Slice store: per-key partial-aggregate state over disjoint time
//! intervals (spec.md section 4.3, "Why slices, not per-window state").
//!
//! Grounded on the teacher's `event_processing/windows.rs`
//! (`PaneBasedWindow`, watermark-driven triggers), generalized from its
//! wall-clock/event-time hybrid to the strict per-origin watermark model
//! this runtime requires.

use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowKind {
    Tumbling { size: u64 },
    Sliding { size: u64, slide: u64 },
    /// [ADD] not specified by the sampled scenarios; see SPEC_FULL.md
    /// section 4.3 for the eviction policy this implements.
    Session { gap: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliceMeta {
    pub start: u64,
    pub end: u64,
}

/// Finds the slice boundaries `[lo, hi)` containing `ts` for a sliding
/// window of `size`/`slide`, per spec.md section 4.3: "slice edges are the
/// union of window starts and ends falling within `[ts - W, ts + W]`."
fn sliding_bounds(ts: u64, size: u64, slide: u64) -> (u64, u64) {
    let window_lo = ts.saturating_sub(size);
    let mut k = window_lo / slide;
    let mut edges = std::collections::BTreeSet::new();
    edges.insert(0u64);
    loop {
        let start = k * slide;
        if start > ts + size {
            break;
        }
        edges.insert(start);
        edges.insert(start + size);
        k += 1;
    }
    let mut lo = 0u64;
    let mut hi = u64::MAX;
    for &edge in &edges {
        if edge <= ts {
            lo = edge;
        }
        if edge > ts {
            hi = edge;
            break;
        }
    }
    (lo, hi)
}

/// Per-key accumulator of slice metadata and partial aggregates, plus the
/// per-origin bookkeeping `triggerWindows`/`aggregateWindows` need
/// (spec.md section 4.3, "Key algorithms").
pub struct SliceStore<P> {
    kind: WindowKind,
    slices: Vec<SliceMeta>,
    partials: Vec<P>,
    origin_max_ts: HashMap<u64, u64>,
    last_watermark: u64,
    late_records: u64,
}

impl<P: Clone> SliceStore<P> {
    pub fn new(kind: WindowKind) -> Self {
        Self {
            kind,
            slices: Vec::new(),
            partials: Vec::new(),
            origin_max_ts: HashMap::new(),
            last_watermark: 0,
            late_records: 0,
        }
    }

    pub fn kind(&self) -> WindowKind {
        self.kind
    }

    pub fn late_records(&self) -> u64 {
        self.late_records
    }

    pub fn last_watermark(&self) -> u64 {
        self.last_watermark
    }

    /// `updateMaxTs`: records per-origin progress without moving the
    /// watermark itself.
    pub fn update_max_ts(&mut self, ts: u64, origin_id: u64) {
        let entry = self.origin_max_ts.entry(origin_id).or_insert(0);
        *entry = (*entry).max(ts);
    }

    /// The minimum of per-origin committed timestamps, i.e. the store's
    /// own local watermark view (spec.md section 4.3).
    pub fn watermark(&self) -> u64 {
        self.origin_max_ts.values().copied().min().unwrap_or(0)
    }

    fn bounds_for(&self, ts: u64) -> (u64, u64) {
        match self.kind {
            WindowKind::Tumbling { size } => {
                let start = (ts / size) * size;
                (start, start + size)
            }
            WindowKind::Sliding { size, slide } => sliding_bounds(ts, size, slide),
            WindowKind::Session { gap } => {
                if let Some(last) = self.slices.last() {
                    if ts < last.end + gap {
                        return (last.start, last.end.max(ts + gap));
                    }
                }
                (ts, ts + gap)
            }
        }
    }

    /// `slice(ts, store)`: ensures a slice containing `ts` exists and
    /// returns its index. Late records (`ts < lastWatermark`) are rejected
    /// by the caller before this is invoked; see [`SliceStore::accumulate`].
    ///
    /// Slices stay sorted by `start` even when records arrive out of
    /// order (spec.md section 8, scenario 2), so new slices are inserted
    /// at their sorted position rather than appended.
    pub fn slice_index_for(&mut self, ts: u64, identity: impl FnOnce() -> P) -> usize {
        let (start, end) = self.bounds_for(ts);

        if let WindowKind::Session { .. } = self.kind {
            if let Some(last) = self.slices.last_mut() {
                if last.start == start {
                    last.end = end;
                    return self.slices.len() - 1;
                }
            }
            self.slices.push(SliceMeta { start, end });
            self.partials.push(identity());
            return self.slices.len() - 1;
        }

        match self.slices.binary_search_by_key(&start, |s| s.start) {
            Ok(idx) => idx,
            Err(idx) => {
                self.slices.insert(idx, SliceMeta { start, end });
                self.partials.insert(idx, identity());
                // corruption here (two slices with the same start but
                // different end) is fatal per spec.md section 4.3, "Edge
                // cases" — a disjoint slicing must never produce one.
                debug_assert!(self.slices.windows(2).all(|w| w[0].end <= w[1].start));
                idx
            }
        }
    }

    /// Applies `accumulate` to the slice containing `ts`, discarding the
    /// record (and counting it) if it is late.
    pub fn accumulate(
        &mut self,
        ts: u64,
        origin_id: u64,
        identity: impl FnOnce() -> P,
        mut accumulate: impl FnMut(&mut P),
    ) {
        if ts < self.last_watermark {
            self.late_records += 1;
            return;
        }
        self.update_max_ts(ts, origin_id);
        let idx = self.slice_index_for(ts, identity);
        accumulate(&mut self.partials[idx]);
    }

    pub fn slices(&self) -> &[SliceMeta] {
        &self.slices
    }

    pub fn partial_at(&self, idx: usize) -> &P {
        &self.partials[idx]
    }

    /// Slices fully contained in `[start, end)`, in order.
    pub fn slices_within(&self, start: u64, end: u64) -> impl Iterator<Item = (&SliceMeta, &P)> {
        self.slices
            .iter()
            .zip(self.partials.iter())
            .filter(move |(s, _)| s.start >= start && s.end <= end)
    }

    /// Candidate window bounds whose `endTs <= watermark` and
    /// `startTs > lastWatermark` (spec.md section 4.3, `triggerWindows`).
    pub fn trigger_windows(&self, watermark: u64) -> Vec<(u64, u64)> {
        match self.kind {
            WindowKind::Tumbling { .. } => self
                .slices
                .iter()
                // `>=` rather than spec.md's literal `>`: a window whose
                // start equals the already-advanced watermark is the next
                // contiguous window and has never fired, since its end is
                // always strictly greater than that watermark.
                .filter(|s| s.end <= watermark && s.start >= self.last_watermark)
                .map(|s| (s.start, s.end))
                .collect(),
            WindowKind::Sliding { size, slide } => {
                // spec.md section 4.3: `windowStart in {k*S | k*S >=
                // lastWatermark - W + 1, k*S + W <= watermark}`. The lower
                // bound (clamped at zero) already excludes windows that
                // would have fired on a prior, smaller watermark.
                let mut out = Vec::new();
                if watermark < size {
                    return out;
                }
                let lower_bound = (self.last_watermark + 1).saturating_sub(size);
                let mut k = (lower_bound + slide - 1) / slide;
                loop {
                    let start = k * slide;
                    let end = start + size;
                    if end > watermark {
                        break;
                    }
                    out.push((start, end));
                    k += 1;
                }
                out
            }
            WindowKind::Session { gap } => self
                .slices
                .iter()
                .filter(|s| s.end <= watermark && s.start >= self.last_watermark)
                .map(|s| (s.start, s.end + gap))
                .collect(),
        }
    }

    /// Advances `lastWatermark` and evicts slices no longer needed by any
    /// future window (spec.md section 4.3, step 6 of `aggregateWindows`).
    pub fn advance_watermark(&mut self, watermark: u64) {
        self.last_watermark = watermark;
        match self.kind {
            WindowKind::Tumbling { size } => {
                let floor = watermark.saturating_sub(size);
                self.evict_before(floor);
            }
            WindowKind::Sliding { size, .. } => {
                let oldest_live_start = watermark.saturating_sub(size);
                self.evict_before(oldest_live_start);
            }
            WindowKind::Session { gap } => {
                self.slices.retain({
                    let partials = &mut self.partials;
                    let mut idx = 0;
                    move |s| {
                        let keep = s.end + gap > watermark;
                        if !keep {
                            partials.remove(idx);
                        } else {
                            idx += 1;
                        }
                        keep
                    }
                });
            }
        }
    }

    fn evict_before(&mut self, floor: u64) {
        let mut keep_from = 0;
        while keep_from < self.slices.len() && self.slices[keep_from].end <= floor {
            keep_from += 1;
        }
        if keep_from > 0 {
            self.slices.drain(0..keep_from);
            self.partials.drain(0..keep_from);
        }
    }
}
