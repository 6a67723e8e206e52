//! Window firing: `aggregateWindows` composes a [`SliceStore`] with an
//! operator-supplied [`AggregateOp`] to produce final per-window results
//! (spec.md section 4.3, "Key algorithms"). A tagged trait rather than
//! runtime polymorphism, per spec.md section 9's "tagged variants over
//! runtime polymorphism" guidance, mirrored on the teacher's
//! `event_processing::operators::StreamOperator` trait.

use super::slice::{SliceStore, WindowKind};

pub trait AggregateOp: Send + Sync {
    type Input;
    type Partial: Clone + Send;
    type Output;

    fn identity(&self) -> Self::Partial;
    fn accumulate(&self, partial: &mut Self::Partial, input: &Self::Input);
    fn combine(&self, a: &Self::Partial, b: &Self::Partial) -> Self::Partial;
    fn lower(&self, partial: &Self::Partial) -> Self::Output;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowResult<O> {
    pub start: u64,
    pub end: u64,
    pub value: O,
}

/// `aggregateWindows(key, store, windowDef, outputBuffer)` from spec.md
/// section 4.3, steps 3-6. Step 1-2 (determining and seeding the
/// watermark) are the caller's responsibility since they depend on the
/// distribution mode (event-time vs processing-time, §4.3 "Distribution
/// modes") rather than the slice store itself.
pub fn aggregate_windows<Op: AggregateOp>(
    store: &mut SliceStore<Op::Partial>,
    op: &Op,
    watermark: u64,
) -> Vec<WindowResult<Op::Output>> {
    let windows = store.trigger_windows(watermark);
    let mut results = Vec::with_capacity(windows.len());
    for (start, end) in windows {
        let mut acc = op.identity();
        for (_, partial) in store.slices_within(start, end) {
            acc = op.combine(&acc, partial);
        }
        results.push(WindowResult { start, end, value: op.lower(&acc) });
    }
    store.advance_watermark(watermark);
    results
}

/// Feeds a single record into the appropriate slice, per `slice(ts,
/// store)` + the operator's `accumulate`.
pub fn ingest<Op: AggregateOp>(store: &mut SliceStore<Op::Partial>, op: &Op, input: &Op::Input, ts: u64, origin_id: u64) {
    store.accumulate(ts, origin_id, || op.identity(), |p| op.accumulate(p, input));
}

/// `SUM` over `i64`, used by the sample scenarios in spec.md section 8.
pub struct SumOp;

impl AggregateOp for SumOp {
    type Input = i64;
    type Partial = i64;
    type Output = i64;

    fn identity(&self) -> i64 {
        0
    }

    fn accumulate(&self, partial: &mut i64, input: &i64) {
        *partial += input;
    }

    fn combine(&self, a: &i64, b: &i64) -> i64 {
        a + b
    }

    fn lower(&self, partial: &i64) -> i64 {
        *partial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tumbling_sum_single_source_in_order() {
        // spec.md section 8, scenario 1.
        let mut store: SliceStore<i64> = SliceStore::new(WindowKind::Tumbling { size: 10 });
        let op = SumOp;
        ingest(&mut store, &op, &5, 3, 1);
        ingest(&mut store, &op, &7, 8, 1);
        ingest(&mut store, &op, &2, 11, 1);

        let results = aggregate_windows(&mut store, &op, 20);
        assert_eq!(
            results,
            vec![
                WindowResult { start: 0, end: 10, value: 12 },
                WindowResult { start: 10, end: 20, value: 2 },
            ]
        );
    }

    #[test]
    fn sliding_sum_out_of_order() {
        // spec.md section 8, scenario 2.
        let mut store: SliceStore<i64> = SliceStore::new(WindowKind::Sliding { size: 10, slide: 5 });
        let op = SumOp;
        ingest(&mut store, &op, &1, 3, 1);
        ingest(&mut store, &op, &2, 12, 1);
        ingest(&mut store, &op, &3, 7, 1);

        let results = aggregate_windows(&mut store, &op, 15);
        assert_eq!(
            results,
            vec![
                WindowResult { start: 0, end: 10, value: 4 },
                WindowResult { start: 5, end: 15, value: 5 },
            ]
        );
    }

    #[test]
    fn session_window_extends_on_activity_and_closes_after_gap() {
        let mut store: SliceStore<i64> = SliceStore::new(WindowKind::Session { gap: 5 });
        let op = SumOp;
        ingest(&mut store, &op, &1, 0, 1);
        ingest(&mut store, &op, &2, 3, 1);
        assert_eq!(store.slices().len(), 1);
        assert_eq!(store.slices()[0].end, 8);

        let results = aggregate_windows(&mut store, &op, 8);
        assert_eq!(results, vec![WindowResult { start: 0, end: 13, value: 3 }]);
    }
}
