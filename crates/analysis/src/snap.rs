//! Boundary snapping
//!
//! Pure function that pulls a window's edges toward nearby scene or topic
//! boundaries under per-edge shift budgets, without ever letting an edge
//! cross the window midpoint, then re-establishes the duration guards.

/// Distance inside which two candidates count as a tie, seconds.
const TIE_EPSILON: f64 = 0.01;

/// Which candidate list is consulted first for each edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    TopicFirst,
    SceneFirst,
}

/// Where a snapped edge came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeSource {
    Scene,
    Topic,
    Original,
}

impl EdgeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scene => "scene",
            Self::Topic => "topic",
            Self::Original => "original",
        }
    }
}

/// Per-edge shift budgets, seconds.
#[derive(Debug, Clone, Copy)]
pub struct ShiftBudgets {
    pub scene_start: f64,
    pub scene_end: f64,
    pub topic: f64,
}

impl Default for ShiftBudgets {
    fn default() -> Self {
        Self {
            scene_start: 1.0,
            scene_end: 2.0,
            topic: 1.0,
        }
    }
}

/// Inputs to one snap operation.
#[derive(Debug, Clone)]
pub struct SnapRequest<'a> {
    pub start: f64,
    pub end: f64,
    pub scenes: &'a [f64],
    pub topics: &'a [f64],
    pub budgets: ShiftBudgets,
    pub min_len: f64,
    pub max_len: f64,
    pub priority: Priority,
}

/// Result of one snap operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnappedWindow {
    pub start: f64,
    pub end: f64,
    pub start_source: EdgeSource,
    pub end_source: EdgeSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Start,
    End,
}

/// Nearest candidate to `t` within `max_shift`, rejecting midpoint crossings
/// and tie-breaking within 10 ms toward the past (start edge) or future
/// (end edge).
fn nearest(t: f64, candidates: &[f64], max_shift: f64, mid: f64, edge: Edge) -> Option<f64> {
    let mut best: Option<(f64, f64)> = None;
    for &c in candidates {
        let d = (c - t).abs();
        if d > max_shift {
            continue;
        }
        // Moving the start past the midpoint, or the end before it.
        if t <= mid && mid < c {
            continue;
        }
        if c < mid && mid <= t {
            continue;
        }
        match best {
            None => best = Some((c, d)),
            Some((bc, bd)) => {
                if d < bd - TIE_EPSILON {
                    best = Some((c, d));
                } else if (d - bd).abs() <= TIE_EPSILON {
                    let replaces = match edge {
                        Edge::Start => c <= t && bc > t,
                        Edge::End => c >= t && bc < t,
                    };
                    if replaces {
                        best = Some((c, d));
                    }
                }
            }
        }
    }
    best.map(|(c, _)| c)
}

fn snap_edge(t: f64, req: &SnapRequest<'_>, mid: f64, edge: Edge) -> (f64, EdgeSource) {
    let scene_budget = match edge {
        Edge::Start => req.budgets.scene_start,
        Edge::End => req.budgets.scene_end,
    };

    let ordered: [(&[f64], f64, EdgeSource); 2] = match req.priority {
        Priority::SceneFirst => [
            (req.scenes, scene_budget, EdgeSource::Scene),
            (req.topics, req.budgets.topic, EdgeSource::Topic),
        ],
        Priority::TopicFirst => [
            (req.topics, req.budgets.topic, EdgeSource::Topic),
            (req.scenes, scene_budget, EdgeSource::Scene),
        ],
    };

    for (candidates, budget, source) in ordered {
        if let Some(c) = nearest(t, candidates, budget, mid, edge) {
            return (c, source);
        }
    }
    (t, EdgeSource::Original)
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Snap `[start, end]` to the nearest boundaries.
///
/// Invariants:
/// - Neither edge crosses the midpoint of the input window.
/// - The result satisfies `min_len <= end - start <= max_len`, extending or
///   trimming the edge that was not snapped first.
/// - Idempotent for fixed inputs.
pub fn snap_window(req: &SnapRequest<'_>) -> SnappedWindow {
    debug_assert!(req.end > req.start, "end must be greater than start");

    let mid = (req.start + req.end) / 2.0;

    let (mut start, start_source) = snap_edge(req.start, req, mid, Edge::Start);
    let (mut end, end_source) = snap_edge(req.end, req, mid, Edge::End);

    let dur = end - start;
    if dur < req.min_len {
        let need = req.min_len - dur;
        if end_source == EdgeSource::Original {
            end = (end + need).min(start + req.max_len);
        } else if start_source == EdgeSource::Original {
            start = (start - need).max(end - req.max_len);
        } else {
            let half = need / 2.0;
            end = (end + half).min(start + req.max_len);
            start = (start - half).max(end - req.max_len);
        }
    } else if dur > req.max_len {
        let excess = dur - req.max_len;
        let (trim_start, trim_end) =
            if start_source != EdgeSource::Original && end_source == EdgeSource::Original {
                (0.0, excess)
            } else if end_source != EdgeSource::Original && start_source == EdgeSource::Original {
                (excess, 0.0)
            } else {
                (excess / 2.0, excess / 2.0)
            };
        start += trim_start;
        end -= trim_end;
    }

    SnappedWindow {
        start: round3(start),
        end: round3(end),
        start_source,
        end_source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(
        start: f64,
        end: f64,
        scenes: &'a [f64],
        topics: &'a [f64],
        priority: Priority,
        min_len: f64,
        max_len: f64,
    ) -> SnapRequest<'a> {
        SnapRequest {
            start,
            end,
            scenes,
            topics,
            budgets: ShiftBudgets::default(),
            min_len,
            max_len,
            priority,
        }
    }

    #[test]
    fn test_topic_leaning_edges() {
        // Both edges have close topic candidates inside budget.
        let req = request(
            10.0,
            20.0,
            &[9.0, 18.6],
            &[9.9, 20.3],
            Priority::TopicFirst,
            4.0,
            12.0,
        );
        let snapped = snap_window(&req);
        assert_eq!(snapped.start, 9.9);
        assert_eq!(snapped.end, 20.3);
        assert_eq!(snapped.start_source, EdgeSource::Topic);
        assert_eq!(snapped.end_source, EdgeSource::Topic);
        assert!((snapped.end - snapped.start - 10.4).abs() < 1e-9);
    }

    #[test]
    fn test_scene_leaning_edges() {
        let scenes = [29.2, 42.8];
        let topics = [27.8, 45.5];

        let req = request(30.0, 42.0, &scenes, &topics, Priority::SceneFirst, 4.0, 16.0);
        let snapped = snap_window(&req);
        assert_eq!(snapped.start, 29.2);
        assert_eq!(snapped.end, 42.8);
        assert_eq!(snapped.start_source, EdgeSource::Scene);
        assert_eq!(snapped.end_source, EdgeSource::Scene);

        // Topic-first falls back to scenes because both topic candidates are
        // outside the 1.0s topic budget.
        let req = request(30.0, 42.0, &scenes, &topics, Priority::TopicFirst, 4.0, 16.0);
        let fallback = snap_window(&req);
        assert_eq!(fallback, snapped);
    }

    #[test]
    fn test_empty_boundaries_returns_input() {
        let req = request(5.0, 13.0, &[], &[], Priority::TopicFirst, 4.0, 12.0);
        let snapped = snap_window(&req);
        assert_eq!(snapped.start, 5.0);
        assert_eq!(snapped.end, 13.0);
        assert_eq!(snapped.start_source, EdgeSource::Original);
        assert_eq!(snapped.end_source, EdgeSource::Original);
    }

    #[test]
    fn test_midpoint_crossing_rejected() {
        // The lone scene candidate (10.9) is within the start budget but past
        // the midpoint (10.7), so the start edge must not take it. The end
        // edge may, since 10.9 is on its side of the midpoint.
        let req = request(10.0, 11.4, &[10.9], &[], Priority::SceneFirst, 1.0, 12.0);
        let snapped = snap_window(&req);
        assert_eq!(snapped.start_source, EdgeSource::Original);
        assert_eq!(snapped.end, 10.9);
        assert_eq!(snapped.end_source, EdgeSource::Scene);
        // Duration guard re-extends the unsnapped start edge to min_len.
        assert_eq!(snapped.start, 9.9);
    }

    #[test]
    fn test_tie_break_prefers_past_for_start() {
        // Candidates equidistant within 10ms: 9.995 (past) and 10.005 (future).
        let req = request(
            10.0,
            20.0,
            &[9.995, 10.005],
            &[],
            Priority::SceneFirst,
            4.0,
            12.0,
        );
        let snapped = snap_window(&req);
        assert_eq!(snapped.start, 9.995);
    }

    #[test]
    fn test_tie_break_prefers_future_for_end() {
        let req = request(
            10.0,
            20.0,
            &[],
            &[19.995, 20.005],
            Priority::TopicFirst,
            4.0,
            12.0,
        );
        let snapped = snap_window(&req);
        assert_eq!(snapped.end, 20.005);
    }

    #[test]
    fn test_min_len_extends_unsnapped_edge() {
        // Start snaps forward to 11.8 leaving a 3.2s window; the end edge was
        // not snapped, so it extends to restore min_len.
        let req = request(11.0, 15.0, &[11.8], &[], Priority::SceneFirst, 4.0, 12.0);
        let snapped = snap_window(&req);
        assert_eq!(snapped.start, 11.8);
        assert_eq!(snapped.start_source, EdgeSource::Scene);
        assert_eq!(snapped.end_source, EdgeSource::Original);
        assert!((snapped.end - snapped.start - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_max_len_trims_unsnapped_edge() {
        // End snaps outward past max_len; the unsnapped start edge is trimmed.
        let req = request(10.0, 21.0, &[22.8], &[], Priority::SceneFirst, 4.0, 12.0);
        let snapped = snap_window(&req);
        assert_eq!(snapped.end, 22.8);
        assert_eq!(snapped.end_source, EdgeSource::Scene);
        assert!((snapped.end - snapped.start - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_idempotent() {
        let scenes = [9.0, 18.6];
        let topics = [9.9, 20.3];
        let first = snap_window(&request(
            10.0,
            20.0,
            &scenes,
            &topics,
            Priority::TopicFirst,
            4.0,
            12.0,
        ));
        let second = snap_window(&request(
            first.start,
            first.end,
            &scenes,
            &topics,
            Priority::TopicFirst,
            4.0,
            12.0,
        ));
        assert_eq!(first.start, second.start);
        assert_eq!(first.end, second.end);
    }
}
