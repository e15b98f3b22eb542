//! Reserved-lane bookkeeping for connector segments.
//!
//! Two unrelated connectors drawn on the same coordinate read as one
//! spurious line merging two families. The tracker records which lanes a
//! segment already claimed and nudges newcomers to the next free lane.
//! Indices live for a single route-build pass and are never reused.

use crate::model::{FamilyId, Settings, fix_number};
use std::collections::BTreeMap;
use tracing::warn;

/// Fixed-point lane key (1/1000 canvas unit), so lanes compare exactly.
fn lane_key(coord: f64) -> i64 {
    (coord * 1000.0).round() as i64
}

/// Strict interval overlap: touching endpoints are not a collision
/// (sibling drops legitimately meet their trunk end to end).
fn spans_cross(a_lo: f64, a_hi: f64, b_lo: f64, b_hi: f64) -> bool {
    a_lo < b_hi && b_lo < a_hi
}

/// Inclusive interval overlap, used to recognize a re-query of the same
/// family's own segment.
fn spans_touch(a_lo: f64, a_hi: f64, b_lo: f64, b_hi: f64) -> bool {
    a_lo <= b_hi && b_lo <= a_hi
}

/// A lane claimed by one family's connector segment.
#[derive(Debug, Clone, PartialEq)]
pub struct ReservedLine {
    pub family: FamilyId,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub color_index: Option<usize>,
}

/// Desired segment, before lane resolution.
#[derive(Debug, Clone, Copy)]
pub struct LaneRequest<'a> {
    pub family: &'a str,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalNudge {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalNudge {
    Left,
    Right,
}

/// Lane reservations for one route-build pass.
///
/// One index per axis: `horizontal` keyed by a segment's y lane,
/// `vertical` keyed by its x lane. The color cursor rotates over the
/// caller's palette as families claim colored trunks.
pub struct ChannelTracker {
    horizontal: BTreeMap<i64, Vec<ReservedLine>>,
    vertical: BTreeMap<i64, Vec<ReservedLine>>,
    palette_len: usize,
    probe_cap: usize,
    color_cursor: usize,
    last_color_family: Option<FamilyId>,
}

impl ChannelTracker {
    pub fn new(settings: &Settings) -> Self {
        Self {
            horizontal: BTreeMap::new(),
            vertical: BTreeMap::new(),
            palette_len: settings.palette_len.max(1),
            probe_cap: settings.lane_probe_cap.max(1),
            color_cursor: 0,
            last_color_family: None,
        }
    }

    /// Restart the color rotation. Called once at the start of every full
    /// route-build pass so recomputation is deterministic.
    pub fn reset_color_rotation(&mut self) {
        self.color_cursor = 0;
        self.last_color_family = None;
    }

    /// Resolve a horizontal segment to a free y lane at or near the
    /// requested one, shifting by `step` per probe.
    ///
    /// Re-querying for a family that already holds a lane on the probed
    /// coordinate returns the existing reservation, so incremental builds
    /// do not keep shifting. If every probe within the cap is blocked the
    /// last probed lane is returned anyway; layout must not stall.
    pub fn next_horizontal_lane(
        &mut self,
        req: &LaneRequest,
        allow_opposite: bool,
        step: f64,
        colorize: bool,
        force_color: bool,
        prefer: Option<VerticalNudge>,
    ) -> ReservedLine {
        let (lo, hi) = ordered(req.x1, req.x2);
        let dir = match prefer {
            Some(VerticalNudge::Up) => -1.0,
            Some(VerticalNudge::Down) => 1.0,
            // No preference: push away from the document origin so nested
            // trunks stay nested instead of crossing inward.
            None => {
                if req.y1 >= 0.0 {
                    1.0
                } else {
                    -1.0
                }
            }
        };

        let mut last = fix_number(req.y1);
        for k in 0..=self.probe_cap {
            for candidate in probe_pair(req.y1, dir, k as f64 * step, allow_opposite) {
                let candidate = fix_number(candidate);
                last = candidate;
                match self.try_horizontal(req.family, candidate, lo, hi) {
                    Probe::Existing(line) => return line,
                    Probe::Blocked => continue,
                    Probe::Free => {
                        return self.claim_horizontal(req.family, candidate, lo, hi, colorize, force_color);
                    }
                }
            }
        }

        warn!(
            family = req.family,
            y = req.y1,
            "horizontal lane probe cap reached, accepting occupied lane"
        );
        self.claim_horizontal(req.family, last, lo, hi, colorize, force_color)
    }

    /// Symmetric resolution for vertical segments, shifting x instead of y.
    pub fn next_vertical_lane(
        &mut self,
        req: &LaneRequest,
        allow_opposite: bool,
        step: f64,
        colorize: bool,
        force_color: bool,
        prefer: Option<HorizontalNudge>,
    ) -> ReservedLine {
        let (lo, hi) = ordered(req.y1, req.y2);
        let dir = match prefer {
            Some(HorizontalNudge::Left) => -1.0,
            Some(HorizontalNudge::Right) => 1.0,
            None => {
                if req.x1 >= 0.0 {
                    1.0
                } else {
                    -1.0
                }
            }
        };

        let mut last = fix_number(req.x1);
        for k in 0..=self.probe_cap {
            for candidate in probe_pair(req.x1, dir, k as f64 * step, allow_opposite) {
                let candidate = fix_number(candidate);
                last = candidate;
                match self.try_vertical(req.family, candidate, lo, hi) {
                    Probe::Existing(line) => return line,
                    Probe::Blocked => continue,
                    Probe::Free => {
                        return self.claim_vertical(req.family, candidate, lo, hi, colorize, force_color);
                    }
                }
            }
        }

        warn!(
            family = req.family,
            x = req.x1,
            "vertical lane probe cap reached, accepting occupied lane"
        );
        self.claim_vertical(req.family, last, lo, hi, colorize, force_color)
    }

    /// Claim a horizontal lane without probing. Used for segments that must
    /// stay glued to a box edge (short final drops, straight spouse lines)
    /// but should still block other families from crossing them.
    pub fn record_horizontal(&mut self, family: &str, y: f64, x1: f64, x2: f64) {
        let (lo, hi) = ordered(x1, x2);
        self.horizontal
            .entry(lane_key(y))
            .or_default()
            .push(ReservedLine {
                family: family.to_string(),
                x1: lo,
                y1: fix_number(y),
                x2: hi,
                y2: fix_number(y),
                color_index: None,
            });
    }

    /// Vertical counterpart of [`record_horizontal`](Self::record_horizontal).
    pub fn record_vertical(&mut self, family: &str, x: f64, y1: f64, y2: f64) {
        let (lo, hi) = ordered(y1, y2);
        self.vertical
            .entry(lane_key(x))
            .or_default()
            .push(ReservedLine {
                family: family.to_string(),
                x1: fix_number(x),
                y1: lo,
                x2: fix_number(x),
                y2: hi,
                color_index: None,
            });
    }

    /// Is this exact lane blocked by another family's overlapping segment?
    /// Read-only companion to [`next_horizontal_lane`](Self::next_horizontal_lane)
    /// for callers that cannot move their segment and must reroute instead.
    pub fn horizontal_blocked(&self, family: &str, y: f64, x1: f64, x2: f64) -> bool {
        let (lo, hi) = ordered(x1, x2);
        matches!(
            self.try_horizontal(family, fix_number(y), lo, hi),
            Probe::Blocked
        )
    }

    /// Does another family hold a horizontal lane strictly inside the band
    /// `(y_lo, y_hi)` crossing the x span? Drives the two-elbow step-around
    /// for drops that would otherwise cut through a foreign trunk.
    pub fn reserved_between(&self, x_lo: f64, x_hi: f64, y_lo: f64, y_hi: f64, family: &str) -> bool {
        let (band_lo, band_hi) = ordered(y_lo, y_hi);
        let lo_key = lane_key(band_lo);
        let hi_key = lane_key(band_hi);
        self.horizontal
            .range((
                std::ops::Bound::Excluded(lo_key),
                std::ops::Bound::Excluded(hi_key),
            ))
            .flat_map(|(_, lines)| lines.iter())
            .any(|line| line.family != family && spans_cross(line.x1, line.x2, x_lo, x_hi))
    }

    fn try_horizontal(&self, family: &str, y: f64, lo: f64, hi: f64) -> Probe {
        let Some(lines) = self.horizontal.get(&lane_key(y)) else {
            return Probe::Free;
        };
        if let Some(own) = lines
            .iter()
            .find(|l| l.family == family && spans_touch(l.x1, l.x2, lo, hi))
        {
            return Probe::Existing(own.clone());
        }
        if lines
            .iter()
            .any(|l| l.family != family && spans_cross(l.x1, l.x2, lo, hi))
        {
            return Probe::Blocked;
        }
        Probe::Free
    }

    fn try_vertical(&self, family: &str, x: f64, lo: f64, hi: f64) -> Probe {
        let Some(lines) = self.vertical.get(&lane_key(x)) else {
            return Probe::Free;
        };
        if let Some(own) = lines
            .iter()
            .find(|l| l.family == family && spans_touch(l.y1, l.y2, lo, hi))
        {
            return Probe::Existing(own.clone());
        }
        if lines
            .iter()
            .any(|l| l.family != family && spans_cross(l.y1, l.y2, lo, hi))
        {
            return Probe::Blocked;
        }
        Probe::Free
    }

    fn claim_horizontal(
        &mut self,
        family: &str,
        y: f64,
        lo: f64,
        hi: f64,
        colorize: bool,
        force_color: bool,
    ) -> ReservedLine {
        let color_index = colorize.then(|| self.take_color(family, force_color));
        let line = ReservedLine {
            family: family.to_string(),
            x1: lo,
            y1: y,
            x2: hi,
            y2: y,
            color_index,
        };
        self.horizontal.entry(lane_key(y)).or_default().push(line.clone());
        line
    }

    fn claim_vertical(
        &mut self,
        family: &str,
        x: f64,
        lo: f64,
        hi: f64,
        colorize: bool,
        force_color: bool,
    ) -> ReservedLine {
        let color_index = colorize.then(|| self.take_color(family, force_color));
        let line = ReservedLine {
            family: family.to_string(),
            x1: x,
            y1: lo,
            x2: x,
            y2: hi,
            color_index,
        };
        self.vertical.entry(lane_key(x)).or_default().push(line.clone());
        line
    }

    /// Rotate to the next palette color whenever a different family claims
    /// a colored lane; consecutive lanes of one family share a color.
    fn take_color(&mut self, family: &str, force: bool) -> usize {
        let switching = self.last_color_family.as_deref() != Some(family);
        if force || (switching && self.last_color_family.is_some()) {
            self.color_cursor = (self.color_cursor + 1) % self.palette_len;
        }
        self.last_color_family = Some(family.to_string());
        self.color_cursor
    }
}

enum Probe {
    Existing(ReservedLine),
    Blocked,
    Free,
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    (fix_number(lo), fix_number(hi))
}

/// Candidates at one probe magnitude: preferred direction first, then the
/// opposite when allowed. Magnitude zero is the requested lane itself.
fn probe_pair(base: f64, dir: f64, offset: f64, allow_opposite: bool) -> Vec<f64> {
    if offset == 0.0 {
        vec![base]
    } else if allow_opposite {
        vec![base + dir * offset, base - dir * offset]
    } else {
        vec![base + dir * offset]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> ChannelTracker {
        ChannelTracker::new(&Settings::default())
    }

    fn req<'a>(family: &'a str, x1: f64, y: f64, x2: f64) -> LaneRequest<'a> {
        LaneRequest {
            family,
            x1,
            y1: y,
            x2,
            y2: y,
        }
    }

    #[test]
    fn test_free_lane_is_returned_unshifted() {
        let mut t = tracker();
        let line = t.next_horizontal_lane(&req("@F1@", 0.0, 100.0, 200.0), true, 20.0, false, false, None);
        assert_eq!(line.y1, 100.0);
        assert_eq!(line.y2, 100.0);
    }

    #[test]
    fn test_colliding_family_is_shifted_away_from_origin() {
        let mut t = tracker();
        t.next_horizontal_lane(&req("@F1@", 0.0, 100.0, 200.0), true, 20.0, false, false, None);
        let line = t.next_horizontal_lane(&req("@F2@", 50.0, 100.0, 250.0), true, 20.0, false, false, None);
        // Positive-y request moves further down, away from the origin.
        assert_eq!(line.y1, 120.0);
    }

    #[test]
    fn test_preferred_direction_wins() {
        let mut t = tracker();
        t.next_horizontal_lane(&req("@F1@", 0.0, 100.0, 200.0), true, 20.0, false, false, None);
        let line = t.next_horizontal_lane(
            &req("@F2@", 50.0, 100.0, 250.0),
            true,
            20.0,
            false,
            false,
            Some(VerticalNudge::Up),
        );
        assert_eq!(line.y1, 80.0);
    }

    #[test]
    fn test_requery_same_family_is_idempotent() {
        let mut t = tracker();
        let first = t.next_horizontal_lane(&req("@F1@", 0.0, 100.0, 200.0), true, 20.0, false, false, None);
        let again = t.next_horizontal_lane(&req("@F1@", 0.0, 100.0, 200.0), true, 20.0, false, false, None);
        assert_eq!(first, again);
        // Still only one reservation on the lane: a third family at the
        // same coordinate is shifted exactly one step.
        let other = t.next_horizontal_lane(&req("@F3@", 0.0, 100.0, 200.0), true, 20.0, false, false, None);
        assert_eq!(other.y1, 120.0);
    }

    #[test]
    fn test_disjoint_spans_share_a_lane() {
        let mut t = tracker();
        t.next_horizontal_lane(&req("@F1@", 0.0, 100.0, 200.0), true, 20.0, false, false, None);
        let line = t.next_horizontal_lane(&req("@F2@", 300.0, 100.0, 400.0), true, 20.0, false, false, None);
        assert_eq!(line.y1, 100.0);
    }

    #[test]
    fn test_touching_spans_are_not_a_collision() {
        let mut t = tracker();
        t.next_horizontal_lane(&req("@F1@", 0.0, 100.0, 200.0), true, 20.0, false, false, None);
        let line = t.next_horizontal_lane(&req("@F2@", 200.0, 100.0, 300.0), true, 20.0, false, false, None);
        assert_eq!(line.y1, 100.0);
    }

    #[test]
    fn test_vertical_lane_shifts_x() {
        let mut t = tracker();
        let vreq = LaneRequest {
            family: "@F1@",
            x1: 50.0,
            y1: 0.0,
            x2: 50.0,
            y2: 300.0,
        };
        t.next_vertical_lane(&vreq, true, 10.0, false, false, None);
        let other = LaneRequest {
            family: "@F2@",
            x1: 50.0,
            y1: 100.0,
            x2: 50.0,
            y2: 400.0,
        };
        let line = t.next_vertical_lane(&other, true, 10.0, false, false, Some(HorizontalNudge::Left));
        assert_eq!(line.x1, 40.0);
    }

    #[test]
    fn test_probe_cap_returns_a_lane_anyway() {
        let settings = Settings {
            lane_probe_cap: 3,
            ..Settings::default()
        };
        let mut t = ChannelTracker::new(&settings);
        // Occupy the requested lane and every lane within the cap.
        for i in 0..9 {
            let y = 40.0 + 20.0 * (i as f64 - 4.0);
            t.record_horizontal("@F1@", y, 0.0, 500.0);
        }
        let line = t.next_horizontal_lane(&req("@F2@", 0.0, 40.0, 500.0), true, 20.0, false, false, None);
        // Best effort: the last probed lane, occupied or not.
        assert!(line.y1.abs() <= 40.0 + 3.0 * 20.0);
    }

    #[test]
    fn test_color_rotation_per_family() {
        let mut t = tracker();
        let a = t.next_horizontal_lane(&req("@F1@", 0.0, 100.0, 100.0), true, 20.0, true, false, None);
        let b = t.next_horizontal_lane(&req("@F2@", 200.0, 100.0, 300.0), true, 20.0, true, false, None);
        let c = t.next_horizontal_lane(&req("@F2@", 200.0, 140.0, 300.0), true, 20.0, true, false, None);
        assert_eq!(a.color_index, Some(0));
        assert_eq!(b.color_index, Some(1));
        // Same family keeps its color on subsequent lanes.
        assert_eq!(c.color_index, Some(1));
    }

    #[test]
    fn test_color_rotation_wraps_palette() {
        let settings = Settings {
            palette_len: 2,
            ..Settings::default()
        };
        let mut t = ChannelTracker::new(&settings);
        let colors: Vec<_> = (0..4)
            .map(|i| {
                let family = format!("@F{i}@");
                let r = LaneRequest {
                    family: &family,
                    x1: i as f64 * 300.0,
                    y1: 100.0,
                    x2: i as f64 * 300.0 + 100.0,
                    y2: 100.0,
                };
                t.next_horizontal_lane(&r, true, 20.0, true, false, None)
                    .color_index
                    .unwrap()
            })
            .collect();
        assert_eq!(colors, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_reset_color_rotation() {
        let mut t = tracker();
        t.next_horizontal_lane(&req("@F1@", 0.0, 100.0, 100.0), true, 20.0, true, false, None);
        t.next_horizontal_lane(&req("@F2@", 200.0, 100.0, 300.0), true, 20.0, true, false, None);
        t.reset_color_rotation();
        let again = t.next_horizontal_lane(&req("@F3@", 400.0, 100.0, 500.0), true, 20.0, true, false, None);
        assert_eq!(again.color_index, Some(0));
    }

    #[test]
    fn test_reserved_between_band() {
        let mut t = tracker();
        t.record_horizontal("@F1@", 150.0, 0.0, 300.0);
        assert!(t.reserved_between(50.0, 200.0, 100.0, 200.0, "@F2@"));
        // Own family's lane does not trigger the step-around.
        assert!(!t.reserved_between(50.0, 200.0, 100.0, 200.0, "@F1@"));
        // Band edges are exclusive.
        assert!(!t.reserved_between(50.0, 200.0, 150.0, 200.0, "@F2@"));
        // Disjoint x spans do not cross.
        assert!(!t.reserved_between(400.0, 500.0, 100.0, 200.0, "@F2@"));
    }
}
