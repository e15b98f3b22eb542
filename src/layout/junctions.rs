//! Common-point computation: where a family's connectors converge.
//!
//! Junctions live for one route-build pass only. Each family gets at most
//! one spouse junction and one children trunk; both parents of a family
//! resolve to the same cached points no matter which is routed first.

use crate::layout::channels::{ChannelTracker, LaneRequest, VerticalNudge};
use crate::model::{FamilyId, IndividualId, PlacedIndividual, Position, Settings, fix_number};
use std::collections::BTreeMap;

/// Rows closer than this are treated as the same row.
pub(crate) const ROW_EPS: f64 = 0.5;

/// How the spouse connector runs between two partner boxes.
#[derive(Debug, Clone, PartialEq)]
pub enum SpouseRoute {
    /// Same row, boxes near each other: one straight segment between the
    /// inner edges, bending nowhere. The midpoint anchors the trunk.
    Straight { y: f64, from_x: f64, mid_x: f64, to_x: f64 },
    /// Partners far apart or on different rows: the connector arcs over a
    /// reserved lane above both boxes.
    Raised {
        lane_y: f64,
        from_top: Position,
        to_top: Position,
        color_index: Option<usize>,
    },
}

/// Shared horizontal trunk serving all children of a family (or of a
/// single parent across families).
#[derive(Debug, Clone, PartialEq)]
pub struct ChildrenTrunk {
    pub y: f64,
    /// Drop x per child, keyed by child id.
    pub x: BTreeMap<IndividualId, f64>,
    pub color_index: Option<usize>,
}

/// Transient per-family junction cache for one route-build pass.
#[derive(Debug, Clone, Default)]
pub struct FamilyJunctions {
    pub spouse: Option<SpouseRoute>,
    /// Anchor the children trunk hangs from: spouse junction when there is
    /// one, bottom-center of the lone parent otherwise.
    pub anchor: Option<Position>,
    pub single: Option<Position>,
    pub children: Option<ChildrenTrunk>,
}

/// Compute the spouse junction for one family and the anchor it leaves
/// behind for the children trunk.
///
/// The junction sits midway between the inner edges of the two boxes. When
/// the partner is further than one box width plus the horizontal margin,
/// or on another row, the junction is raised by half a box height plus the
/// line spacing above the box centers so the connector arcs instead of
/// cutting through intervening boxes. A raised lane that collides with
/// another family's reservation moves the anchor toward the spouse's side
/// of the midpoint.
pub fn spouse_junction(
    family: &FamilyId,
    p: &PlacedIndividual,
    s: &PlacedIndividual,
    settings: &Settings,
    tracker: &mut ChannelTracker,
) -> (Position, SpouseRoute) {
    let same_row = (p.top() - s.top()).abs() < ROW_EPS;
    let near = (p.center_x() - s.center_x()).abs() <= p.size.w + settings.horizontal_margin;
    let p_is_left = p.center_x() <= s.center_x();

    let (left, right) = if p_is_left { (p, s) } else { (s, p) };
    let mid_x = fix_number((left.right() + right.left()) / 2.0);

    if same_row && near {
        let y = fix_number(p.center_y());
        if !tracker.horizontal_blocked(family, y, left.right(), right.left()) {
            tracker.record_horizontal(family, y, left.right(), right.left());
            let (from_x, to_x) = if p_is_left {
                (p.right(), s.left())
            } else {
                (p.left(), s.right())
            };
            let route = SpouseRoute::Straight {
                y,
                from_x: fix_number(from_x),
                mid_x,
                to_x: fix_number(to_x),
            };
            return (Position { x: mid_x, y }, route);
        }
        // Lane taken by another family: fall through to the raised shape.
    }

    raised_junction(family, p, s, mid_x, settings, tracker)
}

fn raised_junction(
    family: &FamilyId,
    p: &PlacedIndividual,
    s: &PlacedIndividual,
    mid_x: f64,
    settings: &Settings,
    tracker: &mut ChannelTracker,
) -> (Position, SpouseRoute) {
    let preferred_y = p.top().min(s.top()) - settings.line_spacing;
    let req = LaneRequest {
        family,
        x1: p.center_x(),
        y1: preferred_y,
        x2: s.center_x(),
        y2: preferred_y,
    };
    let lane = tracker.next_horizontal_lane(
        &req,
        false,
        settings.line_spacing,
        settings.colorize_lines,
        false,
        Some(VerticalNudge::Up),
    );

    // A shifted lane means the midpoint column is contested; hang the
    // trunk closer to the spouse's side instead of the origin's.
    let anchor_x = if (lane.y1 - fix_number(preferred_y)).abs() > ROW_EPS {
        fix_number((mid_x + s.center_x()) / 2.0)
    } else {
        mid_x
    };

    let route = SpouseRoute::Raised {
        lane_y: lane.y1,
        from_top: Position {
            x: fix_number(p.center_x()),
            y: fix_number(p.top()),
        },
        to_top: Position {
            x: fix_number(s.center_x()),
            y: fix_number(s.top()),
        },
        color_index: lane.color_index,
    };
    (
        Position {
            x: anchor_x,
            y: lane.y1,
        },
        route,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Size;

    fn boxed(x: f64, y: f64) -> PlacedIndividual {
        PlacedIndividual::new(Position { x, y }, Size { w: 100.0, h: 50.0 })
    }

    #[test]
    fn test_adjacent_spouses_get_straight_junction() {
        let settings = Settings::default();
        let mut tracker = ChannelTracker::new(&settings);
        let p = boxed(0.0, 0.0);
        let s = boxed(140.0, 0.0);
        let (anchor, route) = spouse_junction(&"@F1@".to_string(), &p, &s, &settings, &mut tracker);
        assert_eq!(anchor, Position { x: 120.0, y: 25.0 });
        assert_eq!(
            route,
            SpouseRoute::Straight {
                y: 25.0,
                from_x: 100.0,
                mid_x: 120.0,
                to_x: 140.0,
            }
        );
    }

    #[test]
    fn test_far_spouse_junction_is_raised() {
        let settings = Settings::default();
        let mut tracker = ChannelTracker::new(&settings);
        let p = boxed(0.0, 0.0);
        let s = boxed(400.0, 0.0);
        let (anchor, route) = spouse_junction(&"@F1@".to_string(), &p, &s, &settings, &mut tracker);
        match route {
            SpouseRoute::Raised { lane_y, from_top, to_top, .. } => {
                // Half a box height plus line spacing above the centers.
                assert_eq!(lane_y, -20.0);
                assert_eq!(from_top, Position { x: 50.0, y: 0.0 });
                assert_eq!(to_top, Position { x: 450.0, y: 0.0 });
            }
            other => panic!("expected raised junction, got {other:?}"),
        }
        assert_eq!(anchor.y, -20.0);
    }

    #[test]
    fn test_different_rows_force_raised_junction() {
        let settings = Settings::default();
        let mut tracker = ChannelTracker::new(&settings);
        let p = boxed(0.0, 0.0);
        let s = boxed(140.0, 30.0);
        let (_, route) = spouse_junction(&"@F1@".to_string(), &p, &s, &settings, &mut tracker);
        assert!(matches!(route, SpouseRoute::Raised { .. }));
    }

    #[test]
    fn test_contested_raised_lane_moves_anchor_toward_spouse() {
        let settings = Settings::default();
        let mut tracker = ChannelTracker::new(&settings);
        // Another family already owns the preferred arc lane.
        tracker.record_horizontal("@F9@", -20.0, 0.0, 500.0);
        let p = boxed(0.0, 0.0);
        let s = boxed(400.0, 0.0);
        let (anchor, route) = spouse_junction(&"@F1@".to_string(), &p, &s, &settings, &mut tracker);
        match route {
            SpouseRoute::Raised { lane_y, .. } => assert_eq!(lane_y, -40.0),
            other => panic!("expected raised junction, got {other:?}"),
        }
        // Midpoint is 250; the anchor leans toward the spouse center 450.
        assert_eq!(anchor.x, 350.0);
    }
}
